//! Outbound sink and deferred delivery.
//!
//! [`DeferredDeliveryQueue`] paces history and subject replay: a bounded
//! channel is consumed by one worker task that drains a batch, writes it, and
//! sleeps a fixed interval between drains. The interval is pacing, not
//! backpressure; producers feel backpressure from the channel bound.
//! Shutdown cancels the worker and performs a final drain.

use muc_proto::Stanza;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The outbound stanza sink the transport layer provides.
pub trait StanzaWriter: Send + Sync {
    /// Hand a stanza to the transport. Must not block.
    fn write(&self, stanza: Stanza);
}

/// A [`StanzaWriter`] backed by an unbounded channel.
///
/// The transport adapter (or a test) drains the receiving end.
pub struct ChannelWriter {
    tx: mpsc::UnboundedSender<Stanza>,
}

impl ChannelWriter {
    /// Create the writer and its draining end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Stanza>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StanzaWriter for ChannelWriter {
    fn write(&self, stanza: Stanza) {
        if self.tx.send(stanza).is_err() {
            warn!("outbound sink closed; dropping stanza");
        }
    }
}

/// Paced delivery of replayed stanzas.
pub struct DeferredDeliveryQueue {
    tx: mpsc::Sender<Stanza>,
    token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Stanzas written per drain before the worker sleeps again.
const MAX_BATCH: usize = 32;

impl DeferredDeliveryQueue {
    /// Spawn the delivery worker.
    pub fn spawn(writer: Arc<dyn StanzaWriter>, interval: Duration, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let token = CancellationToken::new();
        let worker = tokio::spawn(Self::run(rx, writer, interval, token.clone()));
        Self {
            tx,
            token,
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn run(
        mut rx: mpsc::Receiver<Stanza>,
        writer: Arc<dyn StanzaWriter>,
        interval: Duration,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    for _ in 0..MAX_BATCH {
                        match rx.try_recv() {
                            Ok(stanza) => writer.write(stanza),
                            Err(_) => break,
                        }
                    }
                }
            }
        }

        // Final drain so nothing queued at shutdown is lost.
        rx.close();
        let mut drained = 0usize;
        while let Ok(stanza) = rx.try_recv() {
            writer.write(stanza);
            drained += 1;
        }
        if drained > 0 {
            debug!(count = drained, "drained deferred queue at shutdown");
        }
    }

    /// Enqueue one stanza for paced delivery.
    pub async fn enqueue(&self, stanza: Stanza) {
        if self.tx.send(stanza).await.is_err() {
            warn!("deferred delivery worker gone; dropping stanza");
        }
    }

    /// Enqueue a batch, preserving order.
    pub async fn enqueue_all(&self, stanzas: impl IntoIterator<Item = Stanza>) {
        for stanza in stanzas {
            self.enqueue(stanza).await;
        }
    }

    /// Stop the worker, draining whatever is still queued.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stanza(id: &str) -> Stanza {
        Stanza::message("groupchat").with_id(id)
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_waits_for_the_pacing_interval() {
        let (writer, mut rx) = ChannelWriter::new();
        let queue =
            DeferredDeliveryQueue::spawn(Arc::new(writer), Duration::from_millis(550), 16);

        queue.enqueue(stanza("h1")).await;
        queue.enqueue(stanza("h2")).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(551)).await;
        tokio::task::yield_now().await;

        assert_eq!(rx.recv().await.unwrap().id(), Some("h1"));
        assert_eq!(rx.recv().await.unwrap().id(), Some("h2"));

        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_pending_stanzas() {
        let (writer, mut rx) = ChannelWriter::new();
        let queue =
            DeferredDeliveryQueue::spawn(Arc::new(writer), Duration::from_secs(60), 16);

        queue.enqueue(stanza("pending")).await;
        queue.shutdown().await;

        assert_eq!(rx.recv().await.unwrap().id(), Some("pending"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent() {
        let (writer, _rx) = ChannelWriter::new();
        let queue =
            DeferredDeliveryQueue::spawn(Arc::new(writer), Duration::from_millis(550), 16);
        queue.shutdown().await;
        queue.shutdown().await;
    }
}
