//! Component assembly: collaborators, protocol registry and worker pool.
//!
//! Stanzas are dispatched to a bounded pool of workers keyed by the hash of
//! the sender's bare JID (falling back to the recipient), mirroring the
//! packet-level dispatch of the surrounding component framework. The key is
//! deliberately *not* the room address; room consistency comes from the
//! per-room mutex, never from the dispatch hash.

use crate::config::Config;
use crate::delivery::{DeferredDeliveryQueue, StanzaWriter};
use crate::error::MucError;
use crate::handlers::{ProtocolRegistry, ServiceContext};
use crate::history::{HistoryProvider, RoomLogger};
use crate::state::RoomRegistry;
use muc_proto::{BareJid, Stanza};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Per-worker inbox depth.
const WORKER_QUEUE: usize = 128;

/// The assembled MUC component.
pub struct MucComponent {
    ctx: Arc<ServiceContext>,
    registry: Arc<ProtocolRegistry>,
    writer: Arc<dyn StanzaWriter>,
    workers: Mutex<Vec<mpsc::Sender<Stanza>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MucComponent {
    /// Wire the engine together and spawn its workers.
    pub fn new(
        config: &Config,
        history: Arc<dyn HistoryProvider>,
        logger: Option<Arc<dyn RoomLogger>>,
        writer: Arc<dyn StanzaWriter>,
    ) -> Result<Self, MucError> {
        let service_jid: BareJid = config
            .service
            .name
            .parse()
            .map_err(|e| MucError::Internal(format!("bad service name: {e}")))?;

        let delivery = DeferredDeliveryQueue::spawn(
            writer.clone(),
            Duration::from_millis(config.delivery.interval_ms),
            config.delivery.capacity,
        );

        let ctx = Arc::new(ServiceContext {
            service_jid,
            lock_new_rooms: config.features.lock_new_rooms(),
            features: config.features.clone(),
            rooms: RoomRegistry::new(config.default_room.clone()),
            history,
            logger,
            delivery,
        });

        let registry = Arc::new(ProtocolRegistry::new(ctx.clone()));

        let worker_count = config.service.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let (tx, mut rx) = mpsc::channel::<Stanza>(WORKER_QUEUE);
            let registry = registry.clone();
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                while let Some(stanza) = rx.recv().await {
                    for out in registry.dispatch(&stanza).await {
                        writer.write(out);
                    }
                }
                tracing::debug!(worker = id, "stanza worker stopped");
            }));
            workers.push(tx);
        }

        info!(
            service = %ctx.service_jid,
            workers = worker_count,
            "MUC component ready"
        );

        Ok(Self {
            ctx,
            registry,
            writer,
            workers: Mutex::new(workers),
            handles: Mutex::new(handles),
        })
    }

    /// The shared collaborators (rooms, history, delivery queue).
    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.ctx
    }

    /// Process a stanza inline and write its outcome. Transport adapters
    /// that already provide their own concurrency use this path; so do the
    /// tests, which want deterministic completion.
    pub async fn handle(&self, stanza: Stanza) {
        for out in self.registry.dispatch(&stanza).await {
            self.writer.write(out);
        }
    }

    /// Queue a stanza onto the worker pool.
    ///
    /// The key is the sender bare JID, so one sender's stanzas stay ordered;
    /// two occupants of one room may land on different workers.
    pub async fn submit(&self, stanza: Stanza) {
        let key = stanza
            .from_jid()
            .map(|jid| jid.to_bare().to_string())
            .or_else(|| stanza.to_jid().map(|jid| jid.to_bare().to_string()))
            .unwrap_or_default();

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);

        let tx = {
            let workers = self.workers.lock();
            if workers.is_empty() {
                return;
            }
            workers[(hasher.finish() as usize) % workers.len()].clone()
        };
        if tx.send(stanza).await.is_err() {
            tracing::warn!("stanza worker pool is shut down; dropping stanza");
        }
    }

    /// Stop the workers, then stop the delivery queue (draining it).
    pub async fn shutdown(&self) {
        self.workers.lock().clear();
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.ctx.delivery.shutdown().await;
        info!("MUC component stopped");
    }
}
