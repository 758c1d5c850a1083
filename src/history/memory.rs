//! In-memory history provider.
//!
//! Keeps a capped ring of messages per room. This is the default backend for
//! non-persistent deployments and the one the test-suite drives.

use super::{HistoryError, HistoryProvider, HistoryRequest};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use muc_proto::{ns, BareJid, Element, FullJid, Stanza};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
struct StoredMessage {
    message: Element,
    sender_nickname: String,
    time: DateTime<Utc>,
    chars: usize,
}

/// Capped per-room in-memory message store.
pub struct MemoryHistory {
    max_messages: usize,
    rooms: Mutex<HashMap<BareJid, VecDeque<StoredMessage>>>,
}

impl MemoryHistory {
    /// Create a store keeping at most `max_messages` per room.
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Number of messages currently stored for `room`.
    pub fn stored_count(&self, room: &BareJid) -> usize {
        self.rooms.lock().get(room).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl HistoryProvider for MemoryHistory {
    async fn add_message(
        &self,
        room: &BareJid,
        message: &Element,
        body: &str,
        _sender: &FullJid,
        nickname: &str,
        time: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
        let mut rooms = self.rooms.lock();
        let log = rooms.entry(room.clone()).or_default();
        if log.len() >= self.max_messages {
            log.pop_front();
        }
        log.push_back(StoredMessage {
            message: message.clone(),
            sender_nickname: nickname.to_string(),
            time,
            chars: body.len(),
        });
        Ok(())
    }

    async fn add_subject_change(
        &self,
        _room: &BareJid,
        _subject: &str,
        _sender: &FullJid,
        _nickname: &str,
        _time: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
        // The live subject triple is replayed from room state, not from here.
        Ok(())
    }

    async fn add_join_event(
        &self,
        _room: &BareJid,
        _time: DateTime<Utc>,
        _sender: &FullJid,
        _nickname: &str,
    ) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn add_leave_event(
        &self,
        _room: &BareJid,
        _time: DateTime<Utc>,
        _sender: &FullJid,
        _nickname: &str,
    ) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn history_messages(
        &self,
        room: &BareJid,
        recipient: &FullJid,
        request: &HistoryRequest,
    ) -> Result<Vec<Stanza>, HistoryError> {
        let rooms = self.rooms.lock();
        let Some(log) = rooms.get(room) else {
            return Ok(Vec::new());
        };

        let cutoff = request.seconds.map(|s| Utc::now() - Duration::seconds(s));

        let mut selected: Vec<&StoredMessage> = log
            .iter()
            .filter(|m| cutoff.map_or(true, |c| m.time >= c))
            .filter(|m| request.since.map_or(true, |since| m.time >= since))
            .collect();

        if let Some(maxstanzas) = request.maxstanzas {
            if selected.len() > maxstanzas {
                selected.drain(..selected.len() - maxstanzas);
            }
        }

        if let Some(maxchars) = request.maxchars {
            // Keep the newest messages that fit the character budget.
            let mut budget = maxchars;
            let mut keep_from = selected.len();
            for (idx, msg) in selected.iter().enumerate().rev() {
                if msg.chars > budget {
                    break;
                }
                budget -= msg.chars;
                keep_from = idx;
            }
            selected.drain(..keep_from.min(selected.len()));
        }

        let replay = selected
            .into_iter()
            .map(|stored| {
                let mut message = stored.message.clone();
                message.set_attr(
                    "from",
                    format!("{}/{}", room, stored.sender_nickname),
                );
                message.set_attr("to", recipient.to_string());
                message.remove_child_ns("delay", ns::DELAY);
                message.push_child(
                    Element::new("delay")
                        .attr("xmlns", ns::DELAY)
                        .attr("from", room.to_string())
                        .attr("stamp", stored.time.to_rfc3339()),
                );
                Stanza::from_element(message)
            })
            .collect();

        Ok(replay)
    }

    async fn remove_history(&self, room: &BareJid) -> Result<(), HistoryError> {
        self.rooms.lock().remove(room);
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
