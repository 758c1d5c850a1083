//! History and room-log abstractions.
//!
//! Both collaborators are best-effort: callers wrap every invocation so a
//! failing backend can never abort a room mutation or a broadcast.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use muc_proto::{BareJid, Element, FullJid, Stanza};
use thiserror::Error;

pub mod memory;
pub mod noop;

pub use memory::MemoryHistory;
pub use noop::{NoopHistory, NoopLogger};

/// History backend errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Shaping of a history replay, from the `<history/>` request child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Total character budget across replayed stanzas.
    pub maxchars: Option<usize>,
    /// Maximum number of replayed stanzas.
    pub maxstanzas: Option<usize>,
    /// Only messages younger than this many seconds.
    pub seconds: Option<i64>,
    /// Only messages after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl HistoryRequest {
    /// Parse the shaping attributes of a `<history/>` element.
    pub fn from_element(hist: &Element) -> Self {
        let int = |name: &str| hist.get_attr(name).and_then(|v| v.parse().ok());
        Self {
            maxchars: int("maxchars"),
            maxstanzas: int("maxstanzas"),
            seconds: hist.get_attr("seconds").and_then(|v| v.parse().ok()),
            since: hist
                .get_attr("since")
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Storage for room conversation history and its replay on join.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Record a groupchat message.
    async fn add_message(
        &self,
        room: &BareJid,
        message: &Element,
        body: &str,
        sender: &FullJid,
        nickname: &str,
        time: DateTime<Utc>,
    ) -> Result<(), HistoryError>;

    /// Record a subject change.
    async fn add_subject_change(
        &self,
        room: &BareJid,
        subject: &str,
        sender: &FullJid,
        nickname: &str,
        time: DateTime<Utc>,
    ) -> Result<(), HistoryError>;

    /// Record an occupant joining.
    async fn add_join_event(
        &self,
        room: &BareJid,
        time: DateTime<Utc>,
        sender: &FullJid,
        nickname: &str,
    ) -> Result<(), HistoryError>;

    /// Record an occupant leaving.
    async fn add_leave_event(
        &self,
        room: &BareJid,
        time: DateTime<Utc>,
        sender: &FullJid,
        nickname: &str,
    ) -> Result<(), HistoryError>;

    /// Build the replay for a joining occupant, shaped by `request`,
    /// addressed to `recipient` and stamped with delayed delivery.
    async fn history_messages(
        &self,
        room: &BareJid,
        recipient: &FullJid,
        request: &HistoryRequest,
    ) -> Result<Vec<Stanza>, HistoryError>;

    /// Discard everything stored for `room`.
    async fn remove_history(&self, room: &BareJid) -> Result<(), HistoryError>;

    /// Whether this backend outlives the process (public logging counts on it).
    fn is_persistent(&self) -> bool;
}

/// External room logger (public archives).
#[async_trait]
pub trait RoomLogger: Send + Sync {
    /// Record a groupchat message.
    async fn add_message(
        &self,
        room: &BareJid,
        body: &str,
        sender: &FullJid,
        nickname: &str,
        time: DateTime<Utc>,
    ) -> Result<(), HistoryError>;

    /// Record a subject change.
    async fn add_subject_change(
        &self,
        room: &BareJid,
        subject: &str,
        sender: &FullJid,
        nickname: &str,
        time: DateTime<Utc>,
    ) -> Result<(), HistoryError>;

    /// Record an occupant joining.
    async fn add_join_event(
        &self,
        room: &BareJid,
        time: DateTime<Utc>,
        sender: &FullJid,
        nickname: &str,
    ) -> Result<(), HistoryError>;

    /// Record an occupant leaving.
    async fn add_leave_event(
        &self,
        room: &BareJid,
        time: DateTime<Utc>,
        sender: &FullJid,
        nickname: &str,
    ) -> Result<(), HistoryError>;
}
