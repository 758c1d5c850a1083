//! No-op history and logger implementations.
//!
//! Used when storage is disabled or unavailable. All operations succeed and
//! store nothing.

use super::{HistoryError, HistoryProvider, HistoryRequest, RoomLogger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use muc_proto::{BareJid, Element, FullJid, Stanza};

/// History provider that discards everything.
pub struct NoopHistory;

#[async_trait]
impl HistoryProvider for NoopHistory {
    async fn add_message(
        &self,
        _room: &BareJid,
        _message: &Element,
        _body: &str,
        _sender: &FullJid,
        _nickname: &str,
        _time: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
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
        _room: &BareJid,
        _recipient: &FullJid,
        _request: &HistoryRequest,
    ) -> Result<Vec<Stanza>, HistoryError> {
        Ok(Vec::new())
    }

    async fn remove_history(&self, _room: &BareJid) -> Result<(), HistoryError> {
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// Room logger that discards everything.
pub struct NoopLogger;

#[async_trait]
impl RoomLogger for NoopLogger {
    async fn add_message(
        &self,
        _room: &BareJid,
        _body: &str,
        _sender: &FullJid,
        _nickname: &str,
        _time: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
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
}
