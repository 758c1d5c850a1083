//! Unified error handling for the MUC engine.
//!
//! Protocol failures fall into the taxonomy from the design notes: rejections
//! carrying an XMPP defined condition (returned to the originating stanza as
//! an error reply), suppressed collaborator failures (history/logging is
//! best-effort) and internal faults (logged, answered generically).

use muc_proto::{Condition, Stanza};
use thiserror::Error;

/// Errors that can occur while a protocol handler processes a stanza.
#[derive(Debug, Clone, Error)]
pub enum MucError {
    /// The request was understood and refused; maps to a defined condition.
    #[error("rejected ({})", .condition.element_name())]
    Rejected {
        /// The defined condition for the error reply.
        condition: Condition,
        /// Optional human-readable text for the reply.
        text: Option<String>,
    },

    /// An unexpected defect. Never retried; does not corrupt room state
    /// because mutation only happens after validation passes.
    #[error("internal fault: {0}")]
    Internal(String),
}

impl MucError {
    /// A rejection without explanatory text.
    pub fn rejected(condition: Condition) -> Self {
        Self::Rejected {
            condition,
            text: None,
        }
    }

    /// A rejection with human-readable text.
    pub fn rejected_text(condition: Condition, text: impl Into<String>) -> Self {
        Self::Rejected {
            condition,
            text: Some(text.into()),
        }
    }

    /// The condition used when answering the originating stanza.
    pub fn condition(&self) -> Condition {
        match self {
            Self::Rejected { condition, .. } => *condition,
            Self::Internal(_) => Condition::InternalServerError,
        }
    }

    /// Build the error reply for the stanza that caused this failure.
    pub fn to_error_reply(&self, original: &Stanza) -> Stanza {
        let text = match self {
            Self::Rejected { text, .. } => text.as_deref(),
            // Internal details stay in the logs.
            Self::Internal(_) => None,
        };
        original.error_reply(self.condition(), text)
    }
}

/// Result of a protocol handler: outbound stanzas or a failure.
pub type ProtocolResult = Result<Vec<Stanza>, MucError>;
