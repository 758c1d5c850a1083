//! Protocol handlers and stanza dispatch.
//!
//! Each protocol is a value implementing [`Protocol`]: a shape predicate and
//! a processing function with no shared mutable base state. The
//! [`ProtocolRegistry`] routes an inbound stanza to the first protocol whose
//! `matches` accepts it and converts rejections into error replies.

pub mod helpers;
pub mod invitation;
pub mod message;
pub mod moderation;
pub mod presence;

pub use invitation::InvitationProtocol;
pub use message::MessageRoutingProtocol;
pub use moderation::ModerationProtocol;
pub use presence::PresenceProtocol;

use crate::config::FeaturesConfig;
use crate::delivery::DeferredDeliveryQueue;
use crate::error::{MucError, ProtocolResult};
use crate::history::{HistoryProvider, RoomLogger};
use crate::state::RoomRegistry;
use async_trait::async_trait;
use muc_proto::{BareJid, Stanza};
use std::sync::Arc;
use tracing::{debug, error, warn, Instrument, Level};

/// Shared collaborators handed to every protocol.
pub struct ServiceContext {
    /// The component's own domain JID.
    pub service_jid: BareJid,
    /// Component-level feature toggles.
    pub features: FeaturesConfig,
    /// Resolved lock policy for newly created rooms.
    pub lock_new_rooms: bool,
    /// Room lifetimes.
    pub rooms: RoomRegistry,
    /// Conversation history backend (best-effort).
    pub history: Arc<dyn HistoryProvider>,
    /// Optional public room logger (best-effort).
    pub logger: Option<Arc<dyn RoomLogger>>,
    /// Paced replay queue.
    pub delivery: DeferredDeliveryQueue,
}

impl ServiceContext {
    /// Whether public logging is available for rooms that enable it.
    pub fn public_logging_available(&self) -> bool {
        self.logger.is_some() || self.history.is_persistent()
    }
}

/// A protocol handler: shape predicate plus processing.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Handler name for logs.
    fn name(&self) -> &'static str;

    /// Whether this handler consumes the stanza.
    fn matches(&self, stanza: &Stanza) -> bool;

    /// Process the stanza, returning outbound stanzas to write in order.
    async fn process(&self, stanza: &Stanza) -> ProtocolResult;
}

/// Routes stanzas to protocol handlers.
pub struct ProtocolRegistry {
    protocols: Vec<Arc<dyn Protocol>>,
}

impl ProtocolRegistry {
    /// Build the registry with the four MUC protocols.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            protocols: vec![
                Arc::new(PresenceProtocol::new(ctx.clone())),
                Arc::new(ModerationProtocol::new(ctx.clone())),
                Arc::new(InvitationProtocol::new(ctx.clone())),
                Arc::new(MessageRoutingProtocol::new(ctx)),
            ],
        }
    }

    /// Dispatch one stanza; the result is the ordered list of stanzas to
    /// write, with rejections already turned into error replies.
    pub async fn dispatch(&self, stanza: &Stanza) -> Vec<Stanza> {
        let Some(protocol) = self.protocols.iter().find(|p| p.matches(stanza)) else {
            debug!(stanza = %stanza, "no protocol for stanza");
            if stanza.typ() == Some("error") {
                return Vec::new();
            }
            return vec![stanza.error_reply(muc_proto::Condition::ServiceUnavailable, None)];
        };

        let span = tracing::span!(
            Level::DEBUG,
            "muc.stanza",
            protocol = protocol.name(),
            from = stanza.get_attr("from"),
            to = stanza.get_attr("to"),
        );

        let result = protocol.process(stanza).instrument(span).await;

        match result {
            Ok(outbound) => outbound,
            Err(err) => {
                match &err {
                    MucError::Rejected { .. } => {
                        debug!(protocol = protocol.name(), error = %err, "stanza rejected")
                    }
                    MucError::Internal(_) => {
                        error!(protocol = protocol.name(), error = %err, "internal fault")
                    }
                }
                // Never answer an error with an error.
                if stanza.typ() == Some("error") {
                    warn!(protocol = protocol.name(), "dropping failed error-typed stanza");
                    return Vec::new();
                }
                vec![err.to_error_reply(stanza)]
            }
        }
    }
}
