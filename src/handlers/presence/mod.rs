//! Presence protocol: room creation, entering, leaving, status changes.
//!
//! Per occupant-in-room the state machine is
//! absent → entering → joined → {nickname-changing, status-changing} →
//! leaving → absent. Nickname changes are explicitly rejected.

mod broadcast;
mod enter;
mod exit;

pub(crate) use broadcast::{broadcast_presence, PresenceOrigin};

use super::{helpers, Protocol, ServiceContext};
use crate::error::{MucError, ProtocolResult};
use crate::state::Room;
use async_trait::async_trait;
use enter::EnterAttempt;
use muc_proto::{ns, Condition, Element, Stanza, StanzaKind};
use std::sync::Arc;
use tracing::debug;

/// Drives the enter/leave/status-change state machine.
pub struct PresenceProtocol {
    ctx: Arc<ServiceContext>,
}

impl PresenceProtocol {
    /// Create the handler.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Strip the enter-request payload (and, when the component-level
    /// presence filter is on, everything but availability basics) from an
    /// inbound presence before caching or rebroadcasting it.
    fn clone_presence(&self, element: &Element) -> Element {
        let mut presence = element.clone();
        if self.ctx.features.presence_filter_enabled {
            presence.retain_children(|c| {
                matches!(c.name(), "show" | "status" | "priority")
                    || c.xmlns() == Some(ns::CAPS)
            });
        }
        presence.remove_child_ns("x", ns::MUC);
        presence.remove_attr("to");
        presence.remove_attr("from");
        presence
    }
}

#[async_trait]
impl Protocol for PresenceProtocol {
    fn name(&self) -> &'static str {
        "presence"
    }

    fn matches(&self, stanza: &Stanza) -> bool {
        stanza.kind() == Some(StanzaKind::Presence)
    }

    async fn process(&self, stanza: &Stanza) -> ProtocolResult {
        // Error-typed presence never changes room state.
        if stanza.typ() == Some("error") {
            debug!("ignoring error-typed presence");
            return Ok(Vec::new());
        }

        let sender = helpers::sender_full(stanza)?;
        let room_jid = helpers::room_jid(stanza)?;
        let nick = helpers::nickname_from_to(stanza)
            .ok_or_else(|| MucError::rejected(Condition::JidMalformed))?;

        if stanza.typ() == Some("unavailable") {
            return exit::process_exit(&self.ctx, &room_jid, &sender).await;
        }

        // Create-if-absent and enter, retrying once if the fetched room was
        // concurrently evicted (tombstoned) before we took its guard.
        for _ in 0..2 {
            let (room, created) =
                self.ctx
                    .rooms
                    .get_or_create(&room_jid, &sender, self.ctx.lock_new_rooms);

            let known_nickname = room.lock().nickname_of(&sender).map(str::to_string);
            let reenter = stanza.has_child_ns("x", ns::MUC);

            match known_nickname {
                Some(known) if known != nick => {
                    return Err(MucError::rejected_text(
                        Condition::FeatureNotImplemented,
                        "Changing nickname is not supported yet.",
                    ));
                }
                Some(_) if !reenter => {
                    return self.process_status_change(stanza, &room, &sender).await;
                }
                _ => match enter::process_entering(self, stanza, &room, created, &sender, &nick)
                    .await?
                {
                    EnterAttempt::Done(outbound) => return Ok(outbound),
                    EnterAttempt::Evicted => continue,
                },
            }
        }

        Err(MucError::Internal(format!(
            "room {room_jid} kept vanishing during enter"
        )))
    }
}

impl PresenceProtocol {
    async fn process_status_change(
        &self,
        stanza: &Stanza,
        room: &Arc<Room>,
        sender: &muc_proto::FullJid,
    ) -> ProtocolResult {
        let presence = self.clone_presence(stanza.element());

        let mut st = room.lock();
        let Some(nick) = st.nickname_of(sender).map(str::to_string) else {
            return Ok(Vec::new());
        };
        let affiliation = st.affiliation(sender.bare());

        // In a filtered room only the filtered affiliations get their cached
        // presence updated; everyone else keeps the join-time snapshot.
        let update_cache = !st.config().presence_filter_enabled
            || (!st.config().presence_filtered_affiliations.is_empty()
                && st.config().presence_filter_contains(affiliation));
        if update_cache {
            st.set_presence(sender.clone(), presence.clone());
        }

        let base = st
            .last_presence_of_bare(sender.bare())
            .cloned()
            .unwrap_or(presence);

        let origin = PresenceOrigin {
            nick: &nick,
            bare: sender.bare(),
            full: Some(sender),
            affiliation,
            role: st.role_of(&nick),
        };
        Ok(broadcast_presence(&st, room.jid(), &origin, &base, &[], true))
    }
}
