//! Entering a room: validation ladder, registration, announcement, replay.

use super::broadcast::{broadcast_presence, PresenceOrigin};
use super::PresenceProtocol;
use crate::error::MucError;
use crate::handlers::helpers::{annotated_presence, include_real_jid, system_messages, OccupantItem};
use crate::history::HistoryRequest;
use crate::state::{default_role, Room};
use chrono::Utc;
use muc_proto::{ns, status, Affiliation, Condition, Element, FullJid, Stanza};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one enter attempt against a fetched room handle.
pub(super) enum EnterAttempt {
    /// Entered; these stanzas go out now.
    Done(Vec<Stanza>),
    /// The room was tombstoned under us; fetch a fresh one and retry.
    Evicted,
}

pub(super) async fn process_entering(
    protocol: &PresenceProtocol,
    stanza: &Stanza,
    room: &Arc<Room>,
    created: bool,
    sender: &FullJid,
    nick: &str,
) -> Result<EnterAttempt, MucError> {
    let ctx = &protocol.ctx;
    let x = stanza.find_child_ns("x", ns::MUC);
    let presence = protocol.clone_presence(stanza.element());

    let mut outbound = Vec::new();
    // Snapshots carried out of the guarded section.
    let (replay_request, subject, room_locked, logging_enabled, own_sessions);

    {
        let mut st = room.lock();
        if st.evicted() {
            return Ok(EnterAttempt::Evicted);
        }

        let config = st.config();
        let affiliation = st.affiliation(sender.bare());

        if config.password_protected {
            let supplied = x
                .and_then(|x| x.find_child("password"))
                .map(Element::cdata);
            if supplied.is_none() || supplied.as_deref() != config.password.as_deref() {
                debug!(room = %room.jid(), nick, "password mismatch");
                return Err(MucError::rejected(Condition::NotAuthorized));
            }
        }

        if st.locked() && affiliation != Affiliation::Owner {
            return Err(MucError::rejected_text(
                Condition::ItemNotFound,
                "Room exists but is locked",
            ));
        }

        if !affiliation.can_enter_open_room() {
            info!(room = %room.jid(), sender = %sender, "banned occupant tried to enter");
            return Err(MucError::rejected(Condition::Forbidden));
        }
        if st.config().members_only && !affiliation.can_enter_members_only_room() {
            return Err(MucError::rejected(Condition::RegistrationRequired));
        }

        if let Some(existing) = st.occupant(nick) {
            let same_bare = existing.bare() == sender.bare();
            let same_session = existing.sessions().any(|s| s == sender);
            let rebind_ok = same_bare
                && (ctx.features.multi_item_allowed || same_session || existing.is_placeholder());
            if !rebind_ok {
                return Err(MucError::rejected(Condition::Conflict));
            }
        }

        // Existing occupants' presences reach the joiner first; in a
        // filtered room a joiner outside the filtered set gets nothing.
        let config = st.config();
        let joiner_sees_roster =
            !config.presence_filter_enabled || config.presence_filter_contains(affiliation);
        if joiner_sees_roster {
            for (occ_nick, occupant) in st.occupants() {
                if occupant.bare() == sender.bare() || occupant.is_placeholder() {
                    continue;
                }
                let occ_affiliation = st.affiliation(occupant.bare());
                if config.presence_filter_enabled
                    && !config.presence_filter_contains(occ_affiliation)
                {
                    continue;
                }
                let Some(base) = st.last_presence_of_bare(occupant.bare()) else {
                    continue;
                };
                let show_jid = include_real_jid(config.anonymity, false, affiliation);
                outbound.push(annotated_presence(
                    base.clone(),
                    room.jid(),
                    occ_nick,
                    sender,
                    OccupantItem {
                        affiliation: occ_affiliation,
                        role: occupant.role(),
                        nick: Some(occ_nick.to_string()),
                        jid: show_jid
                            .then(|| occupant.sessions().next().map(ToString::to_string))
                            .flatten(),
                    },
                    None,
                    None,
                    &[],
                ));
            }
        }

        let role = default_role(st.config(), affiliation);
        info!(
            room = %room.jid(),
            nick,
            sender = %sender,
            %role,
            %affiliation,
            "occupant entering"
        );

        st.add_occupant(sender.clone(), nick, role, presence.clone())
            .map_err(|_| MucError::rejected(Condition::Conflict))?;

        let origin = PresenceOrigin {
            nick,
            bare: sender.bare(),
            full: Some(sender),
            affiliation,
            role: st.role_of(nick),
        };
        let extra: &[u16] = if created { &[status::ROOM_CREATED] } else { &[] };
        outbound.extend(broadcast_presence(&st, room.jid(), &origin, &presence, extra, true));

        replay_request = x
            .and_then(|x| x.find_child("history"))
            .map(HistoryRequest::from_element)
            .unwrap_or_default();
        subject = st.subject().cloned();
        room_locked = st.locked();
        logging_enabled = st.config().logging_enabled;
        own_sessions = st.sessions_of_nickname(nick);
    }

    // Replayed traffic is paced by the deferred queue.
    match ctx.history.history_messages(room.jid(), sender, &replay_request).await {
        Ok(replay) => ctx.delivery.enqueue_all(replay).await,
        Err(err) => warn!(room = %room.jid(), error = %err, "history replay failed"),
    }

    if let Some(subject) = subject {
        let message = Stanza::message("groupchat")
            .with_from(format!("{}/{}", room.jid(), subject.nick))
            .with_to(sender)
            .with_child(Element::new("subject").text(subject.text.clone()))
            .with_child(
                Element::new("delay")
                    .attr("xmlns", ns::DELAY)
                    .attr("jid", format!("{}/{}", room.jid(), subject.nick))
                    .attr("stamp", subject.date.to_rfc3339()),
            )
            .with_child(
                Element::new("x")
                    .attr("xmlns", ns::LEGACY_DELAY)
                    .attr("stamp", subject.date.format("%Y%m%dT%H:%M:%S").to_string()),
            );
        ctx.delivery.enqueue(message).await;
    }

    if room_locked {
        outbound.extend(system_messages(
            room.jid(),
            &own_sessions,
            "Room is locked. Please configure.",
        ));
    }
    if created {
        let mut welcome = String::from("Welcome! You created new Multi User Chat Room.");
        if room_locked {
            welcome.push_str(" Room is locked now. Configure it please!");
        } else {
            welcome.push_str(" Room is unlocked and ready for occupants!");
        }
        outbound.extend(system_messages(room.jid(), &own_sessions, &welcome));
    }

    if logging_enabled {
        let now = Utc::now();
        if let Err(err) = ctx.history.add_join_event(room.jid(), now, sender, nick).await {
            warn!(room = %room.jid(), error = %err, "recording join event failed");
        }
        if let Some(logger) = &ctx.logger {
            if let Err(err) = logger.add_join_event(room.jid(), now, sender, nick).await {
                warn!(room = %room.jid(), error = %err, "logging join event failed");
            }
        }
    }

    Ok(EnterAttempt::Done(outbound))
}
