//! Leaving a room and the eviction that may follow.

use crate::error::{MucError, ProtocolResult};
use crate::handlers::helpers::{annotated_presence, include_real_jid, OccupantItem};
use crate::handlers::ServiceContext;
use chrono::Utc;
use muc_proto::{status, BareJid, Condition, Element, FullJid};
use tracing::{debug, info, warn};

pub(super) async fn process_exit(
    ctx: &ServiceContext,
    room_jid: &BareJid,
    sender: &FullJid,
) -> ProtocolResult {
    let Some(room) = ctx.rooms.get_room(room_jid) else {
        return Err(MucError::rejected_text(Condition::ItemNotFound, "Unknown room"));
    };

    let mut outbound = Vec::new();
    let (nickname_gone, leaving_nick, occupancy, logging_enabled, persistent);

    {
        let mut st = room.lock();
        let Some(nick) = st.nickname_of(sender).map(str::to_string) else {
            // Not an occupant; leave quietly.
            debug!(room = %room_jid, sender = %sender, "unavailable from non-occupant");
            return Ok(Vec::new());
        };

        let affiliation = st.affiliation(sender.bare());
        let role = st.role_of(&nick);
        info!(room = %room_jid, sender = %sender, nick = %nick, "occupant leaving");

        // Self confirmation: every session bound to the nickname in
        // multi-item mode, only the leaving session otherwise.
        let self_recipients: Vec<FullJid> = if ctx.features.multi_item_allowed {
            st.sessions_of_nickname(&nick)
        } else {
            vec![sender.clone()]
        };
        for recipient in &self_recipients {
            outbound.push(annotated_presence(
                Element::new("presence").attr("type", "unavailable"),
                room_jid,
                &nick,
                recipient,
                OccupantItem {
                    affiliation,
                    role,
                    nick: Some(nick.clone()),
                    jid: Some(sender.to_string()),
                },
                None,
                None,
                &[status::SELF_PRESENCE],
            ));
        }

        let Some((_, gone)) = st.remove_session(sender) else {
            return Ok(Vec::new());
        };

        if gone {
            // The nickname is vacated: everyone left sees it go unavailable.
            for (_, occupant) in st.occupants() {
                if occupant.is_placeholder() {
                    continue;
                }
                let recipient_affiliation = st.affiliation(occupant.bare());
                let show_jid =
                    include_real_jid(st.config().anonymity, false, recipient_affiliation);
                for session in occupant.sessions() {
                    outbound.push(annotated_presence(
                        Element::new("presence").attr("type", "unavailable"),
                        room_jid,
                        &nick,
                        session,
                        OccupantItem {
                            affiliation,
                            role,
                            nick: Some(nick.clone()),
                            jid: show_jid.then(|| sender.to_string()),
                        },
                        None,
                        None,
                        &[],
                    ));
                }
            }
        } else if let Some(base) = st.last_presence_of_bare(sender.bare()).cloned() {
            // Another session still holds the nickname: re-announce it.
            let remaining = st.sessions_of_nickname(&nick);
            let origin_full = remaining.first().cloned();
            for (_, occupant) in st.occupants() {
                if occupant.is_placeholder() {
                    continue;
                }
                let recipient_is_self = occupant.bare() == sender.bare();
                let recipient_affiliation = st.affiliation(occupant.bare());
                let show_jid = include_real_jid(
                    st.config().anonymity,
                    recipient_is_self,
                    recipient_affiliation,
                );
                for session in occupant.sessions() {
                    outbound.push(annotated_presence(
                        base.clone(),
                        room_jid,
                        &nick,
                        session,
                        OccupantItem {
                            affiliation,
                            role: st.role_of(&nick),
                            nick: Some(nick.clone()),
                            jid: show_jid
                                .then(|| origin_full.as_ref().map(ToString::to_string))
                                .flatten(),
                        },
                        None,
                        None,
                        &[],
                    ));
                }
            }
        }

        nickname_gone = gone;
        leaving_nick = nick;
        occupancy = st.occupant_count();
        logging_enabled = st.config().logging_enabled;
        persistent = st.config().persistent;
    }

    if nickname_gone && logging_enabled {
        let now = Utc::now();
        if let Err(err) = ctx
            .history
            .add_leave_event(room_jid, now, sender, &leaving_nick)
            .await
        {
            warn!(room = %room_jid, error = %err, "recording leave event failed");
        }
        if let Some(logger) = &ctx.logger {
            if let Err(err) = logger
                .add_leave_event(room_jid, now, sender, &leaving_nick)
                .await
            {
                warn!(room = %room_jid, error = %err, "logging leave event failed");
            }
        }
    }

    if occupancy == 0 {
        if !persistent {
            if let Err(err) = ctx.history.remove_history(room_jid).await {
                warn!(room = %room_jid, error = %err, "discarding history failed");
            }
        }
        ctx.rooms.leave_room(&room);
    }

    Ok(outbound)
}
