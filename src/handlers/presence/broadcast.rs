//! Presence fan-out with status-code annotation and filter policy.

use crate::config::Anonymity;
use crate::handlers::helpers::{annotated_presence, include_real_jid, OccupantItem};
use crate::state::RoomState;
use muc_proto::{status, Affiliation, BareJid, Element, FullJid, Role, Stanza};

/// The occupant a presence refers to.
pub struct PresenceOrigin<'a> {
    /// Nickname the presence is published under.
    pub nick: &'a str,
    /// Bare JID behind the nickname.
    pub bare: &'a BareJid,
    /// The session the presence came from, when applicable.
    pub full: Option<&'a FullJid>,
    /// Origin affiliation.
    pub affiliation: Affiliation,
    /// Origin role.
    pub role: Role,
}

/// Broadcast `base` (annotated per recipient) to the room.
///
/// The self copies carry 110, plus 100 for non-anonymous rooms, 170 when
/// logging is enabled and any `extra_self_codes` (201 on creation).
///
/// When `apply_filter` and the room's presence filter is enabled, an origin
/// whose affiliation is in the filtered set reaches only filtered-set
/// occupants, and any other origin reaches only itself.
pub fn broadcast_presence(
    st: &RoomState,
    room: &BareJid,
    origin: &PresenceOrigin<'_>,
    base: &Element,
    extra_self_codes: &[u16],
    apply_filter: bool,
) -> Vec<Stanza> {
    let config = st.config();

    let mut self_codes = vec![status::SELF_PRESENCE];
    if config.anonymity == Anonymity::NonAnonymous {
        self_codes.push(status::NON_ANONYMOUS);
    }
    if config.logging_enabled {
        self_codes.push(status::LOGGING_ENABLED);
    }
    self_codes.extend_from_slice(extra_self_codes);

    let filtering = apply_filter && config.presence_filter_enabled;
    let origin_filtered = filtering && !config.presence_filter_contains(origin.affiliation);

    let mut out = Vec::new();
    for (_, occupant) in st.occupants() {
        if occupant.is_placeholder() {
            continue;
        }
        if origin_filtered && occupant.bare() != origin.bare {
            continue;
        }
        if filtering
            && !origin_filtered
            && !config.presence_filter_contains(st.affiliation(occupant.bare()))
        {
            continue;
        }

        let recipient_is_self = occupant.bare() == origin.bare;
        let recipient_affiliation = st.affiliation(occupant.bare());
        let show_jid = include_real_jid(config.anonymity, recipient_is_self, recipient_affiliation);
        let codes: &[u16] = if recipient_is_self { &self_codes } else { &[] };

        for session in occupant.sessions() {
            out.push(annotated_presence(
                base.clone(),
                room,
                origin.nick,
                session,
                OccupantItem {
                    affiliation: origin.affiliation,
                    role: origin.role,
                    nick: Some(origin.nick.to_string()),
                    jid: show_jid.then(|| {
                        origin
                            .full
                            .map(ToString::to_string)
                            .unwrap_or_else(|| origin.bare.to_string())
                    }),
                },
                None,
                None,
                codes,
            ));
        }
    }
    out
}
