//! Moderation: admin get/set of occupant roles and affiliations.
//!
//! A `set` is two-pass: every submitted item is permission-checked first,
//! then all of them are applied. A single failing item rejects the whole
//! request with nothing applied.

use super::{helpers, Protocol, ServiceContext};
use crate::config::Anonymity;
use crate::error::{MucError, ProtocolResult};
use crate::handlers::helpers::{annotated_presence, include_real_jid, OccupantItem};
use crate::state::RoomState;
use async_trait::async_trait;
use muc_proto::{
    ns, status, Affiliation, BareJid, Condition, Element, FullJid, Role, Stanza, StanzaKind,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Handles `<iq/>` stanzas carrying a `…#admin` query.
pub struct ModerationProtocol {
    ctx: Arc<ServiceContext>,
}

impl ModerationProtocol {
    /// Create the handler.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }
}

fn item_role(item: &Element) -> Result<Option<Role>, MucError> {
    item.get_attr("role")
        .map(|v| Role::from_str(v).map_err(|_| MucError::rejected(Condition::BadRequest)))
        .transpose()
}

fn item_affiliation(item: &Element) -> Result<Option<Affiliation>, MucError> {
    item.get_attr("affiliation")
        .map(|v| Affiliation::from_str(v).map_err(|_| MucError::rejected(Condition::BadRequest)))
        .transpose()
}

fn item_reason(item: &Element) -> Option<String> {
    item.find_child("reason").map(Element::cdata)
}

/// Resolve the occupants an item targets: by `nick`, else by the bare of
/// `jid`. Returns (nickname, bare) pairs.
fn resolve_targets(st: &RoomState, item: &Element) -> Vec<(String, BareJid)> {
    if let Some(nick) = item.get_attr("nick") {
        return st
            .occupant(nick)
            .map(|occ| vec![(nick.to_string(), occ.bare().clone())])
            .unwrap_or_default();
    }
    if let Some(bare) = item
        .get_attr("jid")
        .and_then(|v| v.parse::<BareJid>().ok())
    {
        return st
            .nickname_of_bare(&bare)
            .map(|nick| vec![(nick.to_string(), bare.clone())])
            .unwrap_or_default();
    }
    Vec::new()
}

fn not_allowed(text: &str) -> MucError {
    MucError::rejected_text(Condition::NotAllowed, text)
}

/// The permission matrix, evaluated against one submitted item.
fn check_item(
    st: &RoomState,
    item: &Element,
    sender_affiliation: Affiliation,
    sender_role: Role,
) -> Result<(), MucError> {
    let new_role = item_role(item)?;
    let new_affiliation = item_affiliation(item)?;

    match (new_role, new_affiliation) {
        (Some(role), None) => {
            let targets = resolve_targets(st, item);
            if targets.is_empty() {
                return Err(MucError::rejected_text(
                    Condition::ItemNotFound,
                    "No such occupant.",
                ));
            }
            for (_, bare) in targets {
                let target_affiliation = st.affiliation(&bare);
                let outranked =
                    target_affiliation.weight() >= sender_affiliation.weight();
                match role {
                    Role::None => {
                        if !sender_role.can_kick_participants_and_visitors() {
                            return Err(not_allowed("You cannot kick"));
                        }
                        if outranked {
                            return Err(not_allowed(
                                "You cannot kick occupant with higher affiliation",
                            ));
                        }
                    }
                    Role::Participant => {
                        if !sender_role.can_grant_voice() {
                            return Err(not_allowed("You cannot grant voice"));
                        }
                    }
                    Role::Visitor => {
                        if !sender_role.can_revoke_voice() {
                            return Err(not_allowed("You cannot revoke voice"));
                        }
                        if outranked {
                            return Err(not_allowed(
                                "You cannot revoke voice from occupant with higher affiliation",
                            ));
                        }
                    }
                    Role::Moderator => {
                        if !sender_affiliation.can_edit_moderator_list() {
                            return Err(not_allowed("You cannot grant moderator privileges"));
                        }
                    }
                }
            }
            Ok(())
        }
        (None, Some(affiliation)) => {
            let Some(bare) = item
                .get_attr("jid")
                .and_then(|v| v.parse::<BareJid>().ok())
            else {
                return Err(MucError::rejected(Condition::BadRequest));
            };
            let target_affiliation = st.affiliation(&bare);
            let outranked = target_affiliation.weight() >= sender_affiliation.weight();
            match affiliation {
                Affiliation::Outcast => {
                    if !sender_affiliation.can_ban_members_and_unaffiliated() {
                        return Err(not_allowed("You cannot ban"));
                    }
                    if outranked {
                        return Err(not_allowed(
                            "You cannot ban occupant with higher affiliation",
                        ));
                    }
                }
                Affiliation::Member => {
                    if !sender_affiliation.can_edit_member_list() {
                        return Err(not_allowed("You cannot grant membership"));
                    }
                }
                Affiliation::Admin => {
                    if !sender_affiliation.can_edit_admin_list() {
                        return Err(not_allowed("You cannot grant admin privileges"));
                    }
                }
                Affiliation::Owner => {
                    if !sender_affiliation.can_edit_owner_list() {
                        return Err(not_allowed("You cannot grant owner privileges"));
                    }
                }
                Affiliation::None => {
                    if outranked {
                        return Err(not_allowed(
                            "You cannot remove affiliation of occupant with higher affiliation",
                        ));
                    }
                }
            }
            Ok(())
        }
        // Exactly one of role/affiliation per item.
        _ => Err(MucError::rejected(Condition::BadRequest)),
    }
}

impl ModerationProtocol {
    fn process_get(&self, stanza: &Stanza, room_jid: &BareJid) -> ProtocolResult {
        let room = self
            .ctx
            .rooms
            .get_room(room_jid)
            .ok_or_else(|| MucError::rejected(Condition::ItemNotFound))?;
        let sender = helpers::sender_full(stanza)?;

        let st = room.lock();

        let sender_affiliation = st.affiliation(sender.bare());
        if !matches!(sender_affiliation, Affiliation::Admin | Affiliation::Owner) {
            return Err(MucError::rejected(Condition::Forbidden));
        }

        let query = stanza
            .find_child_ns("query", ns::MUC_ADMIN)
            .ok_or_else(|| MucError::rejected(Condition::BadRequest))?;
        let item = query
            .find_child("item")
            .ok_or_else(|| MucError::rejected(Condition::BadRequest))?;

        let filter_role = item_role(item)?;
        let filter_affiliation = item_affiliation(item)?;

        let mut response_query = Element::new("query").attr("xmlns", ns::MUC_ADMIN);

        match (filter_affiliation, filter_role) {
            (Some(filter), None) => {
                // The affiliation table includes offline JIDs.
                for (bare, affiliation) in st.affiliations() {
                    if affiliation != filter {
                        continue;
                    }
                    let mut entry = Element::new("item")
                        .attr("affiliation", affiliation.as_str())
                        .attr("jid", bare.to_string());
                    if let Some(nick) = st.nickname_of_bare(bare) {
                        entry.set_attr("nick", nick);
                        entry.set_attr("role", st.role_of(nick).as_str());
                    }
                    response_query.push_child(entry);
                }
            }
            (None, Some(filter)) => {
                for (nick, occupant) in st.occupants() {
                    if occupant.is_placeholder() || occupant.role() != filter {
                        continue;
                    }
                    let mut entry = Element::new("item")
                        .attr("affiliation", st.affiliation(occupant.bare()).as_str())
                        .attr("nick", nick)
                        .attr("role", occupant.role().as_str());
                    if st.config().anonymity != Anonymity::FullAnonymous {
                        if let Some(session) = occupant.sessions().next() {
                            entry.set_attr("jid", session.to_string());
                        }
                    }
                    response_query.push_child(entry);
                }
            }
            // Exactly one filter, never both, never neither.
            _ => return Err(MucError::rejected(Condition::BadRequest)),
        }

        let result = Stanza::from_element(
            stanza.result_iq().into_element().child(response_query),
        );
        Ok(vec![result])
    }

    fn process_set(&self, stanza: &Stanza, room_jid: &BareJid) -> ProtocolResult {
        let room = self
            .ctx
            .rooms
            .get_room(room_jid)
            .ok_or_else(|| MucError::rejected(Condition::ItemNotFound))?;
        let sender = helpers::sender_full(stanza)?;

        let query = stanza
            .find_child_ns("query", ns::MUC_ADMIN)
            .ok_or_else(|| MucError::rejected(Condition::BadRequest))?;
        let items: Vec<&Element> = query.children().filter(|c| c.name() == "item").collect();

        let mut st = room.lock();

        let sender_affiliation = st.affiliation(sender.bare());
        let sender_role = st.role_of_full(&sender);

        // Pre-check every item; nothing is applied unless all pass.
        for item in &items {
            check_item(&st, item, sender_affiliation, sender_role)?;
        }

        let mut outbound = vec![stanza.result_iq()];
        for item in &items {
            self.apply_item(&mut st, room_jid, &sender, item, &mut outbound)?;
        }
        Ok(outbound)
    }

    fn apply_item(
        &self,
        st: &mut RoomState,
        room_jid: &BareJid,
        sender: &FullJid,
        item: &Element,
        outbound: &mut Vec<Stanza>,
    ) -> Result<(), MucError> {
        let new_role = item_role(item)?;
        let new_affiliation = item_affiliation(item)?;
        let reason = item_reason(item);
        let actor = sender.to_string();

        if let Some(affiliation) = new_affiliation {
            let bare = item
                .get_attr("jid")
                .and_then(|v| v.parse::<BareJid>().ok())
                .ok_or_else(|| MucError::rejected(Condition::BadRequest))?;

            info!(room = %room_jid, target = %bare, %affiliation, "affiliation change");
            st.set_affiliation(&bare, affiliation);

            if affiliation == Affiliation::Outcast {
                self.remove_and_announce(
                    st,
                    room_jid,
                    &bare,
                    affiliation,
                    status::BANNED,
                    &actor,
                    reason.as_deref(),
                    outbound,
                );
            } else {
                // Plain update: annotate the occupant's live presence, if any.
                let Some(nick) = st.nickname_of_bare(&bare).map(str::to_string) else {
                    return Ok(());
                };
                let role = st.role_of(&nick);
                let base = st
                    .last_presence_of_bare(&bare)
                    .cloned()
                    .unwrap_or_else(|| Element::new("presence"));
                let origin_full = st.sessions_of_bare(&bare).into_iter().next();
                announce_to_all(
                    st,
                    room_jid,
                    &nick,
                    &bare,
                    origin_full.as_ref(),
                    affiliation,
                    role,
                    &base,
                    &[],
                    reason.as_deref(),
                    outbound,
                );
            }
        }

        if let Some(role) = new_role {
            let targets = resolve_targets(st, item);
            for (nick, bare) in targets {
                if role == Role::None {
                    info!(room = %room_jid, target = %bare, nick = %nick, "kicking occupant");
                    let target_affiliation = st.affiliation(&bare);
                    self.remove_and_announce(
                        st,
                        room_jid,
                        &bare,
                        target_affiliation,
                        status::KICKED,
                        &actor,
                        reason.as_deref(),
                        outbound,
                    );
                } else {
                    info!(room = %room_jid, target = %bare, nick = %nick, %role, "role change");
                    st.set_role(&nick, role);
                    let base = st
                        .last_presence_of_bare(&bare)
                        .cloned()
                        .unwrap_or_else(|| Element::new("presence"));
                    let origin_full = st.sessions_of_bare(&bare).into_iter().next();
                    announce_to_all(
                        st,
                        room_jid,
                        &nick,
                        &bare,
                        origin_full.as_ref(),
                        st.affiliation(&bare),
                        role,
                        &base,
                        &[],
                        reason.as_deref(),
                        outbound,
                    );
                }
            }
        }

        Ok(())
    }

    /// Forced removal (ban or kick): the target's sessions each get an
    /// unavailable presence with the status code and the actor, then every
    /// remaining occupant sees the removal.
    #[allow(clippy::too_many_arguments)]
    fn remove_and_announce(
        &self,
        st: &mut RoomState,
        room_jid: &BareJid,
        bare: &BareJid,
        affiliation: Affiliation,
        code: u16,
        actor: &str,
        reason: Option<&str>,
        outbound: &mut Vec<Stanza>,
    ) {
        let removed = st.remove_all_sessions_of(bare);
        for (nick, sessions) in &removed {
            for session in sessions {
                outbound.push(annotated_presence(
                    Element::new("presence").attr("type", "unavailable"),
                    room_jid,
                    nick,
                    session,
                    OccupantItem {
                        affiliation,
                        role: Role::None,
                        nick: Some(nick.clone()),
                        jid: Some(session.to_string()),
                    },
                    Some(actor),
                    reason,
                    &[code],
                ));
            }
            announce_to_all(
                st,
                room_jid,
                nick,
                bare,
                sessions.first(),
                affiliation,
                Role::None,
                &Element::new("presence").attr("type", "unavailable"),
                &[code],
                reason,
                outbound,
            );
        }
    }
}

/// Annotated copy of `base` about one occupant, to every live session.
#[allow(clippy::too_many_arguments)]
fn announce_to_all(
    st: &RoomState,
    room_jid: &BareJid,
    origin_nick: &str,
    origin_bare: &BareJid,
    origin_full: Option<&FullJid>,
    affiliation: Affiliation,
    role: Role,
    base: &Element,
    codes: &[u16],
    reason: Option<&str>,
    outbound: &mut Vec<Stanza>,
) {
    for (_, occupant) in st.occupants() {
        if occupant.is_placeholder() {
            continue;
        }
        let recipient_is_self = occupant.bare() == origin_bare;
        let show_jid = include_real_jid(
            st.config().anonymity,
            recipient_is_self,
            st.affiliation(occupant.bare()),
        );
        for session in occupant.sessions() {
            outbound.push(annotated_presence(
                base.clone(),
                room_jid,
                origin_nick,
                session,
                OccupantItem {
                    affiliation,
                    role,
                    nick: Some(origin_nick.to_string()),
                    jid: show_jid
                        .then(|| {
                            origin_full
                                .map(ToString::to_string)
                                .unwrap_or_else(|| origin_bare.to_string())
                        }),
                },
                None,
                reason,
                codes,
            ));
        }
    }
}

#[async_trait]
impl Protocol for ModerationProtocol {
    fn name(&self) -> &'static str {
        "moderation"
    }

    fn matches(&self, stanza: &Stanza) -> bool {
        stanza.kind() == Some(StanzaKind::Iq) && stanza.has_child_ns("query", ns::MUC_ADMIN)
    }

    async fn process(&self, stanza: &Stanza) -> ProtocolResult {
        if helpers::nickname_from_to(stanza).is_some() {
            return Err(MucError::rejected(Condition::BadRequest));
        }
        let room_jid = helpers::room_jid(stanza)?;

        match stanza.typ() {
            Some("set") => self.process_set(stanza, &room_jid),
            Some("get") => self.process_get(stanza, &room_jid),
            _ => Err(MucError::rejected(Condition::BadRequest)),
        }
    }
}
