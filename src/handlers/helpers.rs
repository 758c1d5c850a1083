//! Shared helpers for the protocol handlers.

use crate::config::Anonymity;
use crate::error::MucError;
use muc_proto::{ns, Affiliation, BareJid, Condition, Element, FullJid, Role, Stanza};

/// The sender full JID of a stanza; rejected when absent or malformed.
pub fn sender_full(stanza: &Stanza) -> Result<FullJid, MucError> {
    match stanza.from_jid() {
        Some(muc_proto::Jid::Full(full)) => Ok(full),
        _ => Err(MucError::rejected(Condition::JidMalformed)),
    }
}

/// The bare room JID a stanza is addressed to; rejected when absent.
pub fn room_jid(stanza: &Stanza) -> Result<BareJid, MucError> {
    stanza
        .to_jid()
        .map(|jid| jid.to_bare())
        .ok_or_else(|| MucError::rejected(Condition::JidMalformed))
}

/// The nickname part (resource) of the stanza's `to` address.
pub fn nickname_from_to(stanza: &Stanza) -> Option<String> {
    stanza
        .to_jid()
        .and_then(|jid| jid.resource().map(str::to_string))
}

/// Whether a recipient gets to see the occupant's real JID.
pub fn include_real_jid(
    anonymity: Anonymity,
    recipient_is_self: bool,
    recipient_affiliation: Affiliation,
) -> bool {
    recipient_is_self
        || match anonymity {
            Anonymity::NonAnonymous => true,
            Anonymity::SemiAnonymous => recipient_affiliation.can_view_occupants_jid(),
            Anonymity::FullAnonymous => false,
        }
}

/// Annotation carried in the `<x xmlns="…#user"/>` payload of a produced
/// presence.
#[derive(Debug, Clone)]
pub struct OccupantItem {
    /// Occupant affiliation.
    pub affiliation: Affiliation,
    /// Occupant role.
    pub role: Role,
    /// Occupant nickname.
    pub nick: Option<String>,
    /// Real JID, when the recipient may see it.
    pub jid: Option<String>,
}

/// Build an annotated presence addressed to one recipient session.
///
/// `base` is the occupant's (cloned) cached presence or a bare unavailable
/// presence; the `<x/>` payload with item, optional actor/reason and status
/// codes is appended.
#[allow(clippy::too_many_arguments)]
pub fn annotated_presence(
    mut base: Element,
    room: &BareJid,
    occupant_nick: &str,
    recipient: &FullJid,
    item: OccupantItem,
    actor: Option<&str>,
    reason: Option<&str>,
    codes: &[u16],
) -> Stanza {
    base.set_attr("from", format!("{room}/{occupant_nick}"));
    base.set_attr("to", recipient.to_string());

    let mut item_el = Element::new("item")
        .attr("affiliation", item.affiliation.as_str())
        .attr("role", item.role.as_str());
    if let Some(nick) = &item.nick {
        item_el.set_attr("nick", nick.clone());
    }
    if let Some(jid) = &item.jid {
        item_el.set_attr("jid", jid.clone());
    }

    let mut x = Element::new("x").attr("xmlns", ns::MUC_USER).child(item_el);
    if let Some(actor) = actor {
        x.push_child(Element::new("actor").attr("jid", actor));
    }
    if let Some(reason) = reason {
        x.push_child(Element::new("reason").text(reason));
    }
    for code in codes {
        x.push_child(Element::new("status").attr("code", code.to_string()));
    }
    base.push_child(x);

    Stanza::from_element(base)
}

/// An in-room system message (groupchat from the bare room JID) to every
/// session of one nickname.
pub fn system_messages(room: &BareJid, sessions: &[FullJid], text: &str) -> Vec<Stanza> {
    sessions
        .iter()
        .map(|session| {
            Stanza::message("groupchat")
                .with_from(room)
                .with_to(session)
                .with_child(Element::new("body").text(text))
        })
        .collect()
}
