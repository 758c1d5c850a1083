//! Mediated invitations: invite, decline and bounced-invite relay.

use super::{helpers, Protocol, ServiceContext};
use crate::error::{MucError, ProtocolResult};
use crate::state::default_role;
use async_trait::async_trait;
use muc_proto::{ns, Affiliation, BareJid, Condition, Element, FullJid, Jid, Stanza, StanzaKind};
use std::sync::Arc;
use tracing::{debug, info};

/// Handles `<message/>` stanzas carrying a `…#user` invite or decline.
pub struct InvitationProtocol {
    ctx: Arc<ServiceContext>,
}

impl InvitationProtocol {
    /// Create the handler.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    fn do_invite(
        &self,
        stanza: &Stanza,
        invite: &Element,
        room_jid: &BareJid,
        sender: &FullJid,
    ) -> ProtocolResult {
        let room = self
            .ctx
            .rooms
            .get_room(room_jid)
            .ok_or_else(|| MucError::rejected(Condition::ItemNotFound))?;

        let recipient: Jid = invite
            .get_attr("to")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| MucError::rejected(Condition::BadRequest))?;

        let password;
        {
            let mut st = room.lock();

            let sender_role = st
                .nickname_of(sender)
                .map(|nick| st.role_of(nick))
                .unwrap_or(muc_proto::Role::None);
            let sender_affiliation = st.affiliation(sender.bare());

            if !sender_role.can_invite_other_users() {
                return Err(MucError::rejected(Condition::NotAllowed));
            }
            if st.config().members_only && !sender_affiliation.can_edit_member_list() {
                return Err(MucError::rejected(Condition::Forbidden));
            }

            info!(room = %room_jid, inviter = %sender, invitee = %recipient, "mediated invite");

            // Bookkeeping: the invitee is provisionally known to the room.
            // The placeholder holds no sessions, so it neither blocks
            // eviction nor collides with a live nickname binding.
            let invitee_role = default_role(st.config(), Affiliation::Member);
            st.add_placeholder(&recipient.to_string(), recipient.to_bare(), invitee_role);

            if st.config().members_only && sender_affiliation.can_edit_member_list() {
                st.set_affiliation(&recipient.to_bare(), Affiliation::Member);
            }

            password = st
                .config()
                .password_protected
                .then(|| st.config().password.clone())
                .flatten();
        }

        let mut forwarded = Element::new("invite").attr("from", sender.to_string());
        if let Some(reason) = invite.find_child("reason") {
            forwarded.push_child(reason.clone());
        }
        if let Some(cont) = invite.find_child("continue") {
            forwarded.push_child(cont.clone());
        }

        let mut payload = Element::new("x").attr("xmlns", ns::MUC_USER).child(forwarded);
        if let Some(password) = password {
            payload.push_child(Element::new("password").text(password));
        }

        let mut message = Stanza::from_element(Element::new("message"))
            .with_from(room_jid)
            .with_to(&recipient)
            .with_child(payload);
        if let Some(body) = stanza.find_child("body") {
            message.push_child(body.clone());
        }

        Ok(vec![message])
    }

    fn do_decline(
        &self,
        decline: &Element,
        room_jid: &BareJid,
        sender: &FullJid,
    ) -> ProtocolResult {
        if self.ctx.rooms.get_room(room_jid).is_none() {
            return Err(MucError::rejected(Condition::ItemNotFound));
        }

        let recipient = decline
            .get_attr("to")
            .ok_or_else(|| MucError::rejected(Condition::BadRequest))?;

        debug!(room = %room_jid, decliner = %sender, inviter = recipient, "invite declined");

        let mut relayed = Element::new("decline").attr("from", sender.to_string());
        if let Some(reason) = decline.find_child("reason") {
            relayed.push_child(reason.clone());
        }

        let message = Stanza::from_element(Element::new("message"))
            .with_from(room_jid)
            .with_to(recipient)
            .with_child(Element::new("x").attr("xmlns", ns::MUC_USER).child(relayed));

        Ok(vec![message])
    }

    /// A forwarded invite bounced with an error: relay it to the original
    /// inviter as a decline whose reason names the error condition.
    fn relay_bounce(
        &self,
        stanza: &Stanza,
        invite: &Element,
        room_jid: &BareJid,
        sender: &FullJid,
    ) -> ProtocolResult {
        let Some(inviter) = invite.get_attr("from") else {
            debug!(room = %room_jid, "bounced invite without inviter address");
            return Ok(Vec::new());
        };

        let reason = match stanza.error_condition() {
            Some(condition) => format!("Your invitation is returned with error: {condition}"),
            None => "Your invitation is returned with error.".to_string(),
        };

        let decline = Element::new("decline")
            .attr("from", sender.to_string())
            .child(Element::new("reason").text(reason));

        let message = Stanza::from_element(Element::new("message"))
            .with_from(room_jid)
            .with_to(inviter)
            .with_child(Element::new("x").attr("xmlns", ns::MUC_USER).child(decline));

        Ok(vec![message])
    }
}

#[async_trait]
impl Protocol for InvitationProtocol {
    fn name(&self) -> &'static str {
        "invitations"
    }

    fn matches(&self, stanza: &Stanza) -> bool {
        stanza.kind() == Some(StanzaKind::Message)
            && stanza
                .find_child_ns("x", ns::MUC_USER)
                .is_some_and(|x| {
                    x.find_child("invite").is_some() || x.find_child("decline").is_some()
                })
    }

    async fn process(&self, stanza: &Stanza) -> ProtocolResult {
        let sender = helpers::sender_full(stanza)?;
        if helpers::nickname_from_to(stanza).is_some() {
            return Err(MucError::rejected(Condition::BadRequest));
        }
        let room_jid = helpers::room_jid(stanza)?;

        let x = stanza
            .find_child_ns("x", ns::MUC_USER)
            .ok_or_else(|| MucError::rejected(Condition::BadRequest))?;
        let is_error = stanza.typ() == Some("error");

        let mut outbound = Vec::new();
        for child in x.children() {
            let result = match child.name() {
                "invite" if is_error => self.relay_bounce(stanza, child, &room_jid, &sender)?,
                "invite" => self.do_invite(stanza, child, &room_jid, &sender)?,
                "decline" if !is_error => self.do_decline(child, &room_jid, &sender)?,
                _ => Vec::new(),
            };
            outbound.extend(result);
        }
        Ok(outbound)
    }
}
