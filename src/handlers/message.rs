//! Groupchat message routing: validation, filtering, history, broadcast.

use super::{helpers, Protocol, ServiceContext};
use crate::config::FeaturesConfig;
use crate::error::{MucError, ProtocolResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use muc_proto::{ns, Affiliation, Condition, Element, Role, Stanza, StanzaKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Payload split of an inbound groupchat message after content filtering.
#[derive(Debug, Default)]
struct FilteredContent {
    body: Option<String>,
    subject: Option<String>,
    delay_stamp: Option<String>,
    content: Vec<Element>,
}

/// Apply the message content filter.
///
/// Body and subject always pass. Chat states pass when enabled. Everything
/// else passes only when filtering is off or its namespace is explicitly
/// allowed. The inbound delay element is consumed, never forwarded as-is.
fn filter_content(features: &FeaturesConfig, message: &Element) -> FilteredContent {
    let mut filtered = FilteredContent::default();
    for child in message.children() {
        match child.name() {
            "delay" if child.xmlns() == Some(ns::DELAY) => {
                filtered.delay_stamp = child.get_attr("stamp").map(str::to_string);
            }
            "body" => {
                filtered.body = Some(child.cdata());
                filtered.content.push(child.clone());
            }
            "subject" => {
                filtered.subject = Some(child.cdata());
                filtered.content.push(child.clone());
            }
            _ if !features.message_filter_enabled => filtered.content.push(child.clone()),
            _ if features.chat_states_allowed && child.xmlns() == Some(ns::CHATSTATES) => {
                filtered.content.push(child.clone())
            }
            _ => {
                let allowed = child
                    .xmlns()
                    .is_some_and(|x| features.allowed_message_payloads.iter().any(|a| a == x));
                if allowed {
                    filtered.content.push(child.clone());
                }
            }
        }
    }
    filtered
}

/// Routes `type="groupchat"` messages.
pub struct MessageRoutingProtocol {
    ctx: Arc<ServiceContext>,
}

impl MessageRoutingProtocol {
    /// Create the handler.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Protocol for MessageRoutingProtocol {
    fn name(&self) -> &'static str {
        "groupchat"
    }

    fn matches(&self, stanza: &Stanza) -> bool {
        stanza.kind() == Some(StanzaKind::Message) && stanza.typ() == Some("groupchat")
    }

    async fn process(&self, stanza: &Stanza) -> ProtocolResult {
        let sender = helpers::sender_full(stanza)?;
        let room_jid = helpers::room_jid(stanza)?;
        if helpers::nickname_from_to(stanza).is_some() {
            return Err(MucError::rejected_text(
                Condition::BadRequest,
                "Groupchat message can't be addressed to occupant.",
            ));
        }

        let room = self
            .ctx
            .rooms
            .get_room(&room_jid)
            .ok_or_else(|| {
                MucError::rejected_text(Condition::ItemNotFound, "There is no such room.")
            })?;

        let strict = self.ctx.features.strict_message_authorization;
        let filtered = filter_content(&self.ctx.features, stanza.element());

        let mut outbound = Vec::new();
        let (nick, send_date, logging_enabled);

        {
            let mut st = room.lock();

            let Some(sender_nick) = st.nickname_of(&sender).map(str::to_string) else {
                return Err(MucError::rejected_text(
                    Condition::Forbidden,
                    "Only occupants may send groupchat messages.",
                ));
            };
            let role = st.role_of(&sender_nick);
            let affiliation = st.affiliation(sender.bare());

            if !role.can_send_messages_to_all()
                || (st.config().moderated && role == Role::Visitor)
            {
                if strict {
                    return Err(MucError::rejected_text(
                        Condition::Forbidden,
                        "Insufficient privileges to send groupchat message.",
                    ));
                }
                // Observed permissive contract: log the violation, deliver anyway.
                debug!(
                    room = %room_jid,
                    nick = %sender_nick,
                    %role,
                    "insufficient privileges to send groupchat message (permissive mode)"
                );
            }

            if let Some(subject) = &filtered.subject {
                let allowed = (st.config().change_subject && role == Role::Participant)
                    || role.can_modify_subject();
                if !allowed {
                    return Err(MucError::rejected_text(
                        Condition::Forbidden,
                        "Insufficient privileges to change subject.",
                    ));
                }
                st.set_subject(subject.clone(), sender_nick.clone());
            }

            // Owners may back-date via an inbound delay stamp.
            send_date = filtered
                .delay_stamp
                .as_deref()
                .filter(|_| affiliation == Affiliation::Owner)
                .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            let mut base = Element::new("message").attr("type", "groupchat");
            if let Some(id) = stanza.id() {
                base.set_attr("id", id);
            }
            for child in &filtered.content {
                base.push_child(child.clone());
            }
            base.push_child(
                Element::new("delay")
                    .attr("xmlns", ns::DELAY)
                    .attr("stamp", send_date.to_rfc3339()),
            );

            let from = format!("{room_jid}/{sender_nick}");
            for (occ_nick, occupant) in st.occupants() {
                if occupant.is_placeholder() {
                    continue;
                }
                let receives = occupant.role().can_receive_messages();
                if !receives {
                    debug!(room = %room_jid, nick = occ_nick, "occupant role cannot receive");
                    if strict {
                        continue;
                    }
                    // Permissive mode delivers regardless.
                }
                for session in occupant.sessions() {
                    let mut copy = base.clone();
                    copy.set_attr("from", from.clone());
                    copy.set_attr("to", session.to_string());
                    outbound.push(Stanza::from_element(copy));
                }
            }

            nick = sender_nick;
            logging_enabled = st.config().logging_enabled;
        }

        // History and logging are best-effort; failures never block delivery.
        if let Some(body) = &filtered.body {
            let record = outbound
                .first()
                .map(|s| s.element().clone())
                .unwrap_or_else(|| Element::new("message"));
            if let Err(err) = self
                .ctx
                .history
                .add_message(&room_jid, &record, body, &sender, &nick, send_date)
                .await
            {
                warn!(room = %room_jid, error = %err, "recording message failed");
            }
            if logging_enabled {
                if let Some(logger) = &self.ctx.logger {
                    if let Err(err) = logger
                        .add_message(&room_jid, body, &sender, &nick, send_date)
                        .await
                    {
                        warn!(room = %room_jid, error = %err, "logging message failed");
                    }
                }
            }
        }
        if let Some(subject) = &filtered.subject {
            if let Err(err) = self
                .ctx
                .history
                .add_subject_change(&room_jid, subject, &sender, &nick, send_date)
                .await
            {
                warn!(room = %room_jid, error = %err, "recording subject change failed");
            }
            if logging_enabled {
                if let Some(logger) = &self.ctx.logger {
                    if let Err(err) = logger
                        .add_subject_change(&room_jid, subject, &sender, &nick, send_date)
                        .await
                    {
                        warn!(room = %room_jid, error = %err, "logging subject change failed");
                    }
                }
            }
        }

        Ok(outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(filter: bool, chat_states: bool) -> FeaturesConfig {
        FeaturesConfig {
            message_filter_enabled: filter,
            chat_states_allowed: chat_states,
            ..FeaturesConfig::default()
        }
    }

    fn message_with(children: Vec<Element>) -> Element {
        let mut el = Element::new("message").attr("type", "groupchat");
        for child in children {
            el.push_child(child);
        }
        el
    }

    #[test]
    fn body_and_subject_always_pass() {
        let msg = message_with(vec![
            Element::new("body").text("hi"),
            Element::new("subject").text("fish"),
        ]);
        let filtered = filter_content(&features(true, false), &msg);
        assert_eq!(filtered.body.as_deref(), Some("hi"));
        assert_eq!(filtered.subject.as_deref(), Some("fish"));
        assert_eq!(filtered.content.len(), 2);
    }

    #[test]
    fn unknown_payloads_are_stripped_when_filtering() {
        let msg = message_with(vec![
            Element::new("body").text("hi"),
            Element::new("html").attr("xmlns", "http://jabber.org/protocol/xhtml-im"),
        ]);
        assert_eq!(filter_content(&features(true, false), &msg).content.len(), 1);
        assert_eq!(filter_content(&features(false, false), &msg).content.len(), 2);
    }

    #[test]
    fn chat_states_pass_only_when_enabled() {
        let msg = message_with(vec![Element::new("composing").attr("xmlns", ns::CHATSTATES)]);
        assert!(filter_content(&features(true, false), &msg).content.is_empty());
        assert_eq!(filter_content(&features(true, true), &msg).content.len(), 1);
    }

    #[test]
    fn allowed_namespaces_pass_the_filter() {
        let mut f = features(true, false);
        f.allowed_message_payloads = vec![ns::CAPS.to_string()];
        let msg = message_with(vec![Element::new("c").attr("xmlns", ns::CAPS)]);
        assert_eq!(filter_content(&f, &msg).content.len(), 1);
    }

    #[test]
    fn inbound_delay_is_consumed_not_forwarded() {
        let msg = message_with(vec![Element::new("delay")
            .attr("xmlns", ns::DELAY)
            .attr("stamp", "2024-05-01T10:00:00Z")]);
        let filtered = filter_content(&features(false, false), &msg);
        assert_eq!(filtered.delay_stamp.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert!(filtered.content.is_empty());
    }
}
