//! Test fixture: an assembled component with a collected outbound sink.

#![allow(dead_code)]

use muc_proto::{ns, BareJid, Element, Stanza};
use mucd::config::Config;
use mucd::delivery::ChannelWriter;
use mucd::history::MemoryHistory;
use mucd::MucComponent;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const ROOM: &str = "lounge@conference.localhost";

/// The component plus the channel its outbound stanzas land on.
pub struct TestService {
    pub component: MucComponent,
    pub history: Arc<MemoryHistory>,
    outbound: mpsc::UnboundedReceiver<Stanza>,
}

impl TestService {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::default();
        tweak(&mut config);
        let history = Arc::new(MemoryHistory::new(config.history.max_messages));
        let (writer, outbound) = ChannelWriter::new();
        let component =
            MucComponent::new(&config, history.clone(), None, Arc::new(writer)).unwrap();
        Self {
            component,
            history,
            outbound,
        }
    }

    /// Dispatch a stanza inline and return everything written for it.
    pub async fn send(&mut self, stanza: Stanza) -> Vec<Stanza> {
        self.component.handle(stanza).await;
        self.drain()
    }

    /// Collect whatever has reached the sink so far.
    pub fn drain(&mut self) -> Vec<Stanza> {
        let mut out = Vec::new();
        while let Ok(stanza) = self.outbound.try_recv() {
            out.push(stanza);
        }
        out
    }

    /// Let the paced delivery worker run its drains (requires a paused
    /// tokio clock) and collect what it wrote.
    pub async fn drain_deferred(&mut self) -> Vec<Stanza> {
        let mut out = Vec::new();
        for _ in 0..3 {
            tokio::task::yield_now().await;
            tokio::time::advance(std::time::Duration::from_millis(600)).await;
            tokio::task::yield_now().await;
            out.extend(self.drain());
        }
        out
    }

    pub fn room(&self) -> Arc<mucd::state::Room> {
        self.component
            .context()
            .rooms
            .get_room(&room_jid())
            .expect("room should exist")
    }

    /// Complete the room's initial configuration (the configuration surface
    /// itself is outside this engine).
    pub fn unlock_room(&self) {
        self.room().lock().unlock();
    }
}

pub fn room_jid() -> BareJid {
    ROOM.parse().unwrap()
}

/// An enter request: presence to `room/nick` with the enter payload.
pub fn join(from: &str, nick: &str) -> Stanza {
    Stanza::presence()
        .with_from(from)
        .with_to(format!("{ROOM}/{nick}"))
        .with_child(Element::new("x").attr("xmlns", ns::MUC))
}

pub fn join_with_password(from: &str, nick: &str, password: &str) -> Stanza {
    Stanza::presence().with_from(from).with_to(format!("{ROOM}/{nick}")).with_child(
        Element::new("x")
            .attr("xmlns", ns::MUC)
            .child(Element::new("password").text(password)),
    )
}

pub fn leave(from: &str, nick: &str) -> Stanza {
    Stanza::presence_unavailable()
        .with_from(from)
        .with_to(format!("{ROOM}/{nick}"))
}

pub fn groupchat(from: &str, body: &str) -> Stanza {
    Stanza::message("groupchat")
        .with_from(from)
        .with_to(ROOM)
        .with_child(Element::new("body").text(body))
}

pub fn subject_change(from: &str, subject: &str) -> Stanza {
    Stanza::message("groupchat")
        .with_from(from)
        .with_to(ROOM)
        .with_child(Element::new("subject").text(subject))
}

pub fn admin_set(from: &str, items: Vec<Element>) -> Stanza {
    let mut query = Element::new("query").attr("xmlns", ns::MUC_ADMIN);
    for item in items {
        query.push_child(item);
    }
    Stanza::iq("set")
        .with_from(from)
        .with_to(ROOM)
        .with_id("mod1")
        .with_child(query)
}

pub fn admin_get(from: &str, item: Element) -> Stanza {
    Stanza::iq("get")
        .with_from(from)
        .with_to(ROOM)
        .with_id("query1")
        .with_child(Element::new("query").attr("xmlns", ns::MUC_ADMIN).child(item))
}

pub fn invite(from: &str, invitee: &str) -> Stanza {
    Stanza::from_element(Element::new("message"))
        .with_from(from)
        .with_to(ROOM)
        .with_child(
            Element::new("x")
                .attr("xmlns", ns::MUC_USER)
                .child(Element::new("invite").attr("to", invitee)),
        )
}

/// Status codes carried by a produced presence.
pub fn status_codes(stanza: &Stanza) -> Vec<u16> {
    stanza
        .find_child_ns("x", ns::MUC_USER)
        .map(|x| {
            x.children()
                .filter(|c| c.name() == "status")
                .filter_map(|c| c.get_attr("code").and_then(|v| v.parse().ok()))
                .collect()
        })
        .unwrap_or_default()
}

/// The `<item/>` of a produced presence.
pub fn muc_user_item(stanza: &Stanza) -> Option<&Element> {
    stanza.find_child_ns("x", ns::MUC_USER).and_then(|x| x.find_child("item"))
}

/// Stanzas addressed to one JID.
pub fn addressed_to<'a>(stanzas: &'a [Stanza], to: &str) -> Vec<&'a Stanza> {
    stanzas.iter().filter(|s| s.get_attr("to") == Some(to)).collect()
}

/// The defined condition of an error reply.
pub fn error_condition(stanza: &Stanza) -> Option<String> {
    stanza.error_condition().map(str::to_string)
}
