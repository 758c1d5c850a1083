//! Stanza accessors and constructors over [`Element`].
//!
//! A [`Stanza`] is an element whose name is one of `presence`, `message` or
//! `iq`, with typed access to the routing attributes and helpers for the
//! reply shapes the engine produces.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use crate::element::Element;
use crate::error::Condition;
use crate::jid::Jid;
use crate::ns;

/// The three stanza kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaKind {
    /// `<presence/>`
    Presence,
    /// `<message/>`
    Message,
    /// `<iq/>`
    Iq,
}

/// A stanza: an [`Element`] with routing attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    root: Element,
}

impl Stanza {
    /// Wrap an already-decoded element.
    pub fn from_element(root: Element) -> Self {
        Self { root }
    }

    /// A fresh `<presence/>` stanza.
    pub fn presence() -> Self {
        Self::from_element(Element::new("presence"))
    }

    /// A fresh `<presence type="unavailable"/>` stanza.
    pub fn presence_unavailable() -> Self {
        Self::from_element(Element::new("presence").attr("type", "unavailable"))
    }

    /// A fresh `<message/>` stanza with the given `type`.
    pub fn message(typ: &str) -> Self {
        Self::from_element(Element::new("message").attr("type", typ))
    }

    /// A fresh `<iq/>` stanza with the given `type`.
    pub fn iq(typ: &str) -> Self {
        Self::from_element(Element::new("iq").attr("type", typ))
    }

    /// The stanza kind, if the element name is one of the three.
    pub fn kind(&self) -> Option<StanzaKind> {
        match self.root.name() {
            "presence" => Some(StanzaKind::Presence),
            "message" => Some(StanzaKind::Message),
            "iq" => Some(StanzaKind::Iq),
            _ => None,
        }
    }

    /// The underlying element.
    pub fn element(&self) -> &Element {
        &self.root
    }

    /// Unwrap into the underlying element.
    pub fn into_element(self) -> Element {
        self.root
    }

    /// Parsed `from` attribute.
    pub fn from_jid(&self) -> Option<Jid> {
        self.root.get_attr("from").and_then(|s| Jid::from_str(s).ok())
    }

    /// Parsed `to` attribute.
    pub fn to_jid(&self) -> Option<Jid> {
        self.root.get_attr("to").and_then(|s| Jid::from_str(s).ok())
    }

    /// The `type` attribute.
    pub fn typ(&self) -> Option<&str> {
        self.root.get_attr("type")
    }

    /// The `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.root.get_attr("id")
    }

    /// Builder: set the `from` attribute.
    pub fn with_from(mut self, from: impl ToString) -> Self {
        self.root.set_attr("from", from.to_string());
        self
    }

    /// Builder: set the `to` attribute.
    pub fn with_to(mut self, to: impl ToString) -> Self {
        self.root.set_attr("to", to.to_string());
        self
    }

    /// Builder: set the `id` attribute.
    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.root.set_attr("id", id.to_string());
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.root.push_child(child);
        self
    }

    /// Build an error reply to this stanza.
    ///
    /// The reply echoes the original payload with `from`/`to` swapped,
    /// `type="error"` and an `<error/>` child carrying the defined condition
    /// and optional human-readable text.
    pub fn error_reply(&self, condition: Condition, text: Option<&str>) -> Stanza {
        let mut reply = self.root.clone();

        let from = self.root.get_attr("to").map(str::to_string);
        let to = self.root.get_attr("from").map(str::to_string);
        reply.remove_attr("from");
        reply.remove_attr("to");
        if let Some(from) = from {
            reply.set_attr("from", from);
        }
        if let Some(to) = to {
            reply.set_attr("to", to);
        }
        reply.set_attr("type", "error");

        let mut error = Element::new("error").attr("type", condition.error_type());
        error.push_child(Element::new(condition.element_name()).attr("xmlns", ns::STANZAS));
        if let Some(text) = text {
            error.push_child(Element::new("text").attr("xmlns", ns::STANZAS).text(text));
        }
        reply.push_child(error);

        Stanza::from_element(reply)
    }

    /// Build an empty `<iq type="result"/>` reply to this stanza.
    pub fn result_iq(&self) -> Stanza {
        let mut reply = Stanza::iq("result");
        if let Some(to) = self.root.get_attr("to") {
            reply = reply.with_from(to);
        }
        if let Some(from) = self.root.get_attr("from") {
            reply = reply.with_to(from);
        }
        if let Some(id) = self.root.get_attr("id") {
            reply = reply.with_id(id);
        }
        reply
    }

    /// The defined condition of an `<error/>` child, if present.
    ///
    /// Used when relaying bounced invitations: the condition name becomes
    /// human-readable reason text.
    pub fn error_condition(&self) -> Option<&str> {
        let error = self.root.find_child("error")?;
        error
            .children()
            .find(|c| c.xmlns() == Some(ns::STANZAS) && c.name() != "text")
            .or_else(|| error.children().next())
            .map(Element::name)
    }
}

impl Deref for Stanza {
    type Target = Element;

    fn deref(&self) -> &Element {
        &self.root
    }
}

impl DerefMut for Stanza {
    fn deref_mut(&mut self) -> &mut Element {
        &mut self.root
    }
}

impl fmt::Display for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}
