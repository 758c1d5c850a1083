//! # muc-proto
//!
//! Protocol vocabulary for an XMPP Multi-User Chat (XEP-0045) component.
//!
//! This crate holds everything the MUC engine needs to *talk about* stanzas
//! without owning a wire codec: inbound stanzas are assumed to be decoded by
//! the surrounding component framework and arrive as [`Element`] trees.
//!
//! ## Contents
//!
//! - [`Jid`], [`BareJid`], [`FullJid`] — address types
//! - [`Element`] — a small XML element tree with a builder API and serializer
//! - [`Stanza`] — presence/message/iq accessors and constructors over `Element`
//! - [`Affiliation`], [`Role`] — the XEP-0045 privilege vocabulary, with the
//!   capability predicates the permission matrices are built from
//! - [`Condition`] — XMPP stanza error conditions and their error types
//! - [`ns`], [`status`] — namespace URIs and MUC status codes

#![deny(clippy::all)]
#![warn(missing_docs)]

mod affiliation;
mod element;
mod error;
mod jid;
mod role;
mod stanza;

pub mod ns;
pub mod status;

pub use affiliation::Affiliation;
pub use element::Element;
pub use error::Condition;
pub use jid::{BareJid, FullJid, Jid, JidError};
pub use role::Role;
pub use stanza::{Stanza, StanzaKind};
