//! XML namespace URIs used by the MUC protocol.

/// Client-addressed enter requests: `<x xmlns="…/muc"/>` on presence.
pub const MUC: &str = "http://jabber.org/protocol/muc";

/// Occupant-facing extension payloads: items, status codes, invites.
pub const MUC_USER: &str = "http://jabber.org/protocol/muc#user";

/// Admin queries: role/affiliation get and set.
pub const MUC_ADMIN: &str = "http://jabber.org/protocol/muc#admin";

/// Delayed delivery stamps (XEP-0203).
pub const DELAY: &str = "urn:xmpp:delay";

/// Legacy delayed delivery stamps (XEP-0091).
pub const LEGACY_DELAY: &str = "jabber:x:delay";

/// Chat state notifications (XEP-0085).
pub const CHATSTATES: &str = "http://jabber.org/protocol/chatstates";

/// Entity capabilities (XEP-0115).
pub const CAPS: &str = "http://jabber.org/protocol/caps";

/// Stanza error condition elements (RFC 6120).
pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
