//! MUC status codes carried in `<status code="…"/>` children of
//! `<x xmlns="…#user"/>` payloads (XEP-0045 registrar).

/// Occupant JIDs are visible to anyone (non-anonymous room).
pub const NON_ANONYMOUS: u16 = 100;

/// This presence refers to the recipient itself.
pub const SELF_PRESENCE: u16 = 110;

/// Room logging is enabled.
pub const LOGGING_ENABLED: u16 = 170;

/// The room was created by this request.
pub const ROOM_CREATED: u16 = 201;

/// The occupant was banned (affiliation changed to outcast).
pub const BANNED: u16 = 301;

/// The occupant's nickname changed.
pub const NICK_CHANGED: u16 = 303;

/// The occupant was kicked (role changed to none).
pub const KICKED: u16 = 307;
