//! mucd — Multi-User Chat component protocol engine.
//!
//! The room state machine and its protocol handlers: presence-based
//! enter/leave, groupchat message routing, moderation and mediated
//! invitations. Transport, persistence and discovery live outside and are
//! consumed through the traits in [`delivery`] and [`history`].

pub mod component;
pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod history;
pub mod state;

pub use component::MucComponent;
pub use error::{MucError, ProtocolResult};
