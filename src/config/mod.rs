//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Component config struct definitions (Config, ServiceConfig,
//!   FeaturesConfig, DeliveryConfig, HistoryConfig)
//! - [`room`]: Per-room configuration (RoomConfig, Anonymity)

mod room;
mod types;

pub use room::{Anonymity, RoomConfig};
pub use types::{Config, ConfigError, DeliveryConfig, FeaturesConfig, HistoryConfig, ServiceConfig};
