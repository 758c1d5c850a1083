//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use super::room::RoomConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Component configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Service identity.
    pub service: ServiceConfig,
    /// Protocol feature toggles.
    #[serde(default)]
    pub features: FeaturesConfig,
    /// Deferred delivery pacing.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// History retention.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Configuration applied to newly created rooms.
    #[serde(default)]
    pub default_room: RoomConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Component domain (e.g., "conference.example.org").
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Number of stanza-processing workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            workers: default_workers(),
        }
    }
}

fn default_service_name() -> String {
    "conference.localhost".to_string()
}

fn default_workers() -> usize {
    8
}

/// Protocol feature toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Strip unknown payload elements from groupchat messages.
    #[serde(default = "default_true")]
    pub message_filter_enabled: bool,

    /// Let chat-state notifications pass the message filter.
    #[serde(default)]
    pub chat_states_allowed: bool,

    /// Strip non-availability children from cached/broadcast presences.
    #[serde(default)]
    pub presence_filter_enabled: bool,

    /// Allow several concurrent sessions of one bare JID under one nickname.
    #[serde(default = "default_true")]
    pub multi_item_allowed: bool,

    /// Lock newly created rooms until their first configuration completes.
    ///
    /// Canonical key. The deprecated alias `new_room_locked` is honored when
    /// this key is absent; when both are present this key wins.
    #[serde(default)]
    pub lock_new_rooms: Option<bool>,

    /// Deprecated alias for `lock_new_rooms`.
    #[serde(default)]
    pub new_room_locked: Option<bool>,

    /// Reject (instead of just logging) groupchat messages from senders
    /// whose role may not send to all, and enforce receive gating on fan-out.
    #[serde(default)]
    pub strict_message_authorization: bool,

    /// Extra payload namespaces allowed through the message filter.
    #[serde(default)]
    pub allowed_message_payloads: Vec<String>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            message_filter_enabled: true,
            chat_states_allowed: false,
            presence_filter_enabled: false,
            multi_item_allowed: true,
            lock_new_rooms: None,
            new_room_locked: None,
            strict_message_authorization: false,
            allowed_message_payloads: Vec::new(),
        }
    }
}

impl FeaturesConfig {
    /// Resolve the lock policy for newly created rooms.
    ///
    /// `lock_new_rooms` is canonical; `new_room_locked` is a deprecated
    /// alias. When both are set the canonical key wins and the conflict is
    /// logged. Default: locked.
    pub fn lock_new_rooms(&self) -> bool {
        match (self.lock_new_rooms, self.new_room_locked) {
            (Some(canonical), Some(alias)) => {
                if canonical != alias {
                    warn!(
                        lock_new_rooms = canonical,
                        new_room_locked = alias,
                        "both lock-policy keys set; using lock_new_rooms"
                    );
                }
                canonical
            }
            (Some(canonical), None) => canonical,
            (None, Some(alias)) => {
                warn!("new_room_locked is deprecated; use lock_new_rooms");
                alias
            }
            (None, None) => true,
        }
    }
}

/// Deferred delivery pacing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Milliseconds to sleep between batch drains.
    #[serde(default = "default_delivery_interval_ms")]
    pub interval_ms: u64,
    /// Queue capacity; producers are backpressured beyond this.
    #[serde(default = "default_delivery_capacity")]
    pub capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_delivery_interval_ms(),
            capacity: default_delivery_capacity(),
        }
    }
}

fn default_delivery_interval_ms() -> u64 {
    550
}

fn default_delivery_capacity() -> usize {
    1024
}

/// History retention configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Messages kept per room by the in-memory provider.
    #[serde(default = "default_history_max_messages")]
    pub max_messages: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_history_max_messages(),
        }
    }
}

fn default_history_max_messages() -> usize {
    100
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_contract() {
        let config = Config::default();
        assert!(config.features.message_filter_enabled);
        assert!(!config.features.chat_states_allowed);
        assert!(!config.features.presence_filter_enabled);
        assert!(config.features.multi_item_allowed);
        assert!(config.features.lock_new_rooms());
        assert!(!config.features.strict_message_authorization);
        assert_eq!(config.delivery.interval_ms, 550);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mucd.toml");
        std::fs::write(
            &path,
            r#"
            [service]
            name = "conference.example.org"
            workers = 4

            [default_room]
            persistent = true
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.service.workers, 4);
        assert!(config.default_room.persistent);
        assert!(Config::load(dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [service]
            name = "conference.example.org"
            "#,
        )
        .unwrap();
        assert_eq!(config.service.name, "conference.example.org");
        assert_eq!(config.service.workers, 8);
        assert!(config.features.lock_new_rooms());
    }

    #[test]
    fn canonical_lock_key_wins_over_alias() {
        let config: Config = toml::from_str(
            r#"
            [service]
            name = "muc.example.org"

            [features]
            lock_new_rooms = false
            new_room_locked = true
            "#,
        )
        .unwrap();
        assert!(!config.features.lock_new_rooms());
    }

    #[test]
    fn alias_is_honored_when_canonical_absent() {
        let config: Config = toml::from_str(
            r#"
            [service]
            name = "muc.example.org"

            [features]
            new_room_locked = false
            "#,
        )
        .unwrap();
        assert!(!config.features.lock_new_rooms());
    }
}
