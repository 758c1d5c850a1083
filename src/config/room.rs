//! Per-room configuration.

use muc_proto::Affiliation;
use serde::Deserialize;

/// Occupant JID visibility level of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anonymity {
    /// Every occupant sees real JIDs.
    NonAnonymous,
    /// Only admins and owners see real JIDs.
    SemiAnonymous,
    /// Nobody sees real JIDs.
    FullAnonymous,
}

/// Configuration of a single room.
///
/// A copy of the registry's default room config seeds every new room; the
/// room-configuration surface (out of scope here) mutates it afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    /// JID visibility level.
    #[serde(default = "default_anonymity")]
    pub anonymity: Anonymity,

    /// Only members may enter.
    #[serde(default)]
    pub members_only: bool,

    /// Unaffiliated occupants enter as visitors and need voice to speak.
    #[serde(default)]
    pub moderated: bool,

    /// Entering requires the room password.
    #[serde(default)]
    pub password_protected: bool,

    /// The room password, when protected.
    #[serde(default)]
    pub password: Option<String>,

    /// The room survives losing its last occupant.
    #[serde(default)]
    pub persistent: bool,

    /// Join/leave/message events go to the room logger.
    #[serde(default)]
    pub logging_enabled: bool,

    /// Participants may change the subject.
    #[serde(default = "default_true")]
    pub change_subject: bool,

    /// Restrict presence distribution to the affiliations below.
    #[serde(default)]
    pub presence_filter_enabled: bool,

    /// Affiliations whose presence is distributed when filtering is on.
    #[serde(default)]
    pub presence_filtered_affiliations: Vec<String>,
}

impl RoomConfig {
    /// Whether `affiliation` is in the presence-filter set.
    pub fn presence_filter_contains(&self, affiliation: Affiliation) -> bool {
        self.presence_filtered_affiliations
            .iter()
            .any(|a| a.parse() == Ok(affiliation))
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            anonymity: default_anonymity(),
            members_only: false,
            moderated: false,
            password_protected: false,
            password: None,
            persistent: false,
            logging_enabled: false,
            change_subject: true,
            presence_filter_enabled: false,
            presence_filtered_affiliations: Vec::new(),
        }
    }
}

fn default_anonymity() -> Anonymity {
    Anonymity::SemiAnonymous
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_room_is_open_and_semi_anonymous() {
        let config = RoomConfig::default();
        assert_eq!(config.anonymity, Anonymity::SemiAnonymous);
        assert!(!config.members_only);
        assert!(!config.moderated);
        assert!(!config.persistent);
        assert!(config.change_subject);
    }

    #[test]
    fn presence_filter_set_parses_affiliations() {
        let config = RoomConfig {
            presence_filter_enabled: true,
            presence_filtered_affiliations: vec!["owner".into(), "admin".into()],
            ..RoomConfig::default()
        };
        assert!(config.presence_filter_contains(Affiliation::Owner));
        assert!(!config.presence_filter_contains(Affiliation::Member));
    }

    #[test]
    fn deserializes_anonymity_names() {
        let config: RoomConfig = toml::from_str(
            r#"
            anonymity = "non_anonymous"
            members_only = true
            "#,
        )
        .unwrap();
        assert_eq!(config.anonymity, Anonymity::NonAnonymous);
        assert!(config.members_only);
    }
}
