//! Session-scoped occupant privilege level.

use std::fmt;
use std::str::FromStr;

/// Role of an occupant while present in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Moderates the room: may kick, grant/revoke voice, change the subject.
    Moderator,
    /// Full participant: may send messages to all occupants.
    Participant,
    /// May observe and receive messages only.
    Visitor,
    /// Not an occupant.
    None,
}

impl Role {
    /// May send groupchat messages to all occupants.
    pub fn can_send_messages_to_all(&self) -> bool {
        matches!(self, Self::Moderator | Self::Participant)
    }

    /// Receives groupchat messages.
    pub fn can_receive_messages(&self) -> bool {
        matches!(self, Self::Moderator | Self::Participant | Self::Visitor)
    }

    /// May change the room subject regardless of room configuration.
    pub fn can_modify_subject(&self) -> bool {
        matches!(self, Self::Moderator)
    }

    /// May kick participants and visitors.
    pub fn can_kick_participants_and_visitors(&self) -> bool {
        matches!(self, Self::Moderator)
    }

    /// May grant voice (role participant).
    pub fn can_grant_voice(&self) -> bool {
        matches!(self, Self::Moderator)
    }

    /// May revoke voice (role visitor).
    pub fn can_revoke_voice(&self) -> bool {
        matches!(self, Self::Moderator)
    }

    /// May invite other users to the room.
    pub fn can_invite_other_users(&self) -> bool {
        matches!(self, Self::Moderator | Self::Participant)
    }

    /// The wire representation (`role` attribute value).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moderator => "moderator",
            Self::Participant => "participant",
            Self::Visitor => "visitor",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moderator" => Ok(Self::Moderator),
            "participant" => Ok(Self::Participant),
            "visitor" => Ok(Self::Visitor),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_receive_privileges() {
        assert!(Role::Participant.can_send_messages_to_all());
        assert!(!Role::Visitor.can_send_messages_to_all());
        assert!(Role::Visitor.can_receive_messages());
        assert!(!Role::None.can_receive_messages());
    }

    #[test]
    fn moderator_only_privileges() {
        for check in [
            Role::can_modify_subject,
            Role::can_kick_participants_and_visitors,
            Role::can_grant_voice,
            Role::can_revoke_voice,
        ] {
            assert!(check(&Role::Moderator));
            assert!(!check(&Role::Participant));
            assert!(!check(&Role::Visitor));
        }
    }

    #[test]
    fn wire_round_trip() {
        for r in [Role::Moderator, Role::Participant, Role::Visitor, Role::None] {
            assert_eq!(r.as_str().parse::<Role>(), Ok(r));
        }
        assert!("lurker".parse::<Role>().is_err());
    }
}
