//! Long-lived room membership status.

use std::fmt;
use std::str::FromStr;

/// Affiliation of a bare JID with a room, independent of presence.
///
/// Ordered by [`weight`](Affiliation::weight); the moderation permission
/// matrix compares sender and target weights before allowing a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affiliation {
    /// Room owner.
    Owner,
    /// Room administrator.
    Admin,
    /// Registered member.
    Member,
    /// No affiliation.
    None,
    /// Banned from the room.
    Outcast,
}

impl Affiliation {
    /// Ordering weight: outcast < none < member < admin < owner.
    pub fn weight(&self) -> i32 {
        match self {
            Self::Outcast => 0,
            Self::None => 10,
            Self::Member => 20,
            Self::Admin => 30,
            Self::Owner => 40,
        }
    }

    /// May enter a room that is not members-only.
    pub fn can_enter_open_room(&self) -> bool {
        !matches!(self, Self::Outcast)
    }

    /// May enter a members-only room.
    pub fn can_enter_members_only_room(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Member)
    }

    /// Sees real occupant JIDs in a semi-anonymous room.
    pub fn can_view_occupants_jid(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// May edit the member list.
    pub fn can_edit_member_list(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// May edit the admin list.
    pub fn can_edit_admin_list(&self) -> bool {
        matches!(self, Self::Owner)
    }

    /// May edit the owner list.
    pub fn can_edit_owner_list(&self) -> bool {
        matches!(self, Self::Owner)
    }

    /// May edit the moderator list.
    pub fn can_edit_moderator_list(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// May ban members and unaffiliated occupants.
    pub fn can_ban_members_and_unaffiliated(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// The wire representation (`affiliation` attribute value).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::None => "none",
            Self::Outcast => "outcast",
        }
    }
}

impl fmt::Display for Affiliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Affiliation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "none" => Ok(Self::None),
            "outcast" => Ok(Self::Outcast),
            _ => Err(()),
        }
    }
}
