//! Jabber identifier (JID) address types.
//!
//! A bare JID is `local@domain` (or just `domain`); a full JID adds a
//! resource: `local@domain/resource`. Rooms are addressed by bare JID,
//! occupants by the room JID with the nickname as resource.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a JID from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JidError {
    /// The domain part is empty.
    #[error("jid has an empty domain: {0:?}")]
    EmptyDomain(String),
    /// The local part is present but empty (`@domain`).
    #[error("jid has an empty local part: {0:?}")]
    EmptyLocal(String),
    /// The resource separator is present but the resource is empty.
    #[error("jid has an empty resource: {0:?}")]
    EmptyResource(String),
}

/// A bare JID: `local@domain` without a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BareJid {
    local: Option<String>,
    domain: String,
}

impl BareJid {
    /// Build a bare JID from a local part and a domain.
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: Some(local.into()),
            domain: domain.into(),
        }
    }

    /// Build a domain-only bare JID.
    pub fn domain_jid(domain: impl Into<String>) -> Self {
        Self {
            local: None,
            domain: domain.into(),
        }
    }

    /// The local part, if any.
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// The domain part.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Qualify this bare JID with a resource.
    pub fn with_resource(&self, resource: impl Into<String>) -> FullJid {
        FullJid {
            bare: self.clone(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local {
            Some(local) => write!(f, "{}@{}", local, self.domain),
            None => f.write_str(&self.domain),
        }
    }
}

impl FromStr for BareJid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Jid::from_str(s)? {
            Jid::Bare(bare) => Ok(bare),
            Jid::Full(full) => Ok(full.bare),
        }
    }
}

/// A full JID: `local@domain/resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullJid {
    bare: BareJid,
    resource: String,
}

impl FullJid {
    /// The bare part of this JID.
    pub fn bare(&self) -> &BareJid {
        &self.bare
    }

    /// The resource part of this JID.
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl fmt::Display for FullJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bare, self.resource)
    }
}

impl FromStr for FullJid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Jid::from_str(s)? {
            Jid::Full(full) => Ok(full),
            Jid::Bare(_) => Err(JidError::EmptyResource(s.to_string())),
        }
    }
}

/// Either a bare or a full JID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Jid {
    /// A JID without a resource.
    Bare(BareJid),
    /// A JID with a resource.
    Full(FullJid),
}

impl Jid {
    /// The bare part, discarding any resource.
    pub fn to_bare(&self) -> BareJid {
        match self {
            Jid::Bare(bare) => bare.clone(),
            Jid::Full(full) => full.bare.clone(),
        }
    }

    /// The resource, if this is a full JID.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Jid::Bare(_) => None,
            Jid::Full(full) => Some(&full.resource),
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Jid::Bare(bare) => bare.fmt(f),
            Jid::Full(full) => full.fmt(f),
        }
    }
}

impl From<BareJid> for Jid {
    fn from(bare: BareJid) -> Self {
        Jid::Bare(bare)
    }
}

impl From<FullJid> for Jid {
    fn from(full: FullJid) -> Self {
        Jid::Full(full)
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, resource) = match s.split_once('/') {
            Some((addr, resource)) => {
                if resource.is_empty() {
                    return Err(JidError::EmptyResource(s.to_string()));
                }
                (addr, Some(resource))
            }
            None => (s, None),
        };

        let (local, domain) = match addr.split_once('@') {
            Some((local, domain)) => {
                if local.is_empty() {
                    return Err(JidError::EmptyLocal(s.to_string()));
                }
                (Some(local.to_string()), domain)
            }
            None => (None, addr),
        };

        if domain.is_empty() {
            return Err(JidError::EmptyDomain(s.to_string()));
        }

        let bare = BareJid {
            local,
            domain: domain.to_string(),
        };

        Ok(match resource {
            Some(resource) => Jid::Full(FullJid {
                bare,
                resource: resource.to_string(),
            }),
            None => Jid::Bare(bare),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_jid() {
        let jid: Jid = "lounge@conference.example.org".parse().unwrap();
        assert_eq!(jid.to_bare().local(), Some("lounge"));
        assert_eq!(jid.to_bare().domain(), "conference.example.org");
        assert_eq!(jid.resource(), None);
    }

    #[test]
    fn parse_full_jid() {
        let jid: FullJid = "alice@example.org/orchard".parse().unwrap();
        assert_eq!(jid.bare().to_string(), "alice@example.org");
        assert_eq!(jid.resource(), "orchard");
    }

    #[test]
    fn parse_domain_only() {
        let jid: BareJid = "conference.example.org".parse().unwrap();
        assert_eq!(jid.local(), None);
        assert_eq!(jid.to_string(), "conference.example.org");
    }

    #[test]
    fn resource_may_contain_slash() {
        let jid: FullJid = "a@b/res/with/slash".parse().unwrap();
        assert_eq!(jid.resource(), "res/with/slash");
    }

    #[test]
    fn rejects_malformed() {
        assert!("@example.org".parse::<Jid>().is_err());
        assert!("".parse::<Jid>().is_err());
        assert!("a@b/".parse::<Jid>().is_err());
        assert!("a@".parse::<Jid>().is_err());
    }

    #[test]
    fn bare_from_full_string_drops_resource() {
        let bare: BareJid = "alice@example.org/orchard".parse().unwrap();
        assert_eq!(bare.to_string(), "alice@example.org");
    }
}
