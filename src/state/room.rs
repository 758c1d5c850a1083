//! Room state: roster, affiliations, roles, presence cache, subject, lock.
//!
//! All mutable state of a room lives in [`RoomState`] behind a single
//! [`Mutex`]. Stanza dispatch is keyed by sender, not by room, so two
//! stanzas for the same room can run on different workers; every handler
//! therefore takes the room guard once and performs validation, mutation and
//! snapshotting under it. The guard must not be held across `.await`.

use crate::config::RoomConfig;
use chrono::{DateTime, Utc};
use muc_proto::{Affiliation, BareJid, Element, FullJid, Role};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Occupancy mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OccupancyError {
    /// The nickname is bound to a different bare JID.
    #[error("nickname {0:?} is bound to another occupant")]
    NicknameTaken(String),
}

/// The room subject: text, changer nickname and change time, set and read
/// as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Subject text.
    pub text: String,
    /// Nickname of the occupant who set it.
    pub nick: String,
    /// When it was set.
    pub date: DateTime<Utc>,
}

/// A (nickname, sessions) binding present in the room.
#[derive(Debug, Clone)]
pub struct Occupant {
    bare: BareJid,
    role: Role,
    sessions: HashSet<FullJid>,
}

impl Occupant {
    /// The occupant's bare JID.
    pub fn bare(&self) -> &BareJid {
        &self.bare
    }

    /// The occupant's current role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The occupant's live sessions. Empty for invitation placeholders.
    pub fn sessions(&self) -> impl Iterator<Item = &FullJid> {
        self.sessions.iter()
    }

    /// Whether this is a sessionless placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// The default role for an entering occupant.
///
/// A moderated room forces unaffiliated occupants down to visitor.
pub fn default_role(config: &RoomConfig, affiliation: Affiliation) -> Role {
    if config.moderated && affiliation == Affiliation::None {
        return Role::Visitor;
    }
    match affiliation {
        Affiliation::Owner | Affiliation::Admin => Role::Moderator,
        Affiliation::Member | Affiliation::None => Role::Participant,
        Affiliation::Outcast => Role::None,
    }
}

/// All mutable state of a room.
#[derive(Debug)]
pub struct RoomState {
    config: RoomConfig,
    creator: BareJid,
    created_at: DateTime<Utc>,
    locked: bool,
    evicted: bool,
    // BTreeMap keyed by nickname keeps broadcast order deterministic.
    roster: BTreeMap<String, Occupant>,
    affiliations: HashMap<BareJid, Affiliation>,
    presences: HashMap<FullJid, Element>,
    subject: Option<Subject>,
}

impl RoomState {
    /// The room configuration.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Mutable access for the (external) room-configuration surface.
    pub fn config_mut(&mut self) -> &mut RoomConfig {
        &mut self.config
    }

    /// The bare JID that created the room.
    pub fn creator(&self) -> &BareJid {
        &self.creator
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the room is still locked (configuration not yet completed).
    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Unlock the room. The flag only ever moves true → false.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Whether the registry has already evicted this room.
    pub fn evicted(&self) -> bool {
        self.evicted
    }

    pub(crate) fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    /// Affiliation of a bare JID; defaults to none.
    pub fn affiliation(&self, bare: &BareJid) -> Affiliation {
        self.affiliations
            .get(bare)
            .copied()
            .unwrap_or(Affiliation::None)
    }

    /// Set (or clear, for `none`) the affiliation of a bare JID.
    ///
    /// Affiliations persist independent of occupancy.
    pub fn set_affiliation(&mut self, bare: &BareJid, affiliation: Affiliation) {
        if affiliation == Affiliation::None {
            self.affiliations.remove(bare);
        } else {
            self.affiliations.insert(bare.clone(), affiliation);
        }
    }

    /// All bare JIDs with a non-default affiliation.
    pub fn affiliations(&self) -> impl Iterator<Item = (&BareJid, Affiliation)> {
        self.affiliations.iter().map(|(jid, aff)| (jid, *aff))
    }

    /// The nickname a session is bound to.
    pub fn nickname_of(&self, full: &FullJid) -> Option<&str> {
        self.roster
            .iter()
            .find(|(_, occ)| occ.sessions.contains(full))
            .map(|(nick, _)| nick.as_str())
    }

    /// The nickname a bare JID is present under (ignoring placeholders).
    pub fn nickname_of_bare(&self, bare: &BareJid) -> Option<&str> {
        self.roster
            .iter()
            .find(|(_, occ)| occ.bare == *bare && !occ.sessions.is_empty())
            .map(|(nick, _)| nick.as_str())
    }

    /// The occupant bound to a nickname.
    pub fn occupant(&self, nick: &str) -> Option<&Occupant> {
        self.roster.get(nick)
    }

    /// All occupants, ordered by nickname.
    pub fn occupants(&self) -> impl Iterator<Item = (&str, &Occupant)> {
        self.roster.iter().map(|(nick, occ)| (nick.as_str(), occ))
    }

    /// Live sessions bound to a nickname.
    pub fn sessions_of_nickname(&self, nick: &str) -> Vec<FullJid> {
        self.roster
            .get(nick)
            .map(|occ| occ.sessions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Live sessions of a bare JID across all nicknames.
    pub fn sessions_of_bare(&self, bare: &BareJid) -> Vec<FullJid> {
        self.roster
            .values()
            .filter(|occ| occ.bare == *bare)
            .flat_map(|occ| occ.sessions.iter().cloned())
            .collect()
    }

    /// Every live session in the room, ordered by nickname.
    pub fn all_sessions(&self) -> Vec<FullJid> {
        self.roster
            .values()
            .flat_map(|occ| occ.sessions.iter().cloned())
            .collect()
    }

    /// Number of nicknames with at least one live session.
    pub fn occupant_count(&self) -> usize {
        self.roster
            .values()
            .filter(|occ| !occ.sessions.is_empty())
            .count()
    }

    /// Register a session under a nickname.
    ///
    /// Fails when the nickname is bound to a different bare JID; the caller
    /// decides whether a same-bare rebind is allowed (multi-item mode).
    /// Adopting a placeholder or creating a fresh binding applies `role`;
    /// adding a session to a live binding keeps the existing role (it may
    /// have been overridden by moderation).
    pub fn add_occupant(
        &mut self,
        full: FullJid,
        nick: &str,
        role: Role,
        presence: Element,
    ) -> Result<(), OccupancyError> {
        match self.roster.get_mut(nick) {
            Some(occ) if occ.bare != *full.bare() => {
                Err(OccupancyError::NicknameTaken(nick.to_string()))
            }
            Some(occ) => {
                if occ.sessions.is_empty() {
                    occ.role = role;
                }
                occ.sessions.insert(full.clone());
                self.presences.insert(full, presence);
                Ok(())
            }
            None => {
                self.roster.insert(
                    nick.to_string(),
                    Occupant {
                        bare: full.bare().clone(),
                        role,
                        sessions: HashSet::from([full.clone()]),
                    },
                );
                self.presences.insert(full, presence);
                Ok(())
            }
        }
    }

    /// Register a sessionless placeholder (mediated invitation bookkeeping).
    ///
    /// Placeholders never block eviction and are skipped by broadcasts.
    pub fn add_placeholder(&mut self, nick: &str, bare: BareJid, role: Role) {
        self.roster.entry(nick.to_string()).or_insert(Occupant {
            bare,
            role,
            sessions: HashSet::new(),
        });
    }

    /// Remove one session. Returns the vacated nickname and whether it was
    /// the last session under it (in which case the roster entry is gone).
    pub fn remove_session(&mut self, full: &FullJid) -> Option<(String, bool)> {
        let nick = self.nickname_of(full)?.to_string();
        self.presences.remove(full);
        let occ = self.roster.get_mut(&nick)?;
        occ.sessions.remove(full);
        let gone = occ.sessions.is_empty();
        if gone {
            self.roster.remove(&nick);
        }
        Some((nick, gone))
    }

    /// Remove every roster binding of a bare JID (ban/kick side effect).
    /// Returns the removed (nickname, sessions) pairs, placeholders included.
    pub fn remove_all_sessions_of(&mut self, bare: &BareJid) -> Vec<(String, Vec<FullJid>)> {
        let nicks: Vec<String> = self
            .roster
            .iter()
            .filter(|(_, occ)| occ.bare == *bare)
            .map(|(nick, _)| nick.clone())
            .collect();

        nicks
            .into_iter()
            .filter_map(|nick| {
                let occ = self.roster.remove(&nick)?;
                let sessions: Vec<FullJid> = occ.sessions.into_iter().collect();
                for full in &sessions {
                    self.presences.remove(full);
                }
                Some((nick, sessions))
            })
            .collect()
    }

    /// Role of a nickname; defaults to none.
    pub fn role_of(&self, nick: &str) -> Role {
        self.roster.get(nick).map_or(Role::None, |occ| occ.role)
    }

    /// Role of a session; defaults to none.
    pub fn role_of_full(&self, full: &FullJid) -> Role {
        self.nickname_of(full).map_or(Role::None, |n| {
            self.roster.get(n).map_or(Role::None, |occ| occ.role)
        })
    }

    /// Override the role of a nickname (moderation).
    pub fn set_role(&mut self, nick: &str, role: Role) {
        if let Some(occ) = self.roster.get_mut(nick) {
            occ.role = role;
        }
    }

    /// Last accepted presence of a session.
    pub fn last_presence(&self, full: &FullJid) -> Option<&Element> {
        self.presences.get(full)
    }

    /// Last accepted presence of any session of a bare JID.
    pub fn last_presence_of_bare(&self, bare: &BareJid) -> Option<&Element> {
        self.roster
            .values()
            .filter(|occ| occ.bare == *bare)
            .flat_map(|occ| occ.sessions.iter())
            .find_map(|full| self.presences.get(full))
    }

    /// Update the cached presence of a session.
    pub fn set_presence(&mut self, full: FullJid, presence: Element) {
        self.presences.insert(full, presence);
    }

    /// The current subject triple.
    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// Replace the subject triple atomically.
    pub fn set_subject(&mut self, text: impl Into<String>, nick: impl Into<String>) {
        self.subject = Some(Subject {
            text: text.into(),
            nick: nick.into(),
            date: Utc::now(),
        });
    }
}

/// A room: identity plus the mutex-guarded state.
#[derive(Debug)]
pub struct Room {
    jid: BareJid,
    state: Mutex<RoomState>,
}

impl Room {
    /// Create a room. The creator becomes owner; the lock flag starts at
    /// `locked` and can only be cleared afterwards.
    pub fn new(jid: BareJid, creator: BareJid, config: RoomConfig, locked: bool) -> Self {
        let mut affiliations = HashMap::new();
        affiliations.insert(creator.clone(), Affiliation::Owner);
        Self {
            jid,
            state: Mutex::new(RoomState {
                config,
                creator,
                created_at: Utc::now(),
                locked,
                evicted: false,
                roster: BTreeMap::new(),
                affiliations,
                presences: HashMap::new(),
                subject: None,
            }),
        }
    }

    /// The room's bare JID.
    pub fn jid(&self) -> &BareJid {
        &self.jid
    }

    /// Acquire the state guard. Callers must not hold it across `.await`.
    pub fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock()
    }
}
