//! Room registry: creation, lookup and eviction.

use crate::config::RoomConfig;
use crate::state::room::Room;
use dashmap::DashMap;
use muc_proto::{BareJid, FullJid};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns every live [`Room`].
///
/// `get_or_create` is atomic: when two workers race on the first presence to
/// a room, exactly one of them observes `created == true`, so the
/// room-created status code is broadcast exactly once.
pub struct RoomRegistry {
    rooms: DashMap<BareJid, Arc<Room>>,
    default_config: RwLock<RoomConfig>,
}

impl RoomRegistry {
    /// Create a registry seeding new rooms from `default_config`.
    pub fn new(default_config: RoomConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            default_config: RwLock::new(default_config),
        }
    }

    /// Look up a live room.
    pub fn get_room(&self, jid: &BareJid) -> Option<Arc<Room>> {
        self.rooms.get(jid).map(|entry| entry.value().clone())
    }

    /// Create a room; fails when it already exists.
    pub fn create_room(
        &self,
        jid: &BareJid,
        creator: &FullJid,
        locked: bool,
    ) -> Option<Arc<Room>> {
        let (room, created) = self.get_or_create(jid, creator, locked);
        created.then_some(room)
    }

    /// Fetch the room, creating it when absent. The boolean is `true` for
    /// exactly one caller per room lifetime.
    pub fn get_or_create(
        &self,
        jid: &BareJid,
        creator: &FullJid,
        locked: bool,
    ) -> (Arc<Room>, bool) {
        match self.rooms.entry(jid.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => (entry.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                info!(room = %jid, creator = %creator, "creating room");
                let room = Arc::new(Room::new(
                    jid.clone(),
                    creator.bare().clone(),
                    self.default_config.read().clone(),
                    locked,
                ));
                entry.insert(room.clone());
                (room, true)
            }
        }
    }

    /// Evict the room if its occupant count reached zero.
    ///
    /// The evicted flag is set and the map entry removed under the room
    /// guard, so a racing enter that still holds the old `Arc` detects the
    /// tombstone and its retry is guaranteed to create a fresh room.
    /// (Entering never touches the map while holding a room guard, so the
    /// lock order here cannot deadlock.)
    pub fn leave_room(&self, room: &Room) -> bool {
        let mut st = room.lock();
        if st.occupant_count() > 0 || st.evicted() {
            return false;
        }
        st.mark_evicted();
        debug!(room = %room.jid(), "evicting empty room");
        self.rooms.remove(room.jid()).is_some()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// The configuration newly created rooms start from.
    pub fn default_room_config(&self) -> RoomConfig {
        self.default_config.read().clone()
    }

    /// Replace the default room configuration.
    pub fn update_default_room_config(&self, config: RoomConfig) {
        *self.default_config.write() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muc_proto::{Element, Role};

    fn registry() -> RoomRegistry {
        RoomRegistry::new(RoomConfig::default())
    }

    fn jid(s: &str) -> BareJid {
        s.parse().unwrap()
    }

    fn full(s: &str) -> FullJid {
        s.parse().unwrap()
    }

    #[test]
    fn create_is_exclusive() {
        let registry = registry();
        let room = jid("lounge@muc.example.org");
        let alice = full("alice@example.org/pda");

        assert!(registry.create_room(&room, &alice, true).is_some());
        assert!(registry.create_room(&room, &alice, true).is_none());
        assert!(registry.get_room(&room).is_some());
    }

    #[test]
    fn get_or_create_reports_creation_once() {
        let registry = registry();
        let room = jid("lounge@muc.example.org");
        let (_, created) = registry.get_or_create(&room, &full("alice@example.org/pda"), true);
        assert!(created);
        let (_, created) = registry.get_or_create(&room, &full("bob@example.org/tab"), true);
        assert!(!created);
    }

    #[test]
    fn eviction_requires_zero_occupancy() {
        let registry = registry();
        let room_jid = jid("lounge@muc.example.org");
        let alice = full("alice@example.org/pda");
        let (room, _) = registry.get_or_create(&room_jid, &alice, false);

        room.lock()
            .add_occupant(alice.clone(), "alice", Role::Moderator, Element::new("presence"))
            .unwrap();
        assert!(!registry.leave_room(&room));
        assert_eq!(registry.room_count(), 1);

        room.lock().remove_session(&alice);
        assert!(registry.leave_room(&room));
        assert_eq!(registry.room_count(), 0);
        assert!(room.lock().evicted());
    }

    #[test]
    fn reentry_after_eviction_gets_a_fresh_room() {
        let registry = registry();
        let room_jid = jid("lounge@muc.example.org");
        let alice = full("alice@example.org/pda");

        let (room, _) = registry.get_or_create(&room_jid, &alice, true);
        room.lock().unlock();
        registry.leave_room(&room);

        let (fresh, created) = registry.get_or_create(&room_jid, &alice, true);
        assert!(created);
        assert!(fresh.lock().locked());
        assert!(!Arc::ptr_eq(&room, &fresh));
    }

    #[test]
    fn default_config_feeds_new_rooms() {
        let registry = registry();
        let mut config = registry.default_room_config();
        config.members_only = true;
        registry.update_default_room_config(config);

        let (room, _) = registry.get_or_create(
            &jid("club@muc.example.org"),
            &full("alice@example.org/pda"),
            false,
        );
        assert!(room.lock().config().members_only);
    }
}
