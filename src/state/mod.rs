//! Room state and lifetime management.

mod registry;
mod room;

pub use registry::RoomRegistry;
pub use room::{default_role, Occupant, OccupancyError, Room, RoomState, Subject};
