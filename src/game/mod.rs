//! Authoritative game simulation
//!
//! Worlds run on a fixed-tick driver and consume player intents from a
//! bounded queue; the boundary layer only ever talks to the simulation
//! through [`IntentQueue`] and the collaborator traits below.

pub mod game_loop;
pub mod input;
pub mod map;
pub mod player;
pub mod powerup;
pub mod projectile;
pub mod scheduler;
pub mod snapshot;
#[cfg(test)]
pub mod test_support;
pub mod world;

pub use game_loop::GameLoop;
pub use input::{spawn_input_consumer, InputAction, Intent, IntentQueue};
pub use scheduler::TickScheduler;
pub use world::{World, WorldRegistry};

use std::collections::HashSet;

use crate::ws::protocol::ServerMsg;
use map::OccupancyGrid;

/// Client-chosen numeric player id
pub type PlayerId = u32;
/// World-scoped projectile id
pub type ProjectileId = u32;
/// World-scoped powerup id
pub type PowerupId = u32;

/// Id of the world players land in when they register without one
pub const DEFAULT_WORLD: &str = "default";

/// A resolved map: the id actually in play plus its occupancy grid.
pub struct LoadedMap {
    pub id: String,
    pub grid: OccupancyGrid,
}

/// Source of truth for which players are seated in a world. The
/// connection registry implements this; worlds re-read it every tick so
/// membership follows connections without any explicit join/leave
/// plumbing into the simulation.
pub trait RegistrationSource: Send + Sync {
    fn list_registered(&self, world_id: &str) -> anyhow::Result<HashSet<PlayerId>>;
}

/// Resolves map ids to collision grids.
pub trait MapSource: Send + Sync {
    fn load(&self, map_id: &str) -> anyhow::Result<LoadedMap>;
}

/// Outbound fan-out for world events and snapshots. Implementations
/// must not block the tick; a slow client gets frames dropped, never a
/// stalled simulation.
pub trait BroadcastSink: Send + Sync {
    fn publish(&self, world_id: &str, msg: &ServerMsg);
}
