//! Game worlds and the world registry
//!
//! A [`World`] owns every entity in one arena. All cross-context
//! access goes through sharded maps, so the input consumer and the
//! tick driver can touch a world concurrently; intents applied during
//! a tick are simply picked up by the next one.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::ws::protocol::{PowerupKind, ServerMsg};

use super::input::InputAction;
use super::map::OccupancyGrid;
use super::player::Player;
use super::powerup::{self, Powerup};
use super::projectile::Projectile;
use super::{BroadcastSink, MapSource, PlayerId, PowerupId, ProjectileId, RegistrationSource};

/// Bounds slack for projectiles before they are swept
const PROJECTILE_BOUNDS_MARGIN: f32 = 10.0;

/// Match spawn slots, assigned to players in ascending id order
fn spawn_position(slot: usize) -> (f32, f32) {
    match slot % 4 {
        0 => (60.0, 90.0),
        1 => (580.0, 430.0),
        2 => (580.0, 90.0),
        3 => (60.0, 430.0),
        _ => (400.0, 300.0),
    }
}

/// One arena: players, projectiles, powerups, the wall grid, and the
/// running-match flag.
pub struct World {
    pub id: String,
    pub players: DashMap<PlayerId, Player>,
    pub projectiles: DashMap<ProjectileId, Projectile>,
    pub powerups: DashMap<PowerupId, Powerup>,

    next_projectile_id: AtomicU32,
    next_powerup_id: AtomicU32,
    map_id: RwLock<String>,
    grid: RwLock<Arc<OccupancyGrid>>,
    match_running: AtomicBool,

    roster: Arc<dyn RegistrationSource>,
    maps: Arc<dyn MapSource>,
    events: Arc<dyn BroadcastSink>,
}

impl World {
    /// Create a world on the given map. If the map cannot be loaded
    /// the world still comes up, on an open default grid, so a broken
    /// asset never takes registration down with it.
    pub fn new(
        id: String,
        default_map: &str,
        roster: Arc<dyn RegistrationSource>,
        maps: Arc<dyn MapSource>,
        events: Arc<dyn BroadcastSink>,
    ) -> Self {
        let (map_id, grid) = match maps.load(default_map) {
            Ok(loaded) => (loaded.id, Arc::new(loaded.grid)),
            Err(e) => {
                warn!(world_id = %id, map = default_map, error = %e, "Map load failed, using open default grid");
                (default_map.to_string(), Arc::new(OccupancyGrid::open_default()))
            }
        };

        let world = Self {
            id,
            players: DashMap::new(),
            projectiles: DashMap::new(),
            powerups: DashMap::new(),
            next_projectile_id: AtomicU32::new(1),
            next_powerup_id: AtomicU32::new(1),
            map_id: RwLock::new(map_id),
            grid: RwLock::new(grid),
            match_running: AtomicBool::new(false),
            roster,
            maps,
            events,
        };
        world.spawn_default_powerups();
        world
    }

    /// Route one intent. START restarts the match; everything else is
    /// per-player state, created on first reference and dropped while
    /// the player is dead.
    pub fn apply_input(&self, player_id: PlayerId, action: InputAction) {
        if let InputAction::Start { map } = action {
            self.start_match(player_id, map.as_deref());
            return;
        }

        let mut player = self
            .players
            .entry(player_id)
            .or_insert_with(|| Player::new(player_id));
        if !player.is_alive() {
            return;
        }

        match action {
            InputAction::Fire { facing } => {
                player.fire_requested = true;
                player.fire_facing = facing;
            }
            other => player.apply_input(&other),
        }
        player.last_input_ms = crate::util::time::unix_millis();
    }

    /// Start (or restart) the match: resolve the requested map, sync
    /// the roster, clear projectiles, recreate powerups, seat players
    /// at spawn slots in ascending id order, then announce the start.
    fn start_match(&self, started_by: PlayerId, requested_map: Option<&str>) {
        let target = match requested_map {
            Some(m) => m.to_string(),
            None => self.map_id.read().clone(),
        };
        match self.maps.load(&target) {
            Ok(loaded) => {
                *self.grid.write() = Arc::new(loaded.grid);
                *self.map_id.write() = loaded.id;
            }
            Err(e) => {
                // Keep playing on the current grid rather than fail the start
                warn!(world_id = %self.id, map = %target, error = %e, "Map load failed, keeping current map");
            }
        }

        self.sync_registered_players();
        self.projectiles.clear();
        self.spawn_default_powerups();

        let mut ids: Vec<PlayerId> = self.players.iter().map(|p| *p.key()).collect();
        ids.sort_unstable();
        for (slot, pid) in ids.iter().enumerate() {
            if let Some(mut player) = self.players.get_mut(pid) {
                player.reset_for_match(spawn_position(slot));
            }
        }

        self.match_running.store(true, Ordering::SeqCst);

        let map = self.map_id.read().clone();
        info!(
            world_id = %self.id,
            started_by,
            players = ids.len(),
            map = %map,
            "Match started"
        );
        self.publish(&ServerMsg::GameStart { map });
    }

    /// Reconcile world membership with the registration source:
    /// registered players are created if missing, everyone else is
    /// removed. On a roster error membership is left as-is.
    pub fn sync_registered_players(&self) {
        match self.roster.list_registered(&self.id) {
            Ok(registered) => {
                for pid in &registered {
                    self.players.entry(*pid).or_insert_with(|| Player::new(*pid));
                }
                self.players.retain(|pid, _| registered.contains(pid));
            }
            Err(e) => {
                debug!(world_id = %self.id, error = %e, "Roster query failed, keeping current players");
            }
        }
    }

    /// Recreate the fixed powerup set, discarding any current state
    fn spawn_default_powerups(&self) {
        self.powerups.clear();
        for (x, y, kind) in powerup::default_layout() {
            let id = self.next_powerup_id.fetch_add(1, Ordering::Relaxed);
            self.powerups.insert(id, Powerup::new(id, x, y, kind));
        }
    }

    /// Spawn a projectile at the owner's position, wired to the
    /// current grid and bounds. Returns `None` if the owner is gone.
    pub fn spawn_projectile(&self, owner: PlayerId, vx: f32, vy: f32) -> Option<ProjectileId> {
        let (x, y) = {
            let player = self.players.get(&owner)?;
            (player.x, player.y)
        };

        let id = self.next_projectile_id.fetch_add(1, Ordering::Relaxed);
        let grid = self.grid();
        let mut projectile = Projectile::new(id, owner, x, y, vx, vy);
        projectile.set_bounds(grid.pixel_width(), grid.pixel_height(), PROJECTILE_BOUNDS_MARGIN);
        projectile.set_grid(grid);
        self.projectiles.insert(id, projectile);
        Some(id)
    }

    pub fn update_powerups(&self, dt: f32) {
        for mut powerup in self.powerups.iter_mut() {
            powerup.update(dt);
        }
    }

    /// Hand out buffs for every player standing on an active powerup
    pub fn check_powerup_collisions(&self) {
        for mut player in self.players.iter_mut() {
            for mut powerup in self.powerups.iter_mut() {
                if powerup.check_collision(player.x, player.y) {
                    powerup.collect();
                    match powerup.kind {
                        PowerupKind::Speed => player.apply_speed_boost(),
                        PowerupKind::NoCooldown => player.apply_no_cooldown_boost(),
                        PowerupKind::SpreadShot => player.apply_spread_shot_boost(),
                    }
                    info!(
                        world_id = %self.id,
                        player_id = player.id,
                        kind = ?powerup.kind,
                        "Powerup collected"
                    );
                }
            }
        }
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive()).count()
    }

    /// Id of the single alive player, if there is exactly one
    pub fn last_player_standing(&self) -> Option<PlayerId> {
        self.players.iter().find(|p| p.is_alive()).map(|p| p.id)
    }

    pub fn grid(&self) -> Arc<OccupancyGrid> {
        self.grid.read().clone()
    }

    pub fn current_map_id(&self) -> String {
        self.map_id.read().clone()
    }

    pub fn match_running(&self) -> bool {
        self.match_running.load(Ordering::SeqCst)
    }

    /// Flip the running flag off, returning whether it was on. The
    /// single winner of this swap reports the match end.
    pub(crate) fn end_match(&self) -> bool {
        self.match_running.swap(false, Ordering::SeqCst)
    }

    pub fn publish(&self, msg: &ServerMsg) {
        self.events.publish(&self.id, msg);
    }
}

/// All live worlds, created atomically on first reference from either
/// the input consumer or a registration.
pub struct WorldRegistry {
    worlds: DashMap<String, Arc<World>>,
    default_map: String,
    roster: Arc<dyn RegistrationSource>,
    maps: Arc<dyn MapSource>,
    events: Arc<dyn BroadcastSink>,
}

impl WorldRegistry {
    pub fn new(
        default_map: String,
        roster: Arc<dyn RegistrationSource>,
        maps: Arc<dyn MapSource>,
        events: Arc<dyn BroadcastSink>,
    ) -> Self {
        Self {
            worlds: DashMap::new(),
            default_map,
            roster,
            maps,
            events,
        }
    }

    /// Fetch a world, creating it if this is the first reference.
    /// Creation goes through the map's entry API so two concurrent
    /// callers cannot race two worlds into existence.
    pub fn get_or_create(&self, id: &str) -> Arc<World> {
        if let Some(world) = self.worlds.get(id) {
            return world.value().clone();
        }
        self.worlds
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(world_id = %id, "Creating world");
                Arc::new(World::new(
                    id.to_string(),
                    &self.default_map,
                    self.roster.clone(),
                    self.maps.clone(),
                    self.events.clone(),
                ))
            })
            .value()
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<World>> {
        self.worlds.get(id).map(|w| w.value().clone())
    }

    /// Snapshot of every live world, cloned out so callers never hold
    /// registry locks across a tick.
    pub fn all(&self) -> Vec<Arc<World>> {
        self.worlds.iter().map(|w| w.value().clone()).collect()
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{stub_registry, stub_world};
    use super::*;
    use crate::ws::protocol::Facing;

    #[test]
    fn first_intent_creates_the_player() {
        let (world, _roster, _maps, _sink) = stub_world("w1", &[]);
        assert!(world.players.is_empty());

        world.apply_input(5, InputAction::Fire { facing: None });

        let player = world.players.get(&5).expect("player created");
        assert!(player.fire_requested);
    }

    #[test]
    fn dead_players_drop_all_intents() {
        let (world, _roster, _maps, _sink) = stub_world("w1", &[1]);
        world.sync_registered_players();
        world.players.get_mut(&1).unwrap().lives = 0;

        world.apply_input(1, InputAction::Fire { facing: Some(Facing::Up) });
        world.apply_input(1, InputAction::Right);

        let player = world.players.get(&1).unwrap();
        assert!(!player.fire_requested);
        assert_eq!(player.fire_facing, None);
    }

    #[test]
    fn start_resets_lives_projectiles_and_powerups() {
        let (world, _roster, _maps, sink) = stub_world("w1", &[1]);
        world.sync_registered_players();

        // Rough up the world first
        world.players.get_mut(&1).unwrap().lives = 1;
        world.spawn_projectile(1, 400.0, 0.0);
        for mut p in world.powerups.iter_mut() {
            p.collect();
        }

        world.apply_input(1, InputAction::Start { map: None });

        let player = world.players.get(&1).unwrap();
        assert_eq!(player.lives, 3);
        assert_eq!((player.x, player.y), (60.0, 90.0));
        assert!(world.projectiles.is_empty());
        assert_eq!(world.powerups.len(), 3);
        assert!(world.powerups.iter().all(|p| p.active));
        assert!(world.match_running());

        let msgs = sink.for_world("w1");
        assert!(msgs
            .iter()
            .any(|m| matches!(m, ServerMsg::GameStart { map } if map == "map2")));
    }

    #[test]
    fn start_seats_players_by_ascending_id() {
        let (world, _roster, _maps, _sink) = stub_world("w1", &[3, 1, 2, 5, 4]);

        world.apply_input(1, InputAction::Start { map: None });

        let pos = |id: PlayerId| {
            let p = world.players.get(&id).unwrap();
            (p.x, p.y)
        };
        assert_eq!(pos(1), (60.0, 90.0));
        assert_eq!(pos(2), (580.0, 430.0));
        assert_eq!(pos(3), (580.0, 90.0));
        assert_eq!(pos(4), (60.0, 430.0));
        // Fifth player wraps back to the first slot
        assert_eq!(pos(5), (60.0, 90.0));
    }

    #[test]
    fn start_switches_maps_and_reports_the_resolved_id() {
        let (world, _roster, _maps, sink) = stub_world("w1", &[1]);
        assert_eq!(world.current_map_id(), "map2");

        world.apply_input(1, InputAction::Start { map: Some("map3".to_string()) });

        assert_eq!(world.current_map_id(), "map3");
        let msgs = sink.for_world("w1");
        assert!(msgs
            .iter()
            .any(|m| matches!(m, ServerMsg::GameStart { map } if map == "map3")));
    }

    #[test]
    fn failed_map_load_keeps_current_grid_and_still_starts() {
        let (world, _roster, maps, sink) = stub_world("w1", &[1]);
        maps.fail_loads();

        world.apply_input(1, InputAction::Start { map: Some("map3".to_string()) });

        assert_eq!(world.current_map_id(), "map2");
        assert!(world.match_running());
        assert!(sink
            .for_world("w1")
            .iter()
            .any(|m| matches!(m, ServerMsg::GameStart { map } if map == "map2")));
    }

    #[test]
    fn sync_mirrors_roster_additions_and_removals() {
        let (world, roster, _maps, _sink) = stub_world("w1", &[1, 2]);
        world.sync_registered_players();
        assert_eq!(world.players.len(), 2);

        // Player 2 wanders off before the roster changes
        world.players.get_mut(&2).unwrap().x = 333.0;

        roster.set("w1", [2, 3]);
        world.sync_registered_players();

        assert!(world.players.get(&1).is_none());
        assert!(world.players.get(&3).is_some());
        // Existing state survives a sync
        assert_eq!(world.players.get(&2).unwrap().x, 333.0);
    }

    #[test]
    fn roster_failure_keeps_current_membership() {
        let (world, roster, _maps, _sink) = stub_world("w1", &[1]);
        world.sync_registered_players();
        assert_eq!(world.players.len(), 1);

        roster.fail_queries();
        world.sync_registered_players();
        assert_eq!(world.players.len(), 1);
    }

    #[test]
    fn projectiles_spawn_at_owner_with_sequential_ids() {
        let (world, _roster, _maps, _sink) = stub_world("w1", &[1]);
        world.sync_registered_players();
        {
            let mut p = world.players.get_mut(&1).unwrap();
            p.x = 200.0;
            p.y = 150.0;
        }

        let first = world.spawn_projectile(1, 400.0, 0.0).unwrap();
        let second = world.spawn_projectile(1, 0.0, -400.0).unwrap();
        assert_eq!((first, second), (1, 2));

        let proj = world.projectiles.get(&first).unwrap();
        assert_eq!((proj.x, proj.y), (200.0, 150.0));
        assert_eq!(proj.owner, 1);

        assert_eq!(world.spawn_projectile(99, 400.0, 0.0), None);
    }

    #[test]
    fn spawned_projectiles_pick_up_the_resolved_walls() {
        let (world, _roster, maps, _sink) = stub_world("w1", &[1]);
        // Wall tile at (20, 9): pixels 320..336 x 144..160
        maps.block(20, 9);
        world.apply_input(1, InputAction::Start { map: None });
        {
            let mut p = world.players.get_mut(&1).unwrap();
            p.x = 300.0;
            p.y = 150.0;
        }

        let id = world.spawn_projectile(1, 400.0, 0.0).unwrap();
        let mut proj = world.projectiles.get_mut(&id).unwrap();
        proj.update(0.1);

        // Killed in place by the wall band it would have crossed
        assert!(!proj.is_alive());
        assert_eq!((proj.x, proj.y), (300.0, 150.0));
    }

    #[test]
    fn standing_on_a_powerup_grants_its_buff() {
        let (world, _roster, _maps, _sink) = stub_world("w1", &[1]);
        world.sync_registered_players();
        {
            let mut p = world.players.get_mut(&1).unwrap();
            p.x = 150.0;
            p.y = 200.0;
        }

        world.check_powerup_collisions();

        let player = world.players.get(&1).unwrap();
        assert!(player.has_speed_boost());
        assert!(!player.has_no_cooldown());
        let collected = world
            .powerups
            .iter()
            .find(|p| p.kind == PowerupKind::Speed)
            .unwrap();
        assert!(!collected.active);
    }

    #[test]
    fn registry_hands_out_one_instance_per_id() {
        let (registry, _roster, _maps, _sink) = stub_registry();
        let a = registry.get_or_create("w1");
        let b = registry.get_or_create("w1");
        let c = registry.get_or_create("w2");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.world_count(), 2);
        assert!(registry.get("w1").is_some());
        assert!(registry.get("missing").is_none());
    }
}
