//! Snapshot building and throttling

use std::time::{Duration, Instant};

use crate::ws::protocol::{PlayerView, PowerupView, ProjectileView, ServerMsg};

use super::world::World;

/// Decides when state frames go out: at most one per configured
/// interval regardless of tick rate, with an escape hatch for ticks
/// that must ship (match end).
pub struct SnapshotBuilder {
    interval: Duration,
    last_sent: Option<Instant>,
    force: bool,
}

impl SnapshotBuilder {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            force: false,
        }
    }

    /// Whether this tick's state should go out. A positive answer
    /// counts as a send.
    pub fn should_send(&mut self, now: Instant) -> bool {
        if self.force {
            self.force = false;
            self.last_sent = Some(now);
            return true;
        }
        match self.last_sent {
            Some(prev) if now.duration_since(prev) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }

    /// Force the next check to pass (used for important events)
    pub fn force_next(&mut self) {
        self.force = true;
    }

    /// Build the full state frame for one world. Dead players are
    /// omitted; collected powerups stay listed as inactive so clients
    /// can keep rendering the pads.
    pub fn build(world: &World) -> ServerMsg {
        let players: Vec<PlayerView> = world
            .players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| PlayerView {
                id: p.id,
                x: p.x,
                y: p.y,
                facing: p.facing,
                lives: p.lives,
                invulnerable_time: p.invulnerable_time,
                has_speed_boost: p.has_speed_boost(),
                speed_boost_timer: p.speed_boost_timer,
                has_no_cooldown: p.has_no_cooldown(),
                has_spread_shot: p.has_spread_shot(),
            })
            .collect();

        let projectiles: Vec<ProjectileView> = world
            .projectiles
            .iter()
            .map(|p| ProjectileView {
                id: p.id,
                owner: p.owner,
                x: p.x,
                y: p.y,
                vx: p.vx,
                vy: p.vy,
            })
            .collect();

        let powerups: Vec<PowerupView> = world
            .powerups
            .iter()
            .map(|p| PowerupView {
                id: p.id,
                x: p.x,
                y: p.y,
                kind: p.kind,
                active: p.active,
            })
            .collect();

        ServerMsg::State {
            players,
            projectiles,
            powerups,
            map: world.current_map_id(),
            running: world.match_running(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::stub_world;
    use super::*;

    #[test]
    fn throttles_to_the_configured_interval() {
        let mut builder = SnapshotBuilder::new(Duration::from_millis(50));
        let base = Instant::now();
        let at = |ms: u64| base + Duration::from_millis(ms);

        assert!(builder.should_send(at(0)));
        assert!(!builder.should_send(at(20)));
        assert!(!builder.should_send(at(40)));
        assert!(builder.should_send(at(50)));
        assert!(!builder.should_send(at(60)));
        assert!(builder.should_send(at(110)));
    }

    #[test]
    fn force_next_overrides_the_throttle_once() {
        let mut builder = SnapshotBuilder::new(Duration::from_millis(50));
        let base = Instant::now();

        assert!(builder.should_send(base));
        builder.force_next();
        assert!(builder.should_send(base + Duration::from_millis(10)));
        // Back to normal throttling afterwards
        assert!(!builder.should_send(base + Duration::from_millis(20)));
    }

    #[test]
    fn frame_omits_dead_players_and_carries_world_flags() {
        let (world, _roster, _maps, _sink) = stub_world("w1", &[1, 2]);
        world.sync_registered_players();
        world.players.get_mut(&2).unwrap().lives = 0;
        world.spawn_projectile(1, 400.0, 0.0);

        match SnapshotBuilder::build(&world) {
            ServerMsg::State {
                players,
                projectiles,
                powerups,
                map,
                running,
            } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, 1);
                assert_eq!(projectiles.len(), 1);
                assert_eq!(projectiles[0].owner, 1);
                assert_eq!(powerups.len(), 3);
                assert_eq!(map, "map2");
                assert!(!running);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
