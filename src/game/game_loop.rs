//! Per-tick world orchestration
//!
//! The tick driver calls [`GameLoop::tick`] at a fixed period; each
//! call advances every live world by the measured wall-clock delta and
//! decides once whether this tick's state frames ship.

use std::f32::consts::FRAC_PI_6;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

use crate::ws::protocol::{Facing, ServerMsg};

use super::player::Player;
use super::projectile::PROJECTILE_SPEED;
use super::snapshot::SnapshotBuilder;
use super::world::{World, WorldRegistry};
use super::PlayerId;

/// Keep-out margin pushed onto players each tick
const PLAYER_MARGIN: f32 = 30.0;
/// Player body radius for projectile hits
const PLAYER_HIT_RADIUS: f32 = 15.0;
/// Projectile radius for player hits
const PROJECTILE_HIT_RADIUS: f32 = 8.0;
/// Angular offset of the two extra spread-shot projectiles
const SPREAD_ANGLE: f32 = FRAC_PI_6;

pub struct GameLoop {
    worlds: Arc<WorldRegistry>,
    tick_period: Duration,
    last_tick: Mutex<Option<Instant>>,
    snapshots: Mutex<SnapshotBuilder>,
}

impl GameLoop {
    pub fn new(
        worlds: Arc<WorldRegistry>,
        tick_period: Duration,
        snapshot_interval: Duration,
    ) -> Self {
        Self {
            worlds,
            tick_period,
            last_tick: Mutex::new(None),
            snapshots: Mutex::new(SnapshotBuilder::new(snapshot_interval)),
        }
    }

    /// One driver tick. The simulation delta is the measured wall
    /// clock since the previous tick (the nominal period on the first
    /// one), so skipped scheduler slots stretch the delta instead of
    /// losing time.
    pub fn tick(&self) {
        let now = Instant::now();
        let dt = {
            let mut last = self.last_tick.lock();
            let dt = match *last {
                Some(prev) => now.duration_since(prev).as_secs_f32(),
                None => self.tick_period.as_secs_f32(),
            };
            *last = Some(now);
            dt
        };
        let broadcast_due = self.snapshots.lock().should_send(now);
        self.step(dt, broadcast_due);
    }

    /// Advance every world by `dt`. Split out of [`GameLoop::tick`] so
    /// tests can drive deterministic deltas.
    pub fn step(&self, dt: f32, broadcast_due: bool) {
        for world in self.worlds.all() {
            self.step_world(&world, dt, broadcast_due);
        }
    }

    fn step_world(&self, world: &World, dt: f32, broadcast_due: bool) {
        world.sync_registered_players();

        // Push current bounds and walls down before anything moves
        let grid = world.grid();
        let (width, height) = (grid.pixel_width(), grid.pixel_height());
        for mut player in world.players.iter_mut() {
            player.set_bounds(width, height, PLAYER_MARGIN);
            player.set_grid(grid.clone());
        }

        // Dead players stay seated but frozen
        for mut player in world.players.iter_mut() {
            if player.is_alive() {
                player.update(dt);
            }
        }

        world.update_powerups(dt);
        world.check_powerup_collisions();

        self.resolve_firing(world);

        for mut projectile in world.projectiles.iter_mut() {
            projectile.update(dt);
        }

        self.resolve_hits(world);

        world
            .projectiles
            .retain(|_, p| p.is_alive() && !p.is_out_of_bounds());

        self.check_win_condition(world);

        if broadcast_due {
            world.publish(&SnapshotBuilder::build(world));
        }
    }

    /// Turn pending fire requests into projectiles. A request made
    /// during cooldown stays pending until the cooldown elapses. Shot
    /// orders are collected first and spawned after the player pass so
    /// no player lock is held while the projectile map changes.
    fn resolve_firing(&self, world: &World) {
        struct ShotOrder {
            owner: PlayerId,
            vx: f32,
            vy: f32,
            spread: bool,
        }

        let mut orders: Vec<ShotOrder> = Vec::new();
        for mut player in world.players.iter_mut() {
            if !player.is_alive() || !player.fire_requested || !player.can_shoot() {
                continue;
            }
            let (vx, vy) = fire_velocity(&player);
            orders.push(ShotOrder {
                owner: player.id,
                vx,
                vy,
                spread: player.has_spread_shot(),
            });
            player.apply_shooting();
            player.fire_requested = false;
        }

        for order in orders {
            world.spawn_projectile(order.owner, order.vx, order.vy);
            if order.spread {
                let (lvx, lvy) = rotate(order.vx, order.vy, -SPREAD_ANGLE);
                let (rvx, rvy) = rotate(order.vx, order.vy, SPREAD_ANGLE);
                world.spawn_projectile(order.owner, lvx, lvy);
                world.spawn_projectile(order.owner, rvx, rvy);
            }
        }
    }

    /// Projectile-player hits. Owners never hit themselves and
    /// invulnerable players are skipped; a landed hit always consumes
    /// the projectile.
    fn resolve_hits(&self, world: &World) {
        for mut projectile in world.projectiles.iter_mut() {
            if !projectile.is_alive() {
                continue;
            }
            for mut player in world.players.iter_mut() {
                if player.id == projectile.owner || player.is_invulnerable() {
                    continue;
                }
                let dx = projectile.x - player.x;
                let dy = projectile.y - player.y;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance < PLAYER_HIT_RADIUS + PROJECTILE_HIT_RADIUS {
                    player.hit();
                    projectile.life = 0.0;
                    info!(
                        world_id = %world.id,
                        player_id = player.id,
                        owner = projectile.owner,
                        lives = player.lives,
                        "Player hit"
                    );
                    break;
                }
            }
        }
    }

    /// End the match exactly once when at most one player is left
    /// alive. The swap on the running flag picks the single reporter.
    fn check_win_condition(&self, world: &World) {
        if !world.match_running() || world.alive_count() > 1 {
            return;
        }
        if !world.end_match() {
            return;
        }

        let winner = world.last_player_standing();
        world.publish(&ServerMsg::GameOver { winner });
        self.snapshots.lock().force_next();
        match winner {
            Some(id) => info!(world_id = %world.id, winner = id, "Match over"),
            None => info!(world_id = %world.id, "Match over with no survivors"),
        }
    }
}

/// Resolve a shot's velocity: an explicit facing wins, else the
/// shooter's held movement direction, else a standing shot with no
/// motion.
fn fire_velocity(player: &Player) -> (f32, f32) {
    let facing = player.fire_facing.or_else(|| {
        if player.is_up() {
            Some(Facing::Up)
        } else if player.is_down() {
            Some(Facing::Down)
        } else if player.is_left() {
            Some(Facing::Left)
        } else if player.is_right() {
            Some(Facing::Right)
        } else {
            None
        }
    });
    match facing {
        Some(Facing::Up) => (0.0, -PROJECTILE_SPEED),
        Some(Facing::Down) => (0.0, PROJECTILE_SPEED),
        Some(Facing::Left) => (-PROJECTILE_SPEED, 0.0),
        Some(Facing::Right) => (PROJECTILE_SPEED, 0.0),
        None => (0.0, 0.0),
    }
}

fn rotate(vx: f32, vy: f32, angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.sin_cos();
    (vx * cos - vy * sin, vx * sin + vy * cos)
}
