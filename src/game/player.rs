//! Player simulation state

use std::sync::Arc;

use crate::ws::protocol::Facing;

use super::input::InputAction;
use super::map::OccupancyGrid;
use super::PlayerId;

/// Base movement speed in px/s
pub const PLAYER_SPEED: f32 = 200.0;
/// Movement multiplier while the speed buff is active
pub const SPEED_BOOST_MULTIPLIER: f32 = 1.5;
/// Lives granted at match start
pub const STARTING_LIVES: u32 = 3;
/// Post-hit invulnerability window in seconds
pub const HIT_INVULNERABILITY: f32 = 0.5;
/// Seconds between shots
pub const SHOOT_COOLDOWN: f32 = 0.5;
/// Cooldown while the rapid-fire buff is active
pub const RAPID_SHOOT_COOLDOWN: f32 = 0.1;
/// Duration of every powerup buff in seconds
pub const BUFF_DURATION: f32 = 15.0;

/// Default world bounds before the orchestrator pushes real ones
const DEFAULT_BOUNDS: (f32, f32) = (1120.0, 960.0);
const DEFAULT_MARGIN: f32 = 30.0;

/// One player's authoritative state. Movement is a pure function of the
/// held-direction flags, which only [`Player::apply_input`] mutates.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub lives: u32,
    /// Seconds of post-hit invulnerability remaining
    pub invulnerable_time: f32,
    /// Set by a FIRE intent, consumed by the firing pass
    pub fire_requested: bool,
    /// Explicit fire direction, if the FIRE intent carried one
    pub fire_facing: Option<Facing>,
    pub shoot_cooldown: f32,
    pub speed_boost_timer: f32,
    pub no_cooldown_timer: f32,
    pub spread_shot_timer: f32,
    /// Unix millis of the last accepted input
    pub last_input_ms: u64,

    up: bool,
    down: bool,
    left: bool,
    right: bool,

    bounds: (f32, f32),
    margin: f32,
    grid: Option<Arc<OccupancyGrid>>,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            x: DEFAULT_BOUNDS.0 / 2.0,
            y: DEFAULT_BOUNDS.1 / 2.0,
            facing: Facing::default(),
            lives: STARTING_LIVES,
            invulnerable_time: 0.0,
            fire_requested: false,
            fire_facing: None,
            shoot_cooldown: 0.0,
            speed_boost_timer: 0.0,
            no_cooldown_timer: 0.0,
            spread_shot_timer: 0.0,
            last_input_ms: crate::util::time::unix_millis(),
            up: false,
            down: false,
            left: false,
            right: false,
            bounds: DEFAULT_BOUNDS,
            margin: DEFAULT_MARGIN,
            grid: None,
        }
    }

    /// Set world pixel bounds; the keep-out margin is capped at a
    /// quarter of the smaller dimension so tiny maps stay playable.
    pub fn set_bounds(&mut self, width: f32, height: f32, margin: f32) {
        self.bounds = (width, height);
        self.margin = margin.min(width.min(height) / 4.0);
    }

    pub fn set_grid(&mut self, grid: Arc<OccupancyGrid>) {
        self.grid = Some(grid);
    }

    /// Apply a movement intent. Presses also turn the player; releases
    /// only drop the held flag. FIRE and START are handled upstream and
    /// are no-ops here.
    pub fn apply_input(&mut self, action: &InputAction) {
        match action {
            InputAction::Up => {
                self.up = true;
                self.facing = Facing::Up;
            }
            InputAction::Down => {
                self.down = true;
                self.facing = Facing::Down;
            }
            InputAction::Left => {
                self.left = true;
                self.facing = Facing::Left;
            }
            InputAction::Right => {
                self.right = true;
                self.facing = Facing::Right;
            }
            InputAction::StopUp => self.up = false,
            InputAction::StopDown => self.down = false,
            InputAction::StopLeft => self.left = false,
            InputAction::StopRight => self.right = false,
            InputAction::Fire { .. } | InputAction::Start { .. } => {}
        }
    }

    /// Advance timers and integrate movement for one tick. Axes are
    /// independent (no diagonal normalization); each axis is first
    /// clamped to the margin, then tested against the wall grid on its
    /// own, so a blocked axis slides instead of stopping the player.
    pub fn update(&mut self, dt: f32) {
        self.tick_timers(dt);

        let speed = if self.speed_boost_timer > 0.0 {
            PLAYER_SPEED * SPEED_BOOST_MULTIPLIER
        } else {
            PLAYER_SPEED
        };

        let mut dx = 0.0;
        let mut dy = 0.0;
        if self.up {
            dy -= 1.0;
        }
        if self.down {
            dy += 1.0;
        }
        if self.left {
            dx -= 1.0;
        }
        if self.right {
            dx += 1.0;
        }

        let (width, height) = self.bounds;
        let mut nx = (self.x + dx * speed * dt).clamp(self.margin, width - self.margin);
        let mut ny = (self.y + dy * speed * dt).clamp(self.margin, height - self.margin);

        if let Some(grid) = &self.grid {
            if grid.is_blocked(nx, self.y) {
                nx = self.x;
            }
            if grid.is_blocked(self.x, ny) {
                ny = self.y;
            }
        }

        self.x = nx;
        self.y = ny;
    }

    fn tick_timers(&mut self, dt: f32) {
        self.shoot_cooldown = (self.shoot_cooldown - dt).max(0.0);
        self.invulnerable_time = (self.invulnerable_time - dt).max(0.0);
        self.speed_boost_timer = (self.speed_boost_timer - dt).max(0.0);
        self.no_cooldown_timer = (self.no_cooldown_timer - dt).max(0.0);
        self.spread_shot_timer = (self.spread_shot_timer - dt).max(0.0);
    }

    /// Take a hit: costs one life and grants a short invulnerability
    /// window. Invulnerable or already-dead players ignore it.
    pub fn hit(&mut self) {
        if self.invulnerable_time > 0.0 || self.lives == 0 {
            return;
        }
        self.lives -= 1;
        self.invulnerable_time = HIT_INVULNERABILITY;
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_time > 0.0
    }

    pub fn can_shoot(&self) -> bool {
        self.shoot_cooldown <= 0.0
    }

    /// Start the shot cooldown, shortened while the rapid-fire buff is
    /// active.
    pub fn apply_shooting(&mut self) {
        self.shoot_cooldown = if self.no_cooldown_timer > 0.0 {
            RAPID_SHOOT_COOLDOWN
        } else {
            SHOOT_COOLDOWN
        };
    }

    pub fn apply_speed_boost(&mut self) {
        self.speed_boost_timer = BUFF_DURATION;
    }

    pub fn apply_no_cooldown_boost(&mut self) {
        self.no_cooldown_timer = BUFF_DURATION;
    }

    pub fn apply_spread_shot_boost(&mut self) {
        self.spread_shot_timer = BUFF_DURATION;
    }

    pub fn has_speed_boost(&self) -> bool {
        self.speed_boost_timer > 0.0
    }

    pub fn has_no_cooldown(&self) -> bool {
        self.no_cooldown_timer > 0.0
    }

    pub fn has_spread_shot(&self) -> bool {
        self.spread_shot_timer > 0.0
    }

    /// Reset for a fresh match: full lives, cleared fire intent, a new
    /// spawn position. Buff and invulnerability timers carry over.
    pub fn reset_for_match(&mut self, spawn: (f32, f32)) {
        self.lives = STARTING_LIVES;
        self.fire_requested = false;
        self.fire_facing = None;
        self.last_input_ms = crate::util::time::unix_millis();
        self.x = spawn.0;
        self.y = spawn.1;
    }

    pub(super) fn is_up(&self) -> bool {
        self.up
    }

    pub(super) fn is_down(&self) -> bool {
        self.down
    }

    pub(super) fn is_left(&self) -> bool {
        self.left
    }

    pub(super) fn is_right(&self) -> bool {
        self.right
    }
}
