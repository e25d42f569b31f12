//! Projectile simulation state

use std::sync::Arc;

use super::map::OccupancyGrid;
use super::{PlayerId, ProjectileId};

/// Projectile speed in px/s
pub const PROJECTILE_SPEED: f32 = 400.0;
/// Seconds a projectile lives if nothing stops it
pub const PROJECTILE_LIFESPAN: f32 = 5.0;
/// Max distance between wall samples along a tick's travel path
const SAMPLE_STEP: f32 = 4.0;

/// Bounds slack before a projectile counts as out of the world
const DEFAULT_MARGIN: f32 = 10.0;
const DEFAULT_BOUNDS: (f32, f32) = (1120.0, 960.0);

/// One projectile in flight. Dead projectiles (`life == 0`) are swept
/// by the game loop at the end of the tick.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,

    bounds: (f32, f32),
    margin: f32,
    grid: Option<Arc<OccupancyGrid>>,
}

impl Projectile {
    pub fn new(id: ProjectileId, owner: PlayerId, x: f32, y: f32, vx: f32, vy: f32) -> Self {
        Self {
            id,
            owner,
            x,
            y,
            vx,
            vy,
            life: PROJECTILE_LIFESPAN,
            bounds: DEFAULT_BOUNDS,
            margin: DEFAULT_MARGIN,
            grid: None,
        }
    }

    pub fn set_bounds(&mut self, width: f32, height: f32, margin: f32) {
        self.bounds = (width, height);
        self.margin = margin;
    }

    pub fn set_grid(&mut self, grid: Arc<OccupancyGrid>) {
        self.grid = Some(grid);
    }

    /// Advance one tick. The travel segment is sampled at most
    /// [`SAMPLE_STEP`] px apart so a fast projectile cannot tunnel
    /// through a one-tile wall; hitting a wall kills it in place
    /// without moving.
    pub fn update(&mut self, dt: f32) {
        if self.life <= 0.0 {
            return;
        }

        let tx = self.x + self.vx * dt;
        let ty = self.y + self.vy * dt;

        if let Some(grid) = &self.grid {
            let dx = tx - self.x;
            let dy = ty - self.y;
            let dist = (dx * dx + dy * dy).sqrt();
            let steps = ((dist / SAMPLE_STEP).ceil() as i32).max(1);
            for i in 1..=steps {
                let t = i as f32 / steps as f32;
                if grid.is_blocked(self.x + dx * t, self.y + dy * t) {
                    self.life = 0.0;
                    return;
                }
            }
        }

        self.x = tx;
        self.y = ty;
        self.life -= dt;
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }

    /// True once the projectile leaves the world rect expanded by its
    /// margin.
    pub fn is_out_of_bounds(&self) -> bool {
        let (width, height) = self.bounds;
        self.x < -self.margin
            || self.x > width + self.margin
            || self.y < -self.margin
            || self.y > height + self.margin
    }
}
