//! Powerup simulation state

use crate::ws::protocol::PowerupKind;

use super::PowerupId;

/// Pickup distance from powerup center to player center
pub const PICKUP_RADIUS: f32 = 20.0;
/// Seconds a collected powerup stays inactive
pub const RESPAWN_TIME: f32 = 10.0;
/// Reposition cycle length; the timer runs but positions are fixed
const REPOSITION_INTERVAL: f32 = 15.0;

/// The fixed powerup layout every world starts with
pub fn default_layout() -> [(f32, f32, PowerupKind); 3] {
    [
        (150.0, 200.0, PowerupKind::Speed),
        (490.0, 200.0, PowerupKind::NoCooldown),
        (320.0, 350.0, PowerupKind::SpreadShot),
    ]
}

/// A powerup pad. Collection deactivates it; it respawns in place
/// after [`RESPAWN_TIME`].
#[derive(Debug, Clone)]
pub struct Powerup {
    pub id: PowerupId,
    pub x: f32,
    pub y: f32,
    pub kind: PowerupKind,
    pub active: bool,
    pub respawn_timer: f32,
    reposition_timer: f32,
}

impl Powerup {
    pub fn new(id: PowerupId, x: f32, y: f32, kind: PowerupKind) -> Self {
        Self {
            id,
            x,
            y,
            kind,
            active: true,
            respawn_timer: 0.0,
            reposition_timer: REPOSITION_INTERVAL,
        }
    }

    pub fn update(&mut self, dt: f32) {
        if !self.active {
            self.respawn_timer -= dt;
            if self.respawn_timer <= 0.0 {
                self.active = true;
            }
        }

        self.reposition_timer -= dt;
        if self.reposition_timer <= 0.0 {
            self.reposition_timer = REPOSITION_INTERVAL;
        }
    }

    pub fn collect(&mut self) {
        self.active = false;
        self.respawn_timer = RESPAWN_TIME;
    }

    /// Whether a player at the given position picks this powerup up
    pub fn check_collision(&self, px: f32, py: f32) -> bool {
        if !self.active {
            return false;
        }
        let dx = self.x - px;
        let dy = self.y - py;
        (dx * dx + dy * dy).sqrt() < PICKUP_RADIUS
    }
}
