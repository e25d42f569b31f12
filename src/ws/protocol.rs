//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::{PlayerId, PowerupId, ProjectileId};

/// Cardinal facing, used both for display and as a fire direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    /// Parse a facing from a fire payload, case-insensitively.
    /// Anything unrecognized yields `None` and the shot falls back to
    /// the shooter's movement direction.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("up") {
            Some(Self::Up)
        } else if s.eq_ignore_ascii_case("down") {
            Some(Self::Down)
        } else if s.eq_ignore_ascii_case("left") {
            Some(Self::Left)
        } else if s.eq_ignore_ascii_case("right") {
            Some(Self::Right)
        } else {
            None
        }
    }
}

impl Default for Facing {
    fn default() -> Self {
        Self::Up
    }
}

/// Powerup varieties placed on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerupKind {
    /// 1.5x movement speed
    Speed,
    /// Near-instant shot cooldown
    NoCooldown,
    /// Three projectiles per shot in a 30-degree fan
    SpreadShot,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Claim a player id and take a seat in a game world
    #[serde(rename_all = "camelCase")]
    Register {
        /// Client-chosen numeric player id
        player_id: PlayerId,
        /// Target world, or the default world if omitted
        game_id: Option<String>,
    },

    /// Player action (movement, firing, match start)
    #[serde(rename_all = "camelCase")]
    Input {
        player_id: PlayerId,
        /// Action name, e.g. "UP", "STOP_UP", "FIRE", "START"
        action: String,
        /// Action argument: facing for FIRE, map id for START
        payload: Option<String>,
    },

    /// Ping for latency measurement
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Registration acknowledged
    #[serde(rename_all = "camelCase")]
    Registered { player_id: PlayerId },

    /// Authoritative world snapshot (sent at regular intervals)
    State {
        players: Vec<PlayerView>,
        projectiles: Vec<ProjectileView>,
        powerups: Vec<PowerupView>,
        /// Map id currently in play
        map: String,
        /// Whether a match is in progress
        running: bool,
    },

    /// A match has started on this world
    GameStart { map: String },

    /// The match ended; `winner` is absent on a mutual knockout
    GameOver {
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<PlayerId>,
    },

    /// Pong response with server timestamp in Unix millis
    Pong { ts: u64 },

    /// Error message
    Error { message: String },
}

/// Player state in a snapshot (dead players are omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub lives: u32,
    /// Seconds of post-hit invulnerability remaining
    pub invulnerable_time: f32,
    pub has_speed_boost: bool,
    pub speed_boost_timer: f32,
    pub has_no_cooldown: bool,
    pub has_spread_shot: bool,
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileView {
    pub id: ProjectileId,
    /// Player id of the shooter
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

/// Powerup state in a snapshot; collected powerups stay listed as
/// inactive until they respawn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerupView {
    pub id: PowerupId,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PowerupKind,
    pub active: bool,
}
