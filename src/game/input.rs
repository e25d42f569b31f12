//! Player intents
//!
//! The boundary layer parses raw action strings into the closed
//! [`InputAction`] enum and submits envelopes through a bounded queue.
//! A dedicated consumer task drains the queue and applies intents to
//! worlds; ticks never see a partially applied input.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ws::protocol::Facing;

use super::{PlayerId, WorldRegistry};

/// A parsed player action
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    Up,
    Down,
    Left,
    Right,
    StopUp,
    StopDown,
    StopLeft,
    StopRight,
    /// Fire a projectile, optionally with an explicit direction
    Fire { facing: Option<Facing> },
    /// Start (or restart) the match, optionally switching maps
    Start { map: Option<String> },
}

impl InputAction {
    /// Parse a wire action string. Action names are exact and
    /// case-sensitive; anything unknown yields `None` and the caller
    /// drops it.
    pub fn parse(action: &str, payload: Option<&str>) -> Option<Self> {
        match action {
            "UP" => Some(Self::Up),
            "DOWN" => Some(Self::Down),
            "LEFT" => Some(Self::Left),
            "RIGHT" => Some(Self::Right),
            "STOP_UP" => Some(Self::StopUp),
            "STOP_DOWN" => Some(Self::StopDown),
            "STOP_LEFT" => Some(Self::StopLeft),
            "STOP_RIGHT" => Some(Self::StopRight),
            "FIRE" => Some(Self::Fire {
                facing: payload.and_then(Facing::parse),
            }),
            "START" => Some(Self::Start {
                map: payload
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
            }),
            _ => None,
        }
    }
}

/// An intent envelope: which world, which player, what action
#[derive(Debug, Clone)]
pub struct Intent {
    pub world_id: String,
    pub player_id: PlayerId,
    pub action: InputAction,
}

/// Producer half of the bounded intent queue. Submission never blocks:
/// when the queue is full the intent is dropped, which sheds load from
/// a flooding client instead of stalling socket tasks.
#[derive(Clone)]
pub struct IntentQueue {
    tx: mpsc::Sender<Intent>,
}

impl IntentQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Intent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn submit(&self, intent: Intent) {
        match self.tx.try_send(intent) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(intent)) => {
                warn!(
                    world_id = %intent.world_id,
                    player_id = intent.player_id,
                    "intent queue full, dropping input"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("intent queue closed, dropping input");
            }
        }
    }
}

/// Drain intents into worlds until shutdown. Worlds are created on
/// first reference, so an intent naming a new world id brings that
/// world up.
pub fn spawn_input_consumer(
    mut rx: mpsc::Receiver<Intent>,
    worlds: Arc<WorldRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                maybe = rx.recv() => match maybe {
                    Some(intent) => {
                        let world = worlds.get_or_create(&intent.world_id);
                        world.apply_input(intent.player_id, intent.action);
                    }
                    None => break,
                },
            }
        }
        info!("Input consumer stopped");
    })
}
