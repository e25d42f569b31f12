//! Connection registry
//!
//! Tracks which socket belongs to which player and world. The
//! registry doubles as the simulation's registration source (world
//! membership is connection membership) and as its broadcast sink
//! (fan-out walks the sessions of one world).

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::{BroadcastSink, PlayerId, RegistrationSource};

use super::protocol::ServerMsg;

/// Registration errors surfaced to the client
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Game full")]
    WorldFull,
}

/// One registered connection
pub struct ClientSession {
    pub player_id: PlayerId,
    pub world_id: String,
    outbound: mpsc::Sender<ServerMsg>,
}

/// All registered connections, keyed by connection id
pub struct ClientRegistry {
    sessions: DashMap<Uuid, ClientSession>,
    max_players_per_world: usize,
}

impl ClientRegistry {
    pub fn new(max_players_per_world: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_players_per_world,
        }
    }

    /// Seat a connection in a world. Registering again replaces the
    /// connection's previous seat. Fails when the world is at its
    /// player cap.
    pub fn register(
        &self,
        conn_id: Uuid,
        player_id: PlayerId,
        world_id: String,
        outbound: mpsc::Sender<ServerMsg>,
    ) -> Result<(), RegistrationError> {
        let seated = self
            .sessions
            .iter()
            .filter(|s| s.world_id == world_id && *s.key() != conn_id)
            .count();
        if seated >= self.max_players_per_world {
            return Err(RegistrationError::WorldFull);
        }

        info!(conn_id = %conn_id, player_id, world_id = %world_id, "Player registered");
        self.sessions.insert(
            conn_id,
            ClientSession {
                player_id,
                world_id,
                outbound,
            },
        );
        Ok(())
    }

    /// Drop a connection's seat, if it had one
    pub fn unregister(&self, conn_id: Uuid) -> Option<ClientSession> {
        let session = self.sessions.remove(&conn_id).map(|(_, s)| s);
        if let Some(s) = &session {
            info!(conn_id = %conn_id, player_id = s.player_id, world_id = %s.world_id, "Player unregistered");
        }
        session
    }

    /// The world a connection is seated in
    pub fn world_of(&self, conn_id: Uuid) -> Option<String> {
        self.sessions.get(&conn_id).map(|s| s.world_id.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }
}

impl RegistrationSource for ClientRegistry {
    fn list_registered(&self, world_id: &str) -> anyhow::Result<HashSet<PlayerId>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.world_id == world_id)
            .map(|s| s.player_id)
            .collect())
    }
}

impl BroadcastSink for ClientRegistry {
    /// Fan a frame out to every connection in the world. Sends are
    /// non-blocking: a client whose outbound buffer is full loses this
    /// frame rather than stalling the tick.
    fn publish(&self, world_id: &str, msg: &ServerMsg) {
        for session in self.sessions.iter().filter(|s| s.world_id == world_id) {
            match session.outbound.try_send(msg.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(
                        player_id = session.player_id,
                        world_id = %world_id,
                        "Outbound buffer full, dropping frame"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Socket already gone; unregistration will catch up
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<ServerMsg>, mpsc::Receiver<ServerMsg>) {
        mpsc::channel(8)
    }

    #[test]
    fn seats_and_unseats_connections() {
        let registry = ClientRegistry::new(6);
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();

        registry.register(conn, 1, "w1".to_string(), tx).unwrap();
        assert_eq!(registry.world_of(conn).as_deref(), Some("w1"));
        assert_eq!(registry.connection_count(), 1);

        let session = registry.unregister(conn).expect("session existed");
        assert_eq!(session.player_id, 1);
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.world_of(conn), None);
    }

    #[test]
    fn enforces_the_per_world_cap() {
        let registry = ClientRegistry::new(2);
        let (tx, _rx) = channel();

        registry
            .register(Uuid::new_v4(), 1, "w1".to_string(), tx.clone())
            .unwrap();
        registry
            .register(Uuid::new_v4(), 2, "w1".to_string(), tx.clone())
            .unwrap();

        let err = registry
            .register(Uuid::new_v4(), 3, "w1".to_string(), tx.clone())
            .unwrap_err();
        assert_eq!(err.to_string(), "Game full");

        // Another world still has room
        registry
            .register(Uuid::new_v4(), 3, "w2".to_string(), tx)
            .unwrap();
    }

    #[test]
    fn re_registration_moves_the_same_connection() {
        let registry = ClientRegistry::new(1);
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();

        registry.register(conn, 1, "w1".to_string(), tx.clone()).unwrap();
        // The same connection re-registering does not count against
        // its own seat
        registry.register(conn, 1, "w1".to_string(), tx.clone()).unwrap();
        registry.register(conn, 2, "w2".to_string(), tx).unwrap();

        assert_eq!(registry.world_of(conn).as_deref(), Some("w2"));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn lists_player_ids_per_world() {
        let registry = ClientRegistry::new(6);
        let (tx, _rx) = channel();

        registry
            .register(Uuid::new_v4(), 1, "w1".to_string(), tx.clone())
            .unwrap();
        registry
            .register(Uuid::new_v4(), 2, "w1".to_string(), tx.clone())
            .unwrap();
        registry
            .register(Uuid::new_v4(), 7, "w2".to_string(), tx)
            .unwrap();

        let seated = registry.list_registered("w1").unwrap();
        assert_eq!(seated, HashSet::from([1, 2]));
        assert_eq!(registry.list_registered("w2").unwrap(), HashSet::from([7]));
        assert!(registry.list_registered("empty").unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_delivers_to_world_members_only() {
        let registry = ClientRegistry::new(6);
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        registry
            .register(Uuid::new_v4(), 1, "w1".to_string(), tx1)
            .unwrap();
        registry
            .register(Uuid::new_v4(), 2, "w2".to_string(), tx2)
            .unwrap();

        registry.publish("w1", &ServerMsg::GameStart {
            map: "map2".to_string(),
        });

        assert!(matches!(rx1.try_recv(), Ok(ServerMsg::GameStart { .. })));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_drops_frames_for_saturated_clients() {
        let registry = ClientRegistry::new(6);
        let (tx, mut rx) = mpsc::channel(1);
        registry
            .register(Uuid::new_v4(), 1, "w1".to_string(), tx)
            .unwrap();

        let frame = ServerMsg::Pong { ts: 1 };
        registry.publish("w1", &frame);
        registry.publish("w1", &frame);
        registry.publish("w1", &frame);

        // Exactly one frame fit; the rest were shed without blocking
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
