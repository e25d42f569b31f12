//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::game::map::TiledMapLoader;
use crate::game::{Intent, IntentQueue, WorldRegistry};
use crate::ws::ClientRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub clients: Arc<ClientRegistry>,
    pub worlds: Arc<WorldRegistry>,
    pub intents: IntentQueue,
}

impl AppState {
    /// Wire up the shared services. The returned receiver feeds the
    /// input consumer task.
    pub fn new(config: Config) -> (Self, mpsc::Receiver<Intent>) {
        let config = Arc::new(config);

        // Initialize the connection registry
        let clients = Arc::new(ClientRegistry::new(config.max_players_per_world));

        // Initialize the map loader
        let maps = Arc::new(TiledMapLoader::new(
            config.maps_dir.clone(),
            config.default_map.clone(),
        ));

        // Initialize the world registry. The client registry doubles as
        // the roster source and the broadcast sink for every world.
        let worlds = Arc::new(WorldRegistry::new(
            config.default_map.clone(),
            clients.clone(),
            maps,
            clients.clone(),
        ));

        // Bounded intent queue between socket tasks and the consumer
        let (intents, intent_rx) = IntentQueue::new(config.input_queue_capacity);

        (
            Self {
                config,
                clients,
                worlds,
                intents,
            },
            intent_rx,
        )
    }
}
