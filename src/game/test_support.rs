//! Shared stubs for simulation tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ws::protocol::ServerMsg;

use super::map::OccupancyGrid;
use super::{
    BroadcastSink, LoadedMap, MapSource, PlayerId, RegistrationSource, World, WorldRegistry,
};

/// In-memory registration source with scriptable membership and
/// failure injection.
#[derive(Default)]
pub struct StubRoster {
    seats: Mutex<HashMap<String, HashSet<PlayerId>>>,
    fail: AtomicBool,
}

impl StubRoster {
    pub fn set(&self, world_id: &str, ids: impl IntoIterator<Item = PlayerId>) {
        self.seats
            .lock()
            .insert(world_id.to_string(), ids.into_iter().collect());
    }

    pub fn fail_queries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl RegistrationSource for StubRoster {
    fn list_registered(&self, world_id: &str) -> anyhow::Result<HashSet<PlayerId>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("roster offline");
        }
        Ok(self
            .seats
            .lock()
            .get(world_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Map source serving a 640x480 arena (40x30 tiles of 16px) for any
/// requested id, with optional wall tiles and failure injection.
#[derive(Default)]
pub struct StubMaps {
    walls: Mutex<HashSet<(u32, u32)>>,
    fail: AtomicBool,
}

impl StubMaps {
    pub fn block(&self, tx: u32, ty: u32) {
        self.walls.lock().insert((tx, ty));
    }

    pub fn fail_loads(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl MapSource for StubMaps {
    fn load(&self, map_id: &str) -> anyhow::Result<LoadedMap> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("map store offline");
        }
        let (width, height) = (40u32, 30u32);
        let mut cells = vec![false; (width * height) as usize];
        for (tx, ty) in self.walls.lock().iter() {
            cells[(ty * width + tx) as usize] = true;
        }
        Ok(LoadedMap {
            id: map_id.trim().to_string(),
            grid: OccupancyGrid::new(width, height, 16, 16, cells),
        })
    }
}

/// Broadcast sink that records everything published per world
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, ServerMsg)>>,
}

impl RecordingSink {
    pub fn for_world(&self, world_id: &str) -> Vec<ServerMsg> {
        self.messages
            .lock()
            .iter()
            .filter(|(w, _)| w == world_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl BroadcastSink for RecordingSink {
    fn publish(&self, world_id: &str, msg: &ServerMsg) {
        self.messages
            .lock()
            .push((world_id.to_string(), msg.clone()));
    }
}

/// A world wired to fresh stubs, with the given ids pre-registered
pub fn stub_world(
    id: &str,
    registered: &[PlayerId],
) -> (Arc<World>, Arc<StubRoster>, Arc<StubMaps>, Arc<RecordingSink>) {
    let roster = Arc::new(StubRoster::default());
    let maps = Arc::new(StubMaps::default());
    let sink = Arc::new(RecordingSink::default());
    roster.set(id, registered.iter().copied());
    let world = Arc::new(World::new(
        id.to_string(),
        "map2",
        roster.clone(),
        maps.clone(),
        sink.clone(),
    ));
    (world, roster, maps, sink)
}

/// A registry wired to fresh stubs
pub fn stub_registry() -> (
    Arc<WorldRegistry>,
    Arc<StubRoster>,
    Arc<StubMaps>,
    Arc<RecordingSink>,
) {
    let roster = Arc::new(StubRoster::default());
    let maps = Arc::new(StubMaps::default());
    let sink = Arc::new(RecordingSink::default());
    let registry = Arc::new(WorldRegistry::new(
        "map2".to_string(),
        roster.clone(),
        maps.clone(),
        sink.clone(),
    ));
    (registry, roster, maps, sink)
}
