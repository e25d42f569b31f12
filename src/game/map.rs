//! Collision maps
//!
//! A world's walls live in an [`OccupancyGrid`]: a boolean tile grid in
//! pixel space. Grids are loaded from Tiled JSON exports (.tmj) and
//! shared immutably; a map change swaps the whole grid.

use std::path::PathBuf;

use serde::Deserialize;

use super::{LoadedMap, MapSource};

/// Layer names whose tiles count as walls
const COLLISION_LAYERS: [&str; 3] = ["Walls", "Walls2", "Objects"];

/// Default grid dimensions used when no map can be loaded (70x60 tiles
/// of 16px, an open 1120x960 arena)
const DEFAULT_GRID_TILES: (u32, u32) = (70, 60);
const DEFAULT_TILE_SIZE: u32 = 16;

/// Immutable tile occupancy grid queried in pixel coordinates.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    /// Row-major, `true` = blocked
    blocked: Vec<bool>,
}

impl OccupancyGrid {
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32, blocked: Vec<bool>) -> Self {
        debug_assert_eq!(blocked.len(), (width * height) as usize);
        Self {
            width,
            height,
            tile_width,
            tile_height,
            blocked,
        }
    }

    /// A fully open grid of the given dimensions
    pub fn open(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self::new(
            width,
            height,
            tile_width,
            tile_height,
            vec![false; (width * height) as usize],
        )
    }

    /// The fallback arena used when map loading fails
    pub fn open_default() -> Self {
        Self::open(
            DEFAULT_GRID_TILES.0,
            DEFAULT_GRID_TILES.1,
            DEFAULT_TILE_SIZE,
            DEFAULT_TILE_SIZE,
        )
    }

    pub fn pixel_width(&self) -> f32 {
        (self.width * self.tile_width) as f32
    }

    pub fn pixel_height(&self) -> f32 {
        (self.height * self.tile_height) as f32
    }

    /// Whether the pixel position sits on a blocked tile. Coordinates
    /// map to tiles by floor division; anything outside the grid is
    /// treated as blocked.
    pub fn is_blocked(&self, x: f32, y: f32) -> bool {
        let tx = (x / self.tile_width as f32).floor() as i64;
        let ty = (y / self.tile_height as f32).floor() as i64;
        if tx < 0 || ty < 0 || tx >= self.width as i64 || ty >= self.height as i64 {
            return true;
        }
        self.blocked[ty as usize * self.width as usize + tx as usize]
    }
}

/// Map loading errors
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse map file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The subset of the Tiled JSON format we care about. Unknown fields
/// are ignored.
#[derive(Deserialize)]
struct TiledMap {
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    layers: Vec<TiledLayer>,
}

#[derive(Deserialize)]
struct TiledLayer {
    name: String,
    /// Absent on object layers
    #[serde(default)]
    width: u32,
    /// Flat gid array; absent on non-tile layers
    #[serde(default)]
    data: Option<Vec<i64>>,
}

/// Known map ids and their Tiled export files
fn map_file(map_id: &str) -> Option<&'static str> {
    match map_id {
        "map2" => Some("Map2.tmj"),
        "map3" => Some("Map3.tmj"),
        _ => None,
    }
}

/// Loads occupancy grids from Tiled exports on disk. Unknown map ids
/// resolve to the configured default map.
pub struct TiledMapLoader {
    maps_dir: PathBuf,
    default_map: String,
}

impl TiledMapLoader {
    pub fn new(maps_dir: PathBuf, default_map: String) -> Self {
        Self {
            maps_dir,
            default_map,
        }
    }

    fn load_grid(&self, file: &str) -> Result<OccupancyGrid, MapError> {
        let path = self.maps_dir.join(file);
        if !path.exists() {
            return Err(MapError::NotFound(path));
        }
        let raw = std::fs::read_to_string(&path)?;
        let map: TiledMap = serde_json::from_str(&raw)?;

        let mut blocked = vec![false; (map.width * map.height) as usize];
        for layer in &map.layers {
            if !COLLISION_LAYERS.contains(&layer.name.as_str()) || layer.width == 0 {
                continue;
            }
            let Some(data) = &layer.data else { continue };
            for (idx, gid) in data.iter().enumerate() {
                // Any placed tile blocks; high bits may carry Tiled flip flags
                if *gid <= 0 {
                    continue;
                }
                let x = idx as u32 % layer.width;
                let y = idx as u32 / layer.width;
                if x < map.width && y < map.height {
                    blocked[(y * map.width + x) as usize] = true;
                }
            }
        }

        Ok(OccupancyGrid::new(
            map.width,
            map.height,
            map.tilewidth,
            map.tileheight,
            blocked,
        ))
    }
}

impl MapSource for TiledMapLoader {
    fn load(&self, map_id: &str) -> anyhow::Result<LoadedMap> {
        let requested = map_id.trim();
        let (id, file) = match map_file(requested) {
            Some(file) => (requested.to_string(), file),
            None => match map_file(&self.default_map) {
                Some(file) => (self.default_map.clone(), file),
                None => anyhow::bail!(
                    "no map file for {requested:?} or default {:?}",
                    self.default_map
                ),
            },
        };
        let grid = self.load_grid(file)?;
        Ok(LoadedMap { id, grid })
    }
}
