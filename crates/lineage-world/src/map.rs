//! The tile map: biome grid, chunk bookkeeping, and the sparse object grid.
//!
//! At most one object occupies a tile; the object map is keyed by tile so a
//! second placement replaces the first.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::autosave::AutoSave;
use crate::biome::{Biome, WorldParams};
use crate::coord::{TileCoord, CHUNK_SIZE, MAP_SIZE, TILE_SIZE};
use crate::error::WorldError;
use crate::generator::{ChunkGenerator, SpawnTables};
use crate::storage::WorldSave;

/// Object type id meaning "nothing here".
pub const OBJECT_NONE: u32 = 0;
const SPAWN_ATTEMPTS: usize = 100;

/// Wire snapshot of the map sent to clients on join and reset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    pub tiles: Vec<Vec<Biome>>,
    pub objects: BTreeMap<String, u32>,
    pub objects_data: BTreeMap<String, Value>,
}

pub struct WorldMap {
    size: i32,
    seed: u64,
    params: WorldParams,
    generator: ChunkGenerator,
    spawns: SpawnTables,
    tiles: Vec<Vec<Biome>>,
    chunks: HashSet<(i32, i32)>,
    objects: HashMap<TileCoord, u32>,
    objects_data: HashMap<TileCoord, Value>,
    autosave: AutoSave,
}

impl WorldMap {
    /// Generate a full map of the default size.
    pub fn generate(seed: u64, params: WorldParams, spawns: SpawnTables) -> Self {
        Self::with_size(MAP_SIZE, seed, params, spawns)
    }

    pub fn with_size(size: i32, seed: u64, params: WorldParams, spawns: SpawnTables) -> Self {
        let mut map = Self::empty(size, seed, params, spawns);
        map.generate_all();
        map
    }

    /// A map with every tile set to `biome` and no objects.
    pub fn filled(size: i32, biome: Biome) -> Self {
        let mut map = Self::empty(size, 0, WorldParams::default(), SpawnTables::default());
        map.tiles = vec![vec![biome; size as usize]; size as usize];
        map.mark_all_chunks();
        map
    }

    /// Restore a saved map. Every chunk counts as generated so nothing respawns.
    pub fn from_save(save: WorldSave, spawns: SpawnTables) -> Result<Self, WorldError> {
        let size = save.tiles.len();
        if size < CHUNK_SIZE as usize {
            return Err(WorldError::BadTileGrid {
                rows: size,
                cols: save.tiles.first().map_or(0, Vec::len),
                expected: CHUNK_SIZE as usize,
            });
        }
        if let Some(row) = save.tiles.iter().find(|row| row.len() != size) {
            return Err(WorldError::BadTileGrid {
                rows: size,
                cols: row.len(),
                expected: size,
            });
        }
        let mut map = Self::empty(size as i32, save.seed, save.params, spawns);
        map.tiles = save.tiles;
        for (key, type_id) in save.objects {
            let tile: TileCoord = key.parse()?;
            if type_id != OBJECT_NONE {
                map.objects.insert(tile, type_id);
            }
        }
        for (key, data) in save.objects_data {
            let tile: TileCoord = key.parse()?;
            if map.objects.contains_key(&tile) {
                map.objects_data.insert(tile, data);
            }
        }
        map.mark_all_chunks();
        info!(seed = map.seed, objects = map.objects.len(), "loaded saved world");
        Ok(map)
    }

    fn empty(size: i32, seed: u64, params: WorldParams, spawns: SpawnTables) -> Self {
        Self {
            size,
            seed,
            generator: ChunkGenerator::new(seed, &params, size, spawns.clone()),
            params,
            spawns,
            tiles: vec![vec![Biome::Water; size as usize]; size as usize],
            chunks: HashSet::new(),
            objects: HashMap::new(),
            objects_data: HashMap::new(),
            autosave: AutoSave::default(),
        }
    }

    fn chunks_per_side(&self) -> i32 {
        (self.size + CHUNK_SIZE - 1) / CHUNK_SIZE
    }

    fn mark_all_chunks(&mut self) {
        let n = self.chunks_per_side();
        for cy in 0..n {
            for cx in 0..n {
                self.chunks.insert((cx, cy));
            }
        }
    }

    fn generate_all(&mut self) {
        let n = self.chunks_per_side();
        for cy in 0..n {
            for cx in 0..n {
                self.generate_chunk(cx, cy);
            }
        }
        let counts = self.biome_counts();
        info!(seed = self.seed, chunks = n * n, ?counts, "generated world");
        if counts.get(&Biome::Water).copied().unwrap_or(0) == 0 {
            warn!("no water tiles generated");
        }
    }

    fn generate_chunk(&mut self, cx: i32, cy: i32) {
        if !self.chunks.insert((cx, cy)) {
            return;
        }
        let chunk = self.generator.generate(cx, cy);
        for (tile, biome) in chunk.tiles {
            self.tiles[tile.y as usize][tile.x as usize] = biome;
        }
        for (tile, type_id) in chunk.objects {
            self.objects.insert(tile, type_id);
        }
    }

    /// Generate the chunk containing `(x, y)` if it has not been generated.
    /// Returns `true` if generation ran.
    pub fn ensure_chunk_at(&mut self, x: i32, y: i32) -> bool {
        let tile = TileCoord::new(x, y);
        if !tile.in_bounds(self.size) {
            return false;
        }
        let (cx, cy) = tile.chunk();
        if self.chunks.contains(&(cx, cy)) {
            return false;
        }
        self.generate_chunk(cx, cy);
        true
    }

    /// Throw away everything and generate from a new seed.
    pub fn regenerate(&mut self, seed: u64) {
        let spawns = self.spawns.clone();
        let params = self.params.clone();
        let autosave = std::mem::take(&mut self.autosave);
        *self = Self::empty(self.size, seed, params, spawns);
        self.autosave = autosave;
        self.generate_all();
        self.autosave.request_now(Instant::now());
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    /// New parameters apply from the next regeneration.
    pub fn set_params(&mut self, params: WorldParams) {
        self.params = params;
    }

    pub fn set_spawn_tables(&mut self, spawns: SpawnTables) {
        self.generator.set_spawns(spawns.clone());
        self.spawns = spawns;
    }

    /// Procedural biome for a tile, independent of the stored grid.
    pub fn biome(&self, x: i32, y: i32) -> Biome {
        self.generator.biome_at(x, y)
    }

    /// Stored biome; water outside the map.
    pub fn biome_at(&self, tile: TileCoord) -> Biome {
        if !tile.in_bounds(self.size) {
            return Biome::Water;
        }
        self.tiles[tile.y as usize][tile.x as usize]
    }

    pub fn is_passable(&self, tile: TileCoord) -> bool {
        self.biome_at(tile).is_passable()
    }

    pub fn object_at(&self, tile: TileCoord) -> Option<u32> {
        self.objects.get(&tile).copied()
    }

    pub fn object_data(&self, tile: TileCoord) -> Option<&Value> {
        self.objects_data.get(&tile)
    }

    pub fn is_empty(&self, tile: TileCoord) -> bool {
        !self.objects.contains_key(&tile)
    }

    pub fn objects(&self) -> impl Iterator<Item = (TileCoord, u32)> + '_ {
        self.objects.iter().map(|(t, id)| (*t, *id))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn biome_counts(&self) -> BTreeMap<Biome, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.tiles {
            for biome in row {
                *counts.entry(*biome).or_insert(0) += 1;
            }
        }
        counts
    }

    // ─── Mutation ───────────────────────────────────────────────────────────

    /// Place an object, replacing whatever was there. `OBJECT_NONE` removes.
    /// Returns `false` for tiles outside the map.
    pub fn set_object(&mut self, tile: TileCoord, type_id: u32, data: Option<Value>) -> bool {
        if !tile.in_bounds(self.size) {
            return false;
        }
        if type_id == OBJECT_NONE {
            self.objects.remove(&tile);
            self.objects_data.remove(&tile);
        } else {
            self.objects.insert(tile, type_id);
            match data {
                Some(data) if !data.is_null() => {
                    self.objects_data.insert(tile, data);
                }
                _ => {
                    self.objects_data.remove(&tile);
                }
            }
        }
        self.autosave.schedule(Instant::now());
        true
    }

    /// Replace only the payload of an existing object.
    pub fn set_object_data(&mut self, tile: TileCoord, data: Value) -> bool {
        if !self.objects.contains_key(&tile) {
            return false;
        }
        self.objects_data.insert(tile, data);
        self.autosave.schedule(Instant::now());
        true
    }

    pub fn remove_object(&mut self, tile: TileCoord) -> Option<(u32, Option<Value>)> {
        let type_id = self.objects.remove(&tile)?;
        let data = self.objects_data.remove(&tile);
        self.autosave.schedule(Instant::now());
        Some((type_id, data))
    }

    pub fn clear_objects(&mut self) {
        self.objects.clear();
        self.objects_data.clear();
        self.autosave.schedule(Instant::now());
    }

    /// Pixel center of a random passable tile, or the map center after
    /// [`SPAWN_ATTEMPTS`] misses.
    pub fn random_passable_pos(&self, rng: &mut impl Rng) -> (f32, f32) {
        let attempts = if self.size > 0 { SPAWN_ATTEMPTS } else { 0 };
        for _ in 0..attempts {
            let tile = TileCoord::new(rng.gen_range(0..self.size), rng.gen_range(0..self.size));
            if self.is_passable(tile) {
                return tile.center();
            }
        }
        let center = (self.size / 2) as f32 * TILE_SIZE;
        (center, center)
    }

    // ─── Persistence ────────────────────────────────────────────────────────

    pub fn state(&self) -> WorldState {
        WorldState {
            tiles: self.tiles.clone(),
            objects: self.objects.iter().map(|(t, id)| (t.to_string(), *id)).collect(),
            objects_data: self
                .objects_data
                .iter()
                .map(|(t, v)| (t.to_string(), v.clone()))
                .collect(),
        }
    }

    pub fn snapshot(&self) -> WorldSave {
        let state = self.state();
        WorldSave {
            seed: self.seed,
            params: self.params.clone(),
            tiles: state.tiles,
            objects: state.objects,
            objects_data: state.objects_data,
            saved_at: Utc::now(),
        }
    }

    /// A snapshot to write if the auto-save policy says a save is due.
    pub fn take_due_save(&mut self, now: Instant) -> Option<WorldSave> {
        self.autosave.poll(now).then(|| self.snapshot())
    }

    /// A snapshot of the pending save regardless of timing (shutdown path).
    pub fn flush_auto_save(&mut self) -> Option<WorldSave> {
        self.autosave.take_pending().then(|| self.snapshot())
    }

    pub fn request_save_now(&mut self) {
        self.autosave.request_now(Instant::now());
    }

    pub fn finish_save(&mut self, ok: bool, now: Instant) {
        self.autosave.finish(ok, now);
    }

    pub fn autosave(&self) -> &AutoSave {
        &self.autosave
    }
}
