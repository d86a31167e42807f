//! Chunk generation: biome tiles plus deterministic object spawns.
//!
//! Each biome carries a cumulative-probability spawn table; a seeded per-tile
//! roll walks the table and the first entry whose running total exceeds the
//! roll is placed. Same seed, same map.

use std::collections::HashMap;

use crate::biome::{Biome, BiomeSampler, WorldParams};
use crate::coord::{TileCoord, CHUNK_SIZE};
use crate::noise::ValueNoise;

const SPAWN_SEED_OFFSET: u64 = 99_999;
/// Resources restricted to a single biome spawn more densely there.
const SINGLE_BIOME_BOOST: f64 = 1.5;

/// Whether a spawn candidate is a static resource or a live animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Resource,
    Animal,
}

/// One spawnable object type as described by the registry.
#[derive(Debug, Clone)]
pub struct SpawnCandidate {
    pub type_id: u32,
    pub rate: f64,
    /// Empty means the kind's default biomes.
    pub biomes: Vec<Biome>,
    pub kind: SpawnKind,
}

/// Per-biome weighted spawn lists.
#[derive(Debug, Clone, Default)]
pub struct SpawnTables {
    tables: HashMap<Biome, Vec<(u32, f64)>>,
}

impl SpawnTables {
    pub fn build(candidates: &[SpawnCandidate]) -> Self {
        let mut tables: HashMap<Biome, Vec<(u32, f64)>> = HashMap::new();
        for c in candidates.iter().filter(|c| c.rate > 0.0) {
            let biomes = match (c.biomes.is_empty(), c.kind) {
                (false, _) => c.biomes.clone(),
                (true, SpawnKind::Resource) => vec![Biome::Grassland],
                (true, SpawnKind::Animal) => vec![Biome::Grassland, Biome::Forest],
            };
            let rate = if c.kind == SpawnKind::Resource && biomes.len() == 1 {
                c.rate * SINGLE_BIOME_BOOST
            } else {
                c.rate
            };
            for biome in biomes {
                tables.entry(biome).or_default().push((c.type_id, rate));
            }
        }
        Self { tables }
    }

    /// Pick the object for a roll in [0, 1), if any.
    pub fn pick(&self, biome: Biome, roll: f64) -> Option<u32> {
        let mut cumulative = 0.0;
        for &(type_id, rate) in self.tables.get(&biome)? {
            cumulative += rate;
            if roll < cumulative {
                return Some(type_id);
            }
        }
        None
    }

    pub fn entries(&self, biome: Biome) -> &[(u32, f64)] {
        self.tables.get(&biome).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Output of generating one chunk.
#[derive(Debug, Clone)]
pub struct GeneratedChunk {
    /// `(tile, biome)` for every in-bounds tile of the chunk.
    pub tiles: Vec<(TileCoord, Biome)>,
    pub objects: Vec<(TileCoord, u32)>,
}

/// Generates chunks for one seed.
pub struct ChunkGenerator {
    size: i32,
    sampler: BiomeSampler,
    spawn_noise: ValueNoise,
    spawns: SpawnTables,
}

impl ChunkGenerator {
    pub fn new(seed: u64, params: &WorldParams, size: i32, spawns: SpawnTables) -> Self {
        Self {
            size,
            sampler: BiomeSampler::new(seed, params, size),
            spawn_noise: ValueNoise::new(seed.wrapping_add(SPAWN_SEED_OFFSET)),
            spawns,
        }
    }

    pub fn biome_at(&self, x: i32, y: i32) -> Biome {
        if !TileCoord::new(x, y).in_bounds(self.size) {
            return Biome::Water;
        }
        self.sampler.biome_at(x, y)
    }

    pub fn set_spawns(&mut self, spawns: SpawnTables) {
        self.spawns = spawns;
    }

    pub fn generate(&self, chunk_x: i32, chunk_y: i32) -> GeneratedChunk {
        let mut chunk = GeneratedChunk {
            tiles: Vec::with_capacity((CHUNK_SIZE * CHUNK_SIZE) as usize),
            objects: Vec::new(),
        };
        let start_x = chunk_x * CHUNK_SIZE;
        let start_y = chunk_y * CHUNK_SIZE;

        for ly in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let tile = TileCoord::new(start_x + lx, start_y + ly);
                // Outside the map is open ocean; nothing is stored for it.
                if !tile.in_bounds(self.size) {
                    continue;
                }
                let biome = self.sampler.biome_at(tile.x, tile.y);
                chunk.tiles.push((tile, biome));

                let roll = self.spawn_noise.lattice(tile.x, tile.y);
                if let Some(type_id) = self.spawns.pick(biome, roll) {
                    chunk.objects.push((tile, type_id));
                }
            }
        }
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<SpawnCandidate> {
        vec![
            SpawnCandidate {
                type_id: 1,
                rate: 0.1,
                biomes: vec![],
                kind: SpawnKind::Resource,
            },
            SpawnCandidate {
                type_id: 2,
                rate: 0.2,
                biomes: vec![Biome::Desert, Biome::Grassland],
                kind: SpawnKind::Resource,
            },
            SpawnCandidate {
                type_id: 50,
                rate: 0.05,
                biomes: vec![],
                kind: SpawnKind::Animal,
            },
            SpawnCandidate {
                type_id: 9,
                rate: 0.0,
                biomes: vec![],
                kind: SpawnKind::Resource,
            },
        ]
    }

    #[test]
    fn default_biomes_and_boost() {
        let tables = SpawnTables::build(&candidates());
        let grass = tables.entries(Biome::Grassland);
        assert_eq!(grass.len(), 3);
        assert_eq!(grass[0].0, 1);
        assert!((grass[0].1 - 0.15).abs() < 1e-9);
        assert!((grass[1].1 - 0.2).abs() < 1e-9);
        assert_eq!(tables.entries(Biome::Forest), &[(50, 0.05)]);
        assert_eq!(tables.entries(Biome::Desert), &[(2, 0.2)]);
        assert!(tables.entries(Biome::Water).is_empty());
    }

    #[test]
    fn pick_walks_cumulative_rates() {
        let tables = SpawnTables::build(&candidates());
        assert_eq!(tables.pick(Biome::Grassland, 0.0), Some(1));
        assert_eq!(tables.pick(Biome::Grassland, 0.149), Some(1));
        assert_eq!(tables.pick(Biome::Grassland, 0.2), Some(2));
        assert_eq!(tables.pick(Biome::Grassland, 0.36), Some(50));
        assert_eq!(tables.pick(Biome::Grassland, 0.9), None);
        assert_eq!(tables.pick(Biome::Water, 0.0), None);
    }

    #[test]
    fn generation_is_deterministic() {
        let params = WorldParams::default();
        let a = ChunkGenerator::new(31, &params, 40, SpawnTables::build(&candidates()));
        let b = ChunkGenerator::new(31, &params, 40, SpawnTables::build(&candidates()));
        let ca = a.generate(1, 0);
        let cb = b.generate(1, 0);
        assert_eq!(ca.tiles, cb.tiles);
        assert_eq!(ca.objects, cb.objects);
    }

    #[test]
    fn partial_chunk_skips_out_of_bounds() {
        let g = ChunkGenerator::new(3, &WorldParams::default(), 20, SpawnTables::default());
        let chunk = g.generate(1, 1);
        // Only tiles 16..20 on each axis are inside a 20-wide map.
        assert_eq!(chunk.tiles.len(), 16);
        assert_eq!(g.biome_at(25, 3), Biome::Water);
    }
}
