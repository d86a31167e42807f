//! Biome selection from elevation and moisture noise.
//!
//! Elevation is pulled down near the map border so the world is ringed by
//! water; an optional spawn-protection radius keeps the center dry.

use serde::{Deserialize, Serialize};

use crate::noise::{FractalNoise, ValueNoise};

/// Ground type of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    Grassland,
    Desert,
    Swamp,
    Forest,
    Water,
}

impl Biome {
    pub const ALL: [Biome; 5] = [
        Biome::Grassland,
        Biome::Desert,
        Biome::Swamp,
        Biome::Forest,
        Biome::Water,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Biome::Grassland => "grassland",
            Biome::Desert => "desert",
            Biome::Swamp => "swamp",
            Biome::Forest => "forest",
            Biome::Water => "water",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Only water blocks walking. Boats are handled by the caller.
    pub fn is_passable(self) -> bool {
        self != Biome::Water
    }
}

/// Terrain generation tunables. Persisted alongside the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldParams {
    pub noise_scale: f64,
    pub noise_octaves: usize,
    pub noise_persistence: f64,
    pub water_threshold: f64,
    pub water_pocket_threshold: f64,
    pub water_pocket_chance: f64,
    pub edge_bias_start: f64,
    pub edge_bias_strength: f64,
    pub spawn_protection_radius: f64,
    pub swamp_elevation: f64,
    pub swamp_moisture: f64,
    pub forest_moisture: f64,
    pub desert_moisture: f64,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            noise_scale: 80.0,
            noise_octaves: 4,
            noise_persistence: 0.5,
            water_threshold: 0.28,
            water_pocket_threshold: 0.32,
            water_pocket_chance: 0.35,
            edge_bias_start: 0.80,
            edge_bias_strength: 3.0,
            spawn_protection_radius: 0.0,
            swamp_elevation: 0.35,
            swamp_moisture: 0.55,
            forest_moisture: 0.60,
            desert_moisture: 0.35,
        }
    }
}

const MOISTURE_SEED_OFFSET: u64 = 50_000;
const POCKET_SEED_OFFSET: u64 = 60_000;
const POCKET_SCALE: f64 = 35.0;

/// Pure `(seed, x, y) -> Biome` function over a square map.
pub struct BiomeSampler {
    size: i32,
    params: WorldParams,
    elevation: FractalNoise,
    moisture: FractalNoise,
    pockets: ValueNoise,
}

impl BiomeSampler {
    pub fn new(seed: u64, params: &WorldParams, size: i32) -> Self {
        Self {
            size,
            params: params.clone(),
            elevation: FractalNoise::new(
                seed,
                params.noise_octaves,
                params.noise_persistence,
                params.noise_scale,
            ),
            moisture: FractalNoise::new(seed.wrapping_add(MOISTURE_SEED_OFFSET), 3, 0.5, 60.0),
            pockets: ValueNoise::new(seed.wrapping_add(POCKET_SEED_OFFSET)),
        }
    }

    pub fn biome_at(&self, x: i32, y: i32) -> Biome {
        let p = &self.params;
        let (fx, fy) = (x as f64, y as f64);
        let elevation = self.elevation.sample(fx, fy);
        let moisture = self.moisture.sample(fx, fy);

        let half = self.size as f64 / 2.0;
        let dx = fx - half;
        let dy = fy - half;
        let normalized_dist = (dx * dx + dy * dy).sqrt() / half;

        let edge_bias = (dx.abs() / half).max(dy.abs() / half);
        let biased = if edge_bias > p.edge_bias_start {
            elevation - (edge_bias - p.edge_bias_start) * p.edge_bias_strength
        } else {
            elevation
        };

        let protected = p.spawn_protection_radius > 0.0 && normalized_dist < p.spawn_protection_radius;
        if !protected {
            if biased < p.water_threshold {
                return Biome::Water;
            }
            if biased < p.water_pocket_threshold
                && self.pockets.smooth(fx, fy, POCKET_SCALE) < p.water_pocket_chance
            {
                return Biome::Water;
            }
        }

        if elevation < p.swamp_elevation && moisture > p.swamp_moisture {
            Biome::Swamp
        } else if moisture > p.forest_moisture {
            Biome::Forest
        } else if moisture < p.desert_moisture {
            Biome::Desert
        } else {
            Biome::Grassland
        }
    }
}
