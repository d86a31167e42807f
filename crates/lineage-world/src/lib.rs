//! World state: procedural terrain, the sparse object grid, and save files.

pub mod autosave;
pub mod biome;
pub mod coord;
pub mod error;
pub mod generator;
pub mod map;
pub mod noise;
pub mod storage;

pub use biome::{Biome, WorldParams};
pub use coord::{TileCoord, CHUNK_SIZE, MAP_SIZE, TILE_SIZE};
pub use error::WorldError;
pub use map::WorldMap;
