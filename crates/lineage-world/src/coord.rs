//! Tile coordinates and map geometry.

use std::fmt;
use std::str::FromStr;

use crate::error::WorldError;

/// Width and height of the map, in tiles.
pub const MAP_SIZE: i32 = 200;
/// Edge length of one tile, in pixels.
pub const TILE_SIZE: f32 = 64.0;
/// Edge length of one generation chunk, in tiles.
pub const CHUNK_SIZE: i32 = 16;

/// Integer tile position. Serialized as `"x,y"` in save files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile containing a pixel position.
    pub fn from_pixels(px: f32, py: f32) -> Self {
        Self {
            x: (px / TILE_SIZE).floor() as i32,
            y: (py / TILE_SIZE).floor() as i32,
        }
    }

    /// Pixel position of the tile center.
    pub fn center(self) -> (f32, f32) {
        (
            self.x as f32 * TILE_SIZE + TILE_SIZE / 2.0,
            self.y as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        )
    }

    /// Chunk coordinates of the chunk containing this tile.
    pub fn chunk(self) -> (i32, i32) {
        (self.x.div_euclid(CHUNK_SIZE), self.y.div_euclid(CHUNK_SIZE))
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn in_bounds(self, size: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < size && self.y < size
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || WorldError::BadCoordinate(s.to_string());
        let (x, y) = s.split_once(',').ok_or_else(bad)?;
        let x = x.trim().parse().map_err(|_| bad())?;
        let y = y.trim().parse().map_err(|_| bad())?;
        Ok(Self { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_to_tile_floors() {
        assert_eq!(TileCoord::from_pixels(0.0, 63.9), TileCoord::new(0, 0));
        assert_eq!(TileCoord::from_pixels(64.0, 130.0), TileCoord::new(1, 2));
        assert_eq!(TileCoord::from_pixels(-1.0, 5.0), TileCoord::new(-1, 0));
    }

    #[test]
    fn center_is_half_tile_in() {
        let (x, y) = TileCoord::new(3, 4).center();
        assert!((x - 224.0).abs() < 0.01);
        assert!((y - 288.0).abs() < 0.01);
    }

    #[test]
    fn key_format_parses_back() {
        let c = TileCoord::new(12, -7);
        assert_eq!(c.to_string(), "12,-7");
        assert_eq!("12,-7".parse::<TileCoord>().unwrap(), c);
    }

    #[test]
    fn bad_keys_rejected() {
        assert!("12".parse::<TileCoord>().is_err());
        assert!("a,b".parse::<TileCoord>().is_err());
    }

    #[test]
    fn chunk_of_negative_tile() {
        assert_eq!(TileCoord::new(-1, 17).chunk(), (-1, 1));
        assert_eq!(TileCoord::new(15, 16).chunk(), (0, 1));
    }
}
