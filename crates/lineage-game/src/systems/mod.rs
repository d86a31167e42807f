//! Periodic simulation systems.
//!
//! Slow cadence (1 s): hunger, aging, decay, growth, season, animal decisions.
//! Fast cadence (50 ms): projectiles and animal movement.

pub mod aging;
pub mod animal_ai;
pub mod decay;
pub mod growth;
pub mod hunger;
pub mod projectile;
pub mod season;

pub use aging::AgingSystem;
pub use animal_ai::AnimalAiSystem;
pub use decay::{DecayChain, DecaySystem};
pub use growth::GrowthSystem;
pub use hunger::HungerSystem;
pub use projectile::ProjectileSystem;
pub use season::{Season, SeasonSystem};

/// Milliseconds per slow tick.
pub const SLOW_TICK_MS: u64 = 1000;

/// Slow ticks between two firings of a timer running every `speed_ms`.
pub fn ticks_per_interval(speed_ms: u64) -> u64 {
    (speed_ms / SLOW_TICK_MS).max(1)
}

#[cfg(test)]
pub(crate) mod testing {
    use lineage_world::{Biome, WorldMap};

    use crate::config::GameConfig;
    use crate::ecs::TickContext;

    pub fn grass_map(size: i32) -> WorldMap {
        WorldMap::filled(size, Biome::Grassland)
    }

    pub fn ctx<'a>(map: &'a WorldMap, config: &'a GameConfig, delta: f32) -> TickContext<'a> {
        TickContext { map, config, delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_never_zero() {
        assert_eq!(ticks_per_interval(20_000), 20);
        assert_eq!(ticks_per_interval(500), 1);
        assert_eq!(ticks_per_interval(0), 1);
    }
}
