//! Season clock, advanced in world-time steps on aging ticks.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ecs::{push_event, SimEvent};

/// World time per season, in milliseconds.
pub const SEASON_LENGTH_MS: u64 = 600_000;
/// World time added on every aging tick.
pub const SEASON_STEP_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    #[default]
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ORDER: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    pub fn name(self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

#[derive(Debug)]
pub struct SeasonSystem {
    world_time_ms: u64,
    season_length_ms: u64,
    current: Season,
}

impl Default for SeasonSystem {
    fn default() -> Self {
        Self::new(SEASON_LENGTH_MS)
    }
}

impl SeasonSystem {
    pub fn new(season_length_ms: u64) -> Self {
        Self {
            world_time_ms: 0,
            season_length_ms: season_length_ms.max(1),
            current: Season::Spring,
        }
    }

    pub fn current(&self) -> Season {
        self.current
    }

    pub fn world_time_ms(&self) -> u64 {
        self.world_time_ms
    }

    pub fn current_year(&self) -> u64 {
        self.world_time_ms / (self.season_length_ms * Season::ORDER.len() as u64)
    }

    fn season_at(&self, time_ms: u64) -> Season {
        let cycle = self.season_length_ms * Season::ORDER.len() as u64;
        Season::ORDER[((time_ms % cycle) / self.season_length_ms) as usize]
    }

    /// Advance world time; reports a change only when the season differs.
    pub fn advance_time(&mut self, world: &mut World, ms: u64) {
        self.world_time_ms += ms;
        let season = self.season_at(self.world_time_ms);
        if season != self.current {
            self.current = season;
            let year = self.current_year();
            info!(season = season.name(), year, "season changed");
            push_event(world, SimEvent::SeasonChanged { season, year });
        }
    }
}
