//! Aggregate counters for the operator console.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::components::{Gender, BABY_MAX_AGE};
use crate::systems::Season;

/// Age from which a player counts as an elder.
pub const ELDER_AGE: u32 = 40;
const TICK_WINDOW: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatistics {
    pub server_start_time: DateTime<Utc>,
    pub current_year: u64,
    pub current_season: Season,

    pub current_population: u32,
    pub peak_population: u32,
    pub total_players_ever: u32,
    pub total_deaths: u32,
    pub total_births: u32,

    pub babies_alive: u32,
    pub adults_alive: u32,
    pub elders_alive: u32,
    pub male_count: u32,
    pub female_count: u32,

    pub world_size: i32,
    pub total_objects: usize,
    pub total_animals: usize,
    pub animal_counts: BTreeMap<String, usize>,
    pub resource_counts: BTreeMap<String, usize>,

    pub deaths_by_cause: BTreeMap<String, u32>,

    pub current_generation: u32,
    pub longest_lineage: u32,

    /// Ticks per second over the recent window.
    pub tick_rate: u32,
    pub last_tick_micros: u64,
}

impl Default for GameStatistics {
    fn default() -> Self {
        Self {
            server_start_time: Utc::now(),
            current_year: 0,
            current_season: Season::default(),
            current_population: 0,
            peak_population: 0,
            total_players_ever: 0,
            total_deaths: 0,
            total_births: 0,
            babies_alive: 0,
            adults_alive: 0,
            elders_alive: 0,
            male_count: 0,
            female_count: 0,
            world_size: 0,
            total_objects: 0,
            total_animals: 0,
            animal_counts: BTreeMap::new(),
            resource_counts: BTreeMap::new(),
            deaths_by_cause: BTreeMap::new(),
            current_generation: 1,
            longest_lineage: 0,
            tick_rate: 0,
            last_tick_micros: 0,
        }
    }
}

/// Which named bucket a world object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Animal,
    Resource,
    Other,
}

#[derive(Debug)]
pub struct StatisticsManager {
    stats: GameStatistics,
    started: Instant,
    tick_times: VecDeque<Duration>,
}

impl Default for StatisticsManager {
    fn default() -> Self {
        Self::new()
    }
}

fn dec(counter: &mut u32) {
    *counter = counter.saturating_sub(1);
}

impl StatisticsManager {
    pub fn new() -> Self {
        Self {
            stats: GameStatistics::default(),
            started: Instant::now(),
            tick_times: VecDeque::with_capacity(TICK_WINDOW),
        }
    }

    pub fn set_year(&mut self, year: u64) {
        self.stats.current_year = year;
    }

    pub fn set_season(&mut self, season: Season) {
        self.stats.current_season = season;
    }

    pub fn player_joined(&mut self, is_eve: bool, gender: Gender) {
        let s = &mut self.stats;
        s.total_players_ever += 1;
        s.current_population += 1;
        if is_eve {
            s.adults_alive += 1;
        } else {
            s.total_births += 1;
            s.babies_alive += 1;
        }
        match gender {
            Gender::Male => s.male_count += 1,
            Gender::Female => s.female_count += 1,
        }
        s.peak_population = s.peak_population.max(s.current_population);
    }

    pub fn player_died(&mut self, cause: &str, age: u32, gender: Gender) {
        let s = &mut self.stats;
        s.total_deaths += 1;
        dec(&mut s.current_population);
        if age < BABY_MAX_AGE {
            dec(&mut s.babies_alive);
        } else if age < ELDER_AGE {
            dec(&mut s.adults_alive);
        } else {
            dec(&mut s.elders_alive);
        }
        match gender {
            Gender::Male => dec(&mut s.male_count),
            Gender::Female => dec(&mut s.female_count),
        }
        *s.deaths_by_cause.entry(cause.to_string()).or_insert(0) += 1;
    }

    /// Move a player between age brackets.
    pub fn player_aged(&mut self, from: u32, to: u32) {
        let s = &mut self.stats;
        if from < BABY_MAX_AGE && to >= BABY_MAX_AGE {
            dec(&mut s.babies_alive);
            s.adults_alive += 1;
        } else if from < ELDER_AGE && to >= ELDER_AGE {
            dec(&mut s.adults_alive);
            s.elders_alive += 1;
        }
    }

    /// Recount world objects. `classify` maps a type id to its bucket and
    /// display name.
    pub fn update_world_stats<'a>(
        &mut self,
        world_size: i32,
        objects: impl Iterator<Item = u32>,
        classify: impl Fn(u32) -> (ObjectKind, Option<&'a str>),
    ) {
        let mut animal_counts = BTreeMap::new();
        let mut resource_counts = BTreeMap::new();
        let mut total_objects = 0;
        let mut total_animals = 0;
        for type_id in objects {
            total_objects += 1;
            match classify(type_id) {
                (ObjectKind::Animal, Some(name)) => {
                    *animal_counts.entry(name.to_string()).or_insert(0) += 1;
                    total_animals += 1;
                }
                (ObjectKind::Resource, Some(name)) => {
                    *resource_counts.entry(name.to_string()).or_insert(0) += 1;
                }
                _ => {}
            }
        }
        let s = &mut self.stats;
        s.world_size = world_size;
        s.total_objects = total_objects;
        s.total_animals = total_animals;
        s.animal_counts = animal_counts;
        s.resource_counts = resource_counts;
    }

    pub fn update_generation(&mut self, generation: u32) {
        let s = &mut self.stats;
        s.current_generation = s.current_generation.max(generation);
        s.longest_lineage = s.longest_lineage.max(generation);
    }

    pub fn record_tick(&mut self, duration: Duration) {
        if self.tick_times.len() == TICK_WINDOW {
            self.tick_times.pop_front();
        }
        self.tick_times.push_back(duration);
        self.stats.last_tick_micros = duration.as_micros() as u64;

        let total: Duration = self.tick_times.iter().sum();
        let average = total.as_secs_f64() / self.tick_times.len() as f64;
        self.stats.tick_rate = if average > 0.0 {
            (1.0 / average).round() as u32
        } else {
            0
        };
    }

    pub fn reset_world_stats(&mut self) {
        let s = &mut self.stats;
        s.total_objects = 0;
        s.total_animals = 0;
        s.animal_counts.clear();
        s.resource_counts.clear();
    }

    pub fn reset_population_stats(&mut self) {
        let s = &mut self.stats;
        s.current_population = 0;
        s.babies_alive = 0;
        s.adults_alive = 0;
        s.elders_alive = 0;
        s.male_count = 0;
        s.female_count = 0;
    }

    pub fn stats(&self) -> &GameStatistics {
        &self.stats
    }

    /// "1h 2m 3s"
    pub fn uptime(&self) -> String {
        format_uptime(self.started.elapsed())
    }
}

pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
