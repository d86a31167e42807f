//! Runtime-tunable game settings, read by the engine every tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MODULE_ANIMAL_MOVEMENT: &str = "animalMovement";
pub const MODULE_CARNIVORE_AGGRESSION: &str = "carnivoreAggression";
pub const MODULE_WEATHER: &str = "weatherEnabled";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    /// Milliseconds of real time per year of age.
    pub aging_speed: u64,
    /// Milliseconds of real time per point of hunger.
    pub hunger_speed: u64,
    pub max_age: u32,
    pub max_hunger: u32,
    pub spawn_eve_age: u32,
    pub animal_movement: bool,
    pub carnivore_aggression: bool,
    pub weather_enabled: bool,
    pub xp_per_hunt: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            aging_speed: 60_000,
            hunger_speed: 20_000,
            max_age: 60,
            max_hunger: 20,
            spawn_eve_age: 14,
            animal_movement: true,
            carnivore_aggression: true,
            weather_enabled: true,
            xp_per_hunt: 10,
        }
    }
}

impl GameConfig {
    pub fn module_states(&self) -> BTreeMap<&'static str, bool> {
        BTreeMap::from([
            (MODULE_ANIMAL_MOVEMENT, self.animal_movement),
            (MODULE_CARNIVORE_AGGRESSION, self.carnivore_aggression),
            (MODULE_WEATHER, self.weather_enabled),
        ])
    }

    /// Toggle a named module. Returns `false` for unknown names.
    pub fn set_module(&mut self, name: &str, enabled: bool) -> bool {
        let slot = match name {
            MODULE_ANIMAL_MOVEMENT => &mut self.animal_movement,
            MODULE_CARNIVORE_AGGRESSION => &mut self.carnivore_aggression,
            MODULE_WEATHER => &mut self.weather_enabled,
            _ => return false,
        };
        *slot = enabled;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let c: GameConfig = serde_json::from_str(r#"{"maxAge": 40}"#).unwrap();
        assert_eq!(c.max_age, 40);
        assert_eq!(c.hunger_speed, 20_000);
        assert!(c.weather_enabled);
    }

    #[test]
    fn toggles_known_modules_only() {
        let mut c = GameConfig::default();
        assert!(c.set_module("animalMovement", false));
        assert!(!c.animal_movement);
        assert!(!c.set_module("maxAge", false));
        assert_eq!(c.module_states()["animalMovement"], false);
        assert_eq!(c.module_states().len(), 3);
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(GameConfig::default()).unwrap();
        assert_eq!(v["spawnEveAge"], 14);
        assert_eq!(v["xpPerHunt"], 10);
    }
}
