use std::path::{Path, PathBuf};
use std::time::Duration;

use lineage_game::GameConfig;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Initial runtime settings; keys are camelCase like the client sees them.
    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_slow_tick_ms")]
    pub slow_tick_ms: u64,
    #[serde(default = "default_fast_tick_ms")]
    pub fast_tick_ms: u64,
}

fn default_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_slow_tick_ms() -> u64 {
    1000
}

fn default_fast_tick_ms() -> u64 {
    50
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            slow_tick_ms: default_slow_tick_ms(),
            fast_tick_ms: default_fast_tick_ms(),
        }
    }
}

impl ServerSection {
    /// Slow tick period, never zero.
    pub fn slow_tick(&self) -> Duration {
        Duration::from_millis(self.slow_tick_ms.max(1))
    }

    /// Fast tick period, never zero.
    pub fn fast_tick(&self) -> Duration {
        Duration::from_millis(self.fast_tick_ms.max(1))
    }
}

#[derive(Debug, Deserialize)]
pub struct WorldSection {
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,
    /// Directory holding the registry JSON tables.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Fixed seed for a fresh world. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_save_path() -> PathBuf {
    "data/world-save.json".into()
}

fn default_data_dir() -> PathBuf {
    "data".into()
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            data_dir: default_data_dir(),
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionSection {
    /// Seconds a disconnected character waits for its owner. Default: 60.
    #[serde(default = "default_reconnect_grace_secs")]
    pub reconnect_grace_secs: u64,
}

fn default_reconnect_grace_secs() -> u64 {
    60
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: default_reconnect_grace_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Like [`ServerConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            [server]
            address = "127.0.0.1"
            port = 4000

            [world]
            save_path = "saves/world.json"
            seed = 42

            [logging]
            level = "debug"

            [game]
            maxAge = 40
            animalMovement = false
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.address, "127.0.0.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.slow_tick_ms, 1000); // default
        assert_eq!(config.server.fast_tick_ms, 50); // default
        assert_eq!(config.world.save_path, PathBuf::from("saves/world.json"));
        assert_eq!(config.world.data_dir, PathBuf::from("data"));
        assert_eq!(config.world.seed, Some(42));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.session.reconnect_grace_secs, 60);
        assert_eq!(config.game.max_age, 40);
        assert!(!config.game.animal_movement);
        assert_eq!(config.game.max_hunger, GameConfig::default().max_hunger);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.world.seed.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn zero_tick_periods_are_clamped() {
        let config: ServerConfig = toml::from_str("[server]\nslow_tick_ms = 0\nfast_tick_ms = 0\n").unwrap();
        assert_eq!(config.server.slow_tick(), Duration::from_millis(1));
        assert_eq!(config.server.fast_tick(), Duration::from_millis(1));
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.slow_tick(), Duration::from_millis(1000));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("lineage-missing-{}.toml", rand::random::<u32>()));
        let config = ServerConfig::load_or_default(&path).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
