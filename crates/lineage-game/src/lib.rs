//! Game rules: the registry of object definitions, the ECS simulation
//! systems, player lifecycle and the engine that ties them to the map.

pub mod components;
pub mod config;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod events;
pub mod player_manager;
pub mod registry;
pub mod statistics;
pub mod systems;

pub use config::GameConfig;
pub use engine::GameEngine;
pub use error::RegistryError;
pub use events::{Audience, Outgoing, ServerEvent, StatUpdate};
pub use player_manager::PlayerView;
pub use registry::Registry;
pub use statistics::GameStatistics;
