//! Events produced by the engine for the network layer.
//!
//! Each event is addressed to an [`Audience`]; the gateway serializes it as
//! `{"type": "<name>", "data": ...}`.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use lineage_world::map::WorldState;
use lineage_world::TileCoord;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::components::Gender;
use crate::config::GameConfig;
use crate::player_manager::PlayerView;
use crate::registry::{RegistryData, RuntimeRecipe};
use crate::systems::season::Season;

/// Who receives an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    All,
    Player(String),
    AllExcept(String),
}

impl Audience {
    pub fn includes(&self, id: &str) -> bool {
        match self {
            Audience::All => true,
            Audience::Player(p) => p == id,
            Audience::AllExcept(p) => p != id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outgoing {
    pub audience: Audience,
    pub event: ServerEvent,
}

/// Outgoing events queued for the network layer.
#[derive(Resource, Default)]
pub struct OutgoingEvents {
    pub events: Vec<Outgoing>,
}

/// Partial player update: `id` plus only the fields that changed.
/// Fields may be explicit `null` (e.g. emptied hands).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatUpdate {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StatUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub players: BTreeMap<String, PlayerView>,
    pub world: WorldState,
    pub season: Season,
    pub my_id: String,
    pub recipes: Vec<RuntimeRecipe>,
    pub config: GameConfig,
    pub registry: RegistryData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reconnected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileView {
    pub id: u64,
    #[serde(rename = "type")]
    pub object_type: u32,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalView {
    #[serde(rename = "type")]
    pub type_id: u32,
    pub x: f32,
    pub y: f32,
    pub tile_x: i32,
    pub tile_y: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Init(Box<InitPayload>),
    NewPlayer(PlayerView),
    PlayerMoved(PlayerView),
    PlayerStatUpdate(StatUpdate),
    WorldUpdate {
        x: i32,
        y: i32,
        #[serde(rename = "type")]
        object_type: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    PlayerDied {
        id: String,
        reason: String,
    },
    PlayerDisconnected(String),
    SeasonChange(Season),
    ProjectileUpdate(Vec<ProjectileView>),
    AnimalUpdate(Vec<AnimalView>),
    ChatMsg {
        id: String,
        text: String,
        name: String,
    },
    DeathScreen {
        name: String,
        age: u32,
        cause: String,
        mother: String,
        experience: u32,
    },
    TextMessage {
        text: String,
    },
    NameBaby {
        baby_id: String,
        gender: Gender,
        message: String,
    },
    NameError {
        message: String,
    },
    NameSuccess {
        baby_id: String,
        name: String,
    },
    WorldReset(WorldState),
    ConfigUpdate(GameConfig),
}

impl ServerEvent {
    pub fn world_update(tile: TileCoord, object_type: Option<u32>, data: Option<Value>) -> Self {
        ServerEvent::WorldUpdate {
            x: tile.x,
            y: tile.y,
            object_type,
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ServerEvent::TextMessage { text: text.into() }
    }

    /// Wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Init(_) => "init",
            ServerEvent::NewPlayer(_) => "newPlayer",
            ServerEvent::PlayerMoved(_) => "playerMoved",
            ServerEvent::PlayerStatUpdate(_) => "playerStatUpdate",
            ServerEvent::WorldUpdate { .. } => "worldUpdate",
            ServerEvent::PlayerDied { .. } => "playerDied",
            ServerEvent::PlayerDisconnected(_) => "playerDisconnected",
            ServerEvent::SeasonChange(_) => "seasonChange",
            ServerEvent::ProjectileUpdate(_) => "projectileUpdate",
            ServerEvent::AnimalUpdate(_) => "animalUpdate",
            ServerEvent::ChatMsg { .. } => "chatMsg",
            ServerEvent::DeathScreen { .. } => "deathScreen",
            ServerEvent::TextMessage { .. } => "textMessage",
            ServerEvent::NameBaby { .. } => "nameBaby",
            ServerEvent::NameError { .. } => "nameError",
            ServerEvent::NameSuccess { .. } => "nameSuccess",
            ServerEvent::WorldReset(_) => "worldReset",
            ServerEvent::ConfigUpdate(_) => "configUpdate",
        }
    }
}
