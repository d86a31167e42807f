//! JSON save file for the world.
//!
//! Layout: `{ seed, params, tiles, objects: {"x,y": id}, objectsData: {"x,y": ..}, savedAt }`.
//! Writes go to a sibling temp file that is renamed over the save file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::biome::{Biome, WorldParams};
use crate::error::WorldError;

/// Serialized world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSave {
    pub seed: u64,
    #[serde(default)]
    pub params: WorldParams,
    /// `tiles[y][x]`.
    pub tiles: Vec<Vec<Biome>>,
    #[serde(default)]
    pub objects: BTreeMap<String, u32>,
    #[serde(default)]
    pub objects_data: BTreeMap<String, Value>,
    pub saved_at: DateTime<Utc>,
}

/// Save-file location on disk.
#[derive(Debug, Clone)]
pub struct WorldStorage {
    path: PathBuf,
}

impl WorldStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `world-save.json` -> `world-save.tmp.json`.
    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp.json")
    }

    pub fn save(&self, save: &WorldSave) -> Result<(), WorldError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let temp = self.temp_path();
        std::fs::write(&temp, serde_json::to_vec(save)?)?;
        std::fs::rename(&temp, &self.path)?;
        info!(
            path = %self.path.display(),
            objects = save.objects.len(),
            "world saved"
        );
        Ok(())
    }

    /// `Ok(None)` when no save exists yet.
    pub fn load(&self) -> Result<Option<WorldSave>, WorldError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no saved world");
            return Ok(None);
        }
        let data = std::fs::read(&self.path)?;
        let save: WorldSave = serde_json::from_slice(&data)?;
        Ok(Some(save))
    }

    /// Returns `true` if a file was removed.
    pub fn delete(&self) -> Result<bool, WorldError> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)?;
        info!(path = %self.path.display(), "deleted saved world");
        Ok(true)
    }
}
