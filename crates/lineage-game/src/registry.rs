//! Object definitions: animals, resources, items, and recipes.
//!
//! Definitions are keyed by a symbolic string (`"RABBIT"`) and carry a
//! numeric `id` used on the tile grid. Recipes refer to definitions by key
//! and are resolved to ids with [`Registry::resolve_recipes`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use lineage_world::generator::{SpawnCandidate, SpawnKind, SpawnTables};
use lineage_world::Biome;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RegistryError;

/// Food value used when an edible definition does not name one.
pub const DEFAULT_FOOD_VALUE: u32 = 5;
/// Container capacity used when a container definition does not name one.
pub const DEFAULT_CAPACITY: usize = 3;

fn is_false(b: &bool) -> bool {
    !*b
}

fn default_hp() -> f32 {
    10.0
}

fn default_speed() -> f32 {
    0.5
}

// ─── Definitions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalDef {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default = "default_hp")]
    pub hp: f32,
    /// Tiles per second, roughly. Scaled to pixels by the AI system.
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// 0..=1. Scales attack damage.
    #[serde(default)]
    pub aggression: f32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_carnivore: bool,
    #[serde(default)]
    pub spawn_rate: f64,
    /// Key of the carcass left behind when hunted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub biomes: Vec<Biome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDef {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub spawn_rate: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_edible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_value: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_large: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_floor: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub biomes: Vec<Biome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Tool,
    Material,
    Food,
    Weapon,
    Ammo,
    Container,
    Structure,
    Carcass,
    Seed,
    Crop,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponType {
    Ranged,
    Throw,
    Melee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDef {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_edible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_value: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_weapon: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_type: Option<WeaponType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_damage: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_max_dist: Option<f32>,
    /// Key of the ammunition a ranged weapon fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ammo_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_container: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_placeable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_large: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grows_into: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_ticks: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_consumable: bool,
    /// Durability. Each recipe use spends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` means bare hands.
    #[serde(default)]
    pub tool: Option<String>,
    pub target: String,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_becomes_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub target_persists: bool,
}

/// A recipe with every key resolved to its numeric id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRecipe {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tool: Option<u32>,
    pub target: u32,
    pub result: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_becomes_type: Option<u32>,
    pub target_persists: bool,
}

// ─── Tagged lookup ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Resource,
    Item,
    Animal,
}

/// Any definition found by numeric id.
#[derive(Debug, Clone, Copy)]
pub enum Definition<'a> {
    Resource(&'a ResourceDef),
    Item(&'a ItemDef),
    Animal(&'a AnimalDef),
}

impl<'a> Definition<'a> {
    pub fn category(&self) -> Category {
        match self {
            Definition::Resource(_) => Category::Resource,
            Definition::Item(_) => Category::Item,
            Definition::Animal(_) => Category::Animal,
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Definition::Resource(r) => r.id,
            Definition::Item(i) => i.id,
            Definition::Animal(a) => a.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Definition::Resource(r) => &r.name,
            Definition::Item(i) => &i.name,
            Definition::Animal(a) => &a.name,
        }
    }

    pub fn is_large(&self) -> bool {
        match self {
            Definition::Resource(r) => r.is_large,
            Definition::Item(i) => i.is_large,
            Definition::Animal(_) => false,
        }
    }

    pub fn is_structure(&self) -> bool {
        matches!(self, Definition::Item(i) if i.category == ItemCategory::Structure)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Definition::Item(i) if i.is_container)
    }

    pub fn is_crop(&self) -> bool {
        matches!(self, Definition::Item(i) if i.category == ItemCategory::Crop)
    }

    /// Food value if edible.
    pub fn food_value(&self) -> Option<u32> {
        match self {
            Definition::Resource(r) if r.is_edible => Some(r.food_value.unwrap_or(DEFAULT_FOOD_VALUE)),
            Definition::Item(i) if i.is_edible => Some(i.food_value.unwrap_or(DEFAULT_FOOD_VALUE)),
            _ => None,
        }
    }

    pub fn item(&self) -> Option<&'a ItemDef> {
        match self {
            Definition::Item(i) => Some(i),
            _ => None,
        }
    }

    pub fn animal(&self) -> Option<&'a AnimalDef> {
        match self {
            Definition::Animal(a) => Some(a),
            _ => None,
        }
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// Raw definition tables as stored on disk and sent to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryData {
    pub animals: BTreeMap<String, AnimalDef>,
    pub resources: BTreeMap<String, ResourceDef>,
    pub items: BTreeMap<String, ItemDef>,
    pub recipes: Vec<RecipeDef>,
}

const ANIMALS_FILE: &str = "animals.json";
const RESOURCES_FILE: &str = "resources.json";
const ITEMS_FILE: &str = "items.json";
const RECIPES_FILE: &str = "recipes.json";

#[derive(Debug, Clone, Default)]
pub struct Registry {
    data: RegistryData,
    ids: HashMap<String, u32>,
    index: HashMap<u32, (Category, String)>,
}

impl Registry {
    pub fn new(data: RegistryData) -> Self {
        let mut registry = Self {
            data,
            ids: HashMap::new(),
            index: HashMap::new(),
        };
        registry.rebuild();
        registry
    }

    /// Load every table from `dir`. A missing file is an empty table.
    pub fn load(dir: &Path) -> Result<Self, RegistryError> {
        let data = RegistryData {
            animals: read_table(&dir.join(ANIMALS_FILE))?,
            resources: read_table(&dir.join(RESOURCES_FILE))?,
            items: read_table(&dir.join(ITEMS_FILE))?,
            recipes: read_table(&dir.join(RECIPES_FILE))?,
        };
        info!(
            dir = %dir.display(),
            animals = data.animals.len(),
            resources = data.resources.len(),
            items = data.items.len(),
            recipes = data.recipes.len(),
            "registry loaded"
        );
        Ok(Self::new(data))
    }

    pub fn save(&self, dir: &Path) -> Result<(), RegistryError> {
        std::fs::create_dir_all(dir).map_err(|source| RegistryError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        write_table(&dir.join(ANIMALS_FILE), &self.data.animals)?;
        write_table(&dir.join(RESOURCES_FILE), &self.data.resources)?;
        write_table(&dir.join(ITEMS_FILE), &self.data.items)?;
        write_table(&dir.join(RECIPES_FILE), &self.data.recipes)?;
        Ok(())
    }

    fn rebuild(&mut self) {
        self.ids.clear();
        self.index.clear();
        // Later tables win on id collisions: resources, then items, then animals.
        let entries = self
            .data
            .animals
            .iter()
            .map(|(k, d)| (k, d.id, Category::Animal))
            .chain(self.data.items.iter().map(|(k, d)| (k, d.id, Category::Item)))
            .chain(
                self.data
                    .resources
                    .iter()
                    .map(|(k, d)| (k, d.id, Category::Resource)),
            );
        for (key, id, category) in entries {
            self.ids.insert(key.clone(), id);
            if let Some((prev, prev_key)) = self.index.insert(id, (category, key.clone())) {
                warn!(id, key = %key, previous = %prev_key, ?prev, "duplicate definition id");
            }
        }
    }

    pub fn data(&self) -> &RegistryData {
        &self.data
    }

    pub fn id_of(&self, key: &str) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn key_of(&self, id: u32) -> Option<&str> {
        self.index.get(&id).map(|(_, key)| key.as_str())
    }

    pub fn definition(&self, id: u32) -> Option<Definition<'_>> {
        let (category, key) = self.index.get(&id)?;
        match category {
            Category::Resource => self.data.resources.get(key).map(Definition::Resource),
            Category::Item => self.data.items.get(key).map(Definition::Item),
            Category::Animal => self.data.animals.get(key).map(Definition::Animal),
        }
    }

    pub fn animal(&self, id: u32) -> Option<&AnimalDef> {
        self.definition(id).and_then(|d| d.animal())
    }

    pub fn item(&self, id: u32) -> Option<&ItemDef> {
        self.definition(id).and_then(|d| d.item())
    }

    pub fn animals(&self) -> impl Iterator<Item = (&str, &AnimalDef)> {
        self.data.animals.iter().map(|(k, d)| (k.as_str(), d))
    }

    pub fn set_animals(&mut self, animals: BTreeMap<String, AnimalDef>) {
        self.data.animals = animals;
        self.rebuild();
    }

    pub fn set_resources(&mut self, resources: BTreeMap<String, ResourceDef>) {
        self.data.resources = resources;
        self.rebuild();
    }

    pub fn set_items(&mut self, items: BTreeMap<String, ItemDef>) {
        self.data.items = items;
        self.rebuild();
    }

    pub fn set_recipes(&mut self, recipes: Vec<RecipeDef>) {
        self.data.recipes = recipes;
    }

    fn resolve(&self, recipe: &RecipeDef, key: &str) -> Result<u32, RegistryError> {
        self.id_of(key)
            .or_else(|| key.parse().ok())
            .ok_or_else(|| RegistryError::UnknownKey {
                recipe: recipe.id.clone(),
                key: key.to_string(),
            })
    }

    /// Resolve every recipe key to a numeric id.
    pub fn resolve_recipes(&self) -> Result<Vec<RuntimeRecipe>, RegistryError> {
        self.data
            .recipes
            .iter()
            .map(|r| {
                Ok(RuntimeRecipe {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    description: r.description.clone(),
                    tool: r.tool.as_deref().map(|k| self.resolve(r, k)).transpose()?,
                    target: self.resolve(r, &r.target)?,
                    result: self.resolve(r, &r.result)?,
                    target_becomes_type: r
                        .target_becomes_type
                        .as_deref()
                        .map(|k| self.resolve(r, k))
                        .transpose()?,
                    target_persists: r.target_persists,
                })
            })
            .collect()
    }

    pub fn spawn_candidates(&self) -> Vec<SpawnCandidate> {
        let resources = self.data.resources.values().map(|r| SpawnCandidate {
            type_id: r.id,
            rate: r.spawn_rate,
            biomes: r.biomes.clone(),
            kind: SpawnKind::Resource,
        });
        let animals = self.data.animals.values().map(|a| SpawnCandidate {
            type_id: a.id,
            rate: a.spawn_rate,
            biomes: a.biomes.clone(),
            kind: SpawnKind::Animal,
        });
        resources.chain(animals).collect()
    }

    pub fn spawn_tables(&self) -> SpawnTables {
        SpawnTables::build(&self.spawn_candidates())
    }
}

fn read_table<T: DeserializeOwned + Default>(path: &Path) -> Result<T, RegistryError> {
    if !path.exists() {
        warn!(path = %path.display(), "definition file missing, using empty table");
        return Ok(T::default());
    }
    let raw = std::fs::read(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| RegistryError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_table<T: Serialize>(path: &Path, table: &T) -> Result<(), RegistryError> {
    let json = serde_json::to_string_pretty(table).map_err(|source| RegistryError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| RegistryError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn shipped() -> Registry {
        let dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data"));
        Registry::load(&dir).unwrap()
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lineage_registry_{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn shipped_data_resolves() {
        let registry = shipped();
        let recipes = registry.resolve_recipes().unwrap();
        assert!(!recipes.is_empty());
        for key in ["BONES", "DECAYED_ANIMAL", "SHOVEL", "HOLE", "GRAVE", "GRAVE_STONE", "ROCK", "BOAT"] {
            assert!(registry.id_of(key).is_some(), "{key} missing");
        }
        for (_, animal) in registry.animals() {
            let dead = animal.dead_type.as_deref().unwrap();
            assert!(registry.id_of(dead).is_some(), "{dead} missing");
        }
    }

    #[test]
    fn definition_is_tagged() {
        let registry = shipped();
        let rabbit = registry.id_of("RABBIT").unwrap();
        let bow = registry.id_of("BOW").unwrap();
        let tree = registry.id_of("TREE").unwrap();
        assert_eq!(registry.definition(rabbit).unwrap().category(), Category::Animal);
        assert_eq!(registry.definition(bow).unwrap().category(), Category::Item);
        assert_eq!(registry.definition(tree).unwrap().category(), Category::Resource);
        assert!(registry.definition(tree).unwrap().is_large());
        assert_eq!(registry.key_of(bow), Some("BOW"));
        assert!(registry.definition(9999).is_none());
    }

    #[test]
    fn food_value_defaults() {
        let mut items = BTreeMap::new();
        items.insert(
            "MUSH".to_string(),
            serde_json::from_str::<ItemDef>(r#"{"id": 7, "name": "Mush", "isEdible": true}"#).unwrap(),
        );
        let mut registry = Registry::default();
        registry.set_items(items);
        assert_eq!(registry.definition(7).unwrap().food_value(), Some(DEFAULT_FOOD_VALUE));
        assert_eq!(registry.item(7).unwrap().category, ItemCategory::Other);
    }

    #[test]
    fn unknown_recipe_key_fails() {
        let mut registry = shipped();
        registry.set_recipes(vec![RecipeDef {
            id: "broken".into(),
            name: "Broken".into(),
            description: None,
            tool: Some("UNOBTAINIUM".into()),
            target: "TREE".into(),
            result: "ROCK".into(),
            target_becomes_type: None,
            target_persists: false,
        }]);
        match registry.resolve_recipes() {
            Err(RegistryError::UnknownKey { recipe, key }) => {
                assert_eq!(recipe, "broken");
                assert_eq!(key, "UNOBTAINIUM");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_files_are_empty() {
        let dir = temp_dir();
        let registry = Registry::load(&dir).unwrap();
        assert!(registry.data().animals.is_empty());
        assert!(registry.resolve_recipes().unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = temp_dir();
        std::fs::write(dir.join(ITEMS_FILE), b"[1, 2").unwrap();
        assert!(matches!(Registry::load(&dir), Err(RegistryError::Json { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_then_load() {
        let dir = temp_dir();
        let registry = shipped();
        registry.save(&dir).unwrap();
        let reloaded = Registry::load(&dir).unwrap();
        assert_eq!(reloaded.data(), registry.data());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn spawn_tables_skip_zero_rates() {
        let registry = shipped();
        let tables = registry.spawn_tables();
        let bones = registry.id_of("BONES").unwrap();
        for biome in Biome::ALL {
            assert!(tables.entries(biome).iter().all(|&(id, _)| id != bones));
        }
        assert!(tables.entries(Biome::Water).is_empty());
    }
}
