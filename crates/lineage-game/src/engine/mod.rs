//! The game engine: owns the bevy world, the map, the systems and the player
//! manager, drives both tick cadences and turns system reports into world
//! mutations and outgoing events.
//!
//! Systems never call each other. They push [`SimEvent`]s, which the engine
//! drains and applies after every update; the resulting client-facing events
//! are queued in [`OutgoingEvents`] for the network layer.

mod commands;
mod interactions;

use std::collections::BTreeMap;
use std::time::Instant;

use bevy_ecs::prelude::*;
use lineage_world::map::WorldState;
use lineage_world::{TileCoord, WorldMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::components::{Age, Animal, Decay, Growth, Hunger, Projectile, BABY_MAX_AGE};
use crate::config::GameConfig;
use crate::ecs::{drain_sim_events, is_deleted, new_world, SimEvent, System, TickContext, TickCounter};
use crate::error::RegistryError;
use crate::events::{Audience, InitPayload, Outgoing, OutgoingEvents, ServerEvent, StatUpdate};
use crate::player_manager::{PlayerManager, PlayerView};
use crate::registry::{Definition, Registry, RuntimeRecipe, WeaponType};
use crate::statistics::{GameStatistics, ObjectKind, StatisticsManager};
use crate::systems::decay::DECAY_TICK_INTERVAL;
use crate::systems::growth::{DEFAULT_GROWTH_TICKS, GROWTH_TICK_INTERVAL};
use crate::systems::projectile::{shot_profile, DEFAULT_DAMAGE};
use crate::systems::season::SEASON_STEP_MS;
use crate::systems::{
    AgingSystem, AnimalAiSystem, DecayChain, DecaySystem, GrowthSystem, HungerSystem, ProjectileSystem, Season,
    SeasonSystem, SLOW_TICK_MS,
};

/// Milliseconds per fast tick.
pub const FAST_TICK_MS: u64 = 50;

pub const CAUSE_STARVATION: &str = "Starvation";
pub const CAUSE_OLD_AGE: &str = "Old Age";
pub const CAUSE_LEFT: &str = "Left the world";
const UNKNOWN_SOUL: &str = "Unknown Soul";

pub(crate) const KEY_BONES: &str = "BONES";
pub(crate) const KEY_DECAYED: &str = "DECAYED_ANIMAL";
pub(crate) const KEY_HOLE: &str = "HOLE";
pub(crate) const KEY_GRAVE: &str = "GRAVE";
pub(crate) const KEY_GRAVE_STONE: &str = "GRAVE_STONE";
pub(crate) const KEY_SHOVEL: &str = "SHOVEL";
pub(crate) const KEY_ROCK: &str = "ROCK";
pub(crate) const KEY_BOAT: &str = "BOAT";
const DEAD_PREFIX: &str = "DEAD_";

pub struct GameEngine {
    world: World,
    map: WorldMap,
    registry: Registry,
    config: GameConfig,
    recipes: Vec<RuntimeRecipe>,
    players: PlayerManager,
    stats: StatisticsManager,

    hunger: HungerSystem,
    aging: AgingSystem,
    season: SeasonSystem,
    animals: AnimalAiSystem,
    decay: DecaySystem,
    growth: GrowthSystem,
    projectiles: ProjectileSystem,

    rng: StdRng,
    eve_generation: u32,
}

impl GameEngine {
    /// Build an engine around a generated or loaded map. Fails when a recipe
    /// references an unknown key.
    pub fn new(map: WorldMap, registry: Registry, config: GameConfig, seed: u64) -> Result<Self, RegistryError> {
        let mut engine = Self {
            world: new_world(),
            map,
            registry,
            config,
            recipes: Vec::new(),
            players: PlayerManager::new(seed),
            stats: StatisticsManager::new(),
            hunger: HungerSystem::new(),
            aging: AgingSystem::new(),
            season: SeasonSystem::default(),
            animals: AnimalAiSystem::new(seed.wrapping_add(1)),
            decay: DecaySystem::new(DECAY_TICK_INTERVAL, DecayChain::default()),
            growth: GrowthSystem::new(GROWTH_TICK_INTERVAL),
            projectiles: ProjectileSystem::new(),
            rng: StdRng::seed_from_u64(seed.wrapping_add(2)),
            eve_generation: 1,
        };
        engine.reload_registry()?;
        engine.register_world_objects();
        Ok(engine)
    }

    // ─── Registry ───────────────────────────────────────────────────────────

    /// Rebuild everything derived from the registry: recipes, the decay
    /// chain and the map's spawn tables.
    pub fn reload_registry(&mut self) -> Result<(), RegistryError> {
        self.recipes = self.registry.resolve_recipes()?;

        let mut dead_types: std::collections::HashSet<u32> = self
            .registry
            .animals()
            .filter_map(|(_, a)| a.dead_type.as_deref())
            .filter_map(|key| self.registry.id_of(key))
            .collect();
        dead_types.extend(
            self.registry
                .data()
                .items
                .iter()
                .filter(|(key, _)| key.starts_with(DEAD_PREFIX))
                .map(|(_, item)| item.id),
        );
        let previous = self.decay.chain();
        let chain = DecayChain {
            dead_types,
            decayed: self.registry.id_of(KEY_DECAYED),
            bones: self.registry.id_of(KEY_BONES),
            stage_ticks: previous.stage_ticks,
            bones_ticks: previous.bones_ticks,
        };
        self.decay.set_chain(chain);
        self.map.set_spawn_tables(self.registry.spawn_tables());

        let data = self.registry.data();
        info!(
            animals = data.animals.len(),
            resources = data.resources.len(),
            items = data.items.len(),
            recipes = self.recipes.len(),
            "registry loaded"
        );
        Ok(())
    }

    /// Swap in new definitions and rebuild the caches.
    pub fn set_registry(&mut self, registry: Registry) -> Result<(), RegistryError> {
        self.registry = registry;
        self.reload_registry()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn recipes(&self) -> &[RuntimeRecipe] {
        &self.recipes
    }

    pub(crate) fn find_recipe(&self, tool: Option<u32>, target: u32) -> Option<&RuntimeRecipe> {
        self.recipes.iter().find(|r| r.tool == tool && r.target == target)
    }

    // ─── Object components ──────────────────────────────────────────────────

    fn register_world_objects(&mut self) {
        let objects: Vec<(TileCoord, u32)> = self.map.objects().collect();
        for (tile, type_id) in objects {
            self.register_object(tile, type_id);
        }
        let animals = self.animals.count(&mut self.world);
        debug!(objects = self.map.object_count(), animals, "world objects registered");
    }

    /// Attach whatever periodic behaviour the object on `tile` needs: animal
    /// AI, crop growth or decay.
    pub(crate) fn register_object(&mut self, tile: TileCoord, type_id: u32) {
        if let Some(def) = self.registry.animal(type_id) {
            self.animals.register(&mut self.world, tile, def, self.map.object_data(tile));
        } else if self.registry.item(type_id).is_some_and(|i| i.grows_into.is_some()) {
            self.register_planted_crop(tile, type_id);
        } else if self.decay.chain().decays(type_id) {
            self.decay.register(&mut self.world, tile, type_id);
        }
    }

    /// Start growing the crop on `tile`. Ignores types that do not grow.
    pub fn register_planted_crop(&mut self, tile: TileCoord, type_id: u32) -> bool {
        let Some(item) = self.registry.item(type_id) else {
            return false;
        };
        let Some(grows_into) = item.grows_into.as_deref() else {
            return false;
        };
        let ticks = item.growth_ticks.unwrap_or(DEFAULT_GROWTH_TICKS);
        self.growth.register(&mut self.world, tile, type_id, grows_into, ticks);
        true
    }

    pub fn register_animal(&mut self, tile: TileCoord, type_id: u32) -> bool {
        let Some(def) = self.registry.animal(type_id) else {
            return false;
        };
        self.animals.register(&mut self.world, tile, def, self.map.object_data(tile));
        true
    }

    /// Detach animal, growth and decay components from `tile`.
    pub fn unregister_at(&mut self, tile: TileCoord) {
        self.animals.unregister_at(&mut self.world, tile);
        self.growth.unregister_at(&mut self.world, tile);
        self.decay.unregister_at(&mut self.world, tile);
    }

    fn clear_object_components(&mut self) {
        let stale: Vec<Entity> = self
            .world
            .query_filtered::<Entity, Or<(With<Animal>, With<Decay>, With<Growth>, With<Projectile>)>>()
            .iter(&self.world)
            .collect();
        for entity in stale {
            self.world.despawn(entity);
        }
    }

    // ─── Tick drivers ───────────────────────────────────────────────────────

    /// Slow cadence: hunger, aging, season, animal decisions, decay, growth,
    /// then player stat sync and compaction.
    pub fn update(&mut self) {
        let started = Instant::now();
        self.world.resource_mut::<TickCounter>().0 += 1;
        {
            let ctx = TickContext {
                map: &self.map,
                config: &self.config,
                delta: SLOW_TICK_MS as f32 / 1000.0,
            };
            self.hunger.update(&mut self.world, &ctx);
            self.aging.update(&mut self.world, &ctx);
            if self.aging.is_aging_tick() {
                self.season.advance_time(&mut self.world, SEASON_STEP_MS);
            }
            self.animals.update(&mut self.world, &ctx);
            self.decay.update(&mut self.world, &ctx);
            self.growth.update(&mut self.world, &ctx);
        }
        self.apply_sim_events();
        self.sync_player_stats();
        self.compact();
        self.stats.record_tick(started.elapsed());
    }

    /// Fast cadence: projectiles and animal movement.
    pub fn update_fast(&mut self) {
        {
            let ctx = TickContext {
                map: &self.map,
                config: &self.config,
                delta: FAST_TICK_MS as f32 / 1000.0,
            };
            self.projectiles.update(&mut self.world, &ctx);
            self.animals.update_movement(&mut self.world, &ctx);
        }
        self.apply_sim_events();
        self.projectiles.delete_stale_components(&mut self.world);

        let projectiles = self.projectiles.projectiles_for_sync(&mut self.world);
        if !projectiles.is_empty() {
            self.broadcast(ServerEvent::ProjectileUpdate(projectiles));
        }
        let animals = self.animals.animals_for_sync(&mut self.world);
        if !animals.is_empty() {
            self.broadcast(ServerEvent::AnimalUpdate(animals));
        }
    }

    fn compact(&mut self) {
        let removed = self.hunger.delete_stale_components(&mut self.world)
            + self.aging.delete_stale_components(&mut self.world)
            + self.animals.delete_stale_components(&mut self.world)
            + self.decay.delete_stale_components(&mut self.world)
            + self.growth.delete_stale_components(&mut self.world)
            + self.projectiles.delete_stale_components(&mut self.world);
        if removed > 0 {
            debug!(removed, "compacted entities");
        }
    }

    fn apply_sim_events(&mut self) {
        for event in drain_sim_events(&mut self.world) {
            match event {
                SimEvent::Starved { entity } => self.kill_entity(entity, CAUSE_STARVATION),
                SimEvent::OldAge { entity } => self.kill_entity(entity, CAUSE_OLD_AGE),
                SimEvent::Aged { from, to, .. } => self.stats.player_aged(from, to),
                SimEvent::DecayAdvanced { tile, to, .. } => self.apply_decay(tile, to),
                SimEvent::GrowthCompleted { tile, grows_into, .. } => self.apply_growth(tile, &grows_into),
                SimEvent::SeasonChanged { season, year } => {
                    self.stats.set_season(season);
                    self.stats.set_year(year);
                    if self.config.weather_enabled {
                        self.broadcast(ServerEvent::SeasonChange(season));
                    }
                }
                SimEvent::AnimalMoved { from, to, type_id } => self.apply_animal_move(from, to, type_id),
                SimEvent::AnimalAttacked { type_id, target, damage } => self.apply_animal_attack(type_id, target, damage),
                SimEvent::ProjectileHit {
                    owner_id,
                    projectile_type,
                    damage,
                    tile,
                    target_type,
                } => self.apply_projectile_hit(&owner_id, projectile_type, damage, tile, target_type),
                SimEvent::ProjectileLanded { tile, projectile_type } => {
                    if self.map.is_empty(tile) && self.map.set_object(tile, projectile_type, None) {
                        self.broadcast(ServerEvent::world_update(tile, Some(projectile_type), None));
                    }
                }
            }
        }
    }

    fn apply_decay(&mut self, tile: TileCoord, to: Option<u32>) {
        match to {
            Some(next) => {
                let data = json!({ "decay": 0 });
                self.map.set_object(tile, next, Some(data.clone()));
                self.broadcast(ServerEvent::world_update(tile, Some(next), Some(data)));
            }
            None => {
                self.map.remove_object(tile);
                self.broadcast(ServerEvent::world_update(tile, None, None));
            }
        }
    }

    fn apply_growth(&mut self, tile: TileCoord, grows_into: &str) {
        let Some(next) = self.registry.id_of(grows_into) else {
            warn!(key = grows_into, %tile, "crop grows into unknown type");
            return;
        };
        self.map.set_object(tile, next, None);
        self.register_object(tile, next);
        self.broadcast(ServerEvent::world_update(tile, Some(next), None));
    }

    fn apply_animal_move(&mut self, from: TileCoord, to: TileCoord, type_id: u32) {
        if self.map.object_at(from) != Some(type_id) {
            // The object went away under the animal.
            self.animals.unregister_at(&mut self.world, to);
            return;
        }
        if !self.map.is_empty(to) {
            // Taken earlier in the same drain.
            self.animals.send_back(&mut self.world, to, from, type_id);
            return;
        }
        let data = self.map.remove_object(from).and_then(|(_, data)| data);
        self.map.set_object(to, type_id, data.clone());
        self.broadcast(ServerEvent::world_update(from, None, None));
        self.broadcast(ServerEvent::world_update(to, Some(type_id), data));
    }

    fn apply_animal_attack(&mut self, type_id: u32, target: Entity, damage: u32) {
        if !self.world.entities().contains(target) || is_deleted(&self.world, target) {
            return;
        }
        let Some(id) = self.players.id_of(&self.world, target) else {
            return;
        };
        match self.world.get_mut::<Hunger>(target) {
            Some(mut hunger) => hunger.decrease(damage),
            None => return,
        }
        let name = self
            .registry
            .animal(type_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "wild animal".to_string());
        debug!(player = %id, animal = %name, damage, "animal attack");
        self.send(&id, ServerEvent::text(format!("Attacked by a {name}!")));
    }

    fn apply_projectile_hit(&mut self, owner: &str, projectile_type: u32, damage: f32, tile: TileCoord, target_type: u32) {
        if self.map.object_at(tile) != Some(target_type) {
            return;
        }
        let Some(animal) = self.registry.animal(target_type) else {
            return;
        };
        let base_hp = animal.hp;
        let mut data = self.map.object_data(tile).cloned().unwrap_or_else(|| json!({}));
        let hp = data.get("hp").and_then(Value::as_f64).map(|hp| hp as f32).unwrap_or(base_hp) - damage;

        if hp <= 0.0 {
            if let Some(result) = self.find_recipe(Some(projectile_type), target_type).map(|r| r.result) {
                self.unregister_at(tile);
                self.map.set_object(tile, result, None);
                self.register_object(tile, result);
                self.broadcast(ServerEvent::world_update(tile, Some(result), None));
                info!(hunter = %owner, animal = target_type, %tile, "animal hunted");
                let xp = self.config.xp_per_hunt;
                if let Some(total) = self.players.add_experience(&mut self.world, owner, xp) {
                    self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(owner).with("experience", total)));
                }
                return;
            }
        }

        if let Some(fields) = data.as_object_mut() {
            fields.insert("hp".to_string(), json!(hp.max(0.0)));
        }
        self.map.set_object_data(tile, data.clone());
        self.broadcast(ServerEvent::world_update(tile, Some(target_type), Some(data)));
    }

    /// Kill on starvation or old age, keep max hunger in step with age, and
    /// broadcast every player's vitals.
    fn sync_player_stats(&mut self) {
        for id in self.players.player_ids() {
            let Some(entity) = self.players.entity(&id) else {
                continue;
            };
            let starving = self.world.get::<Hunger>(entity).is_some_and(Hunger::is_starving);
            let old = self.world.get::<Age>(entity).is_some_and(Age::is_dead);
            if starving {
                self.kill_player(&id, CAUSE_STARVATION);
                continue;
            }
            if old {
                self.kill_player(&id, CAUSE_OLD_AGE);
                continue;
            }
            let age = self.world.get::<Age>(entity).map(|a| a.age).unwrap_or(0);
            if let Some(mut hunger) = self.world.get_mut::<Hunger>(entity) {
                hunger.update_max_for_age(age, BABY_MAX_AGE);
            }
            let Some(view) = self.players.view(&self.world, &id) else {
                continue;
            };
            let update = StatUpdate::new(&id)
                .with("age", view.age)
                .with("hunger", view.hunger)
                .with("maxHunger", view.max_hunger)
                .with("experience", view.experience)
                .with("heldBy", view.held_by)
                .with("holdingPlayerId", view.holding_player_id);
            self.broadcast(ServerEvent::PlayerStatUpdate(update));
        }
    }

    // ─── Death and removal ──────────────────────────────────────────────────

    fn kill_entity(&mut self, entity: Entity, reason: &str) {
        if is_deleted(&self.world, entity) {
            return;
        }
        if let Some(id) = self.players.id_of(&self.world, entity) {
            self.kill_player(&id, reason);
        }
    }

    /// Kill a living player: death screen, bones, removal.
    pub fn kill_player(&mut self, id: &str, reason: &str) -> bool {
        let Some(record) = self.players.kill_player(&mut self.world, id, reason) else {
            return false;
        };
        let view = &record.view;
        self.stats.player_died(reason, view.age, view.gender);
        self.place_bones(view, reason);
        self.send(
            id,
            ServerEvent::DeathScreen {
                name: view.name.clone(),
                age: view.age,
                cause: reason.to_string(),
                mother: view.mother_name.clone(),
                experience: view.experience,
            },
        );
        self.broadcast(ServerEvent::PlayerDied {
            id: id.to_string(),
            reason: reason.to_string(),
        });
        if let Some(baby) = record.released_baby {
            self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(baby).with("heldBy", Value::Null)));
        }
        if let Some(holder) = record.former_holder {
            self.broadcast(ServerEvent::PlayerStatUpdate(
                StatUpdate::new(holder)
                    .with("holding", Value::Null)
                    .with("holdingData", Value::Null)
                    .with("holdingPlayerId", Value::Null),
            ));
        }
        true
    }

    /// Remove a player who left. Leaves bones behind; `announce` broadcasts
    /// the disconnect.
    pub fn remove_player(&mut self, id: &str, announce: bool) -> bool {
        let Some(view) = self.players.view(&self.world, id) else {
            return false;
        };
        self.place_bones(&view, CAUSE_LEFT);
        let holder = self.players.holder_of(id).map(str::to_string);
        let baby = self.players.baby_held_by(id).map(str::to_string);
        self.players.remove_player(&mut self.world, id);
        self.stats.player_died(CAUSE_LEFT, view.age, view.gender);
        if let Some(holder) = holder {
            self.broadcast(ServerEvent::PlayerStatUpdate(
                StatUpdate::new(holder)
                    .with("holding", Value::Null)
                    .with("holdingData", Value::Null)
                    .with("holdingPlayerId", Value::Null),
            ));
        }
        if let Some(baby) = baby {
            self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(baby).with("heldBy", Value::Null)));
        }
        info!(player = %id, "player removed");
        if announce {
            self.broadcast(ServerEvent::PlayerDisconnected(id.to_string()));
        }
        true
    }

    fn place_bones(&mut self, view: &PlayerView, cause: &str) {
        let Some(bones) = self.registry.id_of(KEY_BONES) else {
            return;
        };
        let tile = view.tile();
        let blocked = self
            .map
            .object_at(tile)
            .and_then(|id| self.registry.definition(id))
            .is_some_and(|def| def.is_large() || def.is_structure());
        if blocked {
            return;
        }
        let name = if view.name.is_empty() {
            UNKNOWN_SOUL
        } else {
            view.name.as_str()
        };
        let data = json!({
            "name": name,
            "age": view.age,
            "diedAt": chrono::Utc::now().timestamp_millis(),
            "cause": cause,
        });
        self.unregister_at(tile);
        if self.map.set_object(tile, bones, Some(data.clone())) {
            self.broadcast(ServerEvent::world_update(tile, Some(bones), Some(data)));
        }
    }

    // ─── Shooting ───────────────────────────────────────────────────────────

    /// Fire the held weapon. Ranged weapons use up one unit of their ammo
    /// (backpack first); thrown weapons leave the hand and fly themselves.
    pub fn handle_shoot(&mut self, id: &str, angle: f32) -> bool {
        let Some(view) = self.players.view(&self.world, id) else {
            return false;
        };
        let Some(weapon) = view.holding.and_then(|h| self.registry.item(h)).filter(|i| i.is_weapon) else {
            return false;
        };
        let weapon_type = weapon.weapon_type;
        let ammo_key = weapon.ammo_type.clone();
        let damage = weapon.weapon_damage.unwrap_or(DEFAULT_DAMAGE);
        let weapon_id = weapon.id;
        let profile = shot_profile(view.age, view.experience, weapon.weapon_max_dist);

        let projectile_type = match weapon_type {
            Some(WeaponType::Melee) => return false,
            Some(WeaponType::Ranged) => {
                let Some(ammo) = ammo_key.as_deref().and_then(|k| self.registry.id_of(k)) else {
                    self.send(id, ServerEvent::text("No ammo type defined!"));
                    return false;
                };
                // Some(Some(backpack)) when the backpack supplied the ammo.
                let consumed = {
                    let Some(mut inventory) = self.players.inventory_mut(&mut self.world, id) else {
                        return false;
                    };
                    if inventory.consume_from_backpack(ammo) {
                        Some(Some((inventory.backpack, inventory.backpack_data())))
                    } else if inventory.consume_item(ammo) {
                        Some(None)
                    } else {
                        None
                    }
                };
                match consumed {
                    Some(Some((backpack, data))) => self.broadcast(ServerEvent::PlayerStatUpdate(
                        StatUpdate::new(id).with("backpack", backpack).with("backpackData", data),
                    )),
                    Some(None) => {}
                    None => {
                        self.send(id, ServerEvent::text("No ammo!"));
                        return false;
                    }
                }
                ammo
            }
            _ => {
                self.players.update_player_holding(&mut self.world, id, None, None);
                self.broadcast(ServerEvent::PlayerStatUpdate(
                    StatUpdate::new(id).with("holding", Value::Null).with("holdingData", Value::Null),
                ));
                weapon_id
            }
        };

        let jitter = (self.rng.gen::<f32>() - 0.5) * profile.accuracy;
        self.projectiles.create(
            &mut self.world,
            id,
            view.x,
            view.y,
            angle + jitter,
            projectile_type,
            profile.max_dist,
            damage,
        );
        debug!(player = %id, projectile_type, "shot fired");
        true
    }

    // ─── World ──────────────────────────────────────────────────────────────

    /// Throw the map away and generate a new one. Players keep their places.
    pub fn reinitialize_world(&mut self, seed: u64) {
        self.clear_object_components();
        self.map.regenerate(seed);
        self.map.request_save_now();
        self.stats.reset_world_stats();
        self.register_world_objects();
        info!(seed, objects = self.map.object_count(), "world reinitialized");
        let state = self.map.state();
        self.broadcast(ServerEvent::WorldReset(state));
    }

    pub fn map(&self) -> &WorldMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut WorldMap {
        &mut self.map
    }

    pub fn world_state(&self) -> WorldState {
        self.map.state()
    }

    pub fn season(&self) -> Season {
        self.season.current()
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<TickCounter>().0
    }

    // ─── Config ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GameConfig) {
        self.config = config;
        self.broadcast(ServerEvent::ConfigUpdate(self.config.clone()));
    }

    pub fn module_states(&self) -> BTreeMap<&'static str, bool> {
        self.config.module_states()
    }

    /// Toggle a gameplay module. Unknown names are rejected.
    pub fn set_module_state(&mut self, name: &str, enabled: bool) -> bool {
        if !self.config.set_module(name, enabled) {
            warn!(module = name, "unknown module");
            return false;
        }
        info!(module = name, enabled, "module toggled");
        self.broadcast(ServerEvent::ConfigUpdate(self.config.clone()));
        true
    }

    // ─── Players ────────────────────────────────────────────────────────────

    pub fn players(&self) -> &PlayerManager {
        &self.players
    }

    pub fn player(&self, id: &str) -> Option<PlayerView> {
        self.players.view(&self.world, id)
    }

    pub fn feed_player(&mut self, id: &str, amount: u32) -> Option<(u32, u32)> {
        self.players.feed_player(&mut self.world, id, amount)
    }

    pub fn move_player_to(&mut self, id: &str, x: f32, y: f32) -> bool {
        let Some(moved) = self.players.move_player_to(&mut self.world, id, x, y) else {
            return false;
        };
        self.broadcast(ServerEvent::PlayerMoved(moved.player));
        if let Some(baby) = moved.held_baby {
            self.broadcast(ServerEvent::PlayerMoved(baby));
        }
        true
    }

    pub fn toggle_boat(&mut self, id: &str, in_boat: bool) -> bool {
        if self.players.toggle_boat(&mut self.world, id, in_boat).is_none() {
            return false;
        }
        self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(id).with("inBoat", in_boat)));
        true
    }

    /// Hand a character over to a new connection id.
    pub fn update_player_id(&mut self, old_id: &str, new_id: &str) -> bool {
        self.players.update_player_id(&mut self.world, old_id, new_id)
    }

    // ─── Outgoing ───────────────────────────────────────────────────────────

    /// Everything a client needs on join.
    pub fn init_payload(&self, my_id: &str, session_token: Option<String>, reconnected: bool) -> InitPayload {
        InitPayload {
            players: self.players.views(&self.world),
            world: self.map.state(),
            season: self.season.current(),
            my_id: my_id.to_string(),
            recipes: self.recipes.clone(),
            config: self.config.clone(),
            registry: self.registry.data().clone(),
            session_token,
            reconnected,
        }
    }

    /// World counters plus year and season.
    pub fn statistics(&mut self) -> GameStatistics {
        let registry = &self.registry;
        self.stats.update_world_stats(
            self.map.size(),
            self.map.objects().map(|(_, type_id)| type_id),
            |type_id| match registry.definition(type_id) {
                Some(Definition::Animal(a)) => (ObjectKind::Animal, Some(a.name.as_str())),
                Some(Definition::Resource(r)) => (ObjectKind::Resource, Some(r.name.as_str())),
                _ => (ObjectKind::Other, None),
            },
        );
        self.stats.set_year(self.season.current_year());
        self.stats.set_season(self.season.current());
        self.stats.stats().clone()
    }

    pub fn uptime(&self) -> String {
        self.stats.uptime()
    }

    pub fn drain_events(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.world.resource_mut::<OutgoingEvents>().events)
    }

    pub(crate) fn emit(&mut self, audience: Audience, event: ServerEvent) {
        self.world
            .resource_mut::<OutgoingEvents>()
            .events
            .push(Outgoing { audience, event });
    }

    pub(crate) fn broadcast(&mut self, event: ServerEvent) {
        self.emit(Audience::All, event);
    }

    pub(crate) fn send(&mut self, id: &str, event: ServerEvent) {
        self.emit(Audience::Player(id.to_string()), event);
    }

    /// `holding`/`holdingData` of a player as a partial update.
    pub(crate) fn hands_update(&self, id: &str) -> StatUpdate {
        let (holding, data) = self.players.holding_data(&self.world, id).unwrap_or((None, None));
        StatUpdate::new(id).with("holding", holding).with("holdingData", data)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    use lineage_world::{Biome, WorldMap};

    use super::*;
    use crate::components::Gender;

    pub fn registry() -> Registry {
        let dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data"));
        Registry::load(&dir).unwrap()
    }

    pub fn engine_on(biome: Biome) -> GameEngine {
        GameEngine::new(WorldMap::filled(20, biome), registry(), GameConfig::default(), 7).unwrap()
    }

    pub fn engine() -> GameEngine {
        engine_on(Biome::Grassland)
    }

    pub fn id(engine: &GameEngine, key: &str) -> u32 {
        engine.registry.id_of(key).unwrap()
    }

    /// Spawn an Eve at a fixed tile with the given age.
    pub fn adult(engine: &mut GameEngine, id: &str, gender: Gender, age: u32, tile: TileCoord) {
        engine
            .players
            .create_player(&mut engine.world, &engine.map, id, None, &engine.config, Some(gender), None)
            .unwrap();
        let entity = engine.players.entity(id).unwrap();
        engine.world.get_mut::<Age>(entity).unwrap().age = age;
        let (x, y) = tile.center();
        engine.players.move_player_to(&mut engine.world, id, x, y);
        engine.stats.player_joined(true, gender);
    }

    pub fn hold(engine: &mut GameEngine, id: &str, item: u32, data: Option<Value>) {
        engine.players.update_player_holding(&mut engine.world, id, Some(item), data);
    }

    pub fn set_hunger(engine: &mut GameEngine, id: &str, current: u32) {
        let entity = engine.players.entity(id).unwrap();
        engine.world.get_mut::<Hunger>(entity).unwrap().current = current;
    }

    pub fn texts_for(events: &[Outgoing], id: &str) -> Vec<String> {
        events
            .iter()
            .filter(|o| o.audience.includes(id))
            .filter_map(|o| match &o.event {
                ServerEvent::TextMessage { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn kinds(events: &[Outgoing]) -> Vec<&'static str> {
        events.iter().map(|o| o.event.kind()).collect()
    }
}
