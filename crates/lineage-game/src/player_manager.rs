//! Player lifecycle: birth, lineage, holding relationships, inventories.
//!
//! Characters are bevy entities keyed by their connection id. Who holds
//! which baby is kept here in two maps (holder -> baby, baby -> holder) that
//! are always updated together, so either side can be looked up directly.

use std::collections::{BTreeMap, HashMap};

use bevy_ecs::prelude::*;
use lineage_world::{TileCoord, WorldMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::components::{
    Age, Experience, Gender, Health, Hunger, Identity, InBoat, Inventory, PlayerId, Position,
    BABY_MAX_AGE, CRAWL_FACTOR, DEFAULT_INVENTORY_CAPACITY, FERTILE_MAX_AGE, FERTILE_MIN_AGE,
};
use crate::config::GameConfig;
use crate::ecs::{mark_deleted, Deleted};

/// Object type a player holds while carrying a baby.
pub const OBJECT_BABY: u32 = 100;
pub const EVE_MOTHER_NAME: &str = "The Great Mother (EVE)";
pub const BABY_NAME: &str = "Baby";
const START_HEALTH: f32 = 100.0;

/// Read model of a player, rebuilt from components on every query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub age: u32,
    pub hunger: u32,
    pub max_hunger: u32,
    pub holding: Option<u32>,
    pub holding_data: Option<Value>,
    pub backpack: Option<u32>,
    pub backpack_data: Option<Value>,
    pub name: String,
    pub gender: Gender,
    pub mother_id: Option<String>,
    pub mother_name: String,
    pub generation: u32,
    pub experience: u32,
    pub is_dead: bool,
    pub held_by: Option<String>,
    pub holding_player_id: Option<String>,
    pub in_boat: bool,
    pub health: f32,
}

impl PlayerView {
    pub fn tile(&self) -> TileCoord {
        TileCoord::from_pixels(self.x, self.y)
    }
}

/// Something a mother had in her hands when her baby arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedItem {
    pub tile: TileCoord,
    pub object_type: u32,
    pub data: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Birth {
    pub player: PlayerView,
    pub mother: Option<PlayerView>,
    pub dropped: Option<DroppedItem>,
}

#[derive(Debug, Clone)]
pub struct MoveResult {
    pub player: PlayerView,
    pub held_baby: Option<PlayerView>,
}

/// Final state of a character that just died.
#[derive(Debug, Clone)]
pub struct DeathRecord {
    pub id: String,
    pub reason: String,
    /// Projection taken at the moment of death, `is_dead` set.
    pub view: PlayerView,
    /// Baby that was in the dead player's arms, now on the ground.
    pub released_baby: Option<String>,
    /// Player who was carrying the dead baby; their hands are now empty.
    pub former_holder: Option<String>,
}

pub struct PlayerManager {
    players: HashMap<String, Entity>,
    /// holder -> baby
    holding: HashMap<String, String>,
    /// baby -> holder
    held_by: HashMap<String, String>,
    rng: StdRng,
}

impl PlayerManager {
    pub fn new(seed: u64) -> Self {
        Self {
            players: HashMap::new(),
            holding: HashMap::new(),
            held_by: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Spawn a character. Without a (present) mother this is an Eve.
    /// Returns `None` if the id is already in use.
    #[allow(clippy::too_many_arguments)]
    pub fn create_player(
        &mut self,
        world: &mut World,
        map: &WorldMap,
        id: &str,
        mother_id: Option<&str>,
        config: &GameConfig,
        forced_gender: Option<Gender>,
        forced_name: Option<&str>,
    ) -> Option<Birth> {
        if self.players.contains_key(id) {
            return None;
        }
        let mother = mother_id.and_then(|m| self.players.get(m).map(|&e| (m.to_string(), e)));

        let (position, age, identity) = match &mother {
            Some((mother_id, mother_entity)) => {
                let mother_pos = world.get::<Position>(*mother_entity).copied();
                let mother_identity = world.get::<Identity>(*mother_entity).cloned();
                let gender = forced_gender.unwrap_or_else(|| {
                    if self.rng.gen_bool(0.5) {
                        Gender::Male
                    } else {
                        Gender::Female
                    }
                });
                let identity = Identity {
                    name: forced_name.unwrap_or(BABY_NAME).to_string(),
                    mother_id: Some(mother_id.clone()),
                    mother_name: mother_identity
                        .as_ref()
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| EVE_MOTHER_NAME.to_string()),
                    gender,
                    generation: mother_identity.map(|i| i.generation).unwrap_or(0) + 1,
                };
                (mother_pos.unwrap_or(Position::new(0.0, 0.0)), 0, identity)
            }
            None => {
                let (x, y) = map.random_passable_pos(&mut self.rng);
                let name = match forced_name {
                    Some(name) => name.to_string(),
                    None => format!("Eve {}", id.chars().take(4).collect::<String>()),
                };
                let identity = Identity {
                    name,
                    mother_id: None,
                    mother_name: EVE_MOTHER_NAME.to_string(),
                    gender: forced_gender.unwrap_or(Gender::Female),
                    generation: 1,
                };
                (Position::new(x, y), config.spawn_eve_age, identity)
            }
        };

        let mut hunger = Hunger::new(config.max_hunger);
        hunger.update_max_for_age(age, BABY_MAX_AGE);
        let generation = identity.generation;
        let entity = world
            .spawn((
                PlayerId(id.to_string()),
                position,
                Health {
                    hp: START_HEALTH,
                    max: START_HEALTH,
                },
                hunger,
                Age {
                    age,
                    max: config.max_age,
                },
                identity,
                Experience::default(),
                Inventory::new(DEFAULT_INVENTORY_CAPACITY),
            ))
            .id();
        self.players.insert(id.to_string(), entity);

        let mut dropped = None;
        let mut mother_view = None;
        if let Some((mother_id, mother_entity)) = mother {
            // A baby already in her arms is set down first.
            self.put_down_baby(world, &mother_id);
            if let Some(mut inventory) = world.get_mut::<Inventory>(mother_entity) {
                if let Some((object_type, data)) = inventory.drop_held() {
                    dropped = Some(DroppedItem {
                        tile: position.tile(),
                        object_type,
                        data,
                    });
                }
                inventory.set_holding(Some(OBJECT_BABY), Some(json!({ "babyId": id })));
            }
            self.link(&mother_id, id);
            mother_view = self.view(world, &mother_id);
            info!(player = %id, mother = %mother_id, generation, "baby born");
        } else {
            info!(player = %id, "eve spawned");
        }

        Some(Birth {
            player: self.view(world, id)?,
            mother: mother_view,
            dropped,
        })
    }

    /// Kill a character: take its final projection, release relationships,
    /// and tag the entity for removal.
    pub fn kill_player(&mut self, world: &mut World, id: &str, reason: &str) -> Option<DeathRecord> {
        let mut view = self.view(world, id)?;
        view.is_dead = true;
        let (released_baby, former_holder) = self.remove(world, id);
        info!(player = %id, reason, age = view.age, "player died");
        Some(DeathRecord {
            id: id.to_string(),
            reason: reason.to_string(),
            view,
            released_baby,
            former_holder,
        })
    }

    /// Remove a character without a death record.
    pub fn remove_player(&mut self, world: &mut World, id: &str) -> bool {
        if !self.players.contains_key(id) {
            return false;
        }
        self.remove(world, id);
        true
    }

    fn remove(&mut self, world: &mut World, id: &str) -> (Option<String>, Option<String>) {
        let released = self.put_down_baby(world, id);
        let holder = self.held_by.get(id).cloned();
        if let Some(holder) = &holder {
            self.put_down_baby(world, holder);
        }
        if let Some(entity) = self.players.remove(id) {
            mark_deleted(world, entity);
        }
        (released, holder)
    }

    /// Move a character (and its relationships) to a new connection id.
    /// Fails without side effects when `old_id` is unknown or `new_id` taken.
    pub fn update_player_id(&mut self, world: &mut World, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id || self.players.contains_key(new_id) {
            return false;
        }
        let Some(entity) = self.players.remove(old_id) else {
            return false;
        };
        self.players.insert(new_id.to_string(), entity);
        if let Some(mut player_id) = world.get_mut::<PlayerId>(entity) {
            player_id.0 = new_id.to_string();
        }

        if let Some(baby) = self.holding.remove(old_id) {
            self.held_by.insert(baby.clone(), new_id.to_string());
            self.holding.insert(new_id.to_string(), baby);
        }
        if let Some(holder) = self.held_by.remove(old_id) {
            self.holding.insert(holder.clone(), new_id.to_string());
            if let Some(&holder_entity) = self.players.get(&holder) {
                if let Some(mut inventory) = world.get_mut::<Inventory>(holder_entity) {
                    inventory.holding_data = Some(json!({ "babyId": new_id }));
                }
            }
            self.held_by.insert(new_id.to_string(), holder);
        }

        let mut children = world.query_filtered::<&mut Identity, Without<Deleted>>();
        for mut identity in children.iter_mut(world) {
            if identity.mother_id.as_deref() == Some(old_id) {
                identity.mother_id = Some(new_id.to_string());
            }
        }
        info!(old = %old_id, new = %new_id, "player id transplanted");
        true
    }

    // ─── Movement ───────────────────────────────────────────────────────────

    /// Move by a pixel delta. Held players cannot move; babies crawl.
    pub fn move_player(
        &mut self,
        world: &mut World,
        id: &str,
        dx: f32,
        dy: f32,
        is_passable: impl Fn(TileCoord) -> bool,
    ) -> Option<MoveResult> {
        if self.held_by.contains_key(id) {
            return None;
        }
        let entity = *self.players.get(id)?;
        let scale = match world.get::<Age>(entity) {
            Some(age) if age.is_baby() => CRAWL_FACTOR,
            _ => 1.0,
        };
        let current = *world.get::<Position>(entity)?;
        let next = Position::new(current.x + dx * scale, current.y + dy * scale);
        if !is_passable(next.tile()) {
            return None;
        }
        self.place(world, id, entity, next)
    }

    /// Teleport to pixel coordinates, unchecked.
    pub fn move_player_to(&mut self, world: &mut World, id: &str, x: f32, y: f32) -> Option<MoveResult> {
        let entity = *self.players.get(id)?;
        self.place(world, id, entity, Position::new(x, y))
    }

    fn place(&mut self, world: &mut World, id: &str, entity: Entity, to: Position) -> Option<MoveResult> {
        *world.get_mut::<Position>(entity)? = to;
        let held_baby = match self.holding.get(id).cloned() {
            Some(baby) => {
                if let Some(&baby_entity) = self.players.get(&baby) {
                    if let Some(mut pos) = world.get_mut::<Position>(baby_entity) {
                        *pos = to;
                    }
                }
                self.view(world, &baby)
            }
            None => None,
        };
        Some(MoveResult {
            player: self.view(world, id)?,
            held_baby,
        })
    }

    // ─── Babies ─────────────────────────────────────────────────────────────

    pub fn pick_up_baby(&mut self, world: &mut World, holder_id: &str, baby_id: &str) -> bool {
        if holder_id == baby_id || self.held_by.contains_key(baby_id) || self.held_by.contains_key(holder_id) {
            return false;
        }
        let (Some(&holder), Some(&baby)) = (self.players.get(holder_id), self.players.get(baby_id)) else {
            return false;
        };
        let holder_ok = world.get::<Age>(holder).is_some_and(|a| !a.is_baby())
            && world.get::<Inventory>(holder).is_some_and(|i| i.holding.is_none());
        let baby_ok = world.get::<Age>(baby).is_some_and(Age::is_baby);
        let (Some(holder_pos), Some(baby_pos)) = (
            world.get::<Position>(holder).copied(),
            world.get::<Position>(baby).copied(),
        ) else {
            return false;
        };
        if !holder_ok || !baby_ok || holder_pos.tile() != baby_pos.tile() {
            return false;
        }

        if let Some(mut inventory) = world.get_mut::<Inventory>(holder) {
            inventory.set_holding(Some(OBJECT_BABY), Some(json!({ "babyId": baby_id })));
        }
        if let Some(mut pos) = world.get_mut::<Position>(baby) {
            *pos = holder_pos;
        }
        self.link(holder_id, baby_id);
        debug!(holder = %holder_id, baby = %baby_id, "baby picked up");
        true
    }

    /// Returns the released baby, if one was held.
    pub fn put_down_baby(&mut self, world: &mut World, holder_id: &str) -> Option<String> {
        let baby = self.holding.remove(holder_id)?;
        self.held_by.remove(&baby);
        if let Some(&holder) = self.players.get(holder_id) {
            if let Some(mut inventory) = world.get_mut::<Inventory>(holder) {
                inventory.set_holding(None, None);
            }
        }
        Some(baby)
    }

    fn link(&mut self, holder_id: &str, baby_id: &str) {
        self.holding.insert(holder_id.to_string(), baby_id.to_string());
        self.held_by.insert(baby_id.to_string(), holder_id.to_string());
    }

    /// Give a baby its first name: "First of MotherFirst".
    pub fn rename_baby(&mut self, world: &mut World, baby_id: &str, first_name: &str) -> Option<PlayerView> {
        let entity = *self.players.get(baby_id)?;
        {
            let mut identity = world.get_mut::<Identity>(entity)?;
            let mother_first = identity
                .mother_name
                .split(" of ")
                .next()
                .unwrap_or_default()
                .to_string();
            identity.name = format!("{first_name} of {mother_first}");
        }
        self.view(world, baby_id)
    }

    // ─── Hands and backpack ─────────────────────────────────────────────────

    /// Restore hunger. Returns `(hunger, max_hunger)`.
    pub fn feed_player(&mut self, world: &mut World, id: &str, amount: u32) -> Option<(u32, u32)> {
        let entity = *self.players.get(id)?;
        let mut hunger = world.get_mut::<Hunger>(entity)?;
        hunger.eat(amount);
        Some((hunger.current, hunger.max))
    }

    pub fn update_player_holding(&mut self, world: &mut World, id: &str, holding: Option<u32>, data: Option<Value>) -> bool {
        let Some(mut inventory) = self.inventory_mut(world, id) else {
            return false;
        };
        inventory.set_holding(holding, data);
        true
    }

    pub fn holding_data(&self, world: &World, id: &str) -> Option<(Option<u32>, Option<Value>)> {
        let inventory = world.get::<Inventory>(*self.players.get(id)?)?;
        Some((inventory.holding, inventory.holding_data.clone()))
    }

    pub fn equip_backpack(&mut self, world: &mut World, id: &str, container: u32, data: Option<&Value>) -> bool {
        self.inventory_mut(world, id)
            .is_some_and(|mut inventory| inventory.equip_backpack(container, data))
    }

    pub fn unequip_backpack(&mut self, world: &mut World, id: &str) -> Option<(u32, Value)> {
        self.inventory_mut(world, id)?.unequip_backpack()
    }

    pub fn backpack_data(&self, world: &World, id: &str) -> Option<(Option<u32>, Option<Value>)> {
        let inventory = world.get::<Inventory>(*self.players.get(id)?)?;
        Some((inventory.backpack, inventory.backpack_data()))
    }

    pub fn add_to_backpack(&mut self, world: &mut World, id: &str, item: u32, capacity: usize) -> bool {
        self.inventory_mut(world, id)
            .is_some_and(|mut inventory| inventory.add_to_backpack(item, capacity))
    }

    pub fn take_from_backpack(&mut self, world: &mut World, id: &str) -> Option<u32> {
        self.inventory_mut(world, id)?.take_from_backpack()
    }

    pub fn inventory_mut<'w>(&self, world: &'w mut World, id: &str) -> Option<Mut<'w, Inventory>> {
        world.get_mut::<Inventory>(*self.players.get(id)?)
    }

    pub fn add_experience(&mut self, world: &mut World, id: &str, amount: u32) -> Option<u32> {
        let entity = *self.players.get(id)?;
        let mut experience = world.get_mut::<Experience>(entity)?;
        experience.0 += amount;
        Some(experience.0)
    }

    // ─── Boat ───────────────────────────────────────────────────────────────

    /// Enter or leave a boat. Returns the new state.
    pub fn toggle_boat(&mut self, world: &mut World, id: &str, in_boat: bool) -> Option<bool> {
        let entity = *self.players.get(id)?;
        if in_boat {
            world.entity_mut(entity).insert(InBoat);
        } else {
            world.entity_mut(entity).remove::<InBoat>();
        }
        Some(in_boat)
    }

    pub fn is_in_boat(&self, world: &World, id: &str) -> bool {
        self.players
            .get(id)
            .is_some_and(|&e| world.get::<InBoat>(e).is_some())
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    pub fn view(&self, world: &World, id: &str) -> Option<PlayerView> {
        let entity = *self.players.get(id)?;
        let position = world.get::<Position>(entity)?;
        let hunger = world.get::<Hunger>(entity)?;
        let age = world.get::<Age>(entity)?;
        let identity = world.get::<Identity>(entity)?;
        let inventory = world.get::<Inventory>(entity)?;
        Some(PlayerView {
            id: id.to_string(),
            x: position.x,
            y: position.y,
            age: age.age,
            hunger: hunger.current,
            max_hunger: hunger.max,
            holding: inventory.holding,
            holding_data: inventory.holding_data.clone(),
            backpack: inventory.backpack,
            backpack_data: inventory.backpack_data(),
            name: identity.name.clone(),
            gender: identity.gender,
            mother_id: identity.mother_id.clone(),
            mother_name: identity.mother_name.clone(),
            generation: identity.generation,
            experience: world.get::<Experience>(entity).map(|e| e.0).unwrap_or(0),
            is_dead: world.get::<Deleted>(entity).is_some(),
            held_by: self.held_by.get(id).cloned(),
            holding_player_id: self.holding.get(id).cloned(),
            in_boat: world.get::<InBoat>(entity).is_some(),
            health: world.get::<Health>(entity).map(|h| h.hp).unwrap_or(0.0),
        })
    }

    pub fn views(&self, world: &World) -> BTreeMap<String, PlayerView> {
        self.players
            .keys()
            .filter_map(|id| self.view(world, id).map(|v| (id.clone(), v)))
            .collect()
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.players.get(id).copied()
    }

    /// Connection id of a player entity.
    pub fn id_of(&self, world: &World, entity: Entity) -> Option<String> {
        world.get::<PlayerId>(entity).map(|p| p.0.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Sorted for reproducible iteration.
    pub fn player_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.players.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Women who can give birth right now.
    pub fn potential_mothers(&self, world: &World) -> Vec<String> {
        self.player_ids()
            .into_iter()
            .filter(|id| !self.holding.contains_key(id))
            .filter(|id| {
                let Some(&entity) = self.players.get(id) else {
                    return false;
                };
                let female = world
                    .get::<Identity>(entity)
                    .is_some_and(|i| i.gender == Gender::Female);
                let fertile = world
                    .get::<Age>(entity)
                    .is_some_and(|a| (FERTILE_MIN_AGE..FERTILE_MAX_AGE).contains(&a.age));
                female && fertile
            })
            .collect()
    }

    pub fn is_being_held(&self, id: &str) -> bool {
        self.held_by.contains_key(id)
    }

    pub fn is_holding_baby(&self, id: &str) -> bool {
        self.holding.contains_key(id)
    }

    pub fn holder_of(&self, baby_id: &str) -> Option<&str> {
        self.held_by.get(baby_id).map(String::as_str)
    }

    pub fn baby_held_by(&self, holder_id: &str) -> Option<&str> {
        self.holding.get(holder_id).map(String::as_str)
    }

    pub fn gender_of(&self, world: &World, id: &str) -> Option<Gender> {
        world.get::<Identity>(*self.players.get(id)?).map(|i| i.gender)
    }

    pub fn age_of(&self, world: &World, id: &str) -> Option<u32> {
        world.get::<Age>(*self.players.get(id)?).map(|a| a.age)
    }

    pub fn tile_of(&self, world: &World, id: &str) -> Option<TileCoord> {
        world.get::<Position>(*self.players.get(id)?).map(Position::tile)
    }
}
