//! Handlers for player commands forwarded by the network layer.
//!
//! Every handler is a defensive no-op on bad input: unknown players, empty
//! tiles and impossible actions return `false` without side effects.

use lineage_world::TileCoord;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::components::{container_items, Gender, BABY_MAX_AGE};
use crate::events::{Audience, ServerEvent, StatUpdate};
use crate::player_manager::{DroppedItem, OBJECT_BABY};
use crate::registry::DEFAULT_CAPACITY;

use super::GameEngine;

/// Hunger a held baby regains per feeding.
pub const MILK_FOOD_VALUE: u32 = 3;
pub const MAX_NAME_LEN: usize = 12;
pub const MAX_CHAT_LEN: usize = 50;
/// How far from the mother a displaced item may land.
const DROP_SEARCH_RADIUS: i32 = 3;

/// Trim, check and capitalize a baby name.
pub fn validate_name(raw: &str) -> Result<String, &'static str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Name cannot be empty");
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err("Name must be 12 letters or fewer");
    }
    if !name.chars().all(char::is_alphabetic) {
        return Err("Name can only contain letters");
    }
    let mut chars = name.chars();
    let first = chars.next().map(|c| c.to_uppercase().collect::<String>()).unwrap_or_default();
    Ok(first + &chars.as_str().to_lowercase())
}

impl GameEngine {
    // ─── Birth ──────────────────────────────────────────────────────────────

    /// Spawn a new character for connection `id`: born to a random fertile
    /// mother, or as an Eve when there is none.
    pub fn request_birth(&mut self, id: &str, session_token: Option<String>) -> bool {
        if self.players.contains(id) {
            return false;
        }
        let mothers = self.players.potential_mothers(&self.world);
        let mother = mothers.choose(&mut self.rng).cloned();

        let (forced_gender, forced_name) = match mother {
            Some(_) => (None, None),
            None => {
                let name = format!("Eve Gen {}", self.eve_generation);
                self.eve_generation += 1;
                (Some(Gender::Female), Some(name))
            }
        };
        let Some(birth) = self.players.create_player(
            &mut self.world,
            &self.map,
            id,
            mother.as_deref(),
            &self.config,
            forced_gender,
            forced_name.as_deref(),
        ) else {
            return false;
        };
        self.stats.player_joined(birth.mother.is_none(), birth.player.gender);
        self.stats.update_generation(birth.player.generation);

        if let Some(dropped) = birth.dropped {
            self.place_displaced(dropped);
        }

        let init = self.init_payload(id, session_token, false);
        self.send(id, ServerEvent::Init(Box::new(init)));
        self.emit(Audience::AllExcept(id.to_string()), ServerEvent::NewPlayer(birth.player.clone()));

        if let Some(mother) = birth.mother {
            let gender = birth.player.gender;
            let (child, pronoun) = match gender {
                Gender::Male => ("son", "his"),
                Gender::Female => ("daughter", "her"),
            };
            self.send(
                &mother.id,
                ServerEvent::NameBaby {
                    baby_id: id.to_string(),
                    gender,
                    message: format!("You gave birth to a {child}! What is {pronoun} name?"),
                },
            );
            self.broadcast(ServerEvent::PlayerStatUpdate(
                StatUpdate::new(&mother.id)
                    .with("holding", mother.holding)
                    .with("holdingData", mother.holding_data)
                    .with("holdingPlayerId", mother.holding_player_id),
            ));
        }
        true
    }

    /// Put an item pushed out of the mother's hands on her tile, or the
    /// nearest free tile around it.
    fn place_displaced(&mut self, dropped: DroppedItem) {
        let Some(tile) = self.free_tile_near(dropped.tile, DROP_SEARCH_RADIUS) else {
            debug!(tile = %dropped.tile, "no room for displaced item");
            return;
        };
        self.map.set_object(tile, dropped.object_type, dropped.data.clone());
        self.register_object(tile, dropped.object_type);
        self.broadcast(ServerEvent::world_update(tile, Some(dropped.object_type), dropped.data));
    }

    fn free_tile_near(&self, center: TileCoord, radius: i32) -> Option<TileCoord> {
        let free = |t: TileCoord| t.in_bounds(self.map.size()) && self.map.is_passable(t) && self.map.is_empty(t);
        if free(center) {
            return Some(center);
        }
        (1..=radius).find_map(|r| {
            (-r..=r)
                .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
                .filter(|(dx, dy)| dx.abs() == r || dy.abs() == r)
                .map(|(dx, dy)| center.offset(dx, dy))
                .find(|&t| free(t))
        })
    }

    pub fn name_baby(&mut self, holder: &str, baby: &str, raw_name: &str) -> bool {
        let holds_it = self
            .player(holder)
            .is_some_and(|v| v.holding_player_id.as_deref() == Some(baby));
        if !holds_it {
            self.send(
                holder,
                ServerEvent::NameError {
                    message: "You are not holding this baby".to_string(),
                },
            );
            return false;
        }
        let first = match validate_name(raw_name) {
            Ok(first) => first,
            Err(message) => {
                self.send(
                    holder,
                    ServerEvent::NameError {
                        message: message.to_string(),
                    },
                );
                return false;
            }
        };
        let Some(view) = self.players.rename_baby(&mut self.world, baby, &first) else {
            return false;
        };
        info!(baby = %baby, name = %view.name, "baby named");
        self.send(
            holder,
            ServerEvent::NameSuccess {
                baby_id: baby.to_string(),
                name: view.name.clone(),
            },
        );
        self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(baby).with("name", view.name.clone())));
        self.send(holder, ServerEvent::text(format!("You named your child {}", view.name)));
        self.send(baby, ServerEvent::text(format!("Your mother named you {}", view.name)));
        true
    }

    // ─── Movement ───────────────────────────────────────────────────────────

    /// Move by a pixel delta. Water is passable only in a boat.
    pub fn move_player(&mut self, id: &str, dx: f32, dy: f32) -> bool {
        if !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        let in_boat = self.players.is_in_boat(&self.world, id);
        let map = &self.map;
        let passable = |t: TileCoord| t.in_bounds(map.size()) && (in_boat || map.is_passable(t));
        let Some(moved) = self.players.move_player(&mut self.world, id, dx, dy, passable) else {
            return false;
        };
        self.broadcast(ServerEvent::PlayerMoved(moved.player));
        if let Some(baby) = moved.held_baby {
            self.broadcast(ServerEvent::PlayerMoved(baby));
        }
        true
    }

    // ─── Food ───────────────────────────────────────────────────────────────

    /// Babies in arms drink milk; everyone else eats what they hold, or the
    /// first edible thing in a held container.
    pub fn eat(&mut self, id: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        if view.held_by.is_some() && view.age < BABY_MAX_AGE {
            let Some((hunger, _)) = self.feed_player(id, MILK_FOOD_VALUE) else {
                return false;
            };
            self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(id).with("hunger", hunger)));
            return true;
        }
        let Some(held) = view.holding else {
            return false;
        };

        if let Some(food) = self.registry.definition(held).and_then(|d| d.food_value()) {
            let Some((hunger, _)) = self.feed_player(id, food) else {
                return false;
            };
            self.players.update_player_holding(&mut self.world, id, None, None);
            self.broadcast(ServerEvent::PlayerStatUpdate(
                self.hands_update(id).with("hunger", hunger),
            ));
            return true;
        }

        let is_container = self.registry.definition(held).is_some_and(|d| d.is_container());
        if !is_container {
            return false;
        }
        let mut items = container_items(view.holding_data.as_ref());
        let edible = items.iter().enumerate().find_map(|(index, &item)| {
            self.registry
                .definition(item)
                .and_then(|d| d.food_value())
                .map(|food| (index, food))
        });
        let Some((index, food)) = edible else {
            return false;
        };
        items.remove(index);
        let Some((hunger, _)) = self.feed_player(id, food) else {
            return false;
        };
        self.players
            .update_player_holding(&mut self.world, id, Some(held), Some(json!({ "inventory": items })));
        self.broadcast(ServerEvent::PlayerStatUpdate(
            self.hands_update(id).with("hunger", hunger),
        ));
        true
    }

    // ─── Hands ──────────────────────────────────────────────────────────────

    /// Pick up a baby on the same tile, or the object under the player.
    pub fn pick_up(&mut self, id: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        let tile = view.tile();

        if view.holding.is_none() && view.age >= BABY_MAX_AGE {
            let baby = self.players.player_ids().into_iter().find(|other| {
                other != id
                    && !self.players.is_being_held(other)
                    && self
                        .player(other)
                        .is_some_and(|v| v.age < BABY_MAX_AGE && v.tile() == tile)
            });
            if let Some(baby) = baby {
                if self.players.pick_up_baby(&mut self.world, id, &baby) {
                    self.broadcast(ServerEvent::PlayerStatUpdate(
                        self.hands_update(id).with("holdingPlayerId", baby.as_str()),
                    ));
                    self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(&baby).with("heldBy", id)));
                    self.send(&baby, ServerEvent::text(format!("{} picked you up!", view.name)));
                    return true;
                }
            }
        }

        let Some(target) = self.map.object_at(tile) else {
            return false;
        };
        let def = self.registry.definition(target);
        if def.is_some_and(|d| d.is_large() || d.is_structure()) {
            return false;
        }
        // Bare-hands targets are harvested with `use`, not carried off.
        if self.find_recipe(None, target).is_some() {
            return false;
        }
        let is_container = def.is_some_and(|d| d.is_container());

        if is_container && view.backpack.is_none() {
            let Some((_, data)) = self.map.remove_object(tile) else {
                return false;
            };
            self.unregister_at(tile);
            self.players.equip_backpack(&mut self.world, id, target, data.as_ref());
            self.broadcast(ServerEvent::world_update(tile, None, None));
            let (backpack, backpack_data) = self.players.backpack_data(&self.world, id).unwrap_or((None, None));
            self.broadcast(ServerEvent::PlayerStatUpdate(
                StatUpdate::new(id)
                    .with("backpack", backpack)
                    .with("backpackData", backpack_data),
            ));
            self.send(id, ServerEvent::text("Equipped backpack!"));
            return true;
        }

        if view.holding.is_some() {
            return false;
        }
        let Some((_, data)) = self.map.remove_object(tile) else {
            return false;
        };
        self.unregister_at(tile);
        self.players.update_player_holding(&mut self.world, id, Some(target), data);
        self.broadcast(ServerEvent::world_update(tile, None, None));
        self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
        true
    }

    /// Put down a held baby, or place the held object on the (empty) tile.
    pub fn drop(&mut self, id: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        let Some(held) = view.holding else {
            return false;
        };

        if held == OBJECT_BABY {
            let Some(baby) = self.players.put_down_baby(&mut self.world, id) else {
                return false;
            };
            self.broadcast(ServerEvent::PlayerStatUpdate(
                StatUpdate::new(id)
                    .with("holding", Value::Null)
                    .with("holdingData", Value::Null)
                    .with("holdingPlayerId", Value::Null),
            ));
            self.broadcast(ServerEvent::PlayerStatUpdate(StatUpdate::new(&baby).with("heldBy", Value::Null)));
            self.send(&baby, ServerEvent::text(format!("{} put you down.", view.name)));
            return true;
        }

        let tile = view.tile();
        if !self.map.is_empty(tile) || !self.map.set_object(tile, held, view.holding_data.clone()) {
            return false;
        }
        self.register_object(tile, held);
        self.players.update_player_holding(&mut self.world, id, None, None);
        self.broadcast(ServerEvent::world_update(tile, Some(held), view.holding_data));
        self.broadcast(ServerEvent::PlayerStatUpdate(
            StatUpdate::new(id).with("holding", Value::Null).with("holdingData", Value::Null),
        ));
        true
    }

    // ─── Backpack ───────────────────────────────────────────────────────────

    pub fn drop_backpack(&mut self, id: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        if view.backpack.is_none() {
            return false;
        }
        let tile = view.tile();
        if !tile.in_bounds(self.map.size()) || !self.map.is_empty(tile) {
            self.send(id, ServerEvent::text("Cannot drop here - tile occupied!"));
            return false;
        }
        let Some((container, data)) = self.players.unequip_backpack(&mut self.world, id) else {
            return false;
        };
        self.map.set_object(tile, container, Some(data.clone()));
        self.broadcast(ServerEvent::world_update(tile, Some(container), Some(data)));
        self.broadcast(ServerEvent::PlayerStatUpdate(
            StatUpdate::new(id).with("backpack", Value::Null).with("backpackData", Value::Null),
        ));
        self.send(id, ServerEvent::text("Dropped backpack."));
        true
    }

    /// Stow the held item in the worn backpack.
    pub fn add_held_to_backpack(&mut self, id: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        let (Some(held), Some(backpack)) = (view.holding, view.backpack) else {
            return false;
        };
        let Some(def) = self.registry.definition(held) else {
            return false;
        };
        if def.is_large() || def.is_container() {
            self.send(id, ServerEvent::text("This item is too big for the backpack!"));
            return false;
        }
        let capacity = self
            .registry
            .item(backpack)
            .and_then(|b| b.capacity)
            .unwrap_or(DEFAULT_CAPACITY);
        if !self.players.add_to_backpack(&mut self.world, id, held, capacity) {
            self.send(id, ServerEvent::text("Backpack is full!"));
            return false;
        }
        self.players.update_player_holding(&mut self.world, id, None, None);
        let (backpack, backpack_data) = self.players.backpack_data(&self.world, id).unwrap_or((None, None));
        self.broadcast(ServerEvent::PlayerStatUpdate(
            self.hands_update(id)
                .with("backpack", backpack)
                .with("backpackData", backpack_data),
        ));
        self.send(id, ServerEvent::text("Added to backpack."));
        true
    }

    /// Take the last stowed item into empty hands.
    pub fn take_held_from_backpack(&mut self, id: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        if view.backpack.is_none() || view.holding.is_some() {
            return false;
        }
        let Some(item) = self.players.take_from_backpack(&mut self.world, id) else {
            self.send(id, ServerEvent::text("Backpack is empty!"));
            return false;
        };
        self.players.update_player_holding(&mut self.world, id, Some(item), None);
        let (backpack, backpack_data) = self.players.backpack_data(&self.world, id).unwrap_or((None, None));
        self.broadcast(ServerEvent::PlayerStatUpdate(
            self.hands_update(id)
                .with("backpack", backpack)
                .with("backpackData", backpack_data),
        ));
        true
    }

    // ─── Chat ───────────────────────────────────────────────────────────────

    pub fn chat(&mut self, id: &str, text: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        let clipped: String = text.chars().take(MAX_CHAT_LEN).collect();
        let text = clipped.trim();
        if text.is_empty() {
            return false;
        }
        self.broadcast(ServerEvent::ChatMsg {
            id: id.to_string(),
            text: text.to_string(),
            name: view.name,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use lineage_world::TileCoord;

    use super::super::testing::*;
    use super::*;
    use crate::events::Outgoing;

    fn stat_updates<'a>(events: &'a [Outgoing], id: &str) -> Vec<&'a StatUpdate> {
        events
            .iter()
            .filter_map(|o| match &o.event {
                ServerEvent::PlayerStatUpdate(u) if u.id == id => Some(u),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn names_are_validated_and_capitalized() {
        assert_eq!(validate_name("  aDA "), Ok("Ada".to_string()));
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Bartholomewwww").is_err());
        assert!(validate_name("R2D2").is_err());
    }

    #[test]
    fn first_birth_is_an_eve() {
        let mut engine = engine();
        assert!(engine.request_birth("a", Some("tok".into())));
        let a = engine.player("a").unwrap();
        assert_eq!(a.name, "Eve Gen 1");
        assert_eq!(a.gender, Gender::Female);
        assert_eq!(a.generation, 1);
        assert_eq!(a.age, 14);
        assert!(engine.map().is_passable(a.tile()));

        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|o| o.audience == Audience::Player("a".into()) && o.event.kind() == "init"));
        assert!(events
            .iter()
            .any(|o| o.audience == Audience::AllExcept("a".into()) && o.event.kind() == "newPlayer"));

        // Age 14 is not fertile, so the next arrival is another Eve.
        assert!(engine.request_birth("b", None));
        assert_eq!(engine.player("b").unwrap().name, "Eve Gen 2");
        assert!(!engine.request_birth("b", None));
    }

    #[test]
    fn mother_holding_a_rock_drops_it_on_birth() {
        let mut engine = engine();
        let rock = id(&engine, "ROCK");
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "mom", Gender::Female, 20, tile);
        hold(&mut engine, "mom", rock, None);
        engine.drain_events();

        assert!(engine.request_birth("kid", None));
        assert_eq!(engine.map().object_at(tile), Some(rock));
        let mom = engine.player("mom").unwrap();
        assert_eq!(mom.holding, Some(OBJECT_BABY));
        assert_eq!(mom.holding_player_id.as_deref(), Some("kid"));
        assert_eq!(engine.players().holder_of("kid"), Some("mom"));
        assert_eq!(engine.players().baby_held_by("mom"), Some("kid"));
        let kid = engine.player("kid").unwrap();
        assert_eq!(kid.generation, 2);
        assert_eq!(kid.mother_id.as_deref(), Some("mom"));

        let events = engine.drain_events();
        assert!(events.iter().any(|o| o.audience == Audience::Player("mom".into())
            && matches!(&o.event, ServerEvent::NameBaby { baby_id, .. } if baby_id == "kid")));
        assert!(events.iter().any(|o| matches!(
            &o.event,
            ServerEvent::WorldUpdate { x: 4, y: 4, object_type: Some(t), .. } if *t == rock
        )));
    }

    #[test]
    fn displaced_item_finds_a_free_neighbour() {
        let mut engine = engine();
        let rock = id(&engine, "ROCK");
        let tree = id(&engine, "TREE");
        let tile = TileCoord::new(4, 4);
        engine.map_mut().set_object(tile, tree, None);
        adult(&mut engine, "mom", Gender::Female, 20, tile);
        hold(&mut engine, "mom", rock, None);

        assert!(engine.request_birth("kid", None));
        assert_eq!(engine.map().object_at(tile), Some(tree));
        let placed = engine
            .map()
            .objects()
            .filter(|&(_, t)| t == rock)
            .map(|(t, _)| t)
            .collect::<Vec<_>>();
        assert_eq!(placed.len(), 1);
        assert!((placed[0].x - 4).abs() <= 1 && (placed[0].y - 4).abs() <= 1);
    }

    #[test]
    fn naming_requires_holding_the_baby() {
        let mut engine = engine();
        adult(&mut engine, "mom", Gender::Female, 20, TileCoord::new(4, 4));
        adult(&mut engine, "stranger", Gender::Female, 20, TileCoord::new(8, 8));
        // Either woman may be chosen as the mother.
        assert!(engine.request_birth("kid", None));
        let mother = engine.player("kid").unwrap().mother_id.unwrap();
        let other = if mother == "mom" { "stranger" } else { "mom" };
        engine.drain_events();

        assert!(!engine.name_baby(other, "kid", "Ada"));
        assert!(!engine.name_baby(&mother, "kid", "4da"));
        assert!(engine.name_baby(&mother, "kid", "ada"));
        let name = engine.player("kid").unwrap().name;
        assert!(name.starts_with("Ada of "));

        let events = engine.drain_events();
        let errors = events.iter().filter(|o| o.event.kind() == "nameError").count();
        assert_eq!(errors, 2);
        assert_eq!(
            texts_for(&events, "kid"),
            vec![format!("Your mother named you {name}")]
        );
    }

    #[test]
    fn water_blocks_walking_but_not_boats() {
        let mut engine = engine_on(lineage_world::Biome::Water);
        adult(&mut engine, "a", Gender::Female, 20, TileCoord::new(5, 5));
        assert!(!engine.move_player("a", 10.0, 0.0));
        assert!(engine.toggle_boat("a", true));
        assert!(engine.move_player("a", 10.0, 0.0));
        assert!(!engine.move_player("a", f32::NAN, 0.0));
    }

    #[test]
    fn moving_off_the_map_is_refused() {
        let mut engine = engine();
        adult(&mut engine, "a", Gender::Female, 20, TileCoord::new(0, 0));
        assert!(!engine.move_player("a", -64.0, 0.0));
        assert!(engine.move_player("a", 10.0, 0.0));
    }

    #[test]
    fn eating_held_food_clears_hands() {
        let mut engine = engine();
        adult(&mut engine, "a", Gender::Female, 20, TileCoord::new(4, 4));
        set_hunger(&mut engine, "a", 5);
        let held = id(&engine, "BERRIES");
        hold(&mut engine, "a", held, None);
        assert!(engine.eat("a"));
        let a = engine.player("a").unwrap();
        assert_eq!(a.hunger, 10);
        assert_eq!(a.holding, None);
        assert!(!engine.eat("a"));
    }

    #[test]
    fn eating_from_a_held_basket() {
        let mut engine = engine();
        let basket = id(&engine, "BASKET");
        let rock = id(&engine, "ROCK");
        let carrot = id(&engine, "CARROT");
        adult(&mut engine, "a", Gender::Female, 20, TileCoord::new(4, 4));
        set_hunger(&mut engine, "a", 5);
        hold(&mut engine, "a", basket, Some(json!({"inventory": [rock, carrot]})));
        assert!(engine.eat("a"));
        let a = engine.player("a").unwrap();
        assert_eq!(a.hunger, 11);
        assert_eq!(a.holding, Some(basket));
        assert_eq!(a.holding_data, Some(json!({"inventory": [rock]})));
    }

    #[test]
    fn held_baby_drinks_milk() {
        let mut engine = engine();
        adult(&mut engine, "mom", Gender::Female, 20, TileCoord::new(4, 4));
        assert!(engine.request_birth("kid", None));
        set_hunger(&mut engine, "kid", 1);
        assert!(engine.eat("kid"));
        assert_eq!(engine.player("kid").unwrap().hunger, 1 + MILK_FOOD_VALUE);
    }

    #[test]
    fn pick_up_and_drop_round_trip_through_the_map() {
        let mut engine = engine();
        let rock = id(&engine, "ROCK");
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        engine.map_mut().set_object(tile, rock, None);

        assert!(engine.pick_up("a"));
        assert_eq!(engine.map().object_at(tile), None);
        assert_eq!(engine.player("a").unwrap().holding, Some(rock));
        assert!(!engine.pick_up("a"));

        assert!(engine.drop("a"));
        assert_eq!(engine.map().object_at(tile), Some(rock));
        assert_eq!(engine.player("a").unwrap().holding, None);
    }

    #[test]
    fn large_and_harvestable_objects_stay_put() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        for key in ["TREE", "BERRY_BUSH", "FIRE"] {
            let t = id(&engine, key);
            engine.map_mut().set_object(tile, t, None);
            assert!(!engine.pick_up("a"), "{key} should not be picked up");
            assert_eq!(engine.map().object_at(tile), Some(t));
        }
    }

    #[test]
    fn basket_on_the_ground_becomes_the_backpack() {
        let mut engine = engine();
        let basket = id(&engine, "BASKET");
        let berries = id(&engine, "BERRIES");
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        engine
            .map_mut()
            .set_object(tile, basket, Some(json!({"inventory": [berries]})));

        assert!(engine.pick_up("a"));
        let a = engine.player("a").unwrap();
        assert_eq!(a.backpack, Some(basket));
        assert_eq!(a.backpack_data, Some(json!({"inventory": [berries]})));
        assert_eq!(a.holding, None);
        assert!(texts_for(&engine.drain_events(), "a").contains(&"Equipped backpack!".to_string()));

        assert!(engine.take_held_from_backpack("a"));
        assert_eq!(engine.player("a").unwrap().holding, Some(berries));
        assert!(engine.add_held_to_backpack("a"));
        assert_eq!(engine.player("a").unwrap().holding, None);

        assert!(engine.drop_backpack("a"));
        assert_eq!(engine.map().object_at(tile), Some(basket));
        assert_eq!(engine.map().object_data(tile), Some(&json!({"inventory": [berries]})));
        assert!(!engine.drop_backpack("a"));
    }

    #[test]
    fn backpack_rejects_big_items_and_overflow() {
        let mut engine = engine();
        let basket = id(&engine, "BASKET");
        let berries = id(&engine, "BERRIES");
        adult(&mut engine, "a", Gender::Female, 20, TileCoord::new(4, 4));
        engine
            .players
            .inventory_mut(&mut engine.world, "a")
            .unwrap()
            .equip_backpack(basket, Some(&json!({"inventory": [berries, berries, berries]})));
        let held = id(&engine, "FIRE");
        hold(&mut engine, "a", held, None);
        assert!(!engine.add_held_to_backpack("a"));
        hold(&mut engine, "a", berries, None);
        assert!(!engine.add_held_to_backpack("a"));
        let texts = texts_for(&engine.drain_events(), "a");
        assert_eq!(
            texts,
            vec![
                "This item is too big for the backpack!".to_string(),
                "Backpack is full!".to_string()
            ]
        );
    }

    #[test]
    fn adult_picks_up_and_puts_down_a_baby() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "mom", Gender::Female, 20, tile);
        assert!(engine.request_birth("kid", None));
        assert!(engine.drop("mom"));
        assert!(!engine.players().is_being_held("kid"));

        adult(&mut engine, "aunt", Gender::Male, 30, tile);
        engine.drain_events();
        assert!(engine.pick_up("aunt"));
        assert!(engine.players().is_being_held("kid"));
        assert_eq!(engine.players().holder_of("kid"), Some("aunt"));
        let events = engine.drain_events();
        assert_eq!(stat_updates(&events, "kid")[0].get("heldBy"), Some(&json!("aunt")));
        assert_eq!(texts_for(&events, "kid").len(), 1);
    }

    #[test]
    fn chat_is_trimmed_and_clipped() {
        let mut engine = engine();
        adult(&mut engine, "a", Gender::Female, 20, TileCoord::new(4, 4));
        engine.drain_events();
        assert!(!engine.chat("a", "    "));
        assert!(!engine.chat("ghost", "hi"));
        let long = format!("  {}", "x".repeat(80));
        assert!(engine.chat("a", &long));
        let events = engine.drain_events();
        match &events[0].event {
            ServerEvent::ChatMsg { text, .. } => assert_eq!(text.len(), 48),
            other => panic!("unexpected {other:?}"),
        }
    }
}
