//! `use`: applying what the player holds to the tile they stand on.
//!
//! Checked in order: boat, container unloading and transfer, burial, then
//! the recipe table.

use lineage_world::{Biome, TileCoord};
use serde_json::{json, Value};
use tracing::debug;

use crate::components::container_items;
use crate::events::ServerEvent;
use crate::registry::DEFAULT_CAPACITY;

use super::{GameEngine, KEY_BOAT, KEY_BONES, KEY_GRAVE, KEY_GRAVE_STONE, KEY_HOLE, KEY_ROCK, KEY_SHOVEL};

/// How far a boat can be beached from.
const BOAT_EXIT_RADIUS: i32 = 3;
const USES_REMAINING: &str = "usesRemaining";
const UNKNOWN_SOUL: &str = "Unknown Soul";
const UNKNOWN_CAUSE: &str = "Unknown";

impl GameEngine {
    pub fn use_held(&mut self, id: &str) -> bool {
        let Some(view) = self.player(id) else {
            return false;
        };
        let tile = view.tile();
        let tool = view.holding;
        let tool_data = view.holding_data.clone();
        let target = self.map.object_at(tile);
        if tool.is_none() && target.is_none() {
            return false;
        }

        if tool.is_some() && tool == self.registry.id_of(KEY_BOAT) {
            if let Some(handled) = self.use_boat(id, tile, view.in_boat) {
                return handled;
            }
        }

        if let Some(tool) = tool {
            if self.use_container(id, tile, tool, tool_data.clone(), target) {
                return true;
            }
            if self.bury(id, tile, tool, tool_data.as_ref(), target) {
                return true;
            }
        } else if let Some(target) = target {
            if self.use_container_on_ground(id, tile, target) {
                return true;
            }
        }

        match target {
            Some(target) => self.apply_recipe(id, tile, tool, tool_data, target),
            None => false,
        }
    }

    // ─── Boat ───────────────────────────────────────────────────────────────

    /// `None` when the boat has nothing to do here and other uses may apply.
    fn use_boat(&mut self, id: &str, tile: TileCoord, in_boat: bool) -> Option<bool> {
        let on_water = self.map.biome_at(tile) == Biome::Water;
        match (in_boat, on_water) {
            (false, false) => {
                self.toggle_boat(id, true);
                self.send(id, ServerEvent::text("You got in the boat. You can now travel on water!"));
                Some(true)
            }
            (true, true) => {
                let Some(land) = self.nearest_land(tile) else {
                    self.send(id, ServerEvent::text("You need to be near land to exit the boat!"));
                    return Some(false);
                };
                let (x, y) = land.center();
                self.move_player_to(id, x, y);
                self.toggle_boat(id, false);
                self.send(id, ServerEvent::text("You got out of the boat."));
                Some(true)
            }
            (true, false) => {
                self.toggle_boat(id, false);
                self.send(id, ServerEvent::text("You got out of the boat."));
                Some(true)
            }
            (false, true) => None,
        }
    }

    fn nearest_land(&self, center: TileCoord) -> Option<TileCoord> {
        (1..=BOAT_EXIT_RADIUS).find_map(|r| {
            (-r..=r)
                .flat_map(|dy| (-r..=r).map(move |dx| center.offset(dx, dy)))
                .find(|&t| t.in_bounds(self.map.size()) && self.map.is_passable(t))
        })
    }

    // ─── Containers ─────────────────────────────────────────────────────────

    fn is_container(&self, type_id: u32) -> bool {
        self.registry.definition(type_id).is_some_and(|d| d.is_container())
    }

    fn container_capacity(&self, type_id: u32) -> usize {
        self.registry
            .item(type_id)
            .and_then(|i| i.capacity)
            .unwrap_or(DEFAULT_CAPACITY)
    }

    /// Whether `item` may go into a container at all.
    fn fits_in_container(&self, item: u32) -> bool {
        self.registry
            .definition(item)
            .is_some_and(|d| !d.is_large() && !d.is_container())
    }

    /// A held container either unloads onto an empty tile or swallows the
    /// object on the tile. A held item goes into a container on the ground.
    fn use_container(&mut self, id: &str, tile: TileCoord, tool: u32, tool_data: Option<Value>, target: Option<u32>) -> bool {
        let held_container = self.is_container(tool);
        match target {
            None if held_container => {
                let mut items = container_items(tool_data.as_ref());
                let Some(item) = items.pop() else {
                    return false;
                };
                if !self.map.set_object(tile, item, None) {
                    return false;
                }
                self.register_object(tile, item);
                self.players
                    .update_player_holding(&mut self.world, id, Some(tool), Some(json!({ "inventory": items })));
                self.broadcast(ServerEvent::world_update(tile, Some(item), None));
                self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
                true
            }
            Some(target) if held_container => {
                if !self.fits_in_container(target) {
                    return false;
                }
                let mut items = container_items(tool_data.as_ref());
                if items.len() >= self.container_capacity(tool) {
                    return false;
                }
                items.push(target);
                self.map.remove_object(tile);
                self.unregister_at(tile);
                self.players
                    .update_player_holding(&mut self.world, id, Some(tool), Some(json!({ "inventory": items })));
                self.broadcast(ServerEvent::world_update(tile, None, None));
                self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
                true
            }
            Some(target) if self.is_container(target) => {
                if !self.fits_in_container(tool) {
                    return false;
                }
                let mut items = container_items(self.map.object_data(tile));
                if items.len() >= self.container_capacity(target) {
                    return false;
                }
                items.push(tool);
                let data = json!({ "inventory": items });
                self.map.set_object(tile, target, Some(data.clone()));
                self.players.update_player_holding(&mut self.world, id, None, None);
                self.broadcast(ServerEvent::world_update(tile, Some(target), Some(data)));
                self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
                true
            }
            _ => false,
        }
    }

    /// Bare hands on a container on the ground take its last item.
    fn use_container_on_ground(&mut self, id: &str, tile: TileCoord, target: u32) -> bool {
        if !self.is_container(target) {
            return false;
        }
        let mut items = container_items(self.map.object_data(tile));
        let Some(item) = items.pop() else {
            return false;
        };
        let data = json!({ "inventory": items });
        self.map.set_object(tile, target, Some(data.clone()));
        self.players.update_player_holding(&mut self.world, id, Some(item), None);
        self.broadcast(ServerEvent::world_update(tile, Some(target), Some(data)));
        self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
        true
    }

    // ─── Burial ─────────────────────────────────────────────────────────────

    fn bury(&mut self, id: &str, tile: TileCoord, tool: u32, tool_data: Option<&Value>, target: Option<u32>) -> bool {
        let key = |k: &str| self.registry.id_of(k);
        let (shovel, bones, rock) = (key(KEY_SHOVEL), key(KEY_BONES), key(KEY_ROCK));
        let (hole, grave, grave_stone) = (key(KEY_HOLE), key(KEY_GRAVE), key(KEY_GRAVE_STONE));

        let (result, data, consumes_tool) = match target {
            None if Some(tool) == shovel => match hole {
                Some(hole) if self.map.is_passable(tile) => (hole, None, false),
                _ => return false,
            },
            Some(t) if Some(t) == hole && Some(tool) == bones => {
                let Some(grave) = grave else {
                    return false;
                };
                let field = |name: &str, default: Value| {
                    tool_data
                        .and_then(|d| d.get(name))
                        .filter(|v| !v.is_null() && v.as_str() != Some(""))
                        .cloned()
                        .unwrap_or(default)
                };
                let data = json!({
                    "buriedName": field("name", json!(UNKNOWN_SOUL)),
                    "buriedAge": field("age", json!(0)),
                    "diedAt": field("diedAt", json!(chrono::Utc::now().timestamp_millis())),
                    "cause": field("cause", json!(UNKNOWN_CAUSE)),
                });
                (grave, Some(data), true)
            }
            Some(t) if Some(t) == grave && Some(tool) == rock => {
                let Some(grave_stone) = grave_stone else {
                    return false;
                };
                (grave_stone, self.map.object_data(tile).cloned(), true)
            }
            _ => return false,
        };

        if !self.map.set_object(tile, result, data.clone()) {
            return false;
        }
        self.broadcast(ServerEvent::world_update(tile, Some(result), data));
        if consumes_tool {
            self.players.update_player_holding(&mut self.world, id, None, None);
            self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
        }
        debug!(player = %id, %tile, result, "burial step");
        true
    }

    // ─── Recipes ────────────────────────────────────────────────────────────

    fn apply_recipe(&mut self, id: &str, tile: TileCoord, tool: Option<u32>, tool_data: Option<Value>, target: u32) -> bool {
        let Some(recipe) = self.find_recipe(tool, target).cloned() else {
            return false;
        };
        let result = recipe.result;
        let result_is_crop = self.registry.definition(result).is_some_and(|d| d.is_crop());
        debug!(player = %id, recipe = %recipe.id, "recipe applied");

        if result_is_crop {
            self.unregister_at(tile);
            self.map.set_object(tile, result, None);
            self.register_planted_crop(tile, result);
            self.players.update_player_holding(&mut self.world, id, None, None);
            self.broadcast(ServerEvent::world_update(tile, Some(result), None));
            self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
            return true;
        }

        if let Some(becomes) = recipe.target_becomes_type {
            self.unregister_at(tile);
            self.map.set_object(tile, becomes, None);
            self.register_object(tile, becomes);
            self.players.update_player_holding(&mut self.world, id, Some(result), None);
            self.broadcast(ServerEvent::world_update(tile, Some(becomes), None));
            self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
            return true;
        }

        if recipe.target_persists {
            self.players.update_player_holding(&mut self.world, id, Some(result), None);
            self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
            return true;
        }

        self.unregister_at(tile);
        self.map.set_object(tile, result, None);
        self.register_object(tile, result);
        self.broadcast(ServerEvent::world_update(tile, Some(result), None));
        if let Some(tool) = tool {
            self.wear_tool(id, tool, tool_data);
        }
        true
    }

    /// One use of a tool: count down `usesRemaining`, break it at zero, or
    /// use up consumables.
    fn wear_tool(&mut self, id: &str, tool: u32, tool_data: Option<Value>) {
        let Some(def) = self.registry.item(tool) else {
            return;
        };
        let name = def.name.clone();
        let consumable = def.is_consumable;
        let Some(uses) = def.uses else {
            if consumable {
                self.players.update_player_holding(&mut self.world, id, None, None);
                self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
            }
            return;
        };

        let remaining = tool_data
            .as_ref()
            .and_then(|d| d.get(USES_REMAINING))
            .and_then(Value::as_u64)
            .map(|u| u as u32)
            .unwrap_or(uses)
            .saturating_sub(1);
        if remaining == 0 {
            self.players.update_player_holding(&mut self.world, id, None, None);
            self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
            self.send(id, ServerEvent::text(format!("Your {name} broke!")));
            return;
        }
        let mut data = tool_data.unwrap_or_else(|| json!({}));
        if let Some(fields) = data.as_object_mut() {
            fields.insert(USES_REMAINING.to_string(), json!(remaining));
        }
        self.players.update_player_holding(&mut self.world, id, Some(tool), Some(data));
        self.broadcast(ServerEvent::PlayerStatUpdate(self.hands_update(id)));
    }
}

#[cfg(test)]
mod tests {
    use lineage_world::{Biome, TileCoord};
    use serde_json::json;

    use super::super::testing::*;
    use crate::components::Gender;

    #[test]
    fn bare_hands_pick_berries() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let bush = id(&engine, "BERRY_BUSH");
        engine.map_mut().set_object(tile, bush, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(id(&engine, "EMPTY_BUSH")));
        assert_eq!(engine.player("a").unwrap().holding, Some(id(&engine, "BERRIES")));
    }

    #[test]
    fn planting_a_seed_consumes_it_and_starts_growth() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let grass = id(&engine, "GRASS");
        let seed = id(&engine, "CARROT_SEED");
        engine.map_mut().set_object(tile, grass, None);
        hold(&mut engine, "a", seed, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(id(&engine, "CARROT_SPROUT")));
        assert_eq!(engine.player("a").unwrap().holding, None);
        for _ in 0..180 {
            engine.update();
        }
        assert_eq!(engine.map().object_at(tile), Some(id(&engine, "CARROT_PLANT")));
    }

    #[test]
    fn target_persists_puts_result_in_hand() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let boulder = id(&engine, "BOULDER");
        let rock = id(&engine, "ROCK");
        engine.map_mut().set_object(tile, boulder, None);
        hold(&mut engine, "a", rock, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(boulder));
        assert_eq!(engine.player("a").unwrap().holding, Some(id(&engine, "SHARP_STONE")));
    }

    #[test]
    fn tools_wear_out() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let stone = id(&engine, "SHARP_STONE");
        let tree = id(&engine, "TREE");
        let kindling = id(&engine, "KINDLING");
        engine.map_mut().set_object(tile, tree, None);
        hold(&mut engine, "a", stone, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(kindling));
        let a = engine.player("a").unwrap();
        assert_eq!(a.holding, Some(stone));
        assert_eq!(a.holding_data, Some(json!({"usesRemaining": 9})));

        hold(&mut engine, "a", stone, Some(json!({"usesRemaining": 1})));
        engine.map_mut().set_object(tile, tree, None);
        engine.drain_events();
        assert!(engine.use_held("a"));
        assert_eq!(engine.player("a").unwrap().holding, None);
        assert_eq!(
            texts_for(&engine.drain_events(), "a"),
            vec!["Your Sharp Stone broke!".to_string()]
        );
    }

    #[test]
    fn consumable_tools_are_used_up() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let rock = id(&engine, "ROCK");
        let kindling = id(&engine, "KINDLING");
        engine.map_mut().set_object(tile, rock, None);
        hold(&mut engine, "a", kindling, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(id(&engine, "FIRE")));
        assert_eq!(engine.player("a").unwrap().holding, None);
    }

    #[test]
    fn no_recipe_no_effect() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let tree = id(&engine, "TREE");
        let berries = id(&engine, "BERRIES");
        engine.map_mut().set_object(tile, tree, None);
        hold(&mut engine, "a", berries, None);

        assert!(!engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(tree));
        assert_eq!(engine.player("a").unwrap().holding, Some(berries));
    }

    #[test]
    fn burial_sequence() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let (shovel, bones, rock) = (id(&engine, "SHOVEL"), id(&engine, "BONES"), id(&engine, "ROCK"));

        hold(&mut engine, "a", shovel, None);
        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(id(&engine, "HOLE")));
        assert_eq!(engine.player("a").unwrap().holding, Some(shovel));

        let remains = json!({"name": "Eve Gen 1", "age": 61, "diedAt": 1234, "cause": "Old Age"});
        hold(&mut engine, "a", bones, Some(remains));
        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(id(&engine, "GRAVE")));
        let grave_data = engine.map().object_data(tile).cloned().unwrap();
        assert_eq!(grave_data["buriedName"], "Eve Gen 1");
        assert_eq!(grave_data["cause"], "Old Age");
        assert_eq!(engine.player("a").unwrap().holding, None);

        hold(&mut engine, "a", rock, None);
        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(id(&engine, "GRAVE_STONE")));
        assert_eq!(engine.map().object_data(tile), Some(&grave_data));
    }

    #[test]
    fn nameless_bones_get_a_placeholder_grave() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        engine.map.set_object(tile, id(&engine, "HOLE"), None);

        let bones = id(&engine, "BONES");
        hold(&mut engine, "a", bones, Some(json!({"name": null})));
        assert!(engine.use_held("a"));
        let grave_data = engine.map().object_data(tile).cloned().unwrap();
        assert_eq!(grave_data["buriedName"], "Unknown Soul");
        assert_eq!(grave_data["buriedAge"], 0);
        assert_eq!(grave_data["cause"], "Unknown");
        assert!(grave_data["diedAt"].as_i64().unwrap() > 0);
    }

    #[test]
    fn basket_in_hand_collects_and_unloads() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let basket = id(&engine, "BASKET");
        let rock = id(&engine, "ROCK");
        engine.map_mut().set_object(tile, rock, None);
        hold(&mut engine, "a", basket, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), None);
        assert_eq!(engine.player("a").unwrap().holding_data, Some(json!({"inventory": [rock]})));

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_at(tile), Some(rock));
        assert_eq!(engine.player("a").unwrap().holding_data, Some(json!({"inventory": []})));
    }

    #[test]
    fn item_goes_into_basket_on_the_ground() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let basket = id(&engine, "BASKET");
        let berries = id(&engine, "BERRIES");
        engine.map_mut().set_object(tile, basket, None);
        hold(&mut engine, "a", berries, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.map().object_data(tile), Some(&json!({"inventory": [berries]})));
        assert_eq!(engine.player("a").unwrap().holding, None);

        assert!(engine.use_held("a"));
        assert_eq!(engine.player("a").unwrap().holding, Some(berries));
        assert_eq!(engine.map().object_data(tile), Some(&json!({"inventory": []})));
    }

    #[test]
    fn boat_on_land_toggles() {
        let mut engine = engine();
        let tile = TileCoord::new(4, 4);
        adult(&mut engine, "a", Gender::Female, 20, tile);
        let boat = id(&engine, "BOAT");
        hold(&mut engine, "a", boat, None);

        assert!(engine.use_held("a"));
        assert!(engine.player("a").unwrap().in_boat);
        assert!(engine.use_held("a"));
        assert!(!engine.player("a").unwrap().in_boat);
    }

    #[test]
    fn boat_far_from_land_stays_afloat() {
        let mut engine = engine_on(Biome::Water);
        adult(&mut engine, "a", Gender::Female, 20, TileCoord::new(10, 10));
        let boat = id(&engine, "BOAT");
        hold(&mut engine, "a", boat, None);
        engine.toggle_boat("a", true);
        engine.drain_events();

        assert!(!engine.use_held("a"));
        assert!(engine.player("a").unwrap().in_boat);
        assert_eq!(
            texts_for(&engine.drain_events(), "a"),
            vec!["You need to be near land to exit the boat!".to_string()]
        );
    }
}
