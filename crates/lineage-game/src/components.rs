//! ECS components for players, animals, projectiles, and tile timers.

use bevy_ecs::prelude::*;
use lineage_world::{TileCoord, TILE_SIZE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Age below which a player counts as a baby.
pub const BABY_MAX_AGE: u32 = 3;
/// Movement multiplier while a baby crawls.
pub const CRAWL_FACTOR: f32 = 0.5;
pub const FERTILE_MIN_AGE: u32 = 16;
pub const FERTILE_MAX_AGE: u32 = 60;
pub const DEFAULT_INVENTORY_CAPACITY: usize = 3;

// ─── Shared ─────────────────────────────────────────────────────────────────

/// Pixel position in the world.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn at_tile(tile: TileCoord) -> Self {
        let (x, y) = tile.center();
        Self { x, y }
    }

    pub fn tile(&self) -> TileCoord {
        TileCoord::from_pixels(self.x, self.y)
    }

    /// Distance in tiles.
    pub fn tile_distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt() / TILE_SIZE
    }
}

/// Pixels per fast tick.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct Health {
    pub hp: f32,
    pub max: f32,
}

// ─── Player ─────────────────────────────────────────────────────────────────

/// Connection id owning this character.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct PlayerId(pub String);

#[derive(Component, Debug, Clone)]
pub struct Hunger {
    pub current: u32,
    pub max: u32,
    /// Adult stomach size; `max` is derived from it while young.
    pub base_max: u32,
}

impl Hunger {
    pub fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            base_max: max,
        }
    }

    pub fn eat(&mut self, amount: u32) {
        self.current = (self.current + amount).min(self.max);
    }

    pub fn decrease(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    pub fn is_starving(&self) -> bool {
        self.current == 0
    }

    /// Babies have smaller stomachs: half size at birth, full at `young_age`.
    pub fn update_max_for_age(&mut self, age: u32, young_age: u32) {
        self.max = if age < young_age {
            let scale = 0.5 + (age as f32 / young_age as f32) * 0.5;
            ((self.base_max as f32 * scale).floor() as u32).max(1)
        } else {
            self.base_max
        };
        self.current = self.current.min(self.max);
    }
}

#[derive(Component, Debug, Clone)]
pub struct Age {
    pub age: u32,
    pub max: u32,
}

impl Age {
    pub fn increment(&mut self) {
        self.age += 1;
    }

    pub fn is_dead(&self) -> bool {
        self.age >= self.max
    }

    pub fn is_baby(&self) -> bool {
        self.age < BABY_MAX_AGE
    }

    pub fn can_reproduce(&self) -> bool {
        (FERTILE_MIN_AGE..FERTILE_MAX_AGE).contains(&self.age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Component, Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub mother_id: Option<String>,
    pub mother_name: String,
    pub gender: Gender,
    pub generation: u32,
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Experience(pub u32);

/// Marker: the player travels by boat and may cross water.
#[derive(Component, Debug)]
pub struct InBoat;

/// What a player carries: one thing in hand, a small item list, and an
/// optional worn container.
#[derive(Component, Debug, Clone)]
pub struct Inventory {
    pub holding: Option<u32>,
    pub holding_data: Option<Value>,
    pub items: Vec<u32>,
    pub capacity: usize,
    pub backpack: Option<u32>,
    /// Contents of the worn container.
    pub backpack_items: Vec<u32>,
}

impl Inventory {
    pub fn new(capacity: usize) -> Self {
        Self {
            holding: None,
            holding_data: None,
            items: Vec::new(),
            capacity,
            backpack: None,
            backpack_items: Vec::new(),
        }
    }

    /// Fails if the hands are full.
    pub fn pick_up(&mut self, item: u32, data: Option<Value>) -> bool {
        if self.holding.is_some() {
            return false;
        }
        self.holding = Some(item);
        self.holding_data = data;
        true
    }

    pub fn drop_held(&mut self) -> Option<(u32, Option<Value>)> {
        let item = self.holding.take()?;
        Some((item, self.holding_data.take()))
    }

    pub fn set_holding(&mut self, item: Option<u32>, data: Option<Value>) {
        self.holding = item;
        self.holding_data = if item.is_some() { data } else { None };
    }

    pub fn add_item(&mut self, item: u32) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn has_item(&self, item: u32) -> bool {
        self.items.contains(&item)
    }

    pub fn consume_item(&mut self, item: u32) -> bool {
        remove_first(&mut self.items, item)
    }

    pub fn equip_backpack(&mut self, container: u32, data: Option<&Value>) -> bool {
        if self.backpack.is_some() {
            return false;
        }
        self.backpack = Some(container);
        self.backpack_items = container_items(data);
        true
    }

    /// Returns the container and its contents as world-object data.
    pub fn unequip_backpack(&mut self) -> Option<(u32, Value)> {
        let container = self.backpack.take()?;
        let items = std::mem::take(&mut self.backpack_items);
        Some((container, json!({ "inventory": items })))
    }

    /// `{inventory: [...]}` while a backpack is worn.
    pub fn backpack_data(&self) -> Option<Value> {
        self.backpack
            .map(|_| json!({ "inventory": self.backpack_items }))
    }

    pub fn backpack_has_item(&self, item: u32) -> bool {
        self.backpack.is_some() && self.backpack_items.contains(&item)
    }

    pub fn consume_from_backpack(&mut self, item: u32) -> bool {
        self.backpack.is_some() && remove_first(&mut self.backpack_items, item)
    }

    pub fn add_to_backpack(&mut self, item: u32, capacity: usize) -> bool {
        if self.backpack.is_none() || self.backpack_items.len() >= capacity {
            return false;
        }
        self.backpack_items.push(item);
        true
    }

    /// Removes the most recently added item.
    pub fn take_from_backpack(&mut self) -> Option<u32> {
        self.backpack?;
        self.backpack_items.pop()
    }
}

fn remove_first(items: &mut Vec<u32>, item: u32) -> bool {
    match items.iter().position(|&i| i == item) {
        Some(index) => {
            items.remove(index);
            true
        }
        None => false,
    }
}

/// Item ids stored in container object data (`{"inventory": [..]}`).
pub fn container_items(data: Option<&Value>) -> Vec<u32> {
    data.and_then(|d| d.get("inventory"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|v| u32::try_from(v).ok())
                .collect()
        })
        .unwrap_or_default()
}

// ─── Tile timers ────────────────────────────────────────────────────────────

/// A rotting object on a tile.
#[derive(Component, Debug, Clone)]
pub struct Decay {
    pub ticks: u32,
    pub max: u32,
    pub tile: TileCoord,
    pub object_type: u32,
}

/// A planted crop on a tile.
#[derive(Component, Debug, Clone)]
pub struct Growth {
    pub ticks: u32,
    pub max: u32,
    pub grows_into: String,
    pub tile: TileCoord,
    pub object_type: u32,
}

// ─── Projectile ─────────────────────────────────────────────────────────────

#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub owner_id: String,
    pub object_type: u32,
    pub max_dist: f32,
    /// Radians.
    pub angle: f32,
    pub damage: f32,
    pub distance: f32,
    /// Shots never collide with the tile they were fired from.
    pub origin_tile: TileCoord,
}

// ─── Animal ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimalState {
    Idle,
    Wander,
    Chase(Entity),
    Flee,
}

/// A live animal. Its pixel position lives in [`Position`]; `tile` is the
/// grid cell its world object occupies.
#[derive(Component, Debug, Clone)]
pub struct Animal {
    pub type_id: u32,
    pub name: String,
    pub tile: TileCoord,
    pub target: Option<TileCoord>,
    pub state: AnimalState,
    pub hp: f32,
    pub age: u32,
    pub speed: f32,
    pub aggression: f32,
    pub is_carnivore: bool,
    /// Seconds until the next attack is allowed.
    pub attack_cooldown: f32,
}

impl Animal {
    pub fn is_moving(&self) -> bool {
        self.target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hunger_clamps_both_ways() {
        let mut h = Hunger::new(20);
        h.eat(5);
        assert_eq!(h.current, 20);
        h.decrease(25);
        assert_eq!(h.current, 0);
        assert!(h.is_starving());
    }

    #[test]
    fn baby_stomach_grows_with_age() {
        let mut h = Hunger::new(20);
        h.update_max_for_age(0, BABY_MAX_AGE);
        assert_eq!(h.max, 10);
        assert_eq!(h.current, 10);
        h.update_max_for_age(2, BABY_MAX_AGE);
        assert_eq!(h.max, 16);
        h.update_max_for_age(3, BABY_MAX_AGE);
        assert_eq!(h.max, 20);
        assert_eq!(h.current, 10);
    }

    #[test]
    fn fertility_window() {
        let mut age = Age { age: 15, max: 60 };
        assert!(!age.can_reproduce());
        age.increment();
        assert!(age.can_reproduce());
        age.age = 60;
        assert!(!age.can_reproduce());
        assert!(age.is_dead());
    }

    #[test]
    fn hands_hold_one_thing() {
        let mut inv = Inventory::new(3);
        assert!(inv.pick_up(2, None));
        assert!(!inv.pick_up(3, None));
        assert_eq!(inv.drop_held(), Some((2, None)));
        assert_eq!(inv.drop_held(), None);
    }

    #[test]
    fn item_list_respects_capacity() {
        let mut inv = Inventory::new(2);
        assert!(inv.add_item(1));
        assert!(inv.add_item(1));
        assert!(!inv.add_item(3));
        assert!(inv.consume_item(1));
        assert!(inv.has_item(1));
        assert!(!inv.consume_item(3));
    }

    #[test]
    fn backpack_lifecycle() {
        let mut inv = Inventory::new(3);
        assert!(!inv.add_to_backpack(7, 3));
        assert!(inv.equip_backpack(106, Some(&json!({"inventory": [103, 103]}))));
        assert!(!inv.equip_backpack(106, None));
        assert!(inv.backpack_has_item(103));
        assert!(inv.add_to_backpack(107, 3));
        assert!(!inv.add_to_backpack(108, 3));
        assert_eq!(inv.take_from_backpack(), Some(107));
        assert!(inv.consume_from_backpack(103));
        assert_eq!(inv.backpack_data(), Some(json!({"inventory": [103]})));

        let (container, data) = inv.unequip_backpack().unwrap();
        assert_eq!(container, 106);
        assert_eq!(container_items(Some(&data)), vec![103]);
        assert!(inv.backpack_data().is_none());
        assert_eq!(inv.take_from_backpack(), None);
    }

    #[test]
    fn position_tile_distance() {
        let a = Position::at_tile(TileCoord::new(0, 0));
        let b = Position::at_tile(TileCoord::new(3, 4));
        assert!((a.tile_distance(&b) - 5.0).abs() < 0.01);
        assert_eq!(b.tile(), TileCoord::new(3, 4));
    }
}
