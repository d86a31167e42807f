//! Animal AI: chase, flee, and wander decisions on the slow cadence; smooth
//! movement between tile centers and attacks on the fast cadence.
//!
//! Each animal occupies exactly one tile object. A move picks an adjacent
//! tile as its target and walks toward its center; when the animal crosses
//! into the target tile an [`SimEvent::AnimalMoved`] is raised so the engine
//! can move the world object along.

use std::collections::HashSet;

use bevy_ecs::prelude::*;
use lineage_world::{TileCoord, WorldMap};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::components::{Animal, AnimalState, PlayerId, Position};
use crate::ecs::{compact, push_event, Deleted, SimEvent, System, TickContext};
use crate::events::AnimalView;
use crate::registry::AnimalDef;

/// Slow ticks between two AI decisions.
pub const DECISION_INTERVAL: u64 = 2;
pub const CARNIVORE_DETECT_TILES: f32 = 5.0;
pub const HERBIVORE_FLEE_TILES: f32 = 3.0;
pub const ATTACK_RANGE_TILES: f32 = 1.5;
pub const ATTACK_COOLDOWN_SECS: f32 = 2.0;
/// Damage at aggression 1.0.
pub const ATTACK_DAMAGE_SCALE: f32 = 5.0;
/// Pixels per fast tick for each point of definition speed.
pub const PIXELS_PER_SPEED: f32 = 8.0;
const WANDER_CHANCE: f64 = 0.5;

const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Step toward a goal without overshooting. Returns the new position.
pub fn move_toward(from: Position, goal: Position, step: f32) -> Position {
    let dx = goal.x - from.x;
    let dy = goal.y - from.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist <= step || dist < 0.001 {
        return goal;
    }
    Position::new(from.x + dx / dist * step, from.y + dy / dist * step)
}

pub fn attack_damage(aggression: f32) -> u32 {
    ((ATTACK_DAMAGE_SCALE * aggression).round() as u32).max(1)
}

fn walkable(map: &WorldMap, tile: TileCoord) -> bool {
    tile.in_bounds(map.size()) && map.is_passable(tile) && map.is_empty(tile)
}

struct PlayerSnapshot {
    entity: Entity,
    position: Position,
}

struct AnimalSnapshot {
    entity: Entity,
    tile: TileCoord,
    position: Position,
    is_carnivore: bool,
    moving: bool,
}

fn nearest_player(players: &[PlayerSnapshot], at: &Position) -> Option<(Entity, Position, f32)> {
    players
        .iter()
        .map(|p| (p.entity, p.position, at.tile_distance(&p.position)))
        .min_by(|a, b| a.2.total_cmp(&b.2))
}

fn snapshot_players(world: &mut World) -> Vec<PlayerSnapshot> {
    world
        .query_filtered::<(Entity, &Position), (With<PlayerId>, Without<Deleted>)>()
        .iter(world)
        .map(|(entity, position)| PlayerSnapshot {
            entity,
            position: *position,
        })
        .collect()
}

#[derive(Debug)]
pub struct AnimalAiSystem {
    rng: StdRng,
    ticks: u64,
}

impl AnimalAiSystem {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ticks: 0,
        }
    }

    /// Start simulating the animal whose object sits on `tile`.
    pub fn register(&self, world: &mut World, tile: TileCoord, def: &AnimalDef, data: Option<&Value>) -> Entity {
        let hp = data
            .and_then(|d| d.get("hp"))
            .and_then(Value::as_f64)
            .map(|hp| hp as f32)
            .unwrap_or(def.hp);
        world
            .spawn((
                Animal {
                    type_id: def.id,
                    name: def.name.clone(),
                    tile,
                    target: None,
                    state: AnimalState::Idle,
                    hp,
                    age: 0,
                    speed: def.speed,
                    aggression: def.aggression,
                    is_carnivore: def.is_carnivore,
                    attack_cooldown: 0.0,
                },
                Position::at_tile(tile),
            ))
            .id()
    }

    /// Stop simulating whatever animal occupies `tile`.
    pub fn unregister_at(&self, world: &mut World, tile: TileCoord) -> bool {
        let found: Vec<Entity> = world
            .query_filtered::<(Entity, &Animal), Without<Deleted>>()
            .iter(world)
            .filter(|(_, a)| a.tile == tile)
            .map(|(e, _)| e)
            .collect();
        for &entity in &found {
            world.entity_mut(entity).insert(Deleted);
        }
        !found.is_empty()
    }

    /// Return the animal of `type_id` that stepped into `entered` to `home`
    /// and let it decide again.
    pub fn send_back(&self, world: &mut World, entered: TileCoord, home: TileCoord, type_id: u32) -> bool {
        let mut query = world.query_filtered::<(&mut Animal, &mut Position), Without<Deleted>>();
        for (mut animal, mut pos) in query.iter_mut(world) {
            if animal.tile == entered && animal.type_id == type_id {
                animal.tile = home;
                animal.target = None;
                animal.state = AnimalState::Idle;
                *pos = Position::at_tile(home);
                return true;
            }
        }
        false
    }

    pub fn count(&self, world: &mut World) -> usize {
        world
            .query_filtered::<(), (With<Animal>, Without<Deleted>)>()
            .iter(world)
            .count()
    }

    /// Animals currently walking between tiles.
    pub fn animals_for_sync(&self, world: &mut World) -> Vec<AnimalView> {
        world
            .query_filtered::<(&Animal, &Position), Without<Deleted>>()
            .iter(world)
            .filter(|(a, _)| a.is_moving())
            .map(|(a, pos)| AnimalView {
                type_id: a.type_id,
                x: pos.x,
                y: pos.y,
                tile_x: a.tile.x,
                tile_y: a.tile.y,
            })
            .collect()
    }

    fn pick_step(
        &mut self,
        map: &WorldMap,
        claimed: &HashSet<TileCoord>,
        from: TileCoord,
        score: impl Fn(TileCoord) -> f32,
    ) -> Option<TileCoord> {
        NEIGHBORS
            .iter()
            .map(|&(dx, dy)| from.offset(dx, dy))
            .filter(|t| walkable(map, *t) && !claimed.contains(t))
            .map(|t| (t, score(t)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, _)| t)
    }

    fn decide(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        let players = snapshot_players(world);
        let animals: Vec<AnimalSnapshot> = world
            .query_filtered::<(Entity, &Animal, &Position), Without<Deleted>>()
            .iter(world)
            .map(|(entity, a, pos)| AnimalSnapshot {
                entity,
                tile: a.tile,
                position: *pos,
                is_carnivore: a.is_carnivore,
                moving: a.is_moving(),
            })
            .collect();

        let mut claimed: HashSet<TileCoord> = HashSet::new();
        let mut decisions = Vec::new();
        for animal in animals.iter().filter(|a| !a.moving) {
            let nearest = nearest_player(&players, &animal.position);
            let (state, target) = match nearest {
                Some((player, player_pos, dist))
                    if animal.is_carnivore
                        && ctx.config.carnivore_aggression
                        && dist <= CARNIVORE_DETECT_TILES =>
                {
                    let target = if dist > 1.0 {
                        let goal = player_pos.tile();
                        self.pick_step(ctx.map, &claimed, animal.tile, |t| {
                            let dx = (t.x - goal.x) as f32;
                            let dy = (t.y - goal.y) as f32;
                            dx * dx + dy * dy
                        })
                    } else {
                        None
                    };
                    (AnimalState::Chase(player), target)
                }
                Some((_, player_pos, dist)) if !animal.is_carnivore && dist <= HERBIVORE_FLEE_TILES => {
                    let threat = player_pos.tile();
                    let target = self.pick_step(ctx.map, &claimed, animal.tile, |t| {
                        let dx = (t.x - threat.x) as f32;
                        let dy = (t.y - threat.y) as f32;
                        -(dx * dx + dy * dy)
                    });
                    (AnimalState::Flee, target)
                }
                _ => {
                    if self.rng.gen_bool(WANDER_CHANCE) {
                        let mut options: Vec<TileCoord> = NEIGHBORS
                            .iter()
                            .map(|&(dx, dy)| animal.tile.offset(dx, dy))
                            .filter(|t| walkable(ctx.map, *t) && !claimed.contains(t))
                            .collect();
                        options.shuffle(&mut self.rng);
                        (AnimalState::Wander, options.first().copied())
                    } else {
                        (AnimalState::Idle, None)
                    }
                }
            };
            if let Some(t) = target {
                claimed.insert(t);
            }
            decisions.push((animal.entity, state, target));
        }

        for (entity, state, target) in decisions {
            if let Some(mut animal) = world.get_mut::<Animal>(entity) {
                animal.state = state;
                animal.target = target;
            }
        }
    }

    /// Fast cadence: walk toward targets and attack players in range.
    pub fn update_movement(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        let players = snapshot_players(world);
        let mut entered: HashSet<TileCoord> = HashSet::new();
        let mut events = Vec::new();

        let mut query = world.query_filtered::<(&mut Animal, &mut Position), Without<Deleted>>();
        for (mut animal, mut pos) in query.iter_mut(world) {
            if ctx.config.animal_movement {
                if let Some(target) = animal.target {
                    let goal = Position::at_tile(target);
                    let next = move_toward(*pos, goal, animal.speed * PIXELS_PER_SPEED);
                    let next_tile = next.tile();
                    if next_tile == animal.tile {
                        *pos = next;
                    } else if next_tile == target && walkable(ctx.map, target) && !entered.contains(&target) {
                        entered.insert(target);
                        events.push(SimEvent::AnimalMoved {
                            from: animal.tile,
                            to: target,
                            type_id: animal.type_id,
                        });
                        animal.tile = target;
                        *pos = next;
                    } else {
                        // Target got blocked mid-step.
                        *pos = Position::at_tile(animal.tile);
                        animal.target = None;
                        animal.state = AnimalState::Idle;
                    }
                    if *pos == goal {
                        animal.target = None;
                    }
                }
            }

            animal.attack_cooldown = (animal.attack_cooldown - ctx.delta).max(0.0);
            if !animal.is_carnivore || !ctx.config.carnivore_aggression || animal.attack_cooldown > 0.0 {
                continue;
            }
            let in_range = nearest_player(&players, &pos).filter(|(_, _, d)| *d <= ATTACK_RANGE_TILES);
            if let Some((target, _, _)) = in_range {
                events.push(SimEvent::AnimalAttacked {
                    type_id: animal.type_id,
                    target,
                    damage: attack_damage(animal.aggression),
                });
                animal.attack_cooldown = ATTACK_COOLDOWN_SECS;
            }
        }

        for event in events {
            push_event(world, event);
        }
    }
}

impl System for AnimalAiSystem {
    fn name(&self) -> &'static str {
        "animal_ai"
    }

    fn update(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        self.ticks += 1;
        if self.ticks < DECISION_INTERVAL {
            return;
        }
        self.ticks = 0;
        if !ctx.config.animal_movement {
            return;
        }
        self.decide(world, ctx);
    }

    fn delete_stale_components(&mut self, world: &mut World) -> usize {
        compact::<Animal>(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::ecs::{drain_sim_events, new_world};
    use crate::systems::testing::{ctx, grass_map};
    use lineage_world::Biome;

    fn def(id: u32, carnivore: bool) -> AnimalDef {
        AnimalDef {
            id,
            name: if carnivore { "Wolf".into() } else { "Rabbit".into() },
            asset: None,
            hp: 10.0,
            speed: 1.0,
            aggression: if carnivore { 1.0 } else { 0.0 },
            is_carnivore: carnivore,
            spawn_rate: 0.0,
            dead_type: None,
            biomes: vec![],
        }
    }

    fn spawn_player(world: &mut World, tile: TileCoord) -> Entity {
        world
            .spawn((PlayerId("p".into()), Position::at_tile(tile)))
            .id()
    }

    fn place(map: &mut WorldMap, world: &mut World, system: &AnimalAiSystem, tile: TileCoord, d: &AnimalDef) -> Entity {
        map.set_object(tile, d.id, None);
        system.register(world, tile, d, None)
    }

    #[test]
    fn move_toward_does_not_overshoot() {
        let p = move_toward(Position::new(0.0, 0.0), Position::new(10.0, 0.0), 8.0);
        assert!((p.x - 8.0).abs() < 0.01);
        let p = move_toward(p, Position::new(10.0, 0.0), 8.0);
        assert_eq!(p, Position::new(10.0, 0.0));
    }

    #[test]
    fn damage_scales_with_aggression() {
        assert_eq!(attack_damage(1.0), 5);
        assert_eq!(attack_damage(0.6), 3);
        assert_eq!(attack_damage(0.0), 1);
    }

    #[test]
    fn herbivore_flees_away_from_player() {
        let mut world = new_world();
        let mut map = grass_map(20);
        let config = GameConfig::default();
        let mut system = AnimalAiSystem::new(1);
        let rabbit = place(&mut map, &mut world, &system, TileCoord::new(10, 10), &def(50, false));
        spawn_player(&mut world, TileCoord::new(8, 10));

        system.update(&mut world, &ctx(&map, &config, 1.0));
        system.update(&mut world, &ctx(&map, &config, 1.0));
        let a = world.get::<Animal>(rabbit).unwrap();
        assert_eq!(a.state, AnimalState::Flee);
        assert_eq!(a.target, Some(TileCoord::new(11, 10)));
    }

    #[test]
    fn carnivore_chases_player() {
        let mut world = new_world();
        let mut map = grass_map(20);
        let config = GameConfig::default();
        let mut system = AnimalAiSystem::new(1);
        let wolf = place(&mut map, &mut world, &system, TileCoord::new(10, 10), &def(52, true));
        let player = spawn_player(&mut world, TileCoord::new(10, 6));

        system.update(&mut world, &ctx(&map, &config, 1.0));
        system.update(&mut world, &ctx(&map, &config, 1.0));
        let a = world.get::<Animal>(wolf).unwrap();
        assert_eq!(a.state, AnimalState::Chase(player));
        assert_eq!(a.target, Some(TileCoord::new(10, 9)));
    }

    #[test]
    fn crossing_a_tile_boundary_reports_the_move() {
        let mut world = new_world();
        let mut map = grass_map(20);
        let config = GameConfig::default();
        let mut system = AnimalAiSystem::new(1);
        let wolf = place(&mut map, &mut world, &system, TileCoord::new(10, 10), &def(52, true));
        spawn_player(&mut world, TileCoord::new(10, 6));
        system.update(&mut world, &ctx(&map, &config, 1.0));
        system.update(&mut world, &ctx(&map, &config, 1.0));
        drain_sim_events(&mut world);

        let mut moves = Vec::new();
        for _ in 0..10 {
            system.update_movement(&mut world, &ctx(&map, &config, 0.05));
            for ev in drain_sim_events(&mut world) {
                if let SimEvent::AnimalMoved { from, to, type_id } = ev {
                    moves.push((from, to, type_id));
                }
            }
        }
        assert_eq!(moves, vec![(TileCoord::new(10, 10), TileCoord::new(10, 9), 52)]);
        let a = world.get::<Animal>(wolf).unwrap();
        assert_eq!(a.tile, TileCoord::new(10, 9));
        assert!(!a.is_moving());
        assert_eq!(*world.get::<Position>(wolf).unwrap(), Position::at_tile(TileCoord::new(10, 9)));
    }

    #[test]
    fn blocked_target_snaps_back() {
        let mut world = new_world();
        let mut map = grass_map(20);
        let config = GameConfig::default();
        let mut system = AnimalAiSystem::new(1);
        let rabbit = place(&mut map, &mut world, &system, TileCoord::new(5, 5), &def(50, false));
        world.get_mut::<Animal>(rabbit).unwrap().target = Some(TileCoord::new(6, 5));
        map.set_object(TileCoord::new(6, 5), 1, None);

        for _ in 0..6 {
            system.update_movement(&mut world, &ctx(&map, &config, 0.05));
        }
        assert!(drain_sim_events(&mut world).is_empty());
        let a = world.get::<Animal>(rabbit).unwrap();
        assert_eq!(a.tile, TileCoord::new(5, 5));
        assert!(!a.is_moving());
    }

    #[test]
    fn never_targets_water() {
        let mut world = new_world();
        let mut map = WorldMap::filled(5, Biome::Water);
        let config = GameConfig::default();
        let mut system = AnimalAiSystem::new(9);
        let rabbit = place(&mut map, &mut world, &system, TileCoord::new(2, 2), &def(50, false));
        for _ in 0..20 {
            system.update(&mut world, &ctx(&map, &config, 1.0));
            assert!(world.get::<Animal>(rabbit).unwrap().target.is_none());
        }
    }

    #[test]
    fn attack_respects_cooldown_and_toggle() {
        let mut world = new_world();
        let mut map = grass_map(20);
        let mut config = GameConfig::default();
        let mut system = AnimalAiSystem::new(1);
        place(&mut map, &mut world, &system, TileCoord::new(3, 3), &def(52, true));
        let player = spawn_player(&mut world, TileCoord::new(4, 3));

        let mut attacks = 0;
        // 3 seconds of fast ticks: an attack at t=0 and one after the 2 s cooldown.
        for _ in 0..60 {
            system.update_movement(&mut world, &ctx(&map, &config, 0.05));
            for ev in drain_sim_events(&mut world) {
                if let SimEvent::AnimalAttacked { target, damage, .. } = ev {
                    assert_eq!(target, player);
                    assert_eq!(damage, 5);
                    attacks += 1;
                }
            }
        }
        assert_eq!(attacks, 2);

        config.carnivore_aggression = false;
        for _ in 0..60 {
            system.update_movement(&mut world, &ctx(&map, &config, 0.05));
        }
        assert!(drain_sim_events(&mut world).is_empty());
    }

    #[test]
    fn send_back_restores_tile_and_idles() {
        let mut world = new_world();
        let mut map = grass_map(10);
        let system = AnimalAiSystem::new(1);
        let d = def(50, true);
        let wolf = place(&mut map, &mut world, &system, TileCoord::new(4, 4), &d);
        {
            let mut animal = world.get_mut::<Animal>(wolf).unwrap();
            animal.tile = TileCoord::new(5, 4);
            animal.target = Some(TileCoord::new(5, 4));
        }

        assert!(!system.send_back(&mut world, TileCoord::new(5, 4), TileCoord::new(4, 4), d.id + 1));
        assert!(system.send_back(&mut world, TileCoord::new(5, 4), TileCoord::new(4, 4), d.id));
        let animal = world.get::<Animal>(wolf).unwrap();
        assert_eq!(animal.tile, TileCoord::new(4, 4));
        assert_eq!(animal.target, None);
        assert_eq!(animal.state, AnimalState::Idle);
        assert_eq!(*world.get::<Position>(wolf).unwrap(), Position::at_tile(TileCoord::new(4, 4)));
    }

    #[test]
    fn unregister_by_tile() {
        let mut world = new_world();
        let mut map = grass_map(10);
        let mut system = AnimalAiSystem::new(1);
        place(&mut map, &mut world, &system, TileCoord::new(1, 1), &def(50, false));
        assert_eq!(system.count(&mut world), 1);
        assert!(system.unregister_at(&mut world, TileCoord::new(1, 1)));
        assert!(!system.unregister_at(&mut world, TileCoord::new(1, 1)));
        assert_eq!(system.count(&mut world), 0);
        assert_eq!(system.delete_stale_components(&mut world), 1);
    }
}
