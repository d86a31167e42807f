//! ECS substrate: the bevy `World` every system runs against, the
//! lazy-deletion marker, and the internal event queue systems report into.
//!
//! Systems never despawn entities while iterating. They tag them with
//! [`Deleted`] and every query filters `Without<Deleted>`; the tagged entities
//! are despawned by [`compact`] between ticks.

use bevy_ecs::prelude::*;
use lineage_world::{TileCoord, WorldMap};

use crate::config::GameConfig;
use crate::events::OutgoingEvents;
use crate::systems::season::Season;

/// Marker: entity is logically gone and awaits compaction.
#[derive(Component, Debug)]
pub struct Deleted;

/// Slow ticks since the engine started.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

/// Facts reported by systems, applied by the engine after the systems ran.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Hunger reached zero.
    Starved { entity: Entity },
    /// Age reached its maximum.
    OldAge { entity: Entity },
    Aged { entity: Entity, from: u32, to: u32 },
    /// `to == None` means the object rotted away entirely.
    DecayAdvanced {
        tile: TileCoord,
        from: u32,
        to: Option<u32>,
    },
    GrowthCompleted {
        tile: TileCoord,
        from: u32,
        grows_into: String,
    },
    SeasonChanged { season: Season, year: u64 },
    /// The animal's world object should follow it; its data moves along.
    AnimalMoved {
        from: TileCoord,
        to: TileCoord,
        type_id: u32,
    },
    AnimalAttacked {
        type_id: u32,
        target: Entity,
        damage: u32,
    },
    ProjectileHit {
        owner_id: String,
        projectile_type: u32,
        damage: f32,
        tile: TileCoord,
        target_type: u32,
    },
    ProjectileLanded { tile: TileCoord, projectile_type: u32 },
}

#[derive(Resource, Default)]
pub struct SimEvents {
    pub events: Vec<SimEvent>,
}

/// Read-only view of the surroundings handed to every system update.
pub struct TickContext<'a> {
    pub map: &'a WorldMap,
    pub config: &'a GameConfig,
    /// Seconds since the previous update at this cadence.
    pub delta: f32,
}

/// A simulation system owning one component type.
pub trait System {
    fn name(&self) -> &'static str;

    /// Advance one tick. Must skip entities tagged [`Deleted`].
    fn update(&mut self, world: &mut World, ctx: &TickContext<'_>);

    /// Physically remove this system's deleted entities. Returns how many.
    fn delete_stale_components(&mut self, world: &mut World) -> usize;
}

/// A world with the resources every system expects.
pub fn new_world() -> World {
    let mut world = World::new();
    world.insert_resource(SimEvents::default());
    world.insert_resource(OutgoingEvents::default());
    world.insert_resource(TickCounter::default());
    world
}

pub fn push_event(world: &mut World, event: SimEvent) {
    world.resource_mut::<SimEvents>().events.push(event);
}

pub fn drain_sim_events(world: &mut World) -> Vec<SimEvent> {
    std::mem::take(&mut world.resource_mut::<SimEvents>().events)
}

/// Tag an entity for removal at the next compaction. No-op if already gone.
pub fn mark_deleted(world: &mut World, entity: Entity) {
    if world.entities().contains(entity) {
        world.entity_mut(entity).insert(Deleted);
    }
}

pub fn is_deleted(world: &World, entity: Entity) -> bool {
    world.get::<Deleted>(entity).is_some()
}

/// Despawn every deleted entity carrying `T`.
pub fn compact<T: Component>(world: &mut World) -> usize {
    let stale: Vec<Entity> = world
        .query_filtered::<Entity, (With<T>, With<Deleted>)>()
        .iter(world)
        .collect();
    for &entity in &stale {
        world.despawn(entity);
    }
    stale.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Component)]
    struct Marker(u32);

    #[test]
    fn compaction_only_touches_deleted() {
        let mut world = new_world();
        let a = world.spawn(Marker(1)).id();
        let b = world.spawn(Marker(2)).id();
        mark_deleted(&mut world, a);
        assert!(is_deleted(&world, a));

        let live: Vec<u32> = world
            .query_filtered::<&Marker, Without<Deleted>>()
            .iter(&world)
            .map(|m| m.0)
            .collect();
        assert_eq!(live, vec![2]);

        assert_eq!(compact::<Marker>(&mut world), 1);
        assert!(!world.entities().contains(a));
        assert!(world.entities().contains(b));
        assert_eq!(compact::<Marker>(&mut world), 0);
    }

    #[test]
    fn mark_deleted_tolerates_missing_entity() {
        let mut world = new_world();
        let a = world.spawn(Marker(1)).id();
        world.despawn(a);
        mark_deleted(&mut world, a);
    }

    #[test]
    fn events_drain_once() {
        let mut world = new_world();
        push_event(
            &mut world,
            SimEvent::ProjectileLanded {
                tile: TileCoord::new(1, 2),
                projectile_type: 3,
            },
        );
        assert_eq!(drain_sim_events(&mut world).len(), 1);
        assert!(drain_sim_events(&mut world).is_empty());
    }
}
