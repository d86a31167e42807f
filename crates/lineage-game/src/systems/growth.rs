//! Crop growth: a planted crop turns into its mature form after N steps.

use bevy_ecs::prelude::*;
use lineage_world::TileCoord;

use crate::components::Growth;
use crate::ecs::{compact, push_event, Deleted, SimEvent, System, TickContext};

/// Slow ticks between two growth steps.
pub const GROWTH_TICK_INTERVAL: u64 = 60;
pub const DEFAULT_GROWTH_TICKS: u32 = 3;

#[derive(Debug)]
pub struct GrowthSystem {
    interval: u64,
    ticks: u64,
}

impl GrowthSystem {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            ticks: 0,
        }
    }

    pub fn register(
        &self,
        world: &mut World,
        tile: TileCoord,
        object_type: u32,
        grows_into: &str,
        growth_ticks: u32,
    ) -> Entity {
        world
            .spawn(Growth {
                ticks: 0,
                max: growth_ticks.max(1),
                grows_into: grows_into.to_string(),
                tile,
                object_type,
            })
            .id()
    }

    pub fn unregister_at(&self, world: &mut World, tile: TileCoord) -> bool {
        let found: Vec<Entity> = world
            .query_filtered::<(Entity, &Growth), Without<Deleted>>()
            .iter(world)
            .filter(|(_, g)| g.tile == tile)
            .map(|(e, _)| e)
            .collect();
        for &entity in &found {
            world.entity_mut(entity).insert(Deleted);
        }
        !found.is_empty()
    }
}

impl System for GrowthSystem {
    fn name(&self) -> &'static str {
        "growth"
    }

    fn update(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        self.ticks += 1;
        if self.ticks < self.interval {
            return;
        }
        self.ticks = 0;

        let mut events = Vec::new();
        let mut finished = Vec::new();
        let mut query = world.query_filtered::<(Entity, &mut Growth), Without<Deleted>>();
        for (entity, mut growth) in query.iter_mut(world) {
            if ctx.map.object_at(growth.tile) != Some(growth.object_type) {
                finished.push(entity);
                continue;
            }
            growth.ticks += 1;
            if growth.ticks >= growth.max {
                events.push(SimEvent::GrowthCompleted {
                    tile: growth.tile,
                    from: growth.object_type,
                    grows_into: growth.grows_into.clone(),
                });
                finished.push(entity);
            }
        }
        for entity in finished {
            world.entity_mut(entity).insert(Deleted);
        }
        for event in events {
            push_event(world, event);
        }
    }

    fn delete_stale_components(&mut self, world: &mut World) -> usize {
        compact::<Growth>(world)
    }
}
