//! Aging: one year per interval, capped at the maximum age.

use bevy_ecs::prelude::*;

use crate::components::Age;
use crate::ecs::{compact, push_event, Deleted, SimEvent, System, TickContext};

use super::ticks_per_interval;

#[derive(Debug, Default)]
pub struct AgingSystem {
    ticks: u64,
    aging_tick: bool,
}

impl AgingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last update advanced ages. Drives the season clock.
    pub fn is_aging_tick(&self) -> bool {
        self.aging_tick
    }
}

impl System for AgingSystem {
    fn name(&self) -> &'static str {
        "aging"
    }

    fn update(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        self.ticks += 1;
        self.aging_tick = self.ticks >= ticks_per_interval(ctx.config.aging_speed);
        if !self.aging_tick {
            return;
        }
        self.ticks = 0;

        let mut events = Vec::new();
        let mut query = world.query_filtered::<(Entity, &mut Age), Without<Deleted>>();
        for (entity, mut age) in query.iter_mut(world) {
            if age.is_dead() {
                continue;
            }
            let from = age.age;
            age.increment();
            events.push(SimEvent::Aged {
                entity,
                from,
                to: age.age,
            });
            if age.is_dead() {
                events.push(SimEvent::OldAge { entity });
            }
        }
        for event in events {
            push_event(world, event);
        }
    }

    fn delete_stale_components(&mut self, world: &mut World) -> usize {
        compact::<Age>(world)
    }
}
