//! Hunger drains one point per interval; babies drain twice as fast.

use bevy_ecs::prelude::*;

use crate::components::{Age, Hunger};
use crate::ecs::{compact, push_event, Deleted, SimEvent, System, TickContext};

use super::ticks_per_interval;

/// Points lost per interval while a baby.
pub const YOUNG_HUNGER_RATE: u32 = 2;

#[derive(Debug, Default)]
pub struct HungerSystem {
    ticks: u64,
}

impl HungerSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for HungerSystem {
    fn name(&self) -> &'static str {
        "hunger"
    }

    fn update(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        self.ticks += 1;
        if self.ticks < ticks_per_interval(ctx.config.hunger_speed) {
            return;
        }
        self.ticks = 0;

        let mut starved = Vec::new();
        let mut query = world.query_filtered::<(Entity, &mut Hunger, Option<&Age>), Without<Deleted>>();
        for (entity, mut hunger, age) in query.iter_mut(world) {
            let amount = match age {
                Some(age) if age.is_baby() => YOUNG_HUNGER_RATE,
                _ => 1,
            };
            let before = hunger.current;
            hunger.decrease(amount);
            if before > 0 && hunger.current == 0 {
                starved.push(entity);
            }
        }
        for entity in starved {
            push_event(world, SimEvent::Starved { entity });
        }
    }

    fn delete_stale_components(&mut self, world: &mut World) -> usize {
        compact::<Hunger>(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::ecs::{drain_sim_events, mark_deleted, new_world};
    use crate::systems::testing::{ctx, grass_map};

    fn config() -> GameConfig {
        GameConfig {
            hunger_speed: 1000,
            ..GameConfig::default()
        }
    }

    #[test]
    fn babies_drain_twice_as_fast() {
        let mut world = new_world();
        let adult = world.spawn((Hunger::new(10), Age { age: 20, max: 60 })).id();
        let baby = world.spawn((Hunger::new(10), Age { age: 1, max: 60 })).id();
        let map = grass_map(4);
        let config = config();
        let mut system = HungerSystem::new();
        system.update(&mut world, &ctx(&map, &config, 1.0));
        assert_eq!(world.get::<Hunger>(adult).unwrap().current, 9);
        assert_eq!(world.get::<Hunger>(baby).unwrap().current, 8);
    }

    #[test]
    fn waits_for_interval() {
        let mut world = new_world();
        let e = world.spawn(Hunger::new(10)).id();
        let map = grass_map(4);
        let config = GameConfig {
            hunger_speed: 3000,
            ..GameConfig::default()
        };
        let mut system = HungerSystem::new();
        for _ in 0..2 {
            system.update(&mut world, &ctx(&map, &config, 1.0));
        }
        assert_eq!(world.get::<Hunger>(e).unwrap().current, 10);
        system.update(&mut world, &ctx(&map, &config, 1.0));
        assert_eq!(world.get::<Hunger>(e).unwrap().current, 9);
    }

    #[test]
    fn starves_once_per_episode() {
        let mut world = new_world();
        let e = world.spawn(Hunger::new(2)).id();
        let map = grass_map(4);
        let config = config();
        let mut system = HungerSystem::new();
        let mut starves = 0;
        for _ in 0..5 {
            system.update(&mut world, &ctx(&map, &config, 1.0));
            starves += drain_sim_events(&mut world)
                .iter()
                .filter(|ev| matches!(ev, SimEvent::Starved { entity } if *entity == e))
                .count();
        }
        assert_eq!(starves, 1);
        assert_eq!(world.get::<Hunger>(e).unwrap().current, 0);

        world.get_mut::<Hunger>(e).unwrap().eat(1);
        system.update(&mut world, &ctx(&map, &config, 1.0));
        assert_eq!(drain_sim_events(&mut world).len(), 1);
    }

    #[test]
    fn skips_deleted() {
        let mut world = new_world();
        let e = world.spawn(Hunger::new(5)).id();
        mark_deleted(&mut world, e);
        let map = grass_map(4);
        let config = config();
        let mut system = HungerSystem::new();
        system.update(&mut world, &ctx(&map, &config, 1.0));
        assert_eq!(world.get::<Hunger>(e).unwrap().current, 5);
        assert_eq!(system.delete_stale_components(&mut world), 1);
    }
}
