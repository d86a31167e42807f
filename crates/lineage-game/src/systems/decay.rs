//! Organic decay: carcass -> decayed remains -> bones -> gone.

use std::collections::HashSet;

use bevy_ecs::prelude::*;
use lineage_world::TileCoord;

use crate::components::Decay;
use crate::ecs::{compact, push_event, Deleted, SimEvent, System, TickContext};

/// Slow ticks between two decay steps.
pub const DECAY_TICK_INTERVAL: u64 = 60;

/// Stage order and per-stage durations, in decay steps.
#[derive(Debug, Clone)]
pub struct DecayChain {
    pub dead_types: HashSet<u32>,
    pub decayed: Option<u32>,
    pub bones: Option<u32>,
    pub stage_ticks: u32,
    pub bones_ticks: u32,
}

impl Default for DecayChain {
    fn default() -> Self {
        Self {
            dead_types: HashSet::new(),
            decayed: None,
            bones: None,
            stage_ticks: 3,
            bones_ticks: 6,
        }
    }
}

impl DecayChain {
    pub fn decays(&self, object_type: u32) -> bool {
        self.dead_types.contains(&object_type) || self.decayed == Some(object_type)
    }

    /// `None` if the type is not part of the chain; `Some(None)` when the
    /// stage is the last one.
    pub fn next(&self, object_type: u32) -> Option<Option<u32>> {
        if self.dead_types.contains(&object_type) {
            Some(self.decayed.or(self.bones))
        } else if self.decayed == Some(object_type) {
            Some(self.bones)
        } else if self.bones == Some(object_type) {
            Some(None)
        } else {
            None
        }
    }

    pub fn stage_len(&self, object_type: u32) -> u32 {
        if self.bones == Some(object_type) {
            self.bones_ticks.max(1)
        } else {
            self.stage_ticks.max(1)
        }
    }
}

#[derive(Debug)]
pub struct DecaySystem {
    interval: u64,
    ticks: u64,
    chain: DecayChain,
}

impl DecaySystem {
    pub fn new(interval: u64, chain: DecayChain) -> Self {
        Self {
            interval: interval.max(1),
            ticks: 0,
            chain,
        }
    }

    pub fn chain(&self) -> &DecayChain {
        &self.chain
    }

    pub fn set_chain(&mut self, chain: DecayChain) {
        self.chain = chain;
    }

    /// Start decaying the object on `tile`. Ignores types outside the chain.
    pub fn register(&self, world: &mut World, tile: TileCoord, object_type: u32) -> Option<Entity> {
        self.chain.next(object_type)?;
        Some(
            world
                .spawn(Decay {
                    ticks: 0,
                    max: self.chain.stage_len(object_type),
                    tile,
                    object_type,
                })
                .id(),
        )
    }

    /// Drop the timer of whatever rots on `tile`.
    pub fn unregister_at(&self, world: &mut World, tile: TileCoord) -> bool {
        let found: Vec<Entity> = world
            .query_filtered::<(Entity, &Decay), Without<Deleted>>()
            .iter(world)
            .filter(|(_, d)| d.tile == tile)
            .map(|(e, _)| e)
            .collect();
        for &entity in &found {
            world.entity_mut(entity).insert(Deleted);
        }
        !found.is_empty()
    }
}

impl System for DecaySystem {
    fn name(&self) -> &'static str {
        "decay"
    }

    fn update(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        self.ticks += 1;
        if self.ticks < self.interval {
            return;
        }
        self.ticks = 0;

        let mut events = Vec::new();
        let mut finished = Vec::new();
        let mut query = world.query_filtered::<(Entity, &mut Decay), Without<Deleted>>();
        for (entity, mut decay) in query.iter_mut(world) {
            // Picked up or replaced since registration.
            if ctx.map.object_at(decay.tile) != Some(decay.object_type) {
                finished.push(entity);
                continue;
            }
            decay.ticks += 1;
            if decay.ticks < decay.max {
                continue;
            }
            let Some(to) = self.chain.next(decay.object_type) else {
                finished.push(entity);
                continue;
            };
            events.push(SimEvent::DecayAdvanced {
                tile: decay.tile,
                from: decay.object_type,
                to,
            });
            match to {
                Some(next) => {
                    decay.object_type = next;
                    decay.ticks = 0;
                    decay.max = self.chain.stage_len(next);
                }
                None => finished.push(entity),
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
        compact::<Decay>(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::ecs::{drain_sim_events, new_world};
    use crate::systems::testing::{ctx, grass_map};

    const DEAD_RABBIT: u32 = 112;
    const DECAYED: u32 = 14;
    const BONES: u32 = 13;

    fn chain(stage: u32, bones: u32) -> DecayChain {
        DecayChain {
            dead_types: HashSet::from([DEAD_RABBIT]),
            decayed: Some(DECAYED),
            bones: Some(BONES),
            stage_ticks: stage,
            bones_ticks: bones,
        }
    }

    #[test]
    fn chain_order() {
        let c = chain(3, 6);
        assert_eq!(c.next(DEAD_RABBIT), Some(Some(DECAYED)));
        assert_eq!(c.next(DECAYED), Some(Some(BONES)));
        assert_eq!(c.next(BONES), Some(None));
        assert_eq!(c.next(1), None);
        assert_eq!(c.stage_len(BONES), 6);
        assert!(c.decays(DECAYED));
        assert!(!c.decays(BONES));
    }

    #[test]
    fn dead_rabbit_is_gone_after_180_ticks() {
        let mut world = new_world();
        let mut map = grass_map(8);
        let tile = TileCoord::new(2, 3);
        map.set_object(tile, DEAD_RABBIT, None);
        let config = GameConfig::default();
        let mut system = DecaySystem::new(DECAY_TICK_INTERVAL, chain(1, 1));
        system.register(&mut world, tile, DEAD_RABBIT).unwrap();

        let mut seen = Vec::new();
        for tick in 1..=180u32 {
            system.update(&mut world, &ctx(&map, &config, 1.0));
            for ev in drain_sim_events(&mut world) {
                if let SimEvent::DecayAdvanced { tile, to, .. } = ev {
                    // Apply the transition the way the engine does.
                    match to {
                        Some(t) => {
                            map.set_object(tile, t, None);
                        }
                        None => {
                            map.remove_object(tile);
                        }
                    }
                    seen.push((tick, to));
                }
            }
            system.delete_stale_components(&mut world);
        }
        assert_eq!(seen, vec![(60, Some(DECAYED)), (120, Some(BONES)), (180, None)]);
        assert!(map.object_at(tile).is_none());
        assert_eq!(world.query::<&Decay>().iter(&world).count(), 0);
    }

    #[test]
    fn removed_object_detaches_timer() {
        let mut world = new_world();
        let map = grass_map(8);
        let config = GameConfig::default();
        let mut system = DecaySystem::new(1, chain(1, 1));
        system.register(&mut world, TileCoord::new(1, 1), DEAD_RABBIT).unwrap();
        system.update(&mut world, &ctx(&map, &config, 1.0));
        assert!(drain_sim_events(&mut world).is_empty());
        assert_eq!(system.delete_stale_components(&mut world), 1);
    }

    #[test]
    fn only_chain_types_register() {
        let mut world = new_world();
        let system = DecaySystem::new(1, chain(1, 1));
        assert!(system.register(&mut world, TileCoord::new(0, 0), 1).is_none());
    }
}
