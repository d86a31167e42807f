//! Projectile ballistics: straight-line flight, tile collision, landing.

use bevy_ecs::prelude::*;
use lineage_world::TileCoord;

use crate::components::{Position, Projectile, Velocity};
use crate::ecs::{compact, push_event, Deleted, SimEvent, System, TickContext};
use crate::events::ProjectileView;

/// Pixels travelled per fast tick.
pub const PROJECTILE_SPEED: f32 = 15.0;
/// Range used when a weapon does not define one.
pub const DEFAULT_MAX_DIST: f32 = 200.0;
/// Damage used when a weapon does not define one.
pub const DEFAULT_DAMAGE: f32 = 5.0;
/// Age at which a shooter is most capable.
pub const PRIME_AGE: f32 = 30.0;

/// Range and spread of a shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotProfile {
    pub max_dist: f32,
    /// Total angular spread in radians; the shot deviates by up to half of it.
    pub accuracy: f32,
}

/// Range peaks at the prime age and falls off linearly (never below 20%);
/// experience extends range and tightens spread.
pub fn shot_profile(age: u32, experience: u32, weapon_max_dist: Option<f32>) -> ShotProfile {
    let age_factor = (1.0 - (age as f32 - PRIME_AGE).abs() / PRIME_AGE).max(0.2);
    let exp_factor = 1.0 + experience as f32 / 500.0;
    ShotProfile {
        max_dist: weapon_max_dist.unwrap_or(DEFAULT_MAX_DIST) * age_factor * exp_factor,
        accuracy: 0.2 * (1.0 - age_factor) / exp_factor,
    }
}

/// Per-tick velocity for a heading in radians.
pub fn launch_velocity(angle: f32, speed: f32) -> Velocity {
    Velocity {
        vx: angle.cos() * speed,
        vy: angle.sin() * speed,
    }
}

/// Advance one fast tick. Returns the distance covered.
pub fn step_projectile(pos: &mut Position, vel: &Velocity) -> f32 {
    pos.x += vel.vx;
    pos.y += vel.vy;
    (vel.vx * vel.vx + vel.vy * vel.vy).sqrt()
}

#[derive(Debug, Default)]
pub struct ProjectileSystem;

impl ProjectileSystem {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        world: &mut World,
        owner_id: &str,
        x: f32,
        y: f32,
        angle: f32,
        object_type: u32,
        max_dist: f32,
        damage: f32,
    ) -> Entity {
        let position = Position::new(x, y);
        world
            .spawn((
                Projectile {
                    owner_id: owner_id.to_string(),
                    object_type,
                    max_dist,
                    angle,
                    damage,
                    distance: 0.0,
                    origin_tile: position.tile(),
                },
                position,
                launch_velocity(angle, PROJECTILE_SPEED),
            ))
            .id()
    }

    pub fn projectiles_for_sync(&self, world: &mut World) -> Vec<ProjectileView> {
        world
            .query_filtered::<(Entity, &Projectile, &Position), Without<Deleted>>()
            .iter(world)
            .map(|(entity, p, pos)| ProjectileView {
                id: entity.to_bits(),
                object_type: p.object_type,
                x: pos.x,
                y: pos.y,
                angle: p.angle,
            })
            .collect()
    }

    pub fn active_count(&self, world: &mut World) -> usize {
        world
            .query_filtered::<(), (With<Projectile>, Without<Deleted>)>()
            .iter(world)
            .count()
    }
}

impl System for ProjectileSystem {
    fn name(&self) -> &'static str {
        "projectile"
    }

    fn update(&mut self, world: &mut World, ctx: &TickContext<'_>) {
        let mut events = Vec::new();
        let mut finished = Vec::new();
        let mut query = world
            .query_filtered::<(Entity, &mut Projectile, &mut Position, &Velocity), Without<Deleted>>();
        for (entity, mut projectile, mut pos, vel) in query.iter_mut(world) {
            projectile.distance += step_projectile(&mut pos, vel);
            let tile: TileCoord = pos.tile();

            if tile != projectile.origin_tile {
                if let Some(target_type) = ctx.map.object_at(tile) {
                    events.push(SimEvent::ProjectileHit {
                        owner_id: projectile.owner_id.clone(),
                        projectile_type: projectile.object_type,
                        damage: projectile.damage,
                        tile,
                        target_type,
                    });
                    finished.push(entity);
                    continue;
                }
            }

            if projectile.distance >= projectile.max_dist {
                if tile.in_bounds(ctx.map.size()) && ctx.map.is_empty(tile) {
                    events.push(SimEvent::ProjectileLanded {
                        tile,
                        projectile_type: projectile.object_type,
                    });
                }
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
        compact::<Projectile>(world)
    }
}
