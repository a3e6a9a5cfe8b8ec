use bevy::prelude::*;

use crate::movement::config::{MovementConfig, MIN_TICK_TIME};
use crate::movement::rules::max_braking_deceleration;
use crate::movement::simulate::{get_simulation_time_step, start_new_physics};
use crate::movement::state::{CharacterState, CustomMode, MovementMode, Role};
use crate::movement::velocity::calc_velocity;
use crate::movement::walk::{capsule, sweep_and_slide};
use crate::movement::world::{CollisionWorld, SweepHit};

fn plane_project(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Look for a runnable wall beside the character.
///
/// Requires forward input pressure, no walkable floor, enough clearance
/// below the feet, and a wall within trace range on either side. When both
/// sides hit, the nearer wall wins.
pub fn find_wall_for_wall_running(
    state: &CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
) -> Option<SweepHit> {
    let forward = state.facing();
    if forward.dot(state.acceleration) <= 0.0 {
        return None;
    }
    if state.floor.walkable {
        return None;
    }

    let feet = state.position - Vec3::Z * config.capsule_half_height;
    if world
        .raycast(feet, Vec3::NEG_Z, config.min_distance_to_floor)
        .is_some()
    {
        return None;
    }

    let right = Vec3::new(forward.y, -forward.x, 0.0);
    let hit_right = world.raycast(state.position, right, config.max_distance_to_trace_for_wall);
    let hit_left = world.raycast(state.position, -right, config.max_distance_to_trace_for_wall);

    match (hit_right, hit_left) {
        (Some(r), Some(l)) => Some(if r.distance <= l.distance { r } else { l }),
        (Some(r), None) => Some(r),
        (None, Some(l)) => Some(l),
        (None, None) => None,
    }
}

/// Wall-run stepper. Re-acquires the wall every slice: the moment it is out
/// of reach, or speed drops under the keep threshold, the run ends and the
/// remaining slice time is handed to the falling stepper.
pub fn phys_wall_run(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    dt: f32,
    iterations: &mut u32,
    role: Role,
) {
    if dt < MIN_TICK_TIME {
        return;
    }
    let shape = capsule(config);
    let mut remaining = dt;

    while remaining >= MIN_TICK_TIME && *iterations < config.max_simulation_iterations {
        *iterations += 1;
        let time_tick = get_simulation_time_step(remaining, *iterations, config);
        remaining -= time_tick;

        let old_location = state.position;

        let Some(wall) = find_wall_for_wall_running(state, config, world) else {
            state.set_movement_mode(MovementMode::Falling, CustomMode::None);
            *iterations -= 1;
            start_new_physics(state, config, world, remaining + time_tick, iterations, role);
            return;
        };

        // Constrain input and motion to the wall plane; a constant pull
        // keeps the run descending instead of sticking forever.
        state.acceleration = plane_project(state.acceleration, wall.normal);
        state.acceleration.z = 0.0;
        let braking = max_braking_deceleration(state, config);
        calc_velocity(state, config, time_tick, config.ground_friction, braking);
        state.velocity = plane_project(state.velocity, wall.normal);
        state.velocity.z = -config.downward_pull_force;

        if state.velocity.length_squared()
            < config.min_speed_to_keep_wall_running * config.min_speed_to_keep_wall_running
        {
            state.set_movement_mode(MovementMode::Falling, CustomMode::None);
            *iterations -= 1;
            start_new_physics(state, config, world, remaining + time_tick, iterations, role);
            return;
        }

        if state.wants_to_jump_off_wall {
            state.wants_to_jump_off_wall = false;
            state.velocity = state.velocity.normalize_or_zero()
                * config.jump_off_wall_along_velocity
                + wall.normal * config.jump_off_wall_away_from_wall
                + Vec3::Z * config.jump_off_wall_upward;
            state.set_movement_mode(MovementMode::Falling, CustomMode::None);
            *iterations -= 1;
            start_new_physics(state, config, world, remaining + time_tick, iterations, role);
            return;
        }

        let delta = state.velocity * time_tick;
        if delta.length_squared() < 1e-8 {
            remaining = 0.0;
        } else {
            // Hold the capsule at the desired standoff from the wall,
            // proportional to how far off it has drifted
            let distance_to_wall = wall.point.distance(old_location);
            let standoff_error = config.capsule_radius
                + config.desired_distance_to_wall_when_wall_running
                - distance_to_wall;
            let correction =
                wall.normal * standoff_error * config.desired_distance_maintain_speed * time_tick;
            sweep_and_slide(state, world, &shape, correction);

            let before_move = state.position;
            sweep_and_slide(state, world, &shape, delta);

            if world.in_water(state.position) {
                // Credit back the part of the slice the blocked move never
                // consumed before handing off
                let desired = delta.length();
                let actual = (state.position - before_move).length();
                if desired > 1e-4 {
                    remaining += time_tick * (1.0 - (actual / desired).min(1.0));
                }
                state.set_movement_mode(MovementMode::Swimming, CustomMode::None);
                start_new_physics(state, config, world, remaining, iterations, role);
                return;
            }
        }

        if state.position == old_location {
            remaining = 0.0;
            break;
        }
    }
}
