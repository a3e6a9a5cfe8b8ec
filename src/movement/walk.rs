use bevy::prelude::*;

use crate::movement::config::{MovementConfig, MIN_TICK_TIME};
use crate::movement::rules::{max_braking_deceleration, max_speed};
use crate::movement::simulate::{get_simulation_time_step, start_new_physics};
use crate::movement::state::{CharacterState, CustomMode, MovementMode, Role};
use crate::movement::transitions::can_start_sliding;
use crate::movement::velocity::calc_velocity;
use crate::movement::world::{find_floor, CapsuleShape, CollisionWorld, SweepHit};

/// Gap kept between the capsule bottom and the floor while grounded.
pub const FLOOR_HOVER: f32 = 1.0;
/// Pull-back from a blocking surface after a sweep, to avoid re-hitting it.
const CONTACT_OFFSET: f32 = 0.1;

pub fn capsule(config: &MovementConfig) -> CapsuleShape {
    CapsuleShape {
        radius: config.capsule_radius,
        half_height: config.capsule_half_height,
    }
}

/// Sweep the capsule along `delta`; on a blocking hit, deflect the remainder
/// along the hit plane and sweep once more. Returns the first blocking hit.
pub fn sweep_and_slide(
    state: &mut CharacterState,
    world: &dyn CollisionWorld,
    shape: &CapsuleShape,
    delta: Vec3,
) -> Option<SweepHit> {
    let len = delta.length();
    if len < 1e-8 {
        return None;
    }

    let first = world.sweep_capsule(shape, state.position, state.position + delta, &[]);
    let Some(hit) = first else {
        state.position += delta;
        return None;
    };

    let t = (hit.distance / len).clamp(0.0, 1.0);
    state.position += delta * t + hit.normal * CONTACT_OFFSET;

    // Deflect what is left of the move along the surface
    let remainder = delta * (1.0 - t);
    let deflected = remainder - hit.normal * remainder.dot(hit.normal);
    if deflected.length() > 1e-6 {
        match world.sweep_capsule(shape, state.position, state.position + deflected, &[]) {
            Some(second) => {
                let t2 = (second.distance / deflected.length()).clamp(0.0, 1.0);
                state.position += deflected * t2 + second.normal * CONTACT_OFFSET;
            }
            None => state.position += deflected,
        }
    }

    first
}

fn start_falling(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    remaining: f32,
    iterations: &mut u32,
    role: Role,
) {
    // Sliding off a ledge keeps the slide flag for this one falling tick so
    // the speed-cap query preserves the momentum.
    state.was_sliding_before_falling = state.is_sliding;
    state.set_movement_mode(MovementMode::Falling, CustomMode::None);
    start_new_physics(state, config, world, remaining, iterations, role);
}

/// Ground locomotion: velocity from friction/acceleration (or the slide
/// path), horizontal sweep-and-slide, then a floor search that either snaps
/// us down or hands the remaining time to the falling stepper.
pub fn phys_walking(
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

        let old_position = state.position;

        state.acceleration.z = 0.0;
        state.velocity.z = 0.0;
        let braking = max_braking_deceleration(state, config);
        calc_velocity(state, config, time_tick, config.ground_friction, braking);

        let delta = state.velocity * time_tick;
        if delta.length_squared() < 1e-8 {
            remaining = 0.0;
            // Still refresh the floor so downstream queries stay consistent
            state.floor = find_floor(
                world,
                state.position,
                &shape,
                config.walkable_floor_z,
                config.floor_snap_distance,
            );
            break;
        }

        sweep_and_slide(state, world, &shape, delta);

        let floor = find_floor(
            world,
            state.position,
            &shape,
            config.walkable_floor_z,
            config.floor_snap_distance,
        );
        state.floor = floor;

        if floor.walkable {
            // Keep the capsule hovering a fixed distance over the surface
            state.position.z += FLOOR_HOVER - floor.distance;
        } else {
            start_falling(state, config, world, remaining, iterations, role);
            return;
        }

        if state.position == old_position {
            remaining = 0.0;
            break;
        }
    }
}

fn should_slide_on_landed(state: &CharacterState, config: &MovementConfig) -> bool {
    state.wants_to_slide
        || (state.was_sliding_before_falling
            && state.mode == MovementMode::Walking
            && can_start_sliding(state, config))
}

fn process_landed(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    remaining: f32,
    iterations: &mut u32,
    role: Role,
) {
    state.set_movement_mode(MovementMode::Walking, CustomMode::None);
    state.velocity.z = 0.0;

    // A slide held through the fall, or one interrupted by the fall, resumes
    // on the ground.
    state.wants_to_slide = should_slide_on_landed(state, config);
    state.was_sliding_before_falling = false;

    start_new_physics(state, config, world, remaining, iterations, role);
}

/// Airborne: gravity plus reduced lateral control, landing on walkable
/// surfaces, deflection along non-walkable ones.
pub fn phys_falling(
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

        // Lateral air control only; vertical motion belongs to gravity
        let lateral_accel = Vec3::new(state.acceleration.x, state.acceleration.y, 0.0)
            * config.air_control;
        let prev_lateral = Vec3::new(state.velocity.x, state.velocity.y, 0.0);
        let mut lateral = prev_lateral + lateral_accel * time_tick;
        // Air control never pushes past the cap, but momentum already over
        // the cap (a slide carried off a ledge) is kept, not scrubbed
        let cap = max_speed(state, config).max(prev_lateral.length());
        lateral = lateral.clamp_length_max(cap);
        state.velocity.x = lateral.x;
        state.velocity.y = lateral.y;
        state.velocity.z -= config.gravity * time_tick;

        let delta = state.velocity * time_tick;
        let hit = sweep_and_slide(state, world, &shape, delta);

        if world.in_water(state.position) {
            state.set_movement_mode(MovementMode::Swimming, CustomMode::None);
            start_new_physics(state, config, world, remaining, iterations, role);
            return;
        }

        if let Some(hit) = hit {
            if hit.normal.z >= config.walkable_floor_z {
                state.floor = find_floor(
                    world,
                    state.position,
                    &shape,
                    config.walkable_floor_z,
                    config.floor_snap_distance,
                );
                process_landed(state, config, world, remaining, iterations, role);
                return;
            }
        }
    }
}

/// Neutral-buoyancy swimming: damped velocity, no gravity, exits back to
/// falling when the capsule leaves the water volume.
pub fn phys_swimming(
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

        state.velocity += state.acceleration * time_tick;
        state.velocity *= 1.0 / (1.0 + config.fluid_friction * time_tick);
        state.velocity = state.velocity.clamp_length_max(max_speed(state, config));

        let delta = state.velocity * time_tick;
        sweep_and_slide(state, world, &shape, delta);

        if !world.in_water(state.position) {
            state.set_movement_mode(MovementMode::Falling, CustomMode::None);
            start_new_physics(state, config, world, remaining, iterations, role);
            return;
        }
    }
}

/// Free flight: full 3D control, no gravity, no floor.
pub fn phys_flying(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    dt: f32,
    iterations: &mut u32,
    _role: Role,
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

        let braking = max_braking_deceleration(state, config);
        calc_velocity(state, config, time_tick, config.fluid_friction, braking);

        let delta = state.velocity * time_tick;
        sweep_and_slide(state, world, &shape, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::world::{Aabb, StaticWorld};

    fn config() -> MovementConfig {
        MovementConfig::default()
    }

    fn flat_world() -> StaticWorld {
        let mut world = StaticWorld::default();
        world.add_block(Aabb::new(
            Vec3::new(-10000.0, -10000.0, -200.0),
            Vec3::new(10000.0, 10000.0, 0.0),
        ));
        world
    }

    fn standing_state(config: &MovementConfig) -> CharacterState {
        let mut state = CharacterState::at(Vec3::new(
            0.0,
            0.0,
            config.capsule_half_height + FLOOR_HOVER,
        ));
        state.floor = find_floor(
            &flat_world(),
            state.position,
            &capsule(config),
            config.walkable_floor_z,
            config.floor_snap_distance,
        );
        state
    }

    #[test]
    fn walking_moves_and_keeps_floor() {
        let config = config();
        let world = flat_world();
        let mut state = standing_state(&config);
        state.acceleration = Vec3::new(config.max_acceleration, 0.0, 0.0);

        let mut iterations = 0;
        phys_walking(&mut state, &config, &world, 1.0 / 60.0, &mut iterations, Role::Authority);

        assert!(state.position.x > 0.0);
        assert!(state.floor.walkable);
        assert_eq!(state.mode, MovementMode::Walking);
    }

    #[test]
    fn walking_off_a_ledge_starts_falling() {
        let config = config();
        let mut world = StaticWorld::default();
        // A small platform the character runs off
        world.add_block(Aabb::new(
            Vec3::new(-200.0, -200.0, -100.0),
            Vec3::new(50.0, 200.0, 0.0),
        ));

        let mut state = standing_state(&config);
        state.velocity = Vec3::new(600.0, 0.0, 0.0);
        state.acceleration = Vec3::new(config.max_acceleration, 0.0, 0.0);

        let mut iterations = 0;
        for _ in 0..60 {
            iterations = 0;
            start_new_physics(
                &mut state,
                &config,
                &world,
                1.0 / 60.0,
                &mut iterations,
                Role::Authority,
            );
            if state.mode == MovementMode::Falling {
                break;
            }
        }
        assert_eq!(state.mode, MovementMode::Falling);
    }

    #[test]
    fn falling_lands_on_walkable_ground() {
        let config = config();
        let world = flat_world();
        let mut state = CharacterState::at(Vec3::new(0.0, 0.0, 400.0));
        state.set_movement_mode(MovementMode::Falling, CustomMode::None);

        let mut landed = false;
        for _ in 0..240 {
            let mut iterations = 0;
            start_new_physics(
                &mut state,
                &config,
                &world,
                1.0 / 60.0,
                &mut iterations,
                Role::Authority,
            );
            if state.mode == MovementMode::Walking {
                landed = true;
                break;
            }
        }
        assert!(landed, "character never landed");
        assert_eq!(state.velocity.z, 0.0);
        assert!(state.floor.walkable);
        // Resting just above the surface
        assert!((state.position.z - (config.capsule_half_height + FLOOR_HOVER)).abs() < 2.0);
    }

    #[test]
    fn sliding_before_falling_requests_slide_on_landing() {
        let config = config();
        let world = flat_world();
        let mut state = CharacterState::at(Vec3::new(0.0, 0.0, 200.0));
        state.set_movement_mode(MovementMode::Falling, CustomMode::None);
        state.was_sliding_before_falling = true;
        state.velocity = Vec3::new(800.0, 0.0, -200.0);

        for _ in 0..120 {
            let mut iterations = 0;
            start_new_physics(
                &mut state,
                &config,
                &world,
                1.0 / 60.0,
                &mut iterations,
                Role::Authority,
            );
            if state.mode == MovementMode::Walking {
                break;
            }
        }
        assert_eq!(state.mode, MovementMode::Walking);
        assert!(state.wants_to_slide);
        assert!(!state.was_sliding_before_falling);
    }

    #[test]
    fn falling_into_water_switches_to_swimming() {
        let config = config();
        let mut world = StaticWorld::default();
        world.add_water(Aabb::new(
            Vec3::new(-500.0, -500.0, -1000.0),
            Vec3::new(500.0, 500.0, 0.0),
        ));
        let mut state = CharacterState::at(Vec3::new(0.0, 0.0, 300.0));
        state.set_movement_mode(MovementMode::Falling, CustomMode::None);

        for _ in 0..240 {
            let mut iterations = 0;
            start_new_physics(
                &mut state,
                &config,
                &world,
                1.0 / 60.0,
                &mut iterations,
                Role::Authority,
            );
            if state.mode == MovementMode::Swimming {
                break;
            }
        }
        assert_eq!(state.mode, MovementMode::Swimming);
    }

    #[test]
    fn sweep_and_slide_deflects_along_wall() {
        let config = config();
        let mut world = flat_world();
        world.add_block(Aabb::new(
            Vec3::new(200.0, -1000.0, 0.0),
            Vec3::new(300.0, 1000.0, 500.0),
        ));
        let mut state = standing_state(&config);
        let shape = capsule(&config);

        // Move diagonally into the wall; X should stop at the face, Y should
        // keep going
        let hit = sweep_and_slide(
            &mut state,
            &world,
            &shape,
            Vec3::new(400.0, 100.0, 0.0),
        );
        assert!(hit.is_some());
        assert!(state.position.x < 200.0 - config.capsule_radius + 1.0);
        assert!(state.position.y > 50.0);
    }
}
