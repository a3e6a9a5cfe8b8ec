use bevy::prelude::*;

use crate::movement::config::{MovementConfig, MIN_TICK_TIME};
use crate::movement::mantle::{can_start_mantle, do_mantle, try_find_mantle_location};
use crate::movement::rooted::phys_rooted;
use crate::movement::rules::max_acceleration;
use crate::movement::state::{CharacterState, CustomMode, MovementMode, Role};
use crate::movement::transitions::{update_after_movement, update_before_movement};
use crate::movement::walk::{phys_falling, phys_flying, phys_swimming, phys_walking};
use crate::movement::wall_run::phys_wall_run;
use crate::movement::world::CollisionWorld;

/// One tick of input, as captured from the local player or replayed from a
/// saved move. Everything the simulation needs beyond the state itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveInput {
    /// World-space input acceleration, before clamping.
    pub acceleration: Vec3,
    /// Control yaw in radians.
    pub look_yaw: f32,
    /// Packed intent flags, see `prediction::saved_move::flags`.
    pub compressed_flags: u8,
}

/// Side effects of a move that the caller has to act on.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveOutcome {
    /// A mantle began this tick. The owning client must tell the server.
    pub mantle_started: bool,
}

/// Slice the remaining tick time so no single integration step exceeds the
/// configured maximum, halving when there is headroom to subdivide.
pub(crate) fn get_simulation_time_step(
    remaining: f32,
    iterations: u32,
    config: &MovementConfig,
) -> f32 {
    if remaining > config.max_simulation_time_step
        && iterations < config.max_simulation_iterations
    {
        config
            .max_simulation_time_step
            .min(remaining * 0.5)
            .max(MIN_TICK_TIME)
    } else {
        remaining
    }
}

/// Dispatch to the stepper for the current mode. Steppers call back in here
/// when a mid-tick mode change leaves simulation time unconsumed.
pub fn start_new_physics(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    dt: f32,
    iterations: &mut u32,
    role: Role,
) {
    if dt < MIN_TICK_TIME || *iterations >= config.max_simulation_iterations {
        return;
    }
    match state.mode {
        MovementMode::Walking => phys_walking(state, config, world, dt, iterations, role),
        MovementMode::Falling => phys_falling(state, config, world, dt, iterations, role),
        MovementMode::Swimming => phys_swimming(state, config, world, dt, iterations, role),
        MovementMode::Flying => phys_flying(state, config, world, dt, iterations, role),
        MovementMode::Custom => match state.custom_mode {
            CustomMode::WallRun => phys_wall_run(state, config, world, dt, iterations, role),
            CustomMode::Rooted => phys_rooted(state, config, world),
            CustomMode::None => {}
        },
        MovementMode::None => {}
    }
}

/// Jump doubles as the mantle trigger: a reachable ledge wins over a plain
/// jump. The flag is left set when neither fires so the wall-run transition
/// can still consume it.
fn check_jump_input(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
) -> bool {
    if !state.jump_pressed {
        return false;
    }

    if can_start_mantle(state) {
        let info = try_find_mantle_location(state, config, world);
        if info.can_mantle {
            do_mantle(state, &info);
            state.jump_pressed = false;
            return true;
        }
    }

    if state.is_moving_on_ground()
        && state.floor.walkable
        && !state.is_crouching
        && !state.is_sliding
    {
        state.velocity.z = config.jump_z_velocity;
        state.set_movement_mode(MovementMode::Falling, CustomMode::None);
        state.jump_pressed = false;
    }

    false
}

/// Advance an active motion override, ignoring normal physics entirely.
fn step_motion_override(state: &mut CharacterState, dt: f32) {
    let Some(mut motion) = state.motion_override else {
        return;
    };
    motion.elapsed += dt;
    let t = (motion.elapsed / motion.duration).min(1.0);
    state.position = motion.start.lerp(motion.target, t);
    state.velocity = (motion.target - motion.start) / motion.duration;

    if t >= 1.0 {
        state.velocity = motion.finish_velocity.clamp_length_max(motion.finish_clamp);
        state.motion_override = None;
        state.set_movement_mode(MovementMode::Falling, CustomMode::None);
    } else {
        state.motion_override = Some(motion);
    }
}

/// One full movement tick: the single pipeline every character goes through
/// on every peer.
///
/// Order is fixed: restore intent from the move's flags, resolve jump and
/// mantle, run mode transitions, integrate (or advance a motion override),
/// then post-move cleanup. Server ticks, client prediction ticks and
/// reconciliation replays all call this same function, which is what makes
/// replayed moves land on the same result.
pub fn perform_move(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    input: &MoveInput,
    dt: f32,
    role: Role,
) -> MoveOutcome {
    let mut outcome = MoveOutcome::default();
    if dt < MIN_TICK_TIME {
        return outcome;
    }

    state.apply_compressed_flags(input.compressed_flags);
    state.look_yaw = input.look_yaw;
    state.acceleration = input
        .acceleration
        .clamp_length_max(max_acceleration(state, config));

    if !role.is_simulated_proxy() {
        outcome.mantle_started = check_jump_input(state, config, world);
    }
    update_before_movement(state, config, world, role);

    if state.motion_override.is_some() {
        step_motion_override(state, dt);
    } else {
        let mut iterations = 0;
        start_new_physics(state, config, world, dt, &mut iterations, role);
    }

    update_after_movement(state, config, role);

    // Jump is edge-triggered; a held key is a fresh flag on the next move
    state.jump_pressed = false;
    outcome
}
