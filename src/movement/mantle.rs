use bevy::prelude::*;

use crate::movement::config::MovementConfig;
use crate::movement::state::{CharacterState, MotionOverride};
use crate::movement::world::{CapsuleShape, CollisionWorld};

/// Clearance added above the minimum mantle height so the first candidate
/// starts slightly below it.
const MANTLE_Z_OFFSET: f32 = 10.0;
/// Sweep with a slightly shrunk capsule so a surface we are flush against
/// does not register as blocking.
const MANTLE_CAPSULE_SCALE: f32 = 0.98;
const MANTLE_DURATION: f32 = 0.2;
const MANTLE_EXIT_FORWARD: f32 = 250.0;
const MANTLE_EXIT_UP: f32 = 50.0;
const MANTLE_EXIT_CLAMP: f32 = 50.0;

/// Outcome of a mantle search.
#[derive(Clone, Copy, Debug, Default)]
pub struct MantleInfo {
    pub can_mantle: bool,
    pub start_location: Vec3,
    pub end_location: Vec3,
}

pub fn can_start_mantle(state: &CharacterState) -> bool {
    !state.is_mantling && !state.is_crouching
}

/// Scan upward for a ledge the character can pull up onto.
///
/// Candidate heights step from the minimum mantle height to the maximum. At
/// each step the capsule is swept up from its current location, then forward;
/// the first clear forward sweep after at least one forward hit marks the
/// ledge. Clear sweeps before any hit just move the scan higher, so a
/// grabbable face can start anywhere inside the height band; only a blocked
/// upward sweep or running out of iterations ends the search.
pub fn try_find_mantle_location(
    state: &CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
) -> MantleInfo {
    assert!(
        config.max_height_from_floor_mantle > config.min_height_from_floor_mantle,
        "mantle max height must exceed min height"
    );
    assert!(
        !config.mantle_trace_object_types.is_empty(),
        "mantle requires at least one trace object type"
    );

    let mut info = MantleInfo {
        can_mantle: false,
        start_location: state.position,
        end_location: state.position,
    };

    let shape = CapsuleShape {
        radius: config.capsule_radius * MANTLE_CAPSULE_SCALE,
        half_height: config.capsule_half_height,
    };
    let forward = state.facing();
    let feet = state.position - Vec3::Z * config.capsule_half_height;

    let span = config.max_height_from_floor_mantle - config.min_height_from_floor_mantle
        + MANTLE_Z_OFFSET;
    let delta_up = Vec3::Z * (span / config.max_iterations_mantle as f32);
    let mut current = feet
        + Vec3::Z
            * (config.min_height_from_floor_mantle + config.capsule_half_height - MANTLE_Z_OFFSET);

    let mut num_hits_forward = 0u32;
    for _ in 0..config.max_iterations_mantle {
        current += delta_up;

        // Path up to the candidate must be clear
        if world
            .sweep_capsule(
                &shape,
                state.position,
                current,
                &config.mantle_trace_object_types,
            )
            .is_some()
        {
            break;
        }

        let forward_end = current + forward * config.forward_trace_length_mantle;
        match world.sweep_capsule(&shape, current, forward_end, &config.mantle_trace_object_types) {
            Some(_) => num_hits_forward += 1,
            // Clear above a face we previously hit: that face is the ledge
            None if num_hits_forward > 0 => {
                info.can_mantle = true;
                info.end_location = current + Vec3::Z;
                break;
            }
            // Nothing at this height yet; the face may start higher up
            None => {}
        }
    }

    info
}

/// Begin the mantle motion: a fixed-duration move to the resolved location,
/// exiting with a small forward push.
pub fn do_mantle(state: &mut CharacterState, info: &MantleInfo) {
    let mut motion = MotionOverride::move_to(info.start_location, info.end_location, MANTLE_DURATION);
    motion.finish_velocity = state.facing() * MANTLE_EXIT_FORWARD + Vec3::Z * MANTLE_EXIT_UP;
    motion.finish_clamp = MANTLE_EXIT_CLAMP;
    state.motion_override = Some(motion);
    state.is_mantling = true;
}
