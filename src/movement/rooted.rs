use bevy::prelude::*;

use crate::movement::config::MovementConfig;
use crate::movement::state::CharacterState;
use crate::movement::walk::capsule;
use crate::movement::world::{find_floor, CollisionWorld};

const FLOOR_TRACE_DISTANCE: f32 = 100_000.0;

/// Rooted characters hold position: used during the pre-match countdown.
///
/// Velocity and input are ignored entirely. Each tick re-traces the floor far
/// below and refreshes the floor result without applying any displacement, so
/// a character rooted in mid-air stays in mid-air until unrooted.
// TODO: decide whether rooting over a ledge should snap the capsule down to
// the traced surface instead of leaving it where the root happened.
pub fn phys_rooted(state: &mut CharacterState, config: &MovementConfig, world: &dyn CollisionWorld) {
    match world.raycast(state.position, Vec3::NEG_Z, FLOOR_TRACE_DISTANCE) {
        Some(_) => {
            state.floor = find_floor(
                world,
                state.position,
                &capsule(config),
                config.walkable_floor_z,
                config.floor_snap_distance,
            );
        }
        None => {
            error!("rooted character has no floor beneath it");
        }
    }
}
