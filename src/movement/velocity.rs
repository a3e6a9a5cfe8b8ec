use bevy::prelude::*;

use crate::movement::config::MovementConfig;
use crate::movement::rules::{max_acceleration, max_speed};
use crate::movement::state::CharacterState;

const KINDA_SMALL_NUMBER: f32 = 1e-4;

/// Map `value` from `from` to `to`, clamping to the output range.
pub fn map_range_clamped(value: f32, from: (f32, f32), to: (f32, f32)) -> f32 {
    let span = from.1 - from.0;
    if span.abs() < f32::EPSILON {
        return to.0;
    }
    let pct = ((value - from.0) / span).clamp(0.0, 1.0);
    to.0 + (to.1 - to.0) * pct
}

fn safe_normal_2d(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0).normalize_or_zero()
}

fn project_on_to(v: Vec3, target: Vec3) -> Vec3 {
    let len_sq = target.length_squared();
    if len_sq < f32::EPSILON {
        return Vec3::ZERO;
    }
    target * (v.dot(target) / len_sq)
}

/// Advance velocity one time slice using friction, braking and input
/// acceleration. Dispatches to the slide integration when sliding.
pub fn calc_velocity(
    state: &mut CharacterState,
    config: &MovementConfig,
    dt: f32,
    friction: f32,
    braking_deceleration: f32,
) {
    if state.is_sliding {
        calc_slide_velocity(state, config, dt, friction);
        return;
    }

    let cap = max_speed(state, config);

    if state.acceleration.length_squared() < KINDA_SMALL_NUMBER {
        apply_velocity_braking(state, dt, friction, braking_deceleration);
        return;
    }

    // Friction only affects the part of velocity not aligned with input,
    // so turning scrubs speed but driving straight does not.
    let accel_dir = state.acceleration.normalize_or_zero();
    let speed = state.velocity.length();
    state.velocity -= (state.velocity - accel_dir * speed) * (dt * friction).min(1.0);
    state.velocity += state.acceleration * dt;
    state.velocity = state.velocity.clamp_length_max(cap);
}

/// Decelerate toward zero without ever reversing direction in one slice.
fn apply_velocity_braking(
    state: &mut CharacterState,
    dt: f32,
    friction: f32,
    braking_deceleration: f32,
) {
    let speed = state.velocity.length();
    if speed < KINDA_SMALL_NUMBER {
        state.velocity = Vec3::ZERO;
        return;
    }
    let decel = (friction * speed + braking_deceleration) * dt;
    let new_speed = (speed - decel).max(0.0);
    if new_speed <= KINDA_SMALL_NUMBER {
        state.velocity = Vec3::ZERO;
    } else {
        state.velocity = state.velocity / speed * new_speed;
    }
}

/// Slide velocity integration. Replaces the normal ground friction update
/// while `is_sliding` is set.
///
/// Steering comes from the yaw-only look direction projected onto the axis
/// perpendicular to velocity, so the player can only steer laterally - they
/// cannot pump the slide faster or slower by looking along it. Slope handling
/// scales acceleration downhill and brakes uphill.
fn calc_slide_velocity(state: &mut CharacterState, config: &MovementConfig, dt: f32, friction: f32) {
    // A server-forced mode change can zero velocity under us; bail before
    // the normalizations below turn that into NaN.
    if state.velocity == Vec3::ZERO {
        return;
    }

    let max_accel = max_acceleration(state, config);

    // Steer where the player is looking; move keys have no effect.
    let look = state.facing();
    state.acceleration = look;

    let vel_right = Vec3::Z.cross(state.velocity).normalize_or_zero();
    let mut steering = look.normalize_or_zero() * max_accel;
    steering = project_on_to(steering, vel_right);

    // Lower friction, otherwise the slide dies almost immediately.
    let friction = friction * config.sliding_friction_multi;

    let mut slope = Vec3::ZERO;
    let floor = state.floor;
    if floor.blocking && (floor.normal.z - 1.0).abs() > 1e-6 {
        // Keep the direction but scale by slope angle and by how much of our
        // velocity points down the slope.
        let across_slope = Vec3::Z.cross(floor.normal);
        let down_slope = across_slope.cross(floor.normal);

        let steepness_raw = safe_normal_2d(down_slope).dot(down_slope.normalize_or_zero());
        let max_steepness = config
            .sliding_slope_angle_to_reach_max_acceleration
            .to_radians()
            .cos();
        let steepness = map_range_clamped(steepness_raw, (max_steepness, 1.0), (1.0, 0.0));

        // Below zero means we are heading uphill.
        let vel_along_slope = safe_normal_2d(state.velocity).dot(safe_normal_2d(down_slope));
        steering *= vel_along_slope.max(0.0);

        let max_dot_before_slowing = config
            .sliding_max_angle_to_down_slope_before_slowing_down
            .to_radians()
            .cos();
        if vel_along_slope <= max_dot_before_slowing {
            let braking_multi =
                map_range_clamped(vel_along_slope, (max_dot_before_slowing, 0.0), (0.0, 1.0));
            slope = state.velocity.normalize_or_zero()
                * -config.braking_deceleration_sliding
                * braking_multi;
        } else {
            slope = state.velocity.normalize_or_zero()
                * (max_accel * vel_along_slope * steepness);
        }
    }

    // Flat-surface resistance so a slide ends eventually. Clamped to the
    // current speed so one slice can shrink velocity to zero but never flip
    // it backwards.
    let speed = state.velocity.length();
    let resist_magnitude = (config.braking_deceleration_sliding * friction * dt).min(speed);
    let resisting_force = state.velocity.normalize_or_zero() * -resist_magnitude;

    state.acceleration =
        (steering * config.slide_turn_strength + slope).clamp_length_max(max_accel);
    state.velocity += resisting_force + state.acceleration * dt;
    // WARNING: on the tick we slide off a ledge this clamps against the
    // walking-mode query, which special-cases sliding for that reason. See
    // rules::max_speed.
    state.velocity = state.velocity.clamp_length_max(max_speed(state, config));
}
