use bevy::prelude::*;

use crate::movement::world::ObjectType;

// Simulation timing
pub const CLIENT_TIMESTEP: f32 = 1.0 / 60.0; // 60 Hz - client prediction rate
pub const SERVER_TIMESTEP: f32 = 1.0 / 30.0; // 30 Hz - authoritative tick + net update rate
pub const MIN_TICK_TIME: f32 = 1e-6;

/// Tunable movement parameters for one character archetype.
///
/// These are content values, fixed after spawn. They are never part of the
/// predicted state and never travel over the wire - both sides must be built
/// with the same archetype for prediction to agree.
#[derive(Resource, Clone, Debug)]
pub struct MovementConfig {
    // Capsule
    pub capsule_radius: f32,
    pub capsule_half_height: f32,

    // Walking
    pub max_walk_speed: f32,
    pub max_walk_speed_crouched: f32,
    pub max_sprint_speed: f32,
    pub max_acceleration: f32,
    pub braking_deceleration_walking: f32,
    pub ground_friction: f32,

    // Falling
    pub gravity: f32,
    pub jump_z_velocity: f32,
    pub braking_deceleration_falling: f32,
    pub air_control: f32,

    // Swimming / flying
    pub max_swim_speed: f32,
    pub max_fly_speed: f32,
    pub max_custom_movement_speed: f32,
    pub braking_deceleration_swimming: f32,
    pub braking_deceleration_flying: f32,
    pub fluid_friction: f32,

    // Sliding
    pub max_slide_speed: f32,
    pub max_slide_acceleration: f32,
    /// Slope angle (degrees) at which slide acceleration scaling maxes out.
    pub sliding_slope_angle_to_reach_max_acceleration: f32,
    /// Past this angle (degrees) away from the downhill direction we brake instead.
    pub sliding_max_angle_to_down_slope_before_slowing_down: f32,
    pub slide_start_boost: f32,
    pub slide_enter_required_speed: f32,
    pub slide_min_speed: f32,
    pub sliding_friction_multi: f32,
    pub braking_deceleration_sliding: f32,
    pub slide_turn_strength: f32,

    // Wall running
    pub desired_distance_to_wall_when_wall_running: f32,
    pub desired_distance_maintain_speed: f32,
    pub min_speed_to_keep_wall_running: f32,
    pub min_distance_to_floor: f32,
    pub max_wall_run_speed: f32,
    pub downward_pull_force: f32,
    /// Should be larger than the capsule radius.
    pub max_distance_to_trace_for_wall: f32,
    // Jump-off launch: along current travel, away from the wall, upward
    pub jump_off_wall_along_velocity: f32,
    pub jump_off_wall_away_from_wall: f32,
    pub jump_off_wall_upward: f32,

    // Mantle
    pub min_height_from_floor_mantle: f32,
    pub max_height_from_floor_mantle: f32,
    pub forward_trace_length_mantle: f32,
    pub max_iterations_mantle: u32,
    pub mantle_trace_object_types: Vec<ObjectType>,

    // Integrator loop bounds
    pub max_simulation_iterations: u32,
    pub max_simulation_time_step: f32,
    /// Floor is walkable when its normal Z is at least this (cos of max slope angle).
    pub walkable_floor_z: f32,
    /// How far below the capsule we search for a floor while walking.
    pub floor_snap_distance: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            capsule_radius: 35.0,
            capsule_half_height: 90.0,

            max_walk_speed: 300.0,
            max_walk_speed_crouched: 150.0,
            max_sprint_speed: 1000.0,
            max_acceleration: 3000.0,
            braking_deceleration_walking: 2048.0,
            ground_friction: 8.0,

            gravity: 980.0,
            jump_z_velocity: 450.0,
            braking_deceleration_falling: 0.0,
            air_control: 0.35,

            max_swim_speed: 300.0,
            max_fly_speed: 600.0,
            max_custom_movement_speed: 600.0,
            braking_deceleration_swimming: 0.0,
            braking_deceleration_flying: 0.0,
            fluid_friction: 0.5,

            max_slide_speed: 2000.0,
            max_slide_acceleration: 4200.0,
            sliding_slope_angle_to_reach_max_acceleration: 35.0,
            sliding_max_angle_to_down_slope_before_slowing_down: 70.0,
            slide_start_boost: 300.0,
            slide_enter_required_speed: 500.0,
            slide_min_speed: 300.0,
            sliding_friction_multi: 0.25,
            braking_deceleration_sliding: 1024.0,
            slide_turn_strength: 1.0,

            desired_distance_to_wall_when_wall_running: 15.0,
            desired_distance_maintain_speed: 3.0,
            min_speed_to_keep_wall_running: 300.0,
            min_distance_to_floor: 50.0,
            max_wall_run_speed: 800.0,
            downward_pull_force: 25.0,
            max_distance_to_trace_for_wall: 100.0,
            jump_off_wall_along_velocity: 1000.0,
            jump_off_wall_away_from_wall: 500.0,
            jump_off_wall_upward: 325.0,

            min_height_from_floor_mantle: 80.0,
            max_height_from_floor_mantle: 250.0,
            forward_trace_length_mantle: 50.0,
            max_iterations_mantle: 30,
            mantle_trace_object_types: vec![ObjectType::WorldStatic],

            max_simulation_iterations: 4,
            max_simulation_time_step: 0.05,
            walkable_floor_z: 0.71,
            floor_snap_distance: 20.0,
        }
    }
}
