use crate::movement::config::MovementConfig;
use crate::movement::state::{CharacterState, MovementMode};

/// Per-tick speed cap for the current mode and sub-mode flags.
///
/// Pure query; called every tick and potentially several times per tick
/// during iterative integration.
pub fn max_speed(state: &CharacterState, config: &MovementConfig) -> f32 {
    match state.mode {
        MovementMode::Walking => {
            if state.is_sliding {
                config.max_slide_speed
            } else if state.is_crouching {
                config.max_walk_speed_crouched
            } else if state.is_sprinting {
                config.max_sprint_speed
            } else {
                config.max_walk_speed
            }
        }
        // On the tick we slide off an edge we are sliding and falling at
        // once. Returning the slide cap here keeps that momentum; returning
        // the walk cap would clamp it away.
        MovementMode::Falling => {
            if state.is_sliding {
                config.max_slide_speed
            } else {
                config.max_walk_speed
            }
        }
        MovementMode::Swimming => config.max_swim_speed,
        MovementMode::Flying => config.max_fly_speed,
        MovementMode::Custom => {
            if state.is_wall_running() {
                config.max_wall_run_speed
            } else {
                config.max_custom_movement_speed
            }
        }
        MovementMode::None => 0.0,
    }
}

pub fn max_acceleration(state: &CharacterState, config: &MovementConfig) -> f32 {
    if state.is_sliding {
        config.max_slide_acceleration
    } else {
        config.max_acceleration
    }
}

/// Deceleration applied when there is no input. Custom modes return zero;
/// their steppers handle deceleration themselves.
pub fn max_braking_deceleration(state: &CharacterState, config: &MovementConfig) -> f32 {
    match state.mode {
        MovementMode::Walking => {
            if state.is_sliding {
                config.braking_deceleration_sliding
            } else {
                config.braking_deceleration_walking
            }
        }
        MovementMode::Falling => config.braking_deceleration_falling,
        MovementMode::Swimming => config.braking_deceleration_swimming,
        MovementMode::Flying => config.braking_deceleration_flying,
        MovementMode::Custom | MovementMode::None => 0.0,
    }
}
