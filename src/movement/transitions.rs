use crate::movement::config::MovementConfig;
use crate::movement::state::{CharacterState, CustomMode, MovementMode, Role};
use crate::movement::wall_run::find_wall_for_wall_running;
use crate::movement::world::CollisionWorld;

/// Crouching needs ground under us and no external physics driving the body.
pub fn can_crouch_in_current_state(state: &CharacterState) -> bool {
    state.is_moving_on_ground()
}

/// Hook for archetype-specific sprint restrictions; unconditional here.
pub fn can_start_sprinting(_state: &CharacterState) -> bool {
    true
}

pub fn can_start_sliding(state: &CharacterState, config: &MovementConfig) -> bool {
    !(state.is_sliding
        || state.velocity.length_squared() < config.slide_enter_required_speed.powi(2)
        || state.is_falling()
        || state.is_swimming()
        || state.is_wall_running())
}

/// Continue threshold is lower than the entry threshold; the hysteresis band
/// keeps the slide from flickering around a single speed value.
pub fn can_continue_sliding(state: &CharacterState, config: &MovementConfig) -> bool {
    !(state.velocity.length_squared() < config.slide_min_speed.powi(2) || state.is_falling())
}

fn start_sliding(state: &mut CharacterState, config: &MovementConfig) {
    state.is_sliding = true;
    state.velocity += state.velocity.normalize_or_zero() * config.slide_start_boost;
}

fn stop_sliding(state: &mut CharacterState, role: Role) {
    state.is_sliding = false;
    // Local players must release and press again to slide again; a held key
    // does not re-trigger.
    if role == Role::AutonomousProxy {
        state.wants_to_slide = false;
    }
}

/// Evaluate mode and sub-mode transitions for this tick. Must run before the
/// rules queries and the integrator: decisions here change which rules apply.
///
/// Simulated proxies receive this state through replication and never run
/// transition logic themselves.
pub fn update_before_movement(
    state: &mut CharacterState,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    role: Role,
) {
    if role.is_simulated_proxy() {
        return;
    }

    // Crouch is forced while sliding and otherwise follows intent.
    if state.is_crouching
        && !state.is_sliding
        && (!state.wants_to_crouch || !can_crouch_in_current_state(state))
    {
        state.is_crouching = false;
    } else if !state.is_crouching
        && (state.wants_to_crouch || state.is_sliding)
        && can_crouch_in_current_state(state)
    {
        state.is_crouching = true;
    }

    if !state.is_sprinting && state.wants_to_sprint && can_start_sprinting(state) {
        state.is_sprinting = true;
    } else if state.is_sprinting && !state.wants_to_sprint {
        state.is_sprinting = false;
    }

    if !state.is_sliding && state.wants_to_slide && can_start_sliding(state, config) {
        start_sliding(state, config);
    }

    // Jump intent doubles as the wall-run trigger: start a run when a wall is
    // in reach, or queue a jump-off when already running one.
    if state.jump_pressed
        && !state.is_wall_running()
        && find_wall_for_wall_running(state, config, world).is_some()
    {
        state.set_movement_mode(MovementMode::Custom, CustomMode::WallRun);
        state.jump_pressed = false;
    } else if state.jump_pressed && state.is_wall_running() {
        state.wants_to_jump_off_wall = true;
        state.jump_pressed = false;
    }

    // The mantle flag lives as long as its motion override does.
    if state.is_mantling && state.motion_override.is_none() {
        state.is_mantling = false;
    }
}

/// Post-integration cleanup: drop states whose preconditions no longer hold.
pub fn update_after_movement(state: &mut CharacterState, config: &MovementConfig, role: Role) {
    if role.is_simulated_proxy() {
        return;
    }

    if state.is_crouching && !state.is_sliding && !can_crouch_in_current_state(state) {
        state.is_crouching = false;
    }

    if state.is_sliding && !can_continue_sliding(state, config) {
        stop_sliding(state, role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::world::{Aabb, FloorResult, StaticWorld};
    use bevy::prelude::*;

    fn config() -> MovementConfig {
        MovementConfig::default()
    }

    fn empty_world() -> StaticWorld {
        StaticWorld::default()
    }

    fn grounded(speed: f32) -> CharacterState {
        let mut state = CharacterState::default();
        state.velocity = Vec3::new(speed, 0.0, 0.0);
        state.floor = FloorResult {
            blocking: true,
            walkable: true,
            distance: 1.0,
            point: Vec3::ZERO,
            normal: Vec3::Z,
        };
        state
    }

    #[test]
    fn slide_requires_entry_speed() {
        let config = config();

        // At rest: no slide
        let state = grounded(0.0);
        assert!(!can_start_sliding(&state, &config));

        // One unit below the threshold: no slide
        let state = grounded(config.slide_enter_required_speed - 1.0);
        assert!(!can_start_sliding(&state, &config));

        // Exactly at the threshold: slide
        let state = grounded(config.slide_enter_required_speed);
        assert!(can_start_sliding(&state, &config));
    }

    #[test]
    fn slide_rejected_while_airborne_or_wall_running() {
        let config = config();
        let mut state = grounded(800.0);
        state.set_movement_mode(MovementMode::Falling, CustomMode::None);
        assert!(!can_start_sliding(&state, &config));

        state.set_movement_mode(MovementMode::Custom, CustomMode::WallRun);
        assert!(!can_start_sliding(&state, &config));
    }

    #[test]
    fn slide_hysteresis_band() {
        let config = config();
        assert!(config.slide_min_speed < config.slide_enter_required_speed);

        // Between min and enter speed: cannot start, but can continue
        let mut state = grounded(400.0);
        assert!(!can_start_sliding(&state, &config));
        state.is_sliding = true;
        assert!(can_continue_sliding(&state, &config));

        state.velocity = Vec3::new(config.slide_min_speed - 1.0, 0.0, 0.0);
        assert!(!can_continue_sliding(&state, &config));
    }

    #[test]
    fn slide_intent_at_rest_leaves_mode_unchanged() {
        let config = config();
        let world = empty_world();
        let mut state = grounded(0.0);
        state.wants_to_slide = true;

        update_before_movement(&mut state, &config, &world, Role::Authority);

        assert!(!state.is_sliding);
        assert_eq!(state.mode, MovementMode::Walking);
    }

    #[test]
    fn slide_start_boosts_along_velocity() {
        let config = config();
        let world = empty_world();
        let mut state = grounded(600.0);
        state.wants_to_slide = true;

        update_before_movement(&mut state, &config, &world, Role::Authority);

        assert!(state.is_sliding);
        assert!((state.velocity.x - (600.0 + config.slide_start_boost)).abs() < 1e-3);
        // Forced crouch while sliding
        assert!(state.is_crouching);
    }

    #[test]
    fn slide_stop_clears_local_intent_only() {
        let config = config();
        let mut state = grounded(config.slide_min_speed - 10.0);
        state.is_sliding = true;
        state.wants_to_slide = true;

        // Server keeps the intent flag: the owning client clears it
        update_after_movement(&mut state, &config, Role::Authority);
        assert!(!state.is_sliding);
        assert!(state.wants_to_slide);

        let mut state = grounded(config.slide_min_speed - 10.0);
        state.is_sliding = true;
        state.wants_to_slide = true;
        update_after_movement(&mut state, &config, Role::AutonomousProxy);
        assert!(!state.is_sliding);
        assert!(!state.wants_to_slide);
    }

    #[test]
    fn simulated_proxies_never_transition() {
        let config = config();
        let world = empty_world();
        let mut state = grounded(800.0);
        state.wants_to_slide = true;
        state.wants_to_sprint = true;

        update_before_movement(&mut state, &config, &world, Role::SimulatedProxy);

        assert!(!state.is_sliding);
        assert!(!state.is_sprinting);
    }

    #[test]
    fn sprint_follows_intent() {
        let config = config();
        let world = empty_world();
        let mut state = grounded(100.0);
        state.wants_to_sprint = true;
        update_before_movement(&mut state, &config, &world, Role::Authority);
        assert!(state.is_sprinting);

        state.wants_to_sprint = false;
        update_before_movement(&mut state, &config, &world, Role::Authority);
        assert!(!state.is_sprinting);
    }

    #[test]
    fn jump_intent_starts_wall_run_next_to_wall() {
        let config = config();
        let mut world = StaticWorld::default();
        // Wall to the right of a character at the origin, nothing below
        world.add_block(Aabb::new(
            Vec3::new(-200.0, 60.0, -500.0),
            Vec3::new(200.0, 160.0, 500.0),
        ));

        let mut state = CharacterState::default();
        state.set_movement_mode(MovementMode::Falling, CustomMode::None);
        state.position = Vec3::new(0.0, 0.0, 100.0);
        state.velocity = Vec3::new(500.0, 0.0, 0.0);
        state.acceleration = Vec3::new(1000.0, 0.0, 0.0);
        state.jump_pressed = true;

        update_before_movement(&mut state, &config, &world, Role::Authority);

        assert!(state.is_wall_running());
        assert!(!state.jump_pressed);
    }

    #[test]
    fn jump_while_wall_running_queues_jump_off() {
        let config = config();
        let world = empty_world();
        let mut state = CharacterState::default();
        state.set_movement_mode(MovementMode::Custom, CustomMode::WallRun);
        state.jump_pressed = true;

        update_before_movement(&mut state, &config, &world, Role::Authority);

        assert!(state.wants_to_jump_off_wall);
        assert!(!state.jump_pressed);
    }
}
