use bevy::prelude::*;

use crate::movement::world::FloorResult;
use crate::prediction::saved_move::flags;

/// Primary movement mode, mirroring a small closed set of base simulations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MovementMode {
    #[default]
    Walking,
    Falling,
    Swimming,
    Flying,
    Custom,
    None,
}

/// Extension modes dispatched when `MovementMode::Custom` is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CustomMode {
    #[default]
    None,
    WallRun,
    Rooted,
}

/// Which side of the simulation owns this character this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The server: final, trusted outcome.
    Authority,
    /// Locally-controlled character on a client, predicting ahead.
    AutonomousProxy,
    /// Remote observer's mirror; never simulated locally.
    SimulatedProxy,
}

impl Role {
    pub fn is_simulated_proxy(&self) -> bool {
        matches!(self, Role::SimulatedProxy)
    }
}

/// Timed motion override used by mantling: move to a target over a fixed
/// duration, then force an exit velocity. Supersedes normal physics while
/// active; expires on its own, no explicit cancel.
#[derive(Clone, Copy, Debug)]
pub struct MotionOverride {
    pub start: Vec3,
    pub target: Vec3,
    pub duration: f32,
    pub elapsed: f32,
    pub finish_velocity: Vec3,
    pub finish_clamp: f32,
}

impl MotionOverride {
    pub fn move_to(start: Vec3, target: Vec3, duration: f32) -> Self {
        Self {
            start,
            target,
            duration,
            elapsed: 0.0,
            finish_velocity: Vec3::ZERO,
            finish_clamp: f32::INFINITY,
        }
    }
}

/// Everything the movement simulation reads and writes for one character.
///
/// Owned exclusively by that character's simulation; a predicted copy of it
/// is disposable and can be rebuilt from the last acknowledged authoritative
/// state plus the pending move buffer.
#[derive(Component, Clone, Debug)]
pub struct CharacterState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    /// Yaw-only control rotation, radians. Pitch and roll never enter the sim.
    pub look_yaw: f32,

    pub mode: MovementMode,
    pub custom_mode: CustomMode,

    // Intent flags, set by the input layer / decoded from compressed flags
    pub wants_to_sprint: bool,
    pub wants_to_slide: bool,
    pub wants_to_crouch: bool,
    pub jump_pressed: bool,
    pub wants_to_jump_off_wall: bool,

    // Actual state, authoritative on server / local client
    pub is_sprinting: bool,
    pub is_sliding: bool,
    pub is_crouching: bool,
    pub is_mantling: bool,
    pub was_sliding_before_falling: bool,

    pub floor: FloorResult,
    pub motion_override: Option<MotionOverride>,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            look_yaw: 0.0,
            mode: MovementMode::Walking,
            custom_mode: CustomMode::None,
            wants_to_sprint: false,
            wants_to_slide: false,
            wants_to_crouch: false,
            jump_pressed: false,
            wants_to_jump_off_wall: false,
            is_sprinting: false,
            is_sliding: false,
            is_crouching: false,
            is_mantling: false,
            was_sliding_before_falling: false,
            floor: FloorResult::none(),
            motion_override: None,
        }
    }
}

impl CharacterState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Yaw-only facing direction.
    pub fn facing(&self) -> Vec3 {
        Vec3::new(self.look_yaw.cos(), self.look_yaw.sin(), 0.0)
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn is_moving_on_ground(&self) -> bool {
        self.mode == MovementMode::Walking
    }

    pub fn is_falling(&self) -> bool {
        self.mode == MovementMode::Falling
    }

    pub fn is_swimming(&self) -> bool {
        self.mode == MovementMode::Swimming
    }

    pub fn is_wall_running(&self) -> bool {
        self.mode == MovementMode::Custom && self.custom_mode == CustomMode::WallRun
    }

    pub fn is_rooted(&self) -> bool {
        self.mode == MovementMode::Custom && self.custom_mode == CustomMode::Rooted
    }

    /// The one mutation point for the mode state machine. Keeps the
    /// `Custom` / `CustomMode` pairing consistent.
    pub fn set_movement_mode(&mut self, mode: MovementMode, custom: CustomMode) {
        debug_assert!(
            mode != MovementMode::Custom || custom != CustomMode::None,
            "custom movement mode requires a custom sub-mode"
        );
        self.mode = mode;
        self.custom_mode = if mode == MovementMode::Custom {
            custom
        } else {
            CustomMode::None
        };
    }

    /// Restore the intent flags a saved move carried.
    pub fn apply_compressed_flags(&mut self, packed: u8) {
        self.jump_pressed = packed & flags::JUMP != 0;
        self.wants_to_crouch = packed & flags::CROUCH != 0;
        self.wants_to_sprint = packed & flags::SPRINT != 0;
        self.wants_to_slide = packed & flags::SLIDE != 0;
    }

    /// Pack the current intent flags for the wire / move ledger.
    pub fn compressed_flags(&self) -> u8 {
        let mut packed = 0;
        if self.jump_pressed {
            packed |= flags::JUMP;
        }
        if self.wants_to_crouch {
            packed |= flags::CROUCH;
        }
        if self.wants_to_sprint {
            packed |= flags::SPRINT;
        }
        if self.wants_to_slide {
            packed |= flags::SLIDE;
        }
        packed
    }

    /// Reaction to an external teleport (checkpoint reset): drop to falling,
    /// zero the velocity and require a fresh slide press.
    pub fn on_teleported(&mut self, position: Vec3) {
        self.position = position;
        self.set_movement_mode(MovementMode::Falling, CustomMode::None);
        self.velocity = Vec3::ZERO;
        self.wants_to_slide = false;
        self.is_sliding = false;
        self.floor = FloorResult::none();
        self.motion_override = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_round_trip() {
        let mut state = CharacterState::default();
        state.jump_pressed = true;
        state.wants_to_sprint = true;
        state.wants_to_slide = true;

        let packed = state.compressed_flags();

        let mut restored = CharacterState::default();
        restored.apply_compressed_flags(packed);
        assert!(restored.jump_pressed);
        assert!(!restored.wants_to_crouch);
        assert!(restored.wants_to_sprint);
        assert!(restored.wants_to_slide);
    }

    #[test]
    fn custom_mode_pairing() {
        let mut state = CharacterState::default();
        state.set_movement_mode(MovementMode::Custom, CustomMode::WallRun);
        assert!(state.is_wall_running());

        state.set_movement_mode(MovementMode::Walking, CustomMode::None);
        assert_eq!(state.custom_mode, CustomMode::None);
        assert!(!state.is_wall_running());
    }

    #[test]
    fn teleport_clears_slide_and_velocity() {
        let mut state = CharacterState::default();
        state.velocity = Vec3::new(500.0, 0.0, 0.0);
        state.wants_to_slide = true;
        state.is_sliding = true;

        state.on_teleported(Vec3::new(0.0, 0.0, 300.0));

        assert_eq!(state.mode, MovementMode::Falling);
        assert_eq!(state.velocity, Vec3::ZERO);
        assert!(!state.wants_to_slide);
        assert!(!state.is_sliding);
    }
}
