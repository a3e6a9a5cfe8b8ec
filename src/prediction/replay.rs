use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::movement::config::MovementConfig;
use crate::movement::simulate::perform_move;
use crate::movement::state::{CharacterState, CustomMode, MovementMode, Role};
use crate::movement::world::CollisionWorld;
use crate::prediction::saved_move::MoveBuffer;

/// Position error before a correction snap is worth the visual cost (world units)
pub const POSITION_THRESHOLD: f32 = 5.0;

/// Velocity error before triggering reconciliation (units/second)
pub const VELOCITY_THRESHOLD: f32 = 50.0;

/// How many predicted snapshots to keep for comparison against corrections
const HISTORY_SIZE: usize = 256;

/// Wire-level movement mode, kept flat for serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMode {
    Walking,
    Falling,
    Swimming,
    Flying,
    WallRun,
    Rooted,
    None,
}

impl WireMode {
    pub fn from_state(state: &CharacterState) -> Self {
        match (state.mode, state.custom_mode) {
            (MovementMode::Walking, _) => WireMode::Walking,
            (MovementMode::Falling, _) => WireMode::Falling,
            (MovementMode::Swimming, _) => WireMode::Swimming,
            (MovementMode::Flying, _) => WireMode::Flying,
            (MovementMode::Custom, CustomMode::WallRun) => WireMode::WallRun,
            (MovementMode::Custom, CustomMode::Rooted) => WireMode::Rooted,
            (MovementMode::Custom, CustomMode::None) | (MovementMode::None, _) => WireMode::None,
        }
    }

    pub fn apply_to(self, state: &mut CharacterState) {
        let (mode, custom) = match self {
            WireMode::Walking => (MovementMode::Walking, CustomMode::None),
            WireMode::Falling => (MovementMode::Falling, CustomMode::None),
            WireMode::Swimming => (MovementMode::Swimming, CustomMode::None),
            WireMode::Flying => (MovementMode::Flying, CustomMode::None),
            WireMode::WallRun => (MovementMode::Custom, CustomMode::WallRun),
            WireMode::Rooted => (MovementMode::Custom, CustomMode::Rooted),
            WireMode::None => (MovementMode::None, CustomMode::None),
        };
        state.set_movement_mode(mode, custom);
    }
}

/// Authoritative snapshot the server sends back to the move's owner.
///
/// `ack_timestamp` names the newest client move folded into this state;
/// everything at or before it leaves the move ledger.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ServerCorrection {
    pub ack_timestamp: f64,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub velocity_z: f32,
    pub mode: WireMode,
    pub is_sliding: bool,
    pub is_sprinting: bool,
    pub is_crouching: bool,
}

impl ServerCorrection {
    pub fn from_state(ack_timestamp: f64, state: &CharacterState) -> Self {
        Self {
            ack_timestamp,
            position_x: state.position.x,
            position_y: state.position.y,
            position_z: state.position.z,
            velocity_x: state.velocity.x,
            velocity_y: state.velocity.y,
            velocity_z: state.velocity.z,
            mode: WireMode::from_state(state),
            is_sliding: state.is_sliding,
            is_sprinting: state.is_sprinting,
            is_crouching: state.is_crouching,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position_x, self.position_y, self.position_z)
    }

    pub fn velocity(&self) -> Vec3 {
        Vec3::new(self.velocity_x, self.velocity_y, self.velocity_z)
    }
}

/// What the client predicted at one timestamp, kept so a later correction can
/// be judged against it.
#[derive(Clone, Copy, Debug)]
pub struct PredictedSnapshot {
    pub timestamp: f64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub mode: WireMode,
}

/// Ring of recent predicted snapshots, timestamp-ordered.
#[derive(Default)]
pub struct PredictedHistory {
    buffer: VecDeque<PredictedSnapshot>,
}

impl PredictedHistory {
    pub fn record(&mut self, timestamp: f64, state: &CharacterState) {
        self.buffer.push_back(PredictedSnapshot {
            timestamp,
            position: state.position,
            velocity: state.velocity,
            mode: WireMode::from_state(state),
        });
        if self.buffer.len() > HISTORY_SIZE {
            self.buffer.pop_front();
        }
    }

    /// The snapshot predicted at the acknowledged timestamp, dropping it and
    /// everything older.
    pub fn take_at(&mut self, timestamp: f64) -> Option<PredictedSnapshot> {
        let mut found = None;
        while let Some(front) = self.buffer.front() {
            if front.timestamp > timestamp {
                break;
            }
            let snapshot = self.buffer.pop_front();
            if let Some(s) = snapshot {
                if (s.timestamp - timestamp).abs() < 1e-9 {
                    found = Some(s);
                }
            }
        }
        found
    }
}

/// Compare the server's result with what we predicted for the same move.
///
/// A missing snapshot (history overflow, first correction after join) always
/// corrects: we have nothing to prove we were right.
pub fn needs_correction(
    predicted: Option<&PredictedSnapshot>,
    correction: &ServerCorrection,
) -> (bool, f32) {
    let Some(predicted) = predicted else {
        return (true, f32::MAX);
    };

    let position_error = predicted.position.distance(correction.position());
    let velocity_error = predicted.velocity.distance(correction.velocity());
    let mode_mismatch = predicted.mode != correction.mode;

    let needed = position_error > POSITION_THRESHOLD
        || velocity_error > VELOCITY_THRESHOLD
        || mode_mismatch;
    (needed, position_error)
}

/// Apply a server correction: acknowledge, adopt the authoritative state and
/// replay every still-pending move through the normal movement pipeline.
///
/// Returns the visual offset (old predicted position minus corrected
/// position) for the smoothing layer to absorb.
pub fn reconcile(
    state: &mut CharacterState,
    buffer: &mut MoveBuffer,
    config: &MovementConfig,
    world: &dyn CollisionWorld,
    correction: &ServerCorrection,
) -> Vec3 {
    buffer.acknowledge(correction.ack_timestamp);

    let old_position = state.position;

    // Local intent outlives the correction; the baseline's flags describe
    // the server's past, not what the player is holding right now
    let wants_to_sprint = state.wants_to_sprint;
    let wants_to_slide = state.wants_to_slide;
    let wants_to_crouch = state.wants_to_crouch;

    state.position = correction.position();
    state.velocity = correction.velocity();
    correction.mode.apply_to(state);
    state.is_sliding = correction.is_sliding;
    state.is_sprinting = correction.is_sprinting;
    state.is_crouching = correction.is_crouching;
    state.motion_override = None;
    state.is_mantling = false;

    let pending: Vec<_> = buffer.pending().copied().collect();
    for saved in &pending {
        perform_move(
            state,
            config,
            world,
            &saved.input(),
            saved.delta_time,
            Role::AutonomousProxy,
        );
    }

    state.wants_to_sprint = wants_to_sprint;
    state.wants_to_slide = wants_to_slide;
    state.wants_to_crouch = wants_to_crouch;

    old_position - state.position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::config::CLIENT_TIMESTEP;
    use crate::movement::simulate::MoveInput;
    use crate::movement::walk::FLOOR_HOVER;
    use crate::movement::world::{demo_level, find_floor, CapsuleShape};
    use crate::prediction::saved_move::{flags, SavedMove};

    fn config() -> MovementConfig {
        MovementConfig::default()
    }

    fn spawn(config: &MovementConfig, world: &dyn CollisionWorld) -> CharacterState {
        let mut state = CharacterState::at(Vec3::new(
            -2000.0,
            -2000.0,
            config.capsule_half_height + FLOOR_HOVER,
        ));
        state.floor = find_floor(
            world,
            state.position,
            &CapsuleShape {
                radius: config.capsule_radius,
                half_height: config.capsule_half_height,
            },
            config.walkable_floor_z,
            config.floor_snap_distance,
        );
        state
    }

    fn scripted_moves(count: usize) -> Vec<SavedMove> {
        (0..count)
            .map(|tick| {
                let yaw = tick as f32 * 0.03;
                let input = MoveInput {
                    acceleration: Vec3::new(yaw.cos(), yaw.sin(), 0.0) * 3000.0,
                    look_yaw: yaw,
                    compressed_flags: if tick % 40 == 0 { flags::SPRINT } else { 0 },
                };
                SavedMove::new((tick + 1) as f64 * CLIENT_TIMESTEP as f64, CLIENT_TIMESTEP, &input)
            })
            .collect()
    }

    #[test]
    fn test_replay_matches_uninterrupted_prediction() {
        let config = config();
        let world = demo_level();
        let moves = scripted_moves(120);

        // Reference: predict straight through with no correction
        let mut reference = spawn(&config, &world);
        for m in &moves {
            perform_move(
                &mut reference,
                &config,
                &world,
                &m.input(),
                m.delta_time,
                Role::AutonomousProxy,
            );
        }

        // Server runs the first 60 moves and corrects with its exact result
        let mut server = spawn(&config, &world);
        for m in &moves[..60] {
            perform_move(
                &mut server,
                &config,
                &world,
                &m.input(),
                m.delta_time,
                Role::Authority,
            );
        }
        let correction = ServerCorrection::from_state(moves[59].timestamp, &server);

        // Client predicted all 120 and now reconciles against the correction
        let mut client = spawn(&config, &world);
        let mut buffer = MoveBuffer::new(256);
        for m in &moves {
            buffer.push(*m);
            perform_move(
                &mut client,
                &config,
                &world,
                &m.input(),
                m.delta_time,
                Role::AutonomousProxy,
            );
        }
        reconcile(&mut client, &mut buffer, &config, &world, &correction);

        // An accurate server agrees with the prediction, so the replayed
        // state must land exactly where the uninterrupted run did
        assert_eq!(client.position, reference.position);
        assert_eq!(client.velocity, reference.velocity);
        assert_eq!(client.mode, reference.mode);
        assert_eq!(buffer.len(), 60);
    }

    #[test]
    fn test_reconcile_adopts_diverged_server_state() {
        let config = config();
        let world = demo_level();

        let mut client = spawn(&config, &world);
        let mut buffer = MoveBuffer::new(256);
        client.position.x += 200.0; // drifted prediction

        let server = spawn(&config, &world);
        let correction = ServerCorrection::from_state(1.0, &server);

        let offset = reconcile(&mut client, &mut buffer, &config, &world, &correction);

        assert_eq!(client.position, server.position);
        assert!((offset.x - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_reconcile_preserves_local_intent() {
        let config = config();
        let world = demo_level();

        let mut client = spawn(&config, &world);
        client.wants_to_sprint = true;
        client.wants_to_crouch = true;
        let mut buffer = MoveBuffer::new(256);

        let server = spawn(&config, &world);
        let correction = ServerCorrection::from_state(1.0, &server);
        reconcile(&mut client, &mut buffer, &config, &world, &correction);

        assert!(client.wants_to_sprint);
        assert!(client.wants_to_crouch);
    }

    #[test]
    fn test_needs_correction_thresholds() {
        let world = demo_level();
        let config = config();
        let state = spawn(&config, &world);
        let correction = ServerCorrection::from_state(1.0, &state);

        let mut predicted = PredictedSnapshot {
            timestamp: 1.0,
            position: state.position,
            velocity: state.velocity,
            mode: WireMode::from_state(&state),
        };
        let (needed, error) = needs_correction(Some(&predicted), &correction);
        assert!(!needed);
        assert_eq!(error, 0.0);

        predicted.position.x += POSITION_THRESHOLD * 2.0;
        let (needed, _) = needs_correction(Some(&predicted), &correction);
        assert!(needed);

        predicted.position = state.position;
        predicted.mode = WireMode::Falling;
        let (needed, _) = needs_correction(Some(&predicted), &correction);
        assert!(needed, "mode mismatch must always correct");

        // No snapshot to compare: always correct
        let (needed, _) = needs_correction(None, &correction);
        assert!(needed);
    }

    #[test]
    fn test_history_lookup_drops_older_entries() {
        let world = demo_level();
        let config = config();
        let state = spawn(&config, &world);

        let mut history = PredictedHistory::default();
        for i in 1..=10 {
            history.record(i as f64 * 0.016, &state);
        }

        let found = history.take_at(5.0 * 0.016);
        assert!(found.is_some());
        // Everything at or before the ack is gone; later entries remain
        assert!(history.take_at(3.0 * 0.016).is_none());
        assert!(history.take_at(7.0 * 0.016).is_some());
    }
}
