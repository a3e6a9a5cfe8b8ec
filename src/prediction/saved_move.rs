use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::movement::simulate::MoveInput;

/// Bit layout of the compressed intent flags carried by every move.
///
/// Jump and crouch take the low bits; two reserved bits sit between them and
/// the extension flags so the layout can grow without renumbering.
pub mod flags {
    pub const JUMP: u8 = 1 << 0;
    pub const CROUCH: u8 = 1 << 1;
    pub const RESERVED_1: u8 = 1 << 2;
    pub const RESERVED_2: u8 = 1 << 3;
    pub const SPRINT: u8 = 1 << 4;
    pub const SLIDE: u8 = 1 << 5;
}

/// One recorded client move: everything needed to replay the tick later.
///
/// The timestamp doubles as the acknowledgment key; the server echoes the
/// newest timestamp it consumed and the client drops everything at or before
/// it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SavedMove {
    /// Client game time when the move was produced, seconds.
    pub timestamp: f64,
    pub delta_time: f32,
    pub acceleration_x: f32,
    pub acceleration_y: f32,
    pub acceleration_z: f32,
    pub look_yaw: f32,
    pub compressed_flags: u8,
}

impl SavedMove {
    pub fn new(timestamp: f64, delta_time: f32, input: &MoveInput) -> Self {
        Self {
            timestamp,
            delta_time,
            acceleration_x: input.acceleration.x,
            acceleration_y: input.acceleration.y,
            acceleration_z: input.acceleration.z,
            look_yaw: input.look_yaw,
            compressed_flags: input.compressed_flags,
        }
    }

    pub fn input(&self) -> MoveInput {
        MoveInput {
            acceleration: Vec3::new(
                self.acceleration_x,
                self.acceleration_y,
                self.acceleration_z,
            ),
            look_yaw: self.look_yaw,
            compressed_flags: self.compressed_flags,
        }
    }
}

/// Timestamp-ordered ledger of unacknowledged moves.
///
/// Prediction pushes every local move here before applying it; a server
/// correction acknowledges a prefix and the remainder gets replayed on top
/// of the corrected state.
pub struct MoveBuffer {
    buffer: VecDeque<SavedMove>,
    max_size: usize,
}

impl MoveBuffer {
    /// Two seconds of moves at the client rate is plenty of headroom for a
    /// slow round trip.
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, saved: SavedMove) {
        debug_assert!(
            self.buffer
                .back()
                .map(|last| last.timestamp < saved.timestamp)
                .unwrap_or(true),
            "moves must be pushed in timestamp order"
        );
        self.buffer.push_back(saved);
        if self.buffer.len() > self.max_size {
            self.buffer.pop_front();
        }
    }

    /// Drop every move at or before the acknowledged timestamp.
    pub fn acknowledge(&mut self, timestamp: f64) {
        while self
            .buffer
            .front()
            .map(|m| m.timestamp <= timestamp)
            .unwrap_or(false)
        {
            self.buffer.pop_front();
        }
    }

    /// Moves still awaiting acknowledgment, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &SavedMove> {
        self.buffer.iter()
    }

    /// Drop everything, acknowledged or not. Used when a server-confirmed
    /// mantle makes the pending moves meaningless.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn move_at(timestamp: f64) -> SavedMove {
        SavedMove::new(timestamp, 1.0 / 60.0, &MoveInput::default())
    }

    #[test]
    fn test_acknowledge_drops_prefix() {
        let mut buffer = MoveBuffer::new(16);
        for i in 0..5 {
            buffer.push(move_at(i as f64 * 0.016));
        }

        buffer.acknowledge(0.032);

        assert_eq!(buffer.len(), 2);
        let first = buffer.pending().next().unwrap();
        assert!(first.timestamp > 0.032);
    }

    #[test]
    fn test_acknowledge_unknown_timestamp_keeps_later_moves() {
        let mut buffer = MoveBuffer::new(16);
        buffer.push(move_at(0.016));
        buffer.push(move_at(0.032));

        // Ack between two moves: only the earlier one goes
        buffer.acknowledge(0.020);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_buffer_caps_at_max_size() {
        let mut buffer = MoveBuffer::new(4);
        for i in 0..10 {
            buffer.push(move_at(i as f64 * 0.016));
        }
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_flags_round_trip_through_saved_move() {
        let input = MoveInput {
            acceleration: Vec3::new(1.0, 2.0, 0.0),
            look_yaw: 0.5,
            compressed_flags: flags::JUMP | flags::SLIDE,
        };
        let saved = SavedMove::new(1.5, 1.0 / 60.0, &input);
        let restored = saved.input();

        assert_eq!(restored.acceleration, input.acceleration);
        assert_eq!(restored.look_yaw, input.look_yaw);
        assert_eq!(restored.compressed_flags, input.compressed_flags);
    }
}
