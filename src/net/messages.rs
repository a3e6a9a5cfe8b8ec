use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::prediction::replay::{ServerCorrection, WireMode};
use crate::prediction::saved_move::SavedMove;

/// Compress a yaw angle to one byte (~1.4 degree granularity). Plenty for
/// orienting remote player models.
pub fn yaw_to_byte(yaw: f32) -> u8 {
    (yaw.rem_euclid(TAU) / TAU * 256.0) as u8
}

pub fn byte_to_yaw(byte: u8) -> f32 {
    byte as f32 / 256.0 * TAU
}

// Messages from clients
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Hello { name: String },
    /// Batched unacknowledged moves, oldest first. Resending the whole
    /// pending window makes individual packet loss harmless.
    PlayerMoves { moves: Vec<SavedMove> },
    /// The client predicted a mantle; the server re-resolves and either
    /// confirms with a correction or rejects the same way.
    MantleRequest,
    Ping,
}

/// One remote player as seen in a broadcast state update.
///
/// Cosmetic flags ride along so remote mirrors can pose (slide, mantle)
/// without ever simulating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub mode: WireMode,
    pub yaw: u8,
    pub is_sliding: bool,
    pub is_crouching: bool,
    pub is_mantling: bool,
}

/// Match phases, broadcast so clients can gate their input handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PhaseUpdate {
    Countdown { seconds_remaining: f32 },
    Running,
    Finished { winner: u32 },
}

// Messages from the server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Welcome {
        player_id: u32,
    },
    /// Broadcast snapshot of everyone else. The recipient's own character is
    /// excluded; the owner hears about itself through corrections.
    StateUpdate {
        players: Vec<PlayerSnapshot>,
    },
    /// Authoritative result for the recipient's own moves.
    Correction {
        correction: ServerCorrection,
    },
    Phase {
        phase: PhaseUpdate,
    },
    CheckpointReached {
        player_id: u32,
        checkpoint: usize,
    },
    Pong,
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaw_byte_round_trip_accuracy() {
        for i in 0..64 {
            let yaw = i as f32 * 0.1;
            let restored = byte_to_yaw(yaw_to_byte(yaw));
            let error = (restored - yaw.rem_euclid(TAU)).abs();
            assert!(error < TAU / 256.0 + 1e-4, "yaw {yaw} error {error}");
        }
    }

    #[test]
    fn test_negative_yaw_wraps() {
        let byte = yaw_to_byte(-0.1);
        let restored = byte_to_yaw(byte);
        assert!((restored - (TAU - 0.1)).abs() < TAU / 256.0 + 1e-4);
    }

    #[test]
    fn test_client_message_wire_format() {
        let json = serde_json::to_string(&ClientMessage::MantleRequest).unwrap();
        assert!(json.contains("\"type\":\"MantleRequest\""));

        let parsed: ClientMessage =
            serde_json::from_str("{\"type\":\"Hello\",\"name\":\"runner\"}").unwrap();
        match parsed {
            ClientMessage::Hello { name } => assert_eq!(name, "runner"),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_server_message_round_trip() {
        let msg = ServerMessage::Phase {
            phase: PhaseUpdate::Countdown {
                seconds_remaining: 2.5,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMessage::Phase {
                phase: PhaseUpdate::Countdown { seconds_remaining },
            } => assert!((seconds_remaining - 2.5).abs() < 1e-6),
            other => panic!("unexpected message {other:?}"),
        }
    }
}
