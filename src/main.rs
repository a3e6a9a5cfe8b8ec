mod movement;
mod net;
mod prediction;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use movement::config::{MovementConfig, CLIENT_TIMESTEP};
use movement::simulate::{perform_move, MoveInput};
use movement::state::{CharacterState, Role};
use movement::world::{demo_level, StaticWorld};
use net::messages::{byte_to_yaw, ClientMessage, PhaseUpdate, PlayerSnapshot, ServerMessage};
use net::ServerConnection;
use prediction::replay::{needs_correction, reconcile, PredictedHistory};
use prediction::saved_move::{flags, MoveBuffer, SavedMove};
use prediction::SmoothCorrection;

/// How many moves of history the client keeps pending.
const MOVE_BUFFER_SIZE: usize = 256;

/// The locally-controlled, predicted character.
#[derive(Resource)]
struct LocalPlayer {
    state: CharacterState,
    buffer: MoveBuffer,
    history: PredictedHistory,
    correction: Option<SmoothCorrection>,
    /// Client game clock, the timestamp source for moves.
    clock: f64,
    phase: PhaseUpdate,
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self {
            state: CharacterState::default(),
            buffer: MoveBuffer::new(MOVE_BUFFER_SIZE),
            history: PredictedHistory::default(),
            correction: None,
            clock: 0.0,
            phase: PhaseUpdate::Countdown {
                seconds_remaining: 0.0,
            },
        }
    }
}

/// Mirrors of the other players, fed by broadcast snapshots. Never simulated,
/// only interpolated toward the latest snapshot.
#[derive(Resource, Default)]
struct RemotePlayers {
    players: HashMap<u32, RemoteMirror>,
}

struct RemoteMirror {
    position: Vec3,
    yaw: f32,
    target: PlayerSnapshot,
}

fn main() {
    let server_addr =
        std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:4000".to_string());

    let connection =
        ServerConnection::connect(&server_addr).expect("Failed to open client UDP socket");
    connection
        .send(&ClientMessage::Hello {
            name: "wallrunner".to_string(),
        })
        .expect("Failed to reach the server");

    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f32(
                CLIENT_TIMESTEP,
            ))),
            LogPlugin::default(),
        ))
        .insert_resource(connection)
        .insert_resource(MovementConfig::default())
        .insert_resource(demo_level())
        .insert_resource(LocalPlayer::default())
        .insert_resource(RemotePlayers::default())
        .add_systems(
            Update,
            (
                receive_server_messages,
                predict_local_movement,
                interpolate_remote_players,
                update_smooth_correction,
            )
                .chain(),
        )
        .run();
}

/// Drain the socket: corrections reconcile the local character, state
/// updates refresh the remote mirrors.
fn receive_server_messages(
    mut connection: ResMut<ServerConnection>,
    mut local: ResMut<LocalPlayer>,
    mut remotes: ResMut<RemotePlayers>,
    config: Res<MovementConfig>,
    world: Res<StaticWorld>,
) {
    for message in connection.poll() {
        match message {
            ServerMessage::Welcome { player_id } => {
                if connection.player_id.is_none() {
                    info!("joined as player {player_id}");
                }
                connection.player_id = Some(player_id);
            }
            ServerMessage::Correction { correction } => {
                let predicted = local.history.take_at(correction.ack_timestamp);
                let (correct, error) = needs_correction(predicted.as_ref(), &correction);
                if !correct {
                    local.buffer.acknowledge(correction.ack_timestamp);
                    continue;
                }

                debug!("correcting prediction, error {error}");
                let local = &mut *local;
                let offset = reconcile(
                    &mut local.state,
                    &mut local.buffer,
                    &config,
                    world.as_ref(),
                    &correction,
                );
                if offset.length_squared() > 1e-4 {
                    local.correction = Some(SmoothCorrection::start(offset));
                }
            }
            ServerMessage::StateUpdate { players } => {
                for snapshot in players {
                    let target_pos = Vec3::new(snapshot.x, snapshot.y, snapshot.z);
                    remotes
                        .players
                        .entry(snapshot.player_id)
                        .and_modify(|m| m.target = snapshot.clone())
                        .or_insert_with(|| RemoteMirror {
                            position: target_pos,
                            yaw: byte_to_yaw(snapshot.yaw),
                            target: snapshot,
                        });
                }
            }
            ServerMessage::Phase { phase } => {
                if local.phase != phase {
                    info!("match phase: {phase:?}");
                }
                local.phase = phase;
            }
            ServerMessage::CheckpointReached {
                player_id,
                checkpoint,
            } => {
                info!("player {player_id} reached checkpoint {checkpoint}");
            }
            ServerMessage::Pong | ServerMessage::Error { .. } => {}
        }
    }
}

/// A deterministic demo route: sprint toward the ledge, mantle it, then head
/// for the wall-run corridor. Stands in for a real input device.
fn scripted_input(state: &CharacterState, clock: f64) -> MoveInput {
    let mut packed = 0u8;

    // Toward the ledge first, then toward the corridor
    let target = if state.position.x < 550.0 && state.position.y < 800.0 {
        Vec3::new(750.0, 0.0, state.position.z)
    } else {
        Vec3::new(0.0, 2000.0, state.position.z)
    };
    let to_target = (target - state.position).with_z(0.0);
    let dir = to_target.normalize_or_zero();
    let look_yaw = dir.y.atan2(dir.x);

    packed |= flags::SPRINT;
    // Jump near the ledge face (mantle) and periodically in the corridor
    // (wall-run attempts)
    let near_ledge = state.position.x > 480.0 && state.position.x < 600.0;
    let in_corridor = state.position.y > 900.0;
    if near_ledge || (in_corridor && (clock * 2.0) as u64 % 4 == 0) {
        packed |= flags::JUMP;
    }

    MoveInput {
        acceleration: dir * 3000.0,
        look_yaw,
        compressed_flags: packed,
    }
}

/// Capture one move, predict it locally, ledger it and send the pending
/// window to the server.
fn predict_local_movement(
    connection: Res<ServerConnection>,
    mut local: ResMut<LocalPlayer>,
    config: Res<MovementConfig>,
    world: Res<StaticWorld>,
) {
    if connection.player_id.is_none() {
        return;
    }

    let local = &mut *local;
    local.clock += CLIENT_TIMESTEP as f64;
    let input = scripted_input(&local.state, local.clock);
    let saved = SavedMove::new(local.clock, CLIENT_TIMESTEP, &input);

    local.buffer.push(saved);
    let outcome = perform_move(
        &mut local.state,
        &config,
        world.as_ref(),
        &input,
        CLIENT_TIMESTEP,
        Role::AutonomousProxy,
    );
    local.history.record(local.clock, &local.state);

    if outcome.mantle_started {
        // A mantle discards the pending moves: the override is about to
        // rewrite our position wholesale, replaying them would fight it
        local.buffer.clear();
        if let Err(e) = connection.send(&ClientMessage::MantleRequest) {
            warn!("failed to send mantle request: {e}");
        }
    }

    let moves: Vec<SavedMove> = local.buffer.pending().copied().collect();
    if !moves.is_empty() {
        if let Err(e) = connection.send(&ClientMessage::PlayerMoves { moves }) {
            warn!("failed to send moves: {e}");
        }
    }
}

/// Ease remote mirrors toward their latest snapshot instead of snapping.
fn interpolate_remote_players(mut remotes: ResMut<RemotePlayers>) {
    // Close a fixed fraction of the gap each tick
    const LERP_FACTOR: f32 = 0.35;
    for mirror in remotes.players.values_mut() {
        let target = Vec3::new(mirror.target.x, mirror.target.y, mirror.target.z);
        mirror.position = mirror.position.lerp(target, LERP_FACTOR);
        mirror.yaw = byte_to_yaw(mirror.target.yaw);
    }
}

/// Decay the visual offset left behind by the last correction.
fn update_smooth_correction(mut local: ResMut<LocalPlayer>) {
    if let Some(correction) = local.correction.as_mut() {
        correction.update(CLIENT_TIMESTEP);
        if correction.is_complete() {
            local.correction = None;
        }
    }
}
