use bevy::prelude::*;
use std::time::{Duration, Instant};

use crate::checkpoints::CheckpointProgress;
use crate::match_flow::{choose_spawn, MatchPhase};
use crate::messages::{yaw_to_byte, PlayerSnapshot, ServerMessage};
use crate::movement::config::MovementConfig;
use crate::movement::mantle::{can_start_mantle, do_mantle, try_find_mantle_location};
use crate::movement::simulate::perform_move;
use crate::movement::state::{CharacterState, CustomMode, MovementMode, Role};
use crate::movement::world::StaticWorld;
use crate::net::send_to_client;
use crate::prediction::replay::{ServerCorrection, WireMode};
use crate::prediction::saved_move::SavedMove;
use crate::types::*;

/// Clients are dropped after this long without a packet.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest single move a client may submit; anything bigger is a clock bug
/// or an exploit attempt and gets clamped.
const MAX_MOVE_DELTA: f32 = 0.1;

/// Spawn and despawn player entities for the networking thread.
pub fn process_server_commands_system(
    mut commands: Commands,
    receiver: Res<ServerCommandReceiver>,
    mut entities: ResMut<PlayerEntities>,
    phase: Res<MatchPhase>,
    config: Res<MovementConfig>,
    players: Query<&CharacterState>,
) {
    let drained: Vec<ServerCommand> = {
        let guard = receiver.receiver.lock().unwrap();
        guard.try_iter().collect()
    };

    for command in drained {
        match command {
            ServerCommand::SpawnPlayer { player_id } => {
                if entities.map.contains_key(&player_id) {
                    continue;
                }
                let occupied: Vec<Vec3> = players.iter().map(|s| s.position).collect();
                let spawn = choose_spawn(&occupied, config.capsule_half_height);

                let mut state = CharacterState::at(spawn);
                // Joining during the countdown means waiting it out in place
                if matches!(*phase, MatchPhase::Countdown { .. }) {
                    state.set_movement_mode(MovementMode::Custom, CustomMode::Rooted);
                }

                info!("spawning player {} at {}", player_id, spawn);
                let entity = commands
                    .spawn((PlayerId(player_id), state, CheckpointProgress::default()))
                    .id();
                entities.map.insert(player_id, entity);
            }
            ServerCommand::DespawnPlayer { player_id } => {
                if let Some(entity) = entities.map.remove(&player_id) {
                    info!("despawning player {}", player_id);
                    commands.entity(entity).despawn();
                }
            }
        }
    }
}

/// Drain every player's inbox and run their moves through the shared
/// movement pipeline with full authority.
pub fn consume_inboxes_system(
    inboxes: Res<Inboxes>,
    config: Res<MovementConfig>,
    world: Res<StaticWorld>,
    mut players: Query<(&PlayerId, &mut CharacterState)>,
) {
    for (id, mut state) in players.iter_mut() {
        let (moves, mantle_requested): (Vec<SavedMove>, bool) = {
            let mut guard = inboxes.map.lock().unwrap();
            let Some(inbox) = guard.get_mut(&id.0) else {
                continue;
            };
            (
                std::mem::take(&mut inbox.moves),
                std::mem::take(&mut inbox.mantle_requested),
            )
        };

        // A requested mantle is re-resolved from the authoritative state; a
        // client cannot talk us onto a ledge the solver rejects
        if mantle_requested && can_start_mantle(&state) {
            let info = try_find_mantle_location(&state, &config, world.as_ref());
            if info.can_mantle {
                do_mantle(&mut state, &info);
            } else {
                warn!("rejecting mantle request from player {}", id.0);
            }
        }

        let mut last_ack = 0.0_f64;
        for saved in &moves {
            let dt = saved.delta_time.clamp(0.0, MAX_MOVE_DELTA);
            perform_move(
                &mut state,
                &config,
                world.as_ref(),
                &saved.input(),
                dt,
                Role::Authority,
            );
            last_ack = saved.timestamp;
        }

        if last_ack > 0.0 {
            let mut guard = inboxes.map.lock().unwrap();
            if let Some(inbox) = guard.get_mut(&id.0) {
                inbox.last_ack = inbox.last_ack.max(last_ack);
            }
        }
    }
}

/// Send each client its own correction and a snapshot of everyone else.
pub fn broadcast_state_system(
    inboxes: Res<Inboxes>,
    connected_clients: Res<ConnectedClients>,
    players: Query<(&PlayerId, &CharacterState)>,
) {
    let all: Vec<(u32, &CharacterState)> = players.iter().map(|(id, s)| (id.0, s)).collect();

    for &(owner, state) in &all {
        let ack = {
            let guard = inboxes.map.lock().unwrap();
            guard.get(&owner).map(|i| i.last_ack).unwrap_or(0.0)
        };
        if ack > 0.0 {
            let correction = ServerMessage::Correction {
                correction: ServerCorrection::from_state(ack, state),
            };
            let _ = send_to_client(owner, &connected_clients, &correction);
        }

        // Everyone else, cosmetics included; the owner is skipped because
        // corrections already cover their own character
        let others: Vec<PlayerSnapshot> = all
            .iter()
            .filter(|(id, _)| *id != owner)
            .map(|&(id, s)| PlayerSnapshot {
                player_id: id,
                x: s.position.x,
                y: s.position.y,
                z: s.position.z,
                vx: s.velocity.x,
                vy: s.velocity.y,
                vz: s.velocity.z,
                mode: WireMode::from_state(s),
                yaw: yaw_to_byte(s.look_yaw),
                is_sliding: s.is_sliding,
                is_crouching: s.is_crouching,
                is_mantling: s.is_mantling,
            })
            .collect();
        let _ = send_to_client(
            owner,
            &connected_clients,
            &ServerMessage::StateUpdate { players: others },
        );
    }
}

/// Forget clients that stopped talking to us.
pub fn timeout_cleanup_system(
    connected_clients: Res<ConnectedClients>,
    inboxes: Res<Inboxes>,
    sender: Res<ServerCommandSender>,
) {
    let now = Instant::now();
    let stale: Vec<u32> = {
        let last_seen = connected_clients.last_seen.lock().unwrap();
        last_seen
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > CLIENT_TIMEOUT)
            .map(|(id, _)| *id)
            .collect()
    };

    for id in stale {
        println!("Client {} timed out", id);
        connected_clients.last_seen.lock().unwrap().remove(&id);
        connected_clients.ids.lock().unwrap().retain(|&i| i != id);
        if let Some(addr) = connected_clients.addrs.lock().unwrap().remove(&id) {
            connected_clients.addr_to_id.lock().unwrap().remove(&addr);
        }
        inboxes.map.lock().unwrap().remove(&id);

        let guard = sender.sender.lock().unwrap();
        let _ = guard.send(ServerCommand::DespawnPlayer { player_id: id });
    }
}
