use bevy::tasks::IoTaskPool;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::messages::{ClientMessage, ServerMessage};
use crate::types::*;

/// Spawn the UDP listener task that handles incoming client messages
pub fn server_listener(
    connected_clients: ConnectedClients,
    inboxes: SharedInboxes,
    cmd_sender: Arc<Mutex<std::sync::mpsc::Sender<ServerCommand>>>,
) {
    let task_pool = IoTaskPool::get();
    task_pool
        .spawn(async move {
            let mut next_id: u32 = 1;
            let mut buf = [0u8; 65536]; // UDP buffer

            loop {
                match connected_clients.socket.recv_from(&mut buf) {
                    Ok((len, addr)) => {
                        let data = &buf[..len];

                        let Ok(message_str) = std::str::from_utf8(data) else {
                            continue;
                        };
                        let trimmed = message_str.trim();
                        if trimmed.is_empty() {
                            continue;
                        }

                        // Get or assign client ID
                        let client_id = {
                            let mut addr_to_id = connected_clients.addr_to_id.lock().unwrap();

                            if let Some(&id) = addr_to_id.get(&addr) {
                                // Update last seen time
                                if let Ok(mut last_seen) = connected_clients.last_seen.lock() {
                                    last_seen.insert(id, Instant::now());
                                }
                                id
                            } else {
                                // New client
                                let id = next_id;
                                next_id += 1;

                                addr_to_id.insert(addr, id);

                                if let Ok(mut addrs) = connected_clients.addrs.lock() {
                                    addrs.insert(id, addr);
                                }
                                if let Ok(mut ids) = connected_clients.ids.lock() {
                                    ids.push(id);
                                }
                                if let Ok(mut last_seen) = connected_clients.last_seen.lock() {
                                    last_seen.insert(id, Instant::now());
                                }
                                if let Ok(mut map) = inboxes.lock() {
                                    map.insert(id, PlayerInbox::default());
                                }

                                println!("New client {} from {}", id, addr);

                                let _ = send_to_client(
                                    id,
                                    &connected_clients,
                                    &ServerMessage::Welcome { player_id: id },
                                );

                                let sender = cmd_sender.lock().unwrap();
                                let _ = sender.send(ServerCommand::SpawnPlayer { player_id: id });

                                id
                            }
                        };

                        // Parse and handle message
                        match serde_json::from_str::<ClientMessage>(trimmed) {
                            Ok(message) => {
                                if let Err(e) = handle_client_message(
                                    client_id,
                                    message,
                                    &connected_clients,
                                    &inboxes,
                                ) {
                                    eprintln!(
                                        "handle_client_message error for {}: {}",
                                        client_id, e
                                    );
                                }
                            }
                            Err(e) => {
                                eprintln!(
                                    "JSON parse error from {}: {}; raw={}",
                                    client_id, e, trimmed
                                );
                                let _ = send_to_client(
                                    client_id,
                                    &connected_clients,
                                    &ServerMessage::Error {
                                        message: "invalid_json".to_string(),
                                    },
                                );
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("recv_from error: {}", e);
                    }
                }
            }
        })
        .detach();
}

/// Handle incoming message from a client
fn handle_client_message(
    id: u32,
    message: ClientMessage,
    connected_clients: &ConnectedClients,
    inboxes: &SharedInboxes,
) -> io::Result<()> {
    match message {
        ClientMessage::Hello { name } => {
            println!("Client {} identifies as '{}'", id, name);
            let _ = send_to_client(
                id,
                connected_clients,
                &ServerMessage::Welcome { player_id: id },
            );
            Ok(())
        }

        ClientMessage::PlayerMoves { moves } => {
            let mut guard = inboxes.lock().unwrap();
            let Some(inbox) = guard.get_mut(&id) else {
                return Ok(());
            };

            // Clients resend their whole pending window; keep only moves we
            // have not simulated and have not already queued
            for saved in moves {
                if saved.timestamp <= inbox.last_ack {
                    continue;
                }
                if inbox
                    .moves
                    .iter()
                    .any(|m| (m.timestamp - saved.timestamp).abs() < 1e-9)
                {
                    continue;
                }
                inbox.moves.push(saved);
            }

            // Sort by timestamp to ensure correct order
            inbox
                .moves
                .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            Ok(())
        }

        ClientMessage::MantleRequest => {
            let mut guard = inboxes.lock().unwrap();
            if let Some(inbox) = guard.get_mut(&id) {
                inbox.mantle_requested = true;
            }
            Ok(())
        }

        ClientMessage::Ping => {
            let _ = send_to_client(id, connected_clients, &ServerMessage::Pong);
            Ok(())
        }
    }
}

/// Send a message to a specific client
pub fn send_to_client(
    id: u32,
    connected_clients: &ConnectedClients,
    message: &ServerMessage,
) -> io::Result<()> {
    let payload = match serde_json::to_string(message) {
        Ok(json) => json + "\n",
        Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    };
    if let Some(addr) = connected_clients.addrs.lock().unwrap().get(&id).copied() {
        connected_clients.socket.send_to(payload.as_bytes(), addr)?;
    }
    Ok(())
}
