// Shared simulation and protocol modules
#[path = "../movement/mod.rs"]
mod movement;
#[path = "../net/messages.rs"]
mod messages;
#[path = "../prediction/mod.rs"]
mod prediction;

// Server modules
mod checkpoints;
mod match_flow;
mod net;
mod simulation;
mod types;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use checkpoints::{track_checkpoints_system, CheckpointTrack};
use match_flow::{countdown_system, MatchPhase};
use movement::config::{MovementConfig, SERVER_TIMESTEP};
use movement::world::demo_level;
use net::server_listener;
use simulation::*;
use types::*;

/// Get the local IP address for display purposes
fn get_local_ip() -> Result<String, Box<dyn std::error::Error>> {
    let socket: UdpSocket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    let local_addr = socket.local_addr()?;
    Ok(local_addr.ip().to_string())
}

fn main() {
    // Display the local IP address
    match get_local_ip() {
        Ok(ip) => println!("Server running on {}:4000", ip),
        Err(e) => println!(
            "Server running on 0.0.0.0:4000 (Could not determine local IP: {})",
            e
        ),
    }

    // Bind UDP socket
    let socket = UdpSocket::bind("0.0.0.0:4000").expect("Failed to bind UDP socket to port 4000");
    println!("UDP server listening on 0.0.0.0:4000");
    let socket = Arc::new(socket);

    // Set up shared resources for networking
    let connected_clients = ConnectedClients::new(Arc::clone(&socket));
    let inboxes: SharedInboxes = Arc::new(Mutex::new(HashMap::new()));

    // Create command channel for the networking thread to talk to Bevy
    let (cmd_sender, cmd_receiver) = std::sync::mpsc::channel::<ServerCommand>();
    let cmd_sender = Arc::new(Mutex::new(cmd_sender));
    let cmd_receiver = Arc::new(Mutex::new(cmd_receiver));

    // Initialize Bevy's task pools
    bevy::tasks::IoTaskPool::get_or_init(|| bevy::tasks::TaskPool::new());

    // Clone for the listener task
    let connected_clients_clone = ConnectedClients {
        ids: Arc::clone(&connected_clients.ids),
        addrs: Arc::clone(&connected_clients.addrs),
        addr_to_id: Arc::clone(&connected_clients.addr_to_id),
        last_seen: Arc::clone(&connected_clients.last_seen),
        socket: Arc::clone(&socket),
    };
    let inboxes_clone = Arc::clone(&inboxes);

    // Start the UDP listener in a separate task
    server_listener(
        connected_clients_clone,
        inboxes_clone,
        Arc::clone(&cmd_sender),
    );

    // Headless authoritative server at the fixed net tick
    // Using Update schedule since run_loop already controls the rate
    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f32(
                SERVER_TIMESTEP,
            ))),
            LogPlugin::default(),
        ))
        .insert_resource(connected_clients)
        .insert_resource(Inboxes { map: inboxes })
        .insert_resource(PlayerEntities::default())
        .insert_resource(MovementConfig::default())
        .insert_resource(demo_level())
        .insert_resource(CheckpointTrack::demo_course())
        .insert_resource(MatchPhase::default())
        .insert_resource(ServerCommandReceiver {
            receiver: cmd_receiver,
        })
        .insert_resource(ServerCommandSender { sender: cmd_sender })
        .add_systems(
            Update,
            (
                process_server_commands_system,
                countdown_system,
                consume_inboxes_system,
                track_checkpoints_system,
                broadcast_state_system,
                timeout_cleanup_system,
            )
                .chain(),
        )
        .run();
}
