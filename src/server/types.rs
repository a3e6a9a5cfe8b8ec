use bevy::prelude::*;
use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::prediction::saved_move::SavedMove;

// Track connected clients
#[derive(Clone, Resource)]
pub struct ConnectedClients {
    pub ids: Arc<Mutex<Vec<u32>>>,
    pub addrs: Arc<Mutex<HashMap<u32, SocketAddr>>>,
    pub addr_to_id: Arc<Mutex<HashMap<SocketAddr, u32>>>,
    pub last_seen: Arc<Mutex<HashMap<u32, Instant>>>,
    pub socket: Arc<UdpSocket>,
}

impl ConnectedClients {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self {
            ids: Arc::new(Mutex::new(Vec::new())),
            addrs: Arc::new(Mutex::new(HashMap::new())),
            addr_to_id: Arc::new(Mutex::new(HashMap::new())),
            last_seen: Arc::new(Mutex::new(HashMap::new())),
            socket,
        }
    }
}

/// Per-player inbox filled by the listener thread and drained by the
/// simulation tick.
#[derive(Debug, Default)]
pub struct PlayerInbox {
    /// Pending moves, not yet simulated. Kept timestamp-sorted; the listener
    /// discards anything at or before `last_ack`.
    pub moves: Vec<SavedMove>,
    /// Newest move timestamp folded into the authoritative state.
    pub last_ack: f64,
    /// A mantle request is waiting for server-side resolution.
    pub mantle_requested: bool,
}

pub type SharedInboxes = Arc<Mutex<HashMap<u32, PlayerInbox>>>;

// Resource wrapper for the shared inboxes
#[derive(Resource, Clone)]
pub struct Inboxes {
    pub map: SharedInboxes,
}

// ECS components for the server simulation
#[derive(Component)]
pub struct PlayerId(pub u32);

// Map player IDs to their entity in the ECS
#[derive(Resource, Default)]
pub struct PlayerEntities {
    pub map: HashMap<u32, Entity>,
}

// Commands from the networking thread to Bevy systems
#[derive(Debug, Clone)]
pub enum ServerCommand {
    SpawnPlayer { player_id: u32 },
    DespawnPlayer { player_id: u32 },
}

// Resource for receiving commands in Bevy systems
#[derive(Resource)]
pub struct ServerCommandReceiver {
    pub receiver: Arc<Mutex<std::sync::mpsc::Receiver<ServerCommand>>>,
}

// Resource for sending commands from Bevy systems
#[derive(Resource)]
pub struct ServerCommandSender {
    pub sender: Arc<Mutex<std::sync::mpsc::Sender<ServerCommand>>>,
}
