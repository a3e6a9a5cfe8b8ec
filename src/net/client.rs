use bevy::prelude::*;
use std::io;
use std::net::UdpSocket;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::net::messages::{ClientMessage, ServerMessage};

/// Client side of the UDP link.
///
/// A background thread blocks on the socket and pushes every decoded server
/// message onto a channel; the game loop drains it once per tick with
/// [`ServerConnection::poll`]. Sends go straight out on the shared socket.
#[derive(Resource)]
pub struct ServerConnection {
    socket: Arc<UdpSocket>,
    incoming: Mutex<Receiver<ServerMessage>>,
    pub player_id: Option<u32>,
}

impl ServerConnection {
    pub fn connect(server_addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(server_addr)?;
        let socket = Arc::new(socket);

        let (sender, receiver) = channel::<ServerMessage>();
        spawn_listener(Arc::clone(&socket), sender);

        Ok(Self {
            socket,
            incoming: Mutex::new(receiver),
            player_id: None,
        })
    }

    pub fn send(&self, message: &ClientMessage) -> io::Result<()> {
        let mut payload = serde_json::to_string(message)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        payload.push('\n');
        self.socket.send(payload.as_bytes())?;
        Ok(())
    }

    /// All server messages that arrived since the last poll.
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        if let Ok(receiver) = self.incoming.lock() {
            while let Ok(message) = receiver.try_recv() {
                messages.push(message);
            }
        }
        messages
    }
}

fn spawn_listener(socket: Arc<UdpSocket>, sender: Sender<ServerMessage>) {
    std::thread::spawn(move || {
        let mut buf = [0u8; 65536];
        loop {
            match socket.recv(&mut buf) {
                Ok(len) => {
                    let Ok(text) = std::str::from_utf8(&buf[..len]) else {
                        continue;
                    };
                    // Datagrams may carry several newline-delimited messages
                    for line in text.lines() {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ServerMessage>(trimmed) {
                            Ok(message) => {
                                if sender.send(message).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!("dropping malformed server message: {e}; raw={trimmed}");
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("client socket recv error: {e}");
                    return;
                }
            }
        }
    });
}
