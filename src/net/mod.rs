// Wire protocol and client transport: newline-delimited JSON over UDP.

pub mod client;
pub mod messages;

pub use client::ServerConnection;
pub use messages::{ClientMessage, PhaseUpdate, PlayerSnapshot, ServerMessage};
