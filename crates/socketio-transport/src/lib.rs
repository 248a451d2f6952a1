//! Client-side websocket transport engine for the Engine.IO/Socket.IO
//! protocol.
//!
//! A [`WebSocketTransport`] owns one underlying socket connection and drives
//! an explicit lifecycle state machine: it performs the probe/upgrade
//! handshake, multiplexes text envelopes and binary attachment frames, and
//! reports packets, probe confirmations, errors and closures to a connection
//! manager through the [`Manager`] callback surface. Reconnection policy,
//! heartbeats and payload semantics stay with the manager.

pub mod config;
pub mod errors;
pub mod manager;
pub mod session;
pub mod transport;

pub use config::TransportConfig;
pub use errors::Error;
pub use manager::Manager;
pub use session::{Session, TransportId};
pub use socketio_transport_core::{
    HandshakeData, Packet, PacketBuf, ProtocolVersion, ServerVersion, TransportType,
};
pub use transport::{Transport, TransportState, ws::WebSocketTransport};
