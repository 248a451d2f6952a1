//! Wire-level types for the socket.io client transport engine.
//!
//! This crate carries everything needed to translate between the
//! Engine.IO/Socket.IO text envelope and a structured [`Packet`], plus the
//! small protocol enums shared between transports and their manager. It
//! performs no IO: the transport crates drive sockets and feed frames in.

pub mod handshake;
pub mod packet;
pub mod protocol;

pub use handshake::HandshakeData;
pub use packet::{Packet, PacketBuf, PacketParseError, SocketIOEvent, TransportEvent};
pub use protocol::{ProtocolVersion, ServerVersion, TransportType};
