//! The transport capability contract a connection manager drives, and its
//! websocket implementation.

use socketio_transport_core::{Packet, PacketBuf, TransportType};

pub mod ws;

/// The lifecycle state of one transport instance. Strictly owned by that
/// instance; state only moves through the transitions of its state machine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransportState {
    Closed,
    Connecting,
    Opening,
    Open,
    /// Suppressed while a replacement transport takes over; outbound traffic
    /// is refused but the connection stays up.
    Paused,
}

/// The capability contract between a connection manager and a transport.
pub trait Transport {
    fn transport_type(&self) -> TransportType;

    fn state(&self) -> TransportState;

    /// Establish the underlying connection. No-op unless the transport is
    /// currently [`TransportState::Closed`].
    fn open(&self);

    /// Suppress outbound traffic while a replacement transport takes over.
    fn pause(&self);

    /// Release the underlying connection. Idempotent.
    fn close(&self);

    /// Poll the server for buffered packets. Meaningful for polling
    /// transports only; socket transports receive frames as they arrive.
    fn poll(&self);

    /// Send one packet. Refused (with a log, not an error) while the
    /// transport is [`TransportState::Closed`] or [`TransportState::Paused`].
    fn send(&self, packet: Packet);

    /// Send a batch of packets in order, then clear the caller's buffer to
    /// signal that it has been consumed. When sending is refused the buffer
    /// is left untouched.
    fn send_all(&self, packets: &mut PacketBuf);

    /// Whether an HTTP request is currently in flight. Always `false` for
    /// socket transports.
    fn is_request_in_progress(&self) -> bool;

    /// Whether a long-poll cycle is currently in flight. Always `false` for
    /// socket transports.
    fn is_polling_in_progress(&self) -> bool;
}
