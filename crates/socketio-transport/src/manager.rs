use socketio_transport_core::Packet;

use crate::session::TransportId;

/// The callback surface a connection manager exposes to its transports.
///
/// The transport only signals; every policy decision (promotion of a probed
/// transport, retry and backoff after a failure, reconnection after a normal
/// closure) belongs to the manager.
pub trait Manager: Send + Sync + 'static {
    /// A fully reassembled (or attachment-free) packet ready for the
    /// application layer.
    fn on_packet(&self, packet: Packet);

    /// The given transport answered the upgrade probe and may be promoted.
    fn on_transport_probed(&self, transport: TransportId);

    /// The given transport failed (abnormal closure or connection failure).
    /// The manager owns the retry policy; the transport never retries on its
    /// own.
    fn on_transport_error(&self, transport: TransportId, message: &str);

    /// A non-candidate transport closed normally; the manager may attempt to
    /// reconnect.
    fn try_to_reconnect(&self);
}
