use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use socketio_transport_core::{HandshakeData, ProtocolVersion, ServerVersion};
use tracing::{debug, warn};

use crate::config::TransportConfig;

/// Opaque identity of one transport instance.
///
/// The manager coordinates the transport upgrade by ownership token: it
/// stores the id of the transport currently being probed in the session, and
/// each transport compares its own id against that token. Nothing holds a
/// mutable back-pointer to a transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

impl TransportId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared per-connection context owned by the manager and read by its
/// transports: the connection URI, the negotiated protocol revisions, the
/// session id learned from the handshake, and the upgrade-candidate token.
pub struct Session {
    base_uri: String,
    protocol: ProtocolVersion,
    config: TransportConfig,
    sid: Mutex<Option<String>>,
    server_version: Mutex<ServerVersion>,
    upgrading: Mutex<Option<TransportId>>,
}

impl Session {
    pub fn new(
        base_uri: impl Into<String>,
        protocol: ProtocolVersion,
        config: TransportConfig,
    ) -> Self {
        let server_version = config.server_version;
        Self {
            base_uri: base_uri.into(),
            protocol,
            config,
            sid: Mutex::new(None),
            server_version: Mutex::new(server_version),
            upgrading: Mutex::new(None),
        }
    }

    /// The base URL transports derive their connection URI from.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The session id assigned by the server. Absent until the first
    /// handshake completes.
    pub fn sid(&self) -> Option<String> {
        self.sid.lock().unwrap().clone()
    }

    /// Record the handshake carried by an `Open` envelope payload. An
    /// unreadable payload is logged and ignored.
    pub fn apply_handshake(&self, payload: &str) {
        match HandshakeData::from_payload(payload) {
            Ok(data) => {
                debug!(sid = %data.sid, "handshake recorded");
                *self.sid.lock().unwrap() = Some(data.sid);
            }
            Err(e) => warn!("ignoring unreadable handshake payload: {e}"),
        }
    }

    pub fn server_version(&self) -> ServerVersion {
        *self.server_version.lock().unwrap()
    }

    /// Override the socket.io server revision for this session.
    pub fn set_server_version(&self, version: ServerVersion) {
        *self.server_version.lock().unwrap() = version;
    }

    /// The attachment framing to apply to incoming binary frames.
    ///
    /// When the server revision was never negotiated this defaults to v2
    /// framing, logs a configuration warning and pins the choice into the
    /// session so subsequent frames do not re-detect.
    pub fn attachment_framing(&self) -> ServerVersion {
        let mut version = self.server_version.lock().unwrap();
        if *version == ServerVersion::Unknown {
            warn!("server version not negotiated, assuming v2 attachment framing for this session");
            *version = ServerVersion::V2;
        }
        *version
    }

    /// Designate the transport currently probing a better connection, or
    /// clear the designation with `None`. Owned by the manager.
    pub fn set_upgrading(&self, candidate: Option<TransportId>) {
        *self.upgrading.lock().unwrap() = candidate;
    }

    /// Whether the given transport is the current upgrade candidate.
    pub fn is_upgrading(&self, id: TransportId) -> bool {
        *self.upgrading.lock().unwrap() == Some(id)
    }

    /// Clear the upgrade designation if it is held by the given transport.
    /// Returns whether it was.
    pub fn clear_upgrading(&self, id: TransportId) -> bool {
        let mut upgrading = self.upgrading.lock().unwrap();
        if *upgrading == Some(id) {
            *upgrading = None;
            true
        } else {
            false
        }
    }
}
