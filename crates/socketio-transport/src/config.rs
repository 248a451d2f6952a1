use std::fmt;
use std::sync::Arc;

use http::Request;
use socketio_transport_core::ServerVersion;

/// Hook invoked once per socket creation on the websocket handshake request,
/// before the connection is established.
pub type RequestCustomizer = Arc<dyn Fn(&mut Request<()>) + Send + Sync>;

/// Per-session transport configuration, supplied by the connection manager.
#[derive(Clone)]
pub struct TransportConfig {
    /// Extra query parameters appended to the connection URI. Values are
    /// appended as provided; callers pre-encode them.
    pub query_params: Vec<(String, String)>,

    /// When set, the extra query parameters are only appended to the very
    /// first connection attempt (the handshake), not to reconnections that
    /// already carry a session id.
    ///
    /// Defaults to `false`.
    pub query_params_only_for_handshake: bool,

    /// The socket.io server revision, seeding the session's attachment
    /// framing cell. Leave [`ServerVersion::Unknown`] to let the session
    /// default to v2 framing on first use.
    pub server_version: ServerVersion,

    /// Optional hook to customize the websocket handshake request (extra
    /// headers, cookies). Invoked once per socket creation.
    pub request_customizer: Option<RequestCustomizer>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            query_params: Vec::new(),
            query_params_only_for_handshake: false,
            server_version: ServerVersion::Unknown,
            request_customizer: None,
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("query_params", &self.query_params)
            .field(
                "query_params_only_for_handshake",
                &self.query_params_only_for_handshake,
            )
            .field("server_version", &self.server_version)
            .field("request_customizer", &self.request_customizer.is_some())
            .finish()
    }
}

impl TransportConfig {
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::new()
    }
}

pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Append one extra query parameter to the connection URI.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.query_params.push((key.into(), value.into()));
        self
    }

    /// Only send the extra query parameters with the handshake attempt.
    pub fn query_params_only_for_handshake(mut self, only: bool) -> Self {
        self.config.query_params_only_for_handshake = only;
        self
    }

    /// Seed the socket.io server revision instead of letting the session
    /// default to v2 framing.
    pub fn server_version(mut self, version: ServerVersion) -> Self {
        self.config.server_version = version;
        self
    }

    /// Customize the websocket handshake request (extra headers, cookies).
    pub fn request_customizer(
        mut self,
        customizer: impl Fn(&mut Request<()>) + Send + Sync + 'static,
    ) -> Self {
        self.config.request_customizer = Some(Arc::new(customizer));
        self
    }

    /// Build the config
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

impl Default for TransportConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = TransportConfig::default();
        assert!(config.query_params.is_empty());
        assert!(!config.query_params_only_for_handshake);
        assert_eq!(config.server_version, ServerVersion::Unknown);
        assert!(config.request_customizer.is_none());
    }

    #[test]
    fn config_builder() {
        let config = TransportConfig::builder()
            .query_param("token", "abc")
            .query_param("room", "lobby")
            .query_params_only_for_handshake(true)
            .server_version(ServerVersion::V3)
            .request_customizer(|req| {
                req.headers_mut()
                    .insert("x-custom", http::HeaderValue::from_static("1"));
            })
            .build();
        assert_eq!(config.query_params.len(), 2);
        assert!(config.query_params_only_for_handshake);
        assert_eq!(config.server_version, ServerVersion::V3);
        assert!(config.request_customizer.is_some());
    }
}
