use tokio_tungstenite::tungstenite;

/// Errors raised while establishing a socket connection.
///
/// Frame-level failures never surface here: a malformed frame is logged and
/// dropped, and socket failures after the connection is up are reported to
/// the manager through its callback surface.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid connection uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("error building connection uri: {0}")]
    Http(#[from] http::Error),
    #[error("unsupported uri scheme: {0}")]
    UnsupportedScheme(String),
    #[error("connection uri has no authority")]
    MissingAuthority,
    #[error("ws transport error: {0}")]
    WsTransport(#[from] tungstenite::Error),
}
