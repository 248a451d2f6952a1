use std::str::FromStr;

/// The type of `transport` used to connect to the server.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransportType {
    /// HTTP long-polling transport, an external collaborator of this engine
    Polling,
    /// Websocket transport
    Websocket,
}

impl TransportType {
    /// The tag used in the `transport` query parameter of the connection URI.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Polling => "polling",
            TransportType::Websocket => "websocket",
        }
    }
}

/// Cannot determine the transport type to connect to the server.
#[derive(Debug, Copy, Clone)]
pub struct UnknownTransportError;
impl std::fmt::Display for UnknownTransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown transport type")
    }
}
impl std::error::Error for UnknownTransportError {}

impl FromStr for TransportType {
    type Err = UnknownTransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "websocket" => Ok(TransportType::Websocket),
            "polling" => Ok(TransportType::Polling),
            _ => Err(UnknownTransportError),
        }
    }
}
impl From<TransportType> for &'static str {
    fn from(t: TransportType) -> Self {
        t.as_str()
    }
}

/// The engine.io protocol version, negotiated through the `EIO` query
/// parameter of the connection URI.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ProtocolVersion {
    /// The protocol version 3
    V3 = 3,
    /// The protocol version 4
    V4 = 4,
}

impl ProtocolVersion {
    /// The value carried in the `EIO` query parameter.
    pub fn eio(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug)]
pub struct UnknownProtocolVersionError;
impl std::fmt::Display for UnknownProtocolVersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown protocol version")
    }
}
impl std::error::Error for UnknownProtocolVersionError {}

impl FromStr for ProtocolVersion {
    type Err = UnknownProtocolVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3" => Ok(ProtocolVersion::V3),
            "4" => Ok(ProtocolVersion::V4),
            _ => Err(UnknownProtocolVersionError),
        }
    }
}

/// The socket.io server revision, which governs how the server frames binary
/// attachments on the wire.
///
/// A v2 server sends each attachment as the raw blob; a v3 server prefixes
/// the blob with a one-byte flag that must be stripped on receipt. When the
/// revision has not been negotiated yet the session defaults to
/// [`ServerVersion::V2`] and pins that choice (see the session cell in the
/// transport crate).
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ServerVersion {
    /// Revision not negotiated yet
    Unknown,
    /// Socket.io v2 server: attachments arrive verbatim
    V2,
    /// Socket.io v3 server: attachments carry a leading flag byte
    V3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_type_round_trip() {
        assert_eq!("websocket".parse::<TransportType>().unwrap().as_str(), "websocket");
        assert_eq!("polling".parse::<TransportType>().unwrap().as_str(), "polling");
        assert!("carrier-pigeon".parse::<TransportType>().is_err());
    }

    #[test]
    fn protocol_version_eio_value() {
        assert_eq!(ProtocolVersion::V3.eio(), 3);
        assert_eq!(ProtocolVersion::V4.eio(), 4);
        assert_eq!("4".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V4);
        assert!("5".parse::<ProtocolVersion>().is_err());
    }
}
