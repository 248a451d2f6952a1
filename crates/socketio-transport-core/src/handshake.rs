use serde::{Deserialize, Serialize};

/// The payload of the `Open` envelope sent by the server once a connection
/// is established.
///
/// The transport records the session id out of it; the timing fields are
/// consumed by the connection manager, which owns the heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeData {
    /// The session id assigned by the server.
    pub sid: String,
    /// The list of transport upgrades available on this connection.
    pub upgrades: Vec<String>,
    /// The heartbeat ping interval (in milliseconds).
    pub ping_interval: u64,
    /// The heartbeat ping timeout (in milliseconds).
    pub ping_timeout: u64,
    /// The maximum payload size in bytes. Not sent by v3 servers.
    #[serde(default)]
    pub max_payload: u64,
}

impl HandshakeData {
    /// Deserialize the handshake out of an `Open` envelope payload.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_payload() {
        let data = HandshakeData::from_payload(
            r#"{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":100000}"#,
        )
        .unwrap();
        assert_eq!(data.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(data.upgrades, vec!["websocket".to_string()]);
        assert_eq!(data.ping_interval, 25000);
        assert_eq!(data.ping_timeout, 20000);
        assert_eq!(data.max_payload, 100000);
    }

    #[test]
    fn from_payload_without_max_payload() {
        let data = HandshakeData::from_payload(
            r#"{"sid":"1","upgrades":[],"pingInterval":25000,"pingTimeout":60000}"#,
        )
        .unwrap();
        assert_eq!(data.max_payload, 0);
    }

    #[test]
    fn from_payload_rejects_non_handshake_json() {
        assert!(HandshakeData::from_payload(r#"["not","a","handshake"]"#).is_err());
    }
}
