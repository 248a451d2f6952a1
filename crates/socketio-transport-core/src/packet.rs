//! Engine.IO/Socket.IO packet implementation.
//! The [`Packet`] is the base unit of data exchanged over the transport.

use std::{fmt, io::Cursor};

use bytes::{Buf, Bytes};
use smallvec::SmallVec;

use crate::protocol::ServerVersion;

/// The engine.io framing type, carried as the first digit of a text frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransportEvent {
    /// Open packet used to initiate a connection
    Open = 0,
    /// Close packet used to close a connection
    Close = 1,
    /// Ping packet used to check if the connection is still alive.
    /// With the literal payload `probe` it opens the upgrade handshake.
    Ping = 2,
    /// Pong packet used to respond to a Ping packet.
    /// With the literal payload `probe` it confirms the upgrade handshake.
    Pong = 3,
    /// Message packet carrying a socket.io event
    Message = 4,
    /// Upgrade packet promoting a probed transport
    Upgrade = 5,
    /// Noop packet used to gracefully release a pending polling request
    Noop = 6,
}

impl TransportEvent {
    fn from_digit(d: u8) -> Option<Self> {
        let event = match d {
            b'0' => TransportEvent::Open,
            b'1' => TransportEvent::Close,
            b'2' => TransportEvent::Ping,
            b'3' => TransportEvent::Pong,
            b'4' => TransportEvent::Message,
            b'5' => TransportEvent::Upgrade,
            b'6' => TransportEvent::Noop,
            _ => return None,
        };
        Some(event)
    }

    fn digit(self) -> char {
        (b'0' + self as u8) as char
    }
}

/// The socket.io event type, carried as the second digit of a `Message`
/// frame. Any other framing type carries no socket.io event.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SocketIOEvent {
    /// Connection to a namespace
    Connect = 0,
    /// Disconnection from a namespace
    Disconnect = 1,
    /// Event sent to the other side
    Event = 2,
    /// Acknowledgement of an event
    Ack = 3,
    /// Connection to a namespace refused
    ConnectError = 4,
    /// Event with adjacent binary attachments
    BinaryEvent = 5,
    /// Acknowledgement with adjacent binary attachments
    BinaryAck = 6,
    /// Digit not part of the protocol, or framing type other than `Message`
    Unknown = 7,
}

impl SocketIOEvent {
    fn from_digit(d: u8) -> Self {
        match d {
            b'0' => SocketIOEvent::Connect,
            b'1' => SocketIOEvent::Disconnect,
            b'2' => SocketIOEvent::Event,
            b'3' => SocketIOEvent::Ack,
            b'4' => SocketIOEvent::ConnectError,
            b'5' => SocketIOEvent::BinaryEvent,
            b'6' => SocketIOEvent::BinaryAck,
            _ => SocketIOEvent::Unknown,
        }
    }

    fn digit(self) -> Option<char> {
        match self {
            SocketIOEvent::Unknown => None,
            e => Some((b'0' + e as u8) as char),
        }
    }

    /// Whether this event declares adjacent binary attachments.
    pub fn is_binary(&self) -> bool {
        matches!(self, SocketIOEvent::BinaryEvent | SocketIOEvent::BinaryAck)
    }
}

/// An error that occurs when parsing a text frame into a [`Packet`].
#[derive(Debug)]
pub enum PacketParseError {
    /// The leading framing digit is absent or not part of the protocol.
    InvalidTransportEvent(Option<char>),
    /// A `Message` frame is missing its socket.io event digit.
    InvalidSocketEvent(Option<char>),
    /// A binary event declares an absent or non-numeric attachment count.
    InvalidAttachmentCount,
}

impl fmt::Display for PacketParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketParseError::InvalidTransportEvent(c) => {
                write!(f, "invalid transport event digit: {c:?}")
            }
            PacketParseError::InvalidSocketEvent(c) => {
                write!(f, "invalid socket.io event digit: {c:?}")
            }
            PacketParseError::InvalidAttachmentCount => write!(f, "invalid attachment count"),
        }
    }
}
impl std::error::Error for PacketParseError {}

/// A single Engine.IO envelope: the framing type, the socket.io event and
/// namespace when the frame is a `Message`, an opaque textual payload, and
/// the binary attachments referenced by the envelope header.
///
/// The payload is never re-parsed by this layer: JSON array/object text is
/// carried verbatim, as is the literal `probe` body of the upgrade
/// handshake. Attachments declared by the header arrive later as separate
/// binary frames and are appended in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The engine.io framing type
    pub transport_event: TransportEvent,
    /// The socket.io event, meaningful only when `transport_event` is `Message`
    pub socket_event: SocketIOEvent,
    /// The socket.io namespace the packet belongs to
    pub namespace: String,
    /// Opaque textual body
    pub payload: String,
    /// Number of binary attachments declared in the envelope header
    pub attachment_count: u32,
    /// Binary attachments received so far, in arrival order
    pub attachments: Vec<Bytes>,
}

impl Packet {
    /// Create a ping packet carrying the literal `probe` payload, used to
    /// validate an upgrade-candidate transport.
    pub fn probe_ping() -> Self {
        Self {
            transport_event: TransportEvent::Ping,
            socket_event: SocketIOEvent::Unknown,
            namespace: "/".to_string(),
            payload: "probe".to_string(),
            attachment_count: 0,
            attachments: Vec::new(),
        }
    }

    /// Create an event packet for the given namespace.
    pub fn event(ns: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            transport_event: TransportEvent::Message,
            socket_event: SocketIOEvent::Event,
            namespace: ns.into(),
            payload: payload.into(),
            attachment_count: 0,
            attachments: Vec::new(),
        }
    }

    /// Create a binary event packet for the given namespace. The declared
    /// attachment count matches the supplied attachment list.
    pub fn binary_event(
        ns: impl Into<String>,
        payload: impl Into<String>,
        attachments: Vec<Bytes>,
    ) -> Self {
        Self {
            transport_event: TransportEvent::Message,
            socket_event: SocketIOEvent::BinaryEvent,
            namespace: ns.into(),
            payload: payload.into(),
            attachment_count: attachments.len() as u32,
            attachments,
        }
    }

    /// Parse one incoming text frame.
    ///
    /// The frame layout is
    /// `<transport digit>[<socket.io digit>][<count>-][<namespace>,]<payload>`:
    /// the socket.io digit is required for `Message` frames, the attachment
    /// count for binary events, and the namespace defaults to `/` when the
    /// body does not start with a slash.
    pub fn parse(data: &str) -> Result<Self, PacketParseError> {
        let mut reader = Cursor::new(data);
        let transport_event = match reader.has_remaining().then(|| reader.get_u8()) {
            Some(c) => TransportEvent::from_digit(c)
                .ok_or(PacketParseError::InvalidTransportEvent(Some(c as char)))?,
            None => return Err(PacketParseError::InvalidTransportEvent(None)),
        };

        let mut socket_event = SocketIOEvent::Unknown;
        let mut attachment_count = 0;
        if transport_event == TransportEvent::Message {
            socket_event = match reader.has_remaining().then(|| reader.get_u8()) {
                Some(c) if c.is_ascii_digit() => SocketIOEvent::from_digit(c),
                Some(c) => return Err(PacketParseError::InvalidSocketEvent(Some(c as char))),
                None => return Err(PacketParseError::InvalidSocketEvent(None)),
            };
            if socket_event.is_binary() {
                attachment_count = read_attachment_count(&mut reader)
                    .ok_or(PacketParseError::InvalidAttachmentCount)?;
            }
        }

        // Custom namespaces start with a slash; ack ids and payload bodies never do
        let namespace = if reader.has_remaining().then(|| reader.chunk()[0]) == Some(b'/') {
            read_namespace(&mut reader)
        } else {
            "/".to_string()
        };
        let payload = data[reader.position() as usize..].to_string();

        Ok(Self {
            transport_event,
            socket_event,
            namespace,
            payload,
            attachment_count,
            attachments: Vec::new(),
        })
    }

    /// Serialize the envelope back to its text-frame form. Inverse of
    /// [`Packet::parse`] for packets built from valid field values.
    pub fn encode(&self) -> String {
        let mut buffer = String::with_capacity(self.size_hint());
        buffer.push(self.transport_event.digit());
        if self.transport_event == TransportEvent::Message {
            if let Some(digit) = self.socket_event.digit() {
                buffer.push(digit);
            }
            if self.socket_event.is_binary() {
                let mut count = itoa::Buffer::new();
                buffer.push_str(count.format(self.attachment_count));
                buffer.push('-');
            }
        }
        if self.namespace != "/" {
            buffer.push_str(&self.namespace);
            buffer.push(',');
        }
        buffer.push_str(&self.payload);
        buffer
    }

    /// Append one attachment received as a binary frame from the server.
    ///
    /// V3 servers prefix each attachment with a one-byte flag that is not
    /// part of the blob; v2 servers (and the unpinned default) send the blob
    /// verbatim.
    pub fn append_attachment(&mut self, frame: Bytes, framing: ServerVersion) {
        let data = match framing {
            ServerVersion::V3 if !frame.is_empty() => frame.slice(1..),
            _ => frame,
        };
        self.attachments.push(data);
    }

    /// Whether every attachment declared by the envelope header has arrived.
    pub fn has_all_attachments(&self) -> bool {
        self.attachments.len() == self.attachment_count as usize
    }

    fn size_hint(&self) -> usize {
        // 2 digits + worst-case `u32-` count prefix + trailing namespace comma
        2 + 11 + self.namespace.len() + 1 + self.payload.len()
    }
}

fn read_attachment_count(reader: &mut Cursor<&str>) -> Option<u32> {
    let data = *reader.get_ref();
    let start = reader.position() as usize;
    loop {
        match reader.has_remaining().then(|| reader.get_u8()) {
            Some(c) if c.is_ascii_digit() => (),
            // At least one digit must precede the dash
            Some(b'-') if reader.position() as usize > start + 1 => {
                break data[start..reader.position() as usize - 1].parse().ok();
            }
            _ => break None,
        }
    }
}

fn read_namespace(reader: &mut Cursor<&str>) -> String {
    let data = *reader.get_ref();
    let start = reader.position() as usize;
    loop {
        match reader.has_remaining().then(|| reader.get_u8()) {
            Some(b',') => break data[start..reader.position() as usize - 1].to_string(),
            // Depending on the client the namespace may not end with a comma
            // when it is the end of the packet, e.g. `40/custom`
            None => break data[start..].to_string(),
            Some(_) => (),
        }
    }
}

/// Buffered packets to send over a transport in one batch.
/// The transport sends each element in order, then clears the buffer to
/// signal that it has been consumed.
pub type PacketBuf = SmallVec<[Packet; 2]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_probe_ping() {
        let packet = Packet::parse("2probe").unwrap();
        assert_eq!(packet.transport_event, TransportEvent::Ping);
        assert_eq!(packet.socket_event, SocketIOEvent::Unknown);
        assert_eq!(packet.namespace, "/");
        assert_eq!(packet.payload, "probe");
        assert_eq!(packet.attachment_count, 0);
    }

    #[test]
    fn parse_probe_pong() {
        let packet = Packet::parse("3probe").unwrap();
        assert_eq!(packet.transport_event, TransportEvent::Pong);
        assert_eq!(packet.payload, "probe");
    }

    #[test]
    fn parse_connect_on_root_namespace() {
        let packet = Packet::parse("40").unwrap();
        assert_eq!(packet.transport_event, TransportEvent::Message);
        assert_eq!(packet.socket_event, SocketIOEvent::Connect);
        assert_eq!(packet.namespace, "/");
        assert_eq!(packet.payload, "");
    }

    #[test]
    fn parse_connect_on_custom_namespace_without_comma() {
        let packet = Packet::parse("40/custom").unwrap();
        assert_eq!(packet.socket_event, SocketIOEvent::Connect);
        assert_eq!(packet.namespace, "/custom");
        assert_eq!(packet.payload, "");
    }

    #[test]
    fn parse_event_with_namespace_and_json_payload() {
        let packet = Packet::parse(r#"42/chat,["message",{"text":"hi"}]"#).unwrap();
        assert_eq!(packet.socket_event, SocketIOEvent::Event);
        assert_eq!(packet.namespace, "/chat");
        // the body is carried opaque, not re-parsed
        assert_eq!(packet.payload, r#"["message",{"text":"hi"}]"#);
    }

    #[test]
    fn parse_event_keeps_ack_id_in_payload() {
        let packet = Packet::parse(r#"4212["ev"]"#).unwrap();
        assert_eq!(packet.socket_event, SocketIOEvent::Event);
        assert_eq!(packet.namespace, "/");
        assert_eq!(packet.payload, r#"12["ev"]"#);
    }

    #[test]
    fn parse_binary_event_attachment_count() {
        let packet = Packet::parse(r#"452-["file",{"_placeholder":true,"num":0}]"#).unwrap();
        assert_eq!(packet.socket_event, SocketIOEvent::BinaryEvent);
        assert_eq!(packet.attachment_count, 2);
        assert_eq!(packet.payload, r#"["file",{"_placeholder":true,"num":0}]"#);
        assert!(!packet.has_all_attachments());
    }

    #[test]
    fn parse_binary_ack_with_namespace() {
        let packet = Packet::parse(r#"461-/admin,13["done"]"#).unwrap();
        assert_eq!(packet.socket_event, SocketIOEvent::BinaryAck);
        assert_eq!(packet.attachment_count, 1);
        assert_eq!(packet.namespace, "/admin");
        assert_eq!(packet.payload, r#"13["done"]"#);
    }

    #[test]
    fn parse_unknown_socket_event_digit() {
        let packet = Packet::parse("49whatever").unwrap();
        assert_eq!(packet.socket_event, SocketIOEvent::Unknown);
        assert_eq!(packet.payload, "whatever");
    }

    #[test]
    fn parse_rejects_empty_frame() {
        assert!(matches!(
            Packet::parse(""),
            Err(PacketParseError::InvalidTransportEvent(None))
        ));
    }

    #[test]
    fn parse_rejects_unknown_transport_digit() {
        assert!(matches!(
            Packet::parse("9hello"),
            Err(PacketParseError::InvalidTransportEvent(Some('9')))
        ));
        assert!(matches!(
            Packet::parse("xhello"),
            Err(PacketParseError::InvalidTransportEvent(Some('x')))
        ));
    }

    #[test]
    fn parse_rejects_message_without_socket_digit() {
        assert!(matches!(
            Packet::parse("4"),
            Err(PacketParseError::InvalidSocketEvent(None))
        ));
        assert!(matches!(
            Packet::parse("4abc"),
            Err(PacketParseError::InvalidSocketEvent(Some('a')))
        ));
    }

    #[test]
    fn parse_rejects_binary_event_without_count() {
        assert!(matches!(
            Packet::parse(r#"45["file"]"#),
            Err(PacketParseError::InvalidAttachmentCount)
        ));
        assert!(matches!(
            Packet::parse("45-"),
            Err(PacketParseError::InvalidAttachmentCount)
        ));
        // digits that overflow a u32 are not a valid count
        assert!(matches!(
            Packet::parse("4599999999999999999999-[]"),
            Err(PacketParseError::InvalidAttachmentCount)
        ));
    }

    #[test]
    fn encode_probe_ping() {
        assert_eq!(Packet::probe_ping().encode(), "2probe");
    }

    #[test]
    fn encode_binary_event_header() {
        let packet = Packet::binary_event(
            "/admin",
            r#"["file",{"_placeholder":true,"num":0}]"#,
            vec![Bytes::from_static(&[1, 2, 3])],
        );
        assert_eq!(
            packet.encode(),
            r#"451-/admin,["file",{"_placeholder":true,"num":0}]"#
        );
    }

    #[test]
    fn round_trip_zero_attachment_packets() {
        let frames = [
            "2probe",
            "3probe",
            "1",
            "6",
            "40",
            "40/custom,",
            r#"42["message",{"text":"hi"}]"#,
            r#"42/chat,7["ev",[1,2,3]]"#,
            r#"43/chat,7[{"ok":true}]"#,
            r#"44{"message":"refused"}"#,
        ];
        for frame in frames {
            let packet = Packet::parse(frame).unwrap();
            assert_eq!(packet.encode(), frame, "round trip of {frame:?}");
            // semantic equality after a second pass
            assert_eq!(Packet::parse(&packet.encode()).unwrap(), packet);
        }
    }

    #[test]
    fn append_attachment_verbatim_for_v2() {
        let mut packet = Packet::parse(r#"451-["f",{"_placeholder":true,"num":0}]"#).unwrap();
        packet.append_attachment(Bytes::from_static(&[4, 1, 2, 3]), ServerVersion::V2);
        assert_eq!(packet.attachments[0].as_ref(), &[4, 1, 2, 3]);
        assert!(packet.has_all_attachments());
    }

    #[test]
    fn append_attachment_strips_v3_flag_byte() {
        let mut packet = Packet::parse(r#"451-["f",{"_placeholder":true,"num":0}]"#).unwrap();
        packet.append_attachment(Bytes::from_static(&[4, 1, 2, 3]), ServerVersion::V3);
        assert_eq!(packet.attachments[0].as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn append_attachment_keeps_arrival_order() {
        let mut packet = Packet::parse(r#"452-["f"]"#).unwrap();
        packet.append_attachment(Bytes::from_static(&[1]), ServerVersion::V2);
        packet.append_attachment(Bytes::from_static(&[2]), ServerVersion::V2);
        assert_eq!(packet.attachments[0].as_ref(), &[1]);
        assert_eq!(packet.attachments[1].as_ref(), &[2]);
        assert!(packet.has_all_attachments());
    }
}
