//! The websocket transport: one underlying socket connection driven through
//! an explicit state machine.
//!
//! A connect task establishes the socket and feeds its frames into the
//! transport's handlers; a writer task drains queued outbound frames into
//! the socket sink. All transport state lives behind a single mutex scoped
//! to the instance, since the runtime may deliver socket events from any
//! worker thread. Events carry the socket generation captured at connect
//! time: after a close the generation moves on and late events from the old
//! socket are ignored.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use http::Uri;
use socketio_transport_core::{Packet, PacketBuf, TransportEvent, TransportType};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, trace, warn};

use crate::{
    errors::Error,
    manager::Manager,
    session::{Session, TransportId},
    transport::{Transport, TransportState},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client-side websocket transport.
///
/// Cheap to clone: clones share the same underlying transport instance.
/// `open` must be called from within a tokio runtime; every other method is
/// plain synchronous.
pub struct WebSocketTransport<M> {
    shared: Arc<Shared<M>>,
}

impl<M> Clone for WebSocketTransport<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<M> {
    session: Arc<Session>,
    manager: Arc<M>,
    id: TransportId,
    inner: Mutex<Inner>,
}

struct Inner {
    state: TransportState,
    /// Identity of the current socket; bumped on every open and close so
    /// queued events from a socket that is no longer current are ignored.
    generation: u64,
    tx: Option<mpsc::UnboundedSender<Message>>,
    /// Single-slot register for the packet waiting for binary attachments.
    pending: Option<Packet>,
    /// Staging buffer for outbound attachment frames; grows to the largest
    /// attachment and is never shrunk.
    send_buf: Vec<u8>,
}

impl<M: Manager> WebSocketTransport<M> {
    pub fn new(session: Arc<Session>, manager: Arc<M>) -> Self {
        Self {
            shared: Arc::new(Shared {
                session,
                manager,
                id: TransportId::next(),
                inner: Mutex::new(Inner {
                    state: TransportState::Closed,
                    generation: 0,
                    tx: None,
                    pending: None,
                    send_buf: Vec::new(),
                }),
            }),
        }
    }

    /// The identity of this transport, compared against the session's
    /// upgrade-candidate token.
    pub fn id(&self) -> TransportId {
        self.shared.id
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.shared.session
    }

    pub fn manager(&self) -> &Arc<M> {
        &self.shared.manager
    }
}

impl<M: Manager> Transport for WebSocketTransport<M> {
    fn transport_type(&self) -> TransportType {
        TransportType::Websocket
    }

    fn state(&self) -> TransportState {
        self.shared.inner.lock().unwrap().state
    }

    fn open(&self) {
        let generation = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state != TransportState::Closed {
                debug!(state = ?inner.state, "open ignored: transport is not closed");
                return;
            }
            inner.state = TransportState::Connecting;
            inner.generation += 1;
            inner.generation
        };
        let request = match build_request(&self.shared.session) {
            Ok(request) => request,
            Err(e) => {
                warn!("cannot build connection request: {e}");
                {
                    let mut inner = self.shared.inner.lock().unwrap();
                    if inner.generation == generation {
                        inner.state = TransportState::Closed;
                    }
                }
                self.shared
                    .manager
                    .on_transport_error(self.shared.id, &e.to_string());
                return;
            }
        };
        tokio::spawn(run_socket(self.shared.clone(), generation, request));
    }

    fn pause(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state == TransportState::Open {
            debug!("transport paused");
            inner.state = TransportState::Paused;
        } else {
            debug!(state = ?inner.state, "pause ignored: transport is not open");
        }
    }

    fn close(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state == TransportState::Closed {
            return;
        }
        debug!("closing transport");
        inner.state = TransportState::Closed;
        inner.generation += 1;
        inner.pending = None;
        if let Some(tx) = inner.tx.take() {
            tx.send(Message::Close(None)).ok();
        }
    }

    fn poll(&self) {
        trace!("poll is a no-op for the websocket transport");
    }

    fn send(&self, packet: Packet) {
        let mut inner = self.shared.inner.lock().unwrap();
        if matches!(
            inner.state,
            TransportState::Closed | TransportState::Paused
        ) {
            debug!(state = ?inner.state, "send suppressed");
            return;
        }
        send_locked(&mut inner, &packet);
    }

    fn send_all(&self, packets: &mut PacketBuf) {
        let mut inner = self.shared.inner.lock().unwrap();
        if matches!(
            inner.state,
            TransportState::Closed | TransportState::Paused
        ) {
            debug!(state = ?inner.state, count = packets.len(), "batch send suppressed");
            return;
        }
        for packet in packets.iter() {
            send_locked(&mut inner, packet);
        }
        packets.clear();
    }

    fn is_request_in_progress(&self) -> bool {
        false
    }

    fn is_polling_in_progress(&self) -> bool {
        false
    }
}

impl<M: Manager> Shared<M> {
    /// Install the writer channel for a freshly connected socket. Refused
    /// when the transport moved on (closed or reopened) while the connection
    /// was being established.
    fn install_writer(&self, generation: u64, tx: mpsc::UnboundedSender<Message>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation || inner.state != TransportState::Connecting {
            return false;
        }
        inner.tx = Some(tx);
        true
    }

    fn on_socket_open(&self, generation: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation || inner.state != TransportState::Connecting {
            return;
        }
        debug!(id = ?self.id, "socket opened");
        inner.state = TransportState::Opening;
        if self.session.is_upgrading(self.id) {
            // a candidate announces itself before anything else
            send_locked(&mut inner, &Packet::probe_ping());
        }
    }

    fn on_text_frame(&self, generation: u64, frame: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation {
            return;
        }
        let packet = match Packet::parse(frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("dropping malformed frame: {e}");
                return;
            }
        };
        if packet.attachment_count > 0 {
            if inner.pending.is_some() {
                debug!("replacing a packet still waiting for attachments");
            }
            inner.pending = Some(packet);
            return;
        }
        let routed = self.route(&mut inner, packet);
        drop(inner);
        self.deliver(routed);
    }

    fn on_binary_frame(&self, generation: u64, frame: Bytes) {
        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation {
            return;
        }
        let Some(pending) = inner.pending.as_mut() else {
            warn!("dropping binary frame with no pending packet");
            return;
        };
        let framing = self.session.attachment_framing();
        pending.append_attachment(frame, framing);
        if let Some(packet) = inner.pending.take_if(|p| p.has_all_attachments()) {
            // the register is already cleared here, so a delivery failure
            // cannot leak a stale packet into the next reassembly cycle
            let routed = self.route(&mut inner, packet);
            drop(inner);
            self.deliver(routed);
        }
    }

    fn on_socket_closed(&self, generation: u64, frame: Option<CloseFrame>) {
        // a missing close frame counts as a normal shutdown
        if let Some(frame) = frame.filter(|f| f.code != CloseCode::Normal) {
            let message = format!(
                "socket closed abnormally: {} {}",
                u16::from(frame.code),
                frame.reason
            );
            self.on_socket_error(generation, &message);
            return;
        }
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation != generation {
                return;
            }
            debug!(id = ?self.id, "socket closed");
            inner.state = TransportState::Closed;
            inner.generation += 1;
            inner.tx = None;
            inner.pending = None;
        }
        // a retired candidate just steps aside; a live transport asks the
        // manager to reconnect
        if !self.session.clear_upgrading(self.id) {
            self.manager.try_to_reconnect();
        }
    }

    /// Abnormal closure branch: connect failure, stream error, or a close
    /// frame with a non-normal code. State is left as-is; the manager owns
    /// what happens next.
    fn on_socket_error(&self, generation: u64, message: &str) {
        {
            let inner = self.inner.lock().unwrap();
            if inner.generation != generation {
                return;
            }
        }
        warn!(id = ?self.id, "{message}");
        if !self.session.clear_upgrading(self.id) {
            self.manager.on_transport_error(self.id, message);
        }
    }

    /// Apply the state transitions a packet triggers and decide where it
    /// goes. Runs under the instance lock; the returned actions are
    /// performed by [`Shared::deliver`] after the lock is released, so a
    /// manager callback may call back into the transport.
    fn route(&self, inner: &mut Inner, packet: Packet) -> (Option<Packet>, bool) {
        let mut probed = false;
        match packet.transport_event {
            TransportEvent::Open => {
                if inner.state == TransportState::Opening {
                    debug!("open envelope received, transport is open");
                    inner.state = TransportState::Open;
                    self.session.apply_handshake(&packet.payload);
                } else {
                    warn!(state = ?inner.state, "unexpected open envelope");
                }
            }
            TransportEvent::Pong if packet.payload == "probe" => {
                debug!(id = ?self.id, "probe confirmed");
                inner.state = TransportState::Open;
                probed = true;
            }
            _ => {}
        }
        // a candidate is still proving itself: nothing leaks to the
        // application layer until the manager promotes it
        let deliver = if self.session.is_upgrading(self.id) {
            trace!("packet consumed while probing");
            None
        } else {
            Some(packet)
        };
        (deliver, probed)
    }

    fn deliver(&self, (packet, probed): (Option<Packet>, bool)) {
        if probed {
            self.manager.on_transport_probed(self.id);
        }
        if let Some(packet) = packet {
            self.manager.on_packet(packet);
        }
    }
}

/// Encode and queue one packet on the writer channel: one text frame for
/// the envelope, then one binary frame per attachment, each prefixed with a
/// `Message` tag byte.
fn send_locked(inner: &mut Inner, packet: &Packet) {
    if !packet.attachments.is_empty() || packet.attachment_count > 0 {
        assert!(
            packet.attachments.len() == packet.attachment_count as usize,
            "attachment list length {} disagrees with declared count {}",
            packet.attachments.len(),
            packet.attachment_count,
        );
    }
    let Inner { tx, send_buf, .. } = inner;
    let Some(tx) = tx.as_ref() else {
        debug!("no active socket, dropping outbound packet");
        return;
    };
    tx.send(Message::Text(packet.encode().into())).ok();
    for attachment in &packet.attachments {
        send_buf.clear();
        // grow-only staging: reserve never shrinks and is a no-op once the
        // buffer fits the largest attachment of the batch
        send_buf.reserve(attachment.len() + 1);
        send_buf.push(TransportEvent::Message as u8);
        send_buf.extend_from_slice(attachment);
        tx.send(Message::Binary(Bytes::copy_from_slice(send_buf)))
            .ok();
    }
}

/// Build the websocket handshake request from the session context: ws(s)
/// scheme, the `EIO` and `transport` tags, the session id when one exists,
/// and the configured extra query parameters.
fn build_request(session: &Session) -> Result<http::Request<()>, Error> {
    let base: Uri = session.base_uri().parse()?;
    let scheme = match base.scheme_str() {
        Some("http") | Some("ws") | None => "ws",
        Some("https") | Some("wss") => "wss",
        Some(other) => return Err(Error::UnsupportedScheme(other.to_string())),
    };
    let authority = base.authority().ok_or(Error::MissingAuthority)?.clone();

    let mut query = base.query().unwrap_or_default().to_string();
    append_param(&mut query, "EIO", &session.protocol().eio().to_string());
    append_param(&mut query, "transport", TransportType::Websocket.as_str());
    let sid = session.sid();
    if let Some(sid) = &sid {
        append_param(&mut query, "sid", sid);
    }
    let config = session.config();
    if !(config.query_params_only_for_handshake && sid.is_some()) {
        for (key, value) in &config.query_params {
            append_param(&mut query, key, value);
        }
    }

    let uri = Uri::builder()
        .scheme(scheme)
        .authority(authority.as_str())
        .path_and_query(format!("{}?{query}", base.path()))
        .build()?;
    let mut request = uri.into_client_request()?;
    if let Some(customize) = &config.request_customizer {
        customize(&mut request);
    }
    Ok(request)
}

fn append_param(query: &mut String, key: &str, value: &str) {
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(key);
    query.push('=');
    query.push_str(value);
}

/// Connect the socket, then pump its frames into the transport handlers
/// until the stream ends.
async fn run_socket<M: Manager>(
    shared: Arc<Shared<M>>,
    generation: u64,
    request: http::Request<()>,
) {
    let ws = match connect_async(request).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            shared.on_socket_error(generation, &format!("connection failed: {e}"));
            return;
        }
    };
    let (sink, mut stream) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel();
    if !shared.install_writer(generation, tx) {
        // closed while the connection was being established; dropping the
        // stream releases the socket
        debug!("discarding socket for a retired connection attempt");
        return;
    }
    let writer = forward_to_socket(sink, rx);
    shared.on_socket_open(generation);

    let mut terminated = false;
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(frame)) => shared.on_text_frame(generation, frame.as_str()),
            Ok(Message::Binary(frame)) => shared.on_binary_frame(generation, frame),
            Ok(Message::Close(frame)) => {
                shared.on_socket_closed(generation, frame);
                terminated = true;
                break;
            }
            // ws-level ping/pong/raw frames are handled by the socket layer
            Ok(_) => {}
            Err(e) => {
                shared.on_socket_error(generation, &format!("socket error: {e}"));
                terminated = true;
                break;
            }
        }
    }
    if !terminated {
        shared.on_socket_error(generation, "socket stream ended unexpectedly");
    }
    writer.abort();
}

/// Forward queued outbound frames to the socket sink.
///
/// The sink is flushed only when the channel is drained.
fn forward_to_socket(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if sink.feed(item).await.is_err() {
                break;
            }
            while let Ok(item) = rx.try_recv() {
                if sink.feed(item).await.is_err() {
                    return;
                }
            }
            if sink.flush().await.is_err() {
                break;
            }
        }
        sink.close().await.ok();
    })
}
