//! A live connection to the sound server.
//!
//! # Structure (for beginners)
//!
//! ```text
//!            callers (&Connection, any number of tasks)
//!                 │  submit(): register tag, write packet
//!                 ▼
//!   ┌──────────────────────────┐        ┌───────────────────────┐
//!   │ writer (tokio Mutex)     │──────▶ │ socket                │
//!   └──────────────────────────┘        └───────────┬───────────┘
//!                                                   │
//!   ┌──────────────────────────┐   read loop task   │
//!   │ Correlator (pending map) │◀───────────────────┤ replies / errors
//!   └──────────────────────────┘                    │
//!   ┌──────────────────────────┐                    │
//!   │ EventListener            │◀───────────────────┘ reserved event tag
//!   └──────────────────────────┘
//! ```
//!
//! Exactly one task reads the socket.  Writers take the writer lock for the
//! duration of one packet, so packets never interleave on the wire.  Callers
//! hold a [`PendingRequest`] per command and suspend on it until the read
//! loop, a timeout, or a disconnect resolves the tag.
//!
//! A request runs under a single deadline, from taking the writer lock
//! until the reply arrives.  A packet that stops part way through,
//! because of that deadline or because the caller dropped the future, fails
//! the whole connection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulse_proto::domain::{
    decode_record, decode_records, CardInfo, ModuleArguments, ModuleInfo, Record, ServerInfo,
    SinkInfo, SourceInfo, SubscriptionMask,
};
use pulse_proto::protocol::{
    build_control, decode, parse_error_body, split_control, Command, ErrorCode, Fields, Value,
    INVALID_INDEX, PROTOCOL_VERSION, RESERVED_EVENT_TAG,
};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{oneshot, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::application::correlator::{Correlator, ReplyError, ReplyResult};
use crate::application::error::ClientError;
use crate::application::events::{EventListener, EventReceiver, SubscriptionState};
use crate::application::handshake::{self, HandshakeInfo};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::cookie::load_cookie;
use crate::infrastructure::endpoint::Endpoint;
use crate::infrastructure::transport::{
    BoxedStream, ConnectError, Connector, Packet, PacketReader, PacketWriter, SocketConnector,
    Transport, TransportError,
};

type Writer = PacketWriter<WriteHalf<BoxedStream>>;
type Reader = PacketReader<ReadHalf<BoxedStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Authenticating,
    Ready,
    /// The transport broke or the handshake did not complete.
    Failed,
}

// ── Pending request ───────────────────────────────────────────────────────────

/// Handle on one submitted command.
///
/// Dropping the handle before it resolves cancels the tag, so an abandoned
/// request never leaks a slot in the pending map.
pub struct PendingRequest {
    tag: u32,
    rx: Option<oneshot::Receiver<ReplyResult>>,
    correlator: Arc<Correlator>,
}

impl PendingRequest {
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Suspends until the reply arrives or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// [`ClientError::TimedOut`] after the deadline, or whatever the tag was
    /// resolved with: a server error, a decode error, `Cancelled` or
    /// `Disconnected`.
    pub async fn wait(self, timeout: Duration) -> Result<Vec<Value>, ClientError> {
        self.wait_until(Instant::now() + timeout).await
    }

    /// Like [`wait`](Self::wait) with an absolute deadline.
    pub async fn wait_until(mut self, deadline: Instant) -> Result<Vec<Value>, ClientError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(ClientError::Cancelled);
        };
        let received = match tokio::time::timeout_at(deadline, &mut *rx).await {
            Ok(received) => received.ok(),
            Err(_elapsed) => {
                // After expire() the tag is out of the map; whoever took it
                // out sends on the channel without waiting for anything.
                self.correlator.expire(self.tag);
                rx.await.ok()
            }
        };
        self.rx = None;
        match received {
            Some(result) => result.map_err(ClientError::from),
            None => Err(ClientError::Disconnected),
        }
    }

    /// Resolves the tag with `Cancelled`; a late reply is discarded.
    pub fn cancel(mut self) {
        self.rx = None;
        self.correlator.cancel(self.tag);
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.rx.is_some() {
            self.correlator.cancel(self.tag);
        }
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

/// One authenticated control connection.
///
/// Every method takes `&self`; share the connection behind an `Arc` to issue
/// requests from several tasks at once.
pub struct Connection {
    writer: tokio::sync::Mutex<Option<Writer>>,
    correlator: Arc<Correlator>,
    events: Arc<EventListener>,
    state: Arc<Mutex<ConnectionState>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    info: HandshakeInfo,
    request_timeout: Duration,
    event_buffer: usize,
}

impl Connection {
    /// Connects to the server named by `config`, `PULSE_SERVER` or the local
    /// default socket.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let endpoint =
            Endpoint::resolve(config.client.server.as_deref()).map_err(ConnectError::from)?;
        Self::connect_with(&SocketConnector, &endpoint, config).await
    }

    pub async fn connect_to(endpoint: &Endpoint, config: &ClientConfig) -> Result<Self, ClientError> {
        Self::connect_with(&SocketConnector, endpoint, config).await
    }

    /// Dials `endpoint` through `connector` and runs the handshake.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connect`] if the socket cannot be opened or the cookie
    /// is unusable; [`ClientError::HandshakeFailed`] if the server rejects
    /// authentication, is too old, or does not answer in time.  The
    /// transport is closed in both cases.
    pub async fn connect_with(
        connector: &dyn Connector,
        endpoint: &Endpoint,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let cookie = load_cookie(config.client.cookie_path.as_deref())?;
        let transport = Transport::open(connector, endpoint, config.timeouts.connect()).await?;
        let mut connection = Self::start(transport, config);

        let handshake_timeout = config.timeouts.connect();
        match connection
            .handshake(&cookie, &config.client.application_name, handshake_timeout)
            .await
        {
            Ok(info) => {
                connection.info = info;
                connection.set_state(ConnectionState::Ready);
                info!(
                    %endpoint,
                    server_version = info.server_version,
                    protocol_version = info.protocol_version,
                    client_index = info.client_index,
                    "connected"
                );
                Ok(connection)
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "handshake failed");
                connection.shutdown(ConnectionState::Failed).await;
                Err(match e {
                    ClientError::HandshakeFailed(_) => e,
                    other => ClientError::HandshakeFailed(other.to_string()),
                })
            }
        }
    }

    /// Splits the transport and spawns the read loop.
    fn start(transport: Transport, config: &ClientConfig) -> Self {
        let (reader, writer) = transport.into_split();
        let correlator = Arc::new(Correlator::new());
        let events = Arc::new(EventListener::new());
        let state = Arc::new(Mutex::new(ConnectionState::Authenticating));

        let handle = tokio::spawn(read_loop(
            reader,
            Arc::clone(&correlator),
            Arc::clone(&events),
            Arc::clone(&state),
        ));

        Self {
            writer: tokio::sync::Mutex::new(Some(writer)),
            correlator,
            events,
            state,
            reader: Mutex::new(Some(handle)),
            info: HandshakeInfo {
                server_version: 0,
                protocol_version: PROTOCOL_VERSION,
                client_index: INVALID_INDEX,
            },
            request_timeout: config.timeouts.request(),
            event_buffer: config.events.buffer,
        }
    }

    async fn handshake(
        &self,
        cookie: &[u8],
        application_name: &str,
        timeout: Duration,
    ) -> Result<HandshakeInfo, ClientError> {
        let deadline = Instant::now() + timeout;
        let reply = self
            .submit_unchecked(Command::Auth, &handshake::auth_args(cookie), deadline)
            .await?
            .wait_until(deadline)
            .await?;
        let (server_version, protocol_version) = handshake::parse_auth_reply(&reply)?;
        debug!(server_version, protocol_version, "authenticated");

        let props = handshake::client_proplist(application_name);
        let deadline = Instant::now() + timeout;
        let reply = self
            .submit_unchecked(Command::SetClientName, &handshake::client_name_args(&props), deadline)
            .await?
            .wait_until(deadline)
            .await?;
        let client_index = handshake::parse_client_name_reply(&reply)?;

        Ok(HandshakeInfo {
            server_version,
            protocol_version,
            client_index,
        })
    }

    // ── State ────────────────────────────────────────────────────────────────

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: ConnectionState) {
        *self.lock_state() = next;
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    fn ensure_ready(&self) -> Result<(), ClientError> {
        match self.state() {
            ConnectionState::Ready => Ok(()),
            _ => Err(ClientError::NotConnected),
        }
    }

    pub fn server_version(&self) -> u32 {
        self.info.server_version
    }

    /// The version both sides speak: min(client, server).
    pub fn protocol_version(&self) -> u32 {
        self.info.protocol_version
    }

    /// Index the server assigned to this client.
    pub fn client_index(&self) -> u32 {
        self.info.client_index
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.events.state()
    }

    // ── Requests ─────────────────────────────────────────────────────────────

    /// Registers a tag for `command` and writes it to the socket.
    ///
    /// The write must finish within the configured request timeout.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] outside the `Ready` state;
    /// [`ClientError::TimedOut`] if the packet cannot be written in time;
    /// [`ClientError::Transport`] if the write fails.  A failed write, or one
    /// that timed out part way through the packet, also fails the connection
    /// and every other pending request.
    pub async fn submit(&self, command: Command, args: &[Value]) -> Result<PendingRequest, ClientError> {
        self.ensure_ready()?;
        self.submit_unchecked(command, args, Instant::now() + self.request_timeout)
            .await
    }

    async fn submit_unchecked(
        &self,
        command: Command,
        args: &[Value],
        deadline: Instant,
    ) -> Result<PendingRequest, ClientError> {
        let (tag, rx) = self.correlator.register(command)?;
        let pending = PendingRequest {
            tag,
            rx: Some(rx),
            correlator: Arc::clone(&self.correlator),
        };
        let payload = build_control(command, tag, args);

        let Ok(slot) = tokio::time::timeout_at(deadline, self.writer.lock()).await else {
            warn!(?command, tag, "timed out waiting for the writer");
            self.correlator.expire(tag);
            return Err(ClientError::TimedOut);
        };
        let mut write = InFlightWrite {
            slot,
            connection: self,
        };
        let Some(writer) = write.slot.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        debug!(?command, tag, "sending command");
        let written = tokio::time::timeout_at(deadline, writer.write_packet(&payload, false)).await;
        match written {
            Ok(Ok(())) => Ok(pending),
            Ok(Err(e)) => {
                error!(?command, tag, error = %e, "write failed; closing connection");
                write.fail();
                Err(ClientError::Transport(e))
            }
            Err(_elapsed) => {
                warn!(?command, tag, "timed out writing command");
                self.correlator.expire(tag);
                // A torn packet fails the connection when `write` drops.
                Err(ClientError::TimedOut)
            }
        }
    }

    /// Drops the writer and fails every pending request.
    fn fail_transport(&self, slot: &mut Option<Writer>) {
        *slot = None;
        self.correlator.fail_all(ReplyError::Disconnected);
        self.events.unsubscribe();
        self.set_state(ConnectionState::Failed);
    }

    /// Sends `command` and waits for its reply with the configured timeout.
    pub async fn request(&self, command: Command, args: &[Value]) -> Result<Vec<Value>, ClientError> {
        self.request_with_timeout(command, args, self.request_timeout).await
    }

    /// Sends `command` and waits for its reply.  `timeout` bounds the whole
    /// exchange, from taking the writer until the reply arrives.
    pub async fn request_with_timeout(
        &self,
        command: Command,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Vec<Value>, ClientError> {
        self.ensure_ready()?;
        let deadline = Instant::now() + timeout;
        self.submit_unchecked(command, args, deadline)
            .await?
            .wait_until(deadline)
            .await
    }

    async fn fetch_list<R: Record>(&self, command: Command) -> Result<Vec<R>, ClientError> {
        let values = self.request(command, &[]).await?;
        Ok(decode_records(&values, self.protocol_version())?)
    }

    async fn fetch_one<R: Record>(&self, command: Command, index: Option<u32>, name: Option<&str>) -> Result<R, ClientError> {
        let args = [
            Value::U32(index.unwrap_or(INVALID_INDEX)),
            Value::String(name.map(str::to_string)),
        ];
        let values = self.request(command, &args).await.map_err(ClientError::lookup)?;
        Ok(decode_record(&values, self.protocol_version())?)
    }

    // ── Server ───────────────────────────────────────────────────────────────

    pub async fn get_server_info(&self) -> Result<ServerInfo, ClientError> {
        let values = self.request(Command::GetServerInfo, &[]).await?;
        Ok(decode_record(&values, self.protocol_version())?)
    }

    // ── Cards ────────────────────────────────────────────────────────────────

    pub async fn get_card_info_list(&self) -> Result<Vec<CardInfo>, ClientError> {
        self.fetch_list(Command::GetCardInfoList).await
    }

    pub async fn get_card_info_by_index(&self, index: u32) -> Result<CardInfo, ClientError> {
        self.fetch_one(Command::GetCardInfo, Some(index), None).await
    }

    pub async fn get_card_info_by_name(&self, name: &str) -> Result<CardInfo, ClientError> {
        self.fetch_one(Command::GetCardInfo, None, Some(name)).await
    }

    /// # Errors
    ///
    /// [`ClientError::InvalidProfile`] if the server rejects `profile` for
    /// this card (including the card not existing).
    pub async fn set_card_profile_by_index(&self, index: u32, profile: &str) -> Result<(), ClientError> {
        self.set_card_profile(Some(index), None, profile).await
    }

    pub async fn set_card_profile_by_name(&self, card: &str, profile: &str) -> Result<(), ClientError> {
        self.set_card_profile(None, Some(card), profile).await
    }

    async fn set_card_profile(&self, index: Option<u32>, card: Option<&str>, profile: &str) -> Result<(), ClientError> {
        let args = [
            Value::U32(index.unwrap_or(INVALID_INDEX)),
            Value::String(card.map(str::to_string)),
            Value::string(profile),
        ];
        self.request(Command::SetCardProfile, &args)
            .await
            .map_err(|e| e.profile(profile))?;
        info!(?index, ?card, profile, "card profile set");
        Ok(())
    }

    // ── Sinks and sources ────────────────────────────────────────────────────

    pub async fn get_sink_info_list(&self) -> Result<Vec<SinkInfo>, ClientError> {
        self.fetch_list(Command::GetSinkInfoList).await
    }

    pub async fn get_sink_info_by_index(&self, index: u32) -> Result<SinkInfo, ClientError> {
        self.fetch_one(Command::GetSinkInfo, Some(index), None).await
    }

    pub async fn get_sink_info_by_name(&self, name: &str) -> Result<SinkInfo, ClientError> {
        self.fetch_one(Command::GetSinkInfo, None, Some(name)).await
    }

    pub async fn get_source_info_list(&self) -> Result<Vec<SourceInfo>, ClientError> {
        self.fetch_list(Command::GetSourceInfoList).await
    }

    pub async fn get_source_info_by_index(&self, index: u32) -> Result<SourceInfo, ClientError> {
        self.fetch_one(Command::GetSourceInfo, Some(index), None).await
    }

    pub async fn get_source_info_by_name(&self, name: &str) -> Result<SourceInfo, ClientError> {
        self.fetch_one(Command::GetSourceInfo, None, Some(name)).await
    }

    // ── Modules ──────────────────────────────────────────────────────────────

    pub async fn get_module_info_list(&self) -> Result<Vec<ModuleInfo>, ClientError> {
        self.fetch_list(Command::GetModuleInfoList).await
    }

    pub async fn get_module_info_by_index(&self, index: u32) -> Result<ModuleInfo, ClientError> {
        let values = self
            .request(Command::GetModuleInfo, &[Value::U32(index)])
            .await
            .map_err(ClientError::lookup)?;
        Ok(decode_record(&values, self.protocol_version())?)
    }

    /// Every loaded instance of module `name`, in index order.
    ///
    /// The server has no lookup by module name, so this filters the full
    /// list.  Fails with [`ClientError::NotFound`] if none is loaded.
    pub async fn get_module_info_by_name(&self, name: &str) -> Result<Vec<ModuleInfo>, ClientError> {
        let modules: Vec<ModuleInfo> = self
            .get_module_info_list()
            .await?
            .into_iter()
            .filter(|m| m.name == name)
            .collect();
        if modules.is_empty() {
            return Err(ClientError::NotFound);
        }
        Ok(modules)
    }

    /// Loads module `name` and returns its index.
    pub async fn load_module(&self, name: &str, arguments: &ModuleArguments) -> Result<u32, ClientError> {
        let args = [Value::string(name), Value::string(arguments.to_string())];
        let values = self.request(Command::LoadModule, &args).await?;
        let index = Fields::new(&values).u32("module_index")?;
        info!(name, index, "module loaded");
        Ok(index)
    }

    pub async fn unload_module(&self, index: u32) -> Result<(), ClientError> {
        self.request(Command::UnloadModule, &[Value::U32(index)]).await?;
        info!(index, "module unloaded");
        Ok(())
    }

    // ── Events ───────────────────────────────────────────────────────────────

    /// Subscribes to server events for the facilities in `mask`.
    ///
    /// A later call replaces the previous subscription; the old receiver
    /// sees the end of its stream.  The receiver also ends when the
    /// connection goes away.
    pub async fn subscribe(&self, mask: SubscriptionMask) -> Result<EventReceiver, ClientError> {
        self.ensure_ready()?;
        // Installed before SUBSCRIBE goes out so that no early event is lost.
        let rx = self.events.subscribe(mask, self.event_buffer);
        if let Err(e) = self.request(Command::Subscribe, &[Value::U32(mask.0)]).await {
            self.events.unsubscribe();
            return Err(e);
        }
        info!(mask = mask.0, "subscribed to server events");
        Ok(rx)
    }

    pub async fn unsubscribe(&self) -> Result<(), ClientError> {
        self.events.unsubscribe();
        self.request(Command::Subscribe, &[Value::U32(SubscriptionMask::NONE.0)])
            .await?;
        debug!("unsubscribed from server events");
        Ok(())
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Resolves every pending request with `Disconnected` and closes the
    /// socket.  Calling it again does nothing.
    pub async fn disconnect(&self) {
        if self.state() == ConnectionState::Disconnected {
            return;
        }
        let resolved = self.shutdown(ConnectionState::Disconnected).await;
        info!(resolved, "disconnected");
    }

    async fn shutdown(&self, final_state: ConnectionState) -> usize {
        self.set_state(final_state);
        let resolved = self.correlator.fail_all(ReplyError::Disconnected);
        self.events.unsubscribe();
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "error closing transport");
            }
        }
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        resolved
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.correlator.fail_all(ReplyError::Disconnected);
        let handle = self
            .reader
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

// ── In-flight write ───────────────────────────────────────────────────────────

/// The writer lock held across one packet write.
///
/// Dropping it while the writer is torn, whether after a timeout or because
/// the caller's future was dropped mid-write, fails the connection.
struct InFlightWrite<'a> {
    slot: MutexGuard<'a, Option<Writer>>,
    connection: &'a Connection,
}

impl InFlightWrite<'_> {
    fn fail(&mut self) {
        self.connection.fail_transport(&mut self.slot);
    }
}

impl Drop for InFlightWrite<'_> {
    fn drop(&mut self) {
        if self.slot.as_ref().is_some_and(Writer::is_torn) {
            error!("packet only partly written; closing connection");
            self.fail();
        }
    }
}

// ── Read loop ─────────────────────────────────────────────────────────────────

async fn read_loop(
    mut reader: Reader,
    correlator: Arc<Correlator>,
    events: Arc<EventListener>,
    state: Arc<Mutex<ConnectionState>>,
) {
    loop {
        match reader.read_packet().await {
            Ok(packet) => dispatch(&packet, &correlator, &events),
            Err(TransportError::ConnectionClosed) => {
                info!("server closed the connection");
                break;
            }
            Err(e) => {
                error!(error = %e, "transport failed");
                break;
            }
        }
    }

    let resolved = correlator.fail_all(ReplyError::Disconnected);
    events.unsubscribe();
    let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if *state != ConnectionState::Disconnected {
        *state = ConnectionState::Failed;
    }
    debug!(resolved, "read loop finished");
}

/// Routes one inbound packet.  Nothing here can end the connection.
fn dispatch(packet: &Packet, correlator: &Correlator, events: &EventListener) {
    if !packet.header.is_control() {
        warn!(channel = packet.header.channel, "dropping packet on a stream channel");
        return;
    }
    let (header, body) = match split_control(&packet.payload) {
        Ok(split) => split,
        Err(e) => {
            warn!(error = %e, "dropping unreadable control packet");
            return;
        }
    };
    let tag = header.tag;
    if tag == RESERVED_EVENT_TAG {
        events.deliver(header.command, body);
        return;
    }

    match header.command() {
        Ok(Command::Reply) => match decode(body) {
            Ok(values) => {
                if !correlator.complete(tag, values, packet.header.continues_list()) {
                    debug!(tag, "reply for a tag that is not pending");
                }
            }
            Err(e) => {
                warn!(tag, error = %e, "dropping reply that failed to decode");
                correlator.fail(tag, ReplyError::Decode(e));
            }
        },
        Ok(Command::Error) => {
            let code = parse_error_body(body).unwrap_or_else(|e| {
                warn!(tag, error = %e, "error reply without a readable code");
                ErrorCode::Protocol
            });
            debug!(tag, %code, "server error reply");
            correlator.fail(tag, ReplyError::Server(code));
        }
        Ok(Command::Timeout) => {
            correlator.fail(tag, ReplyError::TimedOut);
        }
        Ok(command) if command.is_stream_notification() => {
            debug!(?command, "ignoring stream notification");
        }
        Ok(command) => {
            warn!(?command, tag, "unexpected command from server");
        }
        Err(raw) => {
            warn!(command = raw, tag, "unsupported command from server");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::MockConnector;
    use pulse_proto::protocol::{build_control, frame_control};

    fn fast_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.timeouts.connect_ms = 200;
        config.timeouts.request_ms = 200;
        let cookie = std::env::temp_dir().join(format!("pulse-client-cookie-{}", uuid::Uuid::new_v4()));
        std::fs::write(&cookie, [0u8; 256]).unwrap();
        config.client.cookie_path = Some(cookie);
        config
    }

    fn endpoint() -> Endpoint {
        Endpoint::Unix("/nonexistent/pulse/native".into())
    }

    fn reply_packet(tag: u32, args: &[Value], continues: bool) -> Packet {
        let payload = build_control(Command::Reply, tag, args);
        let framed = frame_control(&payload, continues);
        let header_bytes: [u8; 20] = framed[..20].try_into().unwrap();
        Packet {
            header: pulse_proto::protocol::PacketHeader::from_bytes(&header_bytes).unwrap(),
            payload,
        }
    }

    #[tokio::test]
    async fn test_permission_denied_surfaces_as_connect_error() {
        // Arrange
        let mut connector = MockConnector::new();
        connector.expect_connect().returning(|endpoint| {
            Err(ConnectError::PermissionDenied {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        });

        // Act
        let result = Connection::connect_with(&connector, &endpoint(), &fast_config()).await;

        // Assert
        assert!(matches!(
            result,
            Err(ClientError::Connect(ConnectError::PermissionDenied { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_surfaces_as_connect_error() {
        let mut connector = MockConnector::new();
        connector.expect_connect().times(1).returning(|endpoint| {
            Err(ConnectError::Unreachable {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            })
        });

        let result = Connection::connect_with(&connector, &endpoint(), &fast_config()).await;

        assert!(matches!(
            result,
            Err(ClientError::Connect(ConnectError::Unreachable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_routes_reply_to_its_tag() {
        // Arrange
        let correlator = Correlator::new();
        let events = EventListener::new();
        let (tag, rx) = correlator.register(Command::LoadModule).unwrap();

        // Act
        dispatch(&reply_packet(tag, &[Value::U32(7)], false), &correlator, &events);

        // Assert
        assert_eq!(rx.await.unwrap(), Ok(vec![Value::U32(7)]));
    }

    #[tokio::test]
    async fn test_dispatch_error_reply_resolves_with_code() {
        let correlator = Correlator::new();
        let events = EventListener::new();
        let (tag, rx) = correlator.register(Command::GetSinkInfo).unwrap();
        let payload = build_control(Command::Error, tag, &[Value::U32(ErrorCode::NoEntity as u32)]);
        let packet = Packet {
            header: pulse_proto::protocol::PacketHeader::control(payload.len() as u32),
            payload,
        };

        dispatch(&packet, &correlator, &events);

        assert_eq!(rx.await.unwrap(), Err(ReplyError::Server(ErrorCode::NoEntity)));
    }

    #[test]
    fn test_dispatch_ignores_stream_channel_packets() {
        let correlator = Correlator::new();
        let events = EventListener::new();
        let (tag, _rx) = correlator.register(Command::GetSinkInfo).unwrap();
        let mut packet = reply_packet(tag, &[], false);
        packet.header.channel = 0;

        dispatch(&packet, &correlator, &events);

        assert!(correlator.is_pending(tag));
    }

    #[tokio::test]
    async fn test_pending_request_times_out_and_frees_slot() {
        // Arrange
        let correlator = Arc::new(Correlator::new());
        let (tag, rx) = correlator.register(Command::GetServerInfo).unwrap();
        let pending = PendingRequest {
            tag,
            rx: Some(rx),
            correlator: Arc::clone(&correlator),
        };

        // Act
        let result = pending.wait(Duration::from_millis(10)).await;

        // Assert
        assert!(matches!(result, Err(ClientError::TimedOut)));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_dropping_pending_request_cancels_tag() {
        let correlator = Arc::new(Correlator::new());
        let (tag, rx) = correlator.register(Command::GetServerInfo).unwrap();
        drop(PendingRequest {
            tag,
            rx: Some(rx),
            correlator: Arc::clone(&correlator),
        });
        assert!(!correlator.is_pending(tag));
    }
}
