//! Scripted in-memory sound server for integration tests.
//!
//! The client half of a `tokio::io::duplex` pipe is handed out through
//! [`DuplexConnector`]; the server half is driven by [`FakeServer`], which
//! answers the commands the client sends from fixture records.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pulse_client::infrastructure::endpoint::Endpoint;
use pulse_client::infrastructure::transport::{
    BoxedStream, ConnectError, Connector, PacketReader, PacketWriter,
};
use pulse_client::ClientConfig;
use pulse_proto::domain::sample::ChannelMap;
use pulse_proto::domain::volume::{CVolume, Volume};
use pulse_proto::domain::{
    encode_records, CardInfo, CardProfile, ModuleInfo, Record, ServerInfo, SinkInfo, SourceInfo,
    SubscriptionEvent,
};
use pulse_proto::protocol::{
    build_control, decode, split_control, Command, ErrorCode, Fields, Value, INVALID_INDEX,
    PROTOCOL_VERSION, RESERVED_EVENT_TAG,
};
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

// ── Connector ─────────────────────────────────────────────────────────────────

/// Hands out one pre-made stream, then refuses.
pub struct DuplexConnector {
    stream: Mutex<Option<DuplexStream>>,
}

impl DuplexConnector {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
        }
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, ConnectError> {
        let stream = self.stream.lock().unwrap().take();
        match stream {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(ConnectError::Unreachable {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

pub fn test_endpoint() -> Endpoint {
    Endpoint::Unix("/run/test/pulse/native".into())
}

pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.client.application_name = "integration-test".to_string();
    let cookie = std::env::temp_dir().join(format!("pulse-client-cookie-{}", uuid::Uuid::new_v4()));
    std::fs::write(&cookie, [0x5Au8; 256]).unwrap();
    config.client.cookie_path = Some(cookie);
    config.timeouts.connect_ms = 1_000;
    config.timeouts.request_ms = 1_000;
    config
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub fn sink(index: u32, name: &str) -> SinkInfo {
    SinkInfo {
        index,
        name: name.to_string(),
        description: format!("{name} output"),
        channel_map: ChannelMap::stereo(),
        volume: CVolume::uniform(2, Volume::NORMAL),
        monitor_source: Some(index + 100),
        monitor_source_name: Some(format!("{name}.monitor")),
        driver: "module-alsa-card.c".to_string(),
        base_volume: Volume::NORMAL,
        ..SinkInfo::default()
    }
}

pub fn source(index: u32, name: &str) -> SourceInfo {
    SourceInfo {
        index,
        name: name.to_string(),
        description: format!("{name} input"),
        channel_map: ChannelMap::stereo(),
        volume: CVolume::uniform(2, Volume::NORMAL),
        driver: "module-alsa-card.c".to_string(),
        base_volume: Volume::NORMAL,
        ..SourceInfo::default()
    }
}

pub fn card(index: u32, name: &str, profiles: &[&str]) -> CardInfo {
    CardInfo {
        index,
        name: name.to_string(),
        owner_module: Some(7),
        driver: "module-alsa-card.c".to_string(),
        profiles: profiles
            .iter()
            .map(|p| CardProfile {
                name: p.to_string(),
                description: p.to_string(),
                n_sinks: 1,
                n_sources: 1,
                priority: 100,
                available: true,
            })
            .collect(),
        active_profile: profiles.first().map(|p| p.to_string()),
        ..CardInfo::default()
    }
}

pub fn module(index: u32, name: &str, argument: Option<&str>) -> ModuleInfo {
    ModuleInfo {
        index,
        name: name.to_string(),
        argument: argument.map(str::to_string),
        n_used: None,
        ..ModuleInfo::default()
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// What the fake server holds and how it misbehaves.
pub struct FakeServer {
    pub version: u32,
    pub server_info: ServerInfo,
    pub sinks: Vec<SinkInfo>,
    pub sources: Vec<SourceInfo>,
    pub cards: Vec<CardInfo>,
    pub modules: Vec<ModuleInfo>,
    /// Hold this many post-handshake commands, then answer them newest first.
    pub reverse_batch: usize,
    /// Send list replies one record per packet followed by an empty final
    /// packet.
    pub split_lists: bool,
    /// Commands that never get an answer.
    pub silent: Vec<Command>,
    /// Pushed on the event tag right after a non-empty SUBSCRIBE is answered.
    pub events_after_subscribe: Vec<SubscriptionEvent>,
    /// Answer AUTH with an error.
    pub reject_auth: bool,
    /// Bytes the in-memory pipe buffers in each direction.
    pub pipe_capacity: usize,
    /// Stop reading the socket once SET_CLIENT_NAME is answered, keeping it open.
    pub stop_reading_after_handshake: bool,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            server_info: ServerInfo {
                package_name: "fake-pulse".to_string(),
                package_version: "16.1".to_string(),
                user_name: "tester".to_string(),
                host_name: "localhost".to_string(),
                default_sink_name: Some("speakers".to_string()),
                default_source_name: Some("mic".to_string()),
                channel_map: ChannelMap::stereo(),
                ..ServerInfo::default()
            },
            sinks: vec![sink(0, "speakers"), sink(1, "hdmi")],
            sources: vec![source(0, "mic")],
            cards: vec![card(0, "card0", &["output:analog-stereo", "off"])],
            modules: vec![
                module(0, "module-native-protocol-unix", None),
                module(7, "module-alsa-card", Some("device_id=0")),
            ],
            reverse_batch: 0,
            split_lists: false,
            silent: Vec::new(),
            events_after_subscribe: Vec::new(),
            reject_auth: false,
            pipe_capacity: 1 << 20,
            stop_reading_after_handshake: false,
        }
    }
}

/// Observations shared between the server task and the test.
#[derive(Default)]
pub struct ServerLog {
    pub commands: Vec<Command>,
    pub tags: Vec<u32>,
    pub client_name: Option<String>,
}

pub struct ServerHandle {
    pub log: Arc<Mutex<ServerLog>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn commands(&self) -> Vec<Command> {
        self.log.lock().unwrap().commands.clone()
    }

    pub fn tags(&self) -> Vec<u32> {
        self.log.lock().unwrap().tags.clone()
    }

    /// Kills the server; the client sees the socket close.
    pub fn kill(&self) {
        self.task.abort();
    }
}

type Reply = (Vec<u8>, bool);

impl FakeServer {
    /// Starts the server task and returns the client's connector.
    pub fn spawn(self) -> (DuplexConnector, ServerHandle) {
        let (client, server) = tokio::io::duplex(self.pipe_capacity);
        let log = Arc::new(Mutex::new(ServerLog::default()));
        let task = tokio::spawn(self.run(server, Arc::clone(&log)));
        (DuplexConnector::new(client), ServerHandle { log, task })
    }

    fn negotiated(&self) -> u32 {
        self.version.min(PROTOCOL_VERSION)
    }

    async fn run(mut self, stream: DuplexStream, log: Arc<Mutex<ServerLog>>) {
        let (read, write) = tokio::io::split(stream);
        let mut reader = PacketReader::new(read);
        let mut writer = PacketWriter::new(write);
        let mut held: Vec<Vec<Reply>> = Vec::new();

        while let Ok(packet) = reader.read_packet().await {
            let Ok((header, body)) = split_control(&packet.payload) else {
                continue;
            };
            let Ok(command) = header.command() else {
                continue;
            };
            let args = decode(body).unwrap_or_default();
            {
                let mut log = log.lock().unwrap();
                log.commands.push(command);
                log.tags.push(header.tag);
            }
            if self.silent.contains(&command) {
                continue;
            }

            let replies = self.handle(command, header.tag, &args, &log);
            let handshake = matches!(command, Command::Auth | Command::SetClientName);
            if self.reverse_batch > 1 && !handshake {
                held.push(replies);
                if held.len() < self.reverse_batch {
                    continue;
                }
                for replies in held.drain(..).rev() {
                    for (payload, continues) in replies {
                        if writer.write_packet(&payload, continues).await.is_err() {
                            return;
                        }
                    }
                }
                continue;
            }
            for (payload, continues) in replies {
                if writer.write_packet(&payload, continues).await.is_err() {
                    return;
                }
            }
            if self.stop_reading_after_handshake && command == Command::SetClientName {
                std::future::pending::<()>().await;
            }
        }
    }

    fn handle(
        &mut self,
        command: Command,
        tag: u32,
        args: &[Value],
        log: &Mutex<ServerLog>,
    ) -> Vec<Reply> {
        let version = self.negotiated();
        let mut fields = Fields::new(args);
        match command {
            Command::Auth if self.reject_auth => error(tag, ErrorCode::AuthKey),
            Command::Auth => reply(tag, &[Value::U32(self.version)]),
            Command::SetClientName => {
                if let Ok(props) = fields.proplist("props") {
                    log.lock().unwrap().client_name = props
                        .get_str("application.name")
                        .map(str::to_string);
                }
                reply(tag, &[Value::U32(17)])
            }
            Command::GetServerInfo => {
                let mut out = Vec::new();
                self.server_info.encode(&mut out, version);
                reply(tag, &out)
            }
            Command::GetSinkInfoList => self.list(tag, &self.sinks, version),
            Command::GetSourceInfoList => self.list(tag, &self.sources, version),
            Command::GetCardInfoList => self.list(tag, &self.cards, version),
            Command::GetModuleInfoList => self.list(tag, &self.modules, version),
            Command::GetSinkInfo => {
                let (index, name) = lookup_args(&mut fields);
                let found = self.sinks.iter().find(|s| matches(s.index, &s.name, index, &name));
                one(tag, found, version)
            }
            Command::GetSourceInfo => {
                let (index, name) = lookup_args(&mut fields);
                let found = self.sources.iter().find(|s| matches(s.index, &s.name, index, &name));
                one(tag, found, version)
            }
            Command::GetCardInfo => {
                let (index, name) = lookup_args(&mut fields);
                let found = self.cards.iter().find(|c| matches(c.index, &c.name, index, &name));
                one(tag, found, version)
            }
            Command::GetModuleInfo => {
                let index = fields.u32("index").unwrap_or(INVALID_INDEX);
                let found = self.modules.iter().find(|m| m.index == index);
                one(tag, found, version)
            }
            Command::LoadModule => {
                let name = fields.string_or_empty("name").unwrap_or_default();
                let argument = fields.string("argument").unwrap_or_default();
                if !name.starts_with("module-") {
                    return error(tag, ErrorCode::ModInitFailed);
                }
                let index = self.modules.iter().map(|m| m.index + 1).max().unwrap_or(0);
                self.modules.push(ModuleInfo {
                    index,
                    name,
                    argument,
                    ..ModuleInfo::default()
                });
                reply(tag, &[Value::U32(index)])
            }
            Command::UnloadModule => {
                let index = fields.u32("index").unwrap_or(INVALID_INDEX);
                match self.modules.iter().position(|m| m.index == index) {
                    Some(pos) => {
                        self.modules.remove(pos);
                        reply(tag, &[])
                    }
                    None => error(tag, ErrorCode::NoEntity),
                }
            }
            Command::SetCardProfile => {
                let (index, name) = lookup_args(&mut fields);
                let profile = fields.string_or_empty("profile").unwrap_or_default();
                let card = self
                    .cards
                    .iter_mut()
                    .find(|c| matches(c.index, &c.name, index, &name));
                match card {
                    Some(card) if card.profile(&profile).is_some() => {
                        card.active_profile = Some(profile);
                        reply(tag, &[])
                    }
                    _ => error(tag, ErrorCode::NoEntity),
                }
            }
            Command::Subscribe => {
                let mask = fields.u32("mask").unwrap_or(0);
                let mut replies = reply(tag, &[]);
                if mask != 0 {
                    for event in &self.events_after_subscribe {
                        replies.push((
                            build_control(Command::SubscribeEvent, RESERVED_EVENT_TAG, &event.encode()),
                            false,
                        ));
                    }
                }
                replies
            }
            _ => error(tag, ErrorCode::Command),
        }
    }

    fn list<R: Record>(&self, tag: u32, records: &[R], version: u32) -> Vec<Reply> {
        if !self.split_lists {
            return reply(tag, &encode_records(records, version));
        }
        let mut replies: Vec<Reply> = records
            .iter()
            .map(|r| {
                let values = encode_records(std::slice::from_ref(r), version);
                (build_control(Command::Reply, tag, &values), true)
            })
            .collect();
        replies.push((build_control(Command::Reply, tag, &[]), false));
        replies
    }
}

fn reply(tag: u32, values: &[Value]) -> Vec<Reply> {
    vec![(build_control(Command::Reply, tag, values), false)]
}

fn error(tag: u32, code: ErrorCode) -> Vec<Reply> {
    vec![(build_control(Command::Error, tag, &[Value::U32(code as u32)]), false)]
}

fn one<R: Record>(tag: u32, record: Option<&R>, version: u32) -> Vec<Reply> {
    match record {
        Some(record) => {
            let mut out = Vec::new();
            record.encode(&mut out, version);
            reply(tag, &out)
        }
        None => error(tag, ErrorCode::NoEntity),
    }
}

fn lookup_args(fields: &mut Fields<'_>) -> (u32, Option<String>) {
    let index = fields.u32("index").unwrap_or(INVALID_INDEX);
    let name = fields.string("name").unwrap_or_default();
    (index, name)
}

fn matches(index: u32, name: &str, wanted_index: u32, wanted_name: &Option<String>) -> bool {
    match wanted_name {
        Some(wanted) => name == wanted,
        None => index == wanted_index,
    }
}
