//! Command opcodes, server error codes and protocol constants.
//!
//! Numeric values are fixed by the server's native protocol and must never
//! be renumbered.

use std::fmt;

/// Protocol version this client speaks.
pub const PROTOCOL_VERSION: u32 = 35;

/// Oldest server protocol version the client accepts.
pub const MIN_SERVER_VERSION: u32 = 13;

/// Index value the server uses for "no object".
pub const INVALID_INDEX: u32 = u32::MAX;

/// Length of the authentication cookie sent with `AUTH`.
pub const COOKIE_LENGTH: usize = 256;

/// Maps the server's [`INVALID_INDEX`] sentinel to `None`.
pub fn index_or_none(index: u32) -> Option<u32> {
    (index != INVALID_INDEX).then_some(index)
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Control-channel command opcodes.
///
/// Only the commands this client sends, the generic reply types and the
/// notifications a server may push unprompted are listed.  Anything else
/// fails [`TryFrom<u32>`] and is treated as unsupported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    Error = 0,
    Timeout = 1,
    Reply = 2,
    Auth = 8,
    SetClientName = 9,
    GetServerInfo = 20,
    GetSinkInfo = 21,
    GetSinkInfoList = 22,
    GetSourceInfo = 23,
    GetSourceInfoList = 24,
    GetModuleInfo = 25,
    GetModuleInfoList = 26,
    Subscribe = 35,
    LoadModule = 51,
    UnloadModule = 52,
    Request = 61,
    Overflow = 62,
    Underflow = 63,
    PlaybackStreamKilled = 64,
    RecordStreamKilled = 65,
    SubscribeEvent = 66,
    PlaybackStreamSuspended = 76,
    RecordStreamSuspended = 77,
    PlaybackStreamMoved = 78,
    RecordStreamMoved = 79,
    Started = 86,
    GetCardInfo = 88,
    GetCardInfoList = 89,
    SetCardProfile = 90,
    ClientEvent = 91,
    PlaybackStreamEvent = 92,
    RecordStreamEvent = 93,
    PlaybackBufferAttrChanged = 94,
    RecordBufferAttrChanged = 95,
}

impl TryFrom<u32> for Command {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        let command = match value {
            0 => Command::Error,
            1 => Command::Timeout,
            2 => Command::Reply,
            8 => Command::Auth,
            9 => Command::SetClientName,
            20 => Command::GetServerInfo,
            21 => Command::GetSinkInfo,
            22 => Command::GetSinkInfoList,
            23 => Command::GetSourceInfo,
            24 => Command::GetSourceInfoList,
            25 => Command::GetModuleInfo,
            26 => Command::GetModuleInfoList,
            35 => Command::Subscribe,
            51 => Command::LoadModule,
            52 => Command::UnloadModule,
            61 => Command::Request,
            62 => Command::Overflow,
            63 => Command::Underflow,
            64 => Command::PlaybackStreamKilled,
            65 => Command::RecordStreamKilled,
            66 => Command::SubscribeEvent,
            76 => Command::PlaybackStreamSuspended,
            77 => Command::RecordStreamSuspended,
            78 => Command::PlaybackStreamMoved,
            79 => Command::RecordStreamMoved,
            86 => Command::Started,
            88 => Command::GetCardInfo,
            89 => Command::GetCardInfoList,
            90 => Command::SetCardProfile,
            91 => Command::ClientEvent,
            92 => Command::PlaybackStreamEvent,
            93 => Command::RecordStreamEvent,
            94 => Command::PlaybackBufferAttrChanged,
            95 => Command::RecordBufferAttrChanged,
            other => return Err(other),
        };
        Ok(command)
    }
}

impl Command {
    /// Returns true for list requests whose reply may be split into fragments.
    pub fn is_list_request(self) -> bool {
        matches!(
            self,
            Command::GetSinkInfoList
                | Command::GetSourceInfoList
                | Command::GetModuleInfoList
                | Command::GetCardInfoList
        )
    }

    /// Returns true for stream notifications the server pushes without a request.
    pub fn is_stream_notification(self) -> bool {
        matches!(
            self,
            Command::Request
                | Command::Overflow
                | Command::Underflow
                | Command::PlaybackStreamKilled
                | Command::RecordStreamKilled
                | Command::PlaybackStreamSuspended
                | Command::RecordStreamSuspended
                | Command::PlaybackStreamMoved
                | Command::RecordStreamMoved
                | Command::Started
                | Command::ClientEvent
                | Command::PlaybackStreamEvent
                | Command::RecordStreamEvent
                | Command::PlaybackBufferAttrChanged
                | Command::RecordBufferAttrChanged
        )
    }
}

// ── Error codes ───────────────────────────────────────────────────────────────

/// Error code carried by an `ERROR` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Ok = 0,
    Access = 1,
    Command = 2,
    Invalid = 3,
    Exist = 4,
    NoEntity = 5,
    ConnectionRefused = 6,
    Protocol = 7,
    Timeout = 8,
    AuthKey = 9,
    Internal = 10,
    ConnectionTerminated = 11,
    Killed = 12,
    InvalidServer = 13,
    ModInitFailed = 14,
    BadState = 15,
    NoData = 16,
    Version = 17,
    TooLarge = 18,
    NotSupported = 19,
    Unknown = 20,
    NoExtension = 21,
    Obsolete = 22,
    NotImplemented = 23,
    Forked = 24,
    Io = 25,
    Busy = 26,
}

impl From<u32> for ErrorCode {
    /// Codes this client does not know collapse to [`ErrorCode::Unknown`].
    fn from(value: u32) -> Self {
        match value {
            0 => ErrorCode::Ok,
            1 => ErrorCode::Access,
            2 => ErrorCode::Command,
            3 => ErrorCode::Invalid,
            4 => ErrorCode::Exist,
            5 => ErrorCode::NoEntity,
            6 => ErrorCode::ConnectionRefused,
            7 => ErrorCode::Protocol,
            8 => ErrorCode::Timeout,
            9 => ErrorCode::AuthKey,
            10 => ErrorCode::Internal,
            11 => ErrorCode::ConnectionTerminated,
            12 => ErrorCode::Killed,
            13 => ErrorCode::InvalidServer,
            14 => ErrorCode::ModInitFailed,
            15 => ErrorCode::BadState,
            16 => ErrorCode::NoData,
            17 => ErrorCode::Version,
            18 => ErrorCode::TooLarge,
            19 => ErrorCode::NotSupported,
            21 => ErrorCode::NoExtension,
            22 => ErrorCode::Obsolete,
            23 => ErrorCode::NotImplemented,
            24 => ErrorCode::Forked,
            25 => ErrorCode::Io,
            26 => ErrorCode::Busy,
            _ => ErrorCode::Unknown,
        }
    }
}

impl ErrorCode {
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::Access => "Access denied",
            ErrorCode::Command => "Unknown command",
            ErrorCode::Invalid => "Invalid argument",
            ErrorCode::Exist => "Entity exists",
            ErrorCode::NoEntity => "No such entity",
            ErrorCode::ConnectionRefused => "Connection refused",
            ErrorCode::Protocol => "Protocol error",
            ErrorCode::Timeout => "Timeout",
            ErrorCode::AuthKey => "No authentication key",
            ErrorCode::Internal => "Internal error",
            ErrorCode::ConnectionTerminated => "Connection terminated",
            ErrorCode::Killed => "Entity killed",
            ErrorCode::InvalidServer => "Invalid server",
            ErrorCode::ModInitFailed => "Module initialization failed",
            ErrorCode::BadState => "Bad state",
            ErrorCode::NoData => "No data",
            ErrorCode::Version => "Incompatible protocol version",
            ErrorCode::TooLarge => "Too large",
            ErrorCode::NotSupported => "Not supported",
            ErrorCode::Unknown => "Unknown error code",
            ErrorCode::NoExtension => "No such extension",
            ErrorCode::Obsolete => "Obsolete functionality",
            ErrorCode::NotImplemented => "Missing implementation",
            ErrorCode::Forked => "Client forked",
            ErrorCode::Io => "Input/Output error",
            ErrorCode::Busy => "Device or resource busy",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), *self as u32)
    }
}
