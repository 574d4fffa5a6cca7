//! Public error type of the client API.

use pulse_proto::protocol::{DecodeError, ErrorCode};
use thiserror::Error;

use crate::application::correlator::ReplyError;
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::transport::{ConnectError, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Version negotiation or authentication did not succeed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The socket failed; the connection is unusable.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A reply did not decode as the expected record.
    #[error("malformed reply: {0}")]
    Decode(#[from] DecodeError),

    /// The server rejected one command.  The connection stays usable.
    #[error("server error: {code}")]
    Server { code: ErrorCode },

    #[error("no such entity")]
    NotFound,

    #[error("profile {profile:?} rejected: {code}")]
    InvalidProfile { profile: String, code: ErrorCode },

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out")]
    TimedOut,

    #[error("disconnected")]
    Disconnected,

    #[error("not connected")]
    NotConnected,
}

impl From<ReplyError> for ClientError {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::Server(code) => ClientError::Server { code },
            ReplyError::Decode(e) => ClientError::Decode(e),
            ReplyError::Cancelled => ClientError::Cancelled,
            ReplyError::TimedOut => ClientError::TimedOut,
            ReplyError::Disconnected => ClientError::Disconnected,
        }
    }
}

impl ClientError {
    /// The server error code, if this error came from an error reply.
    pub fn server_code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Server { code } | ClientError::InvalidProfile { code, .. } => Some(*code),
            ClientError::NotFound => Some(ErrorCode::NoEntity),
            _ => None,
        }
    }

    /// Maps a "no such entity" reply on a lookup to [`ClientError::NotFound`].
    pub(crate) fn lookup(self) -> Self {
        match self {
            ClientError::Server {
                code: ErrorCode::NoEntity,
            } => ClientError::NotFound,
            other => other,
        }
    }

    /// Maps profile rejections to [`ClientError::InvalidProfile`].
    pub(crate) fn profile(self, profile: &str) -> Self {
        match self {
            ClientError::Server {
                code: code @ (ErrorCode::NoEntity | ErrorCode::Invalid | ErrorCode::NotSupported),
            } => ClientError::InvalidProfile {
                profile: profile.to_string(),
                code,
            },
            other => other,
        }
    }
}
