//! Connection handshake: version negotiation, authentication and client name.
//!
//! ```text
//! client                                  server
//!   AUTH [version=35, cookie(256)]  ──▶
//!                                   ◀──  REPLY [server version | flags]
//!   SET_CLIENT_NAME [proplist]      ──▶
//!                                   ◀──  REPLY [client index]
//! ```
//!
//! The low 16 bits of the server's reply are its protocol version; the upper
//! bits advertise shared-memory transports, which this client does not use.
//! Both sides then speak the lower of the two versions.

use pulse_proto::domain::proplist::{keys, Proplist};
use pulse_proto::protocol::{Fields, Value, MIN_SERVER_VERSION, PROTOCOL_VERSION};

use crate::application::error::ClientError;

const VERSION_MASK: u32 = 0x0000_FFFF;

/// Outcome of a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeInfo {
    pub server_version: u32,
    /// min(client, server)
    pub protocol_version: u32,
    pub client_index: u32,
}

pub fn auth_args(cookie: &[u8]) -> Vec<Value> {
    vec![Value::U32(PROTOCOL_VERSION), Value::Arbitrary(cookie.to_vec())]
}

/// Reads the server version from an `AUTH` reply.
///
/// Returns `(server_version, negotiated_version)`.
///
/// # Errors
///
/// [`ClientError::HandshakeFailed`] for a malformed reply or a server older
/// than [`MIN_SERVER_VERSION`].
pub fn parse_auth_reply(values: &[Value]) -> Result<(u32, u32), ClientError> {
    let raw = Fields::new(values)
        .u32("server_version")
        .map_err(|e| ClientError::HandshakeFailed(format!("bad AUTH reply: {e}")))?;
    let server_version = raw & VERSION_MASK;
    if server_version < MIN_SERVER_VERSION {
        return Err(ClientError::HandshakeFailed(format!(
            "server protocol version {server_version} is older than {MIN_SERVER_VERSION}"
        )));
    }
    Ok((server_version, server_version.min(PROTOCOL_VERSION)))
}

/// Properties sent with `SET_CLIENT_NAME`.
pub fn client_proplist(application_name: &str) -> Proplist {
    let mut props = Proplist::new();
    props.set_str(keys::APPLICATION_NAME, application_name);
    props.set_str(keys::APPLICATION_PROCESS_ID, &std::process::id().to_string());
    if let Some(binary) = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    {
        props.set_str(keys::APPLICATION_PROCESS_BINARY, &binary);
    }
    props
}

pub fn client_name_args(props: &Proplist) -> Vec<Value> {
    vec![Value::Proplist(props.clone())]
}

/// Reads the client index from a `SET_CLIENT_NAME` reply.
pub fn parse_client_name_reply(values: &[Value]) -> Result<u32, ClientError> {
    Fields::new(values)
        .u32("client_index")
        .map_err(|e| ClientError::HandshakeFailed(format!("bad SET_CLIENT_NAME reply: {e}")))
}
