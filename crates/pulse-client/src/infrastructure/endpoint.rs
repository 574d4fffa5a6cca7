//! Server endpoint parsing and default resolution.
//!
//! Accepted address forms:
//!
//! | Input                    | Endpoint                         |
//! |--------------------------|----------------------------------|
//! | `unix:/run/pulse/native` | Unix socket at that path         |
//! | `/run/pulse/native`      | Unix socket at that path         |
//! | `tcp:host` / `tcp:host:port` | TCP, port 4713 when omitted  |
//! | `host:port` / `host`     | TCP, port 4713 when omitted      |
//!
//! `PULSE_SERVER` may hold a whitespace-separated list; the first entry wins.

use std::fmt;
use std::path::PathBuf;

/// Port the server listens on for TCP clients.
pub const DEFAULT_TCP_PORT: u16 = 4713;

/// Where to dial the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Unix(PathBuf),
    /// `host:port`, ready for `TcpStream::connect`.
    Tcp(String),
}

/// Reason an address string was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("empty server address")]
    Empty,
    #[error("invalid port in server address {0:?}")]
    InvalidPort(String),
}

impl Endpoint {
    /// Parses one address.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] for an empty address or a non-numeric port.
    pub fn parse(address: &str) -> Result<Self, EndpointError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(EndpointError::Empty);
        }
        // Server list entries may be prefixed with `{machine-id}`.
        let address = match address.strip_prefix('{') {
            Some(rest) => rest.split_once('}').map_or(address, |(_, a)| a),
            None => address,
        };
        if let Some(path) = address.strip_prefix("unix:") {
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if address.starts_with('/') {
            return Ok(Endpoint::Unix(PathBuf::from(address)));
        }
        let host = address
            .strip_prefix("tcp4:")
            .or_else(|| address.strip_prefix("tcp6:"))
            .or_else(|| address.strip_prefix("tcp:"))
            .unwrap_or(address);
        if host.is_empty() {
            return Err(EndpointError::Empty);
        }
        Ok(Endpoint::Tcp(with_port(host, address)?))
    }

    /// Picks the endpoint to dial.
    ///
    /// Order: `configured`, then `PULSE_SERVER`, then
    /// `$XDG_RUNTIME_DIR/pulse/native`, then `/var/run/pulse/native`.
    pub fn resolve(configured: Option<&str>) -> Result<Self, EndpointError> {
        if let Some(address) = configured {
            return Self::parse(address);
        }
        if let Ok(list) = std::env::var("PULSE_SERVER") {
            if let Some(first) = list.split_whitespace().next() {
                return Self::parse(first);
            }
        }
        Ok(Self::local_default())
    }

    /// The per-user runtime socket, or the system-wide one.
    pub fn local_default() -> Self {
        match std::env::var_os("XDG_RUNTIME_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => Endpoint::Unix(PathBuf::from(dir).join("pulse").join("native")),
            None => Endpoint::Unix(PathBuf::from("/var/run/pulse/native")),
        }
    }
}

fn with_port(host: &str, original: &str) -> Result<String, EndpointError> {
    // Bracketed IPv6: [::1] or [::1]:4713
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((addr, "")) => Ok(format!("[{addr}]:{DEFAULT_TCP_PORT}")),
            Some((addr, port)) => {
                let port = port
                    .strip_prefix(':')
                    .and_then(|p| p.parse::<u16>().ok())
                    .ok_or_else(|| EndpointError::InvalidPort(original.to_string()))?;
                Ok(format!("[{addr}]:{port}"))
            }
            None => Err(EndpointError::InvalidPort(original.to_string())),
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') => {
            let port: u16 = port
                .parse()
                .map_err(|_| EndpointError::InvalidPort(original.to_string()))?;
            Ok(format!("{name}:{port}"))
        }
        // Bare IPv6 without brackets.
        Some(_) => Ok(format!("[{host}]:{DEFAULT_TCP_PORT}")),
        None => Ok(format!("{host}:{DEFAULT_TCP_PORT}")),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
