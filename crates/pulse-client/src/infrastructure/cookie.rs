//! Authentication cookie lookup.
//!
//! The server compares the 256-byte cookie in `AUTH` against its own copy.
//! When no cookie file is configured and none exists in the usual locations
//! the client sends zeros, which servers configured for anonymous access
//! accept.  An explicitly configured file must exist.

use std::path::{Path, PathBuf};

use pulse_proto::protocol::COOKIE_LENGTH;
use tracing::debug;

use crate::infrastructure::transport::ConnectError;

/// Default cookie locations, first match wins.
fn default_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(env) = std::env::var_os("PULSE_COOKIE").filter(|v| !v.is_empty()) {
        paths.push(PathBuf::from(env));
    }
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".config").join("pulse").join("cookie"));
        paths.push(home.join(".pulse-cookie"));
    }
    paths
}

/// Loads the cookie to send with `AUTH`.
///
/// # Errors
///
/// Returns [`ConnectError::Cookie`] when the configured file is missing, or
/// when any cookie file exists but cannot be read or has the wrong length.
/// A missing file in a default location is not an error.
pub fn load_cookie(configured: Option<&Path>) -> Result<Vec<u8>, ConnectError> {
    if let Some(path) = configured {
        return read_cookie(path)?.ok_or_else(|| ConnectError::Cookie {
            path: path.to_path_buf(),
            reason: "configured cookie file does not exist".to_string(),
        });
    }
    for path in default_paths() {
        if let Some(cookie) = read_cookie(&path)? {
            return Ok(cookie);
        }
    }
    debug!("no auth cookie found; authenticating anonymously");
    Ok(vec![0; COOKIE_LENGTH])
}

/// `Ok(None)` when the file does not exist.
fn read_cookie(path: &Path) -> Result<Option<Vec<u8>>, ConnectError> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.len() == COOKIE_LENGTH => {
            debug!(path = %path.display(), "loaded auth cookie");
            Ok(Some(bytes))
        }
        Ok(bytes) => Err(ConnectError::Cookie {
            path: path.to_path_buf(),
            reason: format!("expected {COOKIE_LENGTH} bytes, found {}", bytes.len()),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConnectError::Cookie {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
