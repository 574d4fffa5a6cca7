//! Property lists: free-form metadata attached to clients, devices and modules.
//!
//! Values are raw bytes on the wire.  String properties are stored with a
//! trailing NUL byte, which [`Proplist::get_str`] strips and
//! [`Proplist::set_str`] appends, so callers never see it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known property keys.
pub mod keys {
    pub const APPLICATION_NAME: &str = "application.name";
    pub const APPLICATION_ID: &str = "application.id";
    pub const APPLICATION_VERSION: &str = "application.version";
    pub const APPLICATION_PROCESS_ID: &str = "application.process.id";
    pub const APPLICATION_PROCESS_BINARY: &str = "application.process.binary";
    pub const DEVICE_DESCRIPTION: &str = "device.description";
    pub const DEVICE_CLASS: &str = "device.class";
    pub const DEVICE_API: &str = "device.api";
    pub const DEVICE_BUS: &str = "device.bus";
    pub const DEVICE_PRODUCT_NAME: &str = "device.product.name";
    pub const DEVICE_ICON_NAME: &str = "device.icon_name";
    pub const MODULE_AUTHOR: &str = "module.author";
    pub const MODULE_DESCRIPTION: &str = "module.description";
    pub const MODULE_USAGE: &str = "module.usage";
    pub const MODULE_VERSION: &str = "module.version";
}

/// Ordered string → bytes map.
///
/// `BTreeMap` keeps encoding deterministic, which the round-trip tests rely on.
/// Keys are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<u8>>")]
pub struct Proplist(BTreeMap<String, Vec<u8>>);

impl Proplist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts raw bytes under `key`, replacing any previous value.
    ///
    /// Returns `false` and leaves the list unchanged when `key` is empty.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> bool {
        let key = key.into();
        if key.is_empty() {
            return false;
        }
        self.0.insert(key, value.into());
        true
    }

    /// Inserts a string property (stored NUL-terminated on the wire).
    ///
    /// Returns `false` and leaves the list unchanged when `key` is empty.
    pub fn set_str(&mut self, key: impl Into<String>, value: &str) -> bool {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.set(key, bytes)
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Returns the property as text if it is valid UTF-8 (trailing NUL removed).
    pub fn get_str(&self, key: &str) -> Option<&str> {
        let bytes = self.0.get(key)?;
        let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
        std::str::from_utf8(bytes).ok()
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Entries with an empty key are dropped.
impl FromIterator<(String, Vec<u8>)> for Proplist {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(k, _)| !k.is_empty()).collect())
    }
}

/// Property list with an empty key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("proplist keys must not be empty")]
pub struct EmptyKey;

impl TryFrom<BTreeMap<String, Vec<u8>>> for Proplist {
    type Error = EmptyKey;

    fn try_from(map: BTreeMap<String, Vec<u8>>) -> Result<Self, Self::Error> {
        if map.contains_key("") {
            return Err(EmptyKey);
        }
        Ok(Self(map))
    }
}
