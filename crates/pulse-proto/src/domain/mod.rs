//! Domain records decoded from server replies.
//!
//! Each record kind has a fixed field order on the wire, gated on the
//! negotiated protocol version.  Records are plain values: they are
//! snapshots of server state at the time of the reply and are never updated.

pub mod card;
pub mod device;
pub mod event;
pub mod format;
pub mod module;
pub mod proplist;
pub mod sample;
pub mod server;
pub mod volume;

use crate::protocol::fields::Fields;
use crate::protocol::tagstruct::{DecodeError, Value};

/// A record with a version-dependent value layout.
pub trait Record: Sized {
    /// Pulls one record's fields from `fields`.
    fn decode(fields: &mut Fields<'_>, version: u32) -> Result<Self, DecodeError>;

    /// Appends the record's fields in the layout a server of `version` sends.
    fn encode(&self, out: &mut Vec<Value>, version: u32);
}

/// Decodes records back to back until the values are exhausted.
pub fn decode_records<R: Record>(values: &[Value], version: u32) -> Result<Vec<R>, DecodeError> {
    let mut fields = Fields::new(values);
    let mut records = Vec::new();
    while !fields.is_empty() {
        records.push(R::decode(&mut fields, version)?);
    }
    tracing::trace!(count = records.len(), version, "decoded record list");
    Ok(records)
}

/// Decodes exactly one record; trailing values from newer servers are ignored.
pub fn decode_record<R: Record>(values: &[Value], version: u32) -> Result<R, DecodeError> {
    R::decode(&mut Fields::new(values), version)
}

pub fn encode_records<R: Record>(records: &[R], version: u32) -> Vec<Value> {
    let mut out = Vec::new();
    for record in records {
        record.encode(&mut out, version);
    }
    out
}

pub(crate) fn opt_index(index: Option<u32>) -> Value {
    Value::U32(index.unwrap_or(crate::protocol::command::INVALID_INDEX))
}

pub use card::{CardInfo, CardPort, CardProfile, PortDirection};
pub use device::{DeviceFlags, DevicePort, DeviceState, PortAvailable, SinkInfo, SourceInfo};
pub use event::{EventKind, Facility, SubscriptionEvent, SubscriptionMask};
pub use format::FormatInfo;
pub use module::{ModuleArguments, ModuleInfo};
pub use proplist::Proplist;
pub use sample::{ChannelMap, SampleFormat, SampleSpec, TooManyChannels, CHANNELS_MAX};
pub use server::ServerInfo;
pub use volume::{CVolume, Volume};
