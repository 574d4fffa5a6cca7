//! Typed cursor over a decoded value sequence.
//!
//! Record decoders pull their fields in wire order; each accessor names the
//! field it expects so a mismatch reports something useful.

use crate::domain::format::FormatInfo;
use crate::domain::proplist::Proplist;
use crate::domain::sample::{ChannelMap, SampleSpec};
use crate::domain::volume::{CVolume, Volume};
use crate::protocol::command::index_or_none;
use crate::protocol::tagstruct::{DecodeError, Value};

/// Walks a `&[Value]` front to back.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    values: &'a [Value],
    pos: usize,
}

macro_rules! typed_field {
    ($name:ident, $variant:ident, $ty:ty, $label:literal) => {
        pub fn $name(&mut self, field: &'static str) -> Result<$ty, DecodeError> {
            match self.next(field)? {
                Value::$variant(v) => Ok(v.clone()),
                other => Err(mismatch($label, other)),
            }
        }
    };
}

fn mismatch(expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::UnexpectedValue {
        expected,
        found: found.type_name().to_string(),
    }
}

impl<'a> Fields<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.values.len()
    }

    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.pos)
    }

    /// Next raw value, or [`DecodeError::MissingField`] naming `field`.
    pub fn next(&mut self, field: &'static str) -> Result<&'a Value, DecodeError> {
        let value = self
            .values
            .get(self.pos)
            .ok_or(DecodeError::MissingField(field))?;
        self.pos += 1;
        Ok(value)
    }

    typed_field!(u8, U8, u8, "u8");
    typed_field!(u32, U32, u32, "u32");
    typed_field!(u64, U64, u64, "u64");
    typed_field!(s64, S64, i64, "s64");
    typed_field!(usec, Usec, u64, "usec");
    typed_field!(boolean, Boolean, bool, "boolean");
    typed_field!(arbitrary, Arbitrary, Vec<u8>, "arbitrary");
    typed_field!(sample_spec, SampleSpec, SampleSpec, "sample spec");
    typed_field!(channel_map, ChannelMap, ChannelMap, "channel map");
    typed_field!(cvolume, CVolume, CVolume, "cvolume");
    typed_field!(volume, Volume, Volume, "volume");
    typed_field!(proplist, Proplist, Proplist, "proplist");
    typed_field!(format_info, FormatInfo, FormatInfo, "format info");

    /// An object index where the invalid sentinel becomes `None`.
    pub fn index(&mut self, field: &'static str) -> Result<Option<u32>, DecodeError> {
        self.u32(field).map(index_or_none)
    }

    /// A nullable string.
    pub fn string(&mut self, field: &'static str) -> Result<Option<String>, DecodeError> {
        match self.next(field)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }

    /// A string the server must not send as NULL.
    pub fn required_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        match self.next(field)? {
            Value::String(Some(s)) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }

    /// A string where NULL is read as empty.
    pub fn string_or_empty(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.string(field).map(Option::unwrap_or_default)
    }
}
