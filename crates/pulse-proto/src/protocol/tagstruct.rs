//! Binary codec for the tagstruct value format.
//!
//! Wire format of a single value:
//! ```text
//! [type_tag:1][payload:N]
//! ```
//! The one-byte tag says how to read the payload, so a buffer can always be
//! decoded without knowing the command it belongs to.  All multi-byte
//! integers are big-endian.
//!
//! # Why typed getters *and* a generic decoder? (for beginners)
//!
//! [`decode`] turns a whole buffer into a `Vec<Value>`; that is what the
//! client hands around once a reply has arrived.  [`TagStructReader`] offers
//! the same walk one getter at a time (`u32()`, `string()`, `boolean()`, ...)
//! which is handy when a caller knows exactly which field comes next, for
//! example while parsing the handshake reply.

use crate::domain::format::FormatInfo;
use crate::domain::proplist::Proplist;
use crate::domain::sample::{ChannelMap, SampleFormat, SampleSpec, TooManyChannels, CHANNELS_MAX};
use crate::domain::volume::{CVolume, Volume};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Type tags ─────────────────────────────────────────────────────────────────

pub const TAG_STRING: u8 = b't';
pub const TAG_STRING_NULL: u8 = b'N';
pub const TAG_U32: u8 = b'L';
pub const TAG_U8: u8 = b'B';
pub const TAG_U64: u8 = b'R';
pub const TAG_S64: u8 = b'r';
pub const TAG_SAMPLE_SPEC: u8 = b'a';
pub const TAG_ARBITRARY: u8 = b'x';
pub const TAG_BOOLEAN_TRUE: u8 = b'1';
pub const TAG_BOOLEAN_FALSE: u8 = b'0';
pub const TAG_TIMEVAL: u8 = b'T';
pub const TAG_USEC: u8 = b'U';
pub const TAG_CHANNEL_MAP: u8 = b'm';
pub const TAG_CVOLUME: u8 = b'v';
pub const TAG_PROPLIST: u8 = b'P';
pub const TAG_VOLUME: u8 = b'V';
pub const TAG_FORMAT_INFO: u8 = b'f';

fn is_known_tag(tag: u8) -> bool {
    matches!(
        tag,
        TAG_STRING
            | TAG_STRING_NULL
            | TAG_U32
            | TAG_U8
            | TAG_U64
            | TAG_S64
            | TAG_SAMPLE_SPEC
            | TAG_ARBITRARY
            | TAG_BOOLEAN_TRUE
            | TAG_BOOLEAN_FALSE
            | TAG_TIMEVAL
            | TAG_USEC
            | TAG_CHANNEL_MAP
            | TAG_CVOLUME
            | TAG_PROPLIST
            | TAG_VOLUME
            | TAG_FORMAT_INFO
    )
}

// ── Values ────────────────────────────────────────────────────────────────────

/// One self-describing tagstruct value.
///
/// Strings are representable only without interior NUL bytes; the writer
/// truncates at the first NUL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    U8(u8),
    U32(u32),
    U64(u64),
    S64(i64),
    /// Microsecond duration (latencies).
    Usec(u64),
    Timeval { sec: u32, usec: u32 },
    /// `None` is the protocol's NULL string.
    String(Option<String>),
    Boolean(bool),
    Arbitrary(Vec<u8>),
    SampleSpec(SampleSpec),
    ChannelMap(ChannelMap),
    CVolume(CVolume),
    Volume(Volume),
    Proplist(Proplist),
    FormatInfo(FormatInfo),
}

impl Value {
    /// Convenience constructor for a non-NULL string.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Some(s.into()))
    }

    /// Human-readable name of the variant, used in decode error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::U8(_) => "u8",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::S64(_) => "s64",
            Value::Usec(_) => "usec",
            Value::Timeval { .. } => "timeval",
            Value::String(Some(_)) => "string",
            Value::String(None) => "null string",
            Value::Boolean(_) => "boolean",
            Value::Arbitrary(_) => "arbitrary",
            Value::SampleSpec(_) => "sample spec",
            Value::ChannelMap(_) => "channel map",
            Value::CVolume(_) => "cvolume",
            Value::Volume(_) => "volume",
            Value::Proplist(_) => "proplist",
            Value::FormatInfo(_) => "format info",
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can occur while decoding tagstruct data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The type tag byte is not a recognized value.
    #[error("malformed tag 0x{tag:02X} at offset {offset}")]
    MalformedTag { tag: u8, offset: usize },

    /// Fewer bytes remain than the declared payload needs.
    #[error("truncated payload: need {needed} bytes, {available} available")]
    TruncatedPayload { needed: usize, available: usize },

    /// A string payload has no NUL terminator before the end of the buffer.
    #[error("string starting at offset {offset} is not NUL-terminated")]
    StringNotTerminated { offset: usize },

    /// A boolean byte other than `'1'` or `'0'`.
    #[error("invalid boolean byte 0x{0:02X}")]
    InvalidBoolean(u8),

    /// A string or proplist key is not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A typed getter found a different (but valid) tag.
    #[error("expected tag '{}' at offset {offset}, found '{}'", *expected as char, *found as char)]
    UnexpectedTag { expected: u8, found: u8, offset: usize },

    /// A decoded value has the wrong type or is out of range for its field.
    #[error("expected {expected}, found {found}")]
    UnexpectedValue { expected: &'static str, found: String },

    /// A record ran out of values before all of its fields were read.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl From<TooManyChannels> for DecodeError {
    fn from(e: TooManyChannels) -> Self {
        DecodeError::UnexpectedValue {
            expected: "at most 32 channels",
            found: e.0.to_string(),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a value sequence into tagstruct bytes.
///
/// # Examples
///
/// ```rust
/// use pulse_proto::protocol::tagstruct::{decode, encode, Value};
///
/// let values = vec![Value::U32(22), Value::string("alsa_output.pci"), Value::Boolean(true)];
/// let bytes = encode(&values);
/// assert_eq!(decode(&bytes).unwrap(), values);
/// ```
pub fn encode(values: &[Value]) -> Vec<u8> {
    let mut writer = TagStructWriter::new();
    for value in values {
        writer.put_value(value);
    }
    writer.into_bytes()
}

/// Decodes every value in `bytes`.
///
/// # Errors
///
/// Returns [`DecodeError`] at the first byte that cannot be decoded.
pub fn decode(bytes: &[u8]) -> Result<Vec<Value>, DecodeError> {
    let mut reader = TagStructReader::new(bytes);
    let mut values = Vec::new();
    while !reader.is_empty() {
        values.push(reader.read_value()?);
    }
    Ok(values)
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Appends tagged values to a growing byte buffer.
#[derive(Debug, Default, Clone)]
pub struct TagStructWriter {
    buf: Vec<u8>,
}

impl TagStructWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(TAG_U8);
        self.buf.push(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.push(TAG_U32);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.push(TAG_U64);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_s64(&mut self, v: i64) {
        self.buf.push(TAG_S64);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_usec(&mut self, v: u64) {
        self.buf.push(TAG_USEC);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_timeval(&mut self, sec: u32, usec: u32) {
        self.buf.push(TAG_TIMEVAL);
        self.buf.extend_from_slice(&sec.to_be_bytes());
        self.buf.extend_from_slice(&usec.to_be_bytes());
    }

    /// Writes a string, or the NULL-string tag for `None`.
    pub fn put_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.buf.push(TAG_STRING);
                let bytes = s.as_bytes();
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                self.buf.extend_from_slice(&bytes[..end]);
                self.buf.push(0);
            }
            None => self.buf.push(TAG_STRING_NULL),
        }
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf
            .push(if v { TAG_BOOLEAN_TRUE } else { TAG_BOOLEAN_FALSE });
    }

    pub fn put_arbitrary(&mut self, data: &[u8]) {
        self.buf.push(TAG_ARBITRARY);
        self.buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(data);
    }

    pub fn put_sample_spec(&mut self, spec: &SampleSpec) {
        self.buf.push(TAG_SAMPLE_SPEC);
        self.buf.push(spec.format as u8);
        self.buf.push(spec.channels);
        self.buf.extend_from_slice(&spec.rate.to_be_bytes());
    }

    pub fn put_channel_map(&mut self, map: &ChannelMap) {
        self.buf.push(TAG_CHANNEL_MAP);
        // ChannelMap holds at most CHANNELS_MAX positions, so the count fits a byte.
        self.buf.push(map.channels() as u8);
        self.buf.extend_from_slice(map.positions());
    }

    pub fn put_cvolume(&mut self, cv: &CVolume) {
        self.buf.push(TAG_CVOLUME);
        self.buf.push(cv.channels() as u8);
        for v in cv.values() {
            self.buf.extend_from_slice(&v.0.to_be_bytes());
        }
    }

    pub fn put_volume(&mut self, v: Volume) {
        self.buf.push(TAG_VOLUME);
        self.buf.extend_from_slice(&v.0.to_be_bytes());
    }

    /// Writes each entry as (key, length, arbitrary) and closes with a NULL string.
    pub fn put_proplist(&mut self, plist: &Proplist) {
        self.buf.push(TAG_PROPLIST);
        for (key, value) in plist.iter() {
            self.put_string(Some(key));
            self.put_u32(value.len() as u32);
            self.put_arbitrary(value);
        }
        self.put_string(None);
    }

    pub fn put_format_info(&mut self, info: &FormatInfo) {
        self.buf.push(TAG_FORMAT_INFO);
        self.put_u8(info.encoding);
        self.put_proplist(&info.proplist);
    }

    pub fn put_value(&mut self, value: &Value) {
        match value {
            Value::U8(v) => self.put_u8(*v),
            Value::U32(v) => self.put_u32(*v),
            Value::U64(v) => self.put_u64(*v),
            Value::S64(v) => self.put_s64(*v),
            Value::Usec(v) => self.put_usec(*v),
            Value::Timeval { sec, usec } => self.put_timeval(*sec, *usec),
            Value::String(s) => self.put_string(s.as_deref()),
            Value::Boolean(v) => self.put_bool(*v),
            Value::Arbitrary(data) => self.put_arbitrary(data),
            Value::SampleSpec(spec) => self.put_sample_spec(spec),
            Value::ChannelMap(map) => self.put_channel_map(map),
            Value::CVolume(cv) => self.put_cvolume(cv),
            Value::Volume(v) => self.put_volume(*v),
            Value::Proplist(plist) => self.put_proplist(plist),
            Value::FormatInfo(info) => self.put_format_info(info),
        }
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Cursor over tagstruct bytes.
#[derive(Debug, Clone)]
pub struct TagStructReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TagStructReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    /// Reads the next value, whatever its type.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedTag`] for an unknown tag byte, or the
    /// payload error of the tag that was found.
    pub fn read_value(&mut self) -> Result<Value, DecodeError> {
        let offset = self.pos;
        let tag = self.take_byte()?;
        match tag {
            TAG_STRING => self.raw_cstring().map(|s| Value::String(Some(s))),
            TAG_STRING_NULL => Ok(Value::String(None)),
            TAG_U32 => self.raw_u32().map(Value::U32),
            TAG_U8 => self.take_byte().map(Value::U8),
            TAG_U64 => self.raw_u64().map(Value::U64),
            TAG_S64 => self.raw_u64().map(|v| Value::S64(v as i64)),
            TAG_USEC => self.raw_u64().map(Value::Usec),
            TAG_TIMEVAL => {
                let sec = self.raw_u32()?;
                let usec = self.raw_u32()?;
                Ok(Value::Timeval { sec, usec })
            }
            TAG_BOOLEAN_TRUE => Ok(Value::Boolean(true)),
            TAG_BOOLEAN_FALSE => Ok(Value::Boolean(false)),
            TAG_ARBITRARY => self.raw_arbitrary().map(Value::Arbitrary),
            TAG_SAMPLE_SPEC => self.raw_sample_spec().map(Value::SampleSpec),
            TAG_CHANNEL_MAP => self.raw_channel_map().map(Value::ChannelMap),
            TAG_CVOLUME => self.raw_cvolume().map(Value::CVolume),
            TAG_VOLUME => self.raw_u32().map(|v| Value::Volume(Volume(v))),
            TAG_PROPLIST => self.raw_proplist().map(Value::Proplist),
            TAG_FORMAT_INFO => self.raw_format_info().map(Value::FormatInfo),
            other => Err(DecodeError::MalformedTag { tag: other, offset }),
        }
    }

    // ── Typed getters ─────────────────────────────────────────────────────────

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        self.expect_tag(TAG_U8)?;
        self.take_byte()
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        self.expect_tag(TAG_U32)?;
        self.raw_u32()
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        self.expect_tag(TAG_U64)?;
        self.raw_u64()
    }

    pub fn s64(&mut self) -> Result<i64, DecodeError> {
        self.expect_tag(TAG_S64)?;
        self.raw_u64().map(|v| v as i64)
    }

    pub fn usec(&mut self) -> Result<u64, DecodeError> {
        self.expect_tag(TAG_USEC)?;
        self.raw_u64()
    }

    /// Reads a string or NULL string.
    pub fn string(&mut self) -> Result<Option<String>, DecodeError> {
        let offset = self.pos;
        match self.take_byte()? {
            TAG_STRING => self.raw_cstring().map(Some),
            TAG_STRING_NULL => Ok(None),
            other => Err(self.tag_mismatch(TAG_STRING, other, offset)),
        }
    }

    /// Reads a boolean: exactly one byte, `'1'` or `'0'`.
    ///
    /// # Errors
    ///
    /// Any other byte yields [`DecodeError::InvalidBoolean`].
    pub fn boolean(&mut self) -> Result<bool, DecodeError> {
        match self.take_byte()? {
            TAG_BOOLEAN_TRUE => Ok(true),
            TAG_BOOLEAN_FALSE => Ok(false),
            other => Err(DecodeError::InvalidBoolean(other)),
        }
    }

    pub fn arbitrary(&mut self) -> Result<Vec<u8>, DecodeError> {
        self.expect_tag(TAG_ARBITRARY)?;
        self.raw_arbitrary()
    }

    pub fn sample_spec(&mut self) -> Result<SampleSpec, DecodeError> {
        self.expect_tag(TAG_SAMPLE_SPEC)?;
        self.raw_sample_spec()
    }

    pub fn channel_map(&mut self) -> Result<ChannelMap, DecodeError> {
        self.expect_tag(TAG_CHANNEL_MAP)?;
        self.raw_channel_map()
    }

    pub fn cvolume(&mut self) -> Result<CVolume, DecodeError> {
        self.expect_tag(TAG_CVOLUME)?;
        self.raw_cvolume()
    }

    pub fn volume(&mut self) -> Result<Volume, DecodeError> {
        self.expect_tag(TAG_VOLUME)?;
        self.raw_u32().map(Volume)
    }

    pub fn proplist(&mut self) -> Result<Proplist, DecodeError> {
        self.expect_tag(TAG_PROPLIST)?;
        self.raw_proplist()
    }

    pub fn format_info(&mut self) -> Result<FormatInfo, DecodeError> {
        self.expect_tag(TAG_FORMAT_INFO)?;
        self.raw_format_info()
    }

    // ── Payload helpers ───────────────────────────────────────────────────────

    fn expect_tag(&mut self, expected: u8) -> Result<(), DecodeError> {
        let offset = self.pos;
        let found = self.take_byte()?;
        if found == expected {
            Ok(())
        } else {
            Err(self.tag_mismatch(expected, found, offset))
        }
    }

    fn tag_mismatch(&self, expected: u8, found: u8, offset: usize) -> DecodeError {
        if is_known_tag(found) {
            DecodeError::UnexpectedTag {
                expected,
                found,
                offset,
            }
        } else {
            DecodeError::MalformedTag { tag: found, offset }
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.remaining();
        if available < n {
            return Err(DecodeError::TruncatedPayload {
                needed: n,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn raw_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn raw_u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn raw_cstring(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let rest = self.rest();
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(DecodeError::StringNotTerminated { offset: start })?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|_| DecodeError::InvalidUtf8 { offset: start })?
            .to_string();
        self.pos += nul + 1;
        Ok(s)
    }

    fn raw_arbitrary(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.raw_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn raw_channel_count(&mut self) -> Result<usize, DecodeError> {
        let channels = usize::from(self.take_byte()?);
        if channels > CHANNELS_MAX {
            return Err(TooManyChannels(channels).into());
        }
        Ok(channels)
    }

    fn raw_sample_spec(&mut self) -> Result<SampleSpec, DecodeError> {
        let format = SampleFormat::from(self.take_byte()?);
        let channels = self.take_byte()?;
        let rate = self.raw_u32()?;
        Ok(SampleSpec {
            format,
            channels,
            rate,
        })
    }

    fn raw_channel_map(&mut self) -> Result<ChannelMap, DecodeError> {
        let channels = self.raw_channel_count()?;
        Ok(ChannelMap::new(self.take(channels)?.to_vec())?)
    }

    fn raw_cvolume(&mut self) -> Result<CVolume, DecodeError> {
        let channels = self.raw_channel_count()?;
        let mut values = Vec::with_capacity(channels);
        for _ in 0..channels {
            values.push(Volume(self.raw_u32()?));
        }
        Ok(CVolume::new(values)?)
    }

    fn raw_proplist(&mut self) -> Result<Proplist, DecodeError> {
        let mut plist = Proplist::new();
        loop {
            let key_offset = self.pos;
            let Some(key) = self.string()? else {
                break;
            };
            if key.is_empty() {
                return Err(DecodeError::UnexpectedValue {
                    expected: "non-empty proplist key",
                    found: format!("empty key at offset {key_offset}"),
                });
            }
            let declared = self.u32()? as usize;
            let value = self.arbitrary()?;
            if value.len() != declared {
                return Err(DecodeError::UnexpectedValue {
                    expected: "proplist value matching its declared length",
                    found: format!("{} bytes for declared {declared}", value.len()),
                });
            }
            plist.set(key, value);
        }
        Ok(plist)
    }

    fn raw_format_info(&mut self) -> Result<FormatInfo, DecodeError> {
        let encoding = self.u8()?;
        let proplist = self.proplist()?;
        Ok(FormatInfo { encoding, proplist })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
