//! Control payloads: command and tag in front of the argument values.
//!
//! ```text
//! ['L'][command:4]['L'][tag:4][argument values...]
//! ```

use crate::protocol::command::{Command, ErrorCode};
use crate::protocol::tagstruct::{DecodeError, TagStructReader, TagStructWriter, Value};

/// Command number and tag of a control payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    /// Raw command number; may not be a known [`Command`].
    pub command: u32,
    pub tag: u32,
}

impl ControlHeader {
    pub fn command(&self) -> Result<Command, u32> {
        Command::try_from(self.command)
    }
}

/// Encodes a control payload for `command` with `tag` and `args`.
pub fn build_control(command: Command, tag: u32, args: &[Value]) -> Vec<u8> {
    build_control_raw(command as u32, tag, args)
}

/// Like [`build_control`] but for a raw command number.
pub fn build_control_raw(command: u32, tag: u32, args: &[Value]) -> Vec<u8> {
    let mut writer = TagStructWriter::with_capacity(10 + args.len() * 8);
    writer.put_u32(command);
    writer.put_u32(tag);
    for arg in args {
        writer.put_value(arg);
    }
    writer.into_bytes()
}

/// Splits a control payload into its header and the undecoded argument bytes.
///
/// # Errors
///
/// Returns [`DecodeError`] if the command or tag cannot be read.
pub fn split_control(payload: &[u8]) -> Result<(ControlHeader, &[u8]), DecodeError> {
    let mut reader = TagStructReader::new(payload);
    let command = reader.u32()?;
    let tag = reader.u32()?;
    Ok((ControlHeader { command, tag }, reader.rest()))
}

/// Reads the error code that follows an `ERROR` header.
pub fn parse_error_body(body: &[u8]) -> Result<ErrorCode, DecodeError> {
    let mut reader = TagStructReader::new(body);
    reader.u32().map(ErrorCode::from)
}
