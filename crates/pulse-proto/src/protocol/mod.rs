//! Protocol module: tagstruct codec, packet framing, opcodes and tags.

pub mod command;
pub mod fields;
pub mod message;
pub mod packet;
pub mod tag;
pub mod tagstruct;

pub use command::{
    index_or_none, Command, ErrorCode, COOKIE_LENGTH, INVALID_INDEX, MIN_SERVER_VERSION,
    PROTOCOL_VERSION,
};
pub use fields::Fields;
pub use message::{build_control, build_control_raw, parse_error_body, split_control, ControlHeader};
pub use packet::{
    frame_control, FrameError, PacketHeader, CONTROL_CHANNEL, FLAG_LIST_CONTINUES, HEADER_SIZE,
    MAX_FRAME_SIZE,
};
pub use tag::{TagCounter, RESERVED_EVENT_TAG};
pub use tagstruct::{decode, encode, DecodeError, TagStructReader, TagStructWriter, Value};
