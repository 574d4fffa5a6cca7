//! # pulse-proto
//!
//! Wire-level pieces of the sound server's native control protocol: the
//! tagstruct value codec, packet framing, command and error codes, tag
//! allocation and the typed records decoded from replies.
//!
//! This crate does no I/O.  `pulse-client` owns sockets, the runtime and the
//! request/reply bookkeeping.
//!
//! # Architecture overview (for beginners)
//!
//! - **`protocol`** – How bytes travel.  Every packet is a 20-byte header
//!   plus a payload; a control payload is a sequence of self-describing
//!   tagstruct values (`command`, `tag`, then arguments).
//!
//! - **`domain`** – What the bytes mean.  Sinks, sources, cards, modules and
//!   server info, each with a fixed field order that depends on the protocol
//!   version both sides agreed on.

pub mod domain;
pub mod protocol;

pub use domain::{
    CardInfo, ModuleArguments, ModuleInfo, Proplist, Record, ServerInfo, SinkInfo, SourceInfo,
    SubscriptionEvent, SubscriptionMask,
};
pub use protocol::{decode, encode, Command, DecodeError, ErrorCode, Value};
