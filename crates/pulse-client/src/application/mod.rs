//! Application layer: the connection and the bookkeeping behind it.
//!
//! # Sub-modules
//!
//! - **`connection`** – The public [`Connection`] API.  Owns the socket
//!   halves, spawns the read loop and turns typed calls into commands.
//!
//! - **`correlator`** – Tag allocation and the pending-request map.  Matches
//!   each reply or error to the request that caused it.
//!
//! - **`events`** – Forwards subscription events from the reserved tag to
//!   the consumer's channel.
//!
//! - **`handshake`** – `AUTH` and `SET_CLIENT_NAME` arguments and replies.
//!
//! - **`error`** – [`ClientError`], the error every public call returns.
//!
//! [`Connection`]: connection::Connection
//! [`ClientError`]: error::ClientError

pub mod connection;
pub mod correlator;
pub mod error;
pub mod events;
pub mod handshake;
