//! Infrastructure layer: everything that touches the OS.
//!
//! # Sub-modules
//!
//! - **`transport`** – Dials Unix/TCP sockets through the [`Connector`]
//!   seam and frames packets on the byte stream.
//!
//! - **`endpoint`** – Parses server addresses and finds the default socket.
//!
//! - **`cookie`** – Locates and loads the 256-byte auth cookie.
//!
//! - **`config`** – TOML configuration file with defaults for every field.
//!
//! - **`logging`** – `tracing-subscriber` bootstrap.
//!
//! [`Connector`]: transport::Connector

pub mod config;
pub mod cookie;
pub mod endpoint;
pub mod logging;
pub mod transport;
