//! pulse-client library entry point.
//!
//! An async client for the sound server's native control protocol.  It
//! connects over a Unix or TCP socket, authenticates, and then enumerates
//! and manipulates cards, sinks, sources and modules.
//!
//! # How a request flows (for beginners)
//!
//! 1. A call such as [`Connection::get_sink_info_list`] picks the command
//!    and encodes its arguments as tagstruct values.
//! 2. The correlator hands out a fresh tag and remembers who is waiting.
//! 3. The packet is written to the socket.
//! 4. A background read loop receives the reply, finds the waiting caller by
//!    tag and wakes it.  Replies may come back in any order.
//! 5. The caller decodes the values into typed records from `pulse-proto`.
//!
//! ```no_run
//! # async fn run() -> Result<(), pulse_client::ClientError> {
//! let config = pulse_client::load_config()?;
//! let connection = pulse_client::Connection::connect(&config).await?;
//! for sink in connection.get_sink_info_list().await? {
//!     println!("{} {}", sink.index, sink.name);
//! }
//! connection.disconnect().await;
//! # Ok(())
//! # }
//! ```

/// Application layer: connection, correlation, events.
pub mod application;

/// Infrastructure layer: sockets, configuration, logging.
pub mod infrastructure;

pub use application::connection::{Connection, ConnectionState, PendingRequest};
pub use application::error::ClientError;
pub use application::events::{EventReceiver, SubscriptionState};
pub use infrastructure::config::{load_config, load_config_from, ClientConfig};
pub use infrastructure::endpoint::Endpoint;
pub use infrastructure::logging::init_logging;
pub use infrastructure::transport::{ConnectError, Connector, SocketConnector, TransportError};
