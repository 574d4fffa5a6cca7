//! Byte-stream transport: dialing the server and framing packets.
//!
//! A packet on the wire is a 20-byte header followed by `length` payload
//! bytes.  [`PacketReader`] reads exactly one packet at a time;
//! [`PacketWriter`] writes header and payload as one frame and remembers when
//! a frame stopped part way, whether from an error or a dropped future.  A
//! writer in that state refuses further packets.
//!
//! Dialing goes through the [`Connector`] trait so tests can swap the real
//! socket for an in-memory pipe or a mock.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use pulse_proto::protocol::{FrameError, PacketHeader, HEADER_SIZE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::{debug, trace};

use crate::infrastructure::endpoint::{Endpoint, EndpointError};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that prevent a connection from being established.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid server address: {0}")]
    Address(#[from] EndpointError),

    /// Nothing is listening at the endpoint, or the host cannot be reached.
    #[error("cannot reach {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("permission denied connecting to {endpoint}")]
    PermissionDenied {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {endpoint} after {timeout:?}")]
    TimedOut { endpoint: String, timeout: Duration },

    #[error("unusable auth cookie {path}: {reason}")]
    Cookie { path: PathBuf, reason: String },

    #[error("unix sockets are not supported on this platform")]
    UnsupportedEndpoint,
}

impl ConnectError {
    /// Classifies a socket error from dialing `endpoint`.
    pub fn from_io(endpoint: &Endpoint, source: std::io::Error) -> Self {
        let endpoint = endpoint.to_string();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            ConnectError::PermissionDenied { endpoint, source }
        } else {
            ConnectError::Unreachable { endpoint, source }
        }
    }
}

/// Socket-level failures on an established connection.  All are terminal.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream ended, possibly in the middle of a packet.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: {length} bytes (max {max})")]
    FrameTooLarge { length: u32, max: u32 },

    /// An earlier packet was only partly written; the framing is lost.
    #[error("previous packet was only partly written")]
    PartialWrite,
}

impl From<FrameError> for TransportError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::TooLarge { length, max } => TransportError::FrameTooLarge { length, max },
        }
    }
}

fn map_read_error(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::ConnectionClosed
    } else {
        TransportError::Io(e)
    }
}

// ── Streams and connectors ────────────────────────────────────────────────────

/// Anything the client can run the protocol over.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

pub type BoxedStream = Box<dyn ByteStream>;

/// Opens a byte stream to an endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, ConnectError>;
}

/// Dials real Unix or TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketConnector;

#[async_trait]
impl Connector for SocketConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, ConnectError> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|e| ConnectError::from_io(endpoint, e))?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(ConnectError::UnsupportedEndpoint),
            Endpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| ConnectError::from_io(endpoint, e))?;
                // Small request/reply packets; do not wait for Nagle.
                stream
                    .set_nodelay(true)
                    .map_err(|e| ConnectError::from_io(endpoint, e))?;
                Ok(Box::new(stream))
            }
        }
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// One received packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

/// An open stream, before it is split for the read loop.
pub struct Transport {
    stream: BoxedStream,
}

impl Transport {
    /// Dials `endpoint` through `connector`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::TimedOut`] if dialing takes longer than
    /// `timeout`, or the connector's own error.
    pub async fn open(
        connector: &dyn Connector,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<Self, ConnectError> {
        debug!(%endpoint, "dialing server");
        match tokio::time::timeout(timeout, connector.connect(endpoint)).await {
            Ok(stream) => Ok(Self { stream: stream? }),
            Err(_) => Err(ConnectError::TimedOut {
                endpoint: endpoint.to_string(),
                timeout,
            }),
        }
    }

    pub fn from_stream(stream: BoxedStream) -> Self {
        Self { stream }
    }

    pub fn into_split(
        self,
    ) -> (
        PacketReader<ReadHalf<BoxedStream>>,
        PacketWriter<WriteHalf<BoxedStream>>,
    ) {
        let (read, write) = tokio::io::split(self.stream);
        (PacketReader::new(read), PacketWriter::new(write))
    }
}

/// Reads whole packets from an async byte source.
pub struct PacketReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> PacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Suspends until one complete packet has arrived.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectionClosed`] if the stream ends (even mid
    /// packet), [`TransportError::FrameTooLarge`] for an oversized header,
    /// [`TransportError::Io`] otherwise.
    pub async fn read_packet(&mut self) -> Result<Packet, TransportError> {
        let mut header_buf = [0u8; HEADER_SIZE];
        self.inner
            .read_exact(&mut header_buf)
            .await
            .map_err(map_read_error)?;
        let header = PacketHeader::from_bytes(&header_buf)?;

        let mut payload = vec![0u8; header.length as usize];
        if !payload.is_empty() {
            self.inner
                .read_exact(&mut payload)
                .await
                .map_err(map_read_error)?;
        }
        trace!(
            length = header.length,
            channel = header.channel,
            flags = header.flags,
            "read packet"
        );
        Ok(Packet { header, payload })
    }
}

/// Writes framed control packets to an async byte sink.
pub struct PacketWriter<W> {
    inner: W,
    /// Set while a frame has some but not all of its bytes on the wire.
    torn: bool,
}

impl<W: AsyncWrite + Unpin> PacketWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, torn: false }
    }

    /// Writes one control packet; `continues` sets the list continuation flag.
    ///
    /// If the future is dropped after part of the frame went out,
    /// [`is_torn`](Self::is_torn) reports it and every later call fails.
    ///
    /// # Errors
    ///
    /// [`TransportError::PartialWrite`] if an earlier frame was torn, or the
    /// I/O error from the sink.
    pub async fn write_packet(&mut self, payload: &[u8], continues: bool) -> Result<(), TransportError> {
        if self.torn {
            return Err(TransportError::PartialWrite);
        }
        let mut header = PacketHeader::control(payload.len() as u32);
        if continues {
            header = header.with_continuation();
        }
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(payload);

        let mut written = 0;
        while written < frame.len() {
            let n = self.inner.write(&frame[written..]).await?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            written += n;
            self.torn = written < frame.len();
        }
        self.inner.flush().await?;
        trace!(length = payload.len(), continues, "wrote packet");
        Ok(())
    }

    /// True when a frame was interrupted after some of its bytes were written.
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    /// Flushes and shuts down the write side.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
