//! Connection handling for SMPP sessions.
//!
//! A [`Connection`] wraps one transport stream with framed PDU reading and
//! writing. The read and write halves sit behind independent locks so one
//! task can block in [`Connection::read`] while others write.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio_rustls::server::TlsStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use crate::pdu::{Pdu, PduCodec, PduError};

/// Highest sequence number handed out before wrapping back to 1.
const MAX_SEQUENCE: u32 = 0x7FFF_FFFF;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection established, awaiting bind
    Open,
    /// Bound as transmitter
    BoundTx,
    /// Bound as receiver
    BoundRx,
    /// Bound as transceiver
    BoundTrx,
    /// Unbind in progress
    Unbinding,
    /// Connection closed
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "OPEN"),
            ConnectionState::BoundTx => write!(f, "BOUND_TX"),
            ConnectionState::BoundRx => write!(f, "BOUND_RX"),
            ConnectionState::BoundTrx => write!(f, "BOUND_TRX"),
            ConnectionState::Unbinding => write!(f, "UNBINDING"),
            ConnectionState::Closed => write!(f, "CLOSED"),
        }
    }
}

impl ConnectionState {
    /// Check if this state is one of the bound states.
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::BoundTx | Self::BoundRx | Self::BoundTrx)
    }

    /// Check if the bound role may submit messages.
    pub fn can_submit(&self) -> bool {
        matches!(self, Self::BoundTx | Self::BoundTrx)
    }
}

/// Connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer closed the stream.
    #[error("connection closed")]
    Closed,

    #[error("codec error: {0}")]
    Codec(#[from] PduError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    /// Check if this error is an ordinary end of stream rather than a failure.
    pub fn is_closed(&self) -> bool {
        match self {
            ConnectionError::Closed => true,
            ConnectionError::Codec(PduError::Io(e)) | ConnectionError::Io(e) => {
                e.kind() == io::ErrorKind::UnexpectedEof
            }
            _ => false,
        }
    }
}

/// Stream type for the connection.
pub enum Stream {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted connection
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// An SMPP connection.
pub struct Connection {
    /// Connection ID
    id: ConnectionId,

    /// Peer address
    peer_addr: SocketAddr,

    /// Connection state
    state: RwLock<ConnectionState>,

    /// System ID of the bound peer
    system_id: RwLock<Option<String>>,

    /// Sequence number generator
    sequence: AtomicU32,

    reader: Mutex<FramedRead<ReadHalf<Stream>, PduCodec>>,
    writer: Mutex<FramedWrite<WriteHalf<Stream>, PduCodec>>,

    /// Close flag
    closing: AtomicBool,

    /// Creation timestamp
    created_at: Instant,
}

impl Connection {
    /// Wrap an established stream.
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, stream: Stream, codec: PduCodec) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            id,
            peer_addr,
            state: RwLock::new(ConnectionState::Open),
            system_id: RwLock::new(None),
            sequence: AtomicU32::new(0),
            reader: Mutex::new(FramedRead::new(read_half, codec.clone())),
            writer: Mutex::new(FramedWrite::new(write_half, codec)),
            closing: AtomicBool::new(false),
            created_at: Instant::now(),
        }
    }

    /// Open a plain TCP connection to a peer.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        Ok(Self::new(
            ConnectionId::next(),
            peer_addr,
            Stream::Plain(stream),
            PduCodec::new(),
        ))
    }

    /// Get connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Set connection state.
    pub async fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write().await;
        debug!(id = %self.id, from = %*current, to = %state, "state transition");
        *current = state;
    }

    /// Get system ID (after bind).
    pub async fn system_id(&self) -> Option<String> {
        self.system_id.read().await.clone()
    }

    /// Set system ID.
    pub async fn set_system_id(&self, system_id: String) {
        *self.system_id.write().await = Some(system_id);
    }

    /// Generate next sequence number, wrapping within `1..=0x7FFFFFFF`.
    pub fn next_sequence(&self) -> u32 {
        let step = |last: u32| if last >= MAX_SEQUENCE { 1 } else { last + 1 };
        // The closure never returns None, so both arms carry the previous value.
        match self
            .sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(step(last)))
        {
            Ok(last) | Err(last) => step(last),
        }
    }

    /// Read the next PDU.
    ///
    /// Blocks until a full PDU arrives. End of stream is reported as
    /// [`ConnectionError::Closed`].
    pub async fn read(&self) -> Result<Pdu, ConnectionError> {
        let mut reader = self.reader.lock().await;
        match reader.next().await {
            Some(Ok(pdu)) => {
                trace!(
                    id = %self.id,
                    command = %pdu.command_id(),
                    sequence = pdu.sequence(),
                    "pdu received"
                );
                Ok(pdu)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(ConnectionError::Closed),
        }
    }

    /// Write one PDU and flush it.
    pub async fn write(&self, pdu: Pdu) -> Result<(), ConnectionError> {
        if self.is_closing() {
            return Err(ConnectionError::Closed);
        }
        let command = pdu.command_id();
        let sequence = pdu.sequence();

        let mut writer = self.writer.lock().await;
        writer.send(pdu).await?;

        trace!(id = %self.id, command = %command, sequence, "pdu sent");
        Ok(())
    }

    /// Check if connection is closing.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Relaxed)
    }

    /// Get connection uptime.
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Close the write side of the stream. Further writes fail with `Closed`.
    pub async fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_state(ConnectionState::Closed).await;

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            debug!(id = %self.id, error = %e, "error shutting down stream");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{CommandId, CommandStatus};
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (client, accepted) = tokio::join!(Connection::connect(&addr), listener.accept());
        let (stream, peer) = accepted.unwrap();
        let server = Connection::new(ConnectionId::next(), peer, Stream::Plain(stream), PduCodec::new());
        (client.unwrap(), server)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (client, server) = pair().await;

        client.write(Pdu::enquire_link(12)).await.unwrap();
        let pdu = server.read().await.unwrap();
        assert_eq!(pdu.command_id(), CommandId::EnquireLink);
        assert_eq!(pdu.sequence(), 12);

        server.write(pdu.response(CommandStatus::OK)).await.unwrap();
        let resp = client.read().await.unwrap();
        assert_eq!(resp.command_id(), CommandId::EnquireLinkResp);
        assert_eq!(resp.sequence(), 12);
    }

    #[tokio::test]
    async fn test_close_reports_end_of_stream() {
        let (client, server) = pair().await;

        client.close().await;
        let err = server.read().await.unwrap_err();
        assert!(err.is_closed());
        assert_eq!(client.state().await, ConnectionState::Closed);
        assert!(matches!(
            client.write(Pdu::enquire_link(1)).await,
            Err(ConnectionError::Closed)
        ));
    }

    #[test]
    fn test_state_roles() {
        assert!(ConnectionState::BoundRx.is_bound());
        assert!(!ConnectionState::BoundRx.can_submit());
        assert!(ConnectionState::BoundTrx.can_submit());
        assert!(!ConnectionState::Unbinding.is_bound());
        assert_eq!(ConnectionState::BoundTx.to_string(), "BOUND_TX");
    }

    #[tokio::test]
    async fn test_sequence_wraps() {
        let (client, _server) = pair().await;

        assert_eq!(client.next_sequence(), 1);
        assert_eq!(client.next_sequence(), 2);

        client.sequence.store(MAX_SEQUENCE - 1, Ordering::SeqCst);
        assert_eq!(client.next_sequence(), MAX_SEQUENCE);
        assert_eq!(client.next_sequence(), 1);
        assert_eq!(client.next_sequence(), 2);

        client.sequence.store(u32::MAX, Ordering::SeqCst);
        assert_eq!(client.next_sequence(), 1);
        assert_eq!(client.next_sequence(), 2);
        assert_eq!(client.next_sequence(), 3);
    }
}
