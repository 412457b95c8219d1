//! SMPP transmitter client.
//!
//! [`Client::bind`] performs the bind handshake and spawns a reader task
//! that routes responses to waiting callers by sequence number. Several
//! requests may be outstanding at once; each caller gets exactly the
//! response carrying its own sequence number.

mod error;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, MissedTickBehavior};
use tracing::{debug, info, trace, warn, Instrument};

use crate::connection::{Connection, ConnectionState};
use crate::message::{ShortMessage, ShortMessageResp};
use crate::pdu::{CommandId, CommandStatus, Field, Header, Pdu};

pub use error::{BindError, ClientError};

/// Consecutive unanswered enquire_links before the peer is considered dead.
const MAX_MISSED_ENQUIRE_LINKS: u32 = 3;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (`host:port`)
    pub addr: String,
    pub user_name: String,
    pub password: String,
    pub system_type: String,
    /// Send enquire_link at this interval while bound
    pub enquire_link_interval: Option<Duration>,
    /// Time to wait for any response, the bind response included
    pub response_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        addr: impl Into<String>,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            addr: addr.into(),
            user_name: user_name.into(),
            password: password.into(),
            system_type: String::new(),
            enquire_link_interval: None,
            response_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = system_type.into();
        self
    }

    pub fn with_enquire_link_interval(mut self, interval: Duration) -> Self {
        self.enquire_link_interval = Some(interval);
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}

/// Connection status published by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    /// Bound and usable
    Connected,
    /// Closed locally or by the peer
    Disconnected,
    /// Unbound by either side
    Unbound,
    /// Transport or protocol failure
    ConnectionFailed,
}

impl ConnStatus {
    /// Check if the session can no longer be used.
    pub fn is_closed(&self) -> bool {
        !matches!(self, ConnStatus::Connected)
    }
}

impl fmt::Display for ConnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnStatus::Connected => write!(f, "connected"),
            ConnStatus::Disconnected => write!(f, "disconnected"),
            ConnStatus::Unbound => write!(f, "unbound"),
            ConnStatus::ConnectionFailed => write!(f, "connection failed"),
        }
    }
}

/// Request waiting for its response.
struct PendingRequest {
    command: CommandId,
    sent_at: Instant,
    response_tx: oneshot::Sender<Pdu>,
}

/// `None` once the session is closed, so late requests fail immediately.
type PendingMap = Mutex<Option<HashMap<u32, PendingRequest>>>;

struct Inner {
    conn: Connection,
    pending: PendingMap,
    status_tx: watch::Sender<ConnStatus>,
    response_timeout: Duration,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, Option<HashMap<u32, PendingRequest>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send a request and wait for the response with the same sequence number.
    async fn request(&self, pdu: Pdu) -> Result<Pdu, ClientError> {
        let sequence = pdu.sequence();
        let (response_tx, response_rx) = oneshot::channel();

        match self.pending().as_mut() {
            Some(pending) => {
                pending.insert(
                    sequence,
                    PendingRequest {
                        command: pdu.command_id(),
                        sent_at: Instant::now(),
                        response_tx,
                    },
                );
            }
            None => return Err(ClientError::NotBound),
        }

        if let Err(e) = self.conn.write(pdu).await {
            self.forget(sequence);
            return Err(e.into());
        }

        match timeout(self.response_timeout, response_rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.forget(sequence);
                Err(ClientError::Timeout(sequence))
            }
        }
    }

    fn forget(&self, sequence: u32) {
        if let Some(pending) = self.pending().as_mut() {
            pending.remove(&sequence);
        }
    }

    /// Deliver a response to its waiting caller.
    fn complete(&self, pdu: Pdu) {
        let sequence = pdu.sequence();
        let request = self.pending().as_mut().and_then(|p| p.remove(&sequence));

        match request {
            Some(request) => {
                trace!(
                    sequence,
                    command = %request.command,
                    latency_ms = request.sent_at.elapsed().as_millis() as u64,
                    "response received"
                );
                let _ = request.response_tx.send(pdu);
            }
            None => warn!(sequence, command = %pdu.command_id(), "unexpected response"),
        }
    }

    /// Fail outstanding requests, publish the final status and close the stream.
    async fn shutdown(&self, status: ConnStatus) {
        let dropped = self.pending().take().map_or(0, |p| p.len());
        if dropped > 0 {
            debug!(dropped, "failing outstanding requests");
        }

        self.status_tx.send_if_modified(|current| {
            if current.is_closed() {
                false
            } else {
                *current = status;
                true
            }
        });

        self.conn.close().await;
    }

    fn is_bound(&self) -> bool {
        !self.status_tx.borrow().is_closed()
    }
}

/// A bound transmitter session.
pub struct Client {
    inner: Arc<Inner>,
    server_system_id: String,
    reader: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
}

impl Client {
    /// Connect and bind as a transmitter.
    pub async fn bind(config: ClientConfig) -> Result<Self, BindError> {
        let conn = timeout(config.response_timeout, Connection::connect(&config.addr))
            .await
            .map_err(|_| BindError::Timeout)?
            .map_err(BindError::Connect)?;

        let sequence = conn.next_sequence();
        let bind = Pdu::bind(
            CommandId::BindTransmitter,
            sequence,
            &config.user_name,
            &config.password,
        )
        .with(Field::SystemType, config.system_type.as_str());
        conn.write(bind).await?;

        let resp = timeout(config.response_timeout, read_bind_resp(&conn, sequence))
            .await
            .map_err(|_| BindError::Timeout)??;

        let server_system_id = resp.field_str(Field::SystemId).unwrap_or_default().to_string();
        conn.set_system_id(config.user_name.clone()).await;
        conn.set_state(ConnectionState::BoundTx).await;

        info!(
            addr = %config.addr,
            user = %config.user_name,
            server = %server_system_id,
            "bound as transmitter"
        );

        let (status_tx, status_rx) = watch::channel(ConnStatus::Connected);
        let inner = Arc::new(Inner {
            conn,
            pending: Mutex::new(Some(HashMap::new())),
            status_tx,
            response_timeout: config.response_timeout,
        });

        let span = tracing::info_span!("client", addr = %config.addr, user = %config.user_name);
        tokio::spawn(monitor_status(status_rx).instrument(span.clone()));
        let reader = tokio::spawn(read_loop(inner.clone()).instrument(span.clone()));
        let keepalive = config
            .enquire_link_interval
            .map(|period| tokio::spawn(keepalive(inner.clone(), period).instrument(span)));

        Ok(Self {
            inner,
            server_system_id,
            reader,
            keepalive,
        })
    }

    /// Submit one message and wait for its response.
    ///
    /// A non-OK status from the server is returned as a response, not an
    /// error.
    pub async fn submit_sm(&self, message: &ShortMessage) -> Result<ShortMessageResp, ClientError> {
        if !self.inner.is_bound() {
            return Err(ClientError::NotBound);
        }

        let pdu = message.to_submit_pdu(self.inner.conn.next_sequence());
        let resp = self.inner.request(pdu).await?;

        match resp.command_id() {
            CommandId::SubmitSmResp => Ok(ShortMessageResp::from_submit_resp_pdu(&resp)),
            command => Err(ClientError::UnexpectedResponse {
                command,
                status: resp.status(),
            }),
        }
    }

    /// Send enquire_link and return the response header.
    pub async fn enquire_link(&self) -> Result<Header, ClientError> {
        if !self.inner.is_bound() {
            return Err(ClientError::NotBound);
        }
        let resp = self
            .inner
            .request(Pdu::enquire_link(self.inner.conn.next_sequence()))
            .await?;
        expect_response(resp, CommandId::EnquireLinkResp)
    }

    /// Unbind and close the session.
    pub async fn unbind(&self) -> Result<(), ClientError> {
        if !self.inner.is_bound() {
            return Err(ClientError::NotBound);
        }
        self.inner.conn.set_state(ConnectionState::Unbinding).await;
        // Published first so the server closing after unbind_resp reads as an unbind.
        self.inner.status_tx.send_replace(ConnStatus::Unbound);

        let result = self
            .inner
            .request(Pdu::unbind(self.inner.conn.next_sequence()))
            .await
            .and_then(|resp| expect_response(resp, CommandId::UnbindResp));

        self.inner.shutdown(ConnStatus::Unbound).await;
        result.map(|_| ())
    }

    /// Close the session without unbinding.
    pub async fn close(&self) {
        self.inner.shutdown(ConnStatus::Disconnected).await;
    }

    /// Subscribe to connection status changes.
    pub fn status(&self) -> watch::Receiver<ConnStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_bound()
    }

    /// `system_id` the server returned in its bind response.
    pub fn server_system_id(&self) -> &str {
        &self.server_system_id
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(keepalive) = &self.keepalive {
            keepalive.abort();
        }
    }
}

fn expect_response(resp: Pdu, expected: CommandId) -> Result<Header, ClientError> {
    if resp.command_id() == expected && resp.status().is_ok() {
        Ok(resp.header)
    } else {
        Err(ClientError::UnexpectedResponse {
            command: resp.command_id(),
            status: resp.status(),
        })
    }
}

/// Wait for the response to the bind request.
async fn read_bind_resp(conn: &Connection, sequence: u32) -> Result<Pdu, BindError> {
    loop {
        let pdu = conn.read().await?;
        let matches = pdu.sequence() == sequence;

        match pdu.command_id() {
            CommandId::BindTransmitterResp | CommandId::GenericNack if matches => {
                if pdu.status().is_ok() && pdu.command_id() == CommandId::BindTransmitterResp {
                    return Ok(pdu);
                }
                return Err(BindError::Rejected(pdu.status()));
            }
            command => trace!(command = %command, "ignoring pdu before bind response"),
        }
    }
}

/// Route responses and answer server-initiated requests until the stream ends.
async fn read_loop(inner: Arc<Inner>) {
    let status = loop {
        let pdu = match inner.conn.read().await {
            Ok(pdu) => pdu,
            Err(e) if e.is_closed() => {
                debug!("server closed connection");
                break ConnStatus::Disconnected;
            }
            Err(e) => {
                warn!(error = %e, "read failed");
                break ConnStatus::ConnectionFailed;
            }
        };

        let command = pdu.command_id();
        if command.is_response() {
            inner.complete(pdu);
            continue;
        }

        let (reply, next) = match command {
            CommandId::EnquireLink => (pdu.response(CommandStatus::OK), None),
            CommandId::Unbind => {
                info!("server requested unbind");
                (pdu.response(CommandStatus::OK), Some(ConnStatus::Unbound))
            }
            _ => {
                debug!(command = %command, "rejecting request from server");
                (
                    Pdu::generic_nack(pdu.sequence(), CommandStatus::INVALID_COMMAND_ID),
                    None,
                )
            }
        };

        if let Err(e) = inner.conn.write(reply).await {
            if !e.is_closed() {
                warn!(error = %e, "write failed");
            }
            break ConnStatus::ConnectionFailed;
        }
        if let Some(status) = next {
            break status;
        }
    };

    inner.shutdown(status).await;
}

/// Send enquire_link periodically while the session is bound.
async fn keepalive(inner: Arc<Inner>, period: Duration) {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut missed = 0;
    loop {
        ticker.tick().await;
        if !inner.is_bound() {
            break;
        }

        let sequence = inner.conn.next_sequence();
        match inner.request(Pdu::enquire_link(sequence)).await {
            Ok(_) => {
                trace!(sequence, "enquire_link answered");
                missed = 0;
            }
            Err(ClientError::NotBound | ClientError::Closed) => break,
            Err(ClientError::Timeout(_)) => {
                missed += 1;
                warn!(sequence, missed, "enquire_link timed out");
                if missed >= MAX_MISSED_ENQUIRE_LINKS {
                    warn!("peer stopped answering, closing connection");
                    inner.shutdown(ConnStatus::ConnectionFailed).await;
                    break;
                }
            }
            Err(e) => warn!(error = %e, "enquire_link failed"),
        }
    }
}

/// Log every status transition until the session closes.
async fn monitor_status(mut status_rx: watch::Receiver<ConnStatus>) {
    while status_rx.changed().await.is_ok() {
        let status = *status_rx.borrow_and_update();
        info!(status = %status, "connection status changed");
        if status.is_closed() {
            break;
        }
    }
}
