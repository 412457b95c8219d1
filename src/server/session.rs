//! Per-connection SMPP session: bind handshake, then request dispatch.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::{ServerConfig, UnbindPolicy, UnknownCommandPolicy};
use crate::connection::{Connection, ConnectionError, ConnectionState};
use crate::message::{ShortMessage, ShortMessageResp, Status};
use crate::pdu::{CommandId, CommandStatus, Field, Pdu, PduError};

use super::account::{AccountStore, AuthFailure};
use super::handler::Handler;
use super::stats::ServerStats;

/// Longest message id that fits the 65-octet C-string field.
const MAX_MESSAGE_ID_LEN: usize = 64;

/// Reasons a bind handshake fails. None of them produce a response PDU.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("unexpected pdu {0}, want bind")]
    UnexpectedCommand(CommandId),

    #[error("malformed pdu: {0}")]
    MalformedPdu(String),

    #[error("invalid user: {0}")]
    InvalidUser(String),

    #[error("invalid password for user: {0}")]
    InvalidPassword(String),

    #[error("timed out waiting for bind")]
    Timeout,

    #[error(transparent)]
    Connection(ConnectionError),
}

impl From<ConnectionError> for HandshakeError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Codec(
                e @ (PduError::Truncated { .. }
                | PduError::Unterminated { .. }
                | PduError::Utf8 { .. }
                | PduError::InvalidField { .. }),
            ) => HandshakeError::MalformedPdu(e.to_string()),
            other => HandshakeError::Connection(other),
        }
    }
}

/// Session error types.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("bind failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl SessionError {
    /// Check if the session ended because the peer went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            SessionError::Handshake(HandshakeError::Connection(e)) | SessionError::Connection(e) => {
                e.is_closed()
            }
            _ => false,
        }
    }
}

/// State shared by every session of one server.
pub(crate) struct SessionContext {
    pub config: ServerConfig,
    pub accounts: Arc<AccountStore>,
    pub handler: Arc<dyn Handler>,
    pub stats: Arc<ServerStats>,
}

enum Flow {
    Continue,
    Close,
}

/// SMPP session handler.
pub(crate) struct Session {
    conn: Arc<Connection>,
    ctx: Arc<SessionContext>,
}

impl Session {
    pub fn new(conn: Arc<Connection>, ctx: Arc<SessionContext>) -> Self {
        Self { conn, ctx }
    }

    /// Run the session to completion. The connection is closed on return.
    pub async fn run(self) -> Result<(), SessionError> {
        let result = self.run_inner().await;
        self.conn.close().await;
        result
    }

    async fn run_inner(&self) -> Result<(), SessionError> {
        let bound = timeout(self.ctx.config.bind_timeout, self.authenticate())
            .await
            .unwrap_or(Err(HandshakeError::Timeout));

        match bound {
            Ok(()) => self.ctx.stats.bind(true),
            Err(e) => {
                if !matches!(&e, HandshakeError::Connection(c) if c.is_closed()) {
                    self.ctx.stats.bind(false);
                }
                return Err(e.into());
            }
        }

        loop {
            let pdu = self.conn.read().await?;
            if let Flow::Close = self.handle_pdu(pdu).await? {
                return Ok(());
            }
        }
    }

    /// Read the first PDU and authenticate it against the account store.
    ///
    /// Only a successful bind is answered.
    async fn authenticate(&self) -> Result<(), HandshakeError> {
        let pdu = self.conn.read().await?;

        let state = match pdu.command_id() {
            CommandId::BindTransmitter => ConnectionState::BoundTx,
            CommandId::BindReceiver => ConnectionState::BoundRx,
            CommandId::BindTransceiver => ConnectionState::BoundTrx,
            other => return Err(HandshakeError::UnexpectedCommand(other)),
        };

        let system_id = pdu
            .field_str(Field::SystemId)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HandshakeError::MalformedPdu("missing system_id".to_string()))?;
        let password = pdu
            .field_str(Field::Password)
            .ok_or_else(|| HandshakeError::MalformedPdu("missing password".to_string()))?;

        info!(system_id, command = %pdu.command_id(), "bind request");

        self.ctx
            .accounts
            .authenticate(system_id, password)
            .map_err(|failure| match failure {
                AuthFailure::UnknownUser => HandshakeError::InvalidUser(system_id.to_string()),
                AuthFailure::WrongPassword => HandshakeError::InvalidPassword(system_id.to_string()),
            })?;

        let resp = pdu
            .response(CommandStatus::OK)
            .with(Field::SystemId, self.ctx.config.system_id.as_str());
        self.conn.write(resp).await?;

        self.conn.set_system_id(system_id.to_string()).await;
        self.conn.set_state(state).await;

        info!(system_id, state = %state, "session bound");
        Ok(())
    }

    /// Handle one PDU on a bound session.
    async fn handle_pdu(&self, pdu: Pdu) -> Result<Flow, ConnectionError> {
        let command = pdu.command_id();

        if command.is_response() {
            trace!(command = %command, sequence = pdu.sequence(), "ignoring response pdu");
            return Ok(Flow::Continue);
        }

        match command {
            CommandId::EnquireLink => {
                trace!(sequence = pdu.sequence(), "enquire_link request");
                self.conn.write(pdu.response(CommandStatus::OK)).await?;
                Ok(Flow::Continue)
            }

            CommandId::SubmitSm => {
                self.handle_submit_sm(pdu).await?;
                Ok(Flow::Continue)
            }

            CommandId::Unbind => self.handle_unbind(pdu).await,

            _ if command.is_bind() => {
                warn!(command = %command, "bind on already bound session");
                self.conn.write(pdu.response(CommandStatus::ALREADY_BOUND)).await?;
                Ok(Flow::Continue)
            }

            _ => {
                match self.ctx.config.unknown_command_policy {
                    UnknownCommandPolicy::Ignore => {
                        debug!(command = %command, "ignoring unsupported command");
                    }
                    UnknownCommandPolicy::GenericNack => {
                        debug!(command = %command, "rejecting unsupported command");
                        let nack = Pdu::generic_nack(pdu.sequence(), CommandStatus::INVALID_COMMAND_ID);
                        self.conn.write(nack).await?;
                    }
                }
                Ok(Flow::Continue)
            }
        }
    }

    async fn handle_submit_sm(&self, pdu: Pdu) -> Result<(), ConnectionError> {
        if !self.conn.state().await.can_submit() {
            warn!("submit_sm on a session not bound for sending");
            self.ctx.stats.submit(false);
            return self
                .conn
                .write(pdu.response(CommandStatus::INVALID_BIND_STATUS))
                .await;
        }

        let message = ShortMessage::from_submit_pdu(&pdu);
        debug!(
            sequence = pdu.sequence(),
            src = %message.src,
            dst = %message.dst,
            data_coding = message.data_coding.code(),
            "submit_sm request"
        );

        let resp = match timeout(
            self.ctx.config.handler_timeout,
            self.ctx.handler.handle_submit(&self.conn, message),
        )
        .await
        {
            Ok(Ok(resp)) if resp.message_id.len() > MAX_MESSAGE_ID_LEN || resp.message_id.contains('\0') => {
                warn!(len = resp.message_id.len(), "handler returned an unusable message id");
                None
            }
            Ok(Ok(resp)) => Some(resp),
            Ok(Err(e)) => {
                warn!(error = %format!("{:#}", e), "handler failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.ctx.config.handler_timeout, "handler timed out");
                None
            }
        };

        let resp = resp.unwrap_or_else(|| ShortMessageResp::with_status(Status::UnknownError));
        self.ctx.stats.submit(resp.status.is_ok());

        let mut out = pdu.response(resp.status.into());
        if !resp.message_id.is_empty() {
            out.set(Field::MessageId, resp.message_id.as_str());
        }
        self.conn.write(out).await?;

        debug!(message_id = %resp.message_id, status = %resp.status, "submit_sm answered");
        Ok(())
    }

    async fn handle_unbind(&self, pdu: Pdu) -> Result<Flow, ConnectionError> {
        info!("unbind request");

        match self.ctx.config.unbind_policy {
            UnbindPolicy::Close => {
                self.conn.set_state(ConnectionState::Unbinding).await;
                self.conn.write(pdu.response(CommandStatus::OK)).await?;
                Ok(Flow::Close)
            }
            UnbindPolicy::StayBound => {
                self.conn.write(pdu.response(CommandStatus::OK)).await?;
                Ok(Flow::Continue)
            }
        }
    }
}
