use std::io;

use thiserror::Error;

use crate::connection::ConnectionError;
use crate::pdu::{CommandId, CommandStatus};

/// Reasons [`Client::bind`](super::Client::bind) fails.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),

    #[error("bind rejected with status {0}")]
    Rejected(CommandStatus),

    #[error("connection closed before bind response")]
    ConnectionClosed,

    #[error("timed out waiting for bind response")]
    Timeout,

    #[error("protocol error during bind: {0}")]
    Protocol(#[source] ConnectionError),
}

impl From<ConnectionError> for BindError {
    fn from(e: ConnectionError) -> Self {
        if e.is_closed() {
            BindError::ConnectionClosed
        } else {
            BindError::Protocol(e)
        }
    }
}

/// Errors returned by requests on a bound client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session is not bound")]
    NotBound,

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("timed out waiting for response to sequence {0}")]
    Timeout(u32),

    #[error("connection closed while waiting for response")]
    Closed,

    #[error("unexpected response {command} with status {status}")]
    UnexpectedResponse {
        command: CommandId,
        status: CommandStatus,
    },
}
