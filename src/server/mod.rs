//! SMPP server: accepts connections, authenticates binds and dispatches
//! `submit_sm` requests to a [`Handler`].
//!
//! ```no_run
//! use smpp_session::config::ServerConfig;
//! use smpp_session::message::ShortMessageResp;
//! use smpp_session::server::{handler_fn, Account, Server};
//!
//! # async fn run() -> Result<(), smpp_session::server::ServerError> {
//! let handler = handler_fn(|_msg| async { anyhow::Ok(ShortMessageResp::ok("1234")) });
//! let server = Server::new(ServerConfig::new("smsc", 2775), handler);
//! server.add_account(Account::new("client", "pw"));
//! let addr = server.start().await?;
//! println!("listening on {addr}");
//! # Ok(())
//! # }
//! ```

mod acceptor;
mod account;
mod handler;
mod session;
mod stats;

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{ConfigError, ServerConfig};
use crate::connection::Connection;

use acceptor::{bind_listener, build_tls_acceptor, Acceptor, ConnectionMap};
use session::SessionContext;

pub use account::{Account, AccountStore, AuthFailure};
pub use handler::{handler_fn, Handler, HandlerFn};
pub use session::{HandshakeError, SessionError};
pub use stats::{ServerStats, StatsSnapshot};

/// Server lifecycle errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),

    #[error("server already started")]
    AlreadyStarted,

    #[error("server not started")]
    NotStarted,
}

struct Running {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// SMPP server.
pub struct Server {
    config: ServerConfig,
    accounts: Arc<AccountStore>,
    handler: Arc<dyn Handler>,
    stats: Arc<ServerStats>,
    connections: ConnectionMap,
    running: Mutex<Option<Running>>,
}

impl Server {
    /// Create a server. Nothing is bound until [`Server::start`].
    pub fn new(config: ServerConfig, handler: impl Handler + 'static) -> Self {
        Self {
            config,
            accounts: Arc::new(AccountStore::new()),
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
            connections: ConnectionMap::default(),
            running: Mutex::new(None),
        }
    }

    /// Insert or replace an account. Takes effect for binds after the call.
    pub fn add_account(&self, account: Account) {
        self.accounts.add(account);
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Validate the configuration, bind the listener and spawn the accept loop.
    ///
    /// Returns the bound address once the listener is up.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        self.config.validate()?;

        if self.lock_running().is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        let tls_acceptor = self
            .config
            .tls
            .as_ref()
            .map(build_tls_acceptor)
            .transpose()
            .map_err(ConfigError::Tls)?;

        let port = self.config.port.ok_or(ConfigError::MissingField("port"))?;
        let listener = bind_listener(&self.config.host, port)
            .await
            .map_err(ServerError::Bind)?;
        let addr = listener.local_addr().map_err(ServerError::Bind)?;

        let mut running = self.lock_running();
        if running.is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        let ctx = Arc::new(SessionContext {
            config: self.config.clone(),
            accounts: self.accounts.clone(),
            handler: self.handler.clone(),
            stats: self.stats.clone(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let acceptor = Acceptor::new(listener, tls_acceptor, ctx, self.connections.clone());
        let task = tokio::spawn(acceptor.run(shutdown_rx));

        *running = Some(Running {
            addr,
            shutdown_tx,
            task,
        });

        info!(%addr, accounts = self.accounts.len(), "server started");
        Ok(addr)
    }

    /// Bound listen address, or `None` before start and after close.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().map(|r| r.addr)
    }

    /// Stop accepting connections and release the listening socket.
    ///
    /// Sessions already accepted keep running until their peers leave.
    pub async fn close(&self) -> Result<(), ServerError> {
        let running = self.lock_running().take().ok_or(ServerError::NotStarted)?;

        let _ = running.shutdown_tx.send(true);
        let _ = running.task.await;

        info!(addr = %running.addr, "server closed");
        Ok(())
    }

    /// Number of connections with a live session task.
    pub fn active_connections(&self) -> usize {
        self.stats.active_connections()
    }

    /// Snapshot of the connections with a live session task.
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(running) = self.lock_running().take() {
            let _ = running.shutdown_tx.send(true);
        }
    }
}
