//! TCP/TLS accept loop.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::config::TlsConfig;
use crate::connection::{Connection, ConnectionId, Stream};
use crate::pdu::PduCodec;

use super::session::{Session, SessionContext};

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connections currently owned by a session task.
pub(crate) type ConnectionMap = Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>;

/// Accepts connections and spawns one session task per connection.
pub(crate) struct Acceptor {
    listener: TcpListener,
    tls_acceptor: Option<TlsAcceptor>,
    ctx: Arc<SessionContext>,
    connections: ConnectionMap,
}

impl Acceptor {
    pub fn new(
        listener: TcpListener,
        tls_acceptor: Option<TlsAcceptor>,
        ctx: Arc<SessionContext>,
        connections: ConnectionMap,
    ) -> Self {
        Self {
            listener,
            tls_acceptor,
            ctx,
            connections,
        }
    }

    /// Run the accept loop until shutdown is signalled.
    ///
    /// The listening socket is dropped on return. Sessions already spawned
    /// keep running.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let address = self.listener.local_addr().ok();
        info!(
            address = ?address,
            system_id = %self.ctx.config.system_id,
            tls = self.tls_acceptor.is_some(),
            "listener started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    info!("listener shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => self.handle_accept(stream, peer_addr),
                        Err(e) => {
                            error!(error = %e, "accept error");
                        }
                    }
                }
            }
        }

        info!(address = ?address, "listener stopped");
    }

    /// Spawn the session task for an accepted stream.
    fn handle_accept(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let conn_id = ConnectionId::next();

        let span = span!(Level::INFO, "conn", id = %conn_id, peer = %peer_addr);

        if let Err(e) = configure_socket(&stream) {
            error!(parent: &span, error = %e, "socket configuration failed");
            return;
        }

        let tls_acceptor = self.tls_acceptor.clone();
        let ctx = self.ctx.clone();
        let connections = self.connections.clone();

        tokio::spawn(
            async move {
                let stream = match tls_acceptor {
                    Some(acceptor) => match accept_tls(&acceptor, stream).await {
                        Some(stream) => stream,
                        None => return,
                    },
                    None => Stream::Plain(stream),
                };

                debug!("connection accepted");
                ctx.stats.connection_opened();

                let connection = Arc::new(Connection::new(conn_id, peer_addr, stream, PduCodec::new()));
                connections.write().await.insert(conn_id, connection.clone());

                match Session::new(connection.clone(), ctx.clone()).run().await {
                    Ok(()) => debug!("session ended"),
                    Err(e) if e.is_disconnect() => debug!("peer closed connection"),
                    Err(e) => warn!(error = %e, "session ended with error"),
                }

                connections.write().await.remove(&conn_id);
                ctx.stats.connection_closed();
                debug!(uptime = ?connection.uptime(), "connection closed");
            }
            .instrument(span),
        );
    }
}

async fn accept_tls(acceptor: &TlsAcceptor, stream: TcpStream) -> Option<Stream> {
    match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => {
            debug!("TLS handshake completed");
            Some(Stream::Tls(Box::new(tls_stream)))
        }
        Ok(Err(e)) => {
            warn!(error = %e, "TLS handshake failed");
            None
        }
        Err(_) => {
            warn!("TLS handshake timeout");
            None
        }
    }
}

/// Bind the listening socket, falling back to the IPv6 loopback.
pub(crate) async fn bind_listener(host: &str, port: u16) -> io::Result<TcpListener> {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            warn!(host, port, error = %e, "bind failed, retrying on [::1]");
            TcpListener::bind(("::1", port)).await.map_err(|_| e)
        }
    }
}

/// Configure TCP socket options.
fn configure_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    Ok(())
}

/// Build TLS acceptor from config.
pub(crate) fn build_tls_acceptor(config: &TlsConfig) -> io::Result<TlsAcceptor> {
    use std::fs::File;
    use std::io::BufReader;
    use tokio_rustls::rustls;

    let cert_file = File::open(&config.cert)?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_reader).collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "no certificate found"));
    }

    let key_file = File::open(&config.key)?;
    let mut key_reader = BufReader::new(key_file);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found"))?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
