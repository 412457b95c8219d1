//! Shared fixtures for the loopback integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use smpp_session::config::ServerConfig;
use smpp_session::connection::{Connection, ConnectionError};
use smpp_session::message::{ShortMessage, ShortMessageResp, Status};
use smpp_session::pdu::{CommandId, Pdu};
use smpp_session::server::{handler_fn, Account, Server};

pub const SYSTEM_ID: &str = "smsc";
pub const USER: &str = "client";
pub const PASSWORD: &str = "pw";

/// Upper bound for any single network wait in tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Server on an ephemeral loopback port with one account (`client`/`pw`).
///
/// The handler picks its answer from the destination address:
/// - `fail`: returns an error
/// - `slow`: sleeps for ten seconds first
/// - `queue`: answers MessageQueueFull without a message id
/// - `corr-*`: answers OK with the destination as message id
/// - anything else: answers OK with message id `1234`
pub struct TestServer {
    pub server: Server,
    pub addr: SocketAddr,
    pub received: mpsc::UnboundedReceiver<ShortMessage>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_config(|config| config).await
    }

    pub async fn with_config(configure: impl FnOnce(ServerConfig) -> ServerConfig) -> Self {
        let (tx, received) = mpsc::unbounded_channel();

        let handler = handler_fn(move |message: ShortMessage| {
            let tx = tx.clone();
            async move {
                let dst = message.dst.clone();
                let _ = tx.send(message);
                match dst.as_str() {
                    "fail" => anyhow::bail!("rejected by test handler"),
                    "slow" => {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(ShortMessageResp::ok("late"))
                    }
                    "queue" => Ok(ShortMessageResp::with_status(Status::MessageQueueFull)),
                    d if d.starts_with("corr") => Ok(ShortMessageResp::ok(d)),
                    _ => Ok(ShortMessageResp::ok("1234")),
                }
            }
        });

        let config = configure(ServerConfig::new(SYSTEM_ID, 0).with_host("127.0.0.1"));
        let server = Server::new(config, handler);
        server.add_account(Account::new(USER, PASSWORD));
        let addr = server.start().await.expect("server start");

        Self {
            server,
            addr,
            received,
        }
    }

    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }
}

/// Open a raw PDU connection to the server.
pub async fn raw_connect(addr: SocketAddr) -> Connection {
    Connection::connect(&addr.to_string()).await.expect("connect")
}

/// Read one PDU, failing the test if nothing arrives in time.
pub async fn read(conn: &Connection) -> Result<Pdu, ConnectionError> {
    timeout(WAIT, conn.read()).await.expect("timed out waiting for pdu")
}

/// Open a raw connection and bind with the given command and credentials.
pub async fn raw_bind(addr: SocketAddr, command: CommandId, user: &str, password: &str) -> (Connection, Pdu) {
    let conn = raw_connect(addr).await;
    conn.write(Pdu::bind(command, 1, user, password)).await.expect("write bind");
    let resp = read(&conn).await.expect("bind response");
    (conn, resp)
}
