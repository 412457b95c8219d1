use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::signal;
use tracing::info;

use smpp_session::client::{Client, ClientConfig};
use smpp_session::config::Config;
use smpp_session::connection::Connection;
use smpp_session::message::{DataCoding, ShortMessage, ShortMessageResp};
use smpp_session::server::{Handler, Server};
use smpp_session::telemetry::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(name = "smpp-session")]
#[command(author, version, about = "SMPP server and transmitter client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a server that acknowledges every submitted message
    Serve {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Validate config and exit
        #[arg(long)]
        validate: bool,
    },

    /// Bind as a transmitter and submit one message
    Submit {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:2775")]
        addr: String,

        #[arg(long)]
        user: String,

        #[arg(long)]
        password: String,

        /// Source address
        #[arg(long)]
        src: String,

        /// Destination address
        #[arg(long)]
        dst: String,

        #[arg(long)]
        text: String,

        /// Encode as UCS2 instead of the GSM default alphabet
        #[arg(long)]
        ucs2: bool,

        /// Response timeout
        #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
        timeout: Duration,
    },
}

/// Accepts every message and hands out sequential message ids.
#[derive(Default)]
struct AckHandler {
    next_id: AtomicU64,
}

#[async_trait]
impl Handler for AckHandler {
    async fn handle_submit(&self, conn: &Connection, message: ShortMessage) -> Result<ShortMessageResp> {
        let message_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let system_id = conn.system_id().await.unwrap_or_default();
        info!(
            system_id = %system_id,
            src = %message.src,
            dst = %message.dst,
            text = %message.text_str(),
            message_id,
            "message accepted"
        );
        Ok(ShortMessageResp::ok(format!("{:x}", message_id)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Serve { config, validate } => serve(config, validate).await,
        Command::Submit {
            addr,
            user,
            password,
            src,
            dst,
            text,
            ucs2,
            timeout,
        } => {
            init_tracing(&TracingConfig::default())?;

            let config = ClientConfig::new(addr, user, password).with_response_timeout(timeout);
            let client = Client::bind(config).await.context("bind failed")?;

            let coding = if ucs2 { DataCoding::Ucs2 } else { DataCoding::Default };
            let message = ShortMessage::new(src, dst, text).with_data_coding(coding);
            let resp = client.submit_sm(&message).await.context("submit_sm failed")?;

            info!(message_id = %resp.message_id, status = %resp.status, "submit_sm response");

            if let Err(e) = client.unbind().await {
                info!(error = %e, "unbind failed");
            }
            Ok(())
        }
    }
}

async fn serve(path: PathBuf, validate: bool) -> Result<()> {
    // Load configuration first (to get log settings)
    let config = Config::load(&path)?;

    init_tracing(&TracingConfig::from(&config.telemetry))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        accounts = config.accounts.len(),
        "configuration loaded"
    );

    if validate {
        info!("configuration is valid");
        return Ok(());
    }

    let server = Server::new(config.server, AckHandler::default());
    for account in config.accounts {
        server.add_account(account);
    }
    server.start().await?;

    wait_for_shutdown().await?;

    server.close().await?;
    info!(stats = ?server.stats(), "server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("failed to install Ctrl+C handler")?;
                info!("received SIGINT (Ctrl+C)");
            }
            _ = terminate.recv() => {
                info!("received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("failed to install Ctrl+C handler")?;
        info!("received SIGINT (Ctrl+C)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ack_handler_assigns_hex_ids() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (conn, _peer) = tokio::join!(Connection::connect(&addr), listener.accept());
        let conn = Arc::new(conn.unwrap());
        let handler = Arc::new(AckHandler::default());

        // Handlers run on spawned session tasks, so the future must be Send.
        let mut ids = Vec::new();
        for _ in 0..11 {
            let (handler, conn) = (handler.clone(), conn.clone());
            let resp = tokio::spawn(async move {
                handler
                    .handle_submit(&conn, ShortMessage::new("a", "b", "x"))
                    .await
                    .unwrap()
            })
            .await
            .unwrap();
            ids.push(resp.message_id);
        }

        assert_eq!(ids[0], "1");
        assert_eq!(ids[10], "b");
    }
}
