#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use michat_crypto::ServiceIdentity;
use michat_relay::server::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_SOCKET_BUFFER_BYTES};
use michat_relay::{Relay, RelayServer, SessionDirectory, SocketOptions};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "michat-relay")]
#[command(about = "michat rendezvous relay - introduces peers to each other over UDP")]
struct Args {
    /// UDP listen address
    #[arg(long, env = "MICHAT_RELAY_LISTEN", default_value = "0.0.0.0:9527")]
    listen: SocketAddr,

    /// Service private key (base64 DER PKCS#8). Defaults to the built-in key.
    #[arg(long, env = "MICHAT_RELAY_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Socket receive buffer size in bytes
    #[arg(long, env = "MICHAT_RELAY_RECV_BUFFER", default_value_t = DEFAULT_SOCKET_BUFFER_BYTES)]
    recv_buffer: usize,

    /// Socket send buffer size in bytes
    #[arg(long, env = "MICHAT_RELAY_SEND_BUFFER", default_value_t = DEFAULT_SOCKET_BUFFER_BYTES)]
    send_buffer: usize,

    /// Enable SO_BROADCAST on the socket
    #[arg(long, env = "MICHAT_RELAY_BROADCAST", default_value_t = true, action = ArgAction::Set)]
    broadcast: bool,

    /// Maximum datagrams processed concurrently
    #[arg(long, env = "MICHAT_RELAY_MAX_IN_FLIGHT", default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    michat_common::init_tracing_with_default(&args.log_level);

    info!("Starting michat-relay v{}", env!("CARGO_PKG_VERSION"));

    let identity = match args.private_key.as_deref() {
        Some(encoded) => ServiceIdentity::from_private_key(encoded)
            .context("failed to load service private key")?,
        None => ServiceIdentity::builtin().context("failed to load built-in service key")?,
    };
    info!(
        "Service public key ({} bits): {}",
        identity.block_size() * 8,
        identity.public_key_base64()?
    );

    let relay = Arc::new(Relay::new(
        Arc::new(SessionDirectory::new()),
        Arc::new(identity),
    ));

    let server = RelayServer::bind(args.listen, relay, args.max_in_flight)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;

    SocketOptions {
        recv_buffer_bytes: args.recv_buffer,
        send_buffer_bytes: args.send_buffer,
        broadcast: args.broadcast,
    }
    .apply(server.socket());

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["michat-relay"]).unwrap();
        assert_eq!(args.listen, "0.0.0.0:9527".parse::<SocketAddr>().unwrap());
        assert!(args.private_key.is_none());
        assert!(args.broadcast);
        assert_eq!(args.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "michat-relay",
            "--listen",
            "127.0.0.1:7000",
            "--broadcast",
            "false",
            "--recv-buffer",
            "65536",
        ])
        .unwrap();
        assert_eq!(args.listen.port(), 7000);
        assert!(!args.broadcast);
        assert_eq!(args.recv_buffer, 65536);
    }
}
