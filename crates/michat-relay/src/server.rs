//! UDP transport loop for the relay.
//!
//! One socket, one receive loop. Each datagram is handed to its own task so
//! that RSA work on one packet never delays receipt of the next; the number
//! of datagrams in flight is bounded by a semaphore.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use socket2::SockRef;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::relay::{Outbound, PacketError, Relay};

/// Largest UDP payload.
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Default configuration values
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;
pub const DEFAULT_SOCKET_BUFFER_BYTES: usize = 10_000 * 1024;
const STATS_INTERVAL_SECS: u64 = 60;

/// Best-effort socket tuning.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub recv_buffer_bytes: usize,
    pub send_buffer_bytes: usize,
    pub broadcast: bool,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_buffer_bytes: DEFAULT_SOCKET_BUFFER_BYTES,
            send_buffer_bytes: DEFAULT_SOCKET_BUFFER_BYTES,
            broadcast: true,
        }
    }
}

impl SocketOptions {
    /// Apply to `socket`. Failures are logged, not returned.
    pub fn apply(&self, socket: &UdpSocket) {
        let sock = SockRef::from(socket);
        if let Err(e) = sock.set_recv_buffer_size(self.recv_buffer_bytes) {
            warn!("failed to set SO_RCVBUF: {}", e);
        }
        if let Err(e) = sock.set_send_buffer_size(self.send_buffer_bytes) {
            warn!("failed to set SO_SNDBUF: {}", e);
        }
        if let Err(e) = sock.set_broadcast(self.broadcast) {
            warn!("failed to set SO_BROADCAST: {}", e);
        }
        debug!(
            "socket buffers: recv={:?} send={:?}",
            sock.recv_buffer_size().ok(),
            sock.send_buffer_size().ok()
        );
    }
}

/// Relay server state
pub struct RelayServer {
    socket: Arc<UdpSocket>,
    relay: Arc<Relay>,
    in_flight: Arc<Semaphore>,
}

impl RelayServer {
    pub async fn bind(
        listen: SocketAddr,
        relay: Arc<Relay>,
        max_in_flight: usize,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(listen).await?;
        Ok(Self::from_socket(socket, relay, max_in_flight))
    }

    pub fn from_socket(socket: UdpSocket, relay: Arc<Relay>, max_in_flight: usize) -> Self {
        Self {
            socket: Arc::new(socket),
            relay,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive loop. Only returns if the in-flight semaphore is closed.
    pub async fn run(&self) -> Result<()> {
        info!("Relay listening on {}", self.local_addr()?);

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut stats_interval = tokio::time::interval(Duration::from_secs(STATS_INTERVAL_SECS));

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    let (len, src) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            // e.g. ICMP port unreachable surfacing on some platforms
                            debug!("recv_from failed: {}", e);
                            continue;
                        }
                    };

                    let permit = self.in_flight.clone().acquire_owned().await?;
                    let packet = buf[..len].to_vec();
                    let relay = self.relay.clone();
                    let socket = self.socket.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        process_datagram(relay, socket, packet, src).await;
                    });
                }
                _ = stats_interval.tick() => {
                    let stats = self.relay.directory().stats();
                    info!(
                        "directory: {} sessions, {} published keys",
                        stats.sessions, stats.published_keys
                    );
                }
            }
        }
    }
}

async fn process_datagram(
    relay: Arc<Relay>,
    socket: Arc<UdpSocket>,
    packet: Vec<u8>,
    src: SocketAddr,
) {
    // RSA is CPU-bound; keep it off the async workers.
    let outcome =
        tokio::task::spawn_blocking(move || relay.handle_datagram(&packet, src)).await;

    let intro = match outcome {
        Ok(Ok(intro)) => intro,
        Ok(Err(e)) => {
            debug!("Packet from {} dropped: {}", src, e);
            return;
        }
        Err(e) => {
            warn!("Packet from {} dropped: handler failed: {}", src, e);
            return;
        }
    };

    debug!(
        "introduction {} -> {}: {} notices, {} skipped",
        intro.sender,
        intro.target,
        intro.outbound.len(),
        intro.skipped.len()
    );

    for out in &intro.outbound {
        if let Err(e) = send_notice(&socket, out).await {
            warn!(
                "Failed to send {:?} notice to {}: {}",
                out.kind, out.destination, e
            );
        }
    }
}

async fn send_notice(socket: &UdpSocket, out: &Outbound) -> Result<(), PacketError> {
    let sent = socket.send_to(&out.payload, out.destination).await?;
    if sent < out.payload.len() {
        return Err(PacketError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "full datagram was not written",
        )));
    }
    Ok(())
}
