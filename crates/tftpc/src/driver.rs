//! Transfer driver
//!
//! This module supplies everything the protocol core deliberately leaves
//! out: the UDP socket, the receive loop, and the timeout/retry layer. The
//! core state machine never blocks and keeps no timers, so the driver wraps
//! every receive in a timeout and re-sends the last transmitted datagram
//! when it fires, up to a bounded retry budget, then gives up with a local
//! error. The session's contract is untouched; retransmission happens
//! entirely out here.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tftp_client::transport::{OutboundDatagram, PacketQueue};
use tftp_client::{BLOCK_SIZE, DEFAULT_SOURCE_PORT, TFTP_PORT, TftpClient};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Default receive timeout before a retransmission.
pub const TIMEOUT_SECS: u64 = 3;

/// Default retransmission budget before a transfer is abandoned.
pub const MAX_RETRIES: usize = 8;

/// Transfer driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Server address.
    pub server: IpAddr,
    /// Port requests are sent to (the well-known port, unless the server
    /// runs unprivileged).
    pub server_port: u16,
    /// Local port to bind; 0 picks an ephemeral port.
    pub source_port: u16,
    /// Receive timeout before a retransmission.
    pub timeout: Duration,
    /// Retransmissions attempted before giving up.
    pub max_retries: usize,
}

impl DriverConfig {
    pub fn new(server: IpAddr) -> Self {
        Self {
            server,
            server_port: TFTP_PORT,
            source_port: DEFAULT_SOURCE_PORT,
            timeout: Duration::from_secs(TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
        }
    }
}

/// Download `filename` from the server and return its content.
pub async fn fetch_file(config: &DriverConfig, filename: &str) -> Result<Vec<u8>> {
    let socket = bind_socket(config).await?;
    let mut client = TftpClient::with_ports(PacketQueue::new(), config.source_port, config.server_port);

    client
        .begin_read(filename)
        .with_context(|| format!("failed to request '{}'", filename))?;
    let mut last_sent = flush(&socket, config.server, &mut client)
        .await?
        .context("request was not transmitted")?;

    let mut content = Vec::new();
    let mut chunk = [0u8; BLOCK_SIZE];
    let mut buf = [0u8; 2048];
    let mut retries = 0usize;

    loop {
        let (len, peer) = match timeout(config.timeout, socket.recv_from(&mut buf)).await {
            Ok(received) => received.context("receive failed")?,
            Err(_) => {
                retries += 1;
                if retries > config.max_retries {
                    bail!("no response for '{}' after {} retries", filename, config.max_retries);
                }
                retransmit(&socket, config.server, &last_sent).await?;
                continue;
            }
        };
        if peer.ip() != config.server {
            tracing::debug!("ignoring datagram from unexpected host {}", peer);
            continue;
        }
        retries = 0;

        client.on_datagram(&buf[..len], peer.port());
        if let Some(datagram) = flush(&socket, config.server, &mut client).await? {
            last_sent = datagram;
        }

        // Only fetch_block completes a read; idling anywhere else means the
        // server sent an ERROR.
        if client.is_idle() {
            bail!("transfer of '{}' aborted by server", filename);
        }

        let fetched = client.fetch_block(&mut chunk, 0);
        if fetched > 0 {
            content.extend_from_slice(&chunk[..fetched]);
        }
        if let Some(datagram) = flush(&socket, config.server, &mut client).await? {
            last_sent = datagram;
        }

        if client.is_idle() {
            tracing::info!("downloaded '{}' ({} bytes)", filename, content.len());
            return Ok(content);
        }
    }
}

/// Upload `content` to the server under `filename`.
pub async fn store_file(config: &DriverConfig, filename: &str, content: &[u8]) -> Result<()> {
    let socket = bind_socket(config).await?;
    let mut client = TftpClient::with_ports(PacketQueue::new(), config.source_port, config.server_port);

    client
        .begin_write(filename)
        .with_context(|| format!("failed to request '{}'", filename))?;
    let mut last_sent = flush(&socket, config.server, &mut client)
        .await?
        .context("request was not transmitted")?;

    let mut buf = [0u8; 2048];
    let mut offset = 0usize;
    let mut finished = false;
    let mut retries = 0usize;

    loop {
        let (len, peer) = match timeout(config.timeout, socket.recv_from(&mut buf)).await {
            Ok(received) => received.context("receive failed")?,
            Err(_) => {
                retries += 1;
                if retries > config.max_retries {
                    bail!("no response for '{}' after {} retries", filename, config.max_retries);
                }
                retransmit(&socket, config.server, &last_sent).await?;
                continue;
            }
        };
        if peer.ip() != config.server {
            tracing::debug!("ignoring datagram from unexpected host {}", peer);
            continue;
        }
        retries = 0;

        client.on_datagram(&buf[..len], peer.port());

        if client.clear_to_send() {
            let end = (offset + BLOCK_SIZE).min(content.len());
            let block = &content[offset..end];
            client.submit_block(block);
            offset = end;
            // A short (possibly empty) block is the last one
            if block.len() < BLOCK_SIZE {
                finished = true;
            }
            if let Some(datagram) = flush(&socket, config.server, &mut client).await? {
                last_sent = datagram;
            }
        }

        if client.is_idle() {
            if finished {
                tracing::info!("uploaded '{}' ({} bytes)", filename, content.len());
                return Ok(());
            }
            bail!("transfer of '{}' aborted by server", filename);
        }
    }
}

/// Bind the client socket with an address family matching the server's.
async fn bind_socket(config: &DriverConfig) -> Result<UdpSocket> {
    let bind_addr = match config.server {
        IpAddr::V4(_) => format!("0.0.0.0:{}", config.source_port),
        IpAddr::V6(_) => format!("[::]:{}", config.source_port),
    };

    let socket = UdpSocket::bind(&bind_addr)
        .await
        .context("failed to bind client socket")?;

    tracing::debug!("client socket bound to {}", socket.local_addr()?);
    Ok(socket)
}

/// Drain the session's staged datagrams to the socket; returns the last one
/// sent, which becomes the retransmission candidate.
async fn flush(
    socket: &UdpSocket,
    server: IpAddr,
    client: &mut TftpClient<PacketQueue>,
) -> Result<Option<OutboundDatagram>> {
    let mut last = None;

    while let Some(datagram) = client.transport_mut().pop() {
        socket
            .send_to(&datagram.payload, SocketAddr::new(server, datagram.dest_port))
            .await
            .context("send failed")?;
        last = Some(datagram);
    }

    Ok(last)
}

async fn retransmit(socket: &UdpSocket, server: IpAddr, datagram: &OutboundDatagram) -> Result<()> {
    tracing::debug!(
        "receive timed out, retransmitting last datagram ({} bytes to port {})",
        datagram.payload.len(),
        datagram.dest_port
    );

    socket
        .send_to(&datagram.payload, SocketAddr::new(server, datagram.dest_port))
        .await
        .context("retransmit failed")?;

    Ok(())
}
