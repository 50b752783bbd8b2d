//! TFTP transfer session
//!
//! This module holds the client state machine. It owns no socket and never
//! blocks: the caller's polling loop hands every validated inbound datagram
//! to [`TftpClient::on_datagram`], and retrieves or supplies file content
//! through [`TftpClient::fetch_block`] and [`TftpClient::submit_block`],
//! which also trigger the corresponding ACK or DATA transmission through the
//! [`Transport`] seam.
//!
//! Exactly one transfer is in flight at a time. Session state is a single
//! tagged enum rather than a set of flags, so a stale combination
//! (data ready while idle, clear-to-send during a read) cannot be
//! represented.

use anyhow::{Result, bail};

use crate::protocol::{
    BLOCK_SIZE, HEADER_SIZE, PACKET_CAPACITY, TFTP_PORT, TftpErrorCode, TftpOpcode, build_ack, build_data,
    build_request, get_block, get_tftp_opcode, parse_error,
};
use crate::transport::Transport;

/// Fixed client source UDP port (0xD020).
pub const DEFAULT_SOURCE_PORT: u16 = 53280;

/// Which transfer, if any, is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Read,
    Write,
}

/// Session state. Each variant is consumed only by its matching accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No transfer active.
    Idle,
    /// Read transfer: request or ACK sent, awaiting the next DATA block.
    ReadWaiting,
    /// A DATA payload of `len` bytes is staged for the caller; `last` marks
    /// the terminal block (shorter than the block size, zero included).
    ReadReady { len: usize, last: bool },
    /// Write transfer: request or DATA sent, awaiting ACK/OACK.
    WriteWaiting,
    /// The server acknowledged; the caller may submit the next block.
    WriteReady,
}

/// Polling-driven TFTP client with a single in-flight transfer.
///
/// All transmissions go through the owned transport; the driver drains it
/// after each call (see [`crate::transport::PacketQueue`]).
pub struct TftpClient<T: Transport> {
    transport: T,
    source_port: u16,
    request_port: u16,
    state: State,
    /// Transfer port learned from the first response; requests go to
    /// `request_port` until then.
    server_port: u16,
    /// Last block number observed or acknowledged.
    current_block: u16,
    /// Duplicate suppression: block field of the last packet the dispatcher
    /// handled. None until the first response of a transfer.
    last_processed_block: Option<u16>,
    /// Last block the caller consumed through `fetch_block`.
    last_delivered_block: u16,
    bytes_transferred: usize,
    /// Staging area for one inbound DATA payload.
    inbound: [u8; BLOCK_SIZE],
    /// Encode buffer for outbound packets.
    outbound: [u8; PACKET_CAPACITY],
}

impl<T: Transport> TftpClient<T> {
    /// Create a client with the stock ports: requests to the well-known
    /// TFTP port, [`DEFAULT_SOURCE_PORT`] as the fixed source port.
    pub fn new(transport: T) -> Self {
        Self::with_ports(transport, DEFAULT_SOURCE_PORT, TFTP_PORT)
    }

    /// Create a client with explicit source and request ports, for
    /// unprivileged servers bound off port 69.
    pub fn with_ports(transport: T, source_port: u16, request_port: u16) -> Self {
        Self {
            transport,
            source_port,
            request_port,
            state: State::Idle,
            server_port: request_port,
            current_block: 0,
            last_processed_block: None,
            last_delivered_block: 0,
            bytes_transferred: 0,
            inbound: [0; BLOCK_SIZE],
            outbound: [0; PACKET_CAPACITY],
        }
    }

    /// Start downloading `filename`. Returns the encoded request length.
    ///
    /// Fails, transmitting nothing, if a transfer is already active or the
    /// filename exceeds the short-name budget.
    pub fn begin_read(&mut self, filename: &str) -> Result<usize> {
        if self.state != State::Idle {
            bail!("transfer already in progress");
        }

        let len = build_request(&mut self.outbound, TftpOpcode::ReadRequest, filename)?;
        self.transport
            .send_datagram(&self.outbound[..len], self.source_port, self.request_port)?;

        self.arm(State::ReadWaiting);
        tracing::debug!("sent RRQ for '{}' ({} bytes)", filename, len);
        Ok(len)
    }

    /// Start uploading to `filename`. Returns the encoded request length.
    ///
    /// Same rejection rules as [`Self::begin_read`].
    pub fn begin_write(&mut self, filename: &str) -> Result<usize> {
        if self.state != State::Idle {
            bail!("transfer already in progress");
        }

        let len = build_request(&mut self.outbound, TftpOpcode::WriteRequest, filename)?;
        self.transport
            .send_datagram(&self.outbound[..len], self.source_port, self.request_port)?;

        self.arm(State::WriteWaiting);
        tracing::debug!("sent WRQ for '{}' ({} bytes)", filename, len);
        Ok(len)
    }

    /// Dispatch one inbound datagram. Invoked once per validated UDP
    /// datagram addressed to the client's source port.
    ///
    /// Has no return value; its entire effect is session-state mutation,
    /// observable through the accessors and through packets handed to the
    /// transport.
    pub fn on_datagram(&mut self, datagram: &[u8], source_port: u16) {
        // Extract the fields up front; the caller may reuse its receive
        // buffer as soon as we return.
        let opcode = get_tftp_opcode(datagram);
        let Some(block) = get_block(datagram) else {
            tracing::trace!("ignoring runt datagram of {} bytes", datagram.len());
            return;
        };

        // Sole duplicate-suppression mechanism: the block field of the last
        // handled packet, compared before classifying. Duplicates are
        // dropped without re-acknowledgment.
        if self.last_processed_block == Some(block) {
            tracing::trace!("dropping duplicate of block {}", block);
            return;
        }
        self.last_processed_block = Some(block);
        self.server_port = source_port;

        match (opcode, self.state) {
            // Option negotiation round outside a write: no payload yet,
            // acknowledge with block 0.
            (Some(TftpOpcode::OptionAck), State::Idle | State::ReadWaiting | State::ReadReady { .. }) => {
                self.send_ack(0);
            }
            (Some(TftpOpcode::Data), State::ReadWaiting | State::ReadReady { .. }) => {
                self.recv_data(block, &datagram[HEADER_SIZE..]);
            }
            (Some(TftpOpcode::Acknowledgment), State::WriteWaiting | State::WriteReady) => {
                self.current_block = block;
                self.state = State::WriteReady;
                tracing::trace!("block {} acknowledged, clear to send", block);
            }
            // OACK during a write: the server is re-synchronizing to the
            // option round, so the next DATA block is number 1.
            (Some(TftpOpcode::OptionAck), State::WriteWaiting | State::WriteReady) => {
                self.current_block = 0;
                self.state = State::WriteReady;
                tracing::trace!("options acknowledged, clear to send");
            }
            (Some(TftpOpcode::Error), _) => {
                match parse_error(datagram) {
                    Ok((code, message)) => match TftpErrorCode::from_u16(code) {
                        Some(known) => tracing::warn!("server error {}: {}", known, message),
                        None => tracing::warn!("server error {}: {}", code, message),
                    },
                    Err(_) => tracing::warn!("server error (unparseable packet)"),
                }
                self.state = State::Idle;
            }
            (Some(opcode), state) => {
                tracing::trace!("ignoring {} in state {:?}", opcode, state);
            }
            (None, _) => {
                tracing::trace!("ignoring datagram with unknown opcode");
            }
        }
    }

    /// Copy the staged block, minus `offset` leading bytes, into `dest` and
    /// acknowledge it. Returns the number of bytes copied.
    ///
    /// Returns 0 when no undelivered block is staged. A 0 return with the
    /// session back at idle means the terminal block was empty; poll
    /// [`Self::is_idle`] to tell the cases apart.
    ///
    /// `dest` must hold at least block size minus `offset` bytes.
    pub fn fetch_block(&mut self, dest: &mut [u8], offset: usize) -> usize {
        let State::ReadReady { len, last } = self.state else {
            return 0;
        };
        if self.last_delivered_block >= self.current_block {
            return 0;
        }

        let n = len.saturating_sub(offset);
        if n > 0 {
            dest[..n].copy_from_slice(&self.inbound[offset..len]);
        }

        self.last_delivered_block = self.current_block;
        self.send_ack(self.current_block);

        if last {
            tracing::debug!("transfer complete, {} bytes received", self.bytes_transferred);
            self.state = State::Idle;
        } else {
            self.state = State::ReadWaiting;
        }

        n
    }

    /// Transmit `source` as the next DATA block. Returns the wire length of
    /// the packet, or 0 when the session is not clear to send.
    ///
    /// A block shorter than the block size (empty included) is terminal:
    /// the session returns to idle immediately after transmission, without
    /// waiting for the final ACK.
    pub fn submit_block(&mut self, source: &[u8]) -> usize {
        if self.state != State::WriteReady {
            return 0;
        }
        if source.len() > BLOCK_SIZE {
            tracing::warn!("refusing block of {} bytes, limit is {}", source.len(), BLOCK_SIZE);
            return 0;
        }

        let block = self.current_block.wrapping_add(1);
        let Ok(len) = build_data(&mut self.outbound, block, source) else {
            return 0;
        };

        self.bytes_transferred += source.len();
        tracing::trace!("sending block {} ({} bytes)", block, source.len());
        if let Err(e) = self
            .transport
            .send_datagram(&self.outbound[..len], self.source_port, self.server_port)
        {
            tracing::warn!("failed to send block {}: {}", block, e);
        }

        if source.len() < BLOCK_SIZE {
            tracing::debug!("transfer complete, {} bytes sent", self.bytes_transferred);
            self.state = State::Idle;
        } else {
            self.state = State::WriteWaiting;
        }

        len
    }

    /// True when no transfer is active.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// The active transfer's kind, if any.
    pub fn transfer_kind(&self) -> Option<TransferKind> {
        match self.state {
            State::Idle => None,
            State::ReadWaiting | State::ReadReady { .. } => Some(TransferKind::Read),
            State::WriteWaiting | State::WriteReady => Some(TransferKind::Write),
        }
    }

    /// True when a DATA block is staged for [`Self::fetch_block`].
    pub fn block_ready(&self) -> bool {
        matches!(self.state, State::ReadReady { .. })
    }

    /// True when the server has acknowledged and [`Self::submit_block`]
    /// will transmit.
    pub fn clear_to_send(&self) -> bool {
        self.state == State::WriteReady
    }

    /// Running total of payload bytes moved in the current (or just
    /// finished) transfer. Advisory only.
    pub fn bytes_transferred(&self) -> usize {
        self.bytes_transferred
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Arm the session for a fresh transfer.
    fn arm(&mut self, state: State) {
        self.state = state;
        self.server_port = self.request_port;
        self.current_block = 0;
        self.last_processed_block = None;
        self.last_delivered_block = 0;
        self.bytes_transferred = 0;
    }

    fn recv_data(&mut self, block: u16, payload: &[u8]) {
        let len = payload.len();
        if len > BLOCK_SIZE {
            // The server ignored our blksize option; nothing sane to stage.
            tracing::warn!("ignoring oversized DATA block of {} bytes", len);
            return;
        }

        self.bytes_transferred += len;
        let last = len < BLOCK_SIZE;
        if len > 0 {
            self.inbound[..len].copy_from_slice(payload);
        }

        self.current_block = block;
        self.state = State::ReadReady { len, last };
        tracing::trace!(
            "staged block {} ({} bytes{})",
            block,
            len,
            if last { ", final" } else { "" }
        );
    }

    fn send_ack(&mut self, block: u16) {
        let len = build_ack(&mut self.outbound, block);
        if let Err(e) = self
            .transport
            .send_datagram(&self.outbound[..len], self.source_port, self.server_port)
        {
            tracing::warn!("failed to send ACK {}: {}", block, e);
        }
    }
}
