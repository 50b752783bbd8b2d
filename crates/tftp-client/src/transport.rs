//! Datagram transport seam
//!
//! The transfer session never touches a socket. Everything it transmits goes
//! through the [`Transport`] trait, a minimal datagram send contract: one
//! fixed server per client, a fixed client source port, and a destination
//! port that switches from the well-known request port to the server's
//! ephemeral transfer port.
//!
//! [`PacketQueue`] is the bundled implementation: it stages outbound
//! datagrams in order so an async driver can drain them to a real UDP socket
//! after each session call. Tests drain the same queue to assert on exactly
//! what the session put on the wire.

use std::collections::VecDeque;

use anyhow::Result;

/// Outbound hand-off to the network layer.
///
/// The destination host is a property of the transport instance; the session
/// only chooses the destination port.
pub trait Transport {
    /// Hand one UDP datagram over for transmission.
    fn send_datagram(&mut self, payload: &[u8], source_port: u16, dest_port: u16) -> Result<()>;
}

/// One datagram staged for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDatagram {
    pub payload: Vec<u8>,
    pub source_port: u16,
    pub dest_port: u16,
}

/// FIFO of datagrams awaiting transmission.
#[derive(Debug, Default)]
pub struct PacketQueue {
    pending: VecDeque<OutboundDatagram>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next staged datagram, oldest first.
    pub fn pop(&mut self) -> Option<OutboundDatagram> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Transport for PacketQueue {
    fn send_datagram(&mut self, payload: &[u8], source_port: u16, dest_port: u16) -> Result<()> {
        self.pending.push_back(OutboundDatagram {
            payload: payload.to_vec(),
            source_port,
            dest_port,
        });
        Ok(())
    }
}
