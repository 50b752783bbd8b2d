//! TFTP Client Library
//!
//! A sans-I/O TFTP (RFC 1350) client supporting file download and upload
//! with a single in-flight transfer, built for polling-driven environments:
//! the caller feeds inbound datagrams in, collects outbound datagrams from
//! the transport seam, and moves file content one block at a time.
//!
//! # Features
//!
//! - Read (RRQ) and write (WRQ) transfers in binary (octet) mode
//! - Block size negotiation (RFC 2348), fixed at 256 bytes
//! - Duplicate suppression and end-of-transfer detection
//! - No internal socket, timer, or allocation on the encode path; the
//!   driving loop supplies I/O and retries (see the `tftpc` crate)
//!
//! # Example
//!
//! ```
//! use tftp_client::{PacketQueue, TftpClient};
//!
//! let mut client = TftpClient::new(PacketQueue::new());
//! client.begin_read("GAME.PRG")?;
//!
//! // Drain the request packet to the network layer
//! let request = client.transport_mut().pop().unwrap();
//! assert_eq!(request.dest_port, 69);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod protocol;
pub mod session;
pub mod transport;

pub use protocol::{BLOCK_SIZE, HEADER_SIZE, MAX_FILENAME, PACKET_CAPACITY, TFTP_PORT, TftpErrorCode, TftpOpcode};
pub use session::{DEFAULT_SOURCE_PORT, TftpClient, TransferKind};
pub use transport::{OutboundDatagram, PacketQueue, Transport};
