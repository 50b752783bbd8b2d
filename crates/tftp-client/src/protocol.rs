//! TFTP wire format
//!
//! This module contains the TFTP packet encoders and decode helpers used by
//! the transfer session, along with the protocol constants.
//!
//! # TFTP Protocol Overview
//!
//! TFTP (Trivial File Transfer Protocol) is defined in RFC 1350 with option
//! negotiation in RFC 2347/2348. A client initiates a transfer with a read
//! or write request, then file content moves in fixed-size blocks, each
//! acknowledged by its block number. A block shorter than the negotiated
//! block size marks the end of the transfer.
//!
//! This client always requests binary (octet) mode and negotiates a fixed
//! 256-byte block size via the `blksize` option.
//!
//! Unlike a general-purpose implementation, the encoders here write into
//! caller-provided fixed-size buffers and never allocate: the transfer
//! session runs them against its own staging area, and every length check
//! happens before the first byte is written so a rejected packet leaves the
//! buffer untouched.

use std::fmt;

use anyhow::{Result, anyhow};

/// Negotiated block size in bytes, requested via the `blksize` option.
pub const BLOCK_SIZE: usize = 256;

/// Size of the opcode + block number header on DATA/ACK packets.
pub const HEADER_SIZE: usize = 4;

/// Capacity needed to encode any packet this client sends.
pub const PACKET_CAPACITY: usize = HEADER_SIZE + BLOCK_SIZE;

/// Longest accepted filename: a 16-character name, a dot, and a 3-character
/// extension, matching the short-name limit of the file system the transfers
/// ultimately serve.
pub const MAX_FILENAME: usize = 16 + 1 + 3;

/// Well-known UDP port read and write requests are sent to.
pub const TFTP_PORT: u16 = 69;

const MODE_OCTET: &[u8] = b"octet\0";
const OPTION_BLKSIZE: &[u8] = b"blksize\0";
const OPTION_BLKSIZE_VALUE: &[u8] = b"256\0";

/// TFTP Protocol Opcodes
///
/// Each opcode identifies a packet format as defined in RFC 1350 (OACK in
/// RFC 2347).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TftpOpcode {
    /// Read Request (RRQ) - Opcode 1
    ///
    /// Client requests to read a file from the server.
    ///
    /// Packet format: | Opcode | Filename | 0 | Mode | 0 | \[Options\] |
    ReadRequest = 1,

    /// Write Request (WRQ) - Opcode 2
    ///
    /// Client requests to write a file to the server.
    ///
    /// Packet format: | Opcode | Filename | 0 | Mode | 0 | \[Options\] |
    WriteRequest = 2,

    /// Data Packet (DATA) - Opcode 3
    ///
    /// One block of file content. The last packet of a transfer carries
    /// less than the negotiated block size, possibly zero bytes.
    ///
    /// Packet format: | Opcode | Block# | Data |
    Data = 3,

    /// Acknowledgment (ACK) - Opcode 4
    ///
    /// Acknowledges receipt of a data packet by block number. ACK with
    /// block number 0 acknowledges an OACK.
    ///
    /// Packet format: | Opcode | Block# |
    Acknowledgment = 4,

    /// Error Packet (ERROR) - Opcode 5
    ///
    /// Reports an error condition and terminates the transfer.
    ///
    /// Packet format: | Opcode | ErrorCode | ErrMsg | 0 |
    Error = 5,

    /// Option Acknowledgment (OACK) - Opcode 6
    ///
    /// Server's acceptance of negotiated options, standing in for the
    /// first ACK of the transfer.
    ///
    /// Packet format: | Opcode | Opt1 | 0 | Value1 | 0 | ... |
    OptionAck = 6,
}

impl TftpOpcode {
    /// Convert a u16 value to a TftpOpcode
    ///
    /// # Examples
    /// ```
    /// use tftp_client::TftpOpcode;
    ///
    /// assert_eq!(TftpOpcode::from_u16(1), Some(TftpOpcode::ReadRequest));
    /// assert_eq!(TftpOpcode::from_u16(99), None);
    /// ```
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::ReadRequest),
            2 => Some(Self::WriteRequest),
            3 => Some(Self::Data),
            4 => Some(Self::Acknowledgment),
            5 => Some(Self::Error),
            6 => Some(Self::OptionAck),
            _ => None,
        }
    }

    /// Convert the opcode to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the human-readable name of the opcode
    ///
    /// # Examples
    /// ```
    /// use tftp_client::TftpOpcode;
    ///
    /// assert_eq!(TftpOpcode::ReadRequest.name(), "RRQ");
    /// assert_eq!(TftpOpcode::Data.name(), "DATA");
    /// ```
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadRequest => "RRQ",
            Self::WriteRequest => "WRQ",
            Self::Data => "DATA",
            Self::Acknowledgment => "ACK",
            Self::Error => "ERROR",
            Self::OptionAck => "OACK",
        }
    }
}

impl From<TftpOpcode> for u16 {
    fn from(opcode: TftpOpcode) -> Self {
        opcode.as_u16()
    }
}

impl fmt::Display for TftpOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// TFTP Error Codes
///
/// Standard error codes as defined in RFC 1350. The client never sends
/// ERROR packets itself; these are decoded from the server for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TftpErrorCode {
    /// Generic error condition; the message carries the details.
    NotDefined = 0,
    /// The requested file does not exist on the server.
    FileNotFound = 1,
    /// Client lacks permission for the requested file or operation.
    AccessViolation = 2,
    /// No more space available to complete a write.
    DiskFull = 3,
    /// The requested operation is not supported or malformed.
    IllegalOperation = 4,
    /// Packet received from an unknown source port.
    UnknownTransferId = 5,
    /// Attempted to create a file that already exists.
    FileAlreadyExists = 6,
    /// User-based authentication failed or user does not exist.
    NoSuchUser = 7,
    /// Client and server could not agree on transfer options (RFC 2347).
    OptionNegotiationFailed = 8,
}

impl TftpErrorCode {
    /// Convert a u16 value to a TftpErrorCode
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::NotDefined),
            1 => Some(Self::FileNotFound),
            2 => Some(Self::AccessViolation),
            3 => Some(Self::DiskFull),
            4 => Some(Self::IllegalOperation),
            5 => Some(Self::UnknownTransferId),
            6 => Some(Self::FileAlreadyExists),
            7 => Some(Self::NoSuchUser),
            8 => Some(Self::OptionNegotiationFailed),
            _ => None,
        }
    }

    /// Convert the error code to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the default error message for this error code
    pub fn default_message(self) -> &'static str {
        match self {
            Self::NotDefined => "Undefined error",
            Self::FileNotFound => "File not found",
            Self::AccessViolation => "Access violation",
            Self::DiskFull => "Disk full or allocation exceeded",
            Self::IllegalOperation => "Illegal TFTP operation",
            Self::UnknownTransferId => "Unknown transfer ID",
            Self::FileAlreadyExists => "File already exists",
            Self::NoSuchUser => "No such user",
            Self::OptionNegotiationFailed => "Option negotiation failed",
        }
    }
}

impl From<TftpErrorCode> for u16 {
    fn from(error_code: TftpErrorCode) -> Self {
        error_code.as_u16()
    }
}

impl fmt::Display for TftpErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.as_u16())
    }
}

/// Encode a read or write request.
///
/// Writes opcode, null-terminated filename, the `octet` transfer mode and
/// the `blksize`/`256` option into `buf` and returns the encoded length.
/// Rejects filenames over [`MAX_FILENAME`] characters before touching the
/// buffer.
///
/// # Examples
/// ```
/// use tftp_client::{PACKET_CAPACITY, TftpOpcode, protocol::build_request};
///
/// let mut buf = [0u8; PACKET_CAPACITY];
/// let len = build_request(&mut buf, TftpOpcode::ReadRequest, "GAME.PRG").unwrap();
/// assert_eq!(&buf[..len], b"\x00\x01GAME.PRG\0octet\0blksize\0256\0");
/// ```
pub fn build_request(buf: &mut [u8], opcode: TftpOpcode, filename: &str) -> Result<usize> {
    if filename.len() > MAX_FILENAME {
        return Err(anyhow!(
            "filename '{}' exceeds {} characters",
            filename,
            MAX_FILENAME
        ));
    }

    let total = 2 + filename.len() + 1 + MODE_OCTET.len() + OPTION_BLKSIZE.len() + OPTION_BLKSIZE_VALUE.len();
    if buf.len() < total {
        return Err(anyhow!("request buffer too small: {} < {}", buf.len(), total));
    }

    buf[0..2].copy_from_slice(&opcode.as_u16().to_be_bytes());
    let mut i = 2;

    buf[i..i + filename.len()].copy_from_slice(filename.as_bytes());
    i += filename.len();
    buf[i] = 0;
    i += 1;

    buf[i..i + MODE_OCTET.len()].copy_from_slice(MODE_OCTET);
    i += MODE_OCTET.len();

    buf[i..i + OPTION_BLKSIZE.len()].copy_from_slice(OPTION_BLKSIZE);
    i += OPTION_BLKSIZE.len();

    buf[i..i + OPTION_BLKSIZE_VALUE.len()].copy_from_slice(OPTION_BLKSIZE_VALUE);
    i += OPTION_BLKSIZE_VALUE.len();

    Ok(i)
}

/// Encode an ACK for the given block number. Always 4 bytes.
///
/// `buf` must hold at least [`HEADER_SIZE`] bytes.
pub fn build_ack(buf: &mut [u8], block: u16) -> usize {
    buf[0..2].copy_from_slice(&TftpOpcode::Acknowledgment.as_u16().to_be_bytes());
    buf[2..4].copy_from_slice(&block.to_be_bytes());
    HEADER_SIZE
}

/// Encode a DATA packet: header plus a copy of `payload`.
///
/// Rejects payloads over [`BLOCK_SIZE`] bytes before touching the buffer.
pub fn build_data(buf: &mut [u8], block: u16, payload: &[u8]) -> Result<usize> {
    if payload.len() > BLOCK_SIZE {
        return Err(anyhow!(
            "payload of {} bytes exceeds the {}-byte block size",
            payload.len(),
            BLOCK_SIZE
        ));
    }

    let total = HEADER_SIZE + payload.len();
    if buf.len() < total {
        return Err(anyhow!("data buffer too small: {} < {}", buf.len(), total));
    }

    buf[0..2].copy_from_slice(&TftpOpcode::Data.as_u16().to_be_bytes());
    buf[2..4].copy_from_slice(&block.to_be_bytes());
    buf[HEADER_SIZE..total].copy_from_slice(payload);

    Ok(total)
}

/// Get the opcode field from a TFTP packet
pub fn get_opcode(buf: &[u8]) -> Option<u16> {
    if buf.len() >= 2 {
        Some(u16::from_be_bytes([buf[0], buf[1]]))
    } else {
        None
    }
}

/// Get the TFTP opcode enum from a packet buffer
pub fn get_tftp_opcode(buf: &[u8]) -> Option<TftpOpcode> {
    get_opcode(buf).and_then(TftpOpcode::from_u16)
}

/// Get the block number field (bytes 2-3) from a TFTP packet.
///
/// The dispatcher reads this field uniformly before classifying the packet,
/// so for an ERROR packet it yields the error code and for an OACK the first
/// option bytes.
pub fn get_block(buf: &[u8]) -> Option<u16> {
    if buf.len() >= HEADER_SIZE {
        Some(u16::from_be_bytes([buf[2], buf[3]]))
    } else {
        None
    }
}

/// Parse a TFTP Error packet into its code and message.
pub fn parse_error(buf: &[u8]) -> Result<(u16, String)> {
    if buf.len() < HEADER_SIZE {
        return Err(anyhow!("Error packet too short"));
    }

    let opcode = u16::from_be_bytes([buf[0], buf[1]]);
    if opcode != TftpOpcode::Error.as_u16() {
        return Err(anyhow!("Not an Error packet"));
    }

    let code = u16::from_be_bytes([buf[2], buf[3]]);
    let message = if buf.len() > HEADER_SIZE {
        let msg_bytes = &buf[HEADER_SIZE..];
        // Find null terminator or use entire remaining buffer
        let end = msg_bytes.iter().position(|&b| b == 0).unwrap_or(msg_bytes.len());
        std::str::from_utf8(&msg_bytes[..end])?.to_string()
    } else {
        String::new()
    };

    Ok((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tftp_opcode_conversion() {
        assert_eq!(TftpOpcode::ReadRequest.as_u16(), 1);
        assert_eq!(TftpOpcode::OptionAck.as_u16(), 6);
        assert_eq!(TftpOpcode::from_u16(3), Some(TftpOpcode::Data));
        assert_eq!(TftpOpcode::from_u16(99), None);
        assert_eq!(TftpOpcode::WriteRequest.name(), "WRQ");
    }

    #[test]
    fn test_tftp_error_code_conversion() {
        assert_eq!(TftpErrorCode::FileNotFound.as_u16(), 1);
        assert_eq!(TftpErrorCode::from_u16(1), Some(TftpErrorCode::FileNotFound));
        assert_eq!(TftpErrorCode::from_u16(42), None);
        assert_eq!(TftpErrorCode::FileNotFound.default_message(), "File not found");
    }

    #[test]
    fn test_build_read_request() {
        let mut buf = [0u8; PACKET_CAPACITY];
        let len = build_request(&mut buf, TftpOpcode::ReadRequest, "GAME.PRG").unwrap();

        assert_eq!(len, 2 + 9 + 6 + 8 + 4);
        assert_eq!(&buf[..len], b"\x00\x01GAME.PRG\0octet\0blksize\0256\0");
    }

    #[test]
    fn test_build_write_request() {
        let mut buf = [0u8; PACKET_CAPACITY];
        let len = build_request(&mut buf, TftpOpcode::WriteRequest, "OUT.PRG").unwrap();

        assert_eq!(&buf[..2], &[0, 2]);
        assert_eq!(&buf[2..len], b"OUT.PRG\0octet\0blksize\0256\0");
    }

    #[test]
    fn test_build_request_filename_budget() {
        let mut buf = [0u8; PACKET_CAPACITY];

        // 16 + '.' + 3 is the longest accepted name
        let longest = "ABCDEFGHIJKLMNOP.PRG";
        assert_eq!(longest.len(), MAX_FILENAME);
        assert!(build_request(&mut buf, TftpOpcode::ReadRequest, longest).is_ok());

        let too_long = "ABCDEFGHIJKLMNOPQ.PRG";
        let before = buf;
        assert!(build_request(&mut buf, TftpOpcode::ReadRequest, too_long).is_err());
        // Rejected requests leave the buffer untouched
        assert_eq!(buf, before);
    }

    #[test]
    fn test_build_ack() {
        let mut buf = [0u8; PACKET_CAPACITY];
        let len = build_ack(&mut buf, 42);

        assert_eq!(len, 4);
        assert_eq!(&buf[..4], &[0, 4, 0, 42]);

        let len = build_ack(&mut buf, 0x1234);
        assert_eq!(&buf[..len], &[0, 4, 0x12, 0x34]);
    }

    #[test]
    fn test_build_data() {
        let mut buf = [0u8; PACKET_CAPACITY];
        let len = build_data(&mut buf, 7, b"Hello, TFTP!").unwrap();

        assert_eq!(len, HEADER_SIZE + 12);
        assert_eq!(&buf[..4], &[0, 3, 0, 7]);
        assert_eq!(&buf[4..len], b"Hello, TFTP!");
    }

    #[test]
    fn test_build_data_empty_and_full() {
        let mut buf = [0u8; PACKET_CAPACITY];

        let len = build_data(&mut buf, 3, &[]).unwrap();
        assert_eq!(len, HEADER_SIZE);

        let payload = [0xAA; BLOCK_SIZE];
        let len = build_data(&mut buf, 4, &payload).unwrap();
        assert_eq!(len, PACKET_CAPACITY);

        let oversized = [0u8; BLOCK_SIZE + 1];
        assert!(build_data(&mut buf, 5, &oversized).is_err());
    }

    #[test]
    fn test_get_opcode_and_block() {
        let mut buf = [0u8; PACKET_CAPACITY];
        let len = build_data(&mut buf, 9, b"x").unwrap();

        assert_eq!(get_opcode(&buf[..len]), Some(3));
        assert_eq!(get_tftp_opcode(&buf[..len]), Some(TftpOpcode::Data));
        assert_eq!(get_block(&buf[..len]), Some(9));

        assert_eq!(get_opcode(&[]), None);
        assert_eq!(get_opcode(&[1]), None);
        assert_eq!(get_block(&[0, 4, 0]), None);
    }

    #[test]
    fn test_parse_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&TftpOpcode::Error.as_u16().to_be_bytes());
        buf.extend_from_slice(&TftpErrorCode::AccessViolation.as_u16().to_be_bytes());
        buf.extend_from_slice(b"Access denied\0");

        let (code, message) = parse_error(&buf).unwrap();
        assert_eq!(code, TftpErrorCode::AccessViolation.as_u16());
        assert_eq!(message, "Access denied");

        // Message without terminator
        let (_, message) = parse_error(&[0, 5, 0, 1, b'n', b'o']).unwrap();
        assert_eq!(message, "no");

        assert!(parse_error(&[0, 5, 0]).is_err());
        assert!(parse_error(&[0, 4, 0, 1]).is_err());
    }
}
