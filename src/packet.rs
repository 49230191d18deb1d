//! Wire-format definitions for RCFTP datagrams.
//!
//! Every message exchanged with the server is a [`Datagram`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, flags, payload).
//! - Building fragments with a valid checksum.
//! - Serialising a [`Datagram`] into the fixed-size buffer that goes on the
//!   wire.
//! - Validating a received buffer and turning it back into a [`Datagram`].
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.  Every datagram has the same
//! size, [`DATAGRAM_LEN`], regardless of how many payload bytes are valid.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Version    |     Flags     |        Reserved (zero)        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Next Expected                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Payload Length        |            Checksum           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload (MAX_PAYLOAD bytes) ...              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Header size: [`HEADER_LEN`] = 16 bytes, payload region: [`MAX_PAYLOAD`] =
//! 512 bytes.

use bitflags::bitflags;
use thiserror::Error;

/// The only protocol version this client speaks.
pub const RCFTP_VERSION_1: u8 = 1;

/// Capacity of the payload region.
pub const MAX_PAYLOAD: usize = 512;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 16;

/// Byte length of every datagram on the wire.
pub const DATAGRAM_LEN: usize = HEADER_LEN + MAX_PAYLOAD;

// Byte offsets of each field within the serialised header.
const OFF_VERSION: usize = 0;
const OFF_FLAGS: usize = 1;
const OFF_SEQ: usize = 4;
const OFF_NEXT: usize = 8;
const OFF_LEN: usize = 12;
const OFF_CHECKSUM: usize = 14;

bitflags! {
    /// Bit set carried in the `flags` header byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// Receiver cannot take the datagram right now.
        const BUSY = 1 << 0;
        /// Receiver aborted the transfer.
        const ABORT = 1 << 1;
        /// Final fragment of the transfer (or its acknowledgment).
        const FIN = 1 << 2;
    }
}

impl Flags {
    /// No flag set.
    pub const NONE: Flags = Flags::empty();

    /// `true` when the receiver refused the datagram (BUSY or ABORT).
    pub fn is_rejection(self) -> bool {
        self.intersects(Flags::BUSY | Flags::ABORT)
    }
}

/// Errors that can arise when validating a raw datagram.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidMessage {
    #[error("datagram is {got} bytes, expected {}", DATAGRAM_LEN)]
    WrongLength { got: usize },

    #[error("unsupported protocol version {got}")]
    WrongVersion { got: u8 },

    #[error("checksum mismatch: carried {carried:#06x}, computed {computed:#06x}")]
    BadChecksum { carried: u16, computed: u16 },

    #[error("payload length {len} exceeds {}", MAX_PAYLOAD)]
    PayloadTooLong { len: usize },
}

/// One RCFTP message.
///
/// Fields are in host byte order; [`Datagram::encode`] converts to big-endian
/// on the wire and [`Datagram::decode`] converts back.  `payload` holds
/// exactly the valid bytes, so its length is the `payload_length` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub version: u8,
    pub flags: Flags,
    /// Byte offset of the first payload byte within the transferred stream.
    pub seq: u32,
    /// On data: `seq + payload length`.  On an ACK: the offset the receiver
    /// has fully received.
    pub next: u32,
    /// Checksum as stored by [`Datagram::new`] or read off the wire.
    pub checksum: u16,
    pub payload: Vec<u8>,
}

impl Datagram {
    /// Build a datagram with every header field set and a valid checksum.
    pub fn new(payload: &[u8], seq: u32, next: u32, flags: Flags) -> Result<Self, InvalidMessage> {
        if payload.len() > MAX_PAYLOAD {
            return Err(InvalidMessage::PayloadTooLong { len: payload.len() });
        }
        let mut datagram = Datagram {
            version: RCFTP_VERSION_1,
            flags,
            seq,
            next,
            checksum: 0,
            payload: payload.to_vec(),
        };
        datagram.seal();
        Ok(datagram)
    }

    /// Build a data fragment starting at `seq`; `next` is derived from the
    /// payload length.
    pub fn fragment(payload: &[u8], seq: u32, flags: Flags) -> Result<Self, InvalidMessage> {
        let next = seq.wrapping_add(payload.len() as u32);
        Self::new(payload, seq, next, flags)
    }

    /// Recompute and store the checksum after fields were changed by hand.
    pub fn seal(&mut self) {
        let mut buf = self.encode();
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].fill(0);
        self.checksum = internet_checksum(&buf);
    }

    /// Number of valid payload bytes.
    pub fn payload_len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// First offset after this fragment's payload (wraps modulo 2^32).
    pub fn end(&self) -> u32 {
        self.seq.wrapping_add(u32::from(self.payload_len()))
    }

    pub fn is_fin(&self) -> bool {
        self.flags.contains(Flags::FIN)
    }

    /// Serialise into the fixed-size wire buffer.
    ///
    /// The stored `checksum` is written as-is; payload bytes past
    /// `payload_len` are zero.
    pub fn encode(&self) -> [u8; DATAGRAM_LEN] {
        let mut buf = [0u8; DATAGRAM_LEN];
        let len = self.payload.len().min(MAX_PAYLOAD);

        buf[OFF_VERSION] = self.version;
        buf[OFF_FLAGS] = self.flags.bits();
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_NEXT..OFF_NEXT + 4].copy_from_slice(&self.next.to_be_bytes());
        buf[OFF_LEN..OFF_LEN + 2].copy_from_slice(&(len as u16).to_be_bytes());
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&self.checksum.to_be_bytes());
        buf[HEADER_LEN..HEADER_LEN + len].copy_from_slice(&self.payload[..len]);

        buf
    }

    /// Validate a received buffer (`buf` is exactly the bytes received).
    ///
    /// The checksum is verified before anything else is interpreted, so a
    /// corrupted version byte reports [`InvalidMessage::BadChecksum`].
    pub fn decode(buf: &[u8]) -> Result<Self, InvalidMessage> {
        if buf.len() != DATAGRAM_LEN {
            return Err(InvalidMessage::WrongLength { got: buf.len() });
        }

        let carried = read_u16(buf, OFF_CHECKSUM);
        let mut scratch = [0u8; DATAGRAM_LEN];
        scratch.copy_from_slice(buf);
        scratch[OFF_CHECKSUM..OFF_CHECKSUM + 2].fill(0);
        let computed = internet_checksum(&scratch);
        if computed != carried {
            return Err(InvalidMessage::BadChecksum { carried, computed });
        }

        let version = buf[OFF_VERSION];
        if version != RCFTP_VERSION_1 {
            return Err(InvalidMessage::WrongVersion { got: version });
        }

        let len = usize::from(read_u16(buf, OFF_LEN));
        if len > MAX_PAYLOAD {
            return Err(InvalidMessage::PayloadTooLong { len });
        }

        Ok(Datagram {
            version,
            // Unknown bits are dropped; they carry no meaning for the client.
            flags: Flags::from_bits_truncate(buf[OFF_FLAGS]),
            seq: read_u32(buf, OFF_SEQ),
            next: read_u32(buf, OFF_NEXT),
            checksum: carried,
            payload: buf[HEADER_LEN..HEADER_LEN + len].to_vec(),
        })
    }
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// The caller must zero the checksum field within `data` first.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    // Odd trailing byte, padded with a zero byte on the right.
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
