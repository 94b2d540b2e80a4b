//! Wire-format definitions for the transfer protocol.
//!
//! Two directions, two message families:
//! - sender → receiver: a [`Datagram`], either a [`Hello`] opening the
//!   session or a [`DataUnit`] carrying one chunk of the file;
//! - receiver → sender: an [`Ack`].
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! Data unit (8-byte header + 1..=chunk_size payload bytes):
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Total Length                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Hello (sequence field fixed to [`HELLO_SEQUENCE`], 11 bytes total):
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          0xFFFF_FFFF                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Total Length                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Chunk Size           |   Max Batch   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Ack (2 bytes):
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Sequence    |    Status     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use thiserror::Error;

/// Byte length of the fixed data-unit header.
pub const HEADER_LEN: usize = 8;

/// Byte length of an encoded [`Ack`].
pub const ACK_LEN: usize = 2;

/// Byte length of an encoded [`Hello`].
pub const HELLO_LEN: usize = HEADER_LEN + 3;

/// Sequence value reserved for [`Hello`] datagrams; never used by data.
pub const HELLO_SEQUENCE: u32 = u32::MAX;

/// Ack sequence used when answering a [`Hello`].
pub const HELLO_ACK_SEQUENCE: u8 = u8::MAX;

/// Terminator byte appended after the real file content.
pub const SENTINEL: u8 = 0;

// Byte offsets within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_TOTAL: usize = 4;
const OFF_CHUNK: usize = 8;
const OFF_MAX_BATCH: usize = 10;

/// Values of the ack `status` byte.
pub mod status {
    /// Everything in order.
    pub const OK: u8 = 0;
    /// The declared transfer does not fit the receiver's buffer.
    pub const TOO_LARGE: u8 = 1;
    /// The hello carried parameters the receiver will not use.
    pub const BAD_HELLO: u8 = 2;
    /// The peer changed `total_length` mid-transfer.
    pub const LENGTH_CHANGED: u8 = 3;
}

/// One sequenced chunk of the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUnit {
    /// 0-based index of this unit in transmission order.
    pub sequence: u32,
    /// Size of the whole source file, repeated on every unit.
    pub total_length: u32,
    /// Chunk bytes; the last unit also carries the [`SENTINEL`].
    pub payload: Vec<u8>,
}

impl DataUnit {
    /// Serialise into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[OFF_TOTAL..OFF_TOTAL + 4].copy_from_slice(&self.total_length.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }
}

/// Session-initiation message announcing the batch cycle and chunk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    pub total_length: u32,
    pub chunk_size: u16,
    /// Largest batch of the cycle; batches run `1..=max_batch`.
    pub max_batch: u8,
}

impl Hello {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HELLO_LEN];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&HELLO_SEQUENCE.to_be_bytes());
        buf[OFF_TOTAL..OFF_TOTAL + 4].copy_from_slice(&self.total_length.to_be_bytes());
        buf[OFF_CHUNK..OFF_CHUNK + 2].copy_from_slice(&self.chunk_size.to_be_bytes());
        buf[OFF_MAX_BATCH] = self.max_batch;
        buf
    }
}

/// Anything a sender puts on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Hello(Hello),
    Data(DataUnit),
}

impl Datagram {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Datagram::Hello(hello) => hello.encode(),
            Datagram::Data(unit) => unit.encode(),
        }
    }

    /// Parse a [`Datagram`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - a hello is not exactly [`HELLO_LEN`] bytes, or
    /// - a data unit carries no payload.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::TooShort { len: buf.len() });
        }

        let sequence = read_u32(buf, OFF_SEQ);
        let total_length = read_u32(buf, OFF_TOTAL);

        if sequence == HELLO_SEQUENCE {
            if buf.len() != HELLO_LEN {
                return Err(PacketError::BadHello { len: buf.len() });
            }
            return Ok(Datagram::Hello(Hello {
                total_length,
                chunk_size: u16::from_be_bytes([buf[OFF_CHUNK], buf[OFF_CHUNK + 1]]),
                max_batch: buf[OFF_MAX_BATCH],
            }));
        }

        if buf.len() == HEADER_LEN {
            return Err(PacketError::EmptyPayload { sequence });
        }

        Ok(Datagram::Data(DataUnit {
            sequence,
            total_length,
            payload: buf[HEADER_LEN..].to_vec(),
        }))
    }
}

/// Cumulative acknowledgment sent once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Low 8 bits of the last contiguously received sequence number.
    pub sequence: u8,
    /// [`status::OK`] or an error code.
    pub status: u8,
}

impl Ack {
    /// Successful ack covering everything up to and including `last_sequence`.
    pub fn cumulative(last_sequence: u32) -> Self {
        Self::error(last_sequence, status::OK)
    }

    /// Ack reporting `status` to the peer.
    pub fn error(last_sequence: u32, status: u8) -> Self {
        Self {
            // Only the low byte travels; the sender compares modulo 256.
            sequence: (last_sequence & 0xff) as u8,
            status,
        }
    }

    /// Reply to a [`Hello`].
    pub fn hello(status: u8) -> Self {
        Self {
            sequence: HELLO_ACK_SEQUENCE,
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }

    pub fn encode(&self) -> [u8; ACK_LEN] {
        [self.sequence, self.status]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        match buf {
            [sequence, status] => Ok(Self {
                sequence: *sequence,
                status: *status,
            }),
            _ => Err(PacketError::BadAckLength { len: buf.len() }),
        }
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {len} bytes is shorter than the {}-byte header", HEADER_LEN)]
    TooShort { len: usize },
    #[error("data unit {sequence} carries no payload")]
    EmptyPayload { sequence: u32 },
    #[error("hello must be {} bytes, got {len}", HELLO_LEN)]
    BadHello { len: usize },
    #[error("ack must be {} bytes, got {len}", ACK_LEN)]
    BadAckLength { len: usize },
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}
