//! Tunable transfer parameters.
//!
//! [`TransferConfig::default`] reproduces the reference sizing: 100-byte
//! chunks, a 1–2–3 batch cycle, a 500 ms ACK wait with 5 attempts per batch
//! and a receive buffer of roughly one megabyte.  `main.rs` overrides the
//! fields from command-line flags; tests inject their own values.

use std::time::Duration;

use crate::batch::DEFAULT_MAX_BATCH;
use crate::packet::HEADER_LEN;

/// Well-known UDP port the receiver binds and the sender targets.
pub const DEFAULT_PORT: u16 = 5350;

/// Largest chunk that still fits one IPv4 UDP datagram.
pub const MAX_CHUNK_SIZE: u16 = (65_507 - HEADER_LEN) as u16;

/// Largest batch a receiver agrees to in a hello.
pub const MAX_BATCH_LIMIT: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Payload bytes per data unit.
    pub chunk_size: u16,
    /// Largest batch of the 1..=max_batch cycle.
    pub max_batch: u8,
    /// How long the sender waits for one ACK.
    pub ack_timeout: Duration,
    /// Transmissions allowed per batch (the first send counts).
    pub max_retries: u32,
    /// Largest file the receiver agrees to reassemble.
    pub max_capacity: usize,
    /// Open each transfer with a hello announcing chunk size and cycle.
    pub handshake: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_batch: DEFAULT_MAX_BATCH,
            ack_timeout: Duration::from_millis(500),
            max_retries: 5,
            max_capacity: 1_024_000,
            handshake: true,
        }
    }
}
