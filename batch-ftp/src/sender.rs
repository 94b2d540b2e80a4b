//! Outbound state machine: segmentation, batching and ACK validation.
//!
//! [`Sender`] walks an in-memory copy of the source file in `chunk_size`
//! steps and hands out [`DataUnit`]s until the current batch is full.  It
//! does **not** touch the socket; [`crate::client`] owns the actual
//! send / wait / retransmit loop.
//!
//! # Batch contract
//! - A batch holds [`BatchCycle::current`] units, except the final batch of
//!   the transfer which may be shorter.
//! - Every unit handed out is recorded in the batch until the batch's ACK
//!   arrives; on timeout the caller resends exactly those records.
//! - The ACK for a batch must name the last unit of the batch and carry
//!   status OK.  Anything else fails the session: there is no retry for a
//!   corrupt or hostile peer.

use thiserror::Error;

use crate::batch::BatchCycle;
use crate::packet::{Ack, DataUnit, Hello, HELLO_SEQUENCE, SENTINEL};
use crate::state::SessionState;

// ---------------------------------------------------------------------------
// BatchEntry
// ---------------------------------------------------------------------------

/// A unit that has been sent but whose batch is not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// The unit on the wire.
    pub unit: DataUnit,
    /// How many times this unit has been transmitted (1 = first send).
    pub tx_count: u32,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Send-side state for one transfer.
#[derive(Debug)]
pub struct Sender {
    /// File content followed by the sentinel byte.
    source: Vec<u8>,
    total_length: u32,
    chunk_size: u16,
    /// Offset of the first byte not yet handed out.
    cursor: usize,
    /// Sequence number of the **next** unit to hand out.
    next_sequence: u32,
    cycle: BatchCycle,
    /// Units of the current, unacknowledged batch in sequence order.
    batch: Vec<BatchEntry>,
    state: SessionState,
}

impl Sender {
    /// Prepare to send `contents` in `chunk_size` pieces.
    ///
    /// Fails when `chunk_size` is zero or the file cannot be described by the
    /// 32-bit length and sequence fields.
    pub fn new(mut contents: Vec<u8>, chunk_size: u16, cycle: BatchCycle) -> Result<Self, SendError> {
        if chunk_size == 0 {
            return Err(SendError::ZeroChunkSize);
        }
        let len = contents.len();
        let total_length = u32::try_from(len).map_err(|_| SendError::FileTooLarge { len })?;

        contents.push(SENTINEL);
        let units = contents.len().div_ceil(usize::from(chunk_size));
        // The last sequence (units - 1) must stay below the hello tag.
        if units as u64 > u64::from(HELLO_SEQUENCE) {
            return Err(SendError::FileTooLarge { len });
        }

        Ok(Self {
            source: contents,
            total_length,
            chunk_size,
            cursor: 0,
            next_sequence: 0,
            batch: Vec::with_capacity(usize::from(cycle.max_batch())),
            cycle,
            state: SessionState::Active,
        })
    }

    /// The hello announcing this transfer's parameters.
    pub fn hello(&self) -> Hello {
        Hello {
            total_length: self.total_length,
            chunk_size: self.chunk_size,
            max_batch: self.cycle.max_batch(),
        }
    }

    /// Size of the source file (without the sentinel).
    pub fn total_length(&self) -> u32 {
        self.total_length
    }

    /// Bytes that go on the wire as payload, sentinel included.
    pub fn bytes_to_send(&self) -> usize {
        self.source.len()
    }

    /// Number of units the whole transfer is split into.
    pub fn unit_count(&self) -> usize {
        self.source.len().div_ceil(usize::from(self.chunk_size))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `true` once the final batch has been acknowledged.
    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// Units required in the current batch.
    pub fn batch_size(&self) -> usize {
        self.cycle.current()
    }

    /// Hand out the next unit of the current batch.
    ///
    /// Returns `None` when the batch is full, the file is exhausted, or the
    /// session is no longer active.  The returned unit is recorded for
    /// retransmission.
    pub fn next_unit(&mut self) -> Option<DataUnit> {
        if self.state != SessionState::Active
            || self.batch.len() >= self.cycle.current()
            || self.cursor >= self.source.len()
        {
            return None;
        }

        let end = (self.cursor + usize::from(self.chunk_size)).min(self.source.len());
        let unit = DataUnit {
            sequence: self.next_sequence,
            total_length: self.total_length,
            payload: self.source[self.cursor..end].to_vec(),
        };
        self.cursor = end;
        self.next_sequence += 1;
        self.batch.push(BatchEntry {
            unit: unit.clone(),
            tx_count: 1,
        });
        Some(unit)
    }

    /// `true` when the current batch is complete on the wire and the caller
    /// must wait for its ACK.  A short final batch counts as complete.
    pub fn awaiting_ack(&self) -> bool {
        !self.batch.is_empty()
            && (self.batch.len() >= self.cycle.current() || self.cursor >= self.source.len())
    }

    /// Units of the current batch, oldest first, exactly as first sent.
    pub fn in_flight(&self) -> impl Iterator<Item = &DataUnit> {
        self.batch.iter().map(|e| &e.unit)
    }

    /// Number of units in the current batch.
    pub fn in_flight_len(&self) -> usize {
        self.batch.len()
    }

    /// Bump the transmission count of every unit in the batch.
    ///
    /// Call immediately after resending the batch.
    pub fn on_retransmit(&mut self) {
        for entry in self.batch.iter_mut() {
            entry.tx_count += 1;
        }
    }

    /// Times the current batch has been transmitted, `0` when idle.
    pub fn transmissions(&self) -> u32 {
        self.batch.first().map_or(0, |e| e.tx_count)
    }

    /// The ack sequence that acknowledges the current batch.
    pub fn expected_ack(&self) -> Option<u8> {
        self.batch
            .last()
            .map(|e| (e.unit.sequence & 0xff) as u8)
    }

    /// Validate the ACK for the current batch.
    ///
    /// On success the batch is released, the cycle advances, and the number
    /// of units acknowledged is returned.  Any mismatch fails the session.
    pub fn on_ack(&mut self, ack: Ack) -> Result<usize, SendError> {
        if let Err(e) = self.check_ack(ack) {
            self.state = SessionState::Failed;
            return Err(e);
        }

        let acked = self.batch.len();
        self.batch.clear();
        self.cycle.advance();
        if self.cursor >= self.source.len() {
            self.state = SessionState::Completed;
        }
        Ok(acked)
    }

    /// Mark the session failed (e.g. the retry budget ran out).
    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
    }

    fn check_ack(&self, ack: Ack) -> Result<(), SendError> {
        if !ack.is_ok() {
            return Err(SendError::PeerRejected { status: ack.status });
        }
        match self.expected_ack() {
            None => Err(SendError::AckWhileIdle { got: ack.sequence }),
            Some(expected) if expected != ack.sequence => Err(SendError::UnexpectedAck {
                expected,
                got: ack.sequence,
            }),
            Some(_) => Ok(()),
        }
    }
}

/// Fatal sender-side conditions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("chunk size must be at least one byte")]
    ZeroChunkSize,
    #[error("file of {len} bytes does not fit the 32-bit length field")]
    FileTooLarge { len: usize },
    #[error("expected ack for sequence {expected}, got {got}")]
    UnexpectedAck { expected: u8, got: u8 },
    #[error("peer rejected the transfer with status {status}")]
    PeerRejected { status: u8 },
    #[error("ack {got} arrived with no batch in flight")]
    AckWhileIdle { got: u8 },
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
