//! Inbound state machine: ordering, reassembly and per-batch ACKs.
//!
//! [`Reassembler`] is a pure transition function over
//! `(expected_sequence, write_offset, batch counter)`.  Feed it every
//! decoded [`Datagram`] and it answers with a [`Step`]:
//!
//! - [`Step::Dropped`] — out-of-order, duplicate or unusable input.  Nothing
//!   changed and nothing must be sent.  Withholding the ACK is what makes
//!   the sender time out and resend its batch; there is no NACK.
//! - [`Step::Accepted`] — the unit was stored, the batch is still open.
//! - [`Step::Reply`] — send this ACK to the peer (batch boundary, end of
//!   transfer, or hello).
//!
//! The reassembler never touches a socket; [`crate::server`] owns the loop.

use thiserror::Error;

use crate::batch::BatchCycle;
use crate::config::{TransferConfig, MAX_BATCH_LIMIT, MAX_CHUNK_SIZE};
use crate::packet::{status, Ack, DataUnit, Datagram, Hello};
use crate::state::SessionState;

/// Outcome of feeding one datagram to the [`Reassembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Dropped,
    Accepted,
    Reply(Ack),
}

/// Receive-side state for one transfer.
#[derive(Debug)]
pub struct Reassembler {
    /// Largest payload accepted per unit.
    chunk_size: u16,
    cycle: BatchCycle,
    /// Upper bound for the declared file size.
    max_capacity: usize,

    /// Sequence number of the next unit to accept.
    expected_sequence: u32,
    /// Bytes stored so far; always `buffer.len()`.
    write_offset: usize,
    /// Units accepted in the current batch.
    in_batch: usize,
    /// Captured from the first accepted unit.
    total_length: Option<u32>,
    buffer: Vec<u8>,
    state: SessionState,
}

impl Reassembler {
    /// A fresh session.  `chunk_size` and `cycle` are the defaults used when
    /// the peer starts sending data without a hello.
    pub fn new(chunk_size: u16, cycle: BatchCycle, max_capacity: usize) -> Self {
        Self {
            chunk_size,
            cycle,
            max_capacity,
            expected_sequence: 0,
            write_offset: 0,
            in_batch: 0,
            total_length: None,
            buffer: Vec::new(),
            state: SessionState::Active,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(
            config.chunk_size,
            BatchCycle::new(config.max_batch),
            config.max_capacity,
        )
    }

    pub fn expected_sequence(&self) -> u32 {
        self.expected_sequence
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// File size announced by the first accepted unit, if any.
    pub fn total_length(&self) -> Option<u32> {
        self.total_length
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Units required in the current batch.
    pub fn batch_size(&self) -> usize {
        self.cycle.current()
    }

    pub fn chunk_size(&self) -> u16 {
        self.chunk_size
    }

    /// Process one inbound datagram.
    ///
    /// Fatal conditions move the session to [`SessionState::Failed`] and are
    /// returned as [`Err`]; once terminal, every further datagram is dropped.
    pub fn on_datagram(&mut self, datagram: &Datagram) -> Result<Step, ReceiveError> {
        if self.state.is_terminal() {
            return Ok(Step::Dropped);
        }
        let step = match datagram {
            Datagram::Hello(hello) => self.on_hello(hello),
            Datagram::Data(unit) => self.on_unit(unit),
        };
        if step.is_err() {
            self.state = SessionState::Failed;
        }
        step
    }

    /// The ACK that tells the peer why the session failed.
    pub fn rejection(&self, err: &ReceiveError) -> Ack {
        Ack::error(self.expected_sequence.wrapping_sub(1), err.status())
    }

    /// Consume a completed session and return exactly the reconstructed file.
    pub fn finish(self) -> Result<Vec<u8>, ReceiveError> {
        match self.state {
            SessionState::Completed => Ok(self.buffer),
            state => Err(ReceiveError::NotComplete { state }),
        }
    }

    fn on_hello(&mut self, hello: &Hello) -> Result<Step, ReceiveError> {
        if self.expected_sequence != 0 {
            log::debug!("[recv] hello after data started; dropping");
            return Ok(Step::Dropped);
        }
        if hello.chunk_size == 0
            || hello.chunk_size > MAX_CHUNK_SIZE
            || hello.max_batch == 0
            || hello.max_batch > MAX_BATCH_LIMIT
        {
            return Err(ReceiveError::BadHello {
                chunk_size: hello.chunk_size,
                max_batch: hello.max_batch,
            });
        }
        self.check_capacity(hello.total_length)?;

        self.chunk_size = hello.chunk_size;
        self.cycle = BatchCycle::new(hello.max_batch);
        log::debug!(
            "[recv] hello: total_length={} chunk_size={} max_batch={}",
            hello.total_length,
            hello.chunk_size,
            hello.max_batch
        );
        Ok(Step::Reply(Ack::hello(status::OK)))
    }

    fn on_unit(&mut self, unit: &DataUnit) -> Result<Step, ReceiveError> {
        if unit.sequence != self.expected_sequence {
            log::debug!(
                "[recv] out of order: expected seq={}, got seq={}; discarding",
                self.expected_sequence,
                unit.sequence
            );
            return Ok(Step::Dropped);
        }
        if unit.payload.len() > usize::from(self.chunk_size) {
            log::warn!(
                "[recv] seq={} carries {} bytes, chunk size is {}; discarding",
                unit.sequence,
                unit.payload.len(),
                self.chunk_size
            );
            return Ok(Step::Dropped);
        }

        let total = match self.total_length {
            None => {
                self.check_capacity(unit.total_length)?;
                self.total_length = Some(unit.total_length);
                self.buffer.reserve_exact(unit.total_length as usize);
                log::debug!("[recv] expecting {} bytes", unit.total_length);
                unit.total_length as usize
            }
            Some(expected) if expected != unit.total_length => {
                return Err(ReceiveError::LengthChanged {
                    expected,
                    got: unit.total_length,
                });
            }
            Some(expected) => expected as usize,
        };

        // Reaching total + 1 means the sentinel is in this unit.
        let mut len = unit.payload.len();
        let terminating = self.write_offset + len > total;
        if terminating {
            len = total.saturating_sub(self.write_offset);
        }

        self.buffer.extend_from_slice(&unit.payload[..len]);
        self.write_offset += len;
        self.expected_sequence += 1;
        self.in_batch += 1;
        log::debug!(
            "[recv] ← seq={} len={} offset={}",
            unit.sequence,
            len,
            self.write_offset
        );

        if terminating {
            self.state = SessionState::Completed;
        }
        if terminating || self.in_batch >= self.cycle.current() {
            self.in_batch = 0;
            self.cycle.advance();
            return Ok(Step::Reply(Ack::cumulative(self.expected_sequence - 1)));
        }
        Ok(Step::Accepted)
    }

    fn check_capacity(&self, declared: u32) -> Result<(), ReceiveError> {
        let declared = declared as usize;
        if declared > self.max_capacity {
            return Err(ReceiveError::CapacityExceeded {
                declared,
                capacity: self.max_capacity,
            });
        }
        Ok(())
    }
}

/// Fatal receiver-side conditions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReceiveError {
    #[error("declared length {declared} exceeds buffer capacity {capacity}")]
    CapacityExceeded { declared: usize, capacity: usize },
    #[error("total length changed mid-transfer from {expected} to {got}")]
    LengthChanged { expected: u32, got: u32 },
    #[error("unusable hello: chunk_size={chunk_size} max_batch={max_batch}")]
    BadHello { chunk_size: u16, max_batch: u8 },
    #[error("session is {state}, not completed")]
    NotComplete { state: SessionState },
}

impl ReceiveError {
    /// Ack status reported to the peer for this error.
    pub fn status(&self) -> u8 {
        match self {
            ReceiveError::CapacityExceeded { .. } => status::TOO_LARGE,
            ReceiveError::LengthChanged { .. } => status::LENGTH_CHANGED,
            ReceiveError::BadHello { .. } | ReceiveError::NotComplete { .. } => status::BAD_HELLO,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
