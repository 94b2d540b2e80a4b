//! ACK-wait timeout and per-batch retry ceiling.
//!
//! The protocol uses a single fixed timeout: no RTT estimation and no
//! back-off.  [`RetryBudget`] counts transmissions of the current batch
//! (the first send is attempt 1) and refuses a retransmission once
//! `max_attempts` sends have gone unanswered.  The budget is restored after
//! every accepted ACK.

use std::time::Duration;

use thiserror::Error;

use crate::config::TransferConfig;

/// The retry ceiling was reached without a valid ACK.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no ack after {attempts} attempt(s)")]
pub struct RetriesExhausted {
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RetryBudget {
    /// Wait for one ACK before declaring the batch lost.
    pub timeout: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl RetryBudget {
    /// Budget for a fresh batch that has just been sent once.
    pub fn new(timeout: Duration, max_attempts: u32) -> Self {
        Self {
            timeout,
            max_attempts: max_attempts.max(1),
            attempts: 1,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.ack_timeout, config.max_retries)
    }

    /// Transmissions of the current batch so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a timeout.
    ///
    /// Returns `Ok(())` when another transmission is allowed (and counts it),
    /// or [`RetriesExhausted`] once every attempt has been used.
    pub fn on_timeout(&mut self) -> Result<(), RetriesExhausted> {
        if self.attempts >= self.max_attempts {
            return Err(RetriesExhausted {
                attempts: self.attempts,
            });
        }
        self.attempts += 1;
        Ok(())
    }

    /// Restore the full budget for the next batch.
    pub fn reset(&mut self) {
        self.attempts = 1;
    }
}
