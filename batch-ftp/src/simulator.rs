//! Optional network simulator for deterministic testing.
//!
//! Loopback UDP practically never loses anything, so the retransmission
//! paths would go untested without help.  A [`Simulator`] attached to a
//! [`crate::socket::Socket`] intercepts every outbound datagram and applies
//! a configurable fault model:
//!
//! | Fault            | Description                                        |
//! |------------------|----------------------------------------------------|
//! | Scripted loss    | Drop the datagrams whose send ordinal is listed.   |
//! | Random loss      | Drop a datagram with probability `loss_rate`.      |
//! | Reordering       | Hold a datagram back until the next one is sent.   |
//! | Duplication      | Put a datagram on the wire twice.                  |
//!
//! Randomness comes from a seeded [`StdRng`], so a failing run can be
//! replayed exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`; values outside are
/// clamped.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a datagram is held back behind the next one.
    pub reorder_rate: f64,
    /// Probability that a datagram is sent twice.
    pub duplicate_rate: f64,
    /// 0-based send ordinals that are always dropped.
    pub drop_sends: Vec<usize>,
    /// RNG seed.
    pub seed: u64,
}

impl SimulatorConfig {
    /// Pass-through model that only drops the listed sends.
    pub fn dropping(ordinals: impl IntoIterator<Item = usize>) -> Self {
        Self {
            drop_sends: ordinals.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// A fault-injecting filter for outbound datagrams.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    /// Datagrams offered so far.
    sent: usize,
    dropped: usize,
    /// A reordered datagram waiting for the next send.
    held: Option<Vec<u8>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            sent: 0,
            dropped: 0,
            held: None,
        }
    }

    /// Datagrams offered to [`outbound`](Self::outbound) so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Datagrams discarded so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Apply the fault model to one outbound datagram.
    ///
    /// Returns the datagrams that actually go on the wire, in order: none
    /// (lost or held back), one, or several (duplicate, released hold).
    pub fn outbound(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let ordinal = self.sent;
        self.sent += 1;

        let mut wire = Vec::with_capacity(2);

        if self.config.drop_sends.contains(&ordinal) || self.chance(self.config.loss_rate) {
            self.dropped += 1;
            log::debug!("[sim] dropping datagram #{ordinal} ({} bytes)", bytes.len());
        } else if self.held.is_none() && self.chance(self.config.reorder_rate) {
            log::debug!("[sim] holding datagram #{ordinal} back");
            self.held = Some(bytes.to_vec());
            return wire;
        } else {
            wire.push(bytes.to_vec());
            if self.chance(self.config.duplicate_rate) {
                log::debug!("[sim] duplicating datagram #{ordinal}");
                wire.push(bytes.to_vec());
            }
        }

        if let Some(held) = self.held.take() {
            wire.push(held);
        }
        wire
    }

    fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.random_bool(p.min(1.0))
    }
}
