//! Transfer-session finite-state machine types.
//!
//! Both state machines ([`crate::sender::Sender`] and
//! [`crate::receiver::Reassembler`]) report their lifecycle through
//! [`SessionState`].  A session ends in exactly one terminal state, so the
//! drivers in [`crate::client`] and [`crate::server`] never need an external
//! "done" flag and can run any number of sessions back to back.
//!
//! ```text
//!                 last unit accepted / acked
//!   ACTIVE ─────────────────────────────────▶ COMPLETED
//!     │
//!     │ overflow, bad ack, retries exhausted
//!     ▼
//!   FAILED
//! ```

/// Lifecycle of one transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Units are still flowing.
    #[default]
    Active,
    /// Every byte, including the sentinel, has been delivered.
    Completed,
    /// A fatal condition ended the session; no further input is processed.
    Failed,
}

impl SessionState {
    /// `true` for [`Completed`](Self::Completed) and [`Failed`](Self::Failed).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
