//! `batch-ftp` — a minimal reliable file transfer over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  HELLO, data units  ┌──────────┐
//!  │  client  │────────────────────▶│  server  │
//!  │ (Sender) │                     │(Reassem- │
//!  └────┬─────┘◀────────────────────│  bler)   │
//!       │        one ACK per batch  └─────┬────┘
//!       │                                 │
//!  ┌────▼─────────────────────────────────▼────┐
//!  │                 Socket                    │
//!  │  (tokio UdpSocket + optional Simulator)   │
//!  └───────────────────────────────────────────┘
//! ```
//!
//! The file is cut into fixed-size data units sent in batches whose size
//! cycles 1, 2, 3, 1, …; the receiver answers each batch with one
//! cumulative ACK and silently drops anything out of order, which makes the
//! sender time out and resend the whole batch.
//!
//! Each module has a single responsibility:
//! - [`packet`]     — wire format (serialise / deserialise)
//! - [`batch`]      — the batch-size cycle
//! - [`state`]      — session lifecycle states
//! - [`sender`]     — outbound segmentation and ACK validation
//! - [`receiver`]   — inbound ordering, reassembly and ACK emission
//! - [`timer`]      — ACK timeout and retry ceiling
//! - [`config`]     — tunables and their reference defaults
//! - [`socket`]     — async UDP socket abstraction
//! - [`simulator`]  — optional lossy/reorder network layer for testing
//! - [`client`]     — sending driver (handshake, batches, retransmission)
//! - [`server`]     — receiving driver (sessions, persistence)
//! - [`stats`]      — timing and throughput reports
//! - [`error`]      — session-level error type

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod server;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod stats;
pub mod timer;

pub use config::TransferConfig;
pub use error::TransferError;
