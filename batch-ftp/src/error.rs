//! Session-level error taxonomy.
//!
//! Every variant is fatal to the session that produced it.  Transient ACK
//! timeouts never show up here: the client driver absorbs them until the
//! retry budget runs out, which surfaces as [`TransferError::RetriesExhausted`].

use std::path::PathBuf;

use thiserror::Error;

use crate::packet::PacketError;
use crate::receiver::ReceiveError;
use crate::sender::SendError;
use crate::socket::SocketError;
use crate::timer::RetriesExhausted;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Transport failure reported by the OS.
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// Bad ACK or unusable input on the sending side.
    #[error(transparent)]
    Send(#[from] SendError),
    /// Overflow or protocol violation on the receiving side.
    #[error(transparent)]
    Receive(#[from] ReceiveError),
    #[error(transparent)]
    RetriesExhausted(#[from] RetriesExhausted),
    /// The peer answered with something that is not an ACK.
    #[error("malformed ack from peer: {0}")]
    MalformedAck(#[source] PacketError),
    #[error("cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{host} resolved to no address")]
    NoAddress { host: String },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
