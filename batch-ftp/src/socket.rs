//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet`] types instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O (and, in tests, the optional
//! [`Simulator`] fault layer on the send path).

use std::net::SocketAddr;
use std::sync::Mutex;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{Ack, DataUnit, Datagram, Hello, PacketError};
use crate::simulator::Simulator;

/// Maximum UDP payload size (theoretical limit; in practice kept much smaller).
const MAX_DATAGRAM: usize = 65_535;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A datagram arrived but could not be decoded.
    #[error("malformed datagram from {from}: {source}")]
    Malformed {
        from: SocketAddr,
        #[source]
        source: PacketError,
    },
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, message-oriented UDP socket.
///
/// All methods are `&self`; the simulator sits behind a mutex that is never
/// held across an await.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    simulator: Option<Mutex<Simulator>>,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            simulator: None,
        })
    }

    /// Route every outbound datagram through `simulator`.
    pub fn with_simulator(mut self, simulator: Simulator) -> Self {
        self.simulator = Some(Mutex::new(simulator));
        self
    }

    pub async fn send_unit(&self, unit: &DataUnit, dest: SocketAddr) -> Result<(), SocketError> {
        self.send_raw(&unit.encode(), dest).await
    }

    pub async fn send_hello(&self, hello: &Hello, dest: SocketAddr) -> Result<(), SocketError> {
        self.send_raw(&hello.encode(), dest).await
    }

    pub async fn send_ack(&self, ack: Ack, dest: SocketAddr) -> Result<(), SocketError> {
        self.send_raw(&ack.encode(), dest).await
    }

    /// Receive the next sender-side datagram.
    ///
    /// Datagrams that fail to decode are returned as
    /// [`SocketError::Malformed`] — the caller decides whether to continue.
    pub async fn recv_datagram(&self) -> Result<(Datagram, SocketAddr), SocketError> {
        let (bytes, from) = self.recv_raw().await?;
        let datagram =
            Datagram::decode(&bytes).map_err(|source| SocketError::Malformed { from, source })?;
        Ok((datagram, from))
    }

    /// Receive the next acknowledgment.
    pub async fn recv_ack(&self) -> Result<(Ack, SocketAddr), SocketError> {
        let (bytes, from) = self.recv_raw().await?;
        let ack = Ack::decode(&bytes).map_err(|source| SocketError::Malformed { from, source })?;
        Ok((ack, from))
    }

    async fn send_raw(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        let wire = match &self.simulator {
            Some(sim) => sim
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .outbound(bytes),
            None => vec![bytes.to_vec()],
        };
        for datagram in wire {
            self.inner.send_to(&datagram, dest).await?;
        }
        Ok(())
    }

    async fn recv_raw(&self) -> Result<(Vec<u8>, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, from) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, from))
    }
}
