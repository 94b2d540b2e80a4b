//! Sending side: drives a [`Sender`] over a [`Socket`].
//!
//! ```text
//!   HELLO ──▶ wait hello-ack ──▶ send batch ──▶ wait ack ──┬─▶ next batch
//!                                     ▲                    │
//!                                     └──── timeout: ──────┘
//!                                         resend batch
//! ```
//!
//! Only the ACK wait has a deadline ([`TransferConfig::ack_timeout`]).  A
//! timeout resends the recorded batch; after
//! [`TransferConfig::max_retries`] unanswered transmissions the session
//! fails.  A wrong or error-status ACK fails it immediately.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::batch::BatchCycle;
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::packet::{status, Ack, Hello, HELLO_ACK_SEQUENCE};
use crate::sender::{SendError, Sender};
use crate::socket::{Socket, SocketError};
use crate::stats::TransferReport;
use crate::timer::RetryBudget;

/// Transfer `contents` to the receiver at `peer`.
///
/// Returns the elapsed time and byte count on success.  The clock starts
/// immediately before the first data unit and stops after the final ACK;
/// the handshake is not timed.
pub async fn send_file(
    socket: &Socket,
    peer: SocketAddr,
    contents: Vec<u8>,
    config: &TransferConfig,
) -> Result<TransferReport, TransferError> {
    let mut sender = Sender::new(contents, config.chunk_size, BatchCycle::new(config.max_batch))?;
    log::info!(
        "[send] {} bytes to {peer} in {} unit(s) of up to {} bytes",
        sender.total_length(),
        sender.unit_count(),
        config.chunk_size
    );

    if config.handshake {
        handshake(socket, peer, sender.hello(), config).await?;
    }

    // A retransmitted hello can be answered twice; the echo may trail into
    // the first batch, where 0xFF is never a valid ack.
    let mut hello_echo = config.handshake.then(|| Ack::hello(status::OK));
    let mut budget = RetryBudget::from_config(config);
    let started = Instant::now();

    while !sender.is_finished() {
        while let Some(unit) = sender.next_unit() {
            socket.send_unit(&unit, peer).await?;
            log::debug!(
                "[send] → seq={} len={} batch={}",
                unit.sequence,
                unit.payload.len(),
                sender.batch_size()
            );
        }
        debug_assert!(sender.awaiting_ack());

        loop {
            match wait_for_ack(socket, peer, budget.timeout, hello_echo).await? {
                Some(ack) => {
                    let acked = sender.on_ack(ack).inspect_err(|e| {
                        log::error!("[send] {e}");
                    })?;
                    log::debug!("[send] ← ACK seq={} ({acked} unit(s))", ack.sequence);
                    budget.reset();
                    hello_echo = None;
                    break;
                }
                None => {
                    if let Err(e) = budget.on_timeout() {
                        sender.fail();
                        log::error!("[send] {e}");
                        return Err(e.into());
                    }
                    for unit in sender.in_flight() {
                        socket.send_unit(unit, peer).await?;
                    }
                    sender.on_retransmit();
                    log::warn!(
                        "[send] ack timeout; resent {} unit(s), transmission {}",
                        sender.in_flight_len(),
                        sender.transmissions()
                    );
                }
            }
        }
    }

    let report = TransferReport::new(sender.bytes_to_send(), started.elapsed());
    log::info!(
        "[send] done: {} bytes in {} ms",
        report.bytes,
        report.elapsed_ms()
    );
    Ok(report)
}

/// Resolve `host`, read `input`, and send it `repeat` times (at least once).
///
/// Each run is a separate session, so the receiver must keep serving.
pub async fn run(
    host: &str,
    port: u16,
    input: &Path,
    config: &TransferConfig,
    repeat: usize,
) -> Result<Vec<TransferReport>, TransferError> {
    let peer = resolve(host, port).await?;
    let local: SocketAddr = if peer.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = Socket::bind(local).await?;

    let contents = tokio::fs::read(input)
        .await
        .map_err(|source| TransferError::Io {
            path: input.to_path_buf(),
            source,
        })?;
    log::info!(
        "[send] {} is {} bytes; sending to {peer} from {}",
        input.display(),
        contents.len(),
        socket.local_addr
    );

    let runs = repeat.max(1);
    let mut reports = Vec::with_capacity(runs);
    for run in 1..=runs {
        log::debug!("[send] run {run}/{runs}");
        reports.push(send_file(&socket, peer, contents.clone(), config).await?);
    }
    Ok(reports)
}

/// Look up `host` and pick an address for `port`, preferring IPv4.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransferError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| TransferError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| TransferError::NoAddress {
            host: host.to_string(),
        })
}

/// Announce chunk size and batch cycle; retried like a batch.
async fn handshake(
    socket: &Socket,
    peer: SocketAddr,
    hello: Hello,
    config: &TransferConfig,
) -> Result<(), TransferError> {
    let mut budget = RetryBudget::from_config(config);
    loop {
        socket.send_hello(&hello, peer).await?;
        log::debug!(
            "[send] → HELLO chunk_size={} max_batch={}",
            hello.chunk_size,
            hello.max_batch
        );
        match wait_for_ack(socket, peer, budget.timeout, None).await? {
            Some(ack) if !ack.is_ok() => {
                return Err(SendError::PeerRejected { status: ack.status }.into());
            }
            Some(ack) if ack.sequence == HELLO_ACK_SEQUENCE => {
                log::debug!("[send] ← HELLO-ACK");
                return Ok(());
            }
            Some(ack) => {
                return Err(SendError::UnexpectedAck {
                    expected: HELLO_ACK_SEQUENCE,
                    got: ack.sequence,
                }
                .into());
            }
            None => {
                budget.on_timeout()?;
                log::warn!("[send] hello timeout; attempt {}", budget.attempts());
            }
        }
    }
}

/// Wait up to `wait` for one ACK from `peer`.
///
/// Returns `Ok(None)` on timeout.  Datagrams from other addresses, and an
/// ack equal to `stale`, are ignored without extending the deadline.
async fn wait_for_ack(
    socket: &Socket,
    peer: SocketAddr,
    wait: Duration,
    stale: Option<Ack>,
) -> Result<Option<Ack>, TransferError> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, socket.recv_ack()).await {
            Err(_elapsed) => return Ok(None),
            Ok(Ok((ack, from))) if from == peer && Some(ack) == stale => {
                log::debug!("[send] ignoring repeated hello-ack");
            }
            Ok(Ok((ack, from))) if from == peer => return Ok(Some(ack)),
            Ok(Ok((_, from))) => log::debug!("[send] ignoring ack from stranger {from}"),
            Ok(Err(SocketError::Malformed { from, source })) if from == peer => {
                return Err(TransferError::MalformedAck(source));
            }
            Ok(Err(SocketError::Malformed { from, .. })) => {
                log::debug!("[send] ignoring junk from stranger {from}");
            }
            Ok(Err(e)) => return Err(e.into()),
        }
    }
}
