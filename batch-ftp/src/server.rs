//! Receiving side: drives a [`Reassembler`] over a [`Socket`].
//!
//! One session at a time.  Each inbound datagram goes through the
//! reassembler; any [`Step::Reply`] is sent back to the datagram's source
//! address.  When the session completes the file is handed back (or, in
//! [`run`], written to disk) and a fresh session starts.

use std::net::SocketAddr;
use std::path::Path;

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::receiver::{Reassembler, Step};
use crate::socket::{Socket, SocketError};
use crate::state::SessionState;

/// A reconstructed file and the address that sent its final unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub contents: Vec<u8>,
    pub peer: SocketAddr,
}

/// Run one receive session to completion.
///
/// Malformed datagrams are logged and skipped.  On a fatal protocol error
/// the peer is told why (nonzero ack status) before the error is returned.
pub async fn receive_file(
    socket: &Socket,
    config: &TransferConfig,
) -> Result<ReceivedFile, TransferError> {
    let mut session = Reassembler::from_config(config);

    loop {
        let (datagram, from) = match socket.recv_datagram().await {
            Ok(received) => received,
            Err(SocketError::Malformed { from, source }) => {
                log::warn!("[recv] malformed datagram from {from}: {source}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match session.on_datagram(&datagram) {
            Ok(Step::Reply(ack)) => {
                socket.send_ack(ack, from).await?;
                log::debug!(
                    "[recv] → ACK seq={} to {from}; next batch of {}",
                    ack.sequence,
                    session.batch_size()
                );
            }
            Ok(Step::Accepted | Step::Dropped) => {}
            Err(e) => {
                log::error!("[recv] session from {from} failed: {e}");
                if let Err(send_err) = socket.send_ack(session.rejection(&e), from).await {
                    log::warn!("[recv] could not notify {from}: {send_err}");
                }
                return Err(e.into());
            }
        }

        if session.state() == SessionState::Completed {
            let contents = session.finish()?;
            log::info!("[recv] received {} bytes from {from}", contents.len());
            return Ok(ReceivedFile {
                contents,
                peer: from,
            });
        }
    }
}

/// Serve sequential sessions, writing each completed file to `output`.
///
/// `sessions` bounds how many transfers are accepted (`None` = forever).
/// Returns the number of files written.  Any fatal session error ends the
/// loop with that error.
pub async fn run(
    socket: &Socket,
    output: &Path,
    config: &TransferConfig,
    sessions: Option<usize>,
) -> Result<usize, TransferError> {
    log::info!("[recv] listening on {}", socket.local_addr);
    let mut written = 0usize;

    while sessions.map_or(true, |limit| written < limit) {
        let file = receive_file(socket, config).await?;
        tokio::fs::write(output, &file.contents)
            .await
            .map_err(|source| TransferError::Io {
                path: output.to_path_buf(),
                source,
            })?;
        written += 1;
        log::info!(
            "[recv] a file has been successfully received! {} bytes from {} written to {}",
            file.contents.len(),
            file.peer,
            output.display()
        );
    }
    Ok(written)
}
