//! Timeout and retransmission behaviour under injected faults.
//!
//! Loss is produced either by a [`Simulator`] attached to one endpoint or by a
//! scripted raw UDP peer that withholds its ACKs.  ACK timeouts are shortened
//! so each test finishes quickly; every wait on the other end is bounded.

use std::net::SocketAddr;
use std::time::Duration;

use batch_ftp::{
    client,
    config::TransferConfig,
    sender::SendError,
    server::{self, ReceivedFile},
    simulator::{Simulator, SimulatorConfig},
    socket::Socket,
    stats::TransferReport,
    timer::RetriesExhausted,
    TransferError,
};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_millis(50);

/// Upper bound on any single wait for the other end.
const GUARD: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ephemeral() -> Socket {
    let addr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

fn contents(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn config() -> TransferConfig {
    TransferConfig {
        ack_timeout: TIMEOUT,
        ..TransferConfig::default()
    }
}

fn no_handshake() -> TransferConfig {
    TransferConfig {
        handshake: false,
        ..config()
    }
}

/// Send `data` to `peer` from a fresh socket that goes through `sim`.
async fn send_through(
    sim: Option<SimulatorConfig>,
    peer: SocketAddr,
    data: Vec<u8>,
    cfg: &TransferConfig,
) -> Result<TransferReport, TransferError> {
    let mut sock = ephemeral().await;
    if let Some(sim) = sim {
        sock = sock.with_simulator(Simulator::new(sim));
    }
    tokio::time::timeout(GUARD, client::send_file(&sock, peer, data, cfg))
        .await
        .expect("send_file timed out")
}

/// Spawn a sender task towards a scripted peer.
fn spawn_sender(
    peer: SocketAddr,
    data: Vec<u8>,
) -> JoinHandle<Result<TransferReport, TransferError>> {
    tokio::spawn(async move {
        let sock = ephemeral().await;
        client::send_file(&sock, peer, data, &no_handshake()).await
    })
}

async fn join_sender(
    task: JoinHandle<Result<TransferReport, TransferError>>,
) -> Result<TransferReport, TransferError> {
    tokio::time::timeout(GUARD, task)
        .await
        .expect("sender timed out")
        .expect("sender task panicked")
}

async fn join_receiver(
    task: JoinHandle<Result<ReceivedFile, TransferError>>,
) -> Result<ReceivedFile, TransferError> {
    tokio::time::timeout(GUARD, task)
        .await
        .expect("receiver timed out")
        .expect("receiver task panicked")
}

async fn recv_raw(sock: &UdpSocket, buf: &mut [u8]) -> (usize, SocketAddr) {
    tokio::time::timeout(GUARD, sock.recv_from(buf))
        .await
        .expect("raw recv timed out")
        .expect("raw recv failed")
}

// ---------------------------------------------------------------------------
// Retry ceiling
// ---------------------------------------------------------------------------

/// Four unanswered copies of the first unit are tolerated; the fifth gets through.
#[tokio::test]
async fn four_lost_transmissions_then_success() {
    let server_sock = ephemeral().await;
    let server_addr = server_sock.local_addr;
    let server = tokio::spawn(async move { server::receive_file(&server_sock, &config()).await });

    // Send #0 is the hello; #1..=#4 are the first four copies of unit 0.
    let data = contents(250);
    let report = send_through(
        Some(SimulatorConfig::dropping(1..=4)),
        server_addr,
        data.clone(),
        &config(),
    )
    .await
    .expect("fifth attempt should get through");

    assert!(report.elapsed >= TIMEOUT * 4, "elapsed {:?}", report.elapsed);
    assert_eq!(join_receiver(server).await.unwrap().contents, data);
}

/// A fifth lost copy ends the transfer with `RetriesExhausted` after five attempts.
#[tokio::test]
async fn fifth_lost_transmission_exhausts_retries() {
    let server_sock = ephemeral().await;
    let server_addr = server_sock.local_addr;
    let server = tokio::spawn(async move { server::receive_file(&server_sock, &config()).await });

    let err = send_through(
        Some(SimulatorConfig::dropping(1..=5)),
        server_addr,
        contents(250),
        &config(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(
            err,
            TransferError::RetriesExhausted(RetriesExhausted { attempts: 5 })
        ),
        "got {err:?}"
    );
    server.abort();
}

/// A peer that never answers the hello exhausts the budget after exactly `max_retries` hellos.
#[tokio::test]
async fn silent_peer_fails_the_handshake() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let cfg = TransferConfig {
        max_retries: 3,
        ..config()
    };

    let err = send_through(None, silent.local_addr().unwrap(), contents(10), &cfg)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::RetriesExhausted(RetriesExhausted { attempts: 3 })
    ));

    let mut buf = [0u8; 64];
    let mut hellos = 0;
    while let Ok(Ok((n, _))) =
        tokio::time::timeout(Duration::from_millis(20), silent.recv_from(&mut buf)).await
    {
        assert_eq!(n, 11);
        hellos += 1;
    }
    assert_eq!(hellos, 3);
}

// ---------------------------------------------------------------------------
// Scripted receivers
// ---------------------------------------------------------------------------

/// Every retransmission of an unacknowledged unit is byte-identical to the first send.
#[tokio::test]
async fn withheld_acks_trigger_identical_retransmissions() {
    let fake = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = spawn_sender(fake.local_addr().unwrap(), contents(60));

    let mut buf = [0u8; 256];
    let mut copies: Vec<Vec<u8>> = Vec::new();
    let mut from = None;
    while copies.len() < 4 {
        let (n, src) = recv_raw(&fake, &mut buf).await;
        copies.push(buf[..n].to_vec());
        from = Some(src);
    }
    fake.send_to(&[0, 0], from.unwrap()).await.unwrap();

    let report = join_sender(client).await.expect("send_file failed");
    assert_eq!(report.bytes, 61);
    assert!(copies.iter().all(|c| c == &copies[0]));
    assert_eq!(copies[0].len(), 8 + 61);
}

/// A timeout resends every unit of the current batch, in order.
#[tokio::test]
async fn whole_batch_is_resent_after_timeout() {
    let fake = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = spawn_sender(fake.local_addr().unwrap(), contents(250));

    let mut buf = [0u8; 256];
    let (_, from) = recv_raw(&fake, &mut buf).await;
    fake.send_to(&[0, 0], from).await.unwrap();

    // Second batch: ignore the first transmission, answer the second.
    let mut seqs = Vec::new();
    for _ in 0..4 {
        recv_raw(&fake, &mut buf).await;
        seqs.push(buf[3]);
    }
    assert_eq!(seqs, vec![1, 2, 1, 2]);
    fake.send_to(&[2, 0], from).await.unwrap();

    join_sender(client).await.expect("send_file failed");
}

/// An ACK for the wrong sequence fails the sender at once, without retrying.
#[tokio::test]
async fn wrong_ack_sequence_fails_immediately() {
    let fake = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = spawn_sender(fake.local_addr().unwrap(), contents(250));

    let mut buf = [0u8; 256];
    let (_, from) = recv_raw(&fake, &mut buf).await;
    fake.send_to(&[5, 0], from).await.unwrap();

    let err = join_sender(client).await.unwrap_err();
    assert!(matches!(
        err,
        TransferError::Send(SendError::UnexpectedAck {
            expected: 0,
            got: 5
        })
    ));
}

/// A reply from the peer that is not a 2-byte ACK is fatal.
#[tokio::test]
async fn malformed_ack_from_peer_is_fatal() {
    let fake = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = spawn_sender(fake.local_addr().unwrap(), contents(10));

    let mut buf = [0u8; 256];
    let (_, from) = recv_raw(&fake, &mut buf).await;
    fake.send_to(&[0, 0, 0], from).await.unwrap();

    assert!(matches!(
        join_sender(client).await,
        Err(TransferError::MalformedAck(_))
    ));
}

// ---------------------------------------------------------------------------
// Receiver-side faults
// ---------------------------------------------------------------------------

/// A lost hello-ACK is recovered by resending the hello.
#[tokio::test]
async fn lost_hello_ack_is_recovered() {
    // Receiver send #0 is the first hello-ack.
    let server_sock = ephemeral()
        .await
        .with_simulator(Simulator::new(SimulatorConfig::dropping([0])));
    let server_addr = server_sock.local_addr;
    let server = tokio::spawn(async move { server::receive_file(&server_sock, &config()).await });

    let data = contents(1_000);
    send_through(None, server_addr, data.clone(), &config())
        .await
        .expect("send_file failed");
    assert_eq!(join_receiver(server).await.unwrap().contents, data);
}

/// The receiver does not repeat a lost batch ACK, so the sender eventually gives up.
#[tokio::test]
async fn lost_batch_ack_is_not_repeated_by_the_receiver() {
    // Receiver send #0 is the hello-ack, #1 the ack for unit 0.
    let server_sock = ephemeral()
        .await
        .with_simulator(Simulator::new(SimulatorConfig::dropping([1])));
    let server_addr = server_sock.local_addr;
    let server = tokio::spawn(async move { server::receive_file(&server_sock, &config()).await });

    let cfg = TransferConfig {
        max_retries: 3,
        ..config()
    };
    let err = send_through(None, server_addr, contents(250), &cfg)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::RetriesExhausted(RetriesExhausted { attempts: 3 })
    ));
    server.abort();
}

/// Seeded random loss and duplication on the sender's path still deliver the file intact.
#[tokio::test]
async fn random_loss_and_duplication_are_survived() {
    let cfg = TransferConfig {
        max_retries: 30,
        ..config()
    };
    let server_sock = ephemeral().await;
    let server_addr = server_sock.local_addr;
    let server_cfg = cfg.clone();
    let server = tokio::spawn(async move { server::receive_file(&server_sock, &server_cfg).await });

    let sim = SimulatorConfig {
        loss_rate: 0.1,
        duplicate_rate: 0.1,
        seed: 7,
        ..SimulatorConfig::default()
    };
    let data = contents(3_000);
    send_through(Some(sim), server_addr, data.clone(), &cfg)
        .await
        .expect("send_file failed");
    assert_eq!(join_receiver(server).await.unwrap().contents, data);
}
