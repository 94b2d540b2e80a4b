//! Entry point for `batch-ftp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, report printing).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use batch_ftp::config::{TransferConfig, DEFAULT_PORT};
use batch_ftp::socket::Socket;
use batch_ftp::stats::Summary;
use batch_ftp::{client, server};

/// Batched, cumulatively-acknowledged file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive files and write each one to the output path.
    Server {
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:5350")]
        bind: SocketAddr,
        /// Where each received file is written (overwritten per session).
        #[arg(short, long, default_value = "myUDPreceive.txt")]
        output: PathBuf,
        /// Exit after this many completed transfers instead of serving forever.
        #[arg(long, conflicts_with = "once")]
        sessions: Option<usize>,
        /// Exit after a single completed transfer.
        #[arg(long)]
        once: bool,
        #[command(flatten)]
        protocol: ProtocolArgs,
    },
    /// Send a file to a running server.
    Client {
        /// Receiver host name or address.
        host: String,
        /// Receiver UDP port.
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// File to send.
        #[arg(short, long, default_value = "myfile.txt")]
        input: PathBuf,
        /// Send the file this many times and print a summary.
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
        #[command(flatten)]
        protocol: ProtocolArgs,
    },
}

/// Tunables shared by both ends; they must agree unless the handshake is on.
#[derive(Args)]
struct ProtocolArgs {
    /// Payload bytes per data unit.
    #[arg(long, default_value_t = 100)]
    chunk_size: u16,
    /// Largest batch in the 1..=N cycle.
    #[arg(long, default_value_t = 3)]
    max_batch: u8,
    /// Milliseconds to wait for a batch ACK.
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,
    /// Transmissions of one batch before giving up.
    #[arg(long, default_value_t = 5)]
    retries: u32,
    /// Largest file the receiver accepts, in bytes.
    #[arg(long, default_value_t = 1_024_000)]
    max_size: usize,
    /// Skip the HELLO exchange (both ends must then share the settings above).
    #[arg(long)]
    no_handshake: bool,
}

impl From<ProtocolArgs> for TransferConfig {
    fn from(args: ProtocolArgs) -> Self {
        Self {
            chunk_size: args.chunk_size,
            max_batch: args.max_batch,
            ack_timeout: Duration::from_millis(args.timeout_ms),
            max_retries: args.retries,
            max_capacity: args.max_size,
            handshake: !args.no_handshake,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default `info` level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            bind,
            output,
            sessions,
            once,
            protocol,
        } => {
            let config = TransferConfig::from(protocol);
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("cannot bind {bind}"))?;
            let limit = if once { Some(1) } else { sessions };
            let written = server::run(&socket, &output, &config, limit).await?;
            log::info!("served {written} transfer(s); exiting");
        }
        Mode::Client {
            host,
            port,
            input,
            repeat,
            protocol,
        } => {
            let config = TransferConfig::from(protocol);
            let reports = client::run(&host, port, &input, &config, repeat)
                .await
                .with_context(|| format!("sending {} to {host}:{port}", input.display()))?;
            for report in &reports {
                println!("{report}");
            }
            if reports.len() > 1 {
                if let Some(summary) = Summary::from_reports(&reports) {
                    println!("{summary}");
                }
            }
        }
    }
    Ok(())
}
