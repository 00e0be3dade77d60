use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;

use urft::config::{self, TransferConfig};
use urft::transport::UdpTransport;
use urft::SenderSession;

/// Send a file to a urft receiver.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the file to send.
    file: PathBuf,

    /// Receiver host (IP or resolvable name).
    host: String,

    /// Receiver port.
    port: u16,

    /// Maximum number of unacked packets in flight.
    #[arg(long, default_value_t = config::DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Per-packet retransmission timeout, in milliseconds.
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Per-packet retry budget before the packet is skipped.
    #[arg(long, default_value_t = config::DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Enable debug-level protocol logging (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let addr_str = format!("{}:{}", args.host, args.port);
    let addr: SocketAddr = match addr_str.parse() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("invalid server address '{addr_str}': {err}");
            return ExitCode::from(1);
        }
    };

    let transfer_config = TransferConfig {
        window_size: args.window_size,
        timeout: Duration::from_millis(args.timeout_ms),
        max_retries: args.max_retries,
        debug_log: args.verbose,
        ..TransferConfig::default()
    };

    let mut transport = match UdpTransport::bind_ephemeral() {
        Ok(transport) => transport,
        Err(err) => {
            error!("failed to bind UDP socket: {err}");
            return ExitCode::from(2);
        }
    };

    println!("Sending '{}' to {addr}", args.file.display());
    match SenderSession::run(&mut transport, addr, &args.file, &transfer_config) {
        Ok(summary) => {
            print!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("transfer failed: {err}");
            match err {
                urft::UrftError::SourceNotFound(_) | urft::UrftError::InvalidBasename => {
                    ExitCode::from(1)
                }
                _ => ExitCode::from(2),
            }
        }
    }
}
