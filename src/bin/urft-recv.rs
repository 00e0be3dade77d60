use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;

use urft::config::{self, TransferConfig};
use urft::transport::UdpTransport;
use urft::ReceiverSession;

/// Receive one file over urft and write it to the working directory.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to bind the listening socket to.
    #[arg(default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(default_value_t = 6969)]
    port: u16,

    /// Advisory out-of-order buffering hint.
    #[arg(long, default_value_t = config::DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Socket read deadline, in milliseconds.
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// How long to wait without any activity before probing the sender.
    #[arg(long, default_value_t = config::DEFAULT_INACTIVITY_TIMEOUT_MS)]
    inactivity_timeout_ms: u64,

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

    let bind_addr = format!("{}:{}", args.host, args.port);
    let mut transport = match UdpTransport::bind(&bind_addr) {
        Ok(transport) => transport,
        Err(err) => {
            error!("failed to bind {bind_addr}: {err}");
            return ExitCode::from(2);
        }
    };

    let transfer_config = TransferConfig {
        window_size: args.window_size,
        timeout: Duration::from_millis(args.timeout_ms),
        inactivity_timeout: Duration::from_millis(args.inactivity_timeout_ms),
        debug_log: args.verbose,
        ..TransferConfig::default()
    };

    let working_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            error!("failed to resolve working directory: {err}");
            return ExitCode::from(2);
        }
    };

    println!("Listening on {bind_addr}");
    match ReceiverSession::run(&mut transport, &working_dir, &transfer_config) {
        Ok(summary) => {
            print!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("transfer failed: {err}");
            ExitCode::from(2)
        }
    }
}
