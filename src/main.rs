//! Entry point for `rcftp-client`.
//!
//! Parses CLI arguments, sets up logging, resolves the server and hands the
//! input to the chosen delivery algorithm.  All protocol work is delegated to
//! library modules.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncRead;

use rcftp_client::simulator::{LossyLink, SimulatorConfig};
use rcftp_client::socket::{Link, UdpLink};
use rcftp_client::timer::TimerConfig;
use rcftp_client::{run, Algorithm, TransferConfig};

/// Send a file (or stdin) to an RCFTP server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Server name or address.
    #[arg(short, long)]
    server: String,

    /// Server port.
    #[arg(short, long)]
    port: u16,

    /// Delivery algorithm: basic|stop-wait|go-back-n (or 1|2|3).
    #[arg(short, long, default_value = "stop-wait")]
    algorithm: Algorithm,

    /// Go-back-n window size, in fragments.
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    window: u16,

    /// Initial retransmission timeout in milliseconds.
    #[arg(short, long = "timeout-ms", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Upper bound for the backed-off timeout in milliseconds.
    #[arg(long = "max-rto-ms", default_value_t = 60_000)]
    max_rto_ms: u64,

    /// Consecutive timeouts tolerated before giving up.
    #[arg(short = 'r', long, default_value_t = 6)]
    max_retries: u32,

    /// Simulate datagram loss with this probability in each direction.
    #[arg(long)]
    loss: Option<f64>,

    /// Seed for the loss simulator.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log every datagram.
    #[arg(short, long)]
    verbose: bool,

    /// File to send; stdin when absent.
    file: Option<PathBuf>,
}

impl Cli {
    fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            window: usize::from(self.window),
            timer: TimerConfig {
                initial_rto: Duration::from_millis(self.timeout_ms),
                min_rto: Duration::from_millis(self.timeout_ms.min(200)),
                max_rto: Duration::from_millis(self.max_rto_ms.max(self.timeout_ms)),
                max_retries: self.max_retries,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v selects debug.
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = cli.transfer_config();
    let udp = UdpLink::connect(&cli.server, cli.port)
        .await
        .with_context(|| format!("cannot reach {}:{}", cli.server, cli.port))?;
    log::info!("sending to {} from {}", udp.peer_addr(), udp.local_addr);

    let mut link: Box<dyn Link> = match cli.loss {
        Some(loss) => {
            anyhow::ensure!((0.0..=1.0).contains(&loss), "--loss must be within [0, 1]");
            log::info!("simulating {:.0}% loss (seed {})", loss * 100.0, cli.seed);
            Box::new(LossyLink::new(udp, SimulatorConfig::lossy(loss, cli.seed)))
        }
        None => Box::new(udp),
    };

    let input: Box<dyn AsyncRead + Unpin + Send> = match &cli.file {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("cannot open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    let report = run(cli.algorithm, link.as_mut(), input, &config)
        .await
        .context("transfer failed")?;

    if report.completed {
        log::info!("transfer complete: {} bytes", report.bytes_acked);
    } else {
        log::warn!(
            "transfer not confirmed: {} of {} bytes acknowledged",
            report.bytes_acked,
            report.bytes_read
        );
    }
    Ok(())
}
