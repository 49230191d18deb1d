//! Pieces shared by the delivery strategies: configuration, the report a
//! transfer produces, the fatal error type, the in-flight fragment record and
//! the dispatch entry point [`run`].

use std::fmt;
use std::io;
use std::str::FromStr;

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::time::Instant;

use crate::packet::{Datagram, InvalidMessage, DATAGRAM_LEN, MAX_PAYLOAD};
use crate::response::Rejection;
use crate::socket::{wait_for, Link, Wait};
use crate::source::PayloadSource;
use crate::timer::{RetransmitTimer, RetriesExhausted, TimerConfig};
use crate::{basic, gbn, stop_wait};

/// Errors that end a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Socket or input failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot frame fragment: {0}")]
    Codec(#[from] InvalidMessage),

    #[error("server unresponsive after {retries} retransmissions")]
    PeerUnresponsive { retries: u32 },
}

impl From<RetriesExhausted> for TransferError {
    fn from(e: RetriesExhausted) -> Self {
        TransferError::PeerUnresponsive { retries: e.0 }
    }
}

/// Which delivery algorithm drives the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// One datagram, one response, no recovery.
    Basic,
    StopAndWait,
    /// Sliding window with go-back-n recovery.
    GoBackN,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "basic" => Ok(Algorithm::Basic),
            "2" | "stop-wait" | "stop-and-wait" | "stopwait" => Ok(Algorithm::StopAndWait),
            "3" | "go-back-n" | "gbn" | "window" => Ok(Algorithm::GoBackN),
            other => Err(format!(
                "unknown algorithm '{other}' (expected basic|stop-wait|go-back-n or 1|2|3)"
            )),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Basic => "basic",
            Algorithm::StopAndWait => "stop-wait",
            Algorithm::GoBackN => "go-back-n",
        };
        f.write_str(name)
    }
}

/// Everything a strategy needs to know besides its link and input.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Go-back-n window size in fragments (ignored by the other strategies).
    pub window: usize,
    pub timer: TimerConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            window: 4,
            timer: TimerConfig::default(),
        }
    }
}

/// Counters describing how a transfer went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Payload bytes taken from the input.
    pub bytes_read: u64,
    /// Payload bytes the server confirmed.
    pub bytes_acked: u64,
    /// Distinct fragments sent.
    pub fragments: u64,
    /// Datagrams put on the wire, first sends included.
    pub transmissions: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    /// Corrupt, malformed or unexpected responses thrown away.
    pub discarded: u64,
    /// Responses carrying BUSY or ABORT.
    pub rejected: u64,
    /// The final fragment was acknowledged.
    pub completed: bool,
}

impl TransferReport {
    /// Bytes read but never confirmed.
    pub fn bytes_remaining(&self) -> u64 {
        self.bytes_read - self.bytes_acked
    }
}

/// A fragment that has been framed and sent at least once.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub datagram: Datagram,
    wire: [u8; DATAGRAM_LEN],
    /// How many times this fragment has been transmitted (1 = first send).
    pub tx_count: u32,
    /// Time of the most recent transmission (for RTT sampling).
    pub sent_at: Instant,
}

impl InFlight {
    pub fn new(datagram: Datagram) -> Self {
        let wire = datagram.encode();
        Self {
            datagram,
            wire,
            tx_count: 0,
            sent_at: Instant::now(),
        }
    }

    /// Put the unmodified datagram on the wire.
    pub async fn transmit<L: Link + ?Sized>(
        &mut self,
        link: &mut L,
        report: &mut TransferReport,
    ) -> Result<(), TransferError> {
        link.send(&self.wire).await?;
        self.tx_count += 1;
        self.sent_at = Instant::now();
        report.transmissions += 1;
        if self.tx_count > 1 {
            report.retransmissions += 1;
        }
        log::debug!(
            "→ DATA seq={} len={} flags={:?} tx={}",
            self.datagram.seq,
            self.datagram.payload_len(),
            self.datagram.flags,
            self.tx_count
        );
        Ok(())
    }
}

/// Wait for the next well-formed response, or for the timer.
///
/// Datagrams that fail validation are counted, logged and skipped without
/// moving the deadline.  `Ok(None)` means the timer fired.
pub(crate) async fn next_response<L: Link + ?Sized>(
    link: &mut L,
    timer: &RetransmitTimer,
    report: &mut TransferReport,
) -> Result<Option<Datagram>, TransferError> {
    let mut buf = [0u8; DATAGRAM_LEN + 1];
    loop {
        match wait_for(link, &mut buf, timer.deadline()).await? {
            Wait::Timeout => return Ok(None),
            Wait::Datagram(n) => match Datagram::decode(&buf[..n]) {
                Ok(datagram) => {
                    log::debug!(
                        "← ACK next={} flags={:?}",
                        datagram.next,
                        datagram.flags
                    );
                    return Ok(Some(datagram));
                }
                Err(e) => {
                    report.discarded += 1;
                    log::debug!("discarding response: {e}");
                }
            },
        }
    }
}

/// Account for a response that does not acknowledge anything.
pub(crate) fn note_rejection(report: &mut TransferReport, rejection: Rejection) {
    match rejection {
        Rejection::ReceiverRejected { .. } => report.rejected += 1,
        _ => report.discarded += 1,
    }
    log::debug!("ignoring response: {rejection}");
}

/// Transfer everything `reader` yields over `link` with `algorithm`.
pub async fn run<L, R>(
    algorithm: Algorithm,
    link: &mut L,
    reader: R,
    config: &TransferConfig,
) -> Result<TransferReport, TransferError>
where
    L: Link + ?Sized,
    R: AsyncRead + Unpin,
{
    let mut source = PayloadSource::new(reader, MAX_PAYLOAD);
    log::info!("starting {algorithm} transfer");
    let report = match algorithm {
        Algorithm::Basic => basic::deliver(link, &mut source, config).await?,
        Algorithm::StopAndWait => stop_wait::deliver(link, &mut source, config).await?,
        Algorithm::GoBackN => gbn::deliver(link, &mut source, config).await?,
    };
    log::info!(
        "{algorithm} transfer {}: {} bytes acked, {} datagrams sent ({} retransmitted), {} timeouts",
        if report.completed { "complete" } else { "incomplete" },
        report.bytes_acked,
        report.transmissions,
        report.retransmissions,
        report.timeouts
    );
    Ok(report)
}
