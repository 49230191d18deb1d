//! Go-Back-N delivery.
//!
//! [`GoBackN`] keeps up to `window` fragments in flight.  Unlike
//! stop-and-wait, several fragments may be outstanding at once.
//!
//! # Protocol contract
//!
//! - At most `window` fragments are in flight.
//! - ACKs are **cumulative**: `next = K` confirms every byte below `K`.
//! - On timeout, every in-flight fragment from `send_base` onwards is
//!   retransmitted, oldest first (go back N).
//! - Offsets are u32 and wrap.  Acknowledgments are matched by exact
//!   fragment end, so no ordering comparison across the wrap is needed.
//! - The transfer is complete once the FIN fragment is acknowledged.

use tokio::io::AsyncRead;

use crate::packet::{Datagram, Flags};
use crate::response::check_ack;
use crate::socket::Link;
use crate::source::PayloadSource;
use crate::timer::RetransmitTimer;
use crate::transfer::{next_response, note_rejection, InFlight, TransferConfig, TransferError, TransferReport};
use crate::window::SendWindow;

/// Go-Back-N send-side state for one transfer.
///
/// # Offset layout
///
/// ```text
///  send_base          next_seq
///      │                  │
///  ────┼──────────────────┼──────────────────▶ byte offsets
///      │ <── in flight ──▶│ <── sendable ───▶
/// ```
#[derive(Debug)]
pub struct GoBackN {
    /// Offset of the **oldest** unacknowledged byte (left window edge).
    pub send_base: u32,

    /// Offset of the **next** new fragment.
    pub next_seq: u32,

    /// In-flight fragments ordered by offset (front = oldest).
    window: SendWindow<InFlight>,

    /// The FIN fragment has been framed; nothing more is read.
    fin_sent: bool,

    /// The FIN fragment has been acknowledged.
    done: bool,

    timer: RetransmitTimer,
    report: TransferReport,
}

impl GoBackN {
    pub fn new(config: &TransferConfig) -> Self {
        Self {
            send_base: 0,
            next_seq: 0,
            window: SendWindow::new(config.window.max(1)),
            fin_sent: false,
            done: false,
            timer: RetransmitTimer::new(config.timer.clone()),
            report: TransferReport::default(),
        }
    }

    /// `true` when another fragment may be read and sent.
    pub fn can_send(&self) -> bool {
        !self.fin_sent && !self.window.is_full()
    }

    /// Number of fragments awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn report(&self) -> &TransferReport {
        &self.report
    }

    /// Drive the transfer until the FIN fragment is acknowledged.
    pub async fn run<L, R>(
        mut self,
        link: &mut L,
        source: &mut PayloadSource<R>,
    ) -> Result<TransferReport, TransferError>
    where
        L: Link + ?Sized,
        R: AsyncRead + Unpin,
    {
        loop {
            self.fill_window(link, source).await?;
            if self.done {
                return Ok(self.report);
            }

            match next_response(link, &self.timer, &mut self.report).await? {
                None => self.retransmit_window(link).await?,
                Some(response) => {
                    self.on_ack(&response);
                }
            }
        }
    }

    /// Place a freshly framed fragment into the window and advance `next_seq`.
    ///
    /// A full window hands the fragment back.
    pub fn record_sent(&mut self, entry: InFlight) -> Result<(), InFlight> {
        let end = entry.datagram.end();
        let fin = entry.datagram.is_fin();
        self.window.push_back(entry)?;
        self.next_seq = end;
        self.fin_sent |= fin;
        self.report.fragments += 1;
        if self.window.len() == 1 {
            self.timer.arm();
        }
        Ok(())
    }

    /// Read and send new fragments while the window has room.
    async fn fill_window<L, R>(
        &mut self,
        link: &mut L,
        source: &mut PayloadSource<R>,
    ) -> Result<(), TransferError>
    where
        L: Link + ?Sized,
        R: AsyncRead + Unpin,
    {
        while self.can_send() {
            let chunk = source.next_chunk().await?;
            self.report.bytes_read = source.bytes_read();
            let flags = if chunk.last { Flags::FIN } else { Flags::NONE };
            let datagram = Datagram::fragment(&chunk.data, self.next_seq, flags)?;

            if self.record_sent(InFlight::new(datagram)).is_err() {
                break;
            }
            if let Some(entry) = self.window.back_mut() {
                entry.transmit(link, &mut self.report).await?;
            }
            log::debug!("[gbn] in_flight={}", self.window.len());
        }
        Ok(())
    }

    /// Process a well-formed response.
    ///
    /// Slides the window past every fragment the cumulative acknowledgment
    /// covers and returns how many were removed; `0` for a duplicate,
    /// unexpected or rejecting response.
    pub fn on_ack(&mut self, response: &Datagram) -> usize {
        // Newest first: when an empty FIN fragment shares its end with the
        // fragment before it, a FIN ack must confirm the FIN fragment.
        let covered = self
            .window
            .iter()
            .rposition(|entry| check_ack(&entry.datagram, response).is_ok());

        let Some(position) = covered else {
            if let Some(base) = self.window.front() {
                if let Err(rejection) = check_ack(&base.datagram, response) {
                    note_rejection(&mut self.report, rejection);
                }
            }
            return 0;
        };

        if let Some(newest) = self.window.get(position) {
            // Karn: only sample fragments that were sent exactly once.
            if newest.tx_count == 1 {
                self.timer.record_rtt_sample(newest.sent_at.elapsed());
            }
        }

        let mut acked = 0;
        while acked <= position {
            let Some(entry) = self.window.pop_front() else {
                break;
            };
            self.report.bytes_acked += u64::from(entry.datagram.payload_len());
            if entry.datagram.is_fin() {
                self.done = true;
                self.report.completed = true;
            }
            acked += 1;
        }
        self.send_base = response.next;

        self.timer.on_progress();
        if self.window.is_empty() {
            self.timer.disarm();
        } else {
            // Restart the timer for the new oldest fragment.
            self.timer.arm();
        }
        log::debug!(
            "[gbn] ← ACK next={} slid={} in_flight={}",
            response.next,
            acked,
            self.window.len()
        );
        acked
    }

    /// Timeout: resend the whole window, oldest first, and re-arm.
    async fn retransmit_window<L: Link + ?Sized>(&mut self, link: &mut L) -> Result<(), TransferError> {
        self.report.timeouts += 1;
        if let Err(exhausted) = self.timer.on_timeout() {
            log::warn!(
                "[gbn] giving up at send_base={} after {} retransmissions",
                self.send_base,
                exhausted.0
            );
            return Err(exhausted.into());
        }
        log::debug!(
            "[gbn] timeout, retransmitting {} fragment(s) from {}",
            self.window.len(),
            self.send_base
        );
        for entry in self.window.iter_mut() {
            entry.transmit(link, &mut self.report).await?;
        }
        Ok(())
    }
}

/// Run a complete go-back-n transfer.
pub async fn deliver<L, R>(
    link: &mut L,
    source: &mut PayloadSource<R>,
    config: &TransferConfig,
) -> Result<TransferReport, TransferError>
where
    L: Link + ?Sized,
    R: AsyncRead + Unpin,
{
    GoBackN::new(config).run(link, source).await
}
