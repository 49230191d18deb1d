//! Stop-and-wait delivery.
//!
//! # Contract
//! - At most **one** fragment is in flight at any moment (`unacked`).
//! - A new fragment is only read and sent once `unacked` is `None`.
//! - On ACK: advance `next_seq` by the payload length; clear `unacked`.
//! - On timeout: resend the same datagram unchanged and re-arm the timer.
//! - Anything else that arrives is discarded; only the timer retransmits.
//!
//! The state machine itself is [`SendState`].

use tokio::io::AsyncRead;

use crate::packet::{Datagram, Flags};
use crate::response::check_ack;
use crate::socket::Link;
use crate::source::PayloadSource;
use crate::state::SendState;
use crate::timer::RetransmitTimer;
use crate::transfer::{next_response, note_rejection, InFlight, TransferConfig, TransferError, TransferReport};

/// Stop-and-wait send-side state for one transfer.
#[derive(Debug)]
pub struct StopAndWait {
    pub state: SendState,

    /// Offset of the **next** fragment to send.
    ///
    /// Advances by the payload length when that fragment is acknowledged and
    /// stays put while it is in flight.
    pub next_seq: u32,

    /// The in-flight fragment, or `None` when the sender is idle.
    unacked: Option<InFlight>,

    timer: RetransmitTimer,
    report: TransferReport,
}

impl StopAndWait {
    pub fn new(config: &TransferConfig) -> Self {
        Self {
            state: SendState::Sending,
            next_seq: 0,
            unacked: None,
            timer: RetransmitTimer::new(config.timer.clone()),
            report: TransferReport::default(),
        }
    }

    /// Drive the state machine until [`SendState::Done`].
    pub async fn run<L, R>(
        mut self,
        link: &mut L,
        source: &mut PayloadSource<R>,
    ) -> Result<TransferReport, TransferError>
    where
        L: Link + ?Sized,
        R: AsyncRead + Unpin,
    {
        while !self.state.is_terminal() {
            match self.state {
                SendState::Sending => self.send_next(link, source).await?,
                SendState::WaitingAck => self.await_ack(link).await?,
                SendState::Done => break,
            }
        }
        Ok(self.report)
    }

    /// `SENDING`: read, frame and send the next fragment.
    async fn send_next<L, R>(
        &mut self,
        link: &mut L,
        source: &mut PayloadSource<R>,
    ) -> Result<(), TransferError>
    where
        L: Link + ?Sized,
        R: AsyncRead + Unpin,
    {
        debug_assert!(
            self.unacked.is_none(),
            "send_next called while a fragment is already in flight"
        );
        let chunk = source.next_chunk().await?;
        self.report.bytes_read = source.bytes_read();
        let flags = if chunk.last { Flags::FIN } else { Flags::NONE };

        let mut entry = InFlight::new(Datagram::fragment(&chunk.data, self.next_seq, flags)?);
        entry.transmit(link, &mut self.report).await?;
        self.report.fragments += 1;
        self.timer.arm();
        self.unacked = Some(entry);
        self.state = SendState::WaitingAck;
        Ok(())
    }

    /// `WAITING_ACK`: one datagram or one timeout.
    async fn await_ack<L: Link + ?Sized>(&mut self, link: &mut L) -> Result<(), TransferError> {
        let Some(entry) = self.unacked.as_mut() else {
            self.state = SendState::Sending;
            return Ok(());
        };

        match next_response(link, &self.timer, &mut self.report).await? {
            None => {
                self.report.timeouts += 1;
                if let Err(exhausted) = self.timer.on_timeout() {
                    log::warn!(
                        "giving up on seq={} after {} retransmissions",
                        entry.datagram.seq,
                        exhausted.0
                    );
                    return Err(exhausted.into());
                }
                log::debug!(
                    "timeout after {} send(s) of seq={}",
                    entry.tx_count,
                    entry.datagram.seq
                );
                entry.transmit(link, &mut self.report).await?;
            }
            Some(response) => match check_ack(&entry.datagram, &response) {
                Err(rejection) => note_rejection(&mut self.report, rejection),
                Ok(()) => {
                    self.timer.disarm();
                    // Karn: a retransmitted fragment gives an ambiguous sample.
                    if entry.tx_count == 1 {
                        self.timer.record_rtt_sample(entry.sent_at.elapsed());
                    }
                    self.timer.on_progress();

                    self.next_seq = entry.datagram.end();
                    self.report.bytes_acked += u64::from(entry.datagram.payload_len());
                    self.state = if entry.datagram.is_fin() {
                        self.report.completed = true;
                        SendState::Done
                    } else {
                        SendState::Sending
                    };
                    self.unacked = None;
                    log::debug!("acked up to {} → {}", self.next_seq, self.state);
                }
            },
        }
        Ok(())
    }
}

/// Run a complete stop-and-wait transfer.
pub async fn deliver<L, R>(
    link: &mut L,
    source: &mut PayloadSource<R>,
    config: &TransferConfig,
) -> Result<TransferReport, TransferError>
where
    L: Link + ?Sized,
    R: AsyncRead + Unpin,
{
    StopAndWait::new(config).run(link, source).await
}
