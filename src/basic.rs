//! Basic delivery: one fragment, one response, no recovery.
//!
//! Exists to exercise the framing primitives against a server.  Exactly one
//! datagram is sent and at most one response is read; the read is bounded by
//! the retransmission timeout so an absent server cannot block the client.

use tokio::io::AsyncRead;

use crate::packet::{Datagram, Flags, DATAGRAM_LEN};
use crate::response::check_ack;
use crate::socket::{wait_for, Link, Wait};
use crate::source::PayloadSource;
use crate::timer::RetransmitTimer;
use crate::transfer::{note_rejection, InFlight, TransferConfig, TransferError, TransferReport};

pub async fn deliver<L, R>(
    link: &mut L,
    source: &mut PayloadSource<R>,
    config: &TransferConfig,
) -> Result<TransferReport, TransferError>
where
    L: Link + ?Sized,
    R: AsyncRead + Unpin,
{
    let mut report = TransferReport::default();
    let mut timer = RetransmitTimer::new(config.timer.clone());

    let chunk = source.next_chunk().await?;
    report.bytes_read = source.bytes_read();
    let flags = if chunk.last { Flags::FIN } else { Flags::NONE };

    let mut fragment = InFlight::new(Datagram::fragment(&chunk.data, 0, flags)?);
    fragment.transmit(link, &mut report).await?;
    report.fragments = 1;
    timer.arm();

    let mut buf = [0u8; DATAGRAM_LEN + 1];
    match wait_for(link, &mut buf, timer.deadline()).await? {
        Wait::Timeout => {
            report.timeouts += 1;
            log::warn!("no response within {:?}", timer.current_rto());
        }
        Wait::Datagram(n) => match Datagram::decode(&buf[..n]) {
            Err(e) => {
                report.discarded += 1;
                log::warn!("invalid response: {e}");
            }
            Ok(response) => match check_ack(&fragment.datagram, &response) {
                Ok(()) => {
                    report.bytes_acked = report.bytes_read;
                    report.completed = fragment.datagram.is_fin();
                    if !chunk.last {
                        log::info!("fragment acknowledged; input continues beyond one fragment");
                    }
                }
                Err(rejection) => note_rejection(&mut report, rejection),
            },
        },
    }
    timer.disarm();

    Ok(report)
}
