//! Acknowledgment matching.
//!
//! Decides whether a datagram that already passed [`Datagram::decode`] is the
//! acknowledgment the client is waiting for.  Pure functions over the sent
//! and received datagrams; no I/O.

use thiserror::Error;

use crate::packet::{Datagram, Flags};

/// Why a well-formed response does not acknowledge the datagram sent.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The receiver answered with BUSY or ABORT.
    #[error("receiver rejected the datagram (flags {flags:?})")]
    ReceiverRejected { flags: Flags },

    #[error("unexpected response: next={got}, expected {expected}")]
    UnexpectedResponse { expected: u32, got: u32 },

    /// The final fragment was acknowledged without FIN.
    #[error("final fragment acknowledged without FIN")]
    FinNotEchoed,
}

/// Check `received` against the datagram last `sent`.
///
/// Receiver rejection is reported first so that a BUSY/ABORT answer is never
/// mistaken for a stale acknowledgment.
pub fn check_ack(sent: &Datagram, received: &Datagram) -> Result<(), Rejection> {
    if received.flags.is_rejection() {
        return Err(Rejection::ReceiverRejected {
            flags: received.flags,
        });
    }

    let expected = sent.end();
    if received.next != expected {
        return Err(Rejection::UnexpectedResponse {
            expected,
            got: received.next,
        });
    }

    if sent.is_fin() && !received.is_fin() {
        return Err(Rejection::FinNotEchoed);
    }

    Ok(())
}

/// `true` when `received` acknowledges `sent`.
pub fn is_expected_ack(sent: &Datagram, received: &Datagram) -> bool {
    check_ack(sent, received).is_ok()
}
