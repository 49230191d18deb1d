//! Stop-and-wait finite-state machine types.
//!
//! ```text
//!   ┌──────────┐  fragment sent  ┌─────────────┐  FIN acked  ┌──────┐
//!   │ SENDING  │────────────────▶│ WAITING_ACK │────────────▶│ DONE │
//!   └──────────┘                 └──────┬──────┘             └──────┘
//!        ▲          ack (not FIN)       │  ▲
//!        └──────────────────────────────┘  │ timeout: resend
//!                                          └──┘
//! ```
//!
//! Transitions live in [`crate::stop_wait`].

use std::fmt;

/// Where a stop-and-wait transfer currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    /// Ready to read and send the next fragment.
    #[default]
    Sending,
    /// One fragment is in flight; waiting for its acknowledgment.
    WaitingAck,
    /// The FIN fragment was acknowledged.
    Done,
}

impl SendState {
    pub fn is_terminal(self) -> bool {
        self == SendState::Done
    }
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendState::Sending => "SENDING",
            SendState::WaitingAck => "WAITING_ACK",
            SendState::Done => "DONE",
        };
        f.write_str(name)
    }
}
