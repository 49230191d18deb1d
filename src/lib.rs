//! `rcftp-client` — client side of RCFTP, a reliable file transfer over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────┐  chunks  ┌──────────────────────────────┐
//!  │ PayloadSource │─────────▶│      delivery strategy       │
//!  └───────────────┘          │ basic | stop_wait | gbn      │
//!                             │   ├── RetransmitTimer        │
//!                             │   └── SendWindow (gbn)       │
//!                             └──────┬────────────────▲──────┘
//!                      Datagram::new │                │ check_ack
//!                                    ▼                │
//!                             ┌──────────────┐  ┌─────┴──────┐
//!                             │    packet    │  │  response  │
//!                             └──────┬───────┘  └─────▲──────┘
//!                                    │ raw datagrams  │
//!                             ┌──────▼────────────────┴──────┐
//!                             │  Link (UdpLink / LossyLink)  │
//!                             └──────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     — wire format, checksum, validation
//! - [`response`]   — does a response acknowledge what was sent?
//! - [`basic`]      — one fragment, one response, no recovery
//! - [`stop_wait`]  — one fragment in flight, resend on timeout
//! - [`gbn`]        — sliding window with go-back-n recovery
//! - [`state`]      — stop-and-wait state machine type
//! - [`timer`]      — retransmission deadline, back-off and RTO estimation
//! - [`window`]     — bounded in-flight fragment container
//! - [`source`]     — input stream cut into fragment-sized chunks
//! - [`socket`]     — datagram channel trait, UDP implementation, timed wait
//! - [`simulator`]  — fault-injecting link for testing
//! - [`transfer`]   — shared config, report, errors and dispatch

pub mod basic;
pub mod gbn;
pub mod packet;
pub mod response;
pub mod simulator;
pub mod socket;
pub mod source;
pub mod state;
pub mod stop_wait;
pub mod timer;
pub mod transfer;
pub mod window;

pub use packet::{Datagram, Flags, InvalidMessage};
pub use response::{check_ack, is_expected_ack, Rejection};
pub use socket::{Link, UdpLink};
pub use transfer::{run, Algorithm, TransferConfig, TransferError, TransferReport};
