//! Delivery strategies against an in-memory server.
//!
//! Time is paused, so every timeout elapses as soon as the client has
//! nothing else to do.

mod common;

use std::collections::VecDeque;
use std::time::Duration;

use common::{pattern, FakeServer};
use rcftp_client::packet::{Datagram, Flags, MAX_PAYLOAD};
use rcftp_client::simulator::{LossyLink, SimulatorConfig};
use rcftp_client::timer::TimerConfig;
use rcftp_client::{run, Algorithm, TransferConfig, TransferError};

fn config(window: usize, max_retries: u32) -> TransferConfig {
    TransferConfig {
        window,
        timer: TimerConfig {
            initial_rto: Duration::from_millis(100),
            min_rto: Duration::from_millis(50),
            max_rto: Duration::from_secs(2),
            max_retries,
        },
    }
}

// ---------------------------------------------------------------------------
// Stop-and-wait
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn short_input_is_one_fin_fragment() {
    let mut server = FakeServer::default();
    let report = run(Algorithm::StopAndWait, &mut server, &b"0123456789"[..], &config(1, 6))
        .await
        .unwrap();

    assert_eq!(server.sent.len(), 1);
    let only = &server.sent[0];
    assert_eq!(only.seq, 0);
    assert_eq!(only.payload_len(), 10);
    assert!(only.flags.contains(Flags::FIN));

    assert!(report.completed);
    assert_eq!(report.bytes_read, 10);
    assert_eq!(report.bytes_remaining(), 0);
    assert_eq!(server.received, b"0123456789");
}

#[tokio::test(start_paused = true)]
async fn empty_input_sends_empty_fin() {
    let mut server = FakeServer::default();
    let report = run(Algorithm::StopAndWait, &mut server, &b""[..], &config(1, 6))
        .await
        .unwrap();

    assert_eq!(server.sent.len(), 1);
    assert_eq!(server.sent[0].payload_len(), 0);
    assert!(server.sent[0].is_fin());
    assert!(report.completed);
}

#[tokio::test(start_paused = true)]
async fn stop_and_wait_survives_lost_acks() {
    let input = pattern(5 * MAX_PAYLOAD + 37);
    let mut server = FakeServer::default().losing_acks(|n| n % 2 == 1);

    let report = run(Algorithm::StopAndWait, &mut server, &input[..], &config(1, 6))
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(server.received, input);
    assert!(report.retransmissions > 0);
    assert_eq!(report.timeouts, report.retransmissions);

    // One fragment at a time: every datagram repeats the previous one or
    // starts where it ended.
    for pair in server.sent.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        assert!(
            cur.seq == prev.seq || cur.seq == prev.end(),
            "seq {} after {}..{}",
            cur.seq,
            prev.seq,
            prev.end()
        );
    }
}

#[tokio::test(start_paused = true)]
async fn stop_and_wait_retransmits_lost_data_unchanged() {
    let input = pattern(3 * MAX_PAYLOAD);
    let mut dropped = false;
    let mut server = FakeServer::default().losing_data(move |d: &Datagram| {
        if d.seq == MAX_PAYLOAD as u32 && !dropped {
            dropped = true;
            return true;
        }
        false
    });

    let report = run(Algorithm::StopAndWait, &mut server, &input[..], &config(1, 6))
        .await
        .unwrap();

    assert_eq!(server.sent_seqs()[..3], [0, 512, 512]);
    assert_eq!(server.sent[1], server.sent[2]);
    assert_eq!(report.timeouts, 1);
    assert_eq!(server.received, input);
}

#[tokio::test(start_paused = true)]
async fn corrupt_and_busy_responses_are_ignored() {
    let mut corrupt = Datagram::new(b"", 0, 10, Flags::FIN).unwrap().encode();
    corrupt[9] ^= 0x40;
    let busy = Datagram::new(b"", 0, 10, Flags::BUSY).unwrap().encode();

    let mut server = FakeServer::default();
    server.inject = VecDeque::from(vec![corrupt.to_vec(), busy.to_vec()]);

    let report = run(Algorithm::StopAndWait, &mut server, &b"0123456789"[..], &config(1, 6))
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.transmissions, 1);
    assert_eq!(report.timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn short_response_is_discarded() {
    let mut server = FakeServer::default();
    server.inject.push_back(vec![1, 0, 0, 0]);

    let report = run(Algorithm::StopAndWait, &mut server, &b"abc"[..], &config(1, 6))
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(report.discarded, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_and_wait_gives_up_on_silent_server() {
    let mut server = FakeServer::default().losing_data(|_| true);

    let err = run(Algorithm::StopAndWait, &mut server, &b"hello"[..], &config(1, 3))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::PeerUnresponsive { retries: 3 }));
    assert_eq!(server.sent.len(), 4);
    assert!(server.sent.iter().all(|d| d.seq == 0));
}

// ---------------------------------------------------------------------------
// Go-back-n
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn go_back_n_resends_window_after_loss() {
    let input = pattern(7 * MAX_PAYLOAD + 100);
    let mut dropped = false;
    let mut server = FakeServer::default().losing_data(move |d: &Datagram| {
        if d.seq == 1024 && !dropped {
            dropped = true;
            return true;
        }
        false
    });

    let report = run(Algorithm::GoBackN, &mut server, &input[..], &config(4, 6))
        .await
        .unwrap();

    let seqs = server.sent_seqs();
    assert_eq!(seqs[..6], [0, 512, 1024, 1536, 2048, 2560]);
    assert_eq!(seqs[6..10], [1024, 1536, 2048, 2560]);
    assert_eq!(report.timeouts, 1);
    assert_eq!(report.fragments, 8);
    assert_eq!(report.bytes_read, input.len() as u64);
    assert!(report.completed);
    assert_eq!(server.received, input);
}

#[tokio::test(start_paused = true)]
async fn go_back_n_never_exceeds_window() {
    let input = pattern(10 * MAX_PAYLOAD);
    let mut server = FakeServer::default().losing_acks(|_| true);
    let _ = run(Algorithm::GoBackN, &mut server, &input[..], &config(3, 1)).await;

    // No acks at all: only the first three fragments are ever sent.
    let mut seqs = server.sent_seqs();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs, vec![0, 512, 1024]);
}

#[tokio::test(start_paused = true)]
async fn go_back_n_window_of_one_is_stop_and_wait() {
    let input = pattern(4 * MAX_PAYLOAD + 1);
    let mut server = FakeServer::default();

    let report = run(Algorithm::GoBackN, &mut server, &input[..], &config(1, 6))
        .await
        .unwrap();

    assert_eq!(server.sent_seqs(), vec![0, 512, 1024, 1536, 2048]);
    assert!(report.completed);
    assert_eq!(server.received, input);
}

#[tokio::test(start_paused = true)]
async fn go_back_n_over_lossy_link() {
    let input = pattern(40 * MAX_PAYLOAD + 321);
    let mut link = LossyLink::new(FakeServer::default(), SimulatorConfig::lossy(0.2, 42));

    let report = run(Algorithm::GoBackN, &mut link, &input[..], &config(5, 30))
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(report.bytes_acked, input.len() as u64);
    assert!(link.stats().sends_dropped + link.stats().recvs_dropped > 0);
    assert_eq!(link.into_inner().received, input);
}

#[tokio::test(start_paused = true)]
async fn go_back_n_gives_up_on_silent_server() {
    let input = pattern(6 * MAX_PAYLOAD);
    let mut server = FakeServer::default().losing_data(|_| true);

    let err = run(Algorithm::GoBackN, &mut server, &input[..], &config(4, 3))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::PeerUnresponsive { retries: 3 }));
    // One full window, then the same window once per retry.
    assert_eq!(server.sent.len(), 4 + 4 * 3);
}

// ---------------------------------------------------------------------------
// Basic
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn basic_short_input_completes() {
    let mut server = FakeServer::default();
    let report = run(Algorithm::Basic, &mut server, &b"0123456789"[..], &config(1, 6))
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(server.sent.len(), 1);
    assert_eq!(server.received, b"0123456789");
}

#[tokio::test(start_paused = true)]
async fn basic_sends_only_the_first_fragment() {
    let input = pattern(MAX_PAYLOAD + 200);
    let mut server = FakeServer::default();
    let report = run(Algorithm::Basic, &mut server, &input[..], &config(1, 6))
        .await
        .unwrap();

    assert_eq!(server.sent.len(), 1);
    assert!(!server.sent[0].is_fin());
    assert!(!report.completed);
    assert_eq!(report.bytes_acked, MAX_PAYLOAD as u64);
}

#[tokio::test(start_paused = true)]
async fn basic_does_not_retry() {
    let mut server = FakeServer::default().losing_data(|_| true);
    let report = run(Algorithm::Basic, &mut server, &b"lost"[..], &config(1, 6))
        .await
        .unwrap();

    assert_eq!(server.sent.len(), 1);
    assert_eq!(report.timeouts, 1);
    assert!(!report.completed);
}
