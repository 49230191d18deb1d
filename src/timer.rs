//! Retransmission timer.
//!
//! Reliable delivery requires that unacknowledged fragments are re-sent if no
//! acknowledgment arrives within a bounded time.  [`RetransmitTimer`] does
//! not run anything in the background: it only holds a deadline, which the
//! delivery loop hands to [`crate::socket::wait_for`] so that one await
//! yields either a datagram or the timeout.
//!
//! RTO is computed using a variant of Jacobson's algorithm (RFC 6298):
//!   `RTO = SRTT + 4 × RTTVAR`
//! and doubles on each consecutive timeout (exponential back-off) up to a
//! configurable maximum.

use std::time::Duration;

use tokio::time::Instant;

/// Adjustable timeout parameters.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// RTO before any RTT sample is available.
    pub initial_rto: Duration,
    /// Floor for the RTO estimated from RTT samples.
    pub min_rto: Duration,
    /// Maximum RTO after repeated back-off.
    pub max_rto: Duration,
    /// Consecutive timeouts without progress before the peer is declared
    /// unresponsive.
    pub max_retries: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            initial_rto: Duration::from_millis(1000),
            min_rto: Duration::from_millis(200),
            max_rto: Duration::from_secs(60),
            max_retries: 6,
        }
    }
}

/// Returned by [`RetransmitTimer::on_timeout`] once the retry budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetriesExhausted(pub u32);

/// The retransmission timer of one transfer.
#[derive(Debug)]
pub struct RetransmitTimer {
    config: TimerConfig,
    /// Current RTO, updated after each RTT sample and on back-off.
    current_rto: Duration,
    /// Smoothed RTT estimate (SRTT).
    srtt: Option<Duration>,
    /// RTT variance estimate (RTTVAR).
    rttvar: Option<Duration>,
    deadline: Option<Instant>,
    /// Timeouts since the last progress.
    retries: u32,
}

impl RetransmitTimer {
    pub fn new(config: TimerConfig) -> Self {
        let rto = config.initial_rto;
        Self {
            config,
            current_rto: rto,
            srtt: None,
            rttvar: None,
            deadline: None,
            retries: 0,
        }
    }

    /// Start (or restart) the countdown from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.current_rto);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Deadline of the running countdown, `None` when disarmed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` when armed and the deadline has passed.
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }

    pub fn current_rto(&self) -> Duration {
        self.current_rto
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Account for one expiry: count it, back off and re-arm.
    ///
    /// Fails once more than `max_retries` timeouts happened in a row.
    pub fn on_timeout(&mut self) -> Result<(), RetriesExhausted> {
        self.retries += 1;
        if self.retries > self.config.max_retries {
            self.disarm();
            return Err(RetriesExhausted(self.retries - 1));
        }
        self.back_off();
        self.arm();
        Ok(())
    }

    /// The peer acknowledged something new: clear the retry count and drop
    /// any back-off.
    pub fn on_progress(&mut self) {
        self.retries = 0;
        self.reset();
    }

    /// Record a new RTT sample and update SRTT / RTTVAR / RTO (RFC 6298 §2).
    ///
    /// On the first sample:  SRTT = R,  RTTVAR = R/2,  RTO = SRTT + 4·RTTVAR.
    /// Subsequent samples:   RTTVAR = 3/4·RTTVAR + 1/4·|SRTT − R|
    ///                       SRTT   = 7/8·SRTT   + 1/8·R
    pub fn record_rtt_sample(&mut self, sample: Duration) {
        match (self.srtt, self.rttvar) {
            (Some(srtt), Some(rttvar)) => {
                let diff = sample.abs_diff(srtt);
                self.rttvar = Some(rttvar * 3 / 4 + diff / 4);
                self.srtt = Some(srtt * 7 / 8 + sample / 8);
            }
            _ => {
                self.srtt = Some(sample);
                self.rttvar = Some(sample / 2);
            }
        }
        self.reset();
    }

    /// Double the RTO (RFC 6298 §5.5), capped at `max_rto`.
    pub fn back_off(&mut self) {
        self.current_rto = (self.current_rto * 2).min(self.config.max_rto);
    }

    /// Restore `current_rto` from the SRTT / RTTVAR estimates, or
    /// `initial_rto` before the first sample.
    pub fn reset(&mut self) {
        self.current_rto = match (self.srtt, self.rttvar) {
            (Some(srtt), Some(rttvar)) => (srtt + rttvar * 4)
                .max(self.config.min_rto)
                .min(self.config.max_rto),
            _ => self.config.initial_rto,
        };
    }
}
