//! Fault-injecting link for exercising the recovery paths.
//!
//! Real networks drop and duplicate datagrams, but rarely on demand.
//! [`LossyLink`] wraps any [`Link`] and applies a configurable fault model:
//!
//! | Fault        | Description                                             |
//! |--------------|---------------------------------------------------------|
//! | Send loss    | An outbound datagram is silently not sent.              |
//! | Receive loss | An inbound datagram is read and thrown away.            |
//! | Duplication  | An inbound datagram is delivered twice.                 |
//!
//! The random source is a seeded [`StdRng`], so a lossy run can be
//! reproduced exactly from its seed.

use std::io;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::socket::Link;

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that an outbound datagram is dropped.
    pub send_loss: f64,
    /// Probability that an inbound datagram is dropped.
    pub recv_loss: f64,
    /// Probability that an inbound datagram is delivered twice.
    pub duplicate_rate: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // Transparent pass-through.
        Self {
            send_loss: 0.0,
            recv_loss: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    /// Symmetric loss in both directions.
    pub fn lossy(loss: f64, seed: u64) -> Self {
        Self {
            send_loss: loss,
            recv_loss: loss,
            seed,
            ..Self::default()
        }
    }
}

/// Counters of injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub sends_dropped: u64,
    pub recvs_dropped: u64,
    pub duplicated: u64,
}

/// A [`Link`] that loses and duplicates datagrams on purpose.
#[derive(Debug)]
pub struct LossyLink<L> {
    inner: L,
    config: SimulatorConfig,
    rng: StdRng,
    /// A copy waiting to be delivered again.
    pending_duplicate: Option<Vec<u8>>,
    stats: FaultStats,
}

impl<L: Link> LossyLink<L> {
    pub fn new(inner: L, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng,
            pending_duplicate: None,
            stats: FaultStats::default(),
        }
    }

    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    pub fn into_inner(self) -> L {
        self.inner
    }

    fn roll(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.random_bool(p.min(1.0))
    }
}

#[async_trait]
impl<L: Link> Link for LossyLink<L> {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        if self.roll(self.config.send_loss) {
            self.stats.sends_dropped += 1;
            log::debug!("[sim] dropped outbound datagram");
            // The sender cannot tell a lost datagram from a delivered one.
            return Ok(datagram.len());
        }
        self.inner.send(datagram).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(copy) = self.pending_duplicate.take() {
            let n = copy.len().min(buf.len());
            buf[..n].copy_from_slice(&copy[..n]);
            return Ok(n);
        }
        loop {
            let n = self.inner.recv(buf).await?;
            if self.roll(self.config.recv_loss) {
                self.stats.recvs_dropped += 1;
                log::debug!("[sim] dropped inbound datagram");
                continue;
            }
            if self.roll(self.config.duplicate_rate) {
                self.stats.duplicated += 1;
                self.pending_duplicate = Some(buf[..n].to_vec());
            }
            return Ok(n);
        }
    }
}
