//! In-memory RCFTP receiver used as the far end of a [`Link`].
//!
//! Every datagram the client sends is processed synchronously: accepted when
//! it starts at the expected offset, answered with a cumulative
//! acknowledgment otherwise.  Hooks let a test lose data, lose answers or
//! slip extra datagrams in front of an answer.  When nothing is queued,
//! `recv` never completes, so only the client's timer can end the wait.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use rcftp_client::packet::{Datagram, Flags};
use rcftp_client::socket::Link;

type DataHook = Box<dyn FnMut(&Datagram) -> bool + Send>;
type AckHook = Box<dyn FnMut(usize) -> bool + Send>;

pub struct FakeServer {
    /// Next offset the server wants.
    pub expected: u32,
    pub fin_received: bool,
    /// Bytes accepted in order.
    pub received: Vec<u8>,
    /// Every datagram the client sent, lost or not.
    pub sent: Vec<Datagram>,
    /// Every acknowledgment generated, lost or not.
    pub acks: Vec<Datagram>,
    /// Raw datagrams delivered ahead of the next acknowledgment.
    pub inject: VecDeque<Vec<u8>>,
    queue: VecDeque<Vec<u8>>,
    lose_data: DataHook,
    lose_ack: AckHook,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            expected: 0,
            fin_received: false,
            received: Vec::new(),
            sent: Vec::new(),
            acks: Vec::new(),
            inject: VecDeque::new(),
            queue: VecDeque::new(),
            lose_data: Box::new(|_| false),
            lose_ack: Box::new(|_| false),
        }
    }
}

impl FakeServer {
    /// Drop client datagrams for which `hook` returns `true`.
    pub fn losing_data(mut self, hook: impl FnMut(&Datagram) -> bool + Send + 'static) -> Self {
        self.lose_data = Box::new(hook);
        self
    }

    /// Drop the n-th acknowledgment (0-based) when `hook(n)` is `true`.
    pub fn losing_acks(mut self, hook: impl FnMut(usize) -> bool + Send + 'static) -> Self {
        self.lose_ack = Box::new(hook);
        self
    }

    /// Offsets of every datagram sent, in order.
    pub fn sent_seqs(&self) -> Vec<u32> {
        self.sent.iter().map(|d| d.seq).collect()
    }

    fn answer(&mut self, d: &Datagram) {
        if d.seq == self.expected && !self.fin_received {
            self.received.extend_from_slice(&d.payload);
            self.expected = d.end();
            self.fin_received = d.is_fin();
        }
        let flags = if self.fin_received { Flags::FIN } else { Flags::NONE };
        let ack = Datagram::new(b"", 0, self.expected, flags).expect("empty ack");
        let n = self.acks.len();
        self.acks.push(ack.clone());

        self.queue.extend(self.inject.drain(..));
        if !(self.lose_ack)(n) {
            self.queue.push_back(ack.encode().to_vec());
        }
    }
}

#[async_trait]
impl Link for FakeServer {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        let d = Datagram::decode(datagram).expect("client sent a malformed datagram");
        self.sent.push(d.clone());
        if !(self.lose_data)(&d) {
            self.answer(&d);
        }
        Ok(datagram.len())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.queue.pop_front() {
            Some(raw) => {
                buf[..raw.len()].copy_from_slice(&raw);
                Ok(raw.len())
            }
            None => std::future::pending().await,
        }
    }
}

/// `len` bytes of a recognisable pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
