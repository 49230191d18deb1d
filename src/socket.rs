//! Datagram channel abstraction.
//!
//! Delivery strategies talk to the server through the [`Link`] trait: send
//! one whole datagram, receive one whole datagram.  [`UdpLink`] is the real
//! implementation over `tokio::net::UdpSocket`; tests and the fault
//! simulator provide others.  All protocol logic lives elsewhere; this module
//! owns only byte I/O and the single blocking wait.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::Instant;

/// A bidirectional, message-oriented channel to one peer.
#[async_trait]
pub trait Link: Send {
    /// Send `datagram` as one message; returns the number of bytes sent.
    async fn send(&mut self, datagram: &[u8]) -> io::Result<usize>;

    /// Receive the next message into `buf`; returns its length.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Outcome of [`wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// A datagram of this many bytes is in the buffer.
    Datagram(usize),
    /// The deadline passed first.
    Timeout,
}

/// Block until a datagram arrives or `deadline` passes.
///
/// A `None` deadline waits for a datagram indefinitely.
pub async fn wait_for<L: Link + ?Sized>(
    link: &mut L,
    buf: &mut [u8],
    deadline: Option<Instant>,
) -> io::Result<Wait> {
    match deadline {
        None => link.recv(buf).await.map(Wait::Datagram),
        Some(deadline) => match tokio::time::timeout_at(deadline, link.recv(buf)).await {
            Ok(result) => result.map(Wait::Datagram),
            Err(_elapsed) => Ok(Wait::Timeout),
        },
    }
}

/// A UDP socket bound to an ephemeral port that exchanges datagrams with a
/// single server address.
#[derive(Debug)]
pub struct UdpLink {
    /// Address this socket is bound to (filled in after the OS assigns a port).
    pub local_addr: SocketAddr,
    peer: SocketAddr,
    inner: UdpSocket,
}

impl UdpLink {
    /// Resolve `host:port` and open a socket for the first usable address.
    ///
    /// Both IPv4 and IPv6 results are tried in resolver order.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let mut last_err = None;
        for (n, peer) in lookup_host((host, port)).await?.enumerate() {
            log::debug!("address {}: {peer}", n + 1);
            let local = if peer.is_ipv6() {
                SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
            } else {
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
            };
            match UdpSocket::bind(local).await {
                Ok(socket) => return Self::from_socket(socket, peer),
                Err(e) => {
                    log::debug!("cannot bind for {peer}: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address found for {host}"))
        }))
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket, peer: SocketAddr) -> io::Result<Self> {
        let local_addr = socket.local_addr()?;
        log::debug!("socket {local_addr} ready for server {peer}");
        Ok(Self {
            local_addr,
            peer,
            inner: socket,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl Link for UdpLink {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.inner.send_to(datagram, self.peer).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let (n, addr) = self.inner.recv_from(buf).await?;
            if addr == self.peer {
                return Ok(n);
            }
            log::debug!("ignoring {n} bytes from stranger {addr}");
        }
    }
}
