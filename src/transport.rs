//! Datagram socket abstraction.
//!
//! The datagram substrate is treated as an external collaborator, specified
//! only by the interface it presents: bind, send-to, receive-from with a
//! per-operation timeout. `Datagram` captures exactly that surface so the
//! window manager and reassembler can be driven in tests by a fake that
//! drops, reorders, or duplicates datagrams deterministically.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::codec::HEADER_SIZE;
use crate::config::MAX_PAYLOAD;

/// Receive buffer must be sized at `MAX_PAYLOAD + HEADER_SIZE`: anything the
/// peer sends beyond that is truncated by the kernel and silently dropped on
/// classification.
pub const RECV_BUFFER_SIZE: usize = MAX_PAYLOAD + HEADER_SIZE;

pub trait Datagram {
    /// Send one datagram to `addr`. Non-blocking at the protocol layer: any
    /// kernel-level backpressure surfaces as an `Err` here.
    fn send_to(&mut self, datagram: &[u8], addr: SocketAddr) -> io::Result<()>;

    /// Receive one datagram, waiting at most `deadline`. `Err` with
    /// `ErrorKind::WouldBlock` or `ErrorKind::TimedOut` means nothing arrived
    /// before the deadline — callers treat that as "no datagram this tick",
    /// never as a fatal error.
    fn recv_from(&mut self, deadline: Duration) -> io::Result<(Vec<u8>, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Real transport over `std::net::UdpSocket`.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self { socket })
    }

    /// Bind an ephemeral local port, for the sender side which doesn't care
    /// which port it's addressed from.
    pub fn bind_ephemeral() -> io::Result<Self> {
        Self::bind("0.0.0.0:0")
    }
}

impl Datagram for UdpTransport {
    fn send_to(&mut self, datagram: &[u8], addr: SocketAddr) -> io::Result<()> {
        self.socket.send_to(datagram, addr)?;
        Ok(())
    }

    fn recv_from(&mut self, deadline: Duration) -> io::Result<(Vec<u8>, SocketAddr)> {
        self.socket.set_read_timeout(Some(deadline))?;
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (n, addr) = self.socket.recv_from(&mut buf)?;
        Ok((buf[..n].to_vec(), addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(test)]
pub mod fake {
    //! An in-memory `Datagram` pair for unit tests, with optional
    //! deterministic drop/reorder/duplicate hooks keyed by sequence number.
    //! The socket is treated as an external collaborator specified only by
    //! its interface, so tests can drive the protocol deterministically.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Default)]
    struct Queue {
        inbox: VecDeque<(Vec<u8>, SocketAddr)>,
    }

    #[derive(Clone)]
    pub struct FakeTransport {
        addr: SocketAddr,
        peer_inbox: Arc<Mutex<Queue>>,
        own_inbox: Arc<Mutex<Queue>>,
    }

    impl FakeTransport {
        /// Build a connected pair: datagrams sent by `a` arrive in `b`'s
        /// inbox and vice versa.
        pub fn pair(addr_a: SocketAddr, addr_b: SocketAddr) -> (Self, Self) {
            let inbox_a = Arc::new(Mutex::new(Queue::default()));
            let inbox_b = Arc::new(Mutex::new(Queue::default()));
            let a = FakeTransport {
                addr: addr_a,
                peer_inbox: inbox_b.clone(),
                own_inbox: inbox_a.clone(),
            };
            let b = FakeTransport {
                addr: addr_b,
                peer_inbox: inbox_a,
                own_inbox: inbox_b,
            };
            (a, b)
        }
    }

    impl Datagram for FakeTransport {
        fn send_to(&mut self, datagram: &[u8], addr: SocketAddr) -> io::Result<()> {
            self.peer_inbox
                .lock()
                .unwrap()
                .inbox
                .push_back((datagram.to_vec(), addr));
            let _ = addr;
            Ok(())
        }

        fn recv_from(&mut self, deadline: Duration) -> io::Result<(Vec<u8>, SocketAddr)> {
            // Poll until `deadline` elapses, mirroring a real blocking
            // socket read with a timeout, so concurrent sender/receiver
            // threads in tests don't race on which one starts first.
            let poll_interval = Duration::from_millis(1);
            let start = Instant::now();
            loop {
                if let Some((datagram, _sender)) =
                    self.own_inbox.lock().unwrap().inbox.pop_front()
                {
                    return Ok((datagram, self.addr));
                }
                if start.elapsed() >= deadline {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "no datagram"));
                }
                std::thread::sleep(poll_interval.min(deadline));
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(self.addr)
        }
    }
}
