//! Sliding-window ARQ transmission, driven by `Session`. Per-packet retries
//! rather than full-window Go-Back-N minimise redundant bytes on lossy
//! links; the explicit SKIP marker converts an otherwise-stuck window into
//! forward progress without the receiver needing an independent loss
//! estimate. Fixed window size and a flat per-packet timeout/retry count —
//! no congestion window, no adaptive RTO.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::codec::{self, SKIP_PACKET};
use crate::config::TransferConfig;
use crate::transport::Datagram;

struct Entry {
    datagram: Vec<u8>,
    last_send: Instant,
    retries: u32,
}

/// Owns the sender's view of in-flight sequences. `base` is the lowest
/// unacked sequence, `next` the next sequence to transmit; the invariant
/// `outstanding ⊆ [base, next)`, `|outstanding| ≤ window_size` holds at
/// every point between calls.
pub struct SenderWindow {
    base: u32,
    next: u32,
    window: HashMap<u32, Entry>,
    lost: BTreeSet<u32>,
    chunks: Vec<Vec<u8>>,
    chunk_index: usize,
    window_size: usize,
    timeout: Duration,
    max_retries: u32,
    retransmissions: u64,
}

impl SenderWindow {
    pub fn new(chunks: Vec<Vec<u8>>, config: &TransferConfig) -> Self {
        Self {
            base: 1,
            next: 1,
            window: HashMap::new(),
            lost: BTreeSet::new(),
            chunks,
            chunk_index: 0,
            window_size: config.window_size,
            timeout: config.timeout,
            max_retries: config.max_retries,
            retransmissions: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.chunk_index == self.chunks.len() && self.window.is_empty()
    }

    pub fn lost(&self) -> &BTreeSet<u32> {
        &self.lost
    }

    /// Total count of retransmitted datagrams, across all sequences — the
    /// number of timed-out resends, not the number of distinct sequences
    /// retransmitted.
    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// One past the highest sequence ever assigned to a data chunk — the
    /// sequence EOF is sent at.
    pub fn next_seq_after_last_chunk(&self) -> u32 {
        1 + self.chunks.len() as u32
    }

    /// Fill the window with new chunks while room remains.
    pub fn fill(
        &mut self,
        transport: &mut impl Datagram,
        addr: SocketAddr,
    ) -> std::io::Result<()> {
        while self.window.len() < self.window_size && self.chunk_index < self.chunks.len() {
            let seq = self.next;
            let chunk = &self.chunks[self.chunk_index];
            let datagram = codec::encode(seq, chunk);
            transport.send_to(&datagram, addr)?;
            debug!("sent data seq={seq} len={}", chunk.len());
            self.window.insert(
                seq,
                Entry {
                    datagram,
                    last_send: Instant::now(),
                    retries: 0,
                },
            );
            self.next += 1;
            self.chunk_index += 1;
        }
        Ok(())
    }

    /// Drain available acks for up to `budget`, removing matched entries and
    /// advancing `base`. Returns the number of
    /// entries newly acked.
    pub fn drain_acks(
        &mut self,
        transport: &mut impl Datagram,
        per_read_deadline: Duration,
        budget: Duration,
    ) -> std::io::Result<usize> {
        let drain_start = Instant::now();
        let mut acked = 0usize;
        loop {
            if drain_start.elapsed() >= budget {
                break;
            }
            match transport.recv_from(per_read_deadline) {
                Ok((datagram, _from)) => {
                    if let Some((seq, _payload)) = codec::decode(&datagram) {
                        if self.window.remove(&seq).is_some() {
                            acked += 1;
                            debug!("ack received seq={seq}");
                            if seq == self.base {
                                self.advance_base();
                            }
                        }
                    }
                }
                Err(e) => {
                    if is_timeout(&e) {
                        break;
                    }
                    return Err(e);
                }
            }
        }
        Ok(acked)
    }

    fn advance_base(&mut self) {
        while self.base < self.next && !self.window.contains_key(&self.base) {
            self.base += 1;
        }
    }

    /// Retransmit timed-out entries, or SKIP them past `max_retries`.
    pub fn check_timeouts(
        &mut self,
        transport: &mut impl Datagram,
        addr: SocketAddr,
    ) -> std::io::Result<()> {
        let now = Instant::now();
        let mut expired: Vec<u32> = self
            .window
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_send) > self.timeout)
            .map(|(seq, _)| *seq)
            .collect();
        expired.sort_unstable();

        for seq in expired {
            let should_skip = {
                let entry = self.window.get(&seq).expect("seq collected from window");
                entry.retries >= self.max_retries
            };
            if should_skip {
                warn!("seq={seq} exhausted retries, sending SKIP");
                let skip_datagram = codec::encode(seq, SKIP_PACKET);
                for _ in 0..3 {
                    transport.send_to(&skip_datagram, addr)?;
                }
                self.lost.insert(seq);
                self.window.remove(&seq);
                if seq == self.base {
                    self.advance_base();
                }
            } else {
                let entry = self.window.get_mut(&seq).expect("seq collected from window");
                transport.send_to(&entry.datagram, addr)?;
                entry.last_send = Instant::now();
                entry.retries += 1;
                self.retransmissions += 1;
                debug!("retransmit seq={seq} retry={}", entry.retries);
            }
        }
        Ok(())
    }

    pub fn outstanding(&self) -> usize {
        self.window.len()
    }

    /// Whether every chunk has been handed to `fill` at least once — true at
    /// the tail of a transfer, while the last window is still draining.
    pub fn all_chunks_queued(&self) -> bool {
        self.chunk_index >= self.chunks.len()
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn window_never_exceeds_configured_size() {
        let chunks: Vec<Vec<u8>> = (0..25).map(|i| vec![i as u8; 4]).collect();
        let config = TransferConfig {
            window_size: 10,
            ..TransferConfig::default()
        };
        let mut window = SenderWindow::new(chunks, &config);
        let (mut sender_t, _receiver_t) = FakeTransport::pair(addr(1), addr(2));

        window.fill(&mut sender_t, addr(2)).unwrap();
        assert!(window.outstanding() <= 10);
        assert_eq!(window.outstanding(), 10);
    }

    #[test]
    fn all_chunks_queued_once_chunk_index_reaches_the_end() {
        let chunks: Vec<Vec<u8>> = (0..3).map(|i| vec![i as u8; 4]).collect();
        let config = TransferConfig {
            window_size: 10,
            ..TransferConfig::default()
        };
        let mut window = SenderWindow::new(chunks, &config);
        let (mut sender_t, _receiver_t) = FakeTransport::pair(addr(9), addr(10));

        assert!(!window.all_chunks_queued());
        window.fill(&mut sender_t, addr(10)).unwrap();
        assert!(window.all_chunks_queued());
    }

    #[test]
    fn acking_base_advances_past_consecutive_removed_entries() {
        let chunks: Vec<Vec<u8>> = (0..5).map(|i| vec![i as u8; 4]).collect();
        let config = TransferConfig::default();
        let mut window = SenderWindow::new(chunks, &config);
        let (mut sender_t, mut receiver_t) = FakeTransport::pair(addr(3), addr(4));

        window.fill(&mut sender_t, addr(4)).unwrap();
        // Receiver acks 1, 2, 3 but not yet 4 or 5.
        for seq in [1u32, 2, 3] {
            receiver_t
                .send_to(&codec::encode_ack(seq), addr(3))
                .unwrap();
        }
        let acked = window
            .drain_acks(&mut sender_t, Duration::from_millis(5), Duration::from_millis(20))
            .unwrap();
        assert_eq!(acked, 3);
        assert_eq!(window.base, 4);
    }

    #[test]
    fn exhausted_retries_emit_skip_and_unblock_base() {
        let chunks: Vec<Vec<u8>> = vec![vec![1u8; 4]];
        let config = TransferConfig {
            max_retries: 0,
            timeout: Duration::from_millis(0),
            ..TransferConfig::default()
        };
        let mut window = SenderWindow::new(chunks, &config);
        let (mut sender_t, mut receiver_t) = FakeTransport::pair(addr(5), addr(6));
        window.fill(&mut sender_t, addr(6)).unwrap();

        std::thread::sleep(Duration::from_millis(2));
        window.check_timeouts(&mut sender_t, addr(6)).unwrap();

        assert!(window.lost().contains(&1));
        assert_eq!(window.outstanding(), 0);
        assert_eq!(window.base, 2);

        // Three SKIP copies should have landed in the receiver's inbox.
        let mut skip_count = 0;
        while let Ok((datagram, _)) = receiver_t.recv_from(Duration::from_millis(0)) {
            let (_, payload) = codec::decode(&datagram).unwrap();
            if payload == SKIP_PACKET {
                skip_count += 1;
            }
        }
        assert_eq!(skip_count, 3);
    }

    #[test]
    fn single_timeout_counts_as_one_retransmission() {
        let chunks: Vec<Vec<u8>> = vec![vec![1u8; 4]];
        let config = TransferConfig {
            max_retries: 5,
            timeout: Duration::from_millis(0),
            ..TransferConfig::default()
        };
        let mut window = SenderWindow::new(chunks, &config);
        let (mut sender_t, _receiver_t) = FakeTransport::pair(addr(7), addr(8));
        window.fill(&mut sender_t, addr(8)).unwrap();

        std::thread::sleep(Duration::from_millis(2));
        window.check_timeouts(&mut sender_t, addr(8)).unwrap();

        assert_eq!(window.retransmissions(), 1);
        assert!(window.lost().is_empty());
    }
}
