//! Out-of-order reassembly. Acks every packet individually (not cumulative)
//! since the sender's window state is keyed by individual sequences, and
//! triple-acks significant packets (the expected one, SKIP, EOF) as defence
//! against ack loss on a symmetric lossy channel.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::Instant;

use log::{debug, warn};

use crate::codec::{self, Frame};
use crate::fileio::SequentialWriter;
use crate::transport::Datagram;

#[derive(Debug, PartialEq, Eq)]
pub enum ReceiverEvent {
    Continue,
    /// EOF observed; carries the full skip list (receiver's own plus the
    /// sender's piggybacked list).
    Done(BTreeSet<u32>),
}

#[derive(Default)]
pub struct Counters {
    pub duplicates: u64,
    pub out_of_order: u64,
    pub packets_received: u64,
    pub received_bytes: u64,
}

/// Receiver-side reassembly state: `expected` is the next sequence to
/// deliver to disk, `buffer` holds out-of-order arrivals, `skipped` holds
/// sequences the sender has declared undeliverable.
pub struct Reassembler {
    expected: u32,
    buffer: BTreeMap<u32, Vec<u8>>,
    skipped: BTreeSet<u32>,
    pub counters: Counters,
    pub last_activity: Instant,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            expected: 1,
            buffer: BTreeMap::new(),
            skipped: BTreeSet::new(),
            counters: Counters::default(),
            last_activity: Instant::now(),
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Process one received datagram. Acks first, unconditionally, then
    /// branches on its classified shape.
    pub fn on_datagram(
        &mut self,
        seq: u32,
        payload: &[u8],
        writer: &mut SequentialWriter,
        transport: &mut impl Datagram,
        peer: SocketAddr,
    ) -> std::io::Result<ReceiverEvent> {
        self.last_activity = Instant::now();
        self.counters.packets_received += 1;

        let frame = codec::classify(seq, payload);
        let important = seq == self.expected || matches!(frame, Frame::Eof(_) | Frame::Skip);
        self.ack(transport, peer, seq, important)?;

        match frame {
            Frame::Skip => {
                self.skipped.insert(seq);
                if seq == self.expected {
                    self.advance_past_skip_and_buffer(writer)?;
                }
                Ok(ReceiverEvent::Continue)
            }
            Frame::Eof(body) => {
                let senders_list = codec::parse_skip_list(body);
                self.skipped.extend(senders_list.iter().copied());
                Ok(ReceiverEvent::Done(self.skipped.clone()))
            }
            Frame::Filename(_) => {
                // Only relevant during the handshake, handled by Session.
                Ok(ReceiverEvent::Continue)
            }
            Frame::Data(data) => {
                if seq < self.expected || self.skipped.contains(&seq) {
                    self.counters.duplicates += 1;
                    return Ok(ReceiverEvent::Continue);
                }
                if seq == self.expected {
                    writer.write_payload(data)?;
                    self.counters.received_bytes += data.len() as u64;
                    self.expected += 1;
                    self.advance_past_skip_and_buffer(writer)?;
                } else {
                    self.counters.out_of_order += 1;
                    if !self.buffer.contains_key(&seq) && !self.skipped.contains(&seq) {
                        self.buffer.insert(seq, data.to_vec());
                    }
                }
                Ok(ReceiverEvent::Continue)
            }
        }
    }

    /// Drain consecutive buffered payloads, then skip past any members of
    /// `skipped` adjoining the new `expected`. Used after both "SKIP at
    /// expected" and "in-order write".
    fn advance_past_skip_and_buffer(&mut self, writer: &mut SequentialWriter) -> std::io::Result<()> {
        loop {
            let mut progressed = false;
            while let Some(data) = self.buffer.remove(&self.expected) {
                writer.write_payload(&data)?;
                self.counters.received_bytes += data.len() as u64;
                self.expected += 1;
                progressed = true;
            }
            while self.skipped.contains(&self.expected) {
                self.expected += 1;
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        Ok(())
    }

    fn ack(
        &self,
        transport: &mut impl Datagram,
        peer: SocketAddr,
        seq: u32,
        important: bool,
    ) -> std::io::Result<()> {
        let ack = codec::encode_ack(seq);
        let count = if important { 3 } else { 1 };
        for _ in 0..count {
            transport.send_to(&ack, peer)?;
        }
        debug!("acked seq={seq} important={important}");
        Ok(())
    }

    /// Inactivity watchdog probe: re-emit an ack for `expected - 1` to
    /// unstick a sender that may have missed every ack so far.
    pub fn probe_inactivity(
        &mut self,
        transport: &mut impl Datagram,
        peer: SocketAddr,
    ) -> std::io::Result<()> {
        if self.expected > 1 {
            warn!("inactivity timeout, probing with ack for seq={}", self.expected - 1);
            transport.send_to(&codec::encode_ack(self.expected - 1), peer)?;
        }
        self.last_activity = Instant::now();
        Ok(())
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
