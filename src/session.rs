//! Session control: the filename handshake, the main transfer loop, EOF
//! finalisation, and the sender/receiver state machines.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::codec::{self, Frame};
use crate::config::{TransferConfig, EOF_MAX_ATTEMPTS, HANDSHAKE_MAX_ATTEMPTS};
use crate::error::UrftError;
use crate::fileio::{self, SequentialWriter};
use crate::receiver::{Reassembler, ReceiverEvent};
use crate::report::TransferSummary;
use crate::sender::SenderWindow;
use crate::transport::Datagram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Handshake,
    Streaming,
    Finalising,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    WaitFilename,
    Receiving,
    Done,
}

pub struct SenderSession;

impl SenderSession {
    /// Run a full sender session: handshake, stream the file, finalise.
    pub fn run(
        transport: &mut impl Datagram,
        addr: SocketAddr,
        file_path: &Path,
        config: &TransferConfig,
    ) -> Result<TransferSummary, UrftError> {
        if !file_path.is_file() {
            return Err(UrftError::SourceNotFound(file_path.to_path_buf()));
        }
        let basename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(UrftError::InvalidBasename)?
            .to_string();

        let start = Instant::now();
        let mut state = SenderState::Handshake;
        debug!("sender state -> {state:?}");

        handshake(transport, addr, &basename, config)?;
        state = SenderState::Streaming;
        debug!("sender state -> {state:?}");
        info!("handshake complete, streaming {basename}");

        let chunks = fileio::read_chunks(file_path, config.payload_size)?;
        let total_bytes: u64 = chunks.iter().map(|c| c.len() as u64).sum();
        let mut window = SenderWindow::new(chunks, config);

        while !window.is_done() {
            window.fill(transport, addr)?;
            window.drain_acks(
                transport,
                drain_read_deadline(&window, config),
                Duration::from_millis(100),
            )?;
            window.check_timeouts(transport, addr)?;
            if window.outstanding() == 0 && !window.is_done() {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        state = SenderState::Finalising;
        debug!("sender state -> {state:?}");

        let eof_seq = window.next_seq_after_last_chunk();
        let eof_acked = send_eof(transport, addr, eof_seq, window.lost(), config)?;
        if !eof_acked {
            warn!("EOF never acked after {EOF_MAX_ATTEMPTS} attempts; reporting completion anyway");
        }
        state = SenderState::Done;
        debug!("sender state -> {state:?}");

        let md5 = fileio::md5_file(file_path, config.payload_size)?;
        Ok(TransferSummary {
            filename: basename,
            bytes: total_bytes,
            duration: start.elapsed(),
            md5,
            lost: window.lost().clone(),
            retransmissions: window.retransmissions(),
            duplicates: 0,
            out_of_order: 0,
            packets_received: 0,
        })
    }
}

fn drain_read_deadline(window: &SenderWindow, config: &TransferConfig) -> Duration {
    if window.outstanding() >= config.window_size || window.all_chunks_queued() {
        Duration::from_millis(100)
    } else {
        Duration::from_millis(10)
    }
}

/// Stop-and-wait filename handshake, sender side.
fn handshake(
    transport: &mut impl Datagram,
    addr: SocketAddr,
    basename: &str,
    config: &TransferConfig,
) -> Result<(), UrftError> {
    let datagram = codec::encode(0, basename.as_bytes());
    for attempt in 1..=HANDSHAKE_MAX_ATTEMPTS {
        transport.send_to(&datagram, addr)?;
        match transport.recv_from(config.timeout) {
            Ok((reply, _from)) => {
                if let Some((seq, _payload)) = codec::decode(&reply) {
                    if seq == 0 {
                        return Ok(());
                    }
                }
            }
            Err(e) if is_timeout(&e) => {
                warn!("filename handshake attempt {attempt}/{HANDSHAKE_MAX_ATTEMPTS} timed out");
            }
            Err(e) => return Err(UrftError::Socket(e)),
        }
    }
    Err(UrftError::HandshakeFailed(HANDSHAKE_MAX_ATTEMPTS))
}

/// Compose and send the EOF datagram, retrying up to `EOF_MAX_ATTEMPTS`
/// times. Returns whether it was acked (the session reports completion
/// regardless).
fn send_eof(
    transport: &mut impl Datagram,
    addr: SocketAddr,
    eof_seq: u32,
    lost: &BTreeSet<u32>,
    config: &TransferConfig,
) -> Result<bool, UrftError> {
    let body = format!("EOF:{}", codec::format_skip_list(lost));
    let datagram = codec::encode(eof_seq, body.as_bytes());
    for _ in 0..EOF_MAX_ATTEMPTS {
        transport.send_to(&datagram, addr)?;
        match transport.recv_from(config.timeout) {
            Ok((reply, _from)) => {
                if let Some((seq, _payload)) = codec::decode(&reply) {
                    if seq == eof_seq {
                        return Ok(true);
                    }
                }
            }
            Err(e) if is_timeout(&e) => continue,
            Err(e) => return Err(UrftError::Socket(e)),
        }
    }
    Ok(false)
}

pub struct ReceiverSession;

impl ReceiverSession {
    /// Run a full receiver session: wait for the filename handshake, then
    /// reassemble until EOF. Exits after exactly one transfer — no outer
    /// accept loop for multiple files.
    pub fn run(
        transport: &mut impl Datagram,
        working_dir: &Path,
        config: &TransferConfig,
    ) -> Result<TransferSummary, UrftError> {
        let mut state = ReceiverState::WaitFilename;
        debug!("receiver state -> {state:?}");
        let start = Instant::now();

        let (basename, peer, output_path) = loop {
            match transport.recv_from(config.timeout) {
                Ok((datagram, from)) => {
                    if let Some((seq, payload)) = codec::decode(&datagram) {
                        if let Frame::Filename(name) = codec::classify(seq, payload) {
                            let basename = String::from_utf8_lossy(name).trim().to_string();
                            if basename.is_empty()
                                || basename.contains('/')
                                || basename.contains('\0')
                            {
                                return Err(UrftError::InvalidBasename);
                            }
                            let ack = codec::encode_ack(0);
                            for _ in 0..3 {
                                transport.send_to(&ack, from)?;
                            }
                            let output_path = working_dir.join(&basename);
                            break (basename, from, output_path);
                        }
                    }
                }
                Err(e) if is_timeout(&e) => continue,
                Err(e) => return Err(UrftError::Socket(e)),
            }
        };
        state = ReceiverState::Receiving;
        debug!("receiver state -> {state:?}");
        info!("receiving '{basename}' from {peer}");

        let mut writer =
            SequentialWriter::create(&output_path).map_err(UrftError::OutputOpenFailed)?;
        let mut reassembler = Reassembler::new();

        let final_skipped = loop {
            match transport.recv_from(config.timeout) {
                Ok((datagram, from)) => {
                    if let Some((seq, payload)) = codec::decode(&datagram) {
                        match reassembler.on_datagram(seq, payload, &mut writer, transport, from)? {
                            ReceiverEvent::Continue => {}
                            ReceiverEvent::Done(skipped) => break skipped,
                        }
                    }
                }
                Err(e) if is_timeout(&e) => {
                    if reassembler.last_activity.elapsed() > config.inactivity_timeout {
                        reassembler.probe_inactivity(transport, peer)?;
                    }
                }
                Err(e) => return Err(UrftError::Socket(e)),
            }
        };
        state = ReceiverState::Done;
        debug!("receiver state -> {state:?}");

        drop(writer);
        let md5 = fileio::md5_file(&output_path, config.payload_size)?;
        Ok(TransferSummary {
            filename: basename,
            bytes: reassembler.counters.received_bytes,
            duration: start.elapsed(),
            md5,
            lost: final_skipped,
            retransmissions: 0,
            duplicates: reassembler.counters.duplicates,
            out_of_order: reassembler.counters.out_of_order,
            packets_received: reassembler.counters.packets_received,
        })
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
    use std::sync::mpsc;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn lossless_small_file_round_trips_and_hashes_match() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("payload.bin");
        let data: Vec<u8> = (0..3072u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src_path, &data).unwrap();

        let recv_dir = tempfile::tempdir().unwrap();
        let config = TransferConfig::default();

        let (mut sender_t, mut receiver_t) = FakeTransport::pair(addr(100), addr(101));
        let peer_addr = addr(101);

        let (tx, rx) = mpsc::channel();
        let recv_dir_path = recv_dir.path().to_path_buf();
        let recv_config = config.clone();
        let handle = std::thread::spawn(move || {
            let summary = ReceiverSession::run(&mut receiver_t, &recv_dir_path, &recv_config);
            tx.send(summary).unwrap();
        });

        let summary = SenderSession::run(&mut sender_t, peer_addr, &src_path, &config).unwrap();
        assert!(summary.lost.is_empty());

        let recv_summary = rx.recv().unwrap().unwrap();
        handle.join().unwrap();

        assert_eq!(recv_summary.md5, summary.md5);
        let written = std::fs::read(recv_dir.path().join("payload.bin")).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn sender_reports_missing_source_file() {
        let config = TransferConfig::default();
        let (mut sender_t, _receiver_t) = FakeTransport::pair(addr(102), addr(103));
        let err = SenderSession::run(
            &mut sender_t,
            addr(103),
            Path::new("/nonexistent/path/does-not-exist.bin"),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, UrftError::SourceNotFound(_)));
    }
}
