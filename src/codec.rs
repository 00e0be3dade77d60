//! Wire framing: `[seq: u32 big-endian][payload: bytes]`.
//!
//! There are no checksums, lengths, or version fields on the wire — the
//! datagram length itself is the framing. Classification of a decoded
//! payload into one of the protocol's four shapes is done once, here, and
//! callers match on the resulting `Frame` instead of re-testing byte
//! patterns at each site.

pub const HEADER_SIZE: usize = 4;
pub const SKIP_PACKET: &[u8] = b"SKIP_PACKET";
pub const EOF_PREFIX: &[u8] = b"EOF:";

/// Classified shape of a decoded payload.
///
/// EOF detection is a prefix match at offset 0, not a substring scan — a
/// looser substring check would misclassify any data chunk that happens to
/// contain `EOF:` partway through. A data chunk must not itself begin with
/// `EOF:` to round-trip unambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Filename(&'a [u8]),
    Data(&'a [u8]),
    Skip,
    Eof(&'a [u8]),
}

/// Encode a full datagram: sequence number followed by payload verbatim.
pub fn encode(seq: u32, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(HEADER_SIZE + payload.len());
    datagram.extend_from_slice(&seq.to_be_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// Encode a bare ack: the 4-byte sequence number, no payload.
pub fn encode_ack(seq: u32) -> [u8; HEADER_SIZE] {
    seq.to_be_bytes()
}

/// Split a received datagram into `(seq, payload)`. `None` if shorter than
/// the header — malformed datagrams are noise, dropped silently by callers.
pub fn decode(datagram: &[u8]) -> Option<(u32, &[u8])> {
    if datagram.len() < HEADER_SIZE {
        return None;
    }
    let seq = u32::from_be_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
    Some((seq, &datagram[HEADER_SIZE..]))
}

/// Classify a decoded `(seq, payload)` pair. Order matters: SKIP and EOF
/// must be checked before a bare sequence-0 payload is read as a filename.
pub fn classify(seq: u32, payload: &[u8]) -> Frame<'_> {
    if payload == SKIP_PACKET {
        Frame::Skip
    } else if payload.starts_with(EOF_PREFIX) {
        Frame::Eof(&payload[EOF_PREFIX.len()..])
    } else if seq == 0 {
        Frame::Filename(payload)
    } else {
        Frame::Data(payload)
    }
}

/// Render the sender's lost-sequence list into an `EOF:` payload body.
pub fn format_skip_list(lost: &std::collections::BTreeSet<u32>) -> String {
    if lost.is_empty() {
        "NONE".to_string()
    } else {
        lost.iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parse the body of an `EOF:` payload into a set of skipped sequences.
/// `NONE` and an empty body both mean "no skipped sequences". Non-numeric
/// entries are ignored rather than rejected outright, matching the
/// reference's tolerant `int(...)` parse-per-entry behaviour.
pub fn parse_skip_list(body: &[u8]) -> std::collections::BTreeSet<u32> {
    let body = String::from_utf8_lossy(body);
    let body = body.trim();
    let mut set = std::collections::BTreeSet::new();
    if body.is_empty() || body == "NONE" {
        return set;
    }
    for entry in body.split(',') {
        if let Ok(seq) = entry.trim().parse::<u32>() {
            set.insert(seq);
        }
    }
    set
}
