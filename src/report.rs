use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Post-transfer summary, printed by both binaries. Not itself part of the
/// wire protocol (no integrity guarantee rides on it), but both sides print
/// one and operators rely on it to compare checksums.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub filename: String,
    pub bytes: u64,
    pub duration: Duration,
    pub md5: String,
    pub lost: BTreeSet<u32>,
    pub retransmissions: u64,
    pub duplicates: u64,
    pub out_of_order: u64,
    pub packets_received: u64,
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kib = self.bytes as f64 / 1024.0;
        let secs = self.duration.as_secs_f64();
        let speed = if secs > 0.0 { kib / secs } else { 0.0 };
        writeln!(f, "Transfer summary for '{}'", self.filename)?;
        writeln!(f, "  MD5: {}", self.md5)?;
        writeln!(
            f,
            "  {:.2} KiB in {:.2}s ({:.2} KiB/s)",
            kib, secs, speed
        )?;
        if self.retransmissions > 0 {
            writeln!(f, "  retransmissions: {}", self.retransmissions)?;
        }
        if self.duplicates > 0 {
            writeln!(f, "  duplicates: {}", self.duplicates)?;
        }
        if self.out_of_order > 0 {
            writeln!(f, "  out-of-order: {}", self.out_of_order)?;
        }
        if !self.lost.is_empty() {
            let list = self
                .lost
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            writeln!(f, "  lost sequences ({}): {}", self.lost.len(), list)?;
        }
        Ok(())
    }
}
