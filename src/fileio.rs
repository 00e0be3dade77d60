//! File-system collaborator: sequential chunked reads on the sender,
//! sequential positional writes on the receiver, and the MD5 hashing used
//! for the post-transfer report. Each side of the transfer has exactly one
//! real implementation of its access pattern, so these are thin concrete
//! wrappers over `std::fs` rather than a trait boundary — tests exercise
//! them against a real `tempfile` directory instead of faking the
//! filesystem.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use md5::{Digest, Md5};

/// Split `path` into fixed-size chunks of at most `chunk_size` bytes, in
/// read order. Only the final chunk may be shorter. Mirrors the reference's
/// `while chunk := file.read(BUFFER_SIZE)` loop.
pub fn read_chunks(path: &Path, chunk_size: usize) -> io::Result<Vec<Vec<u8>>> {
    let mut file = File::open(path)?;
    let mut chunks = Vec::new();
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = read_full_or_partial(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        chunks.push(buf[..n].to_vec());
        if n < chunk_size {
            break;
        }
    }
    Ok(chunks)
}

/// Read up to `buf.len()` bytes, returning fewer only at EOF (unlike a single
/// `read()` call, which may return short reads mid-stream for other reasons).
fn read_full_or_partial(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

/// Sequential writer over the receiver's output file: payloads are always
/// appended in the order the reassembler hands them over, so no positional
/// seeking is needed.
pub struct SequentialWriter {
    file: File,
}

impl SequentialWriter {
    /// Opens `path` for writing, truncating any existing file. Used at the
    /// start of every transfer: a receiver session always starts from an
    /// empty file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self { file })
    }

    pub fn write_payload(&mut self, payload: &[u8]) -> io::Result<()> {
        self.file.write_all(payload)
    }
}

/// Compute the MD5 digest of a file's contents, read in the same chunk size
/// used for the transfer, matching both reference peers' reporting step.
pub fn md5_file(path: &Path, chunk_size: usize) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn read_chunks_partitions_in_order_only_last_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.bin");
        let data: Vec<u8> = (0..3072u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let chunks = read_chunks(&path, 1450).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1450);
        assert_eq!(chunks[1].len(), 1450);
        assert_eq!(chunks[2].len(), 172);
        let reassembled: Vec<u8> = chunks.into_iter().flatten().collect();
        assert_eq!(reassembled, data);
    }

    #[test]
    fn sequential_writer_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"stale contents that must disappear").unwrap();

        let mut writer = SequentialWriter::create(&path).unwrap();
        writer.write_payload(b"fresh").unwrap();
        drop(writer);

        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
    }

    #[test]
    fn md5_matches_reference_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashed.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"hello world").unwrap();
        drop(f);

        let digest = md5_file(&path, 1450).unwrap();
        assert_eq!(digest, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }
}
