/// SHA-1 hashing of archive artifacts, per §6 "SHA-1 of the final container
/// bytes is always computed".
use sha1::{Digest, Sha1};
use std::io::{self, Read, Write};

/// A `Write` adapter that tees every byte written through it into a running
/// SHA-1 digest, so the container's hash is available the moment the sink
/// is closed with no post-hoc re-read needed.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha1,
    bytes_written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consumes the writer, returning the inner sink and the lowercase hex
    /// digest of everything written through it.
    pub fn finish(self) -> (W, String) {
        let digest = self.hasher.finalize();
        (self.inner, to_hex(&digest))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").unwrap();
    }
    s
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// SHA-1 of an in-memory buffer — used when the final artifact (e.g. the
/// encrypted `.p7b` envelope) only exists as bytes already held in memory.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    to_hex(&hasher.finalize())
}

/// Post-hoc SHA-1 of an already-written file — used when the sink chain
/// wasn't hashing inline (e.g. a sink provided by the caller).
pub fn hash_file(path: &std::path::Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_writer_matches_direct_digest() {
        let mut out = Vec::new();
        {
            let mut hw = HashingWriter::new(&mut out);
            hw.write_all(b"hello world").unwrap();
            let (_, digest) = hw.finish();
            let mut expected = Sha1::new();
            expected.update(b"hello world");
            assert_eq!(digest, to_hex(&expected.finalize()));
        }
        assert_eq!(out, b"hello world");
    }
}
