/// Forks every write to N downstream sinks, used for the "tee clear-text"
/// mode mentioned in §4.7 prose: one branch feeds the encryption pipeline,
/// the other writes the same plaintext bytes to an unencrypted file for
/// side-by-side inspection. Grounded on `TeeStream` in the original
/// implementation, which held a vector of streams and forwarded every
/// `Write` call to each in turn.
use std::io::{self, Write};

pub struct TeeWriter<W> {
    sinks: Vec<W>,
}

impl<W: Write> TeeWriter<W> {
    pub fn new(sinks: Vec<W>) -> Self {
        Self { sinks }
    }

    pub fn into_sinks(self) -> Vec<W> {
        self.sinks
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forks_every_write_to_all_sinks() {
        let mut tee = TeeWriter::new(vec![Vec::new(), Vec::new(), Vec::new()]);
        tee.write_all(b"hello").unwrap();
        tee.write_all(b" world").unwrap();

        for sink in tee.into_sinks() {
            assert_eq!(sink, b"hello world");
        }
    }

    #[test]
    fn empty_sink_list_is_a_harmless_no_op() {
        let mut tee: TeeWriter<Vec<u8>> = TeeWriter::new(Vec::new());
        assert_eq!(tee.write(b"anything").unwrap(), 8);
    }
}
