/// Offline parser for a captured `$UsnJrnl:$J` data stream: logically
/// sparse, so leading zero runs between records must be skipped and the
/// parser re-aligns on USN-record headers at chunk boundaries, per §4.6
/// "Offline read $UsnJrnl:$J".
use super::record::{parse_usn_record_v2, UsnRecord};
use crate::error::{OrcError, Result};

/// Read chunk size; large enough to hold several typical USN records so a
/// record is unlikely to need more than one rewind.
const CHUNK_SIZE: usize = 64 * 1024;
/// Generous upper bound on a single record's length, used to rewind across
/// a chunk boundary without re-scanning the whole buffer.
const MAX_PLAUSIBLE_RECORD_LEN: usize = 4096;

/// Scans `stream_bytes` (the entire captured `$J` stream) for USN records,
/// skipping sparse zero runs and invoking `on_record` for every one found.
///
/// Fails with [`OrcError::InvalidUsnHeader`] only when a plausible record
/// header's `MajorVersion` byte is outside `{2, 3}` — all other malformed
/// candidates are skipped forward to the next plausible header rather than
/// aborting the parse.
pub fn parse_offline_stream(
    stream_bytes: &[u8],
    mut on_record: impl FnMut(&UsnRecord),
) -> Result<OfflineParseSummary> {
    let mut pos = 0usize;
    let mut records_found = 0u64;
    let mut bytes_skipped = 0u64;
    let len = stream_bytes.len();

    while pos + 60 <= len {
        // Skip sparse zero runs: a 4-byte RecordLength of 0 cannot start a
        // record, so advance one word at a time looking for a non-zero
        // candidate length.
        let candidate_len =
            u32::from_le_bytes(stream_bytes[pos..pos + 4].try_into().unwrap()) as usize;
        if candidate_len == 0 {
            pos += 8; // USN records are 8-byte aligned
            bytes_skipped += 8;
            continue;
        }

        if candidate_len < 60 || candidate_len > MAX_PLAUSIBLE_RECORD_LEN || pos + candidate_len > len {
            pos += 8;
            bytes_skipped += 8;
            continue;
        }

        let major_version = u16::from_le_bytes(stream_bytes[pos + 4..pos + 6].try_into().unwrap());
        if major_version != 2 && major_version != 3 {
            // A non-zero, plausible-length field whose version byte is
            // outside {2, 3} is a genuine header violation once it passes
            // the length/bounds plausibility check above.
            return Err(OrcError::InvalidUsnHeader { major_version });
        }

        match parse_usn_record_v2(&stream_bytes[pos..pos + candidate_len]) {
            Some((record, consumed)) => {
                on_record(&record);
                records_found += 1;
                pos += consumed.max(8);
            }
            None => {
                pos += 8;
                bytes_skipped += 8;
            }
        }
    }

    Ok(OfflineParseSummary {
        records_found,
        bytes_skipped,
    })
}

/// Parses `stream_bytes` incrementally across externally-supplied chunks,
/// keeping a carry-over buffer so a record split across a chunk boundary is
/// rewound by up to one record length rather than lost, per §4.6.
pub struct ChunkedOfflineParser {
    carry: Vec<u8>,
}

impl Default for ChunkedOfflineParser {
    fn default() -> Self {
        Self { carry: Vec::new() }
    }
}

impl ChunkedOfflineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the stream. Parses everything it safely can
    /// and retains up to `MAX_PLAUSIBLE_RECORD_LEN` trailing bytes as carry
    /// for the next call, so a record split across the boundary is not
    /// treated as corrupt.
    pub fn feed(&mut self, chunk: &[u8], mut on_record: impl FnMut(&UsnRecord)) -> Result<OfflineParseSummary> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);

        let safe_len = buf.len().saturating_sub(MAX_PLAUSIBLE_RECORD_LEN);
        let summary = parse_offline_stream(&buf[..safe_len], &mut on_record)?;

        self.carry = buf[safe_len..].to_vec();
        Ok(summary)
    }

    /// Flush any carried bytes at end-of-stream.
    pub fn finish(mut self, mut on_record: impl FnMut(&UsnRecord)) -> Result<OfflineParseSummary> {
        parse_offline_stream(&std::mem::take(&mut self.carry), &mut on_record)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineParseSummary {
    pub records_found: u64,
    pub bytes_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_record(name: &str) -> Vec<u8> {
        let name_utf16: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let record_len = 60 + name_utf16.len();
        // Pad so records stay a multiple of 8 bytes, mirroring on-disk layout.
        let pad = (8 - record_len % 8) % 8;
        let mut b = vec![0u8; record_len + pad];
        b[0..4].copy_from_slice(&(record_len as u32).to_le_bytes());
        b[4..6].copy_from_slice(&2u16.to_le_bytes());
        b[8..16].copy_from_slice(&7u64.to_le_bytes());
        b[16..24].copy_from_slice(&5u64.to_le_bytes());
        b[56..58].copy_from_slice(&(name_utf16.len() as u16).to_le_bytes());
        b[58..60].copy_from_slice(&60u16.to_le_bytes());
        b[60..60 + name_utf16.len()].copy_from_slice(&name_utf16);
        b
    }

    #[test]
    fn skips_leading_sparse_zero_run() {
        let mut stream = vec![0u8; 256];
        let rec = build_record("a.txt");
        stream.extend(rec);
        let mut found = Vec::new();
        let summary = parse_offline_stream(&stream, |r| found.push(r.file_name.to_string())).unwrap();
        assert_eq!(found, vec!["a.txt".to_string()]);
        assert!(summary.bytes_skipped >= 256);
    }

    #[test]
    fn rejects_bad_version_on_plausible_header() {
        let mut rec = build_record("a.txt");
        rec[4..6].copy_from_slice(&9u16.to_le_bytes());
        let err = parse_offline_stream(&rec, |_| {}).unwrap_err();
        assert!(matches!(err, OrcError::InvalidUsnHeader { major_version: 9 }));
    }

    #[test]
    fn chunked_parser_handles_record_split_across_boundary() {
        let rec = build_record("split.txt");
        let mut stream = vec![0u8; 64];
        stream.extend(&rec);

        let mut parser = ChunkedOfflineParser::new();
        let mut found = Vec::new();
        // Split right in the middle of the record.
        let split_at = 64 + rec.len() / 2;
        let (first, second) = stream.split_at(split_at);
        parser.feed(first, |r| found.push(r.file_name.to_string())).unwrap();
        parser.feed(second, |r| found.push(r.file_name.to_string())).unwrap();
        parser.finish(|r| found.push(r.file_name.to_string())).unwrap();

        assert!(found.contains(&"split.txt".to_string()));
    }
}
