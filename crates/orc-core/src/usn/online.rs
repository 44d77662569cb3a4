/// Online USN enumeration via repeated `FSCTL_ENUM_USN_DATA` calls,
/// grounded on the teacher's `scanner::mft::scan_mft` volume-open and
/// buffer-parsing pattern, generalized into a streaming callback API with
/// FRN-keyed name resolution and periodic memory-pressure flushing, per
/// §4.6 "Online enumerate".
use super::record::{parse_usn_record_v2, UsnRecord};
use crate::error::{OrcError, Result};
use crate::mft::Frn;
use compact_str::CompactString;
use std::collections::HashMap;

/// How often (in records processed) the accumulator drops non-directory
/// entries from its name-resolution store to bound memory on volumes with
/// many small files.
const FLUSH_INTERVAL: u64 = 500_000;

/// Minimal surface this module needs from a live volume handle — kept
/// separate from [`crate::volume::VolumeReader`] because `FSCTL_ENUM_USN_DATA`
/// is a raw `DeviceIoControl` call, not a byte-range read.
pub trait UsnEnumSource {
    /// Issue one `FSCTL_ENUM_USN_DATA` call starting at `start_frn`, filling
    /// `out_buf` and returning the number of bytes written, or `None` at
    /// end-of-data.
    fn enum_usn_data(&mut self, start_frn: u64, out_buf: &mut [u8]) -> Result<Option<u32>>;
}

/// Accumulates `(frn -> (parent_frn, name, is_directory))` so that by the
/// time a record's parent is needed for path synthesis, it is likely
/// already known; retains directory entries indefinitely and flushes file
/// entries periodically, per §4.6.
#[derive(Default)]
struct NameStore {
    entries: HashMap<Frn, (Frn, CompactString, bool)>,
}

impl NameStore {
    fn insert(&mut self, frn: Frn, parent: Frn, name: CompactString, is_dir: bool) {
        self.entries.insert(frn, (parent, name, is_dir));
    }

    fn flush_non_directories(&mut self) {
        self.entries.retain(|_, (_, _, is_dir)| *is_dir);
    }

    fn synthesize_path(&self, frn: Frn, name: &str) -> String {
        let mut segments = vec![name.to_string()];
        let mut current = frn;
        let mut depth = 0usize;
        loop {
            if current.is_root() || depth > 1024 {
                break;
            }
            match self.entries.get(&current) {
                Some((parent, seg_name, _)) => {
                    segments.push(seg_name.to_string());
                    current = *parent;
                    depth += 1;
                }
                None => {
                    segments.push(current.placeholder_segment());
                    break;
                }
            }
        }
        segments.reverse();
        format!("\\\\.\\{}", segments.join("\\"))
    }
}

/// Drives the `FSCTL_ENUM_USN_DATA` loop against `source`, starting at FRN 0
/// and proceeding contiguously, emitting each record to `sink` with a
/// best-effort synthesized path.
///
/// When a record's parent name is not yet known, the emitted path carries
/// the synthetic `__<hex-frn>__\` placeholder; consumers are expected to
/// treat identical `(usn, frn)` pairs as idempotent if re-emitted later
/// with a resolved name (§4.6 "Name synthesis") — this function performs a
/// single forward pass and does not re-emit.
pub fn enumerate(source: &mut dyn UsnEnumSource, mut sink: impl FnMut(&UsnRecord, &str)) -> Result<u64> {
    let mut buf = vec![0u8; 256 * 1024];
    let mut start_frn = 0u64;
    let mut names = NameStore::default();
    let mut processed = 0u64;

    loop {
        let bytes_returned = match source.enum_usn_data(start_frn, &mut buf)? {
            Some(n) if n > 8 => n as usize,
            _ => break,
        };

        let next_start = u64::from_le_bytes(buf[0..8].try_into().map_err(|_| OrcError::Config {
            reason: "USN enum buffer shorter than next-start header".into(),
        })?);

        let mut offset = 8usize;
        while offset < bytes_returned {
            let Some((record, len)) = parse_usn_record_v2(&buf[offset..bytes_returned]) else {
                break;
            };

            let path = names.synthesize_path(record.parent_frn, &record.file_name);
            names.insert(record.frn, record.parent_frn, record.file_name.clone(), record.is_directory());
            sink(&record, &path);

            processed += 1;
            if processed % FLUSH_INTERVAL == 0 {
                names.flush_non_directories();
            }

            offset += len;
        }

        if next_start <= start_frn {
            break;
        }
        start_frn = next_start;
    }

    Ok(processed)
}
