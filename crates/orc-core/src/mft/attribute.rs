/// Reassembles the per-record attribute stream of a base MFT record into a
/// single logical view, following `$ATTRIBUTE_LIST` entries into
/// continuation records.
use crate::error::{OrcError, Result};
use crate::mft::frn::Frn;
use crate::mft::record::MftRecord;
use compact_str::CompactString;

/// NTFS attribute type codes of interest (§3 "MFT record").
// Field-less variants share this enum with `Other(u32)`, so the type codes
// below live only in `type_code()`/`from_type_code()` — a data-bearing
// variant can't coexist with explicit discriminants without a `#[repr]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKind {
    StandardInformation,
    AttributeList,
    FileName,
    Data,
    IndexRoot,
    IndexAllocation,
    Ea,
    EaInformation,
    ReparsePoint,
    SecurityDescriptor,
    Other(u32),
}

impl AttributeKind {
    fn from_type_code(code: u32) -> Self {
        match code {
            0x10 => Self::StandardInformation,
            0x20 => Self::AttributeList,
            0x30 => Self::FileName,
            0x80 => Self::Data,
            0x90 => Self::IndexRoot,
            0xA0 => Self::IndexAllocation,
            0xD0 => Self::EaInformation,
            0xE0 => Self::Ea,
            0xC0 => Self::ReparsePoint,
            0x50 => Self::SecurityDescriptor,
            other => Self::Other(other),
        }
    }

    pub fn type_code(self) -> u32 {
        match self {
            Self::StandardInformation => 0x10,
            Self::AttributeList => 0x20,
            Self::FileName => 0x30,
            Self::Data => 0x80,
            Self::IndexRoot => 0x90,
            Self::IndexAllocation => 0xA0,
            Self::EaInformation => 0xD0,
            Self::Ea => 0xE0,
            Self::ReparsePoint => 0xC0,
            Self::SecurityDescriptor => 0x50,
            Self::Other(code) => code,
        }
    }
}

/// `(vcn_start, vcn_end, lcn_start)` — one contiguous run of clusters
/// backing part of a non-resident attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub vcn_start: i64,
    pub vcn_end: i64,
    pub lcn_start: i64,
}

impl Run {
    pub fn len_clusters(&self) -> i64 {
        self.vcn_end - self.vcn_start + 1
    }
}

/// Resident (inline bytes) or non-resident (run list) attribute body.
#[derive(Clone, Debug)]
pub enum AttributeForm {
    Resident(Vec<u8>),
    NonResident { runs: Vec<Run>, real_size: u64 },
}

/// One namespace a `$FILE_NAME` attribute can carry — a record may hold
/// several due to hard links plus an 8.3 alias (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileNameNamespace {
    Posix,
    Win32,
    Dos83,
    Win32AndDos83,
}

impl FileNameNamespace {
    fn from_flag(flag: u8) -> Self {
        match flag {
            0 => Self::Posix,
            1 => Self::Win32,
            2 => Self::Dos83,
            _ => Self::Win32AndDos83,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FileNameAttribute {
    pub parent: Frn,
    pub name: CompactString,
    pub namespace: FileNameNamespace,
    pub logical_size: u64,
    pub physical_size: u64,
}

/// One fully-reassembled logical attribute: kind, optional name (for named
/// `$DATA` / ADS streams), form, and the record flags observed on its
/// originating instance.
#[derive(Clone, Debug)]
pub struct AttributeEntry {
    pub kind: AttributeKind,
    pub name: CompactString,
    pub instance: u16,
    pub form: AttributeForm,
}

impl AttributeEntry {
    pub fn is_default_data_stream(&self) -> bool {
        matches!(self.kind, AttributeKind::Data) && self.name.is_empty()
    }
}

/// The reassembled view of a base record's attribute stream, per §4.3.
#[derive(Clone, Debug, Default)]
pub struct LogicalAttributes {
    pub entries: Vec<AttributeEntry>,
    pub file_names: Vec<FileNameAttribute>,
}

/// Parses a single record's raw attribute stream (no `$ATTRIBUTE_LIST`
/// following — that is the caller's job) into a flat list of entries.
fn parse_attribute_stream(record: &MftRecord) -> Result<Vec<(AttributeEntry, Option<FileNameAttribute>)>> {
    let bytes = &record.bytes;
    let mut offset = record.header.first_attribute_offset as usize;
    let mut out = Vec::new();

    loop {
        if offset + 4 > bytes.len() {
            break;
        }
        let type_code = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        if type_code == 0xFFFF_FFFF {
            break; // end-of-attributes marker
        }
        if offset + 16 > bytes.len() {
            break;
        }
        let attr_len = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap()) as usize;
        if attr_len == 0 || offset + attr_len > bytes.len() {
            break;
        }
        let non_resident = bytes[offset + 8];
        let name_len = bytes[offset + 9] as usize;
        let name_offset = u16::from_le_bytes(bytes[offset + 10..offset + 12].try_into().unwrap()) as usize;
        let instance = u16::from_le_bytes(bytes[offset + 14..offset + 16].try_into().unwrap());

        let name = if name_len > 0 && offset + name_offset + name_len * 2 <= bytes.len() {
            decode_utf16_name(&bytes[offset + name_offset..offset + name_offset + name_len * 2])
        } else {
            CompactString::new("")
        };

        let kind = AttributeKind::from_type_code(type_code);

        let (form, file_name) = if non_resident == 0 {
            let content_size =
                u32::from_le_bytes(bytes[offset + 16..offset + 20].try_into().unwrap()) as usize;
            let content_offset =
                u16::from_le_bytes(bytes[offset + 20..offset + 22].try_into().unwrap()) as usize;
            let body = if offset + content_offset + content_size <= bytes.len() {
                bytes[offset + content_offset..offset + content_offset + content_size].to_vec()
            } else {
                Vec::new()
            };
            let file_name = if matches!(kind, AttributeKind::FileName) {
                parse_file_name_body(&body)
            } else {
                None
            };
            (AttributeForm::Resident(body), file_name)
        } else {
            let lowest_vcn = i64::from_le_bytes(bytes[offset + 16..offset + 24].try_into().unwrap());
            let highest_vcn = i64::from_le_bytes(bytes[offset + 24..offset + 32].try_into().unwrap());
            let run_list_offset =
                u16::from_le_bytes(bytes[offset + 32..offset + 34].try_into().unwrap()) as usize;
            let real_size = if offset + 48 + 8 <= bytes.len() {
                u64::from_le_bytes(bytes[offset + 48..offset + 56].try_into().unwrap())
            } else {
                0
            };
            let run_list_start = offset + run_list_offset;
            let run_list_end = offset + attr_len;
            let runs = if run_list_start < run_list_end && run_list_end <= bytes.len() {
                decode_run_list(&bytes[run_list_start..run_list_end], lowest_vcn, highest_vcn)
            } else {
                Vec::new()
            };
            (AttributeForm::NonResident { runs, real_size }, None)
        };

        out.push((
            AttributeEntry {
                kind,
                name,
                instance,
                form,
            },
            file_name,
        ));

        offset += attr_len;
    }

    Ok(out)
}

fn decode_utf16_name(bytes: &[u8]) -> CompactString {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    CompactString::from(String::from_utf16_lossy(&units))
}

fn parse_file_name_body(body: &[u8]) -> Option<FileNameAttribute> {
    if body.len() < 66 {
        return None;
    }
    let parent_raw = u64::from_le_bytes(body[0..8].try_into().unwrap());
    let logical_size = u64::from_le_bytes(body[40..48].try_into().unwrap());
    let physical_size = u64::from_le_bytes(body[48..56].try_into().unwrap());
    let name_len = body[64] as usize;
    let namespace = FileNameNamespace::from_flag(body[65]);
    let name_bytes_start = 66;
    let name_bytes_end = name_bytes_start + name_len * 2;
    if name_bytes_end > body.len() {
        return None;
    }
    let name = decode_utf16_name(&body[name_bytes_start..name_bytes_end]);
    Some(FileNameAttribute {
        parent: Frn(parent_raw),
        name,
        namespace,
        logical_size,
        physical_size,
    })
}

/// Extracts the `SecurityId` field from a resident `$STANDARD_INFORMATION`
/// body (NTFS 3.0+ layout, which adds `owner_id`/`security_id`/`quota_charged`/
/// `usn` after the base v1.2 fields). Pre-3.0 volumes carry no such field.
pub fn standard_information_security_id(body: &[u8]) -> Option<u32> {
    const SECURITY_ID_OFFSET: usize = 52;
    if body.len() < SECURITY_ID_OFFSET + 4 {
        return None;
    }
    Some(u32::from_le_bytes(
        body[SECURITY_ID_OFFSET..SECURITY_ID_OFFSET + 4].try_into().unwrap(),
    ))
}

/// Parses a resident `$INDEX_ROOT` body for its embedded `$FILE_NAME` index
/// entries (the `$I30` directory index), stopping at the node's last-entry
/// marker. Directories large enough to spill into non-resident
/// `$INDEX_ALLOCATION` nodes keep most of their entries there instead; this
/// only covers what is resident in `$INDEX_ROOT` itself.
pub fn parse_index_root_entries(body: &[u8]) -> Vec<FileNameAttribute> {
    const INDEX_ROOT_HEADER_LEN: usize = 16;
    const INDEX_HEADER_LEN: usize = 16;
    const INDEX_ENTRY_HEADER_LEN: usize = 16;
    const ENTRY_LAST: u16 = 0x0002;

    let mut out = Vec::new();
    if body.len() < INDEX_ROOT_HEADER_LEN + INDEX_HEADER_LEN {
        return out;
    }
    let header = &body[INDEX_ROOT_HEADER_LEN..INDEX_ROOT_HEADER_LEN + INDEX_HEADER_LEN];
    let entries_offset = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
    let index_length = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

    let entries_start = INDEX_ROOT_HEADER_LEN + entries_offset;
    let entries_end = (INDEX_ROOT_HEADER_LEN + index_length).min(body.len());
    if entries_start >= entries_end {
        return out;
    }

    let mut pos = entries_start;
    while pos + INDEX_ENTRY_HEADER_LEN <= entries_end {
        let entry_len = u16::from_le_bytes(body[pos + 8..pos + 10].try_into().unwrap()) as usize;
        let key_len = u16::from_le_bytes(body[pos + 10..pos + 12].try_into().unwrap()) as usize;
        let flags = u16::from_le_bytes(body[pos + 12..pos + 14].try_into().unwrap());
        if entry_len == 0 || pos + entry_len > entries_end {
            break;
        }
        if flags & ENTRY_LAST == 0 {
            let key_start = pos + INDEX_ENTRY_HEADER_LEN;
            let key_end = key_start + key_len;
            if key_end <= entries_end {
                if let Some(file_name) = parse_file_name_body(&body[key_start..key_end]) {
                    out.push(file_name);
                }
            }
        }
        pos += entry_len;
    }
    out
}

/// Decodes a packed NTFS run list: each run is a header byte (low nibble =
/// byte count of the length field, high nibble = byte count of the signed
/// LCN-delta field), followed by the length, followed by the delta. A
/// sparse run has a zero-length LCN-delta field (no bytes) and leaves the
/// running LCN unchanged. Terminates at a `0x00` header byte.
fn decode_run_list(bytes: &[u8], lowest_vcn: i64, _highest_vcn: i64) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    let mut vcn = lowest_vcn;
    let mut lcn: i64 = 0;

    while pos < bytes.len() {
        let header = bytes[pos];
        if header == 0 {
            break;
        }
        let len_bytes = (header & 0x0F) as usize;
        let off_bytes = ((header >> 4) & 0x0F) as usize;
        pos += 1;
        if pos + len_bytes > bytes.len() {
            break;
        }
        let length = read_le_unsigned(&bytes[pos..pos + len_bytes]);
        pos += len_bytes;

        let is_sparse = off_bytes == 0;
        if !is_sparse {
            if pos + off_bytes > bytes.len() {
                break;
            }
            let delta = read_le_signed(&bytes[pos..pos + off_bytes]);
            pos += off_bytes;
            lcn += delta;
        }

        let run_start_vcn = vcn;
        let run_end_vcn = vcn + length as i64 - 1;
        if !is_sparse {
            runs.push(Run {
                vcn_start: run_start_vcn,
                vcn_end: run_end_vcn,
                lcn_start: lcn,
            });
        }
        vcn = run_end_vcn + 1;
    }

    runs
}

fn read_le_unsigned(bytes: &[u8]) -> u64 {
    let mut v = 0u64;
    for (i, b) in bytes.iter().enumerate() {
        v |= (*b as u64) << (8 * i);
    }
    v
}

fn read_le_signed(bytes: &[u8]) -> i64 {
    let mut v = read_le_unsigned(bytes) as i64;
    let bits = bytes.len() * 8;
    if bits < 64 && bytes.last().map(|b| b & 0x80 != 0).unwrap_or(false) {
        v -= 1i64 << bits;
    }
    v
}

/// Concatenate the runs of the same logical attribute split across
/// continuation records, in `LowestVCN` order, verifying contiguity.
fn merge_non_resident(kind: AttributeKind, mut segments: Vec<(i64, Vec<Run>)>) -> Result<Vec<Run>> {
    segments.sort_by_key(|(lowest_vcn, _)| *lowest_vcn);
    let mut merged = Vec::new();
    let mut expected_next: Option<i64> = None;
    for (_, runs) in segments {
        for run in runs {
            if let Some(expected) = expected_next {
                if run.vcn_start > expected {
                    return Err(OrcError::RunListGap {
                        type_code: kind.type_code(),
                        vcn: expected,
                    });
                }
                if run.vcn_start < expected {
                    return Err(OrcError::RunListOverlap {
                        type_code: kind.type_code(),
                        vcn: run.vcn_start,
                    });
                }
            }
            expected_next = Some(run.vcn_end + 1);
            merged.push(run);
        }
    }
    Ok(merged)
}

pub struct AttributeAssembler;

impl AttributeAssembler {
    /// Assemble the logical attribute view for `base`, resolving any
    /// `$ATTRIBUTE_LIST` by fetching each continuation record through
    /// `fetch_continuation`.
    pub fn assemble(
        base: &MftRecord,
        mut fetch_continuation: impl FnMut(Frn) -> Result<MftRecord>,
    ) -> Result<LogicalAttributes> {
        let base_parsed = parse_attribute_stream(base)?;

        let attribute_list_body = base_parsed.iter().find_map(|(entry, _)| {
            if matches!(entry.kind, AttributeKind::AttributeList) {
                match &entry.form {
                    AttributeForm::Resident(bytes) => Some(bytes.clone()),
                    AttributeForm::NonResident { .. } => None, // non-resident $ATTRIBUTE_LIST: rare, unsupported
                }
            } else {
                None
            }
        });

        let mut all_parsed: Vec<(AttributeEntry, Option<FileNameAttribute>)> = base_parsed;

        if let Some(list_bytes) = attribute_list_body {
            for continuation_frn in decode_attribute_list(&list_bytes) {
                if continuation_frn.segment() == base.frn.segment() {
                    continue;
                }
                let rec = fetch_continuation(continuation_frn)?;
                all_parsed.extend(parse_attribute_stream(&rec)?);
            }
        }

        // Group non-resident segments of the same (kind, name, instance)
        // so continuation fragments of one logical attribute merge.
        use std::collections::BTreeMap;
        let mut grouped: BTreeMap<(u32, CompactString, u16), Vec<(i64, Vec<Run>)>> = BTreeMap::new();
        let mut resident_entries = Vec::new();
        let mut file_names = Vec::new();

        for (entry, file_name) in all_parsed {
            if let Some(fname) = file_name {
                file_names.push(fname);
            }
            match entry.form {
                AttributeForm::NonResident { ref runs, .. } => {
                    let lowest = runs.first().map(|r| r.vcn_start).unwrap_or(0);
                    grouped
                        .entry((entry.kind.type_code(), entry.name.clone(), entry.instance))
                        .or_default()
                        .push((lowest, runs.clone()));
                    resident_entries.push(entry);
                }
                AttributeForm::Resident(_) => resident_entries.push(entry),
            }
        }

        let mut merged_runs: BTreeMap<(u32, CompactString, u16), Vec<Run>> = BTreeMap::new();
        for (key, segments) in grouped {
            let kind = AttributeKind::from_type_code(key.0);
            let merged = merge_non_resident(kind, segments)?;
            merged_runs.insert(key, merged);
        }

        let mut entries: Vec<AttributeEntry> = Vec::new();
        let mut seen_non_resident: std::collections::HashSet<(u32, CompactString, u16)> =
            std::collections::HashSet::new();
        for entry in resident_entries {
            match entry.form {
                AttributeForm::NonResident { real_size, .. } => {
                    let key = (entry.kind.type_code(), entry.name.clone(), entry.instance);
                    if !seen_non_resident.insert(key.clone()) {
                        continue;
                    }
                    let runs = merged_runs.remove(&key).unwrap_or_default();
                    entries.push(AttributeEntry {
                        kind: entry.kind,
                        name: entry.name,
                        instance: entry.instance,
                        form: AttributeForm::NonResident { runs, real_size },
                    });
                }
                AttributeForm::Resident(_) => entries.push(entry),
            }
        }

        entries.sort_by(|a, b| {
            a.kind
                .type_code()
                .cmp(&b.kind.type_code())
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(LogicalAttributes { entries, file_names })
    }
}

/// `$ATTRIBUTE_LIST` entries are a packed sequence of
/// `(type_code: u32, entry_len: u16, name_len: u8, name_offset: u8,
/// starting_vcn: u64, base_frn: u64, instance: u16, name...)`.
fn decode_attribute_list(bytes: &[u8]) -> Vec<Frn> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos + 26 <= bytes.len() {
        let entry_len = u16::from_le_bytes(bytes[pos + 4..pos + 6].try_into().unwrap()) as usize;
        if entry_len == 0 {
            break;
        }
        let base_frn_raw = u64::from_le_bytes(bytes[pos + 8..pos + 16].try_into().unwrap());
        out.push(Frn(base_frn_raw));
        pos += entry_len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_run_list() {
        // Header 0x21: length field 1 byte, lcn-delta field 2 bytes.
        // length = 0x10, delta = 0x1234 -> one run, lcn 0x1234, 16 clusters.
        let bytes = [0x21, 0x10, 0x34, 0x12, 0x00];
        let runs = decode_run_list(&bytes, 0, 15);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].vcn_start, 0);
        assert_eq!(runs[0].vcn_end, 15);
        assert_eq!(runs[0].lcn_start, 0x1234);
    }

    #[test]
    fn decodes_sparse_run_as_gap_in_lcn_but_not_output() {
        // 0x01: length 1 byte, no lcn delta (sparse) -> 0x05 clusters sparse.
        let bytes = [0x01, 0x05, 0x00];
        let runs = decode_run_list(&bytes, 0, 4);
        assert!(runs.is_empty());
    }

    #[test]
    fn merge_detects_gap() {
        let seg_a = (0i64, vec![Run { vcn_start: 0, vcn_end: 3, lcn_start: 10 }]);
        let seg_b = (5i64, vec![Run { vcn_start: 5, vcn_end: 7, lcn_start: 20 }]);
        let err = merge_non_resident(AttributeKind::Data, vec![seg_a, seg_b]).unwrap_err();
        assert!(matches!(err, OrcError::RunListGap { .. }));
    }

    #[test]
    fn merge_detects_overlap() {
        let seg_a = (0i64, vec![Run { vcn_start: 0, vcn_end: 5, lcn_start: 10 }]);
        let seg_b = (4i64, vec![Run { vcn_start: 4, vcn_end: 7, lcn_start: 20 }]);
        let err = merge_non_resident(AttributeKind::Data, vec![seg_a, seg_b]).unwrap_err();
        assert!(matches!(err, OrcError::RunListOverlap { .. }));
    }

    #[test]
    fn merge_concatenates_contiguous_segments() {
        let seg_a = (0i64, vec![Run { vcn_start: 0, vcn_end: 3, lcn_start: 10 }]);
        let seg_b = (4i64, vec![Run { vcn_start: 4, vcn_end: 7, lcn_start: 20 }]);
        let merged = merge_non_resident(AttributeKind::Data, vec![seg_a, seg_b]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].vcn_start, 4);
    }
}
