/// A decoded USN record, independent of whether it came from the online
/// `FSCTL_ENUM_USN_DATA` enumeration or an offline `$UsnJrnl:$J` parse.
use crate::mft::Frn;
use compact_str::CompactString;

#[derive(Clone, Debug)]
pub struct UsnRecord {
    pub usn: i64,
    pub frn: Frn,
    pub parent_frn: Frn,
    /// FILETIME-style timestamp (100ns ticks since 1601-01-01), kept raw so
    /// callers can convert with `chrono` without a forced dependency here.
    pub timestamp: i64,
    pub reason_bits: u32,
    pub source_info_bits: u32,
    pub file_attributes: u32,
    pub file_name: CompactString,
}

impl UsnRecord {
    pub fn is_directory(&self) -> bool {
        const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
        self.file_attributes & FILE_ATTRIBUTE_DIRECTORY != 0
    }
}

/// Parse one `USN_RECORD_V2` at `bytes[0..]`, returning the record and its
/// total on-wire length, or `None` if the bytes don't hold a complete
/// record.
///
/// Layout: RecordLength(u32) MajorVersion(u16) MinorVersion(u16)
/// FileReferenceNumber(u64) ParentFileReferenceNumber(u64) Usn(i64)
/// TimeStamp(i64) Reason(u32) SourceInfo(u32) SecurityId(u32)
/// FileAttributes(u32) FileNameLength(u16) FileNameOffset(u16) FileName.
pub fn parse_usn_record_v2(bytes: &[u8]) -> Option<(UsnRecord, usize)> {
    if bytes.len() < 60 {
        return None;
    }
    let record_len = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
    if record_len < 60 || record_len > bytes.len() {
        return None;
    }
    let major_version = u16::from_le_bytes(bytes[4..6].try_into().ok()?);
    if major_version != 2 && major_version != 3 {
        return None;
    }

    let file_ref = u64::from_le_bytes(bytes[8..16].try_into().ok()?);
    let parent_ref = u64::from_le_bytes(bytes[16..24].try_into().ok()?);
    let usn = i64::from_le_bytes(bytes[24..32].try_into().ok()?);
    let timestamp = i64::from_le_bytes(bytes[32..40].try_into().ok()?);
    let reason_bits = u32::from_le_bytes(bytes[40..44].try_into().ok()?);
    let source_info_bits = u32::from_le_bytes(bytes[44..48].try_into().ok()?);
    let file_attributes = u32::from_le_bytes(bytes[52..56].try_into().ok()?);
    let name_len = u16::from_le_bytes(bytes[56..58].try_into().ok()?) as usize;
    let name_offset = u16::from_le_bytes(bytes[58..60].try_into().ok()?) as usize;

    let name_start = name_offset;
    let name_end = name_start + name_len;
    if name_end > record_len || name_len == 0 {
        return None;
    }

    let file_name: CompactString = char::decode_utf16(
        bytes[name_start..name_end]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]])),
    )
    .map(|r| r.unwrap_or('\u{FFFD}'))
    .collect();

    Some((
        UsnRecord {
            usn,
            frn: Frn(file_ref & 0x0000_FFFF_FFFF_FFFF),
            parent_frn: Frn(parent_ref & 0x0000_FFFF_FFFF_FFFF),
            timestamp,
            reason_bits,
            source_info_bits,
            file_attributes,
            file_name,
        },
        record_len,
    ))
}
