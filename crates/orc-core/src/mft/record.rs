/// A single MFT record: fix-up-stamped fixed-size structure carrying a
/// header (in-use / is-directory / has-$ATTRIBUTE_LIST flags) and a stream
/// of typed attributes.
use super::frn::Frn;
use crate::error::{OrcError, Result};

pub const RECORD_STAMP: &[u8; 4] = b"FILE";
const SUBSECTOR_LEN: usize = 512;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RecordFlags: u16 {
        const IN_USE = 0x0001;
        const IS_DIRECTORY = 0x0002;
        /// Not a real on-disk NTFS flag bit — tracked separately once the
        /// attribute stream has been scanned for an `$ATTRIBUTE_LIST`, and
        /// folded in here so callers can test one value.
        const HAS_ATTRIBUTE_LIST = 0x4000;
    }
}

/// Header fields of an MFT record, after fix-up verification.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub flags: RecordFlags,
    pub sequence_number: u16,
    pub first_attribute_offset: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub base_record: Frn,
}

impl RecordHeader {
    pub fn in_use(&self) -> bool {
        self.flags.contains(RecordFlags::IN_USE)
    }

    pub fn is_directory(&self) -> bool {
        self.flags.contains(RecordFlags::IS_DIRECTORY)
    }

    pub fn has_attribute_list(&self) -> bool {
        self.flags.contains(RecordFlags::HAS_ATTRIBUTE_LIST)
    }

    /// `true` if this is a continuation record (its base record points
    /// elsewhere), per spec §3 ("File... Lifecycle").
    pub fn is_continuation(&self) -> bool {
        self.base_record.0 != 0
    }
}

/// An MFT record's bytes after fix-up verification, plus its parsed header.
/// Attribute decoding is layered on top in [`super::attribute`].
#[derive(Debug, Clone)]
pub struct MftRecord {
    pub frn: Frn,
    pub header: RecordHeader,
    pub bytes: Vec<u8>,
}

impl MftRecord {
    /// Verify and apply the fix-up stamp over `raw` (one full record, sized
    /// to the volume's `record_size`), then parse the header.
    ///
    /// Each 512-byte sub-sector's last two bytes are sentinel placeholders
    /// that must equal the USA stamp; they are replaced in-place with the
    /// real data bytes stored in the USA array. A mismatch indicates a torn
    /// write or corruption and fails with [`OrcError::CorruptFixup`].
    pub fn parse(segment: u64, raw: &[u8]) -> Result<Self> {
        if raw.len() < 48 || &raw[0..4] != RECORD_STAMP {
            return Err(OrcError::CorruptFixup { frn: segment, subsector: 0 });
        }

        let usa_offset = u16::from_le_bytes([raw[4], raw[5]]) as usize;
        let usa_count = u16::from_le_bytes([raw[6], raw[7]]) as usize;
        let sequence_number = u16::from_le_bytes([raw[16], raw[17]]);
        let first_attribute_offset = u16::from_le_bytes([raw[20], raw[21]]);
        let raw_flags = u16::from_le_bytes([raw[22], raw[23]]);
        let used_size = u32::from_le_bytes(raw[24..28].try_into().unwrap());
        let allocated_size = u32::from_le_bytes(raw[28..32].try_into().unwrap());
        let base_record = u64::from_le_bytes(raw[32..40].try_into().unwrap());

        if usa_count == 0 || usa_offset + usa_count * 2 > raw.len() {
            return Err(OrcError::CorruptFixup {
                frn: segment,
                subsector: 0,
            });
        }

        let mut bytes = raw.to_vec();
        let stamp = [raw[usa_offset], raw[usa_offset + 1]];

        // usa_count includes the stamp entry itself, so there are
        // usa_count - 1 per-sub-sector replacement values.
        for i in 0..usa_count.saturating_sub(1) {
            let subsector_end = (i + 1) * SUBSECTOR_LEN;
            if subsector_end > bytes.len() {
                break;
            }
            let tail = subsector_end - 2;
            if bytes[tail] != stamp[0] || bytes[tail + 1] != stamp[1] {
                return Err(OrcError::CorruptFixup {
                    frn: segment,
                    subsector: i,
                });
            }
            let repl_off = usa_offset + 2 + i * 2;
            bytes[tail] = raw[repl_off];
            bytes[tail + 1] = raw[repl_off + 1];
        }

        let mut flags = RecordFlags::empty();
        if raw_flags & 0x0001 != 0 {
            flags |= RecordFlags::IN_USE;
        }
        if raw_flags & 0x0002 != 0 {
            flags |= RecordFlags::IS_DIRECTORY;
        }

        let header = RecordHeader {
            flags,
            sequence_number,
            first_attribute_offset,
            used_size,
            allocated_size,
            base_record: Frn(base_record),
        };

        Ok(MftRecord {
            frn: Frn::new(segment, sequence_number),
            header,
            bytes,
        })
    }

    /// Whether this record should be walked, given a [`crate::mft::walker::ResurrectMode`]
    /// policy — spec §4.5 "Resurrection policy".
    pub fn matches_policy(&self, mode: super::walker::ResurrectMode) -> bool {
        use super::walker::ResurrectMode;
        match mode {
            ResurrectMode::NoDeleted => self.header.in_use(),
            // "Only records whose attributes still parse cleanly" and
            // "best-effort" both accept any record whose header parsed —
            // the distinction is enforced later when attributes are
            // assembled (strict mode rejects the record there instead).
            ResurrectMode::CleanOnly | ResurrectMode::BestEffort => true,
        }
    }
}
