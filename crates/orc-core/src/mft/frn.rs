/// File-reference number: a 64-bit value combining a 48-bit record-segment
/// index and a 16-bit sequence number. Uniquely identifies a logical file
/// within a volume's lifetime (the sequence number increments each time a
/// segment is reused for a new file, so a stale reference can be detected).
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Frn(pub u64);

/// The NTFS root directory always has this file-reference number (segment 5,
/// sequence 0) — spec §3 invariant.
pub const ROOT_FRN: Frn = Frn(5);

impl Frn {
    pub fn new(segment: u64, sequence: u16) -> Self {
        debug_assert!(segment <= 0x0000_FFFF_FFFF_FFFF, "segment exceeds 48 bits");
        Self((segment & 0x0000_FFFF_FFFF_FFFF) | ((sequence as u64) << 48))
    }

    #[inline]
    pub fn segment(self) -> u64 {
        self.0 & 0x0000_FFFF_FFFF_FFFF
    }

    #[inline]
    pub fn sequence(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub fn is_root(self) -> bool {
        self.segment() == ROOT_FRN.segment()
    }

    /// Render the synthetic placeholder segment used when a parent can't be
    /// resolved: `__<hex-frn>__\`.
    pub fn placeholder_segment(self) -> String {
        format!("__{:x}__", self.0)
    }
}

impl fmt::Debug for Frn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frn(seg={:#x}, seq={})", self.segment(), self.sequence())
    }
}

impl fmt::Display for Frn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
