/// Unified error type for the NTFS enumeration engine and job-execution
/// scheduler.
///
/// Every kind listed in the error-handling design is represented by exactly
/// one variant here; nothing carries a raw string payload where a typed
/// field will do, per the "no `wchar_t*` exceptions" design note.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OrcError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read past end of volume: offset {offset}, len {len}, volume size {volume_size}")]
    OutOfRange {
        offset: u64,
        len: u64,
        volume_size: u64,
    },

    #[error("fix-up stamp mismatch in MFT record {frn:#x}, sub-sector {subsector}")]
    CorruptFixup { frn: u64, subsector: usize },

    #[error("non-resident run list for attribute {type_code:#x} has a gap before VCN {vcn}")]
    RunListGap { type_code: u32, vcn: i64 },

    #[error("non-resident run list for attribute {type_code:#x} overlaps at VCN {vcn}")]
    RunListOverlap { type_code: u32, vcn: i64 },

    #[error("USN record header invalid: major version {major_version} outside {{2, 3}}")]
    InvalidUsnHeader { major_version: u16 },

    #[error("command line exceeds 32768 characters ({len} chars)")]
    CommandLineTooLong { len: usize },

    #[error("operation timed out after {elapsed_ms}ms (deadline {deadline_ms}ms)")]
    Timeout { elapsed_ms: u64, deadline_ms: u64 },

    #[error("access denied opening {path}")]
    AccessDenied { path: PathBuf },

    #[error("the current process does not hold administrator privileges")]
    Elevation,

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("archive error: {reason}")]
    Archive { reason: String },

    #[error("job object error: {reason}")]
    JobObject { reason: String },
}

pub type Result<T> = std::result::Result<T, OrcError>;

impl OrcError {
    /// `true` for errors the walker/store treats as "skip and continue"
    /// rather than aborting the whole run (§7: per-record decode errors are
    /// recorded and the walk continues).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OrcError::CorruptFixup { .. }
                | OrcError::RunListGap { .. }
                | OrcError::RunListOverlap { .. }
                | OrcError::InvalidUsnHeader { .. }
                | OrcError::CommandLineTooLong { .. }
                | OrcError::Timeout { .. }
        )
    }
}
