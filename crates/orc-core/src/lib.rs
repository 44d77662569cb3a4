/// Forensic NTFS/USN enumeration engine and job-execution scheduler, with
/// zero UI dependencies.
///
/// # Modules
///
/// - [`volume`] — byte-addressable access to a volume regardless of backing
///   store (mounted drive, raw disk, image file, VSS snapshot, offline MFT
///   dump).
/// - [`mft`] — MFT record parsing, attribute assembly, path resolution, and
///   the `MftWalker` enumeration engine.
/// - [`usn`] — online (`FSCTL_ENUM_USN_DATA`) and offline `$UsnJrnl:$J`
///   journal parsing.
/// - [`archive`] — container writing (TAR/ZIP/7z), hashing, and CMS
///   enveloped-data encryption, driven by a cooperative `ArchiveAgent`.
/// - [`command`] — child-process scheduling, job-object limits, output
///   redirection, and a cooperative `CommandAgent`.
/// - [`execution`] — `ExecutionSet` orchestration and the archive-name
///   pattern language.
/// - [`outcome`] — the append-only `OutcomeJournal`.
/// - [`config`] — location-grammar parsing and environment configuration.
/// - [`termination`] — the process-wide termination-handler registry.
/// - [`platform`] — Windows-specific privilege checks.
pub mod archive;
pub mod command;
pub mod config;
pub mod error;
pub mod execution;
pub mod mft;
pub mod outcome;
pub mod platform;
pub mod termination;
pub mod usn;
pub mod volume;
