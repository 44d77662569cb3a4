pub mod pattern;
pub mod set;

pub use pattern::{expand, recover, PatternContext, RecoveredTokens, SystemType};
pub use set::{
    await_archive_complete, build_full_archive_name, complete_archive, enqueue_commands,
    resolve_container_format, ArchiveNames, ExecutionSetConfig, ExecutionSetDriver,
    ExecutionSetTimeouts, RepeatPolicy,
};
