/// A named bundle of commands plus the archive that collects their
/// outputs, per §4.9.
use super::pattern::{expand, PatternContext};
use crate::archive::{ArchiveNotification, ArchiveRequest, CompressionLevel, ContainerFormat, Recipient};
use crate::command::{CommandNotification, CommandRequest, JobObjectLimits};
use crate::error::{OrcError, Result};
use compact_str::CompactString;
use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatPolicy {
    CreateNew,
    Overwrite,
    Once,
}

pub struct ExecutionSetTimeouts {
    pub command: Duration,
    pub archive: Duration,
    pub wall: Duration,
}

pub struct ExecutionSetConfig {
    pub keyword: CompactString,
    pub archive_name_pattern: String,
    pub compression_level: CompressionLevel,
    pub recipients: Vec<Recipient>,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub repeat_policy: RepeatPolicy,
    pub optional: bool,
    pub concurrency: usize,
    pub timeouts: ExecutionSetTimeouts,
    pub restrictions: JobObjectLimits,
    /// `None` = indeterminate, resolved to a global default policy;
    /// `Some(_)` = explicit, per the `tribool` design note in §9.
    pub child_debug: Option<bool>,
}

fn resolve_child_debug(child_debug: Option<bool>, global_default: bool) -> bool {
    child_debug.unwrap_or(global_default)
}

/// Resolved archive paths per §4.9's name-resolution rule.
pub struct ArchiveNames {
    pub archive_full_path: PathBuf,
    pub output_full_path: PathBuf,
}

/// `BuildFullArchiveName` — step 1 of the lifecycle in §4.9.
pub fn build_full_archive_name(config: &ExecutionSetConfig, ctx: &PatternContext) -> Result<ArchiveNames> {
    let expanded = expand(&config.archive_name_pattern, ctx);
    let archive_full_path = config.output_dir.join(&expanded);

    match config.repeat_policy {
        RepeatPolicy::CreateNew => {
            if archive_full_path.exists() {
                return Err(OrcError::Archive {
                    reason: format!("{} already exists under CreateNew policy", archive_full_path.display()),
                });
            }
        }
        RepeatPolicy::Overwrite => {}
        RepeatPolicy::Once => {
            if archive_full_path.exists() {
                return Err(OrcError::Config {
                    reason: format!("{} already exists; Once policy skips this set", archive_full_path.display()),
                });
            }
        }
    }

    let output_full_path = if config.recipients.is_empty() {
        archive_full_path.clone()
    } else {
        archive_full_path.with_extension(format!(
            "{}.p7b",
            archive_full_path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ))
    };

    Ok(ArchiveNames {
        archive_full_path,
        output_full_path,
    })
}

/// Validates the archive's file extension resolves to a supported
/// container format before the archive agent is created.
pub fn resolve_container_format(archive_full_path: &std::path::Path) -> Result<ContainerFormat> {
    ContainerFormat::from_path(archive_full_path)
}

/// Drives the lifecycle from `CompleteExecution` onward: waits for all
/// commands to report a terminal state (idle-drain), then sends `Complete`
/// to the archive agent and waits up to `timeouts.archive`.
pub struct ExecutionSetDriver {
    pub pending_pids: std::collections::HashSet<u32>,
}

impl ExecutionSetDriver {
    pub fn new() -> Self {
        Self {
            pending_pids: std::collections::HashSet::new(),
        }
    }

    pub fn track_started(&mut self, pid: u32) {
        self.pending_pids.insert(pid);
    }

    /// Feed a command notification; returns `true` once every tracked pid
    /// has reported a terminal state (`CompleteExecution` is satisfied).
    pub fn observe(&mut self, notification: &CommandNotification) -> bool {
        if let CommandNotification::Terminated { pid, .. } = notification {
            self.pending_pids.remove(pid);
        }
        self.pending_pids.is_empty()
    }
}

impl Default for ExecutionSetDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// `CompleteArchive` — step from §4.9: adds the per-set configuration and
/// outcome streams, then sends `Complete`.
pub fn complete_archive(
    archive_requests: &Sender<ArchiveRequest>,
    config_xml: Vec<u8>,
    local_config_xml: Vec<u8>,
    outcome_json: Vec<u8>,
) -> Result<()> {
    archive_requests
        .send(ArchiveRequest::AddStream {
            name_in_archive: "Config.xml".into(),
            bytes: config_xml,
        })
        .map_err(|_| OrcError::Archive { reason: "archive agent channel closed".into() })?;
    archive_requests
        .send(ArchiveRequest::AddStream {
            name_in_archive: "LocalConfig.xml".into(),
            bytes: local_config_xml,
        })
        .map_err(|_| OrcError::Archive { reason: "archive agent channel closed".into() })?;
    archive_requests
        .send(ArchiveRequest::AddStream {
            name_in_archive: "Outcome.json".into(),
            bytes: outcome_json,
        })
        .map_err(|_| OrcError::Archive { reason: "archive agent channel closed".into() })?;
    archive_requests
        .send(ArchiveRequest::Complete)
        .map_err(|_| OrcError::Archive { reason: "archive agent channel closed".into() })?;
    Ok(())
}

/// Awaits `ArchiveComplete` (or an error notification) up to `timeout`.
pub fn await_archive_complete(
    notifications: &crossbeam_channel::Receiver<ArchiveNotification>,
    timeout: Duration,
) -> Result<(u64, String)> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            return Err(OrcError::Timeout {
                elapsed_ms: timeout.as_millis() as u64,
                deadline_ms: timeout.as_millis() as u64,
            });
        }
        match notifications.recv_timeout(remaining) {
            Ok(ArchiveNotification::ArchiveComplete { total_size, sha1 }) => return Ok((total_size, sha1)),
            Ok(ArchiveNotification::Error { reason }) => return Err(OrcError::Archive { reason }),
            Ok(_) => continue,
            Err(_) => {
                return Err(OrcError::Timeout {
                    elapsed_ms: timeout.as_millis() as u64,
                    deadline_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Sends a one-shot `Execute` for every queued command in `commands`.
pub fn enqueue_commands(
    command_requests: &Sender<CommandRequest>,
    commands: Vec<crate::command::ExecuteRequest>,
) -> Result<()> {
    for exec in commands {
        command_requests
            .send(CommandRequest::Execute(exec))
            .map_err(|_| OrcError::Config { reason: "command agent channel closed".into() })?;
    }
    Ok(())
}
