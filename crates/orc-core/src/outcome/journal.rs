/// Mutex-protected, append-only evidence collector, per §4.10 and the
/// outcome document fields in §6. Access is exclusive; the journal is
/// write-only until teardown, per §5's shared-resources note.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IoCounters {
    pub read_ops: u64,
    pub read_bytes: u64,
    pub write_ops: u64,
    pub write_bytes: u64,
    pub other_ops: u64,
    pub other_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub page_faults: u64,
    pub processes: u64,
    pub active_processes: u64,
    pub terminated_processes: u64,
    pub peak_proc_mem: u64,
    pub peak_job_mem: u64,
    pub io: IoCounters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveInputType {
    Running,
    Offline,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    pub name: String,
    pub size: u64,
    pub sha1: String,
    pub input_type: ArchiveInputType,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One per-command entry, including the `hang_ticks` supplement additive
/// to the documented schema (how many 30s hang-report steps were observed
/// before the command completed).
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub keyword: String,
    pub command_line: String,
    pub is_self_executable: bool,
    pub exe_sha1: Option<String>,
    pub origin_friendly: Option<String>,
    pub origin_resource: Option<String>,
    pub pid: u32,
    pub created_utc: DateTime<Utc>,
    pub exited_utc: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub user_time_s: f64,
    pub kernel_time_s: f64,
    pub io: IoCounters,
    pub outputs: Vec<OutputEntry>,
    pub hang_ticks: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetOutcome {
    pub keyword: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
    pub job_stats: JobStats,
    pub archive: Option<ArchiveOutcome>,
    pub commands: Vec<CommandOutcome>,
}

impl SetOutcome {
    pub fn new(keyword: impl Into<String>, start_utc: DateTime<Utc>) -> Self {
        Self {
            keyword: keyword.into(),
            start_utc,
            end_utc: None,
            job_stats: JobStats::default(),
            archive: None,
            commands: Vec::new(),
        }
    }
}

/// Append-only, mutex-guarded document. A single `OutcomeJournal` is
/// shared across every `ExecutionSet` in a run; each set owns one
/// `SetOutcome` entry, indexed by keyword.
#[derive(Default)]
pub struct OutcomeJournal {
    inner: Mutex<Vec<SetOutcome>>,
}

impl OutcomeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_set(&self, keyword: impl Into<String>, start_utc: DateTime<Utc>) {
        self.inner.lock().push(SetOutcome::new(keyword, start_utc));
    }

    /// Applies `f` to the outcome entry for `keyword`. Panics are not
    /// caught here; callers must not hold the lock across a panic-capable
    /// boundary.
    pub fn mutate(&self, keyword: &str, f: impl FnOnce(&mut SetOutcome)) {
        let mut sets = self.inner.lock();
        if let Some(set) = sets.iter_mut().find(|s| s.keyword == keyword) {
            f(set);
        }
    }

    pub fn record_command(&self, keyword: &str, command: CommandOutcome) {
        self.mutate(keyword, |set| set.commands.push(command));
    }

    pub fn record_archive(&self, keyword: &str, archive: ArchiveOutcome) {
        self.mutate(keyword, |set| set.archive = Some(archive));
    }

    pub fn finish_set(&self, keyword: &str, end_utc: DateTime<Utc>) {
        self.mutate(keyword, |set| set.end_utc = Some(end_utc));
    }

    /// Stable, key-sorted serialization emitted at teardown, per §4.10.
    /// `serde_json`'s struct field order is already declaration order, so
    /// sorting here means sorting the set entries themselves by keyword.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut sets = self.inner.lock().clone();
        sets.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        serde_json::to_string_pretty(&sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn records_command_and_archive_outcomes_under_keyword() {
        let journal = OutcomeJournal::new();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        journal.start_set("GetFiles", start);

        journal.record_command(
            "GetFiles",
            CommandOutcome {
                keyword: "GetFiles".into(),
                command_line: "robocopy.exe /e".into(),
                is_self_executable: false,
                exe_sha1: Some("deadbeef".into()),
                origin_friendly: None,
                origin_resource: None,
                pid: 1234,
                created_utc: start,
                exited_utc: Some(start),
                exit_code: Some(0),
                user_time_s: 1.5,
                kernel_time_s: 0.5,
                io: IoCounters::default(),
                outputs: Vec::new(),
                hang_ticks: 0,
            },
        );
        journal.record_archive(
            "GetFiles",
            ArchiveOutcome {
                name: "GetFiles.7z".into(),
                size: 4096,
                sha1: "cafebabe".into(),
                input_type: ArchiveInputType::Running,
            },
        );
        journal.finish_set("GetFiles", start);

        let json = journal.to_json().unwrap();
        assert!(json.contains("GetFiles.7z"));
        assert!(json.contains("robocopy.exe"));
    }

    #[test]
    fn serialization_sorts_sets_by_keyword() {
        let journal = OutcomeJournal::new();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        journal.start_set("Zeta", start);
        journal.start_set("Alpha", start);

        let json = journal.to_json().unwrap();
        let zeta_pos = json.find("Zeta").unwrap();
        let alpha_pos = json.find("Alpha").unwrap();
        assert!(alpha_pos < zeta_pos);
    }

    #[test]
    fn mutate_on_unknown_keyword_is_a_no_op() {
        let journal = OutcomeJournal::new();
        journal.mutate("missing", |set| set.keyword.push_str("!"));
        assert_eq!(journal.inner.lock().len(), 0);
    }
}
