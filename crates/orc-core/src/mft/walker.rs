/// Drives traversal over the MFT, emitting callback events per record in
/// the ordering contract of §4.5.
use super::attribute::{
    parse_index_root_entries, standard_information_security_id, AttributeEntry, AttributeForm, AttributeKind,
    FileNameAttribute,
};
use super::frn::Frn;
use super::path::PathResolver;
use super::record::MftRecord;
use super::store::MftStore;
use crate::error::Result;
use tracing::{debug, warn};

/// Policy governing which records the walker considers, per §4.5
/// "Resurrection policy".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResurrectMode {
    /// Only records with the in-use flag set.
    NoDeleted,
    /// Deleted records are included, but only if their attributes parse
    /// cleanly end to end.
    CleanOnly,
    /// Emit whatever can be decoded, marking unresolved parents with the
    /// synthetic placeholder.
    BestEffort,
}

/// Visitor callback set for a walk. Every method has a default no-op body
/// so a sink only needs to implement the events it cares about.
#[allow(unused_variables)]
pub trait WalkSink {
    fn on_element(&mut self, record: &MftRecord) {}
    fn on_file_name(&mut self, record: &MftRecord, file_name: &FileNameAttribute, path: &str) {}
    fn on_file_name_and_data(
        &mut self,
        record: &MftRecord,
        file_name: &FileNameAttribute,
        data_attr: &AttributeEntry,
    ) {
    }
    fn on_directory(&mut self, record: &MftRecord, file_name: &FileNameAttribute, index_alloc: &AttributeEntry) {}
    fn on_attribute(&mut self, record: &MftRecord, attribute: &AttributeEntry) {}
    fn on_i30_entry(&mut self, record: &MftRecord, file_name: &FileNameAttribute, is_carved: bool) {}
    fn on_security_descriptor(&mut self, record: &MftRecord, sec_id: u32) {}
    fn on_progress(&mut self, percent: u32) {}
}

/// Returned once a walk completes, per §4.5 "Failure semantics".
#[derive(Debug, Default, Clone)]
pub struct WalkSummary {
    pub records_processed: u64,
    pub records_skipped: u64,
    pub fatal_error: Option<String>,
}

/// Number of consecutive fix-up failures within one run of segment numbers
/// that aborts the walk with a hard error, per §4.5.
const FATAL_RUN_LENGTH: u64 = 256;

pub struct MftWalker<'a> {
    store: &'a MftStore,
    resolver: &'a mut PathResolver,
    mode: ResurrectMode,
    sec_desc_seen: SecurityDescriptorDedup,
}

impl<'a> MftWalker<'a> {
    pub fn new(store: &'a MftStore, resolver: &'a mut PathResolver, mode: ResurrectMode) -> Self {
        Self {
            store,
            resolver,
            mode,
            sec_desc_seen: SecurityDescriptorDedup::default(),
        }
    }

    /// Walk every record segment in `[0, total_records)`, invoking `sink`'s
    /// callbacks per the ordering contract.
    pub fn walk(&mut self, total_records: u64, sink: &mut dyn WalkSink) -> WalkSummary {
        let mut summary = WalkSummary::default();
        let mut consecutive_fixup_failures = 0u64;
        let mut last_percent = 0u32;

        for segment in 0..total_records {
            let record = match self.store.record(segment) {
                Ok(r) => {
                    consecutive_fixup_failures = 0;
                    r
                }
                Err(e) if e.is_recoverable() => {
                    debug!(segment, error = %e, "skipping record: decode error");
                    summary.records_skipped += 1;
                    consecutive_fixup_failures += 1;
                    if consecutive_fixup_failures >= FATAL_RUN_LENGTH {
                        summary.fatal_error = Some(format!(
                            "{consecutive_fixup_failures} consecutive fix-up failures ending at segment {segment}"
                        ));
                        return summary;
                    }
                    continue;
                }
                Err(e) => {
                    summary.fatal_error = Some(e.to_string());
                    return summary;
                }
            };

            if !self.should_visit(&record) {
                continue;
            }

            self.visit_record(&record, sink, &mut summary);

            let percent = ((segment + 1) * 100 / total_records.max(1)) as u32;
            if percent > last_percent {
                sink.on_progress(percent);
                last_percent = percent;
            }
        }

        summary
    }

    fn should_visit(&self, record: &MftRecord) -> bool {
        record.matches_policy(self.mode)
    }

    fn visit_record(&mut self, record: &MftRecord, sink: &mut dyn WalkSink, summary: &mut WalkSummary) {
        let attrs = match self.store.attributes(record.frn) {
            Ok(a) => a,
            Err(e) => {
                if self.mode == ResurrectMode::CleanOnly {
                    warn!(frn = %record.frn, error = %e, "dropping resurrection candidate: attributes failed to assemble");
                    summary.records_skipped += 1;
                    return;
                }
                debug!(frn = %record.frn, error = %e, "attribute assembly error, continuing best-effort");
                summary.records_skipped += 1;
                sink.on_element(record);
                summary.records_processed += 1;
                return;
            }
        };

        sink.on_element(record);

        for file_name in &attrs.file_names {
            self.resolver
                .index_record(record.frn, file_name.parent, file_name.name.clone());
            let resolved = self.resolver.resolve(record.frn, file_name);
            sink.on_file_name(record, file_name, &resolved.full_path);

            if record.header.is_directory() {
                if let Some(index_alloc) = attrs
                    .entries
                    .iter()
                    .find(|e| matches!(e.kind, AttributeKind::IndexAllocation))
                {
                    sink.on_directory(record, file_name, index_alloc);
                }
            } else {
                for data_attr in attrs.entries.iter().filter(|e| matches!(e.kind, AttributeKind::Data)) {
                    sink.on_file_name_and_data(record, file_name, data_attr);
                }
            }
        }

        for attribute in &attrs.entries {
            sink.on_attribute(record, attribute);
        }

        if record.header.is_directory() {
            if let Some(index_root) = attrs.entries.iter().find(|e| matches!(e.kind, AttributeKind::IndexRoot)) {
                if let AttributeForm::Resident(body) = &index_root.form {
                    for file_name in parse_index_root_entries(body) {
                        sink.on_i30_entry(record, &file_name, false);
                    }
                }
                // $INDEX_ALLOCATION entries (and carved index-slack entries)
                // live in non-resident nodes this walker does not parse yet.
            }
        }

        let standard_information = attrs
            .entries
            .iter()
            .find(|e| matches!(e.kind, AttributeKind::StandardInformation));
        if let Some(AttributeEntry { form: AttributeForm::Resident(body), .. }) = standard_information {
            if let Some(sec_id) = standard_information_security_id(body) {
                if self.sec_desc_seen.should_emit(sec_id) {
                    sink.on_security_descriptor(record, sec_id);
                }
            }
        }

        summary.records_processed += 1;
    }
}

/// Helper used by callers driving `$Secure:$SDS` emission to avoid firing
/// `SecDescCallback` more than once per distinct `SecID`, per §4.5.
#[derive(Default)]
pub struct SecurityDescriptorDedup {
    seen: std::collections::HashSet<u32>,
}

impl SecurityDescriptorDedup {
    pub fn should_emit(&mut self, sec_id: u32) -> bool {
        self.seen.insert(sec_id)
    }
}
