/// Walks several volumes concurrently, one `MftWalker` per thread, per §5
/// ("multiple volumes may be walked in parallel" — the NTFS walker itself
/// stays single-threaded per volume). Grounded on the teacher's
/// `scanner::parallel`, which farmed independent subtrees out to `rayon`
/// worker threads and collected per-thread results back into the caller.
use super::store::MftStore;
use super::path::PathResolver;
use super::walker::{MftWalker, ResurrectMode, WalkSink, WalkSummary};
use rayon::prelude::*;

/// One volume's worth of work: its record store, a fresh path resolver, the
/// resurrection policy to apply, and how many MFT segments it holds.
pub struct VolumeWalkJob<'a, S: WalkSink + Send> {
    pub store: &'a MftStore,
    pub resolver: PathResolver,
    pub mode: ResurrectMode,
    pub total_records: u64,
    pub sink: S,
}

/// Runs every job on its own `rayon` worker thread and returns
/// `(summary, sink)` pairs in the same order the jobs were given, so a
/// caller can merge per-volume results deterministically regardless of
/// which thread finished first.
pub fn walk_volumes_parallel<S: WalkSink + Send>(jobs: Vec<VolumeWalkJob<'_, S>>) -> Vec<(WalkSummary, S)> {
    jobs.into_par_iter()
        .map(|mut job| {
            let mut walker = MftWalker::new(job.store, &mut job.resolver, job.mode);
            let summary = walker.walk(job.total_records, &mut job.sink);
            (summary, job.sink)
        })
        .collect()
}
