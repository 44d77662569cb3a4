/// Thin, non-interactive entry point: reads one location from the
/// environment or the single positional argument, opens the matching
/// volume reader, walks its MFT, and prints a summary. No flag parsing,
/// no XML configuration, no upload transports — those are external
/// collaborators per the scope note this crate's sibling library follows.
use anyhow::{bail, Context, Result};
use orc_core::config::{offline_location_from_env, parse_location, Altitude, LocationSpec};
use orc_core::mft::{MftStore, MftWalker, PathResolver, ResurrectMode, WalkSink};
use orc_core::volume::offline_mft::OfflineMftReader;
use orc_core::volume::VolumeReader;
use std::sync::Arc;

/// A minimal sink that just counts what the walk visits and logs at the end;
/// real consumers plug in their own `WalkSink` to do something with the
/// records.
#[derive(Default)]
struct CountingSink {
    elements: u64,
    file_names: u64,
    directories: u64,
}

impl WalkSink for CountingSink {
    fn on_element(&mut self, _record: &orc_core::mft::MftRecord) {
        self.elements += 1;
    }

    fn on_file_name(
        &mut self,
        _record: &orc_core::mft::MftRecord,
        _file_name: &orc_core::mft::FileNameAttribute,
        _path: &str,
    ) {
        self.file_names += 1;
    }

    fn on_directory(
        &mut self,
        _record: &orc_core::mft::MftRecord,
        _file_name: &orc_core::mft::FileNameAttribute,
        _index_alloc: &orc_core::mft::AttributeEntry,
    ) {
        self.directories += 1;
    }
}

fn open_volume(spec: &LocationSpec) -> Result<Arc<dyn VolumeReader>> {
    match spec {
        #[cfg(windows)]
        LocationSpec::MountedDrive { drive_letter, .. } => {
            let reader = orc_core::volume::mounted::MountedVolumeReader::open(*drive_letter)
                .context("opening mounted volume")?;
            Ok(Arc::new(reader))
        }
        LocationSpec::OfflineMft { path } => {
            let reader = OfflineMftReader::open(path).context("opening offline MFT dump")?;
            Ok(Arc::new(reader))
        }
        #[cfg(not(windows))]
        LocationSpec::MountedDrive { .. } => {
            bail!("mounted-drive locations require running on Windows")
        }
        other => bail!("location kind {other:?} is not wired into this entry point yet"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let altitude = Altitude::from_env();
    tracing::info!(?altitude, "resolved duplicate-volume altitude policy");

    let location = if let Some(offline) = offline_location_from_env() {
        tracing::info!(path = %offline, "OfflineLocation set; running in offline mode");
        offline
    } else {
        std::env::args()
            .nth(1)
            .context("expected one location argument (or OfflineLocation in the environment)")?
    };

    let spec = parse_location(&location).context("parsing location")?;
    let volume = open_volume(&spec)?;

    let total_records = volume.len() / volume.record_size() as u64;
    let store = MftStore::new(volume.clone());
    let mut resolver = PathResolver::new(format!("{:?}", spec));
    let mut walker = MftWalker::new(&store, &mut resolver, ResurrectMode::NoDeleted);

    let mut sink = CountingSink::default();
    let summary = walker.walk(total_records, &mut sink);

    tracing::info!(
        records_processed = summary.records_processed,
        records_skipped = summary.records_skipped,
        elements = sink.elements,
        file_names = sink.file_names,
        directories = sink.directories,
        "walk complete"
    );

    if let Some(reason) = summary.fatal_error {
        bail!("walk aborted: {reason}");
    }

    Ok(())
}
