pub mod journal;

pub use journal::{
    ArchiveInputType, ArchiveOutcome, CommandOutcome, IoCounters, JobStats, OutcomeJournal,
    OutputEntry, SetOutcome,
};
