pub mod attribute;
pub mod frn;
pub mod parallel;
pub mod path;
pub mod record;
pub mod store;
pub mod walker;

pub use attribute::{
    parse_index_root_entries, standard_information_security_id, AttributeAssembler, AttributeEntry,
    AttributeForm, AttributeKind, FileNameAttribute, FileNameNamespace, LogicalAttributes, Run,
};
pub use frn::{Frn, ROOT_FRN};
pub use parallel::{walk_volumes_parallel, VolumeWalkJob};
pub use path::{PathResolver, ResolvedPath};
pub use record::{MftRecord, RecordFlags, RecordHeader};
pub use store::MftStore;
pub use walker::{MftWalker, ResurrectMode, SecurityDescriptorDedup, WalkSink, WalkSummary};
