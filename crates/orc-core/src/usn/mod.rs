pub mod offline;
pub mod online;
pub mod record;

pub use offline::{parse_offline_stream, ChunkedOfflineParser, OfflineParseSummary};
pub use online::{enumerate, UsnEnumSource};
pub use record::{parse_usn_record_v2, UsnRecord};
