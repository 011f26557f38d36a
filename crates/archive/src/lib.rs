pub mod hash;
pub mod record;
pub mod store;

pub use record::{ArchiveId, ArchiveOutcome, ArchiveRecord};
pub use store::{Archive, ArchiveError, ReimportPolicy, ARCHIVE_VERSION, METADATA_FILE};
