use chrono::NaiveDateTime;
use monjour_core::{AccountId, DateRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// `{account_id}_{content_hash}`: identical content for the same account
/// always maps to the same id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveId(String);

impl ArchiveId {
    pub fn new(account_id: &AccountId, content_hash: &str) -> Self {
        ArchiveId(format!("{account_id}_{content_hash}"))
    }

    /// Wraps an id as stored, e.g. one read back from a batch column.
    pub fn from_raw(id: impl Into<String>) -> Self {
        ArchiveId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: ArchiveId,
    pub imported_date: NaiveDateTime,
    pub importer_id: String,
    pub account_id: AccountId,
    /// Relative to `{root}/{account_id}` when managed, absolute otherwise.
    pub file_path: PathBuf,
    pub file_hash: String,
    pub date_start: NaiveDateTime,
    pub date_end: NaiveDateTime,
    pub is_managed_by_archive: bool,
}

impl ArchiveRecord {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.date_start, self.date_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// First registration of this content.
    Archived,
    /// Same id and hash seen before; metadata refreshed, content untouched.
    Reimported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_id_joins_account_and_hash() {
        let id = ArchiveId::new(&AccountId::from("uc"), "abc123");
        assert_eq!(id.as_str(), "uc_abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"uc_abc123\"");
    }
}
