use monjour_archive::ArchiveId;
use monjour_core::{AccountInfo, DateRange, Diagnostics};
use serde_json::{Map, Value};
use std::path::Path;

use crate::importer::ImportError;

/// Everything an importer needs to turn one file into a batch.
///
/// Created per import and dropped afterwards. Steps may append diagnostics
/// and stash values in `extra`; the remaining fields are fixed at creation.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub account: AccountInfo,
    pub archive_id: ArchiveId,
    pub date_range: DateRange,
    filename: String,
    pub importer_id: String,
    pub extra: Map<String, Value>,
    pub diagnostics: Diagnostics,
}

impl ImportContext {
    pub fn new(
        account: AccountInfo,
        archive_id: ArchiveId,
        date_range: DateRange,
        filename: &str,
        importer_id: &str,
    ) -> Result<Self, ImportError> {
        if extension_of(filename).is_none() {
            return Err(ImportError::InvalidFilename(filename.to_string()));
        }
        let diagnostics = Diagnostics::with_prefix(format!("ImportContext({}, {importer_id})", account.id));
        Ok(ImportContext {
            account,
            archive_id,
            date_range,
            filename: filename.to_string(),
            importer_id: importer_id.to_string(),
            extra: Map::new(),
            diagnostics,
        })
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        extension_of(&self.filename).unwrap_or_default()
    }
}

/// Extension of the last path component, if it has a non-empty stem and
/// a non-empty extension.
pub fn extension_of(filename: &str) -> Option<&str> {
    let name = Path::new(filename).file_name()?.to_str()?;
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
