use monjour_core::{Pipeline, RecordBatch};
use std::sync::Arc;

use crate::context::ImportContext;
use crate::csv::{CastOptions, CsvImporter, CsvOptions, DateFormat, NumberFormat};
use crate::importer::{ImportError, Importer, ImporterInfo};
use crate::steps;

/// CSV whose header already uses transaction field names
/// (`date`, `amount`, `desc`, ...). Unknown columns are dropped.
pub fn info() -> ImporterInfo {
    ImporterInfo::new("generic", "*", "1.0").with_friendly_name("Generic CSV")
}

pub fn pipeline() -> Pipeline<ImportContext, RecordBatch> {
    vec![
        steps::add_archive_id(),
        steps::add_account_id(),
        steps::create_deterministic_index(),
        steps::cast_to_account_schema(CastOptions::new(NumberFormat::DOT, DateFormat::iso())),
        steps::add_currency_info(),
        steps::remove_unused_columns(),
        steps::warn_if_empty(),
    ]
}

pub fn importer() -> Result<Arc<dyn Importer>, ImportError> {
    Ok(Arc::new(CsvImporter::new(info(), CsvOptions::default(), pipeline())))
}
