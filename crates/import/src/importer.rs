use monjour_core::{DateRange, ExecError, Executor, RecordBatch, SchemaError};
use monjour_parser::ParserError;
use serde::Serialize;
use thiserror::Error;

use crate::context::ImportContext;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    #[error("Importer '{0}' cannot infer a date range, pass one explicitly")]
    DateRangeUnsupported(String),
    #[error("Failed to infer date range: {0}")]
    DateRangeInference(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),
    #[error("Filename '{0}' doesn't have an extension")]
    InvalidFilename(String),
}

impl ImportError {
    /// The `InvalidFile` error a pipeline step failed with, if any.
    pub fn invalid_file(&self) -> Option<&str> {
        match self {
            ImportError::InvalidFile(msg) => Some(msg),
            ImportError::Exec(ExecError::Step { source, .. }) => {
                match source.downcast_ref::<ImportError>() {
                    Some(ImportError::InvalidFile(msg)) => Some(msg),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Executor type every importer pipeline runs under.
pub type ImportExecutor = dyn Executor<ImportContext, RecordBatch>;

/// Describes an importer without instantiating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImporterInfo {
    pub id: String,
    pub provider: String,
    /// `"*"` matches every locale.
    pub supported_locale: String,
    pub version: String,
    pub friendly_name: String,
}

impl ImporterInfo {
    pub fn new(provider: &str, locale: &str, version: &str) -> Self {
        let locale_tag = if locale == "*" { "any" } else { locale };
        ImporterInfo {
            id: format!("{provider}_{locale_tag}_v{version}"),
            provider: provider.to_string(),
            supported_locale: locale.to_string(),
            version: version.to_string(),
            friendly_name: format!("{provider} {locale_tag} v{version}"),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_friendly_name(mut self, name: &str) -> Self {
        self.friendly_name = name.to_string();
        self
    }

    pub fn supports_locale(&self, locale: &str) -> bool {
        self.supported_locale == "*" || self.supported_locale == locale
    }
}

/// Turns the raw bytes of one file into a record batch.
pub trait Importer: Send + Sync {
    fn info(&self) -> &ImporterInfo;

    fn import_file(
        &self,
        ctx: &mut ImportContext,
        content: &[u8],
        executor: &ImportExecutor,
    ) -> Result<RecordBatch, ImportError>;

    /// Date range covered by a file, from its name or its contents.
    fn try_infer_date_range(
        &self,
        content: &[u8],
        filename: Option<&str>,
    ) -> Result<DateRange, ImportError> {
        let _ = (content, filename);
        Err(ImportError::DateRangeUnsupported(self.info().id.clone()))
    }
}
