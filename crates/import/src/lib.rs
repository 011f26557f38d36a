pub mod context;
pub mod csv;
pub mod importer;
pub mod providers;
pub mod registry;
pub mod steps;

pub use context::ImportContext;
pub use crate::csv::{CastOptions, CsvImporter, CsvOptions, DateFormat, NumberFormat};
pub use importer::{ImportError, ImportExecutor, Importer, ImporterInfo};
pub use registry::{ImporterFactory, ImporterQuery, ImporterRegistry, RegistryError};
