pub mod account;
pub mod app;
pub mod config;
pub mod logging;
pub mod merge;

pub use account::{provider_schema, Account};
pub use app::{App, AppError, Imported, LoadReport};
pub use config::{AccountConfig, Config, ConfigError, CONFIG_ENV, DEFAULT_CONFIG_FILE};
pub use merge::{Advancing, AppendMerger, MergeContext, MergeError, MergeExecutor, MergeStep};
