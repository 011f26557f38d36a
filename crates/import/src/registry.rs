use std::sync::Arc;
use thiserror::Error;

use crate::importer::{ImportError, Importer, ImporterInfo};
use crate::providers;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No importer for provider '{provider}' and locale '{locale}'")]
    NoImporter { provider: String, locale: String },
    #[error("Several importers for provider '{provider}' and locale '{locale}': {candidates:?}")]
    AmbiguousImporter {
        provider: String,
        locale: String,
        candidates: Vec<String>,
    },
    #[error("Unknown importer '{0}'")]
    UnknownImporter(String),
    #[error("Importer '{0}' is already registered")]
    DuplicateImporter(String),
    #[error("Failed to create importer '{id}': {source}")]
    Create {
        id: String,
        #[source]
        source: ImportError,
    },
}

pub type ImporterFactory = Box<dyn Fn() -> Result<Arc<dyn Importer>, ImportError> + Send + Sync>;

struct Entry {
    info: ImporterInfo,
    factory: ImporterFactory,
}

/// Fields left as `None` match anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImporterQuery<'a> {
    pub provider: Option<&'a str>,
    pub locale: Option<&'a str>,
    pub version: Option<&'a str>,
}

/// Maps provider + locale + version to importer factories.
///
/// Filled once at startup and only read afterwards.
#[derive(Default)]
pub struct ImporterRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for ImporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| &e.info.id)).finish()
    }
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every importer shipped with the crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        providers::register_builtin(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, info: ImporterInfo, factory: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn() -> Result<Arc<dyn Importer>, ImportError> + Send + Sync + 'static,
    {
        if self.entries.iter().any(|e| e.info.id == info.id) {
            return Err(RegistryError::DuplicateImporter(info.id));
        }
        self.entries.push(Entry {
            info,
            factory: Box::new(factory),
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn infos(&self) -> impl Iterator<Item = &ImporterInfo> {
        self.entries.iter().map(|e| &e.info)
    }

    pub fn get(&self, id: &str) -> Option<&ImporterInfo> {
        self.infos().find(|i| i.id == id)
    }

    pub fn filter(&self, query: &ImporterQuery<'_>) -> Vec<&ImporterInfo> {
        self.infos()
            .filter(|i| query.provider.map_or(true, |p| i.provider == p))
            .filter(|i| query.locale.map_or(true, |l| i.supports_locale(l)))
            .filter(|i| query.version.map_or(true, |v| i.version == v))
            .collect()
    }

    /// The single importer for `provider` that supports `locale`.
    pub fn resolve(&self, provider: &str, locale: &str) -> Result<&ImporterInfo, RegistryError> {
        let query = ImporterQuery {
            provider: Some(provider),
            locale: Some(locale),
            version: None,
        };
        match self.filter(&query).as_slice() {
            [] => Err(RegistryError::NoImporter {
                provider: provider.to_string(),
                locale: locale.to_string(),
            }),
            [one] => Ok(*one),
            many => Err(RegistryError::AmbiguousImporter {
                provider: provider.to_string(),
                locale: locale.to_string(),
                candidates: many.iter().map(|i| i.id.clone()).collect(),
            }),
        }
    }

    pub fn create(&self, id: &str) -> Result<Arc<dyn Importer>, RegistryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.info.id == id)
            .ok_or_else(|| RegistryError::UnknownImporter(id.to_string()))?;
        (entry.factory)().map_err(|source| RegistryError::Create {
            id: id.to_string(),
            source,
        })
    }

    pub fn create_for(&self, provider: &str, locale: &str) -> Result<Arc<dyn Importer>, RegistryError> {
        let id = self.resolve(provider, locale)?.id.clone();
        self.create(&id)
    }
}
