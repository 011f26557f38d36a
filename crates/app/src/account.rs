use monjour_archive::ArchiveId;
use monjour_core::{AccountId, AccountInfo, RecordBatch, Schema, SchemaError, Value};
use monjour_import::providers::{paypal, unicredit};
use monjour_import::Importer;
use std::fmt;
use std::sync::Arc;

use crate::config::{AccountConfig, Config};
use crate::merge::{AppendMerger, MergeStep};

/// Record schema for a provider; unknown providers get the base schema.
pub fn provider_schema(provider: &str) -> Result<Schema, SchemaError> {
    match provider {
        "unicredit" => unicredit::schema(),
        "paypal" => paypal::schema(),
        _ => Ok(Schema::transaction()),
    }
}

/// One account's identity, how it imports and merges, and its rows so far.
pub struct Account {
    pub info: AccountInfo,
    importer: Option<Arc<dyn Importer>>,
    importer_id: Option<String>,
    merger: Option<MergeStep>,
    data: RecordBatch,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.info.id)
            .field("provider", &self.info.provider)
            .field("importer", &self.importer.as_ref().map(|i| i.info().id.clone()))
            .field("rows", &self.data.len())
            .finish()
    }
}

impl Account {
    pub fn new(info: AccountInfo) -> Self {
        let data = RecordBatch::empty(&info.schema);
        Account {
            info,
            importer: None,
            importer_id: None,
            merger: None,
            data,
        }
    }

    /// Builds an account from its config table, taking locale and currency
    /// from the top level when the table leaves them out.
    pub fn from_config(account: &AccountConfig, config: &Config) -> Result<Self, SchemaError> {
        let locale = account.locale.as_deref().unwrap_or(&config.locale);
        let currency = account.currency.as_deref().unwrap_or(&config.currency);
        let mut info = AccountInfo::new(account.id.as_str(), &account.provider, locale, currency)
            .with_schema(provider_schema(&account.provider)?);
        if let Some(name) = &account.name {
            info = info.with_name(name);
        }
        let mut built = Account::new(info);
        built.importer_id = account.importer.clone();
        Ok(built)
    }

    pub fn with_importer(mut self, importer: Arc<dyn Importer>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn with_merger(mut self, merger: MergeStep) -> Self {
        self.merger = Some(merger);
        self
    }

    pub fn id(&self) -> &AccountId {
        &self.info.id
    }

    pub fn importer(&self) -> Option<&Arc<dyn Importer>> {
        self.importer.as_ref()
    }

    /// Importer id requested by configuration, if any.
    pub fn importer_id(&self) -> Option<&str> {
        self.importer_id.as_deref()
    }

    pub(crate) fn set_importer(&mut self, importer: Arc<dyn Importer>) {
        self.importer = Some(importer);
    }

    /// Moves an account still on the base schema to its provider's schema,
    /// so provider columns survive import.
    pub(crate) fn adopt_provider_schema(&mut self) -> Result<(), SchemaError> {
        if self.info.schema != Schema::transaction() {
            return Ok(());
        }
        let schema = provider_schema(&self.info.provider)?;
        if schema == self.info.schema {
            return Ok(());
        }
        if self.data.is_empty() {
            self.data = RecordBatch::empty(&schema);
        }
        self.info.schema = schema;
        Ok(())
    }

    /// The configured merger, or an [`AppendMerger`] bound to this account.
    pub fn merger(&self) -> MergeStep {
        self.merger
            .clone()
            .unwrap_or_else(|| AppendMerger::new(self.info.id.clone()).shared())
    }

    pub fn data(&self) -> &RecordBatch {
        &self.data
    }

    /// Swaps in `batch` for the rows previously imported from `archive_id`.
    pub(crate) fn replace_archive_rows(
        &mut self,
        archive_id: &ArchiveId,
        batch: &RecordBatch,
    ) -> Result<(), SchemaError> {
        let mut data = self.data.clone();
        data.retain_where("archive_id", |v| !is_archive(v, archive_id));
        data.append(batch)?;
        self.data = data;
        Ok(())
    }

    pub(crate) fn remove_archive_rows(&mut self, archive_id: &ArchiveId) -> usize {
        let before = self.data.len();
        self.data.retain_where("archive_id", |v| !is_archive(v, archive_id));
        before - self.data.len()
    }
}

fn is_archive(value: &Value, archive_id: &ArchiveId) -> bool {
    value.as_text() == Some(archive_id.as_str())
}
