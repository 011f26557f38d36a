use indexmap::IndexMap;
use monjour_archive::{Archive, ArchiveError, ArchiveId, ArchiveOutcome, ArchiveRecord};
use monjour_core::{
    run_pipeline, AccountId, Category, DateRange, Diagnostics, ExecError, ImmediateExecutor,
    RecordBatch, SchemaError,
};
use monjour_import::context::extension_of;
use monjour_import::{ImportContext, ImportError, ImportExecutor, ImporterRegistry, RegistryError};
use std::path::Path;
use thiserror::Error;

use crate::account::Account;
use crate::config::Config;
use crate::merge::{Advancing, MergeContext, MergeExecutor};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Unknown account '{0}'")]
    UnknownAccount(AccountId),
    #[error("Account '{0}' is already defined")]
    DuplicateAccount(AccountId),
    #[error("Account '{0}' has no importer")]
    NoImporter(AccountId),
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

/// Result of one successful import.
#[derive(Debug)]
pub struct Imported {
    pub archive_id: ArchiveId,
    pub outcome: ArchiveOutcome,
    pub rows: usize,
    pub diagnostics: Diagnostics,
}

/// What [`App::load_all_from_archive`] managed to load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ArchiveId>,
    pub failed: Vec<(ArchiveId, AppError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Accounts, their archive and the merged master ledger.
pub struct App {
    config: Config,
    registry: ImporterRegistry,
    archive: Archive,
    accounts: IndexMap<AccountId, Account>,
    categories: Vec<Category>,
    data: RecordBatch,
}

impl App {
    /// Opens (or creates) the archive under the configured data directory.
    pub fn new(config: Config, registry: ImporterRegistry) -> Result<Self, AppError> {
        let archive = Archive::open(config.archive_dir())?.with_policy(config.reimport_policy);
        Ok(Self::with_archive(config, registry, archive))
    }

    pub fn with_archive(config: Config, registry: ImporterRegistry, archive: Archive) -> Self {
        let categories = config.categories.clone();
        App {
            config,
            registry,
            archive,
            accounts: IndexMap::new(),
            categories,
            data: RecordBatch::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn registry(&self) -> &ImporterRegistry {
        &self.registry
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Master ledger produced by the last merge.
    pub fn data(&self) -> &RecordBatch {
        &self.data
    }

    /// Adds accounts in order. An account without an importer gets the one
    /// named by its config, else the registry's match for its provider and
    /// locale. An account still on the base schema takes its provider's.
    pub fn define_accounts<I>(&mut self, accounts: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = Account>,
    {
        for mut account in accounts {
            if self.accounts.contains_key(account.id()) {
                return Err(AppError::DuplicateAccount(account.id().clone()));
            }
            account.adopt_provider_schema()?;
            if account.importer().is_none() {
                let importer = match account.importer_id() {
                    Some(id) => self.registry.create(id)?,
                    None => self
                        .registry
                        .create_for(&account.info.provider, &account.info.locale)?,
                };
                account.set_importer(importer);
            }
            tracing::debug!(account = %account.id(), provider = %account.info.provider, "defined account");
            self.accounts.insert(account.id().clone(), account);
        }
        Ok(())
    }

    /// Defines every `[[accounts]]` table of the config.
    pub fn define_configured_accounts(&mut self) -> Result<(), AppError> {
        let accounts = self
            .config
            .accounts
            .iter()
            .map(|table| Account::from_config(table, &self.config))
            .collect::<Result<Vec<_>, _>>()?;
        self.define_accounts(accounts)
    }

    pub fn define_categories<I>(&mut self, categories: I)
    where
        I: IntoIterator<Item = Category>,
    {
        self.categories.extend(categories);
    }

    /// Imports a file in place: the archive records its absolute path and
    /// never copies or deletes it.
    pub fn import_file(
        &mut self,
        account_id: &AccountId,
        path: &Path,
        date_range: Option<DateRange>,
        executor: &ImportExecutor,
    ) -> Result<Imported, AppError> {
        let content = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::InvalidFilename(path.display().to_string()))?;
        let (batch, info) = self.import_content(account_id, &content, &filename, date_range, executor)?;
        let outcome = self.archive.register_file(
            &info.archive_id,
            account_id,
            &info.importer_id,
            info.date_range,
            path,
            false,
        )?;
        self.store(account_id, info, batch, outcome)
    }

    /// Imports `content` and keeps a managed copy in the archive.
    pub fn archive_file(
        &mut self,
        account_id: &AccountId,
        content: &[u8],
        filename: &str,
        date_range: Option<DateRange>,
        executor: &ImportExecutor,
    ) -> Result<Imported, AppError> {
        let extension = extension_of(filename)
            .ok_or_else(|| AppError::InvalidFilename(filename.to_string()))?
            .to_string();
        let (batch, info) = self.import_content(account_id, content, filename, date_range, executor)?;
        let outcome = self.archive.archive_file(
            &info.archive_id,
            account_id,
            &info.importer_id,
            info.date_range,
            content,
            &extension,
        )?;
        self.store(account_id, info, batch, outcome)
    }

    /// Re-imports every archived file of every defined account.
    ///
    /// A file that fails is reported and skipped; the rest still load.
    pub fn load_all_from_archive(&mut self, check_hash: bool) -> LoadReport {
        let mut report = LoadReport::default();
        let ids: Vec<AccountId> = self.accounts.keys().cloned().collect();
        for account_id in ids {
            let records: Vec<ArchiveRecord> = self
                .archive
                .get_records_for_account(&account_id)
                .into_iter()
                .cloned()
                .collect();
            for record in records {
                match self.load_record(&record, check_hash) {
                    Ok(rows) => {
                        tracing::debug!(archive_id = %record.id, rows, "loaded archived file");
                        report.loaded.push(record.id);
                    }
                    Err(err) => {
                        tracing::error!(archive_id = %record.id, error = %err, "failed to load archived file");
                        report.failed.push((record.id, err));
                    }
                }
            }
        }
        report
    }

    /// Merges the given accounts (all, in definition order, when `None`) into
    /// the master ledger. Returns `None` when there is nothing to merge.
    pub fn merge_accounts(
        &mut self,
        ids: Option<&[AccountId]>,
        executor: &MergeExecutor,
    ) -> Result<Option<MergeContext>, AppError> {
        let selected: Vec<&Account> = match ids {
            Some(ids) => ids
                .iter()
                .map(|id| {
                    self.accounts
                        .get(id)
                        .ok_or_else(|| AppError::UnknownAccount(id.clone()))
                })
                .collect::<Result<_, _>>()?,
            None => self.accounts.values().collect(),
        };
        if selected.is_empty() {
            tracing::warn!("no accounts to merge");
            return Ok(None);
        }

        let mut ctx = MergeContext::new(
            self.categories.clone(),
            selected.iter().map(|a| (a.id().clone(), a.data().clone())),
        );
        let pipeline: Vec<_> = selected.iter().map(|a| Advancing::wrap(a.merger())).collect();
        let result = run_pipeline(executor, "merge_accounts", &mut ctx, RecordBatch::new(), &pipeline);
        ctx.diagnostics.log_all();
        self.data = result?;
        tracing::info!(accounts = pipeline.len(), rows = self.data.len(), "merged accounts");
        Ok(Some(ctx))
    }

    /// Drops a file from the archive together with the rows it produced.
    pub fn forget_file(&mut self, id: &ArchiveId) -> Result<ArchiveRecord, AppError> {
        let record = self.archive.forget_file(id)?;
        if let Some(account) = self.accounts.get_mut(&record.account_id) {
            let removed = account.remove_archive_rows(id);
            tracing::debug!(archive_id = %id, removed, "removed rows of forgotten file");
        }
        Ok(record)
    }

    /// Reloads the archive, every account and the master ledger.
    pub fn run(&mut self) -> Result<LoadReport, AppError> {
        self.archive.load()?;
        let report = self.load_all_from_archive(false);
        self.merge_accounts(None, &ImmediateExecutor)?;
        Ok(report)
    }

    fn account_or_err(&self, id: &AccountId) -> Result<&Account, AppError> {
        self.accounts
            .get(id)
            .ok_or_else(|| AppError::UnknownAccount(id.clone()))
    }

    fn import_content(
        &self,
        account_id: &AccountId,
        content: &[u8],
        filename: &str,
        date_range: Option<DateRange>,
        executor: &ImportExecutor,
    ) -> Result<(RecordBatch, ImportContext), AppError> {
        let account = self.account_or_err(account_id)?;
        let importer = account
            .importer()
            .ok_or_else(|| AppError::NoImporter(account_id.clone()))?;
        let date_range = match date_range {
            Some(range) => range,
            None => importer.try_infer_date_range(content, Some(filename))?,
        };
        let archive_id = Archive::calculate_archive_id(account_id, content);
        let mut ctx = ImportContext::new(
            account.info.clone(),
            archive_id,
            date_range,
            filename,
            &importer.info().id,
        )?;
        let result = importer.import_file(&mut ctx, content, executor);
        ctx.diagnostics.log_all();
        Ok((result?, ctx))
    }

    fn store(
        &mut self,
        account_id: &AccountId,
        ctx: ImportContext,
        batch: RecordBatch,
        outcome: ArchiveOutcome,
    ) -> Result<Imported, AppError> {
        let account = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| AppError::UnknownAccount(account_id.clone()))?;
        account.replace_archive_rows(&ctx.archive_id, &batch)?;
        Ok(Imported {
            archive_id: ctx.archive_id,
            outcome,
            rows: batch.len(),
            diagnostics: ctx.diagnostics,
        })
    }

    fn load_record(&mut self, record: &ArchiveRecord, check_hash: bool) -> Result<usize, AppError> {
        let content = self.archive.load_file(&record.id, check_hash)?;
        let filename = record
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::InvalidFilename(record.file_path.display().to_string()))?;
        let account = self.account_or_err(&record.account_id)?;
        let importer = account
            .importer()
            .ok_or_else(|| AppError::NoImporter(record.account_id.clone()))?;
        let mut ctx = ImportContext::new(
            account.info.clone(),
            record.id.clone(),
            record.date_range(),
            &filename,
            &importer.info().id,
        )?;
        let result = importer.import_file(&mut ctx, &content, &ImmediateExecutor);
        ctx.diagnostics.log_all();
        let batch = result?;
        let rows = batch.len();
        if let Some(account) = self.accounts.get_mut(&record.account_id) {
            account.replace_archive_rows(&record.id, &batch)?;
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::AppendMerger;
    use monjour_archive::ReimportPolicy;
    use monjour_core::{AccountInfo, DeferredExecutor, RecordingExecutor, Severity, Value};
    use tempfile::TempDir;

    const THREE_ROWS: &[u8] =
        b"date,amount,desc\n2024-01-05,-12.50,Groceries\n2024-01-09,1500,Salary\n2024-01-20,-3.2,Coffee\n";

    fn app(dir: &TempDir) -> App {
        App::new(Config::new("EUR", "en_US", dir.path()), ImporterRegistry::with_builtin()).unwrap()
    }

    fn generic(id: &str) -> Account {
        Account::new(AccountInfo::new(id, "generic", "en_US", "EUR"))
    }

    fn january() -> Option<DateRange> {
        DateRange::for_month_year(1, 2024)
    }

    fn csv_for(tag: &str, n: usize) -> Vec<u8> {
        let mut out = String::from("date,amount,desc\n");
        for i in 0..n {
            out.push_str(&format!("2024-01-{:02},{i},{tag}\n", i + 1));
        }
        out.into_bytes()
    }

    fn column_text(batch: &RecordBatch, column: &str) -> Vec<String> {
        batch
            .column(column)
            .unwrap()
            .values()
            .iter()
            .map(|v| v.as_text().unwrap_or_default().to_string())
            .collect()
    }

    // ── import ───────────────────────────────────────────────────────────────

    #[test]
    fn three_row_csv_into_fresh_account() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        let id = AccountId::from("wallet");

        let imported = app
            .archive_file(&id, THREE_ROWS, "jan.csv", january(), &ImmediateExecutor)
            .unwrap();

        assert_eq!(imported.outcome, ArchiveOutcome::Archived);
        assert_eq!(imported.rows, 3);
        assert_eq!(imported.diagnostics.count(Severity::Error), 0);
        assert_eq!(app.archive().len(), 1);
        let record = app.archive().get_record(&imported.archive_id).unwrap();
        assert!(record.is_managed_by_archive);
        assert!(app.archive().resolve_path(record).exists());

        let data = app.account(&id).unwrap().data();
        assert_eq!(data.len(), 3);
        for row in 0..3 {
            assert_eq!(
                data.value("archive_id", row),
                Some(&Value::text(imported.archive_id.as_str()))
            );
        }
    }

    #[test]
    fn reimport_keeps_ledger_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        let id = AccountId::from("wallet");

        let first = app
            .archive_file(&id, THREE_ROWS, "jan.csv", january(), &ImmediateExecutor)
            .unwrap();
        let second = app
            .archive_file(&id, THREE_ROWS, "jan.csv", january(), &ImmediateExecutor)
            .unwrap();

        assert_eq!(first.archive_id, second.archive_id);
        assert_eq!(second.outcome, ArchiveOutcome::Reimported);
        assert_eq!(app.archive().len(), 1);
        assert_eq!(app.account(&id).unwrap().data().len(), 3);
    }

    #[test]
    fn date_range_is_inferred_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        let imported = app
            .archive_file(&AccountId::from("wallet"), THREE_ROWS, "jan.csv", None, &ImmediateExecutor)
            .unwrap();
        let record = app.archive().get_record(&imported.archive_id).unwrap();
        assert_eq!(record.date_start.to_string(), "2024-01-05 00:00:00");
        assert_eq!(record.date_end.to_string(), "2024-01-20 00:00:00");
    }

    #[test]
    fn import_in_place_is_unmanaged() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let path = outside.path().join("statement.csv");
        std::fs::write(&path, THREE_ROWS).unwrap();

        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        let imported = app
            .import_file(&AccountId::from("wallet"), &path, january(), &ImmediateExecutor)
            .unwrap();

        let record = app.archive().get_record(&imported.archive_id).unwrap();
        assert!(!record.is_managed_by_archive);
        assert!(record.file_path.is_absolute());
        assert_eq!(imported.rows, 3);
    }

    #[test]
    fn failed_import_archives_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        let err = app
            .archive_file(&AccountId::from("wallet"), b"no date column\n1\n", "x.csv", None, &ImmediateExecutor)
            .unwrap_err();
        assert!(matches!(err, AppError::Import(ImportError::DateRangeInference(_))));
        assert!(app.archive().is_empty());
    }

    #[test]
    fn unknown_account_and_bad_filename() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        assert!(matches!(
            app.archive_file(&AccountId::from("nope"), THREE_ROWS, "a.csv", january(), &ImmediateExecutor),
            Err(AppError::UnknownAccount(_))
        ));
        assert!(matches!(
            app.archive_file(&AccountId::from("wallet"), THREE_ROWS, "noext", january(), &ImmediateExecutor),
            Err(AppError::InvalidFilename(_))
        ));
        assert!(matches!(
            app.define_accounts([generic("wallet")]),
            Err(AppError::DuplicateAccount(_))
        ));
    }

    #[test]
    fn recording_executor_sees_the_import_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        let recording: RecordingExecutor<ImportContext, RecordBatch> = RecordingExecutor::new();
        app.archive_file(&AccountId::from("wallet"), THREE_ROWS, "jan.csv", january(), &recording)
            .unwrap();
        let runs = recording.take_runs();
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].failed());
    }

    // ── archive reload ───────────────────────────────────────────────────────

    #[test]
    fn reload_from_archive_rebuilds_accounts() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = app(&dir);
            app.define_accounts([generic("a"), generic("b")]).unwrap();
            app.archive_file(&AccountId::from("a"), &csv_for("a", 2), "a.csv", january(), &ImmediateExecutor)
                .unwrap();
            app.archive_file(&AccountId::from("b"), &csv_for("b", 3), "b.csv", january(), &ImmediateExecutor)
                .unwrap();
        }

        let mut app = app(&dir);
        app.define_accounts([generic("a"), generic("b")]).unwrap();
        let report = app.run().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.loaded.len(), 2);
        assert_eq!(app.data().len(), 5);
    }

    #[test]
    fn corrupt_file_does_not_block_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("a"), generic("b")]).unwrap();
        let bad = app
            .archive_file(&AccountId::from("a"), &csv_for("a", 2), "a.csv", january(), &ImmediateExecutor)
            .unwrap();
        app.archive_file(&AccountId::from("b"), &csv_for("b", 3), "b.csv", january(), &ImmediateExecutor)
            .unwrap();
        let path = app.archive().resolve_path(app.archive().get_record(&bad.archive_id).unwrap());
        std::fs::write(path, b"date,amount,desc\n2024-01-01,9,tampered\n").unwrap();

        let report = app.load_all_from_archive(true);
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, bad.archive_id);
        assert!(matches!(
            report.failed[0].1,
            AppError::Archive(ArchiveError::HashMismatch { .. })
        ));
    }

    #[test]
    fn forget_file_drops_its_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([generic("wallet")]).unwrap();
        let id = AccountId::from("wallet");
        let imported = app
            .archive_file(&id, THREE_ROWS, "jan.csv", january(), &ImmediateExecutor)
            .unwrap();
        let record = app.forget_file(&imported.archive_id).unwrap();
        assert!(!app.archive().resolve_path(&record).exists());
        assert!(app.account(&id).unwrap().data().is_empty());
    }

    // ── merge ────────────────────────────────────────────────────────────────

    fn three_accounts(dir: &TempDir) -> App {
        let mut app = app(dir);
        app.define_accounts([generic("a"), generic("b"), generic("c")]).unwrap();
        for (id, n) in [("a", 2), ("b", 1), ("c", 2)] {
            app.archive_file(&AccountId::from(id), &csv_for(id, n), "f.csv", january(), &ImmediateExecutor)
                .unwrap();
        }
        app
    }

    #[test]
    fn merge_is_a_stable_union_in_account_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = three_accounts(&dir);
        let ids = [AccountId::from("a"), AccountId::from("b"), AccountId::from("c")];
        let ctx = app.merge_accounts(Some(&ids[..]), &ImmediateExecutor).unwrap().unwrap();
        assert_eq!(ctx.merged(), &ids[..2]);
        assert_eq!(column_text(app.data(), "account_id"), ["a", "a", "b", "c", "c"]);

        let reversed = [AccountId::from("c"), AccountId::from("a")];
        app.merge_accounts(Some(&reversed[..]), &ImmediateExecutor).unwrap();
        assert_eq!(column_text(app.data(), "account_id"), ["c", "c", "a", "a"]);
    }

    #[test]
    fn deferred_merge_gives_the_same_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = three_accounts(&dir);
        app.merge_accounts(None, &ImmediateExecutor).unwrap();
        let immediate = app.data().clone();
        app.merge_accounts(None, &DeferredExecutor).unwrap();
        assert_eq!(app.data(), &immediate);
    }

    #[test]
    fn nothing_to_merge_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        assert!(app.merge_accounts(None, &ImmediateExecutor).unwrap().is_none());
        assert!(app.merge_accounts(Some(&[][..]), &ImmediateExecutor).unwrap().is_none());
        assert!(matches!(
            app.merge_accounts(Some(&[AccountId::from("ghost")][..]), &ImmediateExecutor),
            Err(AppError::UnknownAccount(_))
        ));
    }

    #[test]
    fn misbound_merger_fails_the_merge() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        let stray = generic("a").with_merger(AppendMerger::new(AccountId::from("b")).shared());
        app.define_accounts([stray]).unwrap();
        let err = app.merge_accounts(None, &ImmediateExecutor).unwrap_err();
        assert!(matches!(err, AppError::Exec(ExecError::Step { .. })));
    }

    // ── configuration ────────────────────────────────────────────────────────

    #[test]
    fn configured_accounts_resolve_importers() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
currency = "EUR"
locale = "it_IT"
appdata_dir = "{}"
reimport_policy = "reject_importer_change"

[[accounts]]
id = "uc"
provider = "unicredit"

[[accounts]]
id = "cash"
provider = "generic"
importer = "generic_any_v1.0"
"#,
            dir.path().display()
        );
        let config = Config::from_toml_str(&toml).unwrap();
        let mut app = App::new(config, ImporterRegistry::with_builtin()).unwrap();
        app.define_configured_accounts().unwrap();

        let uc = app.account(&AccountId::from("uc")).unwrap();
        assert_eq!(uc.importer().unwrap().info().id, "unicredit_it_IT_v1.0");
        let cash = app.account(&AccountId::from("cash")).unwrap();
        assert_eq!(cash.importer().unwrap().info().id, "generic_any_v1.0");
        assert_eq!(app.archive().policy(), ReimportPolicy::RejectImporterChange);
    }

    #[test]
    fn code_defined_provider_account_keeps_provider_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.define_accounts([Account::new(AccountInfo::new("uc", "unicredit", "it_IT", "EUR"))])
            .unwrap();
        let statement = "Data Registrazione;Data valuta;Descrizione;Importo (EUR)\n\
03/01/2024;03/01/2024; 123456789012345,000001   PAGAMENTO E-Commerce del 02/01/2024   CARTA *1234   DI EUR   12,50   AMAZON EU   LUXEMBOURG;-12,50\n";
        let id = AccountId::from("uc");
        app.archive_file(&id, statement.as_bytes(), "uc.csv", january(), &ImmediateExecutor)
            .unwrap();

        let data = app.account(&id).unwrap().data();
        assert_eq!(data.len(), 1);
        assert_eq!(data.value("unicredit_id", 0), Some(&Value::text("123456789012345,000001")));
        assert_eq!(data.value("unicredit_category", 0), Some(&Value::text("ECommerce")));
    }

    #[test]
    fn unresolvable_provider_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        let account = Account::new(AccountInfo::new("x", "unicredit", "fr_FR", "EUR"));
        assert!(matches!(
            app.define_accounts([account]),
            Err(AppError::Registry(RegistryError::NoImporter { .. }))
        ));
    }
}
