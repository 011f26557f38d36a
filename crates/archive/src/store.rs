use crate::hash;
use crate::record::{ArchiveId, ArchiveOutcome, ArchiveRecord};
use chrono::{Local, NaiveDateTime};
use monjour_core::{AccountId, DateRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ARCHIVE_VERSION: &str = "1.0";
pub const METADATA_FILE: &str = "archive.json";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hash mismatch for {id}: expected {expected}, found {actual}")]
    HashMismatch {
        id: ArchiveId,
        expected: String,
        actual: String,
    },
    #[error("{id} is already registered with is_managed_by_archive={existing}")]
    ManagedMismatch { id: ArchiveId, existing: bool },
    #[error("{id} was imported by {existing}, refusing re-import with {requested}")]
    ImporterMismatch {
        id: ArchiveId,
        existing: String,
        requested: String,
    },
    #[error("{id} belongs to account {existing}, not {requested}")]
    AccountMismatch {
        id: ArchiveId,
        existing: AccountId,
        requested: AccountId,
    },
    #[error("no archive record {0}")]
    NotFound(ArchiveId),
    #[error("archived file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("archive version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: String, expected: String },
    #[error("{path} is not inside {dir}")]
    OutsideArchive { path: PathBuf, dir: PathBuf },
}

/// What to do when a known file comes back through a different importer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimportPolicy {
    #[default]
    AllowImporterChange,
    RejectImporterChange,
}

#[derive(Serialize)]
struct MetadataOut<'a> {
    records: &'a BTreeMap<ArchiveId, ArchiveRecord>,
    archiver_version: &'a str,
}

#[derive(Deserialize)]
struct MetadataIn {
    #[serde(default)]
    records: BTreeMap<ArchiveId, ArchiveRecord>,
}

/// Content-addressed store of imported source files plus a JSON index.
///
/// Layout: `{root}/archive.json` and `{root}/{account_id}/{archive_id}.{ext}`
/// for files the archive manages. Unmanaged files stay where they are and
/// are referenced by absolute path.
#[derive(Debug)]
pub struct Archive {
    root: PathBuf,
    records: BTreeMap<ArchiveId, ArchiveRecord>,
    policy: ReimportPolicy,
}

impl Archive {
    /// Opens the archive at `root`, creating the directory and an empty
    /// index if none exists yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let mut archive = Archive {
            root,
            records: BTreeMap::new(),
            policy: ReimportPolicy::default(),
        };
        if archive.metadata_path().exists() {
            archive.load()?;
        } else {
            archive.save()?;
            tracing::info!(root = %archive.root.display(), "created empty archive");
        }
        Ok(archive)
    }

    pub fn with_policy(mut self, policy: ReimportPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> ReimportPolicy {
        self.policy
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn account_dir(&self, account_id: &AccountId) -> PathBuf {
        self.root.join(account_id.as_str())
    }

    pub fn calculate_file_hash(content: &[u8]) -> String {
        hash::content_hash(content)
    }

    pub fn calculate_archive_id(account_id: &AccountId, content: &[u8]) -> ArchiveId {
        ArchiveId::new(account_id, &Self::calculate_file_hash(content))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &ArchiveId) -> bool {
        self.records.contains_key(id)
    }

    pub fn get_record(&self, id: &ArchiveId) -> Option<&ArchiveRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ArchiveRecord> {
        self.records.values()
    }

    /// Records of one account, oldest coverage first.
    pub fn get_records_for_account(&self, account_id: &AccountId) -> Vec<&ArchiveRecord> {
        let mut out: Vec<&ArchiveRecord> = self
            .records
            .values()
            .filter(|r| &r.account_id == account_id)
            .collect();
        out.sort_by(|a, b| (a.date_start, &a.id).cmp(&(b.date_start, &b.id)));
        out
    }

    /// Where the bytes of `record` live on disk.
    pub fn resolve_path(&self, record: &ArchiveRecord) -> PathBuf {
        if record.is_managed_by_archive {
            self.account_dir(&record.account_id).join(&record.file_path)
        } else {
            record.file_path.clone()
        }
    }

    /// Stores `content` under the archive and registers it.
    ///
    /// Idempotent for identical content: a second call refreshes
    /// `imported_date` and `importer_id` and leaves the stored bytes alone.
    pub fn archive_file(
        &mut self,
        archive_id: &ArchiveId,
        account_id: &AccountId,
        importer_id: &str,
        date_range: DateRange,
        content: &[u8],
        extension: &str,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let file_hash = Self::calculate_file_hash(content);
        let relative = hash::stored_name(archive_id.as_str(), extension);
        let target = self.account_dir(account_id).join(&relative);

        if let Some(previous) =
            self.check_existing(archive_id, account_id, importer_id, &file_hash, true)?
        {
            let source = self.resolve_path(&previous);
            let moved = source != target && source.exists() && !target.exists();
            if moved {
                fs::rename(&source, &target)?;
            }
            let path = if moved || target.exists() {
                relative
            } else {
                previous.file_path.clone()
            };
            return self.refresh(previous, importer_id, path).inspect_err(|_| {
                if moved {
                    if let Err(err) = fs::rename(&target, &source) {
                        tracing::warn!(
                            from = %target.display(),
                            to = %source.display(),
                            error = %err,
                            "could not move archived file back after a failed re-import"
                        );
                    }
                }
            });
        }

        fs::create_dir_all(self.account_dir(account_id))?;
        write_atomic(&target, content)?;
        let record = new_record(
            archive_id,
            account_id,
            importer_id,
            relative,
            file_hash,
            date_range,
            true,
        );
        if let Err(err) = self.insert_and_save(record) {
            if let Err(cleanup) = fs::remove_file(&target) {
                tracing::warn!(path = %target.display(), error = %cleanup, "could not remove orphaned archive file");
            }
            return Err(err);
        }
        tracing::info!(archive_id = %archive_id, account = %account_id, importer = importer_id, "archived file");
        Ok(ArchiveOutcome::Archived)
    }

    /// Registers a file that already exists on disk.
    ///
    /// Managed files must sit under `{root}/{account_id}`; unmanaged files are
    /// stored by absolute path and never deleted by the archive.
    pub fn register_file(
        &mut self,
        archive_id: &ArchiveId,
        account_id: &AccountId,
        importer_id: &str,
        date_range: DateRange,
        filepath: &Path,
        managed: bool,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        if !filepath.exists() {
            return Err(ArchiveError::FileNotFound(filepath.to_path_buf()));
        }
        let absolute = fs::canonicalize(filepath)?;
        let stored = if managed {
            let dir = self.account_dir(account_id);
            let dir = fs::canonicalize(&dir).unwrap_or(dir);
            absolute
                .strip_prefix(&dir)
                .map(Path::to_path_buf)
                .map_err(|_| ArchiveError::OutsideArchive {
                    path: absolute.clone(),
                    dir,
                })?
        } else {
            absolute.clone()
        };
        let file_hash = hash::file_hash(&absolute)?;

        if let Some(previous) =
            self.check_existing(archive_id, account_id, importer_id, &file_hash, managed)?
        {
            return self.refresh(previous, importer_id, stored);
        }

        let record = new_record(
            archive_id,
            account_id,
            importer_id,
            stored,
            file_hash,
            date_range,
            managed,
        );
        self.insert_and_save(record)?;
        tracing::info!(archive_id = %archive_id, account = %account_id, managed, "registered file");
        Ok(ArchiveOutcome::Archived)
    }

    /// Reads the stored bytes, optionally verifying them against the
    /// recorded hash.
    pub fn load_file(&self, id: &ArchiveId, check_hash: bool) -> Result<Vec<u8>, ArchiveError> {
        let record = self
            .records
            .get(id)
            .ok_or_else(|| ArchiveError::NotFound(id.clone()))?;
        let path = self.resolve_path(record);
        if !path.exists() {
            return Err(ArchiveError::FileNotFound(path));
        }
        let content = fs::read(&path)?;
        if check_hash {
            let actual = Self::calculate_file_hash(&content);
            if actual != record.file_hash {
                return Err(ArchiveError::HashMismatch {
                    id: id.clone(),
                    expected: record.file_hash.clone(),
                    actual,
                });
            }
        }
        Ok(content)
    }

    /// Drops the record and, for managed files, the stored bytes.
    pub fn forget_file(&mut self, id: &ArchiveId) -> Result<ArchiveRecord, ArchiveError> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| ArchiveError::NotFound(id.clone()))?;
        if let Err(err) = self.save() {
            self.records.insert(id.clone(), record);
            return Err(err);
        }
        if record.is_managed_by_archive {
            let path = self.resolve_path(&record);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "archived file was already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }
        tracing::info!(archive_id = %id, "forgot file");
        Ok(record)
    }

    /// Writes the index atomically; readers never observe a partial file.
    pub fn save(&self) -> Result<(), ArchiveError> {
        let out = MetadataOut {
            records: &self.records,
            archiver_version: ARCHIVE_VERSION,
        };
        let json = serde_json::to_vec_pretty(&out)?;
        write_atomic(&self.metadata_path(), &json)
    }

    /// Replaces in-memory records with the index on disk.
    pub fn load(&mut self) -> Result<(), ArchiveError> {
        let raw = fs::read(self.metadata_path())?;
        let value: serde_json::Value = serde_json::from_slice(&raw)?;
        let found = value
            .get("archiver_version")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if found != ARCHIVE_VERSION {
            return Err(ArchiveError::VersionMismatch {
                found: found.to_string(),
                expected: ARCHIVE_VERSION.to_string(),
            });
        }
        let meta: MetadataIn = serde_json::from_value(value)?;
        self.records = meta.records;
        tracing::debug!(records = self.records.len(), "loaded archive index");
        Ok(())
    }

    /// Validates a re-registration against the stored record. Returns the
    /// stored record when the id is already known.
    fn check_existing(
        &self,
        id: &ArchiveId,
        account_id: &AccountId,
        importer_id: &str,
        file_hash: &str,
        managed: bool,
    ) -> Result<Option<ArchiveRecord>, ArchiveError> {
        let Some(existing) = self.records.get(id) else {
            return Ok(None);
        };
        if existing.file_hash != file_hash {
            return Err(ArchiveError::HashMismatch {
                id: id.clone(),
                expected: existing.file_hash.clone(),
                actual: file_hash.to_string(),
            });
        }
        if &existing.account_id != account_id {
            return Err(ArchiveError::AccountMismatch {
                id: id.clone(),
                existing: existing.account_id.clone(),
                requested: account_id.clone(),
            });
        }
        if existing.is_managed_by_archive != managed {
            return Err(ArchiveError::ManagedMismatch {
                id: id.clone(),
                existing: existing.is_managed_by_archive,
            });
        }
        if existing.importer_id != importer_id {
            match self.policy {
                ReimportPolicy::AllowImporterChange => tracing::warn!(
                    archive_id = %id,
                    from = %existing.importer_id,
                    to = importer_id,
                    "importer changed on re-import"
                ),
                ReimportPolicy::RejectImporterChange => {
                    return Err(ArchiveError::ImporterMismatch {
                        id: id.clone(),
                        existing: existing.importer_id.clone(),
                        requested: importer_id.to_string(),
                    })
                }
            }
        }
        Ok(Some(existing.clone()))
    }

    fn refresh(
        &mut self,
        previous: ArchiveRecord,
        importer_id: &str,
        file_path: PathBuf,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let mut updated = previous.clone();
        updated.imported_date = now();
        updated.importer_id = importer_id.to_string();
        updated.file_path = file_path;
        let id = updated.id.clone();
        self.records.insert(id.clone(), updated);
        if let Err(err) = self.save() {
            self.records.insert(id, previous);
            return Err(err);
        }
        tracing::info!(archive_id = %id, "file already archived, metadata refreshed");
        Ok(ArchiveOutcome::Reimported)
    }

    fn insert_and_save(&mut self, record: ArchiveRecord) -> Result<(), ArchiveError> {
        let id = record.id.clone();
        self.records.insert(id.clone(), record);
        if let Err(err) = self.save() {
            self.records.remove(&id);
            return Err(err);
        }
        Ok(())
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn new_record(
    id: &ArchiveId,
    account_id: &AccountId,
    importer_id: &str,
    file_path: PathBuf,
    file_hash: String,
    date_range: DateRange,
    managed: bool,
) -> ArchiveRecord {
    ArchiveRecord {
        id: id.clone(),
        imported_date: now(),
        importer_id: importer_id.to_string(),
        account_id: account_id.clone(),
        file_path,
        file_hash,
        date_start: date_range.start,
        date_end: date_range.end,
        is_managed_by_archive: managed,
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArchiveError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
