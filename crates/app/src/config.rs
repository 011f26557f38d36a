use monjour_archive::ReimportPolicy;
use monjour_core::Category;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Env var naming the config file; the first CLI argument is the fallback.
pub const CONFIG_ENV: &str = "MONJOUR_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "monjour.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Account '{0}' is declared twice")]
    DuplicateAccount(String),
}

/// One `[[accounts]]` table. Unset fields fall back to the top-level
/// `locale` and `currency`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub provider: String,
    pub name: Option<String>,
    pub locale: Option<String>,
    pub currency: Option<String>,
    /// Importer id; resolved from provider and locale when unset.
    pub importer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// ISO 4217 code used for accounts that set none.
    pub currency: String,
    pub locale: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_appdata_dir")]
    pub appdata_dir: PathBuf,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub reimport_policy: ReimportPolicy,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_appdata_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "monjour", "monjour")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".monjour"))
}

impl Config {
    pub fn new(currency: &str, locale: &str, appdata_dir: impl Into<PathBuf>) -> Self {
        Config {
            currency: currency.to_string(),
            locale: locale.to_string(),
            time_zone: default_time_zone(),
            appdata_dir: appdata_dir.into(),
            name: String::new(),
            surname: String::new(),
            reimport_policy: ReimportPolicy::default(),
            accounts: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        let mut seen = HashSet::new();
        for account in &config.accounts {
            if !seen.insert(account.id.as_str()) {
                return Err(ConfigError::DuplicateAccount(account.id.clone()));
            }
        }
        Ok(config)
    }

    /// Reads a config file. A relative `appdata_dir` is taken relative to
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if config.appdata_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.appdata_dir = parent.join(&config.appdata_dir);
            }
        }
        tracing::debug!(path = %path.display(), accounts = config.accounts.len(), "loaded config");
        Ok(config)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.appdata_dir.join("archive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
currency = "EUR"
locale = "it_IT"
time_zone = "Europe/Rome"
appdata_dir = "data"
name = "Ada"
reimport_policy = "reject_importer_change"

[[accounts]]
id = "uc"
provider = "unicredit"
name = "Unicredit"

[[accounts]]
id = "pp"
provider = "paypal"
currency = "USD"
importer = "paypal_it_IT_v1.0"

[[categories]]
name = "Food"
emoji = "🍕"
children = [{ name = "Groceries" }]
"#;

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.time_zone, "Europe/Rome");
        assert_eq!(config.surname, "");
        assert_eq!(config.reimport_policy, ReimportPolicy::RejectImporterChange);
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].locale, None);
        assert_eq!(config.accounts[1].currency.as_deref(), Some("USD"));
        assert_eq!(config.categories[0].children[0].name, "Groceries");
    }

    #[test]
    fn optional_fields_have_defaults() {
        let config = Config::from_toml_str("currency = \"EUR\"\nlocale = \"en_US\"\n").unwrap();
        assert_eq!(config.time_zone, "UTC");
        assert_eq!(config.reimport_policy, ReimportPolicy::AllowImporterChange);
        assert!(config.accounts.is_empty());
        assert!(config.archive_dir().ends_with("archive"));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = Config::from_toml_str("locale = \"en_US\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let toml = r#"
currency = "EUR"
locale = "it_IT"
[[accounts]]
id = "a"
provider = "generic"
[[accounts]]
id = "a"
provider = "paypal"
"#;
        assert!(matches!(
            Config::from_toml_str(toml),
            Err(ConfigError::DuplicateAccount(id)) if id == "a"
        ));
    }

    #[test]
    fn load_resolves_relative_appdata_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.appdata_dir, dir.path().join("data"));
        assert_eq!(config.archive_dir(), dir.path().join("data").join("archive"));
    }
}
