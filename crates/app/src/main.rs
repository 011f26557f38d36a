use anyhow::{Context, Result};
use monjour::{logging, App, Config, CONFIG_ENV, DEFAULT_CONFIG_FILE};
use monjour_import::ImporterRegistry;
use std::path::PathBuf;

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn main() -> Result<()> {
    logging::init();

    let path = config_path();
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let archive_dir = config.archive_dir();

    let mut app = App::new(config, ImporterRegistry::with_builtin())
        .with_context(|| format!("Failed to open archive at {}", archive_dir.display()))?;
    app.define_configured_accounts()
        .context("Failed to define configured accounts")?;

    let report = app.run().context("Failed to rebuild the ledger")?;
    for (id, err) in &report.failed {
        tracing::error!(archive_id = %id, error = %err, "skipped archived file");
    }
    tracing::info!(
        accounts = app.accounts().count(),
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        rows = app.data().len(),
        "ledger ready"
    );
    Ok(())
}
