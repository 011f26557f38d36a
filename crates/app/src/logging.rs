use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `MONJOUR_LOG=monjour_archive=debug,info`.
pub const LOG_ENV: &str = "MONJOUR_LOG";
/// When set, the default level drops to `debug`.
pub const DEBUG_ENV: &str = "MONJOUR_DEBUG";

fn default_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

pub fn filter() -> EnvFilter {
    let fallback = default_level(std::env::var_os(DEBUG_ENV).is_some());
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global fmt subscriber. Later calls keep the first one.
pub fn init() {
    let _ = tracing_subscriber::fmt().with_env_filter(filter()).try_init();
}
