//! Structured logging for Tessera.
//!
//! Library crates emit records through the `log` facade; this crate installs a
//! `tracing` subscriber that collects them (via the `tracing-log` bridge that
//! `tracing-subscriber` enables by default) together with native `tracing`
//! events from the binary.

use std::path::{Path, PathBuf};

use tessera_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "tessera.log";

/// Initialize the global subscriber.
///
/// Console output is always enabled. When `debug_build` is set and a log
/// directory is available (from `log_dir` or `config.debug.log_dir`), a JSON
/// file layer is added as well. `RUST_LOG` takes precedence over the
/// configured level.
///
/// Calling this twice in one process is a no-op for the second call.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let file_dir: Option<PathBuf> = log_dir
        .map(Path::to_path_buf)
        .or_else(|| config.and_then(|c| c.debug.log_dir.clone()));

    if debug_build
        && let Some(dir) = file_dir
        && std::fs::create_dir_all(&dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(&dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        let _ = subscriber.with(file_layer).try_init();
        return;
    }

    let _ = subscriber.try_init();
}

/// Filter directives derived from the config, falling back to [`DEFAULT_FILTER`].
///
/// A bare level such as `"debug"` keeps the GPU crates at `warn`.
pub fn filter_directives(config: Option<&Config>) -> String {
    match config.map(|c| c.debug.log_level.trim()) {
        Some(level) if !level.is_empty() && !level.contains('=') => {
            format!("{level},wgpu=warn,naga=warn")
        }
        Some(level) if !level.is_empty() => level.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Path of the JSON log file inside `dir`.
pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}
