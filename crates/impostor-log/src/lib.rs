//! Structured logging for the impostor system.
//!
//! Library crates log through the `log` facade; this crate installs a
//! `tracing` subscriber that picks those records up along with native
//! `tracing` events. Console output is always on; a JSON file layer is added
//! when the config names a file.

use std::path::Path;

use impostor_config::LogConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when the config leaves the level empty.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Panics if a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(path) = config.json_file.as_deref()
        && let Some(log_file) = create_log_file(path)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        tracing::debug!(file = %path.display(), "JSON log file enabled");
        return;
    }

    subscriber.init();
}

/// The filter directive for `config`, falling back to [`DEFAULT_FILTER`].
pub fn filter_directive(config: &LogConfig) -> String {
    if config.level.trim().is_empty() {
        DEFAULT_FILTER.to_string()
    } else {
        config.level.clone()
    }
}

fn create_log_file(path: &Path) -> Option<std::fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).ok()?;
    }
    std::fs::File::create(path).ok()
}
