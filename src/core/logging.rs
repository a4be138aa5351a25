use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt::layer as fmt_layer, prelude::*, EnvFilter, Registry};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: stdout always, plus an append-only log
/// file when `log_file` is given. `RUST_LOG` overrides the default filter.
pub fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn,chromiumoxide=warn"));

    let stdout = fmt_layer().with_writer(std::io::stdout);

    let file_layer = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)
                .with_context(|| format!("creating log directory {}", directory.display()))?;
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("invalid log file path {}", path.display()))?;

            let (non_blocking, guard) =
                tracing_appender::non_blocking(rolling::never(directory, file_name));
            let _ = FILE_GUARD.set(guard);
            Some(fmt_layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    Registry::default()
        .with(env_filter)
        .with(stdout)
        .with(file_layer)
        .try_init()
        .context("failed to init tracing subscriber")?;
    Ok(())
}
