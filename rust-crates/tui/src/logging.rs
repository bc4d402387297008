use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::path::Path;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const LOG_FILE_PREFIX: &str = "coinflip.log";

/// Logs to a daily file under `log_dir` so nothing is written over the
/// terminal UI. Keep the guard alive until exit or buffered lines are lost.
pub fn init_file_tracing(log_dir: &Path, level: Option<&str>) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
    fmt()
        .with_env_filter(env_filter(level)?)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

/// For the non-interactive subcommands.
pub fn init_stderr_tracing(level: Option<&str>) -> Result<()> {
    fmt()
        .with_env_filter(env_filter(level)?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))
}

fn env_filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(directives) => EnvFilter::try_new(directives)
            .wrap_err_with(|| format!("Invalid log level '{directives}'")),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn env_filter__accepts_levels_and_directives() {
        assert!(env_filter(Some("debug")).is_ok());
        assert!(env_filter(Some("coinflip=trace,offline_cache=warn")).is_ok());
    }

    #[test]
    fn env_filter__rejects_garbage() {
        assert!(env_filter(Some("coinflip=loudly")).is_err());
    }
}
