// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization for FEAGI
//!
//! Console output is always installed (text or json). With the `file-logging` feature and
//! `logging.file_logging = true`, a combined json log is also written to a timestamped run
//! folder with daily rotation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use feagi_config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{filter_directives, LogFormat};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps file writers alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder, when file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Build an `EnvFilter` from `[logging]` and the debug flags
pub fn build_filter(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<EnvFilter> {
    let directives = filter_directives(config, debug_flags);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter: {}", directives))
}

/// Install the global subscriber
///
/// # Errors
/// Fails on an invalid level or format, if the run folder cannot be created, or if a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    let format: LogFormat = config.format.parse()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(build_filter(config, debug_flags)?)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_thread_names(true)
            .with_filter(build_filter(config, debug_flags)?)
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let (file_guards, log_dir) = if config.file_logging {
        let (layer, guard, run_folder) = file_layer(config, debug_flags)?;
        layers.push(layer);
        (vec![guard], Some(run_folder))
    } else {
        (Vec::new(), None)
    };
    #[cfg(not(feature = "file-logging"))]
    let log_dir: Option<PathBuf> = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("Global tracing subscriber already installed")?;

    if cfg!(not(feature = "file-logging")) && config.file_logging {
        tracing::warn!("logging.file_logging is set but feagi-observability was built without the file-logging feature");
    }

    tracing::info!(
        "Logging initialized (level={}, format={:?}, file={})",
        config.level,
        format,
        log_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "off".to_string())
    );

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
    })
}

/// Initialize with `LoggingConfig::default()` plus `FEAGI_DEBUG` / `--debug-*` flags
pub fn init_logging_default() -> Result<LoggingGuard> {
    init_logging(&LoggingConfig::default(), &crate::cli::parse_debug_flags())
}

/// Runs kept under `log_dir`; older run folders are removed at startup
#[cfg(feature = "file-logging")]
pub const RETAINED_RUNS: usize = 10;

#[cfg(feature = "file-logging")]
fn file_layer(
    config: &LoggingConfig,
    debug_flags: &CrateDebugFlags,
) -> Result<(BoxedLayer, tracing_appender::non_blocking::WorkerGuard, PathBuf)> {
    use tracing_appender::rolling;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_folder = config.log_dir.join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_runs(&config.log_dir, RETAINED_RUNS)?;

    let appender = rolling::daily(&run_folder, "feagi.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(build_filter(config, debug_flags)?)
        .boxed();

    Ok((layer, guard, run_folder))
}

/// Keep the newest `keep` run folders (names sort chronologically)
#[cfg(feature = "file-logging")]
fn cleanup_old_runs(base_log_dir: &Path, keep: usize) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let mut runs: Vec<PathBuf> = std::fs::read_dir(base_log_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("run_"))
        })
        .collect();
    runs.sort();

    let excess = runs.len().saturating_sub(keep);
    let mut removed = 0;
    for path in runs.iter().take(excess) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_flags() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-feagi-npu-burst-engine".to_string()]);
        assert!(build_filter(&LoggingConfig::default(), &flags).is_ok());
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let config = LoggingConfig {
            format: "yaml".to_string(),
            ..LoggingConfig::default()
        };
        assert!(init_logging(&config, &CrateDebugFlags::default()).is_err());
    }

    #[cfg(feature = "file-logging")]
    #[test]
    fn test_cleanup_keeps_newest_runs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["run_20250101_000000", "run_20250102_000000", "run_20250103_000000", "other"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }

        assert_eq!(cleanup_old_runs(dir.path(), 2).unwrap(), 1);
        assert!(!dir.path().join("run_20250101_000000").exists());
        assert!(dir.path().join("run_20250103_000000").exists());
        assert!(dir.path().join("other").exists());
    }
}
