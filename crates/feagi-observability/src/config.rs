// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Log output format and filter construction from `[logging]`

use std::str::FromStr;

use anyhow::{anyhow, Error};
use feagi_config::LoggingConfig;

use crate::cli::CrateDebugFlags;

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

/// `EnvFilter` directive: the configured base level plus `debug` for flagged crates
pub fn filter_directives(config: &LoggingConfig, flags: &CrateDebugFlags) -> String {
    flags.to_filter_string(&config.level.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_filter_uses_configured_level() {
        let config = LoggingConfig {
            level: "WARN".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(filter_directives(&config, &CrateDebugFlags::default()), "warn");
    }
}
