// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::validation::validate_config;
use crate::{ConfigError, ConfigResult, FeagiConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE_NAME: &str = "feagi_configuration.toml";

/// Find the FEAGI configuration file
///
/// Search order:
/// 1. `FEAGI_CONFIG_PATH` environment variable
/// 2. Current working directory: `./feagi_configuration.toml`
/// 3. Up to 5 parent directories (workspace root)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("FEAGI_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by FEAGI_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        search_paths.extend(
            cwd.ancestors()
                .skip(1)
                .take(5)
                .map(|dir| dir.join(CONFIG_FILE_NAME)),
        );
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "FEAGI configuration file '{}' not found in any of these locations:\n{}\n\nSet FEAGI_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, has an override that
/// does not parse, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<FeagiConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: FeagiConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    validate_config(&config)?;
    Ok(config)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("{} = '{}'", key, value))),
    }
}

/// Set one dotted key; shared by the env and CLI layers
fn apply_override(config: &mut FeagiConfig, key: &str, value: &str) -> ConfigResult<bool> {
    match key {
        "system.max_cores" => config.system.max_cores = parse_value(key, value)?,
        "system.debug" => config.system.debug = parse_bool(key, value)?,
        "system.data_dir" => config.system.data_dir = PathBuf::from(value),

        "npu.precision" => config.npu.precision = value.to_string(),
        "npu.id_reuse" => config.npu.id_reuse = value.to_string(),
        "npu.neuron_capacity" => config.npu.neuron_capacity = parse_value(key, value)?,
        "npu.synapse_capacity" => config.npu.synapse_capacity = parse_value(key, value)?,
        "npu.fire_ledger_depth" => config.npu.fire_ledger_depth = parse_value(key, value)?,
        "npu.power_amount" => config.npu.power_amount = parse_value(key, value)?,
        "npu.quantization.min" => config.npu.quantization.min = parse_value(key, value)?,
        "npu.quantization.max" => config.npu.quantization.max = parse_value(key, value)?,

        "burst_engine.burst_frequency_hz" => {
            config.burst_engine.burst_frequency_hz = parse_value(key, value)?
        }
        "burst_engine.sampler_frequency_hz" => {
            config.burst_engine.sampler_frequency_hz = parse_value(key, value)?
        }
        "burst_engine.error_policy" => config.burst_engine.error_policy = value.to_string(),
        "burst_engine.join_timeout_ms" => {
            config.burst_engine.join_timeout_ms = parse_value(key, value)?
        }

        "backend.backend" => config.backend.backend = value.to_string(),
        "backend.gpu_neuron_threshold" => {
            config.backend.gpu_neuron_threshold = parse_value(key, value)?
        }
        "backend.gpu_synapse_threshold" => {
            config.backend.gpu_synapse_threshold = parse_value(key, value)?
        }

        "logging.level" => config.logging.level = value.to_lowercase(),
        "logging.format" => config.logging.format = value.to_lowercase(),
        "logging.file_logging" => config.logging.file_logging = parse_bool(key, value)?,
        "logging.log_dir" => config.logging.log_dir = PathBuf::from(value),

        _ => return Ok(false),
    }
    Ok(true)
}

/// Environment variable → config key
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("FEAGI_MAX_CORES", "system.max_cores"),
    ("FEAGI_DEBUG_MODE", "system.debug"),
    ("FEAGI_DATA_DIR", "system.data_dir"),
    ("FEAGI_NPU_PRECISION", "npu.precision"),
    ("FEAGI_NPU_ID_REUSE", "npu.id_reuse"),
    ("FEAGI_NPU_NEURON_CAPACITY", "npu.neuron_capacity"),
    ("FEAGI_NPU_SYNAPSE_CAPACITY", "npu.synapse_capacity"),
    ("FEAGI_NPU_POWER_AMOUNT", "npu.power_amount"),
    ("FEAGI_BURST_FREQUENCY_HZ", "burst_engine.burst_frequency_hz"),
    ("FEAGI_SAMPLER_FREQUENCY_HZ", "burst_engine.sampler_frequency_hz"),
    ("FEAGI_BURST_ERROR_POLICY", "burst_engine.error_policy"),
    ("FEAGI_COMPUTE_BACKEND", "backend.backend"),
    ("FEAGI_LOG_LEVEL", "logging.level"),
    ("FEAGI_LOG_FORMAT", "logging.format"),
    ("FEAGI_LOG_DIR", "logging.log_dir"),
];

/// Apply environment variable overrides to configuration
///
/// Supported variables are listed in `ENV_OVERRIDES`, e.g. `FEAGI_NPU_PRECISION` ->
/// `npu.precision`, `FEAGI_BURST_FREQUENCY_HZ` -> `burst_engine.burst_frequency_hz`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when a variable is set but does not parse
pub fn apply_environment_overrides(config: &mut FeagiConfig) -> ConfigResult<()> {
    for (var, key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(var) {
            apply_override(config, key, &value)?;
        }
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// Keys are dotted config paths (`{"npu.precision": "int8"}`); a few short aliases are
/// accepted: `precision`, `backend`, `burst_frequency`, `log_level`, `debug`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for unknown keys or values that do not parse
pub fn apply_cli_overrides(
    config: &mut FeagiConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    // Sorted so a failing run always reports the same key first
    let mut keys: Vec<&String> = cli_args.keys().collect();
    keys.sort();

    for key in keys {
        let value = &cli_args[key];
        let target = match key.as_str() {
            "precision" => "npu.precision",
            "backend" => "backend.backend",
            "burst_frequency" => "burst_engine.burst_frequency_hz",
            "log_level" => "logging.level",
            "debug" => "system.debug",
            other => other,
        };
        if !apply_override(config, target, value)? {
            return Err(ConfigError::InvalidValue(format!(
                "unknown override key '{}'",
                key
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for (var, _) in ENV_OVERRIDES {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("FEAGI_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("FEAGI_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_an_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("FEAGI_CONFIG_PATH", "/definitely/not/here.toml");
        let result = find_config_file();
        env::remove_var("FEAGI_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[system]").unwrap();
        writeln!(file, "max_cores = 4").unwrap();
        writeln!(file, "[npu]").unwrap();
        writeln!(file, "precision = \"int8\"").unwrap();
        writeln!(file, "[burst_engine]").unwrap();
        writeln!(file, "burst_frequency_hz = 100.0").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.system.max_cores, 4);
        assert_eq!(config.npu.precision, "int8");
        assert_eq!(config.burst_engine.burst_frequency_hz, 100.0);
        assert_eq!(config.burst_engine.sampler_frequency_hz, 10.0);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[npu\nprecision = ").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_rejects_invalid_quantization_range() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[npu.quantization]\nmin = 10.0\nmax = 20.0\n").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut config = FeagiConfig::default();

        env::set_var("FEAGI_NPU_PRECISION", "int8");
        env::set_var("FEAGI_BURST_FREQUENCY_HZ", "250");
        let result = apply_environment_overrides(&mut config);
        clear_env();

        result.unwrap();
        assert_eq!(config.npu.precision, "int8");
        assert_eq!(config.burst_engine.burst_frequency_hz, 250.0);
    }

    #[test]
    fn test_unparseable_environment_value_is_reported() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut config = FeagiConfig::default();

        env::set_var("FEAGI_NPU_NEURON_CAPACITY", "lots");
        let result = apply_environment_overrides(&mut config);
        clear_env();

        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = FeagiConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("backend".to_string(), "cpu".to_string());
        cli_args.insert("npu.neuron_capacity".to_string(), "4096".to_string());
        cli_args.insert("debug".to_string(), "yes".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.backend.backend, "cpu");
        assert_eq!(config.npu.neuron_capacity, 4096);
        assert!(config.system.debug);
    }

    #[test]
    fn test_unknown_cli_key_is_rejected() {
        let mut config = FeagiConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("api_port".to_string(), "9000".to_string());

        assert!(apply_cli_overrides(&mut config, &cli_args).is_err());
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[npu]").unwrap();
        writeln!(file, "precision = \"fp32\"").unwrap();
        writeln!(file, "neuron_capacity = 1000").unwrap();

        env::set_var("FEAGI_NPU_PRECISION", "int8");
        env::set_var("FEAGI_NPU_NEURON_CAPACITY", "2000");

        let mut cli_args = HashMap::new();
        cli_args.insert("precision".to_string(), "fp32".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));
        clear_env();
        let config = config.unwrap();

        // CLI wins for precision, env wins for capacity (no CLI override)
        assert_eq!(config.npu.precision, "fp32");
        assert_eq!(config.npu.neuron_capacity, 2000);
    }
}
