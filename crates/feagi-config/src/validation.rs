// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks that enumerated strings name a known option and that numeric values are in
//! range. Every violation is collected before reporting, so one run shows all problems.

use crate::{ConfigError, ConfigResult, FeagiConfig};

const PRECISIONS: &[&str] = &["fp32", "f32", "int8"];
const ID_REUSE_POLICIES: &[&str] = &["tombstone", "free_list"];
const ERROR_POLICIES: &[&str] = &["stop", "skip", "continue"];
const BACKENDS: &[&str] = &["auto", "cpu", "wgpu", "gpu"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    UnknownOption {
        field: String,
        value: String,
        allowed: &'static [&'static str],
    },
    InvalidValue {
        field: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOption {
                field,
                value,
                allowed,
            } => {
                write!(
                    f,
                    "{} = '{}' is not one of [{}]",
                    field,
                    value,
                    allowed.join(", ")
                )
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &FeagiConfig) -> ConfigResult<()> {
    let errors = collect_violations(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// All violations in `config`, in section order
pub fn collect_violations(config: &FeagiConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_npu(config, &mut errors);
    validate_burst_engine(config, &mut errors);
    validate_backend(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn check_option(
    field: &str,
    value: &str,
    allowed: &'static [&'static str],
    errors: &mut Vec<ConfigValidationError>,
) {
    if !allowed.contains(&value.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::UnknownOption {
            field: field.to_string(),
            value: value.to_string(),
            allowed,
        });
    }
}

fn invalid(field: &str, reason: impl Into<String>, errors: &mut Vec<ConfigValidationError>) {
    errors.push(ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    });
}

fn validate_npu(config: &FeagiConfig, errors: &mut Vec<ConfigValidationError>) {
    let npu = &config.npu;
    check_option("npu.precision", &npu.precision, PRECISIONS, errors);
    check_option("npu.id_reuse", &npu.id_reuse, ID_REUSE_POLICIES, errors);

    if npu.neuron_capacity == 0 {
        invalid("npu.neuron_capacity", "must be greater than 0", errors);
    }
    if npu.synapse_capacity == 0 {
        invalid("npu.synapse_capacity", "must be greater than 0", errors);
    }
    if npu.fire_ledger_depth == 0 {
        invalid("npu.fire_ledger_depth", "must be greater than 0", errors);
    }
    if !npu.power_amount.is_finite() {
        invalid("npu.power_amount", "must be finite", errors);
    }

    // INT8 encoding is symmetric around zero and needs both signs
    let q = npu.quantization;
    if !(q.min.is_finite() && q.max.is_finite() && q.min < 0.0 && q.max > 0.0) {
        invalid(
            "npu.quantization",
            format!("range [{}, {}] must satisfy min < 0 < max", q.min, q.max),
            errors,
        );
    }
}

fn validate_burst_engine(config: &FeagiConfig, errors: &mut Vec<ConfigValidationError>) {
    let burst = &config.burst_engine;
    if !(burst.burst_frequency_hz.is_finite() && burst.burst_frequency_hz > 0.0) {
        invalid(
            "burst_engine.burst_frequency_hz",
            format!("{} must be positive", burst.burst_frequency_hz),
            errors,
        );
    }
    if !(burst.sampler_frequency_hz.is_finite() && burst.sampler_frequency_hz >= 0.0) {
        invalid(
            "burst_engine.sampler_frequency_hz",
            format!("{} must be >= 0", burst.sampler_frequency_hz),
            errors,
        );
    }
    check_option(
        "burst_engine.error_policy",
        &burst.error_policy,
        ERROR_POLICIES,
        errors,
    );
}

fn validate_backend(config: &FeagiConfig, errors: &mut Vec<ConfigValidationError>) {
    let backend = &config.backend;
    check_option("backend.backend", &backend.backend, BACKENDS, errors);

    for (field, rate) in [
        ("backend.gpu_min_firing_rate", backend.gpu_min_firing_rate),
        ("backend.assumed_firing_rate", backend.assumed_firing_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            invalid(field, format!("{} is outside [0, 1]", rate), errors);
        }
    }
}

fn validate_logging(config: &FeagiConfig, errors: &mut Vec<ConfigValidationError>) {
    check_option("logging.level", &config.logging.level, LOG_LEVELS, errors);
    check_option("logging.format", &config.logging.format, LOG_FORMATS, errors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_no_violations() {
        assert!(collect_violations(&FeagiConfig::default()).is_empty());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut config = FeagiConfig::default();
        config.npu.precision = "fp16".to_string();
        config.npu.quantization.min = 5.0;
        config.burst_engine.burst_frequency_hz = 0.0;
        config.backend.assumed_firing_rate = 1.5;

        let errors = collect_violations(&config);
        assert_eq!(errors.len(), 4);
        assert!(matches!(
            &errors[0],
            ConfigValidationError::UnknownOption { field, .. } if field == "npu.precision"
        ));

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("npu.quantization"));
        assert!(message.contains("burst_engine.burst_frequency_hz"));
    }

    #[test]
    fn test_options_are_case_insensitive() {
        let mut config = FeagiConfig::default();
        config.npu.precision = "INT8".to_string();
        config.backend.backend = "WGPU".to_string();
        config.burst_engine.error_policy = "Skip".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_sampler_frequency_is_allowed() {
        let mut config = FeagiConfig::default();
        config.burst_engine.sampler_frequency_hz = 0.0;
        assert!(validate_config(&config).is_ok());
    }
}
