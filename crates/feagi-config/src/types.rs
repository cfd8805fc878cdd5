// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `feagi_configuration.toml`. Every field has a serde
//! default, so a partial file (or an empty one) is valid input.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeagiConfig {
    pub system: SystemConfig,
    pub npu: NeuralConfig,
    pub burst_engine: BurstEngineConfig,
    pub backend: ComputeBackendConfig,
    pub logging: LoggingConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Rayon worker threads; 0 = one per core
    pub max_cores: usize,
    pub debug: bool,
    pub data_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_cores: 0, // 0 = auto-detect
            debug: false,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// `[npu]`: precision, capacities and store policies
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeuralConfig {
    /// "fp32" or "int8"
    pub precision: String,

    /// "tombstone" or "free_list"
    pub id_reuse: String,

    pub neuron_capacity: usize,
    pub synapse_capacity: usize,

    /// Bursts retained by the Fire Ledger
    pub fire_ledger_depth: usize,

    /// Potential injected into every power neuron each burst
    pub power_amount: f32,

    pub quantization: QuantizationConfig,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            precision: "fp32".to_string(),
            id_reuse: "tombstone".to_string(),
            neuron_capacity: 100_000,
            synapse_capacity: 1_000_000,
            fire_ledger_depth: 20,
            power_amount: 1.0,
            quantization: QuantizationConfig::default(),
        }
    }
}

/// `[npu.quantization]`: potential range covered by the INT8 encoding
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuantizationConfig {
    pub min: f32,
    pub max: f32,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            min: -100.0,
            max: 100.0,
        }
    }
}

/// `[burst_engine]`: burst loop timing and failure handling
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BurstEngineConfig {
    pub burst_frequency_hz: f64,

    /// Telemetry snapshot rate; 0 disables sampling
    pub sampler_frequency_hz: f64,

    /// "stop" halts the loop on a failed burst, "skip" logs it and keeps going
    pub error_policy: String,

    /// How long `stop` waits for the burst thread before detaching it
    pub join_timeout_ms: u64,
}

impl Default for BurstEngineConfig {
    fn default() -> Self {
        Self {
            burst_frequency_hz: 30.0,
            sampler_frequency_hz: 10.0,
            error_policy: "stop".to_string(),
            join_timeout_ms: 2_000,
        }
    }
}

/// `[backend]`: compute backend selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ComputeBackendConfig {
    /// "auto", "cpu" or "wgpu"
    pub backend: String,
    pub gpu_neuron_threshold: usize,
    pub gpu_synapse_threshold: usize,
    pub gpu_min_firing_rate: f32,
    pub assumed_firing_rate: f32,
}

impl Default for ComputeBackendConfig {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            gpu_neuron_threshold: 500_000,
            gpu_synapse_threshold: 50_000_000,
            gpu_min_firing_rate: 0.005,
            assumed_firing_rate: 0.01,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,

    /// "text" or "json"
    pub format: String,

    /// Write daily rolling files under `log_dir` (needs the observability `file-logging` feature)
    pub file_logging: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}
