// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # FEAGI Burst Engine
//!
//! Discrete-time spiking network engine: every burst propagates the previous burst's
//! firings through the synapse store, runs LIF dynamics over the resulting Fire
//! Candidate List, and archives the new Fire Queue.
//!
//! ## Architecture
//! - [`RustNPU`] owns the stores and a [`ComputeBackend`]; [`DynamicNPU`] picks the
//!   f32 or INT8 variant from configuration
//! - CPU backend (rayon) always available, WGPU backend behind the `gpu` feature
//! - [`BurstLoopRunner`] drives bursts on a dedicated thread and hands sampled
//!   telemetry to a [`TelemetrySink`] through a latest-wins slot

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod burst_loop_runner;
pub mod dynamic_npu;
pub mod fire_ledger;
pub mod fire_structures;
pub mod fq_sampler;
pub mod injection_stage;
pub mod neural_dynamics;
pub mod npu;
pub mod parameter_update_queue;
pub mod synaptic_propagation;
pub mod telemetry;
pub mod tracing_mutex;

pub use backend::*;
pub use burst_loop_runner::{
    BurstErrorPolicy, BurstLoopConfig, BurstLoopError, BurstLoopRunner, BurstLoopState,
};
pub use dynamic_npu::DynamicNPU;
pub use fire_ledger::*;
pub use fire_structures::*;
pub use fq_sampler::*;
pub use injection_stage::InjectionStage;
pub use neural_dynamics::*;
pub use npu::*;
pub use parameter_update_queue::{NeuronParameter, ParameterUpdate, ParameterUpdateQueue};
pub use synaptic_propagation::*;
pub use telemetry::*;
pub use tracing_mutex::TracingRwLock;

/// Burst engine performance statistics
#[derive(Debug, Clone, Default)]
pub struct BurstEngineStats {
    pub total_bursts: u64,
    pub total_neurons_fired: u64,
    pub total_synapses_processed: u64,
    pub total_processing_time_us: u64,
    /// Slowest single burst
    pub max_processing_time_us: u64,
    /// Staged injections dropped at burst time because their target was invalid
    pub total_rejected_injections: u64,
}

impl BurstEngineStats {
    /// Get average neurons per burst
    pub fn avg_neurons_per_burst(&self) -> f64 {
        if self.total_bursts == 0 {
            0.0
        } else {
            self.total_neurons_fired as f64 / self.total_bursts as f64
        }
    }

    /// Get average processing time per burst (microseconds)
    pub fn avg_processing_time_us(&self) -> f64 {
        if self.total_bursts == 0 {
            0.0
        } else {
            self.total_processing_time_us as f64 / self.total_bursts as f64
        }
    }

    /// Get average synapses per neuron
    pub fn avg_synapses_per_neuron(&self) -> f64 {
        if self.total_neurons_fired == 0 {
            0.0
        } else {
            self.total_synapses_processed as f64 / self.total_neurons_fired as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_average_to_zero() {
        let stats = BurstEngineStats::default();
        assert_eq!(stats.avg_neurons_per_burst(), 0.0);
        assert_eq!(stats.avg_processing_time_us(), 0.0);
        assert_eq!(stats.avg_synapses_per_neuron(), 0.0);
    }

    #[test]
    fn test_burst_stats() {
        let stats = BurstEngineStats {
            total_bursts: 100,
            total_neurons_fired: 10000,
            total_synapses_processed: 50000,
            total_processing_time_us: 1000000,
            max_processing_time_us: 25000,
            total_rejected_injections: 0,
        };

        assert_eq!(stats.avg_neurons_per_burst(), 100.0);
        assert_eq!(stats.avg_processing_time_us(), 10000.0);
        assert_eq!(stats.avg_synapses_per_neuron(), 5.0);
    }
}
