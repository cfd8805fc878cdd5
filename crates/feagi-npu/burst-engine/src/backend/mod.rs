// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Compute Backend Abstraction
//!
//! Provides a unified interface for different compute backends (CPU, GPU).
//! This allows the burst engine to use optimal hardware acceleration without
//! changing the high-level burst processing logic.
//!
//! The backend is chosen once per network (re)load by [`select_backend`] and stored as an
//! owned `Box<dyn ComputeBackend<..>>`; it is not revisited per burst.

mod cpu;
#[cfg(feature = "gpu")]
mod wgpu_backend;

pub use cpu::CPUBackend;
#[cfg(feature = "gpu")]
pub use wgpu_backend::WGPUBackend;

use feagi_npu_neural::types::*;
use feagi_npu_runtime::{NeuronStorage, SynapseStorage};
use serde::{Deserialize, Serialize};
#[cfg(feature = "gpu")]
use tracing::debug;
use tracing::{info, warn};

/// Outcome of one dynamics pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicsOutput {
    /// Neurons that fired (ascending ids)
    pub fired_neurons: Vec<u32>,

    /// Membrane potential at fire time, parallel to `fired_neurons`
    pub fired_potentials: Vec<f32>,

    pub neurons_processed: usize,
    pub neurons_in_refractory: usize,
}

/// Result of processing a burst on any backend
#[derive(Debug, Clone)]
pub struct BackendBurstResult {
    /// Neurons that fired this burst (ascending ids)
    pub fired_neurons: Vec<u32>,

    /// Membrane potential at fire time, parallel to `fired_neurons`
    pub fired_potentials: Vec<f32>,

    /// Performance metrics
    pub synapses_processed: usize,
    pub neurons_processed: usize,
    pub neurons_fired: usize,
    pub neurons_in_refractory: usize,

    /// Timing information (microseconds)
    pub timing: BurstTiming,
}

/// Detailed timing breakdown for burst processing
#[derive(Debug, Clone, Default)]
pub struct BurstTiming {
    /// Time spent on synaptic propagation (μs)
    pub synaptic_propagation_us: f64,

    /// Time spent on neural dynamics (μs)
    pub neural_dynamics_us: f64,

    /// Time spent on data transfer (GPU only, μs)
    pub transfer_us: f64,

    /// Total burst time (μs)
    pub total_us: f64,
}

/// Compute backend trait - abstracts CPU vs GPU execution
///
/// **FCL-Aware Design**: Backends process only Fire Candidate List neurons,
/// not the entire neuron array. This enables efficient sparse processing on GPU.
///
/// Generic over:
/// - `T: NeuralValue` - Numeric type for membrane potentials
/// - `N: NeuronStorage` - Neuron storage implementation
/// - `S: SynapseStorage` - Synapse storage implementation
pub trait ComputeBackend<T: NeuralValue, N: NeuronStorage<Value = T>, S: SynapseStorage>:
    Send + Sync
{
    /// Get backend type name for logging/debugging
    fn backend_name(&self) -> &str;

    /// Process synaptic propagation: fired neurons → FCL contributions
    ///
    /// Contributions are accumulated into `fcl` on top of whatever was injected before
    /// the call. Returns the number of synapses processed.
    fn process_synaptic_propagation(
        &mut self,
        fired_neurons: &[u32],
        synapse_storage: &S,
        fcl: &mut FireCandidateList,
    ) -> Result<usize>;

    /// Process neural dynamics: FCL candidates → firing decisions
    ///
    /// Only neurons in the FCL are visited. Returns the fired ids (ascending) with their
    /// potentials at fire time, the number of neurons processed and the number that were
    /// refractory.
    fn process_neural_dynamics(
        &mut self,
        fcl: &FireCandidateList,
        neuron_storage: &mut N,
        burst_count: u64,
    ) -> Result<DynamicsOutput>;

    /// Process full burst cycle (synaptic + neural)
    ///
    /// Propagation completes entirely before dynamics starts.
    fn process_burst(
        &mut self,
        fired_neurons: &[u32],
        synapse_storage: &S,
        fcl: &mut FireCandidateList,
        neuron_storage: &mut N,
        burst_count: u64,
    ) -> Result<BackendBurstResult> {
        let start = std::time::Instant::now();

        // Phase 1: Synaptic propagation → FCL
        let synaptic_start = std::time::Instant::now();
        let synapses_processed =
            self.process_synaptic_propagation(fired_neurons, synapse_storage, fcl)?;
        let synaptic_us = synaptic_start.elapsed().as_micros() as f64;

        // Phase 2: Neural dynamics (FCL → fired neurons)
        let neural_start = std::time::Instant::now();
        let dynamics = self.process_neural_dynamics(fcl, neuron_storage, burst_count)?;
        let neural_us = neural_start.elapsed().as_micros() as f64;

        let total_us = start.elapsed().as_micros() as f64;

        Ok(BackendBurstResult {
            neurons_fired: dynamics.fired_neurons.len(),
            fired_neurons: dynamics.fired_neurons,
            fired_potentials: dynamics.fired_potentials,
            synapses_processed,
            neurons_processed: dynamics.neurons_processed,
            neurons_in_refractory: dynamics.neurons_in_refractory,
            timing: BurstTiming {
                synaptic_propagation_us: synaptic_us,
                neural_dynamics_us: neural_us,
                transfer_us: 0.0,
                total_us,
            },
        })
    }

    /// Initialize/upload persistent data to backend
    ///
    /// For GPU backends, this uploads the neuron state and parameters, the synapse data
    /// and the source index. For CPU backends, this is a no-op.
    fn initialize_persistent_data(
        &mut self,
        _neuron_storage: &N,
        _synapse_storage: &S,
    ) -> Result<()> {
        Ok(())
    }

    /// Notify backend that the network has changed (invalidate caches)
    fn on_genome_change(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Backend type enum for construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// CPU with rayon propagation
    CPU,

    /// GPU via WGPU (Metal/Vulkan/DirectX - cross-platform); needs the `gpu` feature
    WGPU,

    /// Auto-select based on network size and hardware availability
    Auto,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::CPU => write!(f, "CPU"),
            BackendType::WGPU => write!(f, "WGPU"),
            BackendType::Auto => write!(f, "Auto"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(BackendType::CPU),
            "wgpu" | "gpu" => Ok(BackendType::WGPU),
            "auto" => Ok(BackendType::Auto),
            _ => Err(Error::InvalidParameter(format!("unknown backend '{}'", s))),
        }
    }
}

/// Configuration for backend auto-selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Minimum neurons to consider WGPU GPU (default: 500,000)
    pub gpu_neuron_threshold: usize,

    /// Minimum synapses to consider WGPU GPU (default: 50,000,000)
    pub gpu_synapse_threshold: usize,

    /// Minimum expected firing rate to benefit from GPU (default: 0.005 = 0.5%)
    pub gpu_min_firing_rate: f32,

    /// Fraction of neurons assumed to fire per burst when estimating cost (default: 0.01)
    pub assumed_firing_rate: f32,

    /// Force CPU even if GPU would be beneficial
    pub force_cpu: bool,

    /// Force WGPU GPU even if CPU would be better (for testing)
    pub force_gpu: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            // WGPU: Based on benchmarks, >500K neurons = 2-3x speedup
            gpu_neuron_threshold: 500_000,

            // 500K neurons × 100 synapses/neuron = 50M synapses
            gpu_synapse_threshold: 50_000_000,

            // Need at least 0.5% firing for GPU parallelism to be worth it
            gpu_min_firing_rate: 0.005,

            assumed_firing_rate: 0.01,

            force_cpu: false,
            force_gpu: false,
        }
    }
}

impl BackendConfig {
    /// Config that pins the selector to one backend type (`Auto` leaves the flags clear)
    pub fn with_override(&self, backend_type: BackendType) -> Self {
        Self {
            force_cpu: backend_type == BackendType::CPU,
            force_gpu: backend_type == BackendType::WGPU,
            ..self.clone()
        }
    }
}

/// Backend selection decision with rationale
#[derive(Debug, Clone, PartialEq)]
pub struct BackendDecision {
    pub backend_type: BackendType,
    pub reason: String,
    pub estimated_speedup: f32,
}

/// Auto-select optimal backend based on network size and hardware
///
/// Selection priority:
/// 1. Honor force flags (force_cpu, then force_gpu)
/// 2. Try WGPU (if available and network large enough)
/// 3. Fall back to CPU - always available
pub fn select_backend(
    neuron_count: usize,
    synapse_count: usize,
    config: &BackendConfig,
) -> BackendDecision {
    // Skip the adapter probe when it cannot change the outcome
    let needs_probe = !config.force_cpu
        && (config.force_gpu
            || neuron_count >= config.gpu_neuron_threshold
            || synapse_count >= config.gpu_synapse_threshold);
    let gpu_available = needs_probe && is_gpu_available();
    select_backend_with_availability(neuron_count, synapse_count, config, gpu_available)
}

/// Selection core with GPU availability supplied by the caller
///
/// Pure function of its inputs.
pub fn select_backend_with_availability(
    neuron_count: usize,
    synapse_count: usize,
    config: &BackendConfig,
    gpu_available: bool,
) -> BackendDecision {
    // Force overrides
    if config.force_cpu {
        return BackendDecision {
            backend_type: BackendType::CPU,
            reason: "Forced CPU via configuration".to_string(),
            estimated_speedup: 1.0,
        };
    }

    let speedup = estimate_gpu_speedup(neuron_count, synapse_count, config.assumed_firing_rate);

    if config.force_gpu {
        if gpu_available {
            return BackendDecision {
                backend_type: BackendType::WGPU,
                reason: "Forced WGPU via configuration".to_string(),
                estimated_speedup: speedup,
            };
        }
        return BackendDecision {
            backend_type: BackendType::CPU,
            reason: "WGPU forced but not available, falling back to CPU".to_string(),
            estimated_speedup: 1.0,
        };
    }

    let meets_neuron_threshold = neuron_count >= config.gpu_neuron_threshold;
    let meets_synapse_threshold = synapse_count >= config.gpu_synapse_threshold;

    if !meets_neuron_threshold && !meets_synapse_threshold {
        return BackendDecision {
            backend_type: BackendType::CPU,
            reason: format!(
                "CPU selected: {} neurons, {} synapses (below GPU thresholds)",
                neuron_count, synapse_count
            ),
            estimated_speedup: 1.0,
        };
    }

    if config.assumed_firing_rate < config.gpu_min_firing_rate {
        return BackendDecision {
            backend_type: BackendType::CPU,
            reason: format!(
                "CPU selected: assumed firing rate {:.4} below GPU minimum {:.4}",
                config.assumed_firing_rate, config.gpu_min_firing_rate
            ),
            estimated_speedup: 1.0,
        };
    }

    // Use WGPU if speedup is meaningful (>1.5x)
    if speedup > 1.5 && gpu_available {
        return BackendDecision {
            backend_type: BackendType::WGPU,
            reason: format!(
                "WGPU selected: {} neurons, {} synapses (cross-platform GPU)",
                neuron_count, synapse_count
            ),
            estimated_speedup: speedup,
        };
    }

    BackendDecision {
        backend_type: BackendType::CPU,
        reason: if gpu_available {
            format!(
                "CPU selected: {} neurons, {} synapses (estimated GPU speedup {:.2}x too small)",
                neuron_count, synapse_count, speedup
            )
        } else {
            format!(
                "CPU selected: {} neurons, {} synapses (GPU not available)",
                neuron_count, synapse_count
            )
        },
        estimated_speedup: 1.0,
    }
}

/// Check if a GPU adapter can be obtained (probed once per process)
pub fn is_gpu_available() -> bool {
    #[cfg(feature = "gpu")]
    {
        static AVAILABLE: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
        *AVAILABLE.get_or_init(wgpu_backend::probe_adapter)
    }
    #[cfg(not(feature = "gpu"))]
    {
        false
    }
}

/// Estimate GPU speedup based on network size
///
/// Empirical model based on realistic hardware:
/// - PCIe 4.0: ~25 GB/s
/// - GPU: ~10 TFLOPS FP32, ~200μs fixed launch/sync overhead per burst
/// - CPU (16-core): ~2 Gops/s effective on this workload (hash probes and scattered
///   accumulation are memory-bound, not ALU-bound)
///
/// Synapses and parameters are resident on the device, so per-burst transfer only covers
/// the sparse active set: fired ids up, FCL ids + potentials up, fired mask and the
/// post-burst state of FCL entries down.
pub fn estimate_gpu_speedup(neuron_count: usize, synapse_count: usize, firing_rate: f32) -> f32 {
    let neurons = neuron_count as f64;
    let synapses = synapse_count as f64;
    let rate = firing_rate.clamp(0.0, 1.0) as f64;

    let fired = neurons * rate;
    // Each fired neuron reaches its targets; the FCL cannot exceed the population
    let active = (synapses * rate).min(neurons).max(fired);

    // Convert: bytes / (GB/s * 1e9 bytes/GB) = seconds, then * 1e6 = microseconds
    let transfer_bytes = fired * 4.0  // Fired ids
        + active * 8.0                // FCL ids + potentials
        + active * 0.125              // Fired mask (bitpacked)
        + active * 8.0; // Membrane + refractory + consecutive count readback
    let transfer_bandwidth_gbs = 25.0;
    let transfer_us = (transfer_bytes / (transfer_bandwidth_gbs * 1_000_000_000.0)) * 1_000_000.0;
    let launch_us = 200.0;

    // Synaptic: ~10 ops per traversed synapse (hash lookup, weight calc, accumulation)
    // Neural: ~20 ops per neuron (leak, threshold check, refractory, RNG)
    let ops = neurons * 20.0 + synapses * rate * 10.0;

    let cpu_flops = 2_000_000_000.0;
    let cpu_us = ops / (cpu_flops / 1_000_000.0);

    let gpu_flops = 10_000_000_000_000.0;
    let gpu_us = transfer_us + launch_us + ops / (gpu_flops / 1_000_000.0);

    (cpu_us / gpu_us).clamp(0.1, 100.0) as f32
}

/// Build the backend for `backend_type`
///
/// `Auto` is resolved with the default selector config. A GPU initialization failure is
/// not fatal: it is logged and the CPU backend is returned instead. The second element is
/// the backend type actually built.
pub fn create_backend<N, S>(
    backend_type: BackendType,
    neuron_storage: &N,
    synapse_storage: &S,
) -> (Box<dyn ComputeBackend<N::Value, N, S>>, BackendType)
where
    N: NeuronStorage + 'static,
    S: SynapseStorage + 'static,
{
    match backend_type {
        BackendType::CPU => {
            info!("Using CPU backend");
            (Box::new(CPUBackend::new()), BackendType::CPU)
        }
        BackendType::WGPU => match create_gpu_backend::<N, S>(neuron_storage, synapse_storage) {
            Ok(backend) => {
                info!("Using WGPU backend (cross-platform GPU)");
                (backend, BackendType::WGPU)
            }
            Err(e) => {
                warn!("GPU backend unavailable, falling back to CPU: {}", e);
                (Box::new(CPUBackend::new()), BackendType::CPU)
            }
        },
        BackendType::Auto => {
            let decision = select_backend(
                neuron_storage.count(),
                synapse_storage.count(),
                &BackendConfig::default(),
            );
            info!(
                "Backend auto-selection: {} ({})",
                decision.backend_type, decision.reason
            );
            create_backend(decision.backend_type, neuron_storage, synapse_storage)
        }
    }
}

#[cfg(feature = "gpu")]
fn create_gpu_backend<N, S>(
    neuron_storage: &N,
    synapse_storage: &S,
) -> Result<Box<dyn ComputeBackend<N::Value, N, S>>>
where
    N: NeuronStorage + 'static,
    S: SynapseStorage + 'static,
{
    let backend = WGPUBackend::new()?;
    debug!(
        "WGPU backend sized for {} neurons / {} synapses",
        neuron_storage.capacity(),
        synapse_storage.capacity()
    );
    Ok(Box::new(backend))
}

#[cfg(not(feature = "gpu"))]
fn create_gpu_backend<N, S>(
    _neuron_storage: &N,
    _synapse_storage: &S,
) -> Result<Box<dyn ComputeBackend<N::Value, N, S>>>
where
    N: NeuronStorage + 'static,
    S: SynapseStorage + 'static,
{
    Err(Error::BackendInitializationFailed(
        "built without the 'gpu' feature".to_string(),
    ))
}
