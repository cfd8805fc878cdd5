// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # feagi-burst - FEAGI burst engine
//!
//! Executes spiking neural networks in discrete bursts: the neurons that fired in burst
//! `t-1` propagate through their synapses into a Fire Candidate List, and leaky
//! integrate-and-fire dynamics over that list decide who fires in burst `t`.
//!
//! This crate re-exports the workspace members behind one dependency.
//!
//! ## Feature Flags
//!
//! - **`gpu`**: WGPU compute backend (Vulkan, Metal, DX12). Without it, `Auto` and `WGPU`
//!   selections fall back to the CPU backend.
//! - **`file-logging`**: daily rolling log files for the bench tool
//! - **`npu-lock-tracing`**: log wait/hold times on the shared NPU lock
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feagi_burst::prelude::*;
//!
//! let mut npu = DynamicNPU::new(NpuConfig::default())?;
//!
//! let params = LIFParameters::with_threshold(1.0);
//! let a = npu.add_neuron(&params, 1, (0, 0, 0))?;
//! let b = npu.add_neuron(&params, 2, (0, 0, 0))?;
//! npu.add_synapse(a, b, 255, 255, SynapseType::Excitatory)?;
//! npu.finalize_network()?;
//!
//! npu.inject_sensory(&[(a, 5.0)])?;
//! let first = npu.process_burst()?;   // a fires
//! let second = npu.process_burst()?;  // b fires
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  feagi-npu-neural                                       │
//! │  (NeuralValue f32/INT8, ids, FCL, LIF math)             │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  feagi-npu-runtime                                      │
//! │  (SoA neuron/synapse stores, source index)              │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  feagi-npu-burst-engine                                 │
//! │  (propagation, dynamics, CPU/WGPU backends, burst loop) │
//! └─────────────────────────────────────────────────────────┘
//!
//!   feagi-config (TOML + overrides)   feagi-observability (logging)
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use feagi_config as config;
pub use feagi_npu_burst_engine as burst_engine;
pub use feagi_npu_neural as neural;
pub use feagi_npu_runtime as runtime;
pub use feagi_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::neural::types::{
        FeagiError, FireCandidateList, NeuronId, Precision, QuantizationRange,
        QuantizationSpec, SynapseId, SynapseType, INT8Value,
    };
    pub use crate::neural::LIFParameters;

    pub use crate::runtime::{IdReusePolicy, NeuronStorage, SynapseStorage};

    pub use crate::burst_engine::{
        BackendType, BurstErrorPolicy, BurstLoopConfig, BurstLoopRunner, BurstResult,
        DynamicNPU, NpuConfig, RustNPU, TelemetrySink, TelemetrySnapshot, TracingRwLock,
    };

    pub use crate::config::{load_config, FeagiConfig};
}
