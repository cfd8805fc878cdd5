// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # FEAGI Neural Computation
//!
//! Everything the burst engine needs to reason about a single neuron or synapse:
//! - **Types**: ids, the numeric value abstraction (`f32` / `INT8Value`), the fire candidate list
//! - **Synapse**: synaptic contribution (`sign × weight × psp`, no normalization)
//! - **Models**: LIF leak, stochastic threshold and firing window
//! - **Utils**: stateless PCG hashing used for reproducible excitability draws
//!
//! Storage lives in `feagi-npu-runtime`; orchestration lives in `feagi-npu-burst-engine`.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod types;

pub mod utils;

pub mod synapse;

pub mod models;

pub use utils::*;

pub use types::{
    Error, FeagiError, FireCandidateList, INT8Value, NeuralValue, NeuronId, Precision,
    QuantizationRange, QuantizationSpec, Result, SynapseId,
};

pub use synapse::{
    compute_synaptic_contribution, compute_synaptic_contributions_batch, SynapseType,
};

pub use models::{LIFModel, LIFParameters};
