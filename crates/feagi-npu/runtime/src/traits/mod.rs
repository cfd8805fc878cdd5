// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Storage abstraction traits
//!
//! The burst engine phases and every compute backend are written against these
//! traits rather than a concrete array type.
//!
//! ## Design Philosophy
//!
//! - **Structure of arrays**: every per-neuron / per-synapse field is a slice indexed by id
//! - **Zero-Cost**: trait calls are monomorphized into direct slice access
//! - **Value-generic**: potentials and thresholds are `NeuralValue`, so the same
//!   algorithms run on `f32` and quantized `INT8Value`

pub mod storage;

pub use crate::error::{Result, RuntimeError};
pub use feagi_npu_neural::types::NeuralValue;
pub use storage::{NeuronStorage, SynapseStorage};
