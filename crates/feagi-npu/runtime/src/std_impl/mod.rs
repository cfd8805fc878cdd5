// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # FEAGI Runtime - Standard (Desktop/Server)
//!
//! Fixed-capacity `Vec`-backed stores. Capacity is chosen when the network is loaded;
//! inserts beyond it fail with `CapacityExceeded` instead of reallocating.

pub mod neuron_array;
pub mod synapse_array;

pub use neuron_array::NeuronArray;
pub use synapse_array::SynapseArray;

pub use NeuronArray as StdNeuronArray;
pub use SynapseArray as StdSynapseArray;
