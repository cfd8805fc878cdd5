// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Neural Types Module
//!
//! Core type definitions shared by storage, backends and the burst loop.

pub mod error;
pub mod fire;
pub mod ids;
pub mod numeric;

pub use error::{Error, FeagiError, Result};
pub use fire::FireCandidateList;
pub use ids::{NeuronId, SynapseId};
pub use numeric::{INT8Value, NeuralValue, Precision, QuantizationRange, QuantizationSpec};

// SynapseType lives with the contribution math; re-exported here for convenience
pub use crate::synapse::SynapseType;
