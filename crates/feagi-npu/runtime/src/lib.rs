// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # FEAGI NPU Runtime
//!
//! Storage layer for the burst engine:
//! - [`NeuronStorage`] / [`SynapseStorage`]: slice-oriented access traits used by the
//!   propagation and dynamics phases and by every compute backend
//! - [`StdNeuronArray`] / [`StdSynapseArray`]: fixed-capacity structure-of-arrays stores
//! - [`SourceIndex`]: open-addressing `source -> synapse run` table shared by CPU and GPU
//! - [`IdAllocator`] / [`IdReusePolicy`]: how deleted slots are (or are not) reused

pub mod error;
pub mod id_allocator;
pub mod source_index;
pub mod std_impl;
pub mod traits;

pub use error::{IdKind, Result, RuntimeError};
pub use id_allocator::{IdAllocator, IdReusePolicy};
pub use source_index::SourceIndex;
pub use std_impl::{StdNeuronArray, StdSynapseArray};
pub use traits::{NeuronStorage, SynapseStorage};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
