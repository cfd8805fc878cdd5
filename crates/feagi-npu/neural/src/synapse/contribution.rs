// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Synaptic contribution calculation
//!
//! Pure functions for computing synaptic current contributions.

use serde::{Deserialize, Serialize};

/// Synapse type (excitatory or inhibitory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SynapseType {
    Excitatory = 0,
    Inhibitory = 1,
}

impl SynapseType {
    /// Decode the packed representation (0 = excitatory, anything else = inhibitory)
    #[inline(always)]
    pub fn from_u8(value: u8) -> Self {
        if value == 0 {
            SynapseType::Excitatory
        } else {
            SynapseType::Inhibitory
        }
    }

    #[inline(always)]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline(always)]
    pub fn sign(self) -> f32 {
        match self {
            SynapseType::Excitatory => 1.0,
            SynapseType::Inhibitory => -1.0,
        }
    }
}

/// Calculate synaptic contribution
///
/// `contribution = sign × weight × psp`
///
/// - `weight`: synaptic strength (0-255, cast to float, no normalization)
/// - `psp`: post-synaptic potential scale (0-255, cast to float, no normalization)
/// - `sign`: +1.0 for excitatory, -1.0 for inhibitory
///
/// Values range from -65,025.0 to 65,025.0 and are always whole numbers.
///
/// # Example
/// ```
/// use feagi_npu_neural::synapse::{compute_synaptic_contribution, SynapseType};
///
/// let contribution = compute_synaptic_contribution(255, 255, SynapseType::Excitatory);
/// assert_eq!(contribution, 65025.0);
///
/// let contribution = compute_synaptic_contribution(255, 255, SynapseType::Inhibitory);
/// assert_eq!(contribution, -65025.0);
/// ```
#[inline]
pub fn compute_synaptic_contribution(weight: u8, psp: u8, synapse_type: SynapseType) -> f32 {
    let w = weight as f32;
    let c = psp as f32;
    w * c * synapse_type.sign()
}

/// Batch compute synaptic contributions
///
/// All slices must have the same length. `types` uses the packed encoding
/// (0 = excitatory, 1 = inhibitory).
///
/// # Example
/// ```
/// use feagi_npu_neural::synapse::compute_synaptic_contributions_batch;
///
/// let weights = [255, 128, 200];
/// let psps = [255, 255, 200];
/// let types = [0, 1, 0];
/// let mut contributions = [0.0; 3];
///
/// compute_synaptic_contributions_batch(&weights, &psps, &types, &mut contributions);
///
/// assert!(contributions[0] > 0.0);
/// assert!(contributions[1] < 0.0);
/// assert!(contributions[2] > 0.0);
/// ```
#[inline]
pub fn compute_synaptic_contributions_batch(
    weights: &[u8],
    psps: &[u8],
    types: &[u8],
    contributions: &mut [f32],
) {
    let count = weights.len();
    debug_assert_eq!(psps.len(), count);
    debug_assert_eq!(types.len(), count);
    debug_assert_eq!(contributions.len(), count);

    for i in 0..count {
        contributions[i] =
            compute_synaptic_contribution(weights[i], psps[i], SynapseType::from_u8(types[i]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excitatory_contribution() {
        let contribution = compute_synaptic_contribution(255, 255, SynapseType::Excitatory);
        assert_eq!(contribution, 65025.0);
    }

    #[test]
    fn test_inhibitory_contribution() {
        let contribution = compute_synaptic_contribution(255, 255, SynapseType::Inhibitory);
        assert_eq!(contribution, -65025.0);
    }

    #[test]
    fn test_partial_weight() {
        let contribution = compute_synaptic_contribution(128, 255, SynapseType::Excitatory);
        assert_eq!(contribution, 128.0 * 255.0);
    }

    #[test]
    fn test_zero_weight_contributes_nothing() {
        assert_eq!(compute_synaptic_contribution(0, 255, SynapseType::Inhibitory), 0.0);
    }

    #[test]
    fn test_packed_type_round_trip() {
        assert_eq!(SynapseType::from_u8(SynapseType::Inhibitory.as_u8()), SynapseType::Inhibitory);
        assert_eq!(SynapseType::from_u8(0), SynapseType::Excitatory);
    }

    #[test]
    fn test_batch_computation() {
        let weights = [255, 128, 200];
        let psps = [255, 255, 200];
        let types = [0, 1, 0];
        let mut contributions = [0.0; 3];

        compute_synaptic_contributions_batch(&weights, &psps, &types, &mut contributions);

        assert_eq!(contributions, [65025.0, -32640.0, 40000.0]);
    }
}
