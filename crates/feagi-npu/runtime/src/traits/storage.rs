// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Neuron and synapse storage traits

use crate::error::Result;
use feagi_npu_neural::types::{NeuralValue, NeuronId, QuantizationRange, SynapseId};
use feagi_npu_neural::{LIFParameters, SynapseType};

/// Per-neuron state and parameters as parallel slices
///
/// Every slice has length `capacity()`; slot `i` holds neuron `NeuronId(i)` and is only
/// meaningful while `valid_mask()[i]` is true.
pub trait NeuronStorage: Send + Sync {
    /// Numeric representation of potentials and thresholds
    type Value: NeuralValue;

    /// Load-time range used to encode/decode `Self::Value`
    fn range(&self) -> &QuantizationRange;

    // Read-only property accessors
    fn membrane_potentials(&self) -> &[Self::Value];
    fn thresholds(&self) -> &[Self::Value];
    fn threshold_limits(&self) -> &[Option<Self::Value>];
    fn leak_coefficients(&self) -> &[f32];
    fn resting_potentials(&self) -> &[Self::Value];
    fn refractory_periods(&self) -> &[u16];
    fn refractory_countdowns(&self) -> &[u16];
    fn excitabilities(&self) -> &[f32];
    fn consecutive_fire_counts(&self) -> &[u16];
    fn consecutive_fire_limits(&self) -> &[u16];
    fn cortical_areas(&self) -> &[u32];
    fn coordinates(&self) -> &[(u32, u32, u32)];
    fn valid_mask(&self) -> &[bool];

    // Mutable state accessors
    fn membrane_potentials_mut(&mut self) -> &mut [Self::Value];
    fn refractory_countdowns_mut(&mut self) -> &mut [u16];
    fn consecutive_fire_counts_mut(&mut self) -> &mut [u16];

    /// Valid neurons
    fn count(&self) -> usize;

    fn capacity(&self) -> usize;

    /// One past the highest slot ever used; iteration over `0..slot_count()` covers every valid id
    fn slot_count(&self) -> usize;

    #[inline]
    fn is_valid(&self, id: NeuronId) -> bool {
        self.valid_mask().get(id.index()).copied().unwrap_or(false)
    }

    fn add_neuron(
        &mut self,
        params: &LIFParameters,
        cortical_area: u32,
        coordinate: (u32, u32, u32),
    ) -> Result<NeuronId>;

    /// All-or-nothing insertion: on error nothing has been added
    fn add_neurons_batch(
        &mut self,
        params: &[LIFParameters],
        cortical_areas: &[u32],
        coordinates: &[(u32, u32, u32)],
    ) -> Result<Vec<NeuronId>>;

    fn delete_neuron(&mut self, id: NeuronId) -> Result<()>;
}

/// Synapses as parallel slices
///
/// Weight and PSP are absolute 0-255 magnitudes; the sign comes from the type.
pub trait SynapseStorage: Send + Sync {
    fn source_neurons(&self) -> &[u32];
    fn target_neurons(&self) -> &[u32];
    fn weights(&self) -> &[u8];
    fn postsynaptic_potentials(&self) -> &[u8];
    fn types(&self) -> &[SynapseType];
    fn valid_mask(&self) -> &[bool];

    /// Valid synapses
    fn count(&self) -> usize;

    fn capacity(&self) -> usize;

    fn slot_count(&self) -> usize;

    /// Bumped on every structural change (add/remove); weight updates do not bump it
    fn version(&self) -> u64;

    fn add_synapse(
        &mut self,
        source: NeuronId,
        target: NeuronId,
        weight: u8,
        psp: u8,
        synapse_type: SynapseType,
    ) -> Result<SynapseId>;

    /// All-or-nothing insertion: on error nothing has been added
    fn add_synapses_batch(
        &mut self,
        sources: &[u32],
        targets: &[u32],
        weights: &[u8],
        psps: &[u8],
        types: &[SynapseType],
    ) -> Result<Vec<SynapseId>>;

    fn remove_synapse(&mut self, id: SynapseId) -> Result<()>;

    /// Returns the number of synapses removed
    fn remove_synapses_from_source(&mut self, source: NeuronId) -> usize;

    /// Returns the number of synapses removed
    fn remove_synapses_to_target(&mut self, target: NeuronId) -> usize;

    fn update_weight(&mut self, id: SynapseId, weight: u8) -> Result<()>;
}
