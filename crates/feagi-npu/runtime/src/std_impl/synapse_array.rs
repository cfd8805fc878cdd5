// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Standard synapse array implementation
//!
//! Fixed-capacity parallel arrays. Lookup by source goes through
//! [`SourceIndex`](crate::SourceIndex), rebuilt when [`SynapseStorage::version`] changes.

use crate::error::{IdKind, Result, RuntimeError};
use crate::id_allocator::{IdAllocator, IdReusePolicy};
use crate::traits::SynapseStorage;
use feagi_npu_neural::types::{NeuronId, SynapseId};
use feagi_npu_neural::SynapseType;

/// Fixed-capacity synapse array for desktop/server environments
#[derive(Debug, Clone)]
pub struct SynapseArray {
    pub source_neurons: Vec<u32>,

    pub target_neurons: Vec<u32>,

    /// Synaptic weights (0-255)
    pub weights: Vec<u8>,

    /// Postsynaptic potentials (0-255)
    pub postsynaptic_potentials: Vec<u8>,

    pub types: Vec<SynapseType>,

    pub valid_mask: Vec<bool>,

    allocator: IdAllocator,
    valid_count: usize,
    version: u64,
}

impl SynapseArray {
    pub fn new(capacity: usize, policy: IdReusePolicy) -> Self {
        Self {
            source_neurons: vec![0; capacity],
            target_neurons: vec![0; capacity],
            weights: vec![0; capacity],
            postsynaptic_potentials: vec![0; capacity],
            types: vec![SynapseType::Excitatory; capacity],
            valid_mask: vec![false; capacity],
            allocator: IdAllocator::new("synapse", capacity, policy),
            valid_count: 0,
            version: 0,
        }
    }

    fn check_valid(&self, id: SynapseId) -> Result<usize> {
        let idx = id.index();
        if self.valid_mask.get(idx).copied().unwrap_or(false) {
            Ok(idx)
        } else {
            Err(RuntimeError::InvalidId {
                kind: IdKind::Synapse,
                id: id.0,
            })
        }
    }

    fn write_slot(
        &mut self,
        idx: usize,
        source: u32,
        target: u32,
        weight: u8,
        psp: u8,
        synapse_type: SynapseType,
    ) {
        self.source_neurons[idx] = source;
        self.target_neurons[idx] = target;
        self.weights[idx] = weight;
        self.postsynaptic_potentials[idx] = psp;
        self.types[idx] = synapse_type;
        self.valid_mask[idx] = true;
        self.valid_count += 1;
    }

    fn invalidate(&mut self, idx: usize) {
        self.valid_mask[idx] = false;
        self.valid_count -= 1;
        self.allocator.release(idx as u32);
    }

    /// Remove every valid synapse matching `pred`
    fn remove_where(&mut self, pred: impl Fn(&Self, usize) -> bool) -> usize {
        let mut removed = 0;
        for idx in 0..self.allocator.high_water() {
            if self.valid_mask[idx] && pred(self, idx) {
                self.invalidate(idx);
                removed += 1;
            }
        }
        if removed > 0 {
            self.version += 1;
        }
        removed
    }

    /// `(source, target, weight, psp, type)` of a valid synapse
    pub fn get_synapse(&self, id: SynapseId) -> Option<(NeuronId, NeuronId, u8, u8, SynapseType)> {
        let idx = self.check_valid(id).ok()?;
        Some((
            NeuronId(self.source_neurons[idx]),
            NeuronId(self.target_neurons[idx]),
            self.weights[idx],
            self.postsynaptic_potentials[idx],
            self.types[idx],
        ))
    }
}

impl SynapseStorage for SynapseArray {
    fn source_neurons(&self) -> &[u32] {
        &self.source_neurons
    }

    fn target_neurons(&self) -> &[u32] {
        &self.target_neurons
    }

    fn weights(&self) -> &[u8] {
        &self.weights
    }

    fn postsynaptic_potentials(&self) -> &[u8] {
        &self.postsynaptic_potentials
    }

    fn types(&self) -> &[SynapseType] {
        &self.types
    }

    fn valid_mask(&self) -> &[bool] {
        &self.valid_mask
    }

    fn count(&self) -> usize {
        self.valid_count
    }

    fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    fn slot_count(&self) -> usize {
        self.allocator.high_water()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn add_synapse(
        &mut self,
        source: NeuronId,
        target: NeuronId,
        weight: u8,
        psp: u8,
        synapse_type: SynapseType,
    ) -> Result<SynapseId> {
        let slot = self.allocator.allocate()?;
        self.write_slot(slot as usize, source.0, target.0, weight, psp, synapse_type);
        self.version += 1;
        Ok(SynapseId(slot))
    }

    fn add_synapses_batch(
        &mut self,
        sources: &[u32],
        targets: &[u32],
        weights: &[u8],
        psps: &[u8],
        types: &[SynapseType],
    ) -> Result<Vec<SynapseId>> {
        let n = sources.len();
        for len in [targets.len(), weights.len(), psps.len(), types.len()] {
            if len != n {
                return Err(RuntimeError::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }
        self.allocator.ensure_available(n)?;

        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let slot = self.allocator.allocate()?;
            self.write_slot(slot as usize, sources[i], targets[i], weights[i], psps[i], types[i]);
            ids.push(SynapseId(slot));
        }
        if n > 0 {
            self.version += 1;
        }
        Ok(ids)
    }

    fn remove_synapse(&mut self, id: SynapseId) -> Result<()> {
        let idx = self.check_valid(id)?;
        self.invalidate(idx);
        self.version += 1;
        Ok(())
    }

    fn remove_synapses_from_source(&mut self, source: NeuronId) -> usize {
        self.remove_where(|s, idx| s.source_neurons[idx] == source.0)
    }

    fn remove_synapses_to_target(&mut self, target: NeuronId) -> usize {
        self.remove_where(|s, idx| s.target_neurons[idx] == target.0)
    }

    fn update_weight(&mut self, id: SynapseId, weight: u8) -> Result<()> {
        let idx = self.check_valid(id)?;
        self.weights[idx] = weight;
        Ok(())
    }
}
