// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Source Index
//!
//! Open-addressing hash table mapping a source neuron to the run of synapse indices
//! it drives. The layout is flat so that it can be uploaded to the GPU unchanged:
//!
//! ```text
//! keys:         [u32; capacity]       source id, u32::MAX = empty
//! metadata:     [u32; capacity * 2]   (start, count) into synapse_list
//! synapse_list: [u32; valid_synapses] synapse indices grouped by source, ascending
//! ```
//!
//! Slot of a key: `(source * 2654435761) mod capacity`, linear probing.
//! `capacity` is a power of two, so the modulo is a mask.

use crate::traits::SynapseStorage;
use rayon::prelude::*;
use tracing::debug;

/// Empty slot marker
pub const EMPTY_KEY: u32 = u32::MAX;

/// Knuth multiplicative hash constant, shared with the WGSL shader
pub const HASH_MULTIPLIER: u32 = 2_654_435_761;

const MIN_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SourceIndex {
    keys: Vec<u32>,
    metadata: Vec<u32>,
    synapse_list: Vec<u32>,
    source_count: usize,
    /// Version of the synapse store this index was built from
    version: u64,
}

impl Default for SourceIndex {
    fn default() -> Self {
        Self {
            keys: vec![EMPTY_KEY; MIN_CAPACITY],
            metadata: vec![0; MIN_CAPACITY * 2],
            synapse_list: Vec::new(),
            source_count: 0,
            // Never matches a real store, so the first use always builds
            version: u64::MAX,
        }
    }
}

impl SourceIndex {
    /// Table capacity for a number of distinct sources
    pub fn capacity_for(source_count: usize) -> usize {
        (source_count * 2).next_power_of_two().max(MIN_CAPACITY)
    }

    #[inline(always)]
    fn home_slot(source: u32, mask: usize) -> usize {
        (source.wrapping_mul(HASH_MULTIPLIER) as usize) & mask
    }

    /// Build from the valid synapses of a store
    pub fn build<S: SynapseStorage + ?Sized>(synapses: &S) -> Self {
        let sources = synapses.source_neurons();
        let valid = synapses.valid_mask();

        let mut pairs: Vec<(u32, u32)> = (0..synapses.slot_count())
            .filter(|&i| valid[i])
            .map(|i| (sources[i], i as u32))
            .collect();
        pairs.par_sort_unstable();

        let mut runs: Vec<(u32, u32, u32)> = Vec::new();
        for (pos, &(source, _)) in pairs.iter().enumerate() {
            debug_assert_ne!(source, EMPTY_KEY, "source id collides with empty marker");
            match runs.last_mut() {
                Some(run) if run.0 == source => run.2 += 1,
                _ => runs.push((source, pos as u32, 1)),
            }
        }

        let capacity = Self::capacity_for(runs.len());
        let mask = capacity - 1;
        let mut keys = vec![EMPTY_KEY; capacity];
        let mut metadata = vec![0u32; capacity * 2];
        for &(source, start, count) in &runs {
            let mut slot = Self::home_slot(source, mask);
            while keys[slot] != EMPTY_KEY {
                slot = (slot + 1) & mask;
            }
            keys[slot] = source;
            metadata[slot * 2] = start;
            metadata[slot * 2 + 1] = count;
        }

        debug!(
            target: "feagi-npu-runtime",
            "Built source index: {} sources, {} synapses, {} slots",
            runs.len(),
            pairs.len(),
            capacity
        );

        Self {
            keys,
            metadata,
            synapse_list: pairs.into_iter().map(|(_, idx)| idx).collect(),
            source_count: runs.len(),
            version: synapses.version(),
        }
    }

    /// Synapse indices driven by `source` (empty if none)
    #[inline]
    pub fn lookup(&self, source: u32) -> &[u32] {
        let mask = self.keys.len() - 1;
        let mut slot = Self::home_slot(source, mask);
        // Load factor <= 0.5 guarantees an empty slot terminates the probe
        loop {
            let key = self.keys[slot];
            if key == source {
                let start = self.metadata[slot * 2] as usize;
                let count = self.metadata[slot * 2 + 1] as usize;
                return &self.synapse_list[start..start + count];
            }
            if key == EMPTY_KEY {
                return &[];
            }
            slot = (slot + 1) & mask;
        }
    }

    /// True when the store has changed since this index was built
    pub fn is_stale<S: SynapseStorage + ?Sized>(&self, synapses: &S) -> bool {
        self.version != synapses.version()
    }

    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn synapse_count(&self) -> usize {
        self.synapse_list.len()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    /// `(start, count)` pairs, flattened
    pub fn metadata(&self) -> &[u32] {
        &self.metadata
    }

    pub fn synapse_list(&self) -> &[u32] {
        &self.synapse_list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_allocator::IdReusePolicy;
    use crate::std_impl::SynapseArray;
    use feagi_npu_neural::types::{NeuronId, SynapseId};
    use feagi_npu_neural::SynapseType;

    fn naive(synapses: &SynapseArray, source: u32) -> Vec<u32> {
        (0..synapses.slot_count())
            .filter(|&i| synapses.valid_mask[i] && synapses.source_neurons[i] == source)
            .map(|i| i as u32)
            .collect()
    }

    #[test]
    fn test_lookup_matches_naive_scan() {
        let mut synapses = SynapseArray::new(4096, IdReusePolicy::Tombstone);
        // Sources chosen to collide in a 256-slot table
        for i in 0..3000u32 {
            let source = (i * 7919) % 613;
            synapses
                .add_synapse(NeuronId(source), NeuronId(i), 1, 1, SynapseType::Excitatory)
                .unwrap();
        }
        for i in (0..3000u32).step_by(5) {
            synapses.remove_synapse(SynapseId(i)).unwrap();
        }

        let index = SourceIndex::build(&synapses);
        assert_eq!(index.synapse_count(), synapses.count());
        assert!(index.capacity().is_power_of_two());
        assert!(index.capacity() >= index.source_count() * 2);
        for source in 0..700 {
            assert_eq!(index.lookup(source), naive(&synapses, source).as_slice());
        }
    }

    #[test]
    fn test_minimum_capacity_and_empty() {
        let synapses = SynapseArray::new(8, IdReusePolicy::Tombstone);
        let index = SourceIndex::build(&synapses);
        assert_eq!(index.capacity(), 256);
        assert!(index.lookup(0).is_empty());
        assert!(!index.is_stale(&synapses));
        assert!(SourceIndex::default().is_stale(&synapses));
    }

    #[test]
    fn test_stale_after_structural_change() {
        let mut synapses = SynapseArray::new(8, IdReusePolicy::Tombstone);
        synapses
            .add_synapse(NeuronId(1), NeuronId(2), 1, 1, SynapseType::Excitatory)
            .unwrap();
        let index = SourceIndex::build(&synapses);
        assert_eq!(index.lookup(1), &[0]);
        synapses
            .add_synapse(NeuronId(1), NeuronId(3), 1, 1, SynapseType::Excitatory)
            .unwrap();
        assert!(index.is_stale(&synapses));
        assert_eq!(SourceIndex::build(&synapses).lookup(1), &[0, 1]);
    }
}
