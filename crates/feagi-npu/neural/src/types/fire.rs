// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fire Candidate List (FCL)
//!
//! The only channel from synaptic propagation to neural dynamics. Rebuilt every burst.

use super::ids::NeuronId;

/// Fire Candidate List (FCL) - neurons that might fire this burst
///
/// Potentials are accumulated in `f32` regardless of the network precision. Synaptic
/// contributions are integers (`weight × psp`), so sums stay exact below 2^24 and the
/// result does not depend on the order in which sources are processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FireCandidateList {
    candidates: ahash::AHashMap<u32, f32>,
}

impl FireCandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            candidates: ahash::AHashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn add_candidate(&mut self, neuron_id: NeuronId, potential: f32) {
        *self.candidates.entry(neuron_id.0).or_insert(0.0) += potential;
    }

    /// Add multiple candidates in batch
    pub fn add_candidates_batch(&mut self, candidates: &[(NeuronId, f32)]) {
        if candidates.is_empty() {
            return;
        }
        self.candidates.reserve(candidates.len());
        for &(neuron_id, potential) in candidates {
            *self.candidates.entry(neuron_id.0).or_insert(0.0) += potential;
        }
    }

    /// Fold another list into this one (used to reduce per-thread partial lists)
    pub fn merge(&mut self, other: FireCandidateList) {
        if self.candidates.len() < other.candidates.len() {
            let mut other = other;
            std::mem::swap(self, &mut other);
            self.merge(other);
            return;
        }
        for (id, potential) in other.candidates {
            *self.candidates.entry(id).or_insert(0.0) += potential;
        }
    }

    pub fn reserve(&mut self, capacity: usize) {
        self.candidates.reserve(capacity);
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, neuron_id: NeuronId) -> Option<f32> {
        self.candidates.get(&neuron_id.0).copied()
    }

    pub fn contains(&self, neuron_id: NeuronId) -> bool {
        self.candidates.contains_key(&neuron_id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NeuronId, f32)> + '_ {
        self.candidates
            .iter()
            .map(|(&id, &pot)| (NeuronId(id), pot))
    }

    /// Entries sorted by neuron id (deterministic processing and GPU upload order)
    pub fn sorted_entries(&self) -> Vec<(u32, f32)> {
        let mut entries: Vec<(u32, f32)> =
            self.candidates.iter().map(|(&id, &pot)| (id, pot)).collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_accumulate() {
        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(NeuronId(3), 1.5);
        fcl.add_candidate(NeuronId(3), -0.5);
        fcl.add_candidates_batch(&[(NeuronId(1), 2.0), (NeuronId(3), 1.0)]);

        assert_eq!(fcl.len(), 2);
        assert_eq!(fcl.get(NeuronId(3)), Some(2.0));
        assert_eq!(fcl.get(NeuronId(9)), None);
        assert_eq!(fcl.sorted_entries(), vec![(1, 2.0), (3, 2.0)]);
    }

    #[test]
    fn test_merge_is_order_independent_for_integer_contributions() {
        let mut a = FireCandidateList::new();
        let mut b = FireCandidateList::new();
        a.add_candidate(NeuronId(1), 65025.0);
        a.add_candidate(NeuronId(2), -255.0);
        b.add_candidate(NeuronId(1), -1.0);
        b.add_candidate(NeuronId(7), 3.0);

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);
        assert_eq!(ab.sorted_entries(), ba.sorted_entries());
        assert_eq!(ab.get(NeuronId(1)), Some(65024.0));
    }
}
