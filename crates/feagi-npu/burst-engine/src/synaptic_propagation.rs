// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # Synaptic Propagation Engine (Phase 1)
//!
//! Turns the previous burst's fired neurons into accumulated candidate potentials.
//!
//! ## Algorithm
//! 1. **Lookup**: each fired id resolves to its synapse run through the [`SourceIndex`]
//! 2. **Compute**: `contribution = sign × weight × psp` (absolute 0-255 units, no normalization)
//! 3. **Accumulate**: per-thread partial FCLs (rayon `fold`), merged with `reduce`
//!
//! ## Order independence
//! Every contribution is a whole number with magnitude <= 65,025. Sums of whole numbers
//! are exact in `f32` while they stay below 2^24, so the FCL is bit-identical for any
//! processing order until a single target collects ~258 maximal inputs; past that the
//! results agree within floating tolerance.

use feagi_npu_neural::synapse::{compute_synaptic_contribution, SynapseType};
use feagi_npu_neural::types::{FireCandidateList, NeuronId};
use feagi_npu_runtime::{SourceIndex, SynapseStorage};
use rayon::prelude::*;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, trace};

/// Below this many fired neurons the rayon split costs more than it saves
const PARALLEL_FIRED_THRESHOLD: usize = 256;

/// Runtime-gated tracing config for synaptic propagation.
/// Enable with:
/// - FEAGI_NPU_TRACE_SYNAPSE=1
///   Optional filters:
/// - FEAGI_NPU_TRACE_SRC=<u32 neuron_id>
/// - FEAGI_NPU_TRACE_DST=<u32 neuron_id>
struct SynapseTraceCfg {
    enabled: bool,
    src_filter: Option<u32>,
    dst_filter: Option<u32>,
}

fn synapse_trace_cfg() -> &'static SynapseTraceCfg {
    static CFG: OnceLock<SynapseTraceCfg> = OnceLock::new();
    CFG.get_or_init(|| {
        let enabled = std::env::var("FEAGI_NPU_TRACE_SYNAPSE")
            .ok()
            .as_deref()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let src_filter = std::env::var("FEAGI_NPU_TRACE_SRC").ok().and_then(|v| v.parse().ok());
        let dst_filter = std::env::var("FEAGI_NPU_TRACE_DST").ok().and_then(|v| v.parse().ok());

        SynapseTraceCfg {
            enabled,
            src_filter,
            dst_filter,
        }
    })
}

/// Profile of the last propagation call
#[derive(Clone, Debug, Default)]
pub struct PropagationProfile {
    pub fired_neurons: usize,
    pub synapses_processed: usize,
    pub candidates: usize,
    pub index_rebuilt: bool,
    pub total_ms: f64,
    pub parallel: bool,
}

/// Synaptic propagation with a persistent source index
pub struct SynapticPropagationEngine {
    source_index: SourceIndex,
    total_propagations: u64,
    total_synapses_processed: u64,
    last_profile: Option<PropagationProfile>,
}

impl SynapticPropagationEngine {
    pub fn new() -> Self {
        Self {
            source_index: SourceIndex::default(),
            total_propagations: 0,
            total_synapses_processed: 0,
            last_profile: None,
        }
    }

    pub fn source_index(&self) -> &SourceIndex {
        &self.source_index
    }

    /// Rebuild the index unconditionally
    pub fn build_synapse_index<S: SynapseStorage + ?Sized>(&mut self, synapse_storage: &S) {
        self.source_index = SourceIndex::build(synapse_storage);
    }

    /// Rebuild the index only if the store changed since the last build; returns whether it did
    pub fn ensure_index<S: SynapseStorage + ?Sized>(&mut self, synapse_storage: &S) -> bool {
        if self.source_index.is_stale(synapse_storage) {
            self.build_synapse_index(synapse_storage);
            true
        } else {
            false
        }
    }

    /// Force a rebuild on the next propagation
    pub fn invalidate_index(&mut self) {
        self.source_index = SourceIndex::default();
    }

    pub fn last_profile(&self) -> Option<&PropagationProfile> {
        self.last_profile.as_ref()
    }

    /// Accumulate the contributions of `fired_neurons` into `fcl`
    ///
    /// Returns the number of synapses processed.
    pub fn propagate<S: SynapseStorage + ?Sized>(
        &mut self,
        fired_neurons: &[u32],
        synapse_storage: &S,
        fcl: &mut FireCandidateList,
    ) -> usize {
        let start = Instant::now();
        self.total_propagations += 1;
        let index_rebuilt = self.ensure_index(synapse_storage);
        if index_rebuilt {
            debug!(
                "[PHASE1-PROPAGATION] Source index rebuilt: {} sources, {} synapses",
                self.source_index.source_count(),
                self.source_index.synapse_count()
            );
        }

        let parallel = fired_neurons.len() >= PARALLEL_FIRED_THRESHOLD;
        let index = &self.source_index;
        let synapses_processed = if parallel {
            let (partial, processed) = fired_neurons
                .par_iter()
                .fold(
                    || (FireCandidateList::new(), 0usize),
                    |(mut acc, count), &source| {
                        let n = accumulate_source(source, index, synapse_storage, &mut acc);
                        (acc, count + n)
                    },
                )
                .reduce(
                    || (FireCandidateList::new(), 0usize),
                    |(mut a, ca), (b, cb)| {
                        a.merge(b);
                        (a, ca + cb)
                    },
                );
            fcl.merge(partial);
            processed
        } else {
            fired_neurons
                .iter()
                .map(|&source| accumulate_source(source, index, synapse_storage, fcl))
                .sum()
        };

        self.total_synapses_processed += synapses_processed as u64;
        self.last_profile = Some(PropagationProfile {
            fired_neurons: fired_neurons.len(),
            synapses_processed,
            candidates: fcl.len(),
            index_rebuilt,
            total_ms: start.elapsed().as_secs_f64() * 1000.0,
            parallel,
        });
        synapses_processed
    }

    /// (total propagations, total synapses processed)
    pub fn stats(&self) -> (u64, u64) {
        (self.total_propagations, self.total_synapses_processed)
    }

    pub fn reset_stats(&mut self) {
        self.total_propagations = 0;
        self.total_synapses_processed = 0;
    }
}

impl Default for SynapticPropagationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Add every outgoing contribution of one source; returns synapses visited
#[inline]
fn accumulate_source<S: SynapseStorage + ?Sized>(
    source: u32,
    index: &SourceIndex,
    synapse_storage: &S,
    fcl: &mut FireCandidateList,
) -> usize {
    let run = index.lookup(source);
    let targets = synapse_storage.target_neurons();
    let weights = synapse_storage.weights();
    let psps = synapse_storage.postsynaptic_potentials();
    let types = synapse_storage.types();
    let trace_cfg = synapse_trace_cfg();

    for &syn_idx in run {
        let i = syn_idx as usize;
        let target = targets[i];
        let contribution = compute_synaptic_contribution(weights[i], psps[i], types[i]);
        fcl.add_candidate(NeuronId(target), contribution);

        if trace_cfg.enabled
            && trace_cfg.src_filter.map_or(true, |s| s == source)
            && trace_cfg.dst_filter.map_or(true, |d| d == target)
        {
            trace!(
                target: "feagi-npu-trace",
                "[SYN] src={} dst={} syn={} w={} psp={} {} contribution={:.1}",
                source,
                target,
                syn_idx,
                weights[i],
                psps[i],
                if types[i] == SynapseType::Inhibitory { "inh" } else { "exc" },
                contribution
            );
        }
    }
    run.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use feagi_npu_runtime::{IdReusePolicy, StdSynapseArray};

    fn create_test_synapses() -> StdSynapseArray {
        let mut synapses = StdSynapseArray::new(16, IdReusePolicy::Tombstone);
        synapses
            .add_synapses_batch(
                &[1, 1, 2, 3],
                &[10, 11, 10, 12],
                &[255, 128, 200, 50],
                &[255, 255, 100, 10],
                &[
                    SynapseType::Excitatory,
                    SynapseType::Excitatory,
                    SynapseType::Inhibitory,
                    SynapseType::Excitatory,
                ],
            )
            .unwrap();
        synapses
    }

    #[test]
    fn test_synaptic_propagation() {
        let synapses = create_test_synapses();
        let mut engine = SynapticPropagationEngine::new();
        let mut fcl = FireCandidateList::new();

        let processed = engine.propagate(&[1, 2], &synapses, &mut fcl);
        assert_eq!(processed, 3);
        assert_eq!(fcl.get(NeuronId(10)), Some(65025.0 - 20000.0));
        assert_eq!(fcl.get(NeuronId(11)), Some(128.0 * 255.0));
        assert_eq!(fcl.get(NeuronId(12)), None);
        assert!(engine.last_profile().unwrap().index_rebuilt);

        // Unchanged store reuses the index
        let mut fcl = FireCandidateList::new();
        engine.propagate(&[3], &synapses, &mut fcl);
        assert!(!engine.last_profile().unwrap().index_rebuilt);
        assert_eq!(fcl.get(NeuronId(12)), Some(500.0));
        assert_eq!(engine.stats(), (2, 4));
    }

    #[test]
    fn test_removed_synapse_stops_propagating() {
        let mut synapses = create_test_synapses();
        let mut engine = SynapticPropagationEngine::new();
        let mut fcl = FireCandidateList::new();
        engine.propagate(&[1], &synapses, &mut fcl);
        assert_eq!(fcl.len(), 2);

        synapses.remove_synapses_from_source(NeuronId(1));
        let mut fcl = FireCandidateList::new();
        assert_eq!(engine.propagate(&[1], &synapses, &mut fcl), 0);
        assert!(fcl.is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let n = 2_000u32;
        let mut synapses = StdSynapseArray::new(20_000, IdReusePolicy::Tombstone);
        let mut sources = Vec::new();
        let mut targets = Vec::new();
        let mut weights = Vec::new();
        let mut types = Vec::new();
        for s in 0..n {
            for k in 0..8u32 {
                sources.push(s);
                targets.push((s * 31 + k * 17) % 500);
                weights.push(((s + k) % 256) as u8);
                types.push(if (s + k) % 5 == 0 {
                    SynapseType::Inhibitory
                } else {
                    SynapseType::Excitatory
                });
            }
        }
        let psps = vec![3u8; sources.len()];
        synapses
            .add_synapses_batch(&sources, &targets, &weights, &psps, &types)
            .unwrap();

        let fired: Vec<u32> = (0..n).collect();
        let mut parallel_fcl = FireCandidateList::new();
        let mut engine = SynapticPropagationEngine::new();
        engine.propagate(&fired, &synapses, &mut parallel_fcl);
        assert!(engine.last_profile().unwrap().parallel);

        let mut sequential_fcl = FireCandidateList::new();
        // Reverse order, chunks below the parallel threshold
        for chunk in fired.chunks(7).rev() {
            engine.propagate(chunk, &synapses, &mut sequential_fcl);
        }
        assert_eq!(parallel_fcl.sorted_entries(), sequential_fcl.sorted_entries());
    }
}
