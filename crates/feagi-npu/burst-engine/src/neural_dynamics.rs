// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Neural Dynamics (Phase 2)
//!
//! Membrane potential updates, threshold checks, and firing logic.
//!
//! Only neurons present in the Fire Candidate List are visited; everything else keeps its
//! state untouched for the burst. Candidates are visited in ascending id order so that the
//! resulting Fire Queue (and anything derived from it) is deterministic.

use crate::fire_structures::{FireQueue, FiringNeuron};
use feagi_npu_neural::types::*;
use feagi_npu_neural::{excitability_random, LIFModel};
use feagi_npu_runtime::NeuronStorage;
use std::sync::OnceLock;
use tracing::trace;

/// Runtime-gated tracing config for neural dynamics.
/// Enable with:
/// - FEAGI_NPU_TRACE_DYNAMICS=1
/// Optional filters:
/// - FEAGI_NPU_TRACE_NEURON=<u32 neuron_id> (single neuron)
struct DynamicsTraceCfg {
    enabled: bool,
    neuron_filter: Option<u32>,
}

fn dynamics_trace_cfg() -> &'static DynamicsTraceCfg {
    static CFG: OnceLock<DynamicsTraceCfg> = OnceLock::new();
    CFG.get_or_init(|| {
        let enabled = std::env::var("FEAGI_NPU_TRACE_DYNAMICS")
            .ok()
            .as_deref()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let neuron_filter = std::env::var("FEAGI_NPU_TRACE_NEURON")
            .ok()
            .and_then(|v| v.parse().ok());

        DynamicsTraceCfg {
            enabled,
            neuron_filter,
        }
    })
}

impl DynamicsTraceCfg {
    #[inline]
    fn allows(&self, neuron_id: u32) -> bool {
        self.enabled && self.neuron_filter.map(|id| id == neuron_id).unwrap_or(true)
    }
}

/// Result of neural dynamics processing
#[derive(Debug, Clone)]
pub struct DynamicsResult {
    /// Neurons that fired this burst
    pub fire_queue: FireQueue,

    /// Performance metrics
    pub neurons_processed: usize,
    pub neurons_fired: usize,
    pub neurons_in_refractory: usize,

    /// FCL entries that did not refer to a valid neuron
    pub neurons_skipped: usize,
}

/// Outcome of a single neuron update
enum NeuronOutcome {
    Refractory,
    Quiet,
    Fired(FiringNeuron),
}

/// Process neural dynamics for all candidate neurons
///
/// ## Algorithm (per FCL entry, ascending id):
/// 1. Refractory: decrement the countdown and stop
/// 2. Integrate the candidate potential, then leak toward resting
/// 3. Draw the stochastic threshold
/// 4. Fire inside the `[θ_eff, θ_limit]` window: reset to resting, start refractory
pub fn process_neural_dynamics<N: NeuronStorage>(
    fcl: &FireCandidateList,
    neuron_array: &mut N,
    burst_count: u64,
) -> Result<DynamicsResult> {
    let dynamics_start = std::time::Instant::now();

    let mut fire_queue = FireQueue::new();
    fire_queue.set_timestep(burst_count);

    if fcl.is_empty() {
        return Ok(DynamicsResult {
            fire_queue,
            neurons_processed: 0,
            neurons_fired: 0,
            neurons_in_refractory: 0,
            neurons_skipped: 0,
        });
    }

    // Mutates neuron_array per entry, so this stays sequential.
    let candidates = fcl.sorted_entries();
    let mut processed = 0;
    let mut refractory = 0;
    let mut skipped = 0;

    for &(neuron_id, candidate_potential) in &candidates {
        if !neuron_array.is_valid(NeuronId(neuron_id)) {
            skipped += 1;
            continue;
        }
        processed += 1;

        match process_single_neuron(neuron_id, candidate_potential, neuron_array, burst_count) {
            NeuronOutcome::Refractory => refractory += 1,
            NeuronOutcome::Quiet => {}
            NeuronOutcome::Fired(neuron) => fire_queue.add_neuron(neuron),
        }
    }

    if skipped > 0 {
        tracing::debug!(
            target: "feagi-npu-burst-engine",
            "[PHASE2-DYNAMICS] Skipped {} FCL entries without a valid neuron (burst {})",
            skipped,
            burst_count
        );
    }

    let dynamics_duration = dynamics_start.elapsed();

    // Log if dynamics processing is slow (>20ms)
    if dynamics_duration.as_millis() > 20 {
        tracing::warn!(
            "[PHASE2-DYNAMICS] Slow dynamics processing: {:.2}ms for {} candidates, {} fired",
            dynamics_duration.as_secs_f64() * 1000.0,
            candidates.len(),
            fire_queue.total_count()
        );
    }

    let neurons_fired = fire_queue.total_count();
    Ok(DynamicsResult {
        fire_queue,
        neurons_processed: processed,
        neurons_fired,
        neurons_in_refractory: refractory,
        neurons_skipped: skipped,
    })
}

/// Process a single (valid) neuron's dynamics
#[inline(always)]
fn process_single_neuron<N: NeuronStorage>(
    neuron_id: u32,
    candidate_potential: f32,
    neuron_array: &mut N,
    burst_count: u64,
) -> NeuronOutcome {
    let idx = neuron_id as usize;
    let allow_trace = dynamics_trace_cfg().allows(neuron_id);

    // 1. Refractory blocks the whole burst; the candidate is discarded.
    // Avoid mixing *_mut() borrows with immutable borrows in logging.
    let refractory_countdown = neuron_array.refractory_countdowns()[idx];
    if refractory_countdown > 0 {
        if allow_trace {
            trace!(
                target: "feagi-npu-trace",
                "[DYN] burst={} neuron={} REFRACTORY countdown={} candidate={:.6}",
                burst_count,
                neuron_id,
                refractory_countdown,
                candidate_potential
            );
        }
        neuron_array.refractory_countdowns_mut()[idx] = refractory_countdown - 1;
        return NeuronOutcome::Refractory;
    }

    let range = *neuron_array.range();

    // 2. Integrate then leak
    let current = neuron_array.membrane_potentials()[idx];
    let resting = neuron_array.resting_potentials()[idx];
    let leak = neuron_array.leak_coefficients()[idx];
    let integrated = current.saturating_add(N::Value::from_f32(candidate_potential, &range));
    let membrane = LIFModel::apply_leak(integrated, resting, leak, &range);

    // 3. Stochastic threshold
    let threshold = neuron_array.thresholds()[idx];
    let excitability = neuron_array.excitabilities()[idx];
    let effective_threshold = if excitability > 0.0 {
        let random = excitability_random(neuron_id, burst_count);
        LIFModel::effective_threshold(threshold, excitability, random)
    } else {
        threshold
    };

    // 4. Firing window
    let threshold_limit = neuron_array.threshold_limits()[idx];
    let fires = LIFModel::should_fire(membrane, effective_threshold, threshold_limit);

    if allow_trace {
        trace!(
            target: "feagi-npu-trace",
            "[DYN] burst={} neuron={} candidate={:.6} mp_before={:.6} mp_after_leak={:.6} thr_eff={:.6} fired={}",
            burst_count,
            neuron_id,
            candidate_potential,
            current.to_f32(&range),
            membrane.to_f32(&range),
            effective_threshold.to_f32(&range),
            fires
        );
    }

    if !fires {
        neuron_array.membrane_potentials_mut()[idx] = membrane;
        neuron_array.consecutive_fire_counts_mut()[idx] = 0;
        return NeuronOutcome::Quiet;
    }

    let refractory_period = neuron_array.refractory_periods()[idx];
    let fire_limit = neuron_array.consecutive_fire_limits()[idx];
    let fire_count = neuron_array.consecutive_fire_counts()[idx];
    let cortical_idx = neuron_array.cortical_areas()[idx];
    let (x, y, z) = neuron_array.coordinates()[idx];

    neuron_array.membrane_potentials_mut()[idx] = resting;
    neuron_array.refractory_countdowns_mut()[idx] = refractory_period;
    neuron_array.consecutive_fire_counts_mut()[idx] = fire_count.saturating_add(1).min(fire_limit);

    NeuronOutcome::Fired(FiringNeuron {
        neuron_id: NeuronId(neuron_id),
        membrane_potential: membrane.to_f32(&range),
        cortical_idx,
        x,
        y,
        z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use feagi_npu_neural::LIFParameters;
    use feagi_npu_runtime::{IdReusePolicy, StdNeuronArray};

    fn neurons(capacity: usize) -> StdNeuronArray<f32> {
        StdNeuronArray::new(capacity, QuantizationRange::default(), IdReusePolicy::Tombstone)
    }

    fn params(threshold: f32, leak: f32, refractory: u16) -> LIFParameters {
        LIFParameters {
            threshold,
            leak_coefficient: leak,
            refractory_period: refractory,
            ..LIFParameters::default()
        }
    }

    #[test]
    fn test_neuron_fires_when_above_threshold() {
        let mut neurons = neurons(10);
        let id = neurons.add_neuron(&params(1.0, 0.0, 5), 1, (2, 3, 4)).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 1.5);

        let result = process_neural_dynamics(&fcl, &mut neurons, 0).unwrap();

        assert_eq!(result.neurons_fired, 1);
        assert_eq!(result.fire_queue.total_count(), 1);
        let fired = result.fire_queue.get_area_neurons(1).unwrap()[0];
        assert_eq!((fired.x, fired.y, fired.z), (2, 3, 4));
        assert_eq!(fired.membrane_potential, 1.5);
        assert_eq!(neurons.membrane_potentials[0], 0.0); // Reset after firing
        assert_eq!(neurons.refractory_countdowns[0], 5); // Refractory set
    }

    #[test]
    fn test_neuron_does_not_fire_below_threshold() {
        let mut neurons = neurons(10);
        let id = neurons.add_neuron(&params(1.0, 0.1, 5), 1, (0, 0, 0)).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 0.5);

        let result = process_neural_dynamics(&fcl, &mut neurons, 0).unwrap();

        assert_eq!(result.neurons_fired, 0);
        assert!(result.fire_queue.is_empty());
        assert!((neurons.membrane_potentials[0] - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_refractory_period_blocks_firing() {
        let mut neurons = neurons(10);
        let id = neurons.add_neuron(&params(1.0, 0.0, 2), 1, (0, 0, 0)).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 5.0);

        let fired: Vec<usize> = (0..6)
            .map(|burst| {
                process_neural_dynamics(&fcl, &mut neurons, burst)
                    .unwrap()
                    .neurons_fired
            })
            .collect();
        // fire, blocked, blocked, fire, ...
        assert_eq!(fired, vec![1, 0, 0, 1, 0, 0]);
        // Potential delivered during refractory is discarded, not accumulated
        assert_eq!(neurons.membrane_potentials[0], 0.0);
    }

    #[test]
    fn test_leak_decay_toward_resting() {
        let mut neurons = neurons(10);
        let p = LIFParameters {
            threshold: 100.0,
            leak_coefficient: 0.5,
            resting_potential: -10.0,
            ..LIFParameters::default()
        };
        let id = neurons.add_neuron(&p, 1, (0, 0, 0)).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 30.0);
        process_neural_dynamics(&fcl, &mut neurons, 0).unwrap();
        // -10 + 30 = 20, then 20 - 0.5 * (20 - -10) = 5
        assert!((neurons.membrane_potentials[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_untouched_neurons_keep_state() {
        let mut neurons = neurons(10);
        let a = neurons.add_neuron(&params(10.0, 0.5, 0), 1, (0, 0, 0)).unwrap();
        let b = neurons.add_neuron(&params(10.0, 0.5, 0), 1, (1, 0, 0)).unwrap();
        neurons.membrane_potentials[b.index()] = 4.0;

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(a, 2.0);
        process_neural_dynamics(&fcl, &mut neurons, 0).unwrap();

        // b is not in the FCL: no leak applied
        assert_eq!(neurons.membrane_potentials[b.index()], 4.0);
    }

    #[test]
    fn test_threshold_limit_window() {
        let mut neurons = neurons(10);
        let p = LIFParameters {
            threshold: 1.0,
            threshold_limit: Some(2.0),
            leak_coefficient: 0.0,
            ..LIFParameters::default()
        };
        let id = neurons.add_neuron(&p, 1, (0, 0, 0)).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 3.0);
        let result = process_neural_dynamics(&fcl, &mut neurons, 0).unwrap();
        assert_eq!(result.neurons_fired, 0);
        assert_eq!(neurons.membrane_potentials[0], 3.0);
    }

    #[test]
    fn test_consecutive_fire_count_saturates_and_resets() {
        let mut neurons = neurons(10);
        let p = LIFParameters {
            threshold: 1.0,
            leak_coefficient: 0.0,
            consecutive_fire_limit: 2,
            ..LIFParameters::default()
        };
        let id = neurons.add_neuron(&p, 1, (0, 0, 0)).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 1.0);
        for burst in 0..4 {
            process_neural_dynamics(&fcl, &mut neurons, burst).unwrap();
        }
        assert_eq!(neurons.consecutive_fire_counts[0], 2);

        let mut weak = FireCandidateList::new();
        weak.add_candidate(id, 0.1);
        process_neural_dynamics(&weak, &mut neurons, 4).unwrap();
        assert_eq!(neurons.consecutive_fire_counts[0], 0);
    }

    #[test]
    fn test_invalid_ids_are_skipped_and_counted() {
        let mut neurons = neurons(10);
        let id = neurons.add_neuron(&params(1.0, 0.0, 0), 1, (0, 0, 0)).unwrap();
        let gone = neurons.add_neuron(&params(1.0, 0.0, 0), 1, (1, 0, 0)).unwrap();
        neurons.delete_neuron(gone).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 2.0);
        fcl.add_candidate(gone, 2.0);
        fcl.add_candidate(NeuronId(999), 2.0);

        let result = process_neural_dynamics(&fcl, &mut neurons, 0).unwrap();
        assert_eq!(result.neurons_processed, 1);
        assert_eq!(result.neurons_skipped, 2);
        assert_eq!(result.fire_queue.get_all_neuron_ids(), vec![id]);
    }

    #[test]
    fn test_excitability_is_reproducible_per_burst() {
        let build = || {
            let mut neurons = neurons(64);
            let p = LIFParameters {
                threshold: 10.0,
                leak_coefficient: 0.0,
                excitability: 1.0,
                ..LIFParameters::default()
            };
            for i in 0..64 {
                neurons.add_neuron(&p, 1, (i, 0, 0)).unwrap();
            }
            neurons
        };
        let mut fcl = FireCandidateList::new();
        for i in 0..64 {
            fcl.add_candidate(NeuronId(i), 5.0);
        }

        let mut a = build();
        let mut b = build();
        let ra = process_neural_dynamics(&fcl, &mut a, 17).unwrap();
        let rb = process_neural_dynamics(&fcl, &mut b, 17).unwrap();
        assert_eq!(
            ra.fire_queue.get_all_neuron_ids(),
            rb.fire_queue.get_all_neuron_ids()
        );
        // Half the threshold is reachable for roughly half the draws
        assert!(ra.neurons_fired > 0 && ra.neurons_fired < 64);
    }

    #[test]
    fn test_int8_neurons_fire_and_reset() {
        let range = QuantizationRange::default();
        let mut neurons: StdNeuronArray<INT8Value> =
            StdNeuronArray::new(4, range, IdReusePolicy::Tombstone);
        let id = neurons.add_neuron(&params(10.0, 0.0, 1), 3, (0, 0, 0)).unwrap();

        let mut fcl = FireCandidateList::new();
        fcl.add_candidate(id, 12.0);
        let result = process_neural_dynamics(&fcl, &mut neurons, 0).unwrap();
        assert_eq!(result.neurons_fired, 1);
        assert_eq!(neurons.membrane_potentials[0], INT8Value::zero());

        // Saturating input never wraps negative
        fcl.clear();
        fcl.add_candidate(id, 1.0e6);
        process_neural_dynamics(&fcl, &mut neurons, 1).unwrap(); // refractory
        let result = process_neural_dynamics(&fcl, &mut neurons, 2).unwrap();
        assert_eq!(result.neurons_fired, 1);
        assert!(result.fire_queue.iter().all(|n| n.membrane_potential > 0.0));
    }
}
