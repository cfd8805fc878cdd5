// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # CPU Backend
//!
//! Wraps the in-process engines: rayon propagation through the persistent source index,
//! then sequential sparse dynamics. Always available.

use super::{ComputeBackend, DynamicsOutput};
use crate::neural_dynamics;
use crate::synaptic_propagation::SynapticPropagationEngine;
use feagi_npu_neural::models::LIFModel;
use feagi_npu_neural::types::*;
use feagi_npu_runtime::{NeuronStorage, SynapseStorage};

/// CPU backend (rayon propagation, sparse LIF dynamics)
pub struct CPUBackend {
    /// Backend name for logging
    name: String,

    /// Neuron model for computational dynamics
    neuron_model: LIFModel,

    propagation_engine: SynapticPropagationEngine,
}

impl CPUBackend {
    /// Create a new CPU backend with LIF neuron model
    pub fn new() -> Self {
        let neuron_model = LIFModel::new();
        Self {
            name: format!("CPU (rayon) - {}", neuron_model.model_name()),
            neuron_model,
            propagation_engine: SynapticPropagationEngine::new(),
        }
    }

    pub fn neuron_model(&self) -> &LIFModel {
        &self.neuron_model
    }

    pub fn propagation_engine(&self) -> &SynapticPropagationEngine {
        &self.propagation_engine
    }
}

impl Default for CPUBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NeuralValue, N: NeuronStorage<Value = T>, S: SynapseStorage> ComputeBackend<T, N, S>
    for CPUBackend
{
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn process_synaptic_propagation(
        &mut self,
        fired_neurons: &[u32],
        synapse_storage: &S,
        fcl: &mut FireCandidateList,
    ) -> Result<usize> {
        // Index is rebuilt lazily when the synapse store version moves
        Ok(self
            .propagation_engine
            .propagate(fired_neurons, synapse_storage, fcl))
    }

    fn process_neural_dynamics(
        &mut self,
        fcl: &FireCandidateList,
        neuron_storage: &mut N,
        burst_count: u64,
    ) -> Result<DynamicsOutput> {
        let result = neural_dynamics::process_neural_dynamics(fcl, neuron_storage, burst_count)?;

        let mut fired: Vec<(u32, f32)> = result
            .fire_queue
            .iter()
            .map(|n| (n.neuron_id.0, n.membrane_potential))
            .collect();
        fired.sort_unstable_by_key(|(id, _)| *id);
        let (fired_neurons, fired_potentials) = fired.into_iter().unzip();

        Ok(DynamicsOutput {
            fired_neurons,
            fired_potentials,
            neurons_processed: result.neurons_processed,
            neurons_in_refractory: result.neurons_in_refractory,
        })
    }

    fn initialize_persistent_data(&mut self, _neuron_storage: &N, synapse_storage: &S) -> Result<()> {
        self.propagation_engine.build_synapse_index(synapse_storage);
        Ok(())
    }

    fn on_genome_change(&mut self) -> Result<()> {
        self.propagation_engine.invalidate_index();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feagi_npu_neural::{compute_synaptic_contribution, LIFParameters};
    use feagi_npu_runtime::{IdReusePolicy, StdNeuronArray, StdSynapseArray};

    type Cpu = dyn ComputeBackend<f32, StdNeuronArray<f32>, StdSynapseArray>;

    #[test]
    fn test_cpu_backend_creation() {
        let backend = CPUBackend::new();
        assert_eq!(
            <CPUBackend as ComputeBackend<f32, StdNeuronArray<f32>, StdSynapseArray>>::backend_name(
                &backend
            ),
            "CPU (rayon) - Leaky Integrate-and-Fire (LIF)"
        );
    }

    #[test]
    fn test_cpu_backend_synaptic_propagation() {
        let mut backend = CPUBackend::new();

        let fired_neurons = vec![1];
        let mut synapse_storage = StdSynapseArray::new(4, IdReusePolicy::Tombstone);
        synapse_storage
            .add_synapse(NeuronId(1), NeuronId(2), 2, 3, SynapseType::Excitatory)
            .unwrap(); // 2×3 = 6
        synapse_storage
            .add_synapse(NeuronId(0), NeuronId(2), 9, 9, SynapseType::Excitatory)
            .unwrap(); // source did not fire
        let mut fcl = FireCandidateList::new();

        let processed = <CPUBackend as ComputeBackend<f32, StdNeuronArray<f32>, StdSynapseArray>>::process_synaptic_propagation(
            &mut backend, &fired_neurons, &synapse_storage, &mut fcl
        )
        .unwrap();

        assert_eq!(processed, 1);
        assert_eq!(fcl.get(NeuronId(2)), Some(6.0));
        assert_eq!(
            fcl.get(NeuronId(2)),
            Some(compute_synaptic_contribution(2, 3, SynapseType::Excitatory))
        );
    }

    #[test]
    fn test_cpu_backend_full_burst_through_trait_object() {
        let mut neurons: StdNeuronArray<f32> =
            StdNeuronArray::new(4, QuantizationRange::default(), IdReusePolicy::Tombstone);
        let p = LIFParameters::with_threshold(1.0);
        let a = neurons.add_neuron(&p, 1, (0, 0, 0)).unwrap();
        let b = neurons.add_neuron(&p, 2, (0, 0, 0)).unwrap();
        let mut synapses = StdSynapseArray::new(4, IdReusePolicy::Tombstone);
        synapses
            .add_synapse(a, b, 1, 2, SynapseType::Excitatory)
            .unwrap();

        let mut backend: Box<Cpu> = Box::new(CPUBackend::new());
        backend.initialize_persistent_data(&neurons, &synapses).unwrap();

        let mut fcl = FireCandidateList::new();
        let result = backend
            .process_burst(&[a.0], &synapses, &mut fcl, &mut neurons, 1)
            .unwrap();

        assert_eq!(result.fired_neurons, vec![b.0]);
        assert!((result.fired_potentials[0] - 1.8).abs() < 1e-6);
        assert_eq!(result.neurons_fired, 1);
        assert_eq!(result.synapses_processed, 1);
        assert_eq!(result.neurons_processed, 1);
    }
}
