// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime type dispatch for NPU
//!
//! Provides `DynamicNPU` enum for runtime selection between f32 and INT8 precision.
//! The precision is chosen once from the configuration; every call after that is a
//! single `match` into a monomorphized `RustNPU<T>`.

use crate::backend::{BackendDecision, BackendType};
use crate::fire_ledger::FireLedger;
use crate::fire_structures::FireQueue;
use crate::injection_stage::InjectionStage;
use crate::npu::{BurstResult, NeuronState, NpuConfig, RustNPU};
use crate::parameter_update_queue::ParameterUpdate;
use crate::BurstEngineStats;
use feagi_npu_neural::types::*;
use feagi_npu_neural::LIFParameters;
use tracing::info;

/// Dynamic NPU that dispatches to f32 or INT8 at runtime
pub enum DynamicNPU {
    /// 32-bit floating point NPU (highest precision)
    F32(RustNPU<f32>),

    /// 8-bit quantized NPU
    INT8(RustNPU<INT8Value>),
}

/// Macro for dispatching methods to the correct NPU variant
macro_rules! dispatch {
    ($self:expr, $method:ident($($args:expr),*)) => {
        match $self {
            DynamicNPU::F32(npu) => npu.$method($($args),*),
            DynamicNPU::INT8(npu) => npu.$method($($args),*),
        }
    };
}

impl DynamicNPU {
    /// Build the NPU variant matching `config.quantization.precision`
    pub fn new(config: NpuConfig) -> Result<Self> {
        let precision = config.quantization.precision;
        info!("Creating DynamicNPU with {} precision", precision);
        match precision {
            Precision::FP32 => Ok(DynamicNPU::F32(RustNPU::new(config)?)),
            Precision::INT8 => Ok(DynamicNPU::INT8(RustNPU::new(config)?)),
        }
    }

    pub fn precision(&self) -> Precision {
        dispatch!(self, precision())
    }

    pub fn add_neuron(
        &mut self,
        params: &LIFParameters,
        cortical_area: u32,
        coordinate: (u32, u32, u32),
    ) -> Result<NeuronId> {
        dispatch!(self, add_neuron(params, cortical_area, coordinate))
    }

    pub fn add_neurons_batch(
        &mut self,
        params: &[LIFParameters],
        cortical_areas: &[u32],
        coordinates: &[(u32, u32, u32)],
    ) -> Result<Vec<NeuronId>> {
        dispatch!(self, add_neurons_batch(params, cortical_areas, coordinates))
    }

    pub fn delete_neuron(&mut self, id: NeuronId) -> Result<usize> {
        dispatch!(self, delete_neuron(id))
    }

    pub fn add_synapse(
        &mut self,
        source: NeuronId,
        target: NeuronId,
        weight: u8,
        psp: u8,
        synapse_type: SynapseType,
    ) -> Result<SynapseId> {
        dispatch!(self, add_synapse(source, target, weight, psp, synapse_type))
    }

    pub fn add_synapses_batch(
        &mut self,
        sources: &[u32],
        targets: &[u32],
        weights: &[u8],
        psps: &[u8],
        types: &[SynapseType],
    ) -> Result<Vec<SynapseId>> {
        dispatch!(self, add_synapses_batch(sources, targets, weights, psps, types))
    }

    pub fn remove_synapse(&mut self, id: SynapseId) -> Result<()> {
        dispatch!(self, remove_synapse(id))
    }

    pub fn update_synapse_weight(&mut self, id: SynapseId, weight: u8) -> Result<()> {
        dispatch!(self, update_synapse_weight(id, weight))
    }

    pub fn finalize_network(&mut self) -> Result<BackendDecision> {
        dispatch!(self, finalize_network())
    }

    pub fn set_backend_override(
        &mut self,
        backend_type: BackendType,
    ) -> Result<Option<BackendDecision>> {
        dispatch!(self, set_backend_override(backend_type))
    }

    pub fn backend_decision(&self) -> Option<&BackendDecision> {
        dispatch!(self, backend_decision())
    }

    pub fn backend_name(&self) -> &str {
        dispatch!(self, backend_name())
    }

    pub fn backend_type(&self) -> BackendType {
        dispatch!(self, backend_type())
    }

    pub fn inject_sensory(&self, injections: &[(NeuronId, f32)]) -> Result<()> {
        dispatch!(self, inject_sensory(injections))
    }

    pub fn injection_stage(&self) -> InjectionStage {
        dispatch!(self, injection_stage())
    }

    pub fn add_power_neuron(&mut self, id: NeuronId) -> Result<()> {
        dispatch!(self, add_power_neuron(id))
    }

    pub fn remove_power_neuron(&mut self, id: NeuronId) -> bool {
        dispatch!(self, remove_power_neuron(id))
    }

    pub fn set_power_amount(&mut self, amount: f32) {
        dispatch!(self, set_power_amount(amount))
    }

    pub fn process_burst(&mut self) -> Result<BurstResult> {
        dispatch!(self, process_burst())
    }

    pub fn reset_state(&mut self) {
        dispatch!(self, reset_state())
    }

    pub fn apply_parameter_update(&mut self, update: &ParameterUpdate) -> Result<usize> {
        dispatch!(self, apply_parameter_update(update))
    }

    pub fn neuron_count(&self) -> usize {
        dispatch!(self, neuron_count())
    }

    pub fn synapse_count(&self) -> usize {
        dispatch!(self, synapse_count())
    }

    pub fn burst_count(&self) -> u64 {
        dispatch!(self, burst_count())
    }

    pub fn last_fired_count(&self) -> usize {
        dispatch!(self, last_fired_count())
    }

    pub fn last_fire_queue(&self) -> &FireQueue {
        dispatch!(self, last_fire_queue())
    }

    pub fn get_neuron_state(&self, id: NeuronId) -> Option<NeuronState> {
        dispatch!(self, get_neuron_state(id))
    }

    pub fn find_neuron(&self, cortical_area: u32, x: u32, y: u32, z: u32) -> Option<NeuronId> {
        dispatch!(self, find_neuron(cortical_area, x, y, z))
    }

    pub fn get_synapse(&self, id: SynapseId) -> Option<(NeuronId, NeuronId, u8, u8, SynapseType)> {
        dispatch!(self, get_synapse(id))
    }

    pub fn fire_ledger(&self) -> &FireLedger {
        dispatch!(self, fire_ledger())
    }

    pub fn fire_ledger_mut(&mut self) -> &mut FireLedger {
        dispatch!(self, fire_ledger_mut())
    }

    pub fn stats(&self) -> &BurstEngineStats {
        dispatch!(self, stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendConfig;

    fn config(precision: Precision) -> NpuConfig {
        NpuConfig {
            neuron_capacity: 8,
            synapse_capacity: 8,
            quantization: QuantizationSpec {
                precision,
                range: QuantizationRange::default(),
            },
            backend: BackendConfig::default().with_override(BackendType::CPU),
            ..NpuConfig::default()
        }
    }

    #[test]
    fn test_variant_follows_precision() {
        let f = DynamicNPU::new(config(Precision::FP32)).unwrap();
        assert!(matches!(f, DynamicNPU::F32(_)));
        let q = DynamicNPU::new(config(Precision::INT8)).unwrap();
        assert!(matches!(q, DynamicNPU::INT8(_)));
        assert_eq!(q.precision(), Precision::INT8);
    }

    #[test]
    fn test_int8_chain_fires() {
        let mut npu = DynamicNPU::new(config(Precision::INT8)).unwrap();
        let p = LIFParameters::with_threshold(10.0);
        let a = npu.add_neuron(&p, 1, (0, 0, 0)).unwrap();
        let b = npu.add_neuron(&p, 2, (0, 0, 0)).unwrap();
        npu.add_synapse(a, b, 4, 5, SynapseType::Excitatory).unwrap();
        npu.finalize_network().unwrap();

        npu.inject_sensory(&[(a, 20.0)]).unwrap();
        assert_eq!(npu.process_burst().unwrap().fired_neurons, vec![a]);
        assert_eq!(npu.process_burst().unwrap().fired_neurons, vec![b]);
        assert_eq!(npu.burst_count(), 2);

        let state = npu.get_neuron_state(b).unwrap();
        assert_eq!(state.membrane_potential, 0.0);
        assert_eq!(state.cortical_area, 2);
    }
}
