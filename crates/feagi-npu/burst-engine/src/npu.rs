// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Complete Rust NPU
//!
//! Integrates all burst processing phases into a single engine object.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────┐
//! │ RustNPU<T>                          │
//! ├─────────────────────────────────────┤
//! │ - NeuronArray<T> / SynapseArray     │
//! │ - ComputeBackend (CPU | WGPU)       │
//! │ - FireCandidateList (FCL)           │
//! │ - FireQueue (previous burst)        │
//! │ - FireLedger                        │
//! │ - InjectionStage / power neurons    │
//! └─────────────────────────────────────┘
//!          ↓
//!     process_burst()
//!          ↓
//! Phase 1: Injection → Phase 2: Propagation → Phase 3: Dynamics → Phase 4: Archival
//! ```
//!
//! Burst N's Fire Queue is the only propagation input of burst N+1.

use std::time::Instant;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::backend::{
    create_backend, select_backend, BackendConfig, BackendDecision, BackendType, BurstTiming,
    CPUBackend, ComputeBackend,
};
use crate::fire_ledger::FireLedger;
use crate::fire_structures::{FireQueue, FiringNeuron};
use crate::injection_stage::InjectionStage;
use crate::parameter_update_queue::{NeuronParameter, ParameterUpdate};
use crate::BurstEngineStats;
use feagi_npu_neural::types::*;
use feagi_npu_neural::LIFParameters;
use feagi_npu_runtime::{IdReusePolicy, NeuronStorage, StdNeuronArray, StdSynapseArray, SynapseStorage};

type NpuBackend<T> = Box<dyn ComputeBackend<T, StdNeuronArray<T>, StdSynapseArray>>;

/// Engine construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpuConfig {
    pub neuron_capacity: usize,
    pub synapse_capacity: usize,
    /// Bursts kept by the Fire Ledger
    pub fire_ledger_depth: usize,
    pub quantization: QuantizationSpec,
    pub id_reuse: IdReusePolicy,
    /// Potential injected into every power neuron each burst
    pub power_amount: f32,
    pub backend: BackendConfig,
}

impl Default for NpuConfig {
    fn default() -> Self {
        Self {
            neuron_capacity: 100_000,
            synapse_capacity: 1_000_000,
            fire_ledger_depth: 20,
            quantization: QuantizationSpec::default(),
            id_reuse: IdReusePolicy::default(),
            power_amount: 1.0,
            backend: BackendConfig::default(),
        }
    }
}

impl NpuConfig {
    /// Derive the engine config from the `[npu]` and `[backend]` sections
    pub fn from_feagi_config(config: &feagi_config::FeagiConfig) -> Result<Self> {
        let npu = &config.npu;

        let precision = match npu.precision.to_lowercase().as_str() {
            "fp32" | "f32" => Precision::FP32,
            "int8" => Precision::INT8,
            other => {
                return Err(FeagiError::InvalidParameter(format!(
                    "npu.precision '{}' (expected fp32 or int8)",
                    other
                )))
            }
        };
        let range = QuantizationRange::new(npu.quantization.min, npu.quantization.max)?;

        let id_reuse = match npu.id_reuse.to_lowercase().as_str() {
            "tombstone" => IdReusePolicy::Tombstone,
            "free_list" => IdReusePolicy::FreeList,
            other => {
                return Err(FeagiError::InvalidParameter(format!(
                    "npu.id_reuse '{}' (expected tombstone or free_list)",
                    other
                )))
            }
        };

        let backend_type: BackendType = config.backend.backend.parse()?;
        let backend = BackendConfig {
            gpu_neuron_threshold: config.backend.gpu_neuron_threshold,
            gpu_synapse_threshold: config.backend.gpu_synapse_threshold,
            gpu_min_firing_rate: config.backend.gpu_min_firing_rate,
            assumed_firing_rate: config.backend.assumed_firing_rate,
            ..BackendConfig::default()
        }
        .with_override(backend_type);

        Ok(Self {
            neuron_capacity: npu.neuron_capacity,
            synapse_capacity: npu.synapse_capacity,
            fire_ledger_depth: npu.fire_ledger_depth,
            quantization: QuantizationSpec { precision, range },
            id_reuse,
            power_amount: npu.power_amount,
            backend,
        })
    }
}

/// Burst processing result
#[derive(Debug, Clone, Default)]
pub struct BurstResult {
    /// Burst number (timestep) this result belongs to
    pub burst: u64,

    /// Neurons that fired this burst, ascending
    pub fired_neurons: Vec<NeuronId>,

    pub power_injections: usize,
    pub sensory_injections: usize,
    /// Staged injections whose target was invalid by the time the burst ran
    pub rejected_injections: usize,
    pub synapses_processed: usize,
    pub neurons_processed: usize,
    pub neurons_in_refractory: usize,

    pub timing: BurstTiming,
}

impl BurstResult {
    pub fn neuron_count(&self) -> usize {
        self.fired_neurons.len()
    }
}

/// Decoded view of one neuron, for queries
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronState {
    pub membrane_potential: f32,
    pub refractory_countdown: u16,
    pub consecutive_fire_count: u16,
    pub cortical_area: u32,
    pub coordinates: (u32, u32, u32),
    pub parameters: LIFParameters,
}

/// Complete Rust Neural Processing Unit
pub struct RustNPU<T: NeuralValue> {
    // Core data structures
    neuron_array: StdNeuronArray<T>,
    synapse_array: StdSynapseArray,

    // Backend
    backend: NpuBackend<T>,
    backend_type: BackendType,
    backend_config: BackendConfig,
    backend_decision: Option<BackendDecision>,
    finalized: bool,
    /// Structure or parameters changed since the backend last saw them
    backend_dirty: bool,

    // Fire structures
    fire_candidate_list: FireCandidateList,
    previous_fire_queue: FireQueue,
    fire_ledger: FireLedger,

    // Inputs
    injection_stage: InjectionStage,
    power_neurons: RoaringBitmap,
    power_amount: f32,

    // State
    burst_count: u64,
    stats: BurstEngineStats,
}

impl<T: NeuralValue> RustNPU<T> {
    pub fn new(config: NpuConfig) -> Result<Self> {
        if config.quantization.precision != T::PRECISION {
            return Err(FeagiError::InvalidParameter(format!(
                "config precision {} does not match engine precision {}",
                config.quantization.precision,
                T::PRECISION
            )));
        }
        config.quantization.range.validate()?;
        let fire_ledger = FireLedger::new(config.fire_ledger_depth)
            .map_err(|e| FeagiError::InvalidParameter(format!("fire ledger: {}", e)))?;

        info!(
            "Creating NPU ({}): {} neurons, {} synapses capacity, ledger depth {}, id reuse {:?}",
            T::PRECISION,
            config.neuron_capacity,
            config.synapse_capacity,
            config.fire_ledger_depth,
            config.id_reuse
        );

        Ok(Self {
            neuron_array: StdNeuronArray::new(
                config.neuron_capacity,
                config.quantization.range,
                config.id_reuse,
            ),
            synapse_array: StdSynapseArray::new(config.synapse_capacity, config.id_reuse),
            backend: Box::new(CPUBackend::new()),
            backend_type: BackendType::CPU,
            backend_config: config.backend,
            backend_decision: None,
            finalized: false,
            backend_dirty: true,
            fire_candidate_list: FireCandidateList::new(),
            previous_fire_queue: FireQueue::new(),
            fire_ledger,
            injection_stage: InjectionStage::new(),
            power_neurons: RoaringBitmap::new(),
            power_amount: config.power_amount,
            burst_count: 0,
            stats: BurstEngineStats::default(),
        })
    }

    pub fn precision(&self) -> Precision {
        T::PRECISION
    }

    // ═══════════════════════════════════════════════════════════
    // Network construction
    // ═══════════════════════════════════════════════════════════

    pub fn add_neuron(
        &mut self,
        params: &LIFParameters,
        cortical_area: u32,
        coordinate: (u32, u32, u32),
    ) -> Result<NeuronId> {
        params.validate()?;
        let id = self.neuron_array.add_neuron(params, cortical_area, coordinate)?;
        self.backend_dirty = true;
        Ok(id)
    }

    /// All-or-nothing: on error no neuron was added
    pub fn add_neurons_batch(
        &mut self,
        params: &[LIFParameters],
        cortical_areas: &[u32],
        coordinates: &[(u32, u32, u32)],
    ) -> Result<Vec<NeuronId>> {
        for p in params {
            p.validate()?;
        }
        let ids = self
            .neuron_array
            .add_neurons_batch(params, cortical_areas, coordinates)?;
        self.backend_dirty = true;
        Ok(ids)
    }

    /// Delete a neuron and every synapse into or out of it; returns the synapses removed
    pub fn delete_neuron(&mut self, id: NeuronId) -> Result<usize> {
        self.neuron_array.delete_neuron(id)?;
        let removed = self.synapse_array.remove_synapses_from_source(id)
            + self.synapse_array.remove_synapses_to_target(id);
        self.power_neurons.remove(id.0);
        self.backend_dirty = true;
        debug!("Deleted neuron {} and {} attached synapses", id, removed);
        Ok(removed)
    }

    fn check_neuron(&self, id: NeuronId) -> Result<()> {
        if self.neuron_array.is_valid(id) {
            Ok(())
        } else {
            Err(FeagiError::InvalidNeuronId(id.0))
        }
    }

    pub fn add_synapse(
        &mut self,
        source: NeuronId,
        target: NeuronId,
        weight: u8,
        psp: u8,
        synapse_type: SynapseType,
    ) -> Result<SynapseId> {
        self.check_neuron(source)?;
        self.check_neuron(target)?;
        let id = self
            .synapse_array
            .add_synapse(source, target, weight, psp, synapse_type)?;
        self.backend_dirty = true;
        Ok(id)
    }

    /// All-or-nothing: endpoints are validated before anything is inserted
    pub fn add_synapses_batch(
        &mut self,
        sources: &[u32],
        targets: &[u32],
        weights: &[u8],
        psps: &[u8],
        types: &[SynapseType],
    ) -> Result<Vec<SynapseId>> {
        for &id in sources.iter().chain(targets) {
            self.check_neuron(NeuronId(id))?;
        }
        let ids = self
            .synapse_array
            .add_synapses_batch(sources, targets, weights, psps, types)?;
        self.backend_dirty = true;
        Ok(ids)
    }

    pub fn remove_synapse(&mut self, id: SynapseId) -> Result<()> {
        self.synapse_array.remove_synapse(id)?;
        self.backend_dirty = true;
        Ok(())
    }

    pub fn update_synapse_weight(&mut self, id: SynapseId, weight: u8) -> Result<()> {
        self.synapse_array.update_weight(id, weight)?;
        // Weight changes do not bump the store version; device copies need a re-upload
        self.backend_dirty = true;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Backend
    // ═══════════════════════════════════════════════════════════

    /// Select the backend for the current network and upload its persistent data
    pub fn finalize_network(&mut self) -> Result<BackendDecision> {
        let mut decision = select_backend(
            self.neuron_array.count(),
            self.synapse_array.count(),
            &self.backend_config,
        );
        info!(
            "Backend selection: {} ({}), estimated GPU speedup {:.2}x",
            decision.backend_type, decision.reason, decision.estimated_speedup
        );

        let (backend, built) =
            create_backend(decision.backend_type, &self.neuron_array, &self.synapse_array);
        if built != decision.backend_type {
            decision = BackendDecision {
                backend_type: built,
                reason: format!("{}; initialization failed, using CPU", decision.reason),
                estimated_speedup: 1.0,
            };
        }
        self.backend = backend;
        self.backend_type = built;

        self.backend
            .initialize_persistent_data(&self.neuron_array, &self.synapse_array)?;
        self.backend_dirty = false;
        self.finalized = true;

        info!(
            "Network finalized: {} neurons, {} synapses on {}",
            self.neuron_array.count(),
            self.synapse_array.count(),
            self.backend.backend_name()
        );
        self.backend_decision = Some(decision.clone());
        Ok(decision)
    }

    /// Pin (or with `Auto`, release) the backend choice; re-selects immediately once finalized
    pub fn set_backend_override(&mut self, backend_type: BackendType) -> Result<Option<BackendDecision>> {
        self.backend_config = self.backend_config.with_override(backend_type);
        if self.finalized {
            self.finalize_network().map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn backend_decision(&self) -> Option<&BackendDecision> {
        self.backend_decision.as_ref()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    pub fn backend_config(&self) -> &BackendConfig {
        &self.backend_config
    }

    fn ensure_backend_ready(&mut self) -> Result<()> {
        if !self.finalized {
            info!("process_burst before finalize_network; finalizing now");
            self.finalize_network()?;
        } else if self.backend_dirty {
            self.backend.on_genome_change()?;
            self.backend
                .initialize_persistent_data(&self.neuron_array, &self.synapse_array)?;
            self.backend_dirty = false;
            debug!("Backend persistent data refreshed after network change");
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Inputs
    // ═══════════════════════════════════════════════════════════

    /// Stage sensory input for the next burst
    ///
    /// The whole batch is rejected with `InvalidNeuronId` if any target is not a valid neuron.
    pub fn inject_sensory(&self, injections: &[(NeuronId, f32)]) -> Result<()> {
        for (id, _) in injections {
            self.check_neuron(*id)?;
        }
        self.injection_stage.stage(injections);
        Ok(())
    }

    /// Shared handle for producers that must not touch the NPU lock
    ///
    /// Ids staged here are checked when the burst takes them; invalid ones are counted in
    /// [`BurstResult::rejected_injections`].
    pub fn injection_stage(&self) -> InjectionStage {
        self.injection_stage.clone()
    }

    /// Power neurons receive `power_amount` every burst
    pub fn add_power_neuron(&mut self, id: NeuronId) -> Result<()> {
        self.check_neuron(id)?;
        self.power_neurons.insert(id.0);
        Ok(())
    }

    pub fn remove_power_neuron(&mut self, id: NeuronId) -> bool {
        self.power_neurons.remove(id.0)
    }

    pub fn power_neuron_count(&self) -> usize {
        self.power_neurons.len() as usize
    }

    pub fn set_power_amount(&mut self, amount: f32) {
        self.power_amount = amount;
    }

    // ═══════════════════════════════════════════════════════════
    // Burst
    // ═══════════════════════════════════════════════════════════

    /// Process a single burst (MAIN METHOD)
    ///
    /// On error the burst is abandoned: the counter does not advance and nothing is archived.
    pub fn process_burst(&mut self) -> Result<BurstResult> {
        self.ensure_backend_ready()?;
        let start = Instant::now();
        let timestep = self.burst_count + 1;

        // Phase 1: Injection (sensory + power)
        self.fire_candidate_list.clear();

        let staged = self.injection_stage.take();
        let mut sensory_injections = 0;
        for (id, potential) in &staged {
            if self.neuron_array.is_valid(*id) {
                self.fire_candidate_list.add_candidate(*id, *potential);
                sensory_injections += 1;
            }
        }
        let rejected_injections = staged.len() - sensory_injections;
        if rejected_injections > 0 {
            warn!(
                "Burst {}: rejected {} sensory injections for invalid neurons",
                timestep, rejected_injections
            );
        }

        let mut power_injections = 0;
        for id in self.power_neurons.iter() {
            if self.neuron_array.is_valid(NeuronId(id)) {
                self.fire_candidate_list
                    .add_candidate(NeuronId(id), self.power_amount);
                power_injections += 1;
            }
        }

        // Phase 2 + 3: Propagation (previous Fire Queue) then dynamics
        let fired_input = self.previous_fire_queue.fired_ids();
        let backend_result = self.backend.process_burst(
            &fired_input,
            &self.synapse_array,
            &mut self.fire_candidate_list,
            &mut self.neuron_array,
            timestep,
        )?;

        // Build the Fire Queue from ids and potentials-at-fire
        let mut fire_queue = FireQueue::new();
        fire_queue.set_timestep(timestep);
        for (&id, &potential) in backend_result
            .fired_neurons
            .iter()
            .zip(&backend_result.fired_potentials)
        {
            let idx = id as usize;
            let (x, y, z) = self.neuron_array.coordinates[idx];
            fire_queue.add_neuron(FiringNeuron {
                neuron_id: NeuronId(id),
                membrane_potential: potential,
                cortical_idx: self.neuron_array.cortical_areas[idx],
                x,
                y,
                z,
            });
        }

        // Phase 4: Archival
        self.fire_ledger
            .archive_burst(timestep, &fire_queue)
            .map_err(|e| FeagiError::ComputationError(format!("fire ledger: {}", e)))?;

        self.burst_count = timestep;
        self.previous_fire_queue = fire_queue;

        let elapsed_us = start.elapsed().as_micros() as u64;
        self.stats.total_bursts += 1;
        self.stats.total_rejected_injections += rejected_injections as u64;
        self.stats.total_neurons_fired += backend_result.neurons_fired as u64;
        self.stats.total_synapses_processed += backend_result.synapses_processed as u64;
        self.stats.total_processing_time_us += elapsed_us;
        self.stats.max_processing_time_us = self.stats.max_processing_time_us.max(elapsed_us);

        trace!(
            target: "feagi-npu-trace",
            "Burst {}: {} fired, {} processed, {} synapses, {}us",
            timestep,
            backend_result.neurons_fired,
            backend_result.neurons_processed,
            backend_result.synapses_processed,
            elapsed_us
        );

        Ok(BurstResult {
            burst: timestep,
            fired_neurons: backend_result
                .fired_neurons
                .iter()
                .map(|&id| NeuronId(id))
                .collect(),
            power_injections,
            sensory_injections,
            rejected_injections,
            synapses_processed: backend_result.synapses_processed,
            neurons_processed: backend_result.neurons_processed,
            neurons_in_refractory: backend_result.neurons_in_refractory,
            timing: backend_result.timing,
        })
    }

    /// Return every neuron to rest and forget the last Fire Queue (ledger is kept)
    pub fn reset_state(&mut self) {
        self.neuron_array.reset_state();
        self.previous_fire_queue.clear();
        self.fire_candidate_list.clear();
        self.injection_stage.clear();
        self.backend_dirty = true;
    }

    // ═══════════════════════════════════════════════════════════
    // Parameter updates
    // ═══════════════════════════════════════════════════════════

    /// Apply one per-area parameter change; returns the number of neurons updated
    pub fn apply_parameter_update(&mut self, update: &ParameterUpdate) -> Result<usize> {
        let area = update.cortical_idx;
        let updated = match update.parameter {
            NeuronParameter::Threshold => {
                let v = finite_value(update)?;
                self.neuron_array.update_area_threshold(area, v)
            }
            NeuronParameter::ThresholdLimit => {
                let limit = if update.value.is_null() {
                    None
                } else {
                    Some(finite_value(update)?)
                };
                self.neuron_array.update_area_threshold_limit(area, limit)
            }
            NeuronParameter::Leak => {
                let v = unit_value(update)?;
                self.neuron_array.update_area_leak(area, v)
            }
            NeuronParameter::Excitability => {
                let v = unit_value(update)?;
                self.neuron_array.update_area_excitability(area, v)
            }
            NeuronParameter::RefractoryPeriod => {
                let v = u16_value(update)?;
                self.neuron_array.update_area_refractory_period(area, v)
            }
            NeuronParameter::ConsecutiveFireLimit => {
                let v = u16_value(update)?;
                self.neuron_array.update_area_consecutive_fire_limit(area, v)
            }
        };

        if updated > 0 {
            self.backend_dirty = true;
        } else {
            warn!(
                "Parameter update {}={} matched no neurons in area {}",
                update.parameter, update.value, area
            );
        }
        Ok(updated)
    }

    // ═══════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════

    pub fn neuron_count(&self) -> usize {
        self.neuron_array.count()
    }

    pub fn synapse_count(&self) -> usize {
        self.synapse_array.count()
    }

    pub fn burst_count(&self) -> u64 {
        self.burst_count
    }

    pub fn last_fired_count(&self) -> usize {
        self.previous_fire_queue.total_count()
    }

    /// Fire Queue produced by the most recent burst
    pub fn last_fire_queue(&self) -> &FireQueue {
        &self.previous_fire_queue
    }

    pub fn get_neuron_state(&self, id: NeuronId) -> Option<NeuronState> {
        let parameters = self.neuron_array.get_parameters(id)?;
        let idx = id.index();
        Some(NeuronState {
            membrane_potential: self.neuron_array.get_membrane_potential(id)?,
            refractory_countdown: self.neuron_array.refractory_countdowns[idx],
            consecutive_fire_count: self.neuron_array.consecutive_fire_counts[idx],
            cortical_area: self.neuron_array.cortical_areas[idx],
            coordinates: self.neuron_array.coordinates[idx],
            parameters,
        })
    }

    pub fn find_neuron(&self, cortical_area: u32, x: u32, y: u32, z: u32) -> Option<NeuronId> {
        self.neuron_array.find_by_coordinate(cortical_area, x, y, z)
    }

    /// `(source, target, weight, psp, type)` of a valid synapse
    pub fn get_synapse(&self, id: SynapseId) -> Option<(NeuronId, NeuronId, u8, u8, SynapseType)> {
        self.synapse_array.get_synapse(id)
    }

    pub fn neuron_array(&self) -> &StdNeuronArray<T> {
        &self.neuron_array
    }

    pub fn synapse_array(&self) -> &StdSynapseArray {
        &self.synapse_array
    }

    pub fn fire_ledger(&self) -> &FireLedger {
        &self.fire_ledger
    }

    /// For tracking/untracking area windows
    pub fn fire_ledger_mut(&mut self) -> &mut FireLedger {
        &mut self.fire_ledger
    }

    pub fn stats(&self) -> &BurstEngineStats {
        &self.stats
    }
}

fn number(update: &ParameterUpdate) -> Result<f64> {
    update.value.as_f64().ok_or_else(|| {
        FeagiError::InvalidParameter(format!(
            "{} expects a number, got {}",
            update.parameter, update.value
        ))
    })
}

fn finite_value(update: &ParameterUpdate) -> Result<f32> {
    let v = number(update)? as f32;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(FeagiError::InvalidParameter(format!(
            "{} must be finite",
            update.parameter
        )))
    }
}

fn unit_value(update: &ParameterUpdate) -> Result<f32> {
    let v = number(update)?;
    if (0.0..=1.0).contains(&v) {
        Ok(v as f32)
    } else {
        Err(FeagiError::InvalidParameter(format!(
            "{} {} must be in [0, 1]",
            update.parameter, v
        )))
    }
}

fn u16_value(update: &ParameterUpdate) -> Result<u16> {
    update
        .value
        .as_u64()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| {
            FeagiError::InvalidParameter(format!(
                "{} expects an integer in 0..=65535, got {}",
                update.parameter, update.value
            ))
        })
}
