// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Fire Queue: the neurons that fired in one burst, grouped by cortical area.
//!
//! Burst N's queue is the only propagation input of burst N+1, and the source of
//! telemetry snapshots and Fire Ledger frames.

use ahash::AHashMap;
use feagi_npu_neural::types::NeuronId;

/// A neuron that fired, with its potential at fire time and its position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiringNeuron {
    pub neuron_id: NeuronId,
    /// Membrane potential when the neuron crossed threshold (before reset)
    pub membrane_potential: f32,
    pub cortical_idx: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FireQueue {
    /// cortical area -> fired neurons of that area, in firing order
    pub neurons_by_area: AHashMap<u32, Vec<FiringNeuron>>,
    timestep: u64,
    total_count: usize,
}

impl FireQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_neuron(&mut self, neuron: FiringNeuron) {
        self.neurons_by_area
            .entry(neuron.cortical_idx)
            .or_default()
            .push(neuron);
        self.total_count += 1;
    }

    pub fn get_area_neurons(&self, cortical_idx: u32) -> Option<&[FiringNeuron]> {
        self.neurons_by_area.get(&cortical_idx).map(Vec::as_slice)
    }

    /// All fired neuron ids, ascending
    pub fn get_all_neuron_ids(&self) -> Vec<NeuronId> {
        let mut ids: Vec<NeuronId> = self
            .neurons_by_area
            .values()
            .flat_map(|neurons| neurons.iter().map(|n| n.neuron_id))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Raw ids as the backends consume them, ascending
    pub fn fired_ids(&self) -> Vec<u32> {
        self.get_all_neuron_ids().into_iter().map(|n| n.0).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FiringNeuron> + '_ {
        self.neurons_by_area.values().flatten()
    }

    /// Area indices present in this queue, ascending
    pub fn areas(&self) -> Vec<u32> {
        let mut areas: Vec<u32> = self.neurons_by_area.keys().copied().collect();
        areas.sort_unstable();
        areas
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    pub fn set_timestep(&mut self, timestep: u64) {
        self.timestep = timestep;
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn clear(&mut self) {
        self.neurons_by_area.clear();
        self.total_count = 0;
    }
}
