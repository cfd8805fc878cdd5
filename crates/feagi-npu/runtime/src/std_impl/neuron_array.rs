// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Standard neuron array implementation
//!
//! Structure-of-arrays storage sized once at creation.

use crate::error::{IdKind, Result, RuntimeError};
use crate::id_allocator::{IdAllocator, IdReusePolicy};
use crate::traits::NeuronStorage;
use ahash::AHashMap;
use feagi_npu_neural::types::{NeuralValue, NeuronId, QuantizationRange};
use feagi_npu_neural::LIFParameters;
use tracing::debug;

type CoordinateKey = (u32, u32, u32, u32);

/// Fixed-capacity neuron array for desktop/server environments
///
/// Generic over `T: NeuralValue` to support multiple quantization levels
#[derive(Debug, Clone)]
pub struct NeuronArray<T: NeuralValue> {
    /// Membrane potentials (quantized to T)
    pub membrane_potentials: Vec<T>,

    /// Firing thresholds (quantized to T) - minimum MP to fire
    pub thresholds: Vec<T>,

    /// Firing threshold limits (quantized to T) - maximum MP to fire, `None` = no limit
    pub threshold_limits: Vec<Option<T>>,

    /// Leak coefficients (kept as f32 for precision)
    pub leak_coefficients: Vec<f32>,

    pub resting_potentials: Vec<T>,

    pub refractory_periods: Vec<u16>,

    /// Refractory countdowns (state)
    pub refractory_countdowns: Vec<u16>,

    /// Stochastic threshold factors (0.0 = deterministic)
    pub excitabilities: Vec<f32>,

    pub consecutive_fire_counts: Vec<u16>,

    pub consecutive_fire_limits: Vec<u16>,

    /// Cortical area indices
    pub cortical_areas: Vec<u32>,

    pub coordinates: Vec<(u32, u32, u32)>,

    pub valid_mask: Vec<bool>,

    range: QuantizationRange,
    allocator: IdAllocator,
    valid_count: usize,

    /// (area, x, y, z) -> neuron index
    coordinate_index: AHashMap<CoordinateKey, u32>,
}

impl<T: NeuralValue> NeuronArray<T> {
    /// Create a new neuron array; every slot starts free
    pub fn new(capacity: usize, range: QuantizationRange, policy: IdReusePolicy) -> Self {
        Self {
            membrane_potentials: vec![T::zero(); capacity],
            thresholds: vec![T::zero(); capacity],
            threshold_limits: vec![None; capacity],
            leak_coefficients: vec![0.0; capacity],
            resting_potentials: vec![T::zero(); capacity],
            refractory_periods: vec![0; capacity],
            refractory_countdowns: vec![0; capacity],
            excitabilities: vec![0.0; capacity],
            consecutive_fire_counts: vec![0; capacity],
            consecutive_fire_limits: vec![u16::MAX; capacity],
            cortical_areas: vec![0; capacity],
            coordinates: vec![(0, 0, 0); capacity],
            valid_mask: vec![false; capacity],
            range,
            allocator: IdAllocator::new("neuron", capacity, policy),
            valid_count: 0,
            coordinate_index: AHashMap::new(),
        }
    }

    pub fn id_reuse_policy(&self) -> IdReusePolicy {
        self.allocator.policy()
    }

    /// Write parameters into an already allocated slot and reset its state
    fn write_slot(
        &mut self,
        idx: usize,
        params: &LIFParameters,
        cortical_area: u32,
        coordinate: (u32, u32, u32),
    ) {
        let range = self.range;
        self.membrane_potentials[idx] = T::from_f32(params.resting_potential, &range);
        self.thresholds[idx] = T::from_f32(params.threshold, &range);
        self.threshold_limits[idx] = params.threshold_limit.map(|l| T::from_f32(l, &range));
        self.leak_coefficients[idx] = params.leak_coefficient;
        self.resting_potentials[idx] = T::from_f32(params.resting_potential, &range);
        self.refractory_periods[idx] = params.refractory_period;
        self.refractory_countdowns[idx] = 0;
        self.excitabilities[idx] = params.excitability;
        self.consecutive_fire_counts[idx] = 0;
        self.consecutive_fire_limits[idx] = params.consecutive_fire_limit;
        self.cortical_areas[idx] = cortical_area;
        self.coordinates[idx] = coordinate;
        self.valid_mask[idx] = true;
        self.valid_count += 1;

        let (x, y, z) = coordinate;
        self.coordinate_index
            .insert((cortical_area, x, y, z), idx as u32);
    }

    fn check_valid(&self, id: NeuronId) -> Result<usize> {
        let idx = id.index();
        if self.valid_mask.get(idx).copied().unwrap_or(false) {
            Ok(idx)
        } else {
            Err(RuntimeError::InvalidId {
                kind: IdKind::Neuron,
                id: id.0,
            })
        }
    }

    /// Coordinates of a valid neuron
    pub fn get_coordinates(&self, id: NeuronId) -> Option<(u32, u32, u32)> {
        self.check_valid(id).ok().map(|idx| self.coordinates[idx])
    }

    pub fn get_cortical_area(&self, id: NeuronId) -> Option<u32> {
        self.check_valid(id).ok().map(|idx| self.cortical_areas[idx])
    }

    /// Neuron at a coordinate of a cortical area
    pub fn find_by_coordinate(&self, cortical_area: u32, x: u32, y: u32, z: u32) -> Option<NeuronId> {
        self.coordinate_index
            .get(&(cortical_area, x, y, z))
            .map(|&idx| NeuronId(idx))
    }

    /// Valid neurons of one cortical area, ascending id
    pub fn get_neurons_in_cortical_area(&self, cortical_area: u32) -> Vec<NeuronId> {
        (0..self.allocator.high_water())
            .filter(|&i| self.valid_mask[i] && self.cortical_areas[i] == cortical_area)
            .map(|i| NeuronId(i as u32))
            .collect()
    }

    /// Decoded membrane potential of a valid neuron
    pub fn get_membrane_potential(&self, id: NeuronId) -> Option<f32> {
        self.check_valid(id)
            .ok()
            .map(|idx| self.membrane_potentials[idx].to_f32(&self.range))
    }

    /// Parameters of a valid neuron, decoded back to full precision
    pub fn get_parameters(&self, id: NeuronId) -> Option<LIFParameters> {
        let idx = self.check_valid(id).ok()?;
        let range = &self.range;
        Some(LIFParameters {
            threshold: self.thresholds[idx].to_f32(range),
            threshold_limit: self.threshold_limits[idx].map(|l| l.to_f32(range)),
            leak_coefficient: self.leak_coefficients[idx],
            resting_potential: self.resting_potentials[idx].to_f32(range),
            refractory_period: self.refractory_periods[idx],
            consecutive_fire_limit: self.consecutive_fire_limits[idx],
            excitability: self.excitabilities[idx],
        })
    }

    /// Apply `f` to every valid neuron of an area; returns how many were touched
    fn for_each_in_area(&mut self, cortical_area: u32, mut f: impl FnMut(&mut Self, usize)) -> usize {
        let mut updated = 0;
        for idx in 0..self.allocator.high_water() {
            if self.valid_mask[idx] && self.cortical_areas[idx] == cortical_area {
                f(self, idx);
                updated += 1;
            }
        }
        updated
    }

    pub fn update_area_threshold(&mut self, cortical_area: u32, threshold: f32) -> usize {
        let value = T::from_f32(threshold, &self.range);
        self.for_each_in_area(cortical_area, |a, i| a.thresholds[i] = value)
    }

    pub fn update_area_threshold_limit(&mut self, cortical_area: u32, limit: Option<f32>) -> usize {
        let value = limit.map(|l| T::from_f32(l, &self.range));
        self.for_each_in_area(cortical_area, |a, i| a.threshold_limits[i] = value)
    }

    pub fn update_area_leak(&mut self, cortical_area: u32, leak_coefficient: f32) -> usize {
        self.for_each_in_area(cortical_area, |a, i| a.leak_coefficients[i] = leak_coefficient)
    }

    pub fn update_area_refractory_period(&mut self, cortical_area: u32, period: u16) -> usize {
        self.for_each_in_area(cortical_area, |a, i| {
            a.refractory_periods[i] = period;
            // A shorter period must not leave a longer countdown behind
            a.refractory_countdowns[i] = a.refractory_countdowns[i].min(period);
        })
    }

    pub fn update_area_excitability(&mut self, cortical_area: u32, excitability: f32) -> usize {
        self.for_each_in_area(cortical_area, |a, i| a.excitabilities[i] = excitability)
    }

    pub fn update_area_consecutive_fire_limit(&mut self, cortical_area: u32, limit: u16) -> usize {
        self.for_each_in_area(cortical_area, |a, i| {
            a.consecutive_fire_limits[i] = limit;
            a.consecutive_fire_counts[i] = a.consecutive_fire_counts[i].min(limit);
        })
    }

    /// Return every valid neuron to resting potential and clear refractory/consecutive state
    pub fn reset_state(&mut self) {
        for idx in 0..self.allocator.high_water() {
            if self.valid_mask[idx] {
                self.membrane_potentials[idx] = self.resting_potentials[idx];
                self.refractory_countdowns[idx] = 0;
                self.consecutive_fire_counts[idx] = 0;
            }
        }
    }
}

impl<T: NeuralValue> NeuronStorage for NeuronArray<T> {
    type Value = T;

    fn range(&self) -> &QuantizationRange {
        &self.range
    }

    fn membrane_potentials(&self) -> &[T] {
        &self.membrane_potentials
    }

    fn thresholds(&self) -> &[T] {
        &self.thresholds
    }

    fn threshold_limits(&self) -> &[Option<T>] {
        &self.threshold_limits
    }

    fn leak_coefficients(&self) -> &[f32] {
        &self.leak_coefficients
    }

    fn resting_potentials(&self) -> &[T] {
        &self.resting_potentials
    }

    fn refractory_periods(&self) -> &[u16] {
        &self.refractory_periods
    }

    fn refractory_countdowns(&self) -> &[u16] {
        &self.refractory_countdowns
    }

    fn excitabilities(&self) -> &[f32] {
        &self.excitabilities
    }

    fn consecutive_fire_counts(&self) -> &[u16] {
        &self.consecutive_fire_counts
    }

    fn consecutive_fire_limits(&self) -> &[u16] {
        &self.consecutive_fire_limits
    }

    fn cortical_areas(&self) -> &[u32] {
        &self.cortical_areas
    }

    fn coordinates(&self) -> &[(u32, u32, u32)] {
        &self.coordinates
    }

    fn valid_mask(&self) -> &[bool] {
        &self.valid_mask
    }

    fn membrane_potentials_mut(&mut self) -> &mut [T] {
        &mut self.membrane_potentials
    }

    fn refractory_countdowns_mut(&mut self) -> &mut [u16] {
        &mut self.refractory_countdowns
    }

    fn consecutive_fire_counts_mut(&mut self) -> &mut [u16] {
        &mut self.consecutive_fire_counts
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

    fn add_neuron(
        &mut self,
        params: &LIFParameters,
        cortical_area: u32,
        coordinate: (u32, u32, u32),
    ) -> Result<NeuronId> {
        params.validate()?;
        let slot = self.allocator.allocate()?;
        self.write_slot(slot as usize, params, cortical_area, coordinate);
        Ok(NeuronId(slot))
    }

    fn add_neurons_batch(
        &mut self,
        params: &[LIFParameters],
        cortical_areas: &[u32],
        coordinates: &[(u32, u32, u32)],
    ) -> Result<Vec<NeuronId>> {
        let n = params.len();
        for len in [cortical_areas.len(), coordinates.len()] {
            if len != n {
                return Err(RuntimeError::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }
        // Validate everything up front so a failure leaves the store untouched
        self.allocator.ensure_available(n)?;
        for p in params {
            p.validate()?;
        }

        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let slot = self.allocator.allocate()?;
            self.write_slot(slot as usize, &params[i], cortical_areas[i], coordinates[i]);
            ids.push(NeuronId(slot));
        }
        debug!(
            target: "feagi-npu-runtime",
            "Added {} neurons ({} valid / {} capacity)",
            n,
            self.valid_count,
            self.capacity()
        );
        Ok(ids)
    }

    fn delete_neuron(&mut self, id: NeuronId) -> Result<()> {
        let idx = self.check_valid(id)?;
        self.valid_mask[idx] = false;
        self.valid_count -= 1;
        self.membrane_potentials[idx] = T::zero();
        self.refractory_countdowns[idx] = 0;
        self.consecutive_fire_counts[idx] = 0;

        let (x, y, z) = self.coordinates[idx];
        let key = (self.cortical_areas[idx], x, y, z);
        if self.coordinate_index.get(&key) == Some(&(idx as u32)) {
            self.coordinate_index.remove(&key);
        }

        self.allocator.release(id.0);
        Ok(())
    }
}
