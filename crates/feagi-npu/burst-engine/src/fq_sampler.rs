// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Fire Queue sampler
//!
//! Throttles telemetry to its own rate, independent of burst frequency, and never
//! samples the same timestep twice.

use std::time::{Duration, Instant};

use crate::fire_structures::FireQueue;
use crate::telemetry::{AreaSnapshot, TelemetrySnapshot};

#[derive(Debug, Clone)]
pub struct FQSampler {
    /// `None` = sampling disabled
    sample_interval: Option<Duration>,
    last_sample: Option<Instant>,
    last_timestep: Option<u64>,
}

impl FQSampler {
    /// Sampler firing at most `frequency_hz` times per second (0 disables it)
    pub fn new(frequency_hz: f64) -> Self {
        Self {
            sample_interval: Self::interval_for(frequency_hz),
            last_sample: None,
            last_timestep: None,
        }
    }

    fn interval_for(frequency_hz: f64) -> Option<Duration> {
        if frequency_hz.is_finite() && frequency_hz > 0.0 {
            Some(Duration::from_secs_f64(1.0 / frequency_hz))
        } else {
            None
        }
    }

    pub fn set_frequency(&mut self, frequency_hz: f64) {
        self.sample_interval = Self::interval_for(frequency_hz);
    }

    pub fn sample_interval(&self) -> Option<Duration> {
        self.sample_interval
    }

    /// Whether a snapshot is due for `timestep` at `now`
    pub fn should_sample(&self, timestep: u64, now: Instant) -> bool {
        let Some(interval) = self.sample_interval else {
            return false;
        };
        if self.last_timestep == Some(timestep) {
            return false;
        }
        self.last_sample
            .map_or(true, |last| now.saturating_duration_since(last) >= interval)
    }

    /// Build a snapshot if one is due; marks the timestep as sampled
    pub fn sample(&mut self, fire_queue: &FireQueue, now: Instant) -> Option<TelemetrySnapshot> {
        let timestep = fire_queue.timestep();
        if !self.should_sample(timestep, now) {
            return None;
        }
        self.last_sample = Some(now);
        self.last_timestep = Some(timestep);
        Some(build_snapshot(fire_queue))
    }
}

/// Group a Fire Queue by cortical area, ids ascending within each area
pub fn build_snapshot(fire_queue: &FireQueue) -> TelemetrySnapshot {
    let mut snapshot = TelemetrySnapshot::new(fire_queue.timestep());
    for (&cortical_idx, neurons) in &fire_queue.neurons_by_area {
        let mut sorted = neurons.clone();
        sorted.sort_unstable_by_key(|n| n.neuron_id);

        let mut area = AreaSnapshot::with_capacity(cortical_idx, sorted.len());
        for n in &sorted {
            area.neuron_ids.push(n.neuron_id.0);
            area.coordinates_x.push(n.x);
            area.coordinates_y.push(n.y);
            area.coordinates_z.push(n.z);
            area.potentials.push(n.membrane_potential);
        }
        snapshot.total_neurons += area.len();
        snapshot.areas.insert(cortical_idx, area);
    }
    snapshot
}
