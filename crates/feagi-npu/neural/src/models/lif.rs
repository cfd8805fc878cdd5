// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # LIF (Leaky Integrate-and-Fire) Neuron Model
//!
//! ## Model Dynamics
//!
//! ```text
//! Synaptic Contribution (per active synapse):
//!     contribution = sign × weight × psp          (weight, psp in 0..=255)
//!
//! Membrane Potential Update (only for neurons in the FCL):
//!     if refractory_countdown > 0:
//!         refractory_countdown -= 1               (nothing else changes)
//!     else:
//!         V = V + I_syn
//!         V = V - g_leak × (V - V_rest)
//!
//! Firing Check:
//!     θ_eff = θ × (1 - (1 - r) × excitability)    r = excitability_random(id, burst)
//!     fire iff V ≥ θ_eff and (no limit or V ≤ θ_limit)
//!     on fire: V = V_rest, refractory_countdown = refractory_period
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{FeagiError, NeuralValue, QuantizationRange, Result};

/// LIF (Leaky Integrate-and-Fire) neuron model
///
/// Generic over [`NeuralValue`] so the same arithmetic runs on `f32` and `INT8Value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LIFModel;

impl LIFModel {
    pub fn new() -> Self {
        Self
    }

    pub fn model_name(&self) -> &'static str {
        "Leaky Integrate-and-Fire (LIF)"
    }

    /// `V - g_leak × (V - V_rest)`, evaluated on decoded values and re-encoded
    ///
    /// `V - V_rest` can span twice the quantization range, so it is never formed in code space.
    #[inline(always)]
    pub fn apply_leak<T: NeuralValue>(
        membrane: T,
        resting: T,
        leak_coefficient: f32,
        range: &QuantizationRange,
    ) -> T {
        let v = membrane.to_f32(range);
        let rest = resting.to_f32(range);
        T::from_f32(v - leak_coefficient * (v - rest), range)
    }

    /// `θ × (1 - (1 - r) × excitability)`; excitability 0 leaves the threshold untouched
    #[inline(always)]
    pub fn effective_threshold<T: NeuralValue>(threshold: T, excitability: f32, random: f32) -> T {
        threshold.scaled_multiply(1.0 - (1.0 - random) * excitability)
    }

    /// Firing window check
    #[inline(always)]
    pub fn should_fire<T: NeuralValue>(
        membrane: T,
        effective_threshold: T,
        threshold_limit: Option<T>,
    ) -> bool {
        membrane.ge(effective_threshold) && threshold_limit.map_or(true, |limit| membrane.le(limit))
    }
}

/// Per-neuron LIF parameters, expressed in full precision
///
/// Stores convert the value-typed fields through the network's quantization range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LIFParameters {
    pub threshold: f32,

    /// Upper bound of the firing window; `None` means no upper bound
    #[serde(default)]
    pub threshold_limit: Option<f32>,

    /// Fraction of `(V - V_rest)` lost per visited burst (0.0-1.0)
    pub leak_coefficient: f32,

    pub resting_potential: f32,

    pub refractory_period: u16,

    /// Cap for the consecutive fire counter
    pub consecutive_fire_limit: u16,

    /// Stochastic threshold jitter factor (0.0 = deterministic threshold)
    pub excitability: f32,
}

impl LIFParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !self.resting_potential.is_finite() {
            return Err(FeagiError::InvalidParameter(
                "LIF: threshold and resting potential must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.leak_coefficient) {
            return Err(FeagiError::InvalidParameter(format!(
                "LIF: leak coefficient {} must be in [0, 1]",
                self.leak_coefficient
            )));
        }
        if !(0.0..=1.0).contains(&self.excitability) {
            return Err(FeagiError::InvalidParameter(format!(
                "LIF: excitability {} must be in [0, 1]",
                self.excitability
            )));
        }
        if let Some(limit) = self.threshold_limit {
            if limit.is_nan() || limit < self.threshold {
                return Err(FeagiError::InvalidParameter(format!(
                    "LIF: threshold limit {} is below threshold {}",
                    limit, self.threshold
                )));
            }
        }
        Ok(())
    }
}

impl Default for LIFParameters {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            threshold_limit: None,
            leak_coefficient: 0.1,
            resting_potential: 0.0,
            refractory_period: 0,
            consecutive_fire_limit: u16::MAX,
            excitability: 0.0,
        }
    }
}
