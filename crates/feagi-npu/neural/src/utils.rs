// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Utility functions for neural processing
//!
//! Stateless hashing so that every backend (including GPU shaders) draws the same
//! pseudo-random value for a given neuron and burst.

/// Fast PCG hash for deterministic pseudo-random number generation
///
/// Based on the PCG family of PRNGs: <https://www.pcg-random.org/>
///
/// # Example
/// ```
/// use feagi_npu_neural::pcg_hash;
///
/// assert_eq!(pcg_hash(42), pcg_hash(42));
/// ```
#[inline(always)]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}

/// Convert PCG hash to floating point in range [0, 1)
///
/// Uses the top 24 bits so the result is exact in `f32` and never rounds up to 1.0.
///
/// # Example
/// ```
/// use feagi_npu_neural::pcg_hash_to_float;
///
/// let random = pcg_hash_to_float(42);
/// assert!(random >= 0.0 && random < 1.0);
/// ```
#[inline(always)]
pub fn pcg_hash_to_float(input: u32) -> f32 {
    (pcg_hash(input) >> 8) as f32 / 16_777_216.0
}

/// Pseudo-random draw for the stochastic threshold of `neuron_id` at `burst_count`
///
/// # Example
/// ```
/// use feagi_npu_neural::excitability_random;
///
/// assert_eq!(excitability_random(42, 100), excitability_random(42, 100));
/// assert_ne!(excitability_random(42, 100), excitability_random(42, 101));
/// ```
#[inline(always)]
pub fn excitability_random(neuron_id: u32, burst_count: u64) -> f32 {
    let seed = neuron_id
        .wrapping_mul(2654435761)
        .wrapping_add((burst_count as u32).wrapping_mul(1597334677));
    pcg_hash_to_float(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcg_hash_deterministic() {
        assert_eq!(pcg_hash(42), pcg_hash(42));
        assert_ne!(pcg_hash(42), pcg_hash(43));
    }

    #[test]
    fn test_float_range_over_many_inputs() {
        for i in (0..u32::MAX).step_by(65_521) {
            let r = pcg_hash_to_float(i);
            assert!((0.0..1.0).contains(&r), "{} -> {}", i, r);
        }
    }

    #[test]
    fn test_excitability_varies_per_burst() {
        let draws: Vec<f32> = (0..16).map(|b| excitability_random(7, b)).collect();
        let distinct = draws
            .iter()
            .filter(|&&d| (d - draws[0]).abs() > f32::EPSILON)
            .count();
        assert!(distinct > 10);
    }
}
