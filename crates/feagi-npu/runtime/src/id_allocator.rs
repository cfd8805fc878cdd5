// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Slot allocation for the fixed-capacity stores
//!
//! Ids are dense array indices. What happens to the slot of a deleted neuron or
//! synapse is governed by [`IdReusePolicy`]:
//!
//! - `Tombstone` (default): ids are handed out monotonically and a deleted slot stays
//!   retired until the store is rebuilt. An id observed in telemetry never changes meaning.
//! - `FreeList`: deleted slots go on a LIFO free list and are handed out again before
//!   any fresh slot is used.

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdReusePolicy {
    #[default]
    Tombstone,
    FreeList,
}

/// Hands out slot indices in `[0, capacity)`
#[derive(Debug, Clone)]
pub struct IdAllocator {
    resource: &'static str,
    capacity: usize,
    /// Slots `[0, high_water)` have been handed out at least once
    high_water: usize,
    free: Vec<u32>,
    policy: IdReusePolicy,
}

impl IdAllocator {
    pub fn new(resource: &'static str, capacity: usize, policy: IdReusePolicy) -> Self {
        Self {
            resource,
            capacity,
            high_water: 0,
            free: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> IdReusePolicy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots ever handed out (upper bound of any valid id + 1)
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Slots that can still be handed out
    pub fn available(&self) -> usize {
        (self.capacity - self.high_water) + self.free.len()
    }

    /// Fail with `CapacityExceeded` unless `requested` slots can be handed out
    pub fn ensure_available(&self, requested: usize) -> Result<()> {
        let available = self.available();
        if requested > available {
            return Err(RuntimeError::CapacityExceeded {
                resource: self.resource,
                requested,
                available,
            });
        }
        Ok(())
    }

    pub fn allocate(&mut self) -> Result<u32> {
        if let Some(slot) = self.free.pop() {
            return Ok(slot);
        }
        self.ensure_available(1)?;
        let slot = self.high_water as u32;
        self.high_water += 1;
        Ok(slot)
    }

    /// Give a slot back; only `FreeList` will hand it out again
    pub fn release(&mut self, slot: u32) {
        debug_assert!((slot as usize) < self.high_water);
        if self.policy == IdReusePolicy::FreeList {
            self.free.push(slot);
        }
    }
}
