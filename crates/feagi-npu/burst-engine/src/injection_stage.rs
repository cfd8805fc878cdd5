// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Staged sensory injections.
//!
//! Producers stage `(neuron, potential)` pairs at any time; the NPU takes the whole stage
//! at the start of the next burst. The stage has its own lock, so injecting never waits
//! for a burst in progress.

use parking_lot::Mutex;
use std::sync::Arc;

use feagi_npu_neural::types::NeuronId;

#[derive(Clone, Default)]
pub struct InjectionStage {
    staged: Arc<Mutex<Vec<(NeuronId, f32)>>>,
}

impl InjectionStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a batch; repeated targets accumulate when merged into the FCL
    pub fn stage(&self, injections: &[(NeuronId, f32)]) {
        self.staged.lock().extend_from_slice(injections);
    }

    pub fn stage_one(&self, neuron_id: NeuronId, potential: f32) {
        self.staged.lock().push((neuron_id, potential));
    }

    /// Take everything staged so far, leaving the stage empty
    pub fn take(&self) -> Vec<(NeuronId, f32)> {
        std::mem::take(&mut *self.staged.lock())
    }

    pub fn len(&self) -> usize {
        self.staged.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.lock().is_empty()
    }

    pub fn clear(&self) {
        self.staged.lock().clear();
    }
}
