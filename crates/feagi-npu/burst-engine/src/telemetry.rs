// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Telemetry handoff
//!
//! The burst thread publishes sampled snapshots into a [`LatestSlot`]: one slot,
//! latest wins, publishing never blocks. A [`TelemetryWorker`] thread takes whatever
//! is newest and hands it to a [`TelemetrySink`]. A slow sink loses intermediate
//! snapshots instead of applying backpressure to the burst loop.

use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::burst_loop_runner::BurstLoopError;

/// Fired neurons of one cortical area, as parallel arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaSnapshot {
    pub cortical_idx: u32,
    pub neuron_ids: Vec<u32>,
    pub coordinates_x: Vec<u32>,
    pub coordinates_y: Vec<u32>,
    pub coordinates_z: Vec<u32>,
    /// Membrane potential at fire time
    pub potentials: Vec<f32>,
}

impl AreaSnapshot {
    pub fn with_capacity(cortical_idx: u32, capacity: usize) -> Self {
        Self {
            cortical_idx,
            neuron_ids: Vec::with_capacity(capacity),
            coordinates_x: Vec::with_capacity(capacity),
            coordinates_y: Vec::with_capacity(capacity),
            coordinates_z: Vec::with_capacity(capacity),
            potentials: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.neuron_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neuron_ids.is_empty()
    }
}

/// In-memory telemetry record of one sampled burst
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub timestep: u64,
    pub areas: AHashMap<u32, AreaSnapshot>,
    pub total_neurons: usize,
}

impl TelemetrySnapshot {
    pub fn new(timestep: u64) -> Self {
        Self {
            timestep,
            ..Self::default()
        }
    }
}

/// Consumer of sampled telemetry (visualization, motor output, recording...)
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, snapshot: TelemetrySnapshot) -> Result<(), String>;
}

struct SlotState<T> {
    value: Option<T>,
    closed: bool,
}

/// Single-slot, latest-wins channel
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                closed: false,
            }),
            ready: Condvar::new(),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Store `value`, replacing anything not yet taken.
    ///
    /// Returns `true` if an older value was dropped. Publishing to a closed slot drops `value`.
    pub fn publish(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let replaced = state.value.replace(value).is_some();
        drop(state);

        self.published.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.ready.notify_one();
        replaced
    }

    /// Take the current value without waiting
    pub fn take(&self) -> Option<T> {
        self.state.lock().value.take()
    }

    /// Wait up to `timeout` for a value. Returns `None` on timeout or once closed and empty.
    pub fn wait_take(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.value.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return state.value.take();
            }
        }
    }

    /// Wake waiters; later publishes are discarded
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Values that were replaced (or rejected after close) before anyone took them
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Background thread draining a [`LatestSlot`] into a [`TelemetrySink`]
pub struct TelemetryWorker {
    slot: Arc<LatestSlot<TelemetrySnapshot>>,
    delivered: Arc<AtomicU64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TelemetryWorker {
    pub fn spawn(
        slot: Arc<LatestSlot<TelemetrySnapshot>>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, BurstLoopError> {
        let delivered = Arc::new(AtomicU64::new(0));
        let thread_slot = slot.clone();
        let thread_delivered = delivered.clone();

        let handle = thread::Builder::new()
            .name("feagi-telemetry".to_string())
            .spawn(move || {
                debug!("[TELEMETRY] Worker started");
                loop {
                    match thread_slot.wait_take(Duration::from_millis(100)) {
                        Some(snapshot) => {
                            let timestep = snapshot.timestep;
                            if let Err(e) = sink.publish(snapshot) {
                                warn!("[TELEMETRY] Sink rejected snapshot for burst {}: {}", timestep, e);
                            } else {
                                thread_delivered.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        None if thread_slot.is_closed() => break,
                        None => {}
                    }
                }
                debug!("[TELEMETRY] Worker exiting");
            })
            .map_err(|e| BurstLoopError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            slot,
            delivered,
            handle: Some(handle),
        })
    }

    /// Snapshots the sink accepted
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Close the slot and join the worker
    pub fn shutdown(&mut self) {
        self.slot.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[TELEMETRY] Worker thread panicked");
            } else {
                info!(
                    "[TELEMETRY] Worker stopped ({} delivered, {} dropped)",
                    self.delivered_count(),
                    self.slot.dropped_count()
                );
            }
        }
    }
}

impl Drop for TelemetryWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
