// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Burst Loop Runner
//!
//! Drives the NPU at a target frequency on a dedicated thread.
//!
//! Each cycle:
//! 1. take the NPU write lock, apply queued parameter updates, run one burst
//!    (injection, propagation, dynamics, archival)
//! 2. release the lock
//! 3. if the sampler is due, build a [`TelemetrySnapshot`] and publish it to the
//!    latest-wins slot drained by the telemetry worker
//! 4. sleep until the next burst is due
//!
//! Stopping takes effect between bursts. Every run gets its own stop token, so a thread
//! abandoned by a timed-out `stop()` finishes its current burst and exits even if the
//! runner has been started again in the meantime.

use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::dynamic_npu::DynamicNPU;
use crate::fire_structures::FireQueue;
use crate::fq_sampler::FQSampler;
use crate::parameter_update_queue::ParameterUpdateQueue;
use crate::telemetry::{LatestSlot, TelemetrySink, TelemetrySnapshot, TelemetryWorker};
use crate::tracing_mutex::TracingRwLock;

/// Sleep chunk; bounds how long a stop request can go unnoticed
const SLEEP_CHUNK: Duration = Duration::from_millis(50);
const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq)]
pub enum BurstLoopError {
    #[error("burst loop already running")]
    AlreadyRunning,

    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("invalid burst frequency {0} Hz (must be finite and > 0)")]
    InvalidFrequency(f64),

    #[error("invalid burst loop configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstLoopState {
    Stopped,
    Running,
}

/// What the loop does after a burst fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstErrorPolicy {
    /// Stop the loop
    #[default]
    Stop,
    /// Log, record and continue with the next cycle
    Skip,
}

impl FromStr for BurstErrorPolicy {
    type Err = BurstLoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "skip" | "continue" => Ok(Self::Skip),
            other => Err(BurstLoopError::InvalidConfig(format!(
                "unknown error policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BurstLoopConfig {
    pub frequency_hz: f64,
    /// Telemetry sampling rate; 0 disables sampling
    pub sampler_frequency_hz: f64,
    pub error_policy: BurstErrorPolicy,
    /// How long `stop()` waits for the burst thread
    pub join_timeout: Duration,
}

impl Default for BurstLoopConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 30.0,
            sampler_frequency_hz: 10.0,
            error_policy: BurstErrorPolicy::Stop,
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl BurstLoopConfig {
    pub fn from_feagi_config(config: &feagi_config::FeagiConfig) -> Result<Self, BurstLoopError> {
        let burst = &config.burst_engine;
        let loop_config = Self {
            frequency_hz: burst.burst_frequency_hz,
            sampler_frequency_hz: burst.sampler_frequency_hz,
            error_policy: burst.error_policy.parse()?,
            join_timeout: Duration::from_millis(burst.join_timeout_ms),
        };
        loop_config.validate()?;
        Ok(loop_config)
    }

    pub fn validate(&self) -> Result<(), BurstLoopError> {
        validate_frequency(self.frequency_hz)?;
        if !self.sampler_frequency_hz.is_finite() || self.sampler_frequency_hz < 0.0 {
            return Err(BurstLoopError::InvalidConfig(format!(
                "sampler frequency {} Hz",
                self.sampler_frequency_hz
            )));
        }
        Ok(())
    }
}

fn validate_frequency(frequency_hz: f64) -> Result<(), BurstLoopError> {
    if frequency_hz.is_finite() && frequency_hz > 0.0 {
        Ok(())
    } else {
        Err(BurstLoopError::InvalidFrequency(frequency_hz))
    }
}

/// State shared between the runner handle and its burst thread
struct LoopShared {
    npu: Arc<TracingRwLock<DynamicNPU>>,
    frequency_hz: Mutex<f64>,
    sampler: Mutex<FQSampler>,
    burst_count: AtomicU64,
    /// Burst threads that have not exited yet, including abandoned ones
    live_loops: AtomicUsize,
    last_error: Mutex<Option<String>>,
    latest_snapshot: Mutex<Option<TelemetrySnapshot>>,
    parameter_queue: ParameterUpdateQueue,
    error_policy: BurstErrorPolicy,
}

/// Burst loop runner - manages the main neural processing loop
pub struct BurstLoopRunner {
    shared: Arc<LoopShared>,
    sink: Arc<dyn TelemetrySink>,
    join_timeout: Duration,
    /// Stop token of the current run
    running: Arc<AtomicBool>,
    telemetry: Option<TelemetryWorker>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl BurstLoopRunner {
    pub fn new(
        npu: Arc<TracingRwLock<DynamicNPU>>,
        sink: Arc<dyn TelemetrySink>,
        config: BurstLoopConfig,
    ) -> Result<Self, BurstLoopError> {
        config.validate()?;
        let burst_count = npu.read().burst_count();

        let shared = Arc::new(LoopShared {
            npu,
            frequency_hz: Mutex::new(config.frequency_hz),
            sampler: Mutex::new(FQSampler::new(config.sampler_frequency_hz)),
            burst_count: AtomicU64::new(burst_count),
            live_loops: AtomicUsize::new(0),
            last_error: Mutex::new(None),
            latest_snapshot: Mutex::new(None),
            parameter_queue: ParameterUpdateQueue::new(),
            error_policy: config.error_policy,
        });

        Ok(Self {
            shared,
            sink,
            join_timeout: config.join_timeout,
            running: Arc::new(AtomicBool::new(false)),
            telemetry: None,
            thread_handle: None,
        })
    }

    /// Start the burst loop and the telemetry worker
    pub fn start(&mut self) -> Result<(), BurstLoopError> {
        if self.is_running() {
            return Err(BurstLoopError::AlreadyRunning);
        }
        // A loop that stopped itself after an error still holds its threads
        self.join_threads();

        let frequency = *self.shared.frequency_hz.lock();
        info!("[BURST-RUNNER] Starting burst loop at {:.2} Hz", frequency);

        *self.shared.last_error.lock() = None;
        let slot = Arc::new(LatestSlot::new());
        self.telemetry = Some(TelemetryWorker::spawn(slot.clone(), self.sink.clone())?);

        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();
        let shared = self.shared.clone();
        shared.live_loops.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name("feagi-burst-loop".to_string())
            .spawn(move || {
                burst_loop(&shared, &running, slot);
                shared.live_loops.fetch_sub(1, Ordering::AcqRel);
            });

        match spawned {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                info!("[BURST-RUNNER] Burst loop started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.shared.live_loops.fetch_sub(1, Ordering::AcqRel);
                if let Some(mut worker) = self.telemetry.take() {
                    worker.shutdown();
                }
                Err(BurstLoopError::ThreadSpawn(e.to_string()))
            }
        }
    }

    /// Stop the burst loop gracefully
    ///
    /// Waits up to the configured join timeout for the burst thread. A thread that
    /// does not finish in time is left to exit on its own after its current burst.
    pub fn stop(&mut self) {
        if self.thread_handle.is_none() && self.telemetry.is_none() {
            return;
        }
        info!("[BURST-RUNNER] Stopping burst loop...");
        self.running.store(false, Ordering::Release);
        self.join_threads();
    }

    fn join_threads(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            // JoinHandle has no timed join; wait for it on a helper thread
            let (tx, rx) = std::sync::mpsc::channel();
            let joiner = thread::Builder::new()
                .name("feagi-burst-join".to_string())
                .spawn(move || {
                    let _ = tx.send(handle.join());
                });

            match joiner {
                Ok(_) => match rx.recv_timeout(self.join_timeout) {
                    Ok(Ok(())) => info!("[BURST-RUNNER] Burst loop stopped cleanly"),
                    Ok(Err(_)) => warn!("[BURST-RUNNER] Burst loop thread panicked"),
                    Err(_) => warn!(
                        "[BURST-RUNNER] Burst loop did not stop within {:?}, proceeding",
                        self.join_timeout
                    ),
                },
                Err(e) => warn!("[BURST-RUNNER] Could not spawn join thread: {}", e),
            }
        }

        if let Some(mut worker) = self.telemetry.take() {
            worker.shutdown();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Burst threads still alive; above 1 only while an abandoned thread finishes its burst
    pub fn live_loop_threads(&self) -> usize {
        self.shared.live_loops.load(Ordering::Acquire)
    }

    pub fn state(&self) -> BurstLoopState {
        if self.is_running() {
            BurstLoopState::Running
        } else {
            BurstLoopState::Stopped
        }
    }

    /// Completed bursts; never touches the NPU lock
    pub fn get_burst_count(&self) -> u64 {
        self.shared.burst_count.load(Ordering::Acquire)
    }

    /// Takes effect from the next sleep, also while running
    pub fn set_frequency(&self, frequency_hz: f64) -> Result<(), BurstLoopError> {
        validate_frequency(frequency_hz)?;
        *self.shared.frequency_hz.lock() = frequency_hz;
        info!("[BURST-RUNNER] Frequency set to {:.2} Hz", frequency_hz);
        Ok(())
    }

    pub fn get_frequency(&self) -> f64 {
        *self.shared.frequency_hz.lock()
    }

    /// 0 disables telemetry sampling
    pub fn set_sampler_frequency(&self, frequency_hz: f64) {
        self.shared.sampler.lock().set_frequency(frequency_hz);
        debug!("[BURST-RUNNER] Sampler frequency set to {:.2} Hz", frequency_hz);
    }

    /// Most recent sampled snapshot
    pub fn latest_snapshot(&self) -> Option<TelemetrySnapshot> {
        self.shared.latest_snapshot.lock().clone()
    }

    /// Message of the most recent failed burst since the last `start()`
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Queue consumed by the burst thread between bursts
    pub fn parameter_queue(&self) -> ParameterUpdateQueue {
        self.shared.parameter_queue.clone()
    }

    pub fn npu(&self) -> &Arc<TracingRwLock<DynamicNPU>> {
        &self.shared.npu
    }
}

impl Drop for BurstLoopRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Record a failed burst; returns `true` if the loop should keep going
fn handle_burst_error(shared: &LoopShared, running: &AtomicBool, message: String) -> bool {
    *shared.last_error.lock() = Some(message);
    match shared.error_policy {
        BurstErrorPolicy::Stop => {
            running.store(false, Ordering::Release);
            false
        }
        BurstErrorPolicy::Skip => true,
    }
}

fn burst_loop(
    shared: &LoopShared,
    running: &AtomicBool,
    slot: Arc<LatestSlot<TelemetrySnapshot>>,
) {
    info!(
        "[BURST-LOOP] Starting main loop at {:.2} Hz",
        *shared.frequency_hz.lock()
    );

    let mut bursts_in_window = 0u64;
    let mut fired_in_window = 0usize;
    let mut last_stats_time = Instant::now();

    while running.load(Ordering::Acquire) {
        let burst_start = Instant::now();

        // Write lock spans parameter updates, the burst and the sampler check only
        let outcome = {
            let mut npu = shared.npu.write();

            let updates = shared.parameter_queue.drain_all();
            if !updates.is_empty() {
                info!("[PARAM-QUEUE] Applying {} queued parameter updates", updates.len());
                for update in &updates {
                    match npu.apply_parameter_update(update) {
                        Ok(count) => debug!(
                            "[PARAM-QUEUE] {} = {} on area {} ({} neurons)",
                            update.parameter, update.value, update.cortical_idx, count
                        ),
                        Err(e) => warn!(
                            "[PARAM-QUEUE] Rejected {} on area {}: {}",
                            update.parameter, update.cortical_idx, e
                        ),
                    }
                }
            }

            npu.process_burst().map(|result| {
                let due = shared
                    .sampler
                    .lock()
                    .should_sample(result.burst, Instant::now());
                let fire_queue: Option<FireQueue> = due.then(|| npu.last_fire_queue().clone());
                (result, fire_queue)
            })
        };

        match outcome {
            Ok((result, fire_queue)) => {
                // An abandoned thread may publish its last burst after a newer one
                shared.burst_count.fetch_max(result.burst, Ordering::AcqRel);
                bursts_in_window += 1;
                fired_in_window += result.neuron_count();

                if let Some(fire_queue) = fire_queue {
                    let snapshot = shared.sampler.lock().sample(&fire_queue, Instant::now());
                    if let Some(snapshot) = snapshot {
                        trace!(
                            "[BURST-LOOP] Sampled burst {} ({} neurons)",
                            snapshot.timestep,
                            snapshot.total_neurons
                        );
                        *shared.latest_snapshot.lock() = Some(snapshot.clone());
                        slot.publish(snapshot);
                    }
                }
            }
            Err(e) => {
                let burst = shared.burst_count.load(Ordering::Acquire) + 1;
                error!("[BURST-LOOP] Burst {} failed: {}", burst, e);
                if !handle_burst_error(shared, running, e.to_string()) {
                    warn!("[BURST-LOOP] Stopping after failed burst {}", burst);
                    break;
                }
            }
        }

        let since_stats = last_stats_time.elapsed();
        if since_stats >= STATS_INTERVAL {
            debug!(
                "[BURST-LOOP] {:.1} Hz actual, {:.1} neurons fired per burst, burst {}",
                bursts_in_window as f64 / since_stats.as_secs_f64(),
                fired_in_window as f64 / bursts_in_window.max(1) as f64,
                shared.burst_count.load(Ordering::Relaxed)
            );
            bursts_in_window = 0;
            fired_in_window = 0;
            last_stats_time = Instant::now();
        }

        let frequency_hz = *shared.frequency_hz.lock();
        adaptive_sleep(burst_start, frequency_hz, running);
    }

    info!(
        "[BURST-LOOP] Main loop stopped at burst {}",
        shared.burst_count.load(Ordering::Acquire)
    );
}

/// Wait until the next burst is due.
///
/// Below 5 Hz sleep in chunks, above 100 Hz busy-wait, in between sleep 80% of the
/// remaining interval and spin the rest. Every branch observes `running`.
fn adaptive_sleep(burst_start: Instant, frequency_hz: f64, running: &AtomicBool) {
    let interval = Duration::from_secs_f64(1.0 / frequency_hz);
    let target_time = burst_start + interval;
    let now = Instant::now();

    if now >= target_time {
        let overshoot = now - target_time;
        if overshoot > SLEEP_CHUNK {
            warn!(
                "[BURST-LOOP] Iteration overshoot: {:.2}ms past target",
                overshoot.as_secs_f64() * 1000.0
            );
        }
        return;
    }

    if frequency_hz < 5.0 {
        chunked_sleep_until(target_time, running);
    } else if frequency_hz > 100.0 {
        while Instant::now() < target_time && running.load(Ordering::Relaxed) {
            std::hint::spin_loop();
        }
    } else {
        let remaining = target_time - now;
        chunked_sleep_until(now + remaining.mul_f64(0.8), running);
        while Instant::now() < target_time && running.load(Ordering::Relaxed) {
            std::hint::spin_loop();
        }
    }
}

fn chunked_sleep_until(deadline: Instant, running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SLEEP_CHUNK));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendConfig, BackendType};
    use crate::npu::NpuConfig;
    use crate::parameter_update_queue::{NeuronParameter, ParameterUpdate};
    use feagi_npu_neural::types::NeuronId;
    use feagi_npu_neural::LIFParameters;

    struct CollectingSink(Mutex<Vec<TelemetrySnapshot>>);

    impl TelemetrySink for CollectingSink {
        fn publish(&self, snapshot: TelemetrySnapshot) -> Result<(), String> {
            self.0.lock().push(snapshot);
            Ok(())
        }
    }

    fn npu_with_power_neuron() -> (Arc<TracingRwLock<DynamicNPU>>, NeuronId) {
        let mut npu = DynamicNPU::new(NpuConfig {
            neuron_capacity: 16,
            synapse_capacity: 16,
            backend: BackendConfig::default().with_override(BackendType::CPU),
            ..NpuConfig::default()
        })
        .unwrap();
        let id = npu
            .add_neuron(&LIFParameters::with_threshold(0.5), 1, (1, 2, 3))
            .unwrap();
        npu.add_power_neuron(id).unwrap();
        npu.finalize_network().unwrap();
        (Arc::new(TracingRwLock::new(npu, "npu")), id)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn config(frequency_hz: f64, policy: BurstErrorPolicy) -> BurstLoopConfig {
        BurstLoopConfig {
            frequency_hz,
            sampler_frequency_hz: 1000.0,
            error_policy: policy,
            ..BurstLoopConfig::default()
        }
    }

    #[test]
    fn test_burst_loop_lifecycle() {
        let (npu, _) = npu_with_power_neuron();
        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut runner =
            BurstLoopRunner::new(npu, sink, config(50.0, BurstErrorPolicy::Stop)).unwrap();

        assert_eq!(runner.state(), BurstLoopState::Stopped);
        runner.start().unwrap();
        assert_eq!(runner.state(), BurstLoopState::Running);
        assert_eq!(runner.start(), Err(BurstLoopError::AlreadyRunning));

        assert!(wait_for(|| runner.get_burst_count() >= 3));
        runner.stop();
        assert!(!runner.is_running());

        let stopped_at = runner.get_burst_count();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(runner.get_burst_count(), stopped_at);
        assert_eq!(runner.npu().read().burst_count(), stopped_at);

        runner.start().unwrap();
        assert!(wait_for(|| runner.get_burst_count() > stopped_at));
        runner.stop();
    }

    #[test]
    fn test_restart_after_join_timeout_runs_one_loop() {
        let (npu, _) = npu_with_power_neuron();
        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut runner = BurstLoopRunner::new(
            npu.clone(),
            sink,
            BurstLoopConfig {
                join_timeout: Duration::from_millis(20),
                ..config(200.0, BurstErrorPolicy::Stop)
            },
        )
        .unwrap();

        runner.start().unwrap();
        assert!(wait_for(|| runner.get_burst_count() >= 1));

        // Hold the NPU so the burst thread blocks mid-cycle and the join times out
        let guard = npu.write();
        thread::sleep(Duration::from_millis(30));
        runner.stop();
        assert!(!runner.is_running());
        assert_eq!(runner.live_loop_threads(), 1);

        runner.start().unwrap();
        assert_eq!(runner.live_loop_threads(), 2);
        drop(guard);

        // The abandoned thread finishes its burst and exits; only the new run keeps going
        assert!(wait_for(|| runner.live_loop_threads() == 1));
        let resumed_at = runner.get_burst_count();
        assert!(wait_for(|| runner.get_burst_count() > resumed_at));
        assert!(runner.is_running());

        runner.stop();
        assert!(wait_for(|| runner.live_loop_threads() == 0));
        assert_eq!(runner.get_burst_count(), npu.read().burst_count());
    }

    #[test]
    fn test_snapshots_reach_sink() {
        let (npu, id) = npu_with_power_neuron();
        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut runner = BurstLoopRunner::new(
            npu,
            sink.clone(),
            config(100.0, BurstErrorPolicy::Stop),
        )
        .unwrap();

        runner.start().unwrap();
        assert!(wait_for(|| !sink.0.lock().is_empty()));
        runner.stop();

        let delivered = sink.0.lock();
        let area = &delivered[0].areas[&1];
        assert_eq!(area.neuron_ids, vec![id.0]);
        assert_eq!(
            (area.coordinates_x[0], area.coordinates_y[0], area.coordinates_z[0]),
            (1, 2, 3)
        );
        assert!(runner.latest_snapshot().is_some());
    }

    #[test]
    fn test_parameter_updates_applied_between_bursts() {
        let (npu, id) = npu_with_power_neuron();
        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut runner =
            BurstLoopRunner::new(npu, sink, config(100.0, BurstErrorPolicy::Stop)).unwrap();

        runner
            .parameter_queue()
            .push(ParameterUpdate::new(1, NeuronParameter::Threshold, 50.0));
        runner.start().unwrap();
        assert!(wait_for(|| runner.get_burst_count() >= 2));
        runner.stop();

        assert!(runner.parameter_queue().is_empty());
        let state = runner.npu().read().get_neuron_state(id).unwrap();
        assert_eq!(state.parameters.threshold, 50.0);
    }

    #[test]
    fn test_stop_policy_halts_on_error() {
        let (npu, _) = npu_with_power_neuron();
        // A ledger already ahead of the counter rejects the next archive
        npu.write()
            .fire_ledger_mut()
            .archive_burst(100, &FireQueue::new())
            .unwrap();

        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut runner =
            BurstLoopRunner::new(npu, sink, config(50.0, BurstErrorPolicy::Stop)).unwrap();
        runner.start().unwrap();

        assert!(wait_for(|| !runner.is_running()));
        assert!(runner.last_error().is_some());
        assert_eq!(runner.get_burst_count(), 0);
        runner.stop();
    }

    #[test]
    fn test_skip_policy_keeps_running() {
        let (npu, _) = npu_with_power_neuron();
        npu.write()
            .fire_ledger_mut()
            .archive_burst(100, &FireQueue::new())
            .unwrap();

        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut runner =
            BurstLoopRunner::new(npu, sink, config(50.0, BurstErrorPolicy::Skip)).unwrap();
        runner.start().unwrap();

        assert!(wait_for(|| runner.last_error().is_some()));
        thread::sleep(Duration::from_millis(50));
        assert!(runner.is_running());
        assert_eq!(runner.get_burst_count(), 0);
        runner.stop();
    }

    #[test]
    fn test_frequency_validation() {
        let (npu, _) = npu_with_power_neuron();
        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        assert!(matches!(
            BurstLoopRunner::new(npu.clone(), sink.clone(), config(0.0, BurstErrorPolicy::Stop)),
            Err(BurstLoopError::InvalidFrequency(_))
        ));

        let runner =
            BurstLoopRunner::new(npu, sink, config(10.0, BurstErrorPolicy::Stop)).unwrap();
        assert!(runner.set_frequency(f64::NAN).is_err());
        runner.set_frequency(25.0).unwrap();
        assert_eq!(runner.get_frequency(), 25.0);
    }

    #[test]
    fn test_error_policy_parsing() {
        assert_eq!("stop".parse::<BurstErrorPolicy>(), Ok(BurstErrorPolicy::Stop));
        assert_eq!("Skip".parse::<BurstErrorPolicy>(), Ok(BurstErrorPolicy::Skip));
        assert!("retry".parse::<BurstErrorPolicy>().is_err());
    }

    #[test]
    fn test_adaptive_sleep_returns_on_stop() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        adaptive_sleep(start, 0.5, &running);
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
