// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! FireLedger - bounded, burst-aligned firing history.
//!
//! Two views of the same archive calls:
//! - Ring: the fired ids of the last `depth` bursts, every area merged.
//! - Tracked areas: dense per-area windows of explicitly requested size, used for
//!   replay and diagnostics of a single area.
//!
//! Key semantics:
//! - Dense: every timestep gets a frame (explicit empty frames when silent or skipped).
//! - Burst-aligned: windows are defined by timestep range, not "last N firing events".
//! - Deterministic: no implicit defaults; errors are explicit.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use std::collections::VecDeque;

use crate::fire_structures::FireQueue;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FireLedgerError {
    #[error("window size must be > 0")]
    InvalidWindowSize,

    #[error("depth must be > 0")]
    InvalidDepth,

    #[error("non-monotonic timestep: current={current}, requested={requested}")]
    NonMonotonicTimestep { current: u64, requested: u64 },

    #[error("area {cortical_idx} is not tracked")]
    AreaNotTracked { cortical_idx: u32 },

    #[error("requested end_timestep={end_timestep} exceeds current_timestep={current_timestep:?}")]
    EndTimestepInFuture {
        end_timestep: u64,
        current_timestep: Option<u64>,
    },

    #[error(
        "insufficient history for area {cortical_idx}: need [{start}..{end}], but have [{have_start}..{have_end}]"
    )]
    InsufficientHistory {
        cortical_idx: u32,
        start: u64,
        end: u64,
        have_start: u64,
        have_end: u64,
    },

    #[error("requested depth {depth} exceeds tracked window size {window_size} for area {cortical_idx}")]
    DepthExceedsWindow {
        cortical_idx: u32,
        depth: usize,
        window_size: usize,
    },
}

/// Bounded ring of `(timestep, fired ids)` frames, oldest first
#[derive(Debug, Clone)]
struct FrameRing {
    window_size: usize,
    frames: VecDeque<(u64, RoaringBitmap)>,
}

impl FrameRing {
    fn new(window_size: usize) -> Self {
        Self {
            window_size,
            frames: VecDeque::with_capacity(window_size.min(1024)),
        }
    }

    fn resize_window(&mut self, new_size: usize) {
        self.window_size = new_size;
        while self.frames.len() > new_size {
            self.frames.pop_front();
        }
    }

    fn range_bounds(&self) -> Option<(u64, u64)> {
        let (start, _) = self.frames.front()?;
        let (end, _) = self.frames.back()?;
        Some((*start, *end))
    }

    fn push_frame(&mut self, timestep: u64, bitmap: RoaringBitmap) {
        self.frames.push_back((timestep, bitmap));
        while self.frames.len() > self.window_size {
            self.frames.pop_front();
        }
    }

    /// Empty frames for the skipped timesteps `(previous, timestep)`; only the tail
    /// that can still fit in the window is materialized
    fn fill_gap(&mut self, previous: u64, timestep: u64) {
        let first = (previous + 1).max(timestep.saturating_sub(self.window_size as u64));
        for t in first..timestep {
            self.push_frame(t, RoaringBitmap::new());
        }
    }
}

/// Firing history: global ring plus tracked-area windows
#[derive(Debug, Clone)]
pub struct FireLedger {
    ring: FrameRing,
    tracked: AHashMap<u32, FrameRing>,
    current_timestep: Option<u64>,
}

impl FireLedger {
    /// Create a ledger that keeps the last `depth` bursts
    pub fn new(depth: usize) -> Result<Self, FireLedgerError> {
        if depth == 0 {
            return Err(FireLedgerError::InvalidDepth);
        }
        Ok(Self {
            ring: FrameRing::new(depth),
            tracked: AHashMap::new(),
            current_timestep: None,
        })
    }

    pub fn depth(&self) -> usize {
        self.ring.window_size
    }

    /// Frames currently held in the ring
    pub fn len(&self) -> usize {
        self.ring.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.frames.is_empty()
    }

    /// Timestep of the most recent archived burst
    pub fn current_timestep(&self) -> Option<u64> {
        self.current_timestep
    }

    /// Up to `n` most recent frames, oldest first
    pub fn recent_frames(&self, n: usize) -> Vec<(u64, RoaringBitmap)> {
        let skip = self.ring.frames.len().saturating_sub(n);
        self.ring.frames.iter().skip(skip).cloned().collect()
    }

    /// Fired ids of one timestep, if it is still inside the ring
    pub fn fired_at(&self, timestep: u64) -> Option<&RoaringBitmap> {
        let (start, end) = self.ring.range_bounds()?;
        if timestep < start || timestep > end {
            return None;
        }
        self.ring
            .frames
            .get((timestep - start) as usize)
            .map(|(_, bm)| bm)
    }

    /// Track a cortical area with an explicit window size.
    ///
    /// This is an exact setting (not max/merge). If multiple subsystems depend on the same area,
    /// the caller must pass the final resolved requirement.
    pub fn track_area(&mut self, cortical_idx: u32, window_size: usize) -> Result<(), FireLedgerError> {
        if window_size == 0 {
            return Err(FireLedgerError::InvalidWindowSize);
        }

        match self.tracked.get_mut(&cortical_idx) {
            Some(hist) => hist.resize_window(window_size),
            None => {
                let mut hist = FrameRing::new(window_size);
                // Prefill a dense empty window ending at the current timestep so queries
                // succeed immediately
                if let Some(current) = self.current_timestep {
                    let start = current.saturating_sub(window_size as u64 - 1);
                    for t in start..=current {
                        hist.push_frame(t, RoaringBitmap::new());
                    }
                }
                self.tracked.insert(cortical_idx, hist);
            }
        }

        Ok(())
    }

    pub fn untrack_area(&mut self, cortical_idx: u32) -> bool {
        self.tracked.remove(&cortical_idx).is_some()
    }

    pub fn get_tracked_window(&self, cortical_idx: u32) -> Result<usize, FireLedgerError> {
        self.tracked
            .get(&cortical_idx)
            .map(|h| h.window_size)
            .ok_or(FireLedgerError::AreaNotTracked { cortical_idx })
    }

    /// Tracked windows (sorted for deterministic output).
    pub fn get_tracked_windows(&self) -> Vec<(u32, usize)> {
        let mut out: Vec<(u32, usize)> = self
            .tracked
            .iter()
            .map(|(&idx, hist)| (idx, hist.window_size))
            .collect();
        out.sort_unstable_by_key(|(idx, _)| *idx);
        out
    }

    /// Archive firing data for a burst.
    ///
    /// Timesteps must be strictly increasing; skipped timesteps become empty frames.
    pub fn archive_burst(&mut self, timestep: u64, fire_queue: &FireQueue) -> Result<(), FireLedgerError> {
        if let Some(current) = self.current_timestep {
            if timestep <= current {
                return Err(FireLedgerError::NonMonotonicTimestep {
                    current,
                    requested: timestep,
                });
            }
            if timestep > current + 1 {
                self.ring.fill_gap(current, timestep);
                for hist in self.tracked.values_mut() {
                    hist.fill_gap(current, timestep);
                }
            }
        }

        let all: RoaringBitmap = fire_queue.iter().map(|n| n.neuron_id.0).collect();
        self.ring.push_frame(timestep, all);

        for (&cortical_idx, hist) in self.tracked.iter_mut() {
            let bitmap: RoaringBitmap = fire_queue
                .get_area_neurons(cortical_idx)
                .map(|neurons| neurons.iter().map(|n| n.neuron_id.0).collect())
                .unwrap_or_default();
            hist.push_frame(timestep, bitmap);
        }

        self.current_timestep = Some(timestep);
        Ok(())
    }

    /// Get a dense, burst-aligned window of bitmaps for a tracked area.
    ///
    /// Returns exactly `depth` frames covering `[end_timestep - depth + 1 .. end_timestep]`.
    pub fn get_dense_window_bitmaps(
        &self,
        cortical_idx: u32,
        end_timestep: u64,
        depth: usize,
    ) -> Result<Vec<(u64, RoaringBitmap)>, FireLedgerError> {
        if depth == 0 {
            return Err(FireLedgerError::InvalidDepth);
        }
        if self.current_timestep.map_or(true, |current| end_timestep > current) {
            return Err(FireLedgerError::EndTimestepInFuture {
                end_timestep,
                current_timestep: self.current_timestep,
            });
        }

        let hist = self
            .tracked
            .get(&cortical_idx)
            .ok_or(FireLedgerError::AreaNotTracked { cortical_idx })?;

        if depth > hist.window_size {
            return Err(FireLedgerError::DepthExceedsWindow {
                cortical_idx,
                depth,
                window_size: hist.window_size,
            });
        }

        let start = end_timestep.saturating_sub(depth as u64).saturating_add(1);
        let insufficient = |have_start, have_end| FireLedgerError::InsufficientHistory {
            cortical_idx,
            start,
            end: end_timestep,
            have_start,
            have_end,
        };
        let (have_start, have_end) = hist.range_bounds().ok_or_else(|| insufficient(0, 0))?;

        // A window reaching before timestep 0 can never be satisfied
        if end_timestep + 1 < depth as u64 || start < have_start || end_timestep > have_end {
            return Err(insufficient(have_start, have_end));
        }

        let start_idx = (start - have_start) as usize;
        Ok(hist.frames.range(start_idx..start_idx + depth).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fire_structures::{FireQueue, FiringNeuron};
    use feagi_npu_neural::types::NeuronId;

    fn queue(fired: &[(u32, u32)]) -> FireQueue {
        let mut fq = FireQueue::new();
        for &(id, area) in fired {
            fq.add_neuron(FiringNeuron {
                neuron_id: NeuronId(id),
                membrane_potential: 1.0,
                cortical_idx: area,
                x: 0,
                y: 0,
                z: 0,
            });
        }
        fq
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert_eq!(FireLedger::new(0).unwrap_err(), FireLedgerError::InvalidDepth);
    }

    #[test]
    fn test_ring_is_bounded() {
        let mut ledger = FireLedger::new(3).unwrap();
        for t in 0..10u64 {
            ledger.archive_burst(t, &queue(&[(t as u32, 1)])).unwrap();
        }
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.depth(), 3);
        let frames = ledger.recent_frames(10);
        assert_eq!(frames.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![7, 8, 9]);
        assert!(ledger.fired_at(9).unwrap().contains(9));
        assert!(ledger.fired_at(6).is_none());
        assert_eq!(ledger.recent_frames(1)[0].0, 9);
    }

    #[test]
    fn test_timestep_must_increase() {
        let mut ledger = FireLedger::new(4).unwrap();
        ledger.archive_burst(0, &FireQueue::new()).unwrap();
        assert_eq!(
            ledger.archive_burst(0, &FireQueue::new()).unwrap_err(),
            FireLedgerError::NonMonotonicTimestep {
                current: 0,
                requested: 0
            }
        );
    }

    #[test]
    fn test_dense_history_includes_silence() {
        let mut ledger = FireLedger::new(16).unwrap();
        ledger.track_area(1, 5).unwrap();

        ledger.archive_burst(1, &queue(&[(100, 1), (200, 1), (300, 2)])).unwrap();
        ledger.archive_burst(2, &FireQueue::new()).unwrap();
        ledger.archive_burst(3, &queue(&[(200, 1)])).unwrap();

        let window = ledger.get_dense_window_bitmaps(1, 3, 3).unwrap();
        assert_eq!(window.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(window[0].1.len(), 2);
        assert_eq!(window[1].1.len(), 0);
        assert_eq!(window[2].1.len(), 1);
        // Ring sees every area
        assert_eq!(ledger.fired_at(1).unwrap().len(), 3);
    }

    #[test]
    fn test_gap_fill_with_empty_frames() {
        let mut ledger = FireLedger::new(16).unwrap();
        ledger.track_area(1, 5).unwrap();

        ledger.archive_burst(1, &queue(&[(1, 1)])).unwrap();
        ledger.archive_burst(4, &FireQueue::new()).unwrap();

        let window = ledger.get_dense_window_bitmaps(1, 4, 4).unwrap();
        assert_eq!(
            window.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(window[1].1.len(), 0);
        assert_eq!(window[2].1.len(), 0);
        assert_eq!(ledger.len(), 4);
    }

    #[test]
    fn test_large_gap_only_materializes_window() {
        let mut ledger = FireLedger::new(4).unwrap();
        ledger.archive_burst(0, &FireQueue::new()).unwrap();
        ledger.archive_burst(1_000_000, &FireQueue::new()).unwrap();
        let frames = ledger.recent_frames(4);
        assert_eq!(
            frames.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            vec![999_997, 999_998, 999_999, 1_000_000]
        );
    }

    #[test]
    fn test_window_query_errors() {
        let mut ledger = FireLedger::new(8).unwrap();
        assert!(matches!(
            ledger.get_dense_window_bitmaps(1, 0, 1),
            Err(FireLedgerError::EndTimestepInFuture { .. })
        ));
        ledger.track_area(1, 3).unwrap();
        ledger.archive_burst(1, &FireQueue::new()).unwrap();

        assert!(matches!(
            ledger.get_dense_window_bitmaps(1, 1, 3),
            Err(FireLedgerError::InsufficientHistory { .. })
        ));
        assert!(matches!(
            ledger.get_dense_window_bitmaps(2, 1, 1),
            Err(FireLedgerError::AreaNotTracked { cortical_idx: 2 })
        ));
        assert!(matches!(
            ledger.get_dense_window_bitmaps(1, 1, 4),
            Err(FireLedgerError::DepthExceedsWindow { .. })
        ));
        assert!(matches!(
            ledger.get_dense_window_bitmaps(1, 5, 1),
            Err(FireLedgerError::EndTimestepInFuture { .. })
        ));
        assert!(ledger.untrack_area(1));
        assert!(!ledger.untrack_area(1));
    }

    #[test]
    fn test_track_after_start_prefills() {
        let mut ledger = FireLedger::new(8).unwrap();
        for t in 0..5 {
            ledger.archive_burst(t, &FireQueue::new()).unwrap();
        }
        ledger.track_area(3, 2).unwrap();
        let window = ledger.get_dense_window_bitmaps(3, 4, 2).unwrap();
        assert_eq!(window.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(ledger.get_tracked_windows(), vec![(3, 2)]);
    }
}
