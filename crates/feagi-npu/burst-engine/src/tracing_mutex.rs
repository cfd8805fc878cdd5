// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Tracing RwLock wrapper around the shared NPU.
//!
//! The burst thread takes the write lock for propagation, dynamics and ledger archival;
//! observers take read locks between bursts. With the `npu-lock-tracing` feature every
//! acquisition logs its wait time and every release its hold time. Without the feature the
//! wrapper hands out plain `parking_lot` guards.

use parking_lot::RwLock;

#[cfg(not(feature = "npu-lock-tracing"))]
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "npu-lock-tracing")]
use std::thread;
#[cfg(feature = "npu-lock-tracing")]
use std::time::{Duration, Instant};
#[cfg(feature = "npu-lock-tracing")]
use tracing::{debug, warn};

/// Waits or holds above this are logged at warn level
#[cfg(feature = "npu-lock-tracing")]
const SLOW_LOCK_MS: u128 = 5;

pub struct TracingRwLock<T> {
    inner: RwLock<T>,
    name: &'static str,
}

impl<T> TracingRwLock<T> {
    /// `name` only shows up in lock traces
    pub fn new(value: T, name: &'static str) -> Self {
        Self {
            inner: RwLock::new(value),
            name,
        }
    }

    #[cfg(not(feature = "npu-lock-tracing"))]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    #[cfg(not(feature = "npu-lock-tracing"))]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    #[cfg(not(feature = "npu-lock-tracing"))]
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.inner.try_write()
    }

    #[cfg(feature = "npu-lock-tracing")]
    pub fn read(&self) -> traced::TracedGuard<parking_lot::RwLockReadGuard<'_, T>> {
        let start = Instant::now();
        let guard = self.inner.read();
        traced::TracedGuard::acquired(guard, self.name, "read", start.elapsed())
    }

    #[cfg(feature = "npu-lock-tracing")]
    pub fn write(&self) -> traced::TracedGuard<parking_lot::RwLockWriteGuard<'_, T>> {
        let start = Instant::now();
        let guard = self.inner.write();
        traced::TracedGuard::acquired(guard, self.name, "write", start.elapsed())
    }

    #[cfg(feature = "npu-lock-tracing")]
    pub fn try_write(&self) -> Option<traced::TracedGuard<parking_lot::RwLockWriteGuard<'_, T>>> {
        self.inner
            .try_write()
            .map(|guard| traced::TracedGuard::acquired(guard, self.name, "try_write", Duration::ZERO))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(feature = "npu-lock-tracing")]
pub mod traced {
    use super::*;
    use std::ops::{Deref, DerefMut};

    /// Guard that logs its hold time on release
    pub struct TracedGuard<G> {
        guard: G,
        name: &'static str,
        mode: &'static str,
        thread_id: thread::ThreadId,
        acquired_at: Instant,
    }

    impl<G> TracedGuard<G> {
        pub(super) fn acquired(
            guard: G,
            name: &'static str,
            mode: &'static str,
            wait: Duration,
        ) -> Self {
            let thread_id = thread::current().id();
            if wait.as_millis() > SLOW_LOCK_MS {
                warn!(
                    "[NPU-LOCK-TRACE] {}: {:?} acquired {} lock after {:.2}ms wait (SLOW)",
                    name,
                    thread_id,
                    mode,
                    wait.as_secs_f64() * 1000.0
                );
            } else {
                debug!(
                    "[NPU-LOCK-TRACE] {}: {:?} acquired {} lock ({:.2}ms wait)",
                    name,
                    thread_id,
                    mode,
                    wait.as_secs_f64() * 1000.0
                );
            }
            Self {
                guard,
                name,
                mode,
                thread_id,
                acquired_at: Instant::now(),
            }
        }
    }

    impl<G: Deref> Deref for TracedGuard<G> {
        type Target = G::Target;

        fn deref(&self) -> &Self::Target {
            &self.guard
        }
    }

    impl<G: DerefMut> DerefMut for TracedGuard<G> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.guard
        }
    }

    impl<G> Drop for TracedGuard<G> {
        fn drop(&mut self) {
            let held = self.acquired_at.elapsed();
            if held.as_millis() > SLOW_LOCK_MS {
                warn!(
                    "[NPU-LOCK-TRACE] {}: {:?} released {} lock (held {:.2}ms)",
                    self.name,
                    self.thread_id,
                    self.mode,
                    held.as_secs_f64() * 1000.0
                );
            } else {
                debug!(
                    "[NPU-LOCK-TRACE] {}: {:?} released {} lock (held {:.2}ms)",
                    self.name,
                    self.thread_id,
                    self.mode,
                    held.as_secs_f64() * 1000.0
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_readers_share_writer_excludes() {
        let lock = Arc::new(TracingRwLock::new(0u32, "test"));
        {
            let a = lock.read();
            let b = lock.read();
            assert_eq!(*a + *b, 0);
            assert!(lock.try_write().is_none());
        }
        *lock.write() += 7;
        assert_eq!(*lock.read(), 7);
        assert_eq!(lock.name(), "test");
    }

    #[test]
    fn test_write_across_threads() {
        let lock = Arc::new(TracingRwLock::new(Vec::new(), "vec"));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let lock = lock.clone();
                std::thread::spawn(move || lock.write().push(i))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let lock = Arc::try_unwrap(lock).ok().unwrap();
        let mut values = lock.into_inner();
        values.sort();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }
}
