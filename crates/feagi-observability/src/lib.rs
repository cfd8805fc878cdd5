// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # feagi-observability
//!
//! Logging initialization shared by the FEAGI burst engine tools and tests.
//!
//! Provides consistent observability patterns across all FEAGI crates with
//! per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: daily rolling log files under a per-run folder (desktop only)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

// Re-export commonly used items
pub use cli::*;
pub use config::*;
pub use init::*;

/// Known FEAGI crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "feagi-npu-neural",
    "feagi-npu-runtime",
    "feagi-npu-burst-engine",
    "feagi-config",
    "feagi-observability",
];

/// Target used by per-neuron and per-synapse hot-path traces
pub const TRACE_TARGET: &str = "feagi-npu-trace";
