// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for NPU operations

/// Error types for NPU operations
///
/// Quantization overflow is intentionally absent: out-of-range values are clamped
/// and logged, never reported as failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeagiError {
    #[error("Invalid neuron ID: {0}")]
    InvalidNeuronId(u32),

    #[error("Invalid synapse ID: {0}")]
    InvalidSynapseId(u32),

    #[error("{resource} capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded {
        resource: &'static str,
        requested: usize,
        available: usize,
    },

    #[error("Backend initialization failed: {0}")]
    BackendInitializationFailed(String),

    #[error("Array size mismatch: expected {expected}, got {actual}")]
    ArraySizeMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

pub type Result<T> = core::result::Result<T, FeagiError>;

pub type Error = FeagiError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_names_resource() {
        let err = FeagiError::CapacityExceeded {
            resource: "neuron",
            requested: 5,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "neuron capacity exceeded: requested 5, available 2"
        );
    }
}
