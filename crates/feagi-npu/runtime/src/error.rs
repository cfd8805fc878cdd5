// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime error types

use feagi_npu_neural::FeagiError;
use std::fmt;
use thiserror::Error;

/// Which id space an [`RuntimeError::InvalidId`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Neuron,
    Synapse,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Neuron => write!(f, "neuron"),
            IdKind::Synapse => write!(f, "synapse"),
        }
    }
}

/// Runtime errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Insertion would exceed the store's fixed capacity; nothing was inserted
    #[error("{resource} capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded {
        resource: &'static str,
        requested: usize,
        available: usize,
    },

    /// Id is out of range or refers to a deleted slot
    #[error("invalid {kind} id {id}")]
    InvalidId { kind: IdKind, id: u32 },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Parallel input slices of a batch call disagree in length
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl From<RuntimeError> for FeagiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::CapacityExceeded {
                resource,
                requested,
                available,
            } => FeagiError::CapacityExceeded {
                resource,
                requested,
                available,
            },
            RuntimeError::InvalidId {
                kind: IdKind::Neuron,
                id,
            } => FeagiError::InvalidNeuronId(id),
            RuntimeError::InvalidId {
                kind: IdKind::Synapse,
                id,
            } => FeagiError::InvalidSynapseId(id),
            RuntimeError::InvalidParameters(msg) => FeagiError::InvalidParameter(msg),
            RuntimeError::DimensionMismatch { expected, actual } => {
                FeagiError::ArraySizeMismatch { expected, actual }
            }
        }
    }
}

impl From<FeagiError> for RuntimeError {
    fn from(err: FeagiError) -> Self {
        RuntimeError::InvalidParameters(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_onto_core_error() {
        let err: FeagiError = RuntimeError::InvalidId {
            kind: IdKind::Synapse,
            id: 9,
        }
        .into();
        assert_eq!(err, FeagiError::InvalidSynapseId(9));

        let err: FeagiError = RuntimeError::CapacityExceeded {
            resource: "neuron",
            requested: 3,
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            FeagiError::CapacityExceeded {
                requested: 3,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_display() {
        let err = RuntimeError::InvalidId {
            kind: IdKind::Neuron,
            id: 4,
        };
        assert_eq!(err.to_string(), "invalid neuron id 4");
    }
}
