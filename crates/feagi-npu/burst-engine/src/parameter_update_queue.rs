// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Asynchronous parameter update queue for cortical areas.

Updates are pushed from any thread and applied by the burst thread between bursts,
so a parameter change never waits on (or stalls) a running burst.
*/

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use feagi_npu_neural::types::FeagiError;

/// Per-area neuron parameter that can be changed while the network runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeuronParameter {
    Threshold,
    /// `null` removes the upper bound
    ThresholdLimit,
    Leak,
    RefractoryPeriod,
    Excitability,
    ConsecutiveFireLimit,
}

impl fmt::Display for NeuronParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NeuronParameter::Threshold => "threshold",
            NeuronParameter::ThresholdLimit => "threshold_limit",
            NeuronParameter::Leak => "leak",
            NeuronParameter::RefractoryPeriod => "refractory_period",
            NeuronParameter::Excitability => "excitability",
            NeuronParameter::ConsecutiveFireLimit => "consecutive_fire_limit",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for NeuronParameter {
    type Err = FeagiError;

    /// Accepts the canonical names plus the genome aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threshold" | "firing_threshold" | "neuron_fire_threshold" => Ok(Self::Threshold),
            "threshold_limit" | "firing_threshold_limit" | "neuron_firing_threshold_limit" => {
                Ok(Self::ThresholdLimit)
            }
            "leak" | "leak_coefficient" | "neuron_leak_coefficient" => Ok(Self::Leak),
            "refractory_period" | "neuron_refractory_period" | "refrac" => {
                Ok(Self::RefractoryPeriod)
            }
            "excitability" | "neuron_excitability" => Ok(Self::Excitability),
            "consecutive_fire_limit" | "consecutive_fire_cnt_max" | "consecutive_fire_count" => {
                Ok(Self::ConsecutiveFireLimit)
            }
            other => Err(FeagiError::InvalidParameter(format!(
                "unknown neuron parameter '{}'",
                other
            ))),
        }
    }
}

/// A single parameter update command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    /// Cortical area index
    pub cortical_idx: u32,
    pub parameter: NeuronParameter,
    /// New value (number, or `null` for an unbounded threshold limit)
    pub value: Value,
}

impl ParameterUpdate {
    pub fn new(cortical_idx: u32, parameter: NeuronParameter, value: impl Into<Value>) -> Self {
        Self {
            cortical_idx,
            parameter,
            value: value.into(),
        }
    }
}

/// Thread-safe queue for parameter updates
///
/// - API thread: pushes updates (short critical section on the queue only)
/// - Burst thread: drains between bursts, while it holds the NPU anyway
#[derive(Clone, Default)]
pub struct ParameterUpdateQueue {
    queue: Arc<Mutex<VecDeque<ParameterUpdate>>>,
}

impl ParameterUpdateQueue {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(100))),
        }
    }

    /// Push a parameter update (non-blocking, called from API thread)
    pub fn push(&self, update: ParameterUpdate) {
        self.queue.lock().push_back(update);
    }

    /// Drain all pending updates in arrival order
    pub fn drain_all(&self) -> Vec<ParameterUpdate> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drain_preserves_order_and_empties() {
        let queue = ParameterUpdateQueue::new();
        let producer = queue.clone();
        producer.push(ParameterUpdate::new(1, NeuronParameter::Threshold, 2.0));
        producer.push(ParameterUpdate::new(1, NeuronParameter::Leak, 0.5));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain_all();
        assert_eq!(drained[0].parameter, NeuronParameter::Threshold);
        assert_eq!(drained[1].value, json!(0.5));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_parameter_aliases() {
        assert_eq!(
            "firing_threshold".parse::<NeuronParameter>().unwrap(),
            NeuronParameter::Threshold
        );
        assert_eq!(
            "consecutive_fire_cnt_max".parse::<NeuronParameter>().unwrap(),
            NeuronParameter::ConsecutiveFireLimit
        );
        assert!("snooze_length".parse::<NeuronParameter>().is_err());
        assert_eq!(NeuronParameter::ThresholdLimit.to_string(), "threshold_limit");
    }

    #[test]
    fn test_update_serde_shape() {
        let update = ParameterUpdate::new(3, NeuronParameter::ThresholdLimit, Value::Null);
        let encoded = serde_json::to_value(&update).unwrap();
        assert_eq!(
            encoded,
            json!({"cortical_idx": 3, "parameter": "threshold_limit", "value": null})
        );
    }
}
