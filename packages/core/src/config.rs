//! Dispensing policy configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing and outcome policy for the simulated dispenser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenseConfig {
    /// Delay before the dispenser acknowledges a command (D1).
    pub command_delay: Duration,
    /// Time spent physically dispensing, after acknowledgement (D2).
    pub dispense_delay: Duration,
    /// Pause between two prescriptions of the same job (D3).
    pub settle_delay: Duration,
    /// Chance that a single dispense succeeds (P).
    pub success_probability: f64,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for DispenseConfig {
    fn default() -> Self {
        Self {
            command_delay: Duration::from_millis(1000),
            dispense_delay: Duration::from_millis(2000),
            settle_delay: Duration::from_millis(1000),
            success_probability: 0.90,
            event_capacity: 1024,
        }
    }
}

impl DispenseConfig {
    /// Build a config from environment variables.
    ///
    /// Unset or empty variables keep their defaults:
    /// - `DISPENSE_COMMAND_DELAY_MS` (default: 1000)
    /// - `DISPENSE_DISPENSE_DELAY_MS` (default: 2000)
    /// - `DISPENSE_SETTLE_DELAY_MS` (default: 1000)
    /// - `DISPENSE_SUCCESS_PROBABILITY` (0.0 to 1.0, default: 0.9)
    /// - `DISPENSE_EVENT_CAPACITY` (default: 1024)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| lookup(name).and_then(non_empty);

        let millis = |name: &str, default: Duration| -> Result<Duration, ConfigError> {
            match read(name) {
                Some(v) => v.parse::<u64>().map(Duration::from_millis).map_err(|e| {
                    ConfigError::InvalidConfig(format!("{name}={v} is not a millisecond count: {e}"))
                }),
                None => Ok(default),
            }
        };

        let success_probability = match read("DISPENSE_SUCCESS_PROBABILITY") {
            Some(v) => v.parse::<f64>().map_err(|e| {
                ConfigError::InvalidConfig(format!(
                    "DISPENSE_SUCCESS_PROBABILITY={v} is not a number: {e}"
                ))
            })?,
            None => defaults.success_probability,
        };

        let event_capacity = match read("DISPENSE_EVENT_CAPACITY") {
            Some(v) => v.parse::<usize>().map_err(|e| {
                ConfigError::InvalidConfig(format!("DISPENSE_EVENT_CAPACITY={v} is invalid: {e}"))
            })?,
            None => defaults.event_capacity,
        };

        let cfg = Self {
            command_delay: millis("DISPENSE_COMMAND_DELAY_MS", defaults.command_delay)?,
            dispense_delay: millis("DISPENSE_DISPENSE_DELAY_MS", defaults.dispense_delay)?,
            settle_delay: millis("DISPENSE_SETTLE_DELAY_MS", defaults.settle_delay)?,
            success_probability,
            event_capacity,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.success_probability) {
            return Err(ConfigError::InvalidConfig(format!(
                "success probability {} is outside 0.0..=1.0",
                self.success_probability
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "event capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Set all three phase delays.
    pub fn with_delays(mut self, command: Duration, dispense: Duration, settle: Duration) -> Self {
        self.command_delay = command;
        self.dispense_delay = dispense;
        self.settle_delay = settle;
        self
    }

    /// Set the success probability.
    pub fn with_success_probability(mut self, probability: f64) -> Self {
        self.success_probability = probability;
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
