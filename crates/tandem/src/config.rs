//! # Host Configuration
//!
//! One TOML file, read once at startup:
//!
//! ```toml
//! [channel]
//! initial_capacity = 256
//!
//! [driver]
//! fixed_hz = 60
//! max_fixed_steps_per_frame = 8
//! max_frame_delta_ms = 100
//!
//! [scheduler]
//! worker_threads = 4
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_core::ChannelConfig;

use crate::error::{HostError, HostResult};

/// Cadence of the two loops.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Fixed-rate loop frequency.
    pub fixed_hz: u32,
    /// Cap on fixed steps run inside one frame (spiral-of-death guard).
    pub max_fixed_steps_per_frame: u32,
    /// Frame deltas above this are clamped (e.g. after a debugger pause).
    pub max_frame_delta_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            fixed_hz: 60,
            max_fixed_steps_per_frame: 8,
            max_frame_delta_ms: 100,
        }
    }
}

impl DriverConfig {
    /// Duration of one fixed step.
    #[must_use]
    pub fn fixed_step(&self) -> Duration {
        Duration::from_secs(1) / self.fixed_hz.max(1)
    }

    /// Largest frame delta the driver accepts.
    #[must_use]
    pub const fn max_frame_delta(&self) -> Duration {
        Duration::from_millis(self.max_frame_delta_ms)
    }

    /// Checks that the cadence is usable.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] naming the first invalid value.
    pub fn validate(&self) -> HostResult<()> {
        if self.fixed_hz == 0 {
            return Err(HostError::Config("driver.fixed_hz must be greater than zero".into()));
        }
        if self.max_fixed_steps_per_frame == 0 {
            return Err(HostError::Config(
                "driver.max_fixed_steps_per_frame must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Worker pool sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Number of worker threads running commit jobs.
    pub worker_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { worker_threads: 4 }
    }
}

impl SchedulerConfig {
    /// Checks that the pool has at least one worker.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] for a zero-sized pool.
    pub fn validate(&self) -> HostResult<()> {
        if self.worker_threads == 0 {
            return Err(HostError::Config(
                "scheduler.worker_threads must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Complete host configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TandemConfig {
    /// Channel sizing.
    pub channel: ChannelConfig,
    /// Loop cadence.
    pub driver: DriverConfig,
    /// Worker pool.
    pub scheduler: SchedulerConfig,
}

impl TandemConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] for malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> HostResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| HostError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> HostResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| HostError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first error found in any section.
    pub fn validate(&self) -> HostResult<()> {
        self.channel.validate()?;
        self.driver.validate()?;
        self.scheduler.validate()
    }
}
