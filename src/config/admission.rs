use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// What happens to a request that arrives while every slot is taken.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Queue in FIFO order until a slot frees or `wait_timeout_ms` elapses
    #[default]
    Block,
    /// Fail with `ResourceExhausted` immediately
    Reject,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdmissionConfig {
    #[serde(default)]
    pub policy: AdmissionPolicy,

    /// Upper bound on how long `execute` waits for a slot and for host load to
    /// drop. 0 waits forever.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Memory held back for the OS and the host process.
    #[serde(default = "default_reserved_memory_gib")]
    pub reserved_memory_gib: u64,

    /// Estimated footprint of one operation.
    #[serde(default = "default_per_operation_memory_gib")]
    pub per_operation_memory_gib: u64,

    /// Operations allowed per core; one operation is rarely CPU-bound for its
    /// whole lifetime.
    #[serde(default = "default_per_core_factor")]
    pub per_core_factor: usize,

    /// Absolute ceiling regardless of what the hardware reports.
    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,

    /// Defer admissions while the host is loaded by work outside this process.
    #[serde(default = "default_dynamic_admission")]
    pub dynamic_admission: bool,

    /// CPU utilization (0..=1) above which new admissions are deferred.
    #[serde(default = "default_cpu_high_water")]
    pub cpu_high_water: f64,

    /// Fraction of total memory in use above which new admissions are deferred.
    #[serde(default = "default_memory_high_water_ratio")]
    pub memory_high_water_ratio: f64,

    /// How often a deferred request re-checks host load.
    #[serde(default = "default_load_poll_interval_ms")]
    pub load_poll_interval_ms: u64,

    /// Minimum age of the cached load snapshot before the sampler is read again.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            policy: AdmissionPolicy::default(),
            wait_timeout_ms: default_wait_timeout_ms(),
            reserved_memory_gib: default_reserved_memory_gib(),
            per_operation_memory_gib: default_per_operation_memory_gib(),
            per_core_factor: default_per_core_factor(),
            hard_cap: default_hard_cap(),
            dynamic_admission: default_dynamic_admission(),
            cpu_high_water: default_cpu_high_water(),
            memory_high_water_ratio: default_memory_high_water_ratio(),
            load_poll_interval_ms: default_load_poll_interval_ms(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl AdmissionConfig {
    /// Validates admission configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when:
    /// - a capacity divisor or ceiling is zero
    /// - a high-water mark is outside (0, 1]
    /// - the load poll interval is zero while dynamic admission is on
    pub fn validate(&self) -> Result<()> {
        if self.per_operation_memory_gib == 0 {
            return Err(Error::InvalidConfig(
                "per_operation_memory_gib must be greater than 0".into(),
            ));
        }

        if self.per_core_factor == 0 {
            return Err(Error::InvalidConfig("per_core_factor must be greater than 0".into()));
        }

        if self.hard_cap == 0 {
            return Err(Error::InvalidConfig("hard_cap must be greater than 0".into()));
        }

        if !(self.cpu_high_water > 0.0 && self.cpu_high_water <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "cpu_high_water {} must be within (0, 1]",
                self.cpu_high_water
            )));
        }

        if !(self.memory_high_water_ratio > 0.0 && self.memory_high_water_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "memory_high_water_ratio {} must be within (0, 1]",
                self.memory_high_water_ratio
            )));
        }

        if self.dynamic_admission && self.load_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "load_poll_interval_ms must be greater than 0 when dynamic_admission is enabled"
                    .into(),
            ));
        }

        Ok(())
    }

    /// `None` means wait without bound.
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }

    pub fn load_poll_interval(&self) -> Duration {
        Duration::from_millis(self.load_poll_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

// in ms
fn default_wait_timeout_ms() -> u64 {
    120_000
}
fn default_reserved_memory_gib() -> u64 {
    8
}
fn default_per_operation_memory_gib() -> u64 {
    2
}
fn default_per_core_factor() -> usize {
    2
}
fn default_hard_cap() -> usize {
    12
}
fn default_dynamic_admission() -> bool {
    true
}
fn default_cpu_high_water() -> f64 {
    0.90
}
fn default_memory_high_water_ratio() -> f64 {
    0.95
}
fn default_load_poll_interval_ms() -> u64 {
    500
}
fn default_sample_interval_ms() -> u64 {
    250
}
