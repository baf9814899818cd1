use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::HardwareQuery;
use super::SystemHardware;
use crate::constants::FALLBACK_MEMORY_BYTES;
use crate::constants::GIB;
use crate::constants::HIGH_MEMORY_VARIANT_MIN_CORES;
use crate::constants::HIGH_MEMORY_VARIANT_MIN_GIB;

/// Static capacity of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareProfile {
    pub cpu_cores: usize,
    pub total_memory_bytes: u64,
    /// Raw architecture identifier the silicon flags were derived from
    pub architecture: String,
    pub is_apple_silicon_class: bool,
    /// Best-effort guess at a Max/Ultra-class part (Apple Silicon with at
    /// least 32 GiB and 10 cores). It is not a chip identification: a binned
    /// Pro with upgraded memory can match and a future base part may not.
    pub is_high_memory_variant: bool,
}

impl HardwareProfile {
    /// Whole GiB of memory, rounded down.
    pub fn total_memory_gib(&self) -> u64 {
        self.total_memory_bytes / GIB
    }
}

/// One-shot hardware queries.
///
/// `profile()` never fails: when the underlying query reports nothing useful
/// it falls back to the OS-reported parallelism and a conservative memory
/// size.
#[derive(Clone)]
pub struct HardwareProfiler {
    query: Arc<dyn HardwareQuery>,
}

impl HardwareProfiler {
    pub fn new(query: Arc<dyn HardwareQuery>) -> Self {
        Self { query }
    }

    /// Profiler over the live host.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemHardware::new()))
    }

    pub fn profile(&self) -> HardwareProfile {
        let mut cpu_cores = self.query.cpu_cores();
        if cpu_cores == 0 {
            cpu_cores = std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1);
            debug!(cpu_cores, "core count unavailable, using OS parallelism");
        }

        let mut total_memory_bytes = self.query.total_memory_bytes();
        if total_memory_bytes == 0 {
            total_memory_bytes = FALLBACK_MEMORY_BYTES;
            debug!(total_memory_bytes, "memory size unavailable, assuming fallback");
        }

        let architecture = self.query.architecture();
        let is_apple_silicon_class =
            is_apple_silicon_class(&architecture, &self.query.platform());
        let is_high_memory_variant = is_apple_silicon_class
            && total_memory_bytes >= HIGH_MEMORY_VARIANT_MIN_GIB * GIB
            && cpu_cores >= HIGH_MEMORY_VARIANT_MIN_CORES;

        let profile = HardwareProfile {
            cpu_cores,
            total_memory_bytes,
            architecture,
            is_apple_silicon_class,
            is_high_memory_variant,
        };
        debug!(?profile, "hardware profiled");
        profile
    }
}

fn is_apple_silicon_class(
    architecture: &str,
    platform: &str,
) -> bool {
    let arch = architecture.to_ascii_lowercase();
    let arm = matches!(arch.as_str(), "aarch64" | "arm64" | "arm64e");
    arm && matches!(platform.to_ascii_lowercase().as_str(), "macos" | "darwin")
}
