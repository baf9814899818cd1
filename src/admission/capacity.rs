use crate::AdmissionConfig;
use crate::HardwareProfile;

/// Constants of the static capacity formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPolicy {
    pub reserved_memory_gib: u64,
    pub per_operation_memory_gib: u64,
    pub per_core_factor: usize,
    pub hard_cap: usize,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            reserved_memory_gib: 8,
            per_operation_memory_gib: 2,
            per_core_factor: 2,
            hard_cap: 12,
        }
    }
}

impl From<&AdmissionConfig> for CapacityPolicy {
    fn from(config: &AdmissionConfig) -> Self {
        Self {
            reserved_memory_gib: config.reserved_memory_gib,
            per_operation_memory_gib: config.per_operation_memory_gib,
            per_core_factor: config.per_core_factor,
            hard_cap: config.hard_cap,
        }
    }
}

impl CapacityPolicy {
    /// `min(memory_limit, cpu_limit, hard_cap)`, never below 1.
    ///
    /// Monotonic non-decreasing in both inputs.
    pub fn optimal_count(
        &self,
        memory_gib: u64,
        cores: usize,
    ) -> usize {
        let memory_limit = (memory_gib.saturating_sub(self.reserved_memory_gib)
            / self.per_operation_memory_gib.max(1))
        .max(1);
        let memory_limit = usize::try_from(memory_limit).unwrap_or(usize::MAX);
        let cpu_limit = cores.saturating_mul(self.per_core_factor);

        memory_limit.min(cpu_limit).min(self.hard_cap).max(1)
    }

    pub fn for_profile(
        &self,
        profile: &HardwareProfile,
    ) -> usize {
        self.optimal_count(profile.total_memory_gib(), profile.cpu_cores)
    }
}

/// How many simulators (or other heavyweight operations) a machine with
/// `memory_gib` of RAM and `cores` cores should run at once, using the default
/// constants: 8 GiB reserved, 2 GiB per operation, 2 per core, cap 12.
///
/// Pure and independent of live load.
///
/// ```
/// use devgate::calculate_optimal_simulator_count;
///
/// assert_eq!(calculate_optimal_simulator_count(36, 12), 12);
/// assert_eq!(calculate_optimal_simulator_count(16, 4), 4);
/// ```
pub fn calculate_optimal_simulator_count(
    memory_gib: u64,
    cores: usize,
) -> usize {
    CapacityPolicy::default().optimal_count(memory_gib, cores)
}
