use serde::Serialize;
use tracing::trace;

use super::CpuTicks;
use super::PagingCounters;
use super::ResourceCounters;
use super::SystemCounters;

/// Host load since the previous sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    /// Busy share of CPU time over the sampling window, within `[0, 1]`
    pub cpu_utilization: f64,
    pub memory_used_bytes: u64,
    pub disk_read_bytes_delta: u64,
    pub disk_write_bytes_delta: u64,
}

/// Stateful load sampler.
///
/// Each `snapshot()` reports deltas against the counters read by the previous
/// call and then moves the baseline forward. The baseline is primed at
/// construction so the first snapshot covers only the time since `new`.
/// Counter resets or wraparound clamp the affected delta to zero.
pub struct ResourceSampler {
    counters: Box<dyn ResourceCounters>,
    last_ticks: Option<CpuTicks>,
    last_paging: Option<PagingCounters>,
}

impl std::fmt::Debug for ResourceSampler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ResourceSampler")
            .field("last_ticks", &self.last_ticks)
            .field("last_paging", &self.last_paging)
            .finish_non_exhaustive()
    }
}

impl ResourceSampler {
    pub fn new(mut counters: Box<dyn ResourceCounters>) -> Self {
        let last_ticks = counters.cpu_ticks().ok();
        let last_paging = counters.paging().ok();
        trace!(?last_ticks, ?last_paging, "sampler primed");
        Self {
            counters,
            last_ticks,
            last_paging,
        }
    }

    /// Sampler over the live host.
    pub fn system() -> Self {
        Self::new(Box::new(SystemCounters::new()))
    }

    pub fn snapshot(&mut self) -> ResourceSnapshot {
        let cpu_utilization = match self.counters.cpu_ticks() {
            Ok(now) => {
                let utilization = self.last_ticks.map(|prev| utilization(&prev, &now)).unwrap_or(0.0);
                self.last_ticks = Some(now);
                utilization
            }
            Err(e) => {
                trace!("cpu tick read failed: {}", e);
                0.0
            }
        };

        let (disk_read_bytes_delta, disk_write_bytes_delta) = match self.counters.paging() {
            Ok(now) => {
                let deltas = self
                    .last_paging
                    .map(|prev| {
                        (
                            now.paged_in_bytes.saturating_sub(prev.paged_in_bytes),
                            now.paged_out_bytes.saturating_sub(prev.paged_out_bytes),
                        )
                    })
                    .unwrap_or((0, 0));
                self.last_paging = Some(now);
                deltas
            }
            Err(e) => {
                trace!("paging read failed: {}", e);
                (0, 0)
            }
        };

        let memory_used_bytes = self.counters.memory_used_bytes().unwrap_or(0);

        ResourceSnapshot {
            cpu_utilization,
            memory_used_bytes,
            disk_read_bytes_delta,
            disk_write_bytes_delta,
        }
    }
}

/// `(user + system + nice) / (user + system + nice + idle)` over the tick delta.
/// A zero delta (two reads within one tick) reports 0.
pub(crate) fn utilization(
    prev: &CpuTicks,
    now: &CpuTicks,
) -> f64 {
    let busy = now.busy().saturating_sub(prev.busy());
    let idle = now.idle.saturating_sub(prev.idle);
    let total = busy.saturating_add(idle);
    if total == 0 {
        return 0.0;
    }
    (busy as f64 / total as f64).clamp(0.0, 1.0)
}
