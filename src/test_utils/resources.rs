use std::collections::VecDeque;
use std::io;

use crate::constants::GIB;
use crate::CpuTicks;
use crate::HardwareProfile;
use crate::MockResourceCounters;
use crate::PagingCounters;
use crate::ResourceSampler;

pub fn test_profile(
    cpu_cores: usize,
    memory_gib: u64,
) -> HardwareProfile {
    HardwareProfile {
        cpu_cores,
        total_memory_bytes: memory_gib * GIB,
        architecture: "x86_64".to_string(),
        is_apple_silicon_class: false,
        is_high_memory_variant: false,
    }
}

pub fn unavailable() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "not here")
}

/// Counters that replay the given reads in order, then fail.
pub fn scripted_counters(
    tick_reads: Vec<io::Result<CpuTicks>>,
    paging_reads: Vec<io::Result<PagingCounters>>,
    memory_used: u64,
) -> Box<MockResourceCounters> {
    let mut tick_reads = VecDeque::from(tick_reads);
    let mut paging_reads = VecDeque::from(paging_reads);

    let mut counters = MockResourceCounters::new();
    counters
        .expect_cpu_ticks()
        .returning(move || tick_reads.pop_front().unwrap_or_else(|| Err(unavailable())));
    counters
        .expect_paging()
        .returning(move || paging_reads.pop_front().unwrap_or_else(|| Err(unavailable())));
    counters.expect_memory_used_bytes().returning(move || Ok(memory_used));
    Box::new(counters)
}

/// Counters reporting a steady `busy_percent` CPU load and fixed memory use,
/// for as many reads as asked.
pub fn steady_counters(
    busy_percent: u64,
    memory_used: u64,
) -> Box<MockResourceCounters> {
    let busy_percent = busy_percent.min(100);
    let mut reads = 0u64;

    let mut counters = MockResourceCounters::new();
    counters.expect_cpu_ticks().returning(move || {
        reads += 1;
        Ok(CpuTicks {
            user: reads * busy_percent,
            nice: 0,
            system: 0,
            idle: reads * (100 - busy_percent),
        })
    });
    counters.expect_paging().returning(|| Ok(PagingCounters::default()));
    counters.expect_memory_used_bytes().returning(move || Ok(memory_used));
    Box::new(counters)
}

pub fn steady_sampler(
    busy_percent: u64,
    memory_used: u64,
) -> ResourceSampler {
    ResourceSampler::new(steady_counters(busy_percent, memory_used))
}
