//! OS primitives consumed by the profiler and the sampler.

use std::io;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use sysinfo::System;

/// Static hardware facts as reported by the host.
///
/// Implementations report zero when a value is unknown; the profiler turns
/// zeros into conservative fallbacks.
#[cfg_attr(test, automock)]
pub trait HardwareQuery: Send + Sync {
    /// Logical core count.
    fn cpu_cores(&self) -> usize;

    fn total_memory_bytes(&self) -> u64;

    /// Architecture identifier, e.g. `aarch64`, `arm64`, `x86_64`.
    fn architecture(&self) -> String;

    /// Operating system family, e.g. `macos`, `linux`.
    fn platform(&self) -> String;
}

/// Cumulative CPU time counters, in scheduler ticks, since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
}

impl CpuTicks {
    pub fn busy(&self) -> u64 {
        self.user.saturating_add(self.system).saturating_add(self.nice)
    }
}

/// Cumulative bytes paged in from and out to disk since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingCounters {
    pub paged_in_bytes: u64,
    pub paged_out_bytes: u64,
}

/// Live counters read on every sample.
///
/// Any read may fail; the sampler treats a failure as "no data" for that
/// sample rather than an error.
#[cfg_attr(test, automock)]
pub trait ResourceCounters: Send {
    fn cpu_ticks(&mut self) -> io::Result<CpuTicks>;

    fn paging(&mut self) -> io::Result<PagingCounters>;

    fn memory_used_bytes(&mut self) -> io::Result<u64>;
}

/// `sysinfo`-backed hardware query.
pub struct SystemHardware {
    system: Mutex<System>,
}

impl SystemHardware {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareQuery for SystemHardware {
    fn cpu_cores(&self) -> usize {
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        system.cpus().len()
    }

    fn total_memory_bytes(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.total_memory()
    }

    fn architecture(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    fn platform(&self) -> String {
        std::env::consts::OS.to_string()
    }
}

/// Host counters: `/proc` for CPU ticks and paging on Linux, `sysinfo` for
/// memory everywhere. Tick and paging reads report `Unsupported` elsewhere.
pub struct SystemCounters {
    system: System,
}

impl SystemCounters {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCounters for SystemCounters {
    fn cpu_ticks(&mut self) -> io::Result<CpuTicks> {
        read_cpu_ticks()
    }

    fn paging(&mut self) -> io::Result<PagingCounters> {
        read_paging()
    }

    fn memory_used_bytes(&mut self) -> io::Result<u64> {
        self.system.refresh_memory();
        Ok(self.system.used_memory())
    }
}

#[cfg(target_os = "linux")]
fn read_cpu_ticks() -> io::Result<CpuTicks> {
    let stat = std::fs::read_to_string("/proc/stat")?;
    parse_proc_stat(&stat)
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_ticks() -> io::Result<CpuTicks> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "cpu tick counters unavailable"))
}

#[cfg(target_os = "linux")]
fn read_paging() -> io::Result<PagingCounters> {
    let vmstat = std::fs::read_to_string("/proc/vmstat")?;
    parse_proc_vmstat(&vmstat)
}

#[cfg(not(target_os = "linux"))]
fn read_paging() -> io::Result<PagingCounters> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "paging counters unavailable"))
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Parses the aggregate `cpu` line of `/proc/stat`:
/// `cpu  user nice system idle iowait irq softirq ...`
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_proc_stat(stat: &str) -> io::Result<CpuTicks> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| invalid("missing aggregate cpu line"))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(4)
        .map(|f| f.parse::<u64>().map_err(|_| invalid("non-numeric cpu field")))
        .collect::<io::Result<_>>()?;

    if fields.len() < 4 {
        return Err(invalid("truncated cpu line"));
    }

    Ok(CpuTicks {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
    })
}

/// Parses `pgpgin`/`pgpgout` from `/proc/vmstat`. The kernel reports both in KiB.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_proc_vmstat(vmstat: &str) -> io::Result<PagingCounters> {
    let mut paged_in = None;
    let mut paged_out = None;

    for line in vmstat.lines() {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("pgpgin"), Some(v)) => paged_in = v.parse::<u64>().ok(),
            (Some("pgpgout"), Some(v)) => paged_out = v.parse::<u64>().ok(),
            _ => {}
        }
    }

    match (paged_in, paged_out) {
        (Some(kib_in), Some(kib_out)) => Ok(PagingCounters {
            paged_in_bytes: kib_in.saturating_mul(1024),
            paged_out_bytes: kib_out.saturating_mul(1024),
        }),
        _ => Err(invalid("missing pgpgin/pgpgout")),
    }
}
