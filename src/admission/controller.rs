use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::sync::TryAcquireError;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::CapacityPolicy;
use super::OperationSlot;
use crate::metrics::ADMISSION_CAPACITY;
use crate::metrics::ADMISSION_DECISIONS;
use crate::metrics::ADMISSION_IN_FLIGHT;
use crate::AdmissionConfig;
use crate::AdmissionError;
use crate::AdmissionPolicy;
use crate::ExhaustionReason;
use crate::HardwareProfile;
use crate::HardwareProfiler;
use crate::ResourceSampler;
use crate::ResourceSnapshot;
use crate::Result;

/// Lifetime counters for one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub capacity: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub admitted: u64,
    pub rejected: u64,
}

/// Gates concurrent operations against hardware capacity and live host load.
///
/// The in-flight count is owned here and only moves on admit (after a permit
/// is granted) and on [`OperationSlot`] drop (before the permit returns), so
/// it can never exceed [`capacity`](Self::capacity).
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    config: AdmissionConfig,
    profile: HardwareProfile,
    load: Option<LoadGate>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: AtomicUsize,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("capacity", &self.capacity)
            .field("in_flight", &self.in_flight())
            .field("policy", &self.config.policy)
            .field("dynamic_admission", &self.load.is_some())
            .finish()
    }
}

impl AdmissionController {
    /// Controller with static capacity only; host load is not consulted until a
    /// sampler is attached with [`with_sampler`](Self::with_sampler).
    pub fn new(
        profile: HardwareProfile,
        config: AdmissionConfig,
    ) -> Self {
        let capacity = CapacityPolicy::from(&config).for_profile(&profile);
        ADMISSION_CAPACITY.set(capacity as i64);
        info!(
            capacity,
            cpu_cores = profile.cpu_cores,
            memory_gib = profile.total_memory_gib(),
            policy = ?config.policy,
            "admission controller ready"
        );

        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            config,
            profile,
            load: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Attaches a load sampler. Ignored when `dynamic_admission` is off.
    pub fn with_sampler(
        mut self,
        sampler: ResourceSampler,
    ) -> Self {
        if self.config.dynamic_admission {
            self.load = Some(LoadGate::new(sampler, &self.config, &self.profile));
        }
        self
    }

    /// Controller over the live host: profiles the hardware and samples its load.
    pub fn system(config: AdmissionConfig) -> Self {
        let profile = HardwareProfiler::system().profile();
        Self::new(profile, config).with_sampler(ResourceSampler::system())
    }

    /// Maximum number of operations admitted at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Slots free right now. Host load may still defer the next admission.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            capacity: self.capacity,
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Runs `operation` once admitted and releases its slot when it finishes.
    ///
    /// Under [`AdmissionPolicy::Block`] the caller queues in FIFO order until a
    /// slot frees and host load is under the high-water marks, bounded by
    /// `wait_timeout_ms`. Under [`AdmissionPolicy::Reject`] it fails at once.
    /// Either way a refusal is `AdmissionError::ResourceExhausted` and leaves
    /// the in-flight count untouched.
    ///
    /// The slot is released on success, on error values returned by the
    /// operation, on panic, and when the returned future is dropped mid-run.
    pub async fn execute<F, Fut, T>(
        &self,
        operation: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _slot = self.acquire().await?;
        Ok(operation().await)
    }

    /// Admits one operation and hands the caller its slot.
    pub async fn acquire(&self) -> Result<OperationSlot> {
        let started = Instant::now();
        let deadline = self.config.wait_timeout().map(|limit| started + limit);

        let permit = self.acquire_permit(started, deadline).await?;
        // the permit is returned to the semaphore if the load wait fails
        self.await_headroom(started, deadline).await?;

        Ok(self.admit(permit, started.elapsed()))
    }

    /// Rejects every queued and future admission. Operations already running
    /// keep their slots.
    pub fn close(&self) {
        self.semaphore.close();
        info!(in_flight = self.in_flight(), "admission controller closed");
    }

    async fn acquire_permit(
        &self,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<OwnedSemaphorePermit> {
        match self.config.policy {
            AdmissionPolicy::Reject => match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => Ok(permit),
                Err(TryAcquireError::Closed) => Err(AdmissionError::Closed.into()),
                Err(TryAcquireError::NoPermits) => {
                    Err(self.exhausted(started, ExhaustionReason::CapacityFull))
                }
            },
            AdmissionPolicy::Block => {
                let acquire = self.semaphore.clone().acquire_owned();
                let acquired = match deadline {
                    Some(deadline) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        match timeout(remaining, acquire).await {
                            Ok(acquired) => acquired,
                            Err(_) => return Err(self.exhausted(started, ExhaustionReason::CapacityFull)),
                        }
                    }
                    None => acquire.await,
                };
                acquired.map_err(|_| AdmissionError::Closed.into())
            }
        }
    }

    /// Waits until host load is under both high-water marks. Holding the
    /// permit meanwhile keeps the request's place in the FIFO order.
    async fn await_headroom(
        &self,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let Some(load) = &self.load else {
            return Ok(());
        };

        loop {
            let Some(reason) = load.pressure() else {
                return Ok(());
            };

            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if self.config.policy == AdmissionPolicy::Reject || remaining == Some(Duration::ZERO) {
                return Err(self.exhausted(started, reason));
            }

            debug!(%reason, waited_ms = started.elapsed().as_millis() as u64, "deferring admission under host load");
            let pause = match remaining {
                Some(remaining) => remaining.min(self.config.load_poll_interval()),
                None => self.config.load_poll_interval(),
            };
            sleep(pause).await;

            if self.semaphore.is_closed() {
                return Err(AdmissionError::Closed.into());
            }
        }
    }

    fn admit(
        &self,
        permit: OwnedSemaphorePermit,
        waited: Duration,
    ) -> OperationSlot {
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);
        self.admitted.fetch_add(1, Ordering::Relaxed);
        ADMISSION_IN_FLIGHT.inc();
        ADMISSION_DECISIONS.with_label_values(&["admitted"]).inc();
        debug!(
            in_flight = current,
            capacity = self.capacity,
            waited_ms = waited.as_millis() as u64,
            "operation admitted"
        );
        OperationSlot::new(permit, self.in_flight.clone(), waited)
    }

    fn exhausted(
        &self,
        started: Instant,
        reason: ExhaustionReason,
    ) -> crate::Error {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        ADMISSION_DECISIONS.with_label_values(&["rejected"]).inc();

        let in_flight = self.in_flight();
        let waited = started.elapsed();
        warn!(
            capacity = self.capacity,
            in_flight,
            waited_ms = waited.as_millis() as u64,
            %reason,
            "admission refused"
        );
        AdmissionError::ResourceExhausted {
            requested: 1,
            available: self.capacity.saturating_sub(in_flight),
            capacity: self.capacity,
            in_flight,
            waited,
            reason,
        }
        .into()
    }
}

/// Rate-limited view of host load.
///
/// The sampler has a single owner (this gate) and is only read under its lock;
/// callers arriving within `sample_interval` of the last read share that
/// snapshot instead of producing a near-zero tick delta.
struct LoadGate {
    state: Mutex<LoadState>,
    sample_interval: Duration,
    cpu_high_water: f64,
    memory_limit_bytes: u64,
}

struct LoadState {
    sampler: ResourceSampler,
    last: Option<(Instant, ResourceSnapshot)>,
}

impl LoadGate {
    fn new(
        sampler: ResourceSampler,
        config: &AdmissionConfig,
        profile: &HardwareProfile,
    ) -> Self {
        let memory_limit_bytes = (profile.total_memory_bytes as f64 * config.memory_high_water_ratio) as u64;
        Self {
            state: Mutex::new(LoadState { sampler, last: None }),
            sample_interval: config.sample_interval(),
            cpu_high_water: config.cpu_high_water,
            memory_limit_bytes,
        }
    }

    fn current(&self) -> ResourceSnapshot {
        let mut state = self.state.lock();
        if let Some((at, snapshot)) = state.last {
            if at.elapsed() < self.sample_interval {
                return snapshot;
            }
        }
        let snapshot = state.sampler.snapshot();
        state.last = Some((Instant::now(), snapshot));
        snapshot
    }

    /// `None` when there is headroom, otherwise the mark being exceeded.
    fn pressure(&self) -> Option<ExhaustionReason> {
        let snapshot = self.current();
        if snapshot.cpu_utilization > self.cpu_high_water {
            return Some(ExhaustionReason::CpuPressure {
                utilization: snapshot.cpu_utilization,
            });
        }
        if snapshot.memory_used_bytes > self.memory_limit_bytes {
            return Some(ExhaustionReason::MemoryPressure {
                used_bytes: snapshot.memory_used_bytes,
                limit_bytes: self.memory_limit_bytes,
            });
        }
        None
    }
}
