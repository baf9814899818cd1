use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::OwnedSemaphorePermit;
use tracing::trace;

use crate::metrics::ADMISSION_IN_FLIGHT;

/// One admitted unit of work.
///
/// Holding the slot keeps one unit of capacity reserved; dropping it releases
/// that capacity exactly once, whatever path the owner leaves by.
#[must_use = "capacity is released as soon as the slot is dropped"]
pub struct OperationSlot {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
    admitted_at: Instant,
    waited: Duration,
}

impl OperationSlot {
    pub(crate) fn new(
        permit: OwnedSemaphorePermit,
        in_flight: Arc<AtomicUsize>,
        waited: Duration,
    ) -> Self {
        Self {
            _permit: permit,
            in_flight,
            admitted_at: Instant::now(),
            waited,
        }
    }

    /// Time spent queued before admission.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Time since admission.
    pub fn held_for(&self) -> Duration {
        self.admitted_at.elapsed()
    }
}

impl std::fmt::Debug for OperationSlot {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("OperationSlot")
            .field("waited", &self.waited)
            .field("held_for", &self.held_for())
            .finish()
    }
}

impl Drop for OperationSlot {
    fn drop(&mut self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::AcqRel) - 1;
        ADMISSION_IN_FLIGHT.dec();
        trace!(
            held_ms = self.admitted_at.elapsed().as_millis() as u64,
            in_flight = remaining,
            "operation slot released"
        );
        // permit returns to the semaphore when `_permit` drops after this
    }
}
