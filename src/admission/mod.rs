//! Resource-aware admission control for long-running operations.
//!
//! # Capacity
//!
//! The number of operations allowed to run at once is derived from the
//! hardware profile:
//!
//! ```text
//! min( max(1, (memory_gib - reserved_gib) / per_operation_gib),
//!      cores * per_core_factor,
//!      hard_cap )
//! ```
//!
//! # Admission
//!
//! ```text
//! execute(op)
//!   └─> FIFO semaphore (capacity permits)  ── timeout ──> ResourceExhausted
//!         └─> host load below high-water?  ── timeout ──> ResourceExhausted
//!               └─> OperationSlot held while op runs, released on drop
//! ```
//!
//! The slot is an RAII guard, so completion, error, panic and cancellation of
//! the caller's future all release it exactly once.

mod capacity;
mod controller;
mod slot;

pub use capacity::*;
pub use controller::*;
pub use slot::*;
