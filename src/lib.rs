//! # devgate
//!
//! Resource-aware admission control and project change intelligence.
//!
//! ## What this crate provides
//!
//! - **Admission control** - [`AdmissionController`] limits how many heavyweight
//!   operations (simulators, builds, test runs) run at once, using a capacity
//!   derived from the host's memory and cores and deferring work while the host
//!   is already loaded.
//! - **Hardware and load measurement** - [`HardwareProfiler`] and
//!   [`ResourceSampler`].
//! - **Change watching** - [`ChangeWatcher`] watches a project tree and hands
//!   every change to a handler as a [`ProjectChangeEvent`]: the category of the
//!   changed path, its impact, and recommended follow-up actions.
//!
//! ## Quick start
//!
//! ```ignore
//! let config = DevGateConfig::new()?.validate()?;
//!
//! let admission = AdmissionController::system(config.admission.clone());
//! let output = admission.execute(|| run_simulator()).await?;
//!
//! let watcher = ChangeWatcher::new(config.watcher.clone(), &config.classifier)?;
//! watcher.start("MyApp", true, Arc::new(|change: ProjectChangeEvent| {
//!     println!("{} -> {:?}", change.event.path.display(), change.recommendations);
//! }))?;
//! ```

mod admission;
mod change;
mod config;
mod constants;
mod errors;
pub mod metrics;
mod resources;
mod watcher;

pub use admission::*;
pub use change::*;
pub use config::*;
pub use errors::*;
pub use resources::*;
pub use watcher::*;


//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
