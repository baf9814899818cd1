//! Host capacity and load measurement.
//!
//! [`HardwareProfiler`] answers "how big is this machine" once per query;
//! [`ResourceSampler`] answers "how busy is it right now" relative to its
//! previous call. Both sit on top of small OS primitives ([`HardwareQuery`],
//! [`ResourceCounters`]) so the arithmetic can be tested with fixed inputs.

mod counters;
mod profiler;
mod sampler;

pub use counters::*;
pub use profiler::*;
pub use sampler::*;
