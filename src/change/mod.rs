//! Change intelligence: what a file change means for the project.
//!
//! ```text
//! ChangeEvent ─> ChangeClassifier ─> assess ─> recommend ─> ProjectChangeEvent
//!                 (path rules)       (table)   (table)
//! ```
//!
//! Every stage is pure; [`ChangePipeline`] bundles them with configured rules.

mod classifier;
mod event;
mod impact;
mod pipeline;
mod recommendation;

pub use classifier::*;
pub use event::*;
pub use impact::*;
pub use pipeline::*;
pub use recommendation::*;

#[cfg(test)]
mod event_test;
#[cfg(test)]
mod pipeline_test;
