//! File-change watching for a project tree.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  ChangeNotifier  │ one shared OS watcher, a non-recursive watch per
//! │                  │ directory, events routed parent-first
//! └────────┬─────────┘
//!          │ RawEvent + (path, generation)
//!          ▼
//! ┌──────────────────┐
//! │   Event Queue    │ (crossbeam-channel, unbounded FIFO)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Dispatcher     │ (background thread)
//! │   Thread         │ registry lookup, stale generations dropped,
//! │                  │ gone subtrees retired, repeats coalesced
//! └────────┬─────────┘
//!          │ ChangePipeline::analyze_within
//!          ▼
//! ┌──────────────────┐
//! │  ChangeHandler   │ ProjectChangeEvent
//! └──────────────────┘
//! ```
//!
//! Handlers live in the registry, not in the OS subscription, so a stopped or
//! replaced registration never receives another event even if the OS still
//! has some queued.

mod manager;
mod notifier;

pub use manager::*;
pub use notifier::*;
