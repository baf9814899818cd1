//! Fakes and builders shared by the unit tests.
mod notifier;
mod resources;

pub use notifier::*;
pub use resources::*;
