//! Error hierarchy for the admission and change-watch subsystems.
//!
//! Every failure in this crate is local and recoverable: callers get the
//! offending path or the capacity numbers back and decide what to do next.
//! Resource sampling never produces an error; it degrades to zeroed values.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Watch registration failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Admission control rejections
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// Configuration source or parse failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration values that parsed but are out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The path to watch does not exist
    #[error("Path not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    /// The OS refused to open a watch handle for the path
    #[error("Cannot open watch handle for {}: {source}", path.display())]
    CannotOpenPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process lacks permission to read or watch the path
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Subtree enumeration failed below a recursively watched root
    #[error("Failed to enumerate {}: {source}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WatchError {
    /// The path the failure refers to.
    pub fn path(&self) -> &PathBuf {
        match self {
            WatchError::PathNotFound { path }
            | WatchError::CannotOpenPath { path, .. }
            | WatchError::PermissionDenied { path }
            | WatchError::EnumerationFailed { path, .. } => path,
        }
    }

    /// Maps an I/O failure on `path` to the matching watch error.
    pub(crate) fn from_io(
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => WatchError::PathNotFound { path },
            std::io::ErrorKind::PermissionDenied => WatchError::PermissionDenied { path },
            _ => WatchError::CannotOpenPath { path, source },
        }
    }
}

/// Why an admission request could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExhaustionReason {
    /// Every slot was taken for the whole wait
    CapacityFull,
    /// Host CPU utilization stayed above the high-water mark
    CpuPressure { utilization: f64 },
    /// Host memory use stayed above the high-water mark
    MemoryPressure { used_bytes: u64, limit_bytes: u64 },
}

impl std::fmt::Display for ExhaustionReason {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ExhaustionReason::CapacityFull => write!(f, "all slots in use"),
            ExhaustionReason::CpuPressure { utilization } => {
                write!(f, "cpu utilization {:.0}%", utilization * 100.0)
            }
            ExhaustionReason::MemoryPressure {
                used_bytes,
                limit_bytes,
            } => write!(f, "memory used {used_bytes} bytes exceeds {limit_bytes} bytes"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// No slot could be granted before the deadline (or immediately, under the
    /// reject policy)
    #[error(
        "Resource exhausted: requested {requested} slot(s), {available} of {capacity} available after {waited:?} ({reason})"
    )]
    ResourceExhausted {
        requested: usize,
        available: usize,
        capacity: usize,
        in_flight: usize,
        waited: Duration,
        reason: ExhaustionReason,
    },

    /// The controller was closed for shutdown
    #[error("Admission controller is closed")]
    Closed,
}
