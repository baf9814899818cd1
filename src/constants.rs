// -
// Units

pub(crate) const GIB: u64 = 1024 * 1024 * 1024;

// -
// Hardware fallbacks

/// Memory assumed when the host refuses to report its size.
pub(crate) const FALLBACK_MEMORY_BYTES: u64 = 8 * GIB;

pub(crate) const HIGH_MEMORY_VARIANT_MIN_GIB: u64 = 32;
pub(crate) const HIGH_MEMORY_VARIANT_MIN_CORES: usize = 10;

// -
// Watcher

/// Directories never descended into during recursive watch setup: version
/// control metadata, build caches and dependency-manager caches.
pub(crate) const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".build",
    "build",
    "DerivedData",
    "node_modules",
    "Pods",
    "Carthage",
    ".swiftpm",
    "target",
];

pub(crate) const WATCH_DISPATCHER_THREAD: &str = "devgate-watch-dispatch";
