use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use devgate::ChangeHandler;
use devgate::ProjectChangeEvent;
use tempfile::TempDir;

pub const WAIT: Duration = Duration::from_secs(10);

static LOGGER_INIT: Once = Once::new();

pub fn enable_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Temp project dir and its canonical path.
pub fn project_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

pub fn channel_handler() -> (ChangeHandler, Receiver<ProjectChangeEvent>) {
    let (tx, rx) = unbounded();
    let handler: ChangeHandler = Arc::new(move |event| {
        let _ = tx.send(event);
    });
    (handler, rx)
}

/// Waits for the first event matching `predicate`, skipping the rest. The OS
/// may report one change as several events (create, then modify).
pub fn wait_for(
    rx: &Receiver<ProjectChangeEvent>,
    mut predicate: impl FnMut(&ProjectChangeEvent) -> bool,
) -> Option<ProjectChangeEvent> {
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match rx.recv_timeout(remaining) {
            Ok(event) if predicate(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Polls `condition` until it holds or [`WAIT`] passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
