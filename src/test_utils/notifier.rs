use std::collections::BTreeSet;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::ChangeHandler;
use crate::ChangeNotifier;
use crate::EventMask;
use crate::ProjectChangeEvent;
use crate::RawEvent;
use crate::RawEventSink;
use crate::WatchHandle;

/// In-memory notifier that counts subscriptions and cancellations per path and
/// lets tests inject raw events.
#[derive(Clone, Default)]
pub struct FakeNotifier {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    live: HashMap<PathBuf, Vec<(u64, RawEventSink)>>,
    subscribed: HashMap<PathBuf, usize>,
    cancelled: HashMap<PathBuf, usize>,
    failures: HashMap<PathBuf, io::ErrorKind>,
}

struct FakeHandle {
    id: u64,
    path: PathBuf,
    state: Arc<Mutex<FakeState>>,
}

impl WatchHandle for FakeHandle {
    fn cancel(self: Box<Self>) {
        let mut state = self.state.lock();
        *state.cancelled.entry(self.path.clone()).or_default() += 1;
        if let Some(subscriptions) = state.live.get_mut(&self.path) {
            subscriptions.retain(|(id, _)| *id != self.id);
            if subscriptions.is_empty() {
                state.live.remove(&self.path);
            }
        }
    }
}

impl ChangeNotifier for FakeNotifier {
    fn subscribe(
        &self,
        path: &Path,
        sink: RawEventSink,
    ) -> io::Result<Box<dyn WatchHandle>> {
        let mut state = self.state.lock();
        if let Some(kind) = state.failures.get(path) {
            return Err(io::Error::new(*kind, "injected subscribe failure"));
        }

        state.next_id += 1;
        let id = state.next_id;
        *state.subscribed.entry(path.to_path_buf()).or_default() += 1;
        state.live.entry(path.to_path_buf()).or_default().push((id, sink));

        Ok(Box::new(FakeHandle {
            id,
            path: path.to_path_buf(),
            state: self.state.clone(),
        }))
    }
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later subscribe for `path` fail with `kind`.
    pub fn fail_on(
        &self,
        path: impl Into<PathBuf>,
        kind: io::ErrorKind,
    ) {
        self.state.lock().failures.insert(path.into(), kind);
    }

    pub fn subscribe_count(
        &self,
        path: &Path,
    ) -> usize {
        self.state.lock().subscribed.get(path).copied().unwrap_or(0)
    }

    pub fn cancel_count(
        &self,
        path: &Path,
    ) -> usize {
        self.state.lock().cancelled.get(path).copied().unwrap_or(0)
    }

    /// Paths with at least one uncancelled subscription.
    pub fn live_paths(&self) -> BTreeSet<PathBuf> {
        self.state.lock().live.keys().cloned().collect()
    }

    /// Number of uncancelled subscriptions for `path`.
    pub fn live_count(
        &self,
        path: &Path,
    ) -> usize {
        self.state.lock().live.get(path).map_or(0, Vec::len)
    }

    /// Delivers `raw` through every live subscription on `watched`.
    /// Returns how many subscriptions received it.
    pub fn emit_raw(
        &self,
        watched: &Path,
        raw: RawEvent,
    ) -> usize {
        let sinks: Vec<RawEventSink> = self
            .state
            .lock()
            .live
            .get(watched)
            .map(|subscriptions| subscriptions.iter().map(|(_, sink)| sink.clone()).collect())
            .unwrap_or_default();
        for sink in &sinks {
            sink(raw.clone());
        }
        sinks.len()
    }

    pub fn emit(
        &self,
        watched: &Path,
        path: &Path,
        mask: EventMask,
    ) -> usize {
        self.emit_raw(watched, RawEvent::new(path, mask))
    }

    /// Sinks of the live subscriptions on `path`. Holding one past cancel
    /// stands in for an event the OS had already queued.
    pub fn sinks(
        &self,
        path: &Path,
    ) -> Vec<RawEventSink> {
        self.state
            .lock()
            .live
            .get(path)
            .map(|subscriptions| subscriptions.iter().map(|(_, sink)| sink.clone()).collect())
            .unwrap_or_default()
    }
}

/// Handler that forwards every event into a channel.
pub fn collecting_handler() -> (ChangeHandler, Receiver<ProjectChangeEvent>) {
    let (tx, rx) = unbounded();
    let handler: ChangeHandler = Arc::new(move |event| {
        let _ = tx.send(event);
    });
    (handler, rx)
}

pub const EVENT_WAIT: Duration = Duration::from_secs(5);

/// Polls `condition` until it holds or [`EVENT_WAIT`] passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + EVENT_WAIT;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
