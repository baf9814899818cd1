//! OS change-notification primitive.

use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use notify::event::ModifyKind;
use notify::event::RenameMode;
use notify::Event;
use notify::EventKind;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use parking_lot::Mutex;
use tracing::trace;
use tracing::warn;

use crate::EventMask;

/// One notification as reported by the OS, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub mask: EventMask,
    /// New location when the OS reported both ends of a rename
    pub renamed_to: Option<PathBuf>,
}

impl RawEvent {
    pub fn new(
        path: impl Into<PathBuf>,
        mask: EventMask,
    ) -> Self {
        Self {
            path: path.into(),
            mask,
            renamed_to: None,
        }
    }
}

pub type RawEventSink = Arc<dyn Fn(RawEvent) + Send + Sync>;

/// A live subscription. Cancelling consumes it, so it can happen only once.
pub trait WatchHandle: Send + Sync {
    fn cancel(self: Box<Self>);
}

/// Opens one non-recursive subscription per call.
///
/// The sink may be called from any thread and must not block.
pub trait ChangeNotifier: Send + Sync + 'static {
    fn subscribe(
        &self,
        path: &Path,
        sink: RawEventSink,
    ) -> io::Result<Box<dyn WatchHandle>>;
}

/// `notify`-backed notifier. Every subscription shares one OS watcher (a
/// single inotify instance on Linux), so the number of watched directories is
/// bounded by the per-watch limit rather than the per-instance limit.
///
/// An event is routed to the subscription of the directory containing the
/// changed path when that directory is subscribed, otherwise to the
/// subscription of the path itself. A subscribed directory therefore hears
/// about its own deletion or rename through its parent when the parent is
/// subscribed too, which is also where the OS reports the new name.
#[derive(Clone, Default)]
pub struct NotifyBackend {
    shared: Arc<SharedWatcher>,
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct SharedWatcher {
    /// Opened on first subscribe
    watcher: Mutex<Option<RecommendedWatcher>>,
    routes: Arc<Routes>,
    next_id: AtomicU64,
}

impl SharedWatcher {
    fn open(&self) -> io::Result<RecommendedWatcher> {
        let routes = self.routes.clone();
        notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for raw in raw_events(event) {
                    routes.deliver(raw);
                }
            }
            Err(e) => warn!("notify backend error: {}", e),
        })
        .map_err(into_io)
    }
}

/// Sinks by subscribed path.
#[derive(Default)]
pub(crate) struct Routes {
    sinks: DashMap<PathBuf, Route>,
}

struct Route {
    id: u64,
    sink: RawEventSink,
}

impl Routes {
    pub(crate) fn insert(
        &self,
        path: &Path,
        id: u64,
        sink: RawEventSink,
    ) {
        self.sinks.insert(path.to_path_buf(), Route { id, sink });
    }

    /// Removes the route for `path` if it still belongs to subscription `id`.
    pub(crate) fn remove(
        &self,
        path: &Path,
        id: u64,
    ) -> bool {
        self.sinks.remove_if(path, |_, route| route.id == id).is_some()
    }

    /// Hands `raw` to the parent directory's sink, or to the path's own.
    /// Returns false when neither is subscribed.
    pub(crate) fn deliver(
        &self,
        raw: RawEvent,
    ) -> bool {
        let sink = raw
            .path
            .parent()
            .and_then(|dir| self.sink_for(dir))
            .or_else(|| self.sink_for(&raw.path));
        match sink {
            Some(sink) => {
                sink(raw);
                true
            }
            None => {
                trace!(path = %raw.path.display(), "no subscription for event");
                false
            }
        }
    }

    fn sink_for(
        &self,
        path: &Path,
    ) -> Option<RawEventSink> {
        self.sinks.get(path).map(|route| route.sink.clone())
    }
}

struct NotifyHandle {
    id: u64,
    path: PathBuf,
    shared: Arc<SharedWatcher>,
}

impl WatchHandle for NotifyHandle {
    fn cancel(self: Box<Self>) {
        let mut watcher = self.shared.watcher.lock();
        // a newer subscription for the same path owns the OS watch now
        if !self.shared.routes.remove(&self.path, self.id) {
            return;
        }
        if let Some(watcher) = watcher.as_mut() {
            // the OS may already have dropped the watch for a deleted path
            if let Err(e) = watcher.unwatch(&self.path) {
                trace!(path = %self.path.display(), "unwatch: {}", e);
            }
        }
    }
}

impl ChangeNotifier for NotifyBackend {
    fn subscribe(
        &self,
        path: &Path,
        sink: RawEventSink,
    ) -> io::Result<Box<dyn WatchHandle>> {
        let mut guard = self.shared.watcher.lock();
        let watcher = match &mut *guard {
            Some(watcher) => watcher,
            slot @ None => slot.insert(self.shared.open()?),
        };

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        // routed before the OS watch exists so no early event is lost
        self.shared.routes.insert(path, id, sink);
        if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
            self.shared.routes.remove(path, id);
            return Err(into_io(e));
        }

        Ok(Box::new(NotifyHandle {
            id,
            path: path.to_path_buf(),
            shared: self.shared.clone(),
        }))
    }
}

/// Translates a `notify` event into raw events, one per affected path.
///
/// Creation counts as a write. Access events carry no change and are dropped.
/// A rename reported with both ends becomes a single event on the old path.
pub(crate) fn raw_events(event: Event) -> Vec<RawEvent> {
    let mask = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => EventMask::WRITE,
        EventKind::Modify(ModifyKind::Metadata(_)) => EventMask::ATTRIB,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            return match (paths.next(), paths.next()) {
                (Some(from), to) => vec![RawEvent {
                    path: from,
                    mask: EventMask::RENAME,
                    renamed_to: to,
                }],
                (None, _) => Vec::new(),
            };
        }
        // the new name of a rename shows up as a fresh path
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => EventMask::WRITE,
        EventKind::Modify(ModifyKind::Name(_)) => EventMask::RENAME,
        EventKind::Modify(_) => EventMask::WRITE,
        EventKind::Remove(_) => EventMask::DELETE,
        EventKind::Any | EventKind::Other => EventMask::empty(),
    };

    event.paths.into_iter().map(|path| RawEvent::new(path, mask)).collect()
}

fn into_io(err: notify::Error) -> io::Error {
    match err.kind {
        notify::ErrorKind::Io(e) => e,
        notify::ErrorKind::PathNotFound => io::Error::new(io::ErrorKind::NotFound, "path not found"),
        kind => io::Error::new(io::ErrorKind::Other, format!("{kind:?}")),
    }
}
