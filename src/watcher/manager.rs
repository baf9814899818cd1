use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::select;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;
use walkdir::WalkDir;

use super::ChangeNotifier;
use super::NotifyBackend;
use super::RawEvent;
use super::RawEventSink;
use super::WatchHandle;
use crate::constants::WATCH_DISPATCHER_THREAD;
use crate::metrics::ACTIVE_WATCHES;
use crate::ChangeEvent;
use crate::ChangeKind;
use crate::ChangePipeline;
use crate::ClassifierConfig;
use crate::Error;
use crate::EventMask;
use crate::ProjectChangeEvent;
use crate::Result;
use crate::WatchError;
use crate::WatcherConfig;

/// Receives every analyzed change for the path it was registered with.
///
/// Runs on the watcher's dispatcher thread; a panic is caught and counted.
pub type ChangeHandler = Arc<dyn Fn(ProjectChangeEvent) + Send + Sync>;

/// Outcome of [`ChangeWatcher::start`].
#[derive(Debug)]
pub struct WatchReport {
    /// Registry key of the root (the canonical form of the requested path)
    pub root: PathBuf,
    /// Directories below the root that were registered
    pub watched_children: Vec<PathBuf>,
    /// Subtree entries that could not be enumerated or watched
    pub failures: Vec<WatchFailure>,
}

impl WatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct WatchFailure {
    pub path: PathBuf,
    pub error: WatchError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStats {
    pub active_watches: usize,
    pub events_dispatched: u64,
    /// Events whose registration was stopped or replaced before dispatch
    pub events_dropped: u64,
    /// Repeats of a change the same handler had just received
    pub events_coalesced: u64,
    pub handler_panics: u64,
}

/// Owns every watch registration and the thread that dispatches their events.
///
/// At most one registration exists per path. Re-starting a path, stopping it,
/// or the path itself being deleted or renamed cancels the previous handle
/// exactly once; the handle is moved out of the registry before it is
/// cancelled, so concurrent `stop_all` and `start` never double-cancel.
///
/// Raw events travel through one FIFO channel to a dedicated thread which
/// classifies them and calls the handler looked up at dispatch time. A slow
/// handler delays later events but never blocks `start` or `stop`.
///
/// Paths are classified relative to the watch root, so where the project sits
/// on disk does not affect the category. A deleted or renamed directory is
/// unregistered together with everything registered below it, whichever
/// registration reports the change.
pub struct ChangeWatcher {
    inner: Arc<WatcherInner>,
    dispatcher: Option<JoinHandle<()>>,
    shutdown_tx: Sender<()>,
}

struct WatcherInner {
    notifier: Arc<dyn ChangeNotifier>,
    registry: DashMap<PathBuf, Registration>,
    next_generation: AtomicU64,
    event_tx: Sender<Dispatch>,
    pipeline: ChangePipeline,
    config: WatcherConfig,
    coalescer: Coalescer,
    /// Renamed registration waiting for the OS to report the new name
    pending_rename: Mutex<Option<PendingRename>>,
    events_dispatched: AtomicU64,
    events_dropped: AtomicU64,
    handler_panics: AtomicU64,
}

struct Registration {
    handle: Box<dyn WatchHandle>,
    recursive: bool,
    /// Recursive root that registered this directory, if any
    root: Option<PathBuf>,
    handler: ChangeHandler,
    generation: u64,
}

struct Dispatch {
    key: PathBuf,
    generation: u64,
    raw: RawEvent,
}

/// What it takes to re-create a registration under a new name.
struct Follow {
    handler: ChangeHandler,
    recursive: bool,
    root: Option<PathBuf>,
}

struct PendingRename {
    from: PathBuf,
    follow: Follow,
    at: Instant,
}

/// The OS reports one rename as a target-less "moved from" followed shortly by
/// the paired event carrying the new name.
const PENDING_RENAME_TTL: Duration = Duration::from_secs(1);

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("active_watches", &self.inner.registry.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ChangeWatcher {
    /// Watcher over the OS notification backend.
    pub fn new(
        config: WatcherConfig,
        classifier: &ClassifierConfig,
    ) -> Result<Self> {
        Self::with_notifier(Arc::new(NotifyBackend::new()), config, ChangePipeline::new(classifier))
    }

    pub fn with_notifier(
        notifier: Arc<dyn ChangeNotifier>,
        config: WatcherConfig,
        pipeline: ChangePipeline,
    ) -> Result<Self> {
        let (event_tx, event_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = unbounded();

        let inner = Arc::new(WatcherInner {
            notifier,
            registry: DashMap::new(),
            next_generation: AtomicU64::new(1),
            event_tx,
            pipeline,
            coalescer: Coalescer::new(config.coalesce_window()),
            pending_rename: Mutex::new(None),
            config,
            events_dispatched: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
        });

        let dispatcher = spawn_dispatcher(Arc::downgrade(&inner), event_rx, shutdown_rx)
            .map_err(|e| Error::Fatal(format!("failed to spawn watch dispatcher: {e}")))?;

        Ok(Self {
            inner,
            dispatcher: Some(dispatcher),
            shutdown_tx,
        })
    }

    /// Starts watching `path`, replacing any registration it already has.
    ///
    /// With `recursive`, every directory below `path` (down to `max_depth`,
    /// skipping the ignored-directory list) is registered too, each with its
    /// own non-recursive handle. Subtree setup is best-effort: failures are
    /// listed in the report and never undo the root registration.
    ///
    /// # Errors
    /// `PathNotFound` or `PermissionDenied` when `path` cannot be inspected;
    /// `CannotOpenPath` when the root handle cannot be opened.
    pub fn start(
        &self,
        path: impl AsRef<Path>,
        recursive: bool,
        handler: ChangeHandler,
    ) -> Result<WatchReport> {
        self.inner.start(path.as_ref(), recursive, handler)
    }

    /// Cancels the registration for `path` and, for a recursive root, the
    /// directories it registered. Returns whether anything was watching.
    pub fn stop(
        &self,
        path: impl AsRef<Path>,
    ) -> bool {
        let key = registry_key(path.as_ref());
        self.inner.remove_registration(&key, None)
    }

    /// Cancels every registration.
    pub fn stop_all(&self) {
        let keys: Vec<PathBuf> = self.inner.registry.iter().map(|entry| entry.key().clone()).collect();
        let mut cancelled = 0;
        for key in keys {
            if let Some((key, registration)) = self.inner.registry.remove(&key) {
                self.inner.release(&key, registration);
                cancelled += 1;
            }
        }
        self.inner.pending_rename.lock().take();
        if cancelled > 0 {
            info!(cancelled, "stopped all watches");
        }
    }

    pub fn active_paths(&self) -> BTreeSet<PathBuf> {
        self.inner.registry.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn is_watching(
        &self,
        path: impl AsRef<Path>,
    ) -> bool {
        self.inner.registry.contains_key(&registry_key(path.as_ref()))
    }

    pub fn stats(&self) -> WatcherStats {
        WatcherStats {
            active_watches: self.inner.registry.len(),
            events_dispatched: self.inner.events_dispatched.load(Ordering::Relaxed),
            events_dropped: self.inner.events_dropped.load(Ordering::Relaxed),
            events_coalesced: self.inner.coalescer.coalesced(),
            handler_panics: self.inner.handler_panics.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.inner.config
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop_all();
        let _ = self.shutdown_tx.send(());
        if let Some(dispatcher) = self.dispatcher.take() {
            // a handler that owned the last reference drops us on the dispatcher
            if dispatcher.thread().id() != thread::current().id() && dispatcher.join().is_err() {
                warn!("watch dispatcher exited with a panic");
            }
        }
    }
}

impl WatcherInner {
    fn start(
        &self,
        path: &Path,
        recursive: bool,
        handler: ChangeHandler,
    ) -> Result<WatchReport> {
        let metadata = fs::metadata(path).map_err(|e| WatchError::from_io(path, e))?;
        let root = registry_key(path);

        if self.remove_registration(&root, None) {
            debug!(path = %root.display(), "replacing existing watch");
        }
        self.register(&root, recursive, None, handler.clone())?;

        let mut report = WatchReport {
            root: root.clone(),
            watched_children: Vec::new(),
            failures: Vec::new(),
        };
        if recursive && metadata.is_dir() {
            self.register_subtree(&root, &root, self.config.max_depth, &handler, &mut report);
        }

        info!(
            path = %report.root.display(),
            recursive,
            children = report.watched_children.len(),
            failures = report.failures.len(),
            "watch started"
        );
        Ok(report)
    }

    fn register(
        &self,
        path: &Path,
        recursive: bool,
        root: Option<PathBuf>,
        handler: ChangeHandler,
    ) -> std::result::Result<(), WatchError> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = self
            .notifier
            .subscribe(path, self.sink(path, generation))
            .map_err(|e| WatchError::from_io(path, e))?;

        let registration = Registration {
            handle,
            recursive,
            root,
            handler,
            generation,
        };
        ACTIVE_WATCHES.inc();
        if let Some(displaced) = self.registry.insert(path.to_path_buf(), registration) {
            // lost a race with a concurrent start for the same path
            self.release(path, displaced);
        }
        trace!(path = %path.display(), generation, "watch registered");
        Ok(())
    }

    fn sink(
        &self,
        path: &Path,
        generation: u64,
    ) -> RawEventSink {
        let key = path.to_path_buf();
        let event_tx = self.event_tx.clone();
        Arc::new(move |raw| {
            let _ = event_tx.send(Dispatch {
                key: key.clone(),
                generation,
                raw,
            });
        })
    }

    /// Registers every directory below `base`, down to `max_depth` levels, as
    /// a child of the recursive `root`.
    fn register_subtree(
        &self,
        base: &Path,
        root: &Path,
        max_depth: usize,
        handler: &ChangeHandler,
        report: &mut WatchReport,
    ) {
        let walker = WalkDir::new(base)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.config.is_ignored_dir(name)))
            });

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    let dir = entry.into_path();
                    match self.register(&dir, false, Some(root.to_path_buf()), handler.clone()) {
                        Ok(()) => report.watched_children.push(dir),
                        Err(error) => {
                            warn!("skipping {}: {}", dir.display(), error);
                            report.failures.push(WatchFailure { path: dir, error });
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
                    let source = io::Error::from(e);
                    warn!("cannot enumerate {}: {}", path.display(), source);
                    report.failures.push(WatchFailure {
                        path: path.clone(),
                        error: WatchError::EnumerationFailed { path, source },
                    });
                }
            }
        }
    }

    /// Removes `key` (only if it still has `generation`, when given) and the
    /// children of a recursive root. Returns whether `key` was removed.
    fn remove_registration(
        &self,
        key: &Path,
        generation: Option<u64>,
    ) -> bool {
        let removed = self
            .registry
            .remove_if(key, |_, registration| generation.map_or(true, |g| registration.generation == g));
        let Some((key, registration)) = removed else {
            return false;
        };

        let recursive = registration.recursive;
        self.release(&key, registration);

        if recursive {
            let children: Vec<PathBuf> = self
                .registry
                .iter()
                .filter(|entry| entry.root.as_deref() == Some(key.as_path()))
                .map(|entry| entry.key().clone())
                .collect();
            for child in children {
                if let Some((child, registration)) = self
                    .registry
                    .remove_if(&child, |_, registration| registration.root.as_deref() == Some(key.as_path()))
                {
                    self.release(&child, registration);
                }
            }
        }
        true
    }

    fn release(
        &self,
        path: &Path,
        registration: Registration,
    ) {
        registration.handle.cancel();
        ACTIVE_WATCHES.dec();
        debug!(path = %path.display(), generation = registration.generation, "watch cancelled");
    }

    fn dispatch(
        &self,
        dispatch: Dispatch,
    ) {
        let Dispatch { key, generation, raw } = dispatch;

        let (handler, project_root) = match self.registry.get(&key) {
            Some(registration) if registration.generation == generation => (
                registration.handler.clone(),
                registration.root.clone().unwrap_or_else(|| key.clone()),
            ),
            _ => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                trace!(path = %raw.path.display(), generation, "dropping event from stale registration");
                return;
            }
        };

        let event = ChangeEvent::observe(&raw.path, raw.mask);
        if event.kind.is_terminal() {
            self.retire(&raw.path, event.kind, raw.renamed_to.as_deref());
        }

        if self.coalescer.is_repeat(&raw.path, raw.mask, &handler) {
            trace!(path = %raw.path.display(), "coalescing repeated change");
            return;
        }

        let analyzed = self.pipeline.analyze_within(event, &project_root);
        if catch_unwind(AssertUnwindSafe(|| handler(analyzed))).is_err() {
            self.handler_panics.fetch_add(1, Ordering::Relaxed);
            warn!(path = %raw.path.display(), "change handler panicked");
        }
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// `path` was deleted or renamed: drop its registration and everything
    /// registered below it, then follow a rename when configured to.
    fn retire(
        &self,
        path: &Path,
        kind: ChangeKind,
        renamed_to: Option<&Path>,
    ) {
        let retired = self.unregister_tree(path);
        if kind != ChangeKind::Renamed || !self.config.reestablish_on_rename {
            return;
        }

        let Some(follow) = retired.or_else(|| self.take_pending_rename(path)) else {
            return;
        };
        match renamed_to {
            Some(to) => self.follow(path, to, follow),
            None => {
                *self.pending_rename.lock() = Some(PendingRename {
                    from: path.to_path_buf(),
                    follow,
                    at: Instant::now(),
                });
            }
        }
    }

    fn unregister_tree(
        &self,
        path: &Path,
    ) -> Option<Follow> {
        let (follow, generation) = {
            let registration = self.registry.get(path)?;
            let follow = Follow {
                handler: registration.handler.clone(),
                recursive: registration.recursive,
                root: registration.root.clone(),
            };
            (follow, registration.generation)
        };

        let nested: Vec<PathBuf> = self
            .registry
            .iter()
            .filter(|entry| entry.key() != path && entry.key().starts_with(path))
            .map(|entry| entry.key().clone())
            .collect();
        for child in nested {
            self.remove_registration(&child, None);
        }

        if !self.remove_registration(path, Some(generation)) {
            return None;
        }
        info!(path = %path.display(), "watched path is gone, watch cancelled");
        Some(follow)
    }

    fn take_pending_rename(
        &self,
        from: &Path,
    ) -> Option<Follow> {
        let mut pending = self.pending_rename.lock();
        let matches = pending
            .as_ref()
            .is_some_and(|p| p.from == from && p.at.elapsed() < PENDING_RENAME_TTL);
        if matches {
            pending.take().map(|p| p.follow)
        } else {
            None
        }
    }

    fn follow(
        &self,
        from: &Path,
        to: &Path,
        follow: Follow,
    ) {
        let to = registry_key(to);
        let outcome = match &follow.root {
            Some(root) if to.starts_with(root) && self.registry.contains_key(root) => {
                self.adopt(root, &to, follow.handler).map_err(Error::from)
            }
            _ => self.start(&to, follow.recursive, follow.handler).map(|_| ()),
        };
        match outcome {
            Ok(()) => info!(from = %from.display(), to = %to.display(), "watch moved with renamed path"),
            Err(e) => warn!("cannot follow rename to {}: {}", to.display(), e),
        }
    }

    /// Registers `dir` and its subtree as children of the recursive `root`.
    fn adopt(
        &self,
        root: &Path,
        dir: &Path,
        handler: ChangeHandler,
    ) -> std::result::Result<(), WatchError> {
        let depth = dir.strip_prefix(root).map_or(0, |relative| relative.components().count());
        let ignored = dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.config.is_ignored_dir(name));
        if ignored || depth > self.config.max_depth {
            debug!(path = %dir.display(), "renamed path is outside the watched tree");
            return Ok(());
        }

        self.register(dir, false, Some(root.to_path_buf()), handler.clone())?;
        let mut report = WatchReport {
            root: root.to_path_buf(),
            watched_children: vec![dir.to_path_buf()],
            failures: Vec::new(),
        };
        self.register_subtree(dir, root, self.config.max_depth - depth, &handler, &mut report);
        Ok(())
    }
}

/// Drops a change when the same handler received an identical one (same path
/// and raw mask) within the window.
struct Coalescer {
    window: Duration,
    seen: Mutex<HashMap<(PathBuf, u32, usize), Instant>>,
    coalesced: AtomicU64,
}

/// Past this many remembered changes, expired ones are pruned.
const COALESCER_PRUNE_AT: usize = 1024;

impl Coalescer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
            coalesced: AtomicU64::new(0),
        }
    }

    fn is_repeat(
        &self,
        path: &Path,
        mask: EventMask,
        handler: &ChangeHandler,
    ) -> bool {
        if self.window.is_zero() {
            return false;
        }

        let now = Instant::now();
        let mut seen = self.seen.lock();
        if seen.len() >= COALESCER_PRUNE_AT {
            seen.retain(|_, at| now.duration_since(*at) < self.window);
        }

        let handler_id = Arc::as_ptr(handler) as *const () as usize;
        let id = (path.to_path_buf(), mask.bits(), handler_id);
        match seen.get(&id) {
            Some(at) if now.duration_since(*at) < self.window => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => {
                seen.insert(id, now);
                false
            }
        }
    }

    fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

/// Canonical form when the path resolves, so keys match the paths the OS
/// reports; the path as given otherwise.
fn registry_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn spawn_dispatcher(
    inner: Weak<WatcherInner>,
    events: Receiver<Dispatch>,
    shutdown: Receiver<()>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name(WATCH_DISPATCHER_THREAD.to_string()).spawn(move || {
        debug!("watch dispatcher started");
        loop {
            select! {
                recv(events) -> msg => {
                    let Ok(dispatch) = msg else { break };
                    let Some(inner) = inner.upgrade() else { break };
                    inner.dispatch(dispatch);
                }
                recv(shutdown) -> _ => break,
            }
        }
        debug!("watch dispatcher stopped");
    })
}
