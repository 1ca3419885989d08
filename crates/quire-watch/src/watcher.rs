//! The dependency watcher and the filesystem watch thread.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, mpsc};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use quire_paths::normalize;
use tokio::sync::mpsc as tokio_mpsc;

use crate::debouncer::EventDebouncer;
use crate::error::WatchError;
use crate::event::{ChangeKind, ChangeReceiver, FileChange, WatchEvent, WatchHandle, WatchNotice};
use crate::graph::{DependencyGraph, Page, dependency_set};
use crate::scan::{self, PageMatcher, Snapshot};
use crate::subscriptions::{ChannelId, SubscriptionRegistry};

/// Upper bound on the debounce window.
pub const MAX_DEBOUNCE: Duration = Duration::from_millis(100);

/// Drain thread poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Owner of the page set, dependency edges and live subscriptions.
///
/// Mutations replace the published [`DependencyGraph`] snapshot under a
/// write lock; classification clones the `Arc` and never observes a
/// half-applied update.
pub struct DependencyWatcher {
    graph: RwLock<Arc<DependencyGraph>>,
    subscriptions: SubscriptionRegistry,
    matcher: PageMatcher,
}

impl DependencyWatcher {
    /// Create a watcher with no pages.
    #[must_use]
    pub fn new(matcher: PageMatcher) -> Self {
        Self {
            graph: RwLock::new(Arc::new(DependencyGraph::default())),
            subscriptions: SubscriptionRegistry::new(),
            matcher,
        }
    }

    /// Page matcher used to recognise new pages.
    #[must_use]
    pub fn matcher(&self) -> &PageMatcher {
        &self.matcher
    }

    /// Current graph snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DependencyGraph> {
        Arc::clone(&self.graph.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Register pages with empty dependency sets.
    ///
    /// Already tracked pages are left untouched. Returns how many pages were
    /// added.
    pub fn add_pages(&self, paths: impl IntoIterator<Item = PathBuf>) -> usize {
        self.update(|graph| {
            paths
                .into_iter()
                .filter(|path| graph.insert_page(normalize(path)))
                .count()
        })
    }

    /// Stop tracking a page.
    pub fn remove_page(&self, source: &Path) -> Option<Page> {
        self.update(|graph| graph.remove_page(source))
    }

    /// Replace the dependency set of `page` with the result of its latest
    /// render.
    pub fn record_dependencies(
        &self,
        page: &Path,
        dependencies: impl IntoIterator<Item = PathBuf>,
    ) {
        let dependencies = dependency_set(page, dependencies);
        tracing::debug!(
            page = %page.display(),
            count = dependencies.len(),
            "Recorded dependencies"
        );
        self.update(|graph| graph.set_dependencies(page, dependencies));
    }

    /// Record a failed render: output exists, edges from the last good
    /// render are kept.
    pub fn record_failure(&self, page: &Path) {
        self.update(|graph| graph.mark_failed(page));
    }

    /// Flag every rendered page except `except` for another pass.
    pub fn mark_needs_another_pass(&self, except: &[PathBuf]) -> Vec<PathBuf> {
        self.update(|graph| graph.mark_needs_another_pass(except))
    }

    /// Copy of one page's state.
    #[must_use]
    pub fn page(&self, source: &Path) -> Option<Page> {
        self.snapshot().page(source).cloned()
    }

    /// Source paths of all tracked pages, sorted.
    #[must_use]
    pub fn pages(&self) -> Vec<PathBuf> {
        self.snapshot().pages().map(|p| p.source.clone()).collect()
    }

    /// Classify a debounced change against the current snapshot.
    ///
    /// A created file matching the page patterns is registered first, so it
    /// classifies as a page.
    pub fn classify(&self, change: &FileChange) -> Vec<WatchEvent> {
        let path = normalize(&change.path);
        if change.kind != ChangeKind::Removed && self.matcher.matches(&path) {
            self.add_pages([path.clone()]);
        }

        let events = self
            .snapshot()
            .classify(&path, change.kind, |page| self.subscriptions.is_subscribed(page));
        tracing::debug!(
            path = %path.display(),
            kind = ?change.kind,
            events = events.len(),
            "Classified change"
        );
        events
    }

    /// Register a live channel for `page`.
    ///
    /// Returns the page the channel displayed before, if any.
    pub fn add_subscription(&self, channel: ChannelId, page: PathBuf) -> Option<PathBuf> {
        self.subscriptions.add(channel, page)
    }

    /// Unregister a live channel. Safe for unknown channels.
    pub fn remove_subscription(&self, channel: ChannelId) -> Option<PathBuf> {
        self.subscriptions.remove(channel)
    }

    /// Channels displaying `page`.
    #[must_use]
    pub fn subscribers(&self, page: &Path) -> Vec<ChannelId> {
        self.subscriptions.channels_for(page)
    }

    /// Whether any channel displays `page`.
    #[must_use]
    pub fn is_subscribed(&self, page: &Path) -> bool {
        self.subscriptions.is_subscribed(page)
    }

    /// Pages displayed by at least one channel, sorted.
    #[must_use]
    pub fn subscribed_pages(&self) -> Vec<PathBuf> {
        self.subscriptions.subscribed_pages()
    }

    fn update<R>(&self, f: impl FnOnce(&mut DependencyGraph) -> R) -> R {
        let mut guard = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut guard))
    }
}

/// Options for [`watch`].
#[derive(Clone, Debug)]
pub struct WatchOptions {
    /// Subtrees whose events are dropped (e.g., the output directory).
    pub ignore: Vec<PathBuf>,
    /// Debounce window per path; clamped to [`MAX_DEBOUNCE`].
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            debounce: Duration::from_millis(50),
        }
    }
}

/// Start watching `root` recursively.
///
/// Changes are debounced per path and delivered as
/// [`WatchNotice::Changed`]. If the backend fails mid-run, the watch is
/// re-established and a rescan reports what changed in the meantime as
/// [`WatchNotice::Rescanned`]; if that fails too, [`WatchNotice::Fatal`] is
/// the last notice.
///
/// # Errors
///
/// Returns [`WatchError::Backend`] if the backend cannot be started and
/// [`WatchError::Rescan`] if the baseline snapshot cannot be taken.
pub fn watch(
    root: &Path,
    options: WatchOptions,
) -> Result<(ChangeReceiver, WatchHandle), WatchError> {
    let root = normalize(root);
    let ignore: Arc<[PathBuf]> = options.ignore.iter().map(|p| normalize(p)).collect();
    let debouncer = Arc::new(EventDebouncer::new(options.debounce.min(MAX_DEBOUNCE)));
    let (interruption_tx, interruption_rx) = mpsc::channel();

    let backend = Backend {
        root: root.clone(),
        ignore: Arc::clone(&ignore),
        debouncer: Arc::clone(&debouncer),
        interruptions: interruption_tx,
    };
    let watcher = backend.start().map_err(|source| WatchError::Backend {
        root: root.clone(),
        source,
    })?;
    let baseline = scan::snapshot(&root, &ignore).map_err(|source| WatchError::Rescan {
        root: root.clone(),
        source,
    })?;

    let (notice_tx, notice_rx) = tokio_mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel();

    let worker = DrainWorker {
        backend,
        _watcher: watcher,
        baseline,
        interruptions: interruption_rx,
        notices: notice_tx,
    };
    std::thread::Builder::new()
        .name("quire-watch".to_owned())
        .spawn(move || worker.run(&shutdown_rx))
        .map_err(|source| WatchError::Backend {
            root: root.clone(),
            source: notify::Error::io(source),
        })?;

    tracing::info!(root = %root.display(), "Watching for changes");

    Ok((ChangeReceiver::new(notice_rx), WatchHandle::new(shutdown_tx)))
}

/// Why the drain thread has to rescan.
#[derive(Debug)]
enum Interruption {
    /// The backend reported an error.
    Backend(notify::Error),
    /// The backend dropped events, e.g. on kernel queue overflow.
    Overflow,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(err) => err.fmt(f),
            Self::Overflow => f.write_str("events were dropped by the backend"),
        }
    }
}

/// Everything needed to (re)create the notify watcher.
struct Backend {
    root: PathBuf,
    ignore: Arc<[PathBuf]>,
    debouncer: Arc<EventDebouncer>,
    interruptions: mpsc::Sender<Interruption>,
}

impl Backend {
    fn start(&self) -> Result<notify::RecommendedWatcher, notify::Error> {
        let ignore = Arc::clone(&self.ignore);
        let debouncer = Arc::clone(&self.debouncer);
        let interruptions = self.interruptions.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let interruption = match res {
                Ok(event) => record_notify_event(event, &debouncer, &ignore),
                Err(err) => Some(Interruption::Backend(err)),
            };
            if let Some(interruption) = interruption {
                // Receiver gone means the drain thread already stopped
                let _ = interruptions.send(interruption);
            }
        })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        Ok(watcher)
    }
}

/// Map a notify event kind to a change kind.
fn change_kind(kind: notify::EventKind) -> Option<ChangeKind> {
    match kind {
        notify::EventKind::Create(_) => Some(ChangeKind::Created),
        notify::EventKind::Modify(_) => Some(ChangeKind::Modified),
        notify::EventKind::Remove(_) => Some(ChangeKind::Removed),
        _ => None,
    }
}

/// Record one notify event, or report that events were lost.
fn record_notify_event(
    event: notify::Event,
    debouncer: &EventDebouncer,
    ignore: &[PathBuf],
) -> Option<Interruption> {
    if event.need_rescan() {
        return Some(Interruption::Overflow);
    }
    let kind = change_kind(event.kind)?;
    for path in event.paths {
        let path = normalize(&path);
        if !scan::is_ignored(&path, ignore) {
            debouncer.record(path, kind);
        }
    }
    None
}

/// State owned by the drain thread.
struct DrainWorker {
    backend: Backend,
    _watcher: notify::RecommendedWatcher,
    baseline: Snapshot,
    interruptions: mpsc::Receiver<Interruption>,
    notices: tokio_mpsc::UnboundedSender<WatchNotice>,
}

impl DrainWorker {
    fn run(mut self, shutdown: &mpsc::Receiver<()>) {
        loop {
            match shutdown.recv_timeout(POLL_INTERVAL) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }

            if let Ok(interruption) = self.interruptions.try_recv() {
                match self.recover(&interruption) {
                    Ok(changes) => {
                        if self.notices.send(WatchNotice::Rescanned(changes)).is_err() {
                            return;
                        }
                    }
                    Err(fatal) => {
                        tracing::error!(error = %fatal, "Watch recovery failed");
                        let _ = self.notices.send(WatchNotice::Fatal(fatal));
                        return;
                    }
                }
                continue;
            }

            for change in self.backend.debouncer.drain_ready() {
                for change in scan::reconcile(&mut self.baseline, change, &self.backend.ignore) {
                    if self.notices.send(WatchNotice::Changed(change)).is_err() {
                        return;
                    }
                }
            }
        }
        tracing::debug!(root = %self.backend.root.display(), "Watch stopped");
    }

    /// Re-establish the backend and diff the tree against the baseline.
    fn recover(&mut self, interruption: &Interruption) -> Result<Vec<FileChange>, WatchError> {
        let root = self.backend.root.clone();
        tracing::warn!(
            root = %root.display(),
            reason = %interruption,
            "Watch interrupted, rescanning"
        );

        // Drop interruptions queued by the failing backend
        while self.interruptions.try_recv().is_ok() {}
        self.backend.debouncer.clear();

        self._watcher = self.backend.start().map_err(|source| WatchError::Backend {
            root: root.clone(),
            source,
        })?;
        let current = scan::snapshot(&root, &self.backend.ignore)
            .map_err(|source| WatchError::Rescan { root, source })?;

        let changes = scan::diff(&self.baseline, &current);
        self.baseline = current;
        tracing::info!(changes = changes.len(), "Rescan complete");
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn watcher_for(dir: &Path) -> DependencyWatcher {
        DependencyWatcher::new(PageMatcher::new(dir, &["**/*.md".to_owned()]).unwrap())
    }

    fn modified(path: &Path) -> FileChange {
        FileChange {
            path: path.to_path_buf(),
            kind: ChangeKind::Modified,
        }
    }

    #[test]
    fn test_add_pages_idempotent() {
        let watcher = watcher_for(Path::new("/docs"));

        assert_eq!(
            watcher.add_pages([PathBuf::from("/docs/a.md"), PathBuf::from("/docs/b.md")]),
            2
        );
        assert_eq!(watcher.add_pages([PathBuf::from("/docs/a.md")]), 0);
        assert_eq!(
            watcher.pages(),
            vec![PathBuf::from("/docs/a.md"), PathBuf::from("/docs/b.md")]
        );
    }

    #[test]
    fn test_snapshot_is_stable_across_updates() {
        let watcher = watcher_for(Path::new("/docs"));
        let a = PathBuf::from("/docs/a.md");
        watcher.add_pages([a.clone()]);
        watcher.record_dependencies(&a, [PathBuf::from("/docs/x.md")]);

        let before = watcher.snapshot();
        watcher.record_dependencies(&a, [PathBuf::from("/docs/y.md")]);

        assert_eq!(
            before.page(&a).unwrap().dependencies,
            [PathBuf::from("/docs/x.md")].into()
        );
        assert_eq!(
            watcher.page(&a).unwrap().dependencies,
            [PathBuf::from("/docs/y.md")].into()
        );
    }

    #[test]
    fn test_classify_uses_subscriptions() {
        let watcher = watcher_for(Path::new("/docs"));
        let a = PathBuf::from("/docs/a.md");
        let b = PathBuf::from("/docs/b.md");
        watcher.add_pages([a.clone(), b.clone()]);
        watcher.record_dependencies(&a, []);
        watcher.record_dependencies(&b, [a.clone()]);
        let channel = ChannelId::new();
        watcher.add_subscription(channel, b.clone());

        let events = watcher.classify(&modified(&a));

        assert_eq!(
            events,
            vec![
                WatchEvent::DependencyOnlyChanged {
                    page: a.clone(),
                    changed: a.clone(),
                },
                WatchEvent::PageChanged { page: b.clone() },
            ]
        );

        watcher.remove_subscription(channel);
        let events = watcher.classify(&modified(&a));
        assert!(
            events
                .iter()
                .all(|e| matches!(e, WatchEvent::DependencyOnlyChanged { .. }))
        );
    }

    #[test]
    fn test_classify_registers_new_page() {
        let watcher = watcher_for(Path::new("/docs"));
        let c = PathBuf::from("/docs/c.md");

        let events = watcher.classify(&FileChange {
            path: c.clone(),
            kind: ChangeKind::Created,
        });

        assert_eq!(watcher.pages(), vec![c.clone()]);
        assert_eq!(
            events,
            vec![WatchEvent::DependencyOnlyChanged {
                page: c.clone(),
                changed: c,
            }]
        );
    }

    #[test]
    fn test_classify_ignores_non_page_without_dependents() {
        let watcher = watcher_for(Path::new("/docs"));

        assert!(watcher.classify(&modified(Path::new("/docs/img.png"))).is_empty());
        assert!(watcher.pages().is_empty());
    }

    #[test]
    fn test_remove_page_then_classify_removed() {
        let watcher = watcher_for(Path::new("/docs"));
        let a = PathBuf::from("/docs/a.md");
        watcher.add_pages([a.clone()]);

        let events = watcher.classify(&FileChange {
            path: a.clone(),
            kind: ChangeKind::Removed,
        });
        assert_eq!(events, vec![WatchEvent::PageDeleted { page: a.clone() }]);

        assert!(watcher.remove_page(&a).is_some());
        assert!(watcher.page(&a).is_none());
    }

    #[test]
    fn test_watch_nonexistent_root_fails() {
        let result = watch(Path::new("/nonexistent/quire/root"), WatchOptions::default());

        assert!(matches!(result, Err(WatchError::Backend { .. })));
    }

    #[test]
    fn test_watch_handle_drop_closes_receiver() {
        let temp = tempfile::tempdir().unwrap();
        let (mut rx, handle) = watch(temp.path(), WatchOptions::default()).unwrap();

        drop(handle);
        std::thread::sleep(Duration::from_millis(50));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        assert!(runtime.block_on(rx.recv()).is_none());
    }

    #[tokio::test]
    #[ignore = "timing-sensitive filesystem watch test"]
    async fn test_watch_reports_modification() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.md");
        fs::write(&file, "one").unwrap();

        let (mut rx, _handle) = watch(temp.path(), WatchOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fs::write(&file, "two").unwrap();

        let notice = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        match notice {
            Some(WatchNotice::Changed(change)) => assert_eq!(change.path, normalize(&file)),
            other => panic!("unexpected notice: {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore = "timing-sensitive filesystem watch test"]
    async fn test_watch_drops_ignored_paths() {
        let temp = tempfile::tempdir().unwrap();
        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let options = WatchOptions {
            ignore: vec![out.clone()],
            ..WatchOptions::default()
        };
        let (mut rx, _handle) = watch(temp.path(), options).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fs::write(out.join("a.html"), "x").unwrap();

        let notice = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(notice.is_err(), "ignored path produced {notice:?}");
    }

    fn drain_worker(
        root: &Path,
    ) -> (
        DrainWorker,
        mpsc::Sender<Interruption>,
        tokio_mpsc::UnboundedReceiver<WatchNotice>,
    ) {
        let (interruption_tx, interruptions) = mpsc::channel();
        let backend = Backend {
            root: normalize(root),
            ignore: Arc::from(Vec::<PathBuf>::new()),
            debouncer: Arc::new(EventDebouncer::new(MAX_DEBOUNCE)),
            interruptions: interruption_tx.clone(),
        };
        let watcher = backend.start().unwrap();
        let baseline = scan::snapshot(&backend.root, &[]).unwrap();
        let (notices, notice_rx) = tokio_mpsc::unbounded_channel();
        let worker = DrainWorker {
            backend,
            _watcher: watcher,
            baseline,
            interruptions,
            notices,
        };
        (worker, interruption_tx, notice_rx)
    }

    /// Wait for the first notice that `pick` accepts.
    fn wait_for<T>(
        rx: &mut tokio_mpsc::UnboundedReceiver<WatchNotice>,
        mut pick: impl FnMut(WatchNotice) -> Option<T>,
    ) -> T {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            match rx.try_recv() {
                Ok(notice) => {
                    if let Some(found) = pick(notice) {
                        return found;
                    }
                }
                Err(_) => std::thread::sleep(POLL_INTERVAL),
            }
        }
        panic!("expected notice did not arrive");
    }

    #[test]
    fn test_overflow_event_requests_rescan() {
        let debouncer = EventDebouncer::new(Duration::from_millis(1));
        let event = notify::Event::new(notify::EventKind::Other)
            .add_path(PathBuf::from("/docs/a.md"))
            .set_flag(notify::event::Flag::Rescan);

        let interruption = record_notify_event(event, &debouncer, &[]);

        assert!(matches!(interruption, Some(Interruption::Overflow)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_plain_event_is_recorded() {
        let debouncer = EventDebouncer::new(Duration::from_millis(1));
        let event = notify::Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/docs/a.md"));

        assert!(record_notify_event(event, &debouncer, &[]).is_none());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(
            debouncer.drain_ready(),
            vec![FileChange {
                path: PathBuf::from("/docs/a.md"),
                kind: ChangeKind::Modified,
            }]
        );
    }

    #[test]
    fn test_recover_reports_changes_since_baseline() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(temp.path());
        fs::write(root.join("edited.md"), "one").unwrap();
        fs::write(root.join("gone.md"), "one").unwrap();
        let (mut worker, _interruptions, _notices) = drain_worker(&root);

        let edited = fs::File::options().write(true).open(root.join("edited.md")).unwrap();
        edited
            .set_modified(std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(60))
            .unwrap();
        fs::remove_file(root.join("gone.md")).unwrap();
        fs::write(root.join("new.md"), "one").unwrap();

        let changes = worker.recover(&Interruption::Overflow).unwrap();

        assert_eq!(
            changes,
            vec![
                FileChange {
                    path: root.join("edited.md"),
                    kind: ChangeKind::Modified,
                },
                FileChange {
                    path: root.join("gone.md"),
                    kind: ChangeKind::Removed,
                },
                FileChange {
                    path: root.join("new.md"),
                    kind: ChangeKind::Created,
                },
            ]
        );
    }

    #[test]
    fn test_interruption_yields_rescanned_notice() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(temp.path());
        let (worker, interruptions, mut notices) = drain_worker(&root);
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let thread = std::thread::spawn(move || worker.run(&shutdown_rx));

        interruptions.send(Interruption::Overflow).unwrap();

        let changes = wait_for(&mut notices, |notice| match notice {
            WatchNotice::Rescanned(changes) => Some(changes),
            _ => None,
        });
        assert!(changes.is_empty());

        shutdown_tx.send(()).unwrap();
        thread.join().unwrap();
    }

    #[test]
    fn test_failed_recovery_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(&temp.path().join("docs"));
        fs::create_dir_all(&root).unwrap();
        let (worker, interruptions, mut notices) = drain_worker(&root);
        let (_shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let thread = std::thread::spawn(move || worker.run(&shutdown_rx));

        fs::remove_dir_all(&root).unwrap();
        interruptions.send(Interruption::Overflow).unwrap();

        let fatal = wait_for(&mut notices, |notice| match notice {
            WatchNotice::Fatal(err) => Some(err),
            _ => None,
        });
        assert!(matches!(fatal, WatchError::Backend { .. } | WatchError::Rescan { .. }));
        thread.join().unwrap();
    }

    #[test]
    fn test_page_moved_out_of_tree_drains_as_removed() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(&temp.path().join("docs"));
        fs::create_dir_all(&root).unwrap();
        let page = root.join("a.md");
        fs::write(&page, "# A").unwrap();
        let (worker, _interruptions, mut notices) = drain_worker(&root);
        let debouncer = Arc::clone(&worker.backend.debouncer);
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let thread = std::thread::spawn(move || worker.run(&shutdown_rx));

        fs::rename(&page, temp.path().join("a.md")).unwrap();
        debouncer.record(page.clone(), ChangeKind::Modified);

        let change = wait_for(&mut notices, |notice| match notice {
            WatchNotice::Changed(change) if change.path == page => Some(change),
            _ => None,
        });
        assert_eq!(change.kind, ChangeKind::Removed);

        shutdown_tx.send(()).unwrap();
        thread.join().unwrap();
    }
}
