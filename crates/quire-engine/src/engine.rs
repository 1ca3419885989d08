//! The engine: one serialized control flow over pages, edges and the tree.
//!
//! Every operation that touches shared state (a watch event, a subscription
//! change, an on-demand render, a full build) holds the page-tree lock for
//! its whole logical step. Rendering itself runs on the pipeline's workers;
//! a full build dispatches all pages at once so renders proceed in parallel.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use quire_paths::{PathMapper, normalize};
use quire_render::{
    PipelineError, RenderOutcome, RenderPipeline, RenderRequest, RenderStatus, Transform,
    prepare_output,
};
use quire_tree::{Navigation, PageTree};
use quire_watch::{
    ChangeReceiver, DependencyWatcher, PageMatcher, WatchEvent, WatchHandle, WatchNotice,
    WatchOptions, scan_pages, watch,
};
use tokio::sync::{Mutex, MutexGuard, broadcast, mpsc, watch as signal};
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::error::{EngineError, StartupError};
use crate::event::{EngineEvent, ReloadEvent};

/// Buffered reload notifications per subscriber.
const RELOAD_CAPACITY: usize = 256;

/// Result of [`Engine::build_all`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Pages rendered successfully in the last pass.
    pub rendered: usize,
    /// Pages whose last render failed, sorted.
    pub failed: Vec<PathBuf>,
    /// Number of full passes. Two when the first pass changed the tree.
    pub passes: usize,
}

/// Pages rendered during one step.
#[derive(Debug, Default)]
struct Step {
    rendered: BTreeSet<PathBuf>,
}

/// Incremental documentation build engine.
pub struct Engine {
    config: EngineConfig,
    mapper: PathMapper,
    deps: DependencyWatcher,
    pipeline: Arc<RenderPipeline>,
    tree: Mutex<PageTree>,
    reloads: broadcast::Sender<ReloadEvent>,
    stop: signal::Sender<bool>,
}

impl Engine {
    /// Prepare the output tree, restore the page tree, discover pages and
    /// start the render pool.
    ///
    /// Tree entries whose source no longer exists are dropped together with
    /// their output.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the output directory cannot be created,
    /// a page pattern is invalid, or the render pool cannot start.
    pub fn start(
        config: EngineConfig,
        transform: Arc<dyn Transform>,
    ) -> Result<Self, StartupError> {
        let mut config = config;
        config.output_dir = absolute(&config.output_dir);
        prepare_output(&config.output_dir, &config.plugins)?;
        config.output_dir = resolve(&config.output_dir);
        config.source_dir = resolve(&config.source_dir);
        config.watch_root = resolve(&config.watch_root);
        config.tree_file = absolute(&config.tree_file);
        config.watch_ignore = config.watch_ignore.iter().map(|p| resolve(p)).collect();

        let matcher = PageMatcher::new(&config.source_dir, &config.page_patterns)?;
        let deps = DependencyWatcher::new(matcher);
        let pages = deps.add_pages(scan_pages(deps.matcher()));

        let mapper = PathMapper::new(config.source_dir.clone(), config.output_dir.clone());
        let mut tree = PageTree::new(config.tree_file.clone());
        tree.restore();
        let pruned = tree.retain(|rel| mapper.source_path(rel).is_file());
        if !pruned.is_empty() {
            for rel in &pruned {
                remove_output(&mapper.output_dir().join(mapper.output_relative(rel)));
            }
            tracing::info!(count = pruned.len(), "Dropped pages whose source is gone");
            if let Err(e) = tree.save() {
                tracing::warn!(error = %e, "Failed to save page tree");
            }
        }

        let pipeline = RenderPipeline::start(transform, config.pipeline)?;
        let (reloads, _) = broadcast::channel(RELOAD_CAPACITY);
        let (stop, _) = signal::channel(false);

        tracing::info!(
            source = %config.source_dir.display(),
            output = %config.output_dir.display(),
            pages,
            "Engine started"
        );

        Ok(Self {
            config,
            mapper,
            deps,
            pipeline: Arc::new(pipeline),
            tree: Mutex::new(tree),
            reloads,
            stop,
        })
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Path mapping for the resolved roots.
    #[must_use]
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Pages, dependency edges and subscriptions.
    #[must_use]
    pub fn dependencies(&self) -> &DependencyWatcher {
        &self.deps
    }

    /// Receive a [`ReloadEvent`] each time an open page's output is
    /// rewritten.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.reloads.subscribe()
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.stop.borrow()
    }

    /// Current navigation snapshot.
    pub async fn navigation(&self) -> Navigation {
        self.tree.lock().await.navigation()
    }

    /// Absolute source path of the page served at `url`, if any.
    ///
    /// `url` is a percent-decoded URL path.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> Option<PathBuf> {
        self.mapper
            .source_candidates(url)
            .into_iter()
            .map(|rel| self.mapper.source_path(&rel))
            .find(|source| self.is_page(source))
    }

    /// Start watching the configured root.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Watch`] if the backend cannot be started.
    pub fn watch(&self) -> Result<(ChangeReceiver, WatchHandle), StartupError> {
        let mut ignore = vec![self.config.output_dir.clone(), self.config.tree_file.clone()];
        ignore.extend(self.config.watch_ignore.iter().cloned());
        let options = WatchOptions {
            ignore,
            debounce: self.config.debounce,
        };
        Ok(watch(&self.config.watch_root, options)?)
    }

    /// The processing loop.
    ///
    /// Handles filesystem notices and engine events one step at a time until
    /// shutdown or until the watch stops. A failing step is logged and the
    /// loop continues.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Watch`] if the watch failed beyond recovery.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        mut changes: ChangeReceiver,
    ) -> Result<(), StartupError> {
        let mut stop = self.stop.subscribe();
        let mut events_open = true;

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = stop.changed() => break,
                notice = changes.recv() => match notice {
                    Some(WatchNotice::Changed(change)) => {
                        self.step(EngineEvent::FileChanged(change)).await;
                    }
                    Some(WatchNotice::Rescanned(found)) => {
                        tracing::info!(changes = found.len(), "Applying rescan");
                        for change in found {
                            self.step(EngineEvent::FileChanged(change)).await;
                        }
                    }
                    Some(WatchNotice::Fatal(err)) => {
                        tracing::error!(error = %err, "File watch lost");
                        return Err(StartupError::Watch(err));
                    }
                    None => {
                        tracing::debug!("Watch closed");
                        break;
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.step(event).await,
                    None => events_open = false,
                },
            }
        }
        Ok(())
    }

    async fn step(&self, event: EngineEvent) {
        if let Err(e) = self.handle_event(event).await {
            tracing::warn!(error = %e, "Event not processed");
        }
    }

    /// Process one event as a single step.
    ///
    /// A file change is classified against the current dependency snapshot
    /// and every resulting [`WatchEvent`] is dispatched before the step ends.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutDown`] after shutdown. Render failures are
    /// logged, not returned.
    pub async fn handle_event(&self, event: EngineEvent) -> Result<(), EngineError> {
        let mut tree = self.begin().await?;
        match event {
            EngineEvent::FileChanged(change) => {
                let mut step = Step::default();
                for event in self.deps.classify(&change) {
                    self.dispatch(&mut tree, event, &mut step).await;
                }
            }
            EngineEvent::SubscriptionAdded { channel, page } => {
                let page = normalize(&page);
                tracing::debug!(%channel, page = %page.display(), "Subscription added");
                self.deps.add_subscription(channel, page);
            }
            EngineEvent::SubscriptionRemoved { channel } => {
                if let Some(page) = self.deps.remove_subscription(channel) {
                    tracing::debug!(%channel, page = %page.display(), "Subscription removed");
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&self, tree: &mut PageTree, event: WatchEvent, step: &mut Step) {
        match event {
            WatchEvent::PageChanged { page } => {
                if step.rendered.contains(&page) {
                    tracing::debug!(page = %page.display(), "Already rendered in this step");
                    return;
                }
                if let Err(e) = self.render_and_settle(tree, &page, step).await {
                    tracing::warn!(page = %page.display(), error = %e, "Re-render failed");
                }
            }
            WatchEvent::DependencyOnlyChanged { page, changed } => {
                tracing::debug!(
                    page = %page.display(),
                    changed = %changed.display(),
                    "Invalidating output"
                );
                self.invalidate(&page);
            }
            WatchEvent::PageDeleted { page } => self.delete_page(tree, &page, step).await,
        }
    }

    /// Make sure `source` has current output and return its output path.
    ///
    /// Renders when the page has not been rendered in this session, is
    /// flagged for another pass, or its output is missing. A new page that
    /// the watch has not reported yet is registered on the spot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAPage`] for anything that is not a page and
    /// [`EngineError::Pipeline`] if the render could not be written. A
    /// failed transform still succeeds here: its output is an error page.
    pub async fn ensure_rendered(&self, source: &Path) -> Result<PathBuf, EngineError> {
        let source = normalize(source);
        let mut tree = self.begin().await?;

        let not_a_page = || EngineError::NotAPage { path: source.clone() };
        if !self.is_page(&source) {
            return Err(not_a_page());
        }
        self.deps.add_pages([source.clone()]);
        let page = self.deps.page(&source).ok_or_else(not_a_page)?;
        let output = self.mapper.output_path(&source).ok_or_else(not_a_page)?;

        if page.rendered && !page.needs_another_pass && output.is_file() {
            return Ok(output);
        }

        let mut step = Step::default();
        self.render_and_settle(&mut tree, &source, &mut step).await?;
        Ok(output)
    }

    /// Render every page, save the tree, and render everything once more if
    /// that changed the tree.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutDown`] after shutdown.
    pub async fn build_all(&self) -> Result<BuildSummary, EngineError> {
        let started = Instant::now();
        let mut tree = self.begin().await?;
        let pages = self.deps.pages();

        let mut summary = BuildSummary::default();
        loop {
            summary.passes += 1;
            let (rendered, failed) = self.render_batch(&mut tree, &pages).await?;
            summary.rendered = rendered;
            summary.failed = failed;

            let changed = self.save(&mut tree);
            if !changed || summary.passes > 1 {
                break;
            }
            tracing::debug!("Page tree changed, rendering another pass");
        }

        tracing::info!(
            pages = pages.len(),
            failed = summary.failed.len(),
            passes = summary.passes,
            elapsed_ms = started.elapsed().as_millis(),
            "Build complete"
        );
        Ok(summary)
    }

    /// Stop processing and release the render pool.
    ///
    /// Waits for the step in progress. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.stop.send_replace(true) {
            return;
        }
        let _tree = self.tree.lock().await;
        // Joining the workers blocks until queued jobs finish
        let pipeline = Arc::clone(&self.pipeline);
        if let Err(err) = tokio::task::spawn_blocking(move || pipeline.shutdown()).await {
            tracing::error!(error = %err, "Render pipeline shutdown failed");
        }
        tracing::info!("Engine shut down");
    }

    async fn begin(&self) -> Result<MutexGuard<'_, PageTree>, EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        let tree = self.tree.lock().await;
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        Ok(tree)
    }

    fn is_page(&self, source: &Path) -> bool {
        self.deps.page(source).is_some()
            || (source.is_file() && self.deps.matcher().matches(source))
    }

    fn request(&self, source: &Path, navigation: Arc<Navigation>) -> RenderRequest {
        RenderRequest {
            file_path: source.to_path_buf(),
            input_dir: self.config.source_dir.clone(),
            output_dir: self.config.output_dir.clone(),
            mode: self.config.mode,
            navigation,
        }
    }

    /// Render one page and commit the result, without saving the tree.
    async fn render_one(
        &self,
        tree: &mut PageTree,
        source: &Path,
    ) -> Result<RenderOutcome, EngineError> {
        let request = self.request(source, Arc::new(tree.navigation()));
        let outcome = self.pipeline.render(request).await?;
        self.commit(tree, &outcome);
        Ok(outcome)
    }

    /// Render `source`, save the tree and run the cascade if the tree
    /// changed.
    async fn render_and_settle(
        &self,
        tree: &mut PageTree,
        source: &Path,
        step: &mut Step,
    ) -> Result<RenderOutcome, EngineError> {
        let outcome = self.render_one(tree, source).await?;
        step.rendered.insert(outcome.source.clone());
        self.notify(&outcome.source);

        if self.save(tree) {
            self.cascade(tree, Some(&outcome.source), step).await;
        }
        Ok(outcome)
    }

    /// Re-render after a structural tree change: the trigger once more, then
    /// every other open page once, one at a time. Closed pages are flagged
    /// and re-render when next requested. Never recurses.
    async fn cascade(&self, tree: &mut PageTree, trigger: Option<&Path>, step: &mut Step) {
        let open = self.deps.subscribed_pages();
        let mut settled = open.clone();
        settled.extend(trigger.map(Path::to_path_buf));
        let flagged = self.deps.mark_needs_another_pass(&settled);

        let mut queue: Vec<PathBuf> = trigger.map(Path::to_path_buf).into_iter().collect();
        queue.extend(open.into_iter().filter(|page| Some(page.as_path()) != trigger));
        tracing::info!(
            open = queue.len(),
            flagged = flagged.len(),
            "Page tree changed, re-rendering open pages"
        );

        for page in queue {
            if self.deps.page(&page).is_none() {
                continue;
            }
            match self.render_one(tree, &page).await {
                Ok(outcome) => {
                    step.rendered.insert(outcome.source.clone());
                    self.notify(&outcome.source);
                }
                Err(e) => {
                    tracing::warn!(page = %page.display(), error = %e, "Re-render failed");
                }
            }
        }

        if self.save(tree) {
            let flagged = self.deps.mark_needs_another_pass(&[]);
            tracing::debug!(flagged = flagged.len(), "Page tree still changing after re-render");
        }
    }

    async fn render_batch(
        &self,
        tree: &mut PageTree,
        pages: &[PathBuf],
    ) -> Result<(usize, Vec<PathBuf>), EngineError> {
        let navigation = Arc::new(tree.navigation());
        let mut tasks = JoinSet::new();
        for page in pages {
            let pipeline = Arc::clone(&self.pipeline);
            let request = self.request(page, Arc::clone(&navigation));
            let page = page.clone();
            tasks.spawn(async move { (page, pipeline.render(request).await) });
        }

        let mut outcomes = Vec::with_capacity(pages.len());
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => outcomes.push(outcome),
                Ok((_, Err(PipelineError::ShutDown))) => return Err(EngineError::ShutDown),
                Ok((page, Err(e))) => {
                    tracing::warn!(page = %page.display(), error = %e, "Render not written");
                    failed.push(page);
                }
                Err(e) => tracing::error!(error = %e, "Render task failed"),
            }
        }

        outcomes.sort_by(|a, b| a.source.cmp(&b.source));
        let mut rendered = 0;
        for outcome in &outcomes {
            self.commit(tree, outcome);
            if outcome.is_success() {
                rendered += 1;
            } else {
                failed.push(outcome.source.clone());
            }
        }
        failed.sort();
        Ok((rendered, failed))
    }

    /// Apply a render outcome to the dependency graph and the tree.
    ///
    /// A failed render keeps the edges and tree entry of the last good one.
    fn commit(&self, tree: &mut PageTree, outcome: &RenderOutcome) {
        match (&outcome.status, &outcome.meta) {
            (RenderStatus::Rendered, Some(meta)) => {
                self.deps
                    .record_dependencies(&outcome.source, outcome.dependencies.clone());
                if let Some(rel) = self.mapper.source_relative(&outcome.source) {
                    tree.add(rel, meta.clone());
                }
            }
            _ => self.deps.record_failure(&outcome.source),
        }
    }

    /// Save the tree. Returns whether its structure changed.
    fn save(&self, tree: &mut PageTree) -> bool {
        match tree.save() {
            Ok(outcome) => outcome.needs_another_pass,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save page tree");
                false
            }
        }
    }

    async fn delete_page(&self, tree: &mut PageTree, page: &Path, step: &mut Step) {
        self.invalidate(page);
        self.deps.remove_page(page);
        self.notify(page);

        let removed = self
            .mapper
            .source_relative(page)
            .is_some_and(|rel| tree.remove(&rel));
        tracing::info!(page = %page.display(), "Page deleted");

        if removed && self.save(tree) {
            self.cascade(tree, None, step).await;
        }
    }

    /// Delete the output of `page`.
    fn invalidate(&self, page: &Path) {
        if let Some(output) = self.mapper.output_path(page) {
            remove_output(&output);
        }
    }

    /// Tell live channels displaying `page` that its output changed.
    fn notify(&self, page: &Path) {
        if !self.deps.is_subscribed(page) {
            return;
        }
        let url = self
            .mapper
            .source_relative(page)
            .map(|rel| self.mapper.url_for(&rel))
            .unwrap_or_default();
        tracing::debug!(page = %page.display(), %url, "Reload");
        // No receivers is fine
        let _ = self.reloads.send(ReloadEvent {
            page: page.to_path_buf(),
            url,
        });
    }
}

fn remove_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove output"),
    }
}

/// Absolute, lexically normalized form of `path`.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).map_or_else(|_| normalize(path), |p| normalize(&p))
}

/// Canonical form of an existing path, absolute form otherwise.
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| absolute(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_normalizes() {
        assert_eq!(absolute(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn test_resolve_missing_falls_back_to_absolute() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope/../gone");

        let resolved = resolve(&missing);

        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("gone"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }

    #[test]
    fn test_remove_output_missing_is_silent() {
        let temp = tempfile::tempdir().unwrap();
        remove_output(&temp.path().join("missing.html"));

        let file = temp.path().join("page.html");
        fs::write(&file, "x").unwrap();
        remove_output(&file);
        assert!(!file.exists());
    }
}
