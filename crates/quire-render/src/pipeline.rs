//! Render worker pool.
//!
//! Renders run on named worker threads that share one job queue. Each job
//! runs under `catch_unwind`: a panicking transform produces an error page
//! and never reaches the caller's thread. A worker that caught a panic is
//! considered unhealthy and retires after handing its slot to a fresh
//! thread; [`RenderPipeline::ensure_healthy`] also refills any slot whose
//! thread has finished.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use quire_paths::{PathMapper, normalize};
use quire_tree::{Navigation, PageMeta};
use tokio::sync::oneshot;

use crate::error::PipelineError;
use crate::markdown::page::render_error_page;
use crate::output::write_atomic;
use crate::transform::{RenderMode, Transform, TransformInput};

/// Pool configuration.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Number of worker threads. Zero is treated as one.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, std::num::NonZero::get),
        }
    }
}

/// One render job.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    /// Absolute source path.
    pub file_path: PathBuf,
    /// Root of the source tree.
    pub input_dir: PathBuf,
    /// Root of the output tree.
    pub output_dir: PathBuf,
    /// Render mode.
    pub mode: RenderMode,
    /// Navigation snapshot to embed.
    pub navigation: Arc<Navigation>,
}

/// How a render ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// The transform succeeded.
    Rendered,
    /// The transform failed or panicked; the output holds an error page.
    Failed(String),
}

/// Result of a render whose output was written.
#[derive(Clone, Debug)]
pub struct RenderOutcome {
    /// Absolute, normalized source path.
    pub source: PathBuf,
    /// Absolute output path.
    pub output_path: PathBuf,
    /// Success or captured failure.
    pub status: RenderStatus,
    /// Files the page was built from. Empty on failure.
    pub dependencies: Vec<PathBuf>,
    /// Navigation metadata. `None` on failure.
    pub meta: Option<PageMeta>,
    /// Wall time spent on the worker.
    pub elapsed: Duration,
}

impl RenderOutcome {
    /// Whether the transform succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RenderStatus::Rendered
    }
}

type Reply = oneshot::Sender<Result<RenderOutcome, PipelineError>>;

struct Job {
    request: RenderRequest,
    reply: Reply,
}

/// State shared between the pipeline handle and its workers.
struct Shared {
    transform: Arc<dyn Transform>,
    jobs: Mutex<mpsc::Receiver<Job>>,
    slots: Mutex<Vec<Option<JoinHandle<()>>>>,
}

impl Shared {
    fn spawn_worker(self: &Arc<Self>, slot: usize) -> io::Result<JoinHandle<()>> {
        let shared = Arc::clone(self);
        thread::Builder::new()
            .name(format!("quire-render-{slot}"))
            .spawn(move || shared.work(slot))
    }

    fn work(self: Arc<Self>, slot: usize) {
        loop {
            let job = lock(&self.jobs).recv();
            let Ok(job) = job else {
                break;
            };

            let (result, panicked) = run_job(self.transform.as_ref(), &job.request);
            // Receiver gone means the caller stopped waiting
            let _ = job.reply.send(result);

            if panicked {
                tracing::warn!(slot, "Render worker retiring after panic");
                self.replace(slot);
                return;
            }
        }
        tracing::debug!(slot, "Render worker stopped");
    }

    /// Hand `slot` to a new thread. On failure the slot keeps the retiring
    /// thread's handle and the next dispatch retries.
    fn replace(self: &Arc<Self>, slot: usize) {
        match self.spawn_worker(slot) {
            Ok(handle) => {
                if let Some(entry) = lock(&self.slots).get_mut(slot) {
                    *entry = Some(handle);
                }
            }
            Err(e) => {
                tracing::error!(slot, error = %e, "Failed to replace render worker");
            }
        }
    }
}

/// Pool of isolated render workers.
pub struct RenderPipeline {
    shared: Arc<Shared>,
    queue: Mutex<Option<mpsc::Sender<Job>>>,
}

impl RenderPipeline {
    /// Start the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Spawn`] if a worker thread cannot be started.
    pub fn start(
        transform: Arc<dyn Transform>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::channel();
        let workers = config.workers.max(1);
        let shared = Arc::new(Shared {
            transform,
            jobs: Mutex::new(rx),
            slots: Mutex::new((0..workers).map(|_| None).collect()),
        });
        let pipeline = Self {
            shared,
            queue: Mutex::new(Some(tx)),
        };
        pipeline.ensure_healthy()?;

        tracing::debug!(workers, "Render pipeline started");
        Ok(pipeline)
    }

    /// Refill every slot whose thread is gone.
    ///
    /// Returns how many workers were started.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShutDown`] after [`shutdown`](Self::shutdown)
    /// and [`PipelineError::Spawn`] if a thread cannot be started.
    pub fn ensure_healthy(&self) -> Result<usize, PipelineError> {
        if lock(&self.queue).is_none() {
            return Err(PipelineError::ShutDown);
        }

        let mut slots = lock(&self.shared.slots);
        let mut started = 0;
        for (slot, entry) in slots.iter_mut().enumerate() {
            if entry.as_ref().is_none_or(JoinHandle::is_finished) {
                if let Some(finished) = entry.take() {
                    let _ = finished.join();
                }
                *entry = Some(self.shared.spawn_worker(slot).map_err(PipelineError::Spawn)?);
                started += 1;
            }
        }
        Ok(started)
    }

    /// Number of worker slots currently holding a running thread.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        lock(&self.shared.slots)
            .iter()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Render one page and write its output.
    ///
    /// Transform failures and panics are not errors here: they yield an
    /// outcome with [`RenderStatus::Failed`] and an error page on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the pipeline is shut down, the source is
    /// outside the input directory, or the output cannot be written.
    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutcome, PipelineError> {
        self.ensure_healthy()?;

        let (reply, response) = oneshot::channel();
        {
            let queue = lock(&self.queue);
            let sender = queue.as_ref().ok_or(PipelineError::ShutDown)?;
            sender
                .send(Job { request, reply })
                .map_err(|_| PipelineError::ShutDown)?;
        }

        response.await.map_err(|_| PipelineError::WorkerLost)?
    }

    /// Stop accepting jobs, let queued jobs finish, and join the workers.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let Some(sender) = lock(&self.queue).take() else {
            return;
        };
        drop(sender);

        let handles: Vec<JoinHandle<()>> = lock(&self.shared.slots)
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        for handle in handles {
            let _ = handle.join();
        }
        tracing::debug!("Render pipeline shut down");
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one job on the current worker. The flag is `true` if the transform
/// panicked.
fn run_job(
    transform: &dyn Transform,
    request: &RenderRequest,
) -> (Result<RenderOutcome, PipelineError>, bool) {
    let started = Instant::now();
    let mapper = PathMapper::new(request.input_dir.clone(), request.output_dir.clone());
    let source = normalize(&request.file_path);
    let Some(source_rel) = mapper.source_relative(&source) else {
        return (Err(PipelineError::OutsideInput { path: source }), false);
    };
    let output_path = mapper.output_dir().join(mapper.output_relative(&source_rel));
    let live_reload = request.mode == RenderMode::Serve;

    let input = TransformInput {
        source: &source,
        source_rel: &source_rel,
        mapper: &mapper,
        mode: request.mode,
        navigation: &request.navigation,
    };
    let caught = panic::catch_unwind(AssertUnwindSafe(|| transform.transform(&input)));

    let mut panicked = false;
    let (html, status, dependencies, meta) = match caught {
        Ok(Ok(output)) => (
            output.html,
            RenderStatus::Rendered,
            output.dependencies,
            Some(output.meta),
        ),
        Ok(Err(e)) => {
            let message = e.to_string();
            tracing::warn!(path = %source.display(), error = %message, "Render failed");
            let url = mapper.url_for(&source_rel);
            (
                render_error_page(&url, &message, live_reload),
                RenderStatus::Failed(message),
                Vec::new(),
                None,
            )
        }
        Err(payload) => {
            panicked = true;
            let message = format!("Render panicked: {}", panic_message(payload.as_ref()));
            tracing::error!(path = %source.display(), error = %message, "Render panicked");
            let url = mapper.url_for(&source_rel);
            (
                render_error_page(&url, &message, live_reload),
                RenderStatus::Failed(message),
                Vec::new(),
                None,
            )
        }
    };

    if let Err(e) = write_atomic(&output_path, html.as_bytes()) {
        return (
            Err(PipelineError::Write {
                path: output_path,
                source: e,
            }),
            panicked,
        );
    }

    let elapsed = started.elapsed();
    tracing::debug!(
        path = %source.display(),
        elapsed_ms = elapsed.as_millis(),
        "Rendered page"
    );
    let outcome = RenderOutcome {
        source,
        output_path,
        status,
        dependencies,
        meta,
        elapsed,
    };
    (Ok(outcome), panicked)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
