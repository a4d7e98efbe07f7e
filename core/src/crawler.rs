use crate::errors::DendrographerErrors;
use crate::handler::HandlerRegistry;
use crate::queue::TaskQueue;
use crate::result::CrawlResult;
use crate::task::CrawlTask;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use typed_builder::TypedBuilder;

#[allow(unused_imports)]
use crate::handler::ProtocolHandler;

/// [`ResultProcessor`] is the seam towards whatever consumes listings downstream (an
/// index build, a change log... etc.). The crawler hands every [`CrawlResult`] to it and
/// gets back the one bit the scheduler needs: did the listing change since it was last
/// seen? That bit feeds the adaptive revisit cadence
///
/// # Required Methods
/// When implementing the [`ResultProcessor`], one must provide an implementation for
/// [`ResultProcessor::process`]. Implementations are invoked concurrently from all crawl
/// workers
///
/// # Trait Implementation(s)
/// [`DigestResultProcessor`] is the in-crate reference implementation
///
/// # See Also
/// - [`DigestResultProcessor`]
/// - [`Crawler`]
#[async_trait]
pub trait ResultProcessor: Send + Sync {
    /// Consumes one listing result and reports whether the directory's content changed
    /// since the previous observation
    async fn process(&self, result: &CrawlResult) -> bool;
}

/// [`DigestResultProcessor`] is the reference [`ResultProcessor`]: it remembers a
/// SHA-256 digest of the ordered entry list per canonical URL and reports a change
/// whenever the digest differs from the remembered one. A ``found = false`` result
/// clears the URL's record. The memory is process-local, after a restart the first
/// observation of every directory conservatively counts as unchanged
///
/// # See Also
/// - [`ResultProcessor`]
#[derive(Default)]
pub struct DigestResultProcessor {
    digests: DashMap<String, [u8; 32]>,
}

impl Debug for DigestResultProcessor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestResultProcessor")
            .field("tracked", &self.digests.len())
            .finish()
    }
}

impl DigestResultProcessor {
    /// Creates / Constructs a new [`DigestResultProcessor`] instance with no remembered
    /// listings
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultProcessor for DigestResultProcessor {
    async fn process(&self, result: &CrawlResult) -> bool {
        let url = result.url().as_str().to_string();
        if !result.found() {
            self.digests.remove(&url);
            return false;
        }
        let mut hasher = Sha256::new();
        for (name, metadata) in result.entries() {
            hasher.update(name.as_bytes());
            hasher.update(match metadata.is_dir() {
                Some(true) => b"d",
                Some(false) => b"f",
                None => b"u",
            });
            hasher.update(b"\0");
        }
        let digest: [u8; 32] = hasher.finalize().into();
        match self.digests.insert(url, digest) {
            Some(previous) => previous != digest,
            None => false,
        }
    }
}

/// This is the builder configs to use for building a [`Crawler`] instance.
/// By itself it should not be used, and it resides in [`Crawler::builder`]
#[derive(TypedBuilder)]
#[builder(build_method(into = Crawler))]
pub struct CrawlerConfig {
    /// The [`TaskQueue`] the workers drain and report back into
    ///
    /// # See Also
    /// - [`TaskQueue`]
    queue: Arc<TaskQueue>,

    /// The [`HandlerRegistry`] consulted for every dispatched task's URL scheme
    ///
    /// # See Also
    /// - [`HandlerRegistry`]
    handlers: Arc<HandlerRegistry>,

    /// The [`ResultProcessor`] every listing result is handed to
    ///
    /// # Default Value
    /// A fresh [`DigestResultProcessor`]
    ///
    /// # See Also
    /// - [`ResultProcessor`]
    /// - [`DigestResultProcessor`]
    #[builder(
        default = Arc::new(DigestResultProcessor::new()),
        setter(transform = |processor: impl ResultProcessor + 'static| Arc::new(processor) as Arc<dyn ResultProcessor>),
    )]
    results: Arc<dyn ResultProcessor>,

    /// How many crawl workers run concurrently
    ///
    /// # Default Value
    /// 4 workers
    #[builder(default = 4)]
    workers: usize,

    /// The timeout one handler execution is allowed to take before the task is reported
    /// back as errored
    ///
    /// # Default Value
    /// 120 seconds
    #[builder(default = Duration::from_secs(120))]
    handler_timeout: Duration,

    /// The upper bound on how long an idle worker sleeps before polling the queue
    /// again, the actual sleep is the interval until the earliest scheduled site when
    /// that is shorter
    ///
    /// # Default Value
    /// 30 seconds
    #[builder(default = Duration::from_secs(30))]
    poll_ceiling: Duration,
}

impl From<CrawlerConfig> for Crawler {
    fn from(config: CrawlerConfig) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            queue: config.queue,
            handlers: config.handlers,
            results: config.results,
            workers: config.workers,
            handler_timeout: config.handler_timeout,
            poll_ceiling: config.poll_ceiling,
            shutdown,
            processes: Mutex::new(Vec::new()),
        }
    }
}

/// [`Crawler`] is the worker pool that drains the [`TaskQueue`]: each worker repeatedly
/// takes a due task, invokes the [`ProtocolHandler`] matching the task URL's scheme and
/// reports the outcome back to the queue, expanding the frontier with every directory
/// the listing revealed
///
/// # Worker Behavior
/// An empty queue makes a worker sleep up to the interval until the earliest scheduled
/// site (bounded by the configured ceiling). A missing handler is a configuration error
/// and counts as a failed execution. A handler execution runs outside of the queue's
/// critical section under the configured timeout, a timeout or a transient failure
/// reports the task back as errored. On shutdown a worker that is mid-execution
/// discards the handler's output and reports the task as errored, so the entry the
/// dispatch consumed is never lost
///
/// # Constructor(s)
/// When constructing a [`Crawler`], one can use [`Crawler::builder`]
///
/// # Example
/// ```ignore
/// use dendrographer::crawler::Crawler;
/// use dendrographer::handler::HandlerRegistry;
///
/// let crawler = Crawler::builder()
///     .queue(queue.clone())
///     .handlers(Arc::new(HandlerRegistry::with_default_handlers(&sites)))
///     .workers(8)
///     .build();
///
/// crawler.start().await;
/// // ... crawl until shutdown ...
/// crawler.stop().await;
/// ```
///
/// # See Also
/// - [`TaskQueue`]
/// - [`HandlerRegistry`]
/// - [`ResultProcessor`]
pub struct Crawler {
    queue: Arc<TaskQueue>,
    handlers: Arc<HandlerRegistry>,
    results: Arc<dyn ResultProcessor>,
    workers: usize,
    handler_timeout: Duration,
    poll_ceiling: Duration,
    shutdown: broadcast::Sender<()>,
    processes: Mutex<Vec<JoinHandle<()>>>,
}

impl Debug for Crawler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("handlers", &self.handlers)
            .field("workers", &self.workers)
            .finish()
    }
}

impl Crawler {
    /// Constructs a crawler builder, which is used for supplying the composites to then
    /// construct a [`Crawler`]
    ///
    /// # See Also
    /// - [`Crawler`]
    /// - [`CrawlerConfig`]
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfig::builder()
    }

    /// Starts the worker pool, if the crawler has already started, this method does
    /// nothing. The crawler can be stopped via [`Crawler::stop`]
    ///
    /// # See Also
    /// - [`Crawler::stop`]
    pub async fn start(&self) {
        let mut processes = self.processes.lock().await;
        if !processes.is_empty() {
            return;
        }
        for worker in 0..self.workers {
            processes.push(tokio::spawn(worker_loop(
                worker,
                self.queue.clone(),
                self.handlers.clone(),
                self.results.clone(),
                self.handler_timeout,
                self.poll_ceiling,
                self.shutdown.subscribe(),
            )));
        }
    }

    /// Stops the worker pool: broadcasts the shutdown signal and waits for every worker
    /// to finish its current step. The queue itself stays open, closing it is the
    /// owner's call
    ///
    /// # See Also
    /// - [`Crawler::start`]
    pub async fn stop(&self) {
        let mut processes = self.processes.lock().await;
        if processes.is_empty() {
            return;
        }
        let _ = self.shutdown.send(());
        for process in processes.drain(..) {
            let _ = process.await;
        }
    }
}

/// Whether a queue error ends the worker loop (a closed queue does, anything else is
/// logged and retried)
fn fatal_queue_error(worker: usize, error: &DendrographerErrors) -> bool {
    if matches!(error, DendrographerErrors::QueueClosed) {
        return true;
    }
    tracing::error!(worker, %error, "queue operation failed");
    false
}

async fn worker_loop(
    worker: usize,
    queue: Arc<TaskQueue>,
    handlers: Arc<HandlerRegistry>,
    results: Arc<dyn ResultProcessor>,
    handler_timeout: Duration,
    poll_ceiling: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let task = match queue.get().await {
            Ok(task) => task,
            Err(DendrographerErrors::EmptyQueue(_)) => {
                let wait = match queue.next_due_in().await {
                    Ok(Some(due_in)) => due_in.clamp(Duration::from_secs(1), poll_ceiling),
                    _ => poll_ceiling,
                };
                tokio::select! {
                    _ = tokio::time::sleep(wait) => continue,
                    _ = shutdown.recv() => break,
                }
            }
            Err(error) => {
                if fatal_queue_error(worker, &error) {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => continue,
                    _ = shutdown.recv() => break,
                }
            }
        };

        let Some(handler) = handlers.lookup(task.url().scheme()) else {
            let error = DendrographerErrors::UnknownScheme(task.url().scheme().to_string());
            tracing::error!(worker, url = task.url().as_str(), %error, "task is not executable");
            if let Err(error) = queue.report_error(&task).await
                && fatal_queue_error(worker, &error)
            {
                break;
            }
            continue;
        };

        let outcome = tokio::select! {
            outcome = tokio::time::timeout(handler_timeout, handler.execute(&task)) => outcome,
            _ = shutdown.recv() => {
                // The dispatch already consumed the task entry, push it back so the
                // directory is not lost to the queue.
                let _ = queue.report_error(&task).await;
                break;
            }
        };

        let report = match outcome {
            Err(_) => {
                tracing::warn!(worker, url = task.url().as_str(), "handler timed out");
                queue.report_error(&task).await
            }
            Ok(Err(error)) => {
                tracing::warn!(worker, url = task.url().as_str(), %error, "handler failed");
                queue.report_error(&task).await
            }
            Ok(Ok(result)) => ingest(&queue, &*results, &task, result).await,
        };
        if let Err(error) = report
            && fatal_queue_error(worker, &error)
        {
            break;
        }
    }
    tracing::debug!(worker, "crawl worker stopped");
}

/// Feeds one successful listing back into the queue: new child tasks for revealed
/// directories, the parent re-enqueued on its revisit cadence (or dropped when the URL
/// stopped being a directory) and the site's politeness slot renewed
async fn ingest(
    queue: &TaskQueue,
    results: &dyn ResultProcessor,
    task: &CrawlTask,
    result: CrawlResult,
) -> Result<(), DendrographerErrors> {
    let changed = results.process(&result).await;
    if result.found() {
        for (name, metadata) in result.entries() {
            if metadata.is_dir() != Some(true) || name == "." || name == ".." {
                continue;
            }
            match task.url().join(name) {
                Ok(child) => {
                    queue
                        .put_new(CrawlTask::new(task.site_id(), child))
                        .await?;
                }
                Err(error) => {
                    tracing::warn!(
                        parent = task.url().as_str(),
                        entry = %name,
                        %error,
                        "skipping entry with unusable name"
                    );
                }
            }
        }
        if task.revisit_wait() == 0 {
            queue.put_visited(task.clone()).await?;
        } else {
            queue.put_revisited(task.clone(), changed).await?;
        }
    } else {
        tracing::info!(
            url = task.url().as_str(),
            "URL is not a listable directory anymore, dropping task"
        );
    }
    queue.report_done(task).await
}
