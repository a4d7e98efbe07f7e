use crate::clock::{SchedulerClock, SystemClock};
use crate::errors::DendrographerErrors;
use crate::revisit::{REVISIT_THRESHOLD, estimate_revisit_wait};
use crate::site::SiteTable;
use crate::store::{Priority, TaskStore};
use crate::task::CrawlTask;
use crate::utils::unix_seconds;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use typed_builder::TypedBuilder;

#[allow(unused_imports)]
use crate::clock::VirtualClock;

#[allow(unused_imports)]
use crate::crawler::Crawler;

/// This is the builder configs to use for opening a [`TaskQueue`] instance.
/// By itself it should not be used, and it resides in [`TaskQueue::builder`]
#[derive(TypedBuilder)]
pub struct TaskQueueConfig {
    /// The directory that roots the durable store environment, created on first use and
    /// reconciled against the configured sites on every open
    ///
    /// # Method Behavior
    /// This builder parameter method cannot be chained, as it is a typed builder,
    /// once set, you can never chain it. Since it is a typed builder, it has no fancy
    /// inner workings under the hood, just sets the value
    #[builder(setter(into))]
    db_home: PathBuf,

    /// The validated [`SiteTable`] the scheduler serves, every dispatch decision
    /// consults it and stored state of sites no longer in it is swept away
    ///
    /// # See Also
    /// - [`SiteTable`]
    sites: SiteTable,

    /// The [`SchedulerClock`] every priority computation goes through
    ///
    /// # Default Value
    /// Every queue uses as default value [`SystemClock`]. While for most cases, this is
    /// fine, when it comes to unit testing, [`VirtualClock`] should be preferred as it
    /// allows explicit advancing of time
    ///
    /// # See Also
    /// - [`SystemClock`]
    /// - [`VirtualClock`]
    /// - [`SchedulerClock`]
    #[builder(
        default = Arc::new(SystemClock),
        setter(transform = |clock: impl SchedulerClock + 'static| Arc::new(clock) as Arc<dyn SchedulerClock>),
    )]
    clock: Arc<dyn SchedulerClock>,
}

struct QueueState {
    store: Option<TaskStore>,
    sites: SiteTable,
}

impl QueueState {
    fn store(&self) -> Result<&TaskStore, DendrographerErrors> {
        self.store.as_ref().ok_or(DendrographerErrors::QueueClosed)
    }
}

/// [`TaskQueue`] is the single coordination point between discovery and execution: the
/// durable, multi-site, time-priority queue of directories waiting to be listed. It is
/// the component that enforces politeness windows, error backoff and adaptive revisit
/// cadence
///
/// # Scheduling Model
/// Scheduling is two-level. The sites tree orders the configured sites by the next
/// wall-clock second each may be contacted at, a per-site tree orders that site's tasks
/// the same way. [`TaskQueue::get`] walks the sites tree from its head and returns the
/// head task of the first site that is due and has a due task, consuming the site's
/// scheduling slot and the task entry in one store transaction.
/// [`TaskQueue::report_done`] re-schedules the site `request_wait` seconds ahead,
/// [`TaskQueue::report_error`] pushes both the site and the unconsumed task
/// `error_wait` seconds ahead
///
/// # Concurrency
/// Every public method takes one process-wide critical section, so producers, workers
/// and housekeeping paths never observe a half-applied transition. Handlers execute
/// outside of it
///
/// # Constructor(s)
/// When constructing a [`TaskQueue`], build a [`TaskQueueConfig`] via
/// [`TaskQueue::builder`] and hand it to [`TaskQueue::open`]
///
/// # Example
/// ```ignore
/// use dendrographer::queue::TaskQueue;
/// use dendrographer::site::{Site, SiteTable};
/// use dendrographer::url::CrawlUrl;
///
/// let sites = SiteTable::new(vec![Site::builder()
///     .site_id("deltha")
///     .root_url(CrawlUrl::parse("ftp://deltha.uh.cu/", true)?)
///     .build()])?;
///
/// let queue = TaskQueue::open(
///     TaskQueue::builder()
///         .db_home("/var/lib/dendrographer")
///         .sites(sites)
///         .build(),
/// )
/// .await?;
///
/// let task = queue.get().await?;
/// // ... execute the task through a protocol handler ...
/// queue.report_done(&task).await?;
/// ```
///
/// # See Also
/// - [`Crawler`]
/// - [`CrawlTask`]
/// - [`TaskStore`](crate::store::TaskStore)
pub struct TaskQueue {
    state: Mutex<QueueState>,
    clock: Arc<dyn SchedulerClock>,
}

impl Debug for TaskQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("clock", &self.clock)
            .finish()
    }
}

impl TaskQueue {
    /// Constructs a queue config builder, which is then handed to [`TaskQueue::open`]
    ///
    /// # See Also
    /// - [`TaskQueue`]
    /// - [`TaskQueueConfig`]
    pub fn builder() -> TaskQueueConfigBuilder {
        TaskQueueConfig::builder()
    }

    /// Opens the durable queue and reconciles it with the configured sites: a site new
    /// to the store gets its task tree, a scheduling slot at the current time and a root
    /// task at the current time, while trees of sites that left the configuration are
    /// deleted (their leftover scheduling slots are swept lazily by [`TaskQueue::get`])
    ///
    /// # Returns
    /// The opened [`TaskQueue`], or any store failure encountered while reconciling
    ///
    /// # See Also
    /// - [`TaskQueue`]
    /// - [`TaskQueue::builder`]
    pub async fn open(config: TaskQueueConfig) -> Result<Self, DendrographerErrors> {
        let mut store = TaskStore::open(&config.db_home)?;
        let now = unix_seconds(config.clock.now().await);
        let stored = store.stored_site_ids();
        for site in config.sites.iter() {
            let created = store.register_site(site.site_id())?;
            if created {
                tracing::info!(site_id = site.site_id(), root = %site.root_url(), "site added");
                let task = CrawlTask::new(site.site_id(), site.root_url().clone());
                store.put_site(now, site.site_id())?;
                store.put_task(site.site_id(), now, &task.encode()?)?;
            }
        }
        for site_id in stored {
            if !config.sites.contains(&site_id) {
                tracing::info!(site_id = %site_id, "site removed");
                store.unregister_site(&site_id)?;
            }
        }
        Ok(Self {
            state: Mutex::new(QueueState {
                store: Some(store),
                sites: config.sites,
            }),
            clock: config.clock,
        })
    }

    /// Puts a task for a new directory: one revealed by a listing and never visited
    /// before. It is stored as due right now, the sites tree is left untouched (the
    /// site is already scheduled)
    ///
    /// # See Also
    /// - [`TaskQueue::put_visited`]
    /// - [`TaskQueue::put_revisited`]
    pub async fn put_new(&self, task: CrawlTask) -> Result<(), DendrographerErrors> {
        let state = self.state.lock().await;
        let store = state.store()?;
        let priority = self.priority(0).await;
        store.put_task(task.site_id(), priority, &task.encode()?)
    }

    /// Puts a task back after the first successful listing of its directory: the site's
    /// default revisit wait is assigned (resetting the counters) and the task is stored
    /// that many seconds into the future
    ///
    /// # See Also
    /// - [`TaskQueue::put_new`]
    /// - [`TaskQueue::put_revisited`]
    pub async fn put_visited(&self, mut task: CrawlTask) -> Result<(), DendrographerErrors> {
        let state = self.state.lock().await;
        let store = state.store()?;
        let site = state
            .sites
            .get(task.site_id())
            .ok_or_else(|| DendrographerErrors::UnknownSite(task.site_id().to_string()))?;
        task.assign_revisit_wait(site.default_revisit_wait());
        let priority = self.priority(task.revisit_wait()).await;
        store.put_task(task.site_id(), priority, &task.encode()?)
    }

    /// Puts a task back after a revisit, recording whether the listing ``changed``. Once
    /// [`REVISIT_THRESHOLD`] observations have accumulated, the revisit wait is replaced
    /// with the estimator's output clamped to the site's bounds (which resets the
    /// counters), then the task is stored its wait into the future
    ///
    /// # See Also
    /// - [`estimate_revisit_wait`]
    /// - [`TaskQueue::put_visited`]
    pub async fn put_revisited(
        &self,
        mut task: CrawlTask,
        changed: bool,
    ) -> Result<(), DendrographerErrors> {
        let state = self.state.lock().await;
        let store = state.store()?;
        let site = state
            .sites
            .get(task.site_id())
            .ok_or_else(|| DendrographerErrors::UnknownSite(task.site_id().to_string()))?;
        task.report_visit(changed);
        if task.revisit_count() >= REVISIT_THRESHOLD {
            let estimated = estimate_revisit_wait(&task);
            let clamped = estimated.clamp(site.min_revisit_wait(), site.max_revisit_wait());
            if clamped != estimated {
                tracing::info!(
                    site_id = task.site_id(),
                    url = task.url().as_str(),
                    estimated,
                    clamped,
                    "estimated revisit wait clamped to site bounds"
                );
            }
            task.assign_revisit_wait(clamped);
        }
        let priority = self.priority(task.revisit_wait()).await;
        store.put_task(task.site_id(), priority, &task.encode()?)
    }

    /// Returns a task executable right now, or [`DendrographerErrors::EmptyQueue`] when
    /// none is due yet. The returned task must later be reported back through
    /// [`TaskQueue::report_done`] or [`TaskQueue::report_error`]
    ///
    /// # Implementation Detail(s)
    /// The dispatch walks the sites tree from its head. A head scheduled in the future
    /// ends the walk (nothing closer to being due exists), an entry of an unconfigured
    /// site is swept, a site whose own head task is missing or not yet due is skipped
    /// WITHOUT consuming its scheduling slot, and a corrupt head record is dropped with
    /// a warning before the same site is examined again. The first executable task is
    /// removed together with its site's scheduling slot in one store transaction
    ///
    /// # See Also
    /// - [`TaskQueue::report_done`]
    /// - [`TaskQueue::report_error`]
    pub async fn get(&self) -> Result<CrawlTask, DendrographerErrors> {
        let state = self.state.lock().await;
        let store = state.store()?;
        let now = unix_seconds(self.clock.now().await);
        if store.sites_head()?.is_none() {
            return Err(DendrographerErrors::EmptyQueue(
                "queue without sites".to_string(),
            ));
        }
        for entry in store.sites_from_head() {
            let entry = entry?;
            if entry.priority > now {
                // The head is the soonest schedulable site, nothing further is due either.
                return Err(DendrographerErrors::EmptyQueue(
                    "queue without available sites".to_string(),
                ));
            }
            if !state.sites.contains(&entry.site_id) {
                tracing::warn!(site_id = %entry.site_id, "sweeping scheduling slot of removed site");
                store.remove_site_entry(&entry.key)?;
                continue;
            }
            loop {
                let Some(head) = store.task_head(&entry.site_id)? else {
                    break;
                };
                if head.priority > now {
                    // Not due yet. The site keeps its scheduling slot for that later time.
                    break;
                }
                match CrawlTask::decode(&head.blob) {
                    Err(error) => {
                        tracing::warn!(
                            site_id = %entry.site_id,
                            %error,
                            "dropping corrupt task record"
                        );
                        store.remove_task_entry(&entry.site_id, &head.key)?;
                    }
                    Ok(task) => {
                        store.dispatch(&entry.key, &entry.site_id, &head.key)?;
                        return Ok(task);
                    }
                }
            }
        }
        Err(DendrographerErrors::EmptyQueue(
            "queue without available sites".to_string(),
        ))
    }

    /// Reports a task returned by [`TaskQueue::get`] as successfully executed. The site
    /// is re-scheduled `request_wait` seconds ahead, the per-site tree is untouched (the
    /// task entry was already consumed by the dispatch). Fresh content the handler
    /// produced is enqueued by the caller via the `put_*` methods
    ///
    /// # See Also
    /// - [`TaskQueue::report_error`]
    pub async fn report_done(&self, task: &CrawlTask) -> Result<(), DendrographerErrors> {
        let state = self.state.lock().await;
        let store = state.store()?;
        let site = state
            .sites
            .get(task.site_id())
            .ok_or_else(|| DendrographerErrors::UnknownSite(task.site_id().to_string()))?;
        let priority = self.priority(site.request_wait()).await;
        store.put_site(priority, task.site_id())
    }

    /// Reports an error executing a task returned by [`TaskQueue::get`]. This usually
    /// means the site was unreachable: the site is re-scheduled `error_wait` seconds
    /// ahead and the task goes back into its tree at the same time, revisit counters
    /// untouched, both in one store transaction
    ///
    /// # See Also
    /// - [`TaskQueue::report_done`]
    pub async fn report_error(&self, task: &CrawlTask) -> Result<(), DendrographerErrors> {
        let state = self.state.lock().await;
        let store = state.store()?;
        let site = state
            .sites
            .get(task.site_id())
            .ok_or_else(|| DendrographerErrors::UnknownSite(task.site_id().to_string()))?;
        let priority = self.priority(site.error_wait()).await;
        store.reschedule_error(task.site_id(), priority, &task.encode()?)
    }

    /// The interval until the earliest scheduled site becomes due, `None` when the sites
    /// tree is empty and zero when a site is due already. Polling workers use it to
    /// bound their idle period
    pub async fn next_due_in(&self) -> Result<Option<Duration>, DendrographerErrors> {
        let state = self.state.lock().await;
        let store = state.store()?;
        let now = unix_seconds(self.clock.now().await);
        Ok(store
            .sites_head()?
            .map(|entry| Duration::from_secs(entry.priority.saturating_sub(now))))
    }

    /// Gets the number of stored tasks across all configured sites
    pub async fn len(&self) -> Result<usize, DendrographerErrors> {
        let state = self.state.lock().await;
        Ok(state.store()?.len())
    }

    /// Flushes the durable buffers of the queue to disk
    pub async fn sync(&self) -> Result<(), DendrographerErrors> {
        let state = self.state.lock().await;
        state.store()?.flush().await
    }

    /// Closes the queue after flushing it: durable buffers hit the disk and the store
    /// environment is released. Calls that arrive after the close fail with
    /// [`DendrographerErrors::QueueClosed`], calls already inside the critical section
    /// complete first
    pub async fn close(&self) -> Result<(), DendrographerErrors> {
        let mut state = self.state.lock().await;
        state.store()?.flush().await?;
        state.store = None;
        Ok(())
    }

    async fn priority(&self, offset: u64) -> Priority {
        unix_seconds(self.clock.now().await) + offset
    }
}
