use crate::errors::DendrographerErrors;
use crate::url::CrawlUrl;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

#[allow(unused_imports)]
use crate::queue::TaskQueue;

#[allow(unused_imports)]
use crate::result::CrawlResult;

/// The version stamped on newly written task records. Decoding accepts records with
/// missing fields so the format can grow without invalidating stored queues
const TASK_RECORD_VERSION: u32 = 1;

fn current_version() -> u32 {
    TASK_RECORD_VERSION
}

/// The explicit, versioned on-disk form of a [`CrawlTask`], kept separate from the
/// runtime type so the record can evolve independently of it
#[derive(Serialize, Deserialize)]
struct TaskRecord {
    #[serde(default = "current_version")]
    version: u32,
    site_id: String,
    url: String,
    #[serde(default)]
    is_root: bool,
    #[serde(default)]
    revisit_wait: u64,
    #[serde(default)]
    revisit_count: u64,
    #[serde(default)]
    change_count: u64,
}

/// [`CrawlTask`] is the per-directory unit of work of DendroGrapher, the action of listing
/// the content of one directory URL belonging to a site. Executing a task produces a
/// [`CrawlResult`]
///
/// # Revisit Statistics
/// Alongside its location, a task carries the revisit cadence state: ``revisit_wait`` (the
/// current interval between visits in seconds, `0` until the directory has been listed
/// once), ``revisit_count`` (observations since the wait last changed) and ``change_count``
/// (how many of those observations reported a change). The invariant
/// `0 <= change_count <= revisit_count` always holds: counters only move through
/// [`CrawlTask::report_visit`] and assigning a new wait through
/// [`CrawlTask::assign_revisit_wait`] resets both to zero. Mutation happens only inside
/// the [`TaskQueue`]
///
/// # Constructor(s)
/// When constructing a new [`CrawlTask`], one can use [`CrawlTask::new`] for a freshly
/// discovered directory, stored tasks come back through [`CrawlTask::decode`]
///
/// # Trait Implementation(s)
/// [`CrawlTask`] implements [`Clone`] and [`Debug`] (displayed as the site id plus the
/// canonical URL)
///
/// # See Also
/// - [`TaskQueue`]
/// - [`CrawlResult`]
/// - [`CrawlUrl`]
#[derive(Clone)]
pub struct CrawlTask {
    site_id: String,
    url: CrawlUrl,
    revisit_wait: u64,
    revisit_count: u64,
    change_count: u64,
}

impl Debug for CrawlTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CrawlTask")
            .field(&self.site_id)
            .field(&self.url.as_str())
            .finish()
    }
}

impl CrawlTask {
    /// Creates / Constructs a new [`CrawlTask`] instance for a directory that has never
    /// been visited, the revisit wait and both counters start at zero
    ///
    /// # Argument(s)
    /// This method accepts the ``site_id`` the directory belongs to and its ``url``
    ///
    /// # Returns
    /// The newly constructed [`CrawlTask`]
    ///
    /// # See Also
    /// - [`CrawlTask`]
    pub fn new(site_id: impl Into<String>, url: CrawlUrl) -> Self {
        Self {
            site_id: site_id.into(),
            url,
            revisit_wait: 0,
            revisit_count: 0,
            change_count: 0,
        }
    }

    /// Reports that the directory was visited again. The ``changed`` argument should be
    /// `true` if the content of the directory changed since the previous visit
    pub fn report_visit(&mut self, changed: bool) {
        if changed {
            self.change_count += 1;
        }
        self.revisit_count += 1;
    }

    /// Assigns a new revisit wait. This also resets the revisit and change counters, the
    /// reset is this explicit method's contract rather than a hidden setter side effect
    pub fn assign_revisit_wait(&mut self, seconds: u64) {
        self.revisit_wait = seconds;
        self.revisit_count = 0;
        self.change_count = 0;
    }

    /// Gets the id of the site the task belongs to
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Gets the URL of the directory to list
    pub fn url(&self) -> &CrawlUrl {
        &self.url
    }

    /// Gets the current revisit wait in seconds, `0` means the directory has never been
    /// listed (a first visit)
    pub fn revisit_wait(&self) -> u64 {
        self.revisit_wait
    }

    /// Gets the number of visits observed since the revisit wait last changed
    pub fn revisit_count(&self) -> u64 {
        self.revisit_count
    }

    /// Gets the number of observed visits that reported a change
    pub fn change_count(&self) -> u64 {
        self.change_count
    }

    /// Encodes the task into its versioned on-disk record
    ///
    /// # Returns
    /// The serialized record bytes, or [`DendrographerErrors::TaskSerialization`]
    ///
    /// # See Also
    /// - [`CrawlTask::decode`]
    pub fn encode(&self) -> Result<Vec<u8>, DendrographerErrors> {
        let record = TaskRecord {
            version: TASK_RECORD_VERSION,
            site_id: self.site_id.clone(),
            url: self.url.as_str().to_string(),
            is_root: self.url.is_root(),
            revisit_wait: self.revisit_wait,
            revisit_count: self.revisit_count,
            change_count: self.change_count,
        };
        Ok(serde_json::to_vec(&record)?)
    }

    /// Decodes a task from its on-disk record
    ///
    /// # Returns
    /// The restored [`CrawlTask`], or an error when the record bytes or the embedded URL
    /// are unreadable (callers drop such records instead of propagating)
    ///
    /// # See Also
    /// - [`CrawlTask::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self, DendrographerErrors> {
        let record: TaskRecord = serde_json::from_slice(bytes)?;
        let url = CrawlUrl::parse(&record.url, record.is_root)?;
        Ok(Self {
            site_id: record.site_id,
            url,
            revisit_wait: record.revisit_wait,
            revisit_count: record.revisit_count,
            change_count: record.change_count,
        })
    }
}
