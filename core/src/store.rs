use crate::errors::DendrographerErrors;
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;

#[allow(unused_imports)]
use crate::queue::TaskQueue;

/// An absolute wall-clock second at which a stored entry becomes eligible
pub type Priority = u64;

/// Width of the ASCII priority prefix of every stored key: the number of decimal digits
/// of the largest signed integer, so that zero padding makes byte order equal numeric
/// order
pub(crate) const PRIORITY_WIDTH: usize = 19;

/// Width of the ASCII sequence suffix that layers duplicate-key semantics on top of the
/// unique-key trees, insertion order within one priority is preserved by the store's
/// monotonic ID generator
const SEQ_WIDTH: usize = 20;

const SITES_TREE: &str = "sites";

fn task_tree_name(site_id: &str) -> String {
    format!("tasks/{site_id}")
}

fn encode_key(priority: Priority, seq: u64) -> Vec<u8> {
    format!(
        "{priority:0width$}{seq:0seq_width$}",
        width = PRIORITY_WIDTH,
        seq_width = SEQ_WIDTH
    )
    .into_bytes()
}

fn decode_priority(key: &[u8]) -> Priority {
    key.get(..PRIORITY_WIDTH)
        .and_then(|prefix| std::str::from_utf8(prefix).ok())
        .and_then(|prefix| prefix.parse().ok())
        .unwrap_or(0)
}

/// One entry of a per-site task tree: its raw composite key, the decoded priority and the
/// opaque serialized task record
pub struct TaskEntry {
    /// The raw store key, needed to delete exactly this entry
    pub key: IVec,
    /// The wall-clock second the entry becomes eligible at
    pub priority: Priority,
    /// The serialized task record
    pub blob: IVec,
}

/// One entry of the sites tree: its raw composite key, the decoded priority and the id of
/// the site scheduled at that time
pub struct SiteEntry {
    /// The raw store key, needed to delete exactly this entry
    pub key: IVec,
    /// The wall-clock second the site may be contacted at
    pub priority: Priority,
    /// The scheduled site id
    pub site_id: String,
}

/// [`TaskStore`] is the durable substrate below the [`TaskQueue`]: a single embedded
/// store environment holding one ordered task tree per site plus one `sites` tree, all
/// keyed so that byte-lexicographic order equals time order
///
/// # Implementation Detail(s)
/// The multimap semantics the scheduler needs (duplicate priorities, stable insertion
/// order within one priority) are layered on the store's unique-key ordered trees with a
/// composite key: a fixed-width zero-padded decimal priority followed by a fixed-width
/// decimal sequence number drawn from the environment's monotonic ID generator. The
/// coupled mutations of one scheduler decision (consume a site's scheduling slot and pop
/// its task, or push an errored task back together with its backoff slot) run as a single
/// multi-tree transaction, conflicts are retried by the store itself
///
/// # Usage Note(s)
/// [`TaskStore`] performs no locking of its own, the [`TaskQueue`] serializes every
/// decision behind its own critical section. Opening the same environment twice is
/// rejected by the store's file lock
///
/// # See Also
/// - [`TaskQueue`]
/// - [`TaskEntry`]
/// - [`SiteEntry`]
pub struct TaskStore {
    db: Db,
    sites: Tree,
    tasks: HashMap<String, Tree>,
}

impl Debug for TaskStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("sites", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskStore {
    /// Opens (or creates) the store environment rooted at ``path``
    ///
    /// # Returns
    /// The [`TaskStore`] with the sites tree opened, per-site trees are attached through
    /// [`TaskStore::register_site`]
    ///
    /// # See Also
    /// - [`TaskStore`]
    /// - [`TaskStore::register_site`]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DendrographerErrors> {
        let db = sled::open(path)?;
        let sites = db.open_tree(SITES_TREE)?;
        Ok(Self {
            db,
            sites,
            tasks: HashMap::new(),
        })
    }

    /// Idempotently attaches the per-site task tree for ``site_id``, creating it when
    /// absent
    ///
    /// # Returns
    /// `true` when the tree did not exist before this call (the site is new to the
    /// store), `false` when an existing tree was merely reopened
    ///
    /// # See Also
    /// - [`TaskStore::unregister_site`]
    pub fn register_site(&mut self, site_id: &str) -> Result<bool, DendrographerErrors> {
        let name = task_tree_name(site_id);
        let existed = self
            .db
            .tree_names()
            .iter()
            .any(|tree| tree.as_ref() == name.as_bytes());
        let tree = self.db.open_tree(name.as_bytes())?;
        self.tasks.insert(site_id.to_string(), tree);
        Ok(!existed)
    }

    /// Detaches and deletes the per-site task tree for ``site_id``. Stale entries the
    /// site may still own in the sites tree are swept lazily by the dispatcher
    ///
    /// # See Also
    /// - [`TaskStore::register_site`]
    pub fn unregister_site(&mut self, site_id: &str) -> Result<(), DendrographerErrors> {
        self.tasks.remove(site_id);
        self.db.drop_tree(task_tree_name(site_id).as_bytes())?;
        Ok(())
    }

    /// Lists the ids of all sites that own a task tree inside the environment, including
    /// ones not currently registered. Used on open to reconcile on-disk state with the
    /// configured site table
    pub fn stored_site_ids(&self) -> Vec<String> {
        self.db
            .tree_names()
            .iter()
            .filter_map(|name| {
                std::str::from_utf8(name.as_ref())
                    .ok()
                    .and_then(|name| name.strip_prefix("tasks/"))
                    .map(str::to_string)
            })
            .collect()
    }

    /// Appends a serialized task under ``priority`` into the site's tree, duplicate
    /// priorities are allowed and keep insertion order
    pub fn put_task(
        &self,
        site_id: &str,
        priority: Priority,
        blob: &[u8],
    ) -> Result<(), DendrographerErrors> {
        let tree = self.task_tree(site_id)?;
        let key = encode_key(priority, self.db.generate_id()?);
        tree.insert(key, blob)?;
        Ok(())
    }

    /// Peeks the lowest-keyed entry of the site's task tree without removing it
    pub fn task_head(&self, site_id: &str) -> Result<Option<TaskEntry>, DendrographerErrors> {
        let tree = self.task_tree(site_id)?;
        Ok(tree.first()?.map(|(key, blob)| TaskEntry {
            priority: decode_priority(&key),
            key,
            blob,
        }))
    }

    /// Deletes exactly one entry of the site's task tree by its raw key. Used to pop a
    /// dispatched head and to drop corrupt records without poisoning the tree
    pub fn remove_task_entry(&self, site_id: &str, key: &[u8]) -> Result<(), DendrographerErrors> {
        self.task_tree(site_id)?.remove(key)?;
        Ok(())
    }

    /// Schedules ``site_id`` for contact at ``priority`` in the sites tree, a site may
    /// own several entries at once and the dispatcher always consults the head
    pub fn put_site(&self, priority: Priority, site_id: &str) -> Result<(), DendrographerErrors> {
        let key = encode_key(priority, self.db.generate_id()?);
        self.sites.insert(key, site_id.as_bytes())?;
        Ok(())
    }

    /// Peeks the head of the sites tree: the site allowed to be contacted the soonest
    pub fn sites_head(&self) -> Result<Option<SiteEntry>, DendrographerErrors> {
        Ok(self.sites.first()?.map(site_entry))
    }

    /// A cursor over the sites tree from its head, the dispatcher advances it and
    /// deletes entries through [`TaskStore::remove_site_entry`]
    pub fn sites_from_head(
        &self,
    ) -> impl Iterator<Item = Result<SiteEntry, DendrographerErrors>> + '_ {
        self.sites.iter().map(|entry| {
            let (key, value) = entry?;
            Ok(site_entry((key, value)))
        })
    }

    /// Deletes exactly one entry of the sites tree by its raw key
    pub fn remove_site_entry(&self, key: &[u8]) -> Result<(), DendrographerErrors> {
        self.sites.remove(key)?;
        Ok(())
    }

    /// Consumes one dispatch decision atomically: the site's scheduling slot and the
    /// chosen task entry disappear together or not at all
    pub fn dispatch(
        &self,
        site_key: &[u8],
        site_id: &str,
        task_key: &[u8],
    ) -> Result<(), DendrographerErrors> {
        let tree = self.task_tree(site_id)?;
        (&self.sites, tree)
            .transaction(
                |(sites, tasks)| -> ConflictableTransactionResult<(), ()> {
                    sites.remove(site_key)?;
                    tasks.remove(task_key)?;
                    Ok(())
                },
            )
            .map_err(transaction_failure)?;
        Ok(())
    }

    /// Pushes an errored task back atomically: the task record re-enters its tree and
    /// the site's backoff slot enters the sites tree in one transaction
    pub fn reschedule_error(
        &self,
        site_id: &str,
        priority: Priority,
        blob: &[u8],
    ) -> Result<(), DendrographerErrors> {
        let tree = self.task_tree(site_id)?;
        let site_key = encode_key(priority, self.db.generate_id()?);
        let task_key = encode_key(priority, self.db.generate_id()?);
        (&self.sites, tree)
            .transaction(
                |(sites, tasks)| -> ConflictableTransactionResult<(), ()> {
                    sites.insert(site_key.as_slice(), site_id.as_bytes())?;
                    tasks.insert(task_key.as_slice(), blob)?;
                    Ok(())
                },
            )
            .map_err(transaction_failure)?;
        Ok(())
    }

    /// Gets the total number of stored tasks across all registered sites
    pub fn len(&self) -> usize {
        self.tasks.values().map(|tree| tree.len()).sum()
    }

    /// Whether no registered site holds any stored task
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes all buffered writes of the environment to disk
    pub async fn flush(&self) -> Result<(), DendrographerErrors> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn task_tree(&self, site_id: &str) -> Result<&Tree, DendrographerErrors> {
        self.tasks
            .get(site_id)
            .ok_or_else(|| DendrographerErrors::UnknownSite(site_id.to_string()))
    }
}

fn site_entry((key, value): (IVec, IVec)) -> SiteEntry {
    SiteEntry {
        priority: decode_priority(&key),
        site_id: String::from_utf8_lossy(&value).into_owned(),
        key,
    }
}

fn transaction_failure(error: TransactionError<()>) -> DendrographerErrors {
    match error {
        TransactionError::Storage(error) => DendrographerErrors::StoreFailure(error),
        TransactionError::Abort(()) => DendrographerErrors::StoreFailure(sled::Error::Unsupported(
            "store transaction aborted".to_string(),
        )),
    }
}
