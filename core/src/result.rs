use crate::task::CrawlTask;
use crate::url::CrawlUrl;
use std::fmt::{Debug, Formatter};

#[allow(unused_imports)]
use crate::handler::ProtocolHandler;

/// [`EntryMetadata`] carries what a [`ProtocolHandler`] could determine about one listed
/// entry. ``is_dir`` stays `None` when the listing format did not say either way
///
/// # Constructor(s)
/// [`EntryMetadata::directory`], [`EntryMetadata::file`] and [`EntryMetadata::unknown`]
/// cover the three states a handler can report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryMetadata {
    is_dir: Option<bool>,
}

impl EntryMetadata {
    /// Metadata for an entry known to be a directory
    pub fn directory() -> Self {
        Self { is_dir: Some(true) }
    }

    /// Metadata for an entry known to be a regular file
    pub fn file() -> Self {
        Self {
            is_dir: Some(false),
        }
    }

    /// Metadata for an entry whose kind the handler could not determine
    pub fn unknown() -> Self {
        Self { is_dir: None }
    }

    /// Whether the entry is a directory, `None` when undetermined
    pub fn is_dir(&self) -> Option<bool> {
        self.is_dir
    }
}

/// [`CrawlResult`] is the listing outcome a [`ProtocolHandler`] emits after executing a
/// [`CrawlTask`]: the listed URL, whether the URL actually was a listable directory and
/// the ordered sequence of entries found inside it
///
/// # Found Semantics
/// ``found = false`` means the URL existed as an entry but was not a directory, or no
/// longer exists. Such results carry no entries and make the crawler drop the task
/// instead of rescheduling it
///
/// # Constructor(s)
/// A result is constructed over the task it answers via [`CrawlResult::new`] and filled
/// with [`CrawlResult::append`] in listing order
///
/// # See Also
/// - [`CrawlTask`]
/// - [`ProtocolHandler`]
/// - [`EntryMetadata`]
pub struct CrawlResult {
    site_id: String,
    url: CrawlUrl,
    found: bool,
    entries: Vec<(String, EntryMetadata)>,
}

impl Debug for CrawlResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlResult")
            .field("url", &self.url.as_str())
            .field("found", &self.found)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl CrawlResult {
    /// Creates / Constructs a new [`CrawlResult`] instance without entries answering the
    /// given ``task``
    ///
    /// # See Also
    /// - [`CrawlResult`]
    /// - [`CrawlResult::append`]
    pub fn new(task: &CrawlTask, found: bool) -> Self {
        Self {
            site_id: task.site_id().to_string(),
            url: task.url().clone(),
            found,
            entries: Vec::new(),
        }
    }

    /// Appends one listed entry, entries keep the order the handler produced them in
    pub fn append(&mut self, name: impl Into<String>, metadata: EntryMetadata) {
        self.entries.push((name.into(), metadata));
    }

    /// Gets the id of the site the listed directory belongs to
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Gets the URL of the listed directory
    pub fn url(&self) -> &CrawlUrl {
        &self.url
    }

    /// Whether the URL resolved to a listable directory
    pub fn found(&self) -> bool {
        self.found
    }

    /// Gets the listed entries in listing order
    pub fn entries(&self) -> &[(String, EntryMetadata)] {
        &self.entries
    }
}
