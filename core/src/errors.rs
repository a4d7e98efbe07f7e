use thiserror::Error;

#[allow(unused_imports)]
use crate::queue::TaskQueue;

#[allow(unused_imports)]
use crate::handler::ProtocolHandler;

#[allow(unused_imports)]
use crate::site::SiteTable;

/// [`DendrographerErrors`] is the main enum that contains all the errors which can be thrown by
/// DendroGrapher, it uses under the hood [`thiserror`] to make it as smooth sailing to add more
/// errors in the future as possible
#[derive(Error, Debug)]
pub enum DendrographerErrors {
    /// This error is meant to happen when [`TaskQueue::get`] finds no task that is executable
    /// right now. It is non-fatal, callers are expected to poll again later, the attached
    /// message tells which stage of the dispatch walk came up empty
    #[error("No executable task available: {0}")]
    EmptyQueue(String),

    /// This error is meant to happen when a [`TaskQueue`] method is invoked after
    /// [`TaskQueue::close`] has been called
    #[error("The task queue has been closed")]
    QueueClosed,

    /// This error wraps any failure coming from the embedded store environment (I/O errors,
    /// aborted transactions... etc.), it is retryable from the caller's point of view
    #[error("Durable store failure: {0}")]
    StoreFailure(#[from] sled::Error),

    /// This error is meant to happen when a stored task record cannot be encoded or decoded.
    /// On the decode path the scheduler never propagates it, the offending record is
    /// dropped with a warning instead
    #[error("Task record serialization failed: {0}")]
    TaskSerialization(#[from] serde_json::Error),

    /// This error is meant to happen when a string cannot be parsed into a
    /// [`CrawlUrl`](crate::url::CrawlUrl), the first field is the rejected input and the
    /// second the parser's reason
    #[error("Invalid URL `{0}`: {1}")]
    InvalidUrl(String, String),

    /// This error is meant to happen when a task's URL carries a scheme no registered
    /// [`ProtocolHandler`] advertises, it is a configuration error and the worker treats
    /// it like a handler failure
    #[error("No protocol handler registered for scheme `{0}`")]
    UnknownScheme(String),

    /// This error is meant to happen when a task names a `site_id` that is not present
    /// in the configured [`SiteTable`]
    #[error("Site `{0}` is not configured")]
    UnknownSite(String),

    /// This error is meant to happen when a site record violates its invariants
    /// (`min_revisit_wait <= default_revisit_wait <= max_revisit_wait`,
    /// `request_wait <= error_wait`, unique site ids)
    #[error("Invalid configuration for site `{0}`: {1}")]
    InvalidSiteConfig(String, String),

    /// This error is meant to happen when a protocol handler fails transiently (network
    /// failure, remote site unreachable... etc.), the worker reports the task back with
    /// [`TaskQueue::report_error`]
    #[error("Handler for scheme `{0}` failed: {1}")]
    HandlerFailure(String, String),
}
