pub mod file;
pub mod ftp;

pub use file::FileHandler;
pub use ftp::FtpHandler;

use crate::errors::DendrographerErrors;
use crate::result::CrawlResult;
use crate::site::SiteTable;
use crate::task::CrawlTask;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

#[allow(unused_imports)]
use crate::crawler::Crawler;

/// [`ProtocolHandler`] is the protocol-agnostic capability the crawler consumes to
/// execute a [`CrawlTask`]: given the task, produce a [`CrawlResult`] or fail. This is
/// the seam that extends the crawler to new schemes whose natural model is a tree of
/// directories
///
/// # Required Methods
/// When implementing the [`ProtocolHandler`], one must provide implementations for two
/// methods, those being [`ProtocolHandler::scheme`] (the single URL scheme the handler
/// advertises) and [`ProtocolHandler::execute`]
///
/// # Concurrency Contract
/// Multiple workers may invoke the same handler instance simultaneously, implementations
/// must be concurrency-safe and must not retain state between calls beyond immutable
/// configuration
///
/// # Error Contract
/// A transient failure (network error, unreachable site... etc.) is returned as
/// [`DendrographerErrors::HandlerFailure`] and leads to error backoff. A URL that turns
/// out not to be a directory, or not to exist anymore, is NOT an error: the handler
/// answers with a [`CrawlResult`] whose ``found`` flag is `false`
///
/// # Trait Implementation(s)
/// Two reference handlers define the interface, [`FileHandler`] for the local
/// filesystem and [`FtpHandler`] for FTP sites
///
/// # See Also
/// - [`HandlerRegistry`]
/// - [`FileHandler`]
/// - [`FtpHandler`]
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// The URL scheme this handler advertises, matched case-insensitively
    fn scheme(&self) -> &str;

    /// Executes the task and returns the listing result
    ///
    /// # See Also
    /// - [`CrawlTask`]
    /// - [`CrawlResult`]
    async fn execute(&self, task: &CrawlTask) -> Result<CrawlResult, DendrographerErrors>;
}

/// [`HandlerRegistry`] maps URL schemes to the [`ProtocolHandler`] instances serving
/// them, lookups are case-insensitive and handlers are constructed once over the site
/// table
///
/// # Constructor(s)
/// [`HandlerRegistry::with_default_handlers`] builds a registry with the two reference
/// handlers already registered, [`HandlerRegistry::new`] starts empty
///
/// # See Also
/// - [`ProtocolHandler`]
/// - [`Crawler`]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn ProtocolHandler>>,
}

impl Debug for HandlerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field(
                "schemes",
                &self
                    .handlers
                    .iter()
                    .map(|entry| entry.key().clone())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Creates / Constructs a new, empty [`HandlerRegistry`] instance
    ///
    /// # See Also
    /// - [`HandlerRegistry::with_default_handlers`]
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Creates / Constructs a new [`HandlerRegistry`] instance with the reference
    /// handlers ([`FileHandler`], [`FtpHandler`]) registered over the given site table
    ///
    /// # See Also
    /// - [`HandlerRegistry::new`]
    /// - [`HandlerRegistry::register`]
    pub fn with_default_handlers(sites: &SiteTable) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(FileHandler::new(sites)));
        registry.register(Arc::new(FtpHandler::new(sites)));
        registry
    }

    /// Registers a handler under the scheme it advertises, replacing any previous
    /// handler for that scheme
    pub fn register(&self, handler: Arc<dyn ProtocolHandler>) {
        self.handlers
            .insert(handler.scheme().to_ascii_lowercase(), handler);
    }

    /// Looks up the handler serving ``scheme``, case-insensitively
    pub fn lookup(&self, scheme: &str) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers
            .get(&scheme.to_ascii_lowercase())
            .map(|entry| entry.value().clone())
    }
}
