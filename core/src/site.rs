use crate::errors::DendrographerErrors;
use crate::url::CrawlUrl;
use std::collections::HashMap;
use typed_builder::TypedBuilder;

#[allow(unused_imports)]
use crate::queue::TaskQueue;

/// [`Site`] is one configured origin the crawler is allowed to walk: a stable ``site_id``
/// chosen by configuration, the root URL of the directory tree, the revisit cadence bounds
/// and the politeness windows
///
/// # Invariant(s)
/// `min_revisit_wait <= default_revisit_wait <= max_revisit_wait` and
/// `request_wait <= error_wait`. The invariants are checked when the site enters a
/// [`SiteTable`], not at build time
///
/// # Constructor(s)
/// When constructing a [`Site`], use [`Site::builder`], only ``site_id`` and ``root_url``
/// have no default value
///
/// # Example
/// ```ignore
/// use dendrographer::site::Site;
/// use dendrographer::url::CrawlUrl;
///
/// let site = Site::builder()
///     .site_id("deltha")
///     .root_url(CrawlUrl::parse("ftp://deltha.uh.cu/", true)?)
///     .request_wait(60)
///     .error_wait(1800)
///     .build();
/// ```
///
/// # See Also
/// - [`SiteTable`]
/// - [`TaskQueue`]
#[derive(Clone, Debug, TypedBuilder)]
pub struct Site {
    /// The opaque stable identifier of the site, it names the site's task tree inside the
    /// durable store and must be unique across the [`SiteTable`]
    #[builder(setter(into))]
    site_id: String,

    /// The URL of the root directory of the site, it seeds the very first crawl task when
    /// the site is added
    root_url: CrawlUrl,

    /// The revisit wait assigned after the first successful listing of a directory
    ///
    /// # Default Value
    /// One day (86 400 seconds)
    #[builder(default = 86_400)]
    default_revisit_wait: u64,

    /// The lower clamp bound for the adaptive revisit wait
    ///
    /// # Default Value
    /// One hour (3 600 seconds)
    #[builder(default = 3_600)]
    min_revisit_wait: u64,

    /// The upper clamp bound for the adaptive revisit wait
    ///
    /// # Default Value
    /// One week (604 800 seconds)
    #[builder(default = 604_800)]
    max_revisit_wait: u64,

    /// The minimum interval in seconds between two successive visits to this site, the
    /// politeness window the scheduler guarantees
    ///
    /// # Default Value
    /// 60 seconds
    #[builder(default = 60)]
    request_wait: u64,

    /// The backoff in seconds after a failed visit, must be at least ``request_wait``
    ///
    /// # Default Value
    /// One hour (3 600 seconds)
    #[builder(default = 3_600)]
    error_wait: u64,
}

impl Site {
    /// Gets the stable identifier of the site
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Gets the root URL of the site
    pub fn root_url(&self) -> &CrawlUrl {
        &self.root_url
    }

    /// Gets the revisit wait assigned after a first successful listing
    pub fn default_revisit_wait(&self) -> u64 {
        self.default_revisit_wait
    }

    /// Gets the lower clamp bound for the adaptive revisit wait
    pub fn min_revisit_wait(&self) -> u64 {
        self.min_revisit_wait
    }

    /// Gets the upper clamp bound for the adaptive revisit wait
    pub fn max_revisit_wait(&self) -> u64 {
        self.max_revisit_wait
    }

    /// Gets the politeness window between two successive visits
    pub fn request_wait(&self) -> u64 {
        self.request_wait
    }

    /// Gets the backoff window after a failed visit
    pub fn error_wait(&self) -> u64 {
        self.error_wait
    }

    fn validate(&self) -> Result<(), DendrographerErrors> {
        if self.min_revisit_wait > self.default_revisit_wait
            || self.default_revisit_wait > self.max_revisit_wait
        {
            return Err(DendrographerErrors::InvalidSiteConfig(
                self.site_id.clone(),
                format!(
                    "revisit waits must satisfy min <= default <= max (got {} <= {} <= {})",
                    self.min_revisit_wait, self.default_revisit_wait, self.max_revisit_wait
                ),
            ));
        }
        if self.request_wait > self.error_wait {
            return Err(DendrographerErrors::InvalidSiteConfig(
                self.site_id.clone(),
                format!(
                    "request_wait ({}) must not exceed error_wait ({})",
                    self.request_wait, self.error_wait
                ),
            ));
        }
        Ok(())
    }
}

/// [`SiteTable`] is the validated collection of configured sites the scheduler consults
/// on every decision, it rejects duplicate ids and sites whose waits violate the
/// invariants documented on [`Site`]
///
/// # Constructor(s)
/// When constructing a [`SiteTable`], one can use [`SiteTable::new`] with the full list
/// of configured sites
///
/// # See Also
/// - [`Site`]
/// - [`TaskQueue`]
#[derive(Clone, Debug)]
pub struct SiteTable {
    sites: HashMap<String, Site>,
}

impl SiteTable {
    /// Creates / Constructs a new [`SiteTable`] instance from the configured sites
    ///
    /// # Returns
    /// The validated table, or [`DendrographerErrors::InvalidSiteConfig`] naming the
    /// first offending site
    ///
    /// # See Also
    /// - [`SiteTable`]
    /// - [`Site`]
    pub fn new(sites: Vec<Site>) -> Result<Self, DendrographerErrors> {
        let mut table = HashMap::with_capacity(sites.len());
        for site in sites {
            site.validate()?;
            if table.contains_key(site.site_id()) {
                return Err(DendrographerErrors::InvalidSiteConfig(
                    site.site_id().to_string(),
                    "duplicate site id".to_string(),
                ));
            }
            table.insert(site.site_id().to_string(), site);
        }
        Ok(Self { sites: table })
    }

    /// Gets the [`Site`] configured under ``site_id``, if any
    pub fn get(&self, site_id: &str) -> Option<&Site> {
        self.sites.get(site_id)
    }

    /// Whether ``site_id`` is configured
    pub fn contains(&self, site_id: &str) -> bool {
        self.sites.contains_key(site_id)
    }

    /// Iterates over all configured sites in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    /// Gets the number of configured sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the table holds no sites at all
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
