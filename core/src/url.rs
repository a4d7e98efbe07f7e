use crate::errors::DendrographerErrors;
use encoding_rs::WINDOWS_1252;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use url::Url;

#[allow(unused_imports)]
use crate::site::Site;

#[allow(unused_imports)]
use crate::task::CrawlTask;

/// Decodes raw bytes into text the way the crawler expects them on the wire: UTF-8 first,
/// Windows-1252 second and UTF-8 with replacement characters as the last resort
pub(crate) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    let (decoded, _, had_errors) = WINDOWS_1252.decode(bytes);
    if had_errors {
        String::from_utf8_lossy(bytes).into_owned().into()
    } else {
        decoded.into_owned().into()
    }
}

/// [`CrawlUrl`] is the location value object used across DendroGrapher, it is an immutable,
/// canonicalized form of `scheme://[user[:pass]@]host[:port]/path` (and `file:///path`)
/// with safe joining of child entry names
///
/// # Canonical Form
/// The canonical string keeps the path percent-decoded as UTF-8 and normalizes a trailing
/// slash away, except for the root of a site whose path stays `/`. Default ports known to
/// the underlying parser (e.g. 21 for FTP) are dropped. Equality and hashing are defined
/// over the canonical string only, the [`CrawlUrl::is_root`] flag does not participate
///
/// # Constructor(s)
/// When constructing a new [`CrawlUrl`], one can use [`CrawlUrl::parse`] for textual input
/// or [`CrawlUrl::from_bytes`] for raw bytes whose encoding may be UTF-8 or Windows-1252
/// (the decoder tries each in order and falls back to UTF-8 with replacement). New URLs for
/// discovered child directories come from [`CrawlUrl::join`]
///
/// # Trait Implementation(s)
/// [`CrawlUrl`] implements [`Clone`], [`Debug`], [`Display`] (the canonical string),
/// [`PartialEq`] / [`Eq`] and [`Hash`]
///
/// # See Also
/// - [`CrawlTask`]
/// - [`Site`]
#[derive(Clone)]
pub struct CrawlUrl {
    scheme: String,
    username: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    is_root: bool,
    canonical: String,
}

impl Debug for CrawlUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CrawlUrl").field(&self.canonical).finish()
    }
}

impl Display for CrawlUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for CrawlUrl {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for CrawlUrl {}

impl Hash for CrawlUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl CrawlUrl {
    /// Creates / Constructs a new [`CrawlUrl`] instance from a textual URL
    ///
    /// # Argument(s)
    /// This method accepts the URL string as ``input`` and an ``is_root`` flag marking
    /// the URL as the origin of a site
    ///
    /// # Returns
    /// The canonicalized [`CrawlUrl`], or [`DendrographerErrors::InvalidUrl`] when the
    /// input has no authority component or does not parse at all
    ///
    /// # See Also
    /// - [`CrawlUrl`]
    /// - [`CrawlUrl::from_bytes`]
    pub fn parse(input: &str, is_root: bool) -> Result<Self, DendrographerErrors> {
        let parsed = Url::parse(input)
            .map_err(|err| DendrographerErrors::InvalidUrl(input.to_string(), err.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(DendrographerErrors::InvalidUrl(
                input.to_string(),
                "URL has no authority component".to_string(),
            ));
        }

        let scheme = parsed.scheme().to_string();
        let username = if parsed.username().is_empty() {
            None
        } else {
            Some(decode_component(parsed.username()))
        };
        let password = parsed.password().map(decode_component);
        let host = parsed.host_str().map(str::to_string);
        let port = parsed.port();

        let decoded_path = decode_component(parsed.path());
        let trimmed = decoded_path.trim_end_matches('/');
        let path = if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        };

        let mut canonical = format!("{scheme}://");
        if let Some(user) = &username {
            canonical.push_str(user);
            if let Some(pass) = &password {
                canonical.push(':');
                canonical.push_str(pass);
            }
            canonical.push('@');
        }
        if let Some(host) = &host {
            canonical.push_str(host);
        }
        if let Some(port) = port {
            canonical.push(':');
            canonical.push_str(&port.to_string());
        }
        canonical.push_str(&path);

        Ok(Self {
            scheme,
            username,
            password,
            host,
            port,
            path,
            is_root,
            canonical,
        })
    }

    /// Creates / Constructs a new [`CrawlUrl`] instance from raw bytes, decoding them as
    /// UTF-8, then Windows-1252 and finally UTF-8 with replacement before parsing
    ///
    /// # See Also
    /// - [`CrawlUrl::parse`]
    pub fn from_bytes(bytes: &[u8], is_root: bool) -> Result<Self, DendrographerErrors> {
        Self::parse(&decode_text(bytes), is_root)
    }

    /// Joins a child entry name to the URL and returns the new URL. The result's path is
    /// the parent's path with the child appended, independent of the parent's
    /// trailing-slash state, and the result is never a root URL
    ///
    /// # Argument(s)
    /// This method accepts one argument, the child entry ``name`` as listed inside this
    /// directory (leading slashes are ignored)
    ///
    /// # Returns
    /// The newly constructed child [`CrawlUrl`]
    ///
    /// # See Also
    /// - [`CrawlUrl`]
    pub fn join(&self, name: &str) -> Result<Self, DendrographerErrors> {
        let base = if self.path == "/" {
            &self.canonical[..self.canonical.len() - 1]
        } else {
            self.canonical.as_str()
        };
        Self::parse(&format!("{base}/{}", name.trim_start_matches('/')), false)
    }

    /// Gets the canonical string of the URL
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Gets the URL scheme (always lowercase)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Gets the username of the URL, if any
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Gets the password of the URL, if any
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Gets the host of the URL, absent for `file` URLs
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Gets the explicit port of the URL, default ports are canonicalized away
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Gets the absolute, percent-decoded path of the URL (`/` for the root)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Gets the directory part of the path (`/` for the root and its direct children)
    pub fn dirname(&self) -> &str {
        match self.path.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &self.path[..idx],
        }
    }

    /// Gets the last component of the path (`/` for the root)
    pub fn basename(&self) -> &str {
        if self.path == "/" {
            return &self.path;
        }
        match self.path.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }

    /// Whether this URL is the origin of a configured site
    pub fn is_root(&self) -> bool {
        self.is_root
    }
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
