use crate::errors::DendrographerErrors;
use crate::handler::ProtocolHandler;
use crate::result::{CrawlResult, EntryMetadata};
use crate::site::SiteTable;
use crate::task::CrawlTask;
use async_trait::async_trait;
use suppaftp::{FtpError, FtpStream};

/// [`FtpHandler`] is the [`ProtocolHandler`] for `ftp` URLs. A task execution is one
/// short-lived session: connect, authenticate (anonymously unless the URL carries
/// credentials), change into the directory, retrieve and parse the listing, quit. A
/// permission error on the directory change means the URL is not a listable directory
/// and answers with ``found = false``, entries whose kind the listing format left
/// undetermined are probed with another directory change
///
/// # Implementation Detail(s)
/// The FTP client is a blocking one, each execution runs on the blocking thread pool
/// via ``tokio::task::spawn_blocking`` so crawl workers stay responsive. The listing
/// parser understands the three formats found in the wild (UNIX style, MS-DOS and
/// EPLF), see [`parse_list_line`]
///
/// # See Also
/// - [`ProtocolHandler`]
/// - [`FileHandler`](crate::handler::FileHandler)
/// - [`parse_list_line`]
#[derive(Debug)]
pub struct FtpHandler;

impl FtpHandler {
    /// Creates / Constructs a new [`FtpHandler`] instance over the site table, the
    /// reference handler needs no per-site settings so nothing of it is retained
    pub fn new(_sites: &SiteTable) -> Self {
        Self
    }
}

#[async_trait]
impl ProtocolHandler for FtpHandler {
    fn scheme(&self) -> &str {
        "ftp"
    }

    async fn execute(&self, task: &CrawlTask) -> Result<CrawlResult, DendrographerErrors> {
        let task = task.clone();
        tokio::task::spawn_blocking(move || list_directory(&task))
            .await
            .map_err(|error| failure(error.to_string()))?
    }
}

fn list_directory(task: &CrawlTask) -> Result<CrawlResult, DendrographerErrors> {
    let url = task.url();
    let host = url
        .host()
        .ok_or_else(|| failure("URL has no host".to_string()))?;
    let port = url.port().unwrap_or(21);

    let mut ftp = FtpStream::connect((host, port)).map_err(|error| failure(error.to_string()))?;

    let login = match url.username() {
        Some(username) => ftp.login(username, url.password().unwrap_or("")),
        None => ftp.login("anonymous", "anonymous@"),
    };
    if let Err(error) = login {
        let _ = ftp.quit();
        return Err(failure(error.to_string()));
    }

    if let Err(error) = ftp.cwd(url.path()) {
        let _ = ftp.quit();
        return match error {
            // The server refused the directory change: the URL exists as an entry but
            // is not a directory, or is gone.
            FtpError::UnexpectedResponse(_) => Ok(CrawlResult::new(task, false)),
            other => Err(failure(other.to_string())),
        };
    }

    let lines = match ftp.list(None) {
        Ok(lines) => lines,
        Err(error) => {
            let _ = ftp.quit();
            return Err(failure(error.to_string()));
        }
    };

    let mut result = CrawlResult::new(task, true);
    for line in &lines {
        let Some((name, is_dir)) = parse_list_line(line) else {
            continue;
        };
        let metadata = match is_dir {
            Some(true) => EntryMetadata::directory(),
            Some(false) => EntryMetadata::file(),
            None => {
                // The listing did not say. Probe by trying to change into the entry,
                // a refusal means it is a file, anything else fails the task.
                let child = url.join(&name)?;
                match ftp.cwd(child.path()) {
                    Ok(()) => EntryMetadata::directory(),
                    Err(FtpError::UnexpectedResponse(_)) => EntryMetadata::file(),
                    Err(other) => {
                        let _ = ftp.quit();
                        return Err(failure(other.to_string()));
                    }
                }
            }
        };
        result.append(name, metadata);
    }
    let _ = ftp.quit();
    Ok(result)
}

fn failure(message: String) -> DendrographerErrors {
    DendrographerErrors::HandlerFailure("ftp".to_string(), message)
}

/// Parses one line of a `LIST` response into `(entry_name, is_dir)`, where the kind is
/// `None` when the format does not tell. `None` as a whole means the line could not be
/// parsed (an unknown format, or extra information some servers interleave) and should
/// be skipped silently
///
/// # Implementation Detail(s)
/// Three formats are recognized, following the classification of D. J. Bernstein's
/// `ftpparse`:
/// - **UNIX style**: first character one of ``-dbclps``; the 9-field whitespace split
///   yields the name, ``-`` means file, ``d`` means directory, anything else stays
///   undetermined; symlink names strip their ``->`` target
/// - **MS-DOS**: leading digit, columns at fixed offsets, a ``<DIR>`` marker signals a
///   directory
/// - **EPLF**: ``+`` prefix, tab-separated from the name, a ``/`` fact signals a
///   directory
pub fn parse_list_line(line: &str) -> Option<(String, Option<bool>)> {
    let first = line.chars().next()?;
    if "-dbclps".contains(first) {
        // UNIX-style listing.
        let is_dir = match first {
            '-' => Some(false),
            'd' => Some(true),
            _ => None,
        };
        let fields = split_whitespace_limit(line, 9);
        if fields.len() != 9 {
            return None;
        }
        let mut name = fields[8];
        if first == 'l' {
            name = name.split(" -> ").next()?;
        }
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), is_dir))
    } else if first.is_ascii_digit() {
        // MS-DOS format: date and time occupy the first 17 columns.
        let rest = line.get(17..)?.trim_start();
        if let Some(after) = rest.strip_prefix("<DIR>") {
            let name = after.trim_start();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), Some(true)))
        } else {
            let idx = rest.find(' ')?;
            let name = &rest[idx + 1..];
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), Some(false)))
        }
    } else if let Some(rest) = line.strip_prefix('+') {
        // Easily Parsed LIST Format.
        let (facts, name) = rest.split_once('\t')?;
        if name.is_empty() {
            return None;
        }
        let is_dir = facts.split(',').any(|fact| fact == "/");
        Some((name.to_string(), Some(is_dir)))
    } else {
        None
    }
}

/// A whitespace split with a field limit, like the 9-field split UNIX listings need:
/// runs of whitespace separate fields and the final field keeps its internal spacing
/// (file names may contain spaces)
fn split_whitespace_limit(line: &str, limit: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(limit);
    let mut rest = line.trim_start();
    while fields.len() + 1 < limit && !rest.is_empty() {
        match rest.find(char::is_whitespace) {
            Some(idx) => {
                fields.push(&rest[..idx]);
                rest = rest[idx..].trim_start();
            }
            None => {
                fields.push(rest);
                return fields;
            }
        }
    }
    if !rest.is_empty() {
        fields.push(rest);
    }
    fields
}
