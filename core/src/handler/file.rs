use crate::errors::DendrographerErrors;
use crate::handler::ProtocolHandler;
use crate::result::{CrawlResult, EntryMetadata};
use crate::site::SiteTable;
use crate::task::CrawlTask;
use crate::url::decode_text;
use async_trait::async_trait;
use std::io::ErrorKind;

/// [`FileHandler`] is the [`ProtocolHandler`] for `file` URLs, it lists directories of
/// the local filesystem. A path that does not resolve to a directory the process can
/// list answers with ``found = false``, entries are stat'ed to determine whether they
/// are directories themselves (an entry that cannot be stat'ed, e.g. a dangling
/// symlink, counts as a file)
///
/// # See Also
/// - [`ProtocolHandler`]
/// - [`FtpHandler`](crate::handler::FtpHandler)
#[derive(Debug)]
pub struct FileHandler;

impl FileHandler {
    /// Creates / Constructs a new [`FileHandler`] instance over the site table, local
    /// listing needs no per-site settings so nothing of it is retained
    pub fn new(_sites: &SiteTable) -> Self {
        Self
    }
}

#[async_trait]
impl ProtocolHandler for FileHandler {
    fn scheme(&self) -> &str {
        "file"
    }

    async fn execute(&self, task: &CrawlTask) -> Result<CrawlResult, DendrographerErrors> {
        let path = task.url().path();
        match tokio::fs::metadata(path).await {
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(CrawlResult::new(task, false));
            }
            Err(error) => return Err(failure(error)),
            Ok(metadata) if !metadata.is_dir() => return Ok(CrawlResult::new(task, false)),
            Ok(_) => {}
        }

        let mut result = CrawlResult::new(task, true);
        let mut entries = tokio::fs::read_dir(path).await.map_err(failure)?;
        while let Some(entry) = entries.next_entry().await.map_err(failure)? {
            let name = decode_text(entry.file_name().as_encoded_bytes()).into_owned();
            let is_dir = tokio::fs::metadata(entry.path())
                .await
                .map(|metadata| metadata.is_dir())
                .unwrap_or(false);
            result.append(
                name,
                if is_dir {
                    EntryMetadata::directory()
                } else {
                    EntryMetadata::file()
                },
            );
        }
        Ok(result)
    }
}

fn failure(error: std::io::Error) -> DendrographerErrors {
    DendrographerErrors::HandlerFailure("file".to_string(), error.to_string())
}
