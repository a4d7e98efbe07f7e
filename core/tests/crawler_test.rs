use async_trait::async_trait;
use dendrographer::errors::DendrographerErrors;
use dendrographer::handler::ProtocolHandler;
use dendrographer::result::{CrawlResult, EntryMetadata};
use dendrographer::task::CrawlTask;

/// A handler over a tiny in-memory directory tree, enough to watch the crawl loop
/// discover and revisit directories without touching the network.
#[derive(Debug)]
pub struct MemoryHandler;

#[async_trait]
impl ProtocolHandler for MemoryHandler {
    fn scheme(&self) -> &str {
        "mem"
    }

    async fn execute(&self, task: &CrawlTask) -> Result<CrawlResult, DendrographerErrors> {
        match task.url().path() {
            "/" => {
                let mut result = CrawlResult::new(task, true);
                result.append("docs", EntryMetadata::directory());
                result.append("readme.txt", EntryMetadata::file());
                Ok(result)
            }
            "/docs" => {
                let mut result = CrawlResult::new(task, true);
                result.append("notes.txt", EntryMetadata::file());
                Ok(result)
            }
            _ => Ok(CrawlResult::new(task, false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryHandler;
    use async_trait::async_trait;
    use dendrographer::crawler::{Crawler, ResultProcessor};
    use dendrographer::handler::HandlerRegistry;
    use dendrographer::queue::TaskQueue;
    use dendrographer::result::CrawlResult;
    use dendrographer::site::{Site, SiteTable};
    use dendrographer::url::CrawlUrl;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    struct RecordingProcessor {
        seen: Arc<Mutex<HashSet<String>>>,
    }

    #[async_trait]
    impl ResultProcessor for RecordingProcessor {
        async fn process(&self, result: &CrawlResult) -> bool {
            self.seen
                .lock()
                .unwrap()
                .insert(result.url().as_str().to_string());
            false
        }
    }

    #[tokio::test]
    async fn test_workers_walk_the_tree() {
        let dir = TempDir::new().unwrap();
        let site = Site::builder()
            .site_id("archive")
            .root_url(CrawlUrl::parse("mem://archive/", true).unwrap())
            .default_revisit_wait(0)
            .min_revisit_wait(0)
            .max_revisit_wait(0)
            .request_wait(0)
            .error_wait(0)
            .build();
        let queue = Arc::new(
            TaskQueue::open(
                TaskQueue::builder()
                    .db_home(dir.path())
                    .sites(SiteTable::new(vec![site]).unwrap())
                    .build(),
            )
            .await
            .unwrap(),
        );

        let registry = HandlerRegistry::new();
        registry.register(Arc::new(MemoryHandler));

        let seen = Arc::new(Mutex::new(HashSet::new()));
        let crawler = Crawler::builder()
            .queue(queue.clone())
            .handlers(Arc::new(registry))
            .results(RecordingProcessor { seen: seen.clone() })
            .workers(2)
            .poll_ceiling(Duration::from_millis(100))
            .build();

        crawler.start().await;
        for _ in 0..100 {
            if seen.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        crawler.stop().await;

        let seen = seen.lock().unwrap();
        assert!(seen.contains("mem://archive/"), "root was never listed");
        assert!(
            seen.contains("mem://archive/docs"),
            "discovered subdirectory was never listed"
        );
        queue.close().await.unwrap();
    }
}
