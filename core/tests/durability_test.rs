#[cfg(test)]
mod tests {
    use dendrographer::clock::VirtualClock;
    use dendrographer::errors::DendrographerErrors;
    use dendrographer::queue::TaskQueue;
    use dendrographer::site::{Site, SiteTable};
    use dendrographer::store::TaskStore;
    use dendrographer::task::CrawlTask;
    use dendrographer::url::CrawlUrl;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SITES: [&str; 3] = ["alpha", "beta", "gamma"];

    fn site(site_id: &str) -> Site {
        let root = format!("ftp://{site_id}.example.org/");
        Site::builder()
            .site_id(site_id)
            .root_url(CrawlUrl::parse(&root, true).unwrap())
            .request_wait(60)
            .error_wait(120)
            .build()
    }

    fn test_clock() -> Arc<VirtualClock> {
        Arc::new(VirtualClock::from_value(1_700_000_000))
    }

    #[tokio::test]
    async fn test_store_restores_tasks_after_reopen() {
        let dir = TempDir::new().unwrap();
        fastrand::seed(0x5eed);
        let mut heads: HashMap<&str, u64> = HashMap::new();

        {
            let mut store = TaskStore::open(dir.path()).unwrap();
            for site_id in SITES {
                assert!(store.register_site(site_id).unwrap());
            }
            for index in 0..1000 {
                let site_id = SITES[fastrand::usize(0..SITES.len())];
                let priority = 1_700_000_000 + fastrand::u64(0..100_000);
                let url = format!("ftp://{site_id}.example.org/dir{index}");
                let task = CrawlTask::new(site_id, CrawlUrl::parse(&url, false).unwrap());
                store.put_task(site_id, priority, &task.encode().unwrap()).unwrap();
                heads
                    .entry(site_id)
                    .and_modify(|head| *head = (*head).min(priority))
                    .or_insert(priority);
            }
            store.flush().await.unwrap();
            assert_eq!(store.len(), 1000);
            // Simulated crash: the environment is abandoned without a close.
        }

        let mut store = TaskStore::open(dir.path()).unwrap();
        for site_id in SITES {
            assert!(!store.register_site(site_id).unwrap());
        }
        assert_eq!(store.len(), 1000);
        for site_id in SITES {
            let head = store.task_head(site_id).unwrap().unwrap();
            assert_eq!(head.priority, heads[site_id]);
            let task = CrawlTask::decode(&head.blob).unwrap();
            assert_eq!(task.site_id(), site_id);
        }
    }

    #[tokio::test]
    async fn test_duplicate_priorities_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        store.register_site("alpha").unwrap();

        for index in 0..3 {
            let url = format!("ftp://alpha.example.org/dir{index}");
            let task = CrawlTask::new("alpha", CrawlUrl::parse(&url, false).unwrap());
            store
                .put_task("alpha", 1_700_000_000, &task.encode().unwrap())
                .unwrap();
        }

        let head = store.task_head("alpha").unwrap().unwrap();
        let task = CrawlTask::decode(&head.blob).unwrap();
        assert_eq!(task.url().as_str(), "ftp://alpha.example.org/dir0");
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let sites = || vec![site("alpha")];

        {
            let queue = TaskQueue::open(
                TaskQueue::builder()
                    .db_home(dir.path())
                    .sites(SiteTable::new(sites()).unwrap())
                    .clock(test_clock())
                    .build(),
            )
            .await
            .unwrap();

            let root = queue.get().await.unwrap();
            queue
                .put_new(CrawlTask::new("alpha", root.url().join("pub").unwrap()))
                .await
                .unwrap();
            queue
                .put_new(CrawlTask::new("alpha", root.url().join("incoming").unwrap()))
                .await
                .unwrap();
            queue.report_done(&root).await.unwrap();
            queue.sync().await.unwrap();
        }

        // Reopen past the politeness window the report_done armed.
        let later = Arc::new(VirtualClock::from_value(1_700_000_000 + 60));
        let queue = TaskQueue::open(
            TaskQueue::builder()
                .db_home(dir.path())
                .sites(SiteTable::new(sites()).unwrap())
                .clock(later)
                .build(),
        )
        .await
        .unwrap();

        // The known site is not re-seeded, exactly the two discovered children remain.
        assert_eq!(queue.len().await.unwrap(), 2);
        let task = queue.get().await.unwrap();
        assert_eq!(task.url().as_str(), "ftp://alpha.example.org/pub");
    }

    #[tokio::test]
    async fn test_removed_site_is_swept() {
        let dir = TempDir::new().unwrap();

        {
            let queue = TaskQueue::open(
                TaskQueue::builder()
                    .db_home(dir.path())
                    .sites(SiteTable::new(vec![site("alpha"), site("beta")]).unwrap())
                    .clock(test_clock())
                    .build(),
            )
            .await
            .unwrap();
            assert_eq!(queue.len().await.unwrap(), 2);
            queue.sync().await.unwrap();
        }

        let queue = TaskQueue::open(
            TaskQueue::builder()
                .db_home(dir.path())
                .sites(SiteTable::new(vec![site("alpha")]).unwrap())
                .clock(test_clock())
                .build(),
        )
        .await
        .unwrap();

        // Only alpha's root task survives, beta's task tree is gone and its stale
        // scheduling slot is swept during dispatch.
        assert_eq!(queue.len().await.unwrap(), 1);
        let task = queue.get().await.unwrap();
        assert_eq!(task.site_id(), "alpha");
        assert!(matches!(
            queue.get().await,
            Err(DendrographerErrors::EmptyQueue(_))
        ));
    }
}
