#[cfg(test)]
mod tests {
    use dendrographer::handler::{FileHandler, ProtocolHandler};
    use dendrographer::result::EntryMetadata;
    use dendrographer::site::SiteTable;
    use dendrographer::task::CrawlTask;
    use dendrographer::url::CrawlUrl;
    use tempfile::TempDir;

    fn handler() -> FileHandler {
        FileHandler::new(&SiteTable::new(vec![]).unwrap())
    }

    fn root_task(dir: &TempDir) -> CrawlTask {
        let url = format!("file://{}", dir.path().display());
        CrawlTask::new("local", CrawlUrl::parse(&url, true).unwrap())
    }

    #[tokio::test]
    async fn test_lists_directory_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("data.txt"), b"payload").unwrap();

        let result = handler().execute(&root_task(&dir)).await.unwrap();
        assert!(result.found());
        assert_eq!(result.entries().len(), 2);

        let lookup = |name: &str| {
            result
                .entries()
                .iter()
                .find(|(entry, _)| entry == name)
                .map(|(_, metadata)| *metadata)
        };
        assert_eq!(lookup("sub"), Some(EntryMetadata::directory()));
        assert_eq!(lookup("data.txt"), Some(EntryMetadata::file()));
    }

    #[tokio::test]
    async fn test_regular_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.txt"), b"payload").unwrap();

        let task = root_task(&dir);
        let file_task = CrawlTask::new("local", task.url().join("data.txt").unwrap());
        let result = handler().execute(&file_task).await.unwrap();
        assert!(!result.found());
        assert!(result.entries().is_empty());
    }

    #[tokio::test]
    async fn test_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let task = root_task(&dir);
        let missing = CrawlTask::new("local", task.url().join("does-not-exist").unwrap());
        let result = handler().execute(&missing).await.unwrap();
        assert!(!result.found());
    }

    #[tokio::test]
    async fn test_empty_directory_has_no_entries() {
        let dir = TempDir::new().unwrap();
        let result = handler().execute(&root_task(&dir)).await.unwrap();
        assert!(result.found());
        assert!(result.entries().is_empty());
    }
}
