#[cfg(test)]
mod tests {
    use dendrographer::task::CrawlTask;
    use dendrographer::url::CrawlUrl;

    fn task() -> CrawlTask {
        let url = CrawlUrl::parse("ftp://deltha.uh.cu/", true).unwrap();
        CrawlTask::new("aa958756e769188be9f76fbdb291fe1b2ddd4777", url)
    }

    #[test]
    fn test_fresh_task_state() {
        let task = task();
        assert_eq!(task.site_id(), "aa958756e769188be9f76fbdb291fe1b2ddd4777");
        assert_eq!(task.url().as_str(), "ftp://deltha.uh.cu/");
        assert_eq!(task.revisit_wait(), 0);
        assert_eq!(task.revisit_count(), 0);
        assert_eq!(task.change_count(), 0);
    }

    #[test]
    fn test_report_visit() {
        let mut task = task();
        task.report_visit(true);
        // Reporting visits without changes.
        task.report_visit(false);
        task.report_visit(false);
        assert_eq!(task.revisit_count(), 3);
        assert_eq!(task.change_count(), 1);
        // Reporting visits with changes.
        task.report_visit(true);
        task.report_visit(true);
        assert_eq!(task.revisit_count(), 5);
        assert_eq!(task.change_count(), 3);
        assert!(task.change_count() <= task.revisit_count());
    }

    #[test]
    fn test_assign_revisit_wait_resets_counters() {
        let mut task = task();
        task.report_visit(true);
        task.report_visit(true);
        task.assign_revisit_wait(60);
        assert_eq!(task.revisit_wait(), 60);
        assert_eq!(task.revisit_count(), 0);
        assert_eq!(task.change_count(), 0);
    }

    #[test]
    fn test_record_round_trip() {
        let mut task = task();
        task.assign_revisit_wait(300);
        task.report_visit(true);
        task.report_visit(false);

        let restored = CrawlTask::decode(&task.encode().unwrap()).unwrap();
        assert_eq!(restored.site_id(), task.site_id());
        assert_eq!(restored.url().as_str(), task.url().as_str());
        assert!(restored.url().is_root());
        assert_eq!(restored.revisit_wait(), 300);
        assert_eq!(restored.revisit_count(), 2);
        assert_eq!(restored.change_count(), 1);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(CrawlTask::decode(b"not a task record").is_err());
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        // Records written before the cadence fields existed keep decoding, the
        // missing fields fall back to a fresh task's state.
        let record = br#"{"site_id":"alpha","url":"ftp://alpha.example.org/pub"}"#;
        let task = CrawlTask::decode(record).unwrap();
        assert_eq!(task.site_id(), "alpha");
        assert_eq!(task.revisit_wait(), 0);
        assert_eq!(task.revisit_count(), 0);
        assert_eq!(task.change_count(), 0);
        assert!(!task.url().is_root());
    }
}
