#[cfg(test)]
mod tests {
    use dendrographer::revisit::{REVISIT_THRESHOLD, estimate_revisit_wait};
    use dendrographer::task::CrawlTask;
    use dendrographer::url::CrawlUrl;

    fn task_with_history(wait: u64, visits: u64, changes: u64) -> CrawlTask {
        let url = CrawlUrl::parse("ftp://ftp.example.org/pub", false).unwrap();
        let mut task = CrawlTask::new("alpha", url);
        task.assign_revisit_wait(wait);
        for i in 0..visits {
            task.report_visit(i < changes);
        }
        task
    }

    #[test]
    fn test_two_changes_in_five_visits_stretch_the_wait() {
        // round(100 / -ln((5 - 2 + 0.5) / (5 + 0.5))) = round(100 / 0.4520) = 221
        let task = task_with_history(100, REVISIT_THRESHOLD, 2);
        assert_eq!(estimate_revisit_wait(&task), 221);
    }

    #[test]
    fn test_no_observed_change_keeps_the_wait() {
        let task = task_with_history(100, REVISIT_THRESHOLD, 0);
        assert_eq!(estimate_revisit_wait(&task), 100);
    }

    #[test]
    fn test_constant_change_shrinks_the_wait() {
        // Every visit saw a change: round(100 / -ln(0.5 / 5.5)) = round(100 / 2.3979) = 42
        let task = task_with_history(100, REVISIT_THRESHOLD, REVISIT_THRESHOLD);
        assert_eq!(estimate_revisit_wait(&task), 42);
    }

    #[test]
    fn test_rare_change_grows_the_wait() {
        // One change in ten visits: round(3600 / -ln(9.5 / 10.5)) = round(3600 / 0.1001) = 35970
        let task = task_with_history(3600, 10, 1);
        assert_eq!(estimate_revisit_wait(&task), 35_970);
    }
}
