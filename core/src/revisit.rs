use crate::task::CrawlTask;

#[allow(unused_imports)]
use crate::queue::TaskQueue;

/// How many revisits the [`TaskQueue`] observes before it consults
/// [`estimate_revisit_wait`] and reassigns the revisit wait of a task
pub const REVISIT_THRESHOLD: u64 = 5;

/// Estimates a new revisit wait for a task from its observed change frequency
///
/// # Implementation Detail(s)
/// This uses the change-frequency estimator proposed by Junghoo Cho and Hector
/// Garcia-Molina in "Estimating Frequency of Change": with `n` revisits, `k` of which
/// reported a change, and a current wait of `w` seconds, the new wait is
/// `round(w / -ln((n - k + 0.5) / (n + 0.5)))`. With no observed change there is no
/// evidence to adjust and the current wait comes back unchanged
///
/// # Argument(s)
/// This method accepts the ``task`` whose counters feed the estimate. Callers only
/// consult the estimator once [`REVISIT_THRESHOLD`] revisits have been observed, so the
/// argument to the logarithm stays within `(0, 1]`
///
/// # Returns
/// The estimated wait as whole seconds, the caller clamps it to the site's
/// `[min_revisit_wait, max_revisit_wait]` window
///
/// # See Also
/// - [`TaskQueue`]
/// - [`CrawlTask`]
pub fn estimate_revisit_wait(task: &CrawlTask) -> u64 {
    if task.change_count() == 0 {
        return task.revisit_wait();
    }
    let visits = task.revisit_count() as f64;
    let changes = task.change_count() as f64;
    let wait = task.revisit_wait() as f64;
    let estimated = wait / -((visits - changes + 0.5) / (visits + 0.5)).ln();
    estimated.round() as u64
}
