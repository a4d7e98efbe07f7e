use crate::clock::{AdvanceableSchedulerClock, SchedulerClock};
use crate::utils::{system_time_to_date_time, unix_seconds};
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

#[allow(unused_imports)]
use crate::queue::TaskQueue;

/// [`VirtualClock`] is the [`SchedulerClock`] the queue and crawler tests run on: it
/// only moves when told to, so a test can cross a politeness window or a revisit wait
/// in microseconds of real time instead of sleeping through it
///
/// # Implementation Detail(s)
/// Every priority the [`TaskQueue`] computes is a whole wall-clock second, so this
/// clock tracks whole seconds too: sub-second targets are truncated onto the second
/// grid. Advancing never moves the clock backwards (a later target always wins over an
/// earlier one), mirroring the scheduling contract that a backwards wall-clock jump may
/// delay work but never un-schedules it, and guaranteeing that an idler, once woken,
/// stays woken
///
/// # Constructor(s)
/// [`VirtualClock::new`] starts from a [`SystemTime`], [`VirtualClock::from_value`]
/// from whole seconds since the UNIX epoch and [`VirtualClock::from_epoch`] from the
/// epoch itself
///
/// # Example
/// ```ignore
/// use dendrographer::clock::{AdvanceableSchedulerClock, VirtualClock};
/// use std::time::Duration;
///
/// let clock = Arc::new(VirtualClock::from_value(1_700_000_000));
/// let queue = TaskQueue::open(
///     TaskQueue::builder()
///         .db_home(dir.path())
///         .sites(sites)
///         .clock(clock.clone())
///         .build(),
/// )
/// .await?;
///
/// // Cross the site's request_wait without sleeping.
/// clock.advance(Duration::from_secs(60)).await;
/// let task = queue.get().await?;
/// ```
///
/// # See Also
/// - [`SystemClock`](crate::clock::SystemClock)
/// - [`AdvanceableSchedulerClock`]
/// - [`SchedulerClock`]
pub struct VirtualClock {
    seconds: AtomicU64,
    notify: Notify,
}

impl Debug for VirtualClock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let seconds = self.seconds.load(Ordering::Acquire);
        f.debug_struct("VirtualClock")
            .field(
                "current_time",
                &system_time_to_date_time(UNIX_EPOCH + Duration::from_secs(seconds)),
            )
            .finish()
    }
}

impl VirtualClock {
    /// Creates / Constructs a new [`VirtualClock`] instance frozen at ``initial_time``,
    /// truncated to the whole-second grid the scheduler works on
    ///
    /// # See Also
    /// - [`VirtualClock`]
    /// - [`VirtualClock::from_value`]
    pub fn new(initial_time: SystemTime) -> Self {
        Self::from_value(unix_seconds(initial_time))
    }

    /// Creates / Constructs a new [`VirtualClock`] instance frozen at ``initial_value``
    /// whole seconds since the UNIX epoch, the same unit stored priorities use
    ///
    /// # See Also
    /// - [`VirtualClock`]
    /// - [`VirtualClock::new`]
    pub fn from_value(initial_value: u64) -> Self {
        Self {
            seconds: AtomicU64::new(initial_value),
            notify: Notify::new(),
        }
    }

    /// Creates / Constructs a new [`VirtualClock`] instance frozen at the UNIX epoch
    ///
    /// # See Also
    /// - [`VirtualClock`]
    pub fn from_epoch() -> Self {
        Self::from_value(0)
    }
}

#[async_trait]
impl AdvanceableSchedulerClock for VirtualClock {
    async fn advance_to(&self, to: SystemTime) {
        // A target behind the current time is ignored rather than applied, the clock
        // only ever moves forward.
        self.seconds.fetch_max(unix_seconds(to), Ordering::AcqRel);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl SchedulerClock for VirtualClock {
    async fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.seconds.load(Ordering::Acquire))
    }

    async fn idle_to(&self, to: SystemTime) {
        let target = unix_seconds(to);
        while self.seconds.load(Ordering::Acquire) < target {
            self.notify.notified().await;
        }
    }
}
