pub mod system_clock;
pub mod virtual_clock;

use std::fmt::Debug;
use std::ops::Deref;
pub use system_clock::SystemClock;
pub use virtual_clock::VirtualClock;

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

#[allow(unused_imports)]
use crate::queue::TaskQueue;

/// [`SchedulerClock`] is the time source every priority computation of the
/// [`TaskQueue`] and every idle period of the crawl workers goes through. Keeping the
/// clock behind a trait is what makes the politeness and revisit-cadence invariants
/// testable without waiting for wall time to pass
///
/// # Required Methods
/// When implementing the [`SchedulerClock`], one must provide implementations for two
/// methods, those being [`SchedulerClock::now`] and [`SchedulerClock::idle_to`], the
/// former is used to get the current time while the latter idles until a point of
/// interest is reached
///
/// # Trait Implementation(s)
/// Specifically, there are 2 noteworthy implementations to list, those being:
///
/// - [`SystemClock`] the default go-to clock backed by the operating system's wall
///   clock, it moves forward on its own
///
/// - [`VirtualClock`] used to simulate time in unit tests and simulations, it only
///   moves when explicitly advanced and implements [`AdvanceableSchedulerClock`]
///
/// # IMPORTANT Note(s)
/// Priorities are whole wall-clock seconds, a backwards clock jump therefore only makes
/// stored work appear not-yet-due for a while, it never corrupts queue state
///
/// # See Also
/// - [`SystemClock`]
/// - [`VirtualClock`]
/// - [`AdvanceableSchedulerClock`]
#[async_trait]
pub trait SchedulerClock: Debug + Send + Sync {
    /// Gets the current time of the clock
    ///
    /// # Returns
    /// The current time of the clock represented as [`SystemTime`]
    ///
    /// # See Also
    /// - [`SystemTime`]
    /// - [`SchedulerClock`]
    async fn now(&self) -> SystemTime;

    /// Idle until this specified time is reached (if it is in the past or present, it
    /// doesn't idle)
    ///
    /// # Arguments
    /// It accepts a ``to`` parameter, the point in time to reach by simply idling around
    ///
    /// # See Also
    /// - [`SystemTime`]
    /// - [`SchedulerClock`]
    async fn idle_to(&self, to: SystemTime);
}

#[async_trait]
impl<T> SchedulerClock for T
where
    T: Deref + Send + Sync + Debug,
    T::Target: SchedulerClock,
{
    async fn now(&self) -> SystemTime {
        self.deref().now().await
    }

    async fn idle_to(&self, to: SystemTime) {
        self.deref().idle_to(to).await
    }
}

/// [`AdvanceableSchedulerClock`] is an optional extension to [`SchedulerClock`] which,
/// as the name suggests, allows for arbitrary advancement of time. Clocks bound to the
/// operating system (such as [`SystemClock`]) cannot support it, as such why it is an
/// optional trait
///
/// # Required Methods
/// When implementing the [`AdvanceableSchedulerClock`], one has to implement
/// [`AdvanceableSchedulerClock::advance_to`], advancing by a duration comes for free
/// via [`AdvanceableSchedulerClock::advance`]
///
/// # See Also
/// - [`SchedulerClock`]
/// - [`VirtualClock`]
#[async_trait]
pub trait AdvanceableSchedulerClock: SchedulerClock {
    /// Advance the time by a specified duration forward
    ///
    /// # Arguments
    /// It accepts a ``duration`` parameter of type [`Duration`], the clock moves forward
    /// by exactly that amount (it uses [`AdvanceableSchedulerClock::advance_to`] under
    /// the hood)
    ///
    /// # See Also
    /// - [`Duration`]
    /// - [`AdvanceableSchedulerClock`]
    async fn advance(&self, duration: Duration) {
        let now = self.now().await;
        self.advance_to(now + duration).await
    }

    /// Advance the time to a specified desired future point of time
    ///
    /// # Arguments
    /// It accepts a ``to`` parameter of type [`SystemTime`], the clock jumps to that
    /// point and wakes everything idling on it
    ///
    /// # See Also
    /// - [`SystemTime`]
    /// - [`AdvanceableSchedulerClock`]
    async fn advance_to(&self, to: SystemTime);
}

#[async_trait]
impl<T> AdvanceableSchedulerClock for T
where
    T: Deref + Send + Sync + Debug,
    T::Target: AdvanceableSchedulerClock,
{
    async fn advance(&self, duration: Duration) {
        self.deref().advance(duration).await
    }

    async fn advance_to(&self, to: SystemTime) {
        self.deref().advance_to(to).await
    }
}
