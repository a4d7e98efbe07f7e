use crate::clock::SchedulerClock;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::SystemTime;

#[allow(unused_imports)]
use crate::clock::VirtualClock;

/// [`SystemClock`] is an implementation of the [`SchedulerClock`] trait, it is the default
/// option for crawling real sites, unlike [`VirtualClock`] it moves forward no matter what
/// and cannot be advanced at any arbitrary point (due to its design)
///
/// # IMPORTANT Note(s)
/// A target time that already lies in the past does not idle at all. The wall clock may
/// jump backwards (NTP corrections... etc.), in which case queued work simply appears
/// not-yet-due for a while
///
/// # See
/// - [`VirtualClock`]
/// - [`SchedulerClock`]
pub struct SystemClock;

impl Debug for SystemClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SystemClock")
            .field(&SystemTime::now())
            .finish()
    }
}

#[async_trait]
impl SchedulerClock for SystemClock {
    async fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn idle_to(&self, to: SystemTime) {
        if let Ok(duration) = to.duration_since(SystemTime::now()) {
            tokio::time::sleep(duration).await;
        }
    }
}
