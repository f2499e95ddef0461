// Fixed-rate tick scheduler for control loops
//
// Computes the remaining time to the next tick boundary on a monotonic
// clock and suspends the calling task, never the process. A loop that runs
// long simply gets a shorter wait on the next tick.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Keeps an async loop close to a desired tick frequency.
pub struct Rate {
    interval: Interval,
    period: Duration,
}

impl Rate {
    /// A rate ticking `hz` times per second.
    pub fn new(hz: u32) -> Self {
        Self::with_period(Duration::from_secs_f64(1.0 / hz as f64))
    }

    /// A rate with an explicit tick period.
    pub fn with_period(period: Duration) -> Self {
        // first tick lands one full period from now
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    /// Suspend until the next tick boundary.
    pub async fn wait(&mut self) {
        self.interval.tick().await;
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
