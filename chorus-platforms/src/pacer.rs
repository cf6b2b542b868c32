//! Fixed-interval request gate.
//!
//! Every externally-bound call a session makes goes through its [`Pacer`],
//! which enforces a minimum spacing between successive calls without ever
//! blocking the runtime. Each session owns its own pacer, so throttling is
//! per-platform even if the orchestration is later made concurrent.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

pub struct Pacer {
    interval: Duration,
    /// Earliest instant the next call may proceed. The slot is reserved
    /// before sleeping so concurrent waiters queue instead of stampeding.
    next: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(None),
        }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(secs.max(0.0)))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the gate opens. The first call passes immediately; each
    /// call pushes the gate `interval` further out.
    pub async fn wait(&self) {
        let wake = {
            let mut next = self.next.lock().await;
            let now = Instant::now();
            let at = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(at + self.interval);
            at
        };
        sleep_until(wake).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_free_then_spacing_is_enforced() {
        let pacer = Pacer::new(Duration::from_millis(500));
        let t0 = Instant::now();

        pacer.wait().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);

        pacer.wait().await;
        assert!(t0.elapsed() >= Duration::from_millis(500));

        pacer.wait().await;
        assert!(t0.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_counts_toward_the_interval() {
        let pacer = Pacer::new(Duration::from_millis(200));
        pacer.wait().await;

        tokio::time::sleep(Duration::from_millis(300)).await;

        let before = Instant::now();
        pacer.wait().await;
        // Gate already open: no extra delay.
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_delays() {
        let pacer = Pacer::from_secs(0.0);
        let t0 = Instant::now();
        for _ in 0..5 {
            pacer.wait().await;
        }
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }
}
