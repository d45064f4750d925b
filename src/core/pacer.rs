//! Fixed-interval frame pacing.
//!
//! Each push is released one interval after the previous release. When an
//! iteration overruns, the schedule re-anchors at the current instant: no
//! burst of catch-up frames, no dropped frames.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_release: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_release: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant the frame just pushed should be held until.
    pub fn next_deadline(&mut self) -> Instant {
        let now = Instant::now();
        let base = self.last_release.unwrap_or(now);
        let deadline = (base + self.interval).max(now);
        self.last_release = Some(deadline);
        deadline
    }

    /// Sleep until [`Pacer::next_deadline`].
    pub async fn wait(&mut self) {
        let deadline = self.next_deadline();
        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn releases_on_a_fixed_schedule() {
        let start = Instant::now();
        let mut pacer = Pacer::new(Duration::from_millis(20));
        for _ in 0..5 {
            // Work shorter than the interval does not stretch the period.
            tokio::time::sleep(Duration::from_millis(5)).await;
            pacer.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_reanchors_without_catch_up() {
        let mut pacer = Pacer::new(Duration::from_millis(10));
        pacer.wait().await;

        // One slow iteration: 35ms of work.
        tokio::time::sleep(Duration::from_millis(35)).await;
        let before = Instant::now();
        let deadline = pacer.next_deadline();
        assert_eq!(deadline, before);

        // The following frame is a full interval later, not immediately.
        let next = pacer.next_deadline();
        assert_eq!(next - deadline, Duration::from_millis(10));
    }
}
