//! Ticking countdown shown between watch passes.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Spinner line that reads "Next check in 4m 59s" and counts down.
pub struct Countdown {
    bar: ProgressBar,
}

impl Countdown {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} Next check in {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// Wait out `interval`, refreshing the remaining time once a second.
    ///
    /// Returns `false` if `cancel` fired first.
    pub async fn wait(&self, interval: Duration, cancel: &CancellationToken) -> bool {
        let deadline = Instant::now() + interval;

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return true;
            }
            self.bar.set_message(remaining(left));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = sleep(left.min(Duration::from_secs(1))) => {}
            }
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// `1h 02m`, `4m 59s` or `12s`, rounded up to the next whole second.
fn remaining(left: Duration) -> String {
    let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, s) => format!("{}m {:02}s", m, s),
        (h, m, _) => format!("{}h {:02}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_format() {
        assert_eq!(remaining(Duration::from_secs(12)), "12s");
        assert_eq!(remaining(Duration::from_millis(11_200)), "12s");
        assert_eq!(remaining(Duration::from_secs(299)), "4m 59s");
        assert_eq!(remaining(Duration::from_secs(3720)), "1h 02m");
    }

    #[tokio::test]
    async fn test_wait_elapses() {
        let countdown = Countdown::new();
        let cancel = CancellationToken::new();
        assert!(countdown.wait(Duration::from_millis(50), &cancel).await);
    }

    #[tokio::test]
    async fn test_wait_stops_on_cancel() {
        let countdown = Countdown::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = std::time::Instant::now();
        assert!(!countdown.wait(Duration::from_secs(60), &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
