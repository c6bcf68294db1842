use std::time::{Duration, Instant};

/// Fires at a fixed period when polled from a loop that runs more often than that.
#[derive(Debug)]
pub struct Ticker {
    last_fired: Option<Instant>,
    pub period: Duration,
}

impl Ticker {
    /// Creates a ticker whose first tick is one full period after the first poll.
    pub fn new(period: Duration) -> Self {
        Self {
            last_fired: None,
            period,
        }
    }

    /// Returns `true` if a period has elapsed since the last tick, and starts the next period.
    ///
    /// Missed periods are not caught up on: a late poll fires once.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last_fired {
            None => {
                self.last_fired = Some(now);
                false
            }
            Some(last) if now.saturating_duration_since(last) >= self.period => {
                self.last_fired = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_period() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_millis(500));

        assert!(!ticker.poll(start));
        assert!(!ticker.poll(start + Duration::from_millis(499)));
        assert!(ticker.poll(start + Duration::from_millis(500)));
        assert!(!ticker.poll(start + Duration::from_millis(600)));
        assert!(ticker.poll(start + Duration::from_millis(1000)));
    }

    #[test]
    fn late_poll_fires_once() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_millis(100));
        ticker.poll(start);

        assert!(ticker.poll(start + Duration::from_secs(5)));
        assert!(!ticker.poll(start + Duration::from_secs(5)));
    }
}
