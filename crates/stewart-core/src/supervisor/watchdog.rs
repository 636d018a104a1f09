use std::time::{Duration, Instant};

/// Edge-triggered loss-of-signal detector.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    last_feed: Option<Instant>,
    fired: bool,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_feed: None,
            fired: false,
        }
    }

    pub fn feed(&mut self, now: Instant) {
        self.last_feed = Some(now);
        self.fired = false;
    }

    /// True exactly once per silence longer than the timeout. Never fires
    /// before the first feed.
    pub fn check(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_feed else {
            return false;
        };
        if self.fired || now.saturating_duration_since(last) <= self.timeout {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn fired(&self) -> bool {
        self.fired
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
