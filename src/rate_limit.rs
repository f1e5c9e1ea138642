use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window request log. Bounds how many fetches this controller
/// issues per window; it is local throttling, not a global quota.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    issued: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            issued: VecDeque::with_capacity(max_requests),
            max_requests,
            window,
        }
    }

    // prune, then record `now` if there is room left in the window
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        self.prune(now);

        if self.issued.len() < self.max_requests {
            self.issued.push_back(now);
            return true;
        }
        false
    }

    pub fn remaining(&mut self) -> usize {
        self.prune(Instant::now());
        self.max_requests.saturating_sub(self.issued.len())
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.issued.front() {
            if now.duration_since(oldest) < self.window {
                break;
            }
            self.issued.pop_front();
        }
    }
}
