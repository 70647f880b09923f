//! Fixed-window send limiter

use std::time::Duration;
use tokio::time::Instant;

/// Allows `limit` sends per window; the window restarts on the first send after it lapses
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    window_start: Instant,
    sent: u32,
}

impl RateLimiter {
    /// Window length used by sessions
    pub const WINDOW: Duration = Duration::from_secs(60);

    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            window_start: Instant::now(),
            sent: 0,
        }
    }

    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Self::WINDOW)
    }

    /// Count one send, or return how long until the window rolls over
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window {
            self.window_start = now;
            self.sent = 0;
        }

        if self.sent >= self.limit {
            return Err(self.window.saturating_sub(elapsed.min(self.window)));
        }

        self.sent += 1;
        Ok(())
    }

    /// Sends counted in the current window
    #[must_use]
    pub fn sent_this_window(&self) -> u32 {
        self.sent
    }
}
