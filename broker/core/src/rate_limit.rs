//! Per-endpoint-category sliding-window rate limiting:
//! each category tracks its own request timestamps and prunes everything
//! outside the window before deciding whether to wait.
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    MarketData,
    Trading,
    Historical,
}

struct Window {
    max_requests: usize,
    window: Duration,
    requests: VecDeque<Instant>,
}

impl Window {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self { max_requests, window, requests: VecDeque::new() }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.requests.front() {
            if now.duration_since(front) > self.window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns how long the caller must wait before its slot opens, `None`
    /// if a slot is free right now. Does not record the request itself.
    fn wait_needed(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);
        if self.requests.len() < self.max_requests {
            return None;
        }
        let oldest = *self.requests.front().expect("len >= max_requests > 0 implies non-empty");
        Some(self.window.saturating_sub(now.duration_since(oldest)))
    }

    fn record(&mut self, at: Instant) {
        self.requests.push_back(at);
    }
}

/// Caps one endpoint category to a fixed request budget per window. Brokers
/// hold one `RateLimiter` per venue, shared across every outbound call
/// through `acquire`.
pub struct RateLimiter {
    windows: Mutex<HashMap<EndpointCategory, Window>>,
}

impl RateLimiter {
    /// Default budgets: market data is polled frequently,
    /// trading calls are rarer, historical backfills are the least
    /// latency-sensitive.
    pub fn new() -> Self {
        let mut windows = HashMap::new();
        windows.insert(EndpointCategory::MarketData, Window::new(10, Duration::from_secs(1)));
        windows.insert(EndpointCategory::Trading, Window::new(5, Duration::from_secs(1)));
        windows.insert(EndpointCategory::Historical, Window::new(2, Duration::from_secs(1)));
        Self { windows: Mutex::new(windows) }
    }

    /// Overrides a single category's budget, leaving the other two at default.
    pub fn with_quota(category: EndpointCategory, max_requests: usize, window: Duration) -> Self {
        let limiter = Self::new();
        limiter.windows.lock().unwrap().insert(category, Window::new(max_requests, window));
        limiter
    }

    /// Awaits until a slot for `category` is free, then records the request.
    /// Prunes expired timestamps from the window on every call.
    pub async fn acquire(&self, category: EndpointCategory) {
        loop {
            let wait = {
                let mut windows = self.windows.lock().unwrap();
                let Some(window) = windows.get_mut(&category) else { return };
                window.wait_needed(Instant::now())
            };
            match wait {
                None => break,
                Some(delay) if delay.is_zero() => break,
                Some(delay) => sleep(delay).await,
            }
        }
        if let Some(window) = self.windows.lock().unwrap().get_mut(&category) {
            window.record(Instant::now());
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
