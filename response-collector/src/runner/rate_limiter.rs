//! Sliding-window request and token limiter for API backends

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

/// Keeps each HTTP backend under its provider's per-minute quotas.
///
/// Requests are admitted while fewer than `requests_per_minute` were made in
/// the trailing minute; token usage reported after each response is tracked
/// in the same window and new requests wait until it drops below
/// `tokens_per_minute`.
pub struct RateLimiter {
    requests_per_minute: u32,
    tokens_per_minute: u32,
    requests: Mutex<VecDeque<Instant>>,
    tokens: Mutex<VecDeque<(Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            tokens_per_minute,
            requests: Mutex::new(VecDeque::new()),
            tokens: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until both quotas allow another request, then record it
    pub async fn acquire(&self) {
        loop {
            if self.tokens_per_minute > 0 && self.current_token_usage().await >= self.tokens_per_minute {
                tokio::time::sleep(Duration::from_millis(250)).await;
                continue;
            }
            match self.try_admit().await {
                Ok(()) => return,
                Err(wait) => {
                    tracing::debug!("Request quota reached, sleeping {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Admit a request if the window has room, or report how long to wait.
    /// The check and the push happen under one lock.
    async fn try_admit(&self) -> Result<(), Duration> {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        while requests.front().is_some_and(|&t| now.duration_since(t) > WINDOW) {
            requests.pop_front();
        }

        if requests.len() < self.requests_per_minute as usize {
            requests.push_back(now);
            return Ok(());
        }
        let oldest = requests.front().copied().unwrap_or(now);
        Err(WINDOW.saturating_sub(now.duration_since(oldest)) + Duration::from_millis(10))
    }

    /// Record tokens consumed by a completed request
    pub async fn record_tokens(&self, tokens: u32) {
        let mut usage = self.tokens.lock().await;
        prune_tokens(&mut usage, Instant::now());
        usage.push_back((Instant::now(), tokens));
    }

    /// Tokens consumed in the trailing minute
    pub async fn current_token_usage(&self) -> u32 {
        let mut usage = self.tokens.lock().await;
        prune_tokens(&mut usage, Instant::now());
        usage.iter().map(|(_, t)| t).sum()
    }
}

fn prune_tokens(usage: &mut VecDeque<(Instant, u32)>, now: Instant) {
    while usage.front().is_some_and(|&(t, _)| now.duration_since(t) > WINDOW) {
        usage.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_acquire_within_quota_does_not_wait() {
        let limiter = RateLimiter::new(5, 0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_token_recording() {
        let limiter = RateLimiter::new(60, 1000);

        limiter.record_tokens(100).await;
        limiter.record_tokens(200).await;

        assert_eq!(limiter.current_token_usage().await, 300);
    }

    #[tokio::test]
    async fn test_wait_reported_when_full() {
        let limiter = RateLimiter::new(1, 0);
        limiter.acquire().await;
        let wait = limiter.try_admit().await.unwrap_err();
        assert!(wait > Duration::from_secs(59));
    }

    #[tokio::test]
    async fn test_concurrent_callers_cannot_exceed_quota() {
        let limiter = Arc::new(RateLimiter::new(2, 0));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    tokio::time::timeout(Duration::from_millis(200), limiter.acquire())
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 2);
    }
}
