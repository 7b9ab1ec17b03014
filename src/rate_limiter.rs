//! Sliding-window rate limiter for cloud generation requests.
//!
//! Tracks request timestamps inside a trailing window and suspends callers
//! until a slot frees up. The window is persisted to a small file of raw
//! epoch timestamps so the quota survives process restarts.
//!
//! Only a single process is coordinated: two processes sharing the same state
//! file may race on it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Default maximum requests per window (Veo per-project quota).
pub const DEFAULT_MAX_REQUESTS: usize = 10;

/// Default window length (60 seconds).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Extra delay added to every computed wait.
const WAIT_BUFFER: Duration = Duration::from_millis(100);

/// File name of the persisted window inside the data directory.
pub const DEFAULT_STATE_FILE_NAME: &str = "google_api_rate_limit";

/// Snapshot of the limiter returned by [`RateLimiter::get_status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStatus {
    pub current_requests: usize,
    pub max_requests: usize,
    pub window_seconds: f64,
    pub requests_available: usize,
    pub wait_time_seconds: f64,
    pub can_make_request: bool,
}

/// Process-wide request gate.
///
/// Construct once at startup and share it (`Arc<RateLimiter>`) with every
/// client that spends quota.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    state_file: Option<PathBuf>,
    /// Request timestamps in seconds since the epoch, oldest first.
    window_state: Mutex<VecDeque<f64>>,
    /// Serialises the whole evict-wait-append-persist sequence.
    record_gate: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    /// Create a limiter backed by `state_file`, loading any recent history.
    ///
    /// A `max_requests` of zero is treated as one.
    pub fn new(max_requests: usize, window: Duration, state_file: Option<PathBuf>) -> Self {
        let limiter = Self {
            max_requests: max_requests.max(1),
            window,
            state_file,
            window_state: Mutex::new(VecDeque::new()),
            record_gate: tokio::sync::Mutex::new(()),
        };

        let loaded = limiter.load_state();
        *limiter.lock_window() = loaded;

        log::info!(
            "RateLimiter initialized: {} requests per {:?}",
            limiter.max_requests,
            limiter.window
        );
        limiter
    }

    /// Create a limiter with no persistence.
    pub fn in_memory(max_requests: usize, window: Duration) -> Self {
        Self::new(max_requests, window, None)
    }

    /// Create a limiter with the default quota persisted at `state_file`.
    pub fn with_defaults(state_file: Option<PathBuf>) -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, state_file)
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    /// Wait for a free slot, then record one request.
    ///
    /// When this returns the window holds at most `max_requests` timestamps
    /// and the caller may issue exactly one request.
    ///
    /// Timestamps come from the wall clock while waits sleep on tokio's
    /// timer. With a paused tokio clock a full window never drains, so tests
    /// that pause time must keep this limiter below its quota.
    pub async fn record_request(&self, label: &str) {
        let _gate = self.record_gate.lock().await;

        loop {
            let wait = {
                let mut window = self.lock_window();
                let now = now_secs();
                self.evict(&mut window, now);

                if window.len() < self.max_requests {
                    window.push_back(now);
                    self.save_state(&window);
                    log::debug!(
                        "Request recorded for '{}': {}/{} in current window",
                        label,
                        window.len(),
                        self.max_requests
                    );
                    return;
                }

                let wait = self.wait_for(&window, now);
                log::info!(
                    "Rate limit: {}/{} requests used. Waiting {:.1}s before {}...",
                    window.len(),
                    self.max_requests,
                    wait.as_secs_f64(),
                    label
                );
                wait
            };

            tokio::time::sleep(wait + WAIT_BUFFER).await;
        }
    }

    /// Current limiter state. Never blocks on a pending `record_request`.
    pub fn get_status(&self) -> RateLimitStatus {
        let mut window = self.lock_window();
        let now = now_secs();
        self.evict(&mut window, now);

        let current = window.len();
        let wait = self.wait_for(&window, now);
        RateLimitStatus {
            current_requests: current,
            max_requests: self.max_requests,
            window_seconds: self.window.as_secs_f64(),
            requests_available: self.max_requests.saturating_sub(current),
            wait_time_seconds: wait.as_secs_f64(),
            can_make_request: wait.is_zero(),
        }
    }

    /// Number of requests inside the current window.
    pub fn current_count(&self) -> usize {
        self.get_status().current_requests
    }

    /// Clear all history and persist the empty window.
    pub fn reset(&self) {
        let mut window = self.lock_window();
        window.clear();
        self.save_state(&window);
        log::info!("Rate limiter reset");
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        self.window_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn evict(&self, window: &mut VecDeque<f64>, now: f64) {
        let cutoff = now - self.window.as_secs_f64();
        while window.front().is_some_and(|&oldest| oldest < cutoff) {
            window.pop_front();
        }
    }

    fn wait_for(&self, window: &VecDeque<f64>, now: f64) -> Duration {
        if window.len() < self.max_requests {
            return Duration::ZERO;
        }
        match window.front() {
            Some(&oldest) => {
                let remaining = oldest + self.window.as_secs_f64() - now;
                Duration::try_from_secs_f64(remaining.max(0.0))
                    .map_or(self.window, |wait| wait.min(self.window))
            }
            None => Duration::ZERO,
        }
    }

    fn load_state(&self) -> VecDeque<f64> {
        let mut window = VecDeque::new();
        let Some(path) = &self.state_file else {
            return window;
        };
        if !path.exists() {
            return window;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to load rate limit state from {}: {}", path.display(), e);
                return window;
            }
        };

        let now = now_secs();
        let window_secs = self.window.as_secs_f64();
        let mut timestamps: Vec<f64> = content
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                match line.parse::<f64>() {
                    Ok(ts) => Some(ts),
                    Err(_) => {
                        log::warn!("Skipping malformed rate limit entry: {:?}", line);
                        None
                    }
                }
            })
            .filter(|&ts| {
                if !ts.is_finite() || ts > now {
                    log::warn!("Skipping out-of-range rate limit entry: {}", ts);
                    return false;
                }
                now - ts < window_secs
            })
            .collect();
        timestamps.sort_by(|a, b| a.total_cmp(b));
        window.extend(timestamps);

        log::debug!("Loaded {} recent requests from state file", window.len());
        window
    }

    fn save_state(&self, window: &VecDeque<f64>) {
        let Some(path) = &self.state_file else {
            return;
        };

        let mut content = String::with_capacity(window.len() * 20);
        for ts in window {
            content.push_str(&ts.to_string());
            content.push('\n');
        }

        let result = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| std::fs::write(path, content));
        if let Err(e) = result {
            log::warn!("Failed to save rate limit state to {}: {}", path.display(), e);
        }
    }
}

/// Default location of the persisted window:
/// `~/.local/share/living-portrait/google_api_rate_limit` on Linux.
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("living-portrait")
        .join(DEFAULT_STATE_FILE_NAME)
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_MAX_REQUESTS, 10);
        assert_eq!(DEFAULT_WINDOW, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_max_requests_is_clamped() {
        let limiter = RateLimiter::in_memory(0, Duration::from_secs(1));
        assert_eq!(limiter.max_requests(), 1);
    }

    #[test]
    fn test_fresh_limiter_status() {
        let limiter = RateLimiter::in_memory(10, Duration::from_secs(60));
        let status = limiter.get_status();
        assert_eq!(status.current_requests, 0);
        assert_eq!(status.max_requests, 10);
        assert_eq!(status.requests_available, 10);
        assert_eq!(status.window_seconds, 60.0);
        assert_eq!(status.wait_time_seconds, 0.0);
        assert!(status.can_make_request);
    }

    #[test]
    fn test_evict_drops_only_stale_entries() {
        let limiter = RateLimiter::in_memory(10, Duration::from_secs(60));
        let now = 1_000.0;
        let mut window: VecDeque<f64> = [900.0, 939.0, 941.0, 999.0].into_iter().collect();
        limiter.evict(&mut window, now);
        assert_eq!(window, VecDeque::from(vec![941.0, 999.0]));
    }

    #[test]
    fn test_wait_for_full_window_uses_oldest_entry() {
        let limiter = RateLimiter::in_memory(2, Duration::from_secs(60));
        let window: VecDeque<f64> = [950.0, 990.0].into_iter().collect();
        let wait = limiter.wait_for(&window, 1_000.0);
        assert_eq!(wait, Duration::from_secs(10));
    }

    #[test]
    fn test_wait_for_never_exceeds_window() {
        let limiter = RateLimiter::in_memory(1, Duration::from_secs(60));
        let future: VecDeque<f64> = [4_600.0].into_iter().collect();
        assert_eq!(limiter.wait_for(&future, 1_000.0), Duration::from_secs(60));
        let infinite: VecDeque<f64> = [f64::INFINITY].into_iter().collect();
        assert_eq!(limiter.wait_for(&infinite, 1_000.0), Duration::from_secs(60));
    }

    #[test]
    fn test_wait_for_with_free_slot_is_zero() {
        let limiter = RateLimiter::in_memory(3, Duration::from_secs(60));
        let window: VecDeque<f64> = [950.0, 990.0].into_iter().collect();
        assert_eq!(limiter.wait_for(&window, 1_000.0), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let limiter = RateLimiter::in_memory(5, Duration::from_secs(60));
        limiter.record_request("test").await;
        limiter.record_request("test").await;
        assert_eq!(limiter.current_count(), 2);

        limiter.reset();
        assert_eq!(limiter.current_count(), 0);
    }

    #[test]
    fn test_default_state_path_file_name() {
        let path = default_state_path();
        assert!(path.ends_with("living-portrait/google_api_rate_limit"));
    }
}
