use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use fieldnotes_core::util::owner_fingerprint;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone, Copy)]
pub enum ProtectedEndpoint {
    /// `POST /v1/sync`
    Sync,
    /// Note and device CRUD
    Notes,
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Notes => "notes",
        }
    }
}

/// Fixed-window limits for the sync and notes surfaces.
///
/// Each surface has its own budget and its own table of per-user windows, so a
/// burst of note edits never eats into a device's sync allowance.
pub struct EndpointRateLimiter {
    sync: Bucket,
    notes: Bucket,
    window: Duration,
}

struct Bucket {
    limit: u32,
    windows: Mutex<HashMap<String, Window>>,
    allowed: AtomicU64,
    limited: AtomicU64,
}

struct Window {
    opened: Instant,
    hits: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BucketSnapshot {
    pub allowed: u64,
    pub limited: u64,
    /// Users with a window still open
    pub tracked: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub sync: BucketSnapshot,
    pub notes: BucketSnapshot,
}

impl EndpointRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_window,
            config.sync_rate_limit_per_window,
            config.notes_rate_limit_per_window,
        )
    }

    fn new(window: Duration, sync_limit: u32, notes_limit: u32) -> Self {
        Self {
            sync: Bucket::new(sync_limit),
            notes: Bucket::new(notes_limit),
            window,
        }
    }

    const fn bucket(&self, endpoint: ProtectedEndpoint) -> &Bucket {
        match endpoint {
            ProtectedEndpoint::Sync => &self.sync,
            ProtectedEndpoint::Notes => &self.notes,
        }
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, user_id: &str) -> Result<(), AppError> {
        let bucket = self.bucket(endpoint);
        match bucket.admit(user_id, self.window).await {
            Ok(()) => {
                bucket.allowed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(retry_after) => {
                bucket.limited.fetch_add(1, Ordering::Relaxed);
                let retry_after_secs = retry_after.as_secs();
                tracing::warn!(
                    endpoint = endpoint.label(),
                    user = owner_fingerprint(user_id),
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                Err(AppError::too_many_requests(
                    format!("{} rate limit exceeded", endpoint.label()),
                    retry_after_secs,
                ))
            }
        }
    }

    pub async fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            sync: self.sync.snapshot().await,
            notes: self.notes.snapshot().await,
        }
    }
}

impl Bucket {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
            allowed: AtomicU64::new(0),
            limited: AtomicU64::new(0),
        }
    }

    /// Count one hit for `user_id`, or return how long until its window reopens
    async fn admit(&self, user_id: &str, window: Duration) -> Result<(), Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if let Some(current) = windows.get_mut(user_id) {
            let elapsed = now.duration_since(current.opened);
            if elapsed >= window {
                current.opened = now;
                current.hits = 0;
            } else if current.hits >= self.limit {
                return Err(window.saturating_sub(elapsed));
            }
            current.hits += 1;
            return Ok(());
        }

        // Only new users grow the table, so expired windows are swept here
        windows.retain(|_, open| now.duration_since(open.opened) < window);
        windows.insert(
            user_id.to_string(),
            Window {
                opened: now,
                hits: 1,
            },
        );
        Ok(())
    }

    async fn snapshot(&self) -> BucketSnapshot {
        BucketSnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            limited: self.limited.load(Ordering::Relaxed),
            tracked: self.windows.lock().await.len(),
        }
    }
}
