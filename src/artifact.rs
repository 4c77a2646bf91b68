//! Baseline snapshot retrieval.
//!
//! The base layout comes from a durable artifact published by a prior run.
//! Publication races the check in CI, so retrieval is a bounded poll: fetch,
//! and if the snapshot is not there yet, wait and try again until a retry
//! policy is exhausted. The [`BaselineStore`] seam keeps the engine unaware
//! of where snapshots actually live; bundled stores cover a local directory
//! and a plain HTTP object store.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Baseline snapshot retrieval failed. Fatal: without a base snapshot there
/// is nothing to diff against.
#[derive(Debug, Error)]
pub enum BaselineError {
    /// Filesystem store could not be read.
    #[error("failed to read baseline snapshot {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// HTTP store request failed.
    #[error("baseline request to {url} failed: {source}")]
    Http {
        /// Request URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Polling exhausted without the snapshot appearing.
    #[error("no baseline snapshot for `{key}` after {attempts} attempts over {elapsed:?}")]
    NotFound {
        /// Snapshot key that was polled
        key: String,
        /// Attempts made
        attempts: u32,
        /// Wall-clock time spent
        elapsed: Duration,
    },
}

/// Where prior-run layout snapshots live.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Fetch the snapshot bytes for `key`; `Ok(None)` when the snapshot is
    /// not (yet) published.
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, BaselineError>;
}

// ── Bounded polling ────────────────────────────────────────────────

/// Bounds for polling a snapshot that may not be published yet.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum fetch attempts.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Wall-clock cap across all attempts.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
            max_wait: Duration::from_secs(120),
        }
    }
}

/// Poll `store` until the snapshot for `key` appears or the policy is
/// exhausted. Transport errors abort immediately; only "not there yet"
/// results are retried.
pub async fn fetch_with_retry(
    store: &dyn BaselineStore,
    key: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, BaselineError> {
    let started = tokio::time::Instant::now();
    let mut attempts = 0;
    loop {
        attempts += 1;
        if let Some(bytes) = store.fetch(key).await? {
            debug!(key, attempts, "baseline snapshot found");
            return Ok(bytes);
        }
        if attempts >= policy.max_attempts || started.elapsed() + policy.delay > policy.max_wait {
            return Err(BaselineError::NotFound {
                key: key.to_string(),
                attempts,
                elapsed: started.elapsed(),
            });
        }
        info!(
            key,
            attempt = attempts,
            delay = ?policy.delay,
            "baseline snapshot not published yet; retrying"
        );
        tokio::time::sleep(policy.delay).await;
    }
}

// ── Stores ─────────────────────────────────────────────────────────

/// Snapshot files in a local directory: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory holding snapshot files.
    pub dir: PathBuf,
}

#[async_trait]
impl BaselineStore for FileStore {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, BaselineError> {
        let path = self.dir.join(format!("{key}.json"));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BaselineError::Io { path, source }),
        }
    }
}

/// Snapshot objects behind HTTP: `GET <base_url>/<key>.json`.
/// A 404 means "not published yet", everything else non-2xx is an error.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStore {
    /// Fetch snapshots below `base_url` (no trailing slash required).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BaselineStore for HttpStore {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, BaselineError> {
        let url = format!("{}/{key}.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| BaselineError::Http {
                url: url.clone(),
                source,
            })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|source| BaselineError::Http {
                url: url.clone(),
                source,
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| BaselineError::Http { url, source })?;
        Ok(Some(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store that stays empty for the first `misses` fetches.
    struct EventualStore {
        misses: u32,
        calls: AtomicU32,
        payload: Vec<u8>,
    }

    #[async_trait]
    impl BaselineStore for EventualStore {
        async fn fetch(&self, _key: &str) -> Result<Option<Vec<u8>>, BaselineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.misses {
                Ok(None)
            } else {
                Ok(Some(self.payload.clone()))
            }
        }
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
            max_wait: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_fetch_succeeds_after_initial_misses() {
        let store = EventualStore {
            misses: 2,
            calls: AtomicU32::new(0),
            payload: b"{}".to_vec(),
        };
        let bytes = fetch_with_retry(&store, "vault", &quick_policy(5)).await.unwrap();
        assert_eq!(bytes, b"{}");
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_attempts() {
        let store = EventualStore {
            misses: u32::MAX,
            calls: AtomicU32::new(0),
            payload: Vec::new(),
        };
        let err = fetch_with_retry(&store, "vault", &quick_policy(3)).await.unwrap_err();
        match err {
            BaselineError::NotFound { key, attempts, .. } => {
                assert_eq!(key, "vault");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wall_clock_cap_bounds_polling() {
        let store = EventualStore {
            misses: u32::MAX,
            calls: AtomicU32::new(0),
            payload: Vec::new(),
        };
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            delay: Duration::from_millis(50),
            max_wait: Duration::from_millis(120),
        };
        let err = fetch_with_retry(&store, "vault", &policy).await.unwrap_err();
        assert!(matches!(err, BaselineError::NotFound { .. }));
        // 0ms, 50ms, 100ms fit under the cap; the next attempt would not.
        assert!(store.calls.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_file_store_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("vault.json"), b"{\"storage\":[]}")
            .await
            .unwrap();

        let store = FileStore {
            dir: dir.path().to_path_buf(),
        };
        let bytes = store.fetch("vault").await.unwrap().unwrap();
        assert_eq!(bytes, b"{\"storage\":[]}");
    }

    #[tokio::test]
    async fn test_file_store_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore {
            dir: dir.path().to_path_buf(),
        };
        assert!(store.fetch("ghost").await.unwrap().is_none());
    }
}
