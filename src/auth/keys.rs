// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Installation public key fetching with a degraded-mode fallback cache.
//!
//! ## Behavior
//!
//! - Every resolution tries the key-distribution endpoint first
//!   (`GET {base}/{kid}`), with no retry
//! - A successful fetch refreshes the fallback cache entry for that key id
//! - On transport failure or non-success status the fallback cache is
//!   consulted; an unexpired entry is returned (fail-open for availability),
//!   otherwise resolution fails with `KeyUnavailable`
//!
//! The cache is owned by the resolver and shared via `Arc`; its periodic
//! sweep runs on a tokio task stopped through a `CancellationToken`.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::error::AuthError;

/// Default key-distribution endpoint.
pub const DEFAULT_INSTALL_KEYS_URL: &str = "https://connect-install-keys.atlassian.com";

/// Default freshness window of a fallback entry (4 hours).
pub const DEFAULT_FALLBACK_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Default periodic sweep interval (1 hour).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Maximum number of key ids remembered.
const FALLBACK_CAPACITY: usize = 256;

/// Fallback cache entry.
struct CacheEntry {
    pem: String,
    inserted_at: Instant,
}

/// Time-bounded keyId → PEM cache, read only when the live fetch fails.
pub struct FallbackKeyCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl FallbackKeyCache {
    /// Create a cache with the given freshness window and sweep interval.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        let capacity = NonZeroUsize::new(FALLBACK_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            sweep_interval,
        }
    }

    /// Get an unexpired key. Expired entries are evicted on the way.
    pub fn get(&self, kid: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        if let Some(entry) = entries.get(kid) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.pem.clone());
            }
            entries.pop(kid);
        }
        None
    }

    /// Store a freshly fetched key, restarting its freshness window.
    pub fn put(&self, kid: &str, pem: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                kid.to_string(),
                CacheEntry {
                    pem,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(kid, _)| kid.clone())
            .collect();
        for kid in &expired {
            entries.pop(kid);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`sweep`](Self::sweep) every sweep interval until `shutdown` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Key cache sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired installation keys");
                        }
                    }
                }
            }
        })
    }
}

impl Default for FallbackKeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_TTL, DEFAULT_SWEEP_INTERVAL)
    }
}

/// Resolves installation public keys by key id.
#[derive(Clone)]
pub struct KeyResolver {
    /// Key-distribution base URL
    base_url: String,
    /// Degraded-mode cache
    cache: Arc<FallbackKeyCache>,
    /// HTTP client
    client: reqwest::Client,
}

impl KeyResolver {
    /// Create a resolver against `base_url` using the given fallback cache.
    pub fn new(base_url: impl Into<String>, cache: Arc<FallbackKeyCache>) -> Self {
        Self {
            base_url: base_url.into(),
            cache,
            client: reqwest::Client::new(),
        }
    }

    pub fn cache(&self) -> &Arc<FallbackKeyCache> {
        &self.cache
    }

    fn key_url(&self, kid: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(kid)
        )
    }

    /// Resolve the PEM-encoded public key for `kid`.
    #[instrument(skip_all, fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<String, AuthError> {
        if kid.is_empty() {
            return Err(AuthError::KeyUnavailable(String::new()));
        }

        match self.fetch(kid).await {
            Ok(pem) => {
                self.cache.put(kid, pem.clone());
                Ok(pem)
            }
            Err(reason) => match self.cache.get(kid) {
                Some(pem) => {
                    tracing::warn!(kid = %kid, reason = %reason, "Using fallback installation key");
                    Ok(pem)
                }
                None => {
                    tracing::error!(kid = %kid, reason = %reason, "Installation key unavailable");
                    Err(AuthError::KeyUnavailable(kid.to_string()))
                }
            },
        }
    }

    /// Live fetch from the key-distribution endpoint.
    async fn fetch(&self, kid: &str) -> Result<String, String> {
        let response = self
            .client
            .get(self.key_url(kid))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {} from key endpoint", response.status()));
        }

        response.text().await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----\n";

    fn resolver(base: &str, ttl: Duration) -> KeyResolver {
        KeyResolver::new(base, Arc::new(FallbackKeyCache::new(ttl, DEFAULT_SWEEP_INTERVAL)))
    }

    #[test]
    fn cache_put_and_get() {
        let cache = FallbackKeyCache::default();
        assert!(cache.get("k1").is_none());
        cache.put("k1", PEM.to_string());
        assert_eq!(cache.get("k1").as_deref(), Some(PEM));
    }

    #[test]
    fn cache_ttl_expiry_evicts_lazily() {
        let cache = FallbackKeyCache::new(Duration::from_millis(1), DEFAULT_SWEEP_INTERVAL);
        cache.put("k1", PEM.to_string());
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("k1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_removes_only_expired() {
        let cache = FallbackKeyCache::new(Duration::from_millis(20), DEFAULT_SWEEP_INTERVAL);
        cache.put("old", PEM.to_string());
        std::thread::sleep(Duration::from_millis(30));
        cache.put("new", PEM.to_string());

        assert_eq!(cache.sweep(), 1);
        assert!(cache.get("new").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancellation() {
        let cache = Arc::new(FallbackKeyCache::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));
        cache.put("k1", PEM.to_string());

        let shutdown = CancellationToken::new();
        let handle = cache.spawn_sweeper(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_put_get_sweep_is_consistent() {
        const TASKS: usize = 8;
        const KEYS_PER_TASK: usize = 16;

        let cache = Arc::new(FallbackKeyCache::new(
            Duration::from_secs(60),
            DEFAULT_SWEEP_INTERVAL,
        ));

        let handles: Vec<_> = (0..TASKS)
            .map(|task| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for n in 0..KEYS_PER_TASK {
                        let kid = format!("k{task}-{n}");
                        cache.put(&kid, format!("pem-{kid}"));
                        // Nothing is expired yet, so concurrent sweeps remove nothing
                        assert_eq!(cache.sweep(), 0);
                        tokio::task::yield_now().await;
                        assert_eq!(cache.get(&kid), Some(format!("pem-{kid}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), TASKS * KEYS_PER_TASK);
        for task in 0..TASKS {
            for n in 0..KEYS_PER_TASK {
                let kid = format!("k{task}-{n}");
                assert_eq!(cache.get(&kid), Some(format!("pem-{kid}")));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_race_the_sweeper() {
        let cache = Arc::new(FallbackKeyCache::new(
            Duration::from_millis(20),
            Duration::from_millis(1),
        ));
        let shutdown = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(shutdown.clone());

        let handles: Vec<_> = (0..4)
            .map(|task| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for n in 0..50 {
                        cache.put(&format!("k{task}-{n}"), PEM.to_string());
                        let _ = cache.get(&format!("k{task}-{}", n / 2));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());
        assert_eq!(cache.sweep(), 0);

        shutdown.cancel();
        sweeper.await.unwrap();
    }

    #[tokio::test]
    async fn live_fetch_populates_fallback_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/k1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PEM))
            .mount(&server)
            .await;

        let resolver = resolver(&server.uri(), DEFAULT_FALLBACK_TTL);
        assert_eq!(resolver.resolve("k1").await.unwrap(), PEM);
        assert_eq!(resolver.cache().get("k1").as_deref(), Some(PEM));
    }

    #[tokio::test]
    async fn endpoint_failure_falls_back_until_window_elapses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/k1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PEM))
            .mount(&server)
            .await;

        let resolver = resolver(&server.uri(), Duration::from_millis(200));
        resolver.resolve("k1").await.unwrap();

        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/k1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        // Degraded mode: stale-but-fresh-enough key
        assert_eq!(resolver.resolve("k1").await.unwrap(), PEM);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(
            resolver.resolve("k1").await.unwrap_err(),
            AuthError::KeyUnavailable("k1".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_key_without_cache_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = resolver(&server.uri(), DEFAULT_FALLBACK_TTL);
        assert!(matches!(
            resolver.resolve("missing").await,
            Err(AuthError::KeyUnavailable(_))
        ));
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_unavailable() {
        // Nothing listens on port 1
        let resolver = resolver("http://127.0.0.1:1", DEFAULT_FALLBACK_TTL);
        assert!(matches!(
            resolver.resolve("k1").await,
            Err(AuthError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn key_id_is_escaped_in_url() {
        let resolver = resolver("https://keys.example/", DEFAULT_FALLBACK_TTL);
        assert_eq!(resolver.key_url("k1"), "https://keys.example/k1");
        assert_eq!(resolver.key_url("../etc"), "https://keys.example/..%2Fetc");
    }
}
