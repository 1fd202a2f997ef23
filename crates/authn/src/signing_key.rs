//! Signing-key resolution for Bearer tokens.
//!
//! [`JwksKeyResolver`] keeps verification keys from a JSON Web Key Set in
//! memory and only goes back to the source when a `kid` is not cached.
//!
//! # Architecture
//!
//! ```text
//! kid → check cache
//!     → miss? take refresh lock, re-check cache
//!     → take a token from the fetch budget (N per minute, burst N)
//!     → fetch key set via JwksFetcher, cache every usable key
//!     → return key for kid, or NotFound
//! ```
//!
//! # Cache Strategy
//!
//! - **TTL**: none; keys stay until evicted
//! - **Eviction**: capacity bound (LRU) or [`invalidate`](JwksKeyResolver::invalidate) /
//!   [`clear`](JwksKeyResolver::clear)
//! - **Stampede control**: concurrent misses share one fetch
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gatekeeper_authn::{
//!     config::JwksConfig,
//!     signing_key::{HttpJwksFetcher, JwksKeyResolver, SigningKeyResolver},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JwksConfig::builder()
//!     .uri("https://tenant.example.com/.well-known/jwks.json".parse()?)
//!     .build()?;
//! let resolver = JwksKeyResolver::new(Arc::new(HttpJwksFetcher::new(&config)?), &config);
//!
//! let key = resolver.resolve("key-2024-001").await?;
//! # Ok(())
//! # }
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use fail::fail_point;
use jsonwebtoken::{DecodingKey, jwk::JwkSet};
use moka::future::Cache;
use parking_lot::Mutex;
use url::Url;

use crate::{config::JwksConfig, error::KeyResolverError};

/// Looks up the verification key for a JWT `kid`.
#[async_trait]
pub trait SigningKeyResolver: Send + Sync {
    /// Returns the key published under `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolverError`] if the key is unknown, the source cannot
    /// be reached, or the fetch budget is exhausted.
    async fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolverError>;
}

/// Source of a JSON Web Key Set.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Fetches the current key set.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolverError::Fetch`] if the set cannot be retrieved or
    /// decoded.
    async fn fetch(&self) -> Result<JwkSet, KeyResolverError>;
}

/// Fetches a key set over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    uri: Url,
}

impl HttpJwksFetcher {
    /// Creates a fetcher for the configured URI and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolverError::Fetch`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &JwksConfig) -> Result<Self, KeyResolverError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| KeyResolverError::fetch_with_source("failed to build HTTP client", err))?;
        Ok(Self { client, uri: config.uri().clone() })
    }

    /// Creates a fetcher with a caller-supplied client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, uri: Url) -> Self {
        Self { client, uri }
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    #[tracing::instrument(skip(self), fields(uri = %self.uri))]
    async fn fetch(&self) -> Result<JwkSet, KeyResolverError> {
        let response = self
            .client
            .get(self.uri.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| KeyResolverError::fetch_with_source("key set request failed", err))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|err| KeyResolverError::fetch_with_source("key set response is not a JWKS", err))
    }
}

/// Serves a fixed key set, for local development and tests.
#[derive(Debug, Clone)]
pub struct StaticJwksFetcher {
    set: JwkSet,
}

impl StaticJwksFetcher {
    /// Wraps an existing key set.
    #[must_use]
    pub fn new(set: JwkSet) -> Self {
        Self { set }
    }

    /// Parses a key set from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolverError::Fetch`] if `json` is not a valid JWKS.
    pub fn from_json(json: &str) -> Result<Self, KeyResolverError> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|err| KeyResolverError::fetch_with_source("invalid JWKS document", err))
    }
}

#[async_trait]
impl JwksFetcher for StaticJwksFetcher {
    async fn fetch(&self) -> Result<JwkSet, KeyResolverError> {
        Ok(self.set.clone())
    }
}

/// Token bucket bounding live key-set fetches.
#[derive(Debug)]
struct FetchBudget {
    tokens: f64,
    last_refill: Instant,
    rate_per_sec: f64,
    burst: f64,
}

impl FetchBudget {
    fn per_minute(requests: u32) -> Self {
        let burst = f64::from(requests.max(1));
        Self { tokens: burst, last_refill: Instant::now(), rate_per_sec: burst / 60.0, burst }
    }

    /// Consumes one token, or returns how long until one is available.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        let refill = now.duration_since(self.last_refill).as_secs_f64() * self.rate_per_sec;
        self.tokens = (self.tokens + refill).min(self.burst);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.rate_per_sec))
        }
    }
}

/// Caching [`SigningKeyResolver`] backed by a [`JwksFetcher`].
///
/// Cache hits never touch the network. A miss fetches the whole key set
/// (subject to the per-minute budget) and caches every key in it, so a
/// rotation is picked up by the first request that presents the new `kid`.
pub struct JwksKeyResolver {
    fetcher: Arc<dyn JwksFetcher>,
    cache: Cache<String, Arc<DecodingKey>>,
    budget: Mutex<FetchBudget>,
    /// Serializes refreshes so concurrent misses share one fetch.
    refresh: tokio::sync::Mutex<()>,
    fetch_count: AtomicU64,
    rate_limited_count: AtomicU64,
}

impl std::fmt::Debug for JwksKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKeyResolver")
            .field("entry_count", &self.cache.entry_count())
            .field("fetch_count", &self.fetch_count())
            .field("rate_limited_count", &self.rate_limited_count())
            .finish_non_exhaustive()
    }
}

impl JwksKeyResolver {
    /// Creates a resolver using the budget and capacity from `config`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn JwksFetcher>, config: &JwksConfig) -> Self {
        Self::with_limits(fetcher, config.requests_per_minute(), config.cache_capacity())
    }

    /// Creates a resolver with explicit limits.
    ///
    /// # Arguments
    ///
    /// * `requests_per_minute` - Live fetches allowed per minute, also the burst size
    /// * `capacity` - Maximum number of cached keys
    #[must_use]
    pub fn with_limits(fetcher: Arc<dyn JwksFetcher>, requests_per_minute: u32, capacity: u64) -> Self {
        Self {
            fetcher,
            cache: Cache::builder().max_capacity(capacity).build(),
            budget: Mutex::new(FetchBudget::per_minute(requests_per_minute)),
            refresh: tokio::sync::Mutex::new(()),
            fetch_count: AtomicU64::new(0),
            rate_limited_count: AtomicU64::new(0),
        }
    }

    /// Removes a single key; the next lookup for it fetches again.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self, kid: &str) {
        self.cache.invalidate(kid).await;
        tracing::info!("signing key invalidated");
    }

    /// Removes every cached key.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) {
        let evicted = self.cache.entry_count();
        self.cache.invalidate_all();
        tracing::info!(evicted, "signing key cache cleared");
    }

    /// Returns the number of cached keys.
    ///
    /// Eventually consistent; call [`sync`](Self::sync) first for exact
    /// counts.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns the number of live key-set fetches performed.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Returns the number of misses rejected by the fetch budget.
    #[must_use]
    pub fn rate_limited_count(&self) -> u64 {
        self.rate_limited_count.load(Ordering::Relaxed)
    }

    /// Runs pending cache maintenance so counts are exact.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }

    async fn refresh(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolverError> {
        let acquired = self.budget.lock().try_acquire();
        if let Err(retry_after) = acquired {
            self.rate_limited_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(retry_after_ms = retry_after.as_millis() as u64, "key set fetch rate limited");
            return Err(KeyResolverError::RateLimited { retry_after });
        }

        fail_point!("jwks-before-fetch", |_| {
            Err(KeyResolverError::fetch("injected failure before key set fetch"))
        });

        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let set = self.fetcher.fetch().await?;

        let mut requested = None;
        let mut rejected = None;
        for jwk in &set.keys {
            let Some(key_id) = jwk.common.key_id.as_deref() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    let key = Arc::new(key);
                    if key_id == kid {
                        requested = Some(Arc::clone(&key));
                    }
                    self.cache.insert(key_id.to_owned(), key).await;
                },
                Err(err) => {
                    tracing::warn!(kid = key_id, error = %err, "skipping unusable key in key set");
                    if key_id == kid {
                        rejected = Some(err);
                    }
                },
            }
        }
        tracing::debug!(keys = set.keys.len(), "key set fetched");

        match (requested, rejected) {
            (Some(key), _) => Ok(key),
            (None, Some(err)) => Err(KeyResolverError::invalid_key(err.to_string())),
            (None, None) => Err(KeyResolverError::not_found(kid)),
        }
    }
}

#[async_trait]
impl SigningKeyResolver for JwksKeyResolver {
    #[tracing::instrument(skip(self))]
    async fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolverError> {
        if let Some(key) = self.cache.get(kid).await {
            tracing::debug!("cache hit");
            return Ok(key);
        }

        let _guard = self.refresh.lock().await;
        if let Some(key) = self.cache.get(kid).await {
            tracing::debug!("cache hit after waiting for refresh");
            return Ok(key);
        }

        tracing::debug!("cache miss");
        self.refresh(kid).await
    }
}
