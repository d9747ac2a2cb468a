//! Signing key sources.
//!
//! [`RemoteAuthority`] follows the OpenID discovery document to the
//! authority's JWKS and caches the result for a fixed TTL in an
//! `ArcSwapOption`, so readers never take a lock. Fetches are serialized
//! behind an async mutex: when the cache expires, one request refetches and
//! the others wait for its result. A token signed with a key the cache does
//! not know forces one early refresh, at most once per
//! [`MIN_FORCED_REFRESH_INTERVAL`]. A failed fetch fails the requests
//! waiting on it and is not retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::AuthError;

/// Upper bound for a single discovery or JWKS request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum spacing between refreshes forced by unknown key ids.
pub const MIN_FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Keys and issuer published by an authority.
#[derive(Debug, Clone)]
pub struct SigningKeys {
    /// Expected `iss` claim. `None` skips issuer validation.
    pub issuer: Option<String>,
    pub keys: JwkSet,
}

#[async_trait]
pub trait SigningKeySource: Send + Sync {
    async fn signing_keys(&self) -> Result<Arc<SigningKeys>, AuthError>;

    /// Called when a token names a key the current set lacks. Sources that
    /// can pick up rotated keys refetch here; the default returns the
    /// current set.
    async fn refresh(&self) -> Result<Arc<SigningKeys>, AuthError> {
        self.signing_keys().await
    }
}

/// Fixed key set, for tests and air-gapped deployments.
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    keys: Arc<SigningKeys>,
}

impl StaticKeySource {
    #[must_use]
    pub fn new(keys: SigningKeys) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }
}

#[async_trait]
impl SigningKeySource for StaticKeySource {
    async fn signing_keys(&self) -> Result<Arc<SigningKeys>, AuthError> {
        Ok(Arc::clone(&self.keys))
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

struct CachedKeys {
    keys: Arc<SigningKeys>,
    fetched_at: Instant,
}

impl CachedKeys {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Keys fetched from an OpenID authority and cached for `ttl`.
pub struct RemoteAuthority {
    client: reqwest::Client,
    discovery_url: String,
    ttl: Duration,
    min_forced_refresh: Duration,
    cache: ArcSwapOption<CachedKeys>,
    /// Held while fetching. Stores when the last forced refresh ran.
    fetch_lock: Mutex<Option<Instant>>,
}

impl RemoteAuthority {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(discovery_url: impl Into<String>, ttl: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            discovery_url: discovery_url.into(),
            ttl,
            min_forced_refresh: MIN_FORCED_REFRESH_INTERVAL,
            cache: ArcSwapOption::empty(),
            fetch_lock: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_min_forced_refresh(mut self, interval: Duration) -> Self {
        self.min_forced_refresh = interval;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::KeySource(format!("GET {url}: {e}")))?
            .json::<T>()
            .await
            .map_err(|e| AuthError::KeySource(format!("GET {url}: {e}")))
    }

    async fn fetch(&self) -> Result<SigningKeys, AuthError> {
        let discovery: DiscoveryDocument = self.get_json(&self.discovery_url).await?;
        let keys: JwkSet = self.get_json(&discovery.jwks_uri).await?;
        debug!(
            issuer = %discovery.issuer,
            keys = keys.keys.len(),
            "fetched authority signing keys"
        );
        Ok(SigningKeys {
            issuer: Some(discovery.issuer),
            keys,
        })
    }

    /// Fetches and publishes a new key set. Callers hold `fetch_lock`.
    async fn fetch_and_store(&self) -> Result<Arc<SigningKeys>, AuthError> {
        let keys = Arc::new(self.fetch().await.inspect_err(|e| {
            warn!(error = %e, url = %self.discovery_url, "signing key refresh failed");
        })?);
        self.cache.store(Some(Arc::new(CachedKeys {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        })));
        Ok(keys)
    }
}

#[async_trait]
impl SigningKeySource for RemoteAuthority {
    async fn signing_keys(&self) -> Result<Arc<SigningKeys>, AuthError> {
        if let Some(cached) = self.cache.load_full().filter(|c| c.is_fresh(self.ttl)) {
            return Ok(Arc::clone(&cached.keys));
        }

        let _guard = self.fetch_lock.lock().await;
        // Another request may have refreshed while this one waited.
        if let Some(cached) = self.cache.load_full().filter(|c| c.is_fresh(self.ttl)) {
            return Ok(Arc::clone(&cached.keys));
        }
        self.fetch_and_store().await
    }

    async fn refresh(&self) -> Result<Arc<SigningKeys>, AuthError> {
        let seen = self.cache.load_full();
        let mut last_forced = self.fetch_lock.lock().await;

        let current = self.cache.load_full();
        if let Some(current) = &current {
            let replaced = seen.as_ref().is_none_or(|seen| !Arc::ptr_eq(seen, current));
            let throttled = last_forced.is_some_and(|at| at.elapsed() < self.min_forced_refresh);
            if replaced || throttled {
                return Ok(Arc::clone(&current.keys));
            }
        }

        info!(url = %self.discovery_url, "unknown signing key, refreshing authority keys");
        *last_forced = Some(Instant::now());
        self.fetch_and_store().await
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use arc_swap::ArcSwap;
    use axum::extract::State;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    /// Local authority publishing one key whose id can be rotated.
    struct TestAuthority {
        addr: SocketAddr,
        discovery_hits: Arc<AtomicUsize>,
        current_kid: Arc<ArcSwap<String>>,
    }

    impl TestAuthority {
        fn discovery_url(&self) -> String {
            format!("http://{}/.well-known/openid-configuration", self.addr)
        }

        fn hits(&self) -> usize {
            self.discovery_hits.load(Ordering::SeqCst)
        }

        fn rotate_to(&self, kid: &str) {
            self.current_kid.store(Arc::new(kid.to_string()));
        }
    }

    #[derive(Clone)]
    struct AuthorityState {
        addr: SocketAddr,
        hits: Arc<AtomicUsize>,
        kid: Arc<ArcSwap<String>>,
    }

    async fn spawn_authority() -> TestAuthority {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let state = AuthorityState {
            addr: listener.local_addr().unwrap(),
            hits: Arc::new(AtomicUsize::new(0)),
            kid: Arc::new(ArcSwap::from_pointee("k1".to_string())),
        };
        let authority = TestAuthority {
            addr: state.addr,
            discovery_hits: Arc::clone(&state.hits),
            current_kid: Arc::clone(&state.kid),
        };

        let router = Router::new()
            .route(
                "/.well-known/openid-configuration",
                get(|State(state): State<AuthorityState>| async move {
                    state.hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "issuer": format!("http://{}/", state.addr),
                        "jwks_uri": format!("http://{}/.well-known/jwks.json", state.addr),
                    }))
                }),
            )
            .route(
                "/.well-known/jwks.json",
                get(|State(state): State<AuthorityState>| async move {
                    Json(json!({"keys": [{
                        "kty": "oct",
                        "kid": state.kid.load().as_str(),
                        "alg": "HS256",
                        "k": "c2VjcmV0",
                    }]}))
                }),
            )
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        authority
    }

    #[tokio::test]
    async fn follows_discovery_to_jwks() {
        let server = spawn_authority().await;
        let authority =
            RemoteAuthority::new(server.discovery_url(), Duration::from_secs(60)).unwrap();

        let keys = authority.signing_keys().await.unwrap();
        let issuer = format!("http://{}/", server.addr);
        assert_eq!(keys.issuer.as_deref(), Some(issuer.as_str()));
        assert!(keys.keys.find("k1").is_some());
    }

    #[tokio::test]
    async fn caches_until_ttl_expires() {
        let server = spawn_authority().await;

        let cached = RemoteAuthority::new(server.discovery_url(), Duration::from_secs(60)).unwrap();
        cached.signing_keys().await.unwrap();
        cached.signing_keys().await.unwrap();
        assert_eq!(server.hits(), 1);

        let uncached = RemoteAuthority::new(server.discovery_url(), Duration::ZERO).unwrap();
        uncached.signing_keys().await.unwrap();
        uncached.signing_keys().await.unwrap();
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn concurrent_expiry_fetches_once() {
        let server = spawn_authority().await;
        let authority = Arc::new(
            RemoteAuthority::new(server.discovery_url(), Duration::from_secs(60)).unwrap(),
        );

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let authority = Arc::clone(&authority);
                tokio::spawn(async move { authority.signing_keys().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn forced_refresh_picks_up_rotated_keys() {
        let server = spawn_authority().await;
        let authority =
            RemoteAuthority::new(server.discovery_url(), Duration::from_secs(600)).unwrap();

        assert!(authority.signing_keys().await.unwrap().keys.find("k1").is_some());
        server.rotate_to("k2");
        assert!(authority.signing_keys().await.unwrap().keys.find("k2").is_none());

        let refreshed = authority.refresh().await.unwrap();
        assert!(refreshed.keys.find("k2").is_some());
        assert!(authority.signing_keys().await.unwrap().keys.find("k2").is_some());
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn forced_refresh_is_throttled() {
        let server = spawn_authority().await;
        let authority =
            RemoteAuthority::new(server.discovery_url(), Duration::from_secs(600)).unwrap();

        authority.signing_keys().await.unwrap();
        authority.refresh().await.unwrap();
        server.rotate_to("k3");
        let keys = authority.refresh().await.unwrap();
        assert!(keys.keys.find("k3").is_none());
        assert_eq!(server.hits(), 2);

        let eager = authority.with_min_forced_refresh(Duration::ZERO);
        assert!(eager.refresh().await.unwrap().keys.find("k3").is_some());
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn unreachable_authority_is_a_key_source_error() {
        // Nothing listens on the discard port.
        let authority = RemoteAuthority::new(
            "http://127.0.0.1:9/.well-known/openid-configuration",
            Duration::from_secs(60),
        )
        .unwrap();
        let err = authority.signing_keys().await.unwrap_err();
        assert!(matches!(err, AuthError::KeySource(_)), "{err}");
        let err = authority.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::KeySource(_)), "{err}");
    }

    #[tokio::test]
    async fn static_source_returns_same_keys() {
        let keys: JwkSet = serde_json::from_value(json!({"keys": []})).unwrap();
        let source = StaticKeySource::new(SigningKeys { issuer: None, keys });
        let a = source.signing_keys().await.unwrap();
        let b = source.refresh().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
