//! JWKS key-set cache
//!
//! Fetches the project's JSON Web Key Set and keeps the decoded RSA
//! public keys in memory. Readers always see a complete set: refreshes
//! build a new `KeySet` off to the side and swap it in atomically, and
//! a failed refresh leaves the previous set serving.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::AuthError;

/// How long a fetched key set is trusted before a background refresh.
pub const KEY_SET_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between forced refreshes triggered by unknown kids.
/// Keeps a flood of forged tokens from turning into a fetch storm.
const MIN_FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct JwkSetDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(rename = "use")]
    use_: Option<String>,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// An immutable snapshot of the verification keys, keyed by kid.
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

impl KeySet {
    /// Build a key set from a JWKS document. Entries that are not RSA
    /// signature keys, or that are missing material, are skipped rather
    /// than failing the whole set.
    fn from_document(doc: JwkSetDocument) -> Self {
        let mut keys = HashMap::new();
        for jwk in doc.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let Some(use_) = &jwk.use_ {
                if use_ != "sig" {
                    continue;
                }
            }
            let Some(kid) = jwk.kid else { continue };
            let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
                warn!(kid = %kid, "Skipping JWK with missing RSA components");
                continue;
            };
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => {
                    warn!(kid = %kid, error = %err, "Skipping JWK with invalid RSA components");
                }
            }
        }
        KeySet {
            keys,
            fetched_at: Instant::now(),
        }
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    #[cfg(test)]
    pub fn for_tests(entries: Vec<(&str, DecodingKey)>) -> Self {
        KeySet {
            keys: entries
                .into_iter()
                .map(|(kid, key)| (kid.to_string(), key))
                .collect(),
            fetched_at: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn backdate(&mut self, by: Duration) {
        self.fetched_at -= by;
    }
}

/// Cache over the remote JWKS endpoint.
pub struct JwksCache {
    jwks_url: String,
    http: reqwest::Client,
    ttl: Duration,
    current: RwLock<Option<Arc<KeySet>>>,
    /// When the endpoint was last contacted, successfully or not. The
    /// forced-refresh throttle keys off this so a dead endpoint is not
    /// re-fetched for every unknown kid.
    last_attempt: RwLock<Option<Instant>>,
    /// Serializes refresh attempts so concurrent stale readers trigger
    /// a single fetch.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl JwksCache {
    pub fn new(supabase_url: &str) -> Self {
        Self::with_ttl(supabase_url, KEY_SET_TTL)
    }

    pub fn with_ttl(supabase_url: &str, ttl: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("bg-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create JWKS HTTP client");

        JwksCache {
            jwks_url: format!(
                "{}/.well-known/jwks.json",
                supabase_url.trim_end_matches('/')
            ),
            http,
            ttl,
            current: RwLock::new(None),
            last_attempt: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.current.read().clone()
    }

    pub fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        self.snapshot()?.get(kid).cloned()
    }

    fn is_stale(&self) -> bool {
        match self.snapshot() {
            Some(set) => set.age() >= self.ttl,
            None => true,
        }
    }

    /// Refresh the key set if the cached one has passed its TTL. A
    /// failed refresh leaves the previous set installed and surfaces
    /// the error to the caller that triggered it; concurrent readers
    /// holding a snapshot are unaffected.
    pub async fn ensure_fresh(&self) -> Result<(), AuthError> {
        if !self.is_stale() {
            return Ok(());
        }
        let _gate = self.refresh_gate.lock().await;
        // Another task may have refreshed while we waited on the gate.
        if !self.is_stale() {
            return Ok(());
        }
        self.fetch_and_swap().await
    }

    /// Refresh immediately, bypassing the TTL. Used when a token names
    /// a kid the cache has never seen, which usually means the issuer
    /// rotated keys. Throttled on the last attempt time, so neither a
    /// burst of forged kids nor a dead endpoint turns into a fetch per
    /// request.
    pub async fn force_refresh(&self) -> Result<(), AuthError> {
        let _gate = self.refresh_gate.lock().await;
        if let Some(at) = *self.last_attempt.read() {
            if at.elapsed() < MIN_FORCED_REFRESH_INTERVAL {
                debug!("Forced key set refresh throttled");
                return Ok(());
            }
        }
        self.fetch_and_swap().await
    }

    /// Unconditional fetch, used at startup where an empty cache is a
    /// hard failure.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let _gate = self.refresh_gate.lock().await;
        self.fetch_and_swap().await
    }

    async fn fetch_and_swap(&self) -> Result<(), AuthError> {
        *self.last_attempt.write() = Some(Instant::now());
        let response = self.http.get(&self.jwks_url).send().await?;
        if !response.status().is_success() {
            return Err(AuthError::KeySetStatus(response.status()));
        }
        let doc: JwkSetDocument = response.json().await?;
        let set = KeySet::from_document(doc);
        info!(keys = set.len(), url = %self.jwks_url, "Key set refreshed");
        *self.current.write() = Some(Arc::new(set));
        Ok(())
    }

    #[cfg(test)]
    pub fn install(&self, set: KeySet) {
        *self.last_attempt.write() = Some(Instant::now());
        *self.current.write() = Some(Arc::new(set));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_N: &str = "ynieuA9hD8iR-PvKdd1fQ45K8gdA0iDCDb-fNOAOIbeyKnKu41pUL9CRi-yJctCXqII3kV1rCnLvirCw-Dx3kvOlNNQPe_2gfx48HyuRrctsoYgMQy5pRaGoLayJSfQ2heE3tNY-_unY7CesmGLNuDfZy9y2NkIXDcZA7jmgymSBjUVDo0skQa3unQpL0_DEfJF9DDh0w3nQgqPOON9m4DWtgsPsCuwAIPtiInOJNOX0WpUSUzsOJAPb9wvP8UUQVIO08wOA2Bz4YqYBTzjU10qSfxBwaY6hSNMolJGgmP1NyLaPQzZkK8Tm7GcLQGFDw9v9IUDOU-3Vd8JslNi_tQ";
    const TEST_E: &str = "AQAB";

    fn jwk(kty: &str, use_: Option<&str>, kid: Option<&str>, n: Option<&str>, e: Option<&str>) -> Jwk {
        Jwk {
            kty: kty.to_string(),
            use_: use_.map(str::to_string),
            kid: kid.map(str::to_string),
            n: n.map(str::to_string),
            e: e.map(str::to_string),
        }
    }

    #[test]
    fn from_document_keeps_rsa_signature_keys() {
        let doc = JwkSetDocument {
            keys: vec![
                jwk("RSA", Some("sig"), Some("good"), Some(TEST_N), Some(TEST_E)),
                jwk("EC", Some("sig"), Some("ec-key"), None, None),
                jwk("RSA", Some("enc"), Some("enc-key"), Some(TEST_N), Some(TEST_E)),
                jwk("RSA", Some("sig"), None, Some(TEST_N), Some(TEST_E)),
                jwk("RSA", Some("sig"), Some("no-material"), None, None),
                jwk("RSA", Some("sig"), Some("bad-material"), Some("!!!"), Some(TEST_E)),
            ],
        };
        let set = KeySet::from_document(doc);
        assert_eq!(set.len(), 1);
        assert!(set.get("good").is_some());
    }

    #[test]
    fn from_document_accepts_keys_without_use_field() {
        let doc = JwkSetDocument {
            keys: vec![jwk("RSA", None, Some("k1"), Some(TEST_N), Some(TEST_E))],
        };
        assert_eq!(KeySet::from_document(doc).len(), 1);
    }

    #[tokio::test]
    async fn empty_cache_is_stale() {
        // Port 9 is discard; nothing answers, and we never connect here anyway.
        let cache = JwksCache::new("http://127.0.0.1:9");
        assert!(cache.is_stale());
        assert!(cache.lookup("anything").is_none());
    }

    #[tokio::test]
    async fn ensure_fresh_is_a_noop_while_within_ttl() {
        let cache = JwksCache::new("http://127.0.0.1:9");
        let key = DecodingKey::from_rsa_components(TEST_N, TEST_E).unwrap();
        cache.install(KeySet::for_tests(vec![("k1", key)]));
        // Would error if it tried the unroutable endpoint.
        cache.ensure_fresh().await.unwrap();
        assert!(cache.lookup("k1").is_some());
    }

    #[tokio::test]
    async fn forced_refresh_is_throttled_after_a_recent_attempt() {
        let cache = JwksCache::new("http://127.0.0.1:9");
        let key = DecodingKey::from_rsa_components(TEST_N, TEST_E).unwrap();
        cache.install(KeySet::for_tests(vec![("k1", key)]));
        // Would error against the dead endpoint if it actually fetched.
        cache.force_refresh().await.unwrap();
        assert!(cache.lookup("k1").is_some());
    }

    #[tokio::test]
    async fn failed_forced_refresh_throttles_the_next_attempt() {
        let cache = JwksCache::new("http://127.0.0.1:9");
        assert!(cache.force_refresh().await.is_err());
        // The failed attempt still counts; the retry skips the fetch.
        assert!(cache.force_refresh().await.is_ok());
        assert!(cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn failed_stale_refresh_errors_but_keeps_cached_keys() {
        let cache = JwksCache::with_ttl("http://127.0.0.1:9", Duration::from_secs(0));
        let key = DecodingKey::from_rsa_components(TEST_N, TEST_E).unwrap();
        let mut set = KeySet::for_tests(vec![("k1", key)]);
        set.backdate(Duration::from_secs(10));
        cache.install(set);
        // The triggering caller sees the failure; the old set stays
        // installed for readers holding a snapshot.
        assert!(cache.ensure_fresh().await.is_err());
        assert!(cache.lookup("k1").is_some());
    }

    #[tokio::test]
    async fn refresh_with_no_fallback_surfaces_the_error() {
        let cache = JwksCache::new("http://127.0.0.1:9");
        assert!(cache.refresh().await.is_err());
    }
}
