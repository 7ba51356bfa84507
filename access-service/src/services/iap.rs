//! Validation of identity-aware proxy assertions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::error::AuthError;

/// Issuer of every assertion the proxy signs.
pub const IAP_ISSUER: &str = "https://cloud.google.com/iap";

/// Default header carrying the proxy's assertion.
pub const DEFAULT_IAP_HEADER: &str = "x-goog-iap-jwt-assertion";

/// Default location of the proxy's public keys.
pub const DEFAULT_IAP_JWKS_URL: &str = "https://www.gstatic.com/iap/verify/public_key-jwk";

const KEY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Supplies the JWK set assertions are verified against.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn keys(&self) -> Result<JwkSet, anyhow::Error>;
}

/// A fixed key set.
pub struct StaticKeySource {
    keys: JwkSet,
}

impl StaticKeySource {
    pub fn new(keys: JwkSet) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn keys(&self) -> Result<JwkSet, anyhow::Error> {
        Ok(self.keys.clone())
    }
}

/// Fetches the key set over HTTP and caches it for an hour.
pub struct RemoteKeySource {
    client: reqwest::Client,
    url: String,
    cache: RwLock<Option<(Instant, JwkSet)>>,
}

impl RemoteKeySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            cache: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<JwkSet, anyhow::Error> {
        let keys = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch JWK set from {}: {}", self.url, e))?
            .error_for_status()
            .map_err(|e| anyhow::anyhow!("JWK set endpoint {} returned error: {}", self.url, e))?
            .json::<JwkSet>()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse JWK set from {}: {}", self.url, e))?;
        tracing::info!(url = %self.url, keys = keys.keys.len(), "Fetched IAP signing keys");
        Ok(keys)
    }
}

#[async_trait]
impl KeySource for RemoteKeySource {
    async fn keys(&self) -> Result<JwkSet, anyhow::Error> {
        if let Some((fetched_at, keys)) = self.cache.read().await.as_ref() {
            if fetched_at.elapsed() < KEY_CACHE_TTL {
                return Ok(keys.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some((fetched_at, keys)) = cache.as_ref() {
            if fetched_at.elapsed() < KEY_CACHE_TTL {
                return Ok(keys.clone());
            }
        }
        let keys = self.fetch().await?;
        *cache = Some((Instant::now(), keys.clone()));
        Ok(keys)
    }
}

#[derive(Debug, Deserialize)]
struct IapClaims {
    email: String,
}

/// Verifies proxy assertions and extracts the asserted email.
pub struct IapValidator {
    audience: Option<String>,
    keys: Arc<dyn KeySource>,
    algorithms: Vec<Algorithm>,
}

impl IapValidator {
    pub fn new(audience: Option<String>, keys: Arc<dyn KeySource>) -> Self {
        Self {
            audience,
            keys,
            algorithms: vec![Algorithm::ES256],
        }
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Returns the `email` claim of a valid assertion.
    pub async fn validate(&self, assertion: &str) -> Result<String, AuthError> {
        let header = decode_header(assertion)
            .map_err(|e| AuthError::Federated(format!("malformed assertion header: {}", e)))?;
        if !self.algorithms.contains(&header.alg) {
            return Err(AuthError::Federated(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Federated("assertion has no key id".to_string()))?;

        let keys = self.keys.keys().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load IAP signing keys");
            AuthError::Federated("signing keys unavailable".to_string())
        })?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| AuthError::Federated(format!("unknown key id {}", kid)))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::Federated(format!("unusable signing key: {}", e)))?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        validation.set_issuer(&[IAP_ISSUER]);
        match &self.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                validation.set_required_spec_claims(&["exp", "iss", "aud"]);
            }
            None => {
                validation.validate_aud = false;
                validation.set_required_spec_claims(&["exp", "iss"]);
            }
        }

        let data = decode::<IapClaims>(assertion, &key, &validation)
            .map_err(|e| AuthError::Federated(format!("assertion rejected: {}", e)))?;
        Ok(data.claims.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SIGNING_KEY: &str = "iap-test-signing-key-0123456789ab";

    fn validator(audience: Option<&str>) -> IapValidator {
        let keys: JwkSet = serde_json::from_value(serde_json::json!({
            "keys": [{
                "kty": "oct",
                "kid": "test",
                "alg": "HS256",
                "k": "aWFwLXRlc3Qtc2lnbmluZy1rZXktMDEyMzQ1Njc4OWFi"
            }]
        }))
        .unwrap();
        IapValidator::new(audience.map(str::to_string), Arc::new(StaticKeySource::new(keys)))
            .with_algorithms(vec![Algorithm::HS256])
    }

    fn assertion(kid: &str, claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_secret(SIGNING_KEY.as_bytes())).unwrap()
    }

    fn exp() -> i64 {
        (Utc::now() + ChronoDuration::hours(1)).timestamp()
    }

    #[tokio::test]
    async fn test_valid_assertion_yields_email() {
        let token = assertion(
            "test",
            serde_json::json!({"email": "alice@example.com", "iss": IAP_ISSUER, "aud": "/projects/1", "exp": exp()}),
        );
        let email = validator(Some("/projects/1")).validate(&token).await.unwrap();
        assert_eq!(email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_wrong_audience_is_rejected() {
        let token = assertion(
            "test",
            serde_json::json!({"email": "alice@example.com", "iss": IAP_ISSUER, "aud": "/projects/2", "exp": exp()}),
        );
        assert!(matches!(
            validator(Some("/projects/1")).validate(&token).await,
            Err(AuthError::Federated(_))
        ));
    }

    #[tokio::test]
    async fn test_audience_optional_when_unconfigured() {
        let token = assertion(
            "test",
            serde_json::json!({"email": "alice@example.com", "iss": IAP_ISSUER, "exp": exp()}),
        );
        assert!(validator(None).validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_kid_and_wrong_issuer() {
        let unknown = assertion(
            "other",
            serde_json::json!({"email": "alice@example.com", "iss": IAP_ISSUER, "exp": exp()}),
        );
        assert!(validator(None).validate(&unknown).await.is_err());

        let wrong_issuer = assertion(
            "test",
            serde_json::json!({"email": "alice@example.com", "iss": "https://evil.example", "exp": exp()}),
        );
        assert!(validator(None).validate(&wrong_issuer).await.is_err());
    }

    #[tokio::test]
    async fn test_disallowed_algorithm() {
        let token = assertion(
            "test",
            serde_json::json!({"email": "alice@example.com", "iss": IAP_ISSUER, "exp": exp()}),
        );
        let strict = validator(None).with_algorithms(vec![Algorithm::ES256]);
        assert!(strict.validate(&token).await.is_err());
    }
}
