// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID-token verification.
//!
//! Tokens are RS256 JWTs signed by `securetoken@system.gserviceaccount.com`.
//! The issuer must be `https://securetoken.google.com/<project>` and the
//! audience the project id. Emulator tokens are unsigned, so only their
//! claims are checked.

use anyhow::Context;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const SECURETOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Used when the key response carries no `max-age`.
const FALLBACK_KEY_TTL: Duration = Duration::from_secs(300);
const ALLOWED_SKEW_SECS: i64 = 60;
/// Firebase uids are at most 128 characters.
const MAX_UID_LEN: usize = 128;

/// Identity extracted from a verified ID token.
#[derive(Debug, Clone, PartialEq)]
pub struct FirebaseIdentity {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum IdTokenError {
    #[error("invalid ID token: {0}")]
    Invalid(String),
    /// Signing keys could not be fetched.
    #[error("ID token keys unavailable: {0}")]
    Transient(String),
}

enum KeySource {
    Google(KeyCache),
    Fixed { kid: String, key: Arc<DecodingKey> },
    Unsigned,
}

/// Verifier for Firebase-issued ID tokens of one project.
pub struct IdTokenVerifier {
    project_id: String,
    issuer: String,
    keys: KeySource,
}

impl IdTokenVerifier {
    /// Verifier that checks signatures against Google's published keys.
    pub fn new(project_id: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(KEY_FETCH_TIMEOUT)
            .build()
            .context("failed building ID token HTTP client")?;

        tracing::info!(project = project_id, "Initialized Firebase ID token verifier");
        Self::build(project_id, KeySource::Google(KeyCache::new(http)))
    }

    /// Verifier for tokens issued by the Auth emulator.
    pub fn new_emulator(project_id: &str) -> anyhow::Result<Self> {
        tracing::info!(
            project = project_id,
            "Firebase ID token verifier accepting unsigned emulator tokens"
        );
        Self::build(project_id, KeySource::Unsigned)
    }

    /// Verifier trusting one RSA public key under one `kid`.
    pub fn new_with_static_key(
        project_id: &str,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        anyhow::ensure!(!kid.trim().is_empty(), "static ID token kid must not be empty");

        Self::build(
            project_id,
            KeySource::Fixed {
                kid,
                key: Arc::new(decoding_key),
            },
        )
    }

    fn build(project_id: &str, keys: KeySource) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !project_id.trim().is_empty(),
            "Firebase project id must not be empty"
        );

        Ok(Self {
            project_id: project_id.to_string(),
            issuer: format!("https://securetoken.google.com/{project_id}"),
            keys,
        })
    }

    /// Verify an ID token and return the identity it asserts.
    pub async fn verify(&self, token: &str) -> Result<FirebaseIdentity, IdTokenError> {
        if token.trim().is_empty() {
            return Err(invalid("token is empty"));
        }

        let claims = match &self.keys {
            KeySource::Unsigned => self.check_unsigned(token)?,
            KeySource::Fixed { kid, key } => {
                let token_kid = signed_kid(token)?;
                if token_kid != *kid {
                    return Err(invalid(format!("unknown signing key {token_kid}")));
                }
                self.decode_signed(token, key)?
            }
            KeySource::Google(cache) => {
                let key = cache.key(&signed_kid(token)?).await?;
                self.decode_signed(token, &key)?
            }
        };

        claims.into_identity()
    }

    fn decode_signed(&self, token: &str, key: &DecodingKey) -> Result<IdTokenClaims, IdTokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.project_id]);
        validation.leeway = ALLOWED_SKEW_SECS as u64;

        decode::<IdTokenClaims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| invalid(format!("signature or claims rejected: {e}")))
    }

    fn check_unsigned(&self, token: &str) -> Result<IdTokenClaims, IdTokenError> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| invalid("malformed token"))?;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| invalid("malformed token payload"))?;
        let claims: IdTokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| invalid(format!("unreadable claims: {e}")))?;

        if claims.exp + ALLOWED_SKEW_SECS < Utc::now().timestamp() {
            return Err(invalid("token expired"));
        }
        if claims.iss != self.issuer || claims.aud != self.project_id {
            return Err(invalid("issuer or audience mismatch"));
        }
        Ok(claims)
    }
}

fn invalid(reason: impl Into<String>) -> IdTokenError {
    IdTokenError::Invalid(reason.into())
}

/// The `kid` of an RS256 token header.
fn signed_kid(token: &str) -> Result<String, IdTokenError> {
    let header = decode_header(token).map_err(|e| invalid(format!("bad header: {e}")))?;
    if header.alg != Algorithm::RS256 {
        return Err(invalid(format!("algorithm {:?} not accepted", header.alg)));
    }
    header.kid.ok_or_else(|| invalid("header has no kid"))
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    aud: String,
    sub: String,
    exp: i64,
    iat: Option<i64>,
    email: Option<String>,
}

impl IdTokenClaims {
    /// Checks common to every key source, then the identity.
    fn into_identity(self) -> Result<FirebaseIdentity, IdTokenError> {
        match self.iat {
            None => return Err(invalid("missing iat claim")),
            Some(iat) if iat > Utc::now().timestamp() + ALLOWED_SKEW_SECS => {
                return Err(invalid("iat claim is in the future"));
            }
            Some(_) => {}
        }

        if self.sub.is_empty() || self.sub.len() > MAX_UID_LEN {
            return Err(invalid("invalid sub claim"));
        }

        Ok(FirebaseIdentity {
            uid: self.sub,
            email: self.email,
        })
    }
}

// ─── Google signing keys ─────────────────────────────────────

struct KeySet {
    by_kid: HashMap<String, Arc<DecodingKey>>,
    fresh_until: Instant,
}

impl KeySet {
    fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        if self.fresh_until <= Instant::now() {
            return None;
        }
        self.by_kid.get(kid).cloned()
    }
}

/// Google's current signing keys, fetched on demand and kept for the
/// response's `max-age`.
struct KeyCache {
    http: reqwest::Client,
    current: RwLock<Option<KeySet>>,
    /// One fetch at a time.
    fetching: Mutex<()>,
}

impl KeyCache {
    fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            current: RwLock::new(None),
            fetching: Mutex::new(()),
        }
    }

    async fn cached(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.current.read().await.as_ref()?.get(kid)
    }

    /// Key for `kid`. An unknown kid triggers one refetch, since Google
    /// rotates keys before the old set expires.
    async fn key(&self, kid: &str) -> Result<Arc<DecodingKey>, IdTokenError> {
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        let _fetching = self.fetching.lock().await;
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        let set = self.fetch().await?;
        let key = set.by_kid.get(kid).cloned();
        *self.current.write().await = Some(set);

        key.ok_or_else(|| invalid(format!("unknown signing key {kid}")))
    }

    async fn fetch(&self) -> Result<KeySet, IdTokenError> {
        tracing::debug!("Fetching Firebase signing keys");

        let response = self
            .http
            .get(SECURETOKEN_JWKS_URL)
            .send()
            .await
            .map_err(|e| IdTokenError::Transient(format!("key fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdTokenError::Transient(format!(
                "key endpoint returned status {status}"
            )));
        }

        let ttl = max_age(response.headers()).unwrap_or(FALLBACK_KEY_TTL);
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| IdTokenError::Transient(format!("unreadable key set: {e}")))?;

        let by_kid: HashMap<_, _> = jwks
            .keys
            .iter()
            .filter_map(|jwk| Some((jwk.kid.clone(), Arc::new(jwk.rs256_key()?))))
            .collect();
        if by_kid.is_empty() {
            return Err(IdTokenError::Transient(
                "key set has no RS256 signing keys".to_string(),
            ));
        }

        tracing::debug!(keys = by_kid.len(), ttl_secs = ttl.as_secs(), "Signing keys refreshed");
        Ok(KeySet {
            by_kid,
            fresh_until: Instant::now() + ttl,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: String,
    e: String,
}

impl Jwk {
    /// The key, if it is an RSA signing key usable for RS256.
    fn rs256_key(&self) -> Option<DecodingKey> {
        let usable = self.kty == "RSA"
            && !self.kid.trim().is_empty()
            && self.alg.as_deref().unwrap_or("RS256") == "RS256"
            && self.key_use.as_deref().unwrap_or("sig") == "sig";
        if !usable {
            return None;
        }

        DecodingKey::from_rsa_components(&self.n, &self.e)
            .inspect_err(|e| tracing::warn!(kid = %self.kid, error = %e, "Skipping malformed key"))
            .ok()
    }
}

/// `max-age` from a `Cache-Control` header.
fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|directive| {
            let secs = directive.trim().strip_prefix("max-age=")?;
            secs.trim_matches('"').parse().ok()
        })
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use reqwest::header::HeaderValue;
    use serde_json::json;

    const PROJECT: &str = "test-project";

    fn static_verifier() -> IdTokenVerifier {
        let key =
            DecodingKey::from_rsa_pem(include_bytes!("../../tests/fixtures/test_rsa_public.pem"))
                .unwrap();
        IdTokenVerifier::new_with_static_key(PROJECT, "test-kid", key).unwrap()
    }

    fn sign(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key =
            EncodingKey::from_rsa_pem(include_bytes!("../../tests/fixtures/test_rsa_private.pem"))
                .unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims(aud: &str, exp_offset: i64) -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": format!("https://securetoken.google.com/{aud}"),
            "aud": aud,
            "sub": "uid-123",
            "iat": now - 10,
            "exp": now + exp_offset,
            "email": "a@x.com",
        })
    }

    #[tokio::test]
    async fn valid_token_yields_uid() {
        let token = sign(claims(PROJECT, 3600), "test-kid");
        let identity = static_verifier().verify(&token).await.unwrap();
        assert_eq!(identity.uid, "uid-123");
        assert_eq!(identity.email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn rejects_wrong_audience_expired_kid_and_empty() {
        let verifier = static_verifier();
        let mut future_iat = claims(PROJECT, 3600);
        future_iat["iat"] = json!(Utc::now().timestamp() + 600);

        for token in [
            sign(claims("other-project", 3600), "test-kid"),
            sign(claims(PROJECT, -3600), "test-kid"),
            sign(claims(PROJECT, 3600), "other-kid"),
            sign(future_iat, "test-kid"),
            String::new(),
            "garbage".to_string(),
        ] {
            assert!(matches!(
                verifier.verify(&token).await,
                Err(IdTokenError::Invalid(_))
            ));
        }
    }

    #[tokio::test]
    async fn emulator_mode_checks_claims_only() {
        let verifier = IdTokenVerifier::new_emulator(PROJECT).unwrap();
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let unsigned = |claims: serde_json::Value| {
            format!(
                "{}.{}.",
                engine.encode(br#"{"alg":"none","typ":"JWT"}"#),
                engine.encode(claims.to_string())
            )
        };

        let identity = verifier.verify(&unsigned(claims(PROJECT, 3600))).await.unwrap();
        assert_eq!(identity.uid, "uid-123");

        assert!(verifier
            .verify(&unsigned(claims("other-project", 3600)))
            .await
            .is_err());
        assert!(verifier
            .verify(&unsigned(claims(PROJECT, -3600)))
            .await
            .is_err());
    }

    #[test]
    fn jwk_filtering() {
        let jwk = |kty: &str, alg: Option<&str>, key_use: Option<&str>| Jwk {
            kid: "k1".to_string(),
            kty: kty.to_string(),
            alg: alg.map(str::to_string),
            key_use: key_use.map(str::to_string),
            n: "sXchDaQe".to_string(),
            e: "AQAB".to_string(),
        };

        assert!(jwk("RSA", Some("RS256"), Some("sig")).rs256_key().is_some());
        assert!(jwk("RSA", None, None).rs256_key().is_some());
        assert!(jwk("EC", Some("RS256"), Some("sig")).rs256_key().is_none());
        assert!(jwk("RSA", Some("RS512"), Some("sig")).rs256_key().is_none());
        assert!(jwk("RSA", Some("RS256"), Some("enc")).rs256_key().is_none());
    }

    #[test]
    fn max_age_from_cache_control() {
        let headers = |value: &'static str| {
            let mut headers = HeaderMap::new();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(value));
            headers
        };

        assert_eq!(
            max_age(&headers("public, max-age=3600, must-revalidate")),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            max_age(&headers("max-age=\"120\"")),
            Some(Duration::from_secs(120))
        );
        assert_eq!(max_age(&headers("public, immutable")), None);
        assert_eq!(max_age(&headers("max-age=abc")), None);
        assert_eq!(max_age(&HeaderMap::new()), None);
    }
}
