// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication admin client (Identity Toolkit REST API).
//!
//! Three backends:
//! - emulator, when `FIREBASE_AUTH_EMULATOR_HOST` is set (bearer `owner`,
//!   unsigned custom tokens)
//! - Google, with a service-account key (access tokens from `gcloud-sdk`,
//!   RS256 custom tokens)
//! - offline, when neither is available; every call fails as transient

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";
const OAUTH_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/cloud-platform",
];
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Lifetime of minted custom tokens (the provider maximum).
pub const CUSTOM_TOKEN_TTL_SECS: u64 = 3600;

/// Identity provider failure categories.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("email already exists")]
    EmailExists,

    #[error("user not found")]
    UserNotFound,

    #[error("provider rejected credentials")]
    Unauthorized,

    #[error("identity provider unavailable: {0}")]
    Transient(String),

    #[error("identity provider rejected request: {0}")]
    Rejected(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::EmailExists => {
                AppError::Conflict("email is already registered".to_string())
            }
            ProviderError::UserNotFound => AppError::NotFound("user not found".to_string()),
            ProviderError::Unauthorized => AppError::Unauthorized,
            other => AppError::IdentityProvider(other.to_string()),
        }
    }
}

/// Service-account key file contents (the fields we use).
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    private_key: String,
}

impl ServiceAccount {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading credentials file {}", path.display()))?;
        serde_json::from_str(&raw).context("invalid service-account JSON")
    }
}

/// A user record as held by the identity provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub phone_number: Option<String>,
    pub provider_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields for creating a provider account.
pub struct NewProviderUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
}

/// Provider-owned fields that may be changed. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ProviderUserUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

enum AuthBackend {
    Emulator {
        base_url: String,
    },
    Google {
        client_email: String,
        signing_key: EncodingKey,
        tokens: gcloud_sdk::GoogleAuthTokenGenerator,
    },
    Offline,
}

/// Firebase Authentication admin client.
pub struct FirebaseAuth {
    http: reqwest::Client,
    project_id: String,
    backend: AuthBackend,
}

impl FirebaseAuth {
    /// Build a client from configuration, picking emulator, Google or
    /// offline mode.
    pub async fn new(config: &Config, project_id: &str) -> anyhow::Result<Self> {
        if let Some(host) = &config.firebase_auth_emulator_host {
            return Self::emulator(project_id, host);
        }

        let key_file = &config.firebase_credentials_file;
        if key_file.exists() {
            let account = ServiceAccount::from_file(key_file)?;
            let source = gcloud_sdk::TokenSourceType::File(key_file.clone());
            return Self::with_service_account(project_id, account, source).await;
        }

        tracing::warn!(
            path = %config.firebase_credentials_file.display(),
            "Firebase credentials not found, identity provider calls will fail"
        );
        Ok(Self::offline(project_id))
    }

    pub fn emulator(project_id: &str, host: &str) -> anyhow::Result<Self> {
        tracing::info!(host, "Using Firebase Auth emulator");
        // The emulator is local; system proxies must not intercept it.
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .no_proxy()
            .build()
            .context("failed building emulator HTTP client")?;
        Ok(Self {
            http,
            project_id: project_id.to_string(),
            backend: AuthBackend::Emulator {
                base_url: format!("http://{host}/identitytoolkit.googleapis.com/v1"),
            },
        })
    }

    /// Google backend: `source` supplies API access tokens, the account key
    /// signs custom tokens.
    pub async fn with_service_account(
        project_id: &str,
        account: ServiceAccount,
        source: gcloud_sdk::TokenSourceType,
    ) -> anyhow::Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .context("invalid service-account private key")?;
        let scopes = OAUTH_SCOPES.iter().map(|s| s.to_string()).collect();
        let tokens = gcloud_sdk::GoogleAuthTokenGenerator::new(source, scopes)
            .await
            .context("failed creating Google access token source")?;

        tracing::info!(
            project = project_id,
            client_email = %account.client_email,
            "Initialized Firebase Auth client"
        );

        Ok(Self {
            http: http_client()?,
            project_id: project_id.to_string(),
            backend: AuthBackend::Google {
                client_email: account.client_email,
                signing_key,
                tokens,
            },
        })
    }

    /// Client with no provider; every call fails. Used in tests.
    pub fn offline(project_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id: project_id.to_string(),
            backend: AuthBackend::Offline,
        }
    }

    // ─── Account Operations ──────────────────────────────────────

    pub async fn create_user(&self, new: &NewProviderUser<'_>) -> Result<ProviderUser, ProviderError> {
        let created: SignUpResponse = self
            .call(
                "accounts",
                json!({
                    "email": new.email,
                    "password": new.password,
                    "displayName": new.display_name,
                }),
            )
            .await?;

        tracing::info!(uid = %created.local_id, "Created provider account");

        Ok(ProviderUser {
            uid: created.local_id,
            email: created.email.or_else(|| Some(new.email.to_string())),
            display_name: created
                .display_name
                .or_else(|| Some(new.display_name.to_string())),
            provider_id: Some("password".to_string()),
            created_at: Some(Utc::now()),
            ..Default::default()
        })
    }

    pub async fn get_user(&self, uid: &str) -> Result<ProviderUser, ProviderError> {
        let lookup: LookupResponse = self
            .call("accounts:lookup", json!({ "localId": [uid] }))
            .await?;

        lookup
            .users
            .into_iter()
            .next()
            .map(ProviderUser::from)
            .ok_or(ProviderError::UserNotFound)
    }

    pub async fn update_user(
        &self,
        uid: &str,
        update: &ProviderUserUpdate,
    ) -> Result<(), ProviderError> {
        let mut body = json!({ "localId": uid });
        if let Some(display_name) = &update.display_name {
            body["displayName"] = json!(display_name);
        }
        if let Some(photo_url) = &update.photo_url {
            body["photoUrl"] = json!(photo_url);
        }

        let _: serde_json::Value = self.call("accounts:update", body).await?;
        Ok(())
    }

    pub async fn delete_user(&self, uid: &str) -> Result<(), ProviderError> {
        let _: serde_json::Value = self
            .call("accounts:delete", json!({ "localId": uid }))
            .await?;
        tracing::info!(uid, "Deleted provider account");
        Ok(())
    }

    /// Mint a custom token the client can exchange for an ID token.
    pub fn create_custom_token(&self, uid: &str) -> Result<String, ProviderError> {
        let iat = Utc::now().timestamp();
        let claims = CustomTokenClaims {
            iss: String::new(),
            sub: String::new(),
            aud: CUSTOM_TOKEN_AUDIENCE,
            iat,
            exp: iat + CUSTOM_TOKEN_TTL_SECS as i64,
            uid: uid.to_string(),
        };

        match &self.backend {
            AuthBackend::Google {
                client_email,
                signing_key,
                ..
            } => {
                let claims = CustomTokenClaims {
                    iss: client_email.clone(),
                    sub: client_email.clone(),
                    ..claims
                };
                encode(&Header::new(Algorithm::RS256), &claims, signing_key)
                    .map_err(|e| ProviderError::Rejected(format!("custom token signing: {e}")))
            }
            AuthBackend::Emulator { .. } => {
                // The emulator accepts unsigned tokens.
                let claims = CustomTokenClaims {
                    iss: "firebase-auth-emulator@example.com".to_string(),
                    sub: "firebase-auth-emulator@example.com".to_string(),
                    ..claims
                };
                Ok(unsigned_jwt(&claims))
            }
            AuthBackend::Offline => Err(offline_error()),
        }
    }

    // ─── Transport ───────────────────────────────────────────────

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let (base_url, bearer) = match &self.backend {
            AuthBackend::Emulator { base_url } => (base_url.as_str(), "owner".to_string()),
            AuthBackend::Google { tokens, .. } => {
                let token = tokens.create_token().await.map_err(|e| {
                    ProviderError::Transient(format!("access token unavailable: {e}"))
                })?;
                (IDENTITY_TOOLKIT_URL, token.token.as_sensitive_str().to_string())
            }
            AuthBackend::Offline => return Err(offline_error()),
        };

        let url = format!("{base_url}/projects/{}/{operation}", self.project_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("{operation} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("invalid {operation} response: {e}")))
    }
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .context("failed building identity provider HTTP client")
}

fn offline_error() -> ProviderError {
    ProviderError::Transient("identity provider not configured (offline mode)".to_string())
}

/// Map an Identity Toolkit error response onto [`ProviderError`].
fn classify_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_default();
    // Messages look like "EMAIL_EXISTS" or "WEAK_PASSWORD : Password should be..."
    let code = message.split([' ', ':']).next().unwrap_or_default();

    match code {
        "EMAIL_EXISTS" | "DUPLICATE_EMAIL" => ProviderError::EmailExists,
        "USER_NOT_FOUND" => ProviderError::UserNotFound,
        "INVALID_ID_TOKEN" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" | "TOKEN_EXPIRED" => {
            ProviderError::Unauthorized
        }
        _ if status.is_server_error() => ProviderError::Transient(format!("{status}: {message}")),
        _ => ProviderError::Rejected(format!("{status}: {message}")),
    }
}

fn unsigned_jwt<T: Serialize>(claims: &T) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = engine.encode(serde_json::to_vec(claims).unwrap_or_default());
    format!("{header}.{payload}.")
}

#[derive(Serialize)]
struct CustomTokenClaims {
    iss: String,
    sub: String,
    aud: &'static str,
    iat: i64,
    exp: i64,
    uid: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    phone_number: Option<String>,
    /// Milliseconds since the epoch, as a string
    created_at: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<ProviderInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderInfo {
    provider_id: String,
}

impl From<LookupUser> for ProviderUser {
    fn from(user: LookupUser) -> Self {
        Self {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            phone_number: user.phone_number,
            provider_id: user
                .provider_user_info
                .into_iter()
                .next()
                .map(|p| p.provider_id),
            created_at: user
                .created_at
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }
}
