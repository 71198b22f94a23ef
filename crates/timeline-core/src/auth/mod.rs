//! Token exchange, refresh, and credential persistence for the notes service.

mod callback;
mod session;

use std::fmt;
use std::sync::{Arc, Mutex};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{compact_text, is_http_url};

pub use callback::{parse_callback, AuthCallback, CallbackTarget};
pub use session::AuthSessionManager;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Notes service auth is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Access/refresh token pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    /// Absent only right after a sign-in exchange that issued no refresh token
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Secure storage for the current token pair.
///
/// Both tokens are written and cleared together.
pub trait CredentialStore: Clone + Send + Sync + 'static {
    fn save(&self, access_token: &str, refresh_token: Option<&str>) -> AuthResult<()>;
    fn load_access(&self) -> AuthResult<Option<String>>;
    fn load_refresh(&self) -> AuthResult<Option<String>>;
    fn clear(&self) -> AuthResult<()>;
}

/// Process-local credential store
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<Mutex<Option<Credentials>>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token pair
    #[must_use]
    pub fn with_tokens(access_token: &str, refresh_token: Option<&str>) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.inner.lock() {
            *guard = Some(Credentials {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.map(str::to_string),
            });
        }
        store
    }

    fn read(&self) -> AuthResult<Option<Credentials>> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| AuthError::SecureStorage("credential store lock poisoned".to_string()))
    }
}

impl fmt::Debug for InMemoryCredentialStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("InMemoryCredentialStore")
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save(&self, access_token: &str, refresh_token: Option<&str>) -> AuthResult<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| AuthError::SecureStorage("credential store lock poisoned".to_string()))?;
        *guard = Some(Credentials {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
        });
        Ok(())
    }

    fn load_access(&self) -> AuthResult<Option<String>> {
        Ok(self.read()?.map(|credentials| credentials.access_token))
    }

    fn load_refresh(&self) -> AuthResult<Option<String>> {
        Ok(self.read()?.and_then(|credentials| credentials.refresh_token))
    }

    fn clear(&self) -> AuthResult<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| AuthError::SecureStorage("credential store lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Token pair issued by the exchange and refresh endpoints
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type", alias = "token_type")]
    pub token_type: String,
    #[serde(default, alias = "expires_in")]
    pub expires_in: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Client for `/api/auth/exchange` and `/auth/refresh`
#[derive(Clone)]
pub struct AuthClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> AuthResult<Self> {
        Self::with_client(base_url, api_key, Client::builder().build()?)
    }

    /// Share an existing HTTP client (connection pool)
    pub fn with_client(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        client: Client,
    ) -> AuthResult<Self> {
        let base_url = normalize_base_url(base_url.as_ref())?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Auth API key must not be empty",
            ));
        }
        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Trade an OAuth authorization code for a token pair
    pub async fn exchange(&self, code: &str) -> AuthResult<TokenResponse> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::Api("Authorization code is required".to_string()));
        }
        self.post_token("/api/auth/exchange", &ExchangeRequest { code })
            .await
    }

    /// Obtain a fresh token pair using a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }
        let tokens = self
            .post_token("/auth/refresh", &RefreshRequest { refresh_token })
            .await?;
        tracing::info!("Refreshed notes service access token");
        Ok(tokens)
    }

    async fn post_token<T: Serialize + Sync>(
        &self,
        path: &str,
        payload: &T,
    ) -> AuthResult<TokenResponse> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("X-API-Key", &self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        let tokens: TokenResponse = serde_json::from_str(&body)?;
        if tokens.access_token.trim().is_empty() {
            return Err(AuthError::Api(
                "Token response did not include an access token".to_string(),
            ));
        }
        Ok(tokens)
    }
}

/// Trim and validate a service base URL, dropping trailing slashes
pub fn normalize_base_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Service base URL must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Service base URL must include http:// or https://",
        ));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    detail: Option<String>,
}

/// Human-readable message for a failed API response
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.detail)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
