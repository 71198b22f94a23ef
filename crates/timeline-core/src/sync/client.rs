//! Authenticated HTTP client for the notes service.
//!
//! Every call runs as `attempt -> (auth failure -> refresh -> attempt)`, with
//! at most one refresh per logical call.

use std::fmt;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::auth::{normalize_base_url, AuthClient, CredentialStore};
use crate::util::compact_text;

use super::error::{SyncError, SyncResult};
use super::wire::{RestoreResponse, SyncRequest, SyncResponse};

/// Body marker some deployments return instead of (or with) a 401
const TOKEN_EXPIRED_MARKER: &str = "token_expired";

enum Attempt {
    Success(String),
    AuthFailure,
}

pub struct SyncClient<S: CredentialStore> {
    base_url: String,
    api_key: String,
    client: Client,
    auth: AuthClient,
    credentials: S,
}

impl<S: CredentialStore> fmt::Debug for SyncClient<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl<S: CredentialStore> SyncClient<S> {
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        auth: AuthClient,
        credentials: S,
    ) -> SyncResult<Self> {
        let base_url = normalize_base_url(base_url.as_ref())?;
        Ok(Self {
            base_url,
            api_key: api_key.into().trim().to_string(),
            client: Client::builder().build()?,
            auth,
            credentials,
        })
    }

    /// Upload one batch of operations
    pub async fn send(&self, request: &SyncRequest) -> SyncResult<SyncResponse> {
        let body = serde_json::to_vec(request)?;
        let url = format!("{}/api/sync", self.base_url);
        tracing::debug!("Sending {} sync operations ({} bytes)", request.ops.len(), body.len());
        self.execute(|token| {
            self.authorized(self.client.post(&url), token)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
        })
        .await
    }

    /// Most recently modified remote notes with their media
    pub async fn fetch_latest(&self, limit: usize) -> SyncResult<RestoreResponse> {
        let url = format!("{}/api/notes", self.base_url);
        self.execute(|token| {
            self.authorized(self.client.get(&url), token)
                .query(&[("limit", limit)])
        })
        .await
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header("X-API-Key", &self.api_key)
            .bearer_auth(token)
    }

    async fn execute<T, F>(&self, build: F) -> SyncResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self
            .credentials
            .load_access()?
            .ok_or(SyncError::NotSignedIn)?;

        let body = match Self::attempt(build(&token)).await? {
            Attempt::Success(body) => body,
            Attempt::AuthFailure => {
                tracing::info!("Access token rejected, refreshing");
                let token = self.refresh_tokens().await?;
                match Self::attempt(build(&token)).await? {
                    Attempt::Success(body) => body,
                    Attempt::AuthFailure => {
                        tracing::warn!("Request still unauthorized after token refresh");
                        return Err(SyncError::SessionExpired);
                    }
                }
            }
        };
        Ok(serde_json::from_str(&body)?)
    }

    async fn attempt(request: RequestBuilder) -> SyncResult<Attempt> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(Attempt::Success(body));
        }
        if is_auth_failure(status, &body) {
            return Ok(Attempt::AuthFailure);
        }
        tracing::warn!(
            "Sync API returned HTTP {}: {}",
            status.as_u16(),
            compact_text(&body)
        );
        Err(SyncError::Http {
            status: status.as_u16(),
            body,
        })
    }

    /// Swap the stored refresh token for a new pair and return the access token
    async fn refresh_tokens(&self) -> SyncResult<String> {
        let Some(refresh_token) = self.credentials.load_refresh()? else {
            tracing::warn!("No refresh token stored, session cannot be renewed");
            return Err(SyncError::SessionExpired);
        };

        let tokens = match self.auth.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(error) => {
                tracing::warn!("Token refresh failed: {error}");
                return Err(SyncError::SessionExpired);
            }
        };

        let next_refresh = tokens.refresh_token.as_deref().unwrap_or(&refresh_token);
        self.credentials
            .save(&tokens.access_token, Some(next_refresh))?;
        Ok(tokens.access_token)
    }
}

/// 401, or any failure whose body carries the token-expired marker.
///
/// The body check is a heuristic; it can misfire on unrelated error text.
fn is_auth_failure(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNAUTHORIZED
        || (!status.is_success() && body.contains(TOKEN_EXPIRED_MARKER))
}
