//! Sign-in state for the notes service

use super::{parse_callback, AuthClient, AuthResult, CallbackTarget, CredentialStore};

/// Drives sign-in from an OAuth redirect and owns the stored credentials
#[derive(Debug, Clone)]
pub struct AuthSessionManager<S: CredentialStore> {
    client: AuthClient,
    store: S,
    callbacks: Vec<CallbackTarget>,
    login_url: Option<String>,
}

impl<S: CredentialStore> AuthSessionManager<S> {
    /// Accepts redirects to `callback` and to the service's own web callback
    pub fn new(
        client: AuthClient,
        store: S,
        callback: CallbackTarget,
        login_url: Option<String>,
    ) -> Self {
        let mut callbacks = vec![callback];
        callbacks.extend(CallbackTarget::web(client.base_url()));
        Self {
            client,
            store,
            callbacks,
            login_url,
        }
    }

    /// Where the user should be sent to start the OAuth flow
    pub fn login_url(&self) -> Option<&str> {
        self.login_url.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Complete sign-in from a redirect URL.
    ///
    /// Returns `false` when the URL is not an auth callback.
    pub async fn handle_callback(&self, url: &str) -> AuthResult<bool> {
        let Some(callback) = self
            .callbacks
            .iter()
            .find_map(|target| parse_callback(url, target))
        else {
            tracing::debug!("Ignoring URL that is not an auth callback");
            return Ok(false);
        };
        self.sign_in_with_code(&callback.code).await?;
        Ok(true)
    }

    /// Exchange an authorization code and persist the resulting tokens
    pub async fn sign_in_with_code(&self, code: &str) -> AuthResult<()> {
        let tokens = self.client.exchange(code).await?;
        self.store
            .save(&tokens.access_token, tokens.refresh_token.as_deref())?;
        tracing::info!("Signed in to notes service");
        Ok(())
    }

    pub fn is_signed_in(&self) -> AuthResult<bool> {
        Ok(self.store.load_access()?.is_some())
    }

    /// Forget both tokens
    pub fn sign_out(&self) -> AuthResult<()> {
        self.store.clear()?;
        tracing::info!("Signed out of notes service");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryCredentialStore;
    use httpmock::prelude::*;
    use serde_json::json;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn manager(base_url: &str) -> AuthSessionManager<InMemoryCredentialStore> {
        AuthSessionManager::new(
            AuthClient::new(base_url, "auth-key").unwrap(),
            InMemoryCredentialStore::new(),
            CallbackTarget::default(),
            Some(format!("{base_url}/auth/oauth_start?client=cli")),
        )
    }

    #[tokio::test]
    async fn callback_exchanges_code_and_stores_tokens() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/exchange")
                .json_body(json!({"code": "abc"}));
            then.status(200).json_body(json!({
                "accessToken": "access",
                "refreshToken": "refresh",
                "tokenType": "Bearer",
                "expiresIn": 900
            }));
        });
        let manager = manager(&server.base_url());
        assert!(!manager.is_signed_in().unwrap());

        let handled = manager
            .handle_callback("timeline://auth/callback?code=abc")
            .await
            .unwrap();

        mock.assert();
        assert!(handled);
        assert!(manager.is_signed_in().unwrap());
        assert_eq!(
            manager.store().load_refresh().unwrap().as_deref(),
            Some("refresh")
        );
    }

    #[tokio::test]
    async fn web_callback_on_service_host_is_accepted() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/exchange");
            then.status(200)
                .json_body(json!({"access_token": "access", "token_type": "Bearer"}));
        });
        let manager = manager(&server.base_url());

        let url = format!("{}/auth/callback?code=web", server.base_url());
        assert!(manager.handle_callback(&url).await.unwrap());
        assert_eq!(
            manager.store().load_access().unwrap().as_deref(),
            Some("access")
        );
    }

    #[tokio::test]
    async fn unrelated_url_is_ignored_and_sign_out_clears() {
        let manager = manager("https://notes.example.com");
        assert!(!manager
            .handle_callback("https://example.com/other?code=abc")
            .await
            .unwrap());

        manager.store().save("access", Some("refresh")).unwrap();
        manager.sign_out().unwrap();
        assert!(!manager.is_signed_in().unwrap());
        assert_eq!(
            manager.login_url(),
            Some("https://notes.example.com/auth/oauth_start?client=cli")
        );
    }
}
