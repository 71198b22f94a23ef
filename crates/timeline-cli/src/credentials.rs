//! OS keychain storage for the notes service token pair.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use timeline_core::auth::{AuthError, AuthResult, CredentialStore, Credentials};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "timeline-cli";

/// Keeps both tokens in one keychain secret so they are written and
/// cleared together.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    username: String,
}

impl KeyringCredentialStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            username: format!("session:{base_url}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(not(test))]
    fn load(&self) -> AuthResult<Option<Credentials>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self) -> AuthResult<Option<Credentials>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        match guard.get(&self.username) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    #[cfg(not(test))]
    fn save(&self, access_token: &str, refresh_token: Option<&str>) -> AuthResult<()> {
        let raw = serde_json::to_string(&Credentials {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(ToString::to_string),
        })?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save(&self, access_token: &str, refresh_token: Option<&str>) -> AuthResult<()> {
        let raw = serde_json::to_string(&Credentials {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(ToString::to_string),
        })?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    fn load_access(&self) -> AuthResult<Option<String>> {
        Ok(self.load()?.map(|credentials| credentials.access_token))
    }

    fn load_refresh(&self) -> AuthResult<Option<String>> {
        Ok(self.load()?.and_then(|credentials| credentials.refresh_token))
    }

    #[cfg(not(test))]
    fn clear(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}
