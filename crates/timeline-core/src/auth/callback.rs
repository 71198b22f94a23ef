//! OAuth redirect parsing

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Where the login flow redirects after authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallbackTarget {
    pub scheme: String,
    pub host: String,
    pub path: String,
}

impl Default for CallbackTarget {
    fn default() -> Self {
        Self {
            scheme: "timeline".to_string(),
            host: "auth".to_string(),
            path: "/callback".to_string(),
        }
    }
}

impl CallbackTarget {
    /// Web redirect served by the notes service itself (`<base>/auth/callback`)
    pub fn web(base_url: &str) -> Option<Self> {
        let url = Url::parse(base_url).ok()?;
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_string(),
            path: "/auth/callback".to_string(),
        })
    }
}

/// Authorization code delivered to a callback URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCallback {
    pub code: String,
    pub state: Option<String>,
}

/// Extract the authorization code from a redirect to `expected`.
///
/// Returns `None` for URLs aimed elsewhere or without a non-empty `code`.
pub fn parse_callback(url: &str, expected: &CallbackTarget) -> Option<AuthCallback> {
    let url = Url::parse(url.trim()).ok()?;
    if !url.scheme().eq_ignore_ascii_case(&expected.scheme)
        || !url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&expected.host))
        || url.path() != expected.path
    {
        return None;
    }

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "state" if state.is_none() => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let code = code.filter(|code| !code.trim().is_empty())?;
    Some(AuthCallback { code, state })
}
