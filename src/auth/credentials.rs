use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::auth::pkce::{generate_code_challenge, generate_code_verifier};
use crate::auth::store::{SessionStore, VERIFIER_KEY};
use crate::config::{Config, SCOPES};
use crate::error::{AppError, Result};

/// Bearer token for the Web API. Held in memory only; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Browser-style PKCE flow: no client secret, the verifier is the only secret
/// and it lives in the session store between redirect and exchange.
pub struct CredentialManager {
    http_client: Client,
    store: Arc<dyn SessionStore>,
    client_id: String,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
}

impl CredentialManager {
    pub fn new(config: &Config, store: Arc<dyn SessionStore>) -> Self {
        Self {
            http_client: Client::new(),
            store,
            client_id: config.spotify_client_id.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
            authorize_url: config.authorize_url(),
            token_url: config.token_url(),
        }
    }

    /// Create and store a fresh verifier and return the authorization URL the
    /// user must visit. Any earlier pending verifier is replaced.
    pub fn begin_authorization(&self) -> Result<Url> {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        self.store.set(VERIFIER_KEY, code_verifier);

        let url = Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("scope", SCOPES),
                ("code_challenge_method", "S256"),
                ("code_challenge", code_challenge.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )?;

        debug!("Authorization started, redirecting to {}", self.authorize_url);

        Ok(url)
    }

    /// Whether a verifier is waiting for its callback.
    pub fn is_pending(&self) -> bool {
        self.store.get(VERIFIER_KEY).is_some()
    }

    /// Exchange an authorization code for an access token using the stored verifier.
    pub async fn complete_authorization(&self, code: &str) -> Result<AccessToken> {
        let code_verifier = self
            .store
            .get(VERIFIER_KEY)
            .ok_or(AppError::MissingVerifier)?;

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_verifier", code_verifier.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::TokenExchangeFailed { status, message });
        }

        let token: TokenResponse = response.json().await?;

        self.store.remove(VERIFIER_KEY);
        info!("Authorization code exchanged for an access token");

        Ok(AccessToken::new(token.access_token))
    }
}

/// Authorization code found in a callback URL, plus the URL with the code removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub code: String,
    pub clean_url: Url,
}

/// Pull `code` out of the URL the provider redirected to.
///
/// Returns `Ok(None)` when the URL carries no code. A provider `error`
/// parameter (e.g. the user denied access) is reported as `InvalidCallback`.
pub fn split_callback_url(raw: &str) -> Result<Option<Callback>> {
    let url = Url::parse(raw.trim())?;

    if let Some((_, error)) = url.query_pairs().find(|(k, _)| k == "error") {
        return Err(AppError::InvalidCallback(error.into_owned()));
    }

    let Some(code) = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
    else {
        return Ok(None);
    };

    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "code")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut clean_url = url.clone();
    if remaining.is_empty() {
        clean_url.set_query(None);
    } else {
        clean_url.query_pairs_mut().clear().extend_pairs(remaining);
    }

    Ok(Some(Callback { code, clean_url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryStore;

    fn manager() -> (CredentialManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Config::default().with_client_id("client-123");
        (CredentialManager::new(&config, store.clone()), store)
    }

    #[test]
    fn test_begin_authorization_url() {
        let (manager, store) = manager();
        let url = manager.begin_authorization().unwrap();

        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");

        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        assert_eq!(param("response_type").as_deref(), Some("code"));
        assert_eq!(param("client_id").as_deref(), Some("client-123"));
        assert_eq!(param("scope").as_deref(), Some(SCOPES));
        assert_eq!(param("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(
            param("redirect_uri").as_deref(),
            Some("http://127.0.0.1:8080/callback")
        );

        let verifier = store.get(VERIFIER_KEY).unwrap();
        assert_eq!(
            param("code_challenge"),
            Some(generate_code_challenge(&verifier))
        );
        assert!(manager.is_pending());
    }

    #[test]
    fn test_second_begin_overwrites_verifier() {
        let (manager, store) = manager();
        manager.begin_authorization().unwrap();
        let first = store.get(VERIFIER_KEY).unwrap();
        manager.begin_authorization().unwrap();
        let second = store.get(VERIFIER_KEY).unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_complete_without_begin() {
        let (manager, _) = manager();
        let result = manager.complete_authorization("some-code").await;
        assert!(matches!(result, Err(AppError::MissingVerifier)));
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("secret");
        assert_eq!(format!("{:?}", token), "AccessToken(***)");
    }

    #[test]
    fn test_split_callback_url() {
        let callback = split_callback_url("http://127.0.0.1:8080/callback?code=abc&state=xyz")
            .unwrap()
            .unwrap();
        assert_eq!(callback.code, "abc");
        assert_eq!(
            callback.clean_url.as_str(),
            "http://127.0.0.1:8080/callback?state=xyz"
        );

        let callback = split_callback_url("http://127.0.0.1:8080/callback?code=abc")
            .unwrap()
            .unwrap();
        assert_eq!(callback.clean_url.as_str(), "http://127.0.0.1:8080/callback");
    }

    #[test]
    fn test_split_callback_url_without_code() {
        assert_eq!(
            split_callback_url("http://127.0.0.1:8080/callback").unwrap(),
            None
        );
    }

    #[test]
    fn test_split_callback_url_denied() {
        let result = split_callback_url("http://127.0.0.1:8080/callback?error=access_denied");
        assert!(matches!(result, Err(AppError::InvalidCallback(e)) if e == "access_denied"));
    }
}
