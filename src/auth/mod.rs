//! Credential handling for the chat backend.
//!
//! The engine only needs the [`AuthProvider`] capability: headers for every
//! request and a way to drop credentials once the backend reports them as
//! expired. [`TokenAuth`] implements it with a bearer token obtained from the
//! backend's login endpoint and kept in the system keyring between runs.

use std::sync::{PoisonError, RwLock};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{LoginRequest, LoginResponse, User};
use crate::core::error::ChatError;
use crate::core::keyring::{self, KeyringAccessError};
use crate::utils::url::{
    construct_api_url, normalize_base_url, LOGIN_ENDPOINT, LOGOUT_ENDPOINT, ME_ENDPOINT,
};

pub mod ui;

/// Capability the engine consumes for authenticated requests.
pub trait AuthProvider: Send + Sync {
    /// Headers to attach to every backend request.
    fn auth_headers(&self) -> HeaderMap;

    fn is_authenticated(&self) -> bool;

    /// Forget the current credentials locally.
    fn logout(&self);
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Keyring access failed: {0}")]
    Keyring(#[from] KeyringAccessError),
    #[error("Login failed: {0}")]
    Rejected(String),
    #[error(transparent)]
    Request(#[from] ChatError),
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct TokenAuth {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
    use_keyring: bool,
}

impl TokenAuth {
    /// Load any token previously stored for `base_url`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, AuthError> {
        Self::new_with_keyring(client, base_url, true)
    }

    /// Construct a provider, optionally bypassing the keyring (useful for tests).
    pub fn new_with_keyring(
        client: reqwest::Client,
        base_url: &str,
        use_keyring: bool,
    ) -> Result<Self, AuthError> {
        let base_url = normalize_base_url(base_url);
        let token = if use_keyring {
            match keyring::load_token(&base_url) {
                Ok(token) => token,
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "keyring unavailable, starting logged out");
                    None
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            None
        };

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(token),
            use_keyring,
        })
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: Option<String>) -> Result<(), AuthError> {
        if self.use_keyring {
            match &token {
                Some(token) => keyring::store_token(&self.base_url, token)?,
                None => keyring::delete_token(&self.base_url)?,
            }
        }
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
        Ok(())
    }

    /// Exchange credentials for a bearer token and persist it.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(construct_api_url(&self.base_url, LOGIN_ENDPOINT))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(ChatError::from_request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(login_failure_message(status, &body)));
        }

        let login = response
            .json::<LoginResponse>()
            .await
            .map_err(|err| ChatError::InvalidResponse(err.to_string()))?;
        self.set_token(Some(login.access_token))?;
        debug!(user = %login.user.email, "logged in");
        Ok(login.user)
    }

    /// Tell the backend about the logout, then clear local credentials no
    /// matter how the call went.
    pub async fn logout_remote(&self) -> Result<(), AuthError> {
        if let Some(token) = self.token() {
            let result = self
                .client
                .post(construct_api_url(&self.base_url, LOGOUT_ENDPOINT))
                .bearer_auth(token)
                .send()
                .await;
            if let Err(err) = result {
                warn!(error = %err, "logout request failed");
            }
        }
        self.set_token(None)
    }

    /// Fetch the logged-in user. A 401 means the token is stale: it is
    /// cleared and `None` is returned.
    pub async fn current_user(&self) -> Result<Option<User>, AuthError> {
        let Some(token) = self.token() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(construct_api_url(&self.base_url, ME_ENDPOINT))
            .bearer_auth(token)
            .send()
            .await
            .map_err(ChatError::from_request)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.set_token(None)?;
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ChatError::from_status(status).into());
        }

        let user = response
            .json::<User>()
            .await
            .map_err(|err| ChatError::InvalidResponse(err.to_string()))?;
        Ok(Some(user))
    }
}

impl AuthProvider for TokenAuth {
    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = self.token() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("stored token is not a valid header value"),
            }
        }
        headers
    }

    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn logout(&self) {
        if let Err(err) = self.set_token(None) {
            warn!(error = %err, "failed to clear stored token");
            *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }
}

fn login_failure_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
