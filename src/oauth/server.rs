use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

use super::clock::Clock;
use super::mask;
use super::store::{generate_secret, AccessToken, CredentialStore, RedeemError};
use crate::config::Config;

pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

// ── Wire types ───────────────────────────────────────────────

/// Query string of `GET /oauth/authorize`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeParams {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
}

/// Body of `POST /oauth/token`, form-encoded or JSON.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Accepted for compatibility; not compared against the code's redirect URI.
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    /// Returned to satisfy clients that expect one. There is no refresh grant.
    pub refresh_token: String,
    pub scope: String,
}

// ── Errors ───────────────────────────────────────────────────

/// Rejections on the authorize step. Never redirected, to avoid open redirects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorizeError {
    #[error("invalid client_id")]
    InvalidClient,
    #[error("invalid redirect_uri")]
    InvalidRedirectUri,
}

impl IntoResponse for AuthorizeError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// RFC 6749 §5.2 token endpoint errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("unsupported_grant_type")]
    UnsupportedGrantType,
    #[error("invalid_grant: {0}")]
    InvalidGrant(&'static str),
    #[error("invalid_client")]
    InvalidClient,
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::UnsupportedGrantType => "unsupported_grant_type",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::InvalidClient => "invalid_client",
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = match &self {
            OAuthError::InvalidGrant(description) => json!({
                "error": self.code(),
                "error_description": description,
            }),
            OAuthError::InvalidRequest(description) => json!({
                "error": self.code(),
                "error_description": description,
            }),
            _ => json!({ "error": self.code() }),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

// ── Authorization server ─────────────────────────────────────

/// OAuth2 authorization-code grant for the single configured client.
pub struct AuthorizationServer {
    client_id: String,
    client_secret: Option<String>,
    redirect_prefix: String,
    store: CredentialStore,
}

impl AuthorizationServer {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(config, CredentialStore::new(clock))
    }

    pub fn with_store(config: &Config, store: CredentialStore) -> Self {
        Self {
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            redirect_prefix: config.oauth_redirect_prefix.clone(),
            store,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Validate an authorize request and mint a code.
    ///
    /// Returns the callback URL: `redirect_uri` with `code` and `state` appended.
    pub fn authorize(&self, params: &AuthorizeParams) -> Result<Url, AuthorizeError> {
        if params.client_id.as_deref() != Some(self.client_id.as_str()) {
            tracing::warn!(client_id = ?params.client_id, "authorize: unknown client");
            return Err(AuthorizeError::InvalidClient);
        }

        let redirect_uri = params
            .redirect_uri
            .as_deref()
            .filter(|uri| is_trusted_redirect(uri, &self.redirect_prefix))
            .ok_or_else(|| {
                tracing::warn!(redirect_uri = ?params.redirect_uri, "authorize: untrusted redirect_uri");
                AuthorizeError::InvalidRedirectUri
            })?;
        let mut callback = Url::parse(redirect_uri).map_err(|_| AuthorizeError::InvalidRedirectUri)?;

        let scope = params.scope.as_deref().unwrap_or_default();
        let grant = self.store.issue_code(&self.client_id, redirect_uri, scope);

        {
            let mut query = callback.query_pairs_mut();
            query.append_pair("code", &grant.code);
            if let Some(state) = params.state.as_deref() {
                query.append_pair("state", state);
            }
        }

        tracing::info!(
            code = %mask(&grant.code),
            scope = %grant.scope,
            "authorization code issued"
        );
        Ok(callback)
    }

    /// Exchange an authorization code for an access token.
    pub fn exchange(&self, req: &TokenRequest) -> Result<TokenResponse, OAuthError> {
        if req.grant_type.as_deref() != Some(GRANT_TYPE_AUTHORIZATION_CODE) {
            return Err(OAuthError::UnsupportedGrantType);
        }

        let code = req
            .code
            .as_deref()
            .ok_or(OAuthError::InvalidGrant("invalid or expired authorization code"))?;

        let secret_ok = self.client_secret_matches(req.client_secret.as_deref());
        let grant = self
            .store
            .redeem_code(code, |grant| {
                req.client_id.as_deref() == Some(grant.client_id.as_str()) && secret_ok
            })
            .map_err(|e| {
                tracing::warn!(code = %mask(code), reason = ?e, "token exchange rejected");
                match e {
                    RedeemError::Unknown => {
                        OAuthError::InvalidGrant("invalid or expired authorization code")
                    }
                    RedeemError::Expired => OAuthError::InvalidGrant("authorization code expired"),
                    RedeemError::ClientRejected => OAuthError::InvalidClient,
                }
            })?;

        let token = self.store.issue_token(&grant.client_id, &grant.scope);
        tracing::info!(
            token = %mask(&token.token),
            client_id = %grant.client_id,
            "access token issued"
        );

        Ok(TokenResponse {
            access_token: token.token,
            token_type: "Bearer",
            expires_in: self.store.token_ttl().num_seconds(),
            refresh_token: generate_secret(),
            scope: token.scope,
        })
    }

    /// Resolve an `Authorization` header value to a live access token.
    pub fn validate_bearer(&self, authorization: Option<&str>) -> Option<AccessToken> {
        let token = authorization?.strip_prefix("Bearer ")?.trim();
        if token.is_empty() {
            return None;
        }
        self.store.lookup_token(token)
    }

    fn client_secret_matches(&self, provided: Option<&str>) -> bool {
        match (self.client_secret.as_deref(), provided) {
            (None, _) => true,
            (Some(expected), Some(given)) => bool::from(given.as_bytes().ct_eq(expected.as_bytes())),
            (Some(_), None) => false,
        }
    }
}

/// `uri` must start with `prefix`, and the prefix must end on a URL boundary
/// so `https://claude.ai.evil.com` does not pass for `https://claude.ai`.
fn is_trusted_redirect(uri: &str, prefix: &str) -> bool {
    match uri.strip_prefix(prefix) {
        Some(rest) => {
            prefix.ends_with('/') || rest.is_empty() || rest.starts_with(['/', '?', '#'])
        }
        None => false,
    }
}
