//! Request gate: authenticates callers of the epic endpoints.
//!
//! One strategy per running instance, chosen by `AUTH_MODE`. The gate runs as
//! route middleware, before the JSON body is read, and has no side effects on
//! rejection.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::config::{AuthMode, Config};
use crate::errors::AppError;
use crate::oauth::{mask, AuthorizationServer};
use crate::AppState;

/// Authenticated caller, inserted as a request extension for handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    ApiKey,
    /// Scope is carried for logging; no operation checks it.
    OAuth { client_id: String, scope: String },
}

pub enum RequestGate {
    StaticKey { key: String },
    OAuth,
}

impl RequestGate {
    pub fn from_config(cfg: &Config) -> Self {
        match cfg.auth_mode {
            AuthMode::ApiKey => RequestGate::StaticKey { key: cfg.api_key.clone() },
            AuthMode::OAuth => RequestGate::OAuth,
        }
    }

    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        oauth: &AuthorizationServer,
    ) -> Result<Caller, AppError> {
        match self {
            RequestGate::StaticKey { key } => check_static_key(headers, key),
            RequestGate::OAuth => {
                let authorization = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok());
                match oauth.validate_bearer(authorization) {
                    Some(token) => Ok(Caller::OAuth {
                        client_id: token.client_id,
                        scope: token.scope,
                    }),
                    None => {
                        tracing::warn!(
                            has_header = authorization.is_some(),
                            "gate: missing, unknown or expired bearer token"
                        );
                        Err(AppError::Unauthorized)
                    }
                }
            }
        }
    }
}

/// Key from `X-API-Key`, falling back to `Authorization: Bearer <key>`.
fn check_static_key(headers: &HeaderMap, expected: &str) -> Result<Caller, AppError> {
    let provided_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
        });

    match provided_key {
        Some(k) if bool::from(k.as_bytes().ct_eq(expected.as_bytes())) => Ok(Caller::ApiKey),
        Some(k) => {
            tracing::warn!("gate: invalid API key (provided: '{}')", mask(k));
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!("gate: missing X-API-Key header");
            Err(AppError::Unauthorized)
        }
    }
}

/// Middleware: rejects unauthenticated requests with 401, otherwise attaches
/// the [`Caller`] to the request.
pub async fn require_caller(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = state.gate.authenticate(req.headers(), &state.oauth)?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{AuthorizeParams, ManualClock, TokenRequest};
    use axum::http::HeaderValue;

    fn config(mode: AuthMode) -> Config {
        Config {
            port: 0,
            jira_url: "https://acme.atlassian.net".into(),
            jira_email: None,
            jira_api_token: None,
            project_key: "BIZ".into(),
            auth_mode: mode,
            api_key: "team-key-1234567890".into(),
            oauth_client_id: "epic-creator-claude".into(),
            oauth_client_secret: None,
            oauth_redirect_prefix: "https://claude.ai".into(),
            story_delay: std::time::Duration::ZERO,
            sweep_interval: None,
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn oauth(cfg: &Config) -> AuthorizationServer {
        AuthorizationServer::new(cfg, Arc::new(ManualClock::default()))
    }

    #[test]
    fn test_static_key_accepted_from_either_header() {
        let cfg = config(AuthMode::ApiKey);
        let gate = RequestGate::from_config(&cfg);
        let server = oauth(&cfg);

        let via_custom = headers(&[("x-api-key", "team-key-1234567890")]);
        assert_eq!(gate.authenticate(&via_custom, &server).unwrap(), Caller::ApiKey);

        let via_bearer = headers(&[("authorization", "Bearer team-key-1234567890")]);
        assert_eq!(gate.authenticate(&via_bearer, &server).unwrap(), Caller::ApiKey);
    }

    #[test]
    fn test_static_key_rejections() {
        let cfg = config(AuthMode::ApiKey);
        let gate = RequestGate::from_config(&cfg);
        let server = oauth(&cfg);

        for h in [
            headers(&[]),
            headers(&[("x-api-key", "wrong")]),
            headers(&[("x-api-key", "team-key-1234567890x")]),
            headers(&[("authorization", "team-key-1234567890")]),
            headers(&[("authorization", "Basic team-key-1234567890")]),
        ] {
            assert!(matches!(
                gate.authenticate(&h, &server),
                Err(AppError::Unauthorized)
            ));
        }
    }

    #[test]
    fn test_blank_credential_never_matches_blank_key() {
        let mut cfg = config(AuthMode::ApiKey);
        cfg.api_key = String::new();
        let gate = RequestGate::from_config(&cfg);
        let server = oauth(&cfg);

        for h in [
            headers(&[("authorization", "Bearer ")]),
            headers(&[("x-api-key", ""), ("authorization", "Bearer    ")]),
            headers(&[("x-api-key", "")]),
        ] {
            assert!(matches!(
                gate.authenticate(&h, &server),
                Err(AppError::Unauthorized)
            ));
        }
    }

    #[test]
    fn test_oauth_gate_exposes_client_and_scope() {
        let cfg = config(AuthMode::OAuth);
        let gate = RequestGate::from_config(&cfg);
        let server = oauth(&cfg);

        let callback = server
            .authorize(&AuthorizeParams {
                client_id: Some("epic-creator-claude".into()),
                redirect_uri: Some("https://claude.ai/cb".into()),
                state: None,
                scope: Some("create_epic".into()),
            })
            .unwrap();
        let code = callback
            .query_pairs()
            .find(|(k, _)| k == "code")
            .unwrap()
            .1
            .into_owned();
        let token = server
            .exchange(&TokenRequest {
                grant_type: Some("authorization_code".into()),
                code: Some(code),
                client_id: Some("epic-creator-claude".into()),
                ..Default::default()
            })
            .unwrap();

        let auth = format!("Bearer {}", token.access_token);
        let caller = gate
            .authenticate(&headers(&[("authorization", auth.as_str())]), &server)
            .unwrap();
        assert_eq!(
            caller,
            Caller::OAuth {
                client_id: "epic-creator-claude".into(),
                scope: "create_epic".into(),
            }
        );
    }

    #[test]
    fn test_oauth_gate_ignores_static_key() {
        let cfg = config(AuthMode::OAuth);
        let gate = RequestGate::from_config(&cfg);
        let server = oauth(&cfg);

        let h = headers(&[("authorization", "Bearer team-key-1234567890")]);
        assert!(matches!(gate.authenticate(&h, &server), Err(AppError::Unauthorized)));
    }
}
