use std::sync::Arc;

use axum::{
    extract::{FromRequest, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};

use super::server::{AuthorizeError, AuthorizeParams, OAuthError, TokenRequest};
use crate::AppState;

/// GET /oauth/authorize: issue a code and bounce back to the client.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, AuthorizeError> {
    let callback = state.oauth.authorize(&params)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, callback.to_string())]).into_response())
}

/// POST /oauth/token: exchange a code for a bearer token.
///
/// Accepts `application/json` as well as the standard form encoding.
pub async fn token(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let parsed = if is_json {
        Json::<TokenRequest>::from_request(req, &state)
            .await
            .map(|Json(body)| body)
            .map_err(|e| e.body_text())
    } else {
        Form::<TokenRequest>::from_request(req, &state)
            .await
            .map(|Form(body)| body)
            .map_err(|e| e.body_text())
    };

    let token_req = match parsed {
        Ok(body) => body,
        Err(detail) => {
            tracing::warn!(detail = %detail, "token request body could not be parsed");
            return OAuthError::InvalidRequest(detail).into_response();
        }
    };

    tracing::info!(
        grant_type = ?token_req.grant_type,
        client_id = ?token_req.client_id,
        "token request"
    );

    match state.oauth.exchange(&token_req) {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => e.into_response(),
    }
}
