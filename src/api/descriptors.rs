//! Discovery documents for agent platforms: the plugin manifest and an
//! OpenAPI description of the create endpoint. Absolute URLs are built from
//! the request's `Host` (and `X-Forwarded-Proto` behind a proxy).

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde_json::{json, Value};

use crate::AppState;

/// Scopes advertised to the agent platform.
pub const ADVERTISED_SCOPES: &str = "create_epic create_story";

fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|p| *p == "https" || *p == "http")
        .unwrap_or("http");
    format!("{}://{}", scheme, host)
}

/// GET /.well-known/ai-plugin.json
pub async fn plugin_manifest(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<Value> {
    let base = base_url(&headers);

    Json(json!({
        "schema_version": "v1",
        "name_for_human": "Epic Creator",
        "name_for_model": "epic_creator",
        "description_for_human": "Create Jira epics and stories straight from your assistant.",
        "description_for_model": "Creates a Jira epic with optional user stories. POST JSON to /crear-epica-desde-claude.",
        "auth": {
            "type": "oauth",
            "client_url": format!("{}/oauth/authorize", base),
            "authorization_url": format!("{}/oauth/token", base),
            "authorization_content_type": "application/json",
            "scope": ADVERTISED_SCOPES,
        },
        "api": {
            "type": "openapi",
            "url": format!("{}/openapi.json", base),
        },
        "logo_url": format!("{}/logo.png", base),
        "contact_email": state.config.jira_email.clone().unwrap_or_default(),
        "legal_info_url": base,
    }))
}

/// GET /openapi.json
pub async fn openapi(headers: HeaderMap) -> Json<Value> {
    let issue_ref = json!({
        "type": "object",
        "properties": {
            "key": { "type": "string" },
            "title": { "type": "string" },
            "url": { "type": "string" }
        }
    });

    Json(json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Epic Creator API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Create Jira epics and their stories"
        },
        "servers": [{ "url": base_url(&headers) }],
        "paths": {
            "/crear-epica-desde-claude": {
                "post": {
                    "summary": "Create an epic with stories",
                    "operationId": "createEpic",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["epic_title"],
                                    "properties": {
                                        "epic_title": {
                                            "type": "string",
                                            "description": "Epic title"
                                        },
                                        "epic_description": {
                                            "type": "string",
                                            "description": "Epic description"
                                        },
                                        "stories": {
                                            "type": "array",
                                            "items": { "type": "string" },
                                            "description": "User story titles"
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Epic created",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "status": { "type": "string" },
                                            "epic": issue_ref.clone(),
                                            "stories": { "type": "array", "items": issue_ref },
                                            "created": { "type": "integer" },
                                            "requested": { "type": "integer" },
                                            "summary": { "type": "string" }
                                        }
                                    }
                                }
                            }
                        },
                        "400": { "description": "Validation error or tracker rejection" },
                        "401": { "description": "Missing or invalid credential" }
                    }
                }
            }
        }
    }))
}
