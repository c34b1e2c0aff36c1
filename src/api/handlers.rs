use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::AuthMode;
use crate::errors::AppError;
use crate::middleware::gate::Caller;
use crate::pipeline::{EpicRequest, IssueRef, StoryFailure, StorySpec};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

/// Body of the create-epic endpoints.
#[derive(Debug, Deserialize)]
pub struct CreateEpicBody {
    pub epic_title: Option<String>,
    pub epic_description: Option<String>,
    pub stories: Option<Vec<StoryInput>>,
}

/// Stories arrive either as bare titles or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoryInput {
    Title(String),
    Detailed {
        #[serde(alias = "title")]
        summary: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<StoryInput> for StorySpec {
    fn from(input: StoryInput) -> Self {
        match input {
            StoryInput::Title(title) => StorySpec { title, description: None },
            StoryInput::Detailed { summary, description } => StorySpec {
                title: summary,
                description,
            },
        }
    }
}

impl From<CreateEpicBody> for EpicRequest {
    fn from(body: CreateEpicBody) -> Self {
        EpicRequest {
            title: body.epic_title.unwrap_or_default(),
            description: body.epic_description.filter(|d| !d.trim().is_empty()),
            stories: body
                .stories
                .unwrap_or_default()
                .into_iter()
                .map(StorySpec::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateEpicResponse {
    pub status: &'static str,
    pub message: String,
    pub epic: IssueRef,
    pub stories: Vec<IssueRef>,
    pub failed_stories: Vec<StoryFailure>,
    pub created: usize,
    pub requested: usize,
    pub summary: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /: status page.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let auth = match state.config.auth_mode {
        AuthMode::ApiKey => {
            r#"<h2>Authentication: API key</h2>
<p>Send <code>X-API-Key: &lt;key&gt;</code> or <code>Authorization: Bearer &lt;key&gt;</code>.</p>"#
        }
        AuthMode::OAuth => {
            r#"<h2>Authentication: OAuth 2.0</h2>
<ul>
  <li>/oauth/authorize - authorization</li>
  <li>/oauth/token - token exchange</li>
  <li><a href="/.well-known/ai-plugin.json">/.well-known/ai-plugin.json</a> - agent manifest</li>
</ul>"#
        }
    };

    Html(format!(
        r#"<h1>Epic Creator is running</h1>
{auth}
<h3>Endpoints</h3>
<ul>
  <li><a href="/test-jira">/test-jira</a> - check the Jira connection</li>
  <li><a href="/crear-epica-desde-claude">/crear-epica-desde-claude</a> - create an epic with stories (POST)</li>
  <li>/crear-epica - same as above (POST)</li>
  <li><a href="/openapi.json">/openapi.json</a> - API description</li>
  <li><a href="/health">/health</a> - liveness</li>
</ul>
<p><strong>Project:</strong> {project}</p>"#,
        auth = auth,
        project = escape_html(&state.config.project_key),
    ))
}

/// GET /health: liveness probe.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "epic-creator" })),
    )
}

/// GET /test-jira: call the tracker identity endpoint and render the outcome.
pub async fn test_tracker(State(state): State<Arc<AppState>>) -> Html<String> {
    if !state.config.has_tracker_credentials() {
        return Html("<h2>❌ Error: Jira credentials are not configured</h2>".to_string());
    }

    match state.tracker.current_user().await {
        Ok(user) => Html(format!(
            r#"<h2>✅ Connected to Jira</h2>
<p><strong>User:</strong> {}</p>
<p><strong>Email:</strong> {}</p>"#,
            escape_html(&user.display_name),
            escape_html(user.email.as_deref().unwrap_or("-")),
        )),
        Err(crate::tracker::TrackerError::Status { status, .. }) => {
            tracing::warn!(status, "jira connectivity probe rejected");
            Html(format!("<h2>❌ Error {}</h2>", status))
        }
        Err(e) => {
            tracing::warn!(error = %e, "jira connectivity probe failed");
            Html("<h2>❌ Error: Jira is unreachable</h2>".to_string())
        }
    }
}

/// GET /crear-epica-desde-claude: usage page for humans.
pub async fn create_epic_info(State(state): State<Arc<AppState>>) -> Html<String> {
    let auth = match state.config.auth_mode {
        AuthMode::ApiKey => "API key (X-API-Key or Authorization: Bearer)",
        AuthMode::OAuth => "Bearer token (OAuth 2.0)",
    };

    Html(format!(
        r#"<h1>🔗 Epic Creator - agent endpoint</h1>
<p><strong>Method:</strong> POST</p>
<p><strong>Authentication:</strong> {auth}</p>
<h3>Expected JSON</h3>
<pre>{{
  "epic_title": "Epic title",
  "epic_description": "Optional description",
  "stories": [
    "Story 1",
    {{ "summary": "Story 2", "description": "Optional" }}
  ]
}}</pre>
<a href="/">← Back</a>"#
    ))
}

/// POST /crear-epica, /crear-epica-desde-claude: run the epic pipeline.
pub async fn create_epic(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<CreateEpicBody>, JsonRejection>,
) -> Result<Json<CreateEpicResponse>, AppError> {
    let Json(body) = body.map_err(|e| {
        tracing::warn!("create_epic: unreadable body: {}", e.body_text());
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::Validation("request body must be a JSON object".into())
        }
    })?;

    match &caller {
        Caller::ApiKey => tracing::info!("create_epic: authenticated with API key"),
        Caller::OAuth { client_id, scope } => {
            tracing::info!(client_id = %client_id, scope = %scope, "create_epic: authenticated with bearer token")
        }
    }

    let result = state.pipeline.run(body.into()).await?;

    Ok(Json(CreateEpicResponse {
        status: "success",
        message: format!("Epic {} created", result.epic.key),
        created: result.created(),
        requested: result.requested,
        summary: result.summary(),
        epic: result.epic,
        stories: result.stories,
        failed_stories: result.failed_stories,
    }))
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
