//! Jira Cloud REST v3 client for the issue tracker seam.
//! Basic authentication with the account email and an API token.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{CreatedIssue, IssueTracker, NewIssue, TrackerError, TrackerUser};
use crate::config::Config;

/// Timeout for the read-only identity probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for a single issue creation.
pub const CREATE_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_DETAIL_LEN: usize = 2000;

pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(base_url: &str, email: &str, api_token: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("epic-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Self::new(
            &cfg.jira_url,
            cfg.jira_email.as_deref().unwrap_or_default(),
            cfg.jira_api_token.as_deref().unwrap_or_default(),
        )
    }

    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    fn issue_payload(issue: &NewIssue) -> Value {
        let mut fields = json!({
            "project": { "key": issue.project_key },
            "summary": issue.summary,
            "issuetype": { "name": issue.issue_type.as_str() },
        });

        if let Some(text) = issue.description.as_deref().filter(|d| !d.is_empty()) {
            fields["description"] = adf_paragraph(text);
        }
        if let Some(parent) = issue.parent_key.as_deref() {
            fields["parent"] = json!({ "key": parent });
        }

        json!({ "fields": fields })
    }
}

/// Atlassian Document Format body holding a single text paragraph.
fn adf_paragraph(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [{
            "type": "paragraph",
            "content": [{ "type": "text", "text": text }]
        }]
    })
}

fn truncate_detail(mut body: String) -> String {
    if body.len() > MAX_DETAIL_LEN {
        let mut cut = MAX_DETAIL_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

#[derive(Deserialize)]
struct CreateIssueResponse {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyselfResponse {
    display_name: String,
    email_address: Option<String>,
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, TrackerError> {
        let resp = self
            .client
            .post(format!("{}/rest/api/3/issue", self.base_url))
            .basic_auth(&self.email, Some(&self.api_token))
            .timeout(CREATE_TIMEOUT)
            .json(&Self::issue_payload(issue))
            .send()
            .await
            .map_err(|e| TrackerError::Transport(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                issue_type = issue.issue_type.as_str(),
                "jira rejected issue creation"
            );
            return Err(TrackerError::Status {
                status: status.as_u16(),
                detail: truncate_detail(body),
            });
        }

        let created: CreateIssueResponse = resp
            .json()
            .await
            .map_err(|e| TrackerError::Transport(format!("unreadable create response: {}", e)))?;

        Ok(CreatedIssue {
            url: self.browse_url(&created.key),
            key: created.key,
        })
    }

    async fn current_user(&self) -> Result<TrackerUser, TrackerError> {
        let resp = self
            .client
            .get(format!("{}/rest/api/3/myself", self.base_url))
            .basic_auth(&self.email, Some(&self.api_token))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| TrackerError::Transport(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackerError::Status {
                status: status.as_u16(),
                detail: truncate_detail(body),
            });
        }

        let me: MyselfResponse = resp
            .json()
            .await
            .map_err(|e| TrackerError::Transport(format!("unreadable identity response: {}", e)))?;

        Ok(TrackerUser {
            display_name: me.display_name,
            email: me.email_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::IssueType;
    use base64::Engine;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn basic_header() -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode("bot@acme.io:tok");
        format!("Basic {}", encoded)
    }

    fn story(parent: &str) -> NewIssue {
        NewIssue {
            project_key: "BIZ".into(),
            issue_type: IssueType::Story,
            summary: "Design API".into(),
            description: None,
            parent_key: Some(parent.into()),
        }
    }

    #[test]
    fn test_epic_payload_with_description() {
        let payload = JiraClient::issue_payload(&NewIssue {
            project_key: "BIZ".into(),
            issue_type: IssueType::Epic,
            summary: "Push Notifications".into(),
            description: Some("Mobile push".into()),
            parent_key: None,
        });

        assert_eq!(payload["fields"]["project"]["key"], "BIZ");
        assert_eq!(payload["fields"]["issuetype"]["name"], "Epic");
        assert_eq!(payload["fields"]["description"]["type"], "doc");
        assert_eq!(
            payload["fields"]["description"]["content"][0]["content"][0]["text"],
            "Mobile push"
        );
        assert!(payload["fields"].get("parent").is_none());
    }

    #[test]
    fn test_story_payload_references_parent() {
        let payload = JiraClient::issue_payload(&story("BIZ-1"));
        assert_eq!(payload["fields"]["parent"]["key"], "BIZ-1");
        assert_eq!(payload["fields"]["issuetype"]["name"], "Story");
        assert!(payload["fields"].get("description").is_none());
    }

    #[test]
    fn test_truncate_detail() {
        let long = "x".repeat(MAX_DETAIL_LEN + 10);
        let cut = truncate_detail(long);
        assert_eq!(cut.chars().count(), MAX_DETAIL_LEN + 1);
        assert_eq!(truncate_detail("short".into()), "short");
    }

    #[tokio::test]
    async fn test_create_issue_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/api/3/issue"))
            .and(header("authorization", basic_header().as_str()))
            .and(body_partial_json(json!({
                "fields": { "parent": { "key": "BIZ-1" }, "issuetype": { "name": "Story" } }
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "id": "10002", "key": "BIZ-2", "self": "x" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(&mock_server.uri(), "bot@acme.io", "tok").unwrap();
        let created = client.create_issue(&story("BIZ-1")).await.unwrap();

        assert_eq!(created.key, "BIZ-2");
        assert_eq!(created.url, format!("{}/browse/BIZ-2", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_create_issue_non_created_status_is_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/api/3/issue"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"errors":{"parent":"Epic not found"}}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(&mock_server.uri(), "bot@acme.io", "tok").unwrap();
        let err = client.create_issue(&story("BIZ-404")).await.unwrap_err();

        match err {
            TrackerError::Status { status, detail } => {
                assert_eq!(status, 400);
                assert!(detail.contains("Epic not found"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_issue_ok_but_not_created_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/api/3/issue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "key": "BIZ-9" })))
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(&mock_server.uri(), "bot@acme.io", "tok").unwrap();
        let err = client.create_issue(&story("BIZ-1")).await.unwrap_err();
        assert!(matches!(err, TrackerError::Status { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_create_issue_unreachable_is_transport_error() {
        let client = JiraClient::new("http://127.0.0.1:1", "bot@acme.io", "tok").unwrap();
        let err = client.create_issue(&story("BIZ-1")).await.unwrap_err();
        assert!(matches!(err, TrackerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_current_user() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/myself"))
            .and(header("authorization", basic_header().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accountId": "abc",
                "displayName": "Epic Bot",
                "emailAddress": "bot@acme.io"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(&mock_server.uri(), "bot@acme.io", "tok").unwrap();
        let me = client.current_user().await.unwrap();
        assert_eq!(me.display_name, "Epic Bot");
        assert_eq!(me.email.as_deref(), Some("bot@acme.io"));
    }

    #[tokio::test]
    async fn test_current_user_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/myself"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(&mock_server.uri(), "bot@acme.io", "bad").unwrap();
        let err = client.current_user().await.unwrap_err();
        assert!(matches!(err, TrackerError::Status { status: 401, .. }));
    }
}
