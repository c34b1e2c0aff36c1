//! Issue tracker abstraction.
//!
//! The pipeline only talks to [`IssueTracker`]; [`jira::JiraClient`] is the
//! production implementation, tests plug in scripted doubles.

pub mod jira;

use async_trait::async_trait;
use thiserror::Error;

/// Issue types the bridge creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueType {
    Epic,
    Story,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Epic => "Epic",
            IssueType::Story => "Story",
        }
    }
}

/// A single issue-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub project_key: String,
    pub issue_type: IssueType,
    pub summary: String,
    pub description: Option<String>,
    /// Key of the parent epic, for stories.
    pub parent_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub key: String,
    /// Canonical browse URL of the issue.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerUser {
    pub display_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The tracker answered with a non-success status.
    #[error("tracker returned {status}: {detail}")]
    Status { status: u16, detail: String },

    /// Network failure, timeout, or an unreadable response.
    #[error("tracker transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create one issue. Success means the tracker reported it as created.
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, TrackerError>;

    /// Identity of the configured tracker account. Used as a connectivity probe.
    async fn current_user(&self) -> Result<TrackerUser, TrackerError>;
}
