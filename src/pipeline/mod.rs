//! Epic creation pipeline: one epic, then its stories, one at a time.
//!
//! Only the epic is fatal. Once it exists every story is attempted in input
//! order, failures are recorded and the run always finishes with a result.

pub mod delay;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::tracker::{IssueTracker, IssueType, NewIssue, TrackerError};
use delay::StoryDelay;

/// A validated-on-run request for one epic and its stories.
#[derive(Debug, Clone, Default)]
pub struct EpicRequest {
    pub title: String,
    pub description: Option<String>,
    pub stories: Vec<StorySpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorySpec {
    pub title: String,
    pub description: Option<String>,
}

/// A created epic or story as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRef {
    pub key: String,
    pub title: String,
    pub url: String,
}

/// A story that could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryFailure {
    /// 1-based position in the request.
    pub position: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreationResult {
    pub epic: IssueRef,
    pub stories: Vec<IssueRef>,
    pub failed_stories: Vec<StoryFailure>,
    pub requested: usize,
}

impl CreationResult {
    pub fn created(&self) -> usize {
        self.stories.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Created 1 epic with {} of {} stories",
            self.created(),
            self.requested
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("epic_title is required")]
    MissingTitle,

    #[error("epic creation rejected with status {status}")]
    EpicRejected { status: u16, detail: String },

    #[error("epic creation failed: {0}")]
    EpicTransport(String),
}

pub struct EpicPipeline {
    tracker: Arc<dyn IssueTracker>,
    delay: Arc<dyn StoryDelay>,
    project_key: String,
}

impl EpicPipeline {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        delay: Arc<dyn StoryDelay>,
        project_key: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            delay,
            project_key: project_key.into(),
        }
    }

    pub async fn run(&self, req: EpicRequest) -> Result<CreationResult, PipelineError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(PipelineError::MissingTitle);
        }

        tracing::info!(epic = %title, stories = req.stories.len(), "creating epic");

        let epic = self
            .tracker
            .create_issue(&NewIssue {
                project_key: self.project_key.clone(),
                issue_type: IssueType::Epic,
                summary: title.to_string(),
                description: req.description.clone(),
                parent_key: None,
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "epic creation failed, no stories attempted");
                match e {
                    TrackerError::Status { status, detail } => {
                        PipelineError::EpicRejected { status, detail }
                    }
                    TrackerError::Transport(msg) => PipelineError::EpicTransport(msg),
                }
            })?;

        tracing::info!(epic = %epic.key, "epic created");

        let epic = IssueRef {
            key: epic.key,
            title: title.to_string(),
            url: epic.url,
        };

        let mut result = CreationResult {
            epic,
            stories: Vec::with_capacity(req.stories.len()),
            failed_stories: Vec::new(),
            requested: req.stories.len(),
        };

        for (index, story) in req.stories.into_iter().enumerate() {
            if index > 0 {
                self.delay.pause().await;
            }
            self.create_story(index + 1, story, &mut result).await;
        }

        tracing::info!(
            epic = %result.epic.key,
            created = result.created(),
            requested = result.requested,
            "pipeline finished"
        );
        Ok(result)
    }

    async fn create_story(&self, position: usize, story: StorySpec, result: &mut CreationResult) {
        let total = result.requested;
        let title = story.title.trim().to_string();

        if title.is_empty() {
            tracing::warn!(position, total, "story skipped: empty summary");
            result.failed_stories.push(StoryFailure {
                position,
                title,
                status: None,
                error: "story summary is required".into(),
            });
            return;
        }

        let outcome = self
            .tracker
            .create_issue(&NewIssue {
                project_key: self.project_key.clone(),
                issue_type: IssueType::Story,
                summary: title.clone(),
                description: story.description,
                parent_key: Some(result.epic.key.clone()),
            })
            .await;

        match outcome {
            Ok(created) => {
                tracing::info!(position, total, story = %created.key, "story created");
                result.stories.push(IssueRef {
                    key: created.key,
                    title,
                    url: created.url,
                });
            }
            Err(TrackerError::Status { status, .. }) => {
                tracing::warn!(position, total, status, "story rejected by tracker");
                result.failed_stories.push(StoryFailure {
                    position,
                    title,
                    status: Some(status),
                    error: format!("tracker returned {}", status),
                });
            }
            Err(TrackerError::Transport(msg)) => {
                tracing::warn!(position, total, error = %msg, "story transport failure");
                result.failed_stories.push(StoryFailure {
                    position,
                    title,
                    status: None,
                    error: "tracker unreachable".into(),
                });
            }
        }
    }
}
