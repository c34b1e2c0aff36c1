//! Epic Bridge: an HTTP service that lets AI agents create Jira epics and
//! their stories, behind either a static API key or a small OAuth2
//! authorization-code server.

use std::sync::Arc;

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod oauth;
pub mod pipeline;
pub mod tracker;

use config::Config;
use middleware::gate::RequestGate;
use oauth::{AuthorizationServer, Clock};
use pipeline::{delay::StoryDelay, EpicPipeline};
use tracker::IssueTracker;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: Config,
    pub tracker: Arc<dyn IssueTracker>,
    pub pipeline: EpicPipeline,
    pub oauth: AuthorizationServer,
    pub gate: RequestGate,
}

impl AppState {
    pub fn new(
        config: Config,
        tracker: Arc<dyn IssueTracker>,
        delay: Arc<dyn StoryDelay>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pipeline = EpicPipeline::new(tracker.clone(), delay, config.project_key.clone());
        let oauth = AuthorizationServer::new(&config, clock);
        let gate = RequestGate::from_config(&config);
        Self {
            config,
            tracker,
            pipeline,
            oauth,
            gate,
        }
    }
}
