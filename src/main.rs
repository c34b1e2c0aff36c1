use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderName, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epic_bridge::config::{self, AuthMode, Config};
use epic_bridge::oauth::SystemClock;
use epic_bridge::pipeline::delay::FixedDelay;
use epic_bridge::tracker::{jira::JiraClient, IssueTracker};
use epic_bridge::{api, cli, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "epic_bridge=debug,tower_http=debug".into()),
    );
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::CheckTracker) => check_tracker(&cfg).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    if !cfg.has_tracker_credentials() {
        tracing::warn!("JIRA_EMAIL / JIRA_API_TOKEN not set; issue creation will fail");
    }
    if cfg.auth_mode == AuthMode::OAuth && cfg.oauth_client_secret.is_none() {
        tracing::warn!("OAUTH_CLIENT_SECRET not set; token requests are accepted without a client secret");
    }

    let tracker: Arc<dyn IssueTracker> =
        Arc::new(JiraClient::from_config(&cfg).context("failed to build Jira client")?);
    let delay = Arc::new(FixedDelay(cfg.story_delay));
    let cors = cors_layer(&cfg.oauth_redirect_prefix);
    let sweep_interval = cfg.sweep_interval;

    tracing::info!(
        auth_mode = ?cfg.auth_mode,
        project = %cfg.project_key,
        jira = %cfg.jira_url,
        "starting epic bridge"
    );

    let state = Arc::new(AppState::new(cfg, tracker, delay, Arc::new(SystemClock)));

    let app = api::router(state.clone()).layer(cors);

    if let Some(every) = sweep_interval {
        jobs::cleanup::spawn(state.clone(), every);
        tracing::info!("Background OAuth sweep started (every {}s)", every.as_secs());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Epic bridge listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Epic bridge stopped");
    Ok(())
}

/// CORS: the agent platform origin plus local development.
fn cors_layer(redirect_prefix: &str) -> CorsLayer {
    let trusted_origin = redirect_prefix.trim_end_matches('/').to_string();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == trusted_origin
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-request-id"),
        ])
}

async fn check_tracker(cfg: &Config) -> anyhow::Result<()> {
    if !cfg.has_tracker_credentials() {
        anyhow::bail!("JIRA_EMAIL and JIRA_API_TOKEN must be set");
    }

    let client = JiraClient::from_config(cfg)?;
    let user = client
        .current_user()
        .await
        .with_context(|| format!("Jira at {} rejected the credentials", cfg.jira_url))?;

    println!("Connected to Jira:");
    println!("  Site:    {}", cfg.jira_url);
    println!("  User:    {}", user.display_name);
    println!("  Email:   {}", user.email.as_deref().unwrap_or("-"));
    println!("  Project: {}", cfg.project_key);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
