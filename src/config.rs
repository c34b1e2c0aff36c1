use std::time::Duration;

const PLACEHOLDER_API_KEY: &str = "epic-creator-2024-key";

/// Which Request Gate strategy this instance runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Shared secret in `X-API-Key` or `Authorization: Bearer`.
    ApiKey,
    /// OAuth2 authorization-code grant, bearer tokens issued by this server.
    OAuth,
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api_key" | "apikey" | "key" => Ok(AuthMode::ApiKey),
            "oauth" | "oauth2" => Ok(AuthMode::OAuth),
            other => anyhow::bail!("unknown AUTH_MODE '{}': expected 'api_key' or 'oauth'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the Jira Cloud site, e.g. `https://acme.atlassian.net`.
    pub jira_url: String,
    pub jira_email: Option<String>,
    pub jira_api_token: Option<String>,
    /// Project every epic and story is created in. Default: BIZ.
    pub project_key: String,
    pub auth_mode: AuthMode,
    pub api_key: String,
    pub oauth_client_id: String,
    /// When set, `/oauth/token` requires this exact `client_secret`.
    pub oauth_client_secret: Option<String>,
    /// Redirect URIs must start with this prefix.
    pub oauth_redirect_prefix: String,
    /// Pause between consecutive story creations.
    pub story_delay: Duration,
    /// Interval of the expired code/token sweep. `None` disables the job.
    pub sweep_interval: Option<Duration>,
}

impl Config {
    /// True when both halves of the Jira Basic credential are present.
    pub fn has_tracker_credentials(&self) -> bool {
        self.jira_email.as_deref().is_some_and(|s| !s.is_empty())
            && self.jira_api_token.as_deref().is_some_and(|s| !s.is_empty())
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let auth_mode: AuthMode = std::env::var("AUTH_MODE")
        .unwrap_or_else(|_| "api_key".into())
        .parse()?;

    let api_key = std::env::var("API_KEY").unwrap_or_else(|_| PLACEHOLDER_API_KEY.into());

    let env_mode = std::env::var("APP_ENV")
        .or_else(|_| std::env::var("RUST_ENV"))
        .unwrap_or_default();
    check_api_key(auth_mode, &api_key, &env_mode)?;

    let jira_url = std::env::var("JIRA_URL")
        .unwrap_or_else(|_| "http://localhost:8080".into())
        .trim_end_matches('/')
        .to_string();

    Ok(Config {
        port: std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .unwrap_or(5000),
        jira_url,
        jira_email: std::env::var("JIRA_EMAIL").ok(),
        jira_api_token: std::env::var("JIRA_API_TOKEN").ok(),
        project_key: std::env::var("JIRA_PROJECT_KEY").unwrap_or_else(|_| "BIZ".into()),
        auth_mode,
        api_key,
        oauth_client_id: std::env::var("OAUTH_CLIENT_ID")
            .unwrap_or_else(|_| "epic-creator-claude".into()),
        oauth_client_secret: std::env::var("OAUTH_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty()),
        oauth_redirect_prefix: std::env::var("OAUTH_REDIRECT_PREFIX")
            .unwrap_or_else(|_| "https://claude.ai".into()),
        story_delay: Duration::from_millis(
            std::env::var("STORY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        ),
        sweep_interval: std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(Some(300))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    })
}

/// Refuses a blank key, and the public placeholder in production.
fn check_api_key(auth_mode: AuthMode, api_key: &str, env_mode: &str) -> anyhow::Result<()> {
    if auth_mode != AuthMode::ApiKey {
        return Ok(());
    }
    if api_key.trim().is_empty() {
        anyhow::bail!("API_KEY is empty. Set a private key or unset it to use the development placeholder.");
    }
    if api_key == PLACEHOLDER_API_KEY {
        if env_mode == "production" {
            anyhow::bail!(
                "API_KEY is still the public placeholder. \
                 Set a private key before running in production."
            );
        }
        eprintln!("⚠️  API_KEY is not set, using the public placeholder key. Set API_KEY for production.");
    }
    Ok(())
}
