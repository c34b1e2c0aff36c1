use clap::{Parser, Subcommand};

/// Epic Bridge: create Jira epics and stories on behalf of AI agents
#[derive(Parser)]
#[command(name = "epic-bridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check the Jira credentials against the identity endpoint and exit
    CheckTracker,
}
