//! Background job: drop expired authorization codes and access tokens.
//!
//! Lookups already reject expired entries; this keeps the maps from growing
//! with credentials that are never presented again.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::oauth::CredentialStore;
use crate::AppState;

/// Spawn the background cleanup task. Call this once at startup.
pub fn spawn(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep(state.oauth.store());
        }
    })
}

/// One sweep pass. Returns the number of codes and tokens removed.
pub fn sweep(store: &CredentialStore) -> (usize, usize) {
    let (codes, tokens) = store.sweep_expired();
    if codes > 0 || tokens > 0 {
        tracing::info!(codes, tokens, "swept expired OAuth credentials");
    } else {
        tracing::debug!(
            pending_codes = store.pending_codes(),
            active_tokens = store.active_tokens(),
            "oauth sweep: nothing expired"
        );
    }
    (codes, tokens)
}
