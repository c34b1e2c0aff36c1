//! In-memory storage for authorization codes and access tokens.
//!
//! Both maps are sharded (`DashMap`) so concurrent requests can read, insert
//! and delete without a global lock. Expired entries are evicted lazily when
//! they are next presented, and in bulk by [`CredentialStore::sweep_expired`].
//! Nothing survives a process restart.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;

use super::clock::Clock;

/// Authorization codes are valid for 10 minutes.
pub const CODE_TTL_SECS: i64 = 600;
/// Access tokens are valid for 1 hour.
pub const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub client_id: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
}

/// Why a code could not be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemError {
    Unknown,
    /// Past its TTL. The code has been removed.
    Expired,
    /// The caller failed the client check. The code stays redeemable.
    ClientRejected,
}

pub struct CredentialStore {
    codes: DashMap<String, AuthorizationCode>,
    tokens: DashMap<String, AccessToken>,
    clock: Arc<dyn Clock>,
    code_ttl: Duration,
    token_ttl: Duration,
}

impl CredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttls(
            clock,
            Duration::seconds(CODE_TTL_SECS),
            Duration::seconds(TOKEN_TTL_SECS),
        )
    }

    pub fn with_ttls(clock: Arc<dyn Clock>, code_ttl: Duration, token_ttl: Duration) -> Self {
        Self {
            codes: DashMap::new(),
            tokens: DashMap::new(),
            clock,
            code_ttl,
            token_ttl,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn issue_code(&self, client_id: &str, redirect_uri: &str, scope: &str) -> AuthorizationCode {
        let grant = AuthorizationCode {
            code: generate_secret(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            issued_at: self.clock.now(),
        };
        self.codes.insert(grant.code.clone(), grant.clone());
        grant
    }

    /// Consume `code` if it exists, is within its TTL and passes `accept`.
    ///
    /// The check and the removal happen under the same shard lock, so two
    /// concurrent exchanges of one code cannot both succeed.
    pub fn redeem_code(
        &self,
        code: &str,
        accept: impl FnOnce(&AuthorizationCode) -> bool,
    ) -> Result<AuthorizationCode, RedeemError> {
        let now = self.clock.now();
        match self.codes.entry(code.to_string()) {
            Entry::Vacant(_) => Err(RedeemError::Unknown),
            Entry::Occupied(entry) => {
                if now - entry.get().issued_at > self.code_ttl {
                    entry.remove();
                    return Err(RedeemError::Expired);
                }
                if !accept(entry.get()) {
                    return Err(RedeemError::ClientRejected);
                }
                Ok(entry.remove())
            }
        }
    }

    pub fn issue_token(&self, client_id: &str, scope: &str) -> AccessToken {
        let token = AccessToken {
            token: generate_secret(),
            client_id: client_id.to_string(),
            scope: scope.to_string(),
            issued_at: self.clock.now(),
        };
        self.tokens.insert(token.token.clone(), token.clone());
        token
    }

    /// Look up a bearer token, evicting it if it has expired.
    pub fn lookup_token(&self, token: &str) -> Option<AccessToken> {
        let now = self.clock.now();
        let ttl = self.token_ttl;

        if let Some(entry) = self.tokens.get(token) {
            if now - entry.issued_at <= ttl {
                return Some(entry.clone());
            }
        } else {
            return None;
        }

        if self.tokens.remove_if(token, |_, t| now - t.issued_at > ttl).is_some() {
            tracing::debug!("evicted expired access token");
        }
        None
    }

    /// Drop every expired code and token. Returns `(codes, tokens)` removed.
    pub fn sweep_expired(&self) -> (usize, usize) {
        let now = self.clock.now();

        let codes_before = self.codes.len();
        self.codes.retain(|_, c| now - c.issued_at <= self.code_ttl);
        let tokens_before = self.tokens.len();
        self.tokens.retain(|_, t| now - t.issued_at <= self.token_ttl);

        (
            codes_before.saturating_sub(self.codes.len()),
            tokens_before.saturating_sub(self.tokens.len()),
        )
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn pending_codes(&self) -> usize {
        self.codes.len()
    }

    pub fn active_tokens(&self) -> usize {
        self.tokens.len()
    }
}

/// 32 random bytes from the OS, base64url without padding (43 chars).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::clock::ManualClock;

    fn store() -> (Arc<ManualClock>, CredentialStore) {
        let clock = Arc::new(ManualClock::default());
        let store = CredentialStore::new(clock.clone());
        (clock, store)
    }

    #[test]
    fn test_generated_secrets_are_unique_and_url_safe() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_code_is_single_use() {
        let (_clock, store) = store();
        let grant = store.issue_code("client", "https://claude.ai/cb", "create_epic");

        let redeemed = store.redeem_code(&grant.code, |_| true).unwrap();
        assert_eq!(redeemed.client_id, "client");
        assert_eq!(redeemed.scope, "create_epic");
        assert!(!store.contains_code(&grant.code));

        assert_eq!(
            store.redeem_code(&grant.code, |_| true).unwrap_err(),
            RedeemError::Unknown
        );
    }

    #[test]
    fn test_code_valid_at_exactly_ttl() {
        let (clock, store) = store();
        let grant = store.issue_code("client", "https://claude.ai/cb", "");
        clock.advance(Duration::seconds(CODE_TTL_SECS));
        assert!(store.redeem_code(&grant.code, |_| true).is_ok());
    }

    #[test]
    fn test_expired_code_is_removed() {
        let (clock, store) = store();
        let grant = store.issue_code("client", "https://claude.ai/cb", "");
        clock.advance(Duration::seconds(CODE_TTL_SECS + 1));

        assert_eq!(
            store.redeem_code(&grant.code, |_| true).unwrap_err(),
            RedeemError::Expired
        );
        assert!(!store.contains_code(&grant.code));
    }

    #[test]
    fn test_rejected_client_keeps_code() {
        let (_clock, store) = store();
        let grant = store.issue_code("client", "https://claude.ai/cb", "");

        assert_eq!(
            store
                .redeem_code(&grant.code, |g| g.client_id == "intruder")
                .unwrap_err(),
            RedeemError::ClientRejected
        );
        assert!(store.contains_code(&grant.code));
        assert!(store.redeem_code(&grant.code, |g| g.client_id == "client").is_ok());
    }

    #[test]
    fn test_token_lookup_and_lazy_eviction() {
        let (clock, store) = store();
        let token = store.issue_token("client", "create_epic create_story");

        clock.advance(Duration::seconds(TOKEN_TTL_SECS));
        let found = store.lookup_token(&token.token).unwrap();
        assert_eq!(found.scope, "create_epic create_story");

        clock.advance(Duration::seconds(1));
        assert!(store.lookup_token(&token.token).is_none());
        assert!(!store.contains_token(&token.token));
    }

    #[test]
    fn test_unknown_token() {
        let (_clock, store) = store();
        assert!(store.lookup_token("nope").is_none());
    }

    #[test]
    fn test_sweep_removes_only_expired_entries() {
        let (clock, store) = store();
        let old_code = store.issue_code("client", "https://claude.ai/cb", "");
        let old_token = store.issue_token("client", "");

        clock.advance(Duration::seconds(CODE_TTL_SECS + 1));
        let fresh_code = store.issue_code("client", "https://claude.ai/cb", "");

        assert_eq!(store.sweep_expired(), (1, 0));
        assert!(!store.contains_code(&old_code.code));
        assert!(store.contains_code(&fresh_code.code));
        assert!(store.contains_token(&old_token.token));

        clock.advance(Duration::seconds(TOKEN_TTL_SECS));
        assert_eq!(store.sweep_expired(), (1, 1));
        assert_eq!(store.pending_codes(), 0);
        assert_eq!(store.active_tokens(), 0);
    }

    #[test]
    fn test_concurrent_redeem_succeeds_once() {
        let (_clock, store) = store();
        let store = Arc::new(store);
        let grant = store.issue_code("client", "https://claude.ai/cb", "");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let code = grant.code.clone();
                std::thread::spawn(move || store.redeem_code(&code, |_| true).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }
}
