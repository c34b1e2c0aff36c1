//! OAuth2 authorization-code grant for the single trusted agent client.
//!
//! Flow:
//! 1. `GET /oauth/authorize` validates the client and redirect URI, stores a
//!    one-time code and redirects back with `code` + `state`.
//! 2. `POST /oauth/token` exchanges the code (≤ 10 minutes old) for a bearer
//!    token valid for one hour.
//! 3. Protected routes call [`AuthorizationServer::validate_bearer`] through
//!    the request gate.

pub mod clock;
pub mod handlers;
pub mod server;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use server::{AuthorizationServer, AuthorizeError, AuthorizeParams, OAuthError, TokenRequest, TokenResponse};
pub use store::{AccessToken, AuthorizationCode, CredentialStore};

/// Shorten a secret for log output: first and last four characters.
pub(crate) fn mask(secret: &str) -> String {
    if secret.len() > 12 && secret.is_ascii() {
        format!("{}…{}", &secret[..4], &secret[secret.len() - 4..])
    } else {
        "****".to_string()
    }
}
