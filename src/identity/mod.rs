//! Session identity for the dashboard.
//! A signed `session` cookie is the only credential the backend accepts; this
//! module verifies it and turns it into an [`Identity`].

mod principal;
mod session;

pub use principal::{Identity, DEFAULT_ROLE};
pub use session::{AuthError, SessionClaims, SessionVerifier, SESSION_COOKIE};
