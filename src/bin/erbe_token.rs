//!
//! erbe_token
//! ----------
//! Developer helper that mints a session cookie value signed with
//! `ERBE_SESSION_SECRET`, for exercising the API without the login front end.

use anyhow::{anyhow, Context, Result};
use std::env;

use erbe_dashboard::identity::{SessionClaims, SessionVerifier};
use erbe_dashboard::settings::SESSION_SECRET_VAR;

const DEFAULT_TTL_SECS: i64 = 8 * 60 * 60;

fn arg_after(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some(username) = arg_after(&args, "--user") else {
        eprintln!("USAGE:\n  erbe_token --user NAME [--role ROLE] [--ttl SECONDS]");
        return Err(anyhow!("--user is required"));
    };
    let ttl = match arg_after(&args, "--ttl") {
        Some(raw) => raw.parse::<i64>().with_context(|| format!("invalid --ttl '{}'", raw))?,
        None => DEFAULT_TTL_SECS,
    };
    let secret = env::var(SESSION_SECRET_VAR).with_context(|| format!("{} is not set", SESSION_SECRET_VAR))?;

    let mut claims = SessionClaims::new(username).valid_for(chrono::Utc::now().timestamp(), ttl);
    if let Some(role) = arg_after(&args, "--role") {
        claims = claims.with_role(role);
    }
    let token = SessionVerifier::new(&secret).sign(&claims)?;
    println!("{}", token);
    Ok(())
}
