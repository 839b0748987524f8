//! Process settings for the dashboard server.
//! CLI flags override environment variables, which override defaults. The
//! environment is read through a lookup closure so tests never touch the
//! real process environment.

use anyhow::{anyhow, Result};

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_ENV_FLAG: &str = "production";
pub const DEFAULT_ERP_UID: i64 = 2;

pub const ENV_FLAG_VAR: &str = "ERBE_ENV";
pub const SESSION_SECRET_VAR: &str = "ERBE_SESSION_SECRET";
pub const HTTP_PORT_VAR: &str = "ERBE_HTTP_PORT";
pub const HOST_VAR: &str = "ERBE_HOST";
pub const ERP_UID_VAR: &str = "ERBE_ERP_UID";
pub const REQUIRE_ROLE_VAR: &str = "ERBE_REQUIRE_ROLE_CLAIM";

#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub http_port: u16,
    /// Raw mode flag; `development` selects the demo ERP.
    pub env_flag: String,
    pub session_secret: String,
    pub erp_uid: i64,
    pub require_role_claim: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("http_port", &self.http_port)
            .field("env_flag", &self.env_flag)
            .field("session_secret", &"<redacted>")
            .field("erp_uid", &self.erp_uid)
            .field("require_role_claim", &self.require_role_claim)
            .finish()
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        if let Some(v) = args[i].strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            return Some(v);
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl Settings {
    /// Resolve settings from CLI `args` and an environment `lookup`.
    pub fn resolve<F>(args: &[String], lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_port = match arg_value(args, "--http-port").map(str::to_string).or_else(|| lookup(HTTP_PORT_VAR)) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| anyhow!("invalid HTTP port '{raw}'"))?,
            None => DEFAULT_HTTP_PORT,
        };
        let host = arg_value(args, "--host")
            .map(str::to_string)
            .or_else(|| lookup(HOST_VAR))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let env_flag = arg_value(args, "--env")
            .map(str::to_string)
            .or_else(|| lookup(ENV_FLAG_VAR))
            .unwrap_or_else(|| DEFAULT_ENV_FLAG.to_string());
        let erp_uid = match lookup(ERP_UID_VAR) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| anyhow!("invalid {ERP_UID_VAR} '{raw}'"))?,
            None => DEFAULT_ERP_UID,
        };
        let require_role_claim = lookup(REQUIRE_ROLE_VAR).and_then(|v| parse_bool(&v)).unwrap_or(false);

        let session_secret = lookup(SESSION_SECRET_VAR).unwrap_or_default();
        if session_secret.is_empty() {
            return Err(anyhow!("{SESSION_SECRET_VAR} must be set to verify session cookies"));
        }

        Ok(Self { host, http_port, env_flag, session_secret, erp_uid, require_role_claim })
    }

    pub fn from_process(args: &[String]) -> Result<Self> {
        Self::resolve(args, |name| std::env::var(name).ok())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}
