//!
//! erbe dashboard server binary
//! -----------------------------
//! Command-line entry point for the dashboard API. Configuration comes from
//! CLI flags and `ERBE_*` environment variables (flags win).

use anyhow::Result;
use std::env;

use erbe_dashboard::settings::{has_flag, Settings};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("erbe dashboard server\n\nUSAGE:\n  erbe_server [--http-port N] [--host ADDR] [--env MODE]\n\nOPTIONS:\n  --http-port N   HTTP API port (env: ERBE_HTTP_PORT, default 3000)\n  --host ADDR     Bind address (env: ERBE_HOST, default 0.0.0.0)\n  --env MODE      'development' selects the DEMO ERP, anything else PRODUCTION (env: ERBE_ENV)\n\nENVIRONMENT:\n  ERBE_SESSION_SECRET       secret used to verify session cookies (required)\n  ERBE_DEMO_API_KEY         ERP API key for the DEMO instance\n  ERBE_PROD_API_KEY         ERP API key for the PRODUCTION instance\n  ERBE_ERP_UID              ERP user id for execute_kw (default 2)\n  ERBE_REQUIRE_ROLE_CLAIM   reject session tokens without a role claim\n");
        return Ok(());
    }

    let settings = Settings::from_process(&args)?;
    tracing::info!(
        target: "startup",
        "erbe dashboard starting: bind={}, env_flag='{}', erp_uid={}, require_role_claim={}",
        settings.bind_addr(), settings.env_flag, settings.erp_uid, settings.require_role_claim
    );

    erbe_dashboard::server::run(settings).await
}
