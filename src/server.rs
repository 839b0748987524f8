//!
//! erbe dashboard HTTP server
//! ---------------------------
//! Axum API consumed by the dashboard front end.
//!
//! Responsibilities:
//! - Session check: the signed `session` cookie is verified on every request.
//! - `/api/auth/me` reports the current identity (401 with `{"user": null}` otherwise).
//! - Proxy endpoints fetch projects, tasks and finance records from the ERP
//!   instance selected at startup and shape them for the dashboard widgets.

use std::sync::Arc;

use axum::extract::{rejection::QueryRejection, Query, State};
use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::{get, post}, Json, Router};
use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::environment::{self, EnvironmentConfig};
use crate::erp::{records, ErpClient};
use crate::error::{AppError, AppResult};
use crate::identity::{AuthError, Identity, SessionVerifier, SESSION_COOKIE};
use crate::settings::Settings;

const CLEAR_SESSION_COOKIE: &str =
    "session=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Lax; Path=/";

const DEFAULT_LINE_LIMIT: u32 = 200;
const MAX_LINE_LIMIT: u32 = 1000;

/// Shared server state injected into all handlers. Everything here is
/// constructed once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<SessionVerifier>,
    pub environment: Arc<EnvironmentConfig>,
    pub erp: Arc<ErpClient>,
}

impl AppState {
    pub fn new(verifier: SessionVerifier, environment: EnvironmentConfig, erp_uid: i64) -> anyhow::Result<Self> {
        let environment = Arc::new(environment);
        let erp = ErpClient::new(environment.clone(), erp_uid).context("while building the ERP HTTP client")?;
        Ok(Self { verifier: Arc::new(verifier), environment, erp: Arc::new(erp) })
    }

    /// Build state from resolved settings, selecting the ERP environment from the process env.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::from_settings_with(settings, |name| std::env::var(name).ok())
    }

    /// Build state from resolved settings, reading ERP credentials through `lookup`.
    pub fn from_settings_with<F>(settings: &Settings, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = environment::select(&settings.env_flag, lookup);
        let verifier = SessionVerifier::new(&settings.session_secret).require_role_claim(settings.require_role_claim);
        Self::new(verifier, environment, settings.erp_uid)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "erbe dashboard ok" }))
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
        .route("/api/environment", get(environment_info))
        .route("/api/projects", get(projects))
        .route("/api/tasks", get(tasks))
        .route("/api/finance", get(finance))
        .route("/api/finance/lines", get(finance_lines))
        .with_state(state)
}

/// Serve the API on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(target: "startup", "erbe dashboard listening on {} (ERP: {})", addr, state.environment.label);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings)?;
    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    serve(listener, state).await
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all("cookie").iter() {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name {
                    // RFC 6265 allows a DQUOTE-wrapped value
                    let v = v.strip_prefix('"').and_then(|x| x.strip_suffix('"')).unwrap_or(v);
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, AuthError> {
    state.verifier.verify(parse_cookie(headers, SESSION_COOKIE).as_deref())
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match authenticate(&state, &headers) {
        Ok(identity) => (StatusCode::OK, Json(json!({ "user": identity }))).into_response(),
        Err(AuthError::Unauthenticated) => (StatusCode::UNAUTHORIZED, Json(json!({ "user": null }))).into_response(),
    }
}

async fn logout() -> impl IntoResponse {
    let mut h = HeaderMap::new();
    h.insert(SET_COOKIE, HeaderValue::from_static(CLEAR_SESSION_COOKIE));
    (StatusCode::OK, h, Json(json!({ "status": "ok" })))
}

async fn environment_info(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    authenticate(&state, &headers)?;
    let env = &state.environment;
    Ok(Json(json!({ "label": env.label, "database": env.database, "UOM": env.uom })))
}

async fn projects(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let identity = authenticate(&state, &headers)?;
    let projects = records::fetch_projects(&state.erp).await?;
    debug!(target: "http", user = %identity.username, count = projects.len(), "projects");
    Ok(Json(json!({ "projects": projects })))
}

async fn tasks(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let identity = authenticate(&state, &headers)?;
    let tasks = records::fetch_tasks(&state.erp).await?;
    let count = tasks.len();
    let columns = records::group_tasks_by_stage(tasks);
    debug!(target: "http", user = %identity.username, count, columns = columns.len(), "tasks");
    Ok(Json(json!({ "count": count, "columns": columns })))
}

async fn finance(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let identity = authenticate(&state, &headers)?;
    let invoices = records::fetch_invoices(&state.erp).await?;
    let summary = records::FinanceSummary::from_invoices(&invoices);
    debug!(target: "http", user = %identity.username, count = invoices.len(), "finance");
    Ok(Json(json!({ "summary": summary, "invoices": invoices })))
}

#[derive(Debug, Deserialize)]
struct LinesQuery {
    limit: Option<u32>,
}

async fn finance_lines(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<LinesQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let identity = authenticate(&state, &headers)?;
    let Query(q) = query.map_err(|e| AppError::user("bad_query".to_string(), e.body_text()))?;
    let limit = q.limit.unwrap_or(DEFAULT_LINE_LIMIT).clamp(1, MAX_LINE_LIMIT);
    let lines = records::fetch_invoice_lines(&state.erp, limit).await?;
    debug!(target: "http", user = %identity.username, count = lines.len(), limit, "finance lines");
    Ok(Json(json!({ "lines": lines })))
}
