//! End-to-end HTTP tests: the dashboard API on an ephemeral port in front of a
//! fake ERP JSON-RPC endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{extract::State, routing::post, Json, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use erbe_dashboard::environment::{Environment, EnvironmentConfig, DEMO_API_KEY_VAR};
use erbe_dashboard::identity::{SessionClaims, SessionVerifier};
use erbe_dashboard::server::{self, AppState};
use erbe_dashboard::settings::{Settings, ENV_FLAG_VAR, REQUIRE_ROLE_VAR, SESSION_SECRET_VAR};

const SECRET: &str = "http-test-secret";
const ERP_UID: i64 = 2;

#[derive(Clone, Default)]
struct FakeErp {
    calls: Arc<Mutex<Vec<Value>>>,
}

impl FakeErp {
    fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

fn fixture(model: &str) -> Value {
    match model {
        "project.project" => json!([
            {"id": 1, "name": "Generator HF", "partner_id": [7, "Klinikum Tübingen"], "task_count": 3},
            {"id": 2, "name": "Service Vertrag", "partner_id": false, "task_count": 0}
        ]),
        "project.task" => json!([
            {"id": 10, "name": "Angebot", "stage_id": [1, "Neu"], "project_id": [1, "Generator HF"]},
            {"id": 11, "name": "Montage", "stage_id": [2, "In Arbeit"], "project_id": [1, "Generator HF"]},
            {"id": 12, "name": "Prüfung", "stage_id": [1, "Neu"], "project_id": [1, "Generator HF"]}
        ]),
        "account.move" => json!([
            {"id": 100, "name": "INV/2026/0001", "amount_total": 12000.0, "amount_residual": 2000.0, "currency_id": [1, "EUR"]},
            {"id": 101, "name": "INV/2026/0002", "amount_total": 499.99, "amount_residual": 0.0, "currency_id": [1, "EUR"]}
        ]),
        "account.move.line" => json!([
            {"id": 500, "name": "Service", "quantity": 4.0, "product_uom_id": [4, "Hours"]},
            {"id": 501, "name": "Kabel", "quantity": 2.0, "product_uom_id": [999, "Rolle"]}
        ]),
        _ => json!([]),
    }
}

async fn fake_jsonrpc(State(fake): State<FakeErp>, Json(body): Json<Value>) -> Json<Value> {
    fake.calls.lock().unwrap().push(body.clone());
    let id = body["id"].clone();
    let args = &body["params"]["args"];
    if args[2] == "bad-key" {
        return Json(json!({
            "jsonrpc": "2.0", "id": id,
            "error": {"code": 200, "message": "Odoo Server Error", "data": {"message": "Access Denied"}}
        }));
    }
    let model = args[3].as_str().unwrap_or_default();
    Json(json!({"jsonrpc": "2.0", "id": id, "result": fixture(model)}))
}

async fn spawn_fake_erp() -> Result<(String, FakeErp)> {
    let fake = FakeErp::default();
    let app = Router::new().route("/jsonrpc", post(fake_jsonrpc)).with_state(fake.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{}/jsonrpc", addr), fake))
}

struct TestApp {
    base: String,
    client: reqwest::Client,
    erp: FakeErp,
}

impl TestApp {
    async fn start(api_key: &str) -> Result<Self> {
        let (erp_url, erp) = spawn_fake_erp().await?;
        let mut env = EnvironmentConfig::for_environment(Environment::Demo, api_key);
        env.url = erp_url;
        let state = AppState::new(SessionVerifier::new(SECRET), env, ERP_UID)?;
        Self::serve(state, erp).await
    }

    async fn serve(state: AppState, erp: FakeErp) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = server::serve(listener, state).await;
        });
        Ok(Self { base: format!("http://{}", addr), client: reqwest::Client::new(), erp })
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.get(format!("{}{}", self.base, path));
        if let Some(t) = token {
            req = req.header("cookie", format!("session={}", t));
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        Ok((status, body))
    }
}

fn token(role: Option<&str>) -> Result<String> {
    let mut claims = SessionClaims::new("ada").valid_for(chrono::Utc::now().timestamp(), 600);
    if let Some(r) = role {
        claims = claims.with_role(r);
    }
    SessionVerifier::new(SECRET).sign(&claims)
}

#[tokio::test]
async fn me_without_cookie_is_401_with_null_user() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let (status, body) = app.get("/api/auth/me", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"user": null}));
    Ok(())
}

#[tokio::test]
async fn me_reports_identity_from_cookie() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let (status, body) = app.get("/api/auth/me", Some(&token(Some("finance"))?)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"user": {"username": "ada", "role": "finance"}}));

    let (_, body) = app.get("/api/auth/me", Some(&token(None)?)).await?;
    assert_eq!(body["user"]["role"], "superadmin");
    Ok(())
}

#[tokio::test]
async fn me_rejects_foreign_and_garbage_tokens() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let foreign = SessionVerifier::new("not-our-secret").sign(&SessionClaims::new("ada"))?;
    for bad in [foreign.as_str(), "garbage", ""] {
        let (status, body) = app.get("/api/auth/me", Some(bad)).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {bad:?}");
        assert_eq!(body, json!({"user": null}));
    }
    Ok(())
}

#[tokio::test]
async fn logout_expires_session_cookie() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let resp = app.client.post(format!("{}/api/auth/logout", app.base)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn proxy_endpoints_require_a_session() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    for path in ["/api/projects", "/api/tasks", "/api/finance", "/api/finance/lines", "/api/environment"] {
        let (status, body) = app.get(path, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(body["code"], "unauthenticated");
    }
    assert!(app.erp.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn projects_are_fetched_with_environment_credentials() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let (status, body) = app.get("/api/projects", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projects"].as_array().map(Vec::len), Some(2));

    let calls = app.erp.calls();
    assert_eq!(calls.len(), 1);
    let params = &calls[0]["params"];
    assert_eq!(params["service"], "object");
    assert_eq!(params["method"], "execute_kw");
    assert_eq!(params["args"][0], "erbe-trial7");
    assert_eq!(params["args"][1], ERP_UID);
    assert_eq!(params["args"][2], "demo-key");
    assert_eq!(params["args"][3], "project.project");
    assert_eq!(params["args"][4], "search_read");
    Ok(())
}

#[tokio::test]
async fn tasks_are_grouped_into_kanban_columns() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let (status, body) = app.get("/api/tasks", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["columns"][0]["stage"], "Neu");
    assert_eq!(body["columns"][0]["tasks"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["columns"][1]["stage"], "In Arbeit");
    Ok(())
}

#[tokio::test]
async fn finance_summary_is_formatted() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let (status, body) = app.get("/api/finance", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["summary"];
    assert_eq!(summary["invoice_count"], 2);
    assert_eq!(summary["invoiced"]["formatted"], "12.499,99 €");
    assert_eq!(summary["outstanding"]["formatted"], "2.000,00 €");
    assert_eq!(summary["paid"]["formatted"], "10.499,99 €");
    Ok(())
}

#[tokio::test]
async fn finance_lines_resolve_units_and_cap_limit() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let (status, body) = app.get("/api/finance/lines?limit=5000", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"][0]["uom"], "Std");
    assert_eq!(body["lines"][1]["uom"], "Rolle");

    let calls = app.erp.calls();
    assert_eq!(calls[0]["params"]["args"][6]["limit"], 1000);
    Ok(())
}

#[tokio::test]
async fn finance_lines_checks_session_before_query() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    for query in ["limit=abc", "limit=-1"] {
        let (status, body) = app.get(&format!("/api/finance/lines?{query}"), None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{query}");
        assert_eq!(body["code"], "unauthenticated");
    }

    let (status, body) = app.get("/api/finance/lines?limit=abc", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "bad_query");
    assert!(app.erp.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn state_from_settings_applies_role_claim_requirement() -> Result<()> {
    let vars: HashMap<&str, &str> = HashMap::from([
        (ENV_FLAG_VAR, "development"),
        (SESSION_SECRET_VAR, SECRET),
        (REQUIRE_ROLE_VAR, "true"),
        (DEMO_API_KEY_VAR, "demo-key"),
    ]);
    let lookup = |name: &str| vars.get(name).map(|v| v.to_string());
    let settings = Settings::resolve(&[], &lookup)?;
    assert!(settings.require_role_claim);

    let state = AppState::from_settings_with(&settings, &lookup)?;
    assert_eq!(state.environment.label, "DEMO");
    assert_eq!(state.environment.api_key, "demo-key");

    let app = TestApp::serve(state, FakeErp::default()).await?;
    let (status, body) = app.get("/api/auth/me", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"user": null}));

    let (status, body) = app.get("/api/auth/me", Some(&token(Some("viewer"))?)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "viewer");
    Ok(())
}

#[tokio::test]
async fn erp_faults_surface_as_bad_gateway() -> Result<()> {
    let app = TestApp::start("bad-key").await?;
    let (status, body) = app.get("/api/projects", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "erp_fault");
    assert!(body["message"].as_str().unwrap_or_default().contains("Access Denied"));
    Ok(())
}

#[tokio::test]
async fn environment_endpoint_never_exposes_api_key() -> Result<()> {
    let app = TestApp::start("demo-key").await?;
    let (status, body) = app.get("/api/environment", Some(&token(None)?)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "DEMO");
    assert_eq!(body["database"], "erbe-trial7");
    assert_eq!(body["UOM"]["4"], "Std");
    assert!(body.get("apiKey").is_none());
    assert!(!body.to_string().contains("demo-key"));
    Ok(())
}
