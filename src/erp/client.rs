//! Minimal Odoo JSON-RPC client.
//!
//! Every call is a JSON-RPC 2.0 `call` posted to the environment's `/jsonrpc`
//! URL. Model access goes through `object.execute_kw` authenticated with the
//! configured database, user id and API key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::environment::EnvironmentConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ErpError {
    #[error("ERP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ERP responded with HTTP {status}")]
    Status { status: u16 },
    #[error("ERP fault: {message}")]
    Fault { message: String },
    #[error("malformed ERP response: {0}")]
    Malformed(String),
}

/// Options for `search_read`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub order: Option<String>,
}

impl SearchOptions {
    pub fn ordered<S: Into<String>>(order: S) -> Self {
        Self { limit: None, order: Some(order.into()) }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub struct ErpClient {
    http: reqwest::Client,
    config: Arc<EnvironmentConfig>,
    uid: i64,
    next_id: AtomicU64,
}

impl ErpClient {
    pub fn new(config: Arc<EnvironmentConfig>, uid: i64) -> Result<Self, ErpError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, config, uid, next_id: AtomicU64::new(1) })
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Raw JSON-RPC `call` against `service.method`.
    pub async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value, ErpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = rpc_envelope(id, service, method, args);
        debug!(target: "erp", id, service, method, env = %self.config.label, "json-rpc call");
        let resp = self.http.post(&self.config.url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ErpError::Status { status: status.as_u16() });
        }
        let val: Value = resp.json().await.map_err(|e| ErpError::Malformed(e.to_string()))?;
        parse_rpc_response(val)
    }

    /// `object.execute_kw(db, uid, api_key, model, method, args, kwargs)`.
    pub async fn execute_kw(&self, model: &str, method: &str, args: Value, kwargs: Value) -> Result<Value, ErpError> {
        if !self.config.has_credential() {
            debug!(target: "erp", env = %self.config.label, model, "calling ERP without a credential");
        }
        let params = json!([
            self.config.database,
            self.uid,
            self.config.api_key,
            model,
            method,
            args,
            kwargs,
        ]);
        self.call("object", "execute_kw", params).await
    }

    /// `search_read` returning the record list.
    pub async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        opts: &SearchOptions,
    ) -> Result<Vec<Value>, ErpError> {
        let mut kwargs = serde_json::Map::new();
        kwargs.insert("fields".into(), json!(fields));
        if let Some(limit) = opts.limit {
            kwargs.insert("limit".into(), json!(limit));
        }
        if let Some(order) = &opts.order {
            kwargs.insert("order".into(), json!(order));
        }
        let result = self.execute_kw(model, "search_read", json!([domain]), Value::Object(kwargs)).await?;
        match result {
            Value::Array(records) => Ok(records),
            other => Err(ErpError::Malformed(format!("search_read on {model} returned {other}"))),
        }
    }
}

fn rpc_envelope(id: u64, service: &str, method: &str, args: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "call",
        "id": id,
        "params": { "service": service, "method": method, "args": args },
    })
}

fn parse_rpc_response(mut val: Value) -> Result<Value, ErpError> {
    if let Some(err) = val.get("error") {
        // Odoo puts the useful text under error.data.message
        let message = err
            .pointer("/data/message")
            .and_then(Value::as_str)
            .or_else(|| err.get("message").and_then(Value::as_str))
            .unwrap_or("unknown error")
            .to_string();
        return Err(ErpError::Fault { message });
    }
    match val.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(ErpError::Malformed("response has neither result nor error".into())),
    }
}
