//! Dashboard queries against the ERP and the light shaping the widgets need.
//! Records stay as JSON; only the fields a widget reads are interpreted here.

use serde::Serialize;
use serde_json::{json, Value};

use super::client::{ErpClient, ErpError, SearchOptions};
use crate::environment::EnvironmentConfig;
use crate::format::format_currency;

pub const PROJECT_FIELDS: &[&str] = &["id", "name", "partner_id", "user_id", "date_start", "date", "task_count"];

pub const TASK_FIELDS: &[&str] = &[
    "id",
    "name",
    "project_id",
    "stage_id",
    "user_ids",
    "date_deadline",
    "priority",
    "allocated_hours",
];

pub const INVOICE_FIELDS: &[&str] = &[
    "id",
    "name",
    "partner_id",
    "invoice_date",
    "invoice_date_due",
    "amount_total",
    "amount_residual",
    "currency_id",
    "payment_state",
];

pub const INVOICE_LINE_FIELDS: &[&str] = &[
    "id",
    "move_id",
    "product_id",
    "name",
    "quantity",
    "product_uom_id",
    "price_unit",
    "price_subtotal",
];

const NO_STAGE: &str = "Ohne Phase";
const DEFAULT_CURRENCY: &str = "EUR";

pub async fn fetch_projects(client: &ErpClient) -> Result<Vec<Value>, ErpError> {
    client
        .search_read("project.project", json!([["active", "=", true]]), PROJECT_FIELDS, &SearchOptions::ordered("name asc"))
        .await
}

pub async fn fetch_tasks(client: &ErpClient) -> Result<Vec<Value>, ErpError> {
    client
        .search_read(
            "project.task",
            json!([["active", "=", true]]),
            TASK_FIELDS,
            &SearchOptions::ordered("stage_id, priority desc, id"),
        )
        .await
}

pub async fn fetch_invoices(client: &ErpClient) -> Result<Vec<Value>, ErpError> {
    client
        .search_read(
            "account.move",
            json!([["move_type", "=", "out_invoice"], ["state", "=", "posted"]]),
            INVOICE_FIELDS,
            &SearchOptions::ordered("invoice_date desc"),
        )
        .await
}

pub async fn fetch_invoice_lines(client: &ErpClient, limit: u32) -> Result<Vec<Value>, ErpError> {
    let mut lines = client
        .search_read(
            "account.move.line",
            json!([
                ["move_id.move_type", "=", "out_invoice"],
                ["move_id.state", "=", "posted"],
                ["display_type", "=", "product"]
            ]),
            INVOICE_LINE_FIELDS,
            &SearchOptions::ordered("id desc").limit(limit),
        )
        .await?;
    for line in lines.iter_mut() {
        annotate_uom(line, client.config());
    }
    Ok(lines)
}

/// Read a many2one value (`[id, "display name"]`, or `false` when unset).
pub fn many2one(v: &Value) -> Option<(i64, &str)> {
    let arr = v.as_array()?;
    let id = arr.first()?.as_i64()?;
    let name = arr.get(1)?.as_str()?;
    Some((id, name))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KanbanColumn {
    pub stage: String,
    pub tasks: Vec<Value>,
}

/// Group tasks into kanban columns by stage name, keeping the order in which
/// stages first appear in `tasks`.
pub fn group_tasks_by_stage(tasks: Vec<Value>) -> Vec<KanbanColumn> {
    let mut columns: Vec<KanbanColumn> = Vec::new();
    for task in tasks {
        let stage = task
            .get("stage_id")
            .and_then(many2one)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| NO_STAGE.to_string());
        match columns.iter_mut().find(|c| c.stage == stage) {
            Some(col) => col.tasks.push(task),
            None => columns.push(KanbanColumn { stage, tasks: vec![task] }),
        }
    }
    columns
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Money {
    pub amount: f64,
    pub formatted: String,
}

impl Money {
    fn new(amount: f64, currency: &str) -> Self {
        Self { amount, formatted: format_currency(amount, currency) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceSummary {
    pub currency: String,
    pub invoice_count: usize,
    pub invoiced: Money,
    pub outstanding: Money,
    pub paid: Money,
}

impl FinanceSummary {
    pub fn from_invoices(invoices: &[Value]) -> Self {
        let currency = invoices
            .iter()
            .find_map(|inv| inv.get("currency_id").and_then(many2one).map(|(_, name)| name.to_string()))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let sum = |field: &str| -> f64 {
            invoices.iter().filter_map(|inv| inv.get(field).and_then(Value::as_f64)).sum()
        };
        let invoiced = sum("amount_total");
        let outstanding = sum("amount_residual");
        Self {
            invoice_count: invoices.len(),
            invoiced: Money::new(invoiced, &currency),
            outstanding: Money::new(outstanding, &currency),
            paid: Money::new(invoiced - outstanding, &currency),
            currency,
        }
    }
}

/// Set `uom` on an invoice line from `product_uom_id`, preferring the active
/// environment's display table over the ERP's own name.
pub fn annotate_uom(line: &mut Value, config: &EnvironmentConfig) {
    let uom = line.get("product_uom_id").and_then(many2one).map(|(id, erp_name)| {
        u32::try_from(id)
            .ok()
            .and_then(|id| config.uom_name(id))
            .unwrap_or(erp_name)
            .to_string()
    });
    if let Some(obj) = line.as_object_mut() {
        obj.insert("uom".into(), uom.map(Value::String).unwrap_or(Value::Null));
    }
}
