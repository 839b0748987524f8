//! ERP environment selection.
//!
//! The backend talks to one of two Odoo instances: a DEMO trial instance used
//! during development and the PRODUCTION instance. The choice is made once at
//! startup from the mode flag and the resulting [`EnvironmentConfig`] is passed
//! to every consumer; nothing reads it from ambient global state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Mode flag value that selects the demo instance.
pub const DEVELOPMENT_FLAG: &str = "development";

pub const DEMO_API_KEY_VAR: &str = "ERBE_DEMO_API_KEY";
pub const PROD_API_KEY_VAR: &str = "ERBE_PROD_API_KEY";

const DEMO_URL: &str = "https://erbe-trial7.odoo.com/jsonrpc";
const DEMO_DATABASE: &str = "erbe-trial7";
const PROD_URL: &str = "https://erbe.odoo.com/jsonrpc";
const PROD_DATABASE: &str = "erbe";

// uom.uom ids differ between the trial database and production
const DEMO_UOM: &[(u32, &str)] = &[
    (1, "Stk"),
    (3, "Tag(e)"),
    (4, "Std"),
    (7, "g"),
    (12, "kg"),
    (21, "m"),
];

const PROD_UOM: &[(u32, &str)] = &[
    (1, "Stk"),
    (2, "Dutzend"),
    (4, "Tag(e)"),
    (5, "Std"),
    (9, "kg"),
    (14, "m"),
    (27, "Pauschal"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Demo,
    Production,
}

impl Environment {
    pub fn from_flag(flag: &str) -> Self {
        if flag == DEVELOPMENT_FLAG { Environment::Demo } else { Environment::Production }
    }

    pub fn label(self) -> &'static str {
        match self {
            Environment::Demo => "DEMO",
            Environment::Production => "PRODUCTION",
        }
    }

    /// Name of the environment variable holding this variant's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Environment::Demo => DEMO_API_KEY_VAR,
            Environment::Production => PROD_API_KEY_VAR,
        }
    }

    fn url(self) -> &'static str {
        match self {
            Environment::Demo => DEMO_URL,
            Environment::Production => PROD_URL,
        }
    }

    fn database(self) -> &'static str {
        match self {
            Environment::Demo => DEMO_DATABASE,
            Environment::Production => PROD_DATABASE,
        }
    }

    fn uom_table(self) -> &'static [(u32, &'static str)] {
        match self {
            Environment::Demo => DEMO_UOM,
            Environment::Production => PROD_UOM,
        }
    }
}

/// Resolved connection settings for the active ERP instance.
///
/// Serializes as `{ apiKey, url, database, UOM, label }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub url: String,
    pub database: String,
    #[serde(rename = "UOM")]
    pub uom: BTreeMap<u32, String>,
    pub label: String,
}

impl EnvironmentConfig {
    /// Build the fixed part of a variant with the given credential.
    pub fn for_environment(env: Environment, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: env.url().to_string(),
            database: env.database().to_string(),
            uom: env.uom_table().iter().map(|(id, name)| (*id, (*name).to_string())).collect(),
            label: env.label().to_string(),
        }
    }

    /// Display name for an ERP unit-of-measure id, if the active table knows it.
    pub fn uom_name(&self, id: u32) -> Option<&str> {
        self.uom.get(&id).map(String::as_str)
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Warning text emitted when the selected variant has no credential.
pub fn missing_credential_warning(env: Environment) -> String {
    format!(
        "{} ERP credential is empty ({} unset); ERP calls will be rejected by the server",
        env.label(),
        env.api_key_var()
    )
}

/// Select the ERP configuration for `env_flag`, reading credentials through `lookup`.
///
/// An empty or missing credential is not an error: a warning is logged and the
/// returned config carries an empty `api_key`.
pub fn select<F>(env_flag: &str, lookup: F) -> EnvironmentConfig
where
    F: Fn(&str) -> Option<String>,
{
    let env = Environment::from_flag(env_flag);
    let api_key = lookup(env.api_key_var()).unwrap_or_default();
    let config = EnvironmentConfig::for_environment(env, api_key.trim());
    if config.has_credential() {
        info!(target: "config", label = %config.label, database = %config.database, "ERP environment selected");
    } else {
        warn!(target: "config", "{}", missing_credential_warning(env));
    }
    config
}
