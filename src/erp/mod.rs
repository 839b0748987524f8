//! ERP access: the JSON-RPC client and the dashboard queries built on it.

mod client;
pub mod records;

pub use client::{ErpClient, ErpError, SearchOptions};
