pub mod environment;
pub mod erp;
pub mod error;
pub mod format;
pub mod identity;
pub mod server;
pub mod settings;
