//! Typed configuration from environment variables.
//!
//! Loads once at startup. Everything has a sane local default; nothing
//! here is secret.

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Default log level when RUST_LOG is unset.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let database_path =
            std::env::var("TASKALLOC_DB").unwrap_or_else(|_| "taskalloc.db".to_string());
        if database_path.is_empty() {
            return Err(Error::Config("TASKALLOC_DB must not be empty".to_string()));
        }

        Ok(Self {
            database_path,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
