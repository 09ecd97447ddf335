//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod policy;
pub mod secrets;

pub use policy::WorkflowPolicy;

use std::path::PathBuf;

use crate::error::{Error, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Optional TOML file overriding [`WorkflowPolicy`] defaults.
    pub policy_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            policy_file: optional_var("JOBFLOW_POLICY_FILE").map(PathBuf::from),
        })
    }

    /// The workflow policy: the policy file when configured, else defaults.
    pub fn workflow_policy(&self) -> Result<WorkflowPolicy> {
        match self.policy_file {
            Some(ref path) => WorkflowPolicy::load(path),
            None => Ok(WorkflowPolicy::default()),
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name)
        .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
}

/// Unset and empty are the same thing.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
