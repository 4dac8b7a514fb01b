//! Service config loading.
//!
//! Documents are parsed strictly (unknown fields fail) and validated before
//! they are returned. Errors from a file carry its path.

pub mod schema;

use std::path::{Path, PathBuf};

use scopewatch_core::error::{Result, ScopeError};

pub use schema::{InstrumentationConfig, ReportFormat, ServiceConfig};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SCOPEWATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "scopewatch.yaml";

/// `$SCOPEWATCH_CONFIG`, else `scopewatch.yaml` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ScopeError::Internal(format!("cannot read {}: {e}", path.display())))?;
    load_from_str(&text).map_err(|e| match e {
        ScopeError::InvalidConfig(msg) => {
            ScopeError::InvalidConfig(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

pub fn load_from_str(text: &str) -> Result<ServiceConfig> {
    let cfg: ServiceConfig = serde_yaml::from_str(text).map_err(|e| {
        let msg = match e.location() {
            Some(at) => format!("line {} column {}: {e}", at.line(), at.column()),
            None => e.to_string(),
        };
        ScopeError::InvalidConfig(msg)
    })?;
    cfg.validate()?;
    Ok(cfg)
}
