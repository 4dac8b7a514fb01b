use serde::Deserialize;
use scopewatch_core::error::{Result, ScopeError};
use scopewatch_core::{Level, ScopeOptions};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub instrumentation: InstrumentationConfig,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ScopeError::UnsupportedVersion);
        }
        if self.listen.trim().is_empty() {
            return Err(ScopeError::InvalidConfig("listen must not be empty".into()));
        }

        self.instrumentation.validate()?;

        Ok(())
    }
}

/// How collected snapshots are written to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentationConfig {
    /// Root scope name for every request.
    #[serde(default = "default_key")]
    pub key: String,

    /// Requests whose path+query starts with this (case-insensitive) are not
    /// instrumented.
    #[serde(default)]
    pub ignore_path_prefix: Option<String>,

    /// Log the collected report at this level; unset = do not log it.
    #[serde(default)]
    pub collect_level: Option<String>,

    #[serde(default)]
    pub report_format: ReportFormat,

    #[serde(default)]
    pub scope: ScopeOptions,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            ignore_path_prefix: None,
            collect_level: None,
            report_format: ReportFormat::default(),
            scope: ScopeOptions::default(),
        }
    }
}

impl InstrumentationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(ScopeError::InvalidConfig(
                "instrumentation.key must not be blank".into(),
            ));
        }
        if let Some(level) = &self.collect_level {
            level.parse::<Level>().map_err(|_| {
                ScopeError::InvalidConfig(format!(
                    "instrumentation.collect_level must be one of trace/debug/info/warn/error (got {level})"
                ))
            })?;
        }
        self.scope.validate()?;
        Ok(())
    }

    /// Parsed `collect_level`; `None` when unset or unparsable.
    pub fn collect_level(&self) -> Option<Level> {
        self.collect_level.as_deref().and_then(|l| l.parse().ok())
    }

    /// Prefix to skip, if one is configured and non-empty.
    pub fn ignore_path_prefix(&self) -> Option<&str> {
        self.ignore_path_prefix.as_deref().filter(|p| !p.is_empty())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_key() -> String {
    "request".into()
}
