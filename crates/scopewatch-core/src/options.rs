use serde::Deserialize;

use crate::error::{Result, ScopeError};

/// Tracer-wide options. Also used as the `scope:` section of the http config.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeOptions {
    /// Joins a parent label and a child name.
    #[serde(default = "default_key_separator")]
    pub key_separator: String,

    /// Applied to root scopes; children of such a root are suppressed.
    #[serde(default)]
    pub ignore_nested: bool,

    /// Category attached to every line sent to the log sink.
    #[serde(default = "default_logger_category")]
    pub logger_category: String,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            key_separator: default_key_separator(),
            ignore_nested: false,
            logger_category: default_logger_category(),
        }
    }
}

impl ScopeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.logger_category.trim().is_empty() {
            return Err(ScopeError::Config(
                "logger_category must not be blank".into(),
            ));
        }
        Ok(())
    }

    pub fn with_key_separator(mut self, sep: impl Into<String>) -> Self {
        self.key_separator = sep.into();
        self
    }

    pub fn with_ignore_nested(mut self, yes: bool) -> Self {
        self.ignore_nested = yes;
        self
    }

    pub fn with_logger_category(mut self, category: impl Into<String>) -> Self {
        self.logger_category = category.into();
        self
    }
}

fn default_key_separator() -> String {
    "_".into()
}
fn default_logger_category() -> String {
    "scopewatch".into()
}
