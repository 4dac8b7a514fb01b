//! Shared application state for the demo service.

use std::sync::Arc;

use scopewatch_core::error::Result;

use crate::config::ServiceConfig;
use crate::instrument::{Instrumentation, TraceHook};

#[derive(Clone)]
pub struct AppState {
    instrumentation: Arc<Instrumentation>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: &ServiceConfig) -> Result<Self> {
        let instrumentation = Instrumentation::new(cfg.instrumentation.clone())?
            .pre_request(Arc::new(TraceHook::started()))
            .post_request(Arc::new(TraceHook::finished()));

        Ok(Self {
            instrumentation: Arc::new(instrumentation),
        })
    }

    pub fn instrumentation(&self) -> Arc<Instrumentation> {
        Arc::clone(&self.instrumentation)
    }
}
