//! Per-request instrumentation.
//!
//! Each instrumented request runs in its own logical flow with one root
//! scope, named by `instrumentation.key`. Handlers open children from the
//! [`ScopeHandle`] they are given. The root is closed when the work finishes,
//! and also when it panics or is cancelled, because the root guard closes on
//! drop.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use scopewatch_core::error::Result;
use scopewatch_core::{flow, report, ScopeHandle, Tracer};

use crate::config::{InstrumentationConfig, ReportFormat};

/// Hook run before the wrapped work (root just opened) or after it (root
/// already closed).
#[async_trait]
pub trait RequestHook: Send + Sync {
    async fn on_request(&self, scope: &ScopeHandle);
}

pub struct Instrumentation {
    cfg: InstrumentationConfig,
    tracer: Tracer,
    pre: Option<Arc<dyn RequestHook>>,
    post: Option<Arc<dyn RequestHook>>,
}

impl Instrumentation {
    /// Validate `cfg` and build a tracer from its scope options.
    pub fn new(cfg: InstrumentationConfig) -> Result<Self> {
        cfg.validate()?;
        let tracer = Tracer::new(cfg.scope.clone())?;
        Ok(Self::with_tracer(cfg, tracer))
    }

    /// Use an already wired tracer; its options win over `cfg.scope`.
    pub fn with_tracer(cfg: InstrumentationConfig, tracer: Tracer) -> Self {
        Self {
            cfg,
            tracer,
            pre: None,
            post: None,
        }
    }

    pub fn pre_request(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.pre = Some(hook);
        self
    }

    pub fn post_request(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.post = Some(hook);
        self
    }

    pub fn config(&self) -> &InstrumentationConfig {
        &self.cfg
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Whether `path_and_query` falls under the ignored prefix.
    pub fn skips(&self, path_and_query: &str) -> bool {
        let Some(prefix) = self.cfg.ignore_path_prefix() else {
            return false;
        };
        path_and_query
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }

    /// Run `work` under a fresh root scope, or uninstrumented (`None`) when
    /// the path is skipped.
    pub async fn run<F, Fut, T>(&self, path_and_query: &str, work: F) -> T
    where
        F: FnOnce(Option<ScopeHandle>) -> Fut,
        Fut: Future<Output = T>,
    {
        if self.skips(path_and_query) {
            return work(None).await;
        }

        flow::in_new_flow(async move {
            let root = self.tracer.create(&self.cfg.key);
            if let Some(hook) = &self.pre {
                hook.on_request(&root).await;
            }

            let out = work(Some(root.handle())).await;
            root.close();

            if let Some(hook) = &self.post {
                hook.on_request(&root).await;
            }
            self.report(&root);
            out
        })
        .await
    }

    fn report(&self, root: &ScopeHandle) {
        let Some(level) = self.cfg.collect_level() else {
            return;
        };
        match self.cfg.report_format {
            ReportFormat::Table => root.collect_all(level),
            ReportFormat::Json => match report::render_json(&root.collect()) {
                Ok(json) => root.log(level, &json),
                Err(e) => tracing::warn!(error = %e, scope = %root.label(), "report rendering failed"),
            },
        }
    }
}

/// Hook that traces the root scope's label and elapsed time.
#[derive(Debug, Clone, Copy)]
pub struct TraceHook {
    phase: &'static str,
}

impl TraceHook {
    pub fn started() -> Self {
        Self { phase: "started" }
    }

    pub fn finished() -> Self {
        Self { phase: "finished" }
    }
}

#[async_trait]
impl RequestHook for TraceHook {
    async fn on_request(&self, scope: &ScopeHandle) {
        tracing::debug!(
            scope = %scope.label(),
            ms = scope.milliseconds(),
            phase = self.phase,
            "request"
        );
    }
}
