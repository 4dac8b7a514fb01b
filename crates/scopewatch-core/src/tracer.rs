//! Tracer: the wired-up collaborators (clock, sink, registry) plus options.
//! Root scopes are created here; everything below a root is created from a
//! scope handle.

use std::sync::Arc;

use tracing::Level;

use crate::clock::{Clock, MonotonicClock};
use crate::error::{Result, ScopeError};
use crate::flow::{FlowId, FlowRegistry};
use crate::options::ScopeOptions;
use crate::scope::{Scope, ScopeMode, ScopeNode};
use crate::sink::{LogSink, TracingSink};

/// State shared by every scope of one tracer.
pub(crate) struct Shared {
    pub(crate) options: ScopeOptions,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) registry: Arc<FlowRegistry>,
}

impl Shared {
    pub(crate) fn log(&self, level: Level, message: &str) {
        self.sink.log(level, &self.options.logger_category, message);
    }
}

#[derive(Clone)]
pub struct Tracer {
    shared: Arc<Shared>,
}

impl Tracer {
    /// Tracer on the monotonic system clock, logging through `tracing`, using
    /// the process-wide flow registry.
    pub fn new(options: ScopeOptions) -> Result<Self> {
        Self::builder()
            .options(options)
            .clock(Arc::new(MonotonicClock::new()))
            .sink(Arc::new(TracingSink))
            .build()
    }

    /// Builder with no collaborators wired; `build` fails until a clock and a
    /// sink are set.
    pub fn builder() -> TracerBuilder {
        TracerBuilder::default()
    }

    pub fn options(&self) -> &ScopeOptions {
        &self.shared.options
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.shared.registry
    }

    /// Open a root scope on the current flow.
    ///
    /// The flow's registered stack is replaced by a fresh one, so scopes left
    /// open by an earlier run on this flow are not picked up as parents.
    pub fn create(&self, root_name: &str) -> Scope {
        let stack = self.shared.registry.reset(FlowId::current());
        let node = ScopeNode::open(
            Arc::clone(&self.shared),
            root_name.to_owned(),
            None,
            Arc::clone(&stack),
            self.shared.options.ignore_nested,
        );
        self.shared.registry.reinstate(&stack);
        Scope::new(node, ScopeMode::Normal)
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct TracerBuilder {
    options: ScopeOptions,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn LogSink>>,
    registry: Option<Arc<FlowRegistry>>,
}

impl TracerBuilder {
    pub fn options(mut self, options: ScopeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use a private registry instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<FlowRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Tracer> {
        self.options.validate()?;
        let clock = self
            .clock
            .ok_or_else(|| ScopeError::Config("no clock wired".into()))?;
        let sink = self
            .sink
            .ok_or_else(|| ScopeError::Config("no log sink wired".into()))?;
        let registry = self.registry.unwrap_or_else(FlowRegistry::global);

        Ok(Tracer {
            shared: Arc::new(Shared {
                options: self.options,
                clock,
                sink,
                registry,
            }),
        })
    }
}

/// Shorthand for `Tracer::new(options)?.create(root_name)`.
pub fn create(root_name: &str, options: ScopeOptions) -> Result<Scope> {
    Ok(Tracer::new(options)?.create(root_name))
}
