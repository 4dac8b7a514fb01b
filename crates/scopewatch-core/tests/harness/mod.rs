//! Tracer fixture shared by the lifecycle and flow tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::Arc;

use scopewatch_core::{FlowRegistry, ManualClock, MemorySink, ScopeOptions, Tracer};

pub struct Fixture {
    pub tracer: Tracer,
    pub clock: ManualClock,
    pub sink: Arc<MemorySink>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_options(ScopeOptions::default())
    }

    /// Private registry, manual clock and in-memory sink.
    pub fn with_options(options: ScopeOptions) -> Self {
        let clock = ManualClock::new();
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::builder()
            .options(options)
            .clock(Arc::new(clock.clone()))
            .sink(sink.clone())
            .registry(Arc::new(FlowRegistry::new()))
            .build()
            .expect("tracer must build");
        Self {
            tracer,
            clock,
            sink,
        }
    }

    /// How many "scope closed" lines were logged for `label`.
    pub fn close_count(&self, label: &str) -> usize {
        let prefix = format!("scope closed: {label} (");
        self.sink
            .lines()
            .iter()
            .filter(|l| l.message.starts_with(&prefix))
            .count()
    }
}
