//! scopewatch core: nested scope timers with hierarchical aggregation.
//!
//! A [`Tracer`] opens root scopes; scopes open children; closing a scope
//! merges its elapsed time, and everything its children merged into it, into
//! its parent. Scopes can be opened and closed from any number of threads or
//! tokio tasks at once: each logical flow has its own stack in a
//! [`FlowRegistry`], and merges are additive per key so totals do not depend
//! on closing order.
//!
//! ```no_run
//! use scopewatch_core::{ScopeOptions, Tracer};
//!
//! let tracer = Tracer::new(ScopeOptions::default())?;
//! let req = tracer.create("req");
//! {
//!     let _db = req.scope("db");
//!     // ...
//! }
//! req.close();
//! println!("{}", scopewatch_core::report::render_table(&req.collect()));
//! # Ok::<(), scopewatch_core::ScopeError>(())
//! ```
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are denied outside tests. Scope operations
//! are infallible; only tracer wiring and config loading return `Result`.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod clock;
pub mod error;
pub mod flow;
pub mod metric;
pub mod options;
pub mod report;
pub mod scope;
pub mod sink;
pub mod snapshot;
pub mod tracer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{ErrorCode, Result, ScopeError};
pub use flow::{FlowId, FlowRegistry, FlowStack};
pub use metric::{AggregationMap, MetricLabel};
pub use options::ScopeOptions;
pub use scope::{Scope, ScopeHandle, ScopeMode, ScopeRequest};
pub use sink::{LogSink, MemorySink, TracingSink};
pub use snapshot::{GroupedMetric, Snapshot};
pub use tracer::{create, Tracer, TracerBuilder};

/// Re-exported so callers can pass levels without depending on `tracing`.
pub use tracing::Level;

/// Name of the enclosing function (closures and async blocks are skipped).
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let full = __type_name_of(__here);
        let full = full.strip_suffix("::__here").unwrap_or(full);
        full.rsplit("::")
            .find(|seg| *seg != "{{closure}}")
            .unwrap_or(full)
    }};
}

/// Open a child scope named after the calling function, or with an explicit
/// name.
///
/// ```no_run
/// # use scopewatch_core::{scope, ScopeHandle};
/// fn load_user(parent: &ScopeHandle) {
///     let _s = scope!(parent); // "<parent>_load_user"
/// }
/// ```
#[macro_export]
macro_rules! scope {
    ($parent:expr) => {
        $parent.scope_with($crate::ScopeRequest::from_caller($crate::function_name!()))
    };
    ($parent:expr, $name:expr) => {
        $parent.scope($name)
    };
}
