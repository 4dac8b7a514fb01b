//! Top-level facade crate for scopewatch.
//!
//! Re-exports the core engine and the http instrumentation layer so users can
//! depend on a single crate.

pub mod core {
    pub use scopewatch_core::*;
}

pub mod http {
    pub use scopewatch_http::*;
}

pub use scopewatch_core::{create, scope, Scope, ScopeHandle, ScopeOptions, Tracer};
