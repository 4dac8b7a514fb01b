//! scopewatch http library entry.
//!
//! This crate puts one root scope around every HTTP request. It holds the
//! strict config loader, the framework-agnostic [`instrument::Instrumentation`]
//! entry point, the axum middleware, and the demo service used by the binary
//! (`main.rs`) and by integration tests.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod app_state;
pub mod config;
pub mod demo;
pub mod instrument;
pub mod middleware;
pub mod router;

pub use instrument::{Instrumentation, RequestHook, TraceHook};
