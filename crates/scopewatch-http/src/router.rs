//! Axum router wiring for the demo service.
//!
//! Every route passes through the instrumentation middleware; `/health` is
//! expected to be covered by `ignore_path_prefix`.

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::{app_state::AppState, demo, middleware};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/orders/:id", get(demo::get_order))
        .route("/health", get(demo::health))
        .layer(from_fn_with_state(
            state.instrumentation(),
            middleware::middleware,
        ))
        .with_state(state)
}
