//! Axum adapter for [`Instrumentation`].
//!
//! Install with `axum::middleware::from_fn_with_state(instrumentation, middleware)`.
//! Handlers read the request scope through `Extension<ScopeHandle>` (or
//! `Option<Extension<ScopeHandle>>` on routes that may be skipped).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::instrument::Instrumentation;

pub async fn middleware(
    State(instrumentation): State<Arc<Instrumentation>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    instrumentation
        .run(&path_and_query, |scope| async move {
            if let Some(scope) = scope {
                req.extensions_mut().insert(scope);
            }
            next.run(req).await
        })
        .await
}
