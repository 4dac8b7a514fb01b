//! Demo handlers: a request that fans out into timed sub-operations on
//! several flows, and an uninstrumented health check.

use std::time::Duration;

use axum::{extract::Path, Extension, Json};
use futures_util::future::join;
use serde::Serialize;

use scopewatch_core::{flow, scope, ScopeHandle};

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: u64,
    pub items: u32,
    pub price_cents: u64,
}

pub async fn get_order(
    Path(id): Path<u64>,
    Extension(scope): Extension<ScopeHandle>,
) -> Json<OrderView> {
    load_order(&scope, id).await;

    // independent lookups run side by side, each on its own flow
    let (items, price_cents) = join(
        flow::in_new_flow(count_items(scope.clone(), id)),
        flow::in_new_flow(quote_price(scope.clone(), id)),
    )
    .await;

    let audit = flow::spawn(write_audit(scope.clone(), id));
    if let Err(e) = audit.await {
        tracing::warn!(error = %e, order = id, "audit task failed");
    }

    Json(OrderView {
        id,
        items,
        price_cents,
    })
}

pub async fn health() -> &'static str {
    "ok"
}

async fn load_order(parent: &ScopeHandle, id: u64) {
    let _s = scope!(parent);
    tokio::time::sleep(Duration::from_millis(10 + id % 5)).await;
}

async fn count_items(parent: ScopeHandle, id: u64) -> u32 {
    let s = scope!(parent);
    {
        let _db = s.scope("db");
        tokio::time::sleep(Duration::from_millis(8)).await;
    }
    (id % 7) as u32 + 1
}

async fn quote_price(parent: ScopeHandle, id: u64) -> u64 {
    let _s = scope!(parent);
    tokio::time::sleep(Duration::from_millis(12)).await;
    1_000 + id * 25
}

async fn write_audit(parent: ScopeHandle, id: u64) {
    let _s = parent.fixed("audit");
    tokio::time::sleep(Duration::from_millis(3)).await;
    tracing::debug!(order = id, "audit written");
}
