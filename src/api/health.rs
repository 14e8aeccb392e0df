//! Liveness/readiness probes.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::Runtime;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    database: &'static str,
}

async fn alive() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready(State(runtime): State<Arc<Runtime>>) -> Json<ReadyBody> {
    let database = if runtime.store.ping().await.is_ok() { "ok" } else { "unreachable" };
    Json(ReadyBody { status: "ok", database })
}

pub fn router() -> Router<Arc<Runtime>> {
    Router::new()
        .route("/health", get(alive))
        .route("/health/ready", get(ready))
}
