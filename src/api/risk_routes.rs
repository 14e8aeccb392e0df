//! Risk admin: status, per-limit get/set, enable/disable, reset, and a
//! hypothetical order check without placing one.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::Result;
use crate::models::{Order, OrderSide};
use crate::risk::{LimitKind, RiskStatus};
use crate::Runtime;

async fn status(State(runtime): State<Arc<Runtime>>) -> Json<RiskStatus> {
    Json(runtime.risk.get_status())
}

async fn get_limits(State(runtime): State<Arc<Runtime>>) -> Json<std::collections::HashMap<LimitKind, Decimal>> {
    Json(runtime.risk.get_all_limits())
}

#[derive(Deserialize)]
struct SetLimitRequest {
    value: Decimal,
}

async fn set_limit(
    State(runtime): State<Arc<Runtime>>,
    Path(kind): Path<LimitKind>,
    Json(req): Json<SetLimitRequest>,
) -> Json<serde_json::Value> {
    runtime.risk.set_limit(kind, req.value);
    Json(serde_json::json!({ "updated": true }))
}

async fn enable(State(runtime): State<Arc<Runtime>>) -> Json<serde_json::Value> {
    runtime.risk.enable();
    Json(serde_json::json!({ "enabled": true }))
}

async fn disable(State(runtime): State<Arc<Runtime>>) -> Json<serde_json::Value> {
    runtime.risk.disable();
    Json(serde_json::json!({ "enabled": false }))
}

async fn reset(State(runtime): State<Arc<Runtime>>) -> Json<serde_json::Value> {
    runtime.risk.reset_all();
    Json(serde_json::json!({ "reset": true }))
}

#[derive(Deserialize)]
struct HypotheticalOrderRequest {
    game_id: String,
    market_ticker: String,
    side: OrderSide,
    quantity: u32,
}

async fn check_hypothetical(
    State(runtime): State<Arc<Runtime>>,
    Json(req): Json<HypotheticalOrderRequest>,
) -> Result<Json<serde_json::Value>> {
    let order = Order::new_market(req.game_id, req.market_ticker, req.side, req.quantity, None, None);
    runtime.risk.check_order(&order)?;
    Ok(Json(serde_json::json!({ "allowed": true })))
}

pub fn router() -> Router<Arc<Runtime>> {
    Router::new()
        .route("/risk/status", get(status))
        .route("/risk/limits", get(get_limits))
        .route("/risk/limits/:kind", post(set_limit))
        .route("/risk/enable", post(enable))
        .route("/risk/disable", post(disable))
        .route("/risk/reset", post(reset))
        .route("/risk/check", post(check_hypothetical))
}
