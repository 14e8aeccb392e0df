//! Execution admin: stats, positions, orders, manual execution, closing,
//! settlement, and mark-to-market refresh.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::Result;
use crate::execution::{ExecutionStats, PortfolioSummary};
use crate::models::{Order, OrderSide, Position, TradeSignal};
use crate::Runtime;

async fn stats(State(runtime): State<Arc<Runtime>>) -> Json<ExecutionStats> {
    Json(runtime.execution.get_stats())
}

async fn portfolio(State(runtime): State<Arc<Runtime>>) -> Json<PortfolioSummary> {
    Json(runtime.execution.get_portfolio_summary())
}

async fn positions(State(runtime): State<Arc<Runtime>>) -> Json<Vec<Position>> {
    Json(runtime.execution.get_all_positions())
}

async fn open_positions(State(runtime): State<Arc<Runtime>>) -> Json<Vec<Position>> {
    Json(runtime.execution.get_open_positions())
}

async fn orders(State(runtime): State<Arc<Runtime>>) -> Json<Vec<Order>> {
    Json(runtime.execution.get_all_orders())
}

async fn refresh_pnl(State(runtime): State<Arc<Runtime>>) -> Json<serde_json::Value> {
    runtime.execution.update_unrealized_pnl();
    Json(serde_json::json!({ "refreshed": true }))
}

#[derive(Deserialize)]
struct ExecuteSignalRequest {
    game_id: String,
    signal: TradeSignal,
}

async fn execute_signal(
    State(runtime): State<Arc<Runtime>>,
    Json(req): Json<ExecuteSignalRequest>,
) -> Result<Json<Order>> {
    let order = runtime.execution.execute_signal(&req.signal, &req.game_id).await?;
    Ok(Json(order))
}

async fn execute_strategy(State(runtime): State<Arc<Runtime>>, Path(game_id): Path<String>) -> Json<Vec<serde_json::Value>> {
    let signals = runtime.strategies.evaluate_game(&game_id);
    let mut results = Vec::new();
    for signal in signals {
        match runtime.execution.execute_signal(&signal, &game_id).await {
            Ok(order) => results.push(serde_json::json!({ "status": "filled", "order": order })),
            Err(e) => results.push(serde_json::json!({ "status": "rejected", "reason": e.to_string() })),
        }
    }
    Json(results)
}

#[derive(Deserialize)]
struct ClosePositionRequest {
    market_ticker: String,
    side: OrderSide,
    exit_price: Option<Decimal>,
}

async fn close_position(
    State(runtime): State<Arc<Runtime>>,
    Json(req): Json<ClosePositionRequest>,
) -> Result<Json<serde_json::Value>> {
    let delta = runtime
        .execution
        .close_position(&req.market_ticker, req.side, req.exit_price)
        .await?;
    Ok(Json(serde_json::json!({ "realized_pnl": delta })))
}

#[derive(Deserialize)]
struct SettlePositionRequest {
    market_ticker: String,
    side: OrderSide,
    outcome_true: bool,
}

async fn settle_position(
    State(runtime): State<Arc<Runtime>>,
    Json(req): Json<SettlePositionRequest>,
) -> Result<Json<serde_json::Value>> {
    let delta = runtime
        .execution
        .settle_position(&req.market_ticker, req.side, req.outcome_true)
        .await?;
    Ok(Json(serde_json::json!({ "realized_pnl": delta })))
}

pub fn router() -> Router<Arc<Runtime>> {
    Router::new()
        .route("/execution/stats", get(stats))
        .route("/execution/portfolio", get(portfolio))
        .route("/execution/positions", get(positions))
        .route("/execution/positions/open", get(open_positions))
        .route("/execution/orders", get(orders))
        .route("/execution/refresh-pnl", post(refresh_pnl))
        .route("/execution/execute-signal", post(execute_signal))
        .route("/execution/execute-strategy/:game_id", post(execute_strategy))
        .route("/execution/close", post(close_position))
        .route("/execution/settle", post(settle_position))
}
