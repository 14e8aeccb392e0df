//! Strategy admin: load/unload, enable/disable, config updates, and
//! on-demand evaluation.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::models::TradeSignal;
use crate::strategies::{create_strategy, engine::StrategyInfo};
use crate::Runtime;

#[derive(Debug, Deserialize)]
pub struct LoadStrategyRequest {
    pub strategy_type: String,
    pub id: Option<String>,
    pub config: Option<Value>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Serialize)]
struct LoadedBody {
    id: String,
}

async fn list_strategy_types() -> Json<Vec<&'static str>> {
    Json(vec![
        "sharp_line",
        "momentum",
        "ev_multibook",
        "mean_reversion",
        "correlation",
    ])
}

async fn load_strategy(
    State(runtime): State<Arc<Runtime>>,
    Json(req): Json<LoadStrategyRequest>,
) -> Result<Json<LoadedBody>> {
    let id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut strategy = create_strategy(&req.strategy_type, &id, req.config)?;
    if req.enabled {
        strategy.enable();
    }
    runtime
        .strategies
        .load_strategy(id.clone(), &req.strategy_type, strategy);
    Ok(Json(LoadedBody { id }))
}

async fn unload_strategy(State(runtime): State<Arc<Runtime>>, Path(id): Path<String>) -> Json<serde_json::Value> {
    let unloaded = runtime.strategies.unload_strategy(&id);
    Json(serde_json::json!({ "unloaded": unloaded }))
}

async fn list_strategies(State(runtime): State<Arc<Runtime>>) -> Json<Vec<StrategyInfo>> {
    Json(runtime.strategies.get_all_strategies())
}

async fn get_strategy(State(runtime): State<Arc<Runtime>>, Path(id): Path<String>) -> Result<Json<StrategyInfo>> {
    runtime
        .strategies
        .get_strategy(&id)
        .map(Json)
        .ok_or_else(|| crate::error::EngineError::NotFound(format!("strategy {id}")))
}

async fn enable_strategy(State(runtime): State<Arc<Runtime>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
    runtime.strategies.enable_strategy(&id)?;
    Ok(Json(serde_json::json!({ "enabled": true })))
}

async fn disable_strategy(State(runtime): State<Arc<Runtime>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
    runtime.strategies.disable_strategy(&id)?;
    Ok(Json(serde_json::json!({ "enabled": false })))
}

async fn update_config(
    State(runtime): State<Arc<Runtime>>,
    Path(id): Path<String>,
    Json(config): Json<Value>,
) -> Result<Json<serde_json::Value>> {
    runtime.strategies.update_strategy_config(&id, config)?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn evaluate(State(runtime): State<Arc<Runtime>>, Path(game_id): Path<String>) -> Json<Vec<TradeSignal>> {
    Json(runtime.strategies.evaluate_game(&game_id))
}

async fn evaluate_all(State(runtime): State<Arc<Runtime>>) -> Json<Vec<(String, TradeSignal)>> {
    Json(runtime.strategies.evaluate_all_games())
}

pub fn router() -> Router<Arc<Runtime>> {
    Router::new()
        .route("/strategies/types", get(list_strategy_types))
        .route("/strategies", get(list_strategies).post(load_strategy))
        .route("/strategies/:id", get(get_strategy).delete(unload_strategy))
        .route("/strategies/:id/enable", post(enable_strategy))
        .route("/strategies/:id/disable", post(disable_strategy))
        .route("/strategies/:id/config", post(update_config))
        .route("/strategies/evaluate/:game_id", post(evaluate))
        .route("/strategies/evaluate-all", post(evaluate_all))
}
