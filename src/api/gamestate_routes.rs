//! Aggregator admin: on-demand refresh of a loaded game's orderbook,
//! sports, and odds state outside the regular poll cadence.

use std::sync::Arc;

use axum::{extract::{Path, State}, routing::post, Json, Router};

use crate::error::Result;
use crate::Runtime;

async fn refresh_game(State(runtime): State<Arc<Runtime>>, Path(game_id): Path<String>) -> Result<Json<serde_json::Value>> {
    runtime.aggregator.refresh_game(&game_id).await?;
    Ok(Json(serde_json::json!({ "refreshed": game_id })))
}

pub fn router() -> Router<Arc<Runtime>> {
    Router::new().route("/games/:game_id/refresh", post(refresh_game))
}
