//! Games admin: load a game (with its market descriptors) into the
//! aggregator, list loaded games, and unload them.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregator::{GameDescriptor, MarketDescriptor};
use crate::error::{EngineError, Result};
use crate::models::{GameState, MarketType};
use crate::Runtime;

#[derive(Debug, Deserialize)]
pub struct MarketDescriptorBody {
    pub ticker: String,
    pub market_type: MarketType,
    pub strike_value: Option<Decimal>,
    pub side_tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoadGameRequest {
    pub game_id: String,
    pub event_ticker: String,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_start: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: String,
    pub external_sports_id: Option<String>,
    #[serde(default)]
    pub markets: Vec<MarketDescriptorBody>,
}

fn default_status() -> String {
    "scheduled".to_string()
}

#[derive(Serialize)]
struct GameSummary {
    game_id: String,
    event_ticker: String,
    home_team: String,
    away_team: String,
    phase: String,
}

async fn load_game(
    State(runtime): State<Arc<Runtime>>,
    Json(req): Json<LoadGameRequest>,
) -> Result<Json<GameState>> {
    let descriptor = GameDescriptor {
        game_id: req.game_id,
        event_ticker: req.event_ticker,
        home_team: req.home_team,
        away_team: req.away_team,
        scheduled_start: req.scheduled_start,
        status: req.status,
        external_sports_id: req.external_sports_id,
        markets: req
            .markets
            .into_iter()
            .map(|m| MarketDescriptor {
                ticker: m.ticker,
                market_type: m.market_type,
                strike_value: m.strike_value,
                side_tag: m.side_tag,
            })
            .collect(),
    };
    let state = runtime.aggregator.load_game(descriptor).await?;
    Ok(Json(state))
}

async fn list_games(State(runtime): State<Arc<Runtime>>) -> Json<Vec<GameSummary>> {
    let games = runtime.aggregator.get_all_game_states();
    let summaries = games
        .into_values()
        .map(|g| GameSummary {
            game_id: g.game_id,
            event_ticker: g.event_ticker,
            home_team: g.home_team,
            away_team: g.away_team,
            phase: format!("{:?}", g.phase),
        })
        .collect();
    Json(summaries)
}

async fn get_game(State(runtime): State<Arc<Runtime>>, Path(game_id): Path<String>) -> Result<Json<GameState>> {
    runtime
        .aggregator
        .get_game_state(&game_id)
        .map(Json)
        .ok_or_else(|| EngineError::NotFound(format!("game {game_id}")))
}

async fn delete_game(State(runtime): State<Arc<Runtime>>, Path(game_id): Path<String>) -> Result<Json<serde_json::Value>> {
    if runtime.aggregator.unload_game(&game_id) {
        Ok(Json(serde_json::json!({ "unloaded": true })))
    } else {
        Err(EngineError::NotFound(format!("game {game_id}")))
    }
}

pub fn router() -> Router<Arc<Runtime>> {
    Router::new()
        .route("/games", get(list_games).post(load_game))
        .route("/games/:game_id", get(get_game).delete(delete_game))
}
