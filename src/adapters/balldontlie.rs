//! balldontlie.io client: NBA live box scores and multi-vendor odds.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::adapters::{BoxScore, SportsClient, VendorOddsRow};
use crate::error::{EngineError, Result};

pub struct BallDontLieClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl BallDontLieClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(EngineError::from)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .header("Authorization", &self.api_key)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EngineError::AuthFailure(format!("sports provider rejected key on {path}")));
        }
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !resp.status().is_success() {
            return Err(EngineError::UpstreamFailure(format!(
                "sports provider {path} returned {}",
                resp.status()
            )));
        }
        resp.json::<serde_json::Value>().await.map_err(EngineError::from)
    }
}

#[derive(Debug, Deserialize)]
struct LiveBoxScoreRow {
    game: LiveGameId,
    status: String,
    period: Option<u8>,
    time: Option<String>,
    home_team_score: Option<u32>,
    visitor_team_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LiveGameId {
    id: serde_json::Value,
}

fn row_to_box_score(row: LiveBoxScoreRow) -> BoxScore {
    BoxScore {
        external_game_id: row.game.id.to_string(),
        status: row.status,
        period: row.period,
        time_remaining: row.time,
        home_score: row.home_team_score,
        away_score: row.visitor_team_score,
    }
}

#[derive(Debug, Deserialize)]
struct OddsRow {
    vendor: String,
    game_id: serde_json::Value,
    moneyline: Option<MoneylineOdds>,
    spread: Option<SpreadOdds>,
    total: Option<TotalOdds>,
}

#[derive(Debug, Deserialize)]
struct MoneylineOdds {
    home_odds: Option<i32>,
    away_odds: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SpreadOdds {
    home_spread: Option<Decimal>,
    home_odds: Option<i32>,
    away_odds: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TotalOdds {
    total: Option<Decimal>,
    over_odds: Option<i32>,
    under_odds: Option<i32>,
}

#[async_trait]
impl SportsClient for BallDontLieClient {
    async fn get_box_score(&self, external_game_id: &str) -> Result<Option<BoxScore>> {
        let body = self
            .get("/v1/box_scores/live", &[])
            .await?;
        let rows: Vec<LiveBoxScoreRow> = serde_json::from_value(
            body.get("data").cloned().unwrap_or(serde_json::Value::Array(vec![])),
        )
        .unwrap_or_default();
        Ok(rows
            .into_iter()
            .find(|r| r.game.id.to_string() == external_game_id)
            .map(row_to_box_score))
    }

    async fn get_box_scores_live(&self) -> Result<Vec<BoxScore>> {
        let body = self.get("/v1/box_scores/live", &[]).await?;
        let rows: Vec<LiveBoxScoreRow> = serde_json::from_value(
            body.get("data").cloned().unwrap_or(serde_json::Value::Array(vec![])),
        )
        .unwrap_or_default();
        debug!(count = rows.len(), "fetched live box scores");
        Ok(rows.into_iter().map(row_to_box_score).collect())
    }

    async fn get_odds(&self, external_game_id: &str) -> Result<Vec<VendorOddsRow>> {
        let body = self
            .get("/v1/odds", &[("game_ids[]", external_game_id)])
            .await?;
        let rows: Vec<OddsRow> = serde_json::from_value(
            body.get("data").cloned().unwrap_or(serde_json::Value::Array(vec![])),
        )
        .unwrap_or_default();

        Ok(rows
            .into_iter()
            .map(|r| VendorOddsRow {
                vendor: r.vendor,
                external_game_id: r.game_id.to_string(),
                moneyline_home: r.moneyline.as_ref().and_then(|m| m.home_odds),
                moneyline_away: r.moneyline.as_ref().and_then(|m| m.away_odds),
                spread_value: r.spread.as_ref().and_then(|s| s.home_spread),
                spread_home_odds: r.spread.as_ref().and_then(|s| s.home_odds),
                spread_away_odds: r.spread.as_ref().and_then(|s| s.away_odds),
                total_value: r.total.as_ref().and_then(|t| t.total),
                total_over_odds: r.total.as_ref().and_then(|t| t.over_odds),
                total_under_odds: r.total.as_ref().and_then(|t| t.under_odds),
                fetched_at: chrono::Utc::now(),
            })
            .collect())
    }
}
