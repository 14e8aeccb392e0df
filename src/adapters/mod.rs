//! Wire adapters to the upstream exchange and sports/odds providers.
//!
//! These are thin, interface-first clients: the Aggregator depends on the
//! [`ExchangeClient`] / [`SportsClient`] traits, not on these concrete
//! types, so tests can substitute in-memory fakes.

pub mod balldontlie;
pub mod kalshi;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopOfBook {
    pub ticker: String,
    pub yes_bid: Option<Decimal>,
    pub yes_ask: Option<Decimal>,
    pub yes_bid_size: Option<u32>,
    pub yes_ask_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxScore {
    pub external_game_id: String,
    pub status: String,
    pub period: Option<u8>,
    pub time_remaining: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorOddsRow {
    pub vendor: String,
    pub external_game_id: String,
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub spread_value: Option<Decimal>,
    pub spread_home_odds: Option<i32>,
    pub spread_away_odds: Option<i32>,
    pub total_value: Option<Decimal>,
    pub total_over_odds: Option<i32>,
    pub total_under_odds: Option<i32>,
    pub fetched_at: DateTime<Utc>,
}

/// The prediction-market exchange's REST surface, as seen by the Aggregator.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn get_market_orderbook(&self, ticker: &str) -> Result<TopOfBook>;
    async fn get_market(&self, ticker: &str) -> Result<serde_json::Value>;
    async fn exchange_status(&self) -> Result<bool>;
}

/// The sports/odds provider's REST surface, as seen by the Aggregator.
#[async_trait]
pub trait SportsClient: Send + Sync {
    async fn get_box_score(&self, external_game_id: &str) -> Result<Option<BoxScore>>;
    async fn get_box_scores_live(&self) -> Result<Vec<BoxScore>>;
    async fn get_odds(&self, external_game_id: &str) -> Result<Vec<VendorOddsRow>>;
}
