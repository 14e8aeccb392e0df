//! `GameState` and its children: the aggregator's authoritative aggregate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scheduled,
    Pregame,
    Live,
    Halftime,
    Finished,
    Cancelled,
}

impl Phase {
    /// Maps an upstream status string to a `Phase` per the status table.
    /// Unknown strings fall back to `Scheduled`.
    pub fn from_status(status: &str) -> Self {
        let normalized = status.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "scheduled" => Phase::Scheduled,
            "halftime" => Phase::Halftime,
            "final" | "finished" => Phase::Finished,
            "cancelled" | "postponed" => Phase::Cancelled,
            "in_progress" | "live" => Phase::Live,
            other if other.ends_with("qtr") || other.ends_with("quarter") => Phase::Live,
            _ => Phase::Scheduled,
        }
    }

    pub fn is_active_for_polling(self) -> bool {
        matches!(self, Phase::Live | Phase::Halftime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
}

/// Top-of-book quote for one binary contract. Deep levels (beyond top of
/// book) are populated only by the websocket snapshot/delta path — a REST
/// refresh must never assume they are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookState {
    pub yes_bid: Option<Decimal>,
    pub yes_ask: Option<Decimal>,
    pub no_bid: Option<Decimal>,
    pub no_ask: Option<Decimal>,
    pub yes_bid_size: Option<u32>,
    pub yes_ask_size: Option<u32>,
    pub last_updated: DateTime<Utc>,
}

impl OrderbookState {
    pub fn new(yes_bid: Option<Decimal>, yes_ask: Option<Decimal>) -> Self {
        let no_bid = yes_ask.map(|a| Decimal::from(100) - a);
        let no_ask = yes_bid.map(|b| Decimal::from(100) - b);
        Self {
            yes_bid,
            yes_ask,
            no_bid,
            no_ask,
            yes_bid_size: None,
            yes_ask_size: None,
            last_updated: Utc::now(),
        }
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.yes_bid, self.yes_ask) {
            (Some(b), Some(a)) => Some((b + a) / Decimal::from(2)),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.yes_bid, self.yes_ask) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub ticker: String,
    pub market_type: MarketType,
    pub strike_value: Option<Decimal>,
    pub side_tag: Option<String>,
    pub orderbook: Option<OrderbookState>,
}

impl MarketState {
    pub fn new(ticker: impl Into<String>, market_type: MarketType) -> Self {
        Self {
            ticker: ticker.into(),
            market_type,
            strike_value: None,
            side_tag: None,
            orderbook: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSportsState {
    pub status: String,
    pub period: Option<u8>,
    pub time_remaining: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub last_updated: DateTime<Utc>,
}

impl LiveSportsState {
    pub fn total_score(&self) -> Option<u32> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => Some(h + a),
            _ => None,
        }
    }

    pub fn score_differential(&self) -> Option<i32> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => Some(h as i32 - a as i32),
            _ => None,
        }
    }

    /// Estimated minutes elapsed assuming 12-minute NBA periods.
    pub fn minutes_elapsed(&self) -> Option<f64> {
        let period = self.period?;
        if period == 0 {
            return Some(0.0);
        }
        let completed_periods = (period - 1) as f64;
        let remaining_in_period = self
            .time_remaining
            .as_deref()
            .and_then(parse_clock_minutes)
            .unwrap_or(0.0);
        Some(completed_periods * 12.0 + (12.0 - remaining_in_period))
    }
}

fn parse_clock_minutes(clock: &str) -> Option<f64> {
    let mut parts = clock.split(':');
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(minutes + seconds / 60.0)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OddsQuote {
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub spread_value: Option<Decimal>,
    pub spread_home_odds: Option<i32>,
    pub spread_away_odds: Option<i32>,
    pub total_value: Option<Decimal>,
    pub total_over_odds: Option<i32>,
    pub total_under_odds: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusOdds {
    pub num_sportsbooks: usize,
    pub home_win_probability: Decimal,
    pub away_win_probability: Decimal,
    pub spread_line: Option<Decimal>,
    pub spread_home_probability: Option<Decimal>,
    pub total_line: Option<Decimal>,
    pub over_probability: Option<Decimal>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    OrderbookUpdate,
    SportsUpdate,
    OddsUpdate,
    StateChange,
    GameLoaded,
    GameUnloaded,
}

/// Authoritative per-game aggregate, owned exclusively by the Aggregator.
/// Strategies and the HTTP layer only ever see a cloned read-only snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    pub event_ticker: String,
    pub external_sports_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_start: DateTime<Utc>,
    pub phase: Phase,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
    pub markets: HashMap<String, MarketState>,
    pub sports_state: Option<LiveSportsState>,
    pub odds: HashMap<String, OddsQuote>,
    pub consensus: Option<ConsensusOdds>,
    pub implied_probabilities: HashMap<String, Decimal>,
}

impl GameState {
    pub fn new(
        game_id: impl Into<String>,
        event_ticker: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        scheduled_start: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            event_ticker: event_ticker.into(),
            external_sports_id: None,
            home_team: home_team.into(),
            away_team: away_team.into(),
            scheduled_start,
            phase: Phase::Scheduled,
            is_active: false,
            last_updated: Utc::now(),
            markets: HashMap::new(),
            sports_state: None,
            odds: HashMap::new(),
            consensus: None,
            implied_probabilities: HashMap::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
            || self
                .sports_state
                .as_ref()
                .and_then(|s| s.period)
                .map(|p| p > 0)
                .unwrap_or(false)
    }
}
