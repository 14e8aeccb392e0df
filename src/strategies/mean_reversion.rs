//! Live Mean Reversion: fades a price swing away from the pregame line once
//! the game is live, within a band of swing sizes and a time-remaining floor.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{GameState, MarketType, OrderSide, Phase, TradeSignal};

use super::{Strategy, StrategyState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    pub min_reversion_percent: Decimal,
    pub max_reversion_percent: Decimal,
    pub min_time_remaining_pct: Decimal,
    pub position_size: u32,
    pub cooldown_minutes: i64,
    pub only_first_half: bool,
    pub market_types: Vec<MarketType>,
    pub max_score_deficit: u32,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            min_reversion_percent: dec!(15),
            max_reversion_percent: dec!(40),
            min_time_remaining_pct: dec!(25),
            position_size: 10,
            cooldown_minutes: 10,
            only_first_half: true,
            market_types: vec![MarketType::Moneyline],
            max_score_deficit: 20,
        }
    }
}

pub struct MeanReversionStrategy {
    id: String,
    config: MeanReversionConfig,
    enabled: bool,
    state: StrategyState,
    pregame_prices: HashMap<String, HashMap<String, Decimal>>,
    games_seen_live: std::collections::HashSet<String>,
}

impl MeanReversionStrategy {
    pub fn new(id: impl Into<String>, config: MeanReversionConfig) -> Self {
        Self {
            id: id.into(),
            config,
            enabled: false,
            state: StrategyState::default(),
            pregame_prices: HashMap::new(),
            games_seen_live: std::collections::HashSet::new(),
        }
    }

    fn is_game_live(snapshot: &GameState) -> bool {
        if snapshot.phase == Phase::Live {
            return true;
        }
        matches!(snapshot.sports_state.as_ref().and_then(|s| s.period), Some(p) if p > 0)
    }

    fn is_first_half(snapshot: &GameState) -> bool {
        match snapshot.sports_state.as_ref().and_then(|s| s.period) {
            Some(period) => period <= 2,
            None => true,
        }
    }

    fn check_time_remaining(&self, snapshot: &GameState) -> bool {
        let Some(sports) = snapshot.sports_state.as_ref() else {
            return true;
        };
        let period = sports.period.unwrap_or(1).max(1) as u32;
        let periods_remaining = 4u32.saturating_sub(period) + 1;
        let pct_remaining = (Decimal::from(periods_remaining) / dec!(4)) * dec!(100);
        pct_remaining >= self.config.min_time_remaining_pct
    }

    fn check_score_deficit(&self, snapshot: &GameState) -> bool {
        let Some(sports) = snapshot.sports_state.as_ref() else {
            return true;
        };
        match sports.score_differential() {
            Some(diff) => diff.unsigned_abs() <= self.config.max_score_deficit,
            None => true,
        }
    }

    fn store_pregame_prices(&mut self, game_id: &str, snapshot: &GameState) {
        let mut prices = HashMap::new();
        for market in snapshot.markets.values() {
            if let Some(mid) = market.orderbook.as_ref().and_then(|ob| ob.mid_price()) {
                prices.insert(market.ticker.clone(), mid);
            }
        }
        self.pregame_prices.insert(game_id.to_string(), prices);
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "Live Mean Reversion"
    }

    fn strategy_type(&self) -> &str {
        "mean_reversion"
    }

    fn description(&self) -> &str {
        "Fade a live price swing back toward the pregame line"
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(MeanReversionConfig::default()).unwrap_or(Value::Null)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn update_config(&mut self, config: Value) {
        if let Ok(parsed) = serde_json::from_value(config) {
            self.config = parsed;
        }
    }

    fn evaluate(&mut self, game_id: &str, snapshot: &GameState) -> Vec<TradeSignal> {
        if !self.enabled {
            return vec![];
        }

        let is_live = Self::is_game_live(snapshot);

        if is_live && !self.games_seen_live.contains(game_id) {
            self.store_pregame_prices(game_id, snapshot);
            self.games_seen_live.insert(game_id.to_string());
            return vec![];
        }

        if !is_live {
            return vec![];
        }

        let Some(pregame) = self.pregame_prices.get(game_id).cloned() else {
            return vec![];
        };

        if !self.check_time_remaining(snapshot) {
            return vec![];
        }
        if self.config.only_first_half && !Self::is_first_half(snapshot) {
            return vec![];
        }
        if !self.check_score_deficit(snapshot) {
            return vec![];
        }

        let markets: Vec<_> = snapshot
            .markets
            .values()
            .filter(|m| self.config.market_types.contains(&m.market_type))
            .cloned()
            .collect();

        let mut signals = Vec::new();
        for market in &markets {
            if !self.state.check_cooldown(&market.ticker, self.config.cooldown_minutes) {
                continue;
            }
            let Some(orderbook) = market.orderbook.as_ref() else {
                continue;
            };
            let Some(mid) = orderbook.mid_price() else {
                continue;
            };
            let Some(&pregame_price) = pregame.get(&market.ticker) else {
                continue;
            };

            let swing = mid - pregame_price;
            let magnitude = swing.abs();
            if magnitude < self.config.min_reversion_percent || magnitude > self.config.max_reversion_percent {
                continue;
            }

            let (side, entry_price) = if swing < Decimal::ZERO {
                match orderbook.yes_ask {
                    Some(p) => (OrderSide::Yes, p),
                    None => continue,
                }
            } else {
                match orderbook.no_ask {
                    Some(p) => (OrderSide::No, p),
                    None => continue,
                }
            };
            if entry_price <= Decimal::ZERO {
                continue;
            }

            let confidence = (magnitude / self.config.max_reversion_percent)
                .min(Decimal::ONE)
                .to_string()
                .parse::<f64>()
                .unwrap_or(0.0);

            self.state.record_trade(&market.ticker);
            let signal = TradeSignal::new(
                self.id.clone(),
                self.name().to_string(),
                market.ticker.clone(),
                side,
                self.config.position_size,
                confidence,
                format!("live price swung {swing:+.1}c from pregame {pregame_price:.1}c"),
                serde_json::json!({
                    "pregame_price": pregame_price.to_string(),
                    "current_price": mid.to_string(),
                    "swing_percent": magnitude.to_string(),
                }),
            );
            self.state.record_signal(signal.clone());
            signals.push(signal);
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LiveSportsState, MarketState, OrderbookState};
    use chrono::Utc;

    fn game_at_mid(phase: Phase, mid: Option<(Decimal, Decimal)>, period: Option<u8>) -> GameState {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        game.phase = phase;
        let mut market = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        if let Some((bid, ask)) = mid {
            market.orderbook = Some(OrderbookState::new(Some(bid), Some(ask)));
        }
        game.markets.insert(market.ticker.clone(), market);
        if phase == Phase::Live {
            game.sports_state = Some(LiveSportsState {
                status: "in_progress".into(),
                period,
                time_remaining: None,
                home_score: Some(50),
                away_score: Some(48),
                last_updated: Utc::now(),
            });
        }
        game
    }

    #[test]
    fn first_live_observation_snapshots_baseline_without_signal() {
        let game = game_at_mid(Phase::Live, Some((dec!(49), dec!(51))), Some(1));
        let mut strat = MeanReversionStrategy::new("r1", MeanReversionConfig::default());
        strat.enable();
        assert!(strat.evaluate("g1", &game).is_empty());
        assert!(strat.pregame_prices["g1"].contains_key("MONEYLINE-26JAN06DALSAC-SAC"));
    }

    #[test]
    fn emits_fade_signal_on_sufficient_swing_from_first_live_baseline() {
        let mut strat = MeanReversionStrategy::new("r1", MeanReversionConfig::default());
        strat.enable();
        let first_live = game_at_mid(Phase::Live, Some((dec!(49), dec!(51))), Some(1));
        strat.evaluate("g1", &first_live);

        let later_live = game_at_mid(Phase::Live, Some((dec!(34), dec!(36))), Some(1));
        let signals = strat.evaluate("g1", &later_live);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::Yes);
    }

    #[test]
    fn pregame_phase_emits_nothing_and_stores_no_baseline() {
        let game = game_at_mid(Phase::Pregame, Some((dec!(49), dec!(51))), None);
        let mut strat = MeanReversionStrategy::new("r1", MeanReversionConfig::default());
        strat.enable();
        assert!(strat.evaluate("g1", &game).is_empty());
        assert!(!strat.pregame_prices.contains_key("g1"));
    }
}
