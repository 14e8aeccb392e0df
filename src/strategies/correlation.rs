//! Cross-Market Correlation: checks that complementary legs of the same
//! game price consistently, and that a moneyline favorite implies a
//! consistent spread price.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{GameState, MarketState, MarketType, OrderSide, TradeSignal};
use crate::ticker::team_suffix;

use super::{Strategy, StrategyState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub min_discrepancy_percent: Decimal,
    pub complementary_max_sum: Decimal,
    pub complementary_min_sum: Decimal,
    pub position_size: u32,
    pub cooldown_minutes: i64,
    pub check_complementary: bool,
    pub check_moneyline_spread: bool,
    pub prefer_no_on_overvalued: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_discrepancy_percent: dec!(5),
            complementary_max_sum: dec!(105),
            complementary_min_sum: dec!(95),
            position_size: 10,
            cooldown_minutes: 5,
            check_complementary: true,
            check_moneyline_spread: true,
            prefer_no_on_overvalued: true,
        }
    }
}

pub struct CorrelationStrategy {
    id: String,
    config: CorrelationConfig,
    enabled: bool,
    state: StrategyState,
}

impl CorrelationStrategy {
    pub fn new(id: impl Into<String>, config: CorrelationConfig) -> Self {
        Self {
            id: id.into(),
            config,
            enabled: false,
            state: StrategyState::default(),
        }
    }

    fn find_moneyline<'a>(&self, markets: &'a [MarketState], team: &str) -> Option<&'a MarketState> {
        markets.iter().find(|m| {
            m.market_type == MarketType::Moneyline && team_suffix(&m.ticker).eq_ignore_ascii_case(team)
        })
    }

    /// Spread ticker suffixes are `<TEAM><LINE>`, e.g. `DAL7`; split off the
    /// leading alphabetic run to recover the team code.
    fn spread_team(ticker: &str) -> &str {
        let suffix = team_suffix(ticker);
        let split_at = suffix.find(|c: char| c.is_ascii_digit()).unwrap_or(suffix.len());
        &suffix[..split_at]
    }

    fn check_complementary(&mut self, game: &GameState, markets: &[MarketState]) -> Option<TradeSignal> {
        let home = self.find_moneyline(markets, &game.home_team)?;
        let away = self.find_moneyline(markets, &game.away_team)?;
        let home_mid = home.orderbook.as_ref()?.mid_price()?;
        let away_mid = away.orderbook.as_ref()?.mid_price()?;
        let sum = home_mid + away_mid;

        if sum <= self.config.complementary_max_sum {
            return None;
        }
        if !self.config.prefer_no_on_overvalued {
            return None;
        }

        let overvalued = if home_mid > away_mid { home } else { away };
        if !self.state.check_cooldown(&overvalued.ticker, self.config.cooldown_minutes) {
            return None;
        }

        let excess = sum - dec!(100);
        let confidence = (excess / dec!(10))
            .min(Decimal::ONE)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0);

        self.state.record_trade(&overvalued.ticker);
        Some(TradeSignal::new(
            self.id.clone(),
            self.name().to_string(),
            overvalued.ticker.clone(),
            OrderSide::No,
            self.config.position_size,
            confidence,
            format!("complementary legs sum to {sum}c, exceeding {}", self.config.complementary_max_sum),
            serde_json::json!({
                "home_yes_price": home_mid.to_string(),
                "away_yes_price": away_mid.to_string(),
                "total_sum": sum.to_string(),
                "excess_percent": excess.to_string(),
            }),
        ))
    }

    fn check_moneyline_spread(&mut self, game: &GameState, markets: &[MarketState]) -> Option<TradeSignal> {
        let home = self.find_moneyline(markets, &game.home_team)?;
        let away = self.find_moneyline(markets, &game.away_team)?;
        let home_mid = home.orderbook.as_ref()?.mid_price()?;
        let away_mid = away.orderbook.as_ref()?.mid_price()?;

        let (favorite_team, favorite_prob) = if home_mid >= away_mid {
            (&game.home_team, home_mid)
        } else {
            (&game.away_team, away_mid)
        };

        let spread_market = markets.iter().find(|m| {
            m.market_type == MarketType::Spread && Self::spread_team(&m.ticker).eq_ignore_ascii_case(favorite_team)
        })?;
        let spread_mid = spread_market.orderbook.as_ref()?.mid_price()?;

        let expected = dec!(50) + (favorite_prob - dec!(50)) * dec!(0.5);
        let discrepancy = spread_mid - expected;
        if discrepancy.abs() < self.config.min_discrepancy_percent {
            return None;
        }
        if !self.state.check_cooldown(&spread_market.ticker, self.config.cooldown_minutes) {
            return None;
        }

        let (side, entry_price) = if discrepancy > Decimal::ZERO {
            (OrderSide::No, spread_market.orderbook.as_ref()?.no_ask?)
        } else {
            (OrderSide::Yes, spread_market.orderbook.as_ref()?.yes_ask?)
        };

        let confidence = (discrepancy.abs() / dec!(10))
            .min(Decimal::ONE)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0);

        self.state.record_trade(&spread_market.ticker);
        Some(TradeSignal::new(
            self.id.clone(),
            self.name().to_string(),
            spread_market.ticker.clone(),
            side,
            self.config.position_size,
            confidence,
            format!("spread price diverges {discrepancy:+.1}c from moneyline-implied value"),
            serde_json::json!({
                "favorite_prob": favorite_prob.to_string(),
                "expected_spread_prob": expected.to_string(),
                "discrepancy": discrepancy.to_string(),
                "entry_price": entry_price.to_string(),
            }),
        ))
    }
}

impl Strategy for CorrelationStrategy {
    fn name(&self) -> &str {
        "Cross-Market Correlation"
    }

    fn strategy_type(&self) -> &str {
        "correlation"
    }

    fn description(&self) -> &str {
        "Check that complementary legs and moneyline/spread markets price consistently"
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(CorrelationConfig::default()).unwrap_or(Value::Null)
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

    fn evaluate(&mut self, _game_id: &str, snapshot: &GameState) -> Vec<TradeSignal> {
        if !self.enabled {
            return vec![];
        }
        let markets: Vec<MarketState> = snapshot.markets.values().cloned().collect();
        let mut signals = Vec::new();

        if self.config.check_complementary {
            if let Some(signal) = self.check_complementary(snapshot, &markets) {
                self.state.record_signal(signal.clone());
                signals.push(signal);
            }
        }
        if self.config.check_moneyline_spread {
            if let Some(signal) = self.check_moneyline_spread(snapshot, &markets) {
                self.state.record_signal(signal.clone());
                signals.push(signal);
            }
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderbookState;
    use chrono::Utc;

    #[test]
    fn flags_overpriced_complementary_legs() {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        let mut home = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        home.orderbook = Some(OrderbookState::new(Some(dec!(58)), Some(dec!(60))));
        let mut away = MarketState::new("MONEYLINE-26JAN06DALSAC-DAL", MarketType::Moneyline);
        away.orderbook = Some(OrderbookState::new(Some(dec!(48)), Some(dec!(50))));
        game.markets.insert(home.ticker.clone(), home);
        game.markets.insert(away.ticker.clone(), away);

        let mut strat = CorrelationStrategy::new("c1", CorrelationConfig::default());
        strat.enable();
        let signals = strat.evaluate("g1", &game);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::No);
        assert_eq!(signals[0].market_ticker, "MONEYLINE-26JAN06DALSAC-SAC");
    }

    #[test]
    fn no_signal_when_legs_sum_near_100() {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        let mut home = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        home.orderbook = Some(OrderbookState::new(Some(dec!(52)), Some(dec!(54))));
        let mut away = MarketState::new("MONEYLINE-26JAN06DALSAC-DAL", MarketType::Moneyline);
        away.orderbook = Some(OrderbookState::new(Some(dec!(45)), Some(dec!(47))));
        game.markets.insert(home.ticker.clone(), home);
        game.markets.insert(away.ticker.clone(), away);

        let mut strat = CorrelationStrategy::new("c1", CorrelationConfig::default());
        strat.enable();
        assert!(strat.evaluate("g1", &game).is_empty());
    }
}
