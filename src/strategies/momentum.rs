//! Momentum Scalping: trades when the recent price move over a lookback
//! window exceeds a threshold, so long as the book isn't too wide.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{GameState, MarketType, OrderSide, TradeSignal};

use super::{Strategy, StrategyState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub lookback_seconds: i64,
    pub min_price_change_cents: Decimal,
    pub position_size: u32,
    pub cooldown_minutes: i64,
    pub max_spread_cents: Decimal,
    pub market_types: Vec<MarketType>,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback_seconds: 120,
            min_price_change_cents: dec!(5),
            position_size: 10,
            cooldown_minutes: 3,
            max_spread_cents: dec!(3),
            market_types: vec![MarketType::Moneyline, MarketType::Spread, MarketType::Total],
        }
    }
}

pub struct MomentumStrategy {
    id: String,
    config: MomentumConfig,
    enabled: bool,
    state: StrategyState,
}

impl MomentumStrategy {
    pub fn new(id: impl Into<String>, config: MomentumConfig) -> Self {
        Self {
            id: id.into(),
            config,
            enabled: false,
            state: StrategyState::default(),
        }
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        "Momentum Scalping"
    }

    fn strategy_type(&self) -> &str {
        "momentum"
    }

    fn description(&self) -> &str {
        "Trade short-horizon price moves while the spread stays tight"
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(MomentumConfig::default()).unwrap_or(Value::Null)
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
        let markets: Vec<_> = snapshot
            .markets
            .values()
            .filter(|m| self.config.market_types.contains(&m.market_type))
            .cloned()
            .collect();

        let mut signals = Vec::new();
        for market in &markets {
            let Some(orderbook) = market.orderbook.as_ref() else {
                continue;
            };
            let Some(mid) = orderbook.mid_price() else {
                continue;
            };
            self.state.push_price(&market.ticker, mid);

            if !self.state.check_cooldown(&market.ticker, self.config.cooldown_minutes) {
                continue;
            }
            let Some(spread) = orderbook.spread() else {
                continue;
            };
            if spread > self.config.max_spread_cents {
                continue;
            }

            let Some(history) = self.state.price_history.get(&market.ticker) else {
                continue;
            };
            if history.len() < 2 {
                continue;
            }
            let now = Utc::now();
            let target_time = now - Duration::seconds(self.config.lookback_seconds);
            let closest = history
                .iter()
                .min_by_key(|(_, ts)| (*ts - target_time).num_milliseconds().abs());
            let max_diff_ms = (self.config.lookback_seconds * 1000) / 2;
            let Some((reference_price, ts)) = closest else {
                continue;
            };
            if (*ts - target_time).num_milliseconds().abs() > max_diff_ms {
                continue;
            }

            let delta = mid - *reference_price;
            if delta.abs() < self.config.min_price_change_cents {
                continue;
            }

            let (side, entry_price) = if delta > Decimal::ZERO {
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

            let confidence = (delta.abs() / dec!(10))
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
                format!("price moved {delta:+.1}c over {}s", self.config.lookback_seconds),
                serde_json::json!({
                    "reference_price": reference_price.to_string(),
                    "current_mid": mid.to_string(),
                    "delta": delta.to_string(),
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
    use crate::models::{MarketState, OrderbookState};
    use chrono::Utc;

    #[test]
    fn emits_no_signal_when_thin_history() {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        let mut market = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        market.orderbook = Some(OrderbookState::new(Some(dec!(45)), Some(dec!(47))));
        game.markets.insert(market.ticker.clone(), market);

        let mut strat = MomentumStrategy::new("m1", MomentumConfig::default());
        strat.enable();
        assert!(strat.evaluate("g1", &game).is_empty());
    }

    #[test]
    fn emits_no_signal_on_wide_spread() {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        let mut market = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        market.orderbook = Some(OrderbookState::new(Some(dec!(40)), Some(dec!(50))));
        game.markets.insert(market.ticker.clone(), market);

        let mut strat = MomentumStrategy::new("m1", MomentumConfig::default());
        strat.enable();
        assert!(strat.evaluate("g1", &game).is_empty());
    }
}
