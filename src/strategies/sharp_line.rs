//! Sharp-Line Detection: trades when the exchange price diverges from the
//! sportsbook consensus by more than a threshold.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::{GameState, MarketState, MarketType, OrderSide, TradeSignal};
use crate::odds::{ev, kelly};
use crate::ticker::team_suffix;

use super::{Strategy, StrategyState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpLineConfig {
    pub threshold_percent: Decimal,
    pub min_sample_sportsbooks: usize,
    pub position_size: u32,
    pub cooldown_minutes: i64,
    pub min_ev_percent: Decimal,
    pub market_types: Vec<MarketType>,
    pub use_kelly_sizing: bool,
    pub kelly_fraction: Decimal,
}

impl Default for SharpLineConfig {
    fn default() -> Self {
        Self {
            threshold_percent: dec!(5),
            min_sample_sportsbooks: 3,
            position_size: 10,
            cooldown_minutes: 5,
            min_ev_percent: dec!(2),
            market_types: vec![MarketType::Moneyline],
            use_kelly_sizing: false,
            kelly_fraction: dec!(0.25),
        }
    }
}

pub struct SharpLineStrategy {
    id: String,
    config: SharpLineConfig,
    enabled: bool,
    state: StrategyState,
}

impl SharpLineStrategy {
    pub fn new(id: impl Into<String>, config: SharpLineConfig) -> Self {
        Self {
            id: id.into(),
            config,
            enabled: false,
            state: StrategyState::default(),
        }
    }

    fn consensus_probability(&self, game: &GameState, market: &MarketState) -> Option<Decimal> {
        let consensus = game.consensus.as_ref()?;
        match market.market_type {
            MarketType::Moneyline => {
                let suffix = team_suffix(&market.ticker);
                if suffix.eq_ignore_ascii_case(&game.home_team) {
                    Some(consensus.home_win_probability)
                } else {
                    Some(consensus.away_win_probability)
                }
            }
            MarketType::Spread => consensus.spread_home_probability,
            MarketType::Total => consensus.over_probability,
        }
    }

    fn evaluate_market(&mut self, game: &GameState, market: &MarketState) -> Option<TradeSignal> {
        if !self.config.market_types.contains(&market.market_type) {
            return None;
        }
        if !self.state.check_cooldown(&market.ticker, self.config.cooldown_minutes) {
            return None;
        }
        let orderbook = market.orderbook.as_ref()?;
        let mid = orderbook.mid_price().filter(|m| *m > Decimal::ZERO)?;
        let kalshi_prob = mid / dec!(100);
        let consensus_prob = self.consensus_probability(game, market)?;

        let divergence = consensus_prob - kalshi_prob;
        let divergence_percent = divergence.abs() * dec!(100);
        if divergence_percent < self.config.threshold_percent {
            return None;
        }

        let (side, entry_price) = if divergence > Decimal::ZERO {
            (OrderSide::Yes, orderbook.yes_ask?)
        } else {
            (OrderSide::No, orderbook.no_ask?)
        };
        if entry_price <= Decimal::ZERO {
            return None;
        }

        let signal_ev = ev(entry_price, consensus_prob, side);
        let min_ev = self.config.min_ev_percent / dec!(100);
        if signal_ev < min_ev {
            debug!(ticker = %market.ticker, "sharp line EV below minimum");
            return None;
        }

        let quantity = if self.config.use_kelly_sizing {
            let f = kelly(entry_price, consensus_prob, side, self.config.kelly_fraction);
            let scaled = (Decimal::from(self.config.position_size) * f * dec!(4))
                .round()
                .to_string()
                .parse::<i64>()
                .unwrap_or(1)
                .max(1) as u32;
            scaled
        } else {
            self.config.position_size
        };

        let confidence = (divergence_percent / dec!(10))
            .min(Decimal::ONE)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0);

        self.state.record_trade(&market.ticker);

        Some(TradeSignal::new(
            self.id.clone(),
            self.name().to_string(),
            market.ticker.clone(),
            side,
            quantity,
            confidence,
            format!(
                "exchange diverges {divergence_percent:.1}% from consensus; ev={signal_ev:.3}"
            ),
            serde_json::json!({
                "kalshi_prob": kalshi_prob.to_string(),
                "consensus_prob": consensus_prob.to_string(),
                "divergence_percent": divergence_percent.to_string(),
                "expected_value": signal_ev.to_string(),
            }),
        ))
    }
}

impl Strategy for SharpLineStrategy {
    fn name(&self) -> &str {
        "Sharp Line Detection"
    }

    fn strategy_type(&self) -> &str {
        "sharp_line"
    }

    fn description(&self) -> &str {
        "Compare exchange prices to sportsbook consensus and trade on divergences"
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(SharpLineConfig::default()).unwrap_or(Value::Null)
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
        let Some(consensus) = snapshot.consensus.as_ref() else {
            return vec![];
        };
        if consensus.num_sportsbooks < self.config.min_sample_sportsbooks {
            return vec![];
        }

        let markets: Vec<MarketState> = snapshot.markets.values().cloned().collect();
        let mut signals = Vec::new();
        for market in &markets {
            if let Some(signal) = self.evaluate_market(snapshot, market) {
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
    use crate::models::{ConsensusOdds, OrderbookState};
    use chrono::Utc;

    fn game_with_market(mid_yes_bid: Decimal, mid_yes_ask: Decimal, home_prob: Decimal) -> GameState {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        let mut market = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        market.orderbook = Some(OrderbookState::new(Some(mid_yes_bid), Some(mid_yes_ask)));
        game.markets.insert(market.ticker.clone(), market);
        game.consensus = Some(ConsensusOdds {
            num_sportsbooks: 3,
            home_win_probability: home_prob,
            away_win_probability: Decimal::ONE - home_prob,
            spread_line: None,
            spread_home_probability: None,
            total_line: None,
            over_probability: None,
            last_updated: Utc::now(),
        });
        game
    }

    #[test]
    fn emits_yes_signal_on_scenario_1() {
        let game = game_with_market(dec!(44), dec!(46), dec!(0.525));
        let mut strat = SharpLineStrategy::new("s1", SharpLineConfig::default());
        strat.enable();
        let signals = strat.evaluate("g1", &game);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::Yes);
        assert_eq!(signals[0].quantity, 10);
        assert!((signals[0].confidence - 0.75).abs() < 0.01);
    }

    #[test]
    fn no_signal_below_threshold() {
        let game = game_with_market(dec!(49), dec!(51), dec!(0.51));
        let mut strat = SharpLineStrategy::new("s1", SharpLineConfig::default());
        strat.enable();
        assert!(strat.evaluate("g1", &game).is_empty());
    }

    #[test]
    fn disabled_strategy_emits_nothing() {
        let game = game_with_market(dec!(44), dec!(46), dec!(0.525));
        let mut strat = SharpLineStrategy::new("s1", SharpLineConfig::default());
        assert!(strat.evaluate("g1", &game).is_empty());
    }
}
