//! EV Multi-Book: requires several independent sportsbooks to agree that a
//! side carries positive expected value before trading it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{GameState, MarketState, MarketType, OddsQuote, OrderSide, TradeSignal};
use crate::odds::{american_to_implied, ev};
use crate::ticker::team_suffix;

use super::{Strategy, StrategyState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvMultibookConfig {
    pub min_ev_percent: Decimal,
    pub min_sportsbooks_agreeing: usize,
    pub position_size: u32,
    pub cooldown_minutes: i64,
    pub preferred_books: Vec<String>,
    pub market_types: Vec<MarketType>,
    pub exclude_books: Vec<String>,
}

impl Default for EvMultibookConfig {
    fn default() -> Self {
        Self {
            min_ev_percent: dec!(3),
            min_sportsbooks_agreeing: 2,
            position_size: 10,
            cooldown_minutes: 5,
            preferred_books: vec![],
            market_types: vec![MarketType::Moneyline],
            exclude_books: vec![],
        }
    }
}

pub struct EvMultibookStrategy {
    id: String,
    config: EvMultibookConfig,
    enabled: bool,
    state: StrategyState,
}

impl EvMultibookStrategy {
    pub fn new(id: impl Into<String>, config: EvMultibookConfig) -> Self {
        Self {
            id: id.into(),
            config,
            enabled: false,
            state: StrategyState::default(),
        }
    }

    fn eligible_vendors<'a>(&self, game: &'a GameState) -> Vec<(&'a String, &'a OddsQuote)> {
        game.odds
            .iter()
            .filter(|(vendor, _)| !self.config.exclude_books.contains(*vendor))
            .filter(|(vendor, _)| {
                self.config.preferred_books.is_empty()
                    || self.config.preferred_books.contains(*vendor)
            })
            .collect()
    }

    fn vendor_probability(quote: &OddsQuote, market: &MarketState, game: &GameState) -> Option<Decimal> {
        let is_home_market = team_suffix(&market.ticker).eq_ignore_ascii_case(&game.home_team);
        match market.market_type {
            MarketType::Moneyline => {
                let odds = if is_home_market {
                    quote.moneyline_home?
                } else {
                    quote.moneyline_away?
                };
                Some(american_to_implied(odds))
            }
            MarketType::Spread => {
                let odds = if is_home_market {
                    quote.spread_home_odds?
                } else {
                    quote.spread_away_odds?
                };
                Some(american_to_implied(odds))
            }
            MarketType::Total => Some(american_to_implied(quote.total_over_odds?)),
        }
    }
}

impl Strategy for EvMultibookStrategy {
    fn name(&self) -> &str {
        "EV Multi-Book"
    }

    fn strategy_type(&self) -> &str {
        "ev_multibook"
    }

    fn description(&self) -> &str {
        "Require several sportsbooks to agree a side has positive expected value"
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(EvMultibookConfig::default()).unwrap_or(Value::Null)
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
        let vendors = self.eligible_vendors(snapshot);
        if vendors.is_empty() {
            return vec![];
        }

        let markets: Vec<MarketState> = snapshot
            .markets
            .values()
            .filter(|m| self.config.market_types.contains(&m.market_type))
            .cloned()
            .collect();

        let min_ev = self.config.min_ev_percent / dec!(100);
        let mut signals = Vec::new();

        for market in &markets {
            if !self.state.check_cooldown(&market.ticker, self.config.cooldown_minutes) {
                continue;
            }
            let Some(orderbook) = market.orderbook.as_ref() else {
                continue;
            };

            let mut yes_count = 0usize;
            let mut no_count = 0usize;
            for (_, quote) in &vendors {
                let Some(p) = Self::vendor_probability(quote, market, snapshot) else {
                    continue;
                };
                if let Some(yes_ask) = orderbook.yes_ask {
                    if ev(yes_ask, p, OrderSide::Yes) >= min_ev {
                        yes_count += 1;
                    }
                }
                if let Some(no_ask) = orderbook.no_ask {
                    if ev(no_ask, p, OrderSide::No) >= min_ev {
                        no_count += 1;
                    }
                }
            }

            let (side, agreeing, entry_price) = if yes_count >= no_count && yes_count >= self.config.min_sportsbooks_agreeing {
                (OrderSide::Yes, yes_count, orderbook.yes_ask)
            } else if no_count >= self.config.min_sportsbooks_agreeing {
                (OrderSide::No, no_count, orderbook.no_ask)
            } else {
                continue;
            };
            let Some(entry_price) = entry_price else {
                continue;
            };

            let confidence = (Decimal::from(agreeing as u64) / dec!(5))
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
                format!("{agreeing} sportsbooks agree on positive EV at {entry_price}c"),
                serde_json::json!({
                    "agreeing_books": agreeing,
                    "yes_count": yes_count,
                    "no_count": no_count,
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
    use crate::models::OrderbookState;
    use chrono::Utc;

    fn quote(moneyline_home: i32, moneyline_away: i32) -> OddsQuote {
        OddsQuote {
            moneyline_home: Some(moneyline_home),
            moneyline_away: Some(moneyline_away),
            ..Default::default()
        }
    }

    #[test]
    fn requires_minimum_agreement() {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        let mut market = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        market.orderbook = Some(OrderbookState::new(Some(dec!(30)), Some(dec!(32))));
        game.markets.insert(market.ticker.clone(), market);
        game.odds.insert("book_a".into(), quote(-150, 130));

        let mut strat = EvMultibookStrategy::new("e1", EvMultibookConfig::default());
        strat.enable();
        assert!(strat.evaluate("g1", &game).is_empty());
    }

    #[test]
    fn emits_when_enough_books_agree() {
        let mut game = GameState::new("g1", "EVT", "SAC", "DAL", Utc::now());
        let mut market = MarketState::new("MONEYLINE-26JAN06DALSAC-SAC", MarketType::Moneyline);
        market.orderbook = Some(OrderbookState::new(Some(dec!(30)), Some(dec!(32))));
        game.markets.insert(market.ticker.clone(), market);
        game.odds.insert("book_a".into(), quote(-150, 130));
        game.odds.insert("book_b".into(), quote(-160, 140));

        let mut strat = EvMultibookStrategy::new("e1", EvMultibookConfig::default());
        strat.enable();
        let signals = strat.evaluate("g1", &game);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::Yes);
    }
}
