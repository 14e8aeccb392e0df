//! Strategy Engine: pluggable decision functions evaluated on a timer over
//! shared game state.

pub mod correlation;
pub mod engine;
pub mod ev_multibook;
pub mod mean_reversion;
pub mod momentum;
pub mod sharp_line;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::models::{GameState, TradeSignal};

const MAX_SIGNAL_HISTORY: usize = 100;
const MAX_PRICE_HISTORY: usize = 100;

/// Known strategy type names, matched against the admin `load_strategy`
/// request to pick a concrete implementation.
pub fn create_strategy(strategy_type: &str, id: &str, config: Option<Value>) -> Result<Box<dyn Strategy>> {
    macro_rules! build {
        ($module:ident, $config_ty:ty, $strategy_ty:ident) => {{
            let cfg: $config_ty = match config {
                Some(v) => serde_json::from_value(v)
                    .map_err(|e| EngineError::BadInput(format!("invalid config: {e}")))?,
                None => <$config_ty>::default(),
            };
            Box::new($module::$strategy_ty::new(id, cfg)) as Box<dyn Strategy>
        }};
    }

    Ok(match strategy_type {
        "sharp_line" => build!(sharp_line, sharp_line::SharpLineConfig, SharpLineStrategy),
        "momentum" => build!(momentum, momentum::MomentumConfig, MomentumStrategy),
        "ev_multibook" => build!(ev_multibook, ev_multibook::EvMultibookConfig, EvMultibookStrategy),
        "mean_reversion" => build!(mean_reversion, mean_reversion::MeanReversionConfig, MeanReversionStrategy),
        "correlation" => build!(correlation, correlation::CorrelationConfig, CorrelationStrategy),
        other => return Err(EngineError::BadInput(format!("unknown strategy type: {other}"))),
    })
}

/// Shared capability set every concrete strategy implements. Strategies are
/// pure functions of the snapshot plus their own private history; they must
/// never mutate `GameState`.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn strategy_type(&self) -> &str;
    fn description(&self) -> &str;
    fn default_config(&self) -> Value;
    fn is_enabled(&self) -> bool;
    fn enable(&mut self);
    fn disable(&mut self);
    fn update_config(&mut self, config: Value);
    fn evaluate(&mut self, game_id: &str, snapshot: &GameState) -> Vec<TradeSignal>;
}

/// Shared cooldown + bounded-history bookkeeping, composed into each
/// concrete strategy rather than inherited.
#[derive(Default)]
pub struct StrategyState {
    last_trade_at: HashMap<String, DateTime<Utc>>,
    pub signal_history: Vec<TradeSignal>,
    pub price_history: HashMap<String, Vec<(rust_decimal::Decimal, DateTime<Utc>)>>,
}

impl StrategyState {
    pub fn check_cooldown(&self, market_ticker: &str, cooldown_minutes: i64) -> bool {
        match self.last_trade_at.get(market_ticker) {
            Some(last) => Utc::now() - *last >= Duration::minutes(cooldown_minutes),
            None => true,
        }
    }

    pub fn record_trade(&mut self, market_ticker: &str) {
        self.last_trade_at
            .insert(market_ticker.to_string(), Utc::now());
    }

    pub fn record_signal(&mut self, signal: TradeSignal) {
        self.signal_history.push(signal);
        if self.signal_history.len() > MAX_SIGNAL_HISTORY {
            let excess = self.signal_history.len() - MAX_SIGNAL_HISTORY;
            self.signal_history.drain(0..excess);
        }
    }

    pub fn push_price(&mut self, ticker: &str, price: rust_decimal::Decimal) {
        let history = self.price_history.entry(ticker.to_string()).or_default();
        history.push((price, Utc::now()));
        if history.len() > MAX_PRICE_HISTORY {
            let excess = history.len() - MAX_PRICE_HISTORY;
            history.drain(0..excess);
        }
    }
}

/// Registry keyed by strategy id. `load` is idempotent per type: loading a
/// second instance of a type first unloads the previous one, so identical
/// strategies never double-fire.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Box<dyn Strategy>>,
    type_to_id: HashMap<String, String>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, id: String, strategy_type: &str, strategy: Box<dyn Strategy>) {
        if let Some(previous_id) = self.type_to_id.get(strategy_type).cloned() {
            self.strategies.remove(&previous_id);
        }
        self.type_to_id
            .insert(strategy_type.to_string(), id.clone());
        self.strategies.insert(id, strategy);
    }

    pub fn unload(&mut self, id: &str) -> bool {
        if let Some(s) = self.strategies.remove(id) {
            self.type_to_id.remove(s.strategy_type());
            true
        } else {
            false
        }
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Box<dyn Strategy>> {
        self.strategies.get_mut(id)
    }

    pub fn get(&self, id: &str) -> Option<&Box<dyn Strategy>> {
        self.strategies.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = (&String, &mut Box<dyn Strategy>)> {
        self.strategies.iter_mut()
    }
}
