//! Execution Engine: simulates fills against top-of-book, tracks positions,
//! and feeds realized P&L back into the risk manager.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::error::{EngineError, Result};
use crate::models::{Order, OrderSide, Position, TradeSignal};
use crate::risk::RiskManager;
use crate::store::Store;

pub type ExecutionCallback = Arc<dyn Fn(&Order, &Position) + Send + Sync>;

const MAX_ORDERS_PER_DAY_LOCAL: u32 = 200;
const MAX_CONTRACTS_PER_MARKET_LOCAL: u32 = 500;

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub open_positions: usize,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub total_exposure: Decimal,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ExecutionStats {
    pub orders_placed: u64,
    pub orders_filled: u64,
    pub orders_rejected: u64,
    pub positions_closed: u64,
    pub positions_settled: u64,
}

struct Counters {
    orders_today: u32,
    today: NaiveDate,
}

pub struct ExecutionEngine {
    aggregator: Arc<Aggregator>,
    risk: Arc<RiskManager>,
    store: Arc<dyn Store>,
    positions: RwLock<HashMap<(String, OrderSide), Position>>,
    orders: RwLock<Vec<Order>>,
    counters: RwLock<Counters>,
    stats: RwLock<ExecutionStats>,
    callbacks: RwLock<Vec<ExecutionCallback>>,
}

impl ExecutionEngine {
    pub fn new(aggregator: Arc<Aggregator>, risk: Arc<RiskManager>, store: Arc<dyn Store>) -> Self {
        Self {
            aggregator,
            risk,
            store,
            positions: RwLock::new(HashMap::new()),
            orders: RwLock::new(Vec::new()),
            counters: RwLock::new(Counters {
                orders_today: 0,
                today: Utc::now().date_naive(),
            }),
            stats: RwLock::new(ExecutionStats::default()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn add_execution_callback(&self, callback: ExecutionCallback) {
        self.callbacks.write().push(callback);
    }

    fn roll_daily_counter(&self) {
        let mut counters = self.counters.write();
        let today = Utc::now().date_naive();
        if today != counters.today {
            counters.today = today;
            counters.orders_today = 0;
        }
    }

    fn validate_local(&self, order: &Order) -> Result<()> {
        self.roll_daily_counter();
        let counters = self.counters.read();
        if counters.orders_today >= MAX_ORDERS_PER_DAY_LOCAL {
            return Err(EngineError::Validation(format!(
                "daily order cap of {MAX_ORDERS_PER_DAY_LOCAL} reached"
            )));
        }
        drop(counters);

        let positions = self.positions.read();
        let existing = positions
            .get(&(order.market_ticker.clone(), order.side))
            .map(|p| p.quantity)
            .unwrap_or(0);
        if existing + order.quantity > MAX_CONTRACTS_PER_MARKET_LOCAL {
            return Err(EngineError::Validation(format!(
                "order would push {} past the per-market contract cap",
                order.market_ticker
            )));
        }
        drop(positions);

        if self.aggregator.get_game_state(&order.game_id).is_none() {
            return Err(EngineError::NotFound(format!("game {} not loaded", order.game_id)));
        }
        Ok(())
    }

    fn discover_price(&self, game_id: &str, market_ticker: &str, side: OrderSide) -> Result<Decimal> {
        let game = self
            .aggregator
            .get_game_state(game_id)
            .ok_or_else(|| EngineError::NotFound(format!("game {game_id}")))?;
        let market = game
            .markets
            .get(market_ticker)
            .ok_or_else(|| EngineError::NotFound(format!("market {market_ticker}")))?;
        let orderbook = market
            .orderbook
            .as_ref()
            .ok_or_else(|| EngineError::UpstreamFailure(format!("no orderbook for {market_ticker}")))?;
        let price = match side {
            OrderSide::Yes => orderbook.yes_ask,
            OrderSide::No => orderbook.no_ask,
        };
        price.ok_or_else(|| EngineError::UpstreamFailure(format!("no ask on {market_ticker}")))
    }

    /// Construct, risk-check, locally validate, price, and fill an order
    /// from a strategy signal, updating the matching position.
    pub async fn execute_signal(&self, signal: &TradeSignal, game_id: &str) -> Result<Order> {
        let mut order = Order::new_market(
            game_id,
            signal.market_ticker.clone(),
            signal.side,
            signal.quantity,
            Some(signal.strategy_id.clone()),
            Some(signal.metadata.clone()),
        );

        if let Err(e) = self.risk.check_order(&order) {
            order.mark_cancelled(e.to_string());
            self.stats.write().orders_rejected += 1;
            let _ = self.store.upsert_order(&order).await;
            return Err(e);
        }
        if let Err(e) = self.validate_local(&order) {
            order.mark_cancelled(e.to_string());
            self.stats.write().orders_rejected += 1;
            let _ = self.store.upsert_order(&order).await;
            return Err(e);
        }

        let fill_price = match self.discover_price(game_id, &order.market_ticker, order.side) {
            Ok(price) => price,
            Err(e) => {
                order.mark_cancelled(e.to_string());
                self.stats.write().orders_rejected += 1;
                let _ = self.store.upsert_order(&order).await;
                return Err(e);
            }
        };
        order.mark_filled(fill_price);
        self.stats.write().orders_filled += 1;

        self.risk.record_order(&order, fill_price);
        self.counters.write().orders_today += 1;

        let position = {
            let mut positions = self.positions.write();
            let key = (order.market_ticker.clone(), order.side);
            let position = positions
                .entry(key)
                .or_insert_with(|| Position::new(game_id, order.market_ticker.clone(), order.side));
            position.apply_fill(fill_price, order.quantity);
            position.clone()
        };

        self.orders.write().push(order.clone());
        self.stats.write().orders_placed += 1;

        if let Err(e) = self.store.upsert_order(&order).await {
            warn!(error = %e, "failed to persist order");
        }
        if let Err(e) = self.store.upsert_position(&position).await {
            warn!(error = %e, "failed to persist position");
        }

        for callback in self.callbacks.read().iter() {
            callback(&order, &position);
        }
        info!(ticker = %order.market_ticker, side = ?order.side, quantity = order.quantity, price = %fill_price, "order filled");
        Ok(order)
    }

    /// Mark every open position to its market's current mid.
    pub fn update_unrealized_pnl(&self) {
        let mut positions = self.positions.write();
        for ((ticker, _side), position) in positions.iter_mut() {
            if !position.is_open {
                continue;
            }
            let Some(game_id) = self.aggregator.game_for_ticker(ticker) else {
                continue;
            };
            let Some(game) = self.aggregator.get_game_state(&game_id) else {
                continue;
            };
            let Some(mid) = game
                .markets
                .get(ticker)
                .and_then(|m| m.orderbook.as_ref())
                .and_then(|ob| ob.mid_price())
            else {
                continue;
            };
            position.mark_to_market(mid);
        }
    }

    pub async fn close_position(&self, market_ticker: &str, side: OrderSide, exit_price: Option<Decimal>) -> Result<Decimal> {
        let exit_price = match exit_price {
            Some(p) => p,
            None => {
                let game_id = self
                    .aggregator
                    .game_for_ticker(market_ticker)
                    .ok_or_else(|| EngineError::NotFound(format!("no game for {market_ticker}")))?;
                let game = self
                    .aggregator
                    .get_game_state(&game_id)
                    .ok_or_else(|| EngineError::NotFound(format!("game {game_id}")))?;
                let orderbook = game
                    .markets
                    .get(market_ticker)
                    .and_then(|m| m.orderbook.as_ref())
                    .ok_or_else(|| EngineError::UpstreamFailure(format!("no orderbook for {market_ticker}")))?;
                match side {
                    OrderSide::Yes => orderbook
                        .yes_bid
                        .ok_or_else(|| EngineError::UpstreamFailure(format!("no bid on {market_ticker}")))?,
                    OrderSide::No => orderbook
                        .no_bid
                        .ok_or_else(|| EngineError::UpstreamFailure(format!("no bid on {market_ticker}")))?,
                }
            }
        };

        let (quantity, delta, position, game_id) = {
            let mut positions = self.positions.write();
            let key = (market_ticker.to_string(), side);
            let position = positions
                .get_mut(&key)
                .ok_or_else(|| EngineError::NotFound(format!("no open position on {market_ticker}")))?;
            let quantity = position.quantity;
            let game_id = position.game_id.clone();
            let delta = position.close_at(exit_price);
            (quantity, delta, position.clone(), game_id)
        };

        self.risk.record_pnl(delta);
        self.risk.record_position_close(market_ticker, &game_id, quantity);
        self.stats.write().positions_closed += 1;

        if let Err(e) = self.store.upsert_position(&position).await {
            warn!(error = %e, "failed to persist closed position");
        }
        Ok(delta)
    }

    pub async fn settle_position(&self, market_ticker: &str, side: OrderSide, outcome_true: bool) -> Result<Decimal> {
        let (quantity, delta, position, game_id) = {
            let mut positions = self.positions.write();
            let key = (market_ticker.to_string(), side);
            let position = positions
                .get_mut(&key)
                .ok_or_else(|| EngineError::NotFound(format!("no open position on {market_ticker}")))?;
            let quantity = position.quantity;
            let game_id = position.game_id.clone();
            let delta = position.settle(outcome_true);
            (quantity, delta, position.clone(), game_id)
        };

        self.risk.record_pnl(delta);
        self.risk.record_position_close(market_ticker, &game_id, quantity);
        self.stats.write().positions_settled += 1;

        if let Err(e) = self.store.upsert_position(&position).await {
            warn!(error = %e, "failed to persist settled position");
        }
        Ok(delta)
    }

    pub fn get_position(&self, market_ticker: &str, side: OrderSide) -> Option<Position> {
        self.positions
            .read()
            .get(&(market_ticker.to_string(), side))
            .cloned()
    }

    pub fn get_all_positions(&self) -> Vec<Position> {
        self.positions.read().values().cloned().collect()
    }

    pub fn get_open_positions(&self) -> Vec<Position> {
        self.positions
            .read()
            .values()
            .filter(|p| p.is_open)
            .cloned()
            .collect()
    }

    pub fn get_all_orders(&self) -> Vec<Order> {
        self.orders.read().clone()
    }

    pub fn get_portfolio_summary(&self) -> PortfolioSummary {
        let positions = self.positions.read();
        let open: Vec<_> = positions.values().filter(|p| p.is_open).collect();
        PortfolioSummary {
            open_positions: open.len(),
            total_unrealized_pnl: open.iter().map(|p| p.unrealized_pnl).sum(),
            total_realized_pnl: positions.values().map(|p| p.realized_pnl).sum(),
            total_exposure: open.iter().map(|p| p.total_cost).sum(),
        }
    }

    pub fn get_stats(&self) -> ExecutionStats {
        self.stats.read().clone()
    }
}
