//! Risk Manager: enforces trading limits before an order reaches execution.
//!
//! All checks run against in-memory counters reset on a calendar-day /
//! ISO-week-Monday cadence. Nothing here touches the database; the
//! execution engine is responsible for persisting what it decides to keep.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::models::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    MaxContractsPerMarket,
    MaxContractsPerGame,
    MaxTotalContracts,
    MaxDailyLoss,
    MaxWeeklyLoss,
    MaxPerTradeRisk,
    MaxTotalExposure,
    MaxExposurePerGame,
    MaxExposurePerStrategy,
    MaxOrdersPerDay,
    MaxOrdersPerHour,
    LossStreakCooldown,
}

const DEFAULT_LIMITS: [(LimitKind, i64); 12] = [
    (LimitKind::MaxContractsPerMarket, 100),
    (LimitKind::MaxContractsPerGame, 200),
    (LimitKind::MaxTotalContracts, 500),
    (LimitKind::MaxDailyLoss, 1000),
    (LimitKind::MaxWeeklyLoss, 5000),
    (LimitKind::MaxPerTradeRisk, 500),
    (LimitKind::MaxTotalExposure, 10000),
    (LimitKind::MaxExposurePerGame, 2000),
    (LimitKind::MaxExposurePerStrategy, 3000),
    (LimitKind::MaxOrdersPerDay, 50),
    (LimitKind::MaxOrdersPerHour, 20),
    (LimitKind::LossStreakCooldown, 3),
];

const COOLDOWN_MINUTES: i64 = 5;
const MANUAL_STRATEGY: &str = "manual";

#[derive(Debug, Clone, Serialize)]
pub struct RiskStatus {
    pub enabled: bool,
    pub daily_loss: Decimal,
    pub weekly_loss: Decimal,
    pub consecutive_losses: u32,
    pub cooldown_active: bool,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub orders_today: usize,
    pub orders_this_hour: usize,
    pub total_exposure: Decimal,
    pub total_contracts: i64,
    pub limits: HashMap<LimitKind, Decimal>,
}

struct Counters {
    limits: HashMap<LimitKind, Decimal>,
    daily_loss: Decimal,
    weekly_loss: Decimal,
    hourly_orders: Vec<DateTime<Utc>>,
    daily_orders: Vec<DateTime<Utc>>,
    consecutive_losses: u32,
    cooldown_until: Option<DateTime<Utc>>,
    exposure_by_game: HashMap<String, Decimal>,
    exposure_by_strategy: HashMap<String, Decimal>,
    contracts_by_market: HashMap<String, i64>,
    contracts_by_game: HashMap<String, i64>,
    last_daily_reset: NaiveDate,
    last_weekly_reset: NaiveDate,
    enabled: bool,
}

impl Counters {
    fn new() -> Self {
        let today = Utc::now().date_naive();
        Self {
            limits: DEFAULT_LIMITS
                .into_iter()
                .map(|(k, v)| (k, Decimal::from(v)))
                .collect(),
            daily_loss: Decimal::ZERO,
            weekly_loss: Decimal::ZERO,
            hourly_orders: Vec::new(),
            daily_orders: Vec::new(),
            consecutive_losses: 0,
            cooldown_until: None,
            exposure_by_game: HashMap::new(),
            exposure_by_strategy: HashMap::new(),
            contracts_by_market: HashMap::new(),
            contracts_by_game: HashMap::new(),
            last_daily_reset: today,
            last_weekly_reset: week_start(today),
            enabled: true,
        }
    }

    fn check_resets(&mut self) {
        let today = Utc::now().date_naive();
        if today > self.last_daily_reset {
            self.daily_loss = Decimal::ZERO;
            self.daily_orders.clear();
            self.last_daily_reset = today;
            info!("daily risk counters reset");
        }
        let this_week_start = week_start(today);
        if this_week_start > self.last_weekly_reset {
            self.weekly_loss = Decimal::ZERO;
            self.last_weekly_reset = this_week_start;
            info!("weekly risk counters reset");
        }
    }

    fn limit(&self, kind: LimitKind) -> Decimal {
        self.limits.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Guards the order pipeline with position, loss, exposure and frequency
/// limits. Cheap enough to check synchronously; never held across `.await`.
pub struct RiskManager {
    counters: RwLock<Counters>,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskManager {
    pub fn new() -> Self {
        info!("risk manager initialized with default limits");
        Self {
            counters: RwLock::new(Counters::new()),
        }
    }

    /// Runs the fixed-order check sequence, returning the first failure.
    /// Cost and exposure are estimated worst-case (100c/contract) since the
    /// fill price is not yet known at signal time.
    pub fn check_order(&self, order: &Order) -> Result<()> {
        let mut c = self.counters.write();
        if !c.enabled {
            return Ok(());
        }
        c.check_resets();

        if let Some(until) = c.cooldown_until {
            if Utc::now() < until {
                let remaining = (until - Utc::now()).num_seconds().max(0);
                return Err(EngineError::RiskRejected {
                    kind: LimitKind::LossStreakCooldown,
                    observed: Decimal::from(c.consecutive_losses),
                    limit: c.limit(LimitKind::LossStreakCooldown),
                })
                .map_err(|e| {
                    warn!(
                        "risk check failed: cooldown active, {}s remaining",
                        remaining
                    );
                    e
                });
            }
        }

        check_position_limits(&c, order)?;
        check_loss_limits(&c)?;
        check_exposure_limits(&c, order)?;
        check_trading_limits(&c)?;
        check_per_trade_risk(&c, order)?;

        Ok(())
    }

    /// Updates position/exposure/frequency counters after a fill.
    pub fn record_order(&self, order: &Order, fill_price: Decimal) {
        let mut c = self.counters.write();
        let now = Utc::now();
        c.hourly_orders.push(now);
        c.daily_orders.push(now);

        *c.contracts_by_market
            .entry(order.market_ticker.clone())
            .or_insert(0) += i64::from(order.quantity);
        *c.contracts_by_game
            .entry(order.game_id.clone())
            .or_insert(0) += i64::from(order.quantity);

        let order_cost = fill_price * Decimal::from(order.quantity);
        *c.exposure_by_game
            .entry(order.game_id.clone())
            .or_insert(Decimal::ZERO) += order_cost;

        if let Some(strategy_id) = order.strategy_id.as_deref() {
            if strategy_id != MANUAL_STRATEGY {
                *c.exposure_by_strategy
                    .entry(strategy_id.to_string())
                    .or_insert(Decimal::ZERO) += order_cost;
            }
        }

        debug!(
            market = %order.market_ticker,
            cost = %order_cost,
            "recorded order for risk tracking"
        );
    }

    /// Records realized P&L from a closed position, updating the loss
    /// streak and tripping the cooldown when the streak limit is reached.
    pub fn record_pnl(&self, pnl: Decimal) {
        let mut c = self.counters.write();
        if pnl < Decimal::ZERO {
            let loss = -pnl;
            c.daily_loss += loss;
            c.weekly_loss += loss;
            c.consecutive_losses += 1;

            let streak_limit = c.limit(LimitKind::LossStreakCooldown);
            if Decimal::from(c.consecutive_losses) >= streak_limit {
                let until = Utc::now() + Duration::minutes(COOLDOWN_MINUTES);
                c.cooldown_until = Some(until);
                warn!(
                    streak = c.consecutive_losses,
                    "loss streak cooldown triggered, resuming at {until}"
                );
            }
        } else {
            c.consecutive_losses = 0;
        }
        info!(
            pnl = %pnl,
            daily_loss = %c.daily_loss,
            streak = c.consecutive_losses,
            "recorded pnl"
        );
    }

    /// Releases contract-count headroom when a position is closed.
    pub fn record_position_close(&self, market_ticker: &str, game_id: &str, quantity: u32) {
        let mut c = self.counters.write();
        let qty = i64::from(quantity);
        if let Some(v) = c.contracts_by_market.get_mut(market_ticker) {
            *v = (*v - qty).max(0);
        }
        if let Some(v) = c.contracts_by_game.get_mut(game_id) {
            *v = (*v - qty).max(0);
        }
    }

    pub fn set_limit(&self, kind: LimitKind, value: Decimal) {
        self.counters.write().limits.insert(kind, value);
        info!("risk limit updated: {kind:?} = {value}");
    }

    pub fn get_limit(&self, kind: LimitKind) -> Decimal {
        self.counters.read().limit(kind)
    }

    pub fn get_all_limits(&self) -> HashMap<LimitKind, Decimal> {
        self.counters.read().limits.clone()
    }

    pub fn enable(&self) {
        self.counters.write().enabled = true;
        info!("risk management enabled");
    }

    pub fn disable(&self) {
        self.counters.write().enabled = false;
        warn!("risk management DISABLED");
    }

    pub fn is_enabled(&self) -> bool {
        self.counters.read().enabled
    }

    pub fn get_status(&self) -> RiskStatus {
        let mut c = self.counters.write();
        c.check_resets();
        let hour_ago = Utc::now() - Duration::hours(1);
        RiskStatus {
            enabled: c.enabled,
            daily_loss: c.daily_loss,
            weekly_loss: c.weekly_loss,
            consecutive_losses: c.consecutive_losses,
            cooldown_active: c.cooldown_until.map(|u| Utc::now() < u).unwrap_or(false),
            cooldown_until: c.cooldown_until,
            orders_today: c.daily_orders.len(),
            orders_this_hour: c.hourly_orders.iter().filter(|t| **t > hour_ago).count(),
            total_exposure: c.exposure_by_game.values().copied().sum(),
            total_contracts: c.contracts_by_market.values().copied().sum(),
            limits: c.limits.clone(),
        }
    }

    /// Clears all tracking state, for tests and admin resets.
    pub fn reset_all(&self) {
        let mut c = self.counters.write();
        *c = Counters::new();
        info!("risk manager reset");
    }
}

fn check_position_limits(c: &Counters, order: &Order) -> Result<()> {
    let qty = i64::from(order.quantity);

    let market_contracts = *c.contracts_by_market.get(&order.market_ticker).unwrap_or(&0);
    let new_market_total = market_contracts + qty;
    let limit = c.limit(LimitKind::MaxContractsPerMarket);
    if Decimal::from(new_market_total) > limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxContractsPerMarket,
            observed: Decimal::from(new_market_total),
            limit,
        });
    }

    let game_contracts = *c.contracts_by_game.get(&order.game_id).unwrap_or(&0);
    let new_game_total = game_contracts + qty;
    let limit = c.limit(LimitKind::MaxContractsPerGame);
    if Decimal::from(new_game_total) > limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxContractsPerGame,
            observed: Decimal::from(new_game_total),
            limit,
        });
    }

    let total: i64 = c.contracts_by_market.values().copied().sum::<i64>() + qty;
    let limit = c.limit(LimitKind::MaxTotalContracts);
    if Decimal::from(total) > limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxTotalContracts,
            observed: Decimal::from(total),
            limit,
        });
    }

    Ok(())
}

fn check_loss_limits(c: &Counters) -> Result<()> {
    let limit = c.limit(LimitKind::MaxDailyLoss);
    if c.daily_loss >= limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxDailyLoss,
            observed: c.daily_loss,
            limit,
        });
    }
    let limit = c.limit(LimitKind::MaxWeeklyLoss);
    if c.weekly_loss >= limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxWeeklyLoss,
            observed: c.weekly_loss,
            limit,
        });
    }
    Ok(())
}

fn check_exposure_limits(c: &Counters, order: &Order) -> Result<()> {
    let estimated_cost = Decimal::from(order.quantity) * dec!(100);

    let total_exposure: Decimal = c.exposure_by_game.values().copied().sum();
    let new_total = total_exposure + estimated_cost;
    let limit = c.limit(LimitKind::MaxTotalExposure);
    if new_total > limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxTotalExposure,
            observed: new_total,
            limit,
        });
    }

    let game_exposure = *c
        .exposure_by_game
        .get(&order.game_id)
        .unwrap_or(&Decimal::ZERO);
    let new_game_exposure = game_exposure + estimated_cost;
    let limit = c.limit(LimitKind::MaxExposurePerGame);
    if new_game_exposure > limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxExposurePerGame,
            observed: new_game_exposure,
            limit,
        });
    }

    if let Some(strategy_id) = order.strategy_id.as_deref() {
        if strategy_id != MANUAL_STRATEGY {
            let strategy_exposure = *c
                .exposure_by_strategy
                .get(strategy_id)
                .unwrap_or(&Decimal::ZERO);
            let new_strategy_exposure = strategy_exposure + estimated_cost;
            let limit = c.limit(LimitKind::MaxExposurePerStrategy);
            if new_strategy_exposure > limit {
                return Err(EngineError::RiskRejected {
                    kind: LimitKind::MaxExposurePerStrategy,
                    observed: new_strategy_exposure,
                    limit,
                });
            }
        }
    }

    Ok(())
}

fn check_trading_limits(c: &Counters) -> Result<()> {
    let hour_ago = Utc::now() - Duration::hours(1);
    let recent_hourly = c.hourly_orders.iter().filter(|t| **t > hour_ago).count();
    let limit = c.limit(LimitKind::MaxOrdersPerHour);
    if Decimal::from(recent_hourly) >= limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxOrdersPerHour,
            observed: Decimal::from(recent_hourly),
            limit,
        });
    }

    let limit = c.limit(LimitKind::MaxOrdersPerDay);
    if Decimal::from(c.daily_orders.len()) >= limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxOrdersPerDay,
            observed: Decimal::from(c.daily_orders.len()),
            limit,
        });
    }

    Ok(())
}

fn check_per_trade_risk(c: &Counters, order: &Order) -> Result<()> {
    let max_trade_risk = Decimal::from(order.quantity) * dec!(100);
    let limit = c.limit(LimitKind::MaxPerTradeRisk);
    if max_trade_risk > limit {
        return Err(EngineError::RiskRejected {
            kind: LimitKind::MaxPerTradeRisk,
            observed: max_trade_risk,
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;

    fn order(quantity: u32) -> Order {
        Order::new_market("game-1", "MONEYLINE-26JAN06DALSAC-SAC", OrderSide::Yes, quantity, None, None)
    }

    #[test]
    fn approves_order_within_limits() {
        let rm = RiskManager::new();
        assert!(rm.check_order(&order(10)).is_ok());
    }

    #[test]
    fn rejects_over_per_market_limit() {
        let rm = RiskManager::new();
        assert!(matches!(
            rm.check_order(&order(150)).unwrap_err(),
            EngineError::RiskRejected {
                kind: LimitKind::MaxContractsPerMarket,
                ..
            }
        ));
    }

    #[test]
    fn rejects_when_per_trade_risk_too_high() {
        let rm = RiskManager::new();
        // 6 contracts at worst-case 100c = 600c, over the 500c default limit.
        assert!(matches!(
            rm.check_order(&order(6)).unwrap_err(),
            EngineError::RiskRejected {
                kind: LimitKind::MaxPerTradeRisk,
                ..
            }
        ));
    }

    #[test]
    fn loss_streak_triggers_cooldown() {
        let rm = RiskManager::new();
        rm.record_pnl(dec!(-10));
        rm.record_pnl(dec!(-10));
        assert!(rm.check_order(&order(1)).is_ok());
        rm.record_pnl(dec!(-10));
        assert!(matches!(
            rm.check_order(&order(1)).unwrap_err(),
            EngineError::RiskRejected {
                kind: LimitKind::LossStreakCooldown,
                ..
            }
        ));
    }

    #[test]
    fn win_resets_consecutive_losses() {
        let rm = RiskManager::new();
        rm.record_pnl(dec!(-10));
        rm.record_pnl(dec!(-10));
        rm.record_pnl(dec!(10));
        rm.record_pnl(dec!(-10));
        // Streak reset by the win, so only 1 consecutive loss now; no cooldown.
        assert!(rm.check_order(&order(1)).is_ok());
    }

    #[test]
    fn disabling_bypasses_all_checks() {
        let rm = RiskManager::new();
        rm.disable();
        assert!(rm.check_order(&order(1000)).is_ok());
    }

    #[test]
    fn record_order_then_close_frees_contract_headroom() {
        let rm = RiskManager::new();
        let o = order(50);
        rm.record_order(&o, dec!(45));
        assert_eq!(
            rm.get_status().total_contracts,
            50
        );
        rm.record_position_close(&o.market_ticker, &o.game_id, 50);
        assert_eq!(rm.get_status().total_contracts, 0);
    }
}
