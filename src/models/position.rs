//! Per-(market, side) position accounting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::OrderSide;

/// A position keyed by `(market_ticker, side)`. See Open Question #1:
/// opposite-side orders open or grow a distinct position rather than
/// netting against this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub game_id: String,
    pub market_ticker: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub avg_entry_price: Decimal,
    pub total_cost: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_open: bool,
}

impl Position {
    pub fn new(game_id: impl Into<String>, market_ticker: impl Into<String>, side: OrderSide) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            game_id: game_id.into(),
            market_ticker: market_ticker.into(),
            side,
            quantity: 0,
            avg_entry_price: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            opened_at: now,
            updated_at: now,
            closed_at: None,
            is_open: false,
        }
    }

    /// Add a same-side fill, updating weighted-average entry price.
    pub fn apply_fill(&mut self, fill_price: Decimal, quantity: u32) {
        let added_cost = fill_price * Decimal::from(quantity);
        self.total_cost += added_cost;
        self.quantity += quantity;
        if self.quantity > 0 {
            self.avg_entry_price = self.total_cost / Decimal::from(self.quantity);
            self.is_open = true;
        }
        self.updated_at = Utc::now();
    }

    pub fn mark_to_market(&mut self, current_mid: Decimal) {
        self.unrealized_pnl =
            current_mid * Decimal::from(self.quantity) - self.total_cost;
        self.updated_at = Utc::now();
    }

    fn close(&mut self) {
        self.quantity = 0;
        self.total_cost = Decimal::ZERO;
        self.avg_entry_price = Decimal::ZERO;
        self.unrealized_pnl = Decimal::ZERO;
        self.is_open = false;
        self.closed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Close at a discretionary exit price (`close_position`). Returns the
    /// realized P&L delta from this close.
    pub fn close_at(&mut self, exit_price: Decimal) -> Decimal {
        let qty = Decimal::from(self.quantity);
        let delta = match self.side {
            OrderSide::Yes => (exit_price - self.avg_entry_price) * qty,
            OrderSide::No => (self.avg_entry_price - exit_price) * qty,
        };
        self.realized_pnl += delta;
        self.close();
        delta
    }

    /// Settle at a binary outcome: 100c if the contract side won, else 0c.
    /// Returns the realized P&L delta from settlement.
    pub fn settle(&mut self, outcome_true: bool) -> Decimal {
        let qty = Decimal::from(self.quantity);
        let settlement = if outcome_true {
            Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        let final_value = match self.side {
            OrderSide::Yes => settlement * qty,
            OrderSide::No => (Decimal::from(100) - settlement) * qty,
        };
        let delta = final_value - self.total_cost;
        self.realized_pnl += delta;
        self.close();
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn apply_fill_tracks_weighted_average() {
        let mut pos = Position::new("g1", "T", OrderSide::Yes);
        pos.apply_fill(dec!(40), 10);
        assert_eq!(pos.quantity, 10);
        assert_eq!(pos.avg_entry_price, dec!(40));
        assert_eq!(pos.total_cost, dec!(400));
        assert!(pos.is_open);
    }

    #[test]
    fn settle_yes_position_true_outcome() {
        let mut pos = Position::new("g1", "T", OrderSide::Yes);
        pos.apply_fill(dec!(40), 10);
        let delta = pos.settle(true);
        assert_eq!(delta, dec!(600));
        assert_eq!(pos.realized_pnl, dec!(600));
        assert_eq!(pos.quantity, 0);
        assert!(!pos.is_open);
    }

    #[test]
    fn settle_no_position_outcome_false() {
        let mut pos = Position::new("g1", "T", OrderSide::No);
        pos.apply_fill(dec!(30), 10);
        let delta = pos.settle(false);
        assert_eq!(delta, dec!(700));
    }
}
