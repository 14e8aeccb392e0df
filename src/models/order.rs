//! Orders and strategy-emitted trade signals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Yes,
    No,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Yes => OrderSide::No,
            OrderSide::No => OrderSide::Yes,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Yes => "yes",
            OrderSide::No => "no",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
}

/// A trade intent emitted by a strategy, not yet risk-checked or filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub strategy_id: String,
    pub strategy_name: String,
    pub market_ticker: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub confidence: f64,
    pub reason: String,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

impl TradeSignal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy_id: impl Into<String>,
        strategy_name: impl Into<String>,
        market_ticker: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        confidence: f64,
        reason: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            strategy_name: strategy_name.into(),
            market_ticker: market_ticker.into(),
            side,
            quantity,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
            metadata,
            timestamp: Utc::now(),
        }
    }
}

/// A simulated order, from construction through fill or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub strategy_id: Option<String>,
    pub game_id: String,
    pub market_ticker: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: u32,
    pub limit_price: Option<Decimal>,
    pub filled_price: Option<Decimal>,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub signal_data: Option<Value>,
}

impl Order {
    pub fn new_market(
        game_id: impl Into<String>,
        market_ticker: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        strategy_id: Option<String>,
        signal_data: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id,
            game_id: game_id.into(),
            market_ticker: market_ticker.into(),
            order_type: OrderType::Market,
            side,
            quantity,
            limit_price: None,
            filled_price: None,
            status: OrderStatus::Pending,
            placed_at: Utc::now(),
            filled_at: None,
            rejection_reason: None,
            signal_data,
        }
    }

    pub fn mark_filled(&mut self, price: Decimal) {
        self.filled_price = Some(price);
        self.status = OrderStatus::Filled;
        self.filled_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self, reason: impl Into<String>) {
        self.status = OrderStatus::Cancelled;
        self.rejection_reason = Some(reason.into());
    }
}
