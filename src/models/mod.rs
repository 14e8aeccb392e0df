//! Domain entities: game/market state, orders, positions, strategy records.

pub mod game;
pub mod order;
pub mod position;
pub mod strategy;

pub use game::{
    ConsensusOdds, EventKind, GameState, LiveSportsState, MarketState, MarketType, OddsQuote,
    OrderbookState, Phase,
};
pub use order::{Order, OrderSide, OrderStatus, OrderType, TradeSignal};
pub use position::Position;
pub use strategy::StrategyRecord;
