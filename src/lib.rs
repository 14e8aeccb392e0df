//! Sideline Edge: a real-time paper-trading engine for binary
//! prediction-market contracts on live NBA games.
//!
//! The library exposes each engine as its own module; [`Runtime`] wires
//! them together into the single shared context the HTTP layer and the
//! binary entry point both depend on.

pub mod adapters;
pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod middleware;
pub mod models;
pub mod odds;
pub mod risk;
pub mod store;
pub mod strategies;
pub mod ticker;

use std::sync::Arc;

use tracing::{info, warn};

use adapters::balldontlie::BallDontLieClient;
use adapters::kalshi::KalshiClient;
use adapters::{ExchangeClient, SportsClient};
use config::Config;
use error::Result;
use execution::ExecutionEngine;
use models::TradeSignal;
use risk::RiskManager;
use store::{SqliteStore, Store};
use strategies::engine::StrategyEngine;

/// Explicit application context built once at startup and shared via
/// `Arc` everywhere it's needed, instead of reaching for global statics.
pub struct Runtime {
    pub config: Config,
    pub aggregator: Arc<aggregator::Aggregator>,
    pub strategies: Arc<StrategyEngine>,
    pub risk: Arc<RiskManager>,
    pub execution: Arc<ExecutionEngine>,
    pub store: Arc<dyn Store>,
}

impl Runtime {
    pub fn build(config: Config) -> Result<Arc<Self>> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config.database_path)?);

        let exchange: Arc<dyn ExchangeClient> = Arc::new(KalshiClient::new(
            config.kalshi_api_url.clone(),
            config.kalshi_api_key.clone(),
            &config.kalshi_private_key_pem,
        )?);
        let sports: Arc<dyn SportsClient> = Arc::new(BallDontLieClient::new(
            config.sports_api_url.clone(),
            config.sports_api_key.clone(),
        )?);

        let sports_interval_ticks = config.nba_poll_interval_secs.max(1) as u32;
        let odds_interval_ticks = config.betting_odds_poll_interval_secs.max(1) as u32;
        let aggregator = Arc::new(aggregator::Aggregator::new(
            exchange,
            sports,
            Arc::clone(&store),
            sports_interval_ticks,
            odds_interval_ticks,
        ));

        let risk = Arc::new(RiskManager::new());
        let execution = Arc::new(ExecutionEngine::new(
            Arc::clone(&aggregator),
            Arc::clone(&risk),
            Arc::clone(&store),
        ));
        let strategies = Arc::new(StrategyEngine::new(
            Arc::clone(&aggregator),
            config.strategy_eval_interval_secs,
        ));

        let execution_for_handler = Arc::clone(&execution);
        strategies.add_signal_handler(Arc::new(move |game_id: String, signal: TradeSignal| {
            let execution = Arc::clone(&execution_for_handler);
            Box::pin(async move {
                match execution.execute_signal(&signal, &game_id).await {
                    Ok(order) => info!(ticker = %order.market_ticker, strategy_id = %signal.strategy_id, "signal routed to execution"),
                    Err(e) => warn!(error = %e, strategy_id = %signal.strategy_id, "signal rejected by execution"),
                }
            })
        }));

        info!("runtime context built");
        Ok(Arc::new(Self {
            config,
            aggregator,
            strategies,
            risk,
            execution,
            store,
        }))
    }

    pub fn start(self: &Arc<Self>) {
        self.aggregator.start();
        self.strategies.start();
    }

    pub async fn stop(&self) {
        self.strategies.stop().await;
        self.aggregator.stop().await;
    }
}
