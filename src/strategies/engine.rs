//! Supervises the registry: runs a timer loop that evaluates every loaded
//! strategy against every game's current snapshot and fans signals out to
//! registered handlers.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use futures_util::future::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::error::{EngineError, Result};
use crate::models::TradeSignal;

use super::{Strategy, StrategyRegistry};

/// Handlers are async so the execution engine's `execute_signal` can be
/// registered directly instead of needing a blocking adapter.
pub type SignalHandler =
    Arc<dyn Fn(String, TradeSignal) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Summary of one loaded strategy, for admin listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StrategyInfo {
    pub id: String,
    pub name: String,
    pub strategy_type: String,
    pub description: String,
    pub enabled: bool,
}

struct Inner {
    registry: RwLock<StrategyRegistry>,
    handlers: RwLock<Vec<SignalHandler>>,
    aggregator: Arc<Aggregator>,
    eval_interval: StdDuration,
}

pub struct StrategyEngine {
    inner: Arc<Inner>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StrategyEngine {
    pub fn new(aggregator: Arc<Aggregator>, eval_interval_secs: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(StrategyRegistry::new()),
                handlers: RwLock::new(Vec::new()),
                aggregator,
                eval_interval: StdDuration::from_secs(eval_interval_secs.max(1)),
            }),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn load_strategy(&self, id: String, strategy_type: &str, strategy: Box<dyn Strategy>) {
        self.inner.registry.write().load(id, strategy_type, strategy);
    }

    pub fn unload_strategy(&self, id: &str) -> bool {
        self.inner.registry.write().unload(id)
    }

    pub fn enable_strategy(&self, id: &str) -> Result<()> {
        let mut registry = self.inner.registry.write();
        let strategy = registry
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("strategy {id}")))?;
        strategy.enable();
        Ok(())
    }

    pub fn disable_strategy(&self, id: &str) -> Result<()> {
        let mut registry = self.inner.registry.write();
        let strategy = registry
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("strategy {id}")))?;
        strategy.disable();
        Ok(())
    }

    pub fn update_strategy_config(&self, id: &str, config: Value) -> Result<()> {
        let mut registry = self.inner.registry.write();
        let strategy = registry
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("strategy {id}")))?;
        strategy.update_config(config);
        Ok(())
    }

    pub fn get_strategy(&self, id: &str) -> Option<StrategyInfo> {
        let registry = self.inner.registry.read();
        registry.get(id).map(|s| StrategyInfo {
            id: id.to_string(),
            name: s.name().to_string(),
            strategy_type: s.strategy_type().to_string(),
            description: s.description().to_string(),
            enabled: s.is_enabled(),
        })
    }

    pub fn get_all_strategies(&self) -> Vec<StrategyInfo> {
        let registry = self.inner.registry.read();
        registry
            .ids()
            .into_iter()
            .filter_map(|id| {
                registry.get(&id).map(|s| StrategyInfo {
                    id: id.clone(),
                    name: s.name().to_string(),
                    strategy_type: s.strategy_type().to_string(),
                    description: s.description().to_string(),
                    enabled: s.is_enabled(),
                })
            })
            .collect()
    }

    pub fn add_signal_handler(&self, handler: SignalHandler) {
        self.inner.handlers.write().push(handler);
    }

    pub fn evaluate_game(&self, game_id: &str) -> Vec<TradeSignal> {
        let Some(snapshot) = self.inner.aggregator.get_game_state(game_id) else {
            return vec![];
        };
        let mut registry = self.inner.registry.write();
        let mut signals = Vec::new();
        for (id, strategy) in registry.all_mut() {
            if !strategy.is_enabled() {
                continue;
            }
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| strategy.evaluate(game_id, &snapshot)));
            match result {
                Ok(mut emitted) => signals.append(&mut emitted),
                Err(_) => error!(strategy_id = %id, game_id, "strategy evaluation panicked"),
            }
        }
        signals
    }

    pub fn evaluate_all_games(&self) -> Vec<(String, TradeSignal)> {
        let game_ids: Vec<String> = self.inner.aggregator.get_all_game_states().into_keys().collect();
        let mut out = Vec::new();
        for game_id in game_ids {
            for signal in self.evaluate_game(&game_id) {
                out.push((game_id.clone(), signal));
            }
        }
        out
    }

    async fn dispatch(&self, game_id: &str, signal: &TradeSignal) {
        let handlers: Vec<SignalHandler> = self.inner.handlers.read().clone();
        for handler in handlers {
            let fut = handler(game_id.to_string(), signal.clone());
            let result = AssertUnwindSafe(fut).catch_unwind().await;
            if result.is_err() {
                error!(game_id, strategy_id = %signal.strategy_id, "signal handler panicked");
            }
        }
    }

    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move { engine.eval_loop().await });
        *self.task.lock() = Some(handle);
        info!("strategy engine started");
    }

    async fn eval_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.inner.eval_interval);
        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;
            let engine = Arc::clone(&self);
            let result = AssertUnwindSafe(async move {
                let enabled_any = {
                    let registry = engine.inner.registry.read();
                    registry.ids().iter().any(|id| {
                        registry.get(id).map(|s| s.is_enabled()).unwrap_or(false)
                    })
                };
                if !enabled_any {
                    return;
                }
                for (game_id, signal) in engine.evaluate_all_games() {
                    engine.dispatch(&game_id, &signal).await;
                }
            })
            .catch_unwind()
            .await;
            if result.is_err() {
                warn!("strategy eval tick panicked, backing off 5s");
                tokio::time::sleep(StdDuration::from_secs(5)).await;
            }
        }
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("strategy engine stopped");
    }
}
