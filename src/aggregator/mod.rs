//! Data Aggregator: owns per-game [`GameState`], polls the exchange/sports/
//! odds sources, and publishes typed change-events to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::FutureExt;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use crate::adapters::{ExchangeClient, SportsClient};
use crate::error::{EngineError, Result};
use crate::models::{
    ConsensusOdds, EventKind, GameState, LiveSportsState, MarketState, MarketType, OddsQuote,
    OrderbookState, Phase,
};
use crate::odds::{consensus, remove_vig, ConsensusMethod};
use crate::store::Store;

/// Subscriber callback: `(game_id, snapshot, event_kind)`. Delivery is
/// in-order per game and best-effort; a failing subscriber is caught and
/// logged, never allowed to block others.
pub type Subscriber = Arc<dyn Fn(&str, &GameState, EventKind) + Send + Sync>;

/// Static description of the markets backing one game, handed to
/// `load_game` by the caller (normally the Games admin endpoint) since
/// constructing a game from scratch is outside the Aggregator's remit.
#[derive(Debug, Clone)]
pub struct MarketDescriptor {
    pub ticker: String,
    pub market_type: MarketType,
    pub strike_value: Option<Decimal>,
    pub side_tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GameDescriptor {
    pub game_id: String,
    pub event_ticker: String,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_start: DateTime<Utc>,
    pub status: String,
    pub external_sports_id: Option<String>,
    pub markets: Vec<MarketDescriptor>,
}

const SPORTS_POLL_MULTIPLE_SCHEDULED: u32 = 6;

struct Inner {
    game_states: RwLock<HashMap<String, GameState>>,
    ticker_to_game: RwLock<HashMap<String, String>>,
    subscribers: RwLock<Vec<Subscriber>>,
    exchange: Arc<dyn ExchangeClient>,
    sports: Arc<dyn SportsClient>,
    store: Arc<dyn Store>,
    sports_interval_ticks: u32,
    odds_interval_ticks: u32,
}

/// Central data aggregator that maintains unified per-game state.
pub struct Aggregator {
    inner: Arc<Inner>,
    running: Arc<AtomicBool>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Aggregator {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        sports: Arc<dyn SportsClient>,
        store: Arc<dyn Store>,
        sports_interval_ticks: u32,
        odds_interval_ticks: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                game_states: RwLock::new(HashMap::new()),
                ticker_to_game: RwLock::new(HashMap::new()),
                subscribers: RwLock::new(Vec::new()),
                exchange,
                sports,
                store,
                sports_interval_ticks: sports_interval_ticks.max(1),
                odds_interval_ticks: odds_interval_ticks.max(1),
            }),
            running: Arc::new(AtomicBool::new(false)),
            poll_task: Mutex::new(None),
        }
    }

    // ---------------------------------------------------------------
    // Game management
    // ---------------------------------------------------------------

    /// Loads a game into the aggregator. Idempotent: a second call with the
    /// same `game_id` returns the existing state and emits no `GameLoaded`.
    pub async fn load_game(&self, descriptor: GameDescriptor) -> Result<GameState> {
        if let Some(existing) = self.inner.game_states.read().get(&descriptor.game_id) {
            return Ok(existing.clone());
        }

        info!(game_id = %descriptor.game_id, "loading game");

        let mut state = GameState::new(
            descriptor.game_id.clone(),
            descriptor.event_ticker.clone(),
            descriptor.home_team.clone(),
            descriptor.away_team.clone(),
            descriptor.scheduled_start,
        );
        state.external_sports_id = descriptor.external_sports_id.clone();
        state.phase = Phase::from_status(&descriptor.status);
        state.is_active = state.phase.is_active_for_polling();

        for market in &descriptor.markets {
            state
                .markets
                .insert(market.ticker.clone(), MarketState {
                    ticker: market.ticker.clone(),
                    market_type: market.market_type,
                    strike_value: market.strike_value,
                    side_tag: market.side_tag.clone(),
                    orderbook: None,
                });
            self.inner
                .ticker_to_game
                .write()
                .insert(market.ticker.clone(), descriptor.game_id.clone());
        }

        if descriptor.external_sports_id.is_some() {
            state.sports_state = Some(LiveSportsState {
                status: descriptor.status.clone(),
                period: None,
                time_remaining: None,
                home_score: None,
                away_score: None,
                last_updated: Utc::now(),
            });
        }

        self.inner
            .game_states
            .write()
            .insert(descriptor.game_id.clone(), state.clone());

        if let Err(e) = self.inner.store.upsert_game(&state).await {
            warn!("failed to persist loaded game {}: {e}", descriptor.game_id);
        }

        self.refresh_orderbooks(&descriptor.game_id).await;
        if descriptor.external_sports_id.is_some() {
            self.refresh_live_sports(&descriptor.game_id).await;
            self.refresh_odds(&descriptor.game_id).await;
        }

        let final_state = self
            .get_game_state(&descriptor.game_id)
            .unwrap_or(state);
        self.notify(&descriptor.game_id, &final_state, EventKind::GameLoaded);
        info!(game_id = %descriptor.game_id, "game loaded");
        Ok(final_state)
    }

    pub fn unload_game(&self, game_id: &str) -> bool {
        let removed = self.inner.game_states.write().remove(game_id);
        let Some(state) = removed else {
            warn!(game_id, "unload requested for game not loaded");
            return false;
        };
        let mut ticker_map = self.inner.ticker_to_game.write();
        for ticker in state.markets.keys() {
            ticker_map.remove(ticker);
        }
        drop(ticker_map);
        self.notify(game_id, &state, EventKind::GameUnloaded);
        info!(game_id, "game unloaded");
        true
    }

    pub fn get_game_state(&self, game_id: &str) -> Option<GameState> {
        self.inner.game_states.read().get(game_id).cloned()
    }

    pub fn get_all_game_states(&self) -> HashMap<String, GameState> {
        self.inner.game_states.read().clone()
    }

    pub fn game_for_ticker(&self, ticker: &str) -> Option<String> {
        self.inner.ticker_to_game.read().get(ticker).cloned()
    }

    pub fn subscribe(&self, subscriber: Subscriber) {
        self.inner.subscribers.write().push(subscriber);
    }

    /// On-demand refresh of a single loaded game across all three sources,
    /// for admin-triggered refreshes outside the regular poll cadence.
    pub async fn refresh_game(&self, game_id: &str) -> Result<()> {
        if self.inner.game_states.read().get(game_id).is_none() {
            return Err(EngineError::NotFound(format!("game {game_id}")));
        }
        self.refresh_orderbooks(game_id).await;
        self.refresh_live_sports(game_id).await;
        self.refresh_odds(game_id).await;
        Ok(())
    }

    fn notify(&self, game_id: &str, state: &GameState, event: EventKind) {
        let subscribers = self.inner.subscribers.read();
        for sub in subscribers.iter() {
            // Catch-and-log semantics: a panicking subscriber must not take
            // down the refresh loop or block later subscribers.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                sub(game_id, state, event);
            }));
            if result.is_err() {
                error!(game_id, ?event, "subscriber panicked, continuing");
            }
        }
    }

    // ---------------------------------------------------------------
    // Refresh algorithms
    // ---------------------------------------------------------------

    /// REST top-of-book refresh. Full replacement, never a merge — there is
    /// no streaming socket feeding incremental deltas into this state.
    async fn refresh_orderbooks(&self, game_id: &str) {
        let tickers: Vec<String> = match self.inner.game_states.read().get(game_id) {
            Some(state) => state.markets.keys().cloned().collect(),
            None => return,
        };

        let mut changed = false;
        for ticker in tickers {
            match self.inner.exchange.get_market_orderbook(&ticker).await {
                Ok(top) => {
                    let mut book = OrderbookState::new(top.yes_bid, top.yes_ask);
                    book.yes_bid_size = top.yes_bid_size;
                    book.yes_ask_size = top.yes_ask_size;
                    let mid = book.mid_price();

                    let mut states = self.inner.game_states.write();
                    if let Some(state) = states.get_mut(game_id) {
                        if let Some(market) = state.markets.get_mut(&ticker) {
                            market.orderbook = Some(book);
                        }
                        if let Some(mid) = mid {
                            state
                                .implied_probabilities
                                .insert(ticker.clone(), mid / Decimal::from(100));
                        }
                        changed = true;
                    }
                    drop(states);

                    if let Err(e) = self.inner.store.record_orderbook_snapshot(game_id, &ticker, mid).await {
                        warn!("failed to persist orderbook snapshot for {ticker}: {e}");
                    }
                }
                Err(EngineError::RateLimited { retry_after_secs }) => {
                    warn!(ticker, ?retry_after_secs, "rate limited fetching orderbook");
                }
                Err(e) => {
                    warn!(ticker, "error fetching orderbook: {e}");
                }
            }
        }

        if changed {
            let mut states = self.inner.game_states.write();
            if let Some(state) = states.get_mut(game_id) {
                state.last_updated = Utc::now();
                let snapshot = state.clone();
                drop(states);
                self.notify(game_id, &snapshot, EventKind::OrderbookUpdate);
            }
        }
    }

    async fn refresh_live_sports(&self, game_id: &str) {
        let external_id = match self.inner.game_states.read().get(game_id) {
            Some(state) => state.external_sports_id.clone(),
            None => return,
        };
        let Some(external_id) = external_id else {
            return;
        };

        match self.inner.sports.get_box_score(&external_id).await {
            Ok(Some(score)) => {
                let phase = Phase::from_status(&score.status);
                let live_state = LiveSportsState {
                    status: score.status.clone(),
                    period: score.period,
                    time_remaining: score.time_remaining.clone(),
                    home_score: score.home_score,
                    away_score: score.away_score,
                    last_updated: Utc::now(),
                };

                let mut states = self.inner.game_states.write();
                if let Some(state) = states.get_mut(game_id) {
                    state.sports_state = Some(live_state.clone());
                    state.phase = phase;
                    state.is_active = phase.is_active_for_polling();
                    state.last_updated = Utc::now();
                }
                drop(states);

                if let Err(e) = self.inner.store.record_live_sports(game_id, &live_state).await {
                    warn!("failed to persist live sports row for {game_id}: {e}");
                }

                if let Some(snapshot) = self.get_game_state(game_id) {
                    self.notify(game_id, &snapshot, EventKind::SportsUpdate);
                }
            }
            Ok(None) => {
                debug!(game_id, "no live box score match this tick");
            }
            Err(e) => {
                warn!(game_id, "error refreshing live sports: {e}");
            }
        }
    }

    async fn refresh_odds(&self, game_id: &str) {
        let external_id = match self.inner.game_states.read().get(game_id) {
            Some(state) => state.external_sports_id.clone(),
            None => return,
        };
        let Some(external_id) = external_id else {
            return;
        };

        let rows = match self.inner.sports.get_odds(&external_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(game_id, "error refreshing odds: {e}");
                return;
            }
        };
        if rows.is_empty() {
            return;
        }

        let mut home_ml = Vec::new();
        let mut away_ml = Vec::new();
        let mut home_spread_ml = Vec::new();
        let mut away_spread_ml = Vec::new();
        let mut spread_lines = Vec::new();
        let mut over_ml = Vec::new();
        let mut under_ml = Vec::new();
        let mut total_lines = Vec::new();

        let mut states = self.inner.game_states.write();
        let Some(state) = states.get_mut(game_id) else {
            return;
        };

        for row in &rows {
            let quote = OddsQuote {
                moneyline_home: row.moneyline_home,
                moneyline_away: row.moneyline_away,
                spread_value: row.spread_value,
                spread_home_odds: row.spread_home_odds,
                spread_away_odds: row.spread_away_odds,
                total_value: row.total_value,
                total_over_odds: row.total_over_odds,
                total_under_odds: row.total_under_odds,
            };
            state.odds.insert(row.vendor.clone(), quote);

            if let Some(v) = row.moneyline_home {
                home_ml.push(v);
            }
            if let Some(v) = row.moneyline_away {
                away_ml.push(v);
            }
            if let Some(v) = row.spread_home_odds {
                home_spread_ml.push(v);
            }
            if let Some(v) = row.spread_away_odds {
                away_spread_ml.push(v);
            }
            if let Some(v) = row.spread_value {
                spread_lines.push(v);
            }
            if let Some(v) = row.total_over_odds {
                over_ml.push(v);
            }
            if let Some(v) = row.total_under_odds {
                under_ml.push(v);
            }
            if let Some(v) = row.total_value {
                total_lines.push(v);
            }
        }

        let consensus_odds = build_consensus(
            rows.len(),
            &home_ml,
            &away_ml,
            &home_spread_ml,
            &away_spread_ml,
            &spread_lines,
            &over_ml,
            &under_ml,
            &total_lines,
        );
        state.consensus = consensus_odds;
        state.last_updated = Utc::now();
        let snapshot = state.clone();
        drop(states);

        for row in &rows {
            let quote = snapshot.odds.get(&row.vendor);
            if let Some(quote) = quote {
                if let Err(e) = self.inner.store.record_odds(game_id, &row.vendor, quote).await {
                    warn!("failed to persist odds row for {}: {e}", row.vendor);
                }
            }
        }

        self.notify(game_id, &snapshot, EventKind::OddsUpdate);
    }

    // ---------------------------------------------------------------
    // Scheduler
    // ---------------------------------------------------------------

    /// Starts the 1 Hz polling loop. Idempotent: a second call while
    /// already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.poll_loop().await;
        });
        *self.poll_task.lock() = Some(handle);
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut sports_counter: u32 = 0;
        let mut odds_counter: u32 = 0;
        let mut scheduled_counter: u32 = 0;
        let mut ticker = interval(Duration::from_secs(1));

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;

            let result = std::panic::AssertUnwindSafe(self.poll_tick(
                &mut sports_counter,
                &mut odds_counter,
                &mut scheduled_counter,
            ))
            .catch_unwind()
            .await;

            if result.is_err() {
                error!("aggregator poll loop panicked, backing off 5s");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    async fn poll_tick(&self, sports_counter: &mut u32, odds_counter: &mut u32, scheduled_counter: &mut u32) {
        *sports_counter += 1;
        *odds_counter += 1;
        *scheduled_counter += 1;

        let game_ids: Vec<(String, Phase)> = self
            .inner
            .game_states
            .read()
            .iter()
            .map(|(id, s)| (id.clone(), s.phase))
            .collect();

        for (game_id, phase) in game_ids {
            if phase.is_active_for_polling() {
                self.refresh_orderbooks(&game_id).await;
                if *sports_counter >= self.inner.sports_interval_ticks {
                    self.refresh_live_sports(&game_id).await;
                }
                if *odds_counter >= self.inner.odds_interval_ticks {
                    self.refresh_odds(&game_id).await;
                }
            } else if phase == Phase::Scheduled {
                let slow_interval =
                    self.inner.sports_interval_ticks * SPORTS_POLL_MULTIPLE_SCHEDULED;
                if *scheduled_counter >= slow_interval.max(1) {
                    self.refresh_live_sports(&game_id).await;
                }
            }
        }

        if *sports_counter >= self.inner.sports_interval_ticks {
            *sports_counter = 0;
        }
        if *odds_counter >= self.inner.odds_interval_ticks {
            *odds_counter = 0;
        }
        let slow_interval = self.inner.sports_interval_ticks * SPORTS_POLL_MULTIPLE_SCHEDULED;
        if *scheduled_counter >= slow_interval.max(1) {
            *scheduled_counter = 0;
        }
    }

    /// Stops the polling loop and awaits its shutdown.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let poll_handle = self.poll_task.lock().take();
        if let Some(handle) = poll_handle {
            let _ = handle.await;
        }
        info!("aggregator stopped");
    }
}

#[allow(clippy::too_many_arguments)]
fn build_consensus(
    num_sportsbooks: usize,
    home_ml: &[i32],
    away_ml: &[i32],
    home_spread_ml: &[i32],
    away_spread_ml: &[i32],
    spread_lines: &[Decimal],
    over_ml: &[i32],
    under_ml: &[i32],
    total_lines: &[Decimal],
) -> Option<ConsensusOdds> {
    if home_ml.is_empty() || away_ml.is_empty() {
        return None;
    }

    let home_probs: Vec<Decimal> = home_ml
        .iter()
        .map(|&o| crate::odds::american_to_implied(o))
        .collect();
    let away_probs: Vec<Decimal> = away_ml
        .iter()
        .map(|&o| crate::odds::american_to_implied(o))
        .collect();
    let home_median = consensus(&home_probs, ConsensusMethod::Median).unwrap_or_default();
    let away_median = consensus(&away_probs, ConsensusMethod::Median).unwrap_or_default();
    let (home_win_probability, away_win_probability) = remove_vig(home_median, away_median);

    let spread_home_probability = if !home_spread_ml.is_empty() && !away_spread_ml.is_empty() {
        let h: Vec<Decimal> = home_spread_ml
            .iter()
            .map(|&o| crate::odds::american_to_implied(o))
            .collect();
        let a: Vec<Decimal> = away_spread_ml
            .iter()
            .map(|&o| crate::odds::american_to_implied(o))
            .collect();
        let hm = consensus(&h, ConsensusMethod::Median).unwrap_or_default();
        let am = consensus(&a, ConsensusMethod::Median).unwrap_or_default();
        Some(remove_vig(hm, am).0)
    } else {
        None
    };

    let over_probability = if !over_ml.is_empty() && !under_ml.is_empty() {
        let o: Vec<Decimal> = over_ml
            .iter()
            .map(|&x| crate::odds::american_to_implied(x))
            .collect();
        let u: Vec<Decimal> = under_ml
            .iter()
            .map(|&x| crate::odds::american_to_implied(x))
            .collect();
        let om = consensus(&o, ConsensusMethod::Median).unwrap_or_default();
        let um = consensus(&u, ConsensusMethod::Median).unwrap_or_default();
        Some(remove_vig(om, um).0)
    } else {
        None
    };

    let spread_line = consensus(spread_lines, ConsensusMethod::Median);
    let total_line = consensus(total_lines, ConsensusMethod::Median);

    Some(ConsensusOdds {
        num_sportsbooks,
        home_win_probability,
        away_win_probability,
        spread_line,
        spread_home_probability,
        total_line,
        over_probability,
        last_updated: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BoxScore, TopOfBook, VendorOddsRow};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct FakeExchange;
    #[async_trait]
    impl ExchangeClient for FakeExchange {
        async fn get_market_orderbook(&self, ticker: &str) -> Result<TopOfBook> {
            Ok(TopOfBook {
                ticker: ticker.to_string(),
                yes_bid: Some(dec!(44)),
                yes_ask: Some(dec!(46)),
                yes_bid_size: Some(10),
                yes_ask_size: Some(10),
            })
        }
        async fn get_market(&self, _ticker: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn exchange_status(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct FakeSports;
    #[async_trait]
    impl SportsClient for FakeSports {
        async fn get_box_score(&self, _id: &str) -> Result<Option<BoxScore>> {
            Ok(None)
        }
        async fn get_box_scores_live(&self) -> Result<Vec<BoxScore>> {
            Ok(vec![])
        }
        async fn get_odds(&self, _id: &str) -> Result<Vec<VendorOddsRow>> {
            Ok(vec![])
        }
    }

    struct FakeStore;
    #[async_trait]
    impl Store for FakeStore {
        async fn upsert_game(&self, _g: &GameState) -> Result<()> {
            Ok(())
        }
        async fn record_orderbook_snapshot(&self, _g: &str, _t: &str, _m: Option<Decimal>) -> Result<()> {
            Ok(())
        }
        async fn record_live_sports(&self, _g: &str, _s: &LiveSportsState) -> Result<()> {
            Ok(())
        }
        async fn record_odds(&self, _g: &str, _v: &str, _q: &OddsQuote) -> Result<()> {
            Ok(())
        }
        async fn upsert_order(&self, _o: &crate::models::Order) -> Result<()> {
            Ok(())
        }
        async fn upsert_position(&self, _p: &crate::models::Position) -> Result<()> {
            Ok(())
        }
        async fn upsert_strategy(&self, _s: &crate::models::StrategyRecord) -> Result<()> {
            Ok(())
        }
        async fn list_strategies(&self) -> Result<Vec<crate::models::StrategyRecord>> {
            Ok(vec![])
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn test_aggregator() -> Aggregator {
        Aggregator::new(Arc::new(FakeExchange), Arc::new(FakeSports), Arc::new(FakeStore), 2, 5)
    }

    fn descriptor() -> GameDescriptor {
        GameDescriptor {
            game_id: "g1".to_string(),
            event_ticker: "EVT".to_string(),
            home_team: "SAC".to_string(),
            away_team: "DAL".to_string(),
            scheduled_start: Utc::now(),
            status: "scheduled".to_string(),
            external_sports_id: None,
            markets: vec![MarketDescriptor {
                ticker: "MONEYLINE-26JAN06DALSAC-SAC".to_string(),
                market_type: MarketType::Moneyline,
                strike_value: None,
                side_tag: Some("SAC".to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn load_game_populates_orderbook_and_ticker_map() {
        let agg = test_aggregator();
        let state = agg.load_game(descriptor()).await.unwrap();
        assert_eq!(state.markets.len(), 1);
        assert!(agg.game_for_ticker("MONEYLINE-26JAN06DALSAC-SAC").is_some());
        let market = &state.markets["MONEYLINE-26JAN06DALSAC-SAC"];
        assert!(market.orderbook.is_some());
    }

    #[tokio::test]
    async fn load_game_is_idempotent() {
        let agg = test_aggregator();
        agg.load_game(descriptor()).await.unwrap();
        let second = agg.load_game(descriptor()).await.unwrap();
        assert_eq!(second.game_id, "g1");
    }

    #[tokio::test]
    async fn unload_game_clears_ticker_map() {
        let agg = test_aggregator();
        agg.load_game(descriptor()).await.unwrap();
        assert!(agg.unload_game("g1"));
        assert!(agg.game_for_ticker("MONEYLINE-26JAN06DALSAC-SAC").is_none());
        assert!(!agg.unload_game("g1"));
    }

    #[test]
    fn build_consensus_normalizes_moneyline() {
        let c = build_consensus(3, &[-150, -140, -160], &[130, 120, 140], &[], &[], &[], &[], &[], &[])
            .unwrap();
        assert_eq!(c.home_win_probability + c.away_win_probability, Decimal::ONE);
    }
}
