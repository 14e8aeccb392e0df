//! Durable persistence, backed by `rusqlite` (bundled SQLite).
//!
//! Exposed as a narrow [`Store`] trait so the engines depend on a
//! capability rather than a concrete database. Persistence failures are
//! logged by callers and must never block in-memory state from advancing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::models::{GameState, Order, Position, StrategyRecord};

#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_game(&self, game: &GameState) -> Result<()>;
    async fn record_orderbook_snapshot(&self, game_id: &str, ticker: &str, mid: Option<rust_decimal::Decimal>) -> Result<()>;
    async fn record_live_sports(&self, game_id: &str, state: &crate::models::LiveSportsState) -> Result<()>;
    async fn record_odds(&self, game_id: &str, vendor: &str, quote: &crate::models::OddsQuote) -> Result<()>;
    async fn upsert_order(&self, order: &Order) -> Result<()>;
    async fn upsert_position(&self, position: &Position) -> Result<()>;
    async fn upsert_strategy(&self, record: &StrategyRecord) -> Result<()>;
    async fn list_strategies(&self) -> Result<Vec<StrategyRecord>>;
    async fn ping(&self) -> Result<()>;
}

/// SQLite-backed implementation. Cheap to clone: the connection is shared
/// behind an `Arc<Mutex<_>>`, mirroring how the reference backend wraps its
/// single-writer SQLite handle.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| crate::error::EngineError::Internal(format!("open store: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                game_id TEXT PRIMARY KEY,
                event_ticker TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                phase TEXT NOT NULL,
                scheduled_start TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS orderbook_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL,
                ticker TEXT NOT NULL,
                mid TEXT,
                recorded_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS nba_live_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL,
                status TEXT NOT NULL,
                period INTEGER,
                home_score INTEGER,
                away_score INTEGER,
                recorded_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS betting_odds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL,
                vendor TEXT NOT NULL,
                moneyline_home INTEGER,
                moneyline_away INTEGER,
                recorded_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS simulated_orders (
                id TEXT PRIMARY KEY,
                strategy_id TEXT,
                game_id TEXT NOT NULL,
                market_ticker TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                filled_price TEXT,
                status TEXT NOT NULL,
                placed_at TEXT NOT NULL,
                filled_at TEXT,
                rejection_reason TEXT
            );
            CREATE TABLE IF NOT EXISTS positions (
                id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                market_ticker TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                avg_entry_price TEXT NOT NULL,
                total_cost TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                is_open INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS strategies (
                strategy_id TEXT PRIMARY KEY,
                strategy_type TEXT NOT NULL,
                is_enabled INTEGER NOT NULL,
                config TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| crate::error::EngineError::Internal(format!("init schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_game(&self, game: &GameState) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO games (game_id, event_ticker, home_team, away_team, phase, scheduled_start, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(game_id) DO UPDATE SET
                event_ticker = excluded.event_ticker,
                home_team = excluded.home_team,
                away_team = excluded.away_team,
                phase = excluded.phase,
                updated_at = excluded.updated_at",
            params![
                game.game_id,
                game.event_ticker,
                game.home_team,
                game.away_team,
                format!("{:?}", game.phase),
                game.scheduled_start.to_rfc3339(),
                game.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn record_orderbook_snapshot(
        &self,
        game_id: &str,
        ticker: &str,
        mid: Option<rust_decimal::Decimal>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO orderbook_snapshots (game_id, ticker, mid, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![game_id, ticker, mid.map(|m| m.to_string()), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn record_live_sports(&self, game_id: &str, state: &crate::models::LiveSportsState) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO nba_live_data (game_id, status, period, home_score, away_score, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                game_id,
                state.status,
                state.period.map(i64::from),
                state.home_score.map(i64::from),
                state.away_score.map(i64::from),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn record_odds(&self, game_id: &str, vendor: &str, quote: &crate::models::OddsQuote) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO betting_odds (game_id, vendor, moneyline_home, moneyline_away, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                game_id,
                vendor,
                quote.moneyline_home,
                quote.moneyline_away,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn upsert_order(&self, order: &Order) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO simulated_orders (id, strategy_id, game_id, market_ticker, side, quantity, filled_price, status, placed_at, filled_at, rejection_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                filled_price = excluded.filled_price,
                status = excluded.status,
                filled_at = excluded.filled_at,
                rejection_reason = excluded.rejection_reason",
            params![
                order.id.to_string(),
                order.strategy_id,
                order.game_id,
                order.market_ticker,
                order.side.as_str(),
                i64::from(order.quantity),
                order.filled_price.map(|p| p.to_string()),
                format!("{:?}", order.status),
                order.placed_at.to_rfc3339(),
                order.filled_at.map(|t| t.to_rfc3339()),
                order.rejection_reason,
            ],
        )?;
        debug!(order_id = %order.id, "persisted order");
        Ok(())
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO positions (id, game_id, market_ticker, side, quantity, avg_entry_price, total_cost, realized_pnl, is_open, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                quantity = excluded.quantity,
                avg_entry_price = excluded.avg_entry_price,
                total_cost = excluded.total_cost,
                realized_pnl = excluded.realized_pnl,
                is_open = excluded.is_open,
                updated_at = excluded.updated_at",
            params![
                position.id.to_string(),
                position.game_id,
                position.market_ticker,
                position.side.as_str(),
                i64::from(position.quantity),
                position.avg_entry_price.to_string(),
                position.total_cost.to_string(),
                position.realized_pnl.to_string(),
                position.is_open,
                position.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn upsert_strategy(&self, record: &StrategyRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO strategies (strategy_id, strategy_type, is_enabled, config, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(strategy_id) DO UPDATE SET
                is_enabled = excluded.is_enabled,
                config = excluded.config,
                updated_at = excluded.updated_at",
            params![
                record.strategy_id,
                record.strategy_type,
                record.is_enabled,
                record.config.to_string(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_strategies(&self) -> Result<Vec<StrategyRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT strategy_id, strategy_type, is_enabled, config, created_at, updated_at FROM strategies",
        )?;
        let rows = stmt.query_map([], |row| {
            let config_str: String = row.get(3)?;
            let created_at: String = row.get(4)?;
            let updated_at: String = row.get(5)?;
            Ok(StrategyRecord {
                strategy_id: row.get(0)?,
                strategy_type: row.get(1)?,
                is_enabled: row.get(2)?,
                config: serde_json::from_str(&config_str).unwrap_or(serde_json::Value::Null),
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| crate::error::EngineError::Internal(e.to_string()))?);
        }
        Ok(out)
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}
