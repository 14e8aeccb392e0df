//! Runtime configuration, loaded once from the environment at startup.

use std::env;

/// Application configuration loaded from environment variables.
///
/// Required fields (credentials) panic at startup if missing; everything
/// else falls back to a sane default the way the reference backend's
/// `Config::from_env` does.
#[derive(Debug, Clone)]
pub struct Config {
    pub kalshi_api_url: String,
    pub kalshi_ws_url: String,
    pub kalshi_api_key: String,
    pub kalshi_private_key_pem: String,

    pub sports_api_url: String,
    pub sports_api_key: String,

    pub database_path: String,

    pub environment: String,
    pub log_level: String,
    pub frontend_url: String,

    pub nba_poll_interval_secs: u64,
    pub betting_odds_poll_interval_secs: u64,
    pub strategy_eval_interval_secs: u64,
    pub pnl_calc_interval_secs: u64,

    pub http_port: u16,
}

impl Config {
    /// Load configuration from the environment, reading a `.env` file first
    /// if present. Panics on a missing required secret — configuration
    /// errors belong at startup, not mid-run.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            kalshi_api_url: env::var("KALSHI_API_URL")
                .unwrap_or_else(|_| "https://api.elections.kalshi.com/trade-api/v2".to_string()),
            kalshi_ws_url: env::var("KALSHI_WS_URL").unwrap_or_else(|_| {
                "wss://api.elections.kalshi.com/trade-api/ws/v2".to_string()
            }),
            kalshi_api_key: env::var("KALSHI_API_KEY")
                .expect("KALSHI_API_KEY must be set"),
            kalshi_private_key_pem: env::var("KALSHI_PRIVATE_KEY_PEM")
                .expect("KALSHI_PRIVATE_KEY_PEM must be set")
                .replace("\\n", "\n"),

            sports_api_url: env::var("SPORTS_API_URL")
                .unwrap_or_else(|_| "https://api.balldontlie.io".to_string()),
            sports_api_key: env::var("SPORTS_API_KEY").expect("SPORTS_API_KEY must be set"),

            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "sideline-edge.db".to_string()),

            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            nba_poll_interval_secs: env::var("NBA_POLL_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            betting_odds_poll_interval_secs: env::var("BETTING_ODDS_POLL_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            strategy_eval_interval_secs: env::var("STRATEGY_EVAL_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            pnl_calc_interval_secs: env::var("PNL_CALC_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            http_port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
        }
    }
}
