//! Middleware for observability.
//!
//! Request logging with latency tracking, layered under `tower_http`'s own
//! `TraceLayer` on every route.

pub mod logging;

pub use logging::{request_logging, request_logging_simple};
