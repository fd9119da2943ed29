//! HTTP API handlers for sieve-server
//!
//! - `GET /ws`: streaming runs over WebSocket
//! - `POST /api/filter`: one-shot run, JSON result
//! - `GET /health`: liveness and classifier readiness

pub mod filter;
pub mod health;
pub mod ws;

pub use filter::filter_routes;
pub use health::health_routes;
pub use ws::ws_routes;
