//! HTTP API handlers for icoach-ai
//!
//! Thin adapter exposing the orchestration core to the presentation layer
//! via HTTP REST + SSE.

pub mod health;
pub mod session;
pub mod sse;

pub use health::health_routes;
pub use session::session_routes;
pub use sse::event_stream;
