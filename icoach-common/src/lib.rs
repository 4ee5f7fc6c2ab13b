//! # icoach Common Library
//!
//! Shared code for the icoach crates:
//! - Error type
//! - TOML configuration model and loading
//! - Evaluation event types and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EvaluationEvent, EvaluationPhase, EventBus};
