//! livesheet_engine - Expression parser, unit-aware evaluator and builtins.

pub(crate) mod builtins;
pub mod engine;
pub mod error;

pub use error::{EngineError, Result};
