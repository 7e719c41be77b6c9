//! livesheet-core - Line classifier, document rewriter and storage.

pub mod document;
pub mod error;
pub mod storage;

pub use document::{Calculator, LineClassification, Statistics};
pub use error::{LineError, Result, SheetError};

pub use livesheet_engine::engine::{ExpressionEngine, MathEngine, Scope, UnitRegistry, Value};
