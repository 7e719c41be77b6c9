//! Error types for the expression engine.

use thiserror::Error;

/// Errors raised while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{0}")]
    Parse(String),

    #[error("Undefined symbol {0}")]
    UndefinedSymbol(String),

    #[error("Undefined function {0}")]
    UndefinedFunction(String),

    #[error("{0}")]
    Unit(String),

    #[error("{0}")]
    Type(String),

    #[error("Wrong number of arguments in function {name} ({actual} provided, {expected} expected)")]
    ArgumentCount {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("Error in custom functions: {0}")]
    Script(String),
}

impl EngineError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        EngineError::Parse(message.into())
    }

    pub(crate) fn unit(message: impl Into<String>) -> Self {
        EngineError::Unit(message.into())
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EngineError::Type(message.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
