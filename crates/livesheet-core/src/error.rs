//! Error types for Livesheet core.

use livesheet_engine::EngineError;
use thiserror::Error;

/// Errors raised by document-level operations (files, function scripts).
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Refusing to read {path}: file too large ({size} bytes, max {max})")]
    TooLarge { path: String, size: u64, max: u64 },

    #[error("No functions file loaded")]
    NoFunctionsLoaded,
}

/// Why a single line could not be rewritten. The `Display` text is what
/// follows `Error: ` on the annotated line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error("Undefined symbol {0}")]
    UndefinedSymbol(String),

    #[error("Infinity. Possible Division by zero")]
    NonFiniteResult,

    #[error("Unhandled case")]
    Unclassified,

    #[error("{0}")]
    Engine(String),
}

impl From<EngineError> for LineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UndefinedSymbol(name) => LineError::UndefinedSymbol(name),
            other => LineError::from_message(other.to_string()),
        }
    }
}

impl LineError {
    /// Build an error from an engine message, recognising the
    /// `Undefined symbol <name>` shape wherever it appears (script errors
    /// embed it in longer text).
    pub fn from_message(message: String) -> Self {
        match undefined_symbol_re().captures(&message) {
            Some(caps) => LineError::UndefinedSymbol(caps[1].to_string()),
            None => LineError::Engine(message),
        }
    }
}

fn undefined_symbol_re() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"Undefined symbol (\w+)").expect("undefined symbol regex must compile")
    })
}

pub type Result<T> = std::result::Result<T, SheetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_error_messages() {
        assert_eq!(LineError::UndefinedSymbol("x".into()).to_string(), "Undefined symbol x");
        assert_eq!(
            LineError::NonFiniteResult.to_string(),
            "Infinity. Possible Division by zero"
        );
        assert_eq!(LineError::Unclassified.to_string(), "Unhandled case");
    }

    #[test]
    fn test_engine_errors_map_to_line_errors() {
        let err: LineError = EngineError::UndefinedSymbol("cats".into()).into();
        assert_eq!(err, LineError::UndefinedSymbol("cats".into()));

        let err: LineError = EngineError::Script("Undefined symbol rate (line 1)".into()).into();
        assert_eq!(err, LineError::UndefinedSymbol("rate".into()));

        let err: LineError = EngineError::UndefinedFunction("foo".into()).into();
        assert_eq!(err, LineError::Engine("Undefined function foo".into()));
    }
}
