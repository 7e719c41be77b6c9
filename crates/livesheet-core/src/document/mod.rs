//! Document rewriting (UI-agnostic).
//!
//! [`Calculator`] walks a sheet line by line, classifies each line, asks the
//! engine for values and writes the rewritten sheet back. Variables live
//! for one `calculate` call; units defined by the sheet live as long as the
//! calculator's engine.

mod classify;
mod io;
mod normalize;
mod rewrite;
mod shape;
mod state;
mod units;

pub use classify::{
    ColonLine, EQUATION_ORDER, EquationLine, FORCED_INDENT, LineClassification, Part,
    find_result_colon, is_solo_expression, split_equation, split_indent,
};
pub use io::{MAX_FUNCTION_FILE_BYTES, read_sheet, write_sheet};
pub use normalize::{RESERVED_WORDS, normalize};
pub use shape::{ResultVisitor, Shape, shape_of};
pub use state::{CarryOver, SheetState, Statistics};
pub use units::{RatioPair, UnitRegistrar};

use crate::storage::map_math_sections;
use livesheet_engine::engine::{ExpressionEngine, MathEngine, Scope};
use std::path::PathBuf;

pub struct Calculator<E: ExpressionEngine = MathEngine> {
    /// Expression engine; owns the unit registry.
    pub engine: E,
    /// Display names for collapsed unit names, shared with clones.
    pub registrar: UnitRegistrar,
    /// Scope, carry-over and statistics of the current call.
    pub(crate) state: SheetState,
    /// Paths to loaded Rhai function files
    pub functions_files: Vec<PathBuf>,
    /// Concatenated contents of `functions_files`
    pub custom_functions: Option<String>,
}

impl<E: ExpressionEngine> Calculator<E> {
    pub fn new(engine: E) -> Self {
        Calculator {
            engine,
            registrar: UnitRegistrar::new(),
            state: SheetState::default(),
            functions_files: Vec::new(),
            custom_functions: None,
        }
    }

    /// Rewrite every line of `text`. Line count is preserved.
    pub fn calculate(&mut self, text: &str) -> String {
        self.state.reset();
        self.run(text)
    }

    /// Rewrite only the inside of ```` ```math ```` / ```` ```calc ```` fences,
    /// each with a fresh scope. Everything else is copied verbatim.
    pub fn calculate_with_math_sections(&mut self, text: &str) -> String {
        self.state.reset();
        map_math_sections(text, |body| {
            self.state.reset_document();
            self.run(body)
        })
    }

    /// Statistics of the last `calculate` call.
    pub fn statistics(&self) -> Statistics {
        self.state.stats
    }

    /// Variables bound by the last `calculate` call.
    pub fn scope(&self) -> &Scope {
        &self.state.scope
    }

    fn run(&mut self, text: &str) -> String {
        text.split('\n')
            .map(|line| self.process_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Calculator<MathEngine> {
    fn default() -> Self {
        Self::new(MathEngine::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_resets_scope_between_calls() {
        let mut calc = Calculator::default();
        calc.calculate("a = 2");
        assert!(calc.scope().contains("a"));
        let out = calc.calculate("a + 1 =");
        assert_eq!(out, "a + 1 = Error: Undefined symbol a");
    }

    #[test]
    fn test_units_outlive_a_call() {
        let mut calc = Calculator::default();
        calc.calculate("EUR/USD = 1.1");
        assert_eq!(calc.calculate("11 EUR to USD ="), "11 EUR to USD = 10 USD");
    }

    #[test]
    fn test_line_count_and_trailing_newline_preserved() {
        let mut calc = Calculator::default();
        let out = calc.calculate("1 + 1 =\n\n# note\n");
        assert_eq!(out, "1 + 1 = 2\n\n# note\n");
    }

    #[test]
    fn test_statistics() {
        let mut calc = Calculator::default();
        calc.calculate("5 + 3\na = 2\na * 2 =\nhello");
        let stats = calc.statistics();
        assert_eq!(stats.total_calculations, 2);
        assert_eq!(stats.total_results_provided, 1);
        assert_eq!(stats.total_solo_expressions, 1);
        assert_eq!(stats.total_errors, 0);

        calc.calculate("1 / 0 =\nx =\ny + 1 =");
        assert_eq!(calc.statistics().total_errors, 2);

        calc.calculate("5 + 3");
        assert!(calc.statistics().needs_usage_hint());
    }
}
