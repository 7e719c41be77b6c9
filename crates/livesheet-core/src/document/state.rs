use livesheet_engine::engine::{Scope, Value};

/// Counters describing the last `calculate` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Equation-shaped lines processed.
    pub total_calculations: usize,
    /// Lines where a computed value was printed.
    pub total_results_provided: usize,
    /// Solo lines that look like expressions.
    pub total_solo_expressions: usize,
    /// Lines annotated with an error.
    pub total_errors: usize,
}

impl Statistics {
    /// True when the sheet has expressions but none of them asked for a
    /// result, i.e. the user probably does not know about `=`.
    pub fn needs_usage_hint(&self) -> bool {
        self.total_solo_expressions > 0 && self.total_results_provided == 0
    }
}

/// Cross-line memory used by implied-result lines (a bare `=`).
#[derive(Debug, Clone, Default)]
pub struct CarryOver {
    pub last_evaluated_answer: Option<Value>,
    /// Normalized text of the latest solo line not yet shown a result.
    pub last_unevaluated_line: Option<String>,
}

/// Mutable per-document state threaded through the lines of a sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetState {
    pub scope: Scope,
    pub carry: CarryOver,
    pub stats: Statistics,
}

impl SheetState {
    /// Forget variables and carry-over; statistics are kept.
    pub fn reset_document(&mut self) {
        self.scope.clear();
        self.carry = CarryOver::default();
    }

    pub fn reset(&mut self) {
        self.reset_document();
        self.stats = Statistics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_document_keeps_statistics() {
        let mut state = SheetState::default();
        state.scope.set("a", Value::Number(1.0));
        state.carry.last_unevaluated_line = Some("1 + 1".into());
        state.stats.total_calculations = 3;

        state.reset_document();
        assert!(state.scope.is_empty());
        assert!(state.carry.last_unevaluated_line.is_none());
        assert_eq!(state.stats.total_calculations, 3);

        state.reset();
        assert_eq!(state.stats, Statistics::default());
    }

    #[test]
    fn test_usage_hint() {
        let mut stats = Statistics::default();
        assert!(!stats.needs_usage_hint());
        stats.total_solo_expressions = 2;
        assert!(stats.needs_usage_hint());
        stats.total_results_provided = 1;
        assert!(!stats.needs_usage_hint());
    }
}
