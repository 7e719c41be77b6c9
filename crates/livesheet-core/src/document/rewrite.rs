//! Per-line rewriting: classify, evaluate, print.

use livesheet_engine::engine::{ExpressionEngine, Value};

use super::Calculator;
use super::classify::{
    ColonLine, EquationLine, LineClassification, Part, is_solo_expression, split_equation,
    split_indent,
};
use super::normalize::normalize;
use super::units::RatioPair;
use crate::error::LineError;

const ERROR_MARKER: &str = "Error:";

/// Drop an `Error: ...` annotation left by a previous run.
/// Only lines that carry an `=` or `:` before the marker are touched.
pub(crate) fn strip_error(line: &str) -> &str {
    match line.find(ERROR_MARKER) {
        Some(idx) => {
            let before = &line[..idx];
            let separated = before.is_empty() || before.ends_with(char::is_whitespace);
            if separated && before.contains(['=', ':']) {
                before.trim_end()
            } else {
                line
            }
        }
        None => line,
    }
}

impl<E: ExpressionEngine> Calculator<E> {
    /// Rewrite one line (without its `\n`). A trailing `\r` is kept.
    pub fn process_line(&mut self, line: &str) -> String {
        match line.strip_suffix('\r') {
            Some(body) => format!("{}\r", self.rewrite_line(body)),
            None => self.rewrite_line(line),
        }
    }

    fn rewrite_line(&mut self, line: &str) -> String {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            tracing::trace!(class = %LineClassification::Empty, "line");
            return line.to_string();
        }
        if trimmed.starts_with('#') {
            tracing::trace!(class = %LineClassification::Comment, "line");
            return line.to_string();
        }

        let cleaned = strip_error(line);
        let (indent, width) = split_indent(cleaned);
        let body = &cleaned[indent.len()..];
        let segments = split_equation(body);
        let result = if segments.len() > 1 {
            self.rewrite_equation(cleaned, indent, width, &segments)
        } else {
            self.rewrite_solo(cleaned, indent, body)
        };

        match result {
            Ok(text) => text,
            Err(err) => {
                self.state.stats.total_errors += 1;
                tracing::debug!(line = cleaned, error = %err, "line failed");
                format!("{} Error: {}", cleaned.trim_end(), err)
            }
        }
    }

    fn rewrite_equation(
        &mut self,
        cleaned: &str,
        indent: &str,
        width: usize,
        segments: &[&str],
    ) -> Result<String, LineError> {
        use LineClassification::*;

        self.state.stats.total_calculations += 1;
        let line = EquationLine::new(segments, width, &self.engine, &self.state.scope);
        let class = line.classify(&self.state.scope);
        tracing::debug!(%class, line = cleaned.trim(), "classified");
        if class != ImpliedResult {
            self.state.carry.last_unevaluated_line = None;
        }

        match class {
            PairRatioDefinition => {
                let pair = RatioPair::parse(&line.left.raw).ok_or(LineError::Unclassified)?;
                let rate = (!line.right.is_placeholder()).then_some(line.right.normalized.as_str());
                self.registrar.register_ratio(&self.engine, &pair, rate)?;
                Ok(cleaned.to_string())
            }
            PureExpression | DirectConstant => {
                let value = self.evaluate(&line.left.normalized)?;
                for name in line.prefixes.iter().filter_map(|p| p.symbol.as_ref()) {
                    self.state.scope.set(name.clone(), value.clone());
                }
                Ok(self.print_result(indent, &line, &value))
            }
            VariableAssignment => {
                let declared = self.registrar.register_assignment_unit(
                    &self.engine,
                    &line.right.raw,
                    &self.state.scope,
                );
                let text = match declared {
                    // The new unit changes how the value normalizes.
                    Some(_) => self.renormalized(&line),
                    None => line.normalized_line(),
                };
                self.evaluate(&text)?;
                Ok(cleaned.to_string())
            }
            ForcedResultOverwrite => {
                let value = self.evaluate(&line.left.normalized)?;
                Ok(self.print_result(indent, &line, &value))
            }
            CascadingAssignment | FunctionDefinition => {
                self.evaluate(&line.normalized_line())?;
                Ok(cleaned.to_string())
            }
            VariableNoValue => {
                if line.is_indented() {
                    let value = self.evaluate(&line.left.normalized)?;
                    Ok(self.print_result(indent, &line, &value))
                } else {
                    Ok(cleaned.to_string())
                }
            }
            ImpliedResult => {
                if let Some(pending) = self.state.carry.last_unevaluated_line.take() {
                    let value = self.evaluate(&pending)?;
                    Ok(self.print_result(indent, &line, &value))
                } else if let Some(answer) = self.state.carry.last_evaluated_answer.clone() {
                    Ok(self.print_result(indent, &line, &answer))
                } else {
                    Ok(cleaned.to_string())
                }
            }
            _ => {
                tracing::trace!(
                    left = ?self.engine.parse(&line.left.normalized),
                    right = ?self.engine.parse(&line.right.normalized),
                    "unclassified line"
                );
                Err(LineError::Unclassified)
            }
        }
    }

    fn rewrite_solo(&mut self, cleaned: &str, indent: &str, body: &str) -> Result<String, LineError> {
        if let Some(colon) = ColonLine::parse(body, &self.engine, &self.state.scope) {
            tracing::debug!(class = %LineClassification::ImplicitColonResult, line = body, "classified");
            self.state.carry.last_unevaluated_line = None;
            let value = self.evaluate(&colon.left.normalized)?;
            self.state.stats.total_results_provided += 1;
            return Ok(format!("{}{}: {}", indent, colon.left.raw, self.show(&value)));
        }

        tracing::debug!(class = %LineClassification::SoloLine, line = body, "classified");
        if is_solo_expression(body, &self.engine, &self.state.scope) {
            self.state.stats.total_solo_expressions += 1;
        }
        self.state.carry.last_unevaluated_line = Some(normalize(body, &self.engine));
        Ok(cleaned.to_string())
    }

    /// Evaluate and remember the answer. Non-finite values are errors.
    fn evaluate(&mut self, text: &str) -> Result<Value, LineError> {
        let value = self.engine.evaluate(text, &mut self.state.scope)?;
        if !value.is_finite() {
            return Err(LineError::NonFiniteResult);
        }
        self.state.carry.last_evaluated_answer = Some(value.clone());
        Ok(value)
    }

    fn show(&self, value: &Value) -> String {
        self.registrar.expand(&self.engine.format(value))
    }

    /// `prefix = ... = left = value`, or `= value` for a bare `=`.
    fn print_result(&mut self, indent: &str, line: &EquationLine, value: &Value) -> String {
        self.state.stats.total_results_provided += 1;
        let mut written: Vec<&str> = line.prefixes.iter().map(|p| p.raw.as_str()).collect();
        if !line.left.raw.is_empty() {
            written.push(&line.left.raw);
        }
        let shown = self.show(value);
        if written.is_empty() {
            format!("{}= {}", indent, shown)
        } else {
            format!("{}{} = {}", indent, written.join(" = "), shown)
        }
    }

    fn renormalized(&self, line: &EquationLine) -> String {
        line.prefixes
            .iter()
            .chain([&line.left, &line.right])
            .map(|p: &Part| normalize(&p.raw, &self.engine))
            .collect::<Vec<_>>()
            .join(" = ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(text: &str) -> String {
        Calculator::default().calculate(text)
    }

    #[test]
    fn test_strip_error() {
        assert_eq!(strip_error("1 / 0 = Error: Infinity"), "1 / 0 =");
        assert_eq!(strip_error("x: Error: Undefined symbol x"), "x:");
        assert_eq!(strip_error("Syntax Error: see notes"), "Syntax Error: see notes");
        assert_eq!(strip_error("a = 2"), "a = 2");
    }

    #[test]
    fn test_pure_expressions() {
        assert_eq!(calc("5 + 3 ="), "5 + 3 = 8");
        assert_eq!(calc("5 + 3 = 100"), "5 + 3 = 8");
        assert_eq!(calc("1 + 1 = ?"), "1 + 1 = 2");
        assert_eq!(calc("  5 + 3 ="), "  5 + 3 = 8");
    }

    #[test]
    fn test_assignments_and_prefix_binding() {
        let out = calc("a = 2\nb = a\na * b =\nx = y = 1 + 2 =\nx + y =");
        assert_eq!(out, "a = 2\nb = a\na * b = 4\nx = y = 1 + 2 = 3\nx + y = 6");
    }

    #[test]
    fn test_variable_no_value() {
        assert_eq!(calc("a = 2\na ="), "a = 2\na =");
        assert_eq!(calc("a = 2\n  a ="), "a = 2\n  a = 2");
    }

    #[test]
    fn test_forced_overwrite_refreshes_printed_value() {
        assert_eq!(calc("a = 2 + 3\n  a = 7"), "a = 2 + 3\n  a = 5");
    }

    #[test]
    fn test_implied_result() {
        assert_eq!(calc("5 + 3\n="), "5 + 3\n= 8");
        assert_eq!(calc("5 + 3\n= 1"), "5 + 3\n= 8");
        assert_eq!(calc("2 * 4 =\n="), "2 * 4 = 8\n= 8");
        assert_eq!(calc("="), "=");
    }

    #[test]
    fn test_errors_are_annotated_and_replaced() {
        assert_eq!(calc("1 / 0 ="), "1 / 0 = Error: Infinity. Possible Division by zero");
        assert_eq!(
            calc("1 / 0 = Error: Infinity. Possible Division by zero"),
            "1 / 0 = Error: Infinity. Possible Division by zero"
        );
        assert_eq!(calc("x + 1 ="), "x + 1 = Error: Undefined symbol x");
        assert_eq!(calc("5 + 3 = x"), "5 + 3 = x Error: Unhandled case");
    }

    #[test]
    fn test_colon_results() {
        assert_eq!(calc("5 + 3:"), "5 + 3: 8");
        assert_eq!(calc("price = 3\nprice: 1"), "price = 3\nprice: 3");
        assert_eq!(calc("Shopping list:"), "Shopping list:");
    }

    #[test]
    fn test_comments_and_prose_pass_through() {
        let text = "# Error: not an annotation\nSome notes about apples\n\n";
        assert_eq!(calc(text), text);
    }

    #[test]
    fn test_assignment_declares_units() {
        let out = calc("price = 5 apples\nprice * 2 =");
        assert_eq!(out, "price = 5 apples\nprice * 2 = 10 apples");
    }

    #[test]
    fn test_multi_word_units_print_as_written() {
        let out = calc("USD/NZD = 1.5\nprice = 3 USD inc GST\nprice * 2 =");
        assert_eq!(out, "USD/NZD = 1.5\nprice = 3 USD inc GST\nprice * 2 = 6 USD inc GST");
    }

    #[test]
    fn test_carriage_returns_survive() {
        assert_eq!(calc("1 + 1 =\r\n2 + 2 =\r"), "1 + 1 = 2\r\n2 + 2 = 4\r");
    }

    #[test]
    fn test_functions() {
        let out = calc("f(x) = x^2\nf(3) =");
        assert_eq!(out, "f(x) = x^2\nf(3) = 9");
    }
}
