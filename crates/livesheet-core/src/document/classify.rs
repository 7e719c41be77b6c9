//! Line classification.
//!
//! Equation-shaped lines (those with a structural `=`) are matched against
//! [`EQUATION_ORDER`]; the first predicate that accepts the line wins.
//! Lines without `=` are either a colon result (`total: 5 + 3`) or a solo
//! line remembered for a later bare `=`.

use std::fmt;

use livesheet_engine::engine::{ExpressionEngine, Node, Scope};

use super::normalize::normalize;
use super::shape::{ResultVisitor, Shape, shape_of, shape_of_node};
use super::units::RatioPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineClassification {
    Comment,
    Empty,
    PairRatioDefinition,
    PureExpression,
    DirectConstant,
    VariableAssignment,
    ForcedResultOverwrite,
    CascadingAssignment,
    VariableNoValue,
    ImpliedResult,
    FunctionDefinition,
    ImplicitColonResult,
    SoloLine,
    Unclassified,
}

/// Predicates tried, in order, on equation-shaped lines.
/// `VariableAssignment` also covers `ForcedResultOverwrite`, which applies
/// to indented lines re-assigning a variable that is already bound.
pub const EQUATION_ORDER: &[LineClassification] = &[
    LineClassification::PairRatioDefinition,
    LineClassification::PureExpression,
    LineClassification::DirectConstant,
    LineClassification::VariableAssignment,
    LineClassification::CascadingAssignment,
    LineClassification::VariableNoValue,
    LineClassification::ImpliedResult,
    LineClassification::FunctionDefinition,
];

/// Indentation (in columns) from which a line forces a recompute.
pub const FORCED_INDENT: usize = 2;

impl fmt::Display for LineClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Leading whitespace of `line` and its width in columns (tabs count 4).
pub fn split_indent(line: &str) -> (&str, usize) {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];
    let width = indent.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum();
    (indent, width)
}

/// Split on structural `=` signs, skipping `==`, `<=`, `>=` and `!=`.
/// Segments are trimmed.
pub fn split_equation(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    for (idx, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = idx.checked_sub(1).map(|i| bytes[i]);
        let next = bytes.get(idx + 1).copied();
        let is_operator = matches!(prev, Some(b'=' | b'<' | b'>' | b'!')) || next == Some(b'=');
        if !is_operator {
            segments.push(text[start..idx].trim());
            start = idx + 1;
        }
    }
    segments.push(text[start..].trim());
    segments
}

/// Position of the rightmost `:` that is outside brackets and not escaped.
pub fn find_result_colon(text: &str) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut found = None;
    let mut prev = None;
    for (idx, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ':' if depth == 0 && prev != Some('\\') => found = Some(idx),
            _ => {}
        }
        prev = Some(c);
    }
    found
}

fn is_placeholder(text: &str) -> bool {
    text.is_empty() || text == "?"
}

/// One side of a line, as written and as the engine sees it.
#[derive(Debug, Clone)]
pub struct Part {
    pub raw: String,
    pub normalized: String,
    pub shape: Shape,
    /// Set when the side is a bare name (even one that is also a unit).
    pub symbol: Option<String>,
    /// The side contains a literal rather than only unit names.
    pub has_literal: bool,
}

impl Part {
    pub fn new<E: ExpressionEngine + ?Sized>(raw: &str, engine: &E, scope: &Scope) -> Self {
        let normalized = normalize(raw, engine);
        let parsed = if normalized.is_empty() {
            None
        } else {
            engine.parse(&normalized).ok()
        };
        let (shape, symbol, has_literal) = match &parsed {
            Some(node) => (
                shape_of_node(node, engine, scope),
                node.as_symbol().map(str::to_string),
                ResultVisitor::new(engine, scope).has_literal(node),
            ),
            None => (shape_of(&normalized, engine, scope), None, false),
        };
        Part {
            raw: raw.to_string(),
            normalized,
            shape,
            symbol,
            has_literal,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        is_placeholder(self.raw.trim())
    }
}

/// An equation-shaped line split into its parts.
#[derive(Debug, Clone)]
pub struct EquationLine {
    pub indent_width: usize,
    /// Segments before the last two, as written.
    pub prefixes: Vec<Part>,
    pub left: Part,
    pub right: Part,
}

impl EquationLine {
    pub fn new<E: ExpressionEngine + ?Sized>(
        segments: &[&str],
        indent_width: usize,
        engine: &E,
        scope: &Scope,
    ) -> Self {
        let n = segments.len();
        debug_assert!(n >= 2);
        let prefixes = segments[..n - 2]
            .iter()
            .map(|s| Part::new(s, engine, scope))
            .collect();
        EquationLine {
            indent_width,
            prefixes,
            left: Part::new(segments[n - 2], engine, scope),
            right: Part::new(segments[n - 1], engine, scope),
        }
    }

    pub fn is_indented(&self) -> bool {
        self.indent_width >= FORCED_INDENT
    }

    fn right_is_result_or_empty(&self) -> bool {
        self.right.is_placeholder() || self.right.shape == Shape::Result
    }

    /// Whole line as the engine sees it.
    pub fn normalized_line(&self) -> String {
        self.prefixes
            .iter()
            .chain([&self.left, &self.right])
            .map(|p| p.normalized.as_str())
            .collect::<Vec<_>>()
            .join(" = ")
    }

    /// Whether the predicate for `class` accepts this line.
    pub fn matches(&self, class: LineClassification, scope: &Scope) -> bool {
        use LineClassification::*;
        match class {
            PairRatioDefinition => {
                let Some(pair) = RatioPair::parse(&self.left.raw) else {
                    return false;
                };
                !scope.contains(&pair.base)
                    && !scope.contains(&pair.quote)
                    && !livesheet_engine::engine::is_builtin_unit(&pair.quote)
                    && (self.right.is_placeholder()
                        || matches!(self.right.shape, Shape::Result))
            }
            PureExpression => {
                self.left.shape.is_evaluable()
                    && (self.right_is_result_or_empty() || self.right.shape == Shape::Invalid)
            }
            DirectConstant => {
                self.left.shape == Shape::Result
                    && self.left.has_literal
                    && self.right_is_result_or_empty()
            }
            VariableAssignment | ForcedResultOverwrite => {
                self.left.symbol.is_some()
                    && !self.right.is_placeholder()
                    && matches!(
                        self.right.shape,
                        Shape::Expression | Shape::Result | Shape::Call { .. } | Shape::Invalid
                    )
            }
            CascadingAssignment => {
                self.left.symbol.is_some() && matches!(self.right.shape, Shape::Identifier(_))
            }
            VariableNoValue => self.left.symbol.is_some() && self.right.is_placeholder(),
            ImpliedResult => self.left.raw.is_empty() && self.right_is_result_or_empty(),
            FunctionDefinition => {
                matches!(self.left.shape, Shape::Call { .. }) && !self.right.is_placeholder()
            }
            Comment | Empty | ImplicitColonResult | SoloLine | Unclassified => false,
        }
    }

    /// First matching classification, or `Unclassified`.
    pub fn classify(&self, scope: &Scope) -> LineClassification {
        EQUATION_ORDER
            .iter()
            .copied()
            .find(|class| self.matches(*class, scope))
            .map(|class| match class {
                LineClassification::VariableAssignment
                    if self.is_indented()
                        && self.left.symbol.as_deref().is_some_and(|s| scope.contains(s)) =>
                {
                    LineClassification::ForcedResultOverwrite
                }
                other => other,
            })
            .unwrap_or(LineClassification::Unclassified)
    }
}

/// A solo line with a trailing result marker: `left: right`.
#[derive(Debug, Clone)]
pub struct ColonLine {
    pub left: Part,
    pub right: Part,
}

impl ColonLine {
    /// Split `text` at its result colon and accept it when the left side
    /// is worth evaluating and the right is empty or a printed result.
    pub fn parse<E: ExpressionEngine + ?Sized>(text: &str, engine: &E, scope: &Scope) -> Option<Self> {
        let idx = find_result_colon(text)?;
        let left_raw = text[..idx].trim();
        let right_raw = text[idx + 1..].trim();
        if left_raw.is_empty() {
            return None;
        }
        let left = Part::new(left_raw, engine, scope);
        let bound = left.symbol.as_deref().is_some_and(|name| scope.contains(name));
        if !(left.shape.is_evaluable() || bound) {
            return None;
        }
        let right = Part::new(right_raw, engine, scope);
        if !(right.is_placeholder() || right.shape == Shape::Result) {
            return None;
        }
        Some(ColonLine { left, right })
    }
}

/// Whether a solo line reads like an expression (used for statistics).
pub fn is_solo_expression<E: ExpressionEngine + ?Sized>(text: &str, engine: &E, scope: &Scope) -> bool {
    let normalized = normalize(text, engine);
    match engine.parse(&normalized) {
        Ok(Node::Symbol(_)) | Err(_) => false,
        Ok(node) => matches!(
            shape_of_node(&node, engine, scope),
            Shape::Expression | Shape::Call { .. }
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesheet_engine::engine::{MathEngine, Value};
    use LineClassification::*;

    fn classify_with(text: &str, scope: &Scope, engine: &MathEngine) -> LineClassification {
        let (indent, width) = split_indent(text);
        let body = &text[indent.len()..];
        let segments = split_equation(body);
        EquationLine::new(&segments, width, engine, scope).classify(scope)
    }

    fn classify(text: &str) -> LineClassification {
        classify_with(text, &Scope::new(), &MathEngine::new())
    }

    #[test]
    fn test_split_equation_skips_comparison_operators() {
        assert_eq!(split_equation("5 + 3 ="), vec!["5 + 3", ""]);
        assert_eq!(split_equation("a == b = true"), vec!["a == b", "true"]);
        assert_eq!(split_equation("a <= b"), vec!["a <= b"]);
        assert_eq!(split_equation("x != 1 = true"), vec!["x != 1", "true"]);
        assert_eq!(split_equation("a = b = 1 + 2 ="), vec!["a", "b", "1 + 2", ""]);
    }

    #[test]
    fn test_find_result_colon() {
        assert_eq!(find_result_colon("total: 5"), Some(5));
        assert_eq!(find_result_colon("f(a:b)"), None);
        assert_eq!(find_result_colon("x \\: y"), None);
        assert_eq!(find_result_colon("a: b: c"), Some(4));
    }

    #[test]
    fn test_split_indent() {
        assert_eq!(split_indent("  a = 2"), ("  ", 2));
        assert_eq!(split_indent("\ta"), ("\t", 4));
        assert_eq!(split_indent("a"), ("", 0));
    }

    #[test]
    fn test_equation_classes() {
        assert_eq!(classify("5 + 3 ="), PureExpression);
        assert_eq!(classify("5 + 3 = 100"), PureExpression);
        assert_eq!(classify("1 + 1 = ?"), PureExpression);
        assert_eq!(classify("5 + 3 = 8 +"), PureExpression);
        assert_eq!(classify("sqrt(16) ="), PureExpression);
        assert_eq!(classify("0b1010 ="), DirectConstant);
        assert_eq!(classify("a = 2"), VariableAssignment);
        assert_eq!(classify("m = 5"), VariableAssignment);
        assert_eq!(classify("a = 2 +"), VariableAssignment);
        assert_eq!(classify("  a = 2"), VariableAssignment);
        assert_eq!(classify("b = a"), CascadingAssignment);
        assert_eq!(classify("a ="), VariableNoValue);
        assert_eq!(classify("="), ImpliedResult);
        assert_eq!(classify("= 8"), ImpliedResult);
        assert_eq!(classify("f(x) = x^2"), FunctionDefinition);
        assert_eq!(classify("EUR/USD = 1.1"), PairRatioDefinition);
        assert_eq!(classify("5 + 3 = x"), Unclassified);
    }

    #[test]
    fn test_indented_reassignment_is_forced() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        scope.set("a", Value::Number(2.0));
        assert_eq!(classify_with("  a = 2", &scope, &engine), ForcedResultOverwrite);
        assert_eq!(classify_with("\ta = 7", &scope, &engine), ForcedResultOverwrite);
        assert_eq!(classify_with(" a = 2", &scope, &engine), VariableAssignment);
    }

    #[test]
    fn test_ratio_needs_free_names() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        scope.set("a", Value::Number(1.0));
        assert_eq!(classify_with("a / b = 2", &scope, &engine), PureExpression);
        // Built-in units are never redefined by a ratio line.
        assert_eq!(classify_with("apples / kg = 2", &scope, &engine), PureExpression);
        assert_eq!(classify_with("apples / pears = 2", &scope, &engine), PairRatioDefinition);
    }

    #[test]
    fn test_defined_function_call_is_an_expression() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        engine.evaluate("f(x) = x + 1", &mut scope).unwrap();
        assert_eq!(classify_with("f(2) =", &scope, &engine), PureExpression);
        assert_eq!(classify_with("f(y) = 3", &scope, &engine), FunctionDefinition);
    }

    #[test]
    fn test_colon_lines() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        assert!(ColonLine::parse("total: 5 + 3", &engine, &scope).is_none());
        assert!(ColonLine::parse("5 + 3:", &engine, &scope).is_some());
        assert!(ColonLine::parse("5 + 3: 8", &engine, &scope).is_some());
        assert!(ColonLine::parse("Shopping list:", &engine, &scope).is_none());
        scope.set("price", Value::Number(3.0));
        assert!(ColonLine::parse("price:", &engine, &scope).is_some());
        assert!(ColonLine::parse("x > 1 ? 2 : 3", &engine, &scope).is_none());
    }

    #[test]
    fn test_solo_expressions() {
        let engine = MathEngine::new();
        let scope = Scope::new();
        assert!(is_solo_expression("5 + 3", &engine, &scope));
        assert!(!is_solo_expression("Shopping list", &engine, &scope));
        assert!(!is_solo_expression("hello, world!", &engine, &scope));
    }
}
