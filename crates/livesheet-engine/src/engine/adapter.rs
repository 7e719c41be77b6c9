//! The contract the document layer consumes.
//!
//! The line classifier only needs to parse text into a [`Node`], evaluate it
//! against a [`Scope`], ask whether a word is a unit or built-in, register
//! new units and render values. Anything implementing this trait can drive a
//! sheet; [`MathEngine`] is the implementation shipped with the crate.

use super::ast::Node;
use super::eval::MathEngine;
use super::parser::parse_expression;
use super::value::{Scope, Value};
use crate::builtins;
use crate::error::Result;

pub trait ExpressionEngine {
    fn parse(&self, text: &str) -> Result<Node>;

    fn evaluate(&self, text: &str, scope: &mut Scope) -> Result<Value>;

    fn is_known_unit(&self, name: &str) -> bool;

    /// Register `name` as a unit, optionally defined in terms of existing
    /// units (`"1.1 EUR"`). Redefining a user unit replaces it.
    fn define_unit(&self, name: &str, definition: Option<&str>) -> Result<()>;

    /// Whether `name` is a built-in constant, built-in function or loaded
    /// user function.
    fn is_builtin(&self, name: &str) -> bool;

    fn format(&self, value: &Value) -> String;
}

impl ExpressionEngine for MathEngine {
    fn parse(&self, text: &str) -> Result<Node> {
        parse_expression(text)
    }

    fn evaluate(&self, text: &str, scope: &mut Scope) -> Result<Value> {
        self.evaluate_str(text, scope)
    }

    fn is_known_unit(&self, name: &str) -> bool {
        self.registry().contains(name)
    }

    fn define_unit(&self, name: &str, definition: Option<&str>) -> Result<()> {
        MathEngine::define_unit(self, name, definition)
    }

    fn is_builtin(&self, name: &str) -> bool {
        builtins::is_builtin_name(name) || self.is_custom_function(name)
    }

    fn format(&self, value: &Value) -> String {
        MathEngine::format(self, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> impl ExpressionEngine {
        MathEngine::new()
    }

    #[test]
    fn test_engine_through_trait() {
        let engine = engine();
        let mut scope = Scope::new();
        let value = engine.evaluate("a = 4", &mut scope).unwrap();
        assert_eq!(engine.format(&value), "4");
        assert!(scope.contains("a"));
        assert!(engine.is_known_unit("kg"));
        assert!(!engine.is_known_unit("cats"));
        assert!(engine.is_builtin("sqrt"));
        assert!(engine.is_builtin("pi"));
        assert!(!engine.is_builtin("kg"));
    }

    #[test]
    fn test_define_unit_through_trait() {
        let engine = engine();
        engine.define_unit("apples", None).unwrap();
        assert!(engine.is_known_unit("apples"));
        assert!(engine.define_unit("kg", None).is_err());
    }
}
