//! Expression evaluation.
//!
//! [`MathEngine`] owns a [`UnitRegistry`] handle and, optionally, a set of
//! user functions compiled from a Rhai script. Variables live in a
//! caller-supplied [`Scope`], so one engine can evaluate many documents.

use std::sync::Arc;

use super::ast::{BinaryOp, Node, UnaryOp};
use super::format::{DEFAULT_PRECISION, format_value};
use super::ops;
use super::parser::parse_expression;
use super::units::{UnitDef, UnitRegistry};
use super::value::{Quantity, Scope, UnitExpr, UserFunction, Value, unit_power};
use crate::builtins::{self, CustomFunctions};
use crate::error::{EngineError, Result};

/// Nested user-function calls deeper than this fail instead of overflowing.
const MAX_CALL_DEPTH: usize = 256;

pub struct MathEngine {
    registry: UnitRegistry,
    custom: Option<CustomFunctions>,
    precision: usize,
}

impl Default for MathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MathEngine {
    pub fn new() -> Self {
        Self::with_registry(UnitRegistry::new())
    }

    /// Create an engine sharing units with every other holder of `registry`.
    pub fn with_registry(registry: UnitRegistry) -> Self {
        MathEngine {
            registry,
            custom: None,
            precision: DEFAULT_PRECISION,
        }
    }

    /// Compile and install user functions, replacing any loaded before.
    pub fn load_functions(&mut self, script: &str) -> Result<()> {
        let custom = CustomFunctions::compile(script)?;
        tracing::debug!(
            functions = custom.names().count(),
            "loaded custom functions"
        );
        self.custom = Some(custom);
        Ok(())
    }

    pub fn set_precision(&mut self, precision: usize) {
        self.precision = precision.clamp(1, 17);
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn is_custom_function(&self, name: &str) -> bool {
        self.custom.as_ref().is_some_and(|c| c.contains(name))
    }

    /// Parse and evaluate `text` against `scope`.
    pub fn evaluate_str(&self, text: &str, scope: &mut Scope) -> Result<Value> {
        let node = parse_expression(text)?;
        self.eval(&node, scope)
    }

    /// Create or redefine a user unit. Without a definition the unit becomes
    /// a new base dimension; otherwise the definition (e.g. `1.1 EUR`) is
    /// evaluated and must produce a quantity.
    pub fn define_unit(&self, name: &str, definition: Option<&str>) -> Result<()> {
        let def = match definition {
            None => UnitDef::base(name),
            Some(text) => match self.evaluate_str(text, &mut Scope::new())? {
                Value::Quantity(q) => {
                    let base = self.registry.resolve(q.unit.parts())?;
                    UnitDef {
                        factor: q.value * base.factor,
                        dimensions: base.dimensions,
                    }
                }
                other => {
                    return Err(EngineError::unit(format!(
                        "Unit definition for {} must have a unit, got a {}",
                        name,
                        other.type_name()
                    )));
                }
            },
        };
        self.registry.define(name, def)
    }

    pub fn format(&self, value: &Value) -> String {
        format_value(value, self.precision)
    }

    pub fn eval(&self, node: &Node, scope: &mut Scope) -> Result<Value> {
        self.eval_at(node, scope, 0)
    }

    fn eval_at(&self, node: &Node, scope: &mut Scope, depth: usize) -> Result<Value> {
        match node {
            Node::Number(n) => Ok(Value::Number(*n)),
            Node::Bool(b) => Ok(Value::Bool(*b)),
            Node::Symbol(name) => self.lookup(name, scope),
            Node::Paren(inner) => self.eval_at(inner, scope, depth),
            Node::Unary { op, operand } => {
                let value = self.eval_at(operand, scope, depth)?;
                ops::unary(*op, value, &self.registry)
            }
            Node::Binary {
                op, left, right, ..
            } => {
                // Short-circuit logic operators.
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    let lhs = ops::truthy(&self.eval_at(left, scope, depth)?)?;
                    if (*op == BinaryOp::And && !lhs) || (*op == BinaryOp::Or && lhs) {
                        return Ok(Value::Bool(lhs));
                    }
                    let rhs = ops::truthy(&self.eval_at(right, scope, depth)?)?;
                    return Ok(Value::Bool(rhs));
                }
                let lhs = self.eval_at(left, scope, depth)?;
                let rhs = self.eval_at(right, scope, depth)?;
                ops::binary(*op, lhs, rhs, &self.registry)
            }
            Node::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let test = self.eval_at(cond, scope, depth)?;
                if ops::truthy(&test)? {
                    self.eval_at(then, scope, depth)
                } else {
                    self.eval_at(otherwise, scope, depth)
                }
            }
            Node::Convert { value, target } => {
                let value = self.eval_at(value, scope, depth)?;
                let target = self.unit_expr(target)?;
                ops::convert_value(&value, &target, &self.registry)
            }
            Node::Array(items) => items
                .iter()
                .map(|item| self.eval_at(item, scope, depth))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Node::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_at(arg, scope, depth)?);
                }
                self.call(name, values, scope, depth)
            }
            Node::Assign { name, value } => {
                let value = self.eval_at(value, scope, depth)?;
                scope.set(name.clone(), value.clone());
                Ok(value)
            }
            Node::FunctionAssign { name, params, body } => {
                let function = Value::Function(Arc::new(UserFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: (**body).clone(),
                }));
                scope.set(name.clone(), function.clone());
                Ok(function)
            }
        }
    }

    fn lookup(&self, name: &str, scope: &Scope) -> Result<Value> {
        if let Some(value) = scope.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = builtins::constant(name) {
            return Ok(Value::Number(value));
        }
        if self.registry.contains(name) {
            return Ok(Value::Quantity(Quantity::new(1.0, UnitExpr::single(name))));
        }
        Err(EngineError::UndefinedSymbol(name.to_string()))
    }

    fn call(&self, name: &str, args: Vec<Value>, scope: &Scope, depth: usize) -> Result<Value> {
        if let Some(value) = scope.get(name) {
            return match value {
                Value::Function(function) => self.call_user(function, args, scope, depth),
                other => Err(EngineError::type_error(format!(
                    "{} is a {}, not a function",
                    name,
                    other.type_name()
                ))),
            };
        }
        if let Some(value) = builtins::call_builtin(name, args.clone(), &self.registry)? {
            return Ok(value);
        }
        if let Some(custom) = self.custom.as_ref().filter(|c| c.contains(name)) {
            return custom.call(name, &args);
        }
        Err(EngineError::UndefinedFunction(name.to_string()))
    }

    fn call_user(
        &self,
        function: &UserFunction,
        args: Vec<Value>,
        scope: &Scope,
        depth: usize,
    ) -> Result<Value> {
        if depth >= MAX_CALL_DEPTH {
            return Err(EngineError::type_error(format!(
                "Maximum call depth exceeded in function {}",
                function.name
            )));
        }
        if args.len() != function.params.len() {
            return Err(EngineError::ArgumentCount {
                name: function.name.clone(),
                expected: function.params.len().to_string(),
                actual: args.len(),
            });
        }
        let mut local = scope.clone();
        for (param, arg) in function.params.iter().zip(args) {
            local.set(param.clone(), arg);
        }
        self.eval_at(&function.body, &mut local, depth + 1)
    }

    /// Read a conversion target (`km`, `km / h`, `m^2`) as a unit expression.
    fn unit_expr(&self, node: &Node) -> Result<UnitExpr> {
        match node {
            Node::Symbol(name) => {
                if self.registry.contains(name) {
                    Ok(UnitExpr::single(name.clone()))
                } else {
                    Err(EngineError::UndefinedSymbol(name.clone()))
                }
            }
            Node::Paren(inner) => self.unit_expr(inner),
            Node::Binary {
                op: BinaryOp::Multiply,
                left,
                right,
                ..
            } => self.unit_expr(left)?.multiply(&self.unit_expr(right)?),
            Node::Binary {
                op: BinaryOp::Divide,
                left,
                right,
                ..
            } => self.unit_expr(left)?.divide(&self.unit_expr(right)?),
            Node::Binary {
                op: BinaryOp::Power,
                left,
                right,
                ..
            } => {
                let exponent = match right.as_ref() {
                    Node::Number(n) => *n,
                    Node::Unary {
                        op: UnaryOp::Negate,
                        operand,
                    } => match operand.as_ref() {
                        Node::Number(n) => -n,
                        _ => return Err(EngineError::unit("Unit exponent must be a number")),
                    },
                    _ => return Err(EngineError::unit("Unit exponent must be a number")),
                };
                if exponent.fract() != 0.0 {
                    return Err(EngineError::unit("Unit exponent must be an integer"));
                }
                self.unit_expr(left)?.powi(unit_power(exponent)?)
            }
            other => Err(EngineError::unit(format!(
                "Unit expected after \"to\", got \"{}\"",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(engine: &MathEngine, text: &str, scope: &mut Scope) -> String {
        let value = engine.evaluate_str(text, scope).unwrap();
        engine.format(&value)
    }

    #[test]
    fn test_arithmetic_and_scope() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        assert_eq!(eval(&engine, "5 + 3", &mut scope), "8");
        eval(&engine, "a = 2", &mut scope);
        assert_eq!(eval(&engine, "a * 10 + 1", &mut scope), "21");
        assert_eq!(eval(&engine, "2 pi", &mut scope), "6.2831853071796");
    }

    #[test]
    fn test_undefined_symbol() {
        let engine = MathEngine::new();
        let err = engine.evaluate_str("x + 1", &mut Scope::new()).unwrap_err();
        assert_eq!(err.to_string(), "Undefined symbol x");
    }

    #[test]
    fn test_units_and_conversion() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        assert_eq!(eval(&engine, "5 kg + 500 g", &mut scope), "5.5 kg");
        assert_eq!(eval(&engine, "2.5 km to m", &mut scope), "2500 m");
        assert_eq!(eval(&engine, "90 km/h in m/s", &mut scope), "25 m / s");
        assert_eq!(eval(&engine, "20 kg / 4 kg", &mut scope), "5");
        assert_eq!(eval(&engine, "3 m * 2 m", &mut scope), "6 m^2");
    }

    #[test]
    fn test_user_units_are_shared_through_registry() {
        let registry = UnitRegistry::new();
        let first = MathEngine::with_registry(registry.clone());
        let second = MathEngine::with_registry(registry);
        first.define_unit("EUR", None).unwrap();
        first.define_unit("USD", Some("1.1 EUR")).unwrap();
        let mut scope = Scope::new();
        assert_eq!(eval(&second, "11 EUR to USD", &mut scope), "10 USD");
    }

    #[test]
    fn test_user_functions_in_scope() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        eval(&engine, "f(x) = x^2 + 1", &mut scope);
        assert_eq!(eval(&engine, "f(3)", &mut scope), "10");
        let err = engine.evaluate_str("f(1, 2)", &mut scope).unwrap_err();
        assert!(matches!(err, EngineError::ArgumentCount { .. }));
    }

    #[test]
    fn test_custom_rhai_functions() {
        let mut engine = MathEngine::new();
        engine.load_functions("fn tax(x) { x * 0.15 }").unwrap();
        assert!(engine.is_custom_function("tax"));
        assert_eq!(eval(&engine, "tax(100)", &mut Scope::new()), "15");
    }

    #[test]
    fn test_logic_and_conditionals() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        assert_eq!(eval(&engine, "3 > 2 ? 10 : 20", &mut scope), "10");
        assert_eq!(eval(&engine, "true and not false", &mut scope), "true");
        assert_eq!(eval(&engine, "sum([1, 2, 3]) * 2", &mut scope), "12");
    }

    #[test]
    fn test_recursion_depth_is_bounded() {
        let engine = MathEngine::new();
        let mut scope = Scope::new();
        eval(&engine, "f(x) = f(x + 1)", &mut scope);
        assert!(engine.evaluate_str("f(1)", &mut scope).is_err());
    }
}
