//! Runtime values produced by the evaluator.

use std::collections::HashMap;
use std::sync::Arc;

use super::ast::Node;
use crate::error::{EngineError, Result};

/// A product of unit powers such as `km h^-1`, kept in the order the units
/// were written so results print the way the user typed them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitExpr {
    parts: Vec<(String, i32)>,
}

impl UnitExpr {
    pub fn single(name: impl Into<String>) -> Self {
        UnitExpr {
            parts: vec![(name.into(), 1)],
        }
    }

    pub fn parts(&self) -> &[(String, i32)] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Combine with another expression, adding powers of repeated units.
    pub fn multiply(&self, other: &UnitExpr) -> Result<UnitExpr> {
        let mut parts = self.parts.clone();
        for (name, power) in &other.parts {
            match parts.iter_mut().find(|(existing, _)| existing == name) {
                Some((_, existing)) => {
                    *existing = existing.checked_add(*power).ok_or_else(out_of_range)?
                }
                None => parts.push((name.clone(), *power)),
            }
        }
        parts.retain(|(_, power)| *power != 0);
        Ok(UnitExpr { parts })
    }

    pub fn divide(&self, other: &UnitExpr) -> Result<UnitExpr> {
        self.multiply(&other.powi(-1)?)
    }

    pub fn powi(&self, exponent: i32) -> Result<UnitExpr> {
        let parts = self
            .parts
            .iter()
            .map(|(name, power)| {
                let power = power.checked_mul(exponent).ok_or_else(out_of_range)?;
                Ok((name.clone(), power))
            })
            .filter(|part| !matches!(part, Ok((_, 0))))
            .collect::<Result<Vec<_>>>()?;
        Ok(UnitExpr { parts })
    }
}

/// Integer unit power from an evaluated exponent.
pub(crate) fn unit_power(exponent: f64) -> Result<i32> {
    if exponent.fract() != 0.0 {
        return Err(EngineError::unit("Units can only be raised to integer powers"));
    }
    if exponent.abs() > i32::MAX as f64 {
        return Err(out_of_range());
    }
    Ok(exponent as i32)
}

pub(crate) fn out_of_range() -> EngineError {
    EngineError::unit("Unit exponent out of range")
}

/// A number carrying a unit, stored in terms of that unit (`5 km` is
/// `value: 5.0, unit: km`).
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: UnitExpr,
}

impl Quantity {
    pub fn new(value: f64, unit: UnitExpr) -> Self {
        Quantity { value, unit }
    }
}

/// A function defined on a line such as `f(x) = x^2`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Quantity(Quantity),
    Bool(bool),
    Array(Vec<Value>),
    Function(Arc<UserFunction>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Quantity(_) => "unit",
            Value::Bool(_) => "boolean",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// False when any number inside the value is infinite or NaN.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Number(n) => n.is_finite(),
            Value::Quantity(q) => q.value.is_finite(),
            Value::Array(items) => items.iter().all(Value::is_finite),
            Value::Bool(_) | Value::Function(_) => true,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// Variable bindings visible to an evaluation.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}
