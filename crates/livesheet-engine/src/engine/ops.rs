//! Operator semantics over [`Value`], including unit algebra.

use std::cmp::Ordering;

use super::ast::{BinaryOp, UnaryOp};
use super::units::UnitRegistry;
use super::value::{Quantity, UnitExpr, Value, unit_power};
use crate::error::{EngineError, Result};

/// Build a quantity, collapsing it to a plain number when its units cancel.
pub fn quantity(value: f64, unit: UnitExpr, registry: &UnitRegistry) -> Result<Value> {
    if unit.is_empty() {
        return Ok(Value::Number(value));
    }
    let def = registry.resolve(unit.parts())?;
    if def.dimensions.is_empty() {
        Ok(Value::Number(value * def.factor))
    } else {
        Ok(Value::Quantity(Quantity::new(value, unit)))
    }
}

/// Express `q` in `target` units. Dimensions must match.
pub fn convert(q: &Quantity, target: &UnitExpr, registry: &UnitRegistry) -> Result<f64> {
    let from = registry.resolve(q.unit.parts())?;
    let to = registry.resolve(target.parts())?;
    if from.dimensions != to.dimensions {
        return Err(EngineError::unit(format!(
            "Units do not match ({} vs {})",
            describe(&q.unit),
            describe(target)
        )));
    }
    Ok(q.value * from.factor / to.factor)
}

/// Convert a value to `target` units (the `to` / `in` operator).
pub fn convert_value(value: &Value, target: &UnitExpr, registry: &UnitRegistry) -> Result<Value> {
    match value {
        Value::Quantity(q) => Ok(Value::Quantity(Quantity::new(
            convert(q, target, registry)?,
            target.clone(),
        ))),
        Value::Array(items) => items
            .iter()
            .map(|item| convert_value(item, target, registry))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Number(_) => {
            let def = registry.resolve(target.parts())?;
            if def.dimensions.is_empty() {
                Ok(value.clone())
            } else {
                Err(EngineError::unit(format!(
                    "Cannot convert a number to {}",
                    describe(target)
                )))
            }
        }
        other => Err(EngineError::type_error(format!(
            "Cannot convert a {} to {}",
            other.type_name(),
            describe(target)
        ))),
    }
}

fn describe(unit: &UnitExpr) -> String {
    unit.parts()
        .iter()
        .map(|(name, power)| {
            if *power == 1 {
                name.clone()
            } else {
                format!("{}^{}", name, power)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn unary(op: UnaryOp, operand: Value, registry: &UnitRegistry) -> Result<Value> {
    match op {
        UnaryOp::Plus => Ok(operand),
        UnaryOp::Negate => map_numeric(operand, &|n| -n, "negate"),
        UnaryOp::Not => Ok(Value::Bool(!truthy(&operand)?)),
        UnaryOp::Factorial => match operand {
            Value::Number(n) => factorial(n).map(Value::Number),
            Value::Array(items) => items
                .into_iter()
                .map(|item| unary(op, item, registry))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Err(unexpected_type("factorial", &other)),
        },
    }
}

/// Apply `f` to every number in `value`, keeping units and array shape.
pub fn map_numeric(value: Value, f: &dyn Fn(f64) -> f64, name: &str) -> Result<Value> {
    match value {
        Value::Number(n) => Ok(Value::Number(f(n))),
        Value::Quantity(q) => Ok(Value::Quantity(Quantity::new(f(q.value), q.unit))),
        Value::Bool(b) => Ok(Value::Number(f(if b { 1.0 } else { 0.0 }))),
        Value::Array(items) => items
            .into_iter()
            .map(|item| map_numeric(item, f, name))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Err(unexpected_type(name, &other)),
    }
}

pub fn factorial(n: f64) -> Result<f64> {
    if n < 0.0 || n.fract() != 0.0 {
        return Err(EngineError::type_error(
            "Value must be a non-negative integer in function factorial",
        ));
    }
    if n > 170.0 {
        return Ok(f64::INFINITY);
    }
    Ok((1..=n as u64).fold(1.0, |acc, k| acc * k as f64))
}

pub fn truthy(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0 && !n.is_nan()),
        Value::Quantity(q) => Ok(q.value != 0.0),
        other => Err(EngineError::type_error(format!(
            "Cannot convert {} to boolean",
            other.type_name()
        ))),
    }
}

pub fn binary(op: BinaryOp, left: Value, right: Value, registry: &UnitRegistry) -> Result<Value> {
    match op {
        BinaryOp::And => Ok(Value::Bool(truthy(&left)? && truthy(&right)?)),
        BinaryOp::Or => Ok(Value::Bool(truthy(&left)? || truthy(&right)?)),
        BinaryOp::Xor => Ok(Value::Bool(truthy(&left)? != truthy(&right)?)),
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::Less
        | BinaryOp::LessEqual
        | BinaryOp::Greater
        | BinaryOp::GreaterEqual => compare_values(op, left, right, registry),
        _ => arithmetic(op, left, right, registry),
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value, registry: &UnitRegistry) -> Result<Value> {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(EngineError::type_error(format!(
                    "Dimension mismatch ({} != {})",
                    a.len(),
                    b.len()
                )));
            }
            if op == BinaryOp::Multiply {
                // Vector product is the dot product.
                let mut total = Value::Number(0.0);
                for (x, y) in a.into_iter().zip(b) {
                    let term = arithmetic(BinaryOp::Multiply, x, y, registry)?;
                    total = arithmetic(BinaryOp::Add, total, term, registry)?;
                }
                return Ok(total);
            }
            a.into_iter()
                .zip(b)
                .map(|(x, y)| arithmetic(op, x, y, registry))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        (Value::Array(a), scalar) => a
            .into_iter()
            .map(|x| arithmetic(op, x, scalar.clone(), registry))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        (scalar, Value::Array(b)) => b
            .into_iter()
            .map(|y| arithmetic(op, scalar.clone(), y, registry))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        (Value::Bool(a), right) => arithmetic(op, Value::Number(bool_number(a)), right, registry),
        (left, Value::Bool(b)) => arithmetic(op, left, Value::Number(bool_number(b)), registry),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(number_op(op, a, b))),
        (Value::Quantity(q), Value::Number(b)) => match op {
            BinaryOp::Multiply | BinaryOp::Divide => {
                Ok(Value::Quantity(Quantity::new(number_op(op, q.value, b), q.unit)))
            }
            BinaryOp::Power => {
                let exponent = unit_power(b)?;
                quantity(q.value.powi(exponent), q.unit.powi(exponent)?, registry)
            }
            _ => Err(mixed(op, "unit", "number")),
        },
        (Value::Number(a), Value::Quantity(q)) => match op {
            BinaryOp::Multiply => Ok(Value::Quantity(Quantity::new(a * q.value, q.unit))),
            BinaryOp::Divide => quantity(a / q.value, q.unit.powi(-1)?, registry),
            _ => Err(mixed(op, "number", "unit")),
        },
        (Value::Quantity(a), Value::Quantity(b)) => match op {
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Modulo => {
                let rhs = convert(&b, &a.unit, registry)?;
                Ok(Value::Quantity(Quantity::new(number_op(op, a.value, rhs), a.unit)))
            }
            BinaryOp::Multiply => quantity(a.value * b.value, a.unit.multiply(&b.unit)?, registry),
            BinaryOp::Divide => quantity(a.value / b.value, a.unit.divide(&b.unit)?, registry),
            _ => Err(mixed(op, "unit", "unit")),
        },
        (left, right) => Err(EngineError::type_error(format!(
            "Unexpected type of argument in operator {} ({}, {})",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn bool_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn number_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Power => a.powf(b),
        BinaryOp::Modulo => floored_mod(a, b),
        _ => f64::NAN,
    }
}

/// Modulo with the sign of the divisor; `x mod 0` is `x`.
pub fn floored_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        a
    } else {
        a - b * (a / b).floor()
    }
}

fn mixed(op: BinaryOp, left: &str, right: &str) -> EngineError {
    EngineError::type_error(format!(
        "Unexpected type of argument in operator {} ({}, {})",
        op.symbol(),
        left,
        right
    ))
}

fn unexpected_type(name: &str, value: &Value) -> EngineError {
    EngineError::type_error(format!(
        "Unexpected type of argument in function {} ({})",
        name,
        value.type_name()
    ))
}

fn compare_values(op: BinaryOp, left: Value, right: Value, registry: &UnitRegistry) -> Result<Value> {
    if let (Value::Array(a), Value::Array(b)) = (&left, &right) {
        if a.len() != b.len() {
            return Err(EngineError::type_error(format!(
                "Dimension mismatch ({} != {})",
                a.len(),
                b.len()
            )));
        }
        return a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_values(op, x.clone(), y.clone(), registry))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }
    let ordering = compare(&left, &right, registry)?;
    let result = match op {
        BinaryOp::Equal => ordering == Some(Ordering::Equal),
        BinaryOp::NotEqual => ordering != Some(Ordering::Equal),
        BinaryOp::Less => ordering == Some(Ordering::Less),
        BinaryOp::LessEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Greater => ordering == Some(Ordering::Greater),
        BinaryOp::GreaterEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        _ => false,
    };
    Ok(Value::Bool(result))
}

/// Order two scalar values; `None` when either side is NaN.
pub fn compare(left: &Value, right: &Value, registry: &UnitRegistry) -> Result<Option<Ordering>> {
    match (left, right) {
        (Value::Quantity(a), Value::Quantity(b)) => {
            let rhs = convert(b, &a.unit, registry)?;
            Ok(a.value.partial_cmp(&rhs))
        }
        (Value::Quantity(_), _) | (_, Value::Quantity(_)) => Err(EngineError::type_error(
            "Cannot compare a unit with a number",
        )),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(EngineError::type_error(format!(
                "Cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: f64, unit: &str) -> Value {
        Value::Quantity(Quantity::new(value, UnitExpr::single(unit)))
    }

    #[test]
    fn test_add_converts_right_operand_into_left_unit() {
        let registry = UnitRegistry::new();
        let sum = binary(BinaryOp::Add, q(1.0, "km"), q(500.0, "m"), &registry).unwrap();
        assert_eq!(sum, q(1.5, "km"));
    }

    #[test]
    fn test_incompatible_units_fail() {
        let registry = UnitRegistry::new();
        let err = binary(BinaryOp::Add, q(1.0, "km"), q(1.0, "kg"), &registry).unwrap_err();
        assert!(matches!(err, EngineError::Unit(_)));
    }

    #[test]
    fn test_cancelled_units_become_numbers() {
        let registry = UnitRegistry::new();
        let ratio = binary(BinaryOp::Divide, q(20.0, "kg"), q(4.0, "kg"), &registry).unwrap();
        assert_eq!(ratio, Value::Number(5.0));
        let mixed = binary(BinaryOp::Divide, q(1.0, "km"), q(1.0, "m"), &registry).unwrap();
        assert_eq!(mixed, Value::Number(1000.0));
    }

    #[test]
    fn test_convert_between_units() {
        let registry = UnitRegistry::new();
        let target = UnitExpr::single("m");
        let converted = convert_value(&q(2.5, "km"), &target, &registry).unwrap();
        assert_eq!(converted, q(2500.0, "m"));
    }

    #[test]
    fn test_floored_modulo_and_division_by_zero() {
        assert_eq!(floored_mod(-7.0, 3.0), 2.0);
        assert_eq!(floored_mod(7.0, 3.0), 1.0);
        let registry = UnitRegistry::new();
        let inf = binary(BinaryOp::Divide, 1.0.into(), 0.0.into(), &registry).unwrap();
        assert!(!inf.is_finite());
    }

    #[test]
    fn test_array_broadcast_and_dot_product() {
        let registry = UnitRegistry::new();
        let arr = Value::Array(vec![1.0.into(), 2.0.into()]);
        let doubled = binary(BinaryOp::Multiply, arr.clone(), 2.0.into(), &registry).unwrap();
        assert_eq!(doubled, Value::Array(vec![2.0.into(), 4.0.into()]));
        let dot = binary(BinaryOp::Multiply, arr.clone(), arr, &registry).unwrap();
        assert_eq!(dot, Value::Number(5.0));
    }

    #[test]
    fn test_comparisons() {
        let registry = UnitRegistry::new();
        let gt = binary(BinaryOp::Greater, q(1.0, "km"), q(999.0, "m"), &registry).unwrap();
        assert_eq!(gt, Value::Bool(true));
        let eq = binary(BinaryOp::Equal, 2.0.into(), 2.0.into(), &registry).unwrap();
        assert_eq!(eq, Value::Bool(true));
    }

    #[test]
    fn test_huge_unit_powers_are_rejected() {
        let registry = UnitRegistry::new();
        let area = binary(BinaryOp::Multiply, q(2.0, "m"), q(1.0, "m"), &registry).unwrap();
        let err = binary(BinaryOp::Power, area, 1_500_000_000.0.into(), &registry).unwrap_err();
        assert_eq!(err, EngineError::unit("Unit exponent out of range"));
        let err = binary(BinaryOp::Power, q(1.0, "m"), 1e12.into(), &registry).unwrap_err();
        assert_eq!(err, EngineError::unit("Unit exponent out of range"));
        let cubed = binary(BinaryOp::Power, q(2.0, "m"), 3.0.into(), &registry).unwrap();
        let m3 = UnitExpr::single("m").powi(3).unwrap();
        assert_eq!(cubed, Value::Quantity(Quantity::new(8.0, m3)));
    }

    #[test]
    fn test_factorial() {
        assert_eq!(factorial(5.0).unwrap(), 120.0);
        assert!(factorial(-1.0).is_err());
        assert!(factorial(171.0).unwrap().is_infinite());
    }
}
