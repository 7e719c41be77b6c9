//! Built-in constants and functions, plus user functions compiled from Rhai.
//!
//! Conventions:
//! - Function names are lower case (`sqrt`, `mean`).
//! - If you add a function, add it to `FUNCTIONS` (the Normalizer uses the
//!   table to tell known names from free words) and to `call_builtin`.

use rand::Rng;
use rhai::{AST, Dynamic, Engine};
use std::collections::HashSet;
use std::f64::consts;

use crate::engine::ops::{self, map_numeric};
use crate::engine::units::UnitRegistry;
use crate::engine::{BinaryOp, Quantity, UnaryOp, UnitExpr, Value};
use crate::error::{EngineError, Result};

pub struct Constant {
    pub name: &'static str,
    pub value: f64,
    #[allow(dead_code)]
    pub description: &'static str,
}

pub const CONSTANTS: &[Constant] = &[
    Constant {
        name: "pi",
        value: consts::PI,
        description: "Ratio of a circle's circumference to its diameter",
    },
    Constant {
        name: "e",
        value: consts::E,
        description: "Euler's number",
    },
    Constant {
        name: "tau",
        value: consts::TAU,
        description: "2 pi",
    },
    Constant {
        name: "phi",
        value: 1.618_033_988_749_895,
        description: "Golden ratio",
    },
    Constant {
        name: "Infinity",
        value: f64::INFINITY,
        description: "Positive infinity",
    },
    Constant {
        name: "NaN",
        value: f64::NAN,
        description: "Not a number",
    },
];

pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` means variadic.
    pub max_args: Option<usize>,
    #[allow(dead_code)]
    pub description: &'static str,
}

const fn f(name: &'static str, min_args: usize, max_args: Option<usize>, description: &'static str) -> Builtin {
    Builtin {
        name,
        min_args,
        max_args,
        description,
    }
}

pub const FUNCTIONS: &[Builtin] = &[
    f("abs", 1, Some(1), "Absolute value"),
    f("sqrt", 1, Some(1), "Square root"),
    f("cbrt", 1, Some(1), "Cube root"),
    f("exp", 1, Some(1), "e raised to the power of x"),
    f("log", 1, Some(2), "Natural logarithm, or logarithm in the given base"),
    f("log2", 1, Some(1), "Base 2 logarithm"),
    f("log10", 1, Some(1), "Base 10 logarithm"),
    f("sin", 1, Some(1), "Sine of a number (radians) or an angle"),
    f("cos", 1, Some(1), "Cosine of a number (radians) or an angle"),
    f("tan", 1, Some(1), "Tangent of a number (radians) or an angle"),
    f("asin", 1, Some(1), "Inverse sine in radians"),
    f("acos", 1, Some(1), "Inverse cosine in radians"),
    f("atan", 1, Some(1), "Inverse tangent in radians"),
    f("atan2", 2, Some(2), "Four-quadrant inverse tangent of y / x"),
    f("sinh", 1, Some(1), "Hyperbolic sine"),
    f("cosh", 1, Some(1), "Hyperbolic cosine"),
    f("tanh", 1, Some(1), "Hyperbolic tangent"),
    f("round", 1, Some(2), "Round to the nearest integer or to n decimals"),
    f("floor", 1, Some(1), "Round towards negative infinity"),
    f("ceil", 1, Some(1), "Round towards positive infinity"),
    f("fix", 1, Some(1), "Round towards zero"),
    f("sign", 1, Some(1), "Sign of a number (-1, 0 or 1)"),
    f("pow", 2, Some(2), "x raised to the power y"),
    f("mod", 2, Some(2), "Floored modulo"),
    f("min", 1, None, "Smallest value"),
    f("max", 1, None, "Largest value"),
    f("sum", 1, None, "Sum of all values"),
    f("mean", 1, None, "Arithmetic mean"),
    f("median", 1, None, "Median value"),
    f("factorial", 1, Some(1), "n!"),
    f("gcd", 1, None, "Greatest common divisor"),
    f("lcm", 1, None, "Least common multiple"),
    f("hypot", 1, None, "Square root of the sum of squares"),
    f("random", 0, Some(2), "Random number in [0, 1), [0, max) or [min, max)"),
];

pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS.iter().find(|c| c.name == name).map(|c| c.value)
}

pub fn builtin(name: &str) -> Option<&'static Builtin> {
    FUNCTIONS.iter().find(|b| b.name == name)
}

/// Whether `name` is a built-in constant or function.
pub fn is_builtin_name(name: &str) -> bool {
    constant(name).is_some() || builtin(name).is_some()
}

fn check_arity(spec: &Builtin, actual: usize) -> Result<()> {
    let too_many = spec.max_args.is_some_and(|max| actual > max);
    if actual < spec.min_args || too_many {
        let expected = match spec.max_args {
            Some(max) if max == spec.min_args => max.to_string(),
            Some(max) => format!("{}-{}", spec.min_args, max),
            None => format!("at least {}", spec.min_args),
        };
        return Err(EngineError::ArgumentCount {
            name: spec.name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn number_arg(name: &str, value: &Value) -> Result<f64> {
    value.as_number().ok_or_else(|| {
        EngineError::type_error(format!(
            "Unexpected type of argument in function {} ({})",
            name,
            value.type_name()
        ))
    })
}

/// Angle argument for trig functions: plain numbers are radians.
fn angle_arg(name: &str, value: &Value, registry: &UnitRegistry) -> Result<f64> {
    match value {
        Value::Quantity(q) => ops::convert(q, &UnitExpr::single("rad"), registry),
        other => number_arg(name, other),
    }
}

/// Flatten nested arrays into one list of scalars.
fn flatten(args: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Array(items) => out.extend(flatten(items)),
            other => out.push(other.clone()),
        }
    }
    out
}

fn integers(name: &str, args: &[Value]) -> Result<Vec<i64>> {
    flatten(args)
        .iter()
        .map(|v| {
            let n = number_arg(name, v)?;
            if n.fract() != 0.0 {
                return Err(EngineError::type_error(format!(
                    "Parameters in function {} must be integer numbers",
                    name
                )));
            }
            Ok(n as i64)
        })
        .collect()
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Call the built-in `name`. Returns `Ok(None)` when no such built-in exists.
pub fn call_builtin(name: &str, args: Vec<Value>, registry: &UnitRegistry) -> Result<Option<Value>> {
    let Some(spec) = builtin(name) else {
        return Ok(None);
    };
    check_arity(spec, args.len())?;

    let unary = |f: &dyn Fn(f64) -> f64| -> Result<Value> {
        map_numeric(args[0].clone(), f, name)
    };
    let real = |f: fn(f64) -> f64| -> Result<Value> {
        match &args[0] {
            Value::Array(_) | Value::Number(_) | Value::Bool(_) => map_numeric(args[0].clone(), &f, name),
            other => Ok(Value::Number(f(number_arg(name, other)?))),
        }
    };
    let trig = |f: fn(f64) -> f64| -> Result<Value> {
        match &args[0] {
            Value::Array(items) => items
                .iter()
                .map(|item| angle_arg(name, item, registry).map(|x| Value::Number(f(x))))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(Value::Number(f(angle_arg(name, other, registry)?))),
        }
    };

    let value = match name {
        "abs" => unary(&f64::abs)?,
        "sqrt" => match &args[0] {
            Value::Quantity(q) => sqrt_quantity(q, registry)?,
            _ => real(f64::sqrt)?,
        },
        "cbrt" => real(f64::cbrt)?,
        "exp" => real(f64::exp)?,
        "log" => {
            let x = number_arg(name, &args[0])?;
            match args.get(1) {
                Some(base) => Value::Number(x.ln() / number_arg(name, base)?.ln()),
                None => Value::Number(x.ln()),
            }
        }
        "log2" => real(f64::log2)?,
        "log10" => real(f64::log10)?,
        "sin" => trig(f64::sin)?,
        "cos" => trig(f64::cos)?,
        "tan" => trig(f64::tan)?,
        "asin" => real(f64::asin)?,
        "acos" => real(f64::acos)?,
        "atan" => real(f64::atan)?,
        "atan2" => Value::Number(number_arg(name, &args[0])?.atan2(number_arg(name, &args[1])?)),
        "sinh" => trig(f64::sinh)?,
        "cosh" => trig(f64::cosh)?,
        "tanh" => trig(f64::tanh)?,
        "round" => match args.get(1) {
            Some(places) => {
                let scale = 10f64.powi(number_arg(name, places)? as i32);
                unary(&|x| (x * scale).round() / scale)?
            }
            None => unary(&f64::round)?,
        },
        "floor" => unary(&f64::floor)?,
        "ceil" => unary(&f64::ceil)?,
        "fix" => unary(&f64::trunc)?,
        "sign" => real(|x| if x == 0.0 { 0.0 } else { x.signum() })?,
        "pow" => ops::binary(
            BinaryOp::Power,
            args[0].clone(),
            args[1].clone(),
            registry,
        )?,
        "mod" => ops::binary(
            BinaryOp::Modulo,
            args[0].clone(),
            args[1].clone(),
            registry,
        )?,
        "min" | "max" => {
            let values = flatten(&args);
            let want = if name == "min" {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            };
            let mut best = values
                .first()
                .cloned()
                .ok_or_else(|| EngineError::type_error(format!("Cannot calculate {} of an empty array", name)))?;
            for candidate in values.into_iter().skip(1) {
                if ops::compare(&candidate, &best, registry)? == Some(want) {
                    best = candidate;
                }
            }
            best
        }
        "sum" => sum(&flatten(&args), registry)?,
        "mean" => {
            let values = flatten(&args);
            if values.is_empty() {
                return Err(EngineError::type_error("Cannot calculate mean of an empty array"));
            }
            let count = values.len() as f64;
            ops::binary(
                BinaryOp::Divide,
                sum(&values, registry)?,
                Value::Number(count),
                registry,
            )?
        }
        "median" => {
            let mut values = flatten(&args)
                .iter()
                .map(|v| number_arg(name, v))
                .collect::<Result<Vec<_>>>()?;
            if values.is_empty() {
                return Err(EngineError::type_error("Cannot calculate median of an empty array"));
            }
            values.sort_by(|a, b| a.total_cmp(b));
            let mid = values.len() / 2;
            let median = if values.len() % 2 == 0 {
                (values[mid - 1] + values[mid]) / 2.0
            } else {
                values[mid]
            };
            Value::Number(median)
        }
        "factorial" => ops::unary(UnaryOp::Factorial, args[0].clone(), registry)?,
        "gcd" => Value::Number(integers(name, &args)?.into_iter().fold(0, gcd) as f64),
        "lcm" => {
            let lcm = integers(name, &args)?.into_iter().fold(1i64, |acc, n| {
                if acc == 0 || n == 0 {
                    0
                } else {
                    (acc / gcd(acc, n) * n).abs()
                }
            });
            Value::Number(lcm as f64)
        }
        "hypot" => {
            let total: f64 = flatten(&args)
                .iter()
                .map(|v| number_arg(name, v).map(|x| x * x))
                .sum::<Result<f64>>()?;
            Value::Number(total.sqrt())
        }
        "random" => {
            let mut rng = rand::thread_rng();
            let r: f64 = rng.r#gen();
            match args.as_slice() {
                [] => Value::Number(r),
                [max] => Value::Number(r * number_arg(name, max)?),
                [min, max, ..] => {
                    let (min, max) = (number_arg(name, min)?, number_arg(name, max)?);
                    Value::Number(min + r * (max - min))
                }
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn sum(values: &[Value], registry: &UnitRegistry) -> Result<Value> {
    let mut iter = values.iter().cloned();
    let Some(mut total) = iter.next() else {
        return Ok(Value::Number(0.0));
    };
    for value in iter {
        total = ops::binary(BinaryOp::Add, total, value, registry)?;
    }
    Ok(total)
}

fn sqrt_quantity(q: &Quantity, registry: &UnitRegistry) -> Result<Value> {
    if q.unit.parts().iter().any(|(_, power)| power % 2 != 0) {
        return Err(EngineError::unit("Cannot take the square root of this unit"));
    }
    let halved = q
        .unit
        .parts()
        .iter()
        .try_fold(UnitExpr::default(), |acc, (name, power)| {
            acc.multiply(&UnitExpr::single(name.clone()).powi(power / 2)?)
        })?;
    ops::quantity(q.value.sqrt(), halved, registry)
}

/// User functions compiled from a Rhai script (`fn tax(x) { x * 0.15 }`).
pub struct CustomFunctions {
    engine: Engine,
    ast: AST,
    names: HashSet<String>,
}

impl CustomFunctions {
    /// Compile `script`. Compile errors are reported as [`EngineError::Script`].
    pub fn compile(script: &str) -> Result<Self> {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(1_000_000);
        let ast = engine
            .compile(script)
            .map_err(|e| EngineError::Script(e.to_string()))?;
        let names = ast.iter_functions().map(|f| f.name.to_string()).collect();
        Ok(CustomFunctions { engine, ast, names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    fn arity(&self, name: &str) -> Vec<usize> {
        self.ast
            .iter_functions()
            .filter(|f| f.name == name)
            .map(|f| f.params.len())
            .collect()
    }

    /// Call a script function with numeric arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let arities = self.arity(name);
        if !arities.contains(&args.len()) {
            let expected = arities
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(EngineError::ArgumentCount {
                name: name.to_string(),
                expected,
                actual: args.len(),
            });
        }

        let mut dynamic_args = Vec::with_capacity(args.len());
        for arg in args {
            dynamic_args.push(to_dynamic(name, arg)?);
        }

        let mut scope = rhai::Scope::new();
        let result: Dynamic = self
            .engine
            .call_fn(&mut scope, &self.ast, name, dynamic_args)
            .map_err(|e| EngineError::Script(e.to_string()))?;
        from_dynamic(name, result)
    }
}

fn to_dynamic(name: &str, value: &Value) -> Result<Dynamic> {
    match value {
        Value::Number(n) => Ok(Dynamic::from_float(*n)),
        Value::Bool(b) => Ok(Dynamic::from_bool(*b)),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| to_dynamic(name, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(Dynamic::from_array(items))
        }
        other => Err(EngineError::type_error(format!(
            "Custom function {} only accepts numbers ({} given)",
            name,
            other.type_name()
        ))),
    }
}

fn from_dynamic(name: &str, value: Dynamic) -> Result<Value> {
    if let Ok(n) = value.as_float() {
        return Ok(Value::Number(n));
    }
    if let Ok(n) = value.as_int() {
        return Ok(Value::Number(n as f64));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if value.is_array() {
        let items = value.into_array().map_err(|t| EngineError::type_error(t.to_string()))?;
        return items
            .into_iter()
            .map(|item| from_dynamic(name, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }
    Err(EngineError::type_error(format!(
        "Custom function {} returned a {}, expected a number",
        name,
        value.type_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Value {
        call_builtin(name, args, &UnitRegistry::new()).unwrap().unwrap()
    }

    #[test]
    fn test_function_table_has_no_duplicates() {
        let mut seen = HashSet::new();
        for b in FUNCTIONS {
            assert!(seen.insert(b.name), "duplicate builtin {}", b.name);
        }
    }

    #[test]
    fn test_basic_functions() {
        assert_eq!(call("sqrt", vec![16.0.into()]), Value::Number(4.0));
        assert_eq!(call("round", vec![2.345.into(), 2.0.into()]), Value::Number(2.35));
        assert_eq!(call("max", vec![1.0.into(), 5.0.into(), 3.0.into()]), Value::Number(5.0));
        assert_eq!(call("gcd", vec![12.0.into(), 18.0.into()]), Value::Number(6.0));
        assert_eq!(call("lcm", vec![4.0.into(), 6.0.into()]), Value::Number(12.0));
        assert_eq!(call("hypot", vec![3.0.into(), 4.0.into()]), Value::Number(5.0));
        assert_eq!(call("fix", vec![(-2.7).into()]), Value::Number(-2.0));
    }

    #[test]
    fn test_operator_backed_functions() {
        assert_eq!(call("pow", vec![2.0.into(), 10.0.into()]), Value::Number(1024.0));
        assert_eq!(call("mod", vec![(-7.0).into(), 3.0.into()]), Value::Number(2.0));
        assert_eq!(call("factorial", vec![5.0.into()]), Value::Number(120.0));

        let area = Quantity::new(9.0, UnitExpr::single("m").powi(2).unwrap());
        let side = Quantity::new(3.0, UnitExpr::single("m"));
        assert_eq!(call("sqrt", vec![Value::Quantity(area)]), Value::Quantity(side));
    }

    #[test]
    fn test_aggregates_flatten_arrays() {
        let arr = Value::Array(vec![1.0.into(), 2.0.into(), 3.0.into(), 10.0.into()]);
        assert_eq!(call("sum", vec![arr.clone()]), Value::Number(16.0));
        assert_eq!(call("mean", vec![arr.clone()]), Value::Number(4.0));
        assert_eq!(call("median", vec![arr]), Value::Number(2.5));
    }

    #[test]
    fn test_trig_accepts_angles() {
        let angle = Value::Quantity(Quantity::new(90.0, UnitExpr::single("deg")));
        match call("sin", vec![angle]) {
            Value::Number(n) => assert!((n - 1.0).abs() < 1e-12),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_arity_errors() {
        let err = call_builtin("sqrt", vec![], &UnitRegistry::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Wrong number of arguments in function sqrt (0 provided, 1 expected)"
        );
    }

    #[test]
    fn test_unknown_builtin_is_none() {
        assert!(call_builtin("nope", vec![], &UnitRegistry::new()).unwrap().is_none());
    }

    #[test]
    fn test_random_range() {
        for _ in 0..20 {
            match call("random", vec![5.0.into(), 6.0.into()]) {
                Value::Number(n) => assert!((5.0..6.0).contains(&n)),
                other => panic!("expected number, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_custom_functions() {
        let custom = CustomFunctions::compile("fn tax(x) { x * 0.15 }\nfn double(x) { x * 2.0 }").unwrap();
        assert!(custom.contains("tax"));
        assert_eq!(custom.call("double", &[21.0.into()]).unwrap(), Value::Number(42.0));
        assert!(matches!(
            custom.call("tax", &[]),
            Err(EngineError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_custom_function_compile_error() {
        let err = CustomFunctions::compile("fn broken( {").err().unwrap();
        assert!(err.to_string().starts_with("Error in custom functions:"));
    }
}
