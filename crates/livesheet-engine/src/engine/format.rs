use super::value::{UnitExpr, Value};

/// Significant digits used when no precision is configured.
pub const DEFAULT_PRECISION: usize = 14;

/// Format a value for display. Every rendering parses back to the same
/// value (up to `precision`), which keeps rewritten sheets stable.
pub fn format_value(value: &Value, precision: usize) -> String {
    match value {
        Value::Number(n) => format_number(*n, precision),
        Value::Quantity(q) => {
            let unit = format_unit(&q.unit);
            if unit.is_empty() {
                format_number(q.value, precision)
            } else {
                format!("{} {}", format_number(q.value, precision), unit)
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|v| format_value(v, precision)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Function(f) => format!("{}({})", f.name, f.params.join(", ")),
    }
}

/// Format a number with `precision` significant digits.
///
/// Trailing zeros are trimmed. Magnitudes below `1e-7` or from `1e21` up
/// use exponent notation (`1.5e+21`).
pub fn format_number(n: f64, precision: usize) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let precision = precision.clamp(1, 17);
    let scientific = format!("{:.*e}", precision - 1, n);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return n.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return n.to_string();
    };

    let sign = if mantissa.starts_with('-') { "-" } else { "" };
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_end_matches('0');
    if digits.is_empty() {
        return "0".to_string();
    }

    if !(-7..21).contains(&exponent) {
        let (head, tail) = digits.split_at(1);
        let mantissa = if tail.is_empty() {
            head.to_string()
        } else {
            format!("{}.{}", head, tail)
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}{}e{}{}", sign, mantissa, exp_sign, exponent.abs());
    }

    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        return format!("{}0.{}{}", sign, zeros, digits);
    }

    let int_len = exponent as usize + 1;
    if digits.len() <= int_len {
        format!("{}{}{}", sign, digits, "0".repeat(int_len - digits.len()))
    } else {
        format!("{}{}.{}", sign, &digits[..int_len], &digits[int_len..])
    }
}

/// Render a unit expression: numerator units separated by spaces, each
/// denominator unit prefixed with ` / `.
pub fn format_unit(unit: &UnitExpr) -> String {
    let numerator: Vec<String> = unit
        .parts()
        .iter()
        .filter(|(_, power)| *power > 0)
        .map(|(name, power)| with_power(name, *power))
        .collect();
    let denominator: Vec<(&String, i32)> = unit
        .parts()
        .iter()
        .filter(|(_, power)| *power < 0)
        .map(|(name, power)| (name, *power))
        .collect();

    if numerator.is_empty() {
        return denominator
            .iter()
            .map(|(name, power)| with_power(name, *power))
            .collect::<Vec<_>>()
            .join(" ");
    }

    let mut out = numerator.join(" ");
    for (name, power) in denominator {
        out.push_str(" / ");
        out.push_str(&with_power(name, -power));
    }
    out
}

fn with_power(name: &str, power: i32) -> String {
    if power == 1 {
        name.to_string()
    } else {
        format!("{}^{}", name, power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::Quantity;

    #[test]
    fn test_format_number_significant_digits() {
        assert_eq!(format_number(8.0, 14), "8");
        assert_eq!(format_number(0.1 + 0.2, 14), "0.3");
        assert_eq!(format_number(10.0 / 1.1, 14), "9.0909090909091");
        assert_eq!(format_number(-2.5, 14), "-2.5");
        assert_eq!(format_number(1234567.0, 14), "1234567");
        assert_eq!(format_number(-0.0, 14), "0");
        assert_eq!(format_number(2.0 / 3.0, 4), "0.6667");
    }

    #[test]
    fn test_format_number_exponent_ranges() {
        assert_eq!(format_number(1.5e21, 14), "1.5e+21");
        assert_eq!(format_number(1e21, 14), "1e+21");
        assert_eq!(format_number(1e20, 14), "100000000000000000000");
        assert_eq!(format_number(1e-7, 14), "0.0000001");
        assert_eq!(format_number(1.2e-8, 14), "1.2e-8");
    }

    #[test]
    fn test_format_special_values() {
        assert_eq!(format_number(f64::INFINITY, 14), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY, 14), "-Infinity");
        assert_eq!(format_number(f64::NAN, 14), "NaN");
    }

    #[test]
    fn test_format_quantities() {
        let speed = UnitExpr::single("km").divide(&UnitExpr::single("h")).unwrap();
        let value = Value::Quantity(Quantity::new(90.0, speed));
        assert_eq!(format_value(&value, 14), "90 km / h");

        let area = UnitExpr::single("m").multiply(&UnitExpr::single("m")).unwrap();
        let value = Value::Quantity(Quantity::new(4.0, area));
        assert_eq!(format_value(&value, 14), "4 m^2");

        let rate = UnitExpr::single("s").powi(-1).unwrap();
        let value = Value::Quantity(Quantity::new(3.0, rate));
        assert_eq!(format_value(&value, 14), "3 s^-1");
    }

    #[test]
    fn test_format_arrays_and_bools() {
        let value = Value::Array(vec![1.0.into(), Value::Bool(true)]);
        assert_eq!(format_value(&value, 14), "[1, true]");
    }
}
