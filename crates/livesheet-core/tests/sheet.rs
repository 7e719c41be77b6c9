//! End-to-end behaviour of `Calculator::calculate`.

use livesheet_core::storage::{parse_test_cases, run_cases};
use livesheet_core::{Calculator, LineClassification, Value};
use pretty_assertions::assert_eq;

fn calc(text: &str) -> String {
    Calculator::default().calculate(text)
}

#[test]
fn test_scope_threading() {
    assert_eq!(calc("a = 2\na + 3 ="), "a = 2\na + 3 = 5");
}

#[test]
fn test_pure_expression() {
    assert_eq!(calc("5 + 3 ="), "5 + 3 = 8");
}

#[test]
fn test_provided_results_are_hints() {
    assert_eq!(calc("5 + 3 = 100"), "5 + 3 = 8");
    assert_eq!(calc("5 + 3 = 8 +"), "5 + 3 = 8");
}

#[test]
fn test_cascading_assignment() {
    let mut calc = Calculator::default();
    assert_eq!(calc.calculate("a = 2\nb = a\nb + 1 ="), "a = 2\nb = a\nb + 1 = 3");
    assert!(matches!(calc.scope().get("b"), Some(Value::Number(n)) if *n == 2.0));
}

#[test]
fn test_division_by_zero_is_line_local() {
    assert_eq!(
        calc("1 / 0 =\n2 + 2 ="),
        "1 / 0 = Error: Infinity. Possible Division by zero\n2 + 2 = 4"
    );
}

#[test]
fn test_non_finite_results_are_line_local() {
    assert_eq!(
        calc("0 / 0 =\n2 + 2 ="),
        "0 / 0 = Error: Infinity. Possible Division by zero\n2 + 2 = 4"
    );
    assert_eq!(calc("171! ="), "171! = Error: Infinity. Possible Division by zero");
    assert_eq!(calc("5! ="), "5! = 120");

    let out = calc("1e400 =\n2 + 2 =");
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].starts_with("1e400 = Error: "), "{}", lines[0]);
    assert_eq!(lines[1], "2 + 2 = 4");
}

#[test]
fn test_deeply_nested_line_is_line_local() {
    let deep = format!("{}1{}", "(".repeat(2000), ")".repeat(2000));
    let out = calc(&format!("{} =\n1 + 1 =", deep));
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].starts_with(&format!("{} = Error: ", deep)));
    assert_eq!(lines[1], "1 + 1 = 2");
}

#[test]
fn test_huge_unit_power_is_line_local() {
    assert_eq!(
        calc("(2 m^2) ^ 1500000000 =\n1 + 1 ="),
        "(2 m^2) ^ 1500000000 = Error: Unit exponent out of range\n1 + 1 = 2"
    );
}

#[test]
fn test_undefined_symbol() {
    assert_eq!(calc("x + 1 ="), "x + 1 = Error: Undefined symbol x");
}

#[test]
fn test_implied_result() {
    assert_eq!(calc("5 + 3\n="), "5 + 3\n= 8");
}

#[test]
fn test_unit_round_trip() {
    assert_eq!(
        calc("EUR/USD = 1.1\n10 EUR to USD ="),
        "EUR/USD = 1.1\n10 EUR to USD = 9.0909090909091 USD"
    );
}

#[test]
fn test_forced_overwrite_via_indentation() {
    let mut calc = Calculator::default();
    assert_eq!(calc.calculate("a = 2\n  a = 2"), "a = 2\n  a = 2");
    assert_eq!(calc.calculate("a = 1 + 1\n  a = 9"), "a = 1 + 1\n  a = 2");
    assert!(matches!(calc.scope().get("a"), Some(Value::Number(n)) if *n == 2.0));
}

#[test]
fn test_error_annotations_heal() {
    let mut calc = Calculator::default();
    let first = calc.calculate("x + 1 =");
    assert_eq!(first, "x + 1 = Error: Undefined symbol x");
    let healed = calc.calculate(&format!("x = 4\n{}", first));
    assert_eq!(healed, "x = 4\nx + 1 = 5");
}

#[test]
fn test_idempotence() {
    let doc = "\
# Groceries
apples = 3
price = 2.5
apples * price =
total: apples * price
  price = 1

EUR/USD = 1.1
50 EUR to USD =
f(x) = x^2 + 1
f(3) =
5 + 3
=
1 / 0 =";
    let mut calc = Calculator::default();
    let once = calc.calculate(doc);
    let twice = calc.calculate(&once);
    assert_eq!(once, twice);
}

#[test]
fn test_determinism() {
    let doc = "a = 3\nb = a * 2\nb ^ 2 =\nsqrt(b) =";
    assert_eq!(calc(doc), calc(doc));
}

#[test]
fn test_line_count_is_preserved() {
    let doc = "a = 1\n\n\nnot math at all\n1 / 0 =\n=\n";
    assert_eq!(calc(doc).split('\n').count(), doc.split('\n').count());
}

#[test]
fn test_math_sections() {
    let doc = "\
Intro a = 1 + 1 =

```math {id=\"one\"}
a = 2
a * 2 =
```

Between.

```calc
a + 1 =
```
";
    let expected = "\
Intro a = 1 + 1 =

```math {id=\"one\"}
a = 2
a * 2 = 4
```

Between.

```calc
a + 1 = Error: Undefined symbol a
```
";
    let mut calc = Calculator::default();
    assert_eq!(calc.calculate_with_math_sections(doc), expected);
    assert_eq!(calc.statistics().total_calculations, 3);
}

#[test]
fn test_classifications_are_exposed() {
    assert_eq!(LineClassification::PureExpression.to_string(), "PureExpression");
}

#[test]
fn test_markdown_cases_fixture() {
    let text = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/cases.md"
    ))
    .unwrap();
    let cases = parse_test_cases(&text);
    assert_eq!(cases.len(), 7);
    for outcome in run_cases(&cases, |_| {}) {
        assert!(
            outcome.passed,
            "case {:?}\nexpected:\n{}\nactual:\n{}",
            outcome.name, outcome.expected, outcome.actual
        );
    }
}
