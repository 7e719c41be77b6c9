//! Markdown test-case documents.
//!
//! A case is a heading followed by a given block and an expected block:
//!
//! ````markdown
//! ### Adds numbers
//! **Given:**
//! ```
//! 5 + 3 =
//! ```
//!
//! **Expect:**
//! ```
//! 5 + 3 = 8
//! ```
//! ````
//!
//! `Input`/`Output`, `For Example`/`Result` are accepted as labels too. A
//! heading followed directly by a ```` ```math ```` block is a case whose
//! text must already be fully calculated.

use regex::Regex;
use std::sync::OnceLock;

use crate::document::Calculator;

fn explicit_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^#+ (.*?)\n(?:[^#]*?)\*\*(?:For Example|Input|Given):\*\*\n```(?:.*?)\n([\s\S]+?)\n```\n\n\*\*(?:Result|Output|Expect):\*\*\n```(?:.*?)\n([\s\S]+?)\n```$",
        )
        .expect("test case regex must compile")
    })
}

fn block_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^#+ (.*?)\n(?:[^#]*?)^```math(?:.*?)\n([\s\S]+?)\n^```$")
            .expect("block case regex must compile")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub given: String,
    pub expect: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

/// Every case in `markdown`, in document order. A heading that has an
/// explicit given/expect pair is not also read as a block case.
pub fn parse_test_cases(markdown: &str) -> Vec<TestCase> {
    let text = markdown.replace("\r\n", "\n");
    let mut cases: Vec<(usize, TestCase)> = explicit_case_re()
        .captures_iter(&text)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            Some((
                start,
                TestCase {
                    name: caps[1].trim().to_string(),
                    given: caps[2].to_string(),
                    expect: caps[3].to_string(),
                },
            ))
        })
        .collect();

    let blocks: Vec<(usize, TestCase)> = block_case_re()
        .captures_iter(&text)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            Some((
                start,
                TestCase {
                    name: caps[1].trim().to_string(),
                    given: caps[2].to_string(),
                    expect: caps[2].to_string(),
                },
            ))
        })
        .collect();
    for (start, case) in blocks {
        if !cases.iter().any(|(s, c)| *s == start || c.name == case.name) {
            cases.push((start, case));
        }
    }

    cases.sort_by_key(|(start, _)| *start);
    cases.into_iter().map(|(_, case)| case).collect()
}

/// Run one case on `calc`. Trailing whitespace is ignored when comparing.
pub fn run_case(calc: &mut Calculator, case: &TestCase) -> CaseOutcome {
    let actual = calc.calculate(&case.given);
    let passed = actual.trim_end() == case.expect.trim_end();
    if !passed {
        tracing::debug!(case = %case.name, "test case failed");
    }
    CaseOutcome {
        name: case.name.clone(),
        passed,
        expected: case.expect.clone(),
        actual,
    }
}

/// Run each case on a fresh calculator so units do not leak between cases.
/// Custom functions, if any, are installed with `setup`.
pub fn run_cases<F>(cases: &[TestCase], mut setup: F) -> Vec<CaseOutcome>
where
    F: FnMut(&mut Calculator),
{
    cases
        .iter()
        .map(|case| {
            let mut calc = Calculator::default();
            setup(&mut calc);
            run_case(&mut calc, case)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Cases

### Adds numbers
Some words.
**Given:**
```
5 + 3 =
```

**Expect:**
```
5 + 3 = 8
```

## Already calculated
```math
a = 2
a * 3 = 6
```

### Wrong on purpose
**Input:**
```text
1 + 1 =
```

**Output:**
```text
1 + 1 = 3
```
";

    #[test]
    fn test_parse_cases() {
        let cases = parse_test_cases(DOC);
        let names: Vec<&str> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Adds numbers", "Already calculated", "Wrong on purpose"]);
        assert_eq!(cases[0].given, "5 + 3 =");
        assert_eq!(cases[0].expect, "5 + 3 = 8");
        assert_eq!(cases[1].given, cases[1].expect);
    }

    #[test]
    fn test_run_cases() {
        let outcomes = run_cases(&parse_test_cases(DOC), |_| {});
        let passed: Vec<bool> = outcomes.iter().map(|o| o.passed).collect();
        assert_eq!(passed, vec![true, true, false]);
        assert_eq!(outcomes[2].actual, "1 + 1 = 2");
    }

    #[test]
    fn test_no_cases() {
        assert!(parse_test_cases("# Title\n\nJust prose.\n").is_empty());
    }
}
