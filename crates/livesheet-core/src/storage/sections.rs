//! ```` ```math ```` / ```` ```calc ```` fences inside larger documents.

use regex::Regex;
use std::sync::OnceLock;

fn fence_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^```(?:math|calc)(?:[\s{].*)?$").expect("fence regex must compile")
    })
}

/// A column-0 opening fence, attributes allowed (```` ```math {id = "x"} ````).
pub fn is_fence_open(line: &str) -> bool {
    fence_open_re().is_match(line.strip_suffix('\r').unwrap_or(line))
}

pub fn is_fence_close(line: &str) -> bool {
    line.strip_suffix('\r').unwrap_or(line) == "```"
}

/// Replace the interior of every terminated math fence with `f(interior)`.
/// Fence lines and everything outside them are copied verbatim.
pub fn map_math_sections<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if !is_fence_open(line) {
            out.push(line.to_string());
            i += 1;
            continue;
        }
        let Some(close) = (i + 1..lines.len()).find(|&j| is_fence_close(lines[j])) else {
            tracing::debug!(line = i + 1, "unterminated math fence left as is");
            out.extend(lines[i..].iter().map(|l| l.to_string()));
            break;
        };
        out.push(line.to_string());
        if close > i + 1 {
            out.push(f(&lines[i + 1..close].join("\n")));
        }
        out.push(lines[close].to_string());
        i = close + 1;
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(text: &str) -> String {
        map_math_sections(text, |body| body.to_uppercase())
    }

    #[test]
    fn test_fence_detection() {
        assert!(is_fence_open("```math"));
        assert!(is_fence_open("```calc"));
        assert!(is_fence_open("```math {id = \"x\"}"));
        assert!(is_fence_open("```math\r"));
        assert!(!is_fence_open("```mathematics"));
        assert!(!is_fence_open("  ```math"));
        assert!(!is_fence_open("```rust"));
        assert!(is_fence_close("```"));
        assert!(!is_fence_close("``` "));
    }

    #[test]
    fn test_only_fence_interiors_are_mapped() {
        let text = "intro\n```math\na\nb\n```\noutro\n```calc {x}\nc\n```\n";
        assert_eq!(upper(text), "intro\n```math\nA\nB\n```\noutro\n```calc {x}\nC\n```\n");
    }

    #[test]
    fn test_unterminated_and_indented_fences_are_untouched() {
        let text = "```math\na\nb";
        assert_eq!(upper(text), text);
        let text = "  ```math\na\n```";
        assert_eq!(upper(text), text);
    }

    #[test]
    fn test_empty_fence() {
        let mut calls = 0;
        let out = map_math_sections("```math\n```", |body| {
            calls += 1;
            body.to_string()
        });
        assert_eq!(out, "```math\n```");
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_other_fences_pass_through() {
        let text = "```rust\nlet a = 1;\n```";
        assert_eq!(upper(text), text);
    }
}
