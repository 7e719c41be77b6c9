//! Text-level helpers around the calculator: fenced math sections and
//! markdown test-case documents.

pub mod cases;
pub mod sections;

pub use cases::{CaseOutcome, TestCase, parse_test_cases, run_case, run_cases};
pub use sections::{is_fence_close, is_fence_open, map_math_sections};
