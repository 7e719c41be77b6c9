//! Expression engine API.
//!
//! - [`parse_expression`] - Tokenize and parse text into a [`Node`] tree
//! - [`MathEngine`] - Evaluate nodes against a [`Scope`], with unit algebra
//! - [`UnitRegistry`] - Built-in units plus units defined at runtime
//! - [`ExpressionEngine`] - The contract the document layer consumes
//! - [`format_value`] - Render values the way the parser reads them back

mod adapter;
mod ast;
mod eval;
mod format;
pub(crate) mod ops;
mod parser;
pub(crate) mod units;
mod value;

pub use adapter::ExpressionEngine;
pub use ast::{BinaryOp, Node, UnaryOp};
pub use eval::MathEngine;
pub use format::{DEFAULT_PRECISION, format_number, format_unit, format_value};
pub use parser::{KEYWORDS, parse_expression};
pub use units::{Dimensions, UnitDef, UnitRegistry, is_builtin_unit};
pub use value::{Quantity, Scope, UnitExpr, UserFunction, Value};
