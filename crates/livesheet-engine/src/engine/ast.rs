//! Expression syntax tree.
//!
//! The node set is closed: the line classifier walks these variants to
//! decide whether a piece of text is already a printed result or still an
//! expression that needs evaluating.

use std::fmt;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Numeric literal (decimal, scientific, `0b`, `0o` or `0x`).
    Number(f64),
    /// `true` / `false`
    Bool(bool),
    /// Bare identifier: a variable, constant or unit name.
    Symbol(String),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
        /// Multiplication written by juxtaposition (`5 kg`, `2 pi`).
        implicit: bool,
    },
    /// `cond ? then : otherwise`
    Conditional {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    /// `value to unit` / `value in unit`
    Convert {
        value: Box<Node>,
        target: Box<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
    Array(Vec<Node>),
    Paren(Box<Node>),
    Assign {
        name: String,
        value: Box<Node>,
    },
    FunctionAssign {
        name: String,
        params: Vec<String>,
        body: Box<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
    Factorial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "mod",
            BinaryOp::Power => "^",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }
}

impl Node {
    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            implicit: false,
        }
    }

    pub fn implicit_mul(left: Node, right: Node) -> Node {
        Node::Binary {
            op: BinaryOp::Multiply,
            left: Box::new(left),
            right: Box::new(right),
            implicit: true,
        }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        Node::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// The identifier if this node is a bare symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Node::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Short variant name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Number(_) => "number",
            Node::Bool(_) => "bool",
            Node::Symbol(_) => "symbol",
            Node::Unary { .. } => "unary",
            Node::Binary { .. } => "binary",
            Node::Conditional { .. } => "conditional",
            Node::Convert { .. } => "convert",
            Node::Call { .. } => "call",
            Node::Array(_) => "array",
            Node::Paren(_) => "paren",
            Node::Assign { .. } => "assign",
            Node::FunctionAssign { .. } => "function_assign",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Number(n) => write!(f, "{}", n),
            Node::Bool(b) => write!(f, "{}", b),
            Node::Symbol(name) => write!(f, "{}", name),
            Node::Unary { op, operand } => match op {
                UnaryOp::Negate => write!(f, "-{}", operand),
                UnaryOp::Plus => write!(f, "+{}", operand),
                UnaryOp::Not => write!(f, "not {}", operand),
                UnaryOp::Factorial => write!(f, "{}!", operand),
            },
            Node::Binary {
                op,
                left,
                right,
                implicit,
            } => {
                if *implicit {
                    write!(f, "{} {}", left, right)
                } else {
                    write!(f, "{} {} {}", left, op.symbol(), right)
                }
            }
            Node::Conditional {
                cond,
                then,
                otherwise,
            } => write!(f, "{} ? {} : {}", cond, then, otherwise),
            Node::Convert { value, target } => write!(f, "{} to {}", value, target),
            Node::Call { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Node::Array(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Node::Paren(inner) => write!(f, "({})", inner),
            Node::Assign { name, value } => write!(f, "{} = {}", name, value),
            Node::FunctionAssign { name, params, body } => {
                write!(f, "{}({}) = {}", name, params.join(", "), body)
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Node]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
