//! AST-shape predicates.
//!
//! Tells an already printed result (`8`, `5.5 kg`, `90 km / h`, `[1, 2]`)
//! apart from text that still needs evaluating. A result is a literal, a
//! negated result, an array of results, or a result combined with unit
//! terms by juxtaposition, `*` or `/`.

use livesheet_engine::engine::{BinaryOp, ExpressionEngine, Node, Scope, UnaryOp, Value};

/// Coarse classification of one side of a line.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Empty,
    /// A terminal value the engine would print back unchanged.
    Result,
    /// A bare name that is not a unit (or is shadowed by a variable).
    Identifier(String),
    /// `name(args)`; `evaluable` when the function and every bare-name
    /// argument resolve.
    Call { evaluable: bool },
    Expression,
    /// Text the engine cannot parse.
    Invalid,
}

impl Shape {
    pub fn is_evaluable(&self) -> bool {
        matches!(self, Shape::Expression | Shape::Call { evaluable: true })
    }
}

/// Recursive "is this node part of a pure result" visitor.
pub struct ResultVisitor<'a, E: ExpressionEngine + ?Sized> {
    engine: &'a E,
    scope: &'a Scope,
}

impl<'a, E: ExpressionEngine + ?Sized> ResultVisitor<'a, E> {
    pub fn new(engine: &'a E, scope: &'a Scope) -> Self {
        ResultVisitor { engine, scope }
    }

    fn is_unit_symbol(&self, name: &str) -> bool {
        !self.scope.contains(name) && self.engine.is_known_unit(name)
    }

    /// A unit, a power of a unit, or a product/quotient of unit terms.
    pub fn is_unit_term(&self, node: &Node) -> bool {
        match node {
            Node::Symbol(name) => self.is_unit_symbol(name),
            Node::Paren(inner) => self.is_unit_term(inner),
            Node::Binary {
                op: BinaryOp::Power,
                left,
                right,
                ..
            } => self.is_unit_term(left) && is_integer_literal(right),
            Node::Binary {
                op: BinaryOp::Multiply | BinaryOp::Divide,
                left,
                right,
                ..
            } => self.is_unit_term(left) && self.is_unit_term(right),
            _ => false,
        }
    }

    pub fn is_result(&self, node: &Node) -> bool {
        match node {
            Node::Number(_) | Node::Bool(_) => true,
            Node::Symbol(name) => self.is_unit_symbol(name),
            Node::Unary {
                op: UnaryOp::Negate,
                operand,
            } => self.is_result(operand),
            Node::Array(items) => items.iter().all(|item| self.is_result(item)),
            Node::Binary {
                op: BinaryOp::Multiply | BinaryOp::Divide,
                left,
                right,
                ..
            } => self.is_result(left) && self.is_unit_term(right),
            Node::Binary {
                op: BinaryOp::Power,
                ..
            } => self.is_unit_term(node),
            _ => false,
        }
    }

    /// Whether the result contains a literal rather than only unit names
    /// (`5 kg` does, `kg` does not).
    pub fn has_literal(&self, node: &Node) -> bool {
        match node {
            Node::Number(_) | Node::Bool(_) => true,
            Node::Unary { operand, .. } => self.has_literal(operand),
            Node::Array(_) => true,
            Node::Binary { left, .. } => self.has_literal(left),
            _ => false,
        }
    }
}

fn is_integer_literal(node: &Node) -> bool {
    match node {
        Node::Number(n) => n.fract() == 0.0,
        Node::Unary {
            op: UnaryOp::Negate,
            operand,
        } => is_integer_literal(operand),
        Node::Paren(inner) => is_integer_literal(inner),
        _ => false,
    }
}

/// Classify already-normalized text.
pub fn shape_of<E: ExpressionEngine + ?Sized>(text: &str, engine: &E, scope: &Scope) -> Shape {
    if text.trim().is_empty() {
        return Shape::Empty;
    }
    match engine.parse(text) {
        Ok(node) => shape_of_node(&node, engine, scope),
        Err(_) => Shape::Invalid,
    }
}

pub fn shape_of_node<E: ExpressionEngine + ?Sized>(node: &Node, engine: &E, scope: &Scope) -> Shape {
    let visitor = ResultVisitor::new(engine, scope);
    if visitor.is_result(node) {
        return Shape::Result;
    }
    match node {
        Node::Symbol(name) => Shape::Identifier(name.clone()),
        Node::Call { name, args } => {
            let callable = matches!(scope.get(name), Some(Value::Function(_)))
                || (!scope.contains(name) && engine.is_builtin(name));
            let args_resolve = args.iter().all(|arg| match arg {
                Node::Symbol(sym) => {
                    scope.contains(sym) || engine.is_builtin(sym) || engine.is_known_unit(sym)
                }
                _ => true,
            });
            Shape::Call {
                evaluable: callable && args_resolve,
            }
        }
        Node::Assign { .. } | Node::FunctionAssign { .. } => Shape::Invalid,
        _ => Shape::Expression,
    }
}
