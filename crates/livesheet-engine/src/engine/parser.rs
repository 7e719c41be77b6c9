//! Expression tokenizer and parser.
//!
//! A recursive descent parser with the usual calculator precedence, from
//! loosest to tightest:
//!
//! - assignment `a = expr`, `f(x) = expr` (right-associative)
//! - conditional `c ? a : b`
//! - `or`, `xor`, `and`
//! - comparison `== != < > <= >=`
//! - unit conversion `expr to unit`, `expr in unit`
//! - `+ -`
//! - `* / % mod`
//! - implicit multiplication (`5 kg`, `2 pi r`)
//! - unary `- + not`
//! - `^` (right-associative), postfix `!`

use std::fmt;

use super::ast::{BinaryOp, Node, UnaryOp};
use crate::error::{EngineError, Result};

/// Words with operator meaning; never parsed as symbols.
pub const KEYWORDS: &[&str] = &["to", "in", "mod", "and", "or", "xor", "not", "true", "false"];

/// Deepest nesting of brackets, operands and branches the parser accepts.
const MAX_NESTING: usize = 128;

/// Parse an expression into a syntax tree.
pub fn parse_expression(text: &str) -> Result<Node> {
    let tokens = tokenize(text)?;
    if tokens.len() == 1 {
        return Err(EngineError::parse("Empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.parse_assignment()?;
    match parser.peek() {
        Token::Eof => Ok(node),
        other => Err(EngineError::parse(format!(
            "Unexpected {} (char {})",
            other,
            parser.offset()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Question,
    Colon,
    Comma,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Number(n) => return write!(f, "number {}", n),
            Token::Ident(name) => return write!(f, "symbol \"{}\"", name),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Bang => "!",
            Token::Assign => "=",
            Token::Equal => "==",
            Token::NotEqual => "!=",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Eof => return write!(f, "end of expression"),
        };
        write!(f, "operator \"{}\"", text)
    }
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let (value, next) = scan_number(&chars, i)?;
            tokens.push((Token::Number(value), start));
            i = next;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            tokens.push((Token::Ident(name), start));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Equal, 2),
            ('!', Some('=')) => (Token::NotEqual, 2),
            ('<', Some('=')) => (Token::LessEqual, 2),
            ('>', Some('=')) => (Token::GreaterEqual, 2),
            ('=', _) => (Token::Assign, 1),
            ('!', _) => (Token::Bang, 1),
            ('<', _) => (Token::Less, 1),
            ('>', _) => (Token::Greater, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('^', _) => (Token::Caret, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            (',', _) => (Token::Comma, 1),
            ('(', _) => (Token::LeftParen, 1),
            (')', _) => (Token::RightParen, 1),
            ('[', _) => (Token::LeftBracket, 1),
            (']', _) => (Token::RightBracket, 1),
            _ => {
                return Err(EngineError::parse(format!(
                    "Syntax error in part \"{}\" (char {})",
                    chars[i..].iter().collect::<String>(),
                    i + 1
                )));
            }
        };
        tokens.push((token, start));
        i += width;
    }

    tokens.push((Token::Eof, chars.len()));
    Ok(tokens)
}

fn scan_number(chars: &[char], start: usize) -> Result<(f64, usize)> {
    // Radix literals: 0b1010, 0o17, 0x1F
    if chars[start] == '0' {
        let radix = match chars.get(start + 1) {
            Some('b') | Some('B') => Some(2),
            Some('o') | Some('O') => Some(8),
            Some('x') | Some('X') => Some(16),
            _ => None,
        };
        if let Some(radix) = radix {
            let digits_start = start + 2;
            let mut end = digits_start;
            while end < chars.len() && chars[end].is_digit(radix) {
                end += 1;
            }
            if end > digits_start {
                let digits: String = chars[digits_start..end].iter().collect();
                let value = u64::from_str_radix(&digits, radix)
                    .map_err(|e| EngineError::parse(format!("Invalid number {}: {}", digits, e)))?;
                return Ok((value as f64, end));
            }
        }
    }

    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end < chars.len() && chars[end] == '.' {
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }
    // Only take the exponent when digits follow, so `2e` stays `2 e`.
    if end < chars.len() && (chars[end] == 'e' || chars[end] == 'E') {
        let mut probe = end + 1;
        if probe < chars.len() && (chars[probe] == '+' || chars[probe] == '-') {
            probe += 1;
        }
        if probe < chars.len() && chars[probe].is_ascii_digit() {
            end = probe;
            while end < chars.len() && chars[end].is_ascii_digit() {
                end += 1;
            }
        }
    }

    let text: String = chars[start..end].iter().collect();
    let value = text
        .parse::<f64>()
        .map_err(|e| EngineError::parse(format!("Invalid number {}: {}", text, e)))?;
    Ok((value, end))
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1 + 1
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == keyword)
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(EngineError::parse(format!(
                "Expected {} but found {} (char {})",
                expected,
                self.peek(),
                self.offset()
            )))
        }
    }

    fn unexpected(&self) -> EngineError {
        match self.peek() {
            Token::Eof => EngineError::parse("Unexpected end of expression"),
            other => EngineError::parse(format!("Unexpected {} (char {})", other, self.offset())),
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(EngineError::parse("Expression nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_assignment(&mut self) -> Result<Node> {
        let target = self.parse_conditional()?;
        if *self.peek() != Token::Assign {
            return Ok(target);
        }
        self.advance();
        let value = self.nested(Self::parse_assignment)?;

        match target {
            Node::Symbol(name) => Ok(Node::Assign {
                name,
                value: Box::new(value),
            }),
            Node::Call { name, args } => {
                let params = args
                    .iter()
                    .map(|arg| arg.as_symbol().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        EngineError::parse(format!("Invalid parameters in definition of {}", name))
                    })?;
                Ok(Node::FunctionAssign {
                    name,
                    params,
                    body: Box::new(value),
                })
            }
            other => Err(EngineError::parse(format!(
                "Invalid left hand side of assignment: {}",
                other
            ))),
        }
    }

    fn parse_conditional(&mut self) -> Result<Node> {
        let cond = self.parse_or()?;
        if *self.peek() != Token::Question {
            return Ok(cond);
        }
        self.advance();
        let then = self.nested(Self::parse_conditional)?;
        self.expect(Token::Colon)?;
        let otherwise = self.nested(Self::parse_conditional)?;
        Ok(Node::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut left = self.parse_xor()?;
        while self.peek_keyword("or") {
            self.advance();
            let right = self.parse_xor()?;
            left = Node::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Node> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("xor") {
            self.advance();
            let right = self.parse_and()?;
            left = Node::binary(BinaryOp::Xor, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut left = self.parse_comparison()?;
        while self.peek_keyword("and") {
            self.advance();
            let right = self.parse_comparison()?;
            left = Node::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let mut left = self.parse_conversion()?;
        loop {
            let op = match self.peek() {
                Token::Equal => BinaryOp::Equal,
                Token::NotEqual => BinaryOp::NotEqual,
                Token::Less => BinaryOp::Less,
                Token::LessEqual => BinaryOp::LessEqual,
                Token::Greater => BinaryOp::Greater,
                Token::GreaterEqual => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_conversion()?;
            left = Node::binary(op, left, right);
        }
    }

    fn parse_conversion(&mut self) -> Result<Node> {
        let mut value = self.parse_additive()?;
        while self.peek_keyword("to") || self.peek_keyword("in") {
            self.advance();
            let target = self.parse_additive()?;
            value = Node::Convert {
                value: Box::new(value),
                target: Box::new(target),
            };
        }
        Ok(value)
    }

    fn parse_additive(&mut self) -> Result<Node> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Node::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node> {
        let mut left = self.parse_implicit()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                Token::Ident(name) if name == "mod" => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_implicit()?;
            left = Node::binary(op, left, right);
        }
    }

    fn parse_implicit(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;
        while self.starts_implicit_operand() {
            let right = self.parse_power()?;
            left = Node::implicit_mul(left, right);
        }
        Ok(left)
    }

    fn starts_implicit_operand(&self) -> bool {
        match self.peek() {
            Token::Number(_) | Token::LeftParen | Token::LeftBracket => true,
            Token::Ident(name) => !is_keyword(name) || name == "true" || name == "false",
            _ => false,
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Node::unary(UnaryOp::Negate, self.nested(Self::parse_unary)?))
            }
            Token::Plus => {
                self.advance();
                Ok(Node::unary(UnaryOp::Plus, self.nested(Self::parse_unary)?))
            }
            Token::Ident(name) if name == "not" => {
                self.advance();
                Ok(Node::unary(UnaryOp::Not, self.nested(Self::parse_unary)?))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Node> {
        let base = self.parse_postfix()?;
        if *self.peek() != Token::Caret {
            return Ok(base);
        }
        self.advance();
        let exponent = self.nested(Self::parse_unary)?;
        Ok(Node::binary(BinaryOp::Power, base, exponent))
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut node = self.parse_primary()?;
        while *self.peek() == Token::Bang {
            self.advance();
            node = Node::unary(UnaryOp::Factorial, node);
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        match self.peek().clone() {
            Token::Number(value) => {
                self.advance();
                Ok(Node::Number(value))
            }
            Token::Ident(name) => {
                if name == "true" || name == "false" {
                    self.advance();
                    return Ok(Node::Bool(name == "true"));
                }
                if is_keyword(&name) {
                    return Err(self.unexpected());
                }
                self.advance();
                if *self.peek() == Token::LeftParen {
                    self.advance();
                    let args = self.nested(|p| p.parse_list(Token::RightParen))?;
                    return Ok(Node::Call { name, args });
                }
                Ok(Node::Symbol(name))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.nested(Self::parse_conditional)?;
                self.expect(Token::RightParen)?;
                Ok(Node::Paren(Box::new(inner)))
            }
            Token::LeftBracket => {
                self.advance();
                let items = self.nested(|p| p.parse_list(Token::RightBracket))?;
                Ok(Node::Array(items))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: Token) -> Result<Vec<Node>> {
        let mut items = Vec::new();
        if *self.peek() == close {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_conditional()?);
            let next = self.peek().clone();
            if next == Token::Comma {
                self.advance();
            } else if next == close {
                self.advance();
                return Ok(items);
            } else {
                return Err(self.unexpected());
            }
        }
    }
}
