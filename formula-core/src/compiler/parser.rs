//! Expression parser.
//!
//! A recursive-descent parser producing an arena-allocated [`Ast`]. Nodes
//! are pushed after their operands, so the arena is always in post-order:
//! every operand index is smaller than the index of the node that uses it.
//! Lowering relies on this to run as a single forward pass.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! additive       := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/') unary)*
//! unary          := '-' unary | power
//! power          := primary ('^' unary)?          (right associative)
//! primary        := number | identifier | '(' additive ')'
//! ```
//!
//! Exponent binds tighter than a leading minus, so `-2^2` is `-(2^2)`, and
//! its right operand may itself be negated, so `2^-1` is `0.5`.

use serde::Serialize;

use super::lexer::{Lexer, Token, TokenKind};
use crate::config::CompilerConfig;
use crate::error::{FormulaError, Result};

/// Index of a node in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExprId(usize);

impl ExprId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOperator {
    Neg,
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// Bare identifier naming a variable
    VarRef(String),
    BinaryOp {
        op: BinaryOperator,
        left: ExprId,
        right: ExprId,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: ExprId,
    },
}

/// A parsed expression stored in post-order.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    nodes: Vec<Expr>,
    root: ExprId,
}

impl Ast {
    pub fn root(&self) -> ExprId {
        self.root
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.0]
    }

    /// All nodes, operands before the nodes that use them.
    pub fn nodes(&self) -> &[Expr] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Identifiers in order of first appearance, without duplicates.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if let Expr::VarRef(name) = node {
                if !seen.contains(&name.as_str()) {
                    seen.push(name);
                }
            }
        }
        seen
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    nodes: Vec<Expr>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, config: &CompilerConfig) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            nodes: Vec::new(),
            depth: 0,
            max_depth: config.max_nesting_depth,
        })
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn push(&mut self, expr: Expr) -> ExprId {
        self.nodes.push(expr);
        ExprId(self.nodes.len() - 1)
    }

    fn parse(mut self) -> Result<Ast> {
        let root = self.parse_additive()?;
        if self.current.kind != TokenKind::Eof {
            return Err(FormulaError::syntax(
                format!("unexpected {} after expression", describe(&self.current.kind)),
                self.current.position,
            ));
        }
        Ok(Ast {
            nodes: self.nodes,
            root,
        })
    }

    fn parse_additive(&mut self) -> Result<ExprId> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = self.push(Expr::BinaryOp { op, left, right });
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprId> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = self.push(Expr::BinaryOp { op, left, right });
        }

        Ok(left)
    }

    // Every nested construct re-enters here, so the depth limit lives here.
    fn parse_unary(&mut self) -> Result<ExprId> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormulaError::NestingTooDeep {
                limit: self.max_depth,
            });
        }

        let result = self.parse_negation();
        self.depth -= 1;
        result
    }

    fn parse_negation(&mut self) -> Result<ExprId> {
        if self.current.kind != TokenKind::Minus {
            return self.parse_power();
        }
        self.advance()?;
        let operand = self.parse_unary()?;
        Ok(self.push(Expr::UnaryOp {
            op: UnaryOperator::Neg,
            operand,
        }))
    }

    fn parse_power(&mut self) -> Result<ExprId> {
        let base = self.parse_primary()?;

        if self.current.kind == TokenKind::Caret {
            self.advance()?;
            let exponent = self.parse_unary()?;
            Ok(self.push(Expr::BinaryOp {
                op: BinaryOperator::Pow,
                left: base,
                right: exponent,
            }))
        } else {
            Ok(base)
        }
    }

    fn parse_primary(&mut self) -> Result<ExprId> {
        match &self.current.kind {
            TokenKind::Number(n) => {
                let value = *n;
                self.advance()?;
                Ok(self.push(Expr::Number(value)))
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(self.push(Expr::VarRef(name)))
            }
            TokenKind::LParen => {
                let open = self.current.position;
                self.advance()?;
                let inner = self.parse_additive()?;
                if self.current.kind != TokenKind::RParen {
                    return Err(FormulaError::syntax(
                        format!("expected ')' to close '(' at {open}"),
                        self.current.position,
                    ));
                }
                self.advance()?;
                Ok(inner)
            }
            other => Err(FormulaError::syntax(
                format!("expected a number, variable or '(', found {}", describe(other)),
                self.current.position,
            )),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {n}"),
        TokenKind::Identifier(name) => format!("identifier '{name}'"),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::Slash => "'/'".to_string(),
        TokenKind::Caret => "'^'".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

/// Parse expression text into an [`Ast`].
pub fn parse_expression(source: &str, config: &CompilerConfig) -> Result<Ast> {
    if source.len() > config.max_expression_len {
        return Err(FormulaError::syntax(
            format!(
                "expression is {} bytes, longer than the limit of {}",
                source.len(),
                config.max_expression_len
            ),
            config.max_expression_len,
        ));
    }
    if source.trim().is_empty() {
        return Err(FormulaError::syntax("empty expression", 0));
    }
    Parser::new(source, config)?.parse()
}
