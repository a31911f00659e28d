//! Expression AST - the core of SQL expression building.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler.
//!
//! Two column variants carry the quoting policy: `Column` is a
//! catalog-sourced key and always renders double-quoted, `Name` is an
//! engine-owned name (alias, well-known column, CTE) and renders bare.

use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Catalog column reference, always quoted: `"amount"`
    Column(String),

    /// Engine-owned name, optionally qualified, always bare: `user`, `m.value`
    Name {
        qualifier: Option<String>,
        name: String,
    },

    /// Literal values
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// IN list: expr IN (values...)
    In { expr: Box<Expr>, values: Vec<Expr> },

    /// Wildcard: *
    Star,

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Raw SQL passed directly to output without escaping.
    ///
    /// Only catalog-authored saved-filter predicates and engine-built
    /// interval fragments travel through this variant; definition-supplied
    /// values always go through `Expr::Literal`, which escapes.
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column(key) => {
                ts.push(Token::Ident(key.clone()));
            }

            Expr::Name { qualifier, name } => {
                if let Some(q) = qualifier {
                    ts.push(Token::Name(q.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Name(name.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Null => Token::Null,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens());
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens());
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens());
                }
                ts.rparen();
            }

            Expr::In { expr, values } => {
                // "x IN ()" is invalid SQL; an empty allow-list matches nothing
                if values.is_empty() {
                    ts.push(Token::LitInt(1))
                        .space()
                        .push(Token::Eq)
                        .space()
                        .push(Token::LitInt(0));
                } else {
                    ts.append(&expr.to_tokens());
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens());
                    }
                    ts.rparen();
                }
            }

            Expr::Star => {
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens());
                ts.rparen();
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }

    /// Serialize straight to SQL text.
    pub fn to_sql(&self) -> String {
        self.to_tokens().serialize()
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a quoted catalog column reference.
pub fn col(key: &str) -> Expr {
    Expr::Column(key.into())
}

/// Create a bare engine-owned name.
pub fn name(n: &str) -> Expr {
    Expr::Name {
        qualifier: None,
        name: n.into(),
    }
}

/// Create a qualified bare name (alias.name).
pub fn qualified(qualifier: &str, n: &str) -> Expr {
    Expr::Name {
        qualifier: Some(qualifier.into()),
        name: n.into(),
    }
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a float literal.
pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// Create a star (*) expression.
pub fn star() -> Expr {
    Expr::Star
}

// =============================================================================
// Aggregate Functions
// =============================================================================

/// COUNT(expr)
pub fn count(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// COUNT(*)
pub fn count_star() -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![star()],
        distinct: false,
    }
}

/// COUNT(DISTINCT expr)
pub fn count_distinct(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: true,
    }
}

/// SUM(expr)
pub fn sum(expr: Expr) -> Expr {
    Expr::Function {
        name: "SUM".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// MAX(expr)
pub fn max(expr: Expr) -> Expr {
    Expr::Function {
        name: "MAX".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

/// Raw SQL expression (pass-through, no parsing).
///
/// Never pass definition-supplied values here; they are not escaped.
pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Extension trait for building expressions fluently.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    // Comparison operators
    fn eq(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Eq, other.into())
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Ne, other.into())
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gt, other.into())
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gte, other.into())
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lt, other.into())
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lte, other.into())
    }

    // Arithmetic operators
    fn add(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Plus, other.into())
    }

    fn sub(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Minus, other.into())
    }

    fn mul(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Mul, other.into())
    }

    fn div(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Div, other.into())
    }

    // IN operator
    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
        }
    }

    /// Alias this expression (for SELECT lists).
    fn alias(self, name: &str) -> crate::sql::query::SelectItem {
        crate::sql::query::SelectItem::new(self.into_expr(), name)
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Literal::String(s))
    }
}

// =============================================================================
// Tests
// =============================================================================
