//! SQL generation module.
//!
//! This module provides a type-safe SQL builder for the engine's output:
//!
//! - [`query`] - SELECT query builder with comment-bearing predicates
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types and serialization

pub mod expr;
pub mod query;
pub mod token;


// Re-export commonly used types at the sql module level
pub use expr::{
    col, count, count_distinct, count_star, func, lit_float, lit_int, lit_str, max, name,
    qualified, raw_sql, star, sum, BinaryOperator, Expr, ExprExt, Literal,
};
pub use query::{Cte, Join, Predicate, Query, SelectItem, TableRef};
pub use token::{quote_ident, quote_string, Token, TokenStream};
