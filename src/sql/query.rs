//! Query builder - construct SELECT statements with a fluent API.
//!
//! Predicates and select items carry optional intent comments; the
//! layout puts one predicate per line with a leading `AND` so the
//! rendered text reads as an auditable checklist.

use super::expr::Expr;
use super::token::{Token, TokenStream};

// =============================================================================
// Select Item (expression with alias and optional comment)
// =============================================================================

/// A SELECT list item: expression, bare alias, optional intent comment.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
    pub comment: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr, alias: &str) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
            comment: None,
        }
    }

    pub fn bare(expr: Expr) -> Self {
        Self {
            expr,
            alias: None,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        SelectItem::bare(expr)
    }
}

// =============================================================================
// Predicate (boolean expression with optional comment)
// =============================================================================

/// A WHERE or HAVING line: boolean expression plus intent comment.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Predicate {
    pub expr: Expr,
    pub comment: Option<String>,
}

impl Predicate {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = self.expr.to_tokens();
        if let Some(comment) = &self.comment {
            ts.space().push(Token::LineComment(comment.clone()));
        }
        ts
    }
}

impl From<Expr> for Predicate {
    fn from(expr: Expr) -> Self {
        Predicate::new(expr)
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// A table reference with optional bare alias.
///
/// `quoted` distinguishes catalog tables (quoted) from engine-owned CTE
/// names (bare).
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
    quoted: bool,
}

impl TableRef {
    /// Reference a catalog table (rendered quoted).
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            alias: None,
            quoted: true,
        }
    }

    /// Reference an engine-owned CTE (rendered bare).
    pub fn cte(name: &str) -> Self {
        Self {
            table: name.into(),
            alias: None,
            quoted: false,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(if self.quoted {
            Token::Ident(self.table.clone())
        } else {
            Token::Name(self.table.clone())
        });
        if let Some(alias) = &self.alias {
            ts.space().push(Token::Name(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// A LEFT JOIN clause with optional intent comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub on: Expr,
    pub comment: Option<String>,
}

impl Join {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Left).space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());
        ts.space().push(Token::On).space();
        ts.append(&self.on.to_tokens());
        if let Some(comment) = &self.comment {
            ts.space().push(Token::LineComment(comment.clone()));
        }
        ts
    }
}

// =============================================================================
// CTE (Common Table Expression)
// =============================================================================

/// A Common Table Expression holding an already-rendered query body.
///
/// The body embeds verbatim, indented one level, so the per-role queries
/// appear inside the rollup exactly as they were compiled standalone.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Cte {
    pub name: String,
    pub body: String,
}

impl Cte {
    pub fn new(name: &str, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Name(self.name.clone()))
            .space()
            .push(Token::As)
            .space()
            .lparen()
            .newline();
        for line in self.body.lines() {
            if line.is_empty() {
                ts.newline();
            } else {
                ts.indent(1).push(Token::Raw(line.into())).newline();
            }
        }
        ts.rparen();
        ts
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql() or to_tokens()"]
pub struct Query {
    /// Leading comment line describing the query.
    pub header: Option<String>,
    pub with: Vec<Cte>,
    pub select: Vec<SelectItem>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Vec<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Vec<Predicate>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the leading header comment.
    pub fn header(mut self, text: &str) -> Self {
        self.header = Some(text.into());
        self
    }

    /// Add a CTE (WITH clause).
    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    /// Add a SELECT list item.
    pub fn select_item(mut self, item: impl Into<SelectItem>) -> Self {
        self.select.push(item.into());
        self
    }

    /// Set the FROM table.
    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    /// Add a LEFT JOIN.
    pub fn left_join(mut self, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            table,
            on,
            comment: None,
        });
        self
    }

    /// Add a LEFT JOIN with an intent comment.
    pub fn left_join_commented(mut self, table: TableRef, on: Expr, comment: &str) -> Self {
        self.joins.push(Join {
            table,
            on,
            comment: Some(comment.into()),
        });
        self
    }

    /// Add a WHERE predicate (one line each, ANDed in order).
    pub fn filter(mut self, predicate: impl Into<Predicate>) -> Self {
        self.where_clause.push(predicate.into());
        self
    }

    /// Add WHERE predicates in order.
    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.where_clause.extend(predicates);
        self
    }

    /// Set the GROUP BY keys.
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Add a HAVING predicate.
    pub fn having(mut self, predicate: impl Into<Predicate>) -> Self {
        self.having.push(predicate.into());
        self
    }

    /// Add HAVING predicates in order.
    pub fn havings(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.having.extend(predicates);
        self
    }

    /// Convert to a token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        // Header comment
        if let Some(header) = &self.header {
            ts.push(Token::LineComment(header.clone())).newline();
        }

        // WITH clause
        if !self.with.is_empty() {
            ts.push(Token::With).space();
            for (i, cte) in self.with.iter().enumerate() {
                if i > 0 {
                    ts.comma().newline();
                }
                ts.append(&cte.to_tokens());
            }
            ts.newline();
        }

        // SELECT list, one item per line; the comma binds to the item,
        // ahead of any comment
        ts.push(Token::Select);
        for (i, item) in self.select.iter().enumerate() {
            ts.newline().indent(1);
            ts.append(&item.expr.to_tokens());
            if let Some(alias) = &item.alias {
                ts.space()
                    .push(Token::As)
                    .space()
                    .push(Token::Name(alias.clone()));
            }
            if i + 1 < self.select.len() {
                ts.comma();
            }
            if let Some(comment) = &item.comment {
                ts.space().push(Token::LineComment(comment.clone()));
            }
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens());
        }

        // JOINs
        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens());
        }

        // WHERE, one predicate per line with leading AND
        if !self.where_clause.is_empty() {
            ts.newline().push(Token::Where);
            for (i, predicate) in self.where_clause.iter().enumerate() {
                ts.newline().indent(1);
                if i > 0 {
                    ts.push(Token::And).space();
                }
                ts.append(&predicate.to_tokens());
            }
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens());
            }
        }

        // HAVING, same shape as WHERE
        if !self.having.is_empty() {
            ts.newline().push(Token::Having);
            for (i, predicate) in self.having.iter().enumerate() {
                ts.newline().indent(1);
                if i > 0 {
                    ts.push(Token::And).space();
                }
                ts.append(&predicate.to_tokens());
            }
        }

        ts
    }

    /// Render to SQL text.
    pub fn to_sql(&self) -> String {
        self.to_tokens().serialize()
    }
}

// =============================================================================
// Tests
// =============================================================================
