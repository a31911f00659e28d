//! SQL tokens - the atomic units of SQL output.
//!
//! The engine emits one portable SQL text, so tokens serialize directly
//! to strings. Quoting policy: identifiers that originate in catalog or
//! caller data are double-quoted (`Token::Ident`), engine-owned names
//! (`user`, `value`, `timestamp`, CTE names) stay bare (`Token::Name`).

/// SQL token - every element the engine can emit.
///
/// Adding a new variant here causes compile errors everywhere it needs
/// to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Not,
    As,
    On,
    Left,
    Join,
    GroupBy,
    Having,
    With,
    In,
    Distinct,
    Null,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Quoted identifier sourced from catalog or caller data.
    Ident(String),
    /// Engine-owned bare name (aliases, well-known columns, CTE names).
    Name(String),
    /// Integer literal
    LitInt(i64),
    /// Float literal
    LitFloat(f64),
    /// String literal, single-quoted with `''` escaping
    LitString(String),

    // === Function Names ===
    /// Function name, rendered uppercase.
    FunctionName(String),

    // === Comments ===
    /// End-of-line intent comment, rendered as `-- text`.
    LineComment(String),

    // === Escape Hatch ===
    /// Raw SQL passed directly to output without escaping.
    ///
    /// Only saved-filter predicate text (catalog-authored SQL) and
    /// engine-built interval fragments travel through this variant.
    /// Never route definition-supplied values here; string values use
    /// `Token::LitString`, which escapes.
    Raw(String),
}

/// Double-quote an identifier, escaping embedded quotes by doubling.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, escaping embedded quotes by doubling.
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Token {
    /// Serialize this token to its SQL text.
    pub fn serialize(&self) -> String {
        match self {
            // Keywords
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Left => "LEFT".into(),
            Token::Join => "JOIN".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::Having => "HAVING".into(),
            Token::With => "WITH".into(),
            Token::In => "IN".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::Null => "NULL".into(),

            // Punctuation
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            // Operators
            Token::Eq => "=".into(),
            Token::Ne => "!=".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Mul => "*".into(),
            Token::Div => "/".into(),

            // Whitespace
            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            // Dynamic content
            Token::Ident(name) => quote_ident(name),
            Token::Name(name) => name.clone(),
            Token::LitInt(n) => n.to_string(),
            Token::LitFloat(f) => {
                if f.is_nan() {
                    panic!("Cannot serialize NaN to SQL")
                }
                if f.is_infinite() {
                    panic!("Cannot serialize Infinity to SQL")
                }
                let mut buffer = ryu::Buffer::new();
                buffer.format(*f).to_string()
            }
            Token::LitString(s) => quote_string(s),

            // Function names
            Token::FunctionName(name) => name.to_uppercase(),

            // Comments
            Token::LineComment(text) => format!("-- {}", text),

            // Escape hatch
            Token::Raw(s) => s.clone(),
        }
    }
}

/// A stream of tokens that serializes to SQL text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self) -> String {
        self.tokens.iter().map(|t| t.serialize()).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
