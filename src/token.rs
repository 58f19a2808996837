/// Source location of a token or syntax node. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Number(f64),
    /// Raw string contents between the quotes, escapes not yet applied.
    String(&'a str),
    /// Packed ARGB, alpha in the most significant byte.
    Color(u32),
    Bool(bool),
    Identifier(&'a str),

    // Keywords
    If,
    Else,
    And,
    Or,
    Not,

    // Operators
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Percent,   // %
    Assign,    // =
    Reassign,  // :=
    Equal,     // ==
    NotEqual,  // !=
    Greater,   // >
    GreaterEq, // >=
    Less,      // <
    LessEq,    // <=
    Question,  // ?

    // Delimiters
    Colon,    // :
    Comma,    // ,
    Dot,      // .
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]

    // Structural
    Newline,
    /// Full `//@version=N` comment text.
    VersionComment(&'a str),
    EOF,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, text: &'a str, span: Span) -> Self {
        Self { kind, text, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}
