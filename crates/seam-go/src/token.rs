//! Token kinds and operator precedence for the Go scanner.

use std::fmt;

// ============================================================================
// Token Kind
// ============================================================================

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Identifiers and literals
    Ident,
    Int,
    Float,
    Str,
    Rune,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Ellipsis,

    // Operators
    Assign,   // =
    Define,   // :=
    Arrow,    // <-
    Star,     // *
    Amp,      // &
    Plus,     // +
    Minus,    // -
    Slash,    // /
    Percent,  // %
    Pipe,     // |
    Caret,    // ^
    Shl,      // <<
    Shr,      // >>
    AndNot,   // &^
    AndAnd,   // &&
    OrOr,     // ||
    Not,      // !
    Eq,       // ==
    NotEq,    // !=
    Lt,       // <
    Gt,       // >
    LtEq,     // <=
    GtEq,     // >=
    OpAssign, // += -= *= /= %= &= |= ^= <<= >>= &^=
    Inc,      // ++
    Dec,      // --
    Tilde,    // ~

    // Keywords
    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    Goto,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,

    Eof,
}

impl TokenKind {
    /// Binary operator precedence, per the Go grammar. Returns 0 for
    /// non-binary tokens.
    pub fn precedence(self) -> u8 {
        match self {
            TokenKind::OrOr => 1,
            TokenKind::AndAnd => 2,
            TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq => 3,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Pipe | TokenKind::Caret => 4,
            TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Shl
            | TokenKind::Shr
            | TokenKind::Amp
            | TokenKind::AndNot => 5,
            _ => 0,
        }
    }

    /// True when a newline after this token triggers automatic semicolon
    /// insertion.
    pub fn terminates_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::Str
                | TokenKind::Rune
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Fallthrough
                | TokenKind::Return
                | TokenKind::Inc
                | TokenKind::Dec
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Map an identifier to its keyword kind, if any.
pub fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "break" => TokenKind::Break,
        "case" => TokenKind::Case,
        "chan" => TokenKind::Chan,
        "const" => TokenKind::Const,
        "continue" => TokenKind::Continue,
        "default" => TokenKind::Default,
        "defer" => TokenKind::Defer,
        "else" => TokenKind::Else,
        "fallthrough" => TokenKind::Fallthrough,
        "for" => TokenKind::For,
        "func" => TokenKind::Func,
        "go" => TokenKind::Go,
        "goto" => TokenKind::Goto,
        "if" => TokenKind::If,
        "import" => TokenKind::Import,
        "interface" => TokenKind::Interface,
        "map" => TokenKind::Map,
        "package" => TokenKind::Package,
        "range" => TokenKind::Range,
        "return" => TokenKind::Return,
        "select" => TokenKind::Select,
        "struct" => TokenKind::Struct,
        "switch" => TokenKind::Switch,
        "type" => TokenKind::Type,
        "var" => TokenKind::Var,
        _ => return None,
    };
    Some(kind)
}

// ============================================================================
// Token
// ============================================================================

/// A scanned token with its source text and 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text for identifiers and literals; empty for punctuation.
    pub text: String,
    /// 1-based line the token starts on.
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup() {
        assert_eq!(keyword("func"), Some(TokenKind::Func));
        assert_eq!(keyword("interface"), Some(TokenKind::Interface));
        assert_eq!(keyword("funk"), None);
    }

    #[test]
    fn precedence_ladder() {
        assert!(TokenKind::Star.precedence() > TokenKind::Plus.precedence());
        assert!(TokenKind::Plus.precedence() > TokenKind::Eq.precedence());
        assert!(TokenKind::Eq.precedence() > TokenKind::AndAnd.precedence());
        assert!(TokenKind::AndAnd.precedence() > TokenKind::OrOr.precedence());
        assert_eq!(TokenKind::Assign.precedence(), 0);
    }

    #[test]
    fn statement_terminators() {
        assert!(TokenKind::Ident.terminates_statement());
        assert!(TokenKind::RParen.terminates_statement());
        assert!(!TokenKind::Comma.terminates_statement());
        assert!(!TokenKind::LBrace.terminates_statement());
    }
}
