//! Token types produced by [`tokenize`](crate::tokenize).

use std::fmt;

/// The syntactic category of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Value-carrying tokens (payload lives in `Token::lexeme`).
    Ident,
    /// `$name` -- a reference into the shared global variable store.
    GlobalIdent,
    /// `#NAME` -- an executor call sigil; lexeme holds the bare name.
    ExecName,
    Int,
    Double,
    Str,

    // Operators.
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,

    // Punctuation.
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    /// Statement separator; one token per run of line breaks.
    Newline,

    // Keywords.
    If,
    ElseIf,
    Else,
    EndIf,
    While,
    EndWhile,
    For,
    EndFor,
    Break,
    Continue,
    Sync,
    Import,
    Function,
    Call,
    Cooldown,
    True,
    False,
    Null,

    Eof,
}

impl TokenKind {
    /// Map a bare identifier to its keyword kind, if it is one.
    ///
    /// Keywords are case-sensitive and upper-case by convention, except the
    /// literal words `true` / `false` / `null`.
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "IF" => Self::If,
            "ELSEIF" => Self::ElseIf,
            "ELSE" => Self::Else,
            "ENDIF" => Self::EndIf,
            "WHILE" => Self::While,
            "ENDWHILE" => Self::EndWhile,
            "FOR" => Self::For,
            "ENDFOR" => Self::EndFor,
            "BREAK" => Self::Break,
            "CONTINUE" => Self::Continue,
            "SYNC" => Self::Sync,
            "IMPORT" => Self::Import,
            "FUNCTION" => Self::Function,
            "CALL" => Self::Call,
            "COOLDOWN" => Self::Cooldown,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ident => "identifier",
            Self::GlobalIdent => "global identifier",
            Self::ExecName => "executor name",
            Self::Int => "integer literal",
            Self::Double => "decimal literal",
            Self::Str => "string literal",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::Less => "'<'",
            Self::Greater => "'>'",
            Self::LessEq => "'<='",
            Self::GreaterEq => "'>='",
            Self::EqEq => "'=='",
            Self::NotEq => "'!='",
            Self::AndAnd => "'&&'",
            Self::OrOr => "'||'",
            Self::Bang => "'!'",
            Self::Assign => "'='",
            Self::PlusAssign => "'+='",
            Self::MinusAssign => "'-='",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Comma => "','",
            Self::Colon => "':'",
            Self::Semicolon => "';'",
            Self::Dot => "'.'",
            Self::Newline => "end of line",
            Self::If => "IF",
            Self::ElseIf => "ELSEIF",
            Self::Else => "ELSE",
            Self::EndIf => "ENDIF",
            Self::While => "WHILE",
            Self::EndWhile => "ENDWHILE",
            Self::For => "FOR",
            Self::EndFor => "ENDFOR",
            Self::Break => "BREAK",
            Self::Continue => "CONTINUE",
            Self::Sync => "SYNC",
            Self::Import => "IMPORT",
            Self::Function => "FUNCTION",
            Self::Call => "CALL",
            Self::Cooldown => "COOLDOWN",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Eof => "end of script",
        };
        write!(f, "{text}")
    }
}

/// A single lexed token with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text for value-carrying tokens; empty for fixed tokens.
    pub lexeme: String,
    /// 1-based source line, carried through to runtime diagnostics.
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lexeme.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} '{}'", self.kind, self.lexeme)
        }
    }
}
