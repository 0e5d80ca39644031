//! Lexer for Tripwire script source.
//!
//! Turns raw script text into an ordered [`Token`] sequence. Statements are
//! separated by newlines or semicolons, so line breaks are significant and
//! produce [`TokenKind::Newline`] tokens (collapsed, one per run). Comments
//! (`// ...`) and other whitespace produce nothing.

use crate::token::{Token, TokenKind};
use thiserror::Error;

/// Errors raised while scanning script source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character '{character}' at line {line}")]
    UnexpectedChar { character: char, line: usize },
    #[error("unterminated string literal starting at line {line}")]
    UnterminatedString { line: usize },
    #[error("malformed number '{text}' at line {line}")]
    BadNumber { text: String, line: usize },
    #[error("'{sigil}' must be followed by a name at line {line}")]
    DanglingSigil { sigil: char, line: usize },
}

/// Scan `source` into a token sequence terminated by an `Eof` token.
///
/// # Errors
/// Returns a [`LexError`] identifying the offending character and 1-based line.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.chars.next() {
            match ch {
                ' ' | '\t' | '\r' => {},
                '\n' => {
                    self.push_newline();
                    self.line += 1;
                },
                '/' => {
                    if self.eat('/') {
                        self.skip_comment();
                    } else {
                        self.push(TokenKind::Slash);
                    }
                },
                '+' => {
                    if self.eat('=') {
                        self.push(TokenKind::PlusAssign);
                    } else {
                        self.push(TokenKind::Plus);
                    }
                },
                '-' => {
                    if self.eat('=') {
                        self.push(TokenKind::MinusAssign);
                    } else {
                        self.push(TokenKind::Minus);
                    }
                },
                '*' => self.push(TokenKind::Star),
                '%' => self.push(TokenKind::Percent),
                '(' => self.push(TokenKind::LParen),
                ')' => self.push(TokenKind::RParen),
                '{' => self.push(TokenKind::LBrace),
                '}' => self.push(TokenKind::RBrace),
                ',' => self.push(TokenKind::Comma),
                ':' => self.push(TokenKind::Colon),
                ';' => self.push(TokenKind::Semicolon),
                '.' => self.push(TokenKind::Dot),
                '<' => {
                    if self.eat('=') {
                        self.push(TokenKind::LessEq);
                    } else {
                        self.push(TokenKind::Less);
                    }
                },
                '>' => {
                    if self.eat('=') {
                        self.push(TokenKind::GreaterEq);
                    } else {
                        self.push(TokenKind::Greater);
                    }
                },
                '=' => {
                    if self.eat('=') {
                        self.push(TokenKind::EqEq);
                    } else {
                        self.push(TokenKind::Assign);
                    }
                },
                '!' => {
                    if self.eat('=') {
                        self.push(TokenKind::NotEq);
                    } else {
                        self.push(TokenKind::Bang);
                    }
                },
                '&' => {
                    if self.eat('&') {
                        self.push(TokenKind::AndAnd);
                    } else {
                        return Err(LexError::UnexpectedChar {
                            character: '&',
                            line: self.line,
                        });
                    }
                },
                '|' => {
                    if self.eat('|') {
                        self.push(TokenKind::OrOr);
                    } else {
                        return Err(LexError::UnexpectedChar {
                            character: '|',
                            line: self.line,
                        });
                    }
                },
                '"' => self.string()?,
                '#' => self.sigil_name('#', TokenKind::ExecName)?,
                '$' => self.sigil_name('$', TokenKind::GlobalIdent)?,
                c if c.is_ascii_digit() => self.number(c)?,
                c if is_ident_start(c) => self.ident(c),
                other => {
                    return Err(LexError::UnexpectedChar {
                        character: other,
                        line: self.line,
                    });
                },
            }
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", self.line));
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, "", self.line));
    }

    /// Collapse consecutive line breaks into a single separator token.
    fn push_newline(&mut self) {
        if !matches!(
            self.tokens.last().map(|t| t.kind),
            Some(TokenKind::Newline) | None
        ) {
            self.tokens.push(Token::new(TokenKind::Newline, "", self.line));
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn string(&mut self) -> Result<(), LexError> {
        let start_line = self.line;
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some('"') => break,
                Some('\\') => match self.chars.next() {
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(other) => {
                        return Err(LexError::UnexpectedChar {
                            character: other,
                            line: self.line,
                        });
                    },
                    None => return Err(LexError::UnterminatedString { line: start_line }),
                },
                Some('\n') => {
                    // Strings may span lines; keep the diagnostic line accurate.
                    text.push('\n');
                    self.line += 1;
                },
                Some(other) => text.push(other),
                None => return Err(LexError::UnterminatedString { line: start_line }),
            }
        }
        self.tokens.push(Token::new(TokenKind::Str, text, start_line));
        Ok(())
    }

    fn number(&mut self, first: char) -> Result<(), LexError> {
        let mut text = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        // A '.' makes this a decimal literal only when digits follow;
        // otherwise leave the dot for property access.
        let mut is_double = false;
        if self.chars.peek() == Some(&'.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek().is_some_and(char::is_ascii_digit) {
                is_double = true;
                text.push('.');
                self.chars.next();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
            }
        }
        if self.chars.peek().is_some_and(|c| is_ident_start(*c)) {
            // e.g. "12abc" -- reject rather than silently splitting.
            while let Some(&c) = self.chars.peek() {
                if is_ident_continue(c) {
                    text.push(c);
                    self.chars.next();
                } else {
                    break;
                }
            }
            return Err(LexError::BadNumber {
                text,
                line: self.line,
            });
        }
        let kind = if is_double { TokenKind::Double } else { TokenKind::Int };
        self.tokens.push(Token::new(kind, text, self.line));
        Ok(())
    }

    fn ident(&mut self, first: char) {
        let mut text = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match TokenKind::keyword(&text) {
            Some(kind) => self.push(kind),
            None => self.tokens.push(Token::new(TokenKind::Ident, text, self.line)),
        }
    }

    /// Lex `#NAME` / `$name` style sigil-prefixed names.
    fn sigil_name(&mut self, sigil: char, kind: TokenKind) -> Result<(), LexError> {
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_ident_continue(c) {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(LexError::DanglingSigil {
                sigil,
                line: self.line,
            });
        }
        self.tokens.push(Token::new(kind, name, self.line));
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_executor_call_with_colon_args() {
        let tokens = tokenize("#MESSAGE:\"hi\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::ExecName);
        assert_eq!(tokens[0].lexeme, "MESSAGE");
        assert_eq!(tokens[1].kind, TokenKind::Colon);
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].lexeme, "hi");
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn lexes_operators_and_compound_assignment() {
        assert_eq!(
            kinds("a += 1; b -= 2 == 3 != 4 <= 5 >= 6 && x || !y"),
            vec![
                TokenKind::Ident,
                TokenKind::PlusAssign,
                TokenKind::Int,
                TokenKind::Semicolon,
                TokenKind::Ident,
                TokenKind::MinusAssign,
                TokenKind::Int,
                TokenKind::EqEq,
                TokenKind::Int,
                TokenKind::NotEq,
                TokenKind::Int,
                TokenKind::LessEq,
                TokenKind::Int,
                TokenKind::GreaterEq,
                TokenKind::Int,
                TokenKind::AndAnd,
                TokenKind::Ident,
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_produce_no_tokens() {
        let tokens = tokenize("// just a comment\n   \t\n").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn newlines_collapse_and_carry_lines() {
        let tokens = tokenize("a\n\n\nb").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Ident, TokenKind::Newline, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn dotted_access_stays_separate_from_decimals() {
        assert_eq!(
            kinds("player.name 3.25"),
            vec![
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Double,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let tokens = tokenize(r#""say \"hi\"\n""#).unwrap();
        assert_eq!(tokens[0].lexeme, "say \"hi\"\n");
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(kinds("IF")[0], TokenKind::If);
        assert_eq!(kinds("if")[0], TokenKind::Ident);
        assert_eq!(kinds("true")[0], TokenKind::True);
    }

    #[test]
    fn unexpected_character_reports_line() {
        let err = tokenize("a\n@").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedChar {
                character: '@',
                line: 2
            }
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(
            tokenize("\"oops").unwrap_err(),
            LexError::UnterminatedString { line: 1 }
        ));
    }

    #[test]
    fn global_sigil_requires_a_name() {
        assert!(matches!(
            tokenize("$ = 1").unwrap_err(),
            LexError::DanglingSigil { sigil: '$', .. }
        ));
    }
}
