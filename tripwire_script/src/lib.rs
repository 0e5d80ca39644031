#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! tripwire_script: the Tripwire trigger-scripting language.
//!
//! A small imperative language operators use to script trigger reactions:
//!
//! ```text
//! // greet and start a 30 second cooldown
//! IF player.health > 0
//!     #MESSAGE:"welcome back"
//!     COOLDOWN 30
//! ENDIF
//! ```
//!
//! This crate owns the compile-time half of the pipeline: [`tokenize`] turns
//! source text into tokens, [`parse`] builds the AST, and [`compile`] chains
//! the two. Execution lives in the engine crate; nothing here resolves
//! executor or placeholder names.

mod ast;
mod interval;
mod lexer;
mod parser;
mod token;

pub use ast::{AssignOp, AssignTarget, BinaryOp, Literal, Node, Program, UnaryOp};
pub use interval::{IntervalError, format_interval, parse_interval};
pub use lexer::{LexError, tokenize};
pub use parser::{ParseError, parse};
pub use token::{Token, TokenKind};

use thiserror::Error;

/// A compile failure from either stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Compile script source into a [`Program`].
///
/// # Errors
/// Returns a [`CompileError`] wrapping the lex or parse failure; compilation
/// has no side effects, so callers can retry freely.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let tokens = tokenize(source)?;
    Ok(parse(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_chains_lexer_and_parser() {
        let program = compile("#MESSAGE:\"hi\"").unwrap();
        match program.body {
            Node::Block(stmts) => assert_eq!(stmts.len(), 1),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn lex_errors_surface_through_compile() {
        assert!(matches!(compile("@").unwrap_err(), CompileError::Lex(_)));
    }

    #[test]
    fn parse_errors_surface_through_compile() {
        assert!(matches!(compile("IF x").unwrap_err(), CompileError::Parse(_)));
    }
}
