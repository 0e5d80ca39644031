//! Recursive-descent parser for Tripwire scripts.
//!
//! Precedence, loosest binding first: assignment (right-associative), `||`,
//! `&&`, equality, relational, additive, multiplicative, unary. Statements
//! are separated by newlines or semicolons and collected into an ordered
//! block. The parser performs no name resolution: executors, placeholders,
//! and variables are late-bound by the host at runtime.

use crate::ast::{AssignOp, AssignTarget, BinaryOp, Literal, Node, Program, UnaryOp};
use crate::token::{Token, TokenKind};
use thiserror::Error;

/// A parse failure: what the parser wanted, what it saw, and where.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found} at line {line}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
}

impl ParseError {
    fn new(expected: impl Into<String>, token: &Token) -> Self {
        Self {
            expected: expected.into(),
            found: token.to_string(),
            line: token.line,
        }
    }
}

/// Parse a token sequence (as produced by [`crate::tokenize`]) into a
/// [`Program`].
///
/// # Errors
/// Returns a [`ParseError`] describing the expected and found tokens.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(expected, self.peek()))
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    /// True when the current token terminates a statement.
    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    fn program(mut self) -> Result<Program, ParseError> {
        self.skip_separators();
        let mut sync_hint = false;
        if self.check(TokenKind::Sync) {
            self.advance();
            sync_hint = true;
            self.end_of_statement()?;
        }
        let body = self.block(&[])?;
        if !self.check(TokenKind::Eof) {
            return Err(ParseError::new("a statement", self.peek()));
        }
        Ok(Program { body, sync_hint })
    }

    /// Parse statements until EOF or one of `terminators`; the terminator is
    /// left unconsumed.
    fn block(&mut self, terminators: &[TokenKind]) -> Result<Node, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.check(TokenKind::Eof) || terminators.contains(&self.peek().kind) {
                break;
            }
            statements.push(self.statement()?);
        }
        Ok(Node::Block(statements))
    }

    fn statement(&mut self) -> Result<Node, ParseError> {
        match self.peek().kind {
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Break => {
                let line = self.advance().line;
                self.end_of_statement()?;
                Ok(Node::Break { line })
            },
            TokenKind::Continue => {
                let line = self.advance().line;
                self.end_of_statement()?;
                Ok(Node::Continue { line })
            },
            TokenKind::ExecName => self.exec_call(),
            TokenKind::Call => {
                let line = self.advance().line;
                let name = self.expression()?;
                self.end_of_statement()?;
                Ok(Node::SubCall {
                    name: Box::new(name),
                    line,
                })
            },
            TokenKind::Cooldown => {
                let line = self.advance().line;
                let seconds = self.expression()?;
                self.end_of_statement()?;
                Ok(Node::Cooldown {
                    seconds: Box::new(seconds),
                    line,
                })
            },
            TokenKind::Import => self.import_statement(),
            TokenKind::Function => Err(ParseError::new(
                "a statement (FUNCTION is reserved and not supported)",
                self.peek(),
            )),
            TokenKind::Sync => Err(ParseError::new(
                "SYNC only as the first statement of a script",
                self.peek(),
            )),
            _ => {
                let expr = self.expression()?;
                self.end_of_statement()?;
                Ok(expr)
            },
        }
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        if self.at_statement_end() {
            while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semicolon) {
                self.advance();
            }
            Ok(())
        } else {
            Err(ParseError::new("end of statement", self.peek()))
        }
    }

    fn if_statement(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::If, "IF")?;
        let mut arms = Vec::new();
        let cond = self.expression()?;
        self.end_of_statement()?;
        let body = self.block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf])?;
        arms.push((cond, body));
        let mut else_body = None;
        loop {
            if self.eat(TokenKind::ElseIf) {
                let cond = self.expression()?;
                self.end_of_statement()?;
                let body = self.block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf])?;
                arms.push((cond, body));
            } else if self.eat(TokenKind::Else) {
                self.end_of_statement()?;
                else_body = Some(Box::new(self.block(&[TokenKind::EndIf])?));
                break;
            } else {
                break;
            }
        }
        self.expect(TokenKind::EndIf, "ENDIF")?;
        Ok(Node::If { arms, else_body })
    }

    fn while_statement(&mut self) -> Result<Node, ParseError> {
        let line = self.expect(TokenKind::While, "WHILE")?.line;
        let cond = self.expression()?;
        self.end_of_statement()?;
        let body = self.block(&[TokenKind::EndWhile])?;
        self.expect(TokenKind::EndWhile, "ENDWHILE")?;
        Ok(Node::While {
            cond: Box::new(cond),
            body: Box::new(body),
            line,
        })
    }

    fn for_statement(&mut self) -> Result<Node, ParseError> {
        let line = self.expect(TokenKind::For, "FOR")?.line;
        let var = self.expect(TokenKind::Ident, "loop variable")?.lexeme;
        self.expect(TokenKind::Assign, "'='")?;
        let start = self.expression()?;
        self.expect(TokenKind::Colon, "':' between range bounds")?;
        let stop = self.expression()?;
        self.end_of_statement()?;
        let body = self.block(&[TokenKind::EndFor])?;
        self.expect(TokenKind::EndFor, "ENDFOR")?;
        Ok(Node::For {
            var,
            start: Box::new(start),
            stop: Box::new(stop),
            body: Box::new(body),
            line,
        })
    }

    fn import_statement(&mut self) -> Result<Node, ParseError> {
        let line = self.expect(TokenKind::Import, "IMPORT")?.line;
        let mut path = self.expect(TokenKind::Ident, "import path")?.lexeme;
        while self.eat(TokenKind::Dot) {
            path.push('.');
            path.push_str(&self.expect(TokenKind::Ident, "import path segment")?.lexeme);
        }
        self.end_of_statement()?;
        Ok(Node::Import { path, line })
    }

    /// Executor call: `#NAME:arg:arg`, `#NAME(arg, arg)`, or the bare
    /// space-separated form `#NAME arg arg`. All three produce the same
    /// `ExecCall` node shape.
    fn exec_call(&mut self) -> Result<Node, ParseError> {
        let token = self.expect(TokenKind::ExecName, "executor name")?;
        let (name, line) = (token.lexeme, token.line);
        let mut args = Vec::new();
        if self.eat(TokenKind::Colon) {
            loop {
                args.push(self.expression()?);
                if !self.eat(TokenKind::Colon) {
                    break;
                }
            }
        } else if self.eat(TokenKind::LParen) {
            if !self.check(TokenKind::RParen) {
                loop {
                    args.push(self.expression()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
        } else {
            while !self.at_statement_end() {
                args.push(self.expression()?);
            }
        }
        self.end_of_statement()?;
        Ok(Node::ExecCall { name, args, line })
    }

    // -- expressions ------------------------------------------------------

    fn expression(&mut self) -> Result<Node, ParseError> {
        self.assignment()
    }

    /// Assignment binds loosest and is right-associative.
    fn assignment(&mut self) -> Result<Node, ParseError> {
        let expr = self.logic_or()?;
        let op = match self.peek().kind {
            TokenKind::Assign => AssignOp::Set,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            _ => return Ok(expr),
        };
        let op_token = self.advance();
        let target = match expr {
            Node::Ident { name, .. } => AssignTarget::Ident(name),
            Node::Global { name, .. } => AssignTarget::Global(name),
            _ => {
                return Err(ParseError {
                    expected: "a variable or $global on the left of assignment".into(),
                    found: op_token.to_string(),
                    line: op_token.line,
                });
            },
        };
        let value = self.assignment()?;
        Ok(Node::Assign {
            target,
            op,
            value: Box::new(value),
            line: op_token.line,
        })
    }

    fn logic_or(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.logic_and()?;
        while self.check(TokenKind::OrOr) {
            let line = self.advance().line;
            let rhs = self.logic_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs, line);
        }
        Ok(lhs)
    }

    fn logic_and(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.equality()?;
        while self.check(TokenKind::AndAnd) {
            let line = self.advance().line;
            let rhs = self.equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs, line);
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.relational()?;
            lhs = binary(op, lhs, rhs, line);
        }
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEq => BinaryOp::LessEq,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs, line);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs, line);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, line);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.primary(),
        };
        let line = self.advance().line;
        let expr = self.unary()?;
        Ok(Node::Unary {
            op,
            expr: Box::new(expr),
            line,
        })
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let value = token.lexeme.parse::<i64>().map_err(|_| ParseError {
                    expected: "an integer literal in range".into(),
                    found: format!("'{}'", token.lexeme),
                    line: token.line,
                })?;
                Ok(Node::Literal(Literal::Int(value)))
            },
            TokenKind::Double => {
                self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| ParseError {
                    expected: "a decimal literal".into(),
                    found: format!("'{}'", token.lexeme),
                    line: token.line,
                })?;
                Ok(Node::Literal(Literal::Double(value)))
            },
            TokenKind::Str => {
                self.advance();
                Ok(Node::Literal(Literal::Str(token.lexeme)))
            },
            TokenKind::True => {
                self.advance();
                Ok(Node::Literal(Literal::Bool(true)))
            },
            TokenKind::False => {
                self.advance();
                Ok(Node::Literal(Literal::Bool(false)))
            },
            TokenKind::Null => {
                self.advance();
                Ok(Node::Literal(Literal::Null))
            },
            TokenKind::GlobalIdent => {
                self.advance();
                Ok(Node::Global {
                    name: token.lexeme,
                    line: token.line,
                })
            },
            TokenKind::Ident => {
                self.advance();
                self.ident_or_placeholder(token.lexeme, token.line)
            },
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            },
            _ => Err(ParseError::new("an expression", &token)),
        }
    }

    /// After an identifier: a dotted path (and optional argument list) makes
    /// it a placeholder access; a bare parenthesized list makes it a
    /// function-style placeholder call; otherwise it stays an identifier.
    fn ident_or_placeholder(&mut self, first: String, line: usize) -> Result<Node, ParseError> {
        let mut path = first;
        let mut dotted = false;
        while self.eat(TokenKind::Dot) {
            dotted = true;
            path.push('.');
            path.push_str(&self.expect(TokenKind::Ident, "property name after '.'")?.lexeme);
        }
        if self.check(TokenKind::LParen) {
            self.advance();
            let mut args = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    args.push(self.expression()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Node::Placeholder { path, args, line });
        }
        if dotted {
            return Ok(Node::Placeholder {
                path,
                args: Vec::new(),
                line,
            });
        }
        Ok(Node::Ident { name: path, line })
    }
}

fn binary(op: BinaryOp, lhs: Node, rhs: Node, line: usize) -> Node {
    Node::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        line,
    }
}
