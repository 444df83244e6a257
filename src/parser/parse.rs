//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including the error type, token helpers, and the program entry point.
//!
//! # Parser Architecture
//!
//! The Parser is a hand-written recursive descent parser:
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: functions, structs, variables and library objects
//! - `statements`: control flow and blocks
//! - `expressions`: expressions with one function per precedence level
//!
//! Methods are split across files using `impl Parser` blocks. Nodes are
//! appended to the [`Program`] arena as they are recognised, so children
//! always receive smaller ids than their parents.

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Lexer, Token, TokenKind};
use rustc_hash::{FxHashMap, FxHashSet};
use std::mem::discriminant;
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parse error at line {}, column {}: {message}", location.line, location.column)]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            location: err.location,
        }
    }
}

/// Recursive descent parser for the sketch language
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    pub(crate) program: Program,
    /// Struct names seen so far, usable without the `struct` keyword
    pub(crate) struct_names: FxHashSet<String>,
    /// `const` integers with literal initializers, usable as array sizes
    pub(crate) const_ints: FxHashMap<String, i64>,
}

impl Parser {
    /// Tokenize `source`. The text is expected to be preprocessed already.
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
            program: Program::new(),
            struct_names: FxHashSet::default(),
            const_ints: FxHashMap::default(),
        })
    }

    /// Parse the entire program (top-level declarations)
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        while !self.is_at_end() {
            if let Some(item) = self.parse_top_level_declaration()? {
                self.program.items.push(item);
            }
        }

        Ok(std::mem::take(&mut self.program))
    }

    // ===== Helper methods =====

    pub(crate) fn node(&mut self, kind: NodeKind, location: SourceLocation) -> NodeId {
        self.program.push(kind, location)
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        discriminant(self.peek_kind()) == discriminant(kind)
    }

    pub(crate) fn check_ahead(&self, n: usize, kind: &TokenKind) -> bool {
        self.peek_ahead(n)
            .is_some_and(|k| discriminant(k) == discriminant(kind))
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.position + n).map(|t| &t.kind)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn previous_location(&self) -> SourceLocation {
        self.previous().location
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location
    }

    pub(crate) fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            location: self.current_location(),
        })
    }

    pub(crate) fn expect_token(&mut self, kind: &TokenKind, message: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            self.error(format!("{}, found {}", message, self.peek()))
        }
    }

    pub(crate) fn expect_lparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::LParen, &format!("Expected '(' {ctx}"))
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::RParen, &format!("Expected ')' {ctx}"))
    }

    pub(crate) fn expect_lbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::LBrace, &format!("Expected '{{' {ctx}"))
    }

    pub(crate) fn expect_rbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::RBrace, &format!("Expected '}}' {ctx}"))
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::Semicolon, &format!("Expected ';' {ctx}"))
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Ident(name) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            self.error(format!("Expected identifier, found {}", self.peek()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source).unwrap().parse_program().unwrap()
    }

    #[test]
    fn test_parse_setup_and_loop() {
        let program = parse("void setup() { pinMode(13, OUTPUT); } void loop() {}");

        assert_eq!(program.items.len(), 2);
        let setup = program.function("setup").unwrap();
        let NodeKind::FunctionDef { body, return_type, .. } = program.kind(setup) else {
            panic!("expected function");
        };
        assert_eq!(return_type.base, BaseType::Void);
        let NodeKind::Block { statements } = program.kind(*body) else {
            panic!("expected block");
        };
        assert_eq!(statements.len(), 1);
        let NodeKind::ExprStmt { expr } = program.kind(statements[0]) else {
            panic!("expected expression statement");
        };
        assert!(matches!(program.kind(*expr), NodeKind::Call { callee, args } if callee == "pinMode" && args.len() == 2));
    }

    #[test]
    fn test_parse_precedence() {
        let program = parse("int x = 1 + 2 * 3;");
        let NodeKind::VarDecl { init: Some(init), .. } = program.kind(program.items[0]) else {
            panic!("expected declaration");
        };
        let NodeKind::Binary { op, right, .. } = program.kind(*init) else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(program.kind(*right), NodeKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_prototypes_are_skipped() {
        let program = parse("void blink(int times);\nvoid blink(int times) { }");
        assert_eq!(program.items.len(), 1);
    }

    #[test]
    fn test_error_location() {
        let err = Parser::new("void setup() {\n  int = 5;\n}")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert_eq!(err.location.line, 2);
    }
}
