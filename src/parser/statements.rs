//! Statement parsing implementation
//!
//! - Declarations: `int x = 42;`, `static int count;`, `Servo arm;`
//! - Control flow: `if`, `while`, `for`, `do-while`, `switch`
//! - Jump statements: `return`, `break`, `continue`
//! - Compound statements: `{ ... }`
//! - Expression statements: function calls, assignments
//!
//! # Grammar
//!
//! ```text
//! statement ::= declaration | if_stmt | while_stmt | for_stmt
//!             | do_while_stmt | switch_stmt | return_stmt
//!             | break_stmt | continue_stmt | block | expr_stmt | ";"
//! ```

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse `{ statements }` into a Block node.
    pub(crate) fn parse_block(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        self.expect_lbrace("to open block")?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        self.expect_rbrace("to close block")?;
        Ok(self.node(NodeKind::Block { statements }, location))
    }

    pub(crate) fn parse_statement(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();

        match self.peek_kind() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Return => {
                self.advance();
                let expr = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_semicolon("after return")?;
                Ok(self.node(NodeKind::Return { expr }, location))
            }
            TokenKind::Break => {
                self.advance();
                self.expect_semicolon("after 'break'")?;
                Ok(self.node(NodeKind::Break, location))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semicolon("after 'continue'")?;
                Ok(self.node(NodeKind::Continue, location))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(self.node(NodeKind::Empty, location))
            }
            _ if self.is_declaration_start() => self.parse_local_declaration(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        let expr = self.parse_expression()?;
        self.expect_semicolon("after expression")?;
        Ok(self.node(NodeKind::ExprStmt { expr }, location))
    }

    fn parse_if_statement(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        self.advance();
        self.expect_lparen("after 'if'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after if condition")?;

        let then_branch = self.parse_statement()?;
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };

        Ok(self.node(
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            },
            location,
        ))
    }

    fn parse_while_statement(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        self.advance();
        self.expect_lparen("after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after while condition")?;
        let body = self.parse_statement()?;

        Ok(self.node(NodeKind::While { condition, body }, location))
    }

    fn parse_do_while_statement(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        self.advance();
        let body = self.parse_statement()?;

        self.expect_token(&TokenKind::While, "Expected 'while' after do body")?;
        self.expect_lparen("after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after do-while condition")?;
        self.expect_semicolon("after do-while")?;

        Ok(self.node(NodeKind::DoWhile { body, condition }, location))
    }

    fn parse_for_statement(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        self.advance();
        self.expect_lparen("after 'for'")?;

        // The init clause is a full statement and consumes its own ';'
        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.is_declaration_start() {
            Some(self.parse_local_declaration()?)
        } else {
            Some(self.parse_expression_statement()?)
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon("after for condition")?;

        let increment = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_rparen("after for clauses")?;

        let body = self.parse_statement()?;

        Ok(self.node(
            NodeKind::For {
                init,
                condition,
                increment,
                body,
            },
            location,
        ))
    }

    fn parse_switch_statement(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        self.advance();
        self.expect_lparen("after 'switch'")?;
        let expr = self.parse_expression()?;
        self.expect_rparen("after switch expression")?;
        self.expect_lbrace("to open switch body")?;

        let mut cases: Vec<SwitchCase> = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Case) {
                let label = self.parse_conditional()?;
                self.expect_token(&TokenKind::Colon, "Expected ':' after case label")?;
                cases.push(SwitchCase {
                    label: Some(label),
                    body: Vec::new(),
                });
            } else if self.match_token(&TokenKind::Default) {
                self.expect_token(&TokenKind::Colon, "Expected ':' after 'default'")?;
                cases.push(SwitchCase {
                    label: None,
                    body: Vec::new(),
                });
            } else {
                let statement = self.parse_statement()?;
                match cases.last_mut() {
                    Some(case) => case.body.push(statement),
                    None => return self.error("Statement before first case label in switch"),
                }
            }
        }

        self.expect_rbrace("to close switch body")?;
        Ok(self.node(NodeKind::Switch { expr, cases }, location))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn body_of(source: &str) -> (Program, Vec<NodeId>) {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let NodeKind::FunctionDef { body, .. } = program.kind(program.items[0]) else {
            panic!("expected function");
        };
        let NodeKind::Block { statements } = program.kind(*body).clone() else {
            panic!("expected block");
        };
        (program, statements)
    }

    #[test]
    fn test_for_with_declaration() {
        let (program, stmts) = body_of("void f() { for (int i = 0; i < 3; i++) { } }");
        let NodeKind::For { init, condition, increment, .. } = program.kind(stmts[0]) else {
            panic!("expected for");
        };
        assert!(matches!(program.kind(init.unwrap()), NodeKind::VarDecl { name, .. } if name == "i"));
        assert!(condition.is_some());
        assert!(matches!(program.kind(increment.unwrap()), NodeKind::IncDec { op: IncDecOp::PostInc, .. }));
    }

    #[test]
    fn test_switch_cases_and_fallthrough() {
        let (program, stmts) = body_of(
            "void f(int x) { switch (x) { case 1: case 2: x = 0; break; default: x = 9; } }",
        );
        let NodeKind::Switch { cases, .. } = program.kind(stmts[0]) else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 3);
        assert!(cases[0].body.is_empty());
        assert_eq!(cases[1].body.len(), 2);
        assert!(cases[2].label.is_none());
    }

    #[test]
    fn test_do_while_and_else_chain() {
        let (program, stmts) =
            body_of("void f() { int n = 0; do { n++; } while (n < 3); if (n) n = 1; else if (!n) n = 2; else n = 3; }");
        assert!(matches!(program.kind(stmts[1]), NodeKind::DoWhile { .. }));
        let NodeKind::If { else_branch: Some(else_branch), .. } = program.kind(stmts[2]) else {
            panic!("expected if/else");
        };
        assert!(matches!(program.kind(*else_branch), NodeKind::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn test_static_local_and_object() {
        let (program, stmts) = body_of("void f() { static int count = 0; Servo s; String t = \"x\"; }");
        assert!(matches!(program.kind(stmts[0]), NodeKind::VarDecl { is_static: true, .. }));
        assert!(matches!(program.kind(stmts[1]), NodeKind::ObjectDecl { .. }));
        assert!(matches!(
            program.kind(stmts[2]),
            NodeKind::VarDecl { var_type, .. } if var_type.base == BaseType::String
        ));
    }
}
