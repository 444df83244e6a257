//! Expression parsing implementation
//!
//! One method per C precedence level, lowest first:
//!
//! ```text
//! assignment → conditional → || → && → | → ^ → & → equality → relational
//!            → shift → additive → multiplicative → cast → unary → postfix → primary
//! ```
//!
//! Arduino-flavoured forms handled here: function-style casts (`int(x)`,
//! `byte(v)`), method calls on objects (`Serial.println(x)`), and `String(...)`
//! which stays an ordinary call to the `String` builtin.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

const BINARY_LEVELS: usize = 8;

/// Operator for `token` at binary precedence `level`, if it belongs there.
fn binary_operator(level: usize, token: &TokenKind) -> Option<BinOp> {
    let op = match (level, token) {
        (0, TokenKind::Pipe) => BinOp::BitOr,
        (1, TokenKind::Caret) => BinOp::BitXor,
        (2, TokenKind::Amp) => BinOp::BitAnd,
        (3, TokenKind::EqEq) => BinOp::Eq,
        (3, TokenKind::NotEq) => BinOp::Ne,
        (4, TokenKind::Lt) => BinOp::Lt,
        (4, TokenKind::Le) => BinOp::Le,
        (4, TokenKind::Gt) => BinOp::Gt,
        (4, TokenKind::Ge) => BinOp::Ge,
        (5, TokenKind::LtLt) => BinOp::Shl,
        (5, TokenKind::GtGt) => BinOp::Shr,
        (6, TokenKind::Plus) => BinOp::Add,
        (6, TokenKind::Minus) => BinOp::Sub,
        (7, TokenKind::Star) => BinOp::Mul,
        (7, TokenKind::Slash) => BinOp::Div,
        (7, TokenKind::Percent) => BinOp::Mod,
        _ => return None,
    };
    Some(op)
}

impl Parser {
    /// Parse expression (top-level entry point)
    pub(crate) fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        self.parse_assignment_expression()
    }

    /// Parse assignment or conditional (right-associative)
    pub(crate) fn parse_assignment_expression(&mut self) -> Result<NodeId, ParseError> {
        let target = self.parse_conditional()?;
        let location = self.current_location();

        if self.match_token(&TokenKind::Eq) {
            let value = self.parse_assignment_expression()?;
            return Ok(self.node(NodeKind::Assign { target, value }, location));
        }

        let op = match self.peek_kind() {
            TokenKind::PlusEq => BinOp::Add,
            TokenKind::MinusEq => BinOp::Sub,
            TokenKind::StarEq => BinOp::Mul,
            TokenKind::SlashEq => BinOp::Div,
            TokenKind::PercentEq => BinOp::Mod,
            TokenKind::AmpEq => BinOp::BitAnd,
            TokenKind::PipeEq => BinOp::BitOr,
            TokenKind::CaretEq => BinOp::BitXor,
            TokenKind::LtLtEq => BinOp::Shl,
            TokenKind::GtGtEq => BinOp::Shr,
            _ => return Ok(target),
        };
        self.advance();
        let value = self.parse_assignment_expression()?;
        Ok(self.node(NodeKind::CompoundAssign { op, target, value }, location))
    }

    /// Parse ternary: condition ? then_expr : else_expr
    pub(crate) fn parse_conditional(&mut self) -> Result<NodeId, ParseError> {
        let condition = self.parse_logical(LogicalOp::Or)?;

        if self.match_token(&TokenKind::Question) {
            let location = self.previous_location();
            let then_expr = self.parse_expression()?;
            self.expect_token(&TokenKind::Colon, "Expected ':' in ternary expression")?;
            let else_expr = self.parse_conditional()?;
            return Ok(self.node(
                NodeKind::Ternary {
                    condition,
                    then_expr,
                    else_expr,
                },
                location,
            ));
        }

        Ok(condition)
    }

    /// Parse `||` (or `&&` when called with [`LogicalOp::And`])
    fn parse_logical(&mut self, op: LogicalOp) -> Result<NodeId, ParseError> {
        let (token, operand): (TokenKind, fn(&mut Self) -> Result<NodeId, ParseError>) = match op {
            LogicalOp::Or => (TokenKind::OrOr, |p| p.parse_logical(LogicalOp::And)),
            LogicalOp::And => (TokenKind::AndAnd, |p| p.parse_binary_level(0)),
        };

        let mut left = operand(self)?;
        while self.match_token(&token) {
            let location = self.previous_location();
            let right = operand(self)?;
            left = self.node(NodeKind::Logical { op, left, right }, location);
        }
        Ok(left)
    }

    /// Left-associative binary levels from `|` (level 0) down to `*`.
    fn parse_binary_level(&mut self, level: usize) -> Result<NodeId, ParseError> {
        if level == BINARY_LEVELS {
            return self.parse_cast();
        }

        let mut left = self.parse_binary_level(level + 1)?;
        while let Some(op) = binary_operator(level, self.peek_kind()) {
            self.advance();
            let location = self.previous_location();
            let right = self.parse_binary_level(level + 1)?;
            left = self.node(NodeKind::Binary { op, left, right }, location);
        }
        Ok(left)
    }

    /// Parse `(type) expr`
    fn parse_cast(&mut self) -> Result<NodeId, ParseError> {
        if self.check(&TokenKind::LParen) && self.is_type_start_at(1) {
            let location = self.current_location();
            self.advance();
            let target_type = self.parse_type()?;
            self.expect_rparen("after cast type")?;
            let expr = self.parse_cast()?;
            return Ok(self.node(NodeKind::Cast { target_type, expr }, location));
        }

        self.parse_unary()
    }

    fn is_type_start_at(&self, n: usize) -> bool {
        match self.peek_ahead(n) {
            Some(
                TokenKind::Int
                | TokenKind::Long
                | TokenKind::Short
                | TokenKind::Char
                | TokenKind::Bool
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Void
                | TokenKind::Unsigned
                | TokenKind::Signed
                | TokenKind::Struct
                | TokenKind::Const,
            ) => true,
            Some(TokenKind::Ident(name)) => self.is_type_name(name),
            _ => false,
        }
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();

        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::Amp => Some(UnOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_cast()?;
            return Ok(self.node(NodeKind::Unary { op, operand }, location));
        }

        let inc_dec = match self.peek_kind() {
            TokenKind::PlusPlus => Some(IncDecOp::PreInc),
            TokenKind::MinusMinus => Some(IncDecOp::PreDec),
            _ => None,
        };
        if let Some(op) = inc_dec {
            self.advance();
            let target = self.parse_unary()?;
            return Ok(self.node(NodeKind::IncDec { op, target }, location));
        }

        if self.match_token(&TokenKind::Sizeof) {
            if self.check(&TokenKind::LParen) && self.is_type_start_at(1) {
                self.advance();
                let target_type = self.parse_type()?;
                let target_type = self.parse_sizeof_dims(target_type)?;
                self.expect_rparen("after sizeof type")?;
                return Ok(self.node(NodeKind::SizeofType(target_type), location));
            }
            let expr = self.parse_unary()?;
            return Ok(self.node(NodeKind::SizeofExpr(expr), location));
        }

        self.parse_postfix()
    }

    fn parse_sizeof_dims(&mut self, mut ty: Type) -> Result<Type, ParseError> {
        while self.match_token(&TokenKind::LBracket) {
            match self.peek_kind().clone() {
                TokenKind::IntLiteral { value, .. } if value >= 0 => {
                    self.advance();
                    ty = ty.with_array(Some(value as usize));
                }
                _ => return self.error("Expected constant array size in sizeof"),
            }
            self.expect_token(&TokenKind::RBracket, "Expected ']' in sizeof type")?;
        }
        Ok(ty)
    }

    /// Parse postfix (++ -- [] . -> ())
    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let location = self.current_location();

            if self.match_token(&TokenKind::PlusPlus) {
                expr = self.node(
                    NodeKind::IncDec {
                        op: IncDecOp::PostInc,
                        target: expr,
                    },
                    location,
                );
            } else if self.match_token(&TokenKind::MinusMinus) {
                expr = self.node(
                    NodeKind::IncDec {
                        op: IncDecOp::PostDec,
                        target: expr,
                    },
                    location,
                );
            } else if self.match_token(&TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect_token(&TokenKind::RBracket, "Expected ']' after array index")?;
                expr = self.node(NodeKind::Index { array: expr, index }, location);
            } else if self.check(&TokenKind::Dot) || self.check(&TokenKind::Arrow) {
                let through_pointer = self.check(&TokenKind::Arrow);
                self.advance();
                let field = self.expect_identifier()?;

                if !through_pointer && self.match_token(&TokenKind::LParen) {
                    let args = self.parse_argument_list()?;
                    self.expect_rparen("after method arguments")?;
                    expr = self.node(
                        NodeKind::MethodCall {
                            receiver: expr,
                            method: field,
                            args,
                        },
                        location,
                    );
                } else {
                    expr = self.node(
                        NodeKind::Member {
                            object: expr,
                            field,
                            through_pointer,
                        },
                        location,
                    );
                }
            } else if self.check(&TokenKind::LParen) {
                let NodeKind::Identifier(name) = self.program.kind(expr).clone() else {
                    return self.error("Function call must be on identifier");
                };
                self.advance();
                let args = self.parse_argument_list()?;
                self.expect_rparen("after function arguments")?;
                let call_location = self.program.location(expr);

                expr = match BaseType::from_alias(&name) {
                    Some(base) if base != BaseType::String && args.len() == 1 => self.node(
                        NodeKind::Cast {
                            target_type: Type::new(base),
                            expr: args[0],
                        },
                        call_location,
                    ),
                    _ => self.node(NodeKind::Call { callee: name, args }, call_location),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse argument list: (expr, expr, ...)
    pub(crate) fn parse_argument_list(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut args = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_assignment_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    /// Parse primary (literals, identifiers, parenthesized expressions, functional casts)
    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();

        let kind = match self.peek_kind().clone() {
            TokenKind::IntLiteral { value, unsigned } => NodeKind::IntLiteral { value, unsigned },
            TokenKind::FloatLiteral(v) => NodeKind::FloatLiteral(v),
            TokenKind::CharLiteral(c) => NodeKind::CharLiteral(c),
            TokenKind::StringLiteral(mut s) => {
                // Adjacent literals concatenate
                while let Some(TokenKind::StringLiteral(next)) = self.peek_ahead(1) {
                    s.push_str(next);
                    self.advance();
                }
                NodeKind::StringLiteral(s)
            }
            TokenKind::True => NodeKind::BoolLiteral(true),
            TokenKind::False => NodeKind::BoolLiteral(false),
            TokenKind::Null => NodeKind::NullLiteral,
            TokenKind::Ident(name) => NodeKind::Identifier(name),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                return Ok(expr);
            }
            TokenKind::Int
            | TokenKind::Long
            | TokenKind::Short
            | TokenKind::Char
            | TokenKind::Bool
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Unsigned => {
                let target_type = self.parse_type()?;
                self.expect_lparen("in functional cast")?;
                let expr = self.parse_expression()?;
                self.expect_rparen("after functional cast")?;
                return Ok(self.node(NodeKind::Cast { target_type, expr }, location));
            }
            _ => return self.error(format!("Unexpected token: {}", self.peek())),
        };

        self.advance();
        Ok(self.node(kind, location))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    /// Parse `expr` as the initializer of a global and return the program and its id.
    fn expr(source: &str) -> (Program, NodeId) {
        let program = Parser::new(&format!("int probe = {};", source))
            .unwrap()
            .parse_program()
            .unwrap();
        let NodeKind::VarDecl { init: Some(init), .. } = program.kind(program.items[0]) else {
            panic!("expected initializer");
        };
        let id = *init;
        (program, id)
    }

    #[test]
    fn test_logical_and_binds_tighter() {
        let (program, id) = expr("a || b && c");
        let NodeKind::Logical { op, right, .. } = program.kind(id) else {
            panic!("expected logical");
        };
        assert_eq!(*op, LogicalOp::Or);
        assert!(matches!(program.kind(*right), NodeKind::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn test_shift_below_additive() {
        let (program, id) = expr("1 << 2 + 3");
        let NodeKind::Binary { op, right, .. } = program.kind(id) else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinOp::Shl);
        assert!(matches!(program.kind(*right), NodeKind::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_method_call_and_member() {
        let (program, id) = expr("Serial.available() + p->x");
        let NodeKind::Binary { left, right, .. } = program.kind(id) else {
            panic!("expected binary");
        };
        assert!(matches!(program.kind(*left), NodeKind::MethodCall { method, .. } if method == "available"));
        assert!(matches!(program.kind(*right), NodeKind::Member { through_pointer: true, .. }));
    }

    #[test]
    fn test_casts() {
        let (program, id) = expr("(float)x / int(y) + byte(300)");
        let NodeKind::Binary { left: sum_left, right: byte_cast, .. } = program.kind(id) else {
            panic!("expected binary");
        };
        assert!(matches!(program.kind(*byte_cast), NodeKind::Cast { target_type, .. } if target_type.base == BaseType::UChar));
        let NodeKind::Binary { left, right, .. } = program.kind(*sum_left) else {
            panic!("expected division");
        };
        assert!(matches!(program.kind(*left), NodeKind::Cast { target_type, .. } if target_type.base == BaseType::Float));
        assert!(matches!(program.kind(*right), NodeKind::Cast { target_type, .. } if target_type.base == BaseType::Int));
    }

    #[test]
    fn test_compound_assignment_and_ternary() {
        let (program, id) = expr("x <<= y ? 1 : 2");
        let NodeKind::CompoundAssign { op, value, .. } = program.kind(id) else {
            panic!("expected compound assignment");
        };
        assert_eq!(*op, BinOp::Shl);
        assert!(matches!(program.kind(*value), NodeKind::Ternary { .. }));
    }

    #[test]
    fn test_string_constructor_stays_call() {
        let (program, id) = expr("String(42)");
        assert!(matches!(program.kind(id), NodeKind::Call { callee, .. } if callee == "String"));
    }
}
