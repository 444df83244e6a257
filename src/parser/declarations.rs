//! Declaration parsing implementation
//!
//! - Struct definitions: `struct Name { ... };`
//! - Function definitions and prototypes: `type name(params) { ... }`
//! - Variables with any number of declarators: `static int a = 1, b[4];`
//! - Library objects: `Servo arm;`, `Adafruit_NeoPixel strip(16, 6, NEO_GRB);`
//!
//! # Grammar
//!
//! ```text
//! declaration  ::= struct_def | function_def | var_decl | object_decl
//! var_decl     ::= specifiers declarator ("," declarator)* ";"
//! declarator   ::= "*"* identifier ("[" const_expr? "]")* ("=" initializer)?
//! object_decl  ::= class identifier ("(" args ")")? ";"
//! specifiers   ::= ("static" | "const" | "volatile")* base_type "const"?
//! ```

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

/// Storage class and type shared by every declarator in one declaration
#[derive(Debug, Clone)]
pub(crate) struct DeclSpec {
    pub base_type: Type,
    pub is_static: bool,
    pub is_volatile: bool,
}

impl Parser {
    /// Parse a top-level item. Prototypes and stray semicolons yield `None`.
    pub(crate) fn parse_top_level_declaration(&mut self) -> Result<Option<NodeId>, ParseError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(None);
        }

        if self.check(&TokenKind::Struct)
            && self.check_ahead(1, &TokenKind::Ident(String::new()))
            && self.check_ahead(2, &TokenKind::LBrace)
        {
            return self.parse_struct_definition().map(Some);
        }

        if self.is_object_declaration() {
            return self.parse_object_declaration().map(Some);
        }

        let location = self.current_location();
        let spec = self.parse_decl_specifiers()?;
        let declarator_type = self.parse_pointer_suffix(spec.base_type.clone());
        let name_location = self.current_location();
        let name = self.expect_identifier()?;

        if self.check(&TokenKind::LParen) {
            return self.parse_function_definition(name, declarator_type, name_location);
        }

        self.parse_var_declarators(spec, declarator_type, name, location).map(Some)
    }

    /// Parse struct definition: struct Name { fields };
    pub(crate) fn parse_struct_definition(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        self.advance();
        let name = self.expect_identifier()?;
        self.struct_names.insert(name.clone());

        self.expect_lbrace("after struct name")?;

        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let spec = self.parse_decl_specifiers()?;
            loop {
                let field_type = self.parse_pointer_suffix(spec.base_type.clone());
                let field_name = self.expect_identifier()?;
                let field_type = self.parse_array_suffix(field_type)?;
                fields.push(Field {
                    name: field_name,
                    field_type,
                });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_semicolon("after struct field")?;
        }

        self.expect_rbrace("after struct fields")?;
        self.expect_semicolon("after struct definition")?;

        Ok(self.node(NodeKind::StructDef { name, fields }, location))
    }

    /// Parse the rest of a function after its name. Returns `None` for a prototype.
    fn parse_function_definition(
        &mut self,
        name: String,
        return_type: Type,
        location: SourceLocation,
    ) -> Result<Option<NodeId>, ParseError> {
        self.expect_lparen("after function name")?;
        let params = self.parse_parameter_list()?;
        self.expect_rparen("after parameters")?;

        if self.match_token(&TokenKind::Semicolon) {
            return Ok(None);
        }

        let body = self.parse_block()?;
        Ok(Some(self.node(
            NodeKind::FunctionDef {
                name,
                params,
                return_type,
                body,
            },
            location,
        )))
    }

    /// Parse parameter list: (type name, type name, ...)
    fn parse_parameter_list(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }

        if self.check(&TokenKind::Void) && self.check_ahead(1, &TokenKind::RParen) {
            self.advance();
            return Ok(params);
        }

        loop {
            let spec = self.parse_decl_specifiers()?;
            let mut param_type = self.parse_pointer_suffix(spec.base_type);
            if self.check(&TokenKind::Amp) {
                return self.error("Reference parameters are not supported");
            }
            let name = match self.peek_kind() {
                TokenKind::Ident(_) => self.expect_identifier()?,
                _ => String::new(),
            };
            // Array parameters decay to pointers
            if self.parse_array_suffix(param_type.clone())?.is_array() {
                param_type = param_type.with_pointer();
            }
            params.push(Param { name, param_type });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    /// Declarations that can appear inside a function body.
    pub(crate) fn parse_local_declaration(&mut self) -> Result<NodeId, ParseError> {
        if self.is_object_declaration() {
            return self.parse_object_declaration();
        }

        let location = self.current_location();
        let spec = self.parse_decl_specifiers()?;
        let declarator_type = self.parse_pointer_suffix(spec.base_type.clone());
        let name = self.expect_identifier()?;
        self.parse_var_declarators(spec, declarator_type, name, location)
    }

    /// Parse declarators after the first name has been consumed.
    fn parse_var_declarators(
        &mut self,
        spec: DeclSpec,
        first_type: Type,
        first_name: String,
        location: SourceLocation,
    ) -> Result<NodeId, ParseError> {
        let mut decls = Vec::new();
        let mut var_type = first_type;
        let mut name = first_name;
        let mut decl_location = location;

        loop {
            let full_type = self.parse_array_suffix(var_type)?;
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_initializer()?)
            } else {
                None
            };

            if full_type.is_const && full_type.pointer_depth == 0 && !full_type.is_array() {
                if let Some(value) = init.and_then(|id| self.constant_value(id)) {
                    self.const_ints.insert(name.clone(), value);
                }
            }

            decls.push(self.node(
                NodeKind::VarDecl {
                    name,
                    var_type: full_type,
                    init,
                    is_static: spec.is_static,
                    is_volatile: spec.is_volatile,
                },
                decl_location,
            ));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
            var_type = self.parse_pointer_suffix(spec.base_type.clone());
            decl_location = self.current_location();
            name = self.expect_identifier()?;
        }

        self.expect_semicolon("after variable declaration")?;

        if decls.len() == 1 {
            Ok(decls[0])
        } else {
            Ok(self.node(NodeKind::DeclGroup { decls }, location))
        }
    }

    /// `{ a, b, { c } }` or a plain expression.
    pub(crate) fn parse_initializer(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        if !self.match_token(&TokenKind::LBrace) {
            return self.parse_assignment_expression();
        }

        let mut items = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            items.push(self.parse_initializer()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_rbrace("after initializer list")?;

        Ok(self.node(NodeKind::InitList(items), location))
    }

    /// `Class name;`, `Class name(args);` or `Class name = Class(args);`
    fn parse_object_declaration(&mut self) -> Result<NodeId, ParseError> {
        let location = self.current_location();
        let class_name = self.expect_identifier()?;
        let mut decls = Vec::new();

        loop {
            let decl_location = self.current_location();
            let name = self.expect_identifier()?;
            let mut args = Vec::new();

            if self.match_token(&TokenKind::LParen) {
                args = self.parse_argument_list()?;
                self.expect_rparen("after constructor arguments")?;
            } else if self.match_token(&TokenKind::Eq) {
                let ctor = self.expect_identifier()?;
                if ctor != class_name {
                    return self.error(format!("Expected constructor '{}', found '{}'", class_name, ctor));
                }
                self.expect_lparen("after constructor name")?;
                args = self.parse_argument_list()?;
                self.expect_rparen("after constructor arguments")?;
            }

            decls.push(self.node(
                NodeKind::ObjectDecl {
                    name,
                    class_name: class_name.clone(),
                    args,
                },
                decl_location,
            ));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_semicolon("after object declaration")?;

        if decls.len() == 1 {
            Ok(decls[0])
        } else {
            Ok(self.node(NodeKind::DeclGroup { decls }, location))
        }
    }

    /// True when the next tokens start a variable or object declaration.
    pub(crate) fn is_declaration_start(&self) -> bool {
        match self.peek_kind() {
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
            | TokenKind::Const
            | TokenKind::Static
            | TokenKind::Volatile => true,
            TokenKind::Ident(name) => {
                (self.is_type_name(name) && !self.check_ahead(1, &TokenKind::LParen))
                    || self.is_object_declaration()
            }
            _ => false,
        }
    }

    pub(crate) fn is_type_name(&self, name: &str) -> bool {
        BaseType::from_alias(name).is_some() || self.struct_names.contains(name)
    }

    /// `Ident Ident` followed by `;`, `(`, `=` or `,` where the first
    /// identifier is not a known type.
    fn is_object_declaration(&self) -> bool {
        let TokenKind::Ident(class) = self.peek_kind() else {
            return false;
        };
        !self.is_type_name(class)
            && self.check_ahead(1, &TokenKind::Ident(String::new()))
            && [
                TokenKind::Semicolon,
                TokenKind::LParen,
                TokenKind::Eq,
                TokenKind::Comma,
            ]
            .iter()
            .any(|k| self.check_ahead(2, k))
    }

    /// Parse `static`/`const`/`volatile` qualifiers and a base type.
    pub(crate) fn parse_decl_specifiers(&mut self) -> Result<DeclSpec, ParseError> {
        let mut is_static = false;
        let mut is_volatile = false;
        let mut is_const = false;

        loop {
            if self.match_token(&TokenKind::Static) {
                is_static = true;
            } else if self.match_token(&TokenKind::Volatile) {
                is_volatile = true;
            } else if self.match_token(&TokenKind::Const) {
                is_const = true;
            } else {
                break;
            }
        }

        let mut base_type = Type::new(self.parse_base_type()?);
        if self.match_token(&TokenKind::Const) || is_const {
            base_type = base_type.with_const();
        }

        Ok(DeclSpec {
            base_type,
            is_static,
            is_volatile,
        })
    }

    /// Parse a full type as used in casts and `sizeof`: base type plus `*`s.
    pub(crate) fn parse_type(&mut self) -> Result<Type, ParseError> {
        let spec = self.parse_decl_specifiers()?;
        Ok(self.parse_pointer_suffix(spec.base_type))
    }

    pub(crate) fn parse_pointer_suffix(&mut self, mut ty: Type) -> Type {
        while self.match_token(&TokenKind::Star) {
            ty = ty.with_pointer();
        }
        ty
    }

    /// Parse `[N]` suffixes. Sizes must be constant expressions.
    fn parse_array_suffix(&mut self, mut ty: Type) -> Result<Type, ParseError> {
        while self.match_token(&TokenKind::LBracket) {
            if self.match_token(&TokenKind::RBracket) {
                ty = ty.with_array(None);
                continue;
            }
            let size_expr = self.parse_expression()?;
            let Some(size) = self.constant_value(size_expr).filter(|n| *n >= 0) else {
                return self.error("Array size must be a non-negative constant integer");
            };
            ty = ty.with_array(Some(size as usize));
            self.expect_token(&TokenKind::RBracket, "Expected ']' after array size")?;
        }
        Ok(ty)
    }

    /// Fold an integer constant expression built from literals and `const` ints.
    fn constant_value(&self, id: NodeId) -> Option<i64> {
        match self.program.kind(id) {
            NodeKind::IntLiteral { value, .. } => Some(*value),
            NodeKind::CharLiteral(c) => Some(*c as i64),
            NodeKind::Identifier(name) => self.const_ints.get(name).copied(),
            NodeKind::Unary { op: UnOp::Neg, operand } => self.constant_value(*operand).map(|n| -n),
            NodeKind::Binary { op, left, right } => {
                let (l, r) = (self.constant_value(*left)?, self.constant_value(*right)?);
                match op {
                    BinOp::Add => l.checked_add(r),
                    BinOp::Sub => l.checked_sub(r),
                    BinOp::Mul => l.checked_mul(r),
                    BinOp::Div => l.checked_div(r),
                    BinOp::Shl => l.checked_shl(u32::try_from(r).ok()?),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn parse_base_type(&mut self) -> Result<BaseType, ParseError> {
        let kind = self.peek_kind().clone();
        let base = match kind {
            TokenKind::Unsigned | TokenKind::Signed => {
                self.advance();
                let unsigned = matches!(kind, TokenKind::Unsigned);
                let sized = self.parse_integer_width()?;
                match (unsigned, sized) {
                    (true, Some(BaseType::Char)) => BaseType::UChar,
                    (true, Some(BaseType::Short)) => BaseType::UShort,
                    (true, Some(BaseType::LongLong)) => BaseType::LongLong,
                    (true, _) => BaseType::UInt,
                    (false, Some(base)) => base,
                    (false, None) => BaseType::Int,
                }
            }
            TokenKind::Int | TokenKind::Short | TokenKind::Long | TokenKind::Char => {
                self.parse_integer_width()?.unwrap_or(BaseType::Int)
            }
            TokenKind::Bool => {
                self.advance();
                BaseType::Bool
            }
            TokenKind::Float => {
                self.advance();
                BaseType::Float
            }
            TokenKind::Double => {
                self.advance();
                BaseType::Double
            }
            TokenKind::Void => {
                self.advance();
                BaseType::Void
            }
            TokenKind::Struct => {
                self.advance();
                let name = self.expect_identifier()?;
                BaseType::Struct(name)
            }
            TokenKind::Ident(ref name) => {
                let base = match BaseType::from_alias(name) {
                    Some(base) => base,
                    None if self.struct_names.contains(name) => BaseType::Struct(name.clone()),
                    None => return self.error(format!("Unknown type name '{}'", name)),
                };
                self.advance();
                base
            }
            _ => return self.error(format!("Expected type, found {}", self.peek())),
        };
        Ok(base)
    }

    /// `char`, `short [int]`, `int`, `long [long] [int]`; `None` if no width keyword follows.
    fn parse_integer_width(&mut self) -> Result<Option<BaseType>, ParseError> {
        let base = if self.match_token(&TokenKind::Char) {
            BaseType::Char
        } else if self.match_token(&TokenKind::Short) {
            self.match_token(&TokenKind::Int);
            BaseType::Short
        } else if self.match_token(&TokenKind::Long) {
            let base = if self.match_token(&TokenKind::Long) {
                BaseType::LongLong
            } else {
                BaseType::Int
            };
            self.match_token(&TokenKind::Int);
            base
        } else if self.match_token(&TokenKind::Int) {
            BaseType::Int
        } else {
            return Ok(None);
        };
        Ok(Some(base))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn parse(source: &str) -> Program {
        Parser::new(source).unwrap().parse_program().unwrap()
    }

    #[test]
    fn test_declarator_list() {
        let program = parse("static const unsigned long a = 1, *b, c[2][3];");
        let NodeKind::DeclGroup { decls } = program.kind(program.items[0]) else {
            panic!("expected group");
        };
        assert_eq!(decls.len(), 3);
        let NodeKind::VarDecl { var_type, is_static, .. } = program.kind(decls[0]) else {
            panic!("expected declaration");
        };
        assert!(*is_static);
        assert!(var_type.is_const);
        assert_eq!(var_type.base, BaseType::UInt);
        let NodeKind::VarDecl { var_type, .. } = program.kind(decls[1]) else {
            panic!("expected declaration");
        };
        assert_eq!(var_type.pointer_depth, 1);
        let NodeKind::VarDecl { var_type, .. } = program.kind(decls[2]) else {
            panic!("expected declaration");
        };
        assert_eq!(var_type.array_dims, vec![Some(2), Some(3)]);
    }

    #[test]
    fn test_const_array_size() {
        let program = parse("const int N = 4;\nint buf[N * 2];");
        let NodeKind::VarDecl { var_type, .. } = program.kind(program.items[1]) else {
            panic!("expected declaration");
        };
        assert_eq!(var_type.array_dims, vec![Some(8)]);
    }

    #[test]
    fn test_library_objects() {
        let program = parse("Servo arm;\nAdafruit_NeoPixel strip(16, 6, 82);\nServo b = Servo();");
        assert!(matches!(
            program.kind(program.items[0]),
            NodeKind::ObjectDecl { class_name, args, .. } if class_name == "Servo" && args.is_empty()
        ));
        assert!(matches!(
            program.kind(program.items[1]),
            NodeKind::ObjectDecl { name, args, .. } if name == "strip" && args.len() == 3
        ));
        assert!(matches!(program.kind(program.items[2]), NodeKind::ObjectDecl { .. }));
    }

    #[test]
    fn test_struct_without_keyword() {
        let program = parse("struct Point { int x, y; };\nPoint p = {1, 2};");
        let NodeKind::StructDef { fields, .. } = program.kind(program.items[0]) else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 2);
        let NodeKind::VarDecl { var_type, init, .. } = program.kind(program.items[1]) else {
            panic!("expected declaration");
        };
        assert_eq!(var_type.base, BaseType::Struct("Point".to_string()));
        assert!(matches!(program.kind(init.unwrap()), NodeKind::InitList(items) if items.len() == 2));
    }

    #[test]
    fn test_array_params_decay() {
        let program = parse("int sum(int values[], byte n) { return 0; }");
        let NodeKind::FunctionDef { params, .. } = program.kind(program.items[0]) else {
            panic!("expected function");
        };
        assert!(params[0].param_type.is_pointer());
        assert_eq!(params[1].param_type.base, BaseType::UChar);
    }

    #[test]
    fn test_reference_params_rejected() {
        let err = Parser::new("void f(int &x) {}").unwrap().parse_program().unwrap_err();
        assert!(err.message.contains("Reference"));
    }
}
