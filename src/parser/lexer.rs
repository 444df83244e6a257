//! Lexer (tokenizer) for sketch source code
//!
//! Converts preprocessed source text into a flat [`Token`] stream consumed by
//! the parser. Numeric literals understand the forms sketches actually use:
//! decimal, `0x` hex, `0b` binary, floats with exponents and the `U`/`L`/`f`
//! suffixes. Any preprocessor line that survives preprocessing is skipped.

use super::ast::SourceLocation;
use std::fmt;
use thiserror::Error;

/// Token variants produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral { value: i64, unsigned: bool },
    FloatLiteral(f64),
    CharLiteral(i8),
    StringLiteral(String),

    Ident(String),

    // Type keywords
    Int,
    Long,
    Short,
    Char,
    Bool,
    Float,
    Double,
    Void,
    Unsigned,
    Signed,
    Struct,

    // Qualifiers
    Const,
    Static,
    Volatile,

    // Statement keywords
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Sizeof,
    True,
    False,
    Null,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    AndAnd,
    OrOr,
    Bang,

    // Bitwise
    Amp,
    Pipe,
    Caret,
    Tilde,
    LtLt,
    GtGt,

    // Assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    LtLtEq,
    GtGtEq,

    PlusPlus,
    MinusMinus,

    Dot,
    Arrow,
    Question,
    Colon,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::IntLiteral { value, .. } => return write!(f, "int literal {}", value),
            TokenKind::FloatLiteral(v) => return write!(f, "float literal {}", v),
            TokenKind::CharLiteral(c) => {
                let byte = *c as u8;
                return if byte.is_ascii_graphic() || byte == b' ' {
                    write!(f, "char literal '{}'", byte as char)
                } else {
                    write!(f, "char literal '\\x{:02x}'", byte)
                };
            }
            TokenKind::StringLiteral(s) => return write!(f, "string literal \"{}\"", s),
            TokenKind::Ident(s) => return write!(f, "identifier '{}'", s),
            TokenKind::Int => "'int'",
            TokenKind::Long => "'long'",
            TokenKind::Short => "'short'",
            TokenKind::Char => "'char'",
            TokenKind::Bool => "'bool'",
            TokenKind::Float => "'float'",
            TokenKind::Double => "'double'",
            TokenKind::Void => "'void'",
            TokenKind::Unsigned => "'unsigned'",
            TokenKind::Signed => "'signed'",
            TokenKind::Struct => "'struct'",
            TokenKind::Const => "'const'",
            TokenKind::Static => "'static'",
            TokenKind::Volatile => "'volatile'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::For => "'for'",
            TokenKind::Switch => "'switch'",
            TokenKind::Case => "'case'",
            TokenKind::Default => "'default'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Return => "'return'",
            TokenKind::Sizeof => "'sizeof'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'NULL'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Le => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Bang => "'!'",
            TokenKind::Amp => "'&'",
            TokenKind::Pipe => "'|'",
            TokenKind::Caret => "'^'",
            TokenKind::Tilde => "'~'",
            TokenKind::LtLt => "'<<'",
            TokenKind::GtGt => "'>>'",
            TokenKind::Eq => "'='",
            TokenKind::PlusEq => "'+='",
            TokenKind::MinusEq => "'-='",
            TokenKind::StarEq => "'*='",
            TokenKind::SlashEq => "'/='",
            TokenKind::PercentEq => "'%='",
            TokenKind::AmpEq => "'&='",
            TokenKind::PipeEq => "'|='",
            TokenKind::CaretEq => "'^='",
            TokenKind::LtLtEq => "'<<='",
            TokenKind::GtGtEq => "'>>='",
            TokenKind::PlusPlus => "'++'",
            TokenKind::MinusMinus => "'--'",
            TokenKind::Dot => "'.'",
            TokenKind::Arrow => "'->'",
            TokenKind::Question => "'?'",
            TokenKind::Colon => "':'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}

/// A token together with the position where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lexer error at line {}, column {}: {message}", location.line, location.column)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

/// Lexer for sketch source code
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    location: self.current_location(),
                });
                break;
            }

            if self.peek() == Some('#') {
                self.skip_line();
                continue;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let location = self.current_location();
        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file".to_string(),
            location,
        })?;

        let kind = match ch {
            '"' => self.string_literal(location)?,
            '\'' => self.char_literal(location)?,
            '0'..='9' => self.number_literal(ch, location)?,
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.number_literal(ch, location)?
            }
            'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(ch),

            '+' => self.pick(&[('+', TokenKind::PlusPlus), ('=', TokenKind::PlusEq)], TokenKind::Plus),
            '-' => self.pick(
                &[
                    ('-', TokenKind::MinusMinus),
                    ('=', TokenKind::MinusEq),
                    ('>', TokenKind::Arrow),
                ],
                TokenKind::Minus,
            ),
            '*' => self.pick(&[('=', TokenKind::StarEq)], TokenKind::Star),
            '/' => self.pick(&[('=', TokenKind::SlashEq)], TokenKind::Slash),
            '%' => self.pick(&[('=', TokenKind::PercentEq)], TokenKind::Percent),
            '=' => self.pick(&[('=', TokenKind::EqEq)], TokenKind::Eq),
            '!' => self.pick(&[('=', TokenKind::NotEq)], TokenKind::Bang),
            '^' => self.pick(&[('=', TokenKind::CaretEq)], TokenKind::Caret),
            '&' => self.pick(&[('&', TokenKind::AndAnd), ('=', TokenKind::AmpEq)], TokenKind::Amp),
            '|' => self.pick(&[('|', TokenKind::OrOr), ('=', TokenKind::PipeEq)], TokenKind::Pipe),
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    self.pick(&[('=', TokenKind::LtLtEq)], TokenKind::LtLt)
                } else {
                    self.pick(&[('=', TokenKind::Le)], TokenKind::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    self.pick(&[('=', TokenKind::GtGtEq)], TokenKind::GtGt)
                } else {
                    self.pick(&[('=', TokenKind::Ge)], TokenKind::Gt)
                }
            }
            '~' => TokenKind::Tilde,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,

            _ => {
                return Err(LexError {
                    message: format!("Unexpected character: '{}'", ch),
                    location,
                })
            }
        };

        Ok(Token { kind, location })
    }

    /// Consume the first follower in `options` that matches the next character.
    fn pick(&mut self, options: &[(char, TokenKind)], fallback: TokenKind) -> TokenKind {
        for (next, kind) in options {
            if self.peek() == Some(*next) {
                self.advance();
                return kind.clone();
            }
        }
        fallback
    }

    fn string_literal(&mut self, location: SourceLocation) -> Result<TokenKind, LexError> {
        let mut string = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(TokenKind::StringLiteral(string));
                }
                '\n' => break,
                '\\' => {
                    self.advance();
                    let byte = self.escape_sequence()?;
                    string.push(byte as u8 as char);
                }
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError {
            message: "Unterminated string literal".to_string(),
            location,
        })
    }

    fn char_literal(&mut self, location: SourceLocation) -> Result<TokenKind, LexError> {
        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file in character literal".to_string(),
            location,
        })?;

        let value = if ch == '\\' { self.escape_sequence()? } else { ch as u32 as u8 as i8 };

        if self.advance() != Some('\'') {
            return Err(LexError {
                message: "Expected closing quote in character literal".to_string(),
                location: self.current_location(),
            });
        }

        Ok(TokenKind::CharLiteral(value))
    }

    /// Decode the character after a backslash.
    fn escape_sequence(&mut self) -> Result<i8, LexError> {
        let location = self.current_location();
        let escaped = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file in escape sequence".to_string(),
            location,
        })?;

        let value = match escaped {
            'n' => b'\n',
            't' => b'\t',
            'r' => b'\r',
            '\\' => b'\\',
            '\'' => b'\'',
            '"' => b'"',
            '0' => 0,
            'x' => {
                let mut digits = String::new();
                while digits.len() < 2 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    if let Some(c) = self.advance() {
                        digits.push(c);
                    }
                }
                u8::from_str_radix(&digits, 16).map_err(|_| LexError {
                    message: format!("Invalid hex escape sequence: \\x{}", digits),
                    location,
                })?
            }
            _ => {
                return Err(LexError {
                    message: format!("Unknown escape sequence: \\{}", escaped),
                    location,
                });
            }
        };

        Ok(value as i8)
    }

    fn number_literal(
        &mut self,
        first: char,
        location: SourceLocation,
    ) -> Result<TokenKind, LexError> {
        let invalid = |text: &str| LexError {
            message: format!("Invalid numeric literal: {}", text),
            location,
        };

        if first == '0' && matches!(self.peek(), Some('x' | 'X' | 'b' | 'B')) {
            let radix = match self.advance() {
                Some('x' | 'X') => 16,
                _ => 2,
            };
            let digits = self.take_while(|c| c.is_ascii_alphanumeric() && c.is_digit(radix));
            let unsigned = self.integer_suffix();
            let value = i64::from_str_radix(&digits, radix).map_err(|_| invalid(&digits))?;
            return Ok(TokenKind::IntLiteral { value, unsigned });
        }

        let mut text = first.to_string();
        text.push_str(&self.take_while(|c| c.is_ascii_digit()));

        let mut is_float = first == '.';
        if !is_float && self.peek() == Some('.') {
            is_float = true;
            self.advance();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.advance();
            text.push('e');
            if let Some(sign @ ('+' | '-')) = self.peek() {
                self.advance();
                text.push(sign);
            }
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        if is_float {
            if matches!(self.peek(), Some('f' | 'F')) {
                self.advance();
            }
            let value = text.parse::<f64>().map_err(|_| invalid(&text))?;
            return Ok(TokenKind::FloatLiteral(value));
        }

        let unsigned = self.integer_suffix();
        let value = if text.len() > 1 && text.starts_with('0') {
            i64::from_str_radix(&text[1..], 8)
        } else {
            text.parse::<i64>()
        }
        .map_err(|_| invalid(&text))?;

        Ok(TokenKind::IntLiteral { value, unsigned })
    }

    /// Consume `U`/`L` suffixes and report whether the literal is unsigned.
    fn integer_suffix(&mut self) -> bool {
        let suffix = self.take_while(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
        suffix.contains(['u', 'U'])
    }

    fn identifier_or_keyword(&mut self, first: char) -> TokenKind {
        let mut ident = first.to_string();
        ident.push_str(&self.take_while(|c| c.is_ascii_alphanumeric() || c == '_'));

        match ident.as_str() {
            "int" => TokenKind::Int,
            "long" => TokenKind::Long,
            "short" => TokenKind::Short,
            "char" => TokenKind::Char,
            "bool" => TokenKind::Bool,
            "float" => TokenKind::Float,
            "double" => TokenKind::Double,
            "void" => TokenKind::Void,
            "unsigned" => TokenKind::Unsigned,
            "signed" => TokenKind::Signed,
            "struct" => TokenKind::Struct,
            "const" => TokenKind::Const,
            "static" => TokenKind::Static,
            "volatile" => TokenKind::Volatile,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "sizeof" => TokenKind::Sizeof,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "NULL" | "nullptr" => TokenKind::Null,
            _ => TokenKind::Ident(ident),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            out.push(ch);
            self.advance();
        }
        out
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_ahead(1) == Some('/') => self.skip_line(),
                Some('/') if self.peek_ahead(1) == Some('*') => self.skip_block_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.advance() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.current_location();
        self.advance();
        self.advance();

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(LexError {
            message: "Unterminated block comment".to_string(),
            location: start,
        })
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_sketch_skeleton() {
        let tokens = kinds("void loop() { delay(1000); }");

        assert_eq!(tokens[0], TokenKind::Void);
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "loop"));
        assert_eq!(tokens[2], TokenKind::LParen);
        assert_eq!(tokens[3], TokenKind::RParen);
        assert_eq!(tokens[4], TokenKind::LBrace);
        assert!(matches!(tokens[5], TokenKind::Ident(ref s) if s == "delay"));
        assert!(matches!(tokens[7], TokenKind::IntLiteral { value: 1000, unsigned: false }));
        assert_eq!(tokens[10], TokenKind::RBrace);
        assert_eq!(tokens[11], TokenKind::Eof);
    }

    #[test]
    fn test_compound_operators() {
        let tokens = kinds("<<= >>= &= |= ^= -> ++ --");
        assert_eq!(
            tokens,
            vec![
                TokenKind::LtLtEq,
                TokenKind::GtGtEq,
                TokenKind::AmpEq,
                TokenKind::PipeEq,
                TokenKind::CaretEq,
                TokenKind::Arrow,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numeric_forms() {
        let tokens = kinds("0xFF 0b101 1000UL 017 3.5 2.0f 1e3 .5");
        assert!(matches!(tokens[0], TokenKind::IntLiteral { value: 255, unsigned: false }));
        assert!(matches!(tokens[1], TokenKind::IntLiteral { value: 5, .. }));
        assert!(matches!(tokens[2], TokenKind::IntLiteral { value: 1000, unsigned: true }));
        assert!(matches!(tokens[3], TokenKind::IntLiteral { value: 15, .. }));
        assert_eq!(tokens[4], TokenKind::FloatLiteral(3.5));
        assert_eq!(tokens[5], TokenKind::FloatLiteral(2.0));
        assert_eq!(tokens[6], TokenKind::FloatLiteral(1000.0));
        assert_eq!(tokens[7], TokenKind::FloatLiteral(0.5));
    }

    #[test]
    fn test_comments_and_directives_skipped() {
        let tokens = kinds("#include <Servo.h>\n// note\nint /* x */ y;");
        assert_eq!(tokens[0], TokenKind::Int);
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "y"));
        assert_eq!(tokens[2], TokenKind::Semicolon);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#""a\tb\n" '\x41'"#);
        assert_eq!(tokens[0], TokenKind::StringLiteral("a\tb\n".to_string()));
        assert_eq!(tokens[1], TokenKind::CharLiteral(65));
    }

    #[test]
    fn test_locations_track_lines() {
        let tokens = Lexer::new("int a;\n  a = 1;").tokenize().unwrap();
        assert_eq!(tokens[3].location, SourceLocation::new(2, 3));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }
}
