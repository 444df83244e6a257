//! Sketch front end
//!
//! Turns Arduino sketch source into the [`ast::Program`] the interpreter runs:
//! - [`preprocessor`]: object-like `#define` expansion and the macro table
//! - [`lexer`]: tokenization (source text → tokens)
//! - [`parse`]: recursive descent parsing (tokens → AST arena)
//! - [`ast`]: AST node definitions
//! - [`codec`]: compact binary form of a parsed program
//!
//! # Supported subset
//!
//! - Types: integer kinds and their Arduino/`stdint` aliases, `float`,
//!   `double`, `bool`, `String`, structs, pointers, arrays
//! - Library objects: `Servo arm;`, `Adafruit_NeoPixel strip(16, 6);`
//! - Statements: declarations, `if`, `while`, `do`/`while`, `for`, `switch`
//! - Expressions: the full C operator set, casts, `sizeof`, method calls
//! - No templates, classes with user methods, references or function-like macros

pub mod ast;
pub mod codec;
mod declarations;
mod expressions;
pub mod lexer;
pub mod parse;
pub mod preprocessor;
mod statements;

pub use parse::{ParseError, Parser};
pub use preprocessor::{MacroTable, MacroValue};

/// A parsed sketch together with the macros its source defined
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSketch {
    pub program: ast::Program,
    pub macros: MacroTable,
}

/// Preprocess and parse a complete sketch.
pub fn parse_sketch(source: &str) -> Result<ParsedSketch, ParseError> {
    let preprocessed = preprocessor::preprocess(source)?;
    let program = Parser::new(&preprocessed.source)?.parse_program()?;
    Ok(ParsedSketch {
        program,
        macros: preprocessed.macros,
    })
}
