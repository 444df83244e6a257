//! # Introduction
//!
//! sketchrun executes Arduino sketches without hardware. It parses a sketch,
//! walks the syntax tree, and reports every observable effect (pin writes,
//! delays, serial output, library calls, variable updates) as an ordered
//! stream of [`commands::Command`]s for a host to consume.
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Preprocessor → Lexer → Parser → AST → Interpreter → Commands
//!                                            ↕
//!                                       binary codec
//! ```
//!
//! 1. [`parser`] expands `#define`s, tokenises the source and builds an AST
//!    arena. [`parser::codec`] stores that arena in a compact binary form.
//! 2. [`interpreter`] runs the AST on an explicit frame machine. When the
//!    sketch needs host data (`analogRead`, `millis`, a library query) it
//!    emits a request command and waits for
//!    [`Interpreter::resume_with_value`](interpreter::Interpreter::resume_with_value).
//! 3. [`memory`] holds scopes, static storage and the place-based pointer model.
//! 4. [`commands`] numbers commands and delivers them to listeners.
//! 5. [`config`] holds run limits and logging switches.
//!
//! ## Example
//!
//! ```
//! use sketchrun::config::Config;
//! use sketchrun::interpreter::{ExecutionState, Interpreter};
//! use sketchrun::parser::parse_sketch;
//!
//! let sketch = parse_sketch("void setup() { pinMode(13, OUTPUT); }").unwrap();
//! let mut interp = Interpreter::new(&sketch.program, Config::default()).with_macros(sketch.macros);
//! interp.start();
//! assert_eq!(interp.run_until_blocked(), ExecutionState::Complete);
//! ```

pub mod commands;
pub mod config;
pub mod interpreter;
pub mod memory;
pub mod parser;
