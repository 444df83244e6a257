//! Sketch execution engine
//!
//! - [`engine`]: [`Interpreter`], the execution state machine and host control API
//! - [`machine`]: the explicit frame machine and [`ExecutionContext`]
//! - [`statements`], [`loops`], [`jumps`], [`expressions`]: what each frame does
//! - [`builtins`]: Arduino functions, `Serial`, `String` and library objects
//! - [`library`]: the library routing table
//! - [`type_system`], [`ops`]: conversions and operators
//! - [`errors`]: runtime error taxonomy
//!
//! # Execution Model
//!
//! The interpreter never recurses on the Rust stack. Evaluation state is a
//! stack of frames plus a stack of operand values, so a request for host data
//! (an `analogRead`, a `millis()` timestamp) simply stops the machine with the
//! partially evaluated statement still on the stacks. The host's answer is
//! pushed as the missing value and execution continues where it stopped.

pub mod builtins;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod expressions;
pub mod jumps;
pub mod library;
pub mod loops;
pub mod machine;
pub mod ops;
pub mod statements;
pub mod type_system;

pub use engine::{ExecutionState, Interpreter, PendingRequest};
pub use errors::{ErrorKind, RuntimeError};
pub use library::{LibraryTable, MethodRoute};
pub use machine::ExecutionContext;
