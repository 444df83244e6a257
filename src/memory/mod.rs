//! Memory model for the sketch interpreter
//!
//! - [`value`]: Runtime value representation
//! - [`environment`]: Scoped variable storage, static variables and places
//!
//! There is no byte-addressed memory. Pointers are [`environment::Place`]s:
//! a variable cell plus a path of array indices and struct fields. Pointer
//! arithmetic moves the last index of the path, so it is always scaled by
//! element rather than by byte.

pub mod environment;
pub mod value;

pub use environment::{CellId, Environment, MemoryError, PathStep, Place, ScopeKind, Variable};
pub use value::{ObjectRef, Value};
