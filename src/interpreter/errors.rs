//! Runtime error types for the sketch interpreter
//!
//! This module defines [`RuntimeError`], which represents all errors that can occur
//! during program execution (as opposed to parse errors or codec errors).
//!
//! Almost every runtime error is fatal: the machine moves to `Error` and emits a
//! single `Error` command. Two kinds are not:
//! - [`ErrorKind::LoopLimitExceeded`] is how the program driver reports that
//!   `loop()` ran its configured number of times; it ends the run normally
//! - [`ErrorKind::StaleRequestResponse`] describes a response for a request that
//!   is no longer pending; it is logged and ignored

use crate::memory::MemoryError;
use crate::parser::ast::SourceLocation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy exposed in `Error` commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    TypeMismatch,
    UndefinedVariable,
    UndefinedFunction,
    DuplicateDeclaration,
    DivisionByZero,
    ArrayIndexOutOfBounds,
    NullDereference,
    UnsupportedConstruct,
    ArgumentCountMismatch,
    ConstAssignment,
    IterationCapExceeded,
    LoopLimitExceeded,
    StaleRequestResponse,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::UndefinedVariable => "UndefinedVariable",
            ErrorKind::UndefinedFunction => "UndefinedFunction",
            ErrorKind::DuplicateDeclaration => "DuplicateDeclaration",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::ArrayIndexOutOfBounds => "ArrayIndexOutOfBounds",
            ErrorKind::NullDereference => "NullDereference",
            ErrorKind::UnsupportedConstruct => "UnsupportedConstruct",
            ErrorKind::ArgumentCountMismatch => "ArgumentCountMismatch",
            ErrorKind::ConstAssignment => "ConstAssignment",
            ErrorKind::IterationCapExceeded => "IterationCapExceeded",
            ErrorKind::LoopLimitExceeded => "LoopLimitExceeded",
            ErrorKind::StaleRequestResponse => "StaleRequestResponse",
        }
    }

    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            ErrorKind::LoopLimitExceeded | ErrorKind::StaleRequestResponse
        )
    }
}

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Type mismatch at line {}: {message}", location.line)]
    TypeMismatch {
        message: String,
        location: SourceLocation,
    },

    #[error("Undefined variable '{name}' at line {}", location.line)]
    UndefinedVariable {
        name: String,
        location: SourceLocation,
    },

    #[error("Undefined function '{name}' at line {}", location.line)]
    UndefinedFunction {
        name: String,
        location: SourceLocation,
    },

    #[error("'{name}' is already declared in this scope (line {})", location.line)]
    DuplicateDeclaration {
        name: String,
        location: SourceLocation,
    },

    /// Integer division or modulo by zero
    #[error("{operation} by zero at line {}", location.line)]
    DivisionByZero {
        operation: String,
        location: SourceLocation,
    },

    #[error("Index {index} out of bounds for size {size} at line {}", location.line)]
    ArrayIndexOutOfBounds {
        index: i64,
        size: usize,
        location: SourceLocation,
    },

    /// Null or dangling pointer dereference
    #[error("Null pointer dereference at line {}", location.line)]
    NullDereference { location: SourceLocation },

    #[error("Unsupported construct at line {}: {message}", location.line)]
    UnsupportedConstruct {
        message: String,
        location: SourceLocation,
    },

    #[error(
        "Function '{function}' expects {expected} argument{}, got {got} at line {}",
        if *expected == 1 { "" } else { "s" },
        location.line
    )]
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        got: usize,
        location: SourceLocation,
    },

    #[error("Cannot assign to const '{name}' at line {}", location.line)]
    ConstAssignment {
        name: String,
        location: SourceLocation,
    },

    /// A `while`/`do`/`for` loop exceeded `maxInnerIterations`
    #[error("Loop exceeded {limit} iterations at line {}", location.line)]
    IterationCapExceeded { limit: u64, location: SourceLocation },

    /// `loop()` ran the configured number of times
    #[error("Loop limit of {iterations} iterations reached")]
    LoopLimitExceeded { iterations: u64 },

    #[error("No pending request with id {request_id}")]
    StaleRequestResponse { request_id: u64 },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            RuntimeError::UndefinedVariable { .. } => ErrorKind::UndefinedVariable,
            RuntimeError::UndefinedFunction { .. } => ErrorKind::UndefinedFunction,
            RuntimeError::DuplicateDeclaration { .. } => ErrorKind::DuplicateDeclaration,
            RuntimeError::DivisionByZero { .. } => ErrorKind::DivisionByZero,
            RuntimeError::ArrayIndexOutOfBounds { .. } => ErrorKind::ArrayIndexOutOfBounds,
            RuntimeError::NullDereference { .. } => ErrorKind::NullDereference,
            RuntimeError::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
            RuntimeError::ArgumentCountMismatch { .. } => ErrorKind::ArgumentCountMismatch,
            RuntimeError::ConstAssignment { .. } => ErrorKind::ConstAssignment,
            RuntimeError::IterationCapExceeded { .. } => ErrorKind::IterationCapExceeded,
            RuntimeError::LoopLimitExceeded { .. } => ErrorKind::LoopLimitExceeded,
            RuntimeError::StaleRequestResponse { .. } => ErrorKind::StaleRequestResponse,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            RuntimeError::TypeMismatch { location, .. }
            | RuntimeError::UndefinedVariable { location, .. }
            | RuntimeError::UndefinedFunction { location, .. }
            | RuntimeError::DuplicateDeclaration { location, .. }
            | RuntimeError::DivisionByZero { location, .. }
            | RuntimeError::ArrayIndexOutOfBounds { location, .. }
            | RuntimeError::NullDereference { location }
            | RuntimeError::UnsupportedConstruct { location, .. }
            | RuntimeError::ArgumentCountMismatch { location, .. }
            | RuntimeError::ConstAssignment { location, .. }
            | RuntimeError::IterationCapExceeded { location, .. } => Some(location),
            RuntimeError::LoopLimitExceeded { .. } | RuntimeError::StaleRequestResponse { .. } => {
                None
            }
        }
    }

    pub fn type_mismatch(message: impl Into<String>, location: SourceLocation) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
            location,
        }
    }

    pub fn unsupported(message: impl Into<String>, location: SourceLocation) -> Self {
        RuntimeError::UnsupportedConstruct {
            message: message.into(),
            location,
        }
    }
}

impl MemoryError {
    /// Attach the location of the operation that failed.
    pub fn at(self, location: SourceLocation) -> RuntimeError {
        match self {
            MemoryError::DuplicateDeclaration(name) => {
                RuntimeError::DuplicateDeclaration { name, location }
            }
            MemoryError::UndefinedVariable(name) => RuntimeError::UndefinedVariable { name, location },
            MemoryError::IndexOutOfBounds { index, size } => RuntimeError::ArrayIndexOutOfBounds {
                index: index as i64,
                size,
                location,
            },
            MemoryError::DanglingPlace => RuntimeError::NullDereference { location },
            other @ (MemoryError::NotIndexable(_) | MemoryError::NoSuchField { .. }) => {
                RuntimeError::type_mismatch(other.to_string(), location)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_kind() {
        let err = RuntimeError::ArgumentCountMismatch {
            function: "blink".to_string(),
            expected: 1,
            got: 2,
            location: SourceLocation::new(4, 3),
        };
        assert_eq!(
            err.to_string(),
            "Function 'blink' expects 1 argument, got 2 at line 4"
        );
        assert_eq!(err.kind().name(), "ArgumentCountMismatch");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_controlled_kinds_are_not_fatal() {
        assert!(!RuntimeError::LoopLimitExceeded { iterations: 3 }.is_fatal());
        assert!(!RuntimeError::StaleRequestResponse { request_id: 9 }.is_fatal());
        assert!(RuntimeError::LoopLimitExceeded { iterations: 3 }.location().is_none());
    }

    #[test]
    fn test_memory_error_mapping() {
        let loc = SourceLocation::new(2, 1);
        assert_eq!(
            MemoryError::DanglingPlace.at(loc).kind(),
            ErrorKind::NullDereference
        );
        assert_eq!(
            MemoryError::IndexOutOfBounds { index: 5, size: 3 }.at(loc).kind(),
            ErrorKind::ArrayIndexOutOfBounds
        );
    }
}
