// src/error.rs

use std::fmt;

use thiserror::Error;

/// The kind of a failed runtime operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A user-level error: type mismatch, undefined variable, bad call.
    Runtime,
    /// A broken VM invariant. Any program the compiler accepts should never produce one.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Runtime => write!(f, "Runtime error"),
            ErrorCode::Internal => write!(f, "Internal error"),
        }
    }
}

/// The outcome of executing a single instruction. `Ok(())` is the OK status.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: ErrorCode,
    pub message: String,
}

impl Status {
    pub fn runtime(message: impl Into<String>) -> Self {
        Status { code: ErrorCode::Runtime, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Status { code: ErrorCode::Internal, message: message.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileErrorKind {
    #[error("{0}")]
    Expected(&'static str),
    #[error("Expect expression.")]
    ExpectExpression,
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Already a variable named '{0}' in this scope.")]
    Redeclared(String),
    #[error("Can't read local variable '{0}' in its own initializer.")]
    OwnInitializer(String),
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    #[error("Too many local variables in function.")]
    TooManyLocals,
    #[error("Code nested too deeply.")]
    TooDeeplyNested,
    #[error("Too much code to jump over.")]
    JumpTooLarge,
    #[error("Loop body too large.")]
    LoopTooLarge,
    #[error("Can't use 'break' outside of a loop.")]
    BreakOutsideLoop,
    #[error("Can't use 'continue' outside of a loop.")]
    ContinueOutsideLoop,
    #[error("Can't return from top-level code.")]
    ReturnOutsideFunction,
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters,
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments,
    #[error("Invalid number literal '{0}'.")]
    InvalidNumber(String),
    #[error("Unexpected character.")]
    UnexpectedCharacter,
    #[error("Unterminated string.")]
    UnterminatedString,
}

/// A compile error, reported for the token the compiler was looking at.
/// An empty `lexeme` means the error happened at the end of the input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[line {line}] Error {}: {kind}", location(.lexeme))]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub line: u32,
    pub lexeme: String,
}

fn location(lexeme: &str) -> String {
    if lexeme.is_empty() {
        "at end".to_string()
    } else {
        format!("at '{}'", lexeme)
    }
}

// Combined result type for the compile + run pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpretError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{status} [line {line}]")]
    Runtime { status: Status, line: u32 },
}

impl InterpretError {
    /// The runtime status, if this is a runtime failure.
    pub fn status(&self) -> Option<&Status> {
        match self {
            InterpretError::Runtime { status, .. } => Some(status),
            InterpretError::Compile(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let status = Status::runtime("Operand must be a number.");
        assert_eq!(status.to_string(), "Runtime error: Operand must be a number.");
        assert_eq!(Status::internal("Stack underflow.").to_string(), "Internal error: Stack underflow.");
    }

    #[test]
    fn test_compile_error_display() {
        let err = CompileError {
            kind: CompileErrorKind::InvalidAssignmentTarget,
            line: 2,
            lexeme: "=".to_string(),
        };
        assert_eq!(err.to_string(), "[line 2] Error at '=': Invalid assignment target.");

        let at_end = CompileError {
            kind: CompileErrorKind::ExpectExpression,
            line: 7,
            lexeme: String::new(),
        };
        assert_eq!(at_end.to_string(), "[line 7] Error at end: Expect expression.");
    }

    #[test]
    fn test_runtime_error_display() {
        let err = InterpretError::Runtime { status: Status::runtime("Undefined variable 'x'."), line: 3 };
        assert_eq!(err.to_string(), "Runtime error: Undefined variable 'x'. [line 3]");
        assert!(err.status().is_some());
    }
}
