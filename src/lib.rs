// src/lib.rs

// --- Module Declarations ---
pub mod config;
pub mod error;
pub mod scanner;
pub mod value;
pub mod vm;

// --- Public API Re-exports ---
// This makes the core components available to users of the library
// without them needing to know the internal file structure.
pub use config::VmConfig;
pub use error::{CompileError, CompileErrorKind, ErrorCode, InterpretError, Status};
pub use value::{Object, Value};
pub use vm::{compile, Chunk, Function, OpCode, VM};

/// Compiles `source` and runs it on a fresh VM that prints to stdout.
pub fn interpret(source: &str) -> Result<Value, InterpretError> {
    let chunk = compile(source)?;
    VM::new(VmConfig::default()).interpret(chunk)
}
