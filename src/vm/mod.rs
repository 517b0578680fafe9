// src/vm/mod.rs

// Declare the modules within the `vm` crate.
pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod function;
pub mod opcode;
#[allow(clippy::module_inception)]
pub mod vm;

#[cfg(test)]
mod vm_test;

// Re-export the key structures and functions.
pub use chunk::Chunk;
pub use compiler::compile;
pub use function::Function;
pub use opcode::OpCode;
pub use vm::VM;
