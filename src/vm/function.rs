// src/vm/function.rs

use std::fmt;

use crate::vm::chunk::Chunk;

/// Name given to the implicit function wrapping top-level code.
pub const SCRIPT_NAME: &str = "<script>";

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub arity: usize, // Number of parameters the function expects.
    pub chunk: Chunk,
    pub name: String, // For debugging and error messages.
}

impl Function {
    pub fn new() -> Self {
        Self::named(SCRIPT_NAME, 0)
    }

    pub fn named(name: impl Into<String>, arity: usize) -> Self {
        Self {
            arity,
            chunk: Chunk::new(),
            name: name.into(),
        }
    }

    /// Wraps an already compiled chunk as the top-level script.
    pub fn script(chunk: Chunk) -> Self {
        Self {
            arity: 0,
            chunk,
            name: SCRIPT_NAME.to_string(),
        }
    }

    pub fn is_script(&self) -> bool {
        self.name == SCRIPT_NAME
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_script() {
            write!(f, "{}", SCRIPT_NAME)
        } else {
            write!(f, "<fn {}>", self.name)
        }
    }
}
