// src/value.rs

use std::fmt;
use std::rc::Rc;

use crate::vm::function::Function;

/// A runtime value. Cheap to clone: heap payloads are reference counted.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Float(f64),
    Object(Object),
}

/// A heap-allocated payload. Strings are immutable once created.
#[derive(Debug, Clone)]
pub enum Object {
    String(Rc<str>),
    Function(Rc<Function>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::Object(Object::String(s.into()))
    }

    pub fn function(function: Function) -> Self {
        Value::Object(Object::Function(Rc::new(function)))
    }

    /// `nil` and `false` are the only falsey values.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Object(Object::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match self {
            Value::Object(Object::Function(f)) => Some(f),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Float(_) => "number",
            Value::Object(Object::String(_)) => "string",
            Value::Object(Object::Function(_)) => "function",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Float(n) => write!(f, "{:.6}", n),
            Value::Object(obj) => write!(f, "{}", obj),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::String(s) => write!(f, "{}", s),
            Object::Function(func) => write!(f, "{}", func),
        }
    }
}
