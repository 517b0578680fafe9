// src/vm/vm.rs

use std::collections::HashMap;
use std::io::{self, Stdout, Write};
use std::rc::Rc;

use log::{debug, log_enabled, trace, Level};
use paste::paste;

use crate::config::VmConfig;
use crate::error::{InterpretError, Status};
use crate::value::{Object, Value};
use crate::vm::chunk::Chunk;
use crate::vm::debug::disassemble_instruction;
use crate::vm::function::Function;
use crate::vm::opcode::OpCode;

/// One active function invocation.
#[derive(Debug)]
pub struct CallFrame {
    pub function: Rc<Function>,
    pub ip: usize,
    // Stack index of slot 0, which holds the running function itself.
    pub base: usize,
}

// Generates the numeric binary handlers. Each pops two floats and pushes `Value::$result(a op b)`.
macro_rules! numeric_binary_ops {
    ($($name:ident => $result:ident($op:tt)),* $(,)?) => {
        paste! {
            $(
                fn [<binary_ $name>](&mut self) -> Result<(), Status> {
                    let (a, b) = self.pop_numbers()?;
                    self.push(Value::$result(a $op b))
                }
            )*
        }
    };
}

/// The Virtual Machine struct.
pub struct VM<W: Write = Stdout> {
    config: VmConfig,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: HashMap<Rc<str>, Value>,
    out: W,
}

impl VM<Stdout> {
    pub fn new(config: VmConfig) -> Self {
        VM::with_output(config, io::stdout())
    }
}

impl<W: Write> VM<W> {
    /// A VM whose `print` statements write to `out`.
    pub fn with_output(config: VmConfig, out: W) -> Self {
        VM {
            stack: Vec::with_capacity(config.stack_size.min(1024)),
            frames: Vec::with_capacity(config.max_frames.min(64)),
            globals: HashMap::new(),
            config,
            out,
        }
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs a compiled top-level chunk to completion.
    ///
    /// Execution stops at the first runtime error. The stack and call frames are then
    /// cleared so the VM can be reused, while globals survive across calls.
    pub fn interpret(&mut self, chunk: Chunk) -> Result<Value, InterpretError> {
        self.reset();
        let function = Rc::new(Function::script(chunk));
        self.push(Value::Object(Object::Function(Rc::clone(&function))))
            .map_err(|status| InterpretError::Runtime { status, line: 0 })?;
        self.frames.push(CallFrame {
            function,
            ip: 0,
            base: 0,
        });
        self.run()
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
    }

    /// The main execution loop.
    fn run(&mut self) -> Result<Value, InterpretError> {
        loop {
            let frame_index = self.frames.len().saturating_sub(1);
            let start = self.frames.last().map_or(0, |frame| frame.ip);
            match self.step() {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => {}
                Err(status) => {
                    let line = self
                        .frames
                        .get(frame_index)
                        .map_or(0, |frame| frame.function.chunk.line_at(start));
                    debug!("runtime failure at line {}: {}", line, status);
                    self.reset();
                    return Err(InterpretError::Runtime { status, line });
                }
            }
        }
    }

    /// Executes one instruction. Returns the script's result once the outermost frame returns.
    fn step(&mut self) -> Result<Option<Value>, Status> {
        if log_enabled!(Level::Trace) {
            self.trace_instruction();
        }

        let op = self.read_op()?;
        match op {
            OpCode::OpConstant => {
                let constant = self.read_constant()?;
                self.push(constant)?;
            }
            OpCode::OpNil => self.push(Value::Nil)?,
            OpCode::OpTrue => self.push(Value::Bool(true))?,
            OpCode::OpFalse => self.push(Value::Bool(false))?,
            OpCode::OpPop => {
                self.pop()?;
            }

            OpCode::OpNegate => {
                let Value::Float(n) = self.pop()? else {
                    return Err(Status::runtime("Operand must be a number."));
                };
                self.push(Value::Float(-n))?;
            }
            OpCode::OpNot => {
                let value = self.pop()?;
                self.push(Value::Bool(value.is_falsey()))?;
            }
            OpCode::OpAdd => self.binary_add()?,
            OpCode::OpSubtract => self.binary_subtract()?,
            OpCode::OpMultiply => self.binary_multiply()?,
            OpCode::OpDivide => self.binary_divide()?,
            OpCode::OpGreater => self.binary_greater()?,
            OpCode::OpLess => self.binary_less()?,
            OpCode::OpEqual => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a == b))?;
            }

            OpCode::OpPrint => {
                let value = self.pop()?;
                writeln!(self.out, "{}", value)
                    .map_err(|e| Status::runtime(format!("Failed to write output: {}", e)))?;
            }

            OpCode::OpDefineGlobal => {
                let name = self.read_name()?;
                let value = self.pop()?;
                self.globals.insert(name, value);
            }
            OpCode::OpGetGlobal => {
                let name = self.read_name()?;
                let Some(value) = self.globals.get(&name).cloned() else {
                    return Err(Status::runtime(format!("Undefined variable '{}'.", name)));
                };
                self.push(value)?;
            }
            OpCode::OpSetGlobal => {
                let name = self.read_name()?;
                // Assignment is an expression: the value stays on the stack.
                let value = self.peek(0)?.clone();
                match self.globals.get_mut(&name) {
                    Some(slot) => *slot = value,
                    None => return Err(Status::runtime(format!("Undefined variable '{}'.", name))),
                }
            }
            OpCode::OpGetLocal => {
                let index = self.local_index()?;
                let value = self.stack[index].clone();
                self.push(value)?;
            }
            OpCode::OpSetLocal => {
                let index = self.local_index()?;
                let value = self.peek(0)?.clone();
                self.stack[index] = value;
            }

            OpCode::OpJump => {
                let distance = self.read_u16()?;
                self.frame_mut()?.ip += distance as usize;
            }
            OpCode::OpJumpIfFalse => {
                let distance = self.read_u16()?;
                if self.peek(0)?.is_falsey() {
                    self.frame_mut()?.ip += distance as usize;
                }
            }
            OpCode::OpLoop => {
                let distance = self.read_u16()?;
                let frame = self.frame_mut()?;
                frame.ip = frame
                    .ip
                    .checked_sub(distance as usize)
                    .ok_or_else(|| Status::internal("Loop target before start of chunk."))?;
            }

            OpCode::OpCall => {
                let arg_count = self.read_byte()?;
                self.call_value(arg_count as usize)?;
            }
            OpCode::OpReturn => {
                let result = self.pop()?;
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| Status::internal("No active call frame."))?;
                // Discard the callee, its arguments and its locals.
                self.stack.truncate(frame.base);
                if self.frames.is_empty() {
                    return Ok(Some(result));
                }
                debug!("return from {} to depth {}", frame.function, self.frames.len());
                self.push(result)?;
            }
        }
        Ok(None)
    }

    // --- Calls ---

    fn call_value(&mut self, arg_count: usize) -> Result<(), Status> {
        let callee_index = self
            .stack
            .len()
            .checked_sub(arg_count + 1)
            .ok_or_else(|| Status::internal("Stack underflow."))?;
        let Some(function) = self.stack[callee_index].as_function().cloned() else {
            return Err(Status::runtime("Can only call functions."));
        };
        if function.arity != arg_count {
            return Err(Status::runtime(format!(
                "Expected {} arguments but got {}.",
                function.arity, arg_count
            )));
        }
        if self.frames.len() >= self.config.max_frames {
            return Err(Status::runtime("Stack overflow."));
        }
        debug!("call {} at depth {}", function, self.frames.len() + 1);
        self.frames.push(CallFrame {
            function,
            ip: 0,
            base: callee_index,
        });
        Ok(())
    }

    // --- Arithmetic ---

    fn binary_add(&mut self) -> Result<(), Status> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (&a, &b) {
            (Value::Float(a), Value::Float(b)) => self.push(Value::Float(a + b)),
            (Value::Object(Object::String(a)), Value::Object(Object::String(b))) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                self.push(Value::string(joined))
            }
            _ => Err(Status::runtime("Operands must be two numbers or two strings.")),
        }
    }

    numeric_binary_ops! {
        subtract => Float(-),
        multiply => Float(*),
        divide => Float(/),
        greater => Bool(>),
        less => Bool(<),
    }

    fn pop_numbers(&mut self) -> Result<(f64, f64), Status> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a, b) {
            (Value::Float(a), Value::Float(b)) => Ok((a, b)),
            _ => Err(Status::runtime("Operands must be numbers.")),
        }
    }

    // --- Stack and Frame Helpers ---

    fn push(&mut self, value: Value) -> Result<(), Status> {
        if self.stack.len() >= self.config.stack_size {
            return Err(Status::runtime("Stack overflow."));
        }
        self.stack.push(value);
        Ok(())
    }

    // Helper to pop from the stack, returning an internal error on underflow.
    fn pop(&mut self) -> Result<Value, Status> {
        self.stack
            .pop()
            .ok_or_else(|| Status::internal("Stack underflow."))
    }

    fn peek(&self, distance: usize) -> Result<&Value, Status> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|index| self.stack.get(index))
            .ok_or_else(|| Status::internal("Stack underflow."))
    }

    fn frame(&self) -> Result<&CallFrame, Status> {
        self.frames
            .last()
            .ok_or_else(|| Status::internal("No active call frame."))
    }

    fn frame_mut(&mut self) -> Result<&mut CallFrame, Status> {
        self.frames
            .last_mut()
            .ok_or_else(|| Status::internal("No active call frame."))
    }

    fn read_byte(&mut self) -> Result<u8, Status> {
        let frame = self.frame_mut()?;
        let byte = frame
            .function
            .chunk
            .code
            .get(frame.ip)
            .copied()
            .ok_or_else(|| Status::internal("Instruction pointer out of bounds."))?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, Status> {
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn read_op(&mut self) -> Result<OpCode, Status> {
        let byte = self.read_byte()?;
        OpCode::try_from(byte).map_err(|unknown| Status::internal(format!("Unknown opcode {}.", unknown)))
    }

    fn read_constant(&mut self) -> Result<Value, Status> {
        let index = self.read_byte()? as usize;
        self.frame()?
            .function
            .chunk
            .constants
            .get(index)
            .cloned()
            .ok_or_else(|| Status::internal(format!("Constant index {} out of range.", index)))
    }

    fn read_name(&mut self) -> Result<Rc<str>, Status> {
        match self.read_constant()? {
            Value::Object(Object::String(name)) => Ok(name),
            other => Err(Status::internal(format!(
                "Expected a variable name constant, found {}.",
                other.type_name()
            ))),
        }
    }

    fn local_index(&mut self) -> Result<usize, Status> {
        let slot = self.read_byte()? as usize;
        let index = self.frame()?.base + slot;
        if index >= self.stack.len() {
            return Err(Status::internal(format!("Local slot {} out of range.", slot)));
        }
        Ok(index)
    }

    fn trace_instruction(&self) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let stack: String = self.stack.iter().map(|value| format!("[ {} ]", value)).collect();
        let (instruction, _) = disassemble_instruction(&frame.function.chunk, frame.ip);
        trace!("          {}", stack);
        trace!("{}", instruction);
    }
}
