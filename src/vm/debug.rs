// src/vm/debug.rs

use std::fmt::Write;

use crate::vm::chunk::Chunk;
use crate::vm::function::Function;
use crate::vm::opcode::OpCode;

/// Renders every instruction of `chunk` under a `== name ==` header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {} ==\n", name);
    let mut offset = 0;
    while offset < chunk.len() {
        let (text, next) = disassemble_instruction(chunk, offset);
        out.push_str(&text);
        out.push('\n');
        offset = next;
    }
    out
}

/// Disassembles a function and, after it, every function found in its constant pool.
pub fn disassemble_function(function: &Function) -> String {
    let mut out = disassemble_chunk(&function.chunk, &function.to_string());
    for constant in &function.chunk.constants {
        if let Some(nested) = constant.as_function() {
            out.push('\n');
            out.push_str(&disassemble_function(nested));
        }
    }
    out
}

/// Renders the instruction at `offset` and returns the offset of the next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut text = format!("{:04} {:>4} ", offset, chunk.line_at(offset));
    let Some(&byte) = chunk.code.get(offset) else {
        text.push_str("<end of chunk>");
        return (text, offset + 1);
    };
    let op = match OpCode::try_from(byte) {
        Ok(op) => op,
        Err(unknown) => {
            let _ = write!(text, "Unknown opcode {}", unknown);
            return (text, offset + 1);
        }
    };

    let name = op.name();
    match op {
        OpCode::OpConstant | OpCode::OpDefineGlobal | OpCode::OpSetGlobal | OpCode::OpGetGlobal => {
            match chunk.code.get(offset + 1) {
                Some(&index) => {
                    let constant = chunk
                        .constants
                        .get(index as usize)
                        .map_or_else(|| "<missing>".to_string(), |c| c.to_string());
                    let _ = write!(text, "{:<16} {:4} '{}'", name, index, constant);
                }
                None => {
                    let _ = write!(text, "{:<16} <truncated>", name);
                }
            }
        }
        OpCode::OpGetLocal | OpCode::OpSetLocal | OpCode::OpCall => match chunk.code.get(offset + 1) {
            Some(&operand) => {
                let _ = write!(text, "{:<16} {:4}", name, operand);
            }
            None => {
                let _ = write!(text, "{:<16} <truncated>", name);
            }
        },
        OpCode::OpJump | OpCode::OpJumpIfFalse | OpCode::OpLoop => match chunk.read_u16(offset + 1) {
            Some(distance) => {
                let next = offset + 3;
                let target = if op == OpCode::OpLoop {
                    next as isize - distance as isize
                } else {
                    (next + distance as usize) as isize
                };
                let _ = write!(text, "{:<16} {:4} -> {}", name, offset, target);
            }
            None => {
                let _ = write!(text, "{:<16} <truncated>", name);
            }
        },
        _ => text.push_str(name),
    }
    (text, offset + op.len())
}
