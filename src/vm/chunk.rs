// src/vm/chunk.rs

use crate::value::Value;
use crate::vm::opcode::OpCode;

/// Constant pool indices are a single byte wide.
pub const MAX_CONSTANTS: usize = 256;

// A chunk of bytecode representing a compiled script or function.
#[derive(Debug, Default, Clone)]
pub struct Chunk {
    // The sequence of bytecode instructions and their operands.
    pub code: Vec<u8>,
    // The pool of constant values used by the code.
    pub constants: Vec<Value>,
    // One source line per instruction, in emission order. Operand bytes have no entry.
    pub lines: Vec<u32>,
    // Byte offset where each instruction starts, parallel to `lines`.
    pub starts: Vec<usize>,
}

impl Chunk {
    // Creates a new, empty chunk.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    // Starts a new instruction and associates it with a source line.
    pub fn write_opcode(&mut self, op: OpCode, line: u32) {
        self.starts.push(self.code.len());
        self.code.push(op as u8);
        self.lines.push(line);
    }

    // Appends an operand byte to the instruction currently being written.
    pub fn write(&mut self, byte: u8) {
        self.code.push(byte);
    }

    // Adds a constant value to the chunk's constant pool.
    // Returns None once the pool is full.
    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return None;
        }
        self.constants.push(value);
        Some((self.constants.len() - 1) as u8)
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)?;
        let lo = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    /// Source line of the instruction that contains byte `offset`.
    pub fn line_at(&self, offset: usize) -> u32 {
        let index = self.starts.partition_point(|&start| start <= offset);
        index
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .or_else(|| self.lines.last())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::opcode::OpCode;

    #[test]
    fn test_write_and_add_constant() {
        let mut chunk = Chunk::new();

        // Add a constant and write the instruction to load it
        let const_idx = chunk.add_constant(Value::Float(1.23)).unwrap();
        chunk.write_opcode(OpCode::OpConstant, 1);
        chunk.write(const_idx);

        // Add another instruction
        chunk.write_opcode(OpCode::OpNegate, 2);

        // Verify the contents
        assert_eq!(chunk.code, vec![OpCode::OpConstant as u8, 0, OpCode::OpNegate as u8]);
        assert_eq!(chunk.constants, vec![Value::Float(1.23)]);
        // Lines are per instruction, not per byte.
        assert_eq!(chunk.lines, vec![1, 2]);
        assert_eq!(chunk.starts, vec![0, 2]);
    }

    #[test]
    fn test_constant_pool_is_capped() {
        let mut chunk = Chunk::new();
        for i in 0..MAX_CONSTANTS {
            assert_eq!(chunk.add_constant(Value::Float(i as f64)), Some(i as u8));
        }
        assert_eq!(chunk.add_constant(Value::Nil), None);
        assert_eq!(chunk.constants.len(), MAX_CONSTANTS);
    }

    #[test]
    fn test_line_at_maps_operands_to_their_instruction() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(OpCode::OpNil, 1);
        chunk.write_opcode(OpCode::OpJump, 2);
        chunk.write(0);
        chunk.write(0);
        chunk.write_opcode(OpCode::OpReturn, 3);

        assert_eq!(chunk.line_at(0), 1);
        assert_eq!(chunk.line_at(1), 2);
        assert_eq!(chunk.line_at(3), 2);
        assert_eq!(chunk.line_at(4), 3);
        // Past the end maps to the last instruction.
        assert_eq!(chunk.line_at(99), 3);
    }

    #[test]
    fn test_line_lookup_on_a_long_chunk() {
        let mut chunk = Chunk::new();
        for line in 1..=1000 {
            chunk.write_opcode(OpCode::OpJump, line);
            chunk.write(0);
            chunk.write(0);
        }
        assert_eq!(chunk.starts.len(), 1000);
        assert_eq!(chunk.starts[999], 2997);
        assert_eq!(chunk.line_at(0), 1);
        assert_eq!(chunk.line_at(1500), 501);
        assert_eq!(chunk.line_at(2999), 1000);
    }

    #[test]
    fn test_line_at_without_instructions() {
        let mut chunk = Chunk::new();
        chunk.code.push(0xee);
        assert_eq!(chunk.line_at(0), 0);
    }

    #[test]
    fn test_read_u16_is_big_endian() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(OpCode::OpJump, 1);
        chunk.write(0x01);
        chunk.write(0x02);
        assert_eq!(chunk.read_u16(1), Some(0x0102));
        assert_eq!(chunk.read_u16(2), None);
    }
}
