// src/vm/opcode.rs

/// The instruction set. Discriminants are the on-the-wire byte values.
///
/// Operand layout is fixed per opcode and not recorded in the stream; see [`OpCode::len`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Pops a value and returns it from the current call.
    OpReturn = 0,
    /// Pushes a constant. Operand: 1-byte index into the constant pool.
    OpConstant = 1,
    OpNegate = 2,
    OpAdd = 3,
    OpSubtract = 4,
    OpMultiply = 5,
    OpDivide = 6,
    OpNil = 7,
    OpTrue = 8,
    OpFalse = 9,
    OpNot = 10,
    OpEqual = 11,
    OpGreater = 12,
    OpLess = 13,
    OpPrint = 14,
    OpPop = 15,

    // --- Variables ---
    /// Operand: 1-byte constant index of the variable name.
    OpDefineGlobal = 16,
    OpSetGlobal = 17,
    OpGetGlobal = 18,
    /// Operand: 1-byte slot relative to the frame base.
    OpGetLocal = 19,
    OpSetLocal = 20,

    // --- Jumps ---
    /// Operand: 2-byte big-endian forward distance.
    OpJump = 21,
    /// Like `OpJump` but only when the top of the stack is falsey. Does not pop.
    OpJumpIfFalse = 22,
    /// Operand: 2-byte big-endian backward distance.
    OpLoop = 23,

    /// Operand: 1-byte argument count.
    OpCall = 24,
}

#[allow(clippy::len_without_is_empty)]
impl OpCode {
    /// Total instruction length in bytes, opcode included.
    pub fn len(self) -> usize {
        match self {
            OpCode::OpConstant
            | OpCode::OpDefineGlobal
            | OpCode::OpSetGlobal
            | OpCode::OpGetGlobal
            | OpCode::OpGetLocal
            | OpCode::OpSetLocal
            | OpCode::OpCall => 2,
            OpCode::OpJump | OpCode::OpJumpIfFalse | OpCode::OpLoop => 3,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::OpReturn => "OP_RETURN",
            OpCode::OpConstant => "OP_CONSTANT",
            OpCode::OpNegate => "OP_NEGATE",
            OpCode::OpAdd => "OP_ADD",
            OpCode::OpSubtract => "OP_SUB",
            OpCode::OpMultiply => "OP_MUL",
            OpCode::OpDivide => "OP_DIV",
            OpCode::OpNil => "OP_NIL",
            OpCode::OpTrue => "OP_TRUE",
            OpCode::OpFalse => "OP_FALSE",
            OpCode::OpNot => "OP_NOT",
            OpCode::OpEqual => "OP_EQUAL",
            OpCode::OpGreater => "OP_GREATER",
            OpCode::OpLess => "OP_LESS",
            OpCode::OpPrint => "OP_PRINT",
            OpCode::OpPop => "OP_POP",
            OpCode::OpDefineGlobal => "OP_DEFINE_GLOBAL",
            OpCode::OpSetGlobal => "OP_SET_GLOBAL",
            OpCode::OpGetGlobal => "OP_GET_GLOBAL",
            OpCode::OpGetLocal => "OP_GET_LOCAL",
            OpCode::OpSetLocal => "OP_SET_LOCAL",
            OpCode::OpJump => "OP_JUMP",
            OpCode::OpJumpIfFalse => "OP_JUMP_IF_FALSE",
            OpCode::OpLoop => "OP_LOOP",
            OpCode::OpCall => "OP_CALL",
        }
    }
}

// Decoding is checked: a byte outside the instruction set is an error, not UB.
impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let op = match byte {
            0 => OpCode::OpReturn,
            1 => OpCode::OpConstant,
            2 => OpCode::OpNegate,
            3 => OpCode::OpAdd,
            4 => OpCode::OpSubtract,
            5 => OpCode::OpMultiply,
            6 => OpCode::OpDivide,
            7 => OpCode::OpNil,
            8 => OpCode::OpTrue,
            9 => OpCode::OpFalse,
            10 => OpCode::OpNot,
            11 => OpCode::OpEqual,
            12 => OpCode::OpGreater,
            13 => OpCode::OpLess,
            14 => OpCode::OpPrint,
            15 => OpCode::OpPop,
            16 => OpCode::OpDefineGlobal,
            17 => OpCode::OpSetGlobal,
            18 => OpCode::OpGetGlobal,
            19 => OpCode::OpGetLocal,
            20 => OpCode::OpSetLocal,
            21 => OpCode::OpJump,
            22 => OpCode::OpJumpIfFalse,
            23 => OpCode::OpLoop,
            24 => OpCode::OpCall,
            other => return Err(other),
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_round_trip_covers_instruction_set() {
        for byte in 0..=24u8 {
            let op = OpCode::try_from(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert_eq!(OpCode::try_from(25), Err(25));
        assert_eq!(OpCode::try_from(0xff), Err(0xff));
    }

    #[test]
    fn test_instruction_lengths() {
        assert_eq!(OpCode::OpAdd.len(), 1);
        assert_eq!(OpCode::OpReturn.len(), 1);
        assert_eq!(OpCode::OpConstant.len(), 2);
        assert_eq!(OpCode::OpGetLocal.len(), 2);
        assert_eq!(OpCode::OpCall.len(), 2);
        assert_eq!(OpCode::OpJumpIfFalse.len(), 3);
        assert_eq!(OpCode::OpLoop.len(), 3);
    }
}
