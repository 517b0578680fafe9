#[cfg(test)]
mod vm_tests {
    use crate::config::VmConfig;
    use crate::error::{ErrorCode, InterpretError, Status};
    use crate::value::Value;
    use crate::vm::{compile, Chunk, OpCode, VM};

    fn new_vm() -> VM<Vec<u8>> {
        VM::with_output(VmConfig::default(), Vec::new())
    }

    // Helper to compile and run source, then assert on what it printed.
    fn test_source(source: &str, expected: &str) {
        let mut vm = new_vm();
        vm.interpret(compile(source).unwrap()).unwrap();
        assert_eq!(String::from_utf8(vm.into_output()).unwrap(), expected);
    }

    fn runtime_status(vm: &mut VM<Vec<u8>>, chunk: Chunk) -> (Status, u32) {
        match vm.interpret(chunk).unwrap_err() {
            InterpretError::Runtime { status, line } => (status, line),
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_vm_simple_expressions() {
        test_source("print 1;", "1.000000\n");
        test_source("print -(1 + 2) * 3;", "-9.000000\n");
        test_source("print 10 / 4;", "2.500000\n");
        test_source("print 1 / 0;", "inf\n");
    }

    #[test]
    fn test_vm_globals() {
        test_source("var x = 10; var y = 20; print x + y;", "30.000000\n");
        test_source("var x = 1; var x = 2; print x;", "2.000000\n");
        test_source("var x; print x;", "nil\n");
    }

    #[test]
    fn test_vm_conditionals() {
        test_source("if (1) print 10; else print 20;", "10.000000\n");
        test_source("if (nil) print 10; else print 20;", "20.000000\n");
        test_source("if (0) print \"zero is truthy\";", "zero is truthy\n");
    }

    #[test]
    fn test_hand_assembled_chunk() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Value::Float(1.2)).unwrap();
        let b = chunk.add_constant(Value::Float(3.4)).unwrap();
        chunk.write_opcode(OpCode::OpConstant, 1);
        chunk.write(a);
        chunk.write_opcode(OpCode::OpConstant, 1);
        chunk.write(b);
        chunk.write_opcode(OpCode::OpAdd, 1);
        chunk.write_opcode(OpCode::OpReturn, 1);

        let mut vm = new_vm();
        let result = vm.interpret(chunk).unwrap();
        assert_eq!(result.as_float(), Some(1.2 + 3.4));
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn test_unknown_opcode_is_internal() {
        let mut chunk = Chunk::new();
        chunk.code.push(0xee);
        let (status, _) = runtime_status(&mut new_vm(), chunk);
        assert_eq!(status.code, ErrorCode::Internal);
        assert_eq!(status.message, "Unknown opcode 238.");
    }

    #[test]
    fn test_stack_underflow_is_internal() {
        let mut chunk = Chunk::new();
        // The first pop removes the script from slot 0.
        chunk.write_opcode(OpCode::OpPop, 7);
        chunk.write_opcode(OpCode::OpPop, 7);
        let (status, line) = runtime_status(&mut new_vm(), chunk);
        assert_eq!(status, Status::internal("Stack underflow."));
        assert_eq!(line, 7);
    }

    #[test]
    fn test_bad_constant_index_is_internal() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(OpCode::OpConstant, 1);
        chunk.write(3);
        let (status, _) = runtime_status(&mut new_vm(), chunk);
        assert_eq!(status.code, ErrorCode::Internal);
    }

    #[test]
    fn test_running_off_the_end_is_internal() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(OpCode::OpNil, 1);
        let (status, _) = runtime_status(&mut new_vm(), chunk);
        assert_eq!(status, Status::internal("Instruction pointer out of bounds."));
    }

    #[test]
    fn test_runtime_error_reports_line() {
        let mut vm = new_vm();
        let chunk = compile("var a = 1;\nvar b = \"x\";\nprint a - b;").unwrap();
        let (status, line) = runtime_status(&mut vm, chunk);
        assert_eq!(status, Status::runtime("Operands must be numbers."));
        assert_eq!(line, 3);
    }

    #[test]
    fn test_error_resets_stack_but_keeps_globals() {
        let mut vm = new_vm();
        vm.interpret(compile("var kept = 41;").unwrap()).unwrap();
        assert!(vm.interpret(compile("{ var a = 1; print a + nil; }").unwrap()).is_err());
        assert_eq!(vm.stack_len(), 0);
        assert_eq!(vm.frame_count(), 0);

        vm.interpret(compile("kept = kept + 1; print kept;").unwrap()).unwrap();
        assert_eq!(vm.global("kept"), Some(&Value::Float(42.0)));
        assert_eq!(String::from_utf8(vm.into_output()).unwrap(), "42.000000\n");
    }

    #[test]
    fn test_output_before_error_is_kept() {
        let mut vm = new_vm();
        assert!(vm.interpret(compile("print 1; print -\"s\"; print 2;").unwrap()).is_err());
        assert_eq!(vm.output().as_slice(), b"1.000000\n");
    }

    #[test]
    fn test_stack_size_limit() {
        let config = VmConfig::new().with_stack_size(4);
        let mut vm = VM::with_output(config, Vec::new());
        let chunk = compile("{ var a = 1; var b = 2; var c = 3; var d = 4; var e = 5; }").unwrap();
        let (status, _) = runtime_status(&mut vm, chunk);
        assert_eq!(status, Status::runtime("Stack overflow."));
    }

    #[test]
    fn test_slot_zero_holds_the_script() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(OpCode::OpGetLocal, 1);
        chunk.write(0);
        chunk.write_opcode(OpCode::OpReturn, 1);
        let result = new_vm().interpret(chunk).unwrap();
        assert_eq!(result.as_function().map(|f| f.is_script()), Some(true));
    }

    #[test]
    fn test_block_function_recursion() {
        test_source(
            "{ fun count(n) { if (n < 1) return 0; return count(n - 1) + 1; } print count(4); }",
            "4.000000\n",
        );
    }

    #[test]
    fn test_frame_limit() {
        let config = VmConfig::new().with_max_frames(8);
        let mut vm = VM::with_output(config, Vec::new());
        let source = "fun depth(n) { if (n == 0) return 0; return depth(n - 1); }";

        vm.interpret(compile(&format!("{} print depth(6);", source)).unwrap()).unwrap();
        let chunk = compile(&format!("{} print depth(7);", source)).unwrap();
        let (status, _) = runtime_status(&mut vm, chunk);
        assert_eq!(status, Status::runtime("Stack overflow."));
    }
}
