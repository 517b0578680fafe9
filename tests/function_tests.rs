// tests/function_tests.rs

use qian::CompileErrorKind;
use test_utils::*;

#[cfg(test)]
mod call_tests {
    use super::*;

    #[test]
    fn test_call_and_return() {
        assert_eq!(run_ok("fun add(a, b) { return a + b; } print add(2, 3);"), "5.000000\n");
    }

    #[test]
    fn test_implicit_nil_return() {
        assert_eq!(run_ok("fun noop() {} print noop();"), "nil\n");
        assert_eq!(run_ok("fun early() { return; } print early();"), "nil\n");
    }

    #[test]
    fn test_recursion() {
        let source = "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(15);";
        assert_eq!(run_ok(source), "610.000000\n");
    }

    #[test]
    fn test_function_locals_and_loops() {
        let source = "
            fun sum_to(n) {
                var total = 0;
                for (var i = 1; i <= n; i = i + 1) {
                    if (i == 3) continue;
                    total = total + i;
                }
                return total;
            }
            print sum_to(5);";
        assert_eq!(run_ok(source), "12.000000\n");
    }

    #[test]
    fn test_return_from_inside_loop() {
        let source = "
            fun first_over(limit) {
                var i = 0;
                while (true) {
                    var square = i * i;
                    if (square > limit) return i;
                    i = i + 1;
                }
            }
            print first_over(50);";
        assert_eq!(run_ok(source), "8.000000\n");
    }

    #[test]
    fn test_local_function() {
        let source = "{ fun twice(x) { return x * 2; } print twice(twice(3)); }";
        assert_eq!(run_ok(source), "12.000000\n");
    }

    #[test]
    fn test_local_function_recursion() {
        let source = "{ fun f(n) { if (n < 1) return 0; return f(n - 1) + 1; } print f(3); }";
        assert_eq!(run_ok(source), "3.000000\n");
    }

    #[test]
    fn test_call_result_in_expression() {
        let source = "fun one() { return 1; } print one() + one() * 10;";
        assert_eq!(run_ok(source), "11.000000\n");
    }

    #[test]
    fn test_functions_print_by_name() {
        assert_eq!(run_ok("fun greet() {} print greet;"), "<fn greet>\n");
    }

    #[test]
    fn test_function_equality_is_identity() {
        assert_eq!(run_ok("fun f() {} var g = f; print f == g;"), "true\n");
    }

    #[test]
    fn test_functions_see_globals_not_callers_locals() {
        let source = "
            var label = \"global\";
            fun show() { return label; }
            { var label = \"local\"; print show(); }";
        assert_eq!(run_ok(source), "global\n");
    }

    #[test]
    fn test_call_errors() {
        assert_eq!(runtime_error("var x = 1; x();").message, "Can only call functions.");
        assert_eq!(runtime_error("\"str\"(1);").message, "Can only call functions.");
        assert_eq!(
            runtime_error("fun f(a, b) {} f(1);").message,
            "Expected 2 arguments but got 1."
        );
        assert_eq!(
            runtime_error("fun runaway(n) { return runaway(n + 1); } runaway(0);").message,
            "Stack overflow."
        );
    }

    #[test]
    fn test_return_outside_function() {
        assert_eq!(compile_error("return 1;"), CompileErrorKind::ReturnOutsideFunction);
        assert_eq!(
            compile_error("fun f(a, a) {}"),
            CompileErrorKind::Redeclared("a".to_string())
        );
    }
}
