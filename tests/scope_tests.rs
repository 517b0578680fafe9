// tests/scope_tests.rs

use qian::CompileErrorKind;
use test_utils::*;

#[cfg(test)]
mod global_tests {
    use super::*;

    #[test]
    fn test_define_and_assign() {
        assert_eq!(run_ok("var x = \"a\"; x = \"b\"; print x;"), "b\n");
        assert_eq!(run_ok("var x; print x;"), "nil\n");
    }

    #[test]
    fn test_assignment_is_an_expression() {
        assert_eq!(run_ok("var a; var b; a = b = 3; print a + b;"), "6.000000\n");
        assert_eq!(run_ok("var a = 1; print a = 5;"), "5.000000\n");
    }

    #[test]
    fn test_redefinition_is_allowed() {
        assert_eq!(run_ok("var x = 1; var x = x + 1; print x;"), "2.000000\n");
    }

    #[test]
    fn test_undefined_globals() {
        assert_eq!(runtime_error("print missing;").message, "Undefined variable 'missing'.");
        assert_eq!(runtime_error("missing = 1;").message, "Undefined variable 'missing'.");
    }
}

#[cfg(test)]
mod local_tests {
    use super::*;

    #[test]
    fn test_scope_isolation() {
        assert_eq!(run_ok("{ var a = 1; { var a = 2; } print a; }"), "1.000000\n");
    }

    #[test]
    fn test_shadowing_global() {
        let source = "var a = \"global\"; { var a = \"local\"; print a; } print a;";
        assert_eq!(run_lines(source), vec!["local", "global"]);
    }

    #[test]
    fn test_inner_reads_outer() {
        assert_eq!(run_ok("{ var a = 1; { var b = a + 1; print b; } }"), "2.000000\n");
    }

    #[test]
    fn test_local_assignment() {
        assert_eq!(run_ok("{ var a = 1; a = a + 10; print a; }"), "11.000000\n");
        assert_eq!(run_ok("{ var a; var b = a = 4; print b; }"), "4.000000\n");
    }

    #[test]
    fn test_local_does_not_leak() {
        assert_eq!(runtime_error("{ var hidden = 1; } print hidden;").message, "Undefined variable 'hidden'.");
    }

    #[test]
    fn test_many_locals() {
        let decls: String = (0..200).map(|i| format!("var v{} = {};", i, i)).collect::<Vec<_>>().join(" ");
        let source = format!("{{ {} print v0 + v199; }}", decls);
        assert_eq!(run_ok(&source), "199.000000\n");
    }

    #[test]
    fn test_scope_errors() {
        assert_eq!(
            compile_error("{ var a = 1; var a = 2; }"),
            CompileErrorKind::Redeclared("a".to_string())
        );
        assert_eq!(
            compile_error("{ var a = 1; { var a = a; } }"),
            CompileErrorKind::OwnInitializer("a".to_string())
        );
        assert_eq!(compile_error("a * b = c + d;"), CompileErrorKind::InvalidAssignmentTarget);
        assert_eq!(compile_error("1 = 2;"), CompileErrorKind::InvalidAssignmentTarget);
    }
}
