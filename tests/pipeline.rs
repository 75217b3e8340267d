use kiln::bytecode::Bytecode;
use kiln::bytecode::compile::Compiler;
use kiln::bytecode::disasm::disassemble;
use kiln::frontend::parser::Parser;
use kiln::lang::value::Value;
use kiln::repl::{EvalError, Session};
use kiln::runtime::vm::Vm;

fn eval(source: &str) -> Result<Option<Value>, EvalError> {
    Session::new().eval(source)
}

fn assert_value(source: &str, expected: Value) {
    match eval(source) {
        Ok(Some(value)) => assert_eq!(value, expected, "source: {}", source),
        other => panic!("{:?}: expected {}, got {:?}", source, expected, other),
    }
}

fn assert_error(source: &str, contains: &str) {
    match eval(source) {
        Ok(value) => panic!("{:?}: expected error '{}', got {:?}", source, contains, value),
        Err(e) => assert!(
            e.to_string().contains(contains),
            "expected '{}' in error, got: {}",
            contains,
            e
        ),
    }
}

#[test]
fn test_arithmetic_programs() {
    assert_value("3 + 4", Value::Integer(7));
    assert_value("let x = 10; let y = x * 2; y - x / 5", Value::Integer(18));
    assert_value("2 ** 3 ** 2", Value::Integer(512));
    assert_value("1 + 2.5", Value::Float(3.5));
    assert_value(r#""kiln" + "\t" + "ok""#, Value::String("kiln\tok".into()));
}

#[test]
fn test_conditionals_end_to_end() {
    assert_value("if (1 < 2) { 10 } else { 20 }", Value::Integer(10));
    assert_value("if (1 > 2) { 10 } else { 20 }", Value::Integer(20));
    assert_value("if (1 > 2) { 10 }", Value::Null);
    assert_value(
        "let limit = 5; if (limit > 3) { let big = true; big } else { false }",
        Value::Bool(true),
    );
}

#[test]
fn test_each_stage_reports_its_own_errors() {
    assert_error("let x = ;", "\t1:9: no prefix parse function for ; found");
    assert_error("y + 1", "compile error: undefined variable 'y'");
    assert_error("fn(a) { a }", "compile error: cannot compile function literal");
    assert_error("10 / (5 - 5)", "runtime error: division by zero");
    assert_error("true + 1", "runtime error: type mismatch: BOOLEAN + INTEGER");
    assert_error("let n = 0 ** -1; (n - n) == (n - n)", "runtime error: division by zero");
    assert_error("(0 - 8) ** 0.5", "runtime error: ** produced a non-finite result");
}

#[test]
fn test_illegal_token_blocks_execution() {
    assert!(matches!(eval("1 + @"), Err(EvalError::Parse(_))));
}

#[test]
fn test_repl_style_session() {
    let mut session = Session::new();
    assert_eq!(session.eval("let total = 0;").unwrap(), None);
    assert_eq!(session.eval("let total = total + 5;").unwrap(), None);
    assert!(session.eval("total / 0").is_err());
    assert_eq!(session.eval("total").unwrap(), Some(Value::Integer(5)));
}

#[test]
fn test_image_runs_like_fresh_bytecode() {
    let program = Parser::from_source("let a = 6; a * 7").parse().unwrap();
    let bytecode = Compiler::new().compile_program(&program).unwrap();

    let image = bytecode.to_image().unwrap();
    let loaded = Bytecode::from_image(&image).unwrap();
    assert_eq!(disassemble(&loaded.instructions), disassemble(&bytecode.instructions));

    let mut vm = Vm::new(loaded);
    vm.run().unwrap();
    assert_eq!(vm.last_popped_stack_elem(), Value::Integer(42));
    assert_eq!(vm.globals(), &[Value::Integer(6)]);
}
