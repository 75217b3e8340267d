use std::collections::HashMap;

use crate::bytecode::op::{Opcode, make};
use crate::bytecode::symbol_table::SymbolTable;
use crate::bytecode::{Bytecode, compile_error::CompileError};
use crate::lang::ast::{BlockStatement, Expression, Program, Statement};
use crate::lang::value::Value;

/// Operand written into a forward jump until its target is known.
const JUMP_PLACEHOLDER: usize = 0xFFFF;

/// Largest index or address a u16 operand can hold, plus one.
pub const MAX_CONSTANTS: usize = u16::MAX as usize + 1;
pub const MAX_GLOBALS: usize = u16::MAX as usize + 1;

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Hashable identity of a literal constant, used for interning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Integer(i64),
    Float(u64),
    String(String),
}

impl ConstantKey {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(ConstantKey::Integer(*n)),
            Value::Float(n) => Some(ConstantKey::Float(n.to_bits())),
            Value::String(s) => Some(ConstantKey::String(s.clone())),
            Value::Bool(_) | Value::Null => None,
        }
    }
}

/// Single-pass AST to bytecode compiler.
///
/// Instructions go into one growable byte buffer and literals into one
/// constant pool. Forward jumps are emitted with a placeholder operand and
/// back-patched once the target offset is known. The first semantic error
/// aborts compilation.
pub struct Compiler {
    instructions: Vec<u8>,
    constants: Vec<Value>,
    interned: HashMap<ConstantKey, usize>,
    symbols: SymbolTable,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_state(SymbolTable::new(), Vec::new())
    }

    /// Continues from an earlier compilation: globals keep their slots and new
    /// constants are appended after the existing ones.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        let mut interned = HashMap::new();
        for (index, constant) in constants.iter().enumerate() {
            if let Some(key) = ConstantKey::of(constant) {
                interned.entry(key).or_insert(index);
            }
        }

        Self {
            instructions: Vec::new(),
            constants,
            interned,
            symbols,
            last: None,
            previous: None,
        }
    }

    /// Compiles a whole program into fresh bytecode.
    pub fn compile_program(mut self, program: &Program) -> Result<Bytecode, CompileError> {
        self.compile(program)?;
        Ok(self.finish().0)
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }

        log::debug!(
            "compiled {} statements into {} bytes, {} constants",
            program.statements.len(),
            self.instructions.len(),
            self.constants.len()
        );
        Ok(())
    }

    /// Hands out the bytecode together with the symbol table it was resolved against.
    pub fn finish(self) -> (Bytecode, SymbolTable) {
        (
            Bytecode::new(self.instructions, self.constants),
            self.symbols,
        )
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        log::trace!("compiling statement `{}`", statement);

        match statement {
            Statement::Expression { expression, .. } => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Pop, &[])?;
            }

            Statement::Let { name, value, .. } => {
                self.compile_expression(value)?;
                let slot = self.symbols.define(&name.value);
                if slot >= MAX_GLOBALS {
                    return Err(CompileError::TooManyGlobals { limit: MAX_GLOBALS });
                }
                self.emit(Opcode::SetGlobal, &[slot])?;
            }

            Statement::Block(block) => self.compile_block(block)?,

            Statement::Return { .. } => {
                return Err(CompileError::unsupported(
                    "return statement",
                    statement.to_string(),
                ));
            }
        }

        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    /// Compiles one arm of an `if` so that it leaves exactly one value.
    ///
    /// A trailing `OpPop` is removed to keep the last expression's value; an
    /// arm that ends without an expression (empty, or a trailing `let`) pushes
    /// `null` instead.
    fn compile_branch(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        let start = self.instructions.len();
        self.compile_block(block)?;

        if self.last_instruction_is(Opcode::Pop, start) {
            self.remove_last_pop();
        } else {
            self.emit(Opcode::Null, &[])?;
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Integer { value, .. } => {
                let index = self.add_constant(Value::Integer(*value))?;
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::Float { value, .. } => {
                let index = self.add_constant(Value::Float(*value))?;
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::String { value, .. } => {
                let index = self.add_constant(Value::String(value.clone()))?;
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::Boolean { value, .. } => {
                let op = if *value { Opcode::True } else { Opcode::False };
                self.emit(op, &[])?;
            }

            Expression::Identifier(ident) => {
                let slot = self
                    .symbols
                    .resolve(&ident.value)
                    .ok_or_else(|| CompileError::UndefinedVariable(ident.value.clone()))?;
                self.emit(Opcode::GetGlobal, &[slot])?;
            }

            Expression::Prefix {
                operator, right, ..
            } => {
                self.compile_expression(right)?;
                let op = match operator.as_str() {
                    "!" => Opcode::Bang,
                    "-" => Opcode::Minus,
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
                self.emit(op, &[])?;
            }

            Expression::Infix {
                left,
                operator,
                right,
                ..
            } => {
                // `a < b` runs as `b > a`
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[])?;
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let op = match operator.as_str() {
                    "+" => Opcode::Add,
                    "-" => Opcode::Sub,
                    "*" => Opcode::Mul,
                    "/" => Opcode::Div,
                    "**" => Opcode::Pow,
                    ">" => Opcode::GreaterThan,
                    "==" => Opcode::Equal,
                    "!=" => Opcode::NotEqual,
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
                self.emit(op, &[])?;
            }

            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => self.compile_if(condition, consequence, alternative.as_ref())?,

            Expression::Function { .. } | Expression::Call { .. } => {
                return Err(CompileError::unsupported(
                    expression.kind_name(),
                    expression.to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Emits:
    ///
    /// ```text
    ///   <condition>
    ///   OpJumpNotTruthy else
    ///   <consequence>
    ///   OpJump end
    /// else:
    ///   <alternative> | OpNull
    /// end:
    /// ```
    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Result<(), CompileError> {
        self.compile_expression(condition)?;
        let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[JUMP_PLACEHOLDER])?;

        self.compile_branch(consequence)?;
        let jump = self.emit(Opcode::Jump, &[JUMP_PLACEHOLDER])?;

        let else_target = self.instructions.len();
        self.patch_jump(jump_not_truthy, else_target)?;

        match alternative {
            Some(alternative) => self.compile_branch(alternative)?,
            None => {
                self.emit(Opcode::Null, &[])?;
            }
        }

        let end_target = self.instructions.len();
        self.patch_jump(jump, end_target)
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn add_constant(&mut self, value: Value) -> Result<usize, CompileError> {
        let key = ConstantKey::of(&value);
        if let Some(index) = key.as_ref().and_then(|k| self.interned.get(k)) {
            return Ok(*index);
        }

        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CompileError::TooManyConstants {
                limit: MAX_CONSTANTS,
            });
        }

        let index = self.constants.len();
        self.constants.push(value);
        if let Some(key) = key {
            self.interned.insert(key, index);
        }
        Ok(index)
    }

    /// Appends one instruction and returns its byte offset.
    fn emit(&mut self, op: Opcode, operands: &[usize]) -> Result<usize, CompileError> {
        let instruction = make(op, operands);
        if instruction.is_empty() {
            return Err(CompileError::Internal(format!(
                "could not encode {} with operands {:?}",
                op.definition().name,
                operands
            )));
        }

        let position = self.instructions.len();
        self.instructions.extend_from_slice(&instruction);

        self.previous = self.last;
        self.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });
        Ok(position)
    }

    /// True when the most recent instruction is `op` and was emitted at or after `since`.
    fn last_instruction_is(&self, op: Opcode, since: usize) -> bool {
        self.last
            .map(|last| last.opcode == op && last.position >= since)
            .unwrap_or(false)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.last {
            self.instructions.truncate(last.position);
            self.last = self.previous;
            self.previous = None;
        }
    }

    /// Overwrites the operand of the jump at `position` with `target`.
    fn patch_jump(&mut self, position: usize, target: usize) -> Result<(), CompileError> {
        if target > u16::MAX as usize {
            return Err(CompileError::ProgramTooLarge {
                limit: u16::MAX as usize,
            });
        }

        let op = self
            .instructions
            .get(position)
            .and_then(|byte| Opcode::try_from(*byte).ok())
            .ok_or_else(|| {
                CompileError::Internal(format!("no instruction to patch at {}", position))
            })?;

        let patched = make(op, &[target]);
        let end = position + patched.len();
        if patched.is_empty() || end > self.instructions.len() {
            return Err(CompileError::Internal(format!(
                "cannot patch {} at {}",
                op.definition().name,
                position
            )));
        }

        self.instructions[position..end].copy_from_slice(&patched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::disasm::disassemble;
    use crate::frontend::parser::Parser;

    fn parse(source: &str) -> Program {
        Parser::from_source(source)
            .parse()
            .unwrap_or_else(|errors| panic!("parse errors for {:?}: {:?}", source, errors))
    }

    fn compile(source: &str) -> Bytecode {
        Compiler::new()
            .compile_program(&parse(source))
            .unwrap_or_else(|e| panic!("compile failed for {:?}: {}", source, e))
    }

    fn compile_err(source: &str) -> CompileError {
        match Compiler::new().compile_program(&parse(source)) {
            Ok(bc) => panic!(
                "expected compile error for {:?}, got:\n{}",
                source,
                disassemble(&bc.instructions)
            ),
            Err(e) => e,
        }
    }

    fn concat(parts: Vec<Vec<u8>>) -> Vec<u8> {
        parts.into_iter().flatten().collect()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|n| Value::Integer(*n)).collect()
    }

    /// Compares through the disassembler so failures are readable.
    fn assert_compiles(source: &str, constants: Vec<Value>, instructions: Vec<Vec<u8>>) {
        let bc = compile(source);
        assert_eq!(
            disassemble(&bc.instructions),
            disassemble(&concat(instructions)),
            "instructions for {:?}",
            source
        );
        assert_eq!(bc.constants, constants, "constants for {:?}", source);
    }

    // =========================================================================
    // Arithmetic and literals
    // =========================================================================

    #[test]
    fn test_integer_arithmetic() {
        assert_compiles(
            "1 + 2",
            ints(&[1, 2]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Add, &[]),
                make(Opcode::Pop, &[]),
            ],
        );

        assert_compiles(
            "1; 2",
            ints(&[1, 2]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Pop, &[]),
            ],
        );

        for (op_text, op) in [
            ("-", Opcode::Sub),
            ("*", Opcode::Mul),
            ("/", Opcode::Div),
            ("**", Opcode::Pow),
        ] {
            assert_compiles(
                &format!("2 {} 1", op_text),
                ints(&[2, 1]),
                vec![
                    make(Opcode::Constant, &[0]),
                    make(Opcode::Constant, &[1]),
                    make(op, &[]),
                    make(Opcode::Pop, &[]),
                ],
            );
        }
    }

    #[test]
    fn test_prefix_minus() {
        assert_compiles(
            "-1",
            ints(&[1]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Minus, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn test_constants_are_interned() {
        assert_compiles(
            "1 + 1; 1",
            ints(&[1]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[0]),
                make(Opcode::Add, &[]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[0]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn test_float_and_int_constants_stay_distinct() {
        let bc = compile("1; 1.0; 1");
        assert_eq!(bc.constants, vec![Value::Integer(1), Value::Float(1.0)]);
    }

    #[test]
    fn test_string_constants() {
        assert_compiles(
            r#""mon" + "key""#,
            vec![Value::String("mon".into()), Value::String("key".into())],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Add, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    // =========================================================================
    // Booleans and comparison
    // =========================================================================

    #[test]
    fn test_boolean_literals_use_no_constants() {
        assert_compiles("true", vec![], vec![make(Opcode::True, &[]), make(Opcode::Pop, &[])]);
        assert_compiles(
            "!false",
            vec![],
            vec![
                make(Opcode::False, &[]),
                make(Opcode::Bang, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn test_comparisons() {
        assert_compiles(
            "1 > 2",
            ints(&[1, 2]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::GreaterThan, &[]),
                make(Opcode::Pop, &[]),
            ],
        );

        assert_compiles(
            "true != false",
            vec![],
            vec![
                make(Opcode::True, &[]),
                make(Opcode::False, &[]),
                make(Opcode::NotEqual, &[]),
                make(Opcode::Pop, &[]),
            ],
        );

        assert_compiles(
            "1 == 2",
            ints(&[1, 2]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Equal, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn test_less_than_swaps_operands() {
        // right operand is compiled first, so 2 gets constant 0
        assert_compiles(
            "1 < 2",
            ints(&[2, 1]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::GreaterThan, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    #[test]
    fn test_if_without_else() {
        assert_compiles(
            "if (true) { 10 }; 3333;",
            ints(&[10, 3333]),
            vec![
                make(Opcode::True, &[]),             // 0000
                make(Opcode::JumpNotTruthy, &[10]),  // 0001
                make(Opcode::Constant, &[0]),        // 0004
                make(Opcode::Jump, &[11]),           // 0007
                make(Opcode::Null, &[]),             // 0010
                make(Opcode::Pop, &[]),              // 0011
                make(Opcode::Constant, &[1]),        // 0012
                make(Opcode::Pop, &[]),              // 0015
            ],
        );
    }

    #[test]
    fn test_if_with_else() {
        assert_compiles(
            "if (true) { 10 } else { 20 }; 3333;",
            ints(&[10, 20, 3333]),
            vec![
                make(Opcode::True, &[]),             // 0000
                make(Opcode::JumpNotTruthy, &[10]),  // 0001
                make(Opcode::Constant, &[0]),        // 0004
                make(Opcode::Jump, &[13]),           // 0007
                make(Opcode::Constant, &[1]),        // 0010
                make(Opcode::Pop, &[]),              // 0013
                make(Opcode::Constant, &[2]),        // 0014
                make(Opcode::Pop, &[]),              // 0017
            ],
        );
    }

    #[test]
    fn test_if_with_empty_consequence_pushes_null() {
        assert_compiles(
            "if (true) { }",
            vec![],
            vec![
                make(Opcode::True, &[]),            // 0000
                make(Opcode::JumpNotTruthy, &[8]),  // 0001
                make(Opcode::Null, &[]),            // 0004
                make(Opcode::Jump, &[9]),           // 0005
                make(Opcode::Null, &[]),            // 0008
                make(Opcode::Pop, &[]),             // 0009
            ],
        );
    }

    #[test]
    fn test_if_branch_ending_in_let_pushes_null() {
        assert_compiles(
            "if (true) { let a = 1; }",
            ints(&[1]),
            vec![
                make(Opcode::True, &[]),             // 0000
                make(Opcode::JumpNotTruthy, &[14]),  // 0001
                make(Opcode::Constant, &[0]),        // 0004
                make(Opcode::SetGlobal, &[0]),       // 0007
                make(Opcode::Null, &[]),             // 0010
                make(Opcode::Jump, &[15]),           // 0011
                make(Opcode::Null, &[]),             // 0014
                make(Opcode::Pop, &[]),              // 0015
            ],
        );
    }

    #[test]
    fn test_branch_keeps_only_last_value() {
        assert_compiles(
            "if (true) { 1; 2 }",
            ints(&[1, 2]),
            vec![
                make(Opcode::True, &[]),             // 0000
                make(Opcode::JumpNotTruthy, &[14]),  // 0001
                make(Opcode::Constant, &[0]),        // 0004
                make(Opcode::Pop, &[]),              // 0007
                make(Opcode::Constant, &[1]),        // 0008
                make(Opcode::Jump, &[15]),           // 0011
                make(Opcode::Null, &[]),             // 0014
                make(Opcode::Pop, &[]),              // 0015
            ],
        );
    }

    #[test]
    fn test_no_placeholder_survives() {
        let bc = compile("if (1 > 2) { if (false) { 1 } } else { 3 }");
        let text = disassemble(&bc.instructions);
        assert!(!text.contains("65535"), "{}", text);
        assert!(!text.contains("ERROR"), "{}", text);
    }

    // =========================================================================
    // Globals
    // =========================================================================

    #[test]
    fn test_global_let_statements() {
        assert_compiles(
            "let one = 1; let two = 2;",
            ints(&[1, 2]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::SetGlobal, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::SetGlobal, &[1]),
            ],
        );

        assert_compiles(
            "let one = 1; let two = one; two;",
            ints(&[1]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::SetGlobal, &[0]),
                make(Opcode::GetGlobal, &[0]),
                make(Opcode::SetGlobal, &[1]),
                make(Opcode::GetGlobal, &[1]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn test_block_statement_compiles_inline() {
        assert_compiles(
            "{ 1; 2 }",
            ints(&[1, 2]),
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn test_with_state_continues_numbering() {
        let mut first = Compiler::new();
        first.compile(&parse("let a = 1;")).unwrap();
        let (bc, symbols) = first.finish();

        let mut second = Compiler::with_state(symbols, bc.constants);
        second.compile(&parse("a + 2 + 1")).unwrap();
        let (bc, _) = second.finish();

        assert_eq!(bc.constants, ints(&[1, 2]));
        assert_eq!(
            disassemble(&bc.instructions),
            disassemble(&concat(vec![
                make(Opcode::GetGlobal, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Add, &[]),
                make(Opcode::Constant, &[0]),
                make(Opcode::Add, &[]),
                make(Opcode::Pop, &[]),
            ]))
        );
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_undefined_variable() {
        assert_eq!(compile_err("x + 1"), CompileError::UndefinedVariable("x".into()));
        assert_eq!(
            compile_err("let x = x;"),
            CompileError::UndefinedVariable("x".into())
        );
    }

    #[test]
    fn test_stops_at_first_error() {
        assert_eq!(compile_err("a; b"), CompileError::UndefinedVariable("a".into()));
    }

    #[test]
    fn test_functions_are_unsupported() {
        assert!(matches!(
            compile_err("fn(x) { x }"),
            CompileError::UnsupportedNode { ref node, .. } if node == "function literal"
        ));
        assert!(matches!(
            compile_err("let f = 1; f(2)"),
            CompileError::UnsupportedNode { ref node, .. } if node == "call expression"
        ));
        assert!(matches!(
            compile_err("return 1;"),
            CompileError::UnsupportedNode { ref node, .. } if node == "return statement"
        ));
    }
}
