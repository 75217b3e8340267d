use rustyline::{DefaultEditor, error::ReadlineError};
use thiserror::Error;

use crate::bytecode::Bytecode;
use crate::bytecode::compile::Compiler;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::symbol_table::SymbolTable;
use crate::frontend::parser::Parser;
use crate::frontend::parser_error::ParserError;
use crate::lang::ast::Program;
use crate::lang::value::Value;
use crate::runtime::runtime_error::RuntimeError;
use crate::runtime::vm::{Vm, VmConfig};

pub const PROMPT: &str = ">> ";

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{}", render_parse_errors(.0))]
    Parse(Vec<ParserError>),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// One tab-indented error per line.
fn render_parse_errors(errors: &[ParserError]) -> String {
    errors
        .iter()
        .map(|e| format!("\t{}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Interpreter state that outlives a single line: global names, the constant
/// pool they were compiled against, and the globals store.
#[derive(Default)]
pub struct Session {
    symbols: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,
    config: VmConfig,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Runs one chunk of source. Yields the value of the last expression
    /// statement, or `None` when the chunk ends in anything else.
    pub fn eval(&mut self, source: &str) -> Result<Option<Value>, EvalError> {
        let program = Parser::from_source(source)
            .parse()
            .map_err(EvalError::Parse)?;
        self.eval_program(&program)
    }

    pub fn eval_program(&mut self, program: &Program) -> Result<Option<Value>, EvalError> {
        let bytecode = self.compile(program)?;
        let value = self.execute(bytecode)?;
        Ok(program.ends_in_expression().then_some(value))
    }

    /// Compiles against the session's names and constants. State is only
    /// committed when compilation succeeds.
    pub fn compile(&mut self, program: &Program) -> Result<Bytecode, CompileError> {
        let mut compiler = Compiler::with_state(self.symbols.clone(), self.constants.clone());
        compiler.compile(program)?;

        let (bytecode, symbols) = compiler.finish();
        self.symbols = symbols;
        self.constants = bytecode.constants.clone();
        Ok(bytecode)
    }

    /// Runs bytecode over the session globals and returns the last popped value.
    ///
    /// Globals written before a runtime error are kept.
    pub fn execute(&mut self, bytecode: Bytecode) -> Result<Value, RuntimeError> {
        let globals = std::mem::take(&mut self.globals);
        let mut vm = Vm::with_config(bytecode, self.config.clone()).with_globals(globals);

        let result = vm.run();
        let value = vm.last_popped_stack_elem();
        self.globals = vm.into_globals();

        result.map(|_| value)
    }
}

/// Line-editing loop. Ctrl-D and Ctrl-C end the session cleanly.
pub fn start(config: VmConfig) -> Result<(), ReadlineError> {
    let mut rl = DefaultEditor::new()?;
    let mut session = Session::with_config(config);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    log::warn!("could not record history: {}", e);
                }

                match session.eval(&line) {
                    Ok(Some(value)) => println!("{}", value),
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(()),
            Err(other) => return Err(other),
        }
    }
}
