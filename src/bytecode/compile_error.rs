use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Reference to a name that was never bound with `let`.
    #[error("compile error: undefined variable '{0}'")]
    UndefinedVariable(String),

    /// A node the bytecode compiler has no translation for
    #[error("compile error: cannot compile {node} '{text}'\n  hint: {hint}")]
    UnsupportedNode {
        node: String,
        text: String,
        hint: String,
    },

    #[error("compile error: unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("compile error: constant pool exceeds {limit} entries")]
    TooManyConstants { limit: usize },

    #[error("compile error: more than {limit} global bindings")]
    TooManyGlobals { limit: usize },

    /// A jump target no longer fits the u16 operand.
    #[error("compile error: program exceeds {limit} bytes of bytecode")]
    ProgramTooLarge { limit: usize },

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("compile error: internal: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn unsupported(node: &str, text: impl Into<String>) -> Self {
        CompileError::UnsupportedNode {
            node: node.to_string(),
            text: text.into(),
            hint: "functions, calls and return are parsed but have no bytecode form".to_string(),
        }
    }
}
