use thiserror::Error;

use crate::bytecode::stack_check::StackCheckError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("runtime error: type mismatch: {left} {op} {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// An operator applied to a single operand of the wrong type.
    #[error("runtime error: unknown operator: {op}{operand}")]
    UnknownOperator {
        op: &'static str,
        operand: &'static str,
    },

    #[error("runtime error: division by zero")]
    DivisionByZero,

    #[error("runtime error: integer overflow in {0}")]
    IntegerOverflow(&'static str),

    /// Float arithmetic that would yield infinity or NaN.
    #[error("runtime error: {0} produced a non-finite result")]
    NonFinite(&'static str),

    #[error("runtime error: stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    #[error("runtime error: stack underflow at {ip:04}")]
    StackUnderflow { ip: usize },

    #[error("runtime error: unknown opcode {byte} at {ip:04}")]
    UnknownOpcode { byte: u8, ip: usize },

    #[error("runtime error: truncated {name} at {ip:04}")]
    TruncatedInstruction { name: &'static str, ip: usize },

    #[error("runtime error: constant {index} out of range (pool has {len})")]
    ConstantOutOfRange { index: usize, len: usize },

    #[error("runtime error: execution step limit exceeded ({0})")]
    StepLimitExceeded(usize),

    /// Static verification rejected the program before it ran.
    #[error("runtime error: {0}")]
    StackCheck(#[from] StackCheckError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = RuntimeError::TypeMismatch {
            op: "+",
            left: "INTEGER",
            right: "BOOLEAN",
        };
        assert_eq!(e.to_string(), "runtime error: type mismatch: INTEGER + BOOLEAN");

        let e = RuntimeError::UnknownOperator {
            op: "-",
            operand: "BOOLEAN",
        };
        assert_eq!(e.to_string(), "runtime error: unknown operator: -BOOLEAN");

        assert_eq!(
            RuntimeError::UnknownOpcode { byte: 99, ip: 4 }.to_string(),
            "runtime error: unknown opcode 99 at 0004"
        );
    }
}
