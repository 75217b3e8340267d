use thiserror::Error;

use crate::bytecode::op::{Opcode, read_operands};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("stack-check error at {offset:04}: {message}")]
pub struct StackCheckError {
    pub message: String,
    pub offset: usize,
}

impl StackCheckError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Returns (pops, pushes) for an opcode.
fn effect(op: Opcode) -> (usize, usize) {
    use Opcode::*;
    match op {
        Constant | True | False | Null | GetGlobal => (0, 1),
        Pop | SetGlobal => (1, 0),

        Add | Sub | Mul | Div | Pow => (2, 1),
        Equal | NotEqual | GreaterThan => (2, 1),
        Minus | Bang => (1, 1),

        Jump => (0, 0),
        JumpNotTruthy => (1, 0),
    }
}

/// Scans `ins` once from the start and tracks the stack height.
///
/// Jumps are not followed: both arms of a conditional are counted as if they
/// ran one after the other, which overestimates the height at the join but
/// never reports a false underflow for compiler output.
pub fn check_instructions(ins: &[u8]) -> Result<(), StackCheckError> {
    let mut height: usize = 0;
    let mut ip = 0;

    while ip < ins.len() {
        let op = Opcode::try_from(ins[ip]).map_err(|e| StackCheckError::new(e.to_string(), ip))?;
        let def = op.definition();

        let (operands, read) = read_operands(def, &ins[ip + 1..]);
        if operands.len() != def.operand_widths.len() {
            return Err(StackCheckError::new(
                format!("truncated operand for {}", def.name),
                ip,
            ));
        }

        let (pops, pushes) = effect(op);
        height = height.checked_sub(pops).ok_or_else(|| {
            StackCheckError::new(
                format!(
                    "stack underflow in {}, needed {} items, had {}",
                    def.name, pops, height
                ),
                ip,
            )
        })?;
        height += pushes;

        ip += 1 + read;
    }

    log::debug!("stack check passed, {} bytes, final height {}", ins.len(), height);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::make;

    fn concat(parts: Vec<Vec<u8>>) -> Vec<u8> {
        parts.into_iter().flatten().collect()
    }

    #[test]
    fn test_simple_ops() {
        let ins = concat(vec![
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::Pop, &[]),
        ]);
        assert!(check_instructions(&ins).is_ok());
    }

    #[test]
    fn test_empty_is_ok() {
        assert!(check_instructions(&[]).is_ok());
    }

    #[test]
    fn test_underflow() {
        let ins = concat(vec![make(Opcode::Constant, &[0]), make(Opcode::Add, &[])]);
        let err = check_instructions(&ins).unwrap_err();
        assert!(err.message.contains("underflow"));
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_jump_not_truthy_pops_one() {
        let ins = make(Opcode::JumpNotTruthy, &[3]);
        assert!(check_instructions(&ins).is_err());

        let ins = concat(vec![make(Opcode::True, &[]), make(Opcode::JumpNotTruthy, &[4])]);
        assert!(check_instructions(&ins).is_ok());
    }

    #[test]
    fn test_if_else_pattern() {
        let ins = concat(vec![
            make(Opcode::True, &[]),
            make(Opcode::JumpNotTruthy, &[10]),
            make(Opcode::Constant, &[0]),
            make(Opcode::Jump, &[11]),
            make(Opcode::Null, &[]),
            make(Opcode::Pop, &[]),
        ]);
        assert!(check_instructions(&ins).is_ok());
    }

    #[test]
    fn test_set_global_needs_a_value() {
        let ins = make(Opcode::SetGlobal, &[0]);
        assert!(check_instructions(&ins).is_err());
    }

    #[test]
    fn test_unknown_opcode() {
        let err = check_instructions(&[Opcode::True.as_byte(), 200]).unwrap_err();
        assert_eq!(err.offset, 1);
        assert!(err.message.contains("undefined"));
    }

    #[test]
    fn test_truncated_operand() {
        let err = check_instructions(&[Opcode::Constant.as_byte(), 0]).unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.message.contains("truncated"));
    }
}
