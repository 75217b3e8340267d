use thiserror::Error;

// =============================================================================
// OPCODE - one-byte instruction tags
// =============================================================================

/// Instruction tag. Encoded as the first byte of every instruction; operands
/// follow big-endian with the widths given by [`Opcode::definition`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Push `constants[index]`.
    Constant = 0,
    /// Discard top of stack.
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    True,
    False,
    Equal,
    NotEqual,
    /// The only relational opcode; `a < b` is compiled as `b > a`.
    GreaterThan,
    /// Numeric negation.
    Minus,
    /// Logical not over truthiness.
    Bang,
    /// Pop; jump to the absolute target when the value is not truthy.
    JumpNotTruthy,
    /// Jump to the absolute target.
    Jump,
    Null,
    /// Push `globals[slot]`.
    GetGlobal,
    /// Pop into `globals[slot]`.
    SetGlobal,
    Pow,
}

/// Name and operand layout of an opcode.
#[derive(Debug, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Definition {
    /// Encoded size of one instruction: the opcode byte plus all operands.
    pub fn instruction_len(&self) -> usize {
        1 + self.operand_widths.iter().sum::<usize>()
    }
}

macro_rules! def {
    ($name:literal) => {
        &Definition {
            name: $name,
            operand_widths: &[],
        }
    };
    ($name:literal, $($w:literal),+) => {
        &Definition {
            name: $name,
            operand_widths: &[$($w),+],
        }
    };
}

impl Opcode {
    /// Every opcode, in encoding order.
    pub const ALL: [Opcode; 19] = [
        Opcode::Constant,
        Opcode::Pop,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::True,
        Opcode::False,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::GreaterThan,
        Opcode::Minus,
        Opcode::Bang,
        Opcode::JumpNotTruthy,
        Opcode::Jump,
        Opcode::Null,
        Opcode::GetGlobal,
        Opcode::SetGlobal,
        Opcode::Pow,
    ];

    pub fn definition(self) -> &'static Definition {
        match self {
            Opcode::Constant => def!("OpConstant", 2),
            Opcode::Pop => def!("OpPop"),
            Opcode::Add => def!("OpAdd"),
            Opcode::Sub => def!("OpSub"),
            Opcode::Mul => def!("OpMul"),
            Opcode::Div => def!("OpDiv"),
            Opcode::True => def!("OpTrue"),
            Opcode::False => def!("OpFalse"),
            Opcode::Equal => def!("OpEqual"),
            Opcode::NotEqual => def!("OpNotEqual"),
            Opcode::GreaterThan => def!("OpGreaterThan"),
            Opcode::Minus => def!("OpMinus"),
            Opcode::Bang => def!("OpBang"),
            Opcode::JumpNotTruthy => def!("OpJumpNotTruthy", 2),
            Opcode::Jump => def!("OpJump", 2),
            Opcode::Null => def!("OpNull"),
            Opcode::GetGlobal => def!("OpGetGlobal", 2),
            Opcode::SetGlobal => def!("OpSetGlobal", 2),
            Opcode::Pow => def!("OpPow"),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("opcode {0} undefined")]
pub struct UndefinedOpcode(pub u8);

impl TryFrom<u8> for Opcode {
    type Error = UndefinedOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .get(byte as usize)
            .copied()
            .ok_or(UndefinedOpcode(byte))
    }
}

/// Looks up the definition for a raw opcode byte.
pub fn lookup(byte: u8) -> Result<&'static Definition, UndefinedOpcode> {
    Opcode::try_from(byte).map(Opcode::definition)
}

// =============================================================================
// Encoding / decoding
// =============================================================================

/// Encodes one instruction.
///
/// Operands wider than their slot are truncated to the slot width. When the
/// number of operands does not match the definition the result is an empty
/// buffer, which callers treat as an encoding failure.
pub fn make(op: Opcode, operands: &[usize]) -> Vec<u8> {
    let def = op.definition();
    if operands.len() != def.operand_widths.len() {
        return Vec::new();
    }

    let mut instruction = Vec::with_capacity(def.instruction_len());
    instruction.push(op.as_byte());

    for (operand, width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => instruction.extend_from_slice(&(*operand as u16).to_be_bytes()),
            _ => return Vec::new(),
        }
    }

    instruction
}

/// Decodes the operands that follow an opcode byte.
///
/// Returns the operands and the number of bytes read. A truncated buffer
/// yields fewer operands than the definition declares.
pub fn read_operands(def: &Definition, ins: &[u8]) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for width in def.operand_widths {
        let value = match width {
            2 => read_u16(&ins[offset.min(ins.len())..]),
            _ => None,
        };
        match value {
            Some(v) => operands.push(v as usize),
            None => break,
        }
        offset += width;
    }

    (operands, offset)
}

/// Reads a big-endian u16 from the start of `ins`.
pub fn read_u16(ins: &[u8]) -> Option<u16> {
    match ins {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}
