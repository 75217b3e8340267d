use crate::bytecode::Bytecode;
use crate::bytecode::op::{Opcode, read_u16};
use crate::bytecode::stack_check::check_instructions;
use crate::lang::value::Value;
use crate::runtime::runtime_error::RuntimeError;

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub stack_size: usize,
    pub max_steps: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_size: 2048,
            max_steps: None,
        }
    }
}

/// Stack machine over one [`Bytecode`] program.
///
/// The stack is a fixed block of `stack_size` slots and `sp` points at the
/// next free one. Popping only moves `sp`, so the most recently popped value
/// stays readable at `stack[sp]` until something is pushed over it.
pub struct Vm {
    instructions: Vec<u8>,
    constants: Vec<Value>,
    stack: Vec<Value>,
    sp: usize,
    ip: usize,
    globals: Vec<Value>,
    config: VmConfig,
    steps: usize,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_config(bytecode, VmConfig::default())
    }

    pub fn with_config(bytecode: Bytecode, config: VmConfig) -> Self {
        Self {
            instructions: bytecode.instructions,
            constants: bytecode.constants,
            stack: vec![Value::Null; config.stack_size],
            sp: 0,
            ip: 0,
            globals: Vec::new(),
            config,
            steps: 0,
        }
    }

    /// Starts from globals left behind by an earlier run.
    pub fn with_globals(mut self, globals: Vec<Value>) -> Self {
        self.globals = globals;
        self
    }

    pub fn stack_top(&self) -> Option<&Value> {
        self.sp.checked_sub(1).and_then(|top| self.stack.get(top))
    }

    /// The value most recently removed by `OpPop`; `null` if nothing was popped.
    pub fn last_popped_stack_elem(&self) -> Value {
        self.stack.get(self.sp).cloned().unwrap_or(Value::Null)
    }

    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// Verifies the instruction stream, then executes it to the end.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        check_instructions(&self.instructions)?;

        self.ip = 0;
        self.sp = 0;
        self.steps = 0;

        while self.ip < self.instructions.len() {
            self.check_limits()?;

            let byte = self.instructions[self.ip];
            let op = Opcode::try_from(byte)
                .map_err(|_| RuntimeError::UnknownOpcode { byte, ip: self.ip })?;

            match op {
                Opcode::Constant => {
                    let index = self.read_operand(op)?;
                    let value = self.constants.get(index).cloned().ok_or(
                        RuntimeError::ConstantOutOfRange {
                            index,
                            len: self.constants.len(),
                        },
                    )?;
                    self.push(value)?;
                }

                Opcode::Pop => {
                    self.pop()?;
                }

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Pow => {
                    self.execute_binary(op)?;
                }

                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                Opcode::True => self.push(Value::TRUE)?,
                Opcode::False => self.push(Value::FALSE)?,
                Opcode::Null => self.push(Value::Null)?,

                Opcode::Bang => {
                    let operand = self.pop()?;
                    self.push(Value::from_bool(operand != Value::TRUE))?;
                }

                Opcode::Minus => {
                    let operand = self.pop()?;
                    let result = match operand {
                        Value::Integer(n) => Value::Integer(
                            n.checked_neg().ok_or(RuntimeError::IntegerOverflow("-"))?,
                        ),
                        Value::Float(n) => Value::Float(-n),
                        other => {
                            return Err(RuntimeError::UnknownOperator {
                                op: "-",
                                operand: other.type_name(),
                            });
                        }
                    };
                    self.push(result)?;
                }

                Opcode::Jump => {
                    self.ip = self.read_operand(op)?;
                    continue;
                }

                Opcode::JumpNotTruthy => {
                    let target = self.read_operand(op)?;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.ip = target;
                        continue;
                    }
                }

                Opcode::GetGlobal => {
                    let slot = self.read_operand(op)?;
                    // a slot whose `let` never completed reads as null
                    let value = self.globals.get(slot).cloned().unwrap_or(Value::Null);
                    self.push(value)?;
                }

                Opcode::SetGlobal => {
                    let slot = self.read_operand(op)?;
                    let value = self.pop()?;
                    if slot >= self.globals.len() {
                        self.globals.resize(slot + 1, Value::Null);
                    }
                    self.globals[slot] = value;
                }
            }

            self.ip += op.definition().instruction_len();
        }

        log::debug!(
            "vm finished after {} steps, sp={}, {} globals",
            self.steps,
            self.sp,
            self.globals.len()
        );
        Ok(())
    }

    // =========================================================================
    // Execution helpers
    // =========================================================================

    fn check_limits(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::StepLimitExceeded(max));
            }
        }

        Ok(())
    }

    /// Decodes the u16 operand of the instruction at `ip`.
    fn read_operand(&self, op: Opcode) -> Result<usize, RuntimeError> {
        read_u16(&self.instructions[self.ip + 1..])
            .map(usize::from)
            .ok_or(RuntimeError::TruncatedInstruction {
                name: op.definition().name,
                ip: self.ip,
            })
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .stack
            .get_mut(self.sp)
            .ok_or(RuntimeError::StackOverflow {
                limit: self.config.stack_size,
            })?;
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow { ip: self.ip });
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    fn execute_binary(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => integer_binary(op, *a, *b)?,
            (Value::String(a), Value::String(b)) if op == Opcode::Add => {
                Value::String(format!("{}{}", a, b))
            }
            _ => match (as_number(&left), as_number(&right)) {
                (Some(a), Some(b)) => float_binary(op, a, b)?,
                _ => {
                    return Err(RuntimeError::TypeMismatch {
                        op: operator_symbol(op),
                        left: left.type_name(),
                        right: right.type_name(),
                    });
                }
            },
        };

        self.push(result)
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = if let (Value::Integer(a), Value::Integer(b)) = (&left, &right) {
            compare(op, a, b)
        } else if let (Some(a), Some(b)) = (as_number(&left), as_number(&right)) {
            compare(op, &a, &b)
        } else if op != Opcode::GreaterThan
            && std::mem::discriminant(&left) == std::mem::discriminant(&right)
        {
            (left == right) == (op == Opcode::Equal)
        } else {
            return Err(RuntimeError::TypeMismatch {
                op: operator_symbol(op),
                left: left.type_name(),
                right: right.type_name(),
            });
        };

        self.push(Value::from_bool(result))
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}

fn compare<T: PartialOrd>(op: Opcode, a: &T, b: &T) -> bool {
    match op {
        Opcode::Equal => a == b,
        Opcode::NotEqual => a != b,
        _ => a > b,
    }
}

fn integer_binary(op: Opcode, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let symbol = operator_symbol(op);
    let result = match op {
        Opcode::Add => a.checked_add(b),
        Opcode::Sub => a.checked_sub(b),
        Opcode::Mul => a.checked_mul(b),
        Opcode::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_div(b)
        }
        Opcode::Pow => return integer_pow(a, b),
        _ => {
            return Err(RuntimeError::TypeMismatch {
                op: symbol,
                left: "INTEGER",
                right: "INTEGER",
            });
        }
    };

    result
        .map(Value::Integer)
        .ok_or(RuntimeError::IntegerOverflow(symbol))
}

/// Integer to a non-negative integer power stays an integer; a negative
/// exponent gives a float.
fn integer_pow(base: i64, exp: i64) -> Result<Value, RuntimeError> {
    if exp < 0 {
        return float_binary(Opcode::Pow, base as f64, exp as f64);
    }

    let result = match u32::try_from(exp) {
        Ok(exp) => base.checked_pow(exp),
        // beyond u32 only these bases have a representable result
        Err(_) => match base {
            0 | 1 => Some(base),
            -1 => Some(if exp % 2 == 0 { 1 } else { -1 }),
            _ => None,
        },
    };

    result
        .map(Value::Integer)
        .ok_or(RuntimeError::IntegerOverflow("**"))
}

fn float_binary(op: Opcode, a: f64, b: f64) -> Result<Value, RuntimeError> {
    let result = match op {
        Opcode::Add => a + b,
        Opcode::Sub => a - b,
        Opcode::Mul => a * b,
        Opcode::Div => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a / b
        }
        Opcode::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.powf(b)
        }
        _ => {
            return Err(RuntimeError::TypeMismatch {
                op: operator_symbol(op),
                left: "FLOAT",
                right: "FLOAT",
            });
        }
    };

    if !result.is_finite() {
        return Err(RuntimeError::NonFinite(operator_symbol(op)));
    }
    Ok(Value::Float(result))
}

fn operator_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub | Opcode::Minus => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Pow => "**",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterThan => ">",
        Opcode::Bang => "!",
        other => other.definition().name,
    }
}
