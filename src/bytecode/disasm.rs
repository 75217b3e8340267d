use std::fmt::Write;

use crate::bytecode::Bytecode;
use crate::bytecode::op::{Definition, lookup, read_operands};

/// Renders an instruction stream as `offset name operand…` lines.
///
/// Undefined opcodes and operand-count mismatches produce an inline
/// `ERROR:` line and decoding continues, so a corrupt or partial buffer can
/// still be inspected.
pub fn disassemble(ins: &[u8]) -> String {
    let mut output = String::new();
    let mut ip = 0;

    while ip < ins.len() {
        let def = match lookup(ins[ip]) {
            Ok(def) => def,
            Err(e) => {
                let _ = writeln!(output, "{:04} ERROR: {}", ip, e);
                ip += 1;
                continue;
            }
        };

        let (operands, read) = read_operands(def, &ins[ip + 1..]);
        let _ = writeln!(output, "{:04} {}", ip, format_instruction(def, &operands));
        if operands.len() != def.operand_widths.len() {
            // operands only run short at the end of the buffer
            break;
        }
        ip += 1 + read;
    }

    output
}

fn format_instruction(def: &Definition, operands: &[usize]) -> String {
    let operand_count = def.operand_widths.len();

    if operands.len() != operand_count {
        return format!(
            "ERROR: operand len {} does not match defined {}",
            operands.len(),
            operand_count
        );
    }

    match operands {
        [] => def.name.to_string(),
        [a] => format!("{} {}", def.name, a),
        _ => format!("ERROR: unhandled operand count for {}", def.name),
    }
}

/// Print a bytecode program: constant pool, then instructions.
pub fn print_bc(bc: &Bytecode) {
    println!("════════════════════════════════════════");
    println!(" constants ({})", bc.constants.len());
    println!("════════════════════════════════════════");
    for (i, constant) in bc.constants.iter().enumerate() {
        println!("{:04} {:<8} {}", i, constant.type_name(), constant);
    }
    println!();
    println!("════════════════════════════════════════");
    println!(" instructions ({} bytes)", bc.instructions.len());
    println!("════════════════════════════════════════");
    print!("{}", disassemble(&bc.instructions));
    println!();
}
