//! # Kiln syntax tree and runtime values
//!
//! [`ast`] is produced by the parser and consumed by the bytecode compiler;
//! [`value`] is what the VM pushes, pops and stores in globals.

pub mod ast;
pub mod value;
