//! Instruction set and operand codec of the COIL virtual ISA.
//!
//! Instructions are variable-length: an opcode byte, an operand-count byte,
//! and a sequence of typed operands. This crate owns that wire format, the
//! opcode table with its mnemonic and arity mappings, and the variable/scope
//! machinery the `VAR`/`SCOPEE`/`SCOPEL` opcodes operate on.

#![warn(missing_docs)]

mod instruction;
mod opcode;
mod operand;
mod var;

pub use coil_types::{Error, Result, TypeExt, TypeWord};
pub use instruction::Instruction;
pub use opcode::{Arity, Opcode};
pub use operand::{ImmediateValue, Operand, RegisterClass};
pub use var::{ScopeManager, Variable, VariableManager};
