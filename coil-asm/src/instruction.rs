use core::fmt;

use coil_types::{Error, Result};

use crate::opcode::{Arity, Opcode};
use crate::operand::Operand;

/// A single COIL instruction: an opcode and its operands.
///
/// The wire form is `opcode:u8, operand_count:u8` followed by the operand
/// encodings back to back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    opcode: Opcode,
    operands: Vec<Operand>,
}

impl Instruction {
    /// Build an instruction. The operand list is not checked here; call
    /// [`validate`](Self::validate) for the arity rules.
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Instruction { opcode, operands }
    }

    /// The opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The operands in encoding order.
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Length of the wire encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        2 + self
            .operands
            .iter()
            .map(Operand::encoded_len)
            .sum::<usize>()
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode as u8);
        buf.push(self.operands.len() as u8);
        for operand in &self.operands {
            operand.append(buf);
        }
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.append(&mut buf);
        buf
    }

    /// Decode one instruction at `*offset`, advancing it past the bytes
    /// consumed.
    ///
    /// Fails with [`Error::InvalidFormat`] on an unknown opcode byte or when
    /// the buffer runs out mid-operand; `*offset` is left unchanged in that
    /// case so a scanner can resynchronise.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let mut cursor = *offset;

        let opcode_byte = *buf
            .get(cursor)
            .ok_or_else(|| Error::InvalidFormat("truncated instruction".to_string()))?;
        let opcode = Opcode::try_from(opcode_byte)?;
        let count = *buf
            .get(cursor + 1)
            .ok_or_else(|| Error::InvalidFormat("truncated instruction".to_string()))?;
        cursor += 2;

        let mut operands = Vec::with_capacity(count as usize);
        for _ in 0..count {
            operands.push(Operand::decode(buf, &mut cursor)?);
        }

        *offset = cursor;
        Ok(Instruction { opcode, operands })
    }

    /// Check the operand list against the opcode's arity contract.
    ///
    /// Fixed-arity opcodes must match their tabulated count exactly; variadic
    /// ones must reach the tabulated minimum. `VAR` additionally requires its
    /// second operand to be an immediate carrying a type word, with an
    /// optional initializer as the third and nothing after it.
    pub fn validate(&self) -> Result<()> {
        let count = self.operands.len();
        match self.opcode.arity() {
            Arity::Fixed(expected) if count != expected => {
                return Err(Error::InvalidArg(format!(
                    "invalid operand count for {}: expected {expected}, got {count}",
                    self.opcode.mnemonic()
                )));
            }
            Arity::Variadic(min) if count < min => {
                return Err(Error::InvalidArg(format!(
                    "invalid operand count for {}: expected at least {min}, got {count}",
                    self.opcode.mnemonic()
                )));
            }
            _ => {}
        }

        if self.opcode == Opcode::VAR {
            match self.operands.get(1) {
                Some(Operand::Immediate { bytes, .. }) if bytes.len() == 2 => {}
                _ => {
                    return Err(Error::InvalidArg(
                        "VAR requires a type-word immediate as its second operand".to_string(),
                    ));
                }
            }
            if count > 3 {
                return Err(Error::InvalidArg(format!(
                    "invalid operand count for VAR: expected at most 3, got {count}"
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            match operand {
                Operand::Variable(id) => write!(f, "{sep}%{id}")?,
                Operand::Symbol(id) => write!(f, "{sep}@{id}")?,
                Operand::Register { class, id } => {
                    write!(f, "{sep}{}{id}", class.type_word())?
                }
                Operand::Immediate { ty, bytes } => {
                    write!(f, "{sep}#{ty}:0x")?;
                    for byte in bytes.iter().rev() {
                        write!(f, "{byte:02x}")?;
                    }
                }
                Operand::Memory {
                    base,
                    index,
                    scale,
                    disp,
                } => write!(f, "{sep}[{base}+{index}*{scale}{disp:+}]")?,
                Operand::Label(target) => write!(f, "{sep}.L{target}")?,
            }
        }
        Ok(())
    }
}
