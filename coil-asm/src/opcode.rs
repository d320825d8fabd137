use coil_types::{Error, Result};

/// Operand-count contract of an opcode.
///
/// Most opcodes take a fixed number of operands. A small set (`CALL`, `RET`,
/// `VAR`, `SWITCH`) is variadic; the tabulated count is the minimum the
/// instruction makes sense with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Exactly this many operands.
    Fixed(usize),
    /// At least this many operands.
    Variadic(usize),
}

/// Instruction opcodes of the COIL virtual ISA.
///
/// The opcode space is partitioned by function: `0x01`–`0x0F` control flow,
/// `0x10`–`0x2F` memory and scope, `0x50`–`0x5F` bit manipulation,
/// `0x60`–`0x8F` arithmetic, `0x90`–`0x9F` vector, `0xA0`–`0xAF` type
/// operations, `0xB0`–`0xBF` directives. `0x00` is `NOP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumIter, strum::EnumString, strum::IntoStaticStr)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    /// No operation.
    NOP = 0x00,

    // Control flow
    /// Define a symbol at the current position.
    SYM = 0x01,
    /// Unconditional or conditional branch.
    BR = 0x02,
    /// Call a function. Extra operands carry arguments per the active ABI.
    CALL = 0x03,
    /// Return from a function. Extra operands carry return values.
    RET = 0x04,
    /// Compare two values and latch the result.
    CMP = 0x05,
    /// Multi-way branch over a scrutinee. Arm count is open-ended.
    SWITCH = 0x09,

    // Memory and scope
    /// Copy a value.
    MOV = 0x10,
    /// Push a value onto the stack.
    PUSH = 0x11,
    /// Pop a value off the stack.
    POP = 0x12,
    /// Load the effective address of a memory operand.
    LEA = 0x13,
    /// Enter a variable scope.
    SCOPEE = 0x14,
    /// Leave the innermost variable scope.
    SCOPEL = 0x15,
    /// Declare a variable: id, type word, optional initializer.
    VAR = 0x16,
    /// Copy a memory region.
    MEMCPY = 0x17,
    /// Fill a memory region.
    MEMSET = 0x18,
    /// Compare two memory regions.
    MEMCMP = 0x19,
    /// Exchange two values.
    XCHG = 0x1A,
    /// Compare-and-swap.
    CAS = 0x1B,

    // Bit manipulation
    /// Bitwise and.
    AND = 0x50,
    /// Bitwise or.
    OR = 0x51,
    /// Bitwise exclusive or.
    XOR = 0x52,
    /// Bitwise complement.
    NOT = 0x53,
    /// Shift left.
    SHL = 0x54,
    /// Logical shift right.
    SHR = 0x55,
    /// Arithmetic shift right.
    SAR = 0x56,

    // Arithmetic
    /// Addition.
    ADD = 0x60,
    /// Subtraction.
    SUB = 0x61,
    /// Multiplication.
    MUL = 0x62,
    /// Division.
    DIV = 0x63,
    /// Remainder.
    MOD = 0x64,
    /// Increment in place.
    INC = 0x65,
    /// Decrement in place.
    DEC = 0x66,
    /// Negation.
    NEG = 0x67,
    /// Absolute value.
    ABS = 0x68,
    /// Square root.
    SQRT = 0x69,
    /// Round towards positive infinity.
    CEIL = 0x6B,
    /// Round towards negative infinity.
    FLOOR = 0x6C,
    /// Round to nearest.
    ROUND = 0x6D,

    // Vector
    /// Load a vector from memory.
    VLOAD = 0x90,
    /// Store a vector to memory.
    VSTORE = 0x91,
    /// Extract a lane from a vector.
    VEXTRACT = 0x96,
    /// Insert a lane into a vector.
    VINSERT = 0x97,
    /// Dot product of two vectors.
    VDOT = 0x9C,

    // Type operations
    /// Query the type of a value.
    TYPEOF = 0xA0,
    /// Query the size of a type.
    SIZEOF = 0xA1,
    /// Value-preserving conversion.
    CONVERT = 0xA3,
    /// Bit-preserving reinterpretation.
    CAST = 0xA4,
    /// Read a composite field.
    GET = 0xA6,
    /// Write a composite field.
    SET = 0xA7,
    /// Index into an array.
    INDEX = 0xA8,
    /// Update an element in place.
    UPDT = 0xA9,

    // Directives
    /// Select a target architecture.
    ARCH = 0xB0,
    /// Select a processor type.
    PROC = 0xB1,
    /// Select a processor mode.
    MODE = 0xB2,
    /// Align the current position.
    ALIGN = 0xB3,
    /// Open a section: name symbol and attributes.
    SECTION = 0xB4,
    /// Emit raw data.
    DATA = 0xB5,
    /// Begin a conditional-assembly region.
    IF = 0xB6,
    /// Alternative condition in a conditional-assembly region.
    ELIF = 0xB7,
    /// Fallback of a conditional-assembly region.
    ELSE = 0xB8,
    /// Close a conditional-assembly region.
    ENDIF = 0xB9,
    /// Select a calling convention.
    ABI = 0xBA,
    /// Declare an external symbol.
    EXTERN = 0xBB,
    /// Mark a symbol global.
    GLOBAL = 0xBC,
    /// Include another module.
    INCLUDE = 0xBD,
    /// Declare the format version.
    VERSION = 0xBE,
}

impl Opcode {
    /// The operand-count contract of this opcode.
    pub const fn arity(self) -> Arity {
        use Opcode::*;
        match self {
            // Variadic set: arguments and arms are open-ended.
            CALL => Arity::Variadic(1),
            RET => Arity::Variadic(0),
            VAR => Arity::Variadic(2),
            SWITCH => Arity::Variadic(3),

            NOP | SCOPEE | SCOPEL | ELSE | ENDIF => Arity::Fixed(0),
            SYM | BR | PUSH | POP | INC | DEC | ARCH | PROC | MODE | ALIGN | IF | ELIF
            | ABI | EXTERN | GLOBAL | INCLUDE => Arity::Fixed(1),
            CMP | MOV | LEA | XCHG | NOT | NEG | ABS | SQRT | CEIL | FLOOR | ROUND | VLOAD
            | VSTORE | TYPEOF | SIZEOF | CONVERT | CAST | SECTION | DATA => Arity::Fixed(2),
            MEMCPY | MEMSET | CAS | AND | OR | XOR | SHL | SHR | SAR | ADD | SUB | MUL
            | DIV | MOD | VEXTRACT | VDOT | GET | SET | INDEX | UPDT | VERSION => {
                Arity::Fixed(3)
            }
            MEMCMP | VINSERT => Arity::Fixed(4),
        }
    }

    /// Whether the operand count is open-ended.
    pub const fn is_variadic(self) -> bool {
        matches!(self.arity(), Arity::Variadic(_))
    }

    /// The canonical upper-case mnemonic.
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Look an opcode up by mnemonic, ignoring case.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        use Opcode::*;
        Ok(match byte {
            0x00 => NOP,
            0x01 => SYM,
            0x02 => BR,
            0x03 => CALL,
            0x04 => RET,
            0x05 => CMP,
            0x09 => SWITCH,
            0x10 => MOV,
            0x11 => PUSH,
            0x12 => POP,
            0x13 => LEA,
            0x14 => SCOPEE,
            0x15 => SCOPEL,
            0x16 => VAR,
            0x17 => MEMCPY,
            0x18 => MEMSET,
            0x19 => MEMCMP,
            0x1A => XCHG,
            0x1B => CAS,
            0x50 => AND,
            0x51 => OR,
            0x52 => XOR,
            0x53 => NOT,
            0x54 => SHL,
            0x55 => SHR,
            0x56 => SAR,
            0x60 => ADD,
            0x61 => SUB,
            0x62 => MUL,
            0x63 => DIV,
            0x64 => MOD,
            0x65 => INC,
            0x66 => DEC,
            0x67 => NEG,
            0x68 => ABS,
            0x69 => SQRT,
            0x6B => CEIL,
            0x6C => FLOOR,
            0x6D => ROUND,
            0x90 => VLOAD,
            0x91 => VSTORE,
            0x96 => VEXTRACT,
            0x97 => VINSERT,
            0x9C => VDOT,
            0xA0 => TYPEOF,
            0xA1 => SIZEOF,
            0xA3 => CONVERT,
            0xA4 => CAST,
            0xA6 => GET,
            0xA7 => SET,
            0xA8 => INDEX,
            0xA9 => UPDT,
            0xB0 => ARCH,
            0xB1 => PROC,
            0xB2 => MODE,
            0xB3 => ALIGN,
            0xB4 => SECTION,
            0xB5 => DATA,
            0xB6 => IF,
            0xB7 => ELIF,
            0xB8 => ELSE,
            0xB9 => ENDIF,
            0xBA => ABI,
            0xBB => EXTERN,
            0xBC => GLOBAL,
            0xBD => INCLUDE,
            0xBE => VERSION,
            _ => {
                return Err(Error::InvalidFormat(format!("unknown opcode 0x{byte:02x}")));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[test]
    fn byte_round_trip_for_every_opcode() {
        for op in Opcode::iter() {
            assert_eq!(Opcode::try_from(op as u8).unwrap(), op);
        }
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        let known: Vec<u8> = Opcode::iter().map(|op| op as u8).collect();
        for byte in 0..=u8::MAX {
            assert_eq!(Opcode::try_from(byte).is_ok(), known.contains(&byte));
        }
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        for op in Opcode::iter() {
            let name = op.mnemonic();
            assert_eq!(Opcode::from_mnemonic(name), Some(op));
            assert_eq!(Opcode::from_mnemonic(&name.to_lowercase()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("Scopee"), Some(Opcode::SCOPEE));
        assert_eq!(Opcode::from_mnemonic("bogus"), None);
    }

    #[rstest]
    #[case(Opcode::NOP, Arity::Fixed(0))]
    #[case(Opcode::MOV, Arity::Fixed(2))]
    #[case(Opcode::MEMCMP, Arity::Fixed(4))]
    #[case(Opcode::ADD, Arity::Fixed(3))]
    #[case(Opcode::VERSION, Arity::Fixed(3))]
    #[case(Opcode::CALL, Arity::Variadic(1))]
    #[case(Opcode::RET, Arity::Variadic(0))]
    #[case(Opcode::VAR, Arity::Variadic(2))]
    #[case(Opcode::SWITCH, Arity::Variadic(3))]
    fn arity_table(#[case] op: Opcode, #[case] arity: Arity) {
        assert_eq!(op.arity(), arity);
        assert_eq!(op.is_variadic(), matches!(arity, Arity::Variadic(_)));
    }
}
