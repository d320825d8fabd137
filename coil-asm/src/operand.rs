use coil_types::bytes::{self, Endian};
use coil_types::ty::{self, main};
use coil_types::{Error, Result, TypeExt, TypeWord};

/// Register classes addressable by operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// General-purpose registers.
    GeneralPurpose,
    /// Floating-point registers.
    FloatingPoint,
    /// Vector registers.
    Vector,
}

impl RegisterClass {
    /// The type word of this register class.
    pub const fn type_word(self) -> TypeWord {
        match self {
            RegisterClass::GeneralPurpose => ty::RGP,
            RegisterClass::FloatingPoint => ty::RFP,
            RegisterClass::Vector => ty::RV,
        }
    }

    const fn from_main(byte: u8) -> Option<Self> {
        match byte {
            main::RGP => Some(RegisterClass::GeneralPurpose),
            main::RFP => Some(RegisterClass::FloatingPoint),
            main::RV => Some(RegisterClass::Vector),
            _ => None,
        }
    }
}

/// A value that can become an immediate operand.
///
/// Implemented for the fixed-width scalars; each maps to its canonical type
/// word and a little-endian payload.
pub trait ImmediateValue {
    /// The type word of the immediate, without the IMM flag.
    const TYPE: TypeWord;

    /// The little-endian payload bytes.
    fn payload(self) -> Vec<u8>;
}

macro_rules! immediate_value {
    ($($t:ty => $word:expr),* $(,)?) => {
        $(impl ImmediateValue for $t {
            const TYPE: TypeWord = $word;

            fn payload(self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }
        })*
    };
}

immediate_value! {
    i8 => ty::INT8,
    i16 => ty::INT16,
    i32 => ty::INT32,
    i64 => ty::INT64,
    u8 => ty::UNT8,
    u16 => ty::UNT16,
    u32 => ty::UNT32,
    u64 => ty::UNT64,
}

impl ImmediateValue for f32 {
    const TYPE: TypeWord = ty::FP32;

    fn payload(self) -> Vec<u8> {
        self.to_bits().to_le_bytes().to_vec()
    }
}

impl ImmediateValue for f64 {
    const TYPE: TypeWord = ty::FP64;

    fn payload(self) -> Vec<u8> {
        self.to_bits().to_le_bytes().to_vec()
    }
}

/// A typed instruction argument.
///
/// On the wire an operand is a 16-bit type word followed by a payload whose
/// length the type word dictates: ids are 2 bytes, immediates are sized by
/// their value type, memory operands are 9 bytes, and everything else falls
/// into a 4-byte default that carries a label target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Reference to a declared variable.
    Variable(u16),
    /// Reference to a symbol-table entry.
    Symbol(u16),
    /// A register of one of the three classes.
    Register {
        /// Register class.
        class: RegisterClass,
        /// Register number within the class.
        id: u16,
    },
    /// An inline constant.
    Immediate {
        /// The value type, IMM flag not included.
        ty: TypeWord,
        /// Little-endian value bytes; length equals `ty.size()`.
        bytes: Vec<u8>,
    },
    /// A `base + index * scale + displacement` memory reference.
    Memory {
        /// Base register id.
        base: u16,
        /// Index register id, 0 when absent.
        index: u16,
        /// Index scale factor.
        scale: u8,
        /// Signed displacement.
        disp: i32,
    },
    /// A branch target within the current section.
    Label(u32),
}

impl Operand {
    /// A variable-reference operand.
    pub const fn variable(id: u16) -> Self {
        Operand::Variable(id)
    }

    /// A symbol-reference operand.
    pub const fn symbol(id: u16) -> Self {
        Operand::Symbol(id)
    }

    /// A register operand.
    pub const fn register(class: RegisterClass, id: u16) -> Self {
        Operand::Register { class, id }
    }

    /// An immediate operand carrying `value`.
    pub fn immediate<T: ImmediateValue>(value: T) -> Self {
        Operand::Immediate {
            ty: T::TYPE,
            bytes: value.payload(),
        }
    }

    /// A memory operand.
    pub const fn memory(base: u16, index: u16, scale: u8, disp: i32) -> Self {
        Operand::Memory {
            base,
            index,
            scale,
            disp,
        }
    }

    /// A label operand.
    pub const fn label(target: u32) -> Self {
        Operand::Label(target)
    }

    /// The type word this operand encodes under.
    pub fn type_word(&self) -> TypeWord {
        match self {
            Operand::Variable(_) => ty::VAR,
            Operand::Symbol(_) => ty::SYM,
            Operand::Register { class, .. } => class.type_word(),
            Operand::Immediate { ty, .. } => ty.with(TypeExt::IMM),
            Operand::Memory { .. } => ty::PTR,
            Operand::Label(_) => ty::VOID,
        }
    }

    /// Length of the wire encoding in bytes, type word included.
    pub fn encoded_len(&self) -> usize {
        let payload = match self {
            Operand::Variable(_) | Operand::Symbol(_) | Operand::Register { .. } => 2,
            Operand::Immediate { bytes, .. } => bytes.len(),
            Operand::Memory { .. } => 9,
            Operand::Label(_) => 4,
        };
        2 + payload
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        bytes::append_u16(buf, self.type_word().raw(), Endian::Little);
        match self {
            Operand::Variable(id) | Operand::Symbol(id) | Operand::Register { id, .. } => {
                bytes::append_u16(buf, *id, Endian::Little);
            }
            Operand::Immediate { bytes: payload, .. } => buf.extend_from_slice(payload),
            Operand::Memory {
                base,
                index,
                scale,
                disp,
            } => {
                bytes::append_u16(buf, *base, Endian::Little);
                bytes::append_u16(buf, *index, Endian::Little);
                bytes::append_u8(buf, *scale);
                bytes::append_i32(buf, *disp, Endian::Little);
            }
            Operand::Label(target) => bytes::append_u32(buf, *target, Endian::Little),
        }
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.append(&mut buf);
        buf
    }

    /// Decode one operand at `*offset`, advancing it past the bytes consumed.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let word = TypeWord::from_raw(
            bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())?,
        );
        *offset += 2;

        if word == ty::VAR {
            let id = bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())?;
            *offset += 2;
            return Ok(Operand::Variable(id));
        }
        if word == ty::SYM {
            let id = bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())?;
            *offset += 2;
            return Ok(Operand::Symbol(id));
        }
        if let Some(class) = RegisterClass::from_main(word.main()) {
            let id = bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())?;
            *offset += 2;
            return Ok(Operand::Register { class, id });
        }
        if word.ext().contains(TypeExt::IMM) {
            let value_ty = word.without(TypeExt::IMM);
            let len = value_ty.size() as usize;
            let end = *offset + len;
            let payload = buf.get(*offset..end).ok_or_else(truncated)?;
            let operand = Operand::Immediate {
                ty: value_ty,
                bytes: payload.to_vec(),
            };
            *offset = end;
            return Ok(operand);
        }
        if word.main() == main::PTR {
            let base = bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())?;
            let index =
                bytes::read_u16(buf, *offset + 2, Endian::Little).map_err(|_| truncated())?;
            let scale = bytes::read_u8(buf, *offset + 4).map_err(|_| truncated())?;
            let disp =
                bytes::read_i32(buf, *offset + 5, Endian::Little).map_err(|_| truncated())?;
            *offset += 9;
            return Ok(Operand::Memory {
                base,
                index,
                scale,
                disp,
            });
        }

        // Default payload: four bytes carrying a label target. Unknown type
        // words land here so a scan can resynchronise past them.
        let target = bytes::read_u32(buf, *offset, Endian::Little).map_err(|_| truncated())?;
        *offset += 4;
        Ok(Operand::Label(target))
    }
}

fn truncated() -> Error {
    Error::InvalidFormat("truncated operand".to_string())
}
