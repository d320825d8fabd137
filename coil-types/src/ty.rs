//! The 16-bit COIL type word.
//!
//! The high byte selects the main category, the low byte carries extension
//! flags. Complex categories (vectors with element types, composites) are
//! described through the [`registry`](crate::registry); the word itself only
//! names the category.

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Extension flags stored in the low byte of a type word.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TypeExt: u8 {
        /// The value may not be written after initialisation.
        const CONST = 0x01;
        /// The value may change outside the visible control flow.
        const VOLATILE = 0x02;
        /// An immediate value follows the type word.
        const IMM = 0x20;
        /// The payload is a variable id.
        const VAR_ID = 0x40;
        /// The payload is a symbol id.
        const SYM_ID = 0x80;
    }
}

/// Main-category byte values of a type word.
#[allow(missing_docs)]
pub mod main {
    pub const INT8: u8 = 0x01;
    pub const INT16: u8 = 0x02;
    pub const INT32: u8 = 0x03;
    pub const INT64: u8 = 0x04;
    pub const UNT8: u8 = 0x10;
    pub const UNT16: u8 = 0x11;
    pub const UNT32: u8 = 0x13;
    pub const UNT64: u8 = 0x14;
    pub const FP16: u8 = 0x23;
    pub const FP32: u8 = 0x25;
    pub const FP64: u8 = 0x26;
    pub const FP128: u8 = 0x28;
    pub const V128: u8 = 0x30;
    pub const V256: u8 = 0x31;
    pub const V512: u8 = 0x32;
    pub const BIT: u8 = 0x40;
    pub const VAR: u8 = 0x90;
    pub const SYM: u8 = 0x91;
    pub const RGP: u8 = 0x92;
    pub const RFP: u8 = 0x93;
    pub const RV: u8 = 0x94;
    pub const INT: u8 = 0xA0;
    pub const UNT: u8 = 0xA1;
    pub const FP: u8 = 0xA2;
    pub const PTR: u8 = 0xA6;
    pub const STRUCT: u8 = 0xD0;
    pub const PACK: u8 = 0xD1;
    pub const UNION: u8 = 0xD2;
    pub const ARRAY: u8 = 0xD3;
    pub const PARAM4: u8 = 0xFA;
    pub const PARAM3: u8 = 0xFB;
    pub const PARAM2: u8 = 0xFC;
    pub const PARAM1: u8 = 0xFD;
    pub const PARAM0: u8 = 0xFE;
    pub const VOID: u8 = 0xFF;
}

/// A 16-bit encoded type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeWord(u16);

/// 8-bit signed integer.
pub const INT8: TypeWord = TypeWord::from_raw(0x0100);
/// 16-bit signed integer.
pub const INT16: TypeWord = TypeWord::from_raw(0x0200);
/// 32-bit signed integer.
pub const INT32: TypeWord = TypeWord::from_raw(0x0300);
/// 64-bit signed integer.
pub const INT64: TypeWord = TypeWord::from_raw(0x0400);
/// 8-bit unsigned integer.
pub const UNT8: TypeWord = TypeWord::from_raw(0x1000);
/// 16-bit unsigned integer.
pub const UNT16: TypeWord = TypeWord::from_raw(0x1100);
/// 32-bit unsigned integer.
pub const UNT32: TypeWord = TypeWord::from_raw(0x1300);
/// 64-bit unsigned integer.
pub const UNT64: TypeWord = TypeWord::from_raw(0x1400);
/// Half-precision float.
pub const FP16: TypeWord = TypeWord::from_raw(0x2300);
/// Single-precision float.
pub const FP32: TypeWord = TypeWord::from_raw(0x2500);
/// Double-precision float.
pub const FP64: TypeWord = TypeWord::from_raw(0x2600);
/// Quad-precision float.
pub const FP128: TypeWord = TypeWord::from_raw(0x2800);
/// 128-bit vector.
pub const V128: TypeWord = TypeWord::from_raw(0x3000);
/// 256-bit vector.
pub const V256: TypeWord = TypeWord::from_raw(0x3100);
/// 512-bit vector.
pub const V512: TypeWord = TypeWord::from_raw(0x3200);
/// Single bit.
pub const BIT: TypeWord = TypeWord::from_raw(0x4000);
/// Variable reference.
pub const VAR: TypeWord = TypeWord::from_raw(0x9000);
/// Symbol reference.
pub const SYM: TypeWord = TypeWord::from_raw(0x9100);
/// General-purpose register class.
pub const RGP: TypeWord = TypeWord::from_raw(0x9200);
/// Floating-point register class.
pub const RFP: TypeWord = TypeWord::from_raw(0x9300);
/// Vector register class.
pub const RV: TypeWord = TypeWord::from_raw(0x9400);
/// Platform-width signed integer.
pub const INT: TypeWord = TypeWord::from_raw(0xA000);
/// Platform-width unsigned integer.
pub const UNT: TypeWord = TypeWord::from_raw(0xA100);
/// Platform-width float.
pub const FP: TypeWord = TypeWord::from_raw(0xA200);
/// Platform pointer.
pub const PTR: TypeWord = TypeWord::from_raw(0xA600);
/// Structure composite.
pub const STRUCT: TypeWord = TypeWord::from_raw(0xD000);
/// Packed composite.
pub const PACK: TypeWord = TypeWord::from_raw(0xD100);
/// Union composite.
pub const UNION: TypeWord = TypeWord::from_raw(0xD200);
/// Array composite.
pub const ARRAY: TypeWord = TypeWord::from_raw(0xD300);
/// Parameter placeholder 4.
pub const PARAM4: TypeWord = TypeWord::from_raw(0xFA00);
/// Parameter placeholder 3.
pub const PARAM3: TypeWord = TypeWord::from_raw(0xFB00);
/// Parameter placeholder 2.
pub const PARAM2: TypeWord = TypeWord::from_raw(0xFC00);
/// Parameter placeholder 1.
pub const PARAM1: TypeWord = TypeWord::from_raw(0xFD00);
/// Parameter placeholder 0.
pub const PARAM0: TypeWord = TypeWord::from_raw(0xFE00);
/// The empty type.
pub const VOID: TypeWord = TypeWord::from_raw(0xFF00);

impl TypeWord {
    /// Compose a main category and extension flags into a type word.
    pub const fn new(main: u8, ext: TypeExt) -> Self {
        TypeWord(((main as u16) << 8) | ext.bits() as u16)
    }

    /// Reinterpret a raw 16-bit word.
    pub const fn from_raw(raw: u16) -> Self {
        TypeWord(raw)
    }

    /// The raw 16-bit word.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The main-category byte.
    pub const fn main(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The extension flags. Undefined low bits are dropped.
    pub fn ext(self) -> TypeExt {
        TypeExt::from_bits_truncate(self.0 as u8)
    }

    /// This word with `ext` added.
    pub fn with(self, ext: TypeExt) -> Self {
        TypeWord(self.0 | ext.bits() as u16)
    }

    /// This word with `ext` removed.
    pub fn without(self, ext: TypeExt) -> Self {
        TypeWord(self.0 & !(ext.bits() as u16))
    }

    /// Signed fixed-width or platform integer.
    pub const fn is_signed_integer(self) -> bool {
        let m = self.main();
        (m >= main::INT8 && m <= main::INT64) || m == main::INT
    }

    /// Unsigned fixed-width or platform integer.
    pub const fn is_unsigned_integer(self) -> bool {
        let m = self.main();
        (m >= main::UNT8 && m <= main::UNT64) || m == main::UNT
    }

    /// Any integer category.
    pub const fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    /// Fixed-width or platform float.
    pub const fn is_float(self) -> bool {
        let m = self.main();
        (m >= main::FP16 && m <= main::FP128) || m == main::FP
    }

    /// Vector category (V128/V256/V512).
    pub const fn is_vector(self) -> bool {
        let m = self.main();
        m >= main::V128 && m <= main::V512
    }

    /// Platform pointer.
    pub const fn is_pointer(self) -> bool {
        self.main() == main::PTR
    }

    /// Variable, symbol, or register-class reference.
    pub const fn is_reference(self) -> bool {
        let m = self.main();
        m >= main::VAR && m <= main::RV
    }

    /// Register-class reference (RGP/RFP/RV).
    pub const fn is_register(self) -> bool {
        let m = self.main();
        m >= main::RGP && m <= main::RV
    }

    /// Struct, pack, union, or array.
    pub const fn is_composite(self) -> bool {
        let m = self.main();
        m >= main::STRUCT && m <= main::ARRAY
    }

    /// Parameter placeholder.
    pub const fn is_parameter(self) -> bool {
        let m = self.main();
        m >= main::PARAM4 && m <= main::PARAM0
    }

    /// Size of a value of this type in bytes.
    ///
    /// Composites return 0, since their size is only known to the registry. VOID
    /// and undefined categories also return 0.
    pub const fn size(self) -> u32 {
        match self.main() {
            main::INT8 | main::UNT8 | main::BIT => 1,
            main::INT16 | main::UNT16 | main::FP16 => 2,
            main::INT32 | main::UNT32 | main::FP32 => 4,
            main::INT64 | main::UNT64 | main::FP64 => 8,
            main::FP128 | main::V128 => 16,
            main::V256 => 32,
            main::V512 => 64,
            // Platform mapping: 32-bit scalar word, 64-bit pointers.
            main::INT | main::UNT | main::FP => 4,
            main::PTR => 8,
            main::VAR | main::SYM | main::RGP | main::RFP | main::RV => 8,
            _ => 0,
        }
    }

    /// Whether a value of this type can be used where `dst` is expected
    /// without conversion.
    ///
    /// Equal words are compatible; so are same-family integers and floats up
    /// to widening, and a platform type with its concrete counterpart under
    /// the current word-size mapping.
    pub fn is_compatible_with(self, dst: TypeWord) -> bool {
        if self.0 == dst.0 {
            return true;
        }

        // Platform types narrow to exactly their concrete counterpart.
        match (self.main(), dst.main()) {
            (main::INT, main::INT32) | (main::UNT, main::UNT32) | (main::FP, main::FP32) => {
                return true;
            }
            _ => {}
        }

        if self.is_signed_integer() && dst.is_signed_integer() {
            return self.size() <= dst.size();
        }
        if self.is_unsigned_integer() && dst.is_unsigned_integer() {
            return self.size() <= dst.size();
        }
        if self.is_float() && dst.is_float() {
            return self.size() <= dst.size();
        }

        false
    }

    /// Whether a value of this type can reach `dst` through an explicit
    /// conversion.
    ///
    /// A superset of [`is_compatible_with`](Self::is_compatible_with) that
    /// admits int↔float and signedness changes.
    pub fn can_convert_to(self, dst: TypeWord) -> bool {
        if self.is_compatible_with(dst) {
            return true;
        }
        if self.is_integer() && dst.is_float() {
            return true;
        }
        if self.is_float() && dst.is_integer() {
            return true;
        }
        // Signedness change, with possible data loss.
        self.is_integer() && dst.is_integer()
    }

    const fn main_name(self) -> Option<&'static str> {
        Some(match self.main() {
            main::INT8 => "INT8",
            main::INT16 => "INT16",
            main::INT32 => "INT32",
            main::INT64 => "INT64",
            main::UNT8 => "UNT8",
            main::UNT16 => "UNT16",
            main::UNT32 => "UNT32",
            main::UNT64 => "UNT64",
            main::FP16 => "FP16",
            main::FP32 => "FP32",
            main::FP64 => "FP64",
            main::FP128 => "FP128",
            main::V128 => "V128",
            main::V256 => "V256",
            main::V512 => "V512",
            main::BIT => "BIT",
            main::VAR => "VAR",
            main::SYM => "SYM",
            main::RGP => "RGP",
            main::RFP => "RFP",
            main::RV => "RV",
            main::INT => "INT",
            main::UNT => "UNT",
            main::FP => "FP",
            main::PTR => "PTR",
            main::STRUCT => "STRUCT",
            main::PACK => "PACK",
            main::UNION => "UNION",
            main::ARRAY => "ARRAY",
            main::PARAM4 => "PARAM4",
            main::PARAM3 => "PARAM3",
            main::PARAM2 => "PARAM2",
            main::PARAM1 => "PARAM1",
            main::PARAM0 => "PARAM0",
            main::VOID => "VOID",
            _ => return None,
        })
    }
}

impl fmt::Display for TypeWord {
    /// The canonical diagnostic rendering, e.g. `INT32+CONST`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.main_name() {
            Some(name) => f.write_str(name)?,
            None => write!(f, "UNKNOWN(0x{:02x})", self.main())?,
        }

        let ext = self.ext();
        if ext.contains(TypeExt::CONST) {
            f.write_str("+CONST")?;
        }
        if ext.contains(TypeExt::VOLATILE) {
            f.write_str("+VOLATILE")?;
        }
        if ext.contains(TypeExt::IMM) {
            f.write_str("+IMM")?;
        }
        if ext.contains(TypeExt::VAR_ID) {
            f.write_str("+VAR_ID")?;
        }
        if ext.contains(TypeExt::SYM_ID) {
            f.write_str("+SYM_ID")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(INT8, 1)]
    #[case(INT16, 2)]
    #[case(INT32, 4)]
    #[case(INT64, 8)]
    #[case(UNT8, 1)]
    #[case(UNT16, 2)]
    #[case(UNT32, 4)]
    #[case(UNT64, 8)]
    #[case(FP16, 2)]
    #[case(FP32, 4)]
    #[case(FP64, 8)]
    #[case(FP128, 16)]
    #[case(V128, 16)]
    #[case(V256, 32)]
    #[case(V512, 64)]
    #[case(BIT, 1)]
    #[case(VOID, 0)]
    #[case(INT, 4)]
    #[case(UNT, 4)]
    #[case(FP, 4)]
    #[case(PTR, 8)]
    #[case(VAR, 8)]
    #[case(SYM, 8)]
    #[case(STRUCT, 0)]
    #[case(ARRAY, 0)]
    fn size_table(#[case] ty: TypeWord, #[case] size: u32) {
        assert_eq!(ty.size(), size);
    }

    #[test]
    fn compose_and_decompose() {
        let ty = TypeWord::new(main::INT32, TypeExt::CONST | TypeExt::IMM);
        assert_eq!(ty.raw(), 0x0321);
        assert_eq!(ty.main(), main::INT32);
        assert_eq!(ty.ext(), TypeExt::CONST | TypeExt::IMM);
        assert_eq!(ty.without(TypeExt::IMM), INT32.with(TypeExt::CONST));
    }

    #[test]
    fn signed_widening_matrix() {
        let widths = [INT8, INT16, INT32, INT64];
        for (i, src) in widths.iter().enumerate() {
            for (j, dst) in widths.iter().enumerate() {
                assert_eq!(
                    src.is_compatible_with(*dst),
                    i <= j,
                    "{src} vs {dst}"
                );
            }
        }
    }

    #[rstest]
    #[case(UNT8, UNT64, true)]
    #[case(UNT64, UNT8, false)]
    #[case(FP32, FP64, true)]
    #[case(FP64, FP32, false)]
    #[case(INT32, UNT32, false)]
    #[case(UNT32, INT32, false)]
    #[case(INT32, FP32, false)]
    #[case(INT, INT32, true)]
    #[case(INT, INT64, true)]
    #[case(INT, INT8, false)]
    #[case(UNT, UNT32, true)]
    #[case(FP, FP32, true)]
    #[case(PTR, PTR, true)]
    fn compatibility_cases(#[case] src: TypeWord, #[case] dst: TypeWord, #[case] ok: bool) {
        assert_eq!(src.is_compatible_with(dst), ok);
    }

    #[rstest]
    #[case(INT32, FP64, true)]
    #[case(FP64, INT32, true)]
    #[case(INT32, UNT8, true)]
    #[case(FP32, PTR, false)]
    #[case(VOID, INT32, false)]
    fn conversion_cases(#[case] src: TypeWord, #[case] dst: TypeWord, #[case] ok: bool) {
        assert_eq!(src.can_convert_to(dst), ok);
    }

    #[test]
    fn compatibility_is_reflexive_for_every_category() {
        for ty in [
            INT8, INT16, INT32, INT64, UNT8, UNT16, UNT32, UNT64, FP16, FP32, FP64, FP128,
            V128, V256, V512, BIT, VAR, SYM, RGP, RFP, RV, INT, UNT, FP, PTR, STRUCT, PACK,
            UNION, ARRAY, PARAM0, VOID,
        ] {
            assert!(ty.is_compatible_with(ty), "{ty}");
        }
    }

    #[test]
    fn names_render_with_extensions() {
        assert_eq!(INT32.to_string(), "INT32");
        assert_eq!(
            INT32.with(TypeExt::CONST | TypeExt::IMM).to_string(),
            "INT32+CONST+IMM"
        );
        assert_eq!(TypeWord::from_raw(0x7700).to_string(), "UNKNOWN(0x77)");
    }

    #[test]
    fn classification_is_disjoint_where_it_should_be() {
        assert!(INT32.is_integer() && INT32.is_signed_integer());
        assert!(!INT32.is_unsigned_integer());
        assert!(UNT8.is_unsigned_integer() && !UNT8.is_signed_integer());
        assert!(FP64.is_float() && !FP64.is_integer());
        assert!(V256.is_vector());
        assert!(PTR.is_pointer() && !PTR.is_reference());
        assert!(VAR.is_reference() && !VAR.is_register());
        assert!(RGP.is_register() && RGP.is_reference());
        assert!(UNION.is_composite());
        assert!(PARAM2.is_parameter());
        assert!(INT.is_signed_integer() && UNT.is_unsigned_integer() && FP.is_float());
    }
}
