use bitflags::bitflags;
use coil_types::bytes::{self, Endian};
use coil_types::{Error, Result};

bitflags! {
    /// Symbol attribute flags.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SymbolFlags: u32 {
        /// Visible outside the file.
        const GLOBAL = 0x0001;
        /// May be overridden by a non-weak definition.
        const WEAK = 0x0002;
        /// File scope only.
        const LOCAL = 0x0004;
        /// Names a function.
        const FUNCTION = 0x0008;
        /// Names a data object.
        const DATA = 0x0010;
        /// Carries a fixed address rather than a section offset.
        const ABSOLUTE = 0x0020;
        /// Uninitialised common storage.
        const COMMON = 0x0040;
        /// Listed in the export table.
        const EXPORTED = 0x0080;
    }
}

/// A symbol-table entry.
///
/// Wire form: `name_length:u16, name:bytes, attributes:u32, value:u32,
/// section_index:u16, processor_type:u8`, little-endian, name inline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    /// Symbol name. Section labels carry section-style names (`.text`).
    pub name: String,
    /// Attribute flags.
    pub attributes: SymbolFlags,
    /// Value, usually an offset into the owning section.
    pub value: u32,
    /// Index of the owning section, or [`Symbol::UNBOUND`].
    pub section_index: u16,
    /// Target processor tag.
    pub processor_type: u8,
}

impl Symbol {
    /// `section_index` value of a symbol bound to no section.
    pub const UNBOUND: u16 = 0xFFFF;

    /// An unbound symbol with the given name and attributes.
    pub fn new(name: impl Into<String>, attributes: SymbolFlags) -> Self {
        Symbol {
            name: name.into(),
            attributes,
            value: 0,
            section_index: Self::UNBOUND,
            processor_type: 0,
        }
    }

    /// Length of the wire encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        2 + self.name.len() + 4 + 4 + 2 + 1
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        bytes::append_u16(buf, self.name.len() as u16, Endian::Little);
        bytes::append_str(buf, &self.name);
        bytes::append_u32(buf, self.attributes.bits(), Endian::Little);
        bytes::append_u32(buf, self.value, Endian::Little);
        bytes::append_u16(buf, self.section_index, Endian::Little);
        bytes::append_u8(buf, self.processor_type);
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.append(&mut buf);
        buf
    }

    /// Decode one symbol at `*offset`, advancing it past the bytes consumed.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let truncated = || Error::InvalidFormat("truncated symbol entry".to_string());

        let name_length =
            bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())? as usize;
        let name = bytes::read_str(buf, *offset + 2, name_length)?;

        let tail = *offset + 2 + name_length;
        let attributes = bytes::read_u32(buf, tail, Endian::Little).map_err(|_| truncated())?;
        let value = bytes::read_u32(buf, tail + 4, Endian::Little).map_err(|_| truncated())?;
        let section_index =
            bytes::read_u16(buf, tail + 8, Endian::Little).map_err(|_| truncated())?;
        let processor_type = bytes::read_u8(buf, tail + 10).map_err(|_| truncated())?;

        *offset = tail + 11;
        Ok(Symbol {
            name,
            attributes: SymbolFlags::from_bits_truncate(attributes),
            value,
            section_index,
            processor_type,
        })
    }
}
