use bitflags::bitflags;
use coil_types::bytes::{self, Endian};
use coil_types::{Error, Result};

bitflags! {
    /// Section attribute flags.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SectionFlags: u32 {
        /// Contains instructions.
        const EXECUTABLE = 0x01;
        /// Writable at run time.
        const WRITABLE = 0x02;
        /// Readable at run time.
        const READABLE = 0x04;
        /// Contains initialised data.
        const INITIALIZED = 0x08;
        /// BSS-style uninitialised storage.
        const UNINITIALIZED = 0x10;
        /// Has relocations applied against it.
        const LINKED = 0x20;
        /// May be dropped from the final image.
        const DISCARDABLE = 0x40;
    }
}

/// A section-table entry and its data.
///
/// Wire form: `name_index:u16, attributes:u32, offset:u32, size:u32,
/// address:u32, alignment:u32, processor_type:u8, data:bytes[size]`,
/// little-endian. The name lives in the symbol table; `name_index` points at
/// the symbol that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Section {
    /// Symbol-table index of the name.
    pub name_index: u16,
    /// Attribute flags.
    pub attributes: SectionFlags,
    /// Offset from the start of the file image.
    pub offset: u32,
    /// Size in bytes; must equal `data.len()` for a well-formed section.
    pub size: u32,
    /// Virtual address.
    pub address: u32,
    /// Required alignment; 0 or a power of two.
    pub alignment: u32,
    /// Target processor tag.
    pub processor_type: u8,
    /// Section contents.
    pub data: Vec<u8>,
}

impl Section {
    /// Encoded size of the fixed fields, data excluded.
    pub const HEADER_LEN: usize = 2 + 4 + 4 + 4 + 4 + 4 + 1;

    /// An empty section named by `name_index`.
    pub fn new(name_index: u16, attributes: SectionFlags) -> Self {
        Section {
            name_index,
            attributes,
            offset: 0,
            size: 0,
            address: 0,
            alignment: 0,
            processor_type: 0,
            data: Vec::new(),
        }
    }

    /// Replace the data, keeping `size` in step.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.size = data.len() as u32;
        self.data = data;
    }

    /// Length of the wire encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_LEN + self.data.len()
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        bytes::append_u16(buf, self.name_index, Endian::Little);
        bytes::append_u32(buf, self.attributes.bits(), Endian::Little);
        bytes::append_u32(buf, self.offset, Endian::Little);
        bytes::append_u32(buf, self.size, Endian::Little);
        bytes::append_u32(buf, self.address, Endian::Little);
        bytes::append_u32(buf, self.alignment, Endian::Little);
        bytes::append_u8(buf, self.processor_type);
        buf.extend_from_slice(&self.data);
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.append(&mut buf);
        buf
    }

    /// Decode one section at `*offset`, advancing it past the bytes consumed.
    ///
    /// The stored `size` field governs how many data bytes follow.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let truncated = || Error::InvalidFormat("truncated section entry".to_string());

        let name_index = bytes::read_u16(buf, *offset, Endian::Little).map_err(|_| truncated())?;
        let attributes =
            bytes::read_u32(buf, *offset + 2, Endian::Little).map_err(|_| truncated())?;
        let file_offset =
            bytes::read_u32(buf, *offset + 6, Endian::Little).map_err(|_| truncated())?;
        let size = bytes::read_u32(buf, *offset + 10, Endian::Little).map_err(|_| truncated())?;
        let address =
            bytes::read_u32(buf, *offset + 14, Endian::Little).map_err(|_| truncated())?;
        let alignment =
            bytes::read_u32(buf, *offset + 18, Endian::Little).map_err(|_| truncated())?;
        let processor_type = bytes::read_u8(buf, *offset + 22).map_err(|_| truncated())?;

        let data_start = *offset + Self::HEADER_LEN;
        let data = buf
            .get(data_start..data_start + size as usize)
            .ok_or_else(|| Error::InvalidFormat("truncated section data".to_string()))?
            .to_vec();

        *offset = data_start + size as usize;
        Ok(Section {
            name_index,
            attributes: SectionFlags::from_bits_truncate(attributes),
            offset: file_offset,
            size,
            address,
            alignment,
            processor_type,
            data,
        })
    }
}
