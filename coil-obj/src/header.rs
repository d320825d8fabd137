use bitflags::bitflags;
use coil_types::bytes::{self, Endian};
use coil_types::{Error, Result};

bitflags! {
    /// Format flags carried in byte 7 of both headers.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FormatFlags: u8 {
        /// Relocatable object file (`.coil`).
        const OBJECT_FILE = 0x01;
        /// Linked output object (`.coilo`).
        const OUTPUT_OBJECT = 0x02;
        /// Debug information is present.
        const DEBUG_INFO = 0x04;
        /// Payload claims big-endian encoding. Currently recorded but never
        /// honoured; see the encoding note on [`CoilHeader`].
        const BIG_ENDIAN = 0x08;
    }
}

// TODO: honour FormatFlags::BIG_ENDIAN on encode and decode once the format
// revision that specifies payload byte order lands. Until then both headers
// are written and read little-endian regardless of the flag.

/// The 28-byte `"COIL"` object header.
///
/// ```text
/// magic[4] major minor patch flags
/// symbol_offset section_offset reloc_offset debug_offset file_size
/// ```
///
/// `reloc_offset` and `debug_offset` are 0 when the table is absent. All
/// multi-byte fields are little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoilHeader {
    /// Format major version.
    pub major: u8,
    /// Format minor version.
    pub minor: u8,
    /// Format patch version.
    pub patch: u8,
    /// Format flags.
    pub flags: FormatFlags,
    /// Offset of the symbol table.
    pub symbol_offset: u32,
    /// Offset of the section table.
    pub section_offset: u32,
    /// Offset of the relocation table, 0 when absent.
    pub reloc_offset: u32,
    /// Offset of the debug information, 0 when absent.
    pub debug_offset: u32,
    /// Total encoded size in bytes.
    pub file_size: u32,
}

impl CoilHeader {
    /// The magic bytes `"COIL"`.
    pub const MAGIC: [u8; 4] = *b"COIL";
    /// Encoded size in bytes.
    pub const SIZE: usize = 28;
    /// Current format version.
    pub const VERSION: (u8, u8, u8) = (1, 0, 0);

    /// A header with default flags and all tables at the end of the header.
    pub fn new(flags: FormatFlags) -> Self {
        CoilHeader {
            major: Self::VERSION.0,
            minor: Self::VERSION.1,
            patch: Self::VERSION.2,
            flags,
            symbol_offset: Self::SIZE as u32,
            section_offset: Self::SIZE as u32,
            reloc_offset: 0,
            debug_offset: 0,
            file_size: Self::SIZE as u32,
        }
    }

    /// Basic well-formedness: table offsets and the file size are non-zero.
    pub fn is_valid(&self) -> bool {
        self.symbol_offset != 0 && self.section_offset != 0 && self.file_size != 0
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&Self::MAGIC);
        buf.push(self.major);
        buf.push(self.minor);
        buf.push(self.patch);
        buf.push(self.flags.bits());
        bytes::append_u32(buf, self.symbol_offset, Endian::Little);
        bytes::append_u32(buf, self.section_offset, Endian::Little);
        bytes::append_u32(buf, self.reloc_offset, Endian::Little);
        bytes::append_u32(buf, self.debug_offset, Endian::Little);
        bytes::append_u32(buf, self.file_size, Endian::Little);
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.append(&mut buf);
        buf
    }

    /// Decode a header at `*offset`, advancing it past the bytes consumed.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let bytes_in = buf
            .get(*offset..*offset + Self::SIZE)
            .ok_or_else(|| Error::InvalidFormat("buffer too small for object header".to_string()))?;

        if bytes_in[..4] != Self::MAGIC {
            return Err(Error::InvalidFormat("bad magic, expected \"COIL\"".to_string()));
        }

        let header = CoilHeader {
            major: bytes_in[4],
            minor: bytes_in[5],
            patch: bytes_in[6],
            flags: FormatFlags::from_bits_truncate(bytes_in[7]),
            symbol_offset: bytes::read_u32(bytes_in, 8, Endian::Little)?,
            section_offset: bytes::read_u32(bytes_in, 12, Endian::Little)?,
            reloc_offset: bytes::read_u32(bytes_in, 16, Endian::Little)?,
            debug_offset: bytes::read_u32(bytes_in, 20, Endian::Little)?,
            file_size: bytes::read_u32(bytes_in, 24, Endian::Little)?,
        };
        *offset += Self::SIZE;
        Ok(header)
    }
}

impl Default for CoilHeader {
    fn default() -> Self {
        Self::new(FormatFlags::OBJECT_FILE)
    }
}

/// The 24-byte `"CILO"` output header.
///
/// Identical to [`CoilHeader`] through byte 11, then
/// `section_offset, meta_offset, file_size`. The metadata region is an opaque
/// byte span pending a future format revision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputHeader {
    /// Format major version.
    pub major: u8,
    /// Format minor version.
    pub minor: u8,
    /// Format patch version.
    pub patch: u8,
    /// Format flags.
    pub flags: FormatFlags,
    /// Offset of the symbol table.
    pub symbol_offset: u32,
    /// Offset of the section table.
    pub section_offset: u32,
    /// Offset of the metadata region, 0 when absent.
    pub meta_offset: u32,
    /// Total encoded size in bytes.
    pub file_size: u32,
}

impl OutputHeader {
    /// The magic bytes `"CILO"`.
    pub const MAGIC: [u8; 4] = *b"CILO";
    /// Encoded size in bytes.
    pub const SIZE: usize = 24;

    /// A header with default flags and all tables at the end of the header.
    pub fn new(flags: FormatFlags) -> Self {
        OutputHeader {
            major: CoilHeader::VERSION.0,
            minor: CoilHeader::VERSION.1,
            patch: CoilHeader::VERSION.2,
            flags,
            symbol_offset: Self::SIZE as u32,
            section_offset: Self::SIZE as u32,
            meta_offset: 0,
            file_size: Self::SIZE as u32,
        }
    }

    /// Basic well-formedness: table offsets and the file size are non-zero.
    pub fn is_valid(&self) -> bool {
        self.symbol_offset != 0 && self.section_offset != 0 && self.file_size != 0
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&Self::MAGIC);
        buf.push(self.major);
        buf.push(self.minor);
        buf.push(self.patch);
        buf.push(self.flags.bits());
        bytes::append_u32(buf, self.symbol_offset, Endian::Little);
        bytes::append_u32(buf, self.section_offset, Endian::Little);
        bytes::append_u32(buf, self.meta_offset, Endian::Little);
        bytes::append_u32(buf, self.file_size, Endian::Little);
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.append(&mut buf);
        buf
    }

    /// Decode a header at `*offset`, advancing it past the bytes consumed.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let bytes_in = buf
            .get(*offset..*offset + Self::SIZE)
            .ok_or_else(|| Error::InvalidFormat("buffer too small for output header".to_string()))?;

        if bytes_in[..4] != Self::MAGIC {
            return Err(Error::InvalidFormat("bad magic, expected \"CILO\"".to_string()));
        }

        let header = OutputHeader {
            major: bytes_in[4],
            minor: bytes_in[5],
            patch: bytes_in[6],
            flags: FormatFlags::from_bits_truncate(bytes_in[7]),
            symbol_offset: bytes::read_u32(bytes_in, 8, Endian::Little)?,
            section_offset: bytes::read_u32(bytes_in, 12, Endian::Little)?,
            meta_offset: bytes::read_u32(bytes_in, 16, Endian::Little)?,
            file_size: bytes::read_u32(bytes_in, 20, Endian::Little)?,
        };
        *offset += Self::SIZE;
        Ok(header)
    }
}

impl Default for OutputHeader {
    fn default() -> Self {
        Self::new(FormatFlags::OUTPUT_OBJECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_header_round_trip() {
        let mut header = CoilHeader::new(FormatFlags::OBJECT_FILE | FormatFlags::DEBUG_INFO);
        header.symbol_offset = 28;
        header.section_offset = 100;
        header.reloc_offset = 200;
        header.file_size = 300;

        let encoded = header.encode();
        assert_eq!(encoded.len(), CoilHeader::SIZE);
        assert_eq!(&encoded[..4], b"COIL");

        let mut offset = 0;
        assert_eq!(CoilHeader::decode(&encoded, &mut offset).unwrap(), header);
        assert_eq!(offset, CoilHeader::SIZE);
    }

    #[test]
    fn output_header_round_trip() {
        let header = OutputHeader::default();
        let encoded = header.encode();
        assert_eq!(encoded.len(), OutputHeader::SIZE);
        assert_eq!(&encoded[..4], b"CILO");

        let mut offset = 0;
        assert_eq!(OutputHeader::decode(&encoded, &mut offset).unwrap(), header);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut encoded = CoilHeader::default().encode();
        encoded[0] = b'X';
        let mut offset = 0;
        assert!(matches!(
            CoilHeader::decode(&encoded, &mut offset),
            Err(Error::InvalidFormat(_))
        ));

        // An output header is not an object header.
        let cilo = OutputHeader::default().encode();
        let mut offset = 0;
        assert!(CoilHeader::decode(&cilo, &mut offset).is_err());
    }

    #[test]
    fn header_fields_are_little_endian() {
        let mut header = CoilHeader::default();
        header.symbol_offset = 0x0102_0304;
        let encoded = header.encode();
        assert_eq!(encoded[8..12], [0x04, 0x03, 0x02, 0x01]);
    }
}
