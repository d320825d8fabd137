use coil_types::bytes::{self, Endian};
use coil_types::{Error, Result};

/// The defined relocation kinds.
///
/// [`Relocation`] stores the wire byte raw so that files with undefined kinds
/// can be decoded and then reported by validation; this enum is the checked
/// view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RelocationKind {
    /// Fill with the symbol value.
    Absolute = 0x01,
    /// Symbol value minus the current location.
    Relative = 0x02,
    /// PC-relative, for branch instructions.
    PcRelative = 0x03,
    /// Relative to the owning section's base.
    SectionRelative = 0x04,
    /// Symbol value plus an addend stored in place.
    SymbolAddend = 0x05,
}

impl TryFrom<u8> for RelocationKind {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x01 => RelocationKind::Absolute,
            0x02 => RelocationKind::Relative,
            0x03 => RelocationKind::PcRelative,
            0x04 => RelocationKind::SectionRelative,
            0x05 => RelocationKind::SymbolAddend,
            _ => {
                return Err(Error::InvalidFormat(format!(
                    "unknown relocation kind 0x{byte:02x}"
                )));
            }
        })
    }
}

/// A relocation-table entry.
///
/// Wire form: `offset:u32, symbol_index:u16, section_index:u16, kind:u8,
/// size:u8`, little-endian. `size` must be 1, 2, 4, or 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relocation {
    /// Offset of the patch site within the section.
    pub offset: u32,
    /// Symbol whose final address feeds the patch.
    pub symbol_index: u16,
    /// Section containing the patch site.
    pub section_index: u16,
    /// Relocation kind byte; see [`RelocationKind`].
    pub kind: u8,
    /// Patch width in bytes.
    pub size: u8,
}

impl Relocation {
    /// Encoded size in bytes.
    pub const SIZE: usize = 10;
    /// The permitted patch widths.
    pub const VALID_SIZES: [u8; 4] = [1, 2, 4, 8];

    /// A relocation of the given kind.
    pub fn new(offset: u32, symbol_index: u16, section_index: u16, kind: RelocationKind, size: u8) -> Self {
        Relocation {
            offset,
            symbol_index,
            section_index,
            kind: kind as u8,
            size,
        }
    }

    /// Append the wire encoding to `buf`.
    pub fn append(&self, buf: &mut Vec<u8>) {
        bytes::append_u32(buf, self.offset, Endian::Little);
        bytes::append_u16(buf, self.symbol_index, Endian::Little);
        bytes::append_u16(buf, self.section_index, Endian::Little);
        bytes::append_u8(buf, self.kind);
        bytes::append_u8(buf, self.size);
    }

    /// The wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.append(&mut buf);
        buf
    }

    /// Decode one relocation at `*offset`, advancing it past the bytes
    /// consumed.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Self> {
        let truncated = || Error::InvalidFormat("truncated relocation entry".to_string());

        let relocation = Relocation {
            offset: bytes::read_u32(buf, *offset, Endian::Little).map_err(|_| truncated())?,
            symbol_index: bytes::read_u16(buf, *offset + 4, Endian::Little)
                .map_err(|_| truncated())?,
            section_index: bytes::read_u16(buf, *offset + 6, Endian::Little)
                .map_err(|_| truncated())?,
            kind: bytes::read_u8(buf, *offset + 8).map_err(|_| truncated())?,
            size: bytes::read_u8(buf, *offset + 9).map_err(|_| truncated())?,
        };
        *offset += Self::SIZE;
        Ok(relocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn round_trip_every_kind() {
        for kind in RelocationKind::iter() {
            let relocation = Relocation::new(0x10, 1, 0, kind, 4);
            let encoded = relocation.encode();
            assert_eq!(encoded.len(), Relocation::SIZE);

            let mut offset = 0;
            assert_eq!(Relocation::decode(&encoded, &mut offset).unwrap(), relocation);
            assert_eq!(offset, Relocation::SIZE);
        }
    }

    #[test]
    fn kind_bytes_round_trip() {
        for kind in RelocationKind::iter() {
            assert_eq!(RelocationKind::try_from(kind as u8).unwrap(), kind);
        }
        assert!(RelocationKind::try_from(0x00).is_err());
        assert!(RelocationKind::try_from(0x06).is_err());
    }

    #[test]
    fn undefined_kind_bytes_still_decode() {
        let raw = Relocation {
            offset: 0,
            symbol_index: 0,
            section_index: 0,
            kind: 0x7F,
            size: 4,
        };
        let encoded = raw.encode();
        let mut offset = 0;
        assert_eq!(Relocation::decode(&encoded, &mut offset).unwrap(), raw);
    }

    #[test]
    fn wire_layout_matches_the_format() {
        let relocation = Relocation::new(0x01020304, 0x0506, 0x0708, RelocationKind::Absolute, 8);
        assert_eq!(
            relocation.encode(),
            [0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07, 0x01, 0x08]
        );
    }
}
