use coil_asm::Instruction;
use coil_types::bytes::{self, Endian};
use coil_types::{Error, Result};
use tracing::debug;

use crate::header::{CoilHeader, FormatFlags, OutputHeader};
use crate::relocation::Relocation;
use crate::section::Section;
use crate::symbol::Symbol;

/// The two object flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// Relocatable object file, `"COIL"` header.
    ObjectFile,
    /// Linked output object, `"CILO"` header.
    OutputObject,
}

/// The in-memory representation of a COIL file.
///
/// An object owns its symbols, sections, and relocations exclusively; every
/// cross-reference between them is an index, never a pointer. Entries keep
/// their insertion order through encode and decode.
///
/// Indexed getters ([`symbol`](Self::symbol), [`section`](Self::section),
/// [`relocation`](Self::relocation)) treat an out-of-range index as a
/// programming error and panic; the mutation operations return
/// [`Error::InvalidArg`] instead.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Object {
    header: CoilHeader,
    symbols: Vec<Symbol>,
    sections: Vec<Section>,
    relocations: Vec<Relocation>,
    /// Opaque `"CILO"` metadata span; empty for object files.
    metadata: Vec<u8>,
}

/// Structural equality over entries, flags, and version. Header offsets are
/// an encoding artifact and do not participate.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.header.flags == other.header.flags
            && (self.header.major, self.header.minor, self.header.patch)
                == (other.header.major, other.header.minor, other.header.patch)
            && self.symbols == other.symbols
            && self.sections == other.sections
            && self.relocations == other.relocations
            && self.metadata == other.metadata
    }
}

impl Eq for Object {}

impl Object {
    /// An empty object of the given kind.
    pub fn new(kind: Kind) -> Self {
        let flags = match kind {
            Kind::ObjectFile => FormatFlags::OBJECT_FILE,
            Kind::OutputObject => FormatFlags::OUTPUT_OBJECT,
        };
        Object {
            header: CoilHeader::new(flags),
            symbols: Vec::new(),
            sections: Vec::new(),
            relocations: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// The object flavour, read off the header flags.
    pub fn kind(&self) -> Kind {
        if self.header.flags.contains(FormatFlags::OUTPUT_OBJECT) {
            Kind::OutputObject
        } else {
            Kind::ObjectFile
        }
    }

    /// The header. Offsets and `file_size` reflect the last encode or decode.
    pub fn header(&self) -> &CoilHeader {
        &self.header
    }

    /// Mutable access to the header, e.g. to set format flags.
    pub fn header_mut(&mut self) -> &mut CoilHeader {
        &mut self.header
    }

    // --- symbols ---------------------------------------------------------

    /// Append a symbol, returning its index.
    pub fn add_symbol(&mut self, symbol: Symbol) -> u16 {
        self.symbols.push(symbol);
        (self.symbols.len() - 1) as u16
    }

    /// Replace the symbol at `index`.
    pub fn update_symbol(&mut self, index: u16, symbol: Symbol) -> Result<()> {
        let slot = self
            .symbols
            .get_mut(index as usize)
            .ok_or_else(|| Error::InvalidArg(format!("symbol index {index} out of range")))?;
        *slot = symbol;
        Ok(())
    }

    /// Bind the symbol at `symbol_index` to `section_index`, or unbind it
    /// with [`Symbol::UNBOUND`].
    pub fn set_symbol_section_index(&mut self, symbol_index: u16, section_index: u16) -> Result<()> {
        if section_index != Symbol::UNBOUND && section_index as usize >= self.sections.len() {
            return Err(Error::InvalidArg(format!(
                "section index {section_index} out of range"
            )));
        }
        let symbol = self
            .symbols
            .get_mut(symbol_index as usize)
            .ok_or_else(|| Error::InvalidArg(format!("symbol index {symbol_index} out of range")))?;
        symbol.section_index = section_index;
        Ok(())
    }

    /// The symbol at `index`. Panics when out of range.
    pub fn symbol(&self, index: u16) -> &Symbol {
        &self.symbols[index as usize]
    }

    /// The symbol at `index`, if any.
    pub fn get_symbol(&self, index: u16) -> Option<&Symbol> {
        self.symbols.get(index as usize)
    }

    /// Index of the first symbol named `name`.
    pub fn find_symbol(&self, name: &str) -> Option<u16> {
        self.symbols
            .iter()
            .position(|symbol| symbol.name == name)
            .map(|index| index as u16)
    }

    /// Number of symbols.
    pub fn symbol_count(&self) -> u16 {
        self.symbols.len() as u16
    }

    /// The symbols in insertion order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    // --- sections --------------------------------------------------------

    /// Append a section, returning its index.
    pub fn add_section(&mut self, section: Section) -> u16 {
        self.sections.push(section);
        (self.sections.len() - 1) as u16
    }

    /// Replace the section at `index`.
    pub fn update_section(&mut self, index: u16, section: Section) -> Result<()> {
        let slot = self.section_mut(index)?;
        *slot = section;
        Ok(())
    }

    /// Replace the data of the section at `index`, keeping its `size` field
    /// in step.
    pub fn update_section_data(&mut self, index: u16, data: Vec<u8>) -> Result<()> {
        self.section_mut(index)?.set_data(data);
        Ok(())
    }

    /// Drop the data of the section at `index` and zero its size.
    pub fn clear_section_data(&mut self, index: u16) -> Result<()> {
        self.section_mut(index)?.set_data(Vec::new());
        Ok(())
    }

    /// Overwrite the `size` field of the section at `index` without touching
    /// its data. Validation flags the mismatch this can introduce.
    pub fn set_section_size(&mut self, index: u16, size: u32) -> Result<()> {
        self.section_mut(index)?.size = size;
        Ok(())
    }

    /// The section at `index`. Panics when out of range.
    pub fn section(&self, index: u16) -> &Section {
        &self.sections[index as usize]
    }

    /// The section at `index`, if any.
    pub fn get_section(&self, index: u16) -> Option<&Section> {
        self.sections.get(index as usize)
    }

    /// Number of sections.
    pub fn section_count(&self) -> u16 {
        self.sections.len() as u16
    }

    /// The sections in insertion order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn section_mut(&mut self, index: u16) -> Result<&mut Section> {
        self.sections
            .get_mut(index as usize)
            .ok_or_else(|| Error::InvalidArg(format!("section index {index} out of range")))
    }

    // --- relocations -----------------------------------------------------

    /// Append a relocation.
    pub fn add_relocation(&mut self, relocation: Relocation) {
        self.relocations.push(relocation);
    }

    /// The relocation at `index`. Panics when out of range.
    pub fn relocation(&self, index: u16) -> &Relocation {
        &self.relocations[index as usize]
    }

    /// The relocation at `index`, if any.
    pub fn get_relocation(&self, index: u16) -> Option<&Relocation> {
        self.relocations.get(index as usize)
    }

    /// Number of relocations.
    pub fn relocation_count(&self) -> u16 {
        self.relocations.len() as u16
    }

    /// The relocations in insertion order.
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    // --- instructions ----------------------------------------------------

    /// Encode `instruction` and append it to the data of the section at
    /// `section_index`. This is the canonical append path.
    pub fn add_instruction(&mut self, section_index: u16, instruction: &Instruction) -> Result<()> {
        let section = self.section_mut(section_index)?;
        instruction.append(&mut section.data);
        section.size = section.data.len() as u32;
        Ok(())
    }

    /// Append a pre-encoded instruction: `opcode`, `operand_count`, then the
    /// already-encoded operand bytes.
    ///
    /// The caller must pass the number of operands encoded in
    /// `operand_bytes`; the layout then agrees byte-for-byte with
    /// [`add_instruction`](Self::add_instruction).
    pub fn add_instruction_raw(
        &mut self,
        section_index: u16,
        opcode: u8,
        operand_count: u8,
        operand_bytes: &[u8],
    ) -> Result<()> {
        let section = self.section_mut(section_index)?;
        section.data.push(opcode);
        section.data.push(operand_count);
        section.data.extend_from_slice(operand_bytes);
        section.size = section.data.len() as u32;
        Ok(())
    }

    // --- metadata --------------------------------------------------------

    /// The opaque `"CILO"` metadata span.
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Replace the opaque metadata span. Only encoded for output objects.
    pub fn set_metadata(&mut self, metadata: Vec<u8>) {
        self.metadata = metadata;
    }

    // --- encode ----------------------------------------------------------

    /// Encode the object into a fresh buffer.
    ///
    /// Layout: `[Header | SymbolTable | SectionTable | RelocationTable?]`,
    /// each table a `u32` count followed by its entries. An empty symbol or
    /// section table occupies no bytes at all; its offset equals the next
    /// table's. Output objects use the 24-byte `"CILO"` header, carry no
    /// relocation table, and append the metadata span last.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let symbol_table_len = table_len(self.symbols.iter().map(Symbol::encoded_len));
        let section_table_len = table_len(self.sections.iter().map(Section::encoded_len));

        match self.kind() {
            Kind::ObjectFile => {
                let reloc_table_len = table_len(
                    self.relocations.iter().map(|_| Relocation::SIZE),
                );

                let symbol_offset = CoilHeader::SIZE;
                let section_offset = symbol_offset + symbol_table_len;
                let reloc_offset = if self.relocations.is_empty() {
                    0
                } else {
                    section_offset + section_table_len
                };
                let file_size = section_offset + section_table_len + reloc_table_len;

                let mut header = self.header.clone();
                header.symbol_offset = symbol_offset as u32;
                header.section_offset = section_offset as u32;
                header.reloc_offset = reloc_offset as u32;
                header.file_size = file_size as u32;

                let mut buf = Vec::with_capacity(file_size);
                header.append(&mut buf);
                append_table(&mut buf, &self.symbols, Symbol::append);
                append_table(&mut buf, &self.sections, Section::append);
                if !self.relocations.is_empty() {
                    append_table(&mut buf, &self.relocations, Relocation::append);
                }

                debug!(
                    symbols = self.symbols.len(),
                    sections = self.sections.len(),
                    relocations = self.relocations.len(),
                    file_size,
                    "encoded object"
                );
                debug_assert_eq!(buf.len(), file_size);
                Ok(buf)
            }
            Kind::OutputObject => {
                if !self.relocations.is_empty() {
                    return Err(Error::BadState(
                        "output objects cannot carry relocations".to_string(),
                    ));
                }

                let symbol_offset = OutputHeader::SIZE;
                let section_offset = symbol_offset + symbol_table_len;
                let tables_end = section_offset + section_table_len;
                let meta_offset = if self.metadata.is_empty() { 0 } else { tables_end };
                let file_size = tables_end + self.metadata.len();

                let header = OutputHeader {
                    major: self.header.major,
                    minor: self.header.minor,
                    patch: self.header.patch,
                    flags: self.header.flags,
                    symbol_offset: symbol_offset as u32,
                    section_offset: section_offset as u32,
                    meta_offset: meta_offset as u32,
                    file_size: file_size as u32,
                };

                let mut buf = Vec::with_capacity(file_size);
                header.append(&mut buf);
                append_table(&mut buf, &self.symbols, Symbol::append);
                append_table(&mut buf, &self.sections, Section::append);
                buf.extend_from_slice(&self.metadata);

                debug!(
                    symbols = self.symbols.len(),
                    sections = self.sections.len(),
                    metadata = self.metadata.len(),
                    file_size,
                    "encoded output object"
                );
                debug_assert_eq!(buf.len(), file_size);
                Ok(buf)
            }
        }
    }

    // --- decode ----------------------------------------------------------

    /// Decode a `"COIL"` object file.
    ///
    /// Rejects buffers that do not start with the `"COIL"` magic, whose
    /// `file_size` exceeds the buffer, or whose table offsets fall outside
    /// the file.
    pub fn decode(buf: &[u8]) -> Result<Object> {
        let mut cursor = 0;
        let header = CoilHeader::decode(buf, &mut cursor)?;
        if !header.is_valid() {
            return Err(Error::InvalidFormat("invalid object header".to_string()));
        }

        let file_size = header.file_size as usize;
        if file_size > buf.len() {
            return Err(Error::InvalidFormat(format!(
                "file size {file_size} exceeds buffer length {}",
                buf.len()
            )));
        }

        let symbol_offset = header.symbol_offset as usize;
        let section_offset = header.section_offset as usize;
        let reloc_offset = header.reloc_offset as usize;
        if symbol_offset > file_size
            || section_offset > file_size
            || symbol_offset > section_offset
            || (reloc_offset > 0 && reloc_offset >= file_size)
        {
            return Err(Error::InvalidFormat("table offset outside file".to_string()));
        }

        // A table's span running to zero bytes means it is empty and carries
        // no count word.
        let symbols = decode_table(
            buf,
            symbol_offset,
            symbol_offset == section_offset,
            Symbol::decode,
        )?;
        let section_table_end = if reloc_offset > 0 { reloc_offset } else { file_size };
        let sections = decode_table(
            buf,
            section_offset,
            section_offset == section_table_end,
            Section::decode,
        )?;
        let relocations = decode_table(buf, reloc_offset, reloc_offset == 0, Relocation::decode)?;

        debug!(
            symbols = symbols.len(),
            sections = sections.len(),
            relocations = relocations.len(),
            "decoded object"
        );

        Ok(Object {
            header,
            symbols,
            sections,
            relocations,
            metadata: Vec::new(),
        })
    }

    /// Decode a `"CILO"` output object.
    pub fn decode_output(buf: &[u8]) -> Result<Object> {
        let mut cursor = 0;
        let header = OutputHeader::decode(buf, &mut cursor)?;
        if !header.is_valid() {
            return Err(Error::InvalidFormat("invalid output header".to_string()));
        }

        let file_size = header.file_size as usize;
        if file_size > buf.len() {
            return Err(Error::InvalidFormat(format!(
                "file size {file_size} exceeds buffer length {}",
                buf.len()
            )));
        }

        let symbol_offset = header.symbol_offset as usize;
        let section_offset = header.section_offset as usize;
        let meta_offset = header.meta_offset as usize;
        if symbol_offset > file_size
            || section_offset > file_size
            || symbol_offset > section_offset
            || (meta_offset > 0 && meta_offset > file_size)
        {
            return Err(Error::InvalidFormat("table offset outside file".to_string()));
        }

        let symbols = decode_table(
            buf,
            symbol_offset,
            symbol_offset == section_offset,
            Symbol::decode,
        )?;
        let section_table_end = if meta_offset > 0 { meta_offset } else { file_size };
        let sections = decode_table(
            buf,
            section_offset,
            section_offset == section_table_end,
            Section::decode,
        )?;
        let metadata = if meta_offset > 0 {
            buf[meta_offset..file_size].to_vec()
        } else {
            Vec::new()
        };

        Ok(Object {
            header: CoilHeader {
                major: header.major,
                minor: header.minor,
                patch: header.patch,
                flags: header.flags,
                symbol_offset: header.symbol_offset,
                section_offset: header.section_offset,
                reloc_offset: 0,
                debug_offset: 0,
                file_size: header.file_size,
            },
            symbols,
            sections,
            relocations: Vec::new(),
            metadata,
        })
    }
}

/// Encoded length of a count-prefixed table; an empty table occupies nothing.
fn table_len(entries: impl Iterator<Item = usize>) -> usize {
    let mut total = 0;
    let mut any = false;
    for len in entries {
        any = true;
        total += len;
    }
    if any {
        4 + total
    } else {
        0
    }
}

fn append_table<T>(buf: &mut Vec<u8>, entries: &[T], append: impl Fn(&T, &mut Vec<u8>)) {
    if entries.is_empty() {
        return;
    }
    bytes::append_u32(buf, entries.len() as u32, Endian::Little);
    for entry in entries {
        append(entry, buf);
    }
}

fn decode_table<T>(
    buf: &[u8],
    offset: usize,
    empty: bool,
    decode: impl Fn(&[u8], &mut usize) -> Result<T>,
) -> Result<Vec<T>> {
    if empty {
        return Ok(Vec::new());
    }

    let mut cursor = offset;
    let count = bytes::read_u32(buf, cursor, Endian::Little)
        .map_err(|_| Error::InvalidFormat("truncated table count".to_string()))?;
    cursor += 4;

    let mut entries = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        entries.push(decode(buf, &mut cursor)?);
    }
    Ok(entries)
}
