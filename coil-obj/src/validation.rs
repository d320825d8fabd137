//! Validation of objects and their parts.
//!
//! Every check appends findings to a [`Diagnostics`] sink and keeps going;
//! a pass reports everything it can see. The boolean results say whether any
//! error-severity finding was produced by that check.

use std::collections::HashSet;

use coil_asm::Instruction;
use coil_types::TypeWord;
use tracing::debug;

use crate::diagnostic::{category, code, subcategory::validation as sub, Diagnostics, ErrorInfo, Severity};
use crate::header::CoilHeader;
use crate::object::Object;
use crate::relocation::{Relocation, RelocationKind};
use crate::section::SectionFlags;
use crate::symbol::Symbol;

/// Validate a whole object: symbol table, section table, relocations, and the
/// instruction stream of every executable section.
pub fn validate_object(object: &Object, diagnostics: &mut Diagnostics) -> bool {
    let before = diagnostics.len();

    let mut ok = validate_symbol_table(object, diagnostics);
    ok &= validate_section_table(object, diagnostics);
    ok &= validate_relocations(object, diagnostics);
    for index in 0..object.section_count() {
        ok &= validate_section_data(object, index, diagnostics);
    }

    debug!(
        findings = diagnostics.len() - before,
        ok, "validated object"
    );
    ok
}

/// Validate the header of an encoded object without decoding the rest.
pub fn validate_header_bytes(buf: &[u8], diagnostics: &mut Diagnostics) -> bool {
    if buf.len() < CoilHeader::SIZE {
        diagnostics.push(ErrorInfo::new(
            code(category::VALIDATION, sub::FORMAT, 0x0001),
            "file is too small to contain an object header",
            Severity::Error,
        ));
        return false;
    }

    if buf[..4] != CoilHeader::MAGIC {
        diagnostics.push(ErrorInfo::new(
            code(category::VALIDATION, sub::FORMAT, 0x0002),
            "invalid magic number in object header",
            Severity::Error,
        ));
        return false;
    }

    let mut cursor = 0;
    let header = match CoilHeader::decode(buf, &mut cursor) {
        Ok(header) => header,
        Err(e) => {
            diagnostics.push(ErrorInfo::new(
                code(category::VALIDATION, sub::FORMAT, 0x0006),
                format!("error decoding object header: {e}"),
                Severity::Error,
            ));
            return false;
        }
    };

    if header.major > CoilHeader::VERSION.0 {
        diagnostics.push(ErrorInfo::new(
            code(category::VALIDATION, sub::FORMAT, 0x0003),
            format!(
                "unsupported format version {}.{}.{}",
                header.major, header.minor, header.patch
            ),
            Severity::Error,
        ));
        return false;
    }

    if header.file_size as usize > buf.len() {
        diagnostics.push(ErrorInfo::new(
            code(category::VALIDATION, sub::FORMAT, 0x0004),
            "file size in header exceeds the actual file size",
            Severity::Error,
        ));
        return false;
    }

    // Empty tables place their offset at the end of the file, hence <=.
    let file_size = header.file_size;
    if header.symbol_offset > file_size
        || header.section_offset > file_size
        || (header.reloc_offset > 0 && header.reloc_offset >= file_size)
        || (header.debug_offset > 0 && header.debug_offset >= file_size)
    {
        diagnostics.push(ErrorInfo::new(
            code(category::VALIDATION, sub::FORMAT, 0x0005),
            "invalid table offset in object header",
            Severity::Error,
        ));
        return false;
    }

    true
}

/// Validate one instruction: the operand list must satisfy the opcode's
/// arity contract.
pub fn validate_instruction(instruction: &Instruction, diagnostics: &mut Diagnostics) -> bool {
    match instruction.validate() {
        Ok(()) => true,
        Err(e) => {
            diagnostics.push(ErrorInfo::new(
                code(category::VALIDATION, sub::INSTRUCTION_VALIDITY, 0x0002),
                e.to_string(),
                Severity::Error,
            ));
            false
        }
    }
}

/// Validate the symbol table: unique non-empty names, section bindings in
/// range, and well-formed names.
pub fn validate_symbol_table(object: &Object, diagnostics: &mut Diagnostics) -> bool {
    let mut ok = true;
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, symbol) in object.symbols().iter().enumerate() {
        let index = index as u16;

        if !symbol.name.is_empty() && !seen.insert(symbol.name.as_str()) {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::SYMBOL_RESOLUTION, 0x0001),
                    format!("duplicate symbol name: {}", symbol.name),
                    Severity::Error,
                )
                .for_symbol(index),
            );
            ok = false;
        }

        if symbol.section_index != Symbol::UNBOUND
            && symbol.section_index >= object.section_count()
        {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::SYMBOL_RESOLUTION, 0x0002),
                    format!(
                        "symbol references invalid section index: {}",
                        symbol.section_index
                    ),
                    Severity::Error,
                )
                .for_symbol(index),
            );
            ok = false;
        }

        // Section labels live in the symbol table, so a section-style name
        // is as well-formed as a plain identifier.
        if !symbol.name.is_empty()
            && !is_valid_identifier(&symbol.name)
            && !is_valid_section_name(&symbol.name)
        {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::SYMBOL_RESOLUTION, 0x0003),
                    format!("invalid symbol name: {}", symbol.name),
                    Severity::Warning,
                )
                .for_symbol(index),
            );
        }
    }

    ok
}

/// Validate the section table: name indices in range, sane alignment, and
/// `size` in step with the data.
pub fn validate_section_table(object: &Object, diagnostics: &mut Diagnostics) -> bool {
    let mut ok = true;

    for (index, section) in object.sections().iter().enumerate() {
        let index = index as u16;

        if section.name_index >= object.symbol_count() {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0001),
                    format!("section references invalid name index: {}", section.name_index),
                    Severity::Error,
                )
                .for_section(index),
            );
            ok = false;
        } else {
            let name = &object.symbol(section.name_index).name;
            if !name.is_empty() && !is_valid_section_name(name) {
                diagnostics.push(
                    ErrorInfo::new(
                        code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0004),
                        format!("invalid section name: {name}"),
                        Severity::Warning,
                    )
                    .for_section(index),
                );
            }
        }

        if section.alignment > 0 && !section.alignment.is_power_of_two() {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0002),
                    format!("section alignment is not a power of 2: {}", section.alignment),
                    Severity::Warning,
                )
                .for_section(index),
            );
        }

        if section.size as usize != section.data.len() {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0003),
                    format!(
                        "section size doesn't match data size: {} vs {}",
                        section.size,
                        section.data.len()
                    ),
                    Severity::Error,
                )
                .for_section(index),
            );
            ok = false;
        }
    }

    ok
}

/// Validate the instruction stream of the section at `section_index`.
///
/// Only executable sections are scanned. On a decode failure the scan records
/// the error and advances a single byte, so one corrupt instruction does not
/// hide the rest of the stream.
pub fn validate_section_data(
    object: &Object,
    section_index: u16,
    diagnostics: &mut Diagnostics,
) -> bool {
    let section = match object.get_section(section_index) {
        Some(section) => section,
        None => return true,
    };
    if !section.attributes.contains(SectionFlags::EXECUTABLE) {
        return true;
    }

    let mut ok = true;
    let mut offset = 0;
    while offset < section.data.len() {
        match Instruction::decode(&section.data, &mut offset) {
            Ok(instruction) => {
                if !validate_instruction(&instruction, diagnostics) {
                    ok = false;
                }
            }
            Err(e) => {
                diagnostics.push(
                    ErrorInfo::new(
                        code(category::VALIDATION, sub::INSTRUCTION_VALIDITY, 0x0003),
                        format!("error decoding instruction at offset {offset}: {e}"),
                        Severity::Error,
                    )
                    .at_location(offset as u32)
                    .for_section(section_index),
                );
                ok = false;
                offset += 1;
            }
        }
    }

    ok
}

/// Validate the relocation table: indices in range, offsets inside the
/// section, defined kind and size.
pub fn validate_relocations(object: &Object, diagnostics: &mut Diagnostics) -> bool {
    let mut ok = true;

    for relocation in object.relocations() {
        let Relocation {
            offset,
            symbol_index,
            section_index,
            kind,
            size,
        } = *relocation;

        if symbol_index >= object.symbol_count() {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::RELOCATION, 0x0001),
                    format!("relocation references invalid symbol index: {symbol_index}"),
                    Severity::Error,
                )
                .for_symbol(symbol_index)
                .for_section(section_index),
            );
            ok = false;
        }

        if section_index >= object.section_count() {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::RELOCATION, 0x0002),
                    format!("relocation references invalid section index: {section_index}"),
                    Severity::Error,
                )
                .for_symbol(symbol_index)
                .for_section(section_index),
            );
            ok = false;
        } else if offset >= object.section(section_index).size {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::RELOCATION, 0x0003),
                    format!(
                        "relocation offset is outside section bounds: {} >= {}",
                        offset,
                        object.section(section_index).size
                    ),
                    Severity::Error,
                )
                .at_location(offset)
                .for_symbol(symbol_index)
                .for_section(section_index),
            );
            ok = false;
        }

        if RelocationKind::try_from(kind).is_err() {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::RELOCATION, 0x0004),
                    format!("invalid relocation type: {kind}"),
                    Severity::Error,
                )
                .for_symbol(symbol_index)
                .for_section(section_index),
            );
            ok = false;
        }

        if !Relocation::VALID_SIZES.contains(&size) {
            diagnostics.push(
                ErrorInfo::new(
                    code(category::VALIDATION, sub::RELOCATION, 0x0005),
                    format!("invalid relocation size: {size}"),
                    Severity::Error,
                )
                .for_symbol(symbol_index)
                .for_section(section_index),
            );
            ok = false;
        }
    }

    ok
}

/// Check that `src` can be used where `dst` is expected, reporting a
/// type-check error when it cannot.
pub fn validate_type_compatibility(
    src: TypeWord,
    dst: TypeWord,
    diagnostics: &mut Diagnostics,
) -> bool {
    if src.is_compatible_with(dst) {
        return true;
    }
    diagnostics.push(ErrorInfo::new(
        code(category::VALIDATION, sub::TYPE_CHECK, 0x0001),
        format!("incompatible types: {src} and {dst}"),
        Severity::Error,
    ));
    false
}

/// Check that `address` is naturally aligned for a value of type `ty`.
pub fn validate_memory_alignment(
    address: u32,
    ty: TypeWord,
    diagnostics: &mut Diagnostics,
) -> bool {
    let alignment = if ty.is_integer() || ty.is_float() || ty.is_vector() || ty.is_pointer() {
        ty.size().max(1)
    } else {
        1
    };

    if address % alignment == 0 {
        return true;
    }
    diagnostics.push(
        ErrorInfo::new(
            code(category::VALIDATION, sub::MEMORY_SAFETY, 0x0001),
            format!(
                "misaligned memory access: address 0x{address:x} for type {ty} (requires {alignment}-byte alignment)"
            ),
            Severity::Error,
        )
        .at_location(address),
    );
    false
}

/// Check that the access `[address, address + size)` stays below `boundary`.
pub fn validate_memory_access(
    address: u32,
    size: u32,
    boundary: u32,
    diagnostics: &mut Diagnostics,
) -> bool {
    let in_bounds = address
        .checked_add(size)
        .map(|end| end <= boundary)
        .unwrap_or(false);
    if in_bounds {
        return true;
    }
    diagnostics.push(
        ErrorInfo::new(
            code(category::VALIDATION, sub::MEMORY_SAFETY, 0x0002),
            format!(
                "memory access out of bounds: address 0x{address:x} with size {size} exceeds boundary 0x{boundary:x}"
            ),
            Severity::Error,
        )
        .at_location(address),
    );
    false
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `\.[A-Za-z_][A-Za-z0-9_.]*`
pub fn is_valid_section_name(name: &str) -> bool {
    let rest = match name.strip_prefix('.') {
        Some(rest) => rest,
        None => return false,
    };
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use coil_types::ty;
    use rstest::rstest;

    #[rstest]
    #[case("main", true)]
    #[case("_start", true)]
    #[case("x86_64", true)]
    #[case("", false)]
    #[case("9lives", false)]
    #[case("has space", false)]
    #[case(".text", false)]
    fn identifier_pattern(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(is_valid_identifier(name), ok);
    }

    #[rstest]
    #[case(".text", true)]
    #[case(".rodata", true)]
    #[case(".debug_info", true)]
    #[case(".text.hot", true)]
    #[case("text", false)]
    #[case(".", false)]
    #[case(".9", false)]
    #[case("..", false)]
    fn section_name_pattern(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(is_valid_section_name(name), ok);
    }

    #[test]
    fn incompatible_types_are_reported() {
        let mut diagnostics = Diagnostics::new();
        assert!(validate_type_compatibility(ty::INT32, ty::INT64, &mut diagnostics));
        assert!(diagnostics.is_empty());

        assert!(!validate_type_compatibility(ty::INT64, ty::INT32, &mut diagnostics));
        assert_eq!(diagnostics.len(), 1);
        let finding = &diagnostics.entries()[0];
        assert_eq!(finding.code, 0x0300_0001);
        assert!(finding.message.contains("INT64"));
    }

    #[test]
    fn alignment_is_derived_from_the_type_size() {
        let mut diagnostics = Diagnostics::new();
        assert!(validate_memory_alignment(0x1000, ty::INT64, &mut diagnostics));
        assert!(validate_memory_alignment(0x1004, ty::INT32, &mut diagnostics));
        assert!(validate_memory_alignment(0x0001, ty::INT8, &mut diagnostics));
        assert!(validate_memory_alignment(0x0003, ty::VOID, &mut diagnostics));
        assert!(diagnostics.is_empty());

        assert!(!validate_memory_alignment(0x1002, ty::INT64, &mut diagnostics));
        assert!(!validate_memory_alignment(0x1001, ty::V128, &mut diagnostics));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn memory_access_bounds() {
        let mut diagnostics = Diagnostics::new();
        assert!(validate_memory_access(0, 16, 16, &mut diagnostics));
        assert!(!validate_memory_access(8, 16, 16, &mut diagnostics));
        assert!(!validate_memory_access(u32::MAX, 1, u32::MAX, &mut diagnostics));
        assert_eq!(diagnostics.len(), 2);
    }
}
