use coil_asm::{Instruction, Opcode, Operand};
use coil_obj::diagnostic::{category, code, subcategory::validation as sub};
use coil_obj::validation::{validate_header_bytes, validate_object};
use coil_obj::{
    Diagnostics, Kind, Object, Relocation, RelocationKind, Section, SectionFlags, Severity,
    Symbol, SymbolFlags,
};

fn text_object() -> (Object, u16) {
    let mut object = Object::new(Kind::ObjectFile);
    let name = object.add_symbol(Symbol::new(".text", SymbolFlags::empty()));
    let section = object.add_section(Section::new(
        name,
        SectionFlags::EXECUTABLE | SectionFlags::READABLE,
    ));
    (object, section)
}

#[test]
fn duplicate_symbol_names_produce_exactly_one_error() {
    let mut object = Object::new(Kind::ObjectFile);
    object.add_symbol(Symbol::new(".text", SymbolFlags::empty()));
    object.add_symbol(Symbol::new(".text", SymbolFlags::empty()));

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));

    assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics.entries());
    let finding = &diagnostics.entries()[0];
    assert_eq!(
        finding.code,
        code(category::VALIDATION, sub::SYMBOL_RESOLUTION, 0x0001)
    );
    assert_eq!(finding.code, 0x0300_0001);
    assert_eq!(finding.severity, Severity::Error);
    assert_eq!(finding.symbol_index, 1);
}

#[test]
fn section_style_symbol_names_are_not_warned_about() {
    let (object, _) = text_object();
    let mut diagnostics = Diagnostics::new();
    assert!(validate_object(&object, &mut diagnostics));
    assert!(diagnostics.is_empty(), "{:?}", diagnostics.entries());
}

#[test]
fn malformed_symbol_names_warn_but_do_not_fail() {
    let mut object = Object::new(Kind::ObjectFile);
    object.add_symbol(Symbol::new("not a name", SymbolFlags::empty()));

    let mut diagnostics = Diagnostics::new();
    assert!(validate_object(&object, &mut diagnostics));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.entries()[0].severity, Severity::Warning);
}

#[test]
fn unbound_symbols_are_fine_but_dangling_bindings_are_not() {
    let mut object = Object::new(Kind::ObjectFile);
    let index = object.add_symbol(Symbol::new("x", SymbolFlags::empty()));
    assert_eq!(object.symbol(index).section_index, Symbol::UNBOUND);

    let mut diagnostics = Diagnostics::new();
    assert!(validate_object(&object, &mut diagnostics));
    assert!(diagnostics.is_empty());

    let mut symbol = object.symbol(index).clone();
    symbol.section_index = 3;
    object.update_symbol(index, symbol).unwrap();

    assert!(!validate_object(&object, &mut diagnostics));
    assert_eq!(
        diagnostics.entries()[0].code,
        code(category::VALIDATION, sub::SYMBOL_RESOLUTION, 0x0002)
    );
}

#[test]
fn relocation_offset_at_section_end_is_out_of_bounds() {
    let (mut object, section) = text_object();
    object
        .update_section_data(section, vec![0, 0, 0, 0])
        .unwrap();
    object.add_relocation(Relocation::new(4, 0, section, RelocationKind::Absolute, 4));

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));

    let relocation_errors: Vec<_> = diagnostics
        .iter()
        .filter(|e| e.code == code(category::VALIDATION, sub::RELOCATION, 0x0003))
        .collect();
    assert_eq!(relocation_errors.len(), 1);
    assert!(relocation_errors[0]
        .message
        .contains("outside section bounds"));

    // Note: the data is four NOP-shaped zero bytes, which scan cleanly, so
    // the relocation error is the only finding.
    assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics.entries());
}

#[test]
fn relocation_index_and_shape_checks() {
    let (mut object, section) = text_object();
    object.update_section_data(section, vec![0; 8]).unwrap();

    object.add_relocation(Relocation {
        offset: 0,
        symbol_index: 9,
        section_index: 9,
        kind: 0x7F,
        size: 3,
    });

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));

    let codes: Vec<u32> = diagnostics.iter().map(|e| e.code).collect();
    assert!(codes.contains(&code(category::VALIDATION, sub::RELOCATION, 0x0001)));
    assert!(codes.contains(&code(category::VALIDATION, sub::RELOCATION, 0x0002)));
    assert!(codes.contains(&code(category::VALIDATION, sub::RELOCATION, 0x0004)));
    assert!(codes.contains(&code(category::VALIDATION, sub::RELOCATION, 0x0005)));
}

#[test]
fn unknown_opcode_resynchronises_after_one_byte() {
    let (mut object, section) = text_object();
    object.update_section_data(section, vec![0xFF]).unwrap();
    object
        .add_instruction(section, &Instruction::new(Opcode::NOP, vec![]))
        .unwrap();

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));

    // One finding for the stray byte; the NOP after it scans cleanly.
    assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics.entries());
    let finding = &diagnostics.entries()[0];
    assert_eq!(
        finding.code,
        code(category::VALIDATION, sub::INSTRUCTION_VALIDITY, 0x0003)
    );
    assert_eq!(finding.severity, Severity::Error);
    assert_eq!(finding.location, 0);
    assert_eq!(finding.section_index, section);
}

#[test]
fn wrong_operand_count_is_an_instruction_validity_error() {
    let (mut object, section) = text_object();
    // MOV with a single operand.
    let mut operand_bytes = Vec::new();
    Operand::variable(1).append(&mut operand_bytes);
    object
        .add_instruction_raw(section, Opcode::MOV as u8, 1, &operand_bytes)
        .unwrap();

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics.entries()[0].code,
        code(category::VALIDATION, sub::INSTRUCTION_VALIDITY, 0x0002)
    );
    assert!(diagnostics.entries()[0].message.contains("MOV"));
}

#[test]
fn non_power_of_two_alignment_warns() {
    let (mut object, section) = text_object();
    let mut updated = object.section(section).clone();
    updated.alignment = 3;
    object.update_section(section, updated).unwrap();

    let mut diagnostics = Diagnostics::new();
    assert!(validate_object(&object, &mut diagnostics));
    assert_eq!(diagnostics.len(), 1);
    let finding = &diagnostics.entries()[0];
    assert_eq!(
        finding.code,
        code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0002)
    );
    assert_eq!(finding.severity, Severity::Warning);
    assert!(!diagnostics.has_errors_with(Severity::Error));
}

#[test]
fn size_data_mismatch_is_an_error() {
    let (mut object, section) = text_object();
    object.set_section_size(section, 100).unwrap();

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));
    assert!(diagnostics.iter().any(|e| {
        e.code == code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0003)
            && e.severity == Severity::Error
    }));
}

#[test]
fn section_name_index_out_of_range_is_an_error() {
    let mut object = Object::new(Kind::ObjectFile);
    object.add_section(Section::new(7, SectionFlags::READABLE));

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));
    assert_eq!(
        diagnostics.entries()[0].code,
        code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0001)
    );
}

#[test]
fn identifier_named_sections_warn_about_their_name() {
    let mut object = Object::new(Kind::ObjectFile);
    let name = object.add_symbol(Symbol::new("text", SymbolFlags::empty()));
    object.add_section(Section::new(name, SectionFlags::READABLE));

    let mut diagnostics = Diagnostics::new();
    assert!(validate_object(&object, &mut diagnostics));
    assert_eq!(diagnostics.len(), 1);
    let finding = &diagnostics.entries()[0];
    assert_eq!(
        finding.code,
        code(category::VALIDATION, sub::SECTION_ALIGNMENT, 0x0004)
    );
    assert_eq!(finding.severity, Severity::Warning);
}

#[test]
fn validation_reports_multiple_findings_in_insertion_order() {
    let mut object = Object::new(Kind::ObjectFile);
    object.add_symbol(Symbol::new("dup", SymbolFlags::empty()));
    object.add_symbol(Symbol::new("dup", SymbolFlags::empty()));
    object.add_section(Section::new(9, SectionFlags::READABLE));
    object.add_relocation(Relocation {
        offset: 0,
        symbol_index: 0,
        section_index: 5,
        kind: 0x01,
        size: 16,
    });

    let mut diagnostics = Diagnostics::new();
    assert!(!validate_object(&object, &mut diagnostics));

    // Symbols first, then sections, then relocations.
    let subcategories: Vec<u8> = diagnostics
        .iter()
        .map(|e| coil_obj::diagnostic::code_subcategory(e.code))
        .collect();
    assert_eq!(
        subcategories,
        [
            sub::SYMBOL_RESOLUTION,
            sub::SECTION_ALIGNMENT,
            sub::RELOCATION,
            sub::RELOCATION
        ]
    );
}

#[test]
fn header_bytes_validation() {
    let object = Object::new(Kind::ObjectFile);
    let encoded = object.encode().unwrap();

    let mut diagnostics = Diagnostics::new();
    assert!(validate_header_bytes(&encoded, &mut diagnostics));
    assert!(diagnostics.is_empty());

    // Too small.
    assert!(!validate_header_bytes(&encoded[..10], &mut diagnostics));
    assert_eq!(
        diagnostics.entries()[0].code,
        code(category::VALIDATION, sub::FORMAT, 0x0001)
    );

    // Wrong magic.
    diagnostics.clear();
    let mut bad_magic = encoded.clone();
    bad_magic[0] = b'X';
    assert!(!validate_header_bytes(&bad_magic, &mut diagnostics));
    assert_eq!(
        diagnostics.entries()[0].code,
        code(category::VALIDATION, sub::FORMAT, 0x0002)
    );

    // Unsupported version.
    diagnostics.clear();
    let mut future = encoded.clone();
    future[4] = 9;
    assert!(!validate_header_bytes(&future, &mut diagnostics));
    assert_eq!(
        diagnostics.entries()[0].code,
        code(category::VALIDATION, sub::FORMAT, 0x0003)
    );

    // file_size beyond the buffer.
    diagnostics.clear();
    let mut oversized = encoded.clone();
    oversized[24] = 0xFF;
    assert!(!validate_header_bytes(&oversized, &mut diagnostics));
    assert_eq!(
        diagnostics.entries()[0].code,
        code(category::VALIDATION, sub::FORMAT, 0x0004)
    );
}

#[test]
fn decoded_objects_validate_like_constructed_ones() {
    let (mut object, section) = text_object();
    object
        .add_instruction(
            section,
            &Instruction::new(
                Opcode::VAR,
                vec![Operand::variable(1), Operand::immediate(0x0300u16)],
            ),
        )
        .unwrap();
    object.add_relocation(Relocation::new(
        0,
        0,
        section,
        RelocationKind::PcRelative,
        4,
    ));

    let decoded = Object::decode(&object.encode().unwrap()).unwrap();
    let mut diagnostics = Diagnostics::new();
    assert!(validate_object(&decoded, &mut diagnostics));
    assert!(diagnostics.is_empty(), "{:?}", diagnostics.entries());
}
