//! Structured diagnostics produced by validation.
//!
//! Every finding carries a 32-bit code laid out as
//! `(category << 24) | (subcategory << 16) | specific`. The category and
//! subcategory namespaces mirror the wire-level error-code tables of the
//! format; validation findings about structure (symbols, sections,
//! relocations, headers) share the low subcategory values with the semantic
//! checks, as the codes have always been assigned.

use core::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Prevents successful completion.
    Error,
    /// A potential issue that is not fatal.
    Warning,
    /// Informational.
    Note,
}

/// Diagnostic category bytes.
pub mod category {
    /// Errors during assembly.
    pub const COMPILATION: u8 = 0x01;
    /// Errors during linking.
    pub const LINKING: u8 = 0x02;
    /// Errors during validation.
    pub const VALIDATION: u8 = 0x03;
    /// Errors during execution.
    pub const RUNTIME: u8 = 0x04;
}

/// Subcategory bytes, namespaced by category.
pub mod subcategory {
    /// Subcategories of [`category::COMPILATION`](super::category::COMPILATION).
    pub mod compilation {
        pub const SYNTAX: u8 = 0x00;
        pub const SCOPE: u8 = 0x01;
        pub const INSTRUCTION: u8 = 0x02;
        pub const VARIABLE: u8 = 0x03;
        pub const TYPE: u8 = 0x04;
        pub const SYMBOL: u8 = 0x05;
        pub const SECTION: u8 = 0x06;
    }

    /// Subcategories of [`category::LINKING`](super::category::LINKING).
    pub mod linking {
        pub const SYMBOL_RESOLUTION: u8 = 0x00;
        pub const SECTION_ALIGNMENT: u8 = 0x01;
        pub const RELOCATION: u8 = 0x02;
        pub const FORMAT: u8 = 0x03;
        pub const COMPATIBILITY: u8 = 0x04;
    }

    /// Subcategories of [`category::VALIDATION`](super::category::VALIDATION).
    ///
    /// The structural values coincide with the semantic ones; both sets are
    /// long-established wire constants.
    pub mod validation {
        pub const TYPE_CHECK: u8 = 0x00;
        pub const MEMORY_SAFETY: u8 = 0x01;
        pub const INSTRUCTION_VALIDITY: u8 = 0x02;
        pub const ABI_COMPLIANCE: u8 = 0x03;
        pub const RESOURCE_USAGE: u8 = 0x04;

        // Structural findings reuse the linking numbering.
        pub const SYMBOL_RESOLUTION: u8 = 0x00;
        pub const SECTION_ALIGNMENT: u8 = 0x01;
        pub const RELOCATION: u8 = 0x02;
        pub const FORMAT: u8 = 0x03;
    }

    /// Subcategories of [`category::RUNTIME`](super::category::RUNTIME).
    pub mod runtime {
        pub const ARITHMETIC: u8 = 0x00;
        pub const MEMORY: u8 = 0x01;
        pub const FUNCTION_CALL: u8 = 0x02;
        pub const CONTROL_FLOW: u8 = 0x03;
        pub const TYPE: u8 = 0x04;
        pub const RESOURCE: u8 = 0x05;
        pub const EXTERNAL: u8 = 0x06;
        pub const DEVICE: u8 = 0x0F;
    }
}

/// Compose a 32-bit diagnostic code.
pub const fn code(category: u8, subcategory: u8, specific: u16) -> u32 {
    ((category as u32) << 24) | ((subcategory as u32) << 16) | specific as u32
}

/// The category byte of a code.
pub const fn code_category(code: u32) -> u8 {
    (code >> 24) as u8
}

/// The subcategory byte of a code.
pub const fn code_subcategory(code: u32) -> u8 {
    (code >> 16) as u8
}

/// The specific-error half of a code.
pub const fn code_specific(code: u32) -> u16 {
    code as u16
}

/// Well-known diagnostic codes.
pub mod codes {
    use super::{category, code, subcategory::*};

    pub const INVALID_TOKEN: u32 = code(category::COMPILATION, compilation::SYNTAX, 0x0001);
    pub const UNEXPECTED_EOF: u32 = code(category::COMPILATION, compilation::SYNTAX, 0x0002);
    pub const MISSING_OPERAND: u32 = code(category::COMPILATION, compilation::SYNTAX, 0x0003);
    pub const EXTRA_OPERAND: u32 = code(category::COMPILATION, compilation::SYNTAX, 0x0004);
    pub const INVALID_LABEL: u32 = code(category::COMPILATION, compilation::SYNTAX, 0x0005);

    pub const VARIABLE_ALREADY_DEFINED: u32 =
        code(category::COMPILATION, compilation::VARIABLE, 0x0001);
    pub const VARIABLE_NOT_DEFINED: u32 =
        code(category::COMPILATION, compilation::VARIABLE, 0x0002);
    pub const INVALID_VARIABLE_ID: u32 =
        code(category::COMPILATION, compilation::VARIABLE, 0x0003);

    pub const INVALID_TYPE: u32 = code(category::COMPILATION, compilation::TYPE, 0x0001);
    pub const TYPE_MISMATCH: u32 = code(category::COMPILATION, compilation::TYPE, 0x0002);

    pub const DIVISION_BY_ZERO: u32 = code(category::RUNTIME, runtime::ARITHMETIC, 0x0001);
    pub const INTEGER_OVERFLOW: u32 = code(category::RUNTIME, runtime::ARITHMETIC, 0x0002);
    pub const INTEGER_UNDERFLOW: u32 = code(category::RUNTIME, runtime::ARITHMETIC, 0x0003);
    pub const FLOAT_OVERFLOW: u32 = code(category::RUNTIME, runtime::ARITHMETIC, 0x0004);
    pub const FLOAT_UNDERFLOW: u32 = code(category::RUNTIME, runtime::ARITHMETIC, 0x0005);

    pub const NULL_POINTER_DEREFERENCE: u32 = code(category::RUNTIME, runtime::MEMORY, 0x0001);
    pub const OUT_OF_BOUNDS_ACCESS: u32 = code(category::RUNTIME, runtime::MEMORY, 0x0002);
    pub const MISALIGNED_ACCESS: u32 = code(category::RUNTIME, runtime::MEMORY, 0x0003);
    pub const MEMORY_LEAK: u32 = code(category::RUNTIME, runtime::MEMORY, 0x0004);
}

/// The canonical message for a well-known code, if one is defined.
pub fn standard_message(code: u32) -> Option<&'static str> {
    Some(match code {
        codes::INVALID_TOKEN => "invalid token",
        codes::UNEXPECTED_EOF => "unexpected end of file",
        codes::MISSING_OPERAND => "missing operand",
        codes::EXTRA_OPERAND => "extra operand",
        codes::INVALID_LABEL => "invalid label",
        codes::VARIABLE_ALREADY_DEFINED => "variable already defined",
        codes::VARIABLE_NOT_DEFINED => "variable not defined",
        codes::INVALID_VARIABLE_ID => "invalid variable id",
        codes::INVALID_TYPE => "invalid type",
        codes::TYPE_MISMATCH => "type mismatch",
        codes::DIVISION_BY_ZERO => "division by zero",
        codes::INTEGER_OVERFLOW => "integer overflow",
        codes::INTEGER_UNDERFLOW => "integer underflow",
        codes::FLOAT_OVERFLOW => "floating-point overflow",
        codes::FLOAT_UNDERFLOW => "floating-point underflow",
        codes::NULL_POINTER_DEREFERENCE => "null pointer dereference",
        codes::OUT_OF_BOUNDS_ACCESS => "out-of-bounds memory access",
        codes::MISALIGNED_ACCESS => "misaligned memory access",
        codes::MEMORY_LEAK => "memory leak",
        _ => return None,
    })
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorInfo {
    /// The composed 32-bit code.
    pub code: u32,
    /// File offset or address the finding points at, 0 when not applicable.
    pub location: u32,
    /// Source file identifier, 0 when not applicable.
    pub file_id: u32,
    /// Source line, 0 when not applicable.
    pub line: u32,
    /// Source column, 0 when not applicable.
    pub column: u32,
    /// Related symbol index, 0 when not applicable.
    pub symbol_index: u16,
    /// Related section index, 0 when not applicable.
    pub section_index: u16,
    /// Human-readable message.
    pub message: String,
    /// Severity of the finding.
    pub severity: Severity,
}

impl ErrorInfo {
    /// A finding with no location attached.
    pub fn new(code: u32, message: impl Into<String>, severity: Severity) -> Self {
        ErrorInfo {
            code,
            location: 0,
            file_id: 0,
            line: 0,
            column: 0,
            symbol_index: 0,
            section_index: 0,
            message: message.into(),
            severity,
        }
    }

    /// Attach a byte offset or address.
    pub fn at_location(mut self, location: u32) -> Self {
        self.location = location;
        self
    }

    /// Attach the related symbol index.
    pub fn for_symbol(mut self, symbol_index: u16) -> Self {
        self.symbol_index = symbol_index;
        self
    }

    /// Attach the related section index.
    pub fn for_section(mut self, section_index: u16) -> Self {
        self.section_index = section_index;
        self
    }
}

impl fmt::Display for ErrorInfo {
    /// `severity:category[:file[:line[:column]]]: 0xXXXXXXXX - message`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        match code_category(self.code) {
            category::COMPILATION => write!(f, ":compilation")?,
            category::LINKING => write!(f, ":linking")?,
            category::VALIDATION => write!(f, ":validation")?,
            category::RUNTIME => write!(f, ":runtime")?,
            _ => write!(f, ":unknown")?,
        }
        if self.file_id != 0 {
            write!(f, ":{}", self.file_id)?;
            if self.line != 0 {
                write!(f, ":{}", self.line)?;
                if self.column != 0 {
                    write!(f, ":{}", self.column)?;
                }
            }
        }
        write!(f, ": 0x{:08x} - {}", self.code, self.message)
    }
}

/// An ordered sink of findings.
///
/// A validation pass reports everything it sees; nothing short-circuits.
/// Findings come back out in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    entries: Vec<ErrorInfo>,
}

impl Diagnostics {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding.
    pub fn push(&mut self, entry: ErrorInfo) {
        self.entries.push(entry);
    }

    /// Record a well-known code with its canonical message.
    pub fn push_standard(&mut self, code: u32, severity: Severity) {
        let message = standard_message(code).unwrap_or("unknown error");
        self.push(ErrorInfo::new(code, message, severity));
    }

    /// Whether any finding was recorded.
    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Whether any finding of `severity` was recorded.
    pub fn has_errors_with(&self, severity: Severity) -> bool {
        self.entries.iter().any(|e| e.severity == severity)
    }

    /// Number of findings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The findings in insertion order.
    pub fn entries(&self) -> &[ErrorInfo] {
        &self.entries
    }

    /// The findings of `severity`, in insertion order.
    pub fn entries_with(&self, severity: Severity) -> Vec<&ErrorInfo> {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .collect()
    }

    /// Iterate over the findings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorInfo> {
        self.entries.iter()
    }

    /// Drop every finding.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_composition_round_trips() {
        let c = code(category::VALIDATION, subcategory::validation::RELOCATION, 0x0003);
        assert_eq!(c, 0x0302_0003);
        assert_eq!(code_category(c), category::VALIDATION);
        assert_eq!(code_subcategory(c), subcategory::validation::RELOCATION);
        assert_eq!(code_specific(c), 0x0003);
    }

    #[test]
    fn duplicate_symbol_code_is_stable() {
        // Pinned by downstream tooling.
        assert_eq!(
            code(
                category::VALIDATION,
                subcategory::validation::SYMBOL_RESOLUTION,
                0x0001
            ),
            0x0300_0001
        );
    }

    #[test]
    fn display_renders_the_canonical_form() {
        let mut info = ErrorInfo::new(codes::TYPE_MISMATCH, "type mismatch", Severity::Error);
        assert_eq!(info.to_string(), "error:compilation: 0x01040002 - type mismatch");

        info.file_id = 3;
        info.line = 14;
        info.column = 2;
        assert_eq!(
            info.to_string(),
            "error:compilation:3:14:2: 0x01040002 - type mismatch"
        );
    }

    #[test]
    fn sink_preserves_insertion_order_and_filters_by_severity() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(ErrorInfo::new(1, "first", Severity::Warning));
        diagnostics.push(ErrorInfo::new(2, "second", Severity::Error));
        diagnostics.push(ErrorInfo::new(3, "third", Severity::Note));

        let codes: Vec<u32> = diagnostics.iter().map(|e| e.code).collect();
        assert_eq!(codes, [1, 2, 3]);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.has_errors_with(Severity::Error));
        assert_eq!(diagnostics.entries_with(Severity::Warning).len(), 1);

        diagnostics.clear();
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn standard_messages_cover_the_known_codes() {
        assert_eq!(standard_message(codes::DIVISION_BY_ZERO), Some("division by zero"));
        assert_eq!(standard_message(0xDEAD_BEEF), None);

        let mut diagnostics = Diagnostics::new();
        diagnostics.push_standard(codes::MEMORY_LEAK, Severity::Warning);
        assert_eq!(diagnostics.entries()[0].message, "memory leak");
    }
}
