//! Relocatable object files: the assembler's output and the linker's
//! input.

use std::collections::BTreeMap;

/// A `(segment, byte offset)` pair. Every address the assembler
/// reasons about is relative to some segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegAddr {
    /// Name of the segment.
    pub segment: String,
    /// Byte offset from the start of the segment.
    pub offset: u32,
}

impl SegAddr {
    /// Builds a segment-relative address.
    pub fn new(segment: impl Into<String>, offset: u32) -> Self {
        Self {
            segment: segment.into(),
            offset,
        }
    }
}

/// How the linker inserts a resolved import into the referring
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImportKind {
    /// Patch the 26-bit destination of a single CALL word.
    Call,
    /// Patch a 32-bit value split across a LUI/ORI word pair.
    Li,
}

/// How the linker applies a segment relocation to the referring
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelocKind {
    /// Add to the 26-bit destination of a single CALL word.
    Call,
    /// Add to a 32-bit value split across a LUI/ORI word pair.
    Li,
}

/// A symbol made visible to other objects, with the address it names.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExportEntry {
    /// The exported symbol.
    pub symbol: String,
    /// The address the symbol stands for.
    pub addr: SegAddr,
}

/// A reference to a symbol not defined in this object. `addr` names
/// the instruction the linker patches once the symbol resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportEntry {
    /// The symbol required for importing.
    pub symbol: String,
    /// Patch style at the referring instruction.
    pub kind: ImportKind,
    /// Address of the referring instruction.
    pub addr: SegAddr,
}

/// An intra-object reference whose final value depends on where the
/// linker places `reloc_segment`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelocEntry {
    /// The segment whose mapped address is added in.
    pub reloc_segment: String,
    /// Patch style at the referring instruction.
    pub kind: RelocKind,
    /// Address of the referring instruction.
    pub addr: SegAddr,
}

/// A relocatable object produced by the assembler, combined with
/// others by the linker into an executable image.
///
/// Immutable after assembly except for the linker's patches to
/// `seg_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectFile {
    /// Assembled bytes per segment. Each segment's length is a
    /// multiple of 4.
    pub seg_data: BTreeMap<String, Vec<u8>>,
    /// Symbols this object makes visible to others.
    pub export_table: Vec<ExportEntry>,
    /// Symbols this object needs from others.
    pub import_table: Vec<ImportEntry>,
    /// Segment-relative references to be fixed at layout time.
    pub reloc_table: Vec<RelocEntry>,
    /// Optional name used in linker diagnostics.
    pub name: Option<String>,
}

impl ObjectFile {
    /// Creates an object from assembler-generated tables.
    pub fn from_assembler(
        seg_data: BTreeMap<String, Vec<u8>>,
        export_table: Vec<ExportEntry>,
        import_table: Vec<ImportEntry>,
        reloc_table: Vec<RelocEntry>,
    ) -> Self {
        Self {
            seg_data,
            export_table,
            import_table,
            reloc_table,
            name: None,
        }
    }
}
