//! The linker: lays out segments from several objects, resolves
//! imports against exports, applies relocations and produces a flat
//! binary image ready to load at the base address.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::assembler::Assembler;
use crate::bits::{build, extract, fits_unsigned};
use crate::error::LinkerError;
use crate::object::{ImportKind, ObjectFile, RelocKind, SegAddr};
use crate::opcode::Opcode;

/// Default base address images are linked for.
pub const DEFAULT_BASE_ADDRESS: u32 = 0x0010_0000;

/// Default memory size available to the executable; sizes the initial
/// stack pointer.
pub const DEFAULT_MEM_SIZE: u32 = 0x0004_0000;

/// Name of the synthetic segment holding the startup code.
const STARTUP_SEGMENT: &str = "__startup";

/// Name of the synthetic one-word heap marker segment.
const HEAP_SEGMENT: &str = "__heap";

/// Whether a patch replaces the field or adds to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchStyle {
    Call,
    Li,
}

/// Links assembled objects into an executable memory image.
///
/// A startup object is appended to every link: it loads the stack
/// pointer with the top of memory, calls `asm_main` (which user code
/// must export) and exports the `__heap` marker placed after all
/// other segments.
#[derive(Debug)]
pub struct Linker {
    base_address: u32,
    mem_size: u32,
}

impl Default for Linker {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_ADDRESS, DEFAULT_MEM_SIZE)
    }
}

/// Per-object mapping of segment names to absolute start addresses.
type SegmentMap = Vec<BTreeMap<String, u32>>;

impl Linker {
    /// Creates a linker for the given base address and memory size.
    pub fn new(base_address: u32, mem_size: u32) -> Self {
        Self {
            base_address,
            mem_size,
        }
    }

    /// Links the given objects and returns the binary image, to be
    /// loaded at the linker's base address.
    pub fn link(&self, mut objects: Vec<ObjectFile>) -> Result<Vec<u8>, LinkerError> {
        objects.push(self.assemble_startup()?);

        let (segment_map, total_size) = self.compute_segment_map(&objects);
        debug!(objects = objects.len(), total_size, "segment map computed");

        let exports = self.collect_exports(&objects)?;
        self.resolve_imports(&mut objects, &segment_map, &exports)?;
        self.resolve_relocations(&mut objects, &segment_map)?;
        self.build_image(&objects, &segment_map, total_size)
    }

    /// The synthetic object appended to every link.
    fn assemble_startup(&self) -> Result<ObjectFile, LinkerError> {
        let sp = self.base_address + self.mem_size - 4;
        let source = format!(
            r#"
        .segment __startup
    li      $sp, {sp}
    call    asm_main

        .segment __heap
        .global __heap
    __heap:
        .word 0
"#
        );
        let mut startup = Assembler::new().assemble(&source)?;
        startup.name = Some("<startup>".to_string());
        Ok(startup)
    }

    /// Computes where every object's segments land in memory.
    ///
    /// Same-named segments from different objects pack into one
    /// contiguous region, in object order. Regions are placed one
    /// after another sorted by name, so the layout is deterministic;
    /// `__startup` always comes first and `__heap` always last.
    ///
    /// Returns the per-object segment map and the total image size.
    fn compute_segment_map(&self, objects: &[ObjectFile]) -> (SegmentMap, u32) {
        let mut segment_size: BTreeMap<&str, u32> = BTreeMap::new();
        for obj in objects {
            for (segment, data) in &obj.seg_data {
                *segment_size.entry(segment).or_default() += data.len() as u32;
            }
        }

        let mut segment_ptr: BTreeMap<&str, u32> = BTreeMap::new();
        let mut ptr = self.base_address;
        if let Some(size) = segment_size.get(STARTUP_SEGMENT) {
            segment_ptr.insert(STARTUP_SEGMENT, ptr);
            ptr += size;
        }
        for (&segment, &size) in &segment_size {
            if segment != STARTUP_SEGMENT && segment != HEAP_SEGMENT {
                segment_ptr.insert(segment, ptr);
                ptr += size;
            }
        }
        if let Some(size) = segment_size.get(HEAP_SEGMENT) {
            segment_ptr.insert(HEAP_SEGMENT, ptr);
            ptr += size;
        }
        let total_size = ptr - self.base_address;

        let mut segment_map = SegmentMap::new();
        for obj in objects {
            let mut obj_map = BTreeMap::new();
            for (segment, data) in &obj.seg_data {
                let ptr = segment_ptr.get_mut(segment.as_str()).expect("sized above");
                obj_map.insert(segment.clone(), *ptr);
                *ptr += data.len() as u32;
            }
            segment_map.push(obj_map);
        }

        (segment_map, total_size)
    }

    /// Merges the export tables of all objects, rejecting duplicate
    /// symbols.
    fn collect_exports(
        &self,
        objects: &[ObjectFile],
    ) -> Result<BTreeMap<String, (usize, SegAddr)>, LinkerError> {
        let mut exports: BTreeMap<String, (usize, SegAddr)> = BTreeMap::new();
        for (idx, obj) in objects.iter().enumerate() {
            for export in &obj.export_table {
                if let Some((other_idx, _)) = exports.get(&export.symbol) {
                    return Err(LinkerError::DuplicateExport {
                        symbol: export.symbol.clone(),
                        object: object_id(objects, idx),
                        other: object_id(objects, *other_idx),
                    });
                }
                exports.insert(export.symbol.clone(), (idx, export.addr.clone()));
            }
        }
        Ok(exports)
    }

    /// Patches every import site with the mapped address of the
    /// matching export.
    fn resolve_imports(
        &self,
        objects: &mut [ObjectFile],
        segment_map: &SegmentMap,
        exports: &BTreeMap<String, (usize, SegAddr)>,
    ) -> Result<(), LinkerError> {
        for idx in 0..objects.len() {
            let imports = objects[idx].import_table.clone();
            for entry in &imports {
                let Some((exp_idx, exp_addr)) = exports.get(&entry.symbol) else {
                    return Err(LinkerError::UnresolvedImport {
                        symbol: entry.symbol.clone(),
                        object: object_id(objects, idx),
                    });
                };
                // The mapped value of the exporting segment, plus the
                // symbol's offset inside it.
                let mapped_address = segment_map[*exp_idx][&exp_addr.segment] + exp_addr.offset;
                trace!(symbol = %entry.symbol, mapped_address, "import resolved");

                let style = match entry.kind {
                    ImportKind::Call => PatchStyle::Call,
                    ImportKind::Li => PatchStyle::Li,
                };
                let seg_data = objects[idx]
                    .seg_data
                    .get_mut(&entry.addr.segment)
                    .expect("import addr names an assembled segment");
                patch_segment_data(
                    seg_data,
                    entry.addr.offset,
                    style,
                    true,
                    mapped_address,
                    &entry.symbol,
                )?;
            }
        }
        Ok(())
    }

    /// Adds each segment's mapped address into every relocation site.
    fn resolve_relocations(
        &self,
        objects: &mut [ObjectFile],
        segment_map: &SegmentMap,
    ) -> Result<(), LinkerError> {
        for idx in 0..objects.len() {
            let relocs = objects[idx].reloc_table.clone();
            for entry in &relocs {
                let Some(&mapped_address) = segment_map[idx].get(&entry.reloc_segment) else {
                    return Err(LinkerError::UnknownRelocSegment {
                        object: object_id(objects, idx),
                        segment: entry.reloc_segment.clone(),
                    });
                };
                trace!(segment = %entry.reloc_segment, mapped_address, "relocation resolved");

                let style = match entry.kind {
                    RelocKind::Call => PatchStyle::Call,
                    RelocKind::Li => PatchStyle::Li,
                };
                let seg_data = objects[idx]
                    .seg_data
                    .get_mut(&entry.addr.segment)
                    .expect("reloc addr names an assembled segment");
                patch_segment_data(
                    seg_data,
                    entry.addr.offset,
                    style,
                    false,
                    mapped_address,
                    &entry.reloc_segment,
                )?;
            }
        }
        Ok(())
    }

    /// Copies every segment into a flat buffer, verifying that the
    /// layout neither overlaps nor leaves holes.
    fn build_image(
        &self,
        objects: &[ObjectFile],
        segment_map: &SegmentMap,
        total_size: u32,
    ) -> Result<Vec<u8>, LinkerError> {
        let mut image: Vec<Option<u8>> = vec![None; total_size as usize];

        for (idx, obj) in objects.iter().enumerate() {
            for (segment, seg_data) in &obj.seg_data {
                let start = (segment_map[idx][segment] - self.base_address) as usize;
                for (i, &byte) in seg_data.iter().enumerate() {
                    if image[start + i].is_some() {
                        return Err(LinkerError::SegmentOverlap {
                            segment: segment.clone(),
                            addr: self.base_address + (start + i) as u32,
                        });
                    }
                    image[start + i] = Some(byte);
                }
            }
        }

        image
            .into_iter()
            .enumerate()
            .map(|(i, byte)| {
                byte.ok_or(LinkerError::ImageHole {
                    addr: self.base_address + i as u32,
                })
            })
            .collect()
    }
}

/// Identification of an object for diagnostics: its name if it has
/// one, its position in the object list otherwise.
fn object_id(objects: &[ObjectFile], idx: usize) -> String {
    match &objects[idx].name {
        Some(name) => name.clone(),
        None => format!("#{idx}"),
    }
}

/// Applies one CALL or LI patch to segment data in place.
///
/// With `replace` set the mapped address overwrites the destination
/// field; otherwise it is added to the value already encoded (the
/// relocation case, where the assembler pre-loaded the
/// segment-relative value).
fn patch_segment_data(
    seg_data: &mut [u8],
    instr_offset: u32,
    style: PatchStyle,
    replace: bool,
    mapped_address: u32,
    name: &str,
) -> Result<(), LinkerError> {
    let offset = instr_offset as usize;
    let patch_len = match style {
        PatchStyle::Call => 4,
        PatchStyle::Li => 8,
    };
    if offset + patch_len > seg_data.len() {
        return Err(LinkerError::PatchOffset {
            name: name.to_string(),
        });
    }

    match style {
        PatchStyle::Call => {
            let word = read_word(seg_data, offset);
            let opcode = extract(word, 31, 26);
            if opcode != Opcode::CALL as u32 {
                return Err(LinkerError::PatchExpectedCall {
                    name: name.to_string(),
                    found: opcode as u8,
                });
            }

            // CALL destinations are in words.
            let dest_word = u64::from(mapped_address / 4);
            let destination = if replace {
                dest_word
            } else {
                u64::from(extract(word, 25, 0)) + dest_word
            };
            if !fits_unsigned(destination as i64, 26) {
                return Err(LinkerError::PatchOverflow {
                    name: name.to_string(),
                    destination,
                });
            }

            let patched = build(31, 26, opcode) | build(25, 0, destination as u32);
            write_word(seg_data, offset, patched);
        }
        PatchStyle::Li => {
            let lui_word = read_word(seg_data, offset);
            let ori_word = read_word(seg_data, offset + 4);
            let opcode_lui = extract(lui_word, 31, 26);
            let opcode_ori = extract(ori_word, 31, 26);
            if opcode_lui != Opcode::LUI as u32 || opcode_ori != Opcode::ORI as u32 {
                return Err(LinkerError::PatchExpectedLi {
                    name: name.to_string(),
                    found_first: opcode_lui as u8,
                    found_second: opcode_ori as u8,
                });
            }

            let destination = if replace {
                u64::from(mapped_address)
            } else {
                let encoded = (u64::from(extract(lui_word, 15, 0)) << 16)
                    + u64::from(extract(ori_word, 15, 0));
                encoded + u64::from(mapped_address)
            };
            if !fits_unsigned(destination as i64, 32) {
                return Err(LinkerError::PatchOverflow {
                    name: name.to_string(),
                    destination,
                });
            }

            let lui_rd = extract(lui_word, 25, 21);
            let patched_lui = build(31, 26, opcode_lui)
                | build(25, 21, lui_rd)
                | build(15, 0, (destination >> 16) as u32);

            // The ORI half of an LI pair sources its own destination
            // register.
            let ori_rd = extract(ori_word, 25, 21);
            let patched_ori = build(31, 26, opcode_ori)
                | build(25, 21, ori_rd)
                | build(20, 16, ori_rd)
                | build(15, 0, (destination & 0xFFFF) as u32);

            write_word(seg_data, offset, patched_lui);
            write_word(seg_data, offset + 4, patched_ori);
        }
    }
    Ok(())
}

fn read_word(seg_data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(seg_data[offset..offset + 4].try_into().expect("bounds checked"))
}

fn write_word(seg_data: &mut [u8], offset: usize, word: u32) {
    seg_data[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
}
