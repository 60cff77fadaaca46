//! The two-pass assembler: parsed source in, relocatable object out.
//!
//! The first pass walks the intermediate form to assign every line a
//! segment-relative address and collect the label symbol table. The
//! second pass emits segment bytes, expands directives and gathers
//! the export, import and relocation tables.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::AssemblyError;
use crate::instruction::{self, Defines, SymTab};
use crate::object::{ExportEntry, ImportEntry, ObjectFile, RelocEntry, SegAddr};
use crate::parser::{parse, Arg, Line};

/// Rounds an offset up to the next word boundary.
fn align_word(addr: u32) -> u32 {
    (addr + 3) & !3
}

/// Argument shapes accepted by directive validation.
enum ArgKind {
    Id,
    Number,
    Str,
}

/// Translates assembly source into [`ObjectFile`]s.
#[derive(Debug, Default)]
pub struct Assembler;

impl Assembler {
    /// Creates an assembler.
    pub fn new() -> Self {
        Self
    }

    /// Assembles source text into an object file.
    pub fn assemble(&self, source: &str) -> Result<ObjectFile, AssemblyError> {
        let lines = parse(source)?;
        self.assemble_lines(&lines)
    }

    /// Assembles an already-parsed intermediate form.
    pub fn assemble_lines(&self, lines: &[Line]) -> Result<ObjectFile, AssemblyError> {
        let (symtab, addr_imf) = self.compute_addresses(lines)?;
        debug!(symbols = symtab.len(), lines = addr_imf.len(), "first pass complete");
        self.emit(&symtab, &addr_imf)
    }

    /// First pass: address computation.
    ///
    /// Does the minimal work needed to give every label an address:
    /// segment switches, instruction lengths and the sizes of
    /// storage-allocating directives. Full argument checking waits
    /// for the second pass; only arguments that affect sizes are
    /// validated here.
    ///
    /// Returns the symbol table and the addressed intermediate form.
    /// `.segment` directives are consumed here and dropped from the
    /// addressed list.
    fn compute_addresses<'a>(
        &self,
        lines: &'a [Line],
    ) -> Result<(SymTab, Vec<(SegAddr, &'a Line)>), AssemblyError> {
        let mut symtab = SymTab::new();
        let mut addr_imf: Vec<(SegAddr, &Line)> = Vec::new();
        let mut seg_offset: BTreeMap<String, u32> = BTreeMap::new();
        let mut cur_seg: Option<String> = None;

        for line in lines {
            // Until a segment is opened, the only admissible line is
            // an unlabeled `.segment` directive.
            let saddr = match &cur_seg {
                Some(seg) => Some(SegAddr::new(seg.clone(), seg_offset[seg])),
                None => {
                    let opens_segment = matches!(
                        line,
                        Line::Directive { label: None, name, .. } if name == ".segment"
                    );
                    if !opens_segment {
                        return Err(AssemblyError::MissingSegment {
                            line: line.lineno(),
                        });
                    }
                    None
                }
            };

            if let Some(label) = line.label() {
                if symtab.contains_key(label) {
                    return Err(AssemblyError::DuplicateLabel {
                        label: label.to_string(),
                        line: line.lineno(),
                    });
                }
                // A label is only reachable once a segment exists.
                symtab.insert(
                    label.to_string(),
                    saddr.clone().expect("label outside segment rejected above"),
                );
            }

            match line {
                Line::Instruction { mnemonic: None, .. } => {
                    // A bare label doesn't advance the address and
                    // needs no second-pass work.
                }
                Line::Instruction {
                    mnemonic: Some(name),
                    lineno,
                    ..
                } => match instruction::length(name) {
                    Some(len) => {
                        let seg = cur_seg.as_ref().expect("instruction outside segment");
                        addr_imf.push((saddr.expect("addressed line"), line));
                        *seg_offset.get_mut(seg).expect("open segment") += len;
                    }
                    None => {
                        return Err(AssemblyError::UnknownInstruction {
                            name: name.clone(),
                            line: *lineno,
                        })
                    }
                },
                Line::Directive {
                    name, args, lineno, ..
                } => {
                    if name != ".segment" {
                        addr_imf.push((saddr.expect("addressed line"), line));
                    }
                    match name.as_str() {
                        ".segment" => {
                            validate_args(name, args, &[ArgKind::Id], *lineno)?;
                            let seg = match &args[0] {
                                Arg::Id(id) => id.clone(),
                                _ => unreachable!("validated above"),
                            };
                            seg_offset.entry(seg.clone()).or_insert(0);
                            cur_seg = Some(seg);
                        }
                        ".word" => {
                            let seg = cur_seg.as_ref().expect("directive outside segment");
                            *seg_offset.get_mut(seg).expect("open segment") +=
                                args.len() as u32 * 4;
                        }
                        ".byte" => {
                            let seg = cur_seg.as_ref().expect("directive outside segment");
                            let offset = seg_offset.get_mut(seg).expect("open segment");
                            *offset = align_word(*offset + args.len() as u32);
                        }
                        ".alloc" => {
                            validate_args(name, args, &[ArgKind::Number], *lineno)?;
                            let count = match &args[0] {
                                Arg::Number(num) if crate::bits::fits_unsigned(*num, 32) => {
                                    *num as u32
                                }
                                Arg::Number(_) => {
                                    return Err(AssemblyError::InvalidAlloc { line: *lineno })
                                }
                                _ => unreachable!("validated above"),
                            };
                            let seg = cur_seg.as_ref().expect("directive outside segment");
                            let offset = seg_offset.get_mut(seg).expect("open segment");
                            *offset = align_word(*offset + count);
                        }
                        ".string" => {
                            validate_args(name, args, &[ArgKind::Str], *lineno)?;
                            let len = match &args[0] {
                                Arg::Str(bytes) => bytes.len() as u32,
                                _ => unreachable!("validated above"),
                            };
                            let seg = cur_seg.as_ref().expect("directive outside segment");
                            let offset = seg_offset.get_mut(seg).expect("open segment");
                            // +1 for the NUL terminator emitted by
                            // the second pass.
                            *offset = align_word(*offset + len + 1);
                        }
                        // Size-free directives; checked in the
                        // second pass.
                        _ => {}
                    }
                }
            }
        }

        Ok((symtab, addr_imf))
    }

    /// Second pass: emission, using the symbol table and addressed
    /// intermediate form from the first pass.
    fn emit(
        &self,
        symtab: &SymTab,
        addr_imf: &[(SegAddr, &Line)],
    ) -> Result<ObjectFile, AssemblyError> {
        let mut defines = Defines::new();
        let mut seg_data: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut export_table: Vec<ExportEntry> = Vec::new();
        let mut import_table: Vec<ImportEntry> = Vec::new();
        let mut reloc_table: Vec<RelocEntry> = Vec::new();

        for (addr, line) in addr_imf {
            match line {
                Line::Instruction {
                    mnemonic: Some(name),
                    args,
                    lineno,
                    ..
                } => {
                    let assembled =
                        instruction::assemble_instruction(name, args, addr, symtab, &defines)
                            .map_err(|source| AssemblyError::Instruction {
                                source,
                                line: *lineno,
                            })?;

                    let seg = seg_data.entry(addr.segment.clone()).or_default();
                    // Pass-1/pass-2 agreement on placement.
                    debug_assert_eq!(seg.len() as u32, addr.offset);

                    for instr in assembled {
                        // The running offset, not `addr.offset`: the
                        // second word of an LI pair lands 4 bytes
                        // after the first.
                        let offset = seg.len() as u32;
                        if let Some((kind, symbol)) = instr.import_req {
                            import_table.push(ImportEntry {
                                symbol,
                                kind,
                                addr: SegAddr::new(addr.segment.clone(), offset),
                            });
                        }
                        if let Some((kind, segment)) = instr.reloc_req {
                            reloc_table.push(RelocEntry {
                                reloc_segment: segment,
                                kind,
                                addr: SegAddr::new(addr.segment.clone(), offset),
                            });
                        }
                        seg.extend_from_slice(&instr.word.to_le_bytes());
                    }
                }
                Line::Instruction { mnemonic: None, .. } => {
                    unreachable!("bare labels are dropped by the first pass")
                }
                Line::Directive {
                    name, args, lineno, ..
                } => match name.as_str() {
                    ".define" => {
                        validate_args(name, args, &[ArgKind::Id, ArgKind::Number], *lineno)?;
                        let (id, value) = match (&args[0], &args[1]) {
                            (Arg::Id(id), Arg::Number(num)) => (id.clone(), *num),
                            _ => unreachable!("validated above"),
                        };
                        // Redefinition overwrites.
                        defines.insert(id, value);
                    }
                    ".global" => {
                        validate_args(name, args, &[ArgKind::Id], *lineno)?;
                        let symbol = match &args[0] {
                            Arg::Id(id) => id.clone(),
                            _ => unreachable!("validated above"),
                        };
                        let Some(sym_addr) = symtab.get(&symbol) else {
                            return Err(AssemblyError::UnknownGlobal {
                                symbol,
                                line: *lineno,
                            });
                        };
                        if export_table.iter().any(|entry| entry.symbol == symbol) {
                            return Err(AssemblyError::DuplicateGlobal {
                                symbol,
                                line: *lineno,
                            });
                        }
                        export_table.push(ExportEntry {
                            symbol,
                            addr: sym_addr.clone(),
                        });
                    }
                    ".alloc" => {
                        // Argument validated in the first pass.
                        let count = match &args[0] {
                            Arg::Number(num) => *num as u32,
                            _ => unreachable!("validated in the first pass"),
                        };
                        let seg = seg_data.entry(addr.segment.clone()).or_default();
                        seg.resize(seg.len() + align_word(count) as usize, 0);
                    }
                    ".byte" => {
                        let mut data = Vec::with_capacity(align_word(args.len() as u32) as usize);
                        for (index, arg) in args.iter().enumerate() {
                            match arg {
                                Arg::Number(num) if crate::bits::fits_unsigned(*num, 8) => {
                                    data.push(*num as u8);
                                }
                                _ => {
                                    return Err(AssemblyError::InvalidByte {
                                        index: index + 1,
                                        line: *lineno,
                                    })
                                }
                            }
                        }
                        data.resize(align_word(data.len() as u32) as usize, 0);
                        seg_data.entry(addr.segment.clone()).or_default().extend(data);
                    }
                    ".word" => {
                        let seg = seg_data.entry(addr.segment.clone()).or_default();
                        for (index, arg) in args.iter().enumerate() {
                            match arg {
                                Arg::Number(num) if crate::bits::fits_unsigned(*num, 32) => {
                                    seg.extend_from_slice(&(*num as u32).to_le_bytes());
                                }
                                _ => {
                                    return Err(AssemblyError::InvalidWord {
                                        index: index + 1,
                                        line: *lineno,
                                    })
                                }
                            }
                        }
                    }
                    ".string" => {
                        let bytes = match &args[0] {
                            Arg::Str(bytes) => bytes,
                            _ => unreachable!("validated in the first pass"),
                        };
                        let mut data = bytes.clone();
                        data.push(0);
                        data.resize(align_word(data.len() as u32) as usize, 0);
                        seg_data.entry(addr.segment.clone()).or_default().extend(data);
                    }
                    ".segment" => unreachable!("dropped by the first pass"),
                    _ => {
                        return Err(AssemblyError::UnknownDirective {
                            name: name.clone(),
                            line: *lineno,
                        })
                    }
                },
            }
        }

        debug!(segments = seg_data.len(), exports = export_table.len(), "assembly complete");
        Ok(ObjectFile::from_assembler(
            seg_data,
            export_table,
            import_table,
            reloc_table,
        ))
    }
}

fn validate_args(
    name: &str,
    args: &[Arg],
    expected: &[ArgKind],
    line: u32,
) -> Result<(), AssemblyError> {
    if args.len() != expected.len() {
        return Err(AssemblyError::DirectiveArgCount {
            name: name.to_string(),
            expected: expected.len(),
            line,
        });
    }
    for (index, (arg, kind)) in args.iter().zip(expected).enumerate() {
        let ok = matches!(
            (arg, kind),
            (Arg::Id(_), ArgKind::Id) | (Arg::Number(_), ArgKind::Number) | (Arg::Str(_), ArgKind::Str)
        );
        if !ok {
            return Err(AssemblyError::DirectiveArgType {
                name: name.to_string(),
                index: index + 1,
                line,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstructionError;
    use crate::object::{ImportKind, RelocKind};

    fn assemble(source: &str) -> ObjectFile {
        Assembler::new().assemble(source).unwrap()
    }

    fn assemble_err(source: &str) -> AssemblyError {
        Assembler::new().assemble(source).unwrap_err()
    }

    fn words(obj: &ObjectFile, segment: &str) -> Vec<u32> {
        obj.seg_data[segment]
            .chunks(4)
            .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn straight_line_code() {
        let obj = assemble(
            r#"
                .segment code
            addi $r6, $r0, 25
            addi $r4, $r0, 400
            add $r8, $r6, $r4
            halt
            "#,
        );
        assert_eq!(
            words(&obj, "code"),
            vec![0x80C0_0019, 0x8080_0190, 0x0106_2000, 0xFC00_0000]
        );
        assert!(obj.import_table.is_empty());
        assert!(obj.reloc_table.is_empty());
    }

    #[test]
    fn labels_resolve_in_branches() {
        let obj = assemble(
            r#"
                .segment code
            loop:
                subi $r5, $r5, 1
                bnez $r5, loop
                halt
            "#,
        );
        // bnez at offset 4, loop at 0: delta -1
        assert_eq!(words(&obj, "code")[1] & 0xFFFF, 0xFFFF);
    }

    #[test]
    fn directive_sizing_and_padding() {
        let obj = assemble(
            r#"
                .segment data
            v1: .word 1, 2, 3
            v2: .byte 1, 2, 3
            s:  .string "ab"
            a:  .alloc 6
                .segment code
            start:
                halt
                .global v2
                .global s
                .global a
            "#,
        );
        let data = &obj.seg_data["data"];
        assert_eq!(data.len(), 28);
        assert_eq!(&data[0..12], &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
        assert_eq!(&data[12..16], &[1, 2, 3, 0]);
        assert_eq!(&data[16..20], &[b'a', b'b', 0, 0]);
        assert_eq!(&data[20..28], &[0; 8]);

        let export = |symbol: &str| {
            obj.export_table
                .iter()
                .find(|entry| entry.symbol == symbol)
                .unwrap()
                .addr
                .clone()
        };
        assert_eq!(export("v2"), SegAddr::new("data", 12));
        assert_eq!(export("s"), SegAddr::new("data", 16));
        assert_eq!(export("a"), SegAddr::new("data", 20));
    }

    #[test]
    fn segment_lengths_stay_word_aligned() {
        let obj = assemble(
            r#"
                .segment a
            .byte 1
                .segment b
            .string "hello"
                .segment c
            .alloc 1
            "#,
        );
        for data in obj.seg_data.values() {
            assert_eq!(data.len() % 4, 0);
        }
        assert_eq!(obj.seg_data["a"].len(), 4);
        assert_eq!(obj.seg_data["b"].len(), 8);
        assert_eq!(obj.seg_data["c"].len(), 4);
    }

    #[test]
    fn defines_feed_immediates() {
        let obj = assemble(
            r#"
                .segment code
            .define count, 400
            addi $r4, $r0, count
            "#,
        );
        assert_eq!(words(&obj, "code"), vec![0x8080_0190]);
    }

    #[test]
    fn define_overwrites() {
        let obj = assemble(
            r#"
                .segment code
            .define k, 1
            .define k, 2
            addi $r1, $r0, k
            "#,
        );
        assert_eq!(words(&obj, "code")[0] & 0xFFFF, 2);
    }

    #[test]
    fn call_and_li_linkage_tables() {
        let obj = assemble(
            r#"
                .segment text
                call exit
                li $t0, buf
                call 0x40
            foo:
                nop
                .segment data
            buf: .word 0
            "#,
        );
        assert_eq!(
            obj.import_table,
            vec![ImportEntry {
                symbol: "exit".into(),
                kind: ImportKind::Call,
                addr: SegAddr::new("text", 0),
            }]
        );
        assert_eq!(
            obj.reloc_table,
            vec![RelocEntry {
                reloc_segment: "data".into(),
                kind: RelocKind::Li,
                addr: SegAddr::new("text", 4),
            }]
        );
        // li occupies text:4..12, the absolute call sits after it.
        assert_eq!(obj.seg_data["text"].len(), 20);
        assert_eq!(words(&obj, "text")[3], 0x7400_0040);
    }

    #[test]
    fn internal_call_relocates() {
        let obj = assemble(
            r#"
                .segment text
                call foo
                nop
            foo:
                halt
            "#,
        );
        assert_eq!(
            obj.reloc_table,
            vec![RelocEntry {
                reloc_segment: "text".into(),
                kind: RelocKind::Call,
                addr: SegAddr::new("text", 0),
            }]
        );
        // Destination field pre-loaded with the label's word offset.
        assert_eq!(words(&obj, "text")[0] & 0x03FF_FFFF, 2);
    }

    #[test]
    fn code_before_segment_rejected() {
        assert!(matches!(
            assemble_err("nop\n"),
            AssemblyError::MissingSegment { line: 1 }
        ));
    }

    #[test]
    fn labeled_first_segment_rejected() {
        assert!(matches!(
            assemble_err("s: .segment code\n"),
            AssemblyError::MissingSegment { .. }
        ));
    }

    #[test]
    fn duplicate_label_rejected() {
        assert!(matches!(
            assemble_err(".segment code\nx: nop\nx: nop\n"),
            AssemblyError::DuplicateLabel { .. }
        ));
    }

    #[test]
    fn unknown_instruction_rejected() {
        assert!(matches!(
            assemble_err(".segment code\nfrob $r1\n"),
            AssemblyError::UnknownInstruction { .. }
        ));
    }

    #[test]
    fn unknown_directive_rejected() {
        assert!(matches!(
            assemble_err(".segment code\n.frobnicate 1\n"),
            AssemblyError::UnknownDirective { .. }
        ));
    }

    #[test]
    fn global_of_undefined_label_rejected() {
        assert!(matches!(
            assemble_err(".segment code\nnop\n.global ghost\n"),
            AssemblyError::UnknownGlobal { .. }
        ));
    }

    #[test]
    fn duplicate_global_rejected() {
        assert!(matches!(
            assemble_err(".segment code\nx: nop\n.global x\n.global x\n"),
            AssemblyError::DuplicateGlobal { .. }
        ));
    }

    #[test]
    fn byte_range_checked() {
        assert!(matches!(
            assemble_err(".segment d\n.byte 256\n"),
            AssemblyError::InvalidByte { index: 1, .. }
        ));
        assert!(matches!(
            assemble_err(".segment d\n.byte 0, -1\n"),
            AssemblyError::InvalidByte { index: 2, .. }
        ));
    }

    #[test]
    fn word_range_checked() {
        assert!(matches!(
            assemble_err(".segment d\n.word 4294967296\n"),
            AssemblyError::InvalidWord { .. }
        ));
        let obj = assemble(".segment d\n.word 4294967295\n");
        assert_eq!(words(&obj, "d"), vec![u32::MAX]);
    }

    #[test]
    fn negative_alloc_rejected() {
        assert!(matches!(
            assemble_err(".segment d\n.alloc -4\n"),
            AssemblyError::InvalidAlloc { .. }
        ));
    }

    #[test]
    fn cross_segment_branch_rejected() {
        let err = assemble_err(
            r#"
                .segment code
                beq $r1, $r2, elsewhere
                .segment data
            elsewhere:
                .word 0
            "#,
        );
        assert!(matches!(
            err,
            AssemblyError::Instruction {
                source: InstructionError::CrossSegmentBranch,
                ..
            }
        ));
    }

    #[test]
    fn instruction_errors_carry_the_line() {
        match assemble_err(".segment code\nnop\nadd $r1, $r2\n") {
            AssemblyError::Instruction { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
