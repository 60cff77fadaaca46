//! Per-mnemonic instruction assembly: operand validation, encoding
//! and pseudo-instruction expansion.
//!
//! Most mnemonics assemble into a single word; `li` expands into a
//! LUI/ORI pair. CALL and LI arguments that name labels produce
//! relocation or import requests for the linker to resolve.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::bits::{build, extract, fits_signed, fits_unsigned};
use crate::error::InstructionError;
use crate::object::{ImportKind, RelocKind, SegAddr};
use crate::opcode::Opcode;
use crate::parser::Arg;
use crate::reg::Reg;

/// Label symbol table collected by the assembler's first pass.
pub type SymTab = BTreeMap<String, SegAddr>;

/// Constants collected from `.define` directives.
pub type Defines = BTreeMap<String, i64>;

/// One encoded instruction word, with the linkage request attached to
/// it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledInstruction {
    /// The encoded word.
    pub word: u32,
    /// Import request: patch this word (pair) once the named symbol
    /// resolves.
    pub import_req: Option<(ImportKind, String)>,
    /// Relocation request: add the named segment's mapped address to
    /// this word (pair).
    pub reloc_req: Option<(RelocKind, String)>,
}

impl AssembledInstruction {
    fn new(word: u32) -> Self {
        Self {
            word,
            import_req: None,
            reloc_req: None,
        }
    }
}

/// Every mnemonic the assembler accepts, real and pseudo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Mnemonic {
    Add,
    Addi,
    And,
    Andi,
    B,
    Beq,
    Beqz,
    Bge,
    Bgeu,
    Bgt,
    Bgtu,
    Ble,
    Bleu,
    Blt,
    Bltu,
    Bne,
    Bnez,
    Call,
    Div,
    Divu,
    Eret,
    Halt,
    Jr,
    Lb,
    Lbu,
    Lh,
    Lhu,
    Li,
    Lli,
    Lui,
    Lw,
    Move,
    Mul,
    Mulu,
    Neg,
    Nop,
    Nor,
    Not,
    Or,
    Ori,
    Ret,
    Sb,
    Sh,
    Sll,
    Slli,
    Srl,
    Srli,
    Sub,
    Subi,
    Sw,
    Xor,
}

impl Mnemonic {
    /// The assembly spelling.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Bytes of segment data the assembled instruction occupies.
    pub fn length(self) -> u32 {
        match self {
            Mnemonic::Li => 8,
            _ => 4,
        }
    }

    fn arg_count(self) -> usize {
        use Mnemonic::*;
        match self {
            Eret | Halt | Nop | Ret => 0,
            B | Call | Jr => 1,
            Beqz | Bnez | Lb | Lbu | Lh | Lhu | Li | Lli | Lui | Lw | Move | Neg | Not | Sb
            | Sh | Sw => 2,
            Add | Addi | And | Andi | Beq | Bge | Bgeu | Bgt | Bgtu | Ble | Bleu | Blt | Bltu
            | Bne | Div | Divu | Mul | Mulu | Nor | Or | Ori | Sll | Slli | Srl | Srli | Sub
            | Subi | Xor => 3,
        }
    }
}

/// Does such an instruction exist?
pub fn exists(name: &str) -> bool {
    Mnemonic::from_str(name).is_ok()
}

/// The length of an instruction in bytes; `None` for unknown
/// mnemonics.
pub fn length(name: &str) -> Option<u32> {
    Mnemonic::from_str(name).ok().map(Mnemonic::length)
}

/// Assembles one source instruction into its encoded words.
///
/// `addr` is the segment-relative location the instruction is being
/// assembled into; `symtab` and `defines` come from the assembler's
/// passes. Returns one [`AssembledInstruction`] for most mnemonics,
/// two for `li`.
pub fn assemble_instruction(
    name: &str,
    args: &[Arg],
    addr: &SegAddr,
    symtab: &SymTab,
    defines: &Defines,
) -> Result<Vec<AssembledInstruction>, InstructionError> {
    let mnemonic = Mnemonic::from_str(name)
        .map_err(|_| InstructionError::UnknownInstruction(name.to_string()))?;
    if args.len() != mnemonic.arg_count() {
        return Err(InstructionError::ArgumentCount {
            name: mnemonic.name(),
            expected: mnemonic.arg_count(),
        });
    }

    use Mnemonic::*;
    let instr = match mnemonic {
        Add => instr_3reg(Opcode::ADD, args)?,
        Sub => instr_3reg(Opcode::SUB, args)?,
        Mulu => instr_3reg(Opcode::MULU, args)?,
        Mul => instr_3reg(Opcode::MUL, args)?,
        Divu => instr_3reg(Opcode::DIVU, args)?,
        Div => instr_3reg(Opcode::DIV, args)?,
        Sll => instr_3reg(Opcode::SLL, args)?,
        Srl => instr_3reg(Opcode::SRL, args)?,
        And => instr_3reg(Opcode::AND, args)?,
        Or => instr_3reg(Opcode::OR, args)?,
        Nor => instr_3reg(Opcode::NOR, args)?,
        Xor => instr_3reg(Opcode::XOR, args)?,

        Nop => AssembledInstruction::new(encode_3reg(Opcode::ADD, Reg::ZERO, Reg::ZERO, Reg::ZERO)),
        Not => {
            let rd = reg_arg(&args[0])?;
            let rs = reg_arg(&args[1])?;
            AssembledInstruction::new(encode_3reg(Opcode::NOR, rd, rs, rs))
        }
        Move => {
            let rd = reg_arg(&args[0])?;
            let rs = reg_arg(&args[1])?;
            AssembledInstruction::new(encode_3reg(Opcode::ADD, rd, rs, Reg::ZERO))
        }
        Neg => {
            let rd = reg_arg(&args[0])?;
            let rs = reg_arg(&args[1])?;
            AssembledInstruction::new(encode_3reg(Opcode::SUB, rd, Reg::ZERO, rs))
        }

        Addi => instr_2reg_imm(Opcode::ADDI, args, defines)?,
        Subi => instr_2reg_imm(Opcode::SUBI, args, defines)?,
        Ori => instr_2reg_imm(Opcode::ORI, args, defines)?,
        Andi => instr_2reg_imm(Opcode::ANDI, args, defines)?,
        Slli => instr_2reg_imm(Opcode::SLLI, args, defines)?,
        Srli => instr_2reg_imm(Opcode::SRLI, args, defines)?,
        Lli => {
            let rd = reg_arg(&args[0])?;
            let imm = define_or_const(&args[1], defines, 16)?;
            AssembledInstruction::new(encode_2reg_imm(Opcode::ORI, rd, Reg::ZERO, imm))
        }
        Lui => {
            let rd = reg_arg(&args[0])?;
            let imm = define_or_const(&args[1], defines, 16)?;
            AssembledInstruction::new(encode_1reg_imm(Opcode::LUI, rd, imm))
        }

        Lb => instr_load(Opcode::LB, args, defines)?,
        Lbu => instr_load(Opcode::LBU, args, defines)?,
        Lh => instr_load(Opcode::LH, args, defines)?,
        Lhu => instr_load(Opcode::LHU, args, defines)?,
        Lw => instr_load(Opcode::LW, args, defines)?,
        Sb => instr_store(Opcode::SB, args, defines)?,
        Sh => instr_store(Opcode::SH, args, defines)?,
        Sw => instr_store(Opcode::SW, args, defines)?,

        Jr => {
            let rd = reg_arg(&args[0])?;
            AssembledInstruction::new(encode_1reg(Opcode::JR, rd))
        }
        Ret => AssembledInstruction::new(encode_1reg(Opcode::JR, Reg::RA)),

        B => {
            let off = branch_offset(&args[0], 26, addr, symtab)?;
            AssembledInstruction::new(encode_imm26(Opcode::B, off))
        }
        Beq => instr_branch(Opcode::BEQ, args, addr, symtab)?,
        Bne => instr_branch(Opcode::BNE, args, addr, symtab)?,
        Bge => instr_branch(Opcode::BGE, args, addr, symtab)?,
        Bgt => instr_branch(Opcode::BGT, args, addr, symtab)?,
        Ble => instr_branch(Opcode::BLE, args, addr, symtab)?,
        Blt => instr_branch(Opcode::BLT, args, addr, symtab)?,
        Bgeu => instr_branch(Opcode::BGEU, args, addr, symtab)?,
        Bgtu => instr_branch(Opcode::BGTU, args, addr, symtab)?,
        Bleu => instr_branch(Opcode::BLEU, args, addr, symtab)?,
        Bltu => instr_branch(Opcode::BLTU, args, addr, symtab)?,
        Beqz => instr_branch_zero(Opcode::BEQ, args, addr, symtab)?,
        Bnez => instr_branch_zero(Opcode::BNE, args, addr, symtab)?,

        Eret => AssembledInstruction::new(op_field(Opcode::ERET)),
        Halt => AssembledInstruction::new(op_field(Opcode::HALT)),

        Call => instr_call(args, symtab, defines)?,
        Li => return instr_li(args, symtab, defines),
    };
    Ok(vec![instr])
}

//
// Word-level encoders, one per instruction format.
//

fn op_field(op: Opcode) -> u32 {
    build(31, 26, op as u32)
}

fn encode_3reg(op: Opcode, rd: Reg, rs: Reg, rt: Reg) -> u32 {
    op_field(op) | build(25, 21, rd.number()) | build(20, 16, rs.number()) | build(15, 11, rt.number())
}

fn encode_2reg_imm(op: Opcode, rd: Reg, rs: Reg, imm: i64) -> u32 {
    op_field(op) | build(25, 21, rd.number()) | build(20, 16, rs.number()) | build(15, 0, imm as u32)
}

fn encode_1reg_imm(op: Opcode, rd: Reg, imm: i64) -> u32 {
    op_field(op) | build(25, 21, rd.number()) | build(15, 0, imm as u32)
}

fn encode_1reg(op: Opcode, rd: Reg) -> u32 {
    op_field(op) | build(25, 21, rd.number())
}

fn encode_imm26(op: Opcode, imm: i64) -> u32 {
    op_field(op) | build(25, 0, imm as u32)
}

//
// Argument-level constructors shared by the mnemonic families.
//

fn instr_3reg(op: Opcode, args: &[Arg]) -> Result<AssembledInstruction, InstructionError> {
    let rd = reg_arg(&args[0])?;
    let rs = reg_arg(&args[1])?;
    let rt = reg_arg(&args[2])?;
    Ok(AssembledInstruction::new(encode_3reg(op, rd, rs, rt)))
}

fn instr_2reg_imm(
    op: Opcode,
    args: &[Arg],
    defines: &Defines,
) -> Result<AssembledInstruction, InstructionError> {
    let rd = reg_arg(&args[0])?;
    let rs = reg_arg(&args[1])?;
    let c16 = define_or_const(&args[2], defines, 16)?;
    Ok(AssembledInstruction::new(encode_2reg_imm(op, rd, rs, c16)))
}

fn instr_load(
    op: Opcode,
    args: &[Arg],
    defines: &Defines,
) -> Result<AssembledInstruction, InstructionError> {
    let rd = reg_arg(&args[0])?;
    let (rs, off16) = memref_arg(&args[1], defines)?;
    Ok(AssembledInstruction::new(encode_2reg_imm(op, rd, rs, off16)))
}

fn instr_store(
    op: Opcode,
    args: &[Arg],
    defines: &Defines,
) -> Result<AssembledInstruction, InstructionError> {
    let rs = reg_arg(&args[0])?;
    // The base register of the memory reference sits in the rd field.
    let (base, off16) = memref_arg(&args[1], defines)?;
    Ok(AssembledInstruction::new(encode_2reg_imm(op, base, rs, off16)))
}

fn instr_branch(
    op: Opcode,
    args: &[Arg],
    addr: &SegAddr,
    symtab: &SymTab,
) -> Result<AssembledInstruction, InstructionError> {
    let rd = reg_arg(&args[0])?;
    let rs = reg_arg(&args[1])?;
    let off16 = branch_offset(&args[2], 16, addr, symtab)?;
    Ok(AssembledInstruction::new(encode_2reg_imm(op, rd, rs, off16)))
}

fn instr_branch_zero(
    op: Opcode,
    args: &[Arg],
    addr: &SegAddr,
    symtab: &SymTab,
) -> Result<AssembledInstruction, InstructionError> {
    let rd = reg_arg(&args[0])?;
    let off16 = branch_offset(&args[1], 16, addr, symtab)?;
    Ok(AssembledInstruction::new(encode_2reg_imm(
        op,
        rd,
        Reg::ZERO,
        off16,
    )))
}

// CALL accepts an absolute address or a label. A label defined in
// the symbol table turns into a relocation for the label's segment;
// an unknown label turns into an import request and the destination
// field is left empty for the linker.
fn instr_call(
    args: &[Arg],
    symtab: &SymTab,
    defines: &Defines,
) -> Result<AssembledInstruction, InstructionError> {
    let is_const = match &args[0] {
        Arg::Number(_) => true,
        Arg::Id(id) => defines.contains_key(id),
        _ => false,
    };
    if is_const {
        let num = define_or_const(&args[0], defines, 26)?;
        return Ok(AssembledInstruction::new(encode_imm26(Opcode::CALL, num)));
    }
    match &args[0] {
        Arg::Id(label) => {
            if let Some(target) = symtab.get(label) {
                let mut instr = AssembledInstruction::new(encode_imm26(
                    Opcode::CALL,
                    i64::from(target.offset / 4),
                ));
                instr.reloc_req = Some((RelocKind::Call, target.segment.clone()));
                Ok(instr)
            } else {
                let mut instr = AssembledInstruction::new(encode_imm26(Opcode::CALL, 0));
                instr.import_req = Some((ImportKind::Call, label.clone()));
                Ok(instr)
            }
        }
        other => Err(InstructionError::InvalidCallTarget(other.to_string())),
    }
}

// Like CALL, but the import/relocation covers the LUI/ORI pair and
// the single request is attached to the LUI.
fn instr_li(
    args: &[Arg],
    symtab: &SymTab,
    defines: &Defines,
) -> Result<Vec<AssembledInstruction>, InstructionError> {
    let rd = reg_arg(&args[0])?;
    let pair = |value: u32| {
        vec![
            AssembledInstruction::new(encode_1reg_imm(
                Opcode::LUI,
                rd,
                i64::from(extract(value, 31, 16)),
            )),
            AssembledInstruction::new(encode_2reg_imm(
                Opcode::ORI,
                rd,
                rd,
                i64::from(extract(value, 15, 0)),
            )),
        ]
    };

    let is_const = match &args[1] {
        Arg::Number(_) => true,
        Arg::Id(id) => defines.contains_key(id),
        _ => false,
    };
    if is_const {
        let num = define_or_const(&args[1], defines, 32)?;
        return Ok(pair(num as u32));
    }
    match &args[1] {
        Arg::Id(label) => {
            if let Some(target) = symtab.get(label) {
                let segment = target.segment.clone();
                let mut instrs = pair(target.offset);
                instrs[0].reloc_req = Some((RelocKind::Li, segment));
                Ok(instrs)
            } else {
                let mut instrs = pair(0);
                instrs[0].import_req = Some((ImportKind::Li, label.clone()));
                Ok(instrs)
            }
        }
        other => Err(InstructionError::InvalidLiValue(other.to_string())),
    }
}

//
// Operand constructors.
//

fn reg_arg(arg: &Arg) -> Result<Reg, InstructionError> {
    match arg {
        Arg::Id(id) if id.starts_with('$') => id.parse(),
        other => Err(InstructionError::InvalidRegister(other.to_string())),
    }
}

// A constant fits if it is representable in `maxbits` bits either as
// an unsigned or as a two's-complement value; which one is meant is
// up to the assembly programmer.
fn const_arg(arg: &Arg, maxbits: u32) -> Result<i64, InstructionError> {
    let num = match arg {
        Arg::Number(num) => *num,
        other => return Err(InstructionError::InvalidNumber(other.to_string())),
    };
    if (num > 0 && fits_unsigned(num, maxbits)) || fits_signed(num, maxbits) {
        Ok(num)
    } else {
        Err(InstructionError::ConstantTooWide {
            value: num,
            bits: maxbits,
        })
    }
}

fn define_or_const(
    arg: &Arg,
    defines: &Defines,
    maxbits: u32,
) -> Result<i64, InstructionError> {
    match arg {
        Arg::Id(id) => match defines.get(id) {
            Some(value) => const_arg(&Arg::Number(*value), maxbits),
            None => Err(InstructionError::UndefinedConstant(id.clone())),
        },
        other => const_arg(other, maxbits),
    }
}

fn memref_arg(arg: &Arg, defines: &Defines) -> Result<(Reg, i64), InstructionError> {
    match arg {
        Arg::MemRef { offset, base } => {
            let reg: Reg = base.parse()?;
            let off = define_or_const(offset, defines, 16)?;
            Ok((reg, off))
        }
        other => Err(InstructionError::InvalidMemRef(other.to_string())),
    }
}

// Branch offsets are given either as a word delta or as a label. A
// label must live in the instruction's own segment, on a word
// boundary, and the word delta to it must fit `nbits` as signed.
fn branch_offset(
    arg: &Arg,
    nbits: u32,
    addr: &SegAddr,
    symtab: &SymTab,
) -> Result<i64, InstructionError> {
    let label = match arg {
        Arg::Number(num) => {
            return if fits_signed(*num, nbits) {
                Ok(*num)
            } else {
                Err(InstructionError::BranchOffsetTooWide { bits: nbits })
            };
        }
        Arg::Id(id) => id,
        other => return Err(InstructionError::InvalidBranchTarget(other.to_string())),
    };
    let target = symtab
        .get(label)
        .ok_or_else(|| InstructionError::UndefinedLabel(label.clone()))?;
    if target.segment != addr.segment {
        return Err(InstructionError::CrossSegmentBranch);
    }
    if target.offset % 4 != 0 {
        return Err(InstructionError::UnalignedBranchTarget);
    }
    let delta = (i64::from(target.offset) - i64::from(addr.offset)) / 4;
    if !fits_signed(delta, nbits) {
        return Err(InstructionError::BranchOffsetTooWide { bits: nbits });
    }
    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id(name: &str) -> Arg {
        Arg::Id(name.to_string())
    }

    fn num(value: i64) -> Arg {
        Arg::Number(value)
    }

    fn memref(offset: Arg, base: &str) -> Arg {
        Arg::MemRef {
            offset: Box::new(offset),
            base: base.to_string(),
        }
    }

    fn assemble_one(name: &str, args: &[Arg]) -> Result<u32, InstructionError> {
        let addr = SegAddr::new("text", 0);
        let instrs = assemble_instruction(name, args, &addr, &SymTab::new(), &Defines::new())?;
        assert_eq!(instrs.len(), 1);
        Ok(instrs[0].word)
    }

    #[rstest]
    #[case("add", &[id("$r1"), id("$r2"), id("$r3")], 0x0022_1800)]
    #[case("sub", &[id("$r1"), id("$r2"), id("$r3")], 0x0422_1800)]
    #[case("xor", &[id("$r5"), id("$r5"), id("$r7")], 0x30A5_3800)]
    #[case("lui", &[id("$sp"), num(0x13)], 0x1BA0_0013)]
    #[case("ori", &[id("$r3"), id("$r0"), num(0x1234)], 0xA860_1234)]
    #[case("addi", &[id("$r6"), id("$r0"), num(25)], 0x80C0_0019)]
    #[case("jr", &[id("$ra")], 0x5BE0_0000)]
    #[case("eret", &[], 0xF800_0000)]
    #[case("halt", &[], 0xFC00_0000)]
    fn exact_encodings(#[case] name: &str, #[case] args: &[Arg], #[case] expected: u32) {
        assert_eq!(assemble_one(name, args).unwrap(), expected);
    }

    #[rstest]
    #[case("nop", &[], 0x0000_0000)]
    #[case("move", &[id("$t0"), id("$t1")], 0x0109_0000)]
    #[case("not", &[id("$r1"), id("$r2")], 0x2C22_1000)]
    #[case("neg", &[id("$r5"), id("$r6")], 0x04A0_3000)]
    #[case("lli", &[id("$r3"), num(0x1234)], 0xA860_1234)]
    #[case("ret", &[], 0x5BE0_0000)]
    fn pseudo_expansion(#[case] name: &str, #[case] args: &[Arg], #[case] expected: u32) {
        assert_eq!(assemble_one(name, args).unwrap(), expected);
    }

    #[test]
    fn negative_immediate_truncates_to_field() {
        // addi $r1, $r1, -2: low 16 bits of the two's complement.
        assert_eq!(
            assemble_one("addi", &[id("$r1"), id("$r1"), num(-2)]).unwrap(),
            0x8021_FFFE
        );
    }

    #[test]
    fn load_store_operands() {
        // lw $r5, -8($sp): rd=5, rs=29, imm=0xFFF8
        assert_eq!(
            assemble_one("lw", &[id("$r5"), memref(num(-8), "$sp")]).unwrap(),
            0x3CBD_FFF8
        );
        // sw $r5, 4($t0): base $t0 (8) in the rd field, rs=5
        assert_eq!(
            assemble_one("sw", &[id("$r5"), memref(num(4), "$t0")]).unwrap(),
            0x5105_0004
        );
    }

    #[test]
    fn memref_offset_through_defines() {
        let mut defines = Defines::new();
        defines.insert("idx".to_string(), 12);
        let addr = SegAddr::new("text", 0);
        let instrs = assemble_instruction(
            "lw",
            &[id("$r5"), memref(id("idx"), "$t0")],
            &addr,
            &SymTab::new(),
            &defines,
        )
        .unwrap();
        assert_eq!(instrs[0].word, 0x3CA8_000C);
    }

    #[test]
    fn immediate_through_defines() {
        let mut defines = Defines::new();
        defines.insert("count".to_string(), 400);
        let addr = SegAddr::new("text", 0);
        let instrs = assemble_instruction(
            "addi",
            &[id("$r4"), id("$r0"), id("count")],
            &addr,
            &SymTab::new(),
            &defines,
        )
        .unwrap();
        assert_eq!(instrs[0].word, 0x8080_0190);

        let err = assemble_instruction(
            "addi",
            &[id("$r4"), id("$r0"), id("missing")],
            &addr,
            &SymTab::new(),
            &defines,
        )
        .unwrap_err();
        assert_eq!(err, InstructionError::UndefinedConstant("missing".into()));
    }

    #[rstest]
    #[case(65535, true)]
    #[case(-32768, true)]
    #[case(32767, true)]
    #[case(65536, false)]
    #[case(-32769, false)]
    fn immediate_16bit_bounds(#[case] value: i64, #[case] ok: bool) {
        let result = assemble_one("addi", &[id("$r1"), id("$r1"), num(value)]);
        assert_eq!(result.is_ok(), ok, "value {value}");
    }

    #[test]
    fn branch_to_label() {
        let mut symtab = SymTab::new();
        symtab.insert("back".to_string(), SegAddr::new("text", 0));
        symtab.insert("fwd".to_string(), SegAddr::new("text", 24));
        let addr = SegAddr::new("text", 8);

        let instrs =
            assemble_instruction("beq", &[id("$r1"), id("$r2"), id("back")], &addr, &symtab, &Defines::new())
                .unwrap();
        // delta (0 - 8) / 4 = -2
        assert_eq!(extract(instrs[0].word, 15, 0), 0xFFFE);

        let instrs =
            assemble_instruction("bne", &[id("$r1"), id("$r2"), id("fwd")], &addr, &symtab, &Defines::new())
                .unwrap();
        assert_eq!(extract(instrs[0].word, 15, 0), 4);
    }

    #[test]
    fn branch_zero_pseudo() {
        let mut symtab = SymTab::new();
        symtab.insert("loop".to_string(), SegAddr::new("text", 0));
        let addr = SegAddr::new("text", 12);
        let instrs =
            assemble_instruction("bnez", &[id("$r5"), id("loop")], &addr, &symtab, &Defines::new())
                .unwrap();
        assert_eq!(Opcode::of(instrs[0].word), Ok(Opcode::BNE));
        assert_eq!(extract(instrs[0].word, 25, 21), 5);
        assert_eq!(extract(instrs[0].word, 20, 16), 0);
        assert_eq!(extract(instrs[0].word, 15, 0), 0xFFFD);
    }

    #[rstest]
    #[case(32767, true)]
    #[case(-32768, true)]
    #[case(32768, false)]
    #[case(-32769, false)]
    fn branch_numeric_offset_bounds(#[case] delta: i64, #[case] ok: bool) {
        let result = assemble_one("beq", &[id("$r1"), id("$r2"), num(delta)]);
        assert_eq!(result.is_ok(), ok, "delta {delta}");
    }

    #[test]
    fn branch_label_rejections() {
        let mut symtab = SymTab::new();
        symtab.insert("other".to_string(), SegAddr::new("data", 0));
        symtab.insert("odd".to_string(), SegAddr::new("text", 6));
        let addr = SegAddr::new("text", 0);
        let defines = Defines::new();

        let err = assemble_instruction("beq", &[id("$r1"), id("$r2"), id("other")], &addr, &symtab, &defines)
            .unwrap_err();
        assert_eq!(err, InstructionError::CrossSegmentBranch);

        let err = assemble_instruction("beq", &[id("$r1"), id("$r2"), id("odd")], &addr, &symtab, &defines)
            .unwrap_err();
        assert_eq!(err, InstructionError::UnalignedBranchTarget);

        let err = assemble_instruction("beq", &[id("$r1"), id("$r2"), id("nowhere")], &addr, &symtab, &defines)
            .unwrap_err();
        assert_eq!(err, InstructionError::UndefinedLabel("nowhere".into()));
    }

    #[test]
    fn call_absolute() {
        assert_eq!(
            assemble_one("call", &[num(0x3FF_FFFF)]).unwrap(),
            0x77FF_FFFF
        );
        assert!(matches!(
            assemble_one("call", &[num(0x400_0000)]),
            Err(InstructionError::ConstantTooWide { .. })
        ));
    }

    #[test]
    fn call_known_label_emits_reloc() {
        let mut symtab = SymTab::new();
        symtab.insert("func".to_string(), SegAddr::new("text", 16));
        let addr = SegAddr::new("text", 0);
        let instrs =
            assemble_instruction("call", &[id("func")], &addr, &symtab, &Defines::new()).unwrap();
        assert_eq!(extract(instrs[0].word, 25, 0), 4);
        assert_eq!(
            instrs[0].reloc_req,
            Some((RelocKind::Call, "text".to_string()))
        );
        assert_eq!(instrs[0].import_req, None);
    }

    #[test]
    fn call_unknown_label_emits_import() {
        let addr = SegAddr::new("text", 0);
        let instrs =
            assemble_instruction("call", &[id("exit")], &addr, &SymTab::new(), &Defines::new())
                .unwrap();
        assert_eq!(extract(instrs[0].word, 25, 0), 0);
        assert_eq!(
            instrs[0].import_req,
            Some((ImportKind::Call, "exit".to_string()))
        );
        assert_eq!(instrs[0].reloc_req, None);
    }

    #[rstest]
    #[case(0x1234_5678, 0x1900_1234, 0xA908_5678)]
    #[case(0, 0x1900_0000, 0xA908_0000)]
    #[case(0xFFFF_FFFF, 0x1900_FFFF, 0xA908_FFFF)]
    fn li_splits_constants(#[case] value: i64, #[case] lui: u32, #[case] ori: u32) {
        let addr = SegAddr::new("text", 0);
        let instrs = assemble_instruction(
            "li",
            &[id("$t0"), num(value)],
            &addr,
            &SymTab::new(),
            &Defines::new(),
        )
        .unwrap();
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].word, lui);
        assert_eq!(instrs[1].word, ori);
        assert_eq!(instrs[0].import_req, None);
        assert_eq!(instrs[0].reloc_req, None);
    }

    #[test]
    fn li_known_label_relocates_the_lui_only() {
        let mut symtab = SymTab::new();
        symtab.insert("buf".to_string(), SegAddr::new("data", 0x24));
        let addr = SegAddr::new("text", 0);
        let instrs =
            assemble_instruction("li", &[id("$t0"), id("buf")], &addr, &symtab, &Defines::new())
                .unwrap();
        assert_eq!(extract(instrs[0].word, 15, 0), 0);
        assert_eq!(extract(instrs[1].word, 15, 0), 0x24);
        assert_eq!(instrs[0].reloc_req, Some((RelocKind::Li, "data".to_string())));
        assert_eq!(instrs[1].reloc_req, None);
        assert_eq!(instrs[1].import_req, None);
    }

    #[test]
    fn li_unknown_label_imports_through_the_lui() {
        let addr = SegAddr::new("text", 0);
        let instrs = assemble_instruction(
            "li",
            &[id("$t0"), id("heap_top")],
            &addr,
            &SymTab::new(),
            &Defines::new(),
        )
        .unwrap();
        assert_eq!(extract(instrs[0].word, 15, 0), 0);
        assert_eq!(extract(instrs[1].word, 15, 0), 0);
        assert_eq!(
            instrs[0].import_req,
            Some((ImportKind::Li, "heap_top".to_string()))
        );
        assert_eq!(instrs[1].import_req, None);
    }

    #[test]
    fn argument_count_checked() {
        assert_eq!(
            assemble_one("add", &[id("$r1"), id("$r2")]),
            Err(InstructionError::ArgumentCount {
                name: "add",
                expected: 3
            })
        );
    }

    #[test]
    fn unknown_mnemonic() {
        assert_eq!(
            assemble_one("frob", &[]),
            Err(InstructionError::UnknownInstruction("frob".into()))
        );
    }

    #[test]
    fn bad_register_operand() {
        assert!(matches!(
            assemble_one("add", &[id("$r1"), num(3), id("$r2")]),
            Err(InstructionError::InvalidRegister(_))
        ));
    }

    #[test]
    fn lengths() {
        assert_eq!(length("li"), Some(8));
        assert_eq!(length("add"), Some(4));
        assert_eq!(length("nop"), Some(4));
        assert_eq!(length("frob"), None);
        assert!(exists("beqz"));
        assert!(!exists("jalr"));
    }
}
