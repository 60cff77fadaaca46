//! Disassembler: encoded words back into mnemonic assembly text.

use crate::bits::{extract, sign_extend};
use crate::error::DisassembleError;
use crate::opcode::Opcode;
use crate::reg::Reg;

/// How register operands are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegStyle {
    Numbered,
    Alias,
}

fn reg_name(num: u32, style: RegStyle) -> String {
    match style {
        RegStyle::Numbered => format!("$r{num}"),
        RegStyle::Alias => Reg::new(num as u8)
            .map(|reg| reg.alias().to_string())
            .unwrap_or_else(|| format!("$r{num}")),
    }
}

/// Disassembles a word, rendering registers as `$rN`.
pub fn disassemble(word: u32) -> Result<String, DisassembleError> {
    disassemble_styled(word, RegStyle::Numbered)
}

/// Disassembles a word, rendering registers by their aliases.
pub fn disassemble_with_aliases(word: u32) -> Result<String, DisassembleError> {
    disassemble_styled(word, RegStyle::Alias)
}

fn disassemble_styled(word: u32, style: RegStyle) -> Result<String, DisassembleError> {
    let op = Opcode::of(word).map_err(|_| DisassembleError(extract(word, 31, 26) as u8))?;

    use Opcode::*;
    let text = match op {
        ADD | SUB | MULU | MUL | DIVU | DIV | SLL | SRL | AND | OR | NOR | XOR => {
            let rd = reg_name(extract(word, 25, 21), style);
            let rs = reg_name(extract(word, 20, 16), style);
            let rt = reg_name(extract(word, 15, 11), style);
            format!("{op} {rd}, {rs}, {rt}")
        }
        ADDI | SUBI | ANDI | ORI | SLLI | SRLI => {
            let rd = reg_name(extract(word, 25, 21), style);
            let rs = reg_name(extract(word, 20, 16), style);
            let imm = extract(word, 15, 0);
            format!("{op} {rd}, {rs}, 0x{imm:X}")
        }
        LUI => {
            let rd = reg_name(extract(word, 25, 21), style);
            let imm = extract(word, 15, 0);
            format!("{op} {rd}, 0x{imm:X}")
        }
        LB | LH | LW | LBU | LHU => {
            let rd = reg_name(extract(word, 25, 21), style);
            let rs = reg_name(extract(word, 20, 16), style);
            let offset = sign_extend(extract(word, 15, 0), 16);
            format!("{op} {rd}, {offset}({rs})")
        }
        SB | SH | SW => {
            // The base register lives in the rd field; the value
            // register in rs.
            let base = reg_name(extract(word, 25, 21), style);
            let rs = reg_name(extract(word, 20, 16), style);
            let offset = sign_extend(extract(word, 15, 0), 16);
            format!("{op} {rs}, {offset}({base})")
        }
        BEQ | BNE | BGE | BGT | BLE | BLT | BGEU | BGTU | BLEU | BLTU => {
            let rd = reg_name(extract(word, 25, 21), style);
            let rs = reg_name(extract(word, 20, 16), style);
            let offset = sign_extend(extract(word, 15, 0), 16);
            format!("{op} {rd}, {rs}, {offset}")
        }
        JR => {
            let rd = reg_name(extract(word, 25, 21), style);
            format!("{op} {rd}")
        }
        CALL => {
            // Annotated with the byte destination (the field is in
            // words).
            let imm = extract(word, 25, 0);
            format!("{op} 0x{imm:X} [0x{:X}]", imm * 4)
        }
        B => {
            let offset = sign_extend(extract(word, 25, 0), 26);
            format!("{op} {offset}")
        }
        ERET | HALT => op.to_string(),
    };
    Ok(text)
}
