//! The 6-bit opcode space of the Luz CPU.

use crate::bits::extract;

/// The byte can't be mapped to any known [`Opcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid opcode")]
pub struct InvalidOpcode;

/// Operation of a single 32-bit Luz instruction, held in bits
/// `[31:26]` of the encoded word.
///
/// Discriminants are the architectural opcode values; the gaps
/// (0x1E–0x1F, 0x26–0x28, 0x2D–0x3D) are reserved and decode to
/// [`InvalidOpcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Opcode {
    /// `rd = rs + rt`, wrapping.
    ADD = 0x00,
    /// `rd = rs - rt`, wrapping.
    SUB = 0x01,
    /// Unsigned 64-bit product; low word to `rd`, high word to `rd+1`.
    MULU = 0x02,
    /// Signed 64-bit product; spills into `rd+1` when it overflows 32 bits.
    MUL = 0x03,
    /// Unsigned division; quotient to `rd`, remainder to `rd+1`.
    DIVU = 0x04,
    /// Signed floor division; quotient to `rd`, remainder to `rd+1`.
    DIV = 0x05,
    /// `rd = imm16 << 16`.
    LUI = 0x06,
    /// `rd = rs << (rt & 0x1F)`.
    SLL = 0x07,
    /// `rd = rs >> (rt & 0x1F)`, logical.
    SRL = 0x08,
    /// `rd = rs & rt`.
    AND = 0x09,
    /// `rd = rs | rt`.
    OR = 0x0A,
    /// `rd = !(rs | rt)`.
    NOR = 0x0B,
    /// `rd = rs ^ rt`.
    XOR = 0x0C,
    /// Load sign-extended byte.
    LB = 0x0D,
    /// Load sign-extended halfword.
    LH = 0x0E,
    /// Load word.
    LW = 0x0F,
    /// Load zero-extended byte.
    LBU = 0x10,
    /// Load zero-extended halfword.
    LHU = 0x11,
    /// Store byte.
    SB = 0x12,
    /// Store halfword.
    SH = 0x13,
    /// Store word.
    SW = 0x14,
    /// Unconditional relative branch, signed 26-bit word offset.
    B = 0x15,
    /// `pc = rd`.
    JR = 0x16,
    /// Branch if equal.
    BEQ = 0x17,
    /// Branch if not equal.
    BNE = 0x18,
    /// Branch if greater or equal, signed.
    BGE = 0x19,
    /// Branch if greater, signed.
    BGT = 0x1A,
    /// Branch if less or equal, signed.
    BLE = 0x1B,
    /// Branch if less, signed.
    BLT = 0x1C,
    /// `$ra = pc + 4; pc = imm26 * 4`.
    CALL = 0x1D,
    /// `rd = rs + imm16`, immediate zero-extended.
    ADDI = 0x20,
    /// `rd = rs - imm16`, immediate zero-extended.
    SUBI = 0x21,
    /// Branch if greater or equal, unsigned.
    BGEU = 0x22,
    /// Branch if greater, unsigned.
    BGTU = 0x23,
    /// Branch if less or equal, unsigned.
    BLEU = 0x24,
    /// Branch if less, unsigned.
    BLTU = 0x25,
    /// `rd = rs & imm16`.
    ANDI = 0x29,
    /// `rd = rs | imm16`.
    ORI = 0x2A,
    /// `rd = rs << (imm & 0x1F)`.
    SLLI = 0x2B,
    /// `rd = rs >> (imm & 0x1F)`, logical.
    SRLI = 0x2C,
    /// Return from exception.
    ERET = 0x3E,
    /// Halt the CPU.
    HALT = 0x3F,
}

impl Opcode {
    /// Decodes the opcode field of an encoded instruction word.
    pub fn of(word: u32) -> Result<Self, InvalidOpcode> {
        Self::try_from(extract(word, 31, 26) as u8)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcode;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match b {
            0x00 => ADD,
            0x01 => SUB,
            0x02 => MULU,
            0x03 => MUL,
            0x04 => DIVU,
            0x05 => DIV,
            0x06 => LUI,
            0x07 => SLL,
            0x08 => SRL,
            0x09 => AND,
            0x0A => OR,
            0x0B => NOR,
            0x0C => XOR,
            0x0D => LB,
            0x0E => LH,
            0x0F => LW,
            0x10 => LBU,
            0x11 => LHU,
            0x12 => SB,
            0x13 => SH,
            0x14 => SW,
            0x15 => B,
            0x16 => JR,
            0x17 => BEQ,
            0x18 => BNE,
            0x19 => BGE,
            0x1A => BGT,
            0x1B => BLE,
            0x1C => BLT,
            0x1D => CALL,
            0x20 => ADDI,
            0x21 => SUBI,
            0x22 => BGEU,
            0x23 => BGTU,
            0x24 => BLEU,
            0x25 => BLTU,
            0x29 => ANDI,
            0x2A => ORI,
            0x2B => SLLI,
            0x2C => SRLI,
            0x3E => ERET,
            0x3F => HALT,
            _ => return Err(InvalidOpcode),
        })
    }
}
