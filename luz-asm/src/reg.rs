//! General-purpose register indices and their assembly spellings.

use core::fmt;
use core::str::FromStr;

use crate::error::InstructionError;

/// Canonical alias of each register, indexed by register number.
const ALIASES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$t8", "$t9", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
    "$k0", "$k1", "$fp", "$sp", "$re", "$ra",
];

/// One of the 32 general-purpose registers.
///
/// Accepted assembly spellings are `$rN` with `N` in `0..=31` and the
/// standard aliases (`$zero`, `$at`, `$v0`..`$v1`, `$a0`..`$a3`,
/// `$t0`..`$t9`, `$s0`..`$s7`, `$k0`..`$k1`, `$fp`, `$sp`, `$re`,
/// `$ra`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(u8);

impl Reg {
    /// `$zero` -- hard-wired zero.
    pub const ZERO: Reg = Reg(0);
    /// `$sp` -- stack pointer.
    pub const SP: Reg = Reg(29);
    /// `$ra` -- return address, written by CALL.
    pub const RA: Reg = Reg(31);

    /// Wraps a raw register number; `None` above 31.
    pub const fn new(num: u8) -> Option<Reg> {
        if num <= 31 {
            Some(Reg(num))
        } else {
            None
        }
    }

    /// The register number as a field value.
    pub const fn number(self) -> u32 {
        self.0 as u32
    }

    /// The register number as a register-file index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The canonical alias, e.g. `"$sp"` for register 29.
    pub const fn alias(self) -> &'static str {
        ALIASES[self.0 as usize]
    }
}

impl FromStr for Reg {
    type Err = InstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InstructionError::InvalidRegister(s.to_string());
        if !s.starts_with('$') {
            return Err(invalid());
        }
        if let Some(pos) = ALIASES.iter().position(|alias| *alias == s) {
            return Ok(Reg(pos as u8));
        }
        // $rN, one or two digits
        let digits = s.strip_prefix("$r").ok_or_else(invalid)?;
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let num: u8 = digits.parse().map_err(|_| invalid())?;
        Reg::new(num).ok_or_else(invalid)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias())
    }
}
