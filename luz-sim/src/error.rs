//! Error types and exception causes of the simulator.

use thiserror::Error;

/// Raised by peripherals for accesses they don't accept. Translated
/// to a `MemoryAccess` CPU exception during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PeripheralError {
    /// The peripheral doesn't accept this width or alignment.
    #[error("misaligned peripheral access at offset 0x{offset:X}")]
    Align {
        /// Offset into the peripheral's range.
        offset: u32,
    },
    /// No register of the peripheral lives at this offset.
    #[error("no peripheral register at offset 0x{offset:X}")]
    Access {
        /// Offset into the peripheral's range.
        offset: u32,
    },
}

/// Raised by the memory unit. Translated to a `MemoryAccess` CPU
/// exception during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address not aligned to the access width.
    #[error("unaligned {width}-byte access at address 0x{addr:08X}")]
    Align {
        /// The accessed address.
        addr: u32,
        /// The access width in bytes.
        width: u32,
    },
    /// Address outside user memory and every peripheral range.
    #[error("address 0x{addr:08X} out of bounds")]
    Access {
        /// The accessed address.
        addr: u32,
    },
    /// A peripheral rejected the access.
    #[error(transparent)]
    Peripheral(#[from] PeripheralError),
}

/// Cause of a CPU exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCause {
    /// Explicit trap.
    Trap,
    /// DIV or DIVU with a zero divisor.
    DivideByZero,
    /// Bad memory or peripheral access.
    MemoryAccess,
    /// Instruction word with a reserved opcode.
    InvalidOpcode,
    /// External interrupt.
    Interrupt,
}

impl ExceptionCause {
    /// The architectural cause code written to `exception_cause`.
    pub const fn code(self) -> u32 {
        match self {
            ExceptionCause::Trap => 1,
            ExceptionCause::DivideByZero => 2,
            ExceptionCause::MemoryAccess => 3,
            ExceptionCause::InvalidOpcode => 4,
            ExceptionCause::Interrupt => 32,
        }
    }
}
