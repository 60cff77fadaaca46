//! The CPU core registers, visible to programs through the memory
//! unit in the low core address space.

use crate::consts::{
    ADDR_CONTROL_1, ADDR_EXCEPTION_CAUSE, ADDR_EXCEPTION_RETURN_ADDR, ADDR_EXCEPTION_VECTOR,
    ADDR_INTERRUPT_ENABLE, ADDR_INTERRUPT_PENDING,
};
use crate::error::PeripheralError;
use crate::peripheral::{AccessWidth, Peripheral};

/// The memory-mapped core registers.
///
/// Only word-sized, word-aligned accesses are accepted. Writes to
/// the read-only registers are silently ignored; reads and writes to
/// unmapped offsets fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreRegisters {
    /// Address the PC jumps to on exception entry.
    pub exception_vector: u32,
    /// General control register.
    pub control_1: u32,
    /// Cause code of the last exception (read-only to programs).
    pub exception_cause: u32,
    /// Where ERET resumes execution (read-only to programs).
    pub exception_return_addr: u32,
    /// Interrupt enable mask.
    pub interrupt_enable: u32,
    /// Pending interrupt lines (read-only to programs).
    pub interrupt_pending: u32,
}

impl CoreRegisters {
    /// Creates the register block, all zeroes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-zeroes every register.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn check_access(offset: u32, width: AccessWidth) -> Result<(), PeripheralError> {
        if width != AccessWidth::Word || offset % 4 != 0 {
            return Err(PeripheralError::Align { offset });
        }
        Ok(())
    }
}

impl Peripheral for CoreRegisters {
    fn read(&mut self, offset: u32, width: AccessWidth) -> Result<u32, PeripheralError> {
        Self::check_access(offset, width)?;
        match offset {
            ADDR_EXCEPTION_VECTOR => Ok(self.exception_vector),
            ADDR_CONTROL_1 => Ok(self.control_1),
            ADDR_EXCEPTION_CAUSE => Ok(self.exception_cause),
            ADDR_EXCEPTION_RETURN_ADDR => Ok(self.exception_return_addr),
            ADDR_INTERRUPT_ENABLE => Ok(self.interrupt_enable),
            ADDR_INTERRUPT_PENDING => Ok(self.interrupt_pending),
            _ => Err(PeripheralError::Access { offset }),
        }
    }

    fn write(&mut self, offset: u32, width: AccessWidth, data: u32) -> Result<(), PeripheralError> {
        Self::check_access(offset, width)?;
        match offset {
            ADDR_EXCEPTION_VECTOR => self.exception_vector = data,
            ADDR_CONTROL_1 => self.control_1 = data,
            ADDR_INTERRUPT_ENABLE => self.interrupt_enable = data,
            // Read-only registers swallow writes.
            ADDR_EXCEPTION_CAUSE | ADDR_EXCEPTION_RETURN_ADDR | ADDR_INTERRUPT_PENDING => {}
            _ => return Err(PeripheralError::Access { offset }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ADDR_EXCEPTION_VECTOR)]
    #[case(ADDR_CONTROL_1)]
    #[case(ADDR_INTERRUPT_ENABLE)]
    fn writable_registers(#[case] addr: u32) {
        let mut cregs = CoreRegisters::new();
        cregs.write(addr, AccessWidth::Word, 0x40).unwrap();
        assert_eq!(cregs.read(addr, AccessWidth::Word), Ok(0x40));
    }

    #[test]
    fn read_only_registers_ignore_writes() {
        let mut cregs = CoreRegisters::new();
        cregs.exception_cause = 2;
        cregs.write(ADDR_EXCEPTION_CAUSE, AccessWidth::Word, 99).unwrap();
        assert_eq!(cregs.read(ADDR_EXCEPTION_CAUSE, AccessWidth::Word), Ok(2));

        cregs.write(ADDR_EXCEPTION_RETURN_ADDR, AccessWidth::Word, 99).unwrap();
        assert_eq!(cregs.read(ADDR_EXCEPTION_RETURN_ADDR, AccessWidth::Word), Ok(0));
    }

    #[test]
    fn narrow_or_unaligned_access_rejected() {
        let mut cregs = CoreRegisters::new();
        assert_eq!(
            cregs.read(ADDR_CONTROL_1, AccessWidth::Byte),
            Err(PeripheralError::Align { offset: ADDR_CONTROL_1 })
        );
        assert_eq!(
            cregs.read(ADDR_CONTROL_1 + 2, AccessWidth::Word),
            Err(PeripheralError::Align { offset: ADDR_CONTROL_1 + 2 })
        );
        assert_eq!(
            cregs.write(ADDR_CONTROL_1, AccessWidth::Half, 0),
            Err(PeripheralError::Align { offset: ADDR_CONTROL_1 })
        );
    }

    #[test]
    fn unmapped_offsets_rejected() {
        let mut cregs = CoreRegisters::new();
        assert_eq!(
            cregs.read(0x200, AccessWidth::Word),
            Err(PeripheralError::Access { offset: 0x200 })
        );
        assert_eq!(
            cregs.write(0x200, AccessWidth::Word, 1),
            Err(PeripheralError::Access { offset: 0x200 })
        );
    }
}
