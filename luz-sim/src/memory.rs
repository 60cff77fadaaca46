//! The memory unit: user memory plus the memory-mapped peripheral
//! registry.

use std::cell::RefCell;
use std::rc::Rc;

use crate::consts::{USER_MEMORY_END, USER_MEMORY_SIZE, USER_MEMORY_START};
use crate::error::MemoryError;
use crate::peripheral::{AccessWidth, Peripheral};

/// A registered peripheral and the inclusive address range it
/// answers.
struct Mapping {
    from: u32,
    to: u32,
    handler: Rc<RefCell<dyn Peripheral>>,
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

/// Memory as the CPU sees it: user memory at
/// `[USER_MEMORY_START, USER_MEMORY_END)` and peripherals wherever
/// they are registered.
///
/// Multi-byte accesses are little-endian. User accesses must be
/// aligned to their width and inside the user range; everything else
/// is dispatched to the peripheral registry.
#[derive(Debug)]
pub struct MemoryUnit {
    user_image: Vec<u8>,
    peripherals: Vec<Mapping>,
}

impl MemoryUnit {
    /// Creates the unit over a loaded image, zero-padded to the user
    /// memory size.
    pub fn new(mut user_image: Vec<u8>) -> Self {
        if user_image.len() < USER_MEMORY_SIZE as usize {
            user_image.resize(USER_MEMORY_SIZE as usize, 0);
        }
        Self {
            user_image,
            peripherals: Vec::new(),
        }
    }

    /// Registers a peripheral for the inclusive range
    /// `[from_addr, to_addr]`. Accesses are handed to it with the
    /// address made relative to `from_addr`.
    pub fn register_peripheral(
        &mut self,
        from_addr: u32,
        to_addr: u32,
        handler: Rc<RefCell<dyn Peripheral>>,
    ) {
        self.peripherals.push(Mapping {
            from: from_addr,
            to: to_addr,
            handler,
        });
    }

    /// Reads an instruction word. Instruction fetch goes to user
    /// memory only.
    pub fn read_instruction(&self, addr: u32) -> Result<u32, MemoryError> {
        self.check_user_access(addr, AccessWidth::Word)?;
        Ok(self.read_user_word(addr))
    }

    /// Reads from memory or a peripheral.
    pub fn read_mem(&self, addr: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        if let Some(mapping) = self.find_peripheral(addr) {
            let offset = addr - mapping.from;
            return Ok(mapping.handler.borrow_mut().read(offset, width)?);
        }
        self.check_user_access(addr, width)?;
        let start = (addr - USER_MEMORY_START) as usize;
        Ok(match width {
            AccessWidth::Byte => u32::from(self.user_image[start]),
            AccessWidth::Half => u32::from(u16::from_le_bytes(
                self.user_image[start..start + 2].try_into().expect("bounds checked"),
            )),
            AccessWidth::Word => self.read_user_word(addr),
        })
    }

    /// Writes to memory or a peripheral.
    pub fn write_mem(&mut self, addr: u32, width: AccessWidth, data: u32) -> Result<(), MemoryError> {
        if let Some(mapping) = self.find_peripheral(addr) {
            let offset = addr - mapping.from;
            return Ok(mapping.handler.borrow_mut().write(offset, width, data)?);
        }
        self.check_user_access(addr, width)?;
        let start = (addr - USER_MEMORY_START) as usize;
        match width {
            AccessWidth::Byte => self.user_image[start] = data as u8,
            AccessWidth::Half => {
                self.user_image[start..start + 2].copy_from_slice(&(data as u16).to_le_bytes())
            }
            AccessWidth::Word => {
                self.user_image[start..start + 4].copy_from_slice(&data.to_le_bytes())
            }
        }
        Ok(())
    }

    fn find_peripheral(&self, addr: u32) -> Option<&Mapping> {
        self.peripherals
            .iter()
            .find(|mapping| (mapping.from..=mapping.to).contains(&addr))
    }

    fn check_user_access(&self, addr: u32, width: AccessWidth) -> Result<(), MemoryError> {
        if addr % width.bytes() != 0 {
            return Err(MemoryError::Align {
                addr,
                width: width.bytes(),
            });
        }
        if !(USER_MEMORY_START..USER_MEMORY_END).contains(&addr) {
            return Err(MemoryError::Access { addr });
        }
        Ok(())
    }

    fn read_user_word(&self, addr: u32) -> u32 {
        let start = (addr - USER_MEMORY_START) as usize;
        u32::from_le_bytes(
            self.user_image[start..start + 4].try_into().expect("bounds checked"),
        )
    }
}
