//! Memory-map constants of the Luz core.

/// Start of user memory; images are linked for and loaded at this
/// address, and the PC resets to it.
pub const USER_MEMORY_START: u32 = 0x0010_0000;

/// Size of user memory in bytes.
pub const USER_MEMORY_SIZE: u32 = 0x0004_0000;

/// First address past user memory.
pub const USER_MEMORY_END: u32 = USER_MEMORY_START + USER_MEMORY_SIZE;

/// Core-register block covers `[0x000, 0xFFF]`.
pub const CORE_REGISTERS_START: u32 = 0x000;
/// Last address of the core-register block.
pub const CORE_REGISTERS_END: u32 = 0xFFF;

/// `exception_vector` register offset.
pub const ADDR_EXCEPTION_VECTOR: u32 = 0x004;
/// `control_1` register offset.
pub const ADDR_CONTROL_1: u32 = 0x100;
/// `exception_cause` register offset (read-only).
pub const ADDR_EXCEPTION_CAUSE: u32 = 0x108;
/// `exception_return_addr` register offset (read-only).
pub const ADDR_EXCEPTION_RETURN_ADDR: u32 = 0x10C;
/// `interrupt_enable` register offset.
pub const ADDR_INTERRUPT_ENABLE: u32 = 0x120;
/// `interrupt_pending` register offset (read-only).
pub const ADDR_INTERRUPT_PENDING: u32 = 0x124;

/// The debug-queue peripheral's single mapped address.
pub const ADDR_DEBUG_QUEUE: u32 = 0x000F_0000;
