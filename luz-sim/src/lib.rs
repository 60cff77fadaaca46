#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod consts;
pub mod error;
pub mod interpreter;
pub mod memory;
pub mod peripheral;

pub use error::{ExceptionCause, MemoryError, PeripheralError};
pub use interpreter::LuzSim;
pub use memory::MemoryUnit;
pub use peripheral::{AccessWidth, CoreRegisters, DebugQueue, Peripheral};
