#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod assembler;
pub mod bits;
pub mod disasm;
pub mod error;
pub mod ihex;
pub mod instruction;
pub mod lexer;
pub mod linker;
pub mod object;
pub mod opcode;
pub mod parser;
pub mod reg;

pub use assembler::Assembler;
pub use error::{
    AssemblyError, DisassembleError, InstructionError, LexError, LinkerError, ParseError,
};
pub use ihex::IhexWriter;
pub use instruction::{AssembledInstruction, Mnemonic};
pub use linker::{Linker, DEFAULT_BASE_ADDRESS, DEFAULT_MEM_SIZE};
pub use object::{
    ExportEntry, ImportEntry, ImportKind, ObjectFile, RelocEntry, RelocKind, SegAddr,
};
pub use opcode::{InvalidOpcode, Opcode};
pub use reg::Reg;
