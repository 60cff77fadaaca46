//! Error types surfaced by the assembler-side crates.
//!
//! Assembler and linker errors are fatal and carry a human-readable
//! message; assembly errors also carry the source line they were
//! raised on.

use thiserror::Error;

/// Raised by the lexer for malformed tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A character outside the assembly character set.
    #[error("illegal character {found:?} (at line {line})")]
    IllegalChar {
        /// The offending character.
        found: char,
        /// Source line number.
        line: u32,
    },
    /// A string literal with no closing quote on its line.
    #[error("unterminated string (at line {line})")]
    UnterminatedString {
        /// Source line number.
        line: u32,
    },
    /// A `\x` escape the string syntax doesn't define.
    #[error("unknown escape '\\{escape}' in string (at line {line})")]
    UnknownEscape {
        /// The escaped character.
        escape: char,
        /// Source line number.
        line: u32,
    },
    /// A numeric literal that doesn't fit the assembler's value range.
    #[error("number out of range (at line {line})")]
    NumberOutOfRange {
        /// Source line number.
        line: u32,
    },
}

/// Raised by the parser for grammar violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Tokenization failed.
    #[error(transparent)]
    Lex(#[from] LexError),
    /// The token stream doesn't match any line production.
    #[error("invalid code before {found} (at line {line})")]
    Unexpected {
        /// Rendering of the offending token.
        found: String,
        /// Source line number.
        line: u32,
    },
}

/// Raised by the instruction set for bad operands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    /// No such mnemonic.
    #[error("unknown instruction {0}")]
    UnknownInstruction(String),
    /// Wrong number of arguments for the mnemonic.
    #[error("{name} expected {expected} arguments")]
    ArgumentCount {
        /// The mnemonic.
        name: &'static str,
        /// The number of arguments it takes.
        expected: usize,
    },
    /// Not a register operand, or not a register the CPU has.
    #[error("invalid register: {0}")]
    InvalidRegister(String),
    /// A constant operand that isn't a number.
    #[error("invalid number argument: {0}")]
    InvalidNumber(String),
    /// A constant too wide for its immediate field.
    #[error("constant {value} won't fit in {bits} bits")]
    ConstantTooWide {
        /// The constant's value.
        value: i64,
        /// Width of the immediate field.
        bits: u32,
    },
    /// An identifier operand with no `.define` for it.
    #[error("undefined constant: {0}")]
    UndefinedConstant(String),
    /// Not an `offset(reg)` operand.
    #[error("invalid memory reference argument: {0}")]
    InvalidMemRef(String),
    /// A branch operand that is neither a number nor a label.
    #[error("invalid branch offset: {0}")]
    InvalidBranchTarget(String),
    /// A label the first pass never saw.
    #[error("undefined label: {0}")]
    UndefinedLabel(String),
    /// A branch label resolving into another segment.
    #[error("branch target in different segment")]
    CrossSegmentBranch,
    /// A branch label not on a word boundary.
    #[error("branch label not aligned at word boundary")]
    UnalignedBranchTarget,
    /// A branch delta too wide for the offset field.
    #[error("branch offset too large for {bits} bits")]
    BranchOffsetTooWide {
        /// Width of the offset field.
        bits: u32,
    },
    /// A CALL argument that is neither an address nor a label.
    #[error("invalid call destination: {0}")]
    InvalidCallTarget(String),
    /// An LI value argument that is neither a number nor a label.
    #[error("invalid li value: {0}")]
    InvalidLiValue(String),
}

/// Raised by the two-pass assembler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// Code or data before any `.segment` directive.
    #[error("a segment must be defined before this line (at line {line})")]
    MissingSegment {
        /// Source line number.
        line: u32,
    },
    /// The same label defined twice.
    #[error("label '{label}' duplicated (at line {line})")]
    DuplicateLabel {
        /// The label.
        label: String,
        /// Source line number.
        line: u32,
    },
    /// A mnemonic the instruction set doesn't know.
    #[error("unknown instruction '{name}' (at line {line})")]
    UnknownInstruction {
        /// The mnemonic.
        name: String,
        /// Source line number.
        line: u32,
    },
    /// A directive the assembler doesn't know.
    #[error("unknown directive {name} (at line {line})")]
    UnknownDirective {
        /// The directive, including the leading dot.
        name: String,
        /// Source line number.
        line: u32,
    },
    /// A directive with the wrong number of arguments.
    #[error("{name} -- {expected} argument(s) expected (at line {line})")]
    DirectiveArgCount {
        /// The directive.
        name: String,
        /// The number of arguments it takes.
        expected: usize,
        /// Source line number.
        line: u32,
    },
    /// A directive argument of the wrong type.
    #[error("{name} -- argument {index} of unexpected type (at line {line})")]
    DirectiveArgType {
        /// The directive.
        name: String,
        /// 1-based argument position.
        index: usize,
        /// Source line number.
        line: u32,
    },
    /// A `.byte` argument outside 0..=255.
    #[error(".byte -- argument {index} not a valid byte (at line {line})")]
    InvalidByte {
        /// 1-based argument position.
        index: usize,
        /// Source line number.
        line: u32,
    },
    /// A `.word` argument outside the unsigned 32-bit range.
    #[error(".word -- argument {index} not a valid word (at line {line})")]
    InvalidWord {
        /// 1-based argument position.
        index: usize,
        /// Source line number.
        line: u32,
    },
    /// `.alloc` with a negative or oversized size.
    #[error(".alloc -- invalid size (at line {line})")]
    InvalidAlloc {
        /// Source line number.
        line: u32,
    },
    /// `.global` naming a label that was never defined.
    #[error(".global defines an unknown label {symbol} (at line {line})")]
    UnknownGlobal {
        /// The symbol.
        symbol: String,
        /// Source line number.
        line: u32,
    },
    /// The same symbol exported twice from one unit.
    #[error(".global '{symbol}' duplicated (at line {line})")]
    DuplicateGlobal {
        /// The symbol.
        symbol: String,
        /// Source line number.
        line: u32,
    },
    /// An operand error from the instruction set.
    #[error("{source} (at line {line})")]
    Instruction {
        /// The underlying operand error.
        source: InstructionError,
        /// Source line number.
        line: u32,
    },
    /// The source didn't parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Raised while linking objects into an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkerError {
    /// Two objects export the same symbol.
    #[error("duplicated export symbol '{symbol}' at objects [{object}] and [{other}]")]
    DuplicateExport {
        /// The symbol.
        symbol: String,
        /// Identification of the object seen second.
        object: String,
        /// Identification of the object seen first.
        other: String,
    },
    /// An import with no matching export anywhere.
    #[error("failed import of symbol '{symbol}' at object [{object}]")]
    UnresolvedImport {
        /// The symbol.
        symbol: String,
        /// Identification of the importing object.
        object: String,
    },
    /// A relocation naming a segment its own object doesn't have.
    #[error("relocation entry in object [{object}] refers to unknown segment {segment}")]
    UnknownRelocSegment {
        /// Identification of the object.
        object: String,
        /// The segment named by the relocation.
        segment: String,
    },
    /// A patch address outside its segment data.
    #[error("patching of '{name}': bad offset into segment")]
    PatchOffset {
        /// Symbol or segment being patched in.
        name: String,
    },
    /// A CALL patch found some other instruction at the patch address.
    #[error("patching of '{name}': expected CALL, got 0x{found:02X}")]
    PatchExpectedCall {
        /// Symbol or segment being patched in.
        name: String,
        /// Opcode field found instead.
        found: u8,
    },
    /// An LI patch found something other than a LUI/ORI pair.
    #[error("patching of '{name}': expected LUI/ORI pair, got 0x{found_first:02X},0x{found_second:02X}")]
    PatchExpectedLi {
        /// Symbol or segment being patched in.
        name: String,
        /// Opcode field of the first word.
        found_first: u8,
        /// Opcode field of the second word.
        found_second: u8,
    },
    /// A patched destination wider than its field.
    #[error("patching of '{name}': patched destination address 0x{destination:X} too large")]
    PatchOverflow {
        /// Symbol or segment being patched in.
        name: String,
        /// The destination that didn't fit.
        destination: u64,
    },
    /// Two segments mapped over the same image byte.
    #[error("segment '{segment}' overlaps previously placed data at 0x{addr:08X}")]
    SegmentOverlap {
        /// The segment being copied when the collision was found.
        segment: String,
        /// Absolute address of the first colliding byte.
        addr: u32,
    },
    /// The layout left a byte no segment covers.
    #[error("uninitialized hole in image at 0x{addr:08X}")]
    ImageHole {
        /// Absolute address of the uncovered byte.
        addr: u32,
    },
    /// The synthetic startup object failed to assemble.
    #[error("startup code: {0}")]
    Startup(#[from] AssemblyError),
}

/// Raised when a word doesn't decode to any instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown opcode 0x{0:02X}")]
pub struct DisassembleError(pub u8);
