//! [`LuzSim`] implementation: register file, instruction dispatch
//! and the exception mechanism.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::str::FromStr;

use tracing::trace;

use luz_asm::bits::extract;
use luz_asm::opcode::Opcode;
use luz_asm::reg::Reg;

use crate::consts::{
    ADDR_DEBUG_QUEUE, CORE_REGISTERS_END, CORE_REGISTERS_START, USER_MEMORY_START,
};
use crate::error::{ExceptionCause, MemoryError};
use crate::memory::MemoryUnit;
use crate::peripheral::{CoreRegisters, DebugQueue};

mod alu;
mod flow;
mod mem;

/// A fault raised while executing one instruction. `step` converts
/// faults into CPU exceptions rather than surfacing them.
#[derive(Debug)]
pub(crate) enum Fault {
    Memory(MemoryError),
    DivideByZero,
    InvalidOpcode,
}

impl From<MemoryError> for Fault {
    fn from(err: MemoryError) -> Self {
        Fault::Memory(err)
    }
}

pub(crate) type ExecResult = Result<(), Fault>;

/// The Luz instruction-set simulator.
///
/// Owns the CPU state and the memory unit; the core registers and
/// the debug queue are shared with the memory unit's peripheral map
/// (single-threaded, so plain `Rc<RefCell<_>>` handles).
pub struct LuzSim {
    gpr: [u32; 32],
    pc: u32,
    halted: bool,
    in_exception: bool,
    memory: MemoryUnit,
    cregs: Rc<RefCell<CoreRegisters>>,
    debug_queue: Rc<RefCell<DebugQueue>>,
}

impl LuzSim {
    /// Creates a simulator over a binary image loaded at the user
    /// memory base. The PC starts there.
    pub fn new(image: Vec<u8>) -> Self {
        let cregs = Rc::new(RefCell::new(CoreRegisters::new()));
        let debug_queue = Rc::new(RefCell::new(DebugQueue::new()));

        let mut memory = MemoryUnit::new(image);
        memory.register_peripheral(CORE_REGISTERS_START, CORE_REGISTERS_END, cregs.clone());
        memory.register_peripheral(ADDR_DEBUG_QUEUE, ADDR_DEBUG_QUEUE, debug_queue.clone());

        Self {
            gpr: [0; 32],
            pc: USER_MEMORY_START,
            halted: false,
            in_exception: false,
            memory,
            cregs,
            debug_queue,
        }
    }

    /// Executes a single instruction. Runtime memory and divide
    /// faults become CPU exceptions here.
    pub fn step(&mut self) {
        match self.exec_one() {
            Ok(()) => {}
            Err(Fault::Memory(err)) => {
                trace!(%err, "memory fault");
                self.exception_enter(ExceptionCause::MemoryAccess);
            }
            Err(Fault::DivideByZero) => self.exception_enter(ExceptionCause::DivideByZero),
            Err(Fault::InvalidOpcode) => self.exception_enter(ExceptionCause::InvalidOpcode),
        }
    }

    /// Steps until the CPU halts.
    pub fn run(&mut self) {
        while !self.halted {
            self.step();
        }
    }

    /// Re-zeroes the register file and core registers, empties the
    /// debug queue and resets the PC. Memory contents are kept.
    pub fn restart(&mut self) {
        self.gpr = [0; 32];
        self.cregs.borrow_mut().reset();
        self.debug_queue.borrow_mut().reset();
        self.pc = USER_MEMORY_START;
        self.halted = false;
        self.in_exception = false;
    }

    /// The value of register `regnum`.
    pub fn reg_value(&self, regnum: usize) -> u32 {
        self.gpr[regnum]
    }

    /// The value of a register named by its assembly spelling
    /// (`"$sp"`, `"$r7"`, ...).
    pub fn reg_named(&self, name: &str) -> Option<u32> {
        Reg::from_str(name).ok().map(|reg| self.gpr[reg.index()])
    }

    /// The program counter.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Has the CPU executed HALT (or double-faulted)?
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Is the CPU inside an exception handler?
    pub fn in_exception(&self) -> bool {
        self.in_exception
    }

    /// The memory unit, for host-side inspection.
    pub fn memory(&self) -> &MemoryUnit {
        &self.memory
    }

    /// The core registers, for host-side inspection.
    pub fn core_registers(&self) -> Ref<'_, CoreRegisters> {
        self.cregs.borrow()
    }

    /// The debug queue, for host-side inspection.
    pub fn debug_queue(&self) -> Ref<'_, DebugQueue> {
        self.debug_queue.borrow()
    }

    fn exec_one(&mut self) -> ExecResult {
        let instr = self.memory.read_instruction(self.pc)?;
        let op = match Opcode::of(instr) {
            Ok(op) => op,
            Err(_) => return Err(Fault::InvalidOpcode),
        };
        trace!(pc = self.pc, %op, "dispatch");

        use Opcode::*;
        match op {
            ADD | SUB => self.op_add_sub(op, instr),
            ADDI | SUBI => self.op_addi_subi(op, instr),
            MULU | MUL => self.op_mul(op, instr),
            DIVU | DIV => self.op_div(op, instr),
            LUI => self.op_lui(instr),
            SLL | SRL | AND | OR | NOR | XOR => self.op_logical_regs(op, instr),
            ORI | ANDI | SLLI | SRLI => self.op_logical_imm(op, instr),
            JR => self.op_jr(instr),
            CALL => self.op_call(instr),
            B => self.op_b(instr),
            BEQ | BNE | BGE | BGT | BLE | BLT | BGEU | BGTU | BLEU | BLTU => {
                self.op_branch_cond(op, instr)
            }
            LB | LBU => self.op_load_byte(op, instr),
            LH | LHU => self.op_load_halfword(op, instr),
            LW => self.op_load_word(instr),
            SB | SH | SW => self.op_store(op, instr),
            ERET => {
                self.exception_exit();
                Ok(())
            }
            HALT => {
                self.halt_cpu();
                Ok(())
            }
        }
    }

    /// Register writes ignore register 0; it stays hard-wired zero.
    /// Out-of-range targets (`rd+1` spill past 31) are dropped too.
    pub(crate) fn write_reg(&mut self, regnum: usize, value: u32) {
        if (1..=31).contains(&regnum) {
            self.gpr[regnum] = value;
        }
    }

    pub(crate) fn reg(&self, regnum: usize) -> u32 {
        self.gpr[regnum]
    }

    pub(crate) fn inc_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    pub(crate) fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub(crate) fn memory_mut(&mut self) -> &mut MemoryUnit {
        &mut self.memory
    }

    pub(crate) fn halt_cpu(&mut self) {
        self.halted = true;
    }

    /// Enters a CPU exception.
    ///
    /// A fault while already in an exception halts the CPU and
    /// leaves the saved state of the first exception untouched.
    pub(crate) fn exception_enter(&mut self, cause: ExceptionCause) {
        if self.in_exception {
            self.halt_cpu();
            return;
        }
        self.in_exception = true;

        let mut cregs = self.cregs.borrow_mut();
        // Faulting instructions resume at the next instruction;
        // interrupts arrive before the instruction at `pc` executes,
        // so they come back to it.
        cregs.exception_return_addr = if cause == ExceptionCause::Interrupt {
            self.pc
        } else {
            self.pc.wrapping_add(4)
        };
        cregs.exception_cause = cause.code();
        self.pc = cregs.exception_vector;
    }

    pub(crate) fn exception_exit(&mut self) {
        self.pc = self.cregs.borrow().exception_return_addr;
        self.in_exception = false;
    }
}

impl std::fmt::Debug for LuzSim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuzSim")
            .field("pc", &self.pc)
            .field("halted", &self.halted)
            .field("in_exception", &self.in_exception)
            .field("gpr", &self.gpr)
            .finish_non_exhaustive()
    }
}

//
// Instruction argument accessors, shared by the opcode handlers.
//

pub(crate) fn args_3reg(instr: u32) -> (usize, usize, usize) {
    (
        extract(instr, 25, 21) as usize,
        extract(instr, 20, 16) as usize,
        extract(instr, 15, 11) as usize,
    )
}

pub(crate) fn args_2reg_imm(instr: u32) -> (usize, usize, u32) {
    (
        extract(instr, 25, 21) as usize,
        extract(instr, 20, 16) as usize,
        extract(instr, 15, 0),
    )
}

pub(crate) fn args_1reg_imm16(instr: u32) -> (usize, u32) {
    (extract(instr, 25, 21) as usize, extract(instr, 15, 0))
}

pub(crate) fn args_1reg(instr: u32) -> usize {
    extract(instr, 25, 21) as usize
}

pub(crate) fn args_imm26(instr: u32) -> u32 {
    extract(instr, 25, 0)
}
