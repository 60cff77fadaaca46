//! Control-flow opcode handlers: jumps, calls and branches.

use luz_asm::bits::sign_extend;
use luz_asm::opcode::Opcode;

use super::{args_1reg, args_2reg_imm, args_imm26, ExecResult, LuzSim};

impl LuzSim {
    pub(crate) fn op_jr(&mut self, instr: u32) -> ExecResult {
        let rd = args_1reg(instr);
        self.set_pc(self.reg(rd));
        Ok(())
    }

    pub(crate) fn op_call(&mut self, instr: u32) -> ExecResult {
        let imm = args_imm26(instr);
        self.write_reg(31, self.pc().wrapping_add(4));
        self.set_pc(imm.wrapping_mul(4));
        Ok(())
    }

    pub(crate) fn op_b(&mut self, instr: u32) -> ExecResult {
        let offset = sign_extend(args_imm26(instr), 26);
        self.set_pc(self.pc().wrapping_add_signed(4 * offset));
        Ok(())
    }

    pub(crate) fn op_branch_cond(&mut self, op: Opcode, instr: u32) -> ExecResult {
        let (rd, rs, offset) = args_2reg_imm(instr);
        let a = self.reg(rd);
        let b = self.reg(rs);
        let (sa, sb) = (a as i32, b as i32);

        use Opcode::*;
        let taken = match op {
            BEQ => a == b,
            BNE => a != b,
            BGT => sa > sb,
            BGTU => a > b,
            BGE => sa >= sb,
            BGEU => a >= b,
            BLT => sa < sb,
            BLTU => a < b,
            BLE => sa <= sb,
            BLEU => a <= b,
            _ => unreachable!("dispatched opcode family"),
        };

        if taken {
            let delta = sign_extend(offset, 16);
            self.set_pc(self.pc().wrapping_add_signed(4 * delta));
        } else {
            self.inc_pc();
        }
        Ok(())
    }
}
