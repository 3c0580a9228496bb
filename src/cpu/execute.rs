//! CPU execution engine for the DCPU-16.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{BasicOp, DecodeError, ExtendedOp, Fields};
use crate::cpu::operand::Accessor;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The instruction was performed.
    Executed,
    /// The instruction was walked over because the skip flag was set.
    Skipped,
}

/// Why [`Cpu::run_limited`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStop {
    /// The step budget was used up.
    StepLimit,
    /// An instruction jumped to itself (the usual DCPU-16 idiom for halting).
    SelfLoop { pc: u16 },
}

/// The DCPU-16 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// When set, the next instruction is walked over but not performed.
    pub skip: bool,
    /// Steps taken, skipped ones included.
    pub steps: u64,
}

/// Register-level view of the machine, without memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub regs: Registers,
    pub skip: bool,
    pub steps: u64,
}

impl Cpu {
    /// Create a new CPU with power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            skip: false,
            steps: 0,
        }
    }

    /// Reset the CPU to power-on state, clearing memory.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.skip = false;
        self.steps = 0;
    }

    /// Load a program into memory at address 0.
    pub fn load_program(&mut self, program: &[u16]) {
        self.mem.load_program(0, program);
    }

    /// Execute a single instruction.
    ///
    /// On a decode error nothing from this step is committed: PC, SP and
    /// memory are left as they were.
    pub fn step(&mut self) -> Result<StepOutcome, CpuError> {
        let pc = self.regs.pc;
        let next = pc.wrapping_add(1);

        match Fields::split(self.mem.read(pc)) {
            Fields::Basic { opcode, a, b } => {
                let (dest, next) = self.resolve(a, next);
                let (src, next) = self.resolve(b, next);
                if self.skip {
                    return Ok(self.skip_to(pc, next));
                }

                let op = BasicOp::from_code(opcode)
                    .ok_or(DecodeError::UnknownBasicOpcode { opcode, addr: pc })?;
                self.regs.pc = next;
                self.apply_pre_effect(dest);
                self.apply_pre_effect(src);
                self.execute_basic(op, dest, src);
                log::debug!("{:#06x}: {} {:?}, {:?}", pc, op.mnemonic(), dest, src);
            }
            Fields::Extended { opcode, a } => {
                let (arg, next) = self.resolve(a, next);
                if self.skip {
                    return Ok(self.skip_to(pc, next));
                }

                let op = ExtendedOp::from_code(opcode)
                    .ok_or(DecodeError::UnknownExtendedOpcode { opcode, addr: pc })?;
                self.regs.pc = next;
                self.apply_pre_effect(arg);
                self.execute_extended(op, arg);
                log::debug!("{:#06x}: {} {:?}", pc, op.mnemonic(), arg);
            }
        }

        self.steps += 1;
        Ok(StepOutcome::Executed)
    }

    /// Run for at most `max_steps` steps, stopping early on a self-loop.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<RunStop, CpuError> {
        for _ in 0..max_steps {
            let pc = self.regs.pc;
            if self.step()? == StepOutcome::Executed && self.regs.pc == pc {
                log::info!("self-loop at {:#06x} after {} steps", pc, self.steps);
                return Ok(RunStop::SelfLoop { pc });
            }
        }
        Ok(RunStop::StepLimit)
    }

    fn skip_to(&mut self, pc: u16, next: u16) -> StepOutcome {
        log::trace!("{:#06x}: skipped", pc);
        self.regs.pc = next;
        self.skip = false;
        self.steps += 1;
        StepOutcome::Skipped
    }

    /// Execute a two-operand opcode. Both operands are read before either
    /// is written; when `a` is O, the O update lands last.
    fn execute_basic(&mut self, op: BasicOp, a: Accessor, b: Accessor) {
        let x = self.read(a);
        let y = self.read(b);

        match op {
            BasicOp::Set => self.write(a, y),

            BasicOp::Add => {
                let sum = x as u32 + y as u32;
                self.write(a, sum as u16);
                self.regs.o = (sum >> 16) as u16;
            }

            BasicOp::Sub => {
                self.write(a, x.wrapping_sub(y));
                self.regs.o = if x < y { 0xffff } else { 0 };
            }

            BasicOp::Mul => {
                let product = x as u32 * y as u32;
                self.write(a, product as u16);
                self.regs.o = (product >> 16) as u16;
            }

            BasicOp::Div => {
                if y == 0 {
                    self.write(a, 0);
                    self.regs.o = 0;
                } else {
                    self.write(a, x / y);
                    self.regs.o = (((x as u32) << 16) / y as u32) as u16;
                }
            }

            BasicOp::Mod => {
                self.write(a, if y == 0 { 0 } else { x % y });
            }

            BasicOp::Shl => {
                let shifted = (x as u64).checked_shl(y as u32).unwrap_or(0);
                self.write(a, shifted as u16);
                self.regs.o = (shifted >> 16) as u16;
            }

            BasicOp::Shr => {
                let shifted = x.checked_shr(y as u32).unwrap_or(0);
                let spill = ((x as u64) << 16).checked_shr(y as u32).unwrap_or(0);
                self.write(a, shifted);
                self.regs.o = spill as u16;
            }

            BasicOp::And => self.write(a, x & y),
            BasicOp::Bor => self.write(a, x | y),
            BasicOp::Xor => self.write(a, x ^ y),

            BasicOp::Ife => self.skip = x != y,
            BasicOp::Ifn => self.skip = x == y,
            BasicOp::Ifg => self.skip = x <= y,
            BasicOp::Ifb => self.skip = (x & y) == 0,
        }
    }

    fn execute_extended(&mut self, op: ExtendedOp, a: Accessor) {
        match op {
            ExtendedOp::Jsr => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                self.mem.write(self.regs.sp, self.regs.pc);
                self.regs.pc = self.read(a);
            }
        }
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs.clone(),
            skip: self.skip,
            steps: self.steps,
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("regs", &self.regs)
            .field("skip", &self.skip)
            .field("steps", &self.steps)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode, Instruction, Operand};
    use crate::cpu::registers::Register::{self, A, B, C};
    use proptest::prelude::*;

    fn make_program(instructions: &[Instruction]) -> Vec<u16> {
        instructions.iter().flat_map(encode).collect()
    }

    fn basic(op: BasicOp, a: Operand, b: Operand) -> Instruction {
        Instruction::Basic { op, a, b }
    }

    fn reg(r: Register) -> Operand {
        Operand::Register(r)
    }

    fn lit(value: u16) -> Operand {
        Operand::literal(value)
    }

    fn cpu_with(instructions: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(instructions));
        cpu
    }

    /// Run `op A, B` with the given register values; returns (A, O).
    fn binary_op(op: BasicOp, x: u16, y: u16) -> (u16, u16) {
        let mut cpu = cpu_with(&[basic(op, reg(A), reg(B))]);
        cpu.regs.set(A, x);
        cpu.regs.set(B, y);
        cpu.step().unwrap();
        (cpu.regs.get(A), cpu.regs.o)
    }

    #[test]
    fn test_power_on() {
        let cpu = Cpu::new();
        assert_eq!(cpu.regs.sp, 0xffff);
        assert_eq!(cpu.regs.pc, 0);
        assert!(!cpu.skip);
        assert!(cpu.mem.words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_set_leaves_o() {
        let mut cpu = cpu_with(&[basic(BasicOp::Set, reg(C), lit(0x1234))]);
        cpu.regs.o = 0xaaaa;
        assert_eq!(cpu.step().unwrap(), StepOutcome::Executed);
        assert_eq!(cpu.regs.get(C), 0x1234);
        assert_eq!(cpu.regs.o, 0xaaaa);
        assert_eq!(cpu.regs.pc, 2);
    }

    #[test]
    fn test_mul() {
        assert_eq!(binary_op(BasicOp::Mul, 0x1000, 0x0010), (0x0000, 0x0001));
        assert_eq!(binary_op(BasicOp::Mul, 0xffff, 0xffff), (0x0001, 0xfffe));
        assert_eq!(binary_op(BasicOp::Mul, 3, 4), (12, 0));
    }

    #[test]
    fn test_div_and_mod() {
        assert_eq!(binary_op(BasicOp::Div, 7, 2), (3, 0x8000));
        assert_eq!(binary_op(BasicOp::Div, 0x1234, 0), (0, 0));
        assert_eq!(binary_op(BasicOp::Mod, 7, 3), (1, 0));
    }

    #[test]
    fn test_mod_by_zero_keeps_o() {
        let mut cpu = cpu_with(&[basic(BasicOp::Mod, reg(A), lit(0))]);
        cpu.regs.set(A, 99);
        cpu.regs.o = 0x5555;
        cpu.step().unwrap();
        assert_eq!(cpu.regs.get(A), 0);
        assert_eq!(cpu.regs.o, 0x5555);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(binary_op(BasicOp::Shl, 0x8001, 1), (0x0002, 0x0001));
        assert_eq!(binary_op(BasicOp::Shl, 0x1234, 16), (0, 0x1234));
        assert_eq!(binary_op(BasicOp::Shl, 0xffff, 40), (0, 0));
        assert_eq!(binary_op(BasicOp::Shl, 0xffff, 0xffff), (0, 0));
        assert_eq!(binary_op(BasicOp::Shr, 0x8001, 1), (0x4000, 0x8000));
        assert_eq!(binary_op(BasicOp::Shr, 0x1234, 16), (0, 0x1234));
        assert_eq!(binary_op(BasicOp::Shr, 0xffff, 0xffff), (0, 0));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(binary_op(BasicOp::And, 0xff0f, 0x0ff0).0, 0x0f00);
        assert_eq!(binary_op(BasicOp::Bor, 0xf000, 0x000f).0, 0xf00f);
        assert_eq!(binary_op(BasicOp::Xor, 0xffff, 0x0f0f).0, 0xf0f0);
    }

    #[test]
    fn test_o_as_destination() {
        // ADD O, 1 with O = 0xffff: the carry wins over the sum.
        let mut cpu = cpu_with(&[basic(BasicOp::Add, Operand::O, lit(1))]);
        cpu.regs.o = 0xffff;
        cpu.step().unwrap();
        assert_eq!(cpu.regs.o, 1);
    }

    #[test]
    fn test_o_as_destination_takes_overflow() {
        let cases = [
            // SUB O, 1 with O = 5: result 4, then no borrow.
            (BasicOp::Sub, 5, 1, 0),
            // MUL O, 3 with O = 0x8000: result 0x8000, then the high word.
            (BasicOp::Mul, 0x8000, 3, 1),
            // DIV O, 4 with O = 6: result 1, then the fractional word.
            (BasicOp::Div, 6, 4, 0x8000),
            // SHL O, 4 with O = 0x1234: result 0x2340, then the spill.
            (BasicOp::Shl, 0x1234, 4, 0x0001),
            // SHR O, 4 with O = 0x1234: result 0x0123, then the spill.
            (BasicOp::Shr, 0x1234, 4, 0x4000),
        ];

        for (op, o, y, expected) in cases {
            let mut cpu = cpu_with(&[basic(op, Operand::O, lit(y))]);
            cpu.regs.o = o;
            cpu.step().unwrap();
            assert_eq!(cpu.regs.o, expected, "{:?}", op);
        }
    }

    fn assert_skips(cond: Instruction, a: u16, b: u16, expect_skip: bool) {
        let mut cpu = cpu_with(&[
            cond,
            basic(BasicOp::Set, reg(C), lit(0x1111)),
            basic(BasicOp::Set, reg(C), lit(0x2222)),
        ]);
        cpu.regs.set(A, a);
        cpu.regs.set(B, b);

        cpu.step().unwrap();
        assert_eq!(cpu.skip, expect_skip);
        let outcome = cpu.step().unwrap();

        if expect_skip {
            assert_eq!(outcome, StepOutcome::Skipped);
            assert_eq!(cpu.regs.get(C), 0);
        } else {
            assert_eq!(outcome, StepOutcome::Executed);
            assert_eq!(cpu.regs.get(C), 0x1111);
        }
        assert!(!cpu.skip);
    }

    #[test]
    fn test_conditionals() {
        let ife = basic(BasicOp::Ife, reg(A), reg(B));
        let ifn = basic(BasicOp::Ifn, reg(A), reg(B));
        let ifg = basic(BasicOp::Ifg, reg(A), reg(B));
        let ifb = basic(BasicOp::Ifb, reg(A), reg(B));

        assert_skips(ife, 5, 5, false);
        assert_skips(ife, 5, 6, true);
        assert_skips(ifn, 5, 6, false);
        assert_skips(ifn, 5, 5, true);
        assert_skips(ifg, 0xffff, 1, false);
        assert_skips(ifg, 1, 1, true);
        assert_skips(ifb, 0x0110, 0x0100, false);
        assert_skips(ifb, 0x0110, 0x0001, true);
    }

    #[test]
    fn test_skip_walks_extra_words_without_effects() {
        let mut cpu = cpu_with(&[
            basic(BasicOp::Ife, lit(1), lit(2)),
            basic(BasicOp::Set, Operand::Push, Operand::NextLiteral(0x4444)),
            basic(BasicOp::Set, reg(A), Operand::Pop),
        ]);

        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), StepOutcome::Skipped);
        // Past the skipped instruction and its literal word.
        assert_eq!(cpu.regs.pc, 3);
        // PUSH pre-effect did not fire and nothing was written.
        assert_eq!(cpu.regs.sp, 0xffff);
        assert_eq!(cpu.mem.read(0xfffe), 0);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 4);
    }

    #[test]
    fn test_skipped_unknown_opcode_is_walked() {
        let mut cpu = Cpu::new();
        // IFE 0, 1 ; then an unknown extended opcode with a next-word operand.
        let mut program = make_program(&[basic(BasicOp::Ife, lit(0), lit(1))]);
        program.extend([0x7c20, 0xdead]);
        cpu.load_program(&program);

        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), StepOutcome::Skipped);
        assert_eq!(cpu.regs.pc, 3);
    }

    #[test]
    fn test_push_then_pop() {
        let mut cpu = cpu_with(&[
            basic(BasicOp::Set, Operand::Push, lit(0x0abc)),
            basic(BasicOp::Set, reg(B), Operand::Pop),
        ]);
        let sp = cpu.regs.sp;

        cpu.step().unwrap();
        assert_eq!(cpu.regs.sp, sp.wrapping_sub(1));
        assert_eq!(cpu.mem.read(sp.wrapping_sub(1)), 0x0abc);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.sp, sp);
        assert_eq!(cpu.regs.get(B), 0x0abc);
    }

    #[test]
    fn test_peek_and_sp_operands() {
        let mut cpu = cpu_with(&[
            basic(BasicOp::Set, Operand::Sp, lit(0x100)),
            basic(BasicOp::Set, Operand::Peek, lit(7)),
            basic(BasicOp::Add, reg(A), Operand::Peek),
        ]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.sp, 0x100);
        assert_eq!(cpu.mem.read(0x100), 7);
        assert_eq!(cpu.regs.get(A), 7);
    }

    #[test]
    fn test_jsr() {
        let mut cpu = Cpu::new();
        let jsr = Instruction::Extended { op: ExtendedOp::Jsr, a: Operand::NextLiteral(0x1000) };
        cpu.mem.load_program(0x10, &encode(&jsr));
        cpu.regs.pc = 0x10;
        let sp = cpu.regs.sp;

        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0x1000);
        assert_eq!(cpu.regs.sp, sp.wrapping_add(1));
        assert_eq!(cpu.mem.read(cpu.regs.sp), 0x12);
    }

    #[test]
    fn test_set_pc_reads_advanced_pc() {
        let mut cpu = cpu_with(&[basic(BasicOp::Set, reg(A), Operand::Pc)]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.get(A), 1);
    }

    #[test]
    fn test_literal_destination_is_noop() {
        let mut cpu = cpu_with(&[basic(BasicOp::Set, lit(3), lit(0x1234))]);
        let before = cpu.clone();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.gp, before.regs.gp);
        assert_eq!(cpu.mem, before.mem);
        assert_eq!(cpu.regs.pc, 2);
    }

    #[test]
    fn test_unknown_opcode_commits_nothing() {
        let mut cpu = Cpu::new();
        // Extended opcode 0x02 with a POP operand.
        cpu.load_program(&[0x6020]);
        let before = cpu.clone();

        let err = cpu.step().unwrap_err();
        assert_eq!(
            err,
            CpuError::Decode(DecodeError::UnknownExtendedOpcode { opcode: 0x02, addr: 0 })
        );
        assert_eq!(cpu.regs, before.regs);
        assert_eq!(cpu.steps, 0);
    }

    #[test]
    fn test_run_limited_stops_on_self_loop() {
        // :loop SUB PC, 1
        let mut cpu = cpu_with(&[
            basic(BasicOp::Set, reg(A), lit(1)),
            basic(BasicOp::Sub, Operand::Pc, lit(1)),
        ]);
        assert_eq!(cpu.run_limited(100).unwrap(), RunStop::SelfLoop { pc: 1 });
        assert_eq!(cpu.steps, 2);

        let mut cpu = cpu_with(&[
            basic(BasicOp::Add, reg(A), lit(1)),
            basic(BasicOp::Set, Operand::Pc, lit(0)),
        ]);
        assert_eq!(cpu.run_limited(3).unwrap(), RunStop::StepLimit);
        assert_eq!(cpu.regs.get(A), 2);
    }

    #[test]
    fn test_reset() {
        let mut cpu = cpu_with(&[basic(BasicOp::Set, reg(A), lit(1))]);
        cpu.step().unwrap();
        cpu.skip = true;
        cpu.reset();
        assert_eq!(cpu.regs, Registers::new());
        assert!(!cpu.skip);
        assert_eq!(cpu.steps, 0);
        assert_eq!(cpu.mem.read(0), 0);
    }

    proptest! {
        #[test]
        fn prop_add(x: u16, y: u16) {
            let (result, o) = binary_op(BasicOp::Add, x, y);
            let sum = x as u32 + y as u32;
            prop_assert_eq!(result, (sum % 0x10000) as u16);
            prop_assert_eq!(o, if sum >= 0x10000 { 1 } else { 0 });
        }

        #[test]
        fn prop_sub(x: u16, y: u16) {
            let (result, o) = binary_op(BasicOp::Sub, x, y);
            prop_assert_eq!(result, x.wrapping_sub(y));
            prop_assert_eq!(o, if x < y { 0xffff } else { 0 });
        }

        #[test]
        fn prop_div_by_zero(x: u16, o_before: u16) {
            let mut cpu = cpu_with(&[basic(BasicOp::Div, reg(A), reg(B))]);
            cpu.regs.set(A, x);
            cpu.regs.o = o_before;
            cpu.step().unwrap();
            prop_assert_eq!(cpu.regs.get(A), 0);
            prop_assert_eq!(cpu.regs.o, 0);
        }

        #[test]
        fn prop_set_copies(code in 0x00u16..0x40, value in any::<u16>()) {
            let mut cpu = Cpu::new();
            // SET A, <code>; the b field may pull a next word.
            cpu.load_program(&[0x0001 | (code << 10), value]);
            cpu.regs.set(B, value);
            cpu.regs.o = 0x0f0f;
            let (src, next) = cpu.resolve(code, 1);
            let mut expected = cpu.clone();
            expected.regs.pc = next;
            expected.apply_pre_effect(src);
            let expected = expected.read(src);

            cpu.step().unwrap();
            prop_assert_eq!(cpu.regs.get(A), expected);
            prop_assert_eq!(cpu.regs.o, 0x0f0f);
        }
    }
}
