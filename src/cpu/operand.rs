//! Operand resolution.
//!
//! Turns a 6-bit operand code into an [`Accessor`]: a handle that knows
//! where the operand lives and which stack adjustment (if any) must happen
//! before the instruction runs. Addresses are bound when the operand is
//! resolved, from the machine state at the start of the step.

use crate::cpu::decode::Operand;
use crate::cpu::execute::Cpu;
use crate::cpu::registers::Register;

/// Side effect applied once per operand before the operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreEffect {
    None,
    /// POP: SP += 1
    IncrementSp,
    /// PUSH: SP -= 1
    DecrementSp,
}

/// A resolved operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Register(Register),
    Memory { addr: u16, effect: PreEffect },
    Sp,
    Pc,
    O,
    /// Immediate value; writes are discarded.
    Literal(u16),
}

impl Accessor {
    pub fn pre_effect(&self) -> PreEffect {
        match self {
            Accessor::Memory { effect, .. } => *effect,
            _ => PreEffect::None,
        }
    }

    fn memory(addr: u16) -> Self {
        Accessor::Memory { addr, effect: PreEffect::None }
    }
}

impl Cpu {
    /// Resolve operand code `code`, with `next` the address of the next
    /// unread instruction word.
    ///
    /// Returns the accessor and the updated next-word address.
    pub fn resolve(&self, code: u16, next: u16) -> (Accessor, u16) {
        let (operand, next) = Operand::decode(code, &self.mem, next);
        let sp = self.regs.sp;

        let accessor = match operand {
            Operand::Register(r) => Accessor::Register(r),
            Operand::Indirect(r) => Accessor::memory(self.regs.get(r)),
            Operand::IndirectOffset(r, offset) => {
                Accessor::memory(self.regs.get(r).wrapping_add(offset))
            }
            Operand::Pop => Accessor::Memory { addr: sp, effect: PreEffect::IncrementSp },
            Operand::Peek => Accessor::memory(sp),
            Operand::Push => Accessor::Memory {
                addr: sp.wrapping_sub(1),
                effect: PreEffect::DecrementSp,
            },
            Operand::Sp => Accessor::Sp,
            Operand::Pc => Accessor::Pc,
            Operand::O => Accessor::O,
            Operand::Memory(addr) => Accessor::memory(addr),
            Operand::NextLiteral(value) | Operand::Literal(value) => Accessor::Literal(value),
        };

        (accessor, next)
    }

    pub fn read(&self, acc: Accessor) -> u16 {
        match acc {
            Accessor::Register(r) => self.regs.get(r),
            Accessor::Memory { addr, .. } => self.mem.read(addr),
            Accessor::Sp => self.regs.sp,
            Accessor::Pc => self.regs.pc,
            Accessor::O => self.regs.o,
            Accessor::Literal(value) => value,
        }
    }

    pub fn write(&mut self, acc: Accessor, value: u16) {
        match acc {
            Accessor::Register(r) => self.regs.set(r, value),
            Accessor::Memory { addr, .. } => self.mem.write(addr, value),
            Accessor::Sp => self.regs.sp = value,
            Accessor::Pc => self.regs.pc = value,
            Accessor::O => self.regs.o = value,
            // Fail silently.
            Accessor::Literal(_) => {}
        }
    }

    pub fn apply_pre_effect(&mut self, acc: Accessor) {
        match acc.pre_effect() {
            PreEffect::None => {}
            PreEffect::IncrementSp => self.regs.sp = self.regs.sp.wrapping_add(1),
            PreEffect::DecrementSp => self.regs.sp = self.regs.sp.wrapping_sub(1),
        }
    }
}
