use super::{Address, Stack};
use crate::lang::ErrorCode;

/// Deepest subroutine nesting.
pub const MAX_RTNS: usize = 1024;

const SOLVE: i32 = -2;
const INTEG: i32 = -3;

const MATEDIT: u8 = 1;
const FUNC: u8 = 2;
const STACK_LIFT_DISABLE: u8 = 4;
const STOP: u8 = 8;

/// Who a return lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Program(usize),
    /// The solver called the function being solved.
    Solve,
    /// The integrator called the integrand.
    Integ,
}

impl Owner {
    pub fn to_i32(self) -> i32 {
        match self {
            Owner::Program(p) => p as i32,
            Owner::Solve => SOLVE,
            Owner::Integ => INTEG,
        }
    }

    pub fn from_i32(n: i32) -> Option<Owner> {
        match n {
            SOLVE => Some(Owner::Solve),
            INTEG => Some(Owner::Integ),
            n if n >= 0 => Some(Owner::Program(n as usize)),
            _ => None,
        }
    }
}

/// One return address. `pc` is where the caller resumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub owner: Owner,
    pub pc: Option<Address>,
    /// A suspended matrix editor is parked in this frame's locals.
    pub matedit: bool,
    /// The callee ran `FUNC` or `L4STK`/`LNSTK` and saved the caller's
    /// stack in a private local.
    pub func: bool,
    pub stack_lift_disable: bool,
    /// Pushed by an XEQ typed while a program was suspended; returning
    /// through it stops instead of resuming the caller.
    pub stop: bool,
}

impl Frame {
    pub fn new(owner: Owner, pc: Option<Address>, stack_lift_disable: bool) -> Frame {
        Frame {
            owner,
            pc,
            matedit: false,
            func: false,
            stack_lift_disable,
            stop: false,
        }
    }

    pub fn flag_bits(&self) -> u8 {
        let mut bits = 0;
        if self.matedit {
            bits |= MATEDIT;
        }
        if self.func {
            bits |= FUNC;
        }
        if self.stack_lift_disable {
            bits |= STACK_LIFT_DISABLE;
        }
        if self.stop {
            bits |= STOP;
        }
        bits
    }

    pub fn set_flag_bits(&mut self, bits: u8) {
        self.matedit = bits & MATEDIT != 0;
        self.func = bits & FUNC != 0;
        self.stack_lift_disable = bits & STACK_LIFT_DISABLE != 0;
        self.stop = bits & STOP != 0;
    }
}

pub fn rtn_stack() -> Stack<Frame> {
    Stack::new(MAX_RTNS, ErrorCode::RtnStackFull)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_encoding() {
        for owner in &[Owner::Program(0), Owner::Program(7), Owner::Solve, Owner::Integ] {
            assert_eq!(Owner::from_i32(owner.to_i32()), Some(*owner));
        }
        assert_eq!(Owner::from_i32(-1), None);
    }

    #[test]
    fn test_flag_bits() {
        let mut f = Frame::new(Owner::Program(0), Some(4), true);
        f.func = true;
        let bits = f.flag_bits();
        let mut g = Frame::new(Owner::Program(0), Some(4), false);
        g.set_flag_bits(bits);
        assert_eq!(f, g);
    }
}
