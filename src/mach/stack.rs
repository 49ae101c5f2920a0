use super::Val;
use crate::error;
use crate::lang::{Error, ErrorCode};

type Result<T> = std::result::Result<T, Error>;

/// ## Stack enforced and size limited vector

pub struct Stack<T> {
    overflow: ErrorCode,
    max_len: usize,
    vec: Vec<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.vec)
    }
}

impl<T> Stack<T> {
    pub fn new(max_len: usize, overflow: ErrorCode) -> Stack<T> {
        Stack {
            overflow,
            max_len,
            vec: vec![],
        }
    }
    fn underflow_error(&self) -> Error {
        error!(InternalError; "UNDERFLOW")
    }
    pub fn max_len(&self) -> usize {
        self.max_len
    }
    pub fn clear(&mut self) {
        self.vec.clear()
    }
    pub fn len(&self) -> usize {
        self.vec.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.vec.len() >= self.max_len
    }
    pub fn last(&self) -> Option<&T> {
        self.vec.last()
    }
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.vec.last_mut()
    }
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.vec.get(idx)
    }
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.vec.iter()
    }
    /// Fails without pushing when the stack is already at its limit.
    pub fn push(&mut self, val: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::new(self.overflow));
        }
        self.vec.try_reserve(1)?;
        self.vec.push(val);
        Ok(())
    }
    pub fn pop(&mut self) -> Result<T> {
        match self.vec.pop() {
            Some(v) => Ok(v),
            None => Err(self.underflow_error()),
        }
    }
}

/// Depth of the stack in 4-level mode.
pub const FOUR: usize = 4;

/// ## Evaluation stack
///
/// Index 0 is the bottom, the last element is X. In 4-level mode there
/// are always exactly four values; in N-level mode the stack grows with
/// pushes and may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RegStack {
    big: bool,
    vals: Vec<Val>,
}

impl Default for RegStack {
    fn default() -> RegStack {
        RegStack::new()
    }
}

impl RegStack {
    pub fn new() -> RegStack {
        RegStack {
            big: false,
            vals: vec![Val::Real(0.0); FOUR],
        }
    }

    /// Rebuilds a stack read back from a state file.
    pub fn from_parts(big: bool, vals: Vec<Val>) -> Result<RegStack> {
        let mut s = RegStack { big, vals };
        if !big && s.vals.len() != FOUR {
            s.fit_four()?;
        }
        Ok(s)
    }

    pub fn is_big(&self) -> bool {
        self.big
    }

    pub fn depth(&self) -> usize {
        self.vals.len()
    }

    pub fn values(&self) -> &[Val] {
        &self.vals
    }

    pub fn get(&self, depth: usize) -> Option<&Val> {
        if depth < self.vals.len() {
            self.vals.get(self.vals.len() - 1 - depth)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, depth: usize) -> Option<&mut Val> {
        let len = self.vals.len();
        if depth < len {
            self.vals.get_mut(len - 1 - depth)
        } else {
            None
        }
    }

    pub fn x(&self) -> Result<&Val> {
        self.get(0).ok_or_else(|| error!(TooFewArguments))
    }

    /// Fails unless at least `n` values are present.
    pub fn require(&self, n: usize) -> Result<()> {
        if self.vals.len() < n {
            Err(error!(TooFewArguments))
        } else {
            Ok(())
        }
    }

    pub fn ensure_capacity(&mut self, n: usize) -> Result<()> {
        if n > self.vals.len() {
            self.vals.try_reserve(n - self.vals.len())?;
        }
        Ok(())
    }

    pub fn set_x(&mut self, val: Val) -> Result<()> {
        match self.vals.last_mut() {
            Some(x) => {
                *x = val;
                Ok(())
            }
            None => self.push(val),
        }
    }

    /// Pushes `val`, losing T in 4-level mode.
    pub fn push(&mut self, val: Val) -> Result<()> {
        if !self.big {
            self.vals.remove(0);
        } else {
            self.vals.try_reserve(1)?;
        }
        self.vals.push(val);
        Ok(())
    }

    /// Removes X. In 4-level mode T is duplicated downwards.
    pub fn pop(&mut self) -> Result<Val> {
        if self.big {
            return self.vals.pop().ok_or_else(|| error!(TooFewArguments));
        }
        let t = self.vals[0].clone();
        self.vals.insert(0, t);
        self.vals.pop().ok_or_else(|| error!(InternalError; "UNDERFLOW"))
    }

    /// Replaces the top `n` values with `val`, the shape every unary and
    /// binary function leaves behind.
    pub fn replace_top(&mut self, n: usize, val: Val) -> Result<()> {
        self.require(n)?;
        for _ in 1..n {
            self.pop()?;
        }
        if n == 0 {
            self.push(val)
        } else {
            self.set_x(val)
        }
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.require(a.max(b) + 1)?;
        let len = self.vals.len();
        self.vals.swap(len - 1 - a, len - 1 - b);
        Ok(())
    }

    /// `R↓`: X goes to the bottom.
    pub fn roll_down(&mut self) {
        if let Some(x) = self.vals.pop() {
            self.vals.insert(0, x);
        }
    }

    /// `R↑`: the bottom value comes up to X.
    pub fn roll_up(&mut self) {
        if !self.vals.is_empty() {
            let b = self.vals.remove(0);
            self.vals.push(b);
        }
    }

    pub fn clear(&mut self) {
        if self.big {
            self.vals.clear();
        } else {
            self.vals = vec![Val::Real(0.0); FOUR];
        }
    }

    /// Switches mode. Going to 4-level keeps the top four values or pads
    /// with zeros underneath; going to N-level keeps everything.
    pub fn set_big(&mut self, big: bool) -> Result<()> {
        self.big = big;
        if !big {
            self.fit_four()?;
        }
        Ok(())
    }

    fn fit_four(&mut self) -> Result<()> {
        let len = self.vals.len();
        if len > FOUR {
            self.vals.drain(..len - FOUR);
        } else if len < FOUR {
            self.vals.try_reserve(FOUR - len)?;
            let pad = vec![Val::Real(0.0); FOUR - len];
            self.vals.splice(0..0, pad);
        }
        Ok(())
    }

    pub fn take(&mut self) -> Vec<Val> {
        std::mem::take(&mut self.vals)
    }

    /// Installs `vals` as the whole stack in the given mode.
    pub fn install(&mut self, big: bool, vals: Vec<Val>) -> Result<()> {
        self.big = big;
        self.vals = vals;
        if !big {
            self.fit_four()?;
        }
        Ok(())
    }
}
