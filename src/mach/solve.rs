use super::flags::STACK_LIFT_DISABLE;
use super::format::format_val;
use super::{Address, Owner, Runtime, Val};
use crate::error;
use crate::lang::Error;
use log::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

pub const ROOT: u8 = 0;
pub const SIGN_REVERSAL: u8 = 1;
pub const EXTREMUM: u8 = 2;
pub const BAD_GUESSES: u8 = 3;
pub const CONSTANT: u8 = 4;

const MESSAGES: [&str; 5] = ["", "Sign Reversal", "Extremum", "Bad Guess(es)", "Constant?"];

pub const ROMB_K: usize = 5;
pub const ROMB_MAX: usize = 20;

/// What the algorithm wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Evaluate the function at x1, x2 or x3 and come back in `state`.
    Call { which: i8, state: u8 },
    Finish(u8),
    /// Resumed without a call in progress.
    Idle,
}

/// ## Solver
///
/// Secant steps while f(x1) and f(x2) agree in sign, Ridders' method
/// once the root is bracketed, bisection when neither makes progress.
/// Each function evaluation is a subroutine call, so the whole thing is
/// a state machine resumed from `rtn`. `state` 0 is idle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveState {
    pub prgm_name: Vec<u8>,
    pub active_prgm_name: Vec<u8>,
    pub var_name: Vec<u8>,
    pub keep_running: bool,
    pub prev_prgm: usize,
    pub prev_pc: Option<Address>,
    pub state: u8,
    pub which: i8,
    pub toggle: bool,
    pub retry_counter: i32,
    pub retry_value: f64,
    pub x1: f64,
    pub x2: f64,
    pub x3: f64,
    pub fx1: f64,
    pub fx2: f64,
    pub prev_x: f64,
    pub curr_x: f64,
    pub curr_f: f64,
    pub xm: f64,
    pub fxm: f64,
}

impl SolveState {
    fn advance(&mut self, failure: bool, f: f64) -> Step {
        match self.state {
            1 => {
                if failure {
                    if self.retry_counter > 0 {
                        self.retry_counter = -self.retry_counter;
                    }
                    Step::Call { which: 2, state: 2 }
                } else {
                    self.fx1 = f;
                    Step::Call { which: 2, state: 3 }
                }
            }
            2 => {
                if failure {
                    return Step::Finish(BAD_GUESSES);
                }
                self.fx2 = f;
                self.x1 = (self.x1 + self.x2) / 2.0;
                if self.x1 == self.x2 {
                    return Step::Finish(BAD_GUESSES);
                }
                Step::Call { which: 1, state: 3 }
            }
            3 => {
                if failure {
                    let mid = (self.x1 + self.x2) / 2.0;
                    if self.which == 1 {
                        self.x1 = mid;
                    } else {
                        self.x2 = mid;
                    }
                    if self.x1 == self.x2 {
                        return Step::Finish(BAD_GUESSES);
                    }
                    return Step::Call {
                        which: self.which,
                        state: 3,
                    };
                }
                if self.which == 1 {
                    self.fx1 = f;
                } else {
                    self.fx2 = f;
                }
                if self.fx1 == self.fx2 {
                    return self.widen();
                }
                self.secant()
            }
            4 | 5 => {
                if failure {
                    return self.approach_after_failure();
                }
                let bisected = self.state == 5;
                if self.fx1 > 0.0 && self.fx2 > 0.0 {
                    if self.fx1 > self.fx2 {
                        if f >= self.fx1 && !bisected {
                            return self.bisection();
                        }
                        self.x1 = self.x3;
                        self.fx1 = f;
                    } else {
                        if f >= self.fx2 && !bisected {
                            return self.bisection();
                        }
                        self.x2 = self.x3;
                        self.fx2 = f;
                    }
                } else if self.fx1 < 0.0 && self.fx2 < 0.0 {
                    if self.fx1 < self.fx2 {
                        if f <= self.fx1 && !bisected {
                            return self.bisection();
                        }
                        self.x1 = self.x3;
                        self.fx1 = f;
                    } else {
                        if f <= self.fx2 && !bisected {
                            return self.bisection();
                        }
                        self.x2 = self.x3;
                        self.fx2 = f;
                    }
                } else if (self.fx1 > 0.0 && f > 0.0) || (self.fx1 < 0.0 && f < 0.0) {
                    self.x1 = self.x3;
                    self.fx1 = f;
                } else {
                    self.x2 = self.x3;
                    self.fx2 = f;
                }
                if self.x2 < self.x1 {
                    std::mem::swap(&mut self.x1, &mut self.x2);
                    std::mem::swap(&mut self.fx1, &mut self.fx2);
                }
                self.secant()
            }
            6 => {
                if failure {
                    return self.bisection();
                }
                let mut s = (f * f - self.fx1 * self.fx2).sqrt();
                if s == 0.0 {
                    self.which = -1;
                    return Step::Finish(ROOT);
                }
                self.xm = self.x3;
                self.fxm = f;
                if self.fx1 < self.fx2 {
                    s = -s;
                }
                let xnew = self.xm + (self.xm - self.x1) * (self.fxm / s);
                if xnew == self.x1 || xnew == self.x2 {
                    self.which = -1;
                    return Step::Finish(ROOT);
                }
                self.x3 = xnew;
                Step::Call { which: 3, state: 7 }
            }
            7 => {
                if failure {
                    return self.bisection();
                }
                if (f > 0.0 && self.fxm < 0.0) || (f < 0.0 && self.fxm > 0.0) {
                    if self.xm < self.x3 {
                        self.x1 = self.xm;
                        self.fx1 = self.fxm;
                        self.x2 = self.x3;
                        self.fx2 = f;
                    } else {
                        self.x1 = self.x3;
                        self.fx1 = f;
                        self.x2 = self.xm;
                        self.fx2 = self.fxm;
                    }
                } else if (f > 0.0 && self.fx1 < 0.0) || (f < 0.0 && self.fx1 > 0.0) {
                    self.x2 = self.x3;
                    self.fx2 = f;
                } else {
                    self.x1 = self.x3;
                    self.fx1 = f;
                }
                self.ridders()
            }
            _ => Step::Idle,
        }
    }

    /// f(x1) = f(x2): step outward, alternating sides, until the values
    /// differ.
    fn widen(&mut self) -> Step {
        let (x, which) = if self.toggle {
            (self.x2 + 100.0 * (self.x2 - self.x1), 2)
        } else {
            (self.x1 - 100.0 * (self.x2 - self.x1), 1)
        };
        if x.is_infinite() {
            if self.retry_counter != 0 {
                return self.retry();
            }
            return Step::Finish(CONSTANT);
        }
        if which == 2 {
            self.x2 = x;
        } else {
            self.x1 = x;
        }
        self.toggle = !self.toggle;
        Step::Call { which, state: 3 }
    }

    fn approach_after_failure(&mut self) -> Step {
        if self.x3 > self.x2 {
            self.x3 = (self.x2 + self.x3) / 2.0;
            if self.x3 == self.x2 {
                return Step::Finish(EXTREMUM);
            }
        } else if self.x3 < self.x1 {
            self.x3 = (self.x1 + self.x3) / 2.0;
            if self.x3 == self.x1 {
                return Step::Finish(EXTREMUM);
            }
        } else {
            if self.toggle {
                let old = self.x3;
                if self.x3 <= (self.x1 + self.x2) / 2.0 {
                    self.x3 = (self.x1 + self.x3) / 2.0;
                } else {
                    self.x3 = (self.x2 + self.x3) / 2.0;
                }
                if self.x3 == old {
                    return Step::Finish(SIGN_REVERSAL);
                }
            } else {
                self.x3 = self.x1 + self.x2 - self.x3;
            }
            self.toggle = !self.toggle;
            if self.x3 == self.x1 || self.x3 == self.x2 {
                return Step::Finish(SIGN_REVERSAL);
            }
        }
        Step::Call { which: 3, state: 4 }
    }

    fn secant(&mut self) -> Step {
        if self.fx1 == self.fx2 {
            return Step::Finish(EXTREMUM);
        }
        if (self.fx1 > 0.0 && self.fx2 < 0.0) || (self.fx1 < 0.0 && self.fx2 > 0.0) {
            return self.ridders();
        }
        let slope = (self.fx2 - self.fx1) / (self.x2 - self.x1);
        if slope.is_infinite() {
            self.x3 = (self.x1 + self.x2) / 2.0;
            if self.x3 == self.x1 || self.x3 == self.x2 {
                return Step::Finish(ROOT);
            }
            return Step::Call { which: 3, state: 4 };
        }
        self.x3 = if slope == 0.0 {
            self.x1 - self.fx1 * (self.x2 - self.x1) / (self.fx2 - self.fx1)
        } else {
            self.x1 - self.fx1 / slope
        };
        if self.x3.is_infinite() {
            if self.retry_counter != 0 {
                return self.retry();
            }
            return Step::Finish(EXTREMUM);
        }
        if self.x3 == self.x1 {
            if slope.abs() > 1e50 {
                self.x3 = self.x1 - (self.x2 - self.x1) / 100.0;
                return Step::Call { which: 3, state: 4 };
            }
            self.which = 1;
            self.curr_f = self.fx1;
            self.prev_x = self.x2;
            return Step::Finish(ROOT);
        }
        if self.x3 == self.x2 {
            if slope.abs() > 1e50 {
                self.x3 = self.x2 + (self.x2 - self.x1) / 100.0;
                return Step::Call { which: 3, state: 4 };
            }
            self.which = 2;
            self.curr_f = self.fx2;
            self.prev_x = self.x1;
            return Step::Finish(ROOT);
        }
        let width = self.x2 - self.x1;
        if self.x3 < self.x1 {
            self.x3 = self.x3.max(self.x1 - 100.0 * width);
        } else if self.x3 > self.x2 {
            self.x3 = self.x3.min(self.x2 + 100.0 * width);
        } else {
            let eps = width / 10.0;
            if self.x3 < self.x1 + eps {
                self.x3 = self.x1 + eps;
            } else if self.x3 > self.x2 - eps {
                self.x3 = self.x2 - eps;
            }
        }
        Step::Call { which: 3, state: 4 }
    }

    /// Ran off to infinity suspiciously fast. Two guesses retry from the
    /// smaller one alone; one guess retries from 0 and 1.
    fn retry(&mut self) -> Step {
        if self.retry_counter > 0 {
            self.x1 = self.retry_value;
            self.x2 = self.x1 * 1.000001;
            if self.x2.is_infinite() {
                self.x2 = self.x1 * 0.999999;
            }
            if self.x1 > self.x2 {
                std::mem::swap(&mut self.x1, &mut self.x2);
            }
            self.retry_counter = -10;
        } else {
            self.x1 = 0.0;
            self.x2 = 1.0;
            self.retry_counter = 0;
        }
        Step::Call { which: 1, state: 1 }
    }

    fn bisection(&mut self) -> Step {
        self.x3 = (self.x1 + self.x2) / 2.0;
        Step::Call { which: 3, state: 5 }
    }

    fn ridders(&mut self) -> Step {
        self.x3 = (self.x1 + self.x2) / 2.0;
        if self.x3 <= self.x1 || self.x3 >= self.x2 {
            self.which = -1;
            return Step::Finish(ROOT);
        }
        Step::Call { which: 3, state: 6 }
    }

    /// After an abandoned Ridders step x3 is not necessarily the best
    /// point; pick whichever has the smallest |f|.
    fn best(&mut self) -> f64 {
        if self.which == -1 {
            let (t1, t2, t3) = (self.fx1.abs(), self.fx2.abs(), self.curr_f.abs());
            let (which, t) = if t1 < t2 { (1, t1) } else { (2, t2) };
            self.which = if t3 < t { 3 } else { which };
        }
        match self.which {
            1 => self.x1,
            2 => self.x2,
            _ => self.x3,
        }
    }
}

/// ## Integrator
///
/// Romberg over the substitution x = (3u - u³)/2, which never samples
/// the end points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegState {
    pub prgm_name: Vec<u8>,
    pub active_prgm_name: Vec<u8>,
    pub var_name: Vec<u8>,
    pub keep_running: bool,
    pub prev_prgm: usize,
    pub prev_pc: Option<Address>,
    pub state: u8,
    pub llim: f64,
    pub ulim: f64,
    pub acc: f64,
    pub a: f64,
    pub b: f64,
    pub eps: f64,
    pub n: usize,
    pub i: usize,
    pub k: usize,
    pub h: f64,
    pub sum: f64,
    pub c: [f64; ROMB_K],
    pub s: [f64; ROMB_K + 1],
    pub nsteps: usize,
    pub p: f64,
    pub t: f64,
    pub u: f64,
    pub prev_int: f64,
    pub prev_res: f64,
}

impl IntegState {
    fn begin_pass(&mut self) -> Step {
        self.p = self.h / 2.0 - 1.0;
        self.sum = 0.0;
        self.i = 0;
        self.sample()
    }

    fn sample(&mut self) -> Step {
        self.t = 1.0 - self.p * self.p;
        let u = self.p + self.t * self.p / 2.0;
        self.u = (u * self.b + self.b) / 2.0 + self.a;
        Step::Call { which: 0, state: 2 }
    }

    /// `fx` is the integrand at `u`, or `None` when it failed.
    fn advance(&mut self, fx: Option<f64>) -> Step {
        match self.state {
            1 => {
                self.state = 2;
                self.begin_pass()
            }
            2 => {
                if let Some(fx) = fx {
                    self.sum += self.t * fx;
                }
                self.p += self.h;
                self.i += 1;
                if self.i < self.nsteps {
                    return self.sample();
                }
                self.prev_int = (self.prev_int + self.sum * self.h) / 2.0;
                self.s[self.k] = self.prev_int;
                self.k += 1;
                if self.n >= ROMB_K - 1 {
                    let mut ns = ROMB_K - 1;
                    let mut dm = 1.0;
                    self.c.copy_from_slice(&self.s[..ROMB_K]);
                    self.sum = self.s[ns];
                    for m in 1..ROMB_K {
                        dm /= 4.0;
                        for i in 0..ROMB_K - m {
                            self.c[i] = (self.c[i + 1] - self.c[i] * dm * 4.0) / (1.0 - dm);
                        }
                        ns -= 1;
                        self.sum += self.c[ns] * dm;
                    }
                    let res = self.sum * self.b * 0.75;
                    self.eps = (self.prev_res - res).abs();
                    self.prev_res = res;
                    if self.eps <= self.acc * res.abs() {
                        return Step::Finish(0);
                    }
                    self.s.copy_within(1..ROMB_K, 0);
                    self.k = ROMB_K - 1;
                }
                self.nsteps <<= 1;
                self.h /= 2.0;
                self.n += 1;
                if self.n >= ROMB_MAX {
                    return Step::Finish(0);
                }
                self.begin_pass()
            }
            _ => Step::Idle,
        }
    }

    pub fn result(&self) -> f64 {
        self.sum * self.b * 0.75
    }
}

impl Runtime {
    /// Whether a solver or integrator started here hands control back
    /// to the program when it finishes.
    fn keeps_running(&self) -> bool {
        self.running && !self.rtns.last().map_or(false, |f| f.stop)
    }

    fn real_var(&self, name: &[u8]) -> Result<Option<f64>> {
        match self.vars.recall(name, self.level()) {
            None => Ok(None),
            Some(v) => v.as_real().map(Some),
        }
    }

    /// `SOLVE "VAR"`: the variable and X are the two starting guesses.
    pub(super) fn start_solve(&mut self, name: &[u8]) -> Result<()> {
        if self.solve_active() {
            return Err(error!(SolveSolve));
        }
        let x1 = self.real_var(name)?.unwrap_or(0.0);
        let x2 = self.stack.x()?.as_real()?;
        if !self.running {
            self.clear_all_rtns();
        }
        self.alpha = name.to_vec();
        let keep_running = self.keeps_running();
        let s = &mut self.solve;
        s.var_name = name.to_vec();
        s.active_prgm_name = s.prgm_name.clone();
        s.prev_prgm = self.prgm;
        s.prev_pc = self.pc;
        let (mut x1, mut x2) = (x1, x2);
        if x1 == x2 {
            if x1 == 0.0 {
                x2 = 1.0;
                s.retry_counter = 0;
            } else {
                x2 = x1 * 1.000001;
                if x2.is_infinite() {
                    x2 = x1 * 0.999999;
                }
                s.retry_counter = -10;
            }
        } else {
            s.retry_counter = 10;
            s.retry_value = if x1.abs() < x2.abs() { x1 } else { x2 };
        }
        if x1 > x2 {
            std::mem::swap(&mut x1, &mut x2);
        }
        s.x1 = x1;
        s.x2 = x2;
        s.toggle = true;
        s.keep_running = keep_running;
        debug!(
            "solve {} from {} {}",
            String::from_utf8_lossy(name),
            x1,
            x2
        );
        self.call_solve_fn(1, 1)
    }

    fn call_solve_fn(&mut self, which: i8, state: u8) -> Result<()> {
        if self.solve.active_prgm_name.is_empty() {
            return Err(error!(Nonexistent));
        }
        let s = &mut self.solve;
        let x = match which {
            1 => s.x1,
            2 => s.x2,
            _ => s.x3,
        };
        s.prev_x = s.curr_x;
        s.curr_x = x;
        s.which = which;
        s.state = state;
        trace!("solve sample {} state {}", x, state);
        let name = s.var_name.clone();
        let (prgm, pc) = self
            .programs
            .find_global_label(&s.active_prgm_name)
            .ok_or_else(|| error!(LabelNotFound))?;
        let level = self.level();
        self.vars.store(&name, Val::Real(x), level)?;
        self.prgm = prgm;
        self.pc = Some(pc);
        self.push_rtn_addr(Owner::Solve, None)?;
        Err(error!(Run))
    }

    /// Resumes the solver after the function returned. `failure` means
    /// the evaluation raised a trappable error.
    pub(super) fn return_to_solve(&mut self, failure: bool, stop: bool) -> Result<()> {
        if stop {
            self.solve.keep_running = false;
        }
        if self.solve.state == 0 {
            return Err(error!(InternalError; "SOLVER IDLE"));
        }
        let mut failure = failure;
        let mut f = 0.0;
        if failure {
            self.solve.curr_f = f64::MAX;
        } else {
            let x = match self.stack.x()? {
                Val::Real(x) => Some(*x),
                _ => None,
            };
            match x {
                Some(x) => {
                    f = x;
                    self.solve.curr_f = f;
                    if f == 0.0 {
                        return self.finish_solve(ROOT);
                    }
                }
                None => {
                    self.solve.curr_f = f64::MAX;
                    failure = true;
                }
            }
        }
        let s = &mut self.solve;
        if !failure && s.retry_counter != 0 {
            s.retry_counter -= s.retry_counter.signum();
        }
        match s.advance(failure, f) {
            Step::Call { which, state } => self.call_solve_fn(which, state),
            Step::Finish(message) => self.finish_solve(message),
            Step::Idle => Err(error!(InternalError; "SOLVER IDLE")),
        }
    }

    /// X = root, Y = previous estimate, Z = f(root), T = message code.
    fn finish_solve(&mut self, message: u8) -> Result<()> {
        self.solve.state = 0;
        let root = self.solve.best();
        let name = self.solve.var_name.clone();
        let level = self.level();
        self.vars.store(&name, Val::Real(root), level)?;
        let results = vec![
            Val::Real(message as f64),
            Val::Real(self.solve.curr_f),
            Val::Real(self.solve.prev_x),
            Val::Real(root),
        ];
        if self.stack.is_big() {
            for _ in 0..self.stack.depth().min(4) {
                self.stack.pop()?;
            }
            for v in results {
                self.stack.push(v)?;
            }
        } else {
            self.stack.install(false, results)?;
        }
        self.prgm = self.solve.prev_prgm;
        self.pc = self.solve.prev_pc;
        debug!("solve finished: {} = {} ({})", String::from_utf8_lossy(&name), root, message);
        if self.solve.keep_running {
            return Ok(());
        }
        let mut text = format!(
            "{}={}",
            String::from_utf8_lossy(&name),
            format_val(&Val::Real(root), &self.flags)
        );
        if let Some(m) = MESSAGES.get(message as usize).filter(|m| !m.is_empty()) {
            text.push('\n');
            text.push_str(m);
        }
        self.message = Some(text);
        Err(error!(Stop))
    }

    /// `INTEG "VAR"` over LLIM..ULIM to relative accuracy ACC.
    pub(super) fn start_integ(&mut self, name: &[u8]) -> Result<()> {
        if self.integ_active() {
            return Err(error!(IntegInteg));
        }
        let llim = self.real_var(b"LLIM")?.ok_or_else(|| error!(Nonexistent))?;
        let ulim = self.real_var(b"ULIM")?.ok_or_else(|| error!(Nonexistent))?;
        let acc = self.real_var(b"ACC")?.unwrap_or(0.0).max(0.0);
        if !self.running {
            self.clear_all_rtns();
        }
        self.alpha = name.to_vec();
        let keep_running = self.keeps_running();
        let g = &mut self.integ;
        g.llim = llim;
        g.ulim = ulim;
        g.acc = acc;
        g.var_name = name.to_vec();
        g.active_prgm_name = g.prgm_name.clone();
        g.prev_prgm = self.prgm;
        g.prev_pc = self.pc;
        g.a = llim;
        g.b = ulim - llim;
        g.h = 2.0;
        g.prev_int = 0.0;
        g.nsteps = 1;
        g.n = 1;
        g.state = 1;
        g.s[0] = 0.0;
        g.k = 1;
        g.prev_res = 0.0;
        g.keep_running = keep_running;
        debug!("integ {} over {}..{}", String::from_utf8_lossy(name), llim, ulim);
        self.return_to_integ(false)
    }

    fn call_integ_fn(&mut self) -> Result<()> {
        if self.integ.active_prgm_name.is_empty() {
            return Err(error!(Nonexistent));
        }
        let (prgm, pc) = self
            .programs
            .find_global_label(&self.integ.active_prgm_name)
            .ok_or_else(|| error!(LabelNotFound))?;
        let name = self.integ.var_name.clone();
        let level = self.level();
        self.vars.store(&name, Val::Real(self.integ.u), level)?;
        self.prgm = prgm;
        self.pc = Some(pc);
        self.push_rtn_addr(Owner::Integ, None)?;
        Err(error!(Run))
    }

    /// Resumes the integrator after the integrand returned.
    pub(super) fn return_to_integ(&mut self, failure: bool) -> Result<()> {
        let fx = match self.stack.x() {
            Ok(Val::Real(x)) if !failure => Some(*x),
            _ => None,
        };
        match self.integ.advance(fx) {
            Step::Call { .. } => self.call_integ_fn(),
            Step::Finish(_) => self.finish_integ(),
            Step::Idle => Err(error!(InternalError; "INTEGRATOR IDLE")),
        }
    }

    /// X = integral, Y = error estimate.
    fn finish_integ(&mut self) -> Result<()> {
        self.integ.state = 0;
        let (result, eps) = (self.integ.result(), self.integ.eps);
        self.push_lift(Val::Real(eps))?;
        self.stack.push(Val::Real(result))?;
        self.flags.set(STACK_LIFT_DISABLE, false);
        self.prgm = self.integ.prev_prgm;
        self.pc = self.integ.prev_pc;
        debug!("integ finished: {} ± {}", result, eps);
        if self.integ.keep_running {
            return Ok(());
        }
        self.message = Some(format!("∫={}", format_val(&Val::Real(result), &self.flags)));
        Err(error!(Stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drives the state machine directly with `f`.
    fn solve(f: impl Fn(f64) -> f64, x1: f64, x2: f64) -> (f64, u8) {
        let mut s = SolveState {
            x1,
            x2,
            toggle: true,
            retry_counter: 10,
            retry_value: x1,
            state: 1,
            which: 1,
            ..SolveState::default()
        };
        for _ in 0..1000 {
            let x = match s.which {
                1 => s.x1,
                2 => s.x2,
                _ => s.x3,
            };
            s.prev_x = s.curr_x;
            s.curr_x = x;
            let fx = f(x);
            s.curr_f = fx;
            if fx == 0.0 {
                return (x, ROOT);
            }
            match s.advance(false, fx) {
                Step::Call { which, state } => {
                    s.which = which;
                    s.state = state;
                }
                Step::Finish(m) => return (s.best(), m),
                Step::Idle => panic!("idle"),
            }
        }
        panic!("no convergence");
    }

    #[test]
    fn test_solve_quadratic() {
        let (x, m) = solve(|x| x * x - 2.0, 0.0, 3.0);
        assert_eq!(m, ROOT);
        assert!((x - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_solve_sign_reversal() {
        let (x, m) = solve(|x| if x < 0.5 { -1.0 } else { 1.0 }, 0.0, 1.0);
        assert!(m == SIGN_REVERSAL || m == ROOT);
        assert!((x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_romberg_polynomial() {
        let mut g = IntegState {
            a: 0.0,
            b: 2.0,
            h: 2.0,
            nsteps: 1,
            n: 1,
            k: 1,
            state: 1,
            acc: 1e-10,
            ..IntegState::default()
        };
        let mut fx = None;
        loop {
            match g.advance(fx) {
                Step::Call { .. } => fx = Some(g.u * g.u),
                Step::Finish(_) => break,
                Step::Idle => panic!("idle"),
            }
        }
        assert!((g.result() - 8.0 / 3.0).abs() < 1e-8);
    }
}
