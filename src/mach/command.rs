use super::display::BYTES_PER_LINE;
use super::flags::{AngleMode, DisplayMode, POLAR, PRINTER_ENABLE, PRINT_NORM, PRINT_TRACE, STACK_LIFT_DISABLE};
use super::format::format_val;
use super::operation::check;
use super::program::Target;
use super::runtime::{InputPrompt, RtnStatus, Task, ALPHA_LEN};
use super::val::{Cell, RealMatrix, Shared};
use super::var::GLOBAL;
use super::{Function, Operation, Owner, Runtime, Val};
use crate::error;
use crate::lang::{Arg, Error, Instruction, Opcode, StackReg, MAX_TEXT};
use std::cmp::Ordering;

type Result<T> = std::result::Result<T, Error>;

/// Commands that leave the stack-lift state alone.
fn lift_neutral(op: Opcode) -> bool {
    use Opcode::*;
    matches!(
        op,
        Null | Lbl
            | Pse
            | Gto
            | Xeq
            | Rtn
            | End
            | Stop
            | Run
            | Sf
            | Cf
            | FsT
            | FcT
            | FscT
            | FccT
            | Fix
            | Sci
            | Eng
            | All
            | Deg
            | Rad
            | Grad
            | Rect
            | Polar
            | XEq0
            | XNe0
            | XLt0
            | XGt0
            | XLe0
            | XGe0
            | XEqY
            | XNeY
            | XLtY
            | XGtY
            | XLeY
            | XGeY
            | RealT
            | CpxT
            | StrT
            | MatT
            | Func
            | L4Stk
            | LnStk
            | RtnYes
            | RtnNo
            | RtnErr
            | View
            | Aview
            | Prompt
            | Input
            | Pon
            | Poff
            | Man
            | Norm
            | Trace
            | Sst
            | Bst
            | GtoDot
            | GtoDotDot
            | Mvar
            | PgmSlv
            | PgmInt
            | Isg
            | Dse
            | ExitAll
    )
}

fn test(cond: bool) -> Result<()> {
    if cond {
        Err(error!(Yes))
    } else {
        Err(error!(No))
    }
}

fn non_negative_integer(x: f64) -> Result<u64> {
    if x < 0.0 || x.fract() != 0.0 || x > u32::MAX as f64 {
        Err(error!(InvalidData))
    } else {
        Ok(x as u64)
    }
}

fn comb_perm(n: f64, k: f64, comb: bool) -> Result<f64> {
    let (n, k) = (non_negative_integer(n)?, non_negative_integer(k)?);
    if k > n {
        return Err(error!(InvalidData));
    }
    let k = if comb { k.min(n - k) } else { k };
    let mut r = 1.0;
    for i in 0..k {
        r *= (n - i) as f64;
        if comb {
            r /= (i + 1) as f64;
        }
    }
    check(r.round())
}

/// Rounds to what the display shows.
fn round_display(x: f64, mode: DisplayMode) -> f64 {
    let digits = match mode {
        DisplayMode::Fix(d) => d as i32,
        DisplayMode::All => return x,
        DisplayMode::Sci(d) | DisplayMode::Eng(d) => {
            if x == 0.0 {
                return 0.0;
            }
            d as i32 - x.abs().log10().floor() as i32
        }
    };
    let scale = 10f64.powi(digits);
    if !scale.is_finite() || scale == 0.0 {
        return x;
    }
    (x * scale).round() / scale
}

impl Runtime {
    /// Executes one instruction and maintains the stack-lift flag.
    pub(super) fn run_command(&mut self, instr: &Instruction, target: Target) -> Result<()> {
        let op = instr.opcode;
        self.dispatch(op, &instr.arg, target)?;
        if !lift_neutral(op) {
            self.flags
                .set(STACK_LIFT_DISABLE, matches!(op, Opcode::Enter | Opcode::ClX));
        }
        Ok(())
    }

    fn dispatch(&mut self, op: Opcode, arg: &Arg, target: Target) -> Result<()> {
        use Opcode::*;
        let angle = self.flags.angle_mode();
        match op {
            Null | Lbl | Pse | Mvar => Ok(()),
            Number => match arg {
                Arg::Number { value, .. } => self.push_lift(Val::Real(*value)),
                _ => Err(error!(InternalError; "NUMBER WITHOUT VALUE")),
            },
            Str => {
                let text = arg.text().unwrap_or_default().to_vec();
                self.alpha = text;
                Ok(())
            }
            XStr => {
                let text = arg.text().unwrap_or_default();
                self.push_lift(Val::string(text)?)
            }

            ClX => self.stack.set_x(Val::Real(0.0)),
            Enter | Dup => {
                let x = self.stack.x()?.clone();
                self.stack.push(x)
            }
            Swap => self.stack.swap(0, 1),
            RDn => {
                self.stack.roll_down();
                Ok(())
            }
            RUp => {
                self.stack.roll_up();
                Ok(())
            }
            Drop => self.stack.pop().map(|_| ()),
            ClSt => {
                self.stack.clear();
                Ok(())
            }
            LastX => {
                let l = self.lastx.clone();
                self.push_lift(l)
            }
            FourStk => self.stack.set_big(false),
            NStk => self.stack.set_big(true),

            Chs => self.unary(Function::negate),
            Add => self.binary(Operation::add),
            Sub => self.binary(Operation::subtract),
            Mul => self.binary(Operation::multiply),
            Div => self.binary(Operation::divide),
            YPowX => self.binary(Operation::power),
            Inv => self.unary(Function::inv),
            Sqrt => self.unary(Function::sqrt),
            Square => self.unary(|x| Operation::multiply(x, x)),
            Ln => self.unary(Function::ln),
            Log => self.unary(Function::log),
            EPowX => self.unary(Function::exp),
            TenPowX => self.unary(|x| Operation::power(&Val::Real(10.0), x)),
            EPowXMinus1 => self.unary(|x| Function::real(x, |x| Ok(x.exp_m1()))),
            Ln1PlusX => self.unary(Function::ln1p),
            Sin => self.unary(|x| Function::sin(x, angle)),
            Cos => self.unary(|x| Function::cos(x, angle)),
            Tan => self.unary(|x| Function::tan(x, angle)),
            Asin => self.unary(|x| Function::asin(x, angle)),
            Acos => self.unary(|x| Function::acos(x, angle)),
            Atan => self.unary(|x| Function::atan(x, angle)),
            Sinh => self.unary(|x| Function::real(x, |x| Ok(x.sinh()))),
            Cosh => self.unary(|x| Function::real(x, |x| Ok(x.cosh()))),
            Tanh => self.unary(|x| Function::real(x, |x| Ok(x.tanh()))),
            Asinh => self.unary(|x| Function::real(x, |x| Ok(x.asinh()))),
            Acosh => self.unary(Function::acosh),
            Atanh => self.unary(Function::atanh),
            Abs => self.unary(Function::abs),
            Sign => self.unary(Function::sign),
            Ip => self.unary(|x| Function::real(x, |x| Ok(x.trunc()))),
            Fp => self.unary(|x| Function::real(x, |x| Ok(x.fract()))),
            Rnd => {
                let mode = self.flags.display_mode();
                self.unary(|x| Function::real(x, |x| Ok(round_display(x, mode))))
            }
            Fact => self.unary(Function::fact),
            Gamma => self.unary(Function::gamma),
            ToDeg => self.unary(|x| Function::real(x, |x| Ok(x.to_degrees()))),
            ToRad => self.unary(|x| Function::real(x, |x| Ok(x.to_radians()))),
            ToHr => self.unary(|x| Function::real(x, |x| Ok(Function::hms_to_hours(x)))),
            ToHms => self.unary(|x| Function::real(x, |x| Ok(Function::hours_to_hms(x)))),
            Mod => self.binary(|y, x| {
                Operation::real2(y, x, |y, x| {
                    if x == 0.0 {
                        Ok(y)
                    } else {
                        Ok(y - x * (y / x).floor())
                    }
                })
            }),
            Comb => self.binary(|y, x| Operation::real2(y, x, |n, k| comb_perm(n, k, true))),
            Perm => self.binary(|y, x| Operation::real2(y, x, |n, k| comb_perm(n, k, false))),
            Max => self.binary(|y, x| Operation::real2(y, x, |y, x| Ok(y.max(x)))),
            Min => self.binary(|y, x| Operation::real2(y, x, |y, x| Ok(y.min(x)))),
            Hmsadd => self.binary(|y, x| {
                Operation::real2(y, x, |y, x| {
                    Ok(Function::hours_to_hms(Function::hms_to_hours(y) + Function::hms_to_hours(x)))
                })
            }),
            Hmssub => self.binary(|y, x| {
                Operation::real2(y, x, |y, x| {
                    Ok(Function::hours_to_hms(Function::hms_to_hours(y) - Function::hms_to_hours(x)))
                })
            }),
            Percent => self.percent(|y, x| Ok(y * x / 100.0)),
            PercentCh => self.percent(|y, x| {
                if y == 0.0 {
                    Err(error!(DivideBy0))
                } else {
                    Ok((x - y) / y * 100.0)
                }
            }),
            Pi => self.push_lift(Val::Real(std::f64::consts::PI)),
            Complex => self.complex(angle),
            Ran => {
                let r = self.random();
                self.push_lift(Val::Real(r))
            }
            Seed => {
                let x = self.stack.x()?.as_real()?;
                self.seed(x);
                Ok(())
            }

            Sto => {
                let x = self.stack.x()?.clone();
                self.store(arg, x)
            }
            StoAdd => self.sto_arith(arg, Operation::add),
            StoSub => self.sto_arith(arg, Operation::subtract),
            StoMul => self.sto_arith(arg, Operation::multiply),
            StoDiv => self.sto_arith(arg, Operation::divide),
            Rcl => {
                let v = self.recall(arg)?;
                self.push_lift(v)
            }
            RclAdd => self.rcl_arith(arg, Operation::add),
            RclSub => self.rcl_arith(arg, Operation::subtract),
            RclMul => self.rcl_arith(arg, Operation::multiply),
            RclDiv => self.rcl_arith(arg, Operation::divide),
            LSto => {
                let name = self.name_arg(arg)?;
                let x = self.stack.x()?.clone();
                self.lsto(&name, x)
            }
            XSwap => {
                let v = self.recall(arg)?;
                let x = self.stack.x()?.clone();
                self.store(arg, x)?;
                self.stack.set_x(v)
            }
            Asto => {
                let n = self.alpha.len().min(6);
                let s = Val::string(&self.alpha[..n])?;
                self.store(arg, s)
            }
            Arcl => {
                let v = self.recall(arg)?;
                let text = match &v {
                    Val::Str(t) => t.as_bytes().to_vec(),
                    other => format_val(other, &self.flags).into_bytes(),
                };
                self.append_alpha(&text);
                Ok(())
            }
            ClA => {
                self.alpha.clear();
                Ok(())
            }
            ALeng => self.push_lift(Val::Real(self.alpha.len() as f64)),
            ClV => {
                let name = self.name_arg(arg)?;
                let level = self.level();
                if self.vars.purge(&name, level).is_some() {
                    self.check_matedit();
                }
                Ok(())
            }
            ClRg => self.clear_registers(),
            Size => {
                let n = self.num_arg(arg)?;
                self.size(n as usize)
            }
            Isg => self.isg_dse(arg, true),
            Dse => self.isg_dse(arg, false),

            Sf => {
                let n = self.num_arg(arg)?;
                self.flags.set_user(n as usize, true)
            }
            Cf => {
                let n = self.num_arg(arg)?;
                self.flags.set_user(n as usize, false)
            }
            FsT | FcT | FscT | FccT => {
                let n = self.num_arg(arg)? as usize;
                if n >= super::flags::COUNT {
                    return Err(error!(OutOfRange));
                }
                let set = self.flags.get(n);
                if matches!(op, FscT | FccT) {
                    self.flags.set_user(n, false)?;
                }
                test(if matches!(op, FsT | FscT) { set } else { !set })
            }
            Deg => {
                self.flags.set_angle_mode(AngleMode::Deg);
                Ok(())
            }
            Rad => {
                self.flags.set_angle_mode(AngleMode::Rad);
                Ok(())
            }
            Grad => {
                self.flags.set_angle_mode(AngleMode::Grad);
                Ok(())
            }
            Rect => {
                self.flags.set(POLAR, false);
                Ok(())
            }
            Polar => {
                self.flags.set(POLAR, true);
                Ok(())
            }
            Fix | Sci | Eng => {
                let n = self.num_arg(arg)?;
                if n > 11 {
                    return Err(error!(OutOfRange));
                }
                let n = n as u8;
                self.flags.set_display_mode(match op {
                    Fix => DisplayMode::Fix(n),
                    Sci => DisplayMode::Sci(n),
                    _ => DisplayMode::Eng(n),
                });
                Ok(())
            }
            All => {
                self.flags.set_display_mode(DisplayMode::All);
                Ok(())
            }

            XEq0 | XNe0 | XLt0 | XGt0 | XLe0 | XGe0 => {
                let x = self.stack.x()?;
                let ord = match x {
                    Val::Real(x) => x.partial_cmp(&0.0).ok_or_else(|| error!(InvalidData))?,
                    _ if matches!(op, XEq0 | XNe0) => {
                        let zero = matches!(x, Val::Complex(re, im) if *re == 0.0 && *im == 0.0);
                        return test(zero == (op == XEq0));
                    }
                    other => return Err(other.as_real().err().unwrap_or_else(|| error!(InvalidType))),
                };
                test(match op {
                    XEq0 => ord == Ordering::Equal,
                    XNe0 => ord != Ordering::Equal,
                    XLt0 => ord == Ordering::Less,
                    XGt0 => ord == Ordering::Greater,
                    XLe0 => ord != Ordering::Greater,
                    _ => ord != Ordering::Less,
                })
            }
            XEqY | XNeY => {
                self.stack.require(2)?;
                let eq = Operation::equal(self.y()?, self.stack.x()?);
                test(eq == (op == XEqY))
            }
            XLtY | XGtY | XLeY | XGeY => {
                self.stack.require(2)?;
                let ord = Operation::compare(self.stack.x()?, self.y()?)?;
                test(match op {
                    XLtY => ord == Ordering::Less,
                    XGtY => ord == Ordering::Greater,
                    XLeY => ord != Ordering::Greater,
                    _ => ord != Ordering::Less,
                })
            }
            RealT => test(matches!(self.stack.x()?, Val::Real(_))),
            CpxT => test(matches!(
                self.stack.x()?,
                Val::Complex(..) | Val::ComplexMatrix(_)
            )),
            StrT => test(matches!(self.stack.x()?, Val::Str(_))),
            MatT => test(self.stack.x()?.is_matrix()),

            Gto => self.gto(arg, target),
            Xeq => self.xeq(arg, target),
            Rtn | End => self.rtn(RtnStatus::Plain),
            RtnYes => self.rtn(RtnStatus::Yes),
            RtnNo => self.rtn(RtnStatus::No),
            RtnErr => {
                let n = self.num_arg(arg)?;
                self.rtn_err(n)
            }
            Stop => Err(error!(Stop)),
            Run => {
                self.running = true;
                Ok(())
            }
            Func => {
                let n = self.num_arg(arg)?;
                self.func(n)
            }
            L4Stk => self.save_stack_mode(false),
            LnStk => self.save_stack_mode(true),

            PgmSlv | PgmInt => {
                let name = self.label_arg(arg)?;
                if self.programs.find_global_label(&name).is_none() {
                    return Err(error!(LabelNotFound));
                }
                if op == PgmSlv {
                    self.solve.prgm_name = name;
                } else {
                    self.integ.prgm_name = name;
                }
                Ok(())
            }
            Solve => {
                let name = self.name_arg(arg)?;
                self.start_solve(&name)
            }
            Integ => {
                let name = self.name_arg(arg)?;
                self.start_integ(&name)
            }

            View => {
                let v = self.recall(arg)?;
                let label = self.arg_label(arg)?;
                self.message = Some(format!("{}={}", label, format_val(&v, &self.flags)));
                Ok(())
            }
            Aview => {
                self.message = Some(String::from_utf8_lossy(&self.alpha).into_owned());
                Ok(())
            }
            Prompt => {
                self.message = Some(String::from_utf8_lossy(&self.alpha).into_owned());
                Err(error!(Stop))
            }
            Input => self.input(arg),
            GetKey => match self.keybuf.pop() {
                Some(key) => self.push_lift(Val::Real(key.getkey_code() as f64)),
                None => {
                    self.task = Some(Task::GetKey);
                    Err(error!(Interruptible))
                }
            },

            NewMat => {
                self.stack.require(2)?;
                let cols = self.stack.x()?.as_real()?;
                let rows = self.y()?.as_real()?;
                if cols < 1.0 || rows < 1.0 {
                    return Err(error!(DimensionError));
                }
                let m = RealMatrix::new(rows as usize, cols as usize)?;
                self.stack.replace_top(2, Val::RealMatrix(Shared::new(m)))
            }
            NewList => self.push_lift(Val::list(vec![])),
            Dim => {
                let name = self.name_arg(arg)?;
                self.dim(&name)
            }
            Index => {
                let name = self.name_arg(arg)?;
                self.start_matedit(&name, false)
            }
            EditN => {
                let name = self.name_arg(arg)?;
                self.start_matedit(&name, true)
            }
            StoIj => self.stoij(),
            RclIj => self.rclij(),
            StoEl => self.stoel(),
            RclEl => self.rclel(),
            IAdd => self.matedit_move(1, 0),
            ISub => self.matedit_move(-1, 0),
            JAdd => self.matedit_move(0, 1),
            JSub => self.matedit_move(0, -1),
            Up => self.matedit_move(-1, 0),
            Down => self.matedit_move(1, 0),
            Left => self.matedit_left(),
            Right => self.matedit_right(),
            ExitAll => {
                self.matedit = None;
                Ok(())
            }

            ClLcd => {
                self.display.clear();
                self.shell.repaint(self.display.bits());
                Ok(())
            }
            Pixel => self.pixel(),

            Prx => self.print_x(),
            Prv => {
                let name = self.name_arg(arg)?;
                self.print_var(&name)
            }
            PrStk => self.print_stack(),
            Pra => self.print_alpha(),
            PrUsr => self.print_user_var(0),
            Adv => self.print_text(""),
            Pon => {
                self.flags.set(PRINTER_ENABLE, true);
                Ok(())
            }
            Poff => {
                self.flags.set(PRINTER_ENABLE, false);
                Ok(())
            }
            Man | Norm | Trace => {
                self.flags.set(PRINT_NORM, op == Norm);
                self.flags.set(PRINT_TRACE, op == Trace);
                Ok(())
            }

            ClP => {
                let name = self.label_arg(arg)?;
                self.clear_program(&name)
            }
            GtoDot => self.goto_dot(arg),
            GtoDotDot => self.goto_new_program(),
            Sst => {
                self.next_line();
                Ok(())
            }
            Bst => {
                self.prev_line();
                Ok(())
            }
            Del => {
                let n = self.num_arg(arg)?;
                for _ in 0..n {
                    if !self.prgm_mode || self.pc.is_none() || !self.delete_line()? {
                        break;
                    }
                    self.next_line();
                }
                Ok(())
            }
            ClAllA => {
                self.hard_reset();
                Ok(())
            }

            _ => Err(error!(NotYetImplemented)),
        }
    }

    fn y(&self) -> Result<&Val> {
        self.stack.get(1).ok_or_else(|| error!(TooFewArguments))
    }

    /// X := f(X), LASTX := old X.
    pub(super) fn unary(&mut self, f: impl FnOnce(&Val) -> Result<Val>) -> Result<()> {
        let x = self.stack.x()?.clone();
        let r = f(&x)?;
        self.lastx = x;
        self.stack.set_x(r)
    }

    /// X := f(Y, X) consuming both, LASTX := old X.
    pub(super) fn binary(&mut self, f: impl FnOnce(&Val, &Val) -> Result<Val>) -> Result<()> {
        self.stack.require(2)?;
        let x = self.stack.x()?.clone();
        let r = f(self.y()?, &x)?;
        self.lastx = x;
        self.stack.replace_top(2, r)
    }

    /// `%` and `%CH` leave Y alone.
    fn percent(&mut self, f: impl Fn(f64, f64) -> Result<f64>) -> Result<()> {
        self.stack.require(2)?;
        let x = self.stack.x()?.clone();
        let r = Operation::real2(self.y()?, &x, f)?;
        self.lastx = x;
        self.stack.set_x(r)
    }

    fn complex(&mut self, angle: AngleMode) -> Result<()> {
        let polar = self.flags.get(POLAR);
        match self.stack.x()?.clone() {
            Val::Complex(re, im) => {
                let (a, b) = if polar {
                    (re.hypot(im), Function::to_angle(im.atan2(re), angle))
                } else {
                    (re, im)
                };
                self.lastx = Val::Complex(re, im);
                self.stack.set_x(Val::Real(a))?;
                self.stack.push(Val::Real(b))
            }
            x @ Val::Real(_) => {
                self.stack.require(2)?;
                let (a, b) = (self.y()?.as_real()?, x.as_real()?);
                let (re, im) = if polar {
                    let phi = Function::from_angle(b, angle);
                    (a * phi.cos(), a * phi.sin())
                } else {
                    (a, b)
                };
                self.lastx = x;
                self.stack.replace_top(2, Val::Complex(check(re)?, check(im)?))
            }
            Val::Str(_) => Err(error!(AlphaDataIsInvalid)),
            _ => Err(error!(InvalidType)),
        }
    }

    fn append_alpha(&mut self, text: &[u8]) {
        self.alpha.extend_from_slice(text);
        if self.alpha.len() > ALPHA_LEN {
            let excess = self.alpha.len() - ALPHA_LEN;
            self.alpha.drain(..excess);
        }
    }

    /// Follows IND through a register, variable or stack register to a
    /// number or a name.
    pub(super) fn resolve(&self, arg: &Arg) -> Result<Arg> {
        let val = match arg {
            Arg::IndNum(n) => self.reg(*n as usize)?,
            Arg::IndStk(r) => self.stack_reg(*r)?,
            Arg::IndStr(name) => self
                .vars
                .recall(name, self.level())
                .cloned()
                .ok_or_else(|| error!(Nonexistent))?,
            _ => return Ok(arg.clone()),
        };
        match val {
            Val::Real(x) => {
                let x = x.abs().trunc();
                if x >= i32::MAX as f64 {
                    Err(error!(OutOfRange))
                } else {
                    Ok(Arg::Num(x as u32))
                }
            }
            Val::Str(t) => {
                if t.len() > MAX_TEXT {
                    Err(error!(NameTooLong))
                } else {
                    Ok(Arg::Str(t.as_bytes().to_vec()))
                }
            }
            _ => Err(error!(InvalidType)),
        }
    }

    pub(super) fn num_arg(&self, arg: &Arg) -> Result<u32> {
        match self.resolve(arg)? {
            Arg::Num(n) => Ok(n),
            Arg::Str(_) => Err(error!(AlphaDataIsInvalid)),
            _ => Err(error!(InvalidData)),
        }
    }

    pub(super) fn name_arg(&self, arg: &Arg) -> Result<Vec<u8>> {
        match self.resolve(arg)? {
            Arg::Str(name) => Ok(name),
            _ => Err(error!(InvalidType)),
        }
    }

    fn label_arg(&self, arg: &Arg) -> Result<Vec<u8>> {
        match self.resolve(arg)? {
            Arg::Str(name) => Ok(name),
            _ => Err(error!(LabelNotFound)),
        }
    }

    /// The name VIEW and INPUT show for an argument.
    fn arg_label(&self, arg: &Arg) -> Result<String> {
        Ok(match self.resolve(arg)? {
            Arg::Num(n) => format!("R{:02}", n),
            Arg::Stk(r) => format!("ST {}", r.to_byte() as char),
            Arg::Str(name) => String::from_utf8_lossy(&name).into_owned(),
            _ => String::new(),
        })
    }

    fn regs_index(&self) -> Result<usize> {
        self.vars
            .lookup(b"REGS", self.level())
            .ok_or_else(|| error!(SizeError))
    }

    pub(super) fn reg(&self, n: usize) -> Result<Val> {
        let i = self.regs_index()?;
        match self.vars.get(i).map(|v| &v.value) {
            Some(Val::RealMatrix(m)) => m
                .get(n / m.cols(), n % m.cols())
                .cloned()
                .map(Val::from)
                .ok_or_else(|| error!(SizeError)),
            Some(Val::ComplexMatrix(m)) => m
                .get(n / m.cols(), n % m.cols())
                .map(|(re, im)| Val::Complex(re, im))
                .ok_or_else(|| error!(SizeError)),
            _ => Err(error!(InvalidType)),
        }
    }

    fn store_reg(&mut self, n: usize, val: Val) -> Result<()> {
        let i = self.regs_index()?;
        match self.vars.value_mut(i) {
            Some(Val::RealMatrix(m)) => {
                let cols = m.cols();
                if n >= m.rows() * cols {
                    return Err(error!(SizeError));
                }
                let cell = match val {
                    Val::Real(x) => Cell::Number(x),
                    Val::Str(t) => Cell::Text(t),
                    _ => return Err(error!(InvalidType)),
                };
                m.make_mut()?.set(n / cols, n % cols, cell)
            }
            Some(Val::ComplexMatrix(m)) => {
                let cols = m.cols();
                if n >= m.rows() * cols {
                    return Err(error!(SizeError));
                }
                let (re, im) = match val {
                    Val::Real(x) => (x, 0.0),
                    Val::Complex(re, im) => (re, im),
                    _ => return Err(error!(InvalidType)),
                };
                m.make_mut()?.set(n / cols, n % cols, re, im)
            }
            _ => Err(error!(InvalidType)),
        }
    }

    fn stack_reg(&self, r: StackReg) -> Result<Val> {
        match r.depth() {
            None => Ok(self.lastx.clone()),
            Some(d) => self.stack.get(d).cloned().ok_or_else(|| error!(StackDepthError)),
        }
    }

    fn store_stack_reg(&mut self, r: StackReg, val: Val) -> Result<()> {
        match r.depth() {
            None => self.lastx = val,
            Some(d) => {
                *self.stack.get_mut(d).ok_or_else(|| error!(StackDepthError))? = val;
            }
        }
        Ok(())
    }

    /// RCL and everything else that reads through an argument.
    pub(super) fn recall(&self, arg: &Arg) -> Result<Val> {
        match self.resolve(arg)? {
            Arg::Num(n) => self.reg(n as usize),
            Arg::Stk(r) => self.stack_reg(r),
            Arg::Str(name) => self
                .vars
                .recall(&name, self.level())
                .cloned()
                .ok_or_else(|| error!(Nonexistent)),
            _ => Err(error!(InvalidData)),
        }
    }

    /// STO and everything else that writes through an argument.
    pub(super) fn store(&mut self, arg: &Arg, val: Val) -> Result<()> {
        match self.resolve(arg)? {
            Arg::Num(n) => self.store_reg(n as usize, val),
            Arg::Stk(r) => self.store_stack_reg(r, val),
            Arg::Str(name) => {
                let level = self.level();
                self.vars.store(&name, val, level)
            }
            _ => Err(error!(InvalidData)),
        }
    }

    fn sto_arith(&mut self, arg: &Arg, f: impl FnOnce(&Val, &Val) -> Result<Val>) -> Result<()> {
        let cur = self.recall(arg)?;
        let r = f(&cur, self.stack.x()?)?;
        self.store(arg, r)
    }

    fn rcl_arith(&mut self, arg: &Arg, f: impl FnOnce(&Val, &Val) -> Result<Val>) -> Result<()> {
        let v = self.recall(arg)?;
        let x = self.stack.x()?.clone();
        let r = f(&x, &v)?;
        self.lastx = x;
        self.stack.set_x(r)
    }

    fn clear_registers(&mut self) -> Result<()> {
        let i = self.regs_index()?;
        match self.vars.value_mut(i) {
            Some(Val::RealMatrix(m)) => {
                let (rows, cols) = (m.rows(), m.cols());
                *m = Shared::new(RealMatrix::new(rows, cols)?);
                Ok(())
            }
            Some(Val::ComplexMatrix(m)) => {
                let (rows, cols) = (m.rows(), m.cols());
                *m = Shared::new(super::val::ComplexMatrix::new(rows, cols)?);
                Ok(())
            }
            _ => Err(error!(InvalidType)),
        }
    }

    /// `SIZE n` resizes `REGS` to n×1; `SIZE 0` removes it.
    fn size(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            self.vars.purge(b"REGS", GLOBAL);
            self.check_matedit();
            return Ok(());
        }
        match self.regs_index() {
            Ok(i) => match self.vars.value_mut(i) {
                Some(Val::RealMatrix(m)) => m.make_mut()?.resize(n, 1),
                _ => Err(error!(InvalidType)),
            },
            Err(_) => {
                let m = RealMatrix::new(n, 1)?;
                self.vars.store(b"REGS", Val::RealMatrix(Shared::new(m)), GLOBAL)
            }
        }
    }

    /// `DIM "NAME"`: Y rows, X columns; creates the matrix if needed.
    fn dim(&mut self, name: &[u8]) -> Result<()> {
        self.stack.require(2)?;
        let cols = self.stack.x()?.as_real()?;
        let rows = self.y()?.as_real()?;
        if cols < 1.0 || rows < 1.0 {
            return Err(error!(DimensionError));
        }
        let (rows, cols) = (rows as usize, cols as usize);
        let level = self.level();
        match self.vars.lookup(name, level) {
            Some(i) => match self.vars.value_mut(i) {
                Some(Val::RealMatrix(m)) => m.make_mut()?.resize(rows, cols),
                _ => Err(error!(InvalidType)),
            },
            None => {
                let m = RealMatrix::new(rows, cols)?;
                self.vars.store(name, Val::RealMatrix(Shared::new(m)), level)
            }
        }
    }

    /// ISG/DSE on a counter `iiiii.fffcc`.
    fn isg_dse(&mut self, arg: &Arg, isg: bool) -> Result<()> {
        let x = self.recall(arg)?.as_real()?;
        let ip = x.trunc();
        let scaled = ((x - ip).abs() * 100_000.0).round();
        let fff = (scaled / 100.0).trunc();
        let cc = match scaled - fff * 100.0 {
            c if c == 0.0 => 1.0,
            c => c,
        };
        let (next, done) = if isg {
            (ip + cc, ip + cc > fff)
        } else {
            (ip - cc, ip - cc <= fff)
        };
        let frac = scaled / 100_000.0;
        let val = if next < 0.0 { next - frac } else { next + frac };
        self.store(arg, Val::Real(val))?;
        test(!done)
    }

    fn gto(&mut self, arg: &Arg, target: Target) -> Result<()> {
        let (prgm, pc) = self.jump_target(arg, target)?;
        if !self.running {
            self.clear_all_rtns();
        }
        self.prgm = prgm;
        self.pc = Some(pc);
        Ok(())
    }

    /// From the keyboard with a suspended program, XEQ remembers where
    /// that program was and stops there on return.
    fn xeq(&mut self, arg: &Arg, target: Target) -> Result<()> {
        let (prgm, pc) = self.jump_target(arg, target)?;
        if self.running {
            self.push_rtn_addr(Owner::Program(self.prgm), self.pc)?;
        } else {
            if !self.rtns.is_empty() {
                self.push_rtn_addr(Owner::Program(self.prgm), self.pc)?;
                if let Some(f) = self.rtns.last_mut() {
                    f.stop = true;
                }
            }
            self.running = true;
        }
        self.prgm = prgm;
        self.pc = Some(pc);
        Ok(())
    }

    fn jump_target(&self, arg: &Arg, target: Target) -> Result<(usize, super::Address)> {
        match target {
            Target::Found(pc) => return Ok((self.prgm, pc)),
            Target::NotFound => return Err(error!(LabelNotFound)),
            Target::None => {}
        }
        match self.resolve(arg)? {
            Arg::Str(name) => self
                .programs
                .find_global_label(&name)
                .ok_or_else(|| error!(LabelNotFound)),
            local @ Arg::Num(_) | local @ Arg::LocalLabel(_) => self
                .programs
                .find_local_label(self.prgm, self.pc, &local)
                .map(|pc| (self.prgm, pc))
                .ok_or_else(|| error!(LabelNotFound)),
            _ => Err(error!(InvalidData)),
        }
    }

    /// `RTNERR n`
    fn rtn_err(&mut self, n: u32) -> Result<()> {
        if n == 0 {
            return self.rtn(RtnStatus::Plain);
        }
        let err = Error::from_code(n as u16)
            .filter(|e| !e.is_pseudo())
            .ok_or_else(|| error!(OutOfRange))?;
        self.rtn_with_error(err)
    }

    /// INPUT recalls the variable into X and stops; the value typed next
    /// is stored back and the program continues.
    fn input(&mut self, arg: &Arg) -> Result<()> {
        let label = self.arg_label(arg)?;
        let v = match self.recall(arg) {
            Ok(v) => v,
            Err(e) if e.is(crate::lang::ErrorCode::Nonexistent) => Val::Real(0.0),
            Err(e) => return Err(e),
        };
        let shown = format_val(&v, &self.flags);
        self.push_lift(v)?;
        self.flags.set(STACK_LIFT_DISABLE, true);
        self.prompt = Some(format!("{}?{}", label, shown));
        self.input = Some(InputPrompt {
            arg: arg.clone(),
            label,
        });
        Err(error!(Stop))
    }

    /// PIXEL: X is the column, Y the row, both from 1.
    fn pixel(&mut self) -> Result<()> {
        self.stack.require(2)?;
        let col = self.stack.x()?.as_real()?;
        let row = self.y()?.as_real()?;
        if col < 1.0 || row < 1.0 {
            return Err(error!(OutOfRange));
        }
        let (x, y) = (col as usize - 1, row as usize - 1);
        self.display.set_pixel(x, y)?;
        self.shell.blit(self.display.bits(), BYTES_PER_LINE, x, y, 1, 1);
        Ok(())
    }
}
