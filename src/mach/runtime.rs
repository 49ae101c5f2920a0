use super::display::Display;
use super::flags::{Flags, ERROR_IGNORE, PRINTER_ENABLE, PRINTER_EXISTS, PRINT_TRACE, STACK_LIFT_DISABLE};
use super::keybuf::KeyBuf;
use super::keys::Entry;
use super::matedit::MatEdit;
use super::program::{Programs, Target};
use super::rtn::{rtn_stack, Frame, Owner};
use super::shell::{NullShell, Shell};
use super::solve::{IntegState, SolveState};
use super::val::{RealMatrix, Shared};
use super::var::GLOBAL;
use super::{Address, RegStack, Stack, Val, Vars};
use crate::error;
use crate::lang::{parse, parse_arg_for, Arg, Error, ErrorCode, Instruction, Opcode, Parsed};
use log::{debug, info, trace, warn};
use rand::Rng;

type Result<T> = std::result::Result<T, Error>;

/// ## Events
///
/// What `execute` hands back to the host between slices of work.
#[derive(Debug, PartialEq)]
pub enum Event {
    Stopped,
    Running,
    Errors(Vec<Error>),
    /// VIEW, AVIEW and PROMPT output, and solver results.
    Message(String),
    /// INPUT is waiting for a value; pass it to `enter`.
    Input(String),
}

/// Interruptible work that continues over several ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Printing the variable catalog; the index of the next variable.
    PrUsr(usize),
    /// Waiting for a key.
    GetKey,
}

/// An INPUT waiting for its value.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPrompt {
    pub arg: Arg,
    pub label: String,
}

/// How a subroutine returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtnStatus {
    Plain,
    /// The caller's next line runs.
    Yes,
    /// The caller's next line is skipped.
    No,
}

/// ## Calculator virtual machine
///
/// Everything the calculator knows lives here; nothing is global.
pub struct Runtime {
    pub(super) prgm: usize,
    /// `None` is line 00. While running this is the next instruction.
    pub(super) pc: Option<Address>,
    pub(super) running: bool,
    pub(super) prgm_mode: bool,
    pub(super) stack: RegStack,
    pub(super) lastx: Val,
    pub(super) alpha: Vec<u8>,
    pub(super) vars: Vars,
    pub(super) programs: Programs,
    pub(super) rtns: Stack<Frame>,
    pub(super) flags: Flags,
    pub(super) entry: Option<Entry>,
    pub(super) pending: Option<Opcode>,
    pub(super) cmdline: String,
    pub(super) matedit: Option<MatEdit>,
    pub(super) input: Option<InputPrompt>,
    pub(super) lasterr: u16,
    pub(super) rng: (u64, u64),
    pub(super) deferred_print: bool,
    pub(super) keybuf: KeyBuf,
    pub(super) display: Display,
    pub(super) shell: Box<dyn Shell>,
    pub(super) solve: SolveState,
    pub(super) integ: IntegState,
    pub(super) interrupted: bool,
    pub(super) oldpc: Option<Address>,
    pub(super) task: Option<Task>,
    pub(super) message: Option<String>,
    pub(super) prompt: Option<String>,
    pub(super) errors: Vec<Error>,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new(Box::new(NullShell))
    }
}

/// Longest ALPHA register.
pub const ALPHA_LEN: usize = 44;

impl Runtime {
    pub fn new(shell: Box<dyn Shell>) -> Runtime {
        let mut r = Runtime {
            prgm: 0,
            pc: None,
            running: false,
            prgm_mode: false,
            stack: RegStack::new(),
            lastx: Val::Real(0.0),
            alpha: vec![],
            vars: Vars::new(),
            programs: Programs::new(),
            rtns: rtn_stack(),
            flags: Flags::default(),
            entry: None,
            pending: None,
            cmdline: String::new(),
            matedit: None,
            input: None,
            lasterr: 0,
            rng: (1, 2),
            deferred_print: false,
            keybuf: KeyBuf::new(),
            display: Display::default(),
            shell,
            solve: SolveState::default(),
            integ: IntegState::default(),
            interrupted: false,
            oldpc: None,
            task: None,
            message: None,
            prompt: None,
            errors: vec![],
        };
        r.hard_reset();
        r
    }

    /// Factory state: one empty program, zeroed 4-level stack, `REGS`
    /// 25×1, default flags, a fresh random seed.
    pub fn hard_reset(&mut self) {
        self.prgm = 0;
        self.pc = None;
        self.running = false;
        self.prgm_mode = false;
        self.stack = RegStack::new();
        self.lastx = Val::Real(0.0);
        self.alpha.clear();
        self.vars = Vars::new();
        self.programs = Programs::new();
        self.rtns = rtn_stack();
        self.flags = Flags::default();
        self.entry = None;
        self.pending = None;
        self.cmdline.clear();
        self.matedit = None;
        self.input = None;
        self.lasterr = 0;
        let mut rng = rand::thread_rng();
        self.rng = (rng.gen::<u64>() | 1, rng.gen::<u64>());
        self.deferred_print = false;
        self.keybuf.clear();
        self.display.clear();
        self.solve = SolveState::default();
        self.integ = IntegState::default();
        self.interrupted = false;
        self.oldpc = None;
        self.task = None;
        self.message = None;
        self.prompt = None;
        self.errors.clear();
        match RealMatrix::new(25, 1) {
            Ok(regs) => {
                if let Err(e) = self.vars.store(b"REGS", Val::RealMatrix(Shared::new(regs)), GLOBAL) {
                    warn!("no registers after reset: {}", e);
                }
            }
            Err(e) => warn!("no registers after reset: {}", e),
        }
        self.shell.repaint(self.display.bits());
        info!("hard reset");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_prgm_mode(&self) -> bool {
        self.prgm_mode
    }

    pub fn stack(&self) -> &RegStack {
        &self.stack
    }

    pub fn lastx(&self) -> &Val {
        &self.lastx
    }

    pub fn alpha(&self) -> &[u8] {
        &self.alpha
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn programs(&self) -> &Programs {
        &self.programs
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn matedit(&self) -> Option<&MatEdit> {
        self.matedit.as_ref()
    }

    pub fn rtn_depth(&self) -> usize {
        self.rtns.len()
    }

    pub fn frames(&self) -> std::slice::Iter<'_, Frame> {
        self.rtns.iter()
    }

    pub fn current(&self) -> (usize, Option<Address>) {
        (self.prgm, self.pc)
    }

    pub fn last_error(&self) -> u16 {
        self.lasterr
    }

    pub fn pending(&self) -> Option<Opcode> {
        self.pending
    }

    pub fn entry_text(&self) -> Option<&str> {
        self.entry.as_ref().map(|e| e.text())
    }

    /// The variable `name` resolves to from the current call depth.
    pub fn recall_var(&self, name: &str) -> Option<&Val> {
        self.vars.recall(name.as_bytes(), self.level())
    }

    /// Level new locals are created at: the return stack depth.
    pub fn level(&self) -> i32 {
        self.rtns.len() as i32
    }

    /// Listing of the current program.
    pub fn listing(&self) -> Vec<String> {
        self.programs.listing(self.prgm)
    }

    /// The current program line as shown in program mode.
    pub fn current_line(&self) -> String {
        let p = match self.programs.get(self.prgm) {
            Some(p) => p,
            None => return String::new(),
        };
        match self.pc {
            None => format!("00 {{ {}-Byte Prgm }}", p.size()),
            Some(pc) => {
                let line = p.line_number(pc);
                let instr = p.decode(pc).instr;
                if instr.is_end() && self.prgm + 1 == self.programs.len() {
                    format!("{:02} .END.", line)
                } else {
                    format!("{:02} {}", line, instr)
                }
            }
        }
    }

    /// Asks a running program or task to stop at the next tick.
    pub fn interrupt(&mut self) {
        if self.running || self.task.is_some() {
            self.interrupted = true;
        } else {
            self.pending = None;
            self.cmdline.clear();
            self.input = None;
        }
    }

    fn take_event(&mut self) -> Option<Event> {
        if !self.errors.is_empty() {
            return Some(Event::Errors(std::mem::take(&mut self.errors)));
        }
        if let Some(m) = self.message.take() {
            return Some(Event::Message(m));
        }
        if let Some(p) = self.prompt.take() {
            return Some(Event::Input(p));
        }
        None
    }

    fn has_event(&self) -> bool {
        !self.errors.is_empty() || self.message.is_some() || self.prompt.is_some()
    }

    /// Runs up to `cycles` instructions or task steps, stopping early at
    /// anything the host has to see.
    pub fn execute(&mut self, cycles: usize) -> Event {
        if let Some(event) = self.take_event() {
            return event;
        }
        for _ in 0..cycles {
            if !self.running && self.task.is_none() {
                break;
            }
            if self.interrupted {
                self.interrupted = false;
                debug!("interrupted");
                self.stop();
                self.errors.push(error!(Interrupted));
                break;
            }
            if self.task == Some(Task::GetKey) && self.keybuf.is_empty() {
                return Event::Running;
            }
            self.tick();
            if self.has_event() {
                break;
            }
        }
        if let Some(event) = self.take_event() {
            return event;
        }
        if self.running || self.task.is_some() {
            Event::Running
        } else {
            Event::Stopped
        }
    }

    fn tick(&mut self) {
        let result = match self.task.take() {
            Some(task) => self.continue_task(task),
            None => self.step(),
        };
        if let Err(e) = result {
            self.handle_error(e);
        }
    }

    fn continue_task(&mut self, task: Task) -> Result<()> {
        match task {
            Task::GetKey => match self.keybuf.pop() {
                Some(key) => self.push_lift(Val::Real(key.getkey_code() as f64)),
                None => {
                    self.task = Some(Task::GetKey);
                    Err(error!(Interruptible))
                }
            },
            Task::PrUsr(index) => self.print_user_var(index),
        }
    }

    /// Executes the instruction at pc.
    pub(super) fn step(&mut self) -> Result<()> {
        let pc = self.pc.unwrap_or(0);
        let prgm = self.prgm;
        let (instr, next, target) = self
            .programs
            .get_mut(prgm)
            .ok_or_else(|| error!(InternalError; "NO SUCH PROGRAM"))?
            .get_next_command(pc, true);
        self.oldpc = Some(pc);
        self.pc = Some(next);
        trace!("{:>3}:{:<5} {}", prgm, pc, instr);
        if self.tracing() && !instr.is_end() {
            self.print_trace(&instr);
        }
        self.run_command(&instr, target)
    }

    pub(super) fn tracing(&self) -> bool {
        self.flags.get(PRINT_TRACE) && self.flags.get(PRINTER_ENABLE) && self.flags.get(PRINTER_EXISTS)
    }

    /// Halts the program and drops any unfinished task.
    pub(super) fn stop(&mut self) {
        if self.running {
            debug!("stopped at {}:{:?}", self.prgm, self.pc);
        }
        self.running = false;
        self.task = None;
        if self.deferred_print {
            self.deferred_print = false;
            if let Err(e) = self.print_x() {
                self.errors.push(e);
            }
        }
    }

    /// Routes an error or pseudo-error raised by a command.
    pub fn handle_error(&mut self, err: Error) {
        use ErrorCode::*;
        if err.is(Yes) || err.is(Run) || err.is(Interruptible) {
            return;
        }
        if err.is(No) {
            if self.running {
                self.skip_next();
            }
            return;
        }
        if err.is(Stop) {
            self.stop();
            return;
        }
        if self.running {
            if self.flags.get(ERROR_IGNORE) {
                self.flags.set(ERROR_IGNORE, false);
                self.lasterr = err.code();
                debug!("error ignored: {}", err);
                return;
            }
            if err.is_solver_trappable() && self.solve_active() {
                debug!("solver absorbs {}", err);
                let result = self
                    .unwind_to_solve()
                    .and_then(|stop| self.return_to_solve(true, stop));
                if let Err(e) = result {
                    self.handle_error(e);
                }
                return;
            }
            self.pc = self.oldpc;
            self.stop();
        }
        self.task = None;
        self.lasterr = err.code();
        debug!("error: {}", err);
        self.errors.push(err);
    }

    /// A false test skips the next line; never past END.
    pub(super) fn skip_next(&mut self) {
        if let (Some(pc), Some(p)) = (self.pc, self.programs.get(self.prgm)) {
            if pc < p.end_pc() {
                self.pc = Some(p.next(pc));
            }
        }
    }

    pub fn push_rtn_addr(&mut self, owner: Owner, pc: Option<Address>) -> Result<()> {
        let frame = Frame::new(owner, pc, self.flags.get(STACK_LIFT_DISABLE));
        self.rtns.push(frame)?;
        trace!("push {:?} depth {}", owner, self.rtns.len());
        Ok(())
    }

    /// Pops one frame, purging the callee's locals and bringing back a
    /// matrix editor parked in it. `None` when the stack is empty.
    pub fn pop_rtn_addr(&mut self) -> Result<Option<(Owner, Option<Address>, bool)>> {
        let level = self.level();
        let frame = match self.rtns.last() {
            Some(f) => f.clone(),
            None => return Ok(None),
        };
        if frame.matedit {
            self.restore_matedit(level)?;
        }
        self.rtns.pop()?;
        self.vars.purge_from_level(level);
        self.check_matedit();
        self.flags.set(STACK_LIFT_DISABLE, frame.stack_lift_disable);
        trace!("pop {:?} depth {}", frame.owner, self.rtns.len());
        Ok(Some((frame.owner, frame.pc, frame.stop)))
    }

    /// RTN, END and the RTNYES/RTNNO variants.
    pub fn rtn(&mut self, status: RtnStatus) -> Result<()> {
        if !self.running {
            self.clear_all_rtns();
            self.pc = None;
            return Ok(());
        }
        if self.rtns.last().map_or(false, |f| f.func) {
            self.func_return()?;
        }
        match self.pop_rtn_addr()? {
            None => {
                self.vars.purge_from_level(0);
                self.check_matedit();
                let end = self.programs.get(self.prgm).map(|p| p.end_pc());
                if let (Some(pc), Some(end)) = (self.pc, end) {
                    if pc > end {
                        self.pc = None;
                    }
                }
                Err(error!(Stop))
            }
            Some((Owner::Solve, _, _)) => self.return_to_solve(false, false),
            Some((Owner::Integ, _, _)) => self.return_to_integ(false),
            Some((Owner::Program(prgm), pc, stop)) => {
                self.prgm = prgm;
                self.pc = pc;
                if status == RtnStatus::No {
                    self.skip_next();
                }
                if stop {
                    Err(error!(Stop))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Returns from the current subroutine and raises `err` at the
    /// caller's XEQ. Numeric errors inside a solved function go back to
    /// the solver as a failed sample instead.
    pub fn rtn_with_error(&mut self, err: Error) -> Result<()> {
        if err.is_solver_trappable() && self.solve_active() {
            let stop = self.unwind_to_solve()?;
            return self.return_to_solve(true, stop);
        }
        if self.rtns.last().map_or(false, |f| f.func) {
            self.func_discard()?;
        }
        if let Some((Owner::Program(prgm), pc, _)) = self.pop_rtn_addr()? {
            self.prgm = prgm;
            self.pc = pc;
            self.oldpc = match (pc, self.programs.get(prgm)) {
                (Some(pc), Some(p)) => p.prev(pc),
                _ => None,
            };
        }
        Err(err)
    }

    /// Pops frames up to and including the innermost solver frame.
    /// Returns whether any of them asked to stop.
    pub(super) fn unwind_to_solve(&mut self) -> Result<bool> {
        let mut stop = false;
        loop {
            if self.rtns.last().map_or(false, |f| f.func) {
                self.func_discard()?;
            }
            match self.pop_rtn_addr()? {
                None => return Err(error!(SolveIntegRtnLost)),
                Some((Owner::Solve, _, s)) => return Ok(stop || s),
                Some((_, _, s)) => stop |= s,
            }
        }
    }

    /// Forgets every return. Callers' stack modes come back, their
    /// stacks do not.
    pub fn clear_all_rtns(&mut self) {
        while !self.rtns.is_empty() {
            let level = self.level();
            if self.rtns.last().map_or(false, |f| f.func) {
                self.func_abandon(level);
            }
            if self.rtns.pop().is_err() {
                break;
            }
            self.vars.purge_from_level(level);
        }
        self.vars.purge_from_level(0);
        self.check_matedit();
    }

    pub fn solve_active(&self) -> bool {
        self.rtns.iter().any(|f| f.owner == Owner::Solve)
    }

    pub fn integ_active(&self) -> bool {
        self.rtns.iter().any(|f| f.owner == Owner::Integ)
    }

    /// Pushes onto the stack, or overwrites X when stack lift is
    /// disabled.
    pub(super) fn push_lift(&mut self, val: Val) -> Result<()> {
        if self.flags.get(STACK_LIFT_DISABLE) {
            self.stack.set_x(val)
        } else {
            self.stack.push(val)
        }
    }

    /// xorshift128+ over the persisted seed pair.
    pub(super) fn random(&mut self) -> f64 {
        let (mut s1, s0) = self.rng;
        let result = s0.wrapping_add(s1);
        s1 ^= s1 << 23;
        self.rng = (s0, s1 ^ s0 ^ (s1 >> 18) ^ (s0 >> 5));
        (result >> 11) as f64 / (1u64 << 53) as f64
    }

    pub(super) fn seed(&mut self, x: f64) {
        let bits = x.abs().to_bits();
        self.rng = (bits ^ 0x9E37_79B9_7F4A_7C15, bits.rotate_left(32) | 1);
    }

    /// One line from the host. Commands execute, or in program mode are
    /// inserted after the current line. Returns false when the line was
    /// rejected; the error comes back from the next `execute`.
    pub fn enter(&mut self, line: &str) -> bool {
        let line = line.trim();
        if self.input.is_some() {
            return self.finish_input(line);
        }
        if let Err(e) = self.finish_entry() {
            self.handle_error(e);
            return false;
        }
        let word = line.to_ascii_uppercase();
        match word.as_str() {
            "PRGM" => {
                self.toggle_prgm_mode();
                return true;
            }
            "R/S" => {
                self.run_stop();
                return true;
            }
            "EXIT" => {
                self.exit();
                return true;
            }
            _ => {}
        }
        let parsed = match self.pending.take() {
            Some(op) => {
                self.cmdline.clear();
                parse_arg_for(op, line)
            }
            None => parse(line),
        };
        match parsed {
            Ok(Parsed::Empty) => true,
            Ok(Parsed::Pending(op)) => {
                self.pending = Some(op);
                true
            }
            Ok(Parsed::Complete(instr)) => {
                self.enter_instruction(instr);
                true
            }
            Err(e) => {
                self.handle_error(e);
                false
            }
        }
    }

    /// Runs or inserts one complete instruction.
    pub(super) fn enter_instruction(&mut self, instr: Instruction) {
        let op = instr.opcode;
        let immediate = op.is_immediate() || matches!(op, Opcode::Sst | Opcode::Bst);
        if self.prgm_mode && !immediate {
            if let Err(e) = self.insert_instruction(&instr) {
                self.handle_error(e);
            }
        } else {
            self.execute_immediate(&instr);
        }
    }

    fn execute_immediate(&mut self, instr: &Instruction) {
        if self.running {
            self.handle_error(error!(RestrictedOperation; "PROGRAM RUNNING"));
            return;
        }
        let op = instr.opcode;
        if op.is_program_only() && !matches!(op, Opcode::Del) {
            self.handle_error(error!(RestrictedOperation));
            return;
        }
        self.deferred_print = self.tracing();
        let result = match op {
            Opcode::Sst if !self.prgm_mode => self.single_step(),
            _ => self.run_command(instr, Target::None),
        };
        match result {
            Ok(()) => {}
            Err(e) if e.is(ErrorCode::Yes) => self.message = Some("Yes".to_string()),
            Err(e) if e.is(ErrorCode::No) => self.message = Some("No".to_string()),
            Err(e) if e.is(ErrorCode::Run) => self.running = true,
            Err(e) => self.handle_error(e),
        }
        if !self.running && self.task.is_none() {
            self.stop();
        }
    }

    /// SST outside program mode: runs one line, following XEQ into the
    /// subroutine.
    fn single_step(&mut self) -> Result<()> {
        self.running = true;
        let result = self.step();
        let keep_running = matches!(&result, Err(e) if e.is(ErrorCode::Run));
        if let Err(e) = result {
            self.handle_error(e);
        }
        if !keep_running && self.task.is_none() {
            self.running = false;
        }
        Ok(())
    }

    fn finish_input(&mut self, line: &str) -> bool {
        if line.eq_ignore_ascii_case("EXIT") {
            self.input = None;
            return true;
        }
        let input = match self.input.take() {
            Some(i) => i,
            None => return false,
        };
        let result = self.complete_input(&input, line);
        match result {
            Ok(()) => {
                self.running = true;
                true
            }
            Err(e) => {
                self.input = Some(input);
                self.handle_error(e);
                false
            }
        }
    }

    fn complete_input(&mut self, input: &InputPrompt, line: &str) -> Result<()> {
        if !line.is_empty() {
            let val = match parse(line)? {
                Parsed::Complete(Instruction {
                    opcode: Opcode::Number,
                    arg: Arg::Number { value, .. },
                }) => Val::Real(value),
                Parsed::Complete(Instruction {
                    arg: Arg::Str(s), ..
                })
                | Parsed::Complete(Instruction {
                    arg: Arg::XStr(s), ..
                }) => Val::string(&s)?,
                _ => return Err(error!(InvalidData)),
            };
            self.stack.set_x(val)?;
        }
        let x = self.stack.x()?.clone();
        self.store(&input.arg, x)?;
        self.flags.set(STACK_LIFT_DISABLE, false);
        Ok(())
    }

    /// R/S: in program mode inserts STOP, otherwise starts the program
    /// at pc or stops it.
    pub fn run_stop(&mut self) {
        if self.running {
            self.stop();
            return;
        }
        if self.prgm_mode {
            if let Err(e) = self.insert_instruction(&Instruction::plain(Opcode::Stop)) {
                self.handle_error(e);
            }
            return;
        }
        if let Err(e) = self.finish_entry() {
            self.handle_error(e);
            return;
        }
        self.input = None;
        debug!("run from {}:{:?}", self.prgm, self.pc);
        self.running = true;
    }

    /// EXIT: stops a program, cancels a pending command or leaves
    /// program mode.
    pub fn exit(&mut self) {
        if self.running {
            self.stop();
        } else if self.pending.is_some() {
            self.pending = None;
            self.cmdline.clear();
        } else if self.prgm_mode {
            self.prgm_mode = false;
        } else {
            self.matedit = None;
        }
    }

    pub fn toggle_prgm_mode(&mut self) {
        if let Err(e) = self.finish_entry() {
            self.handle_error(e);
        }
        self.pending = None;
        self.cmdline.clear();
        self.prgm_mode = !self.prgm_mode;
        debug!("program mode {}", self.prgm_mode);
    }

    /// Inserts `instr` after the current line and makes it current. At
    /// the END the new line goes in front of it.
    pub fn insert_instruction(&mut self, instr: &Instruction) -> Result<()> {
        if !instr.opcode.is_programmable() {
            return Err(error!(RestrictedOperation));
        }
        let p = self
            .programs
            .get(self.prgm)
            .ok_or_else(|| error!(InternalError; "NO SUCH PROGRAM"))?;
        let at = match self.pc {
            None => 0,
            Some(pc) if pc >= p.end_pc() => p.end_pc(),
            Some(pc) => p.next(pc),
        };
        self.programs.insert(self.prgm, at, instr)?;
        self.clear_all_rtns();
        self.pc = Some(at);
        Ok(())
    }

    /// Deletes the current line; the line before it becomes current.
    pub fn delete_line(&mut self) -> Result<bool> {
        let pc = match self.pc {
            Some(pc) => pc,
            None => return Ok(false),
        };
        let deleted = self.programs.delete(self.prgm, pc)?;
        self.clear_all_rtns();
        if deleted {
            self.pc = self.programs.get(self.prgm).and_then(|p| p.prev(pc));
        }
        Ok(deleted)
    }

    /// Moves to the next line, wrapping from END to line 00.
    pub(super) fn next_line(&mut self) {
        if let Some(p) = self.programs.get(self.prgm) {
            self.pc = match self.pc {
                None => Some(0),
                Some(pc) if pc >= p.end_pc() => None,
                Some(pc) => Some(p.next(pc)),
            };
        }
    }

    /// Moves to the previous line, wrapping from line 00 to END.
    pub(super) fn prev_line(&mut self) {
        if let Some(p) = self.programs.get(self.prgm) {
            self.pc = match self.pc {
                None => Some(p.end_pc()),
                Some(pc) => p.prev(pc),
            };
        }
    }

    /// `GTO ..`
    pub(super) fn goto_new_program(&mut self) -> Result<()> {
        let prgm = self.programs.new_program()?;
        self.clear_all_rtns();
        self.prgm = prgm;
        self.pc = None;
        Ok(())
    }

    /// `GTO .` to a line number or a global label.
    pub(super) fn goto_dot(&mut self, arg: &Arg) -> Result<()> {
        match arg {
            Arg::Num(line) => {
                let p = self
                    .programs
                    .get(self.prgm)
                    .ok_or_else(|| error!(InternalError; "NO SUCH PROGRAM"))?;
                self.pc = match *line as usize {
                    0 => None,
                    n => Some(p.pc_of_line(n).unwrap_or_else(|| p.end_pc())),
                };
            }
            Arg::Str(name) => {
                let (prgm, pc) = self
                    .programs
                    .find_global_label(name)
                    .ok_or_else(|| error!(LabelNotFound))?;
                self.prgm = prgm;
                self.pc = Some(pc);
            }
            _ => return Err(error!(InvalidData)),
        }
        self.clear_all_rtns();
        Ok(())
    }

    /// `CLP`: removes the program holding a global label.
    pub(super) fn clear_program(&mut self, name: &[u8]) -> Result<()> {
        let (prgm, _) = self
            .programs
            .find_global_label(name)
            .ok_or_else(|| error!(LabelNotFound))?;
        self.programs.clear_program(prgm)?;
        self.clear_all_rtns();
        if self.prgm == prgm {
            self.prgm = prgm.min(self.programs.len().saturating_sub(1));
            self.pc = None;
        } else if self.prgm > prgm {
            self.prgm -= 1;
        }
        debug!("cleared program {}", prgm);
        Ok(())
    }
}
