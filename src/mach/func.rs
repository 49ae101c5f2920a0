use super::flags::ERROR_IGNORE;
use super::var::{HIDDEN, PRIVATE};
use super::{Runtime, Val};
use crate::error;
use crate::lang::Error;
use log::{debug, warn};

type Result<T> = std::result::Result<T, Error>;

/// Private local holding what FUNC or L4STK/LNSTK saved for the caller.
const PACKAGE: &[u8] = b"\x02FUNC";

/// The caller's side of a FUNC call.
struct Saved {
    big: bool,
    /// `None` for the mode-only save of L4STK and LNSTK.
    stack: Option<Vec<Val>>,
    lastx: Val,
    inputs: usize,
    outputs: usize,
    error_ignore: bool,
}

fn real(v: &Val) -> Result<f64> {
    v.as_real()
        .map_err(|_| error!(InternalError; "BAD FUNC PACKAGE"))
}

impl Saved {
    fn pack(&self) -> Val {
        let mut items = vec![Val::Real(self.big as u8 as f64)];
        if let Some(stack) = &self.stack {
            items.push(Val::list(stack.clone()));
            items.push(self.lastx.clone());
            items.push(Val::Real(self.inputs as f64));
            items.push(Val::Real(self.outputs as f64));
            items.push(Val::Real(self.error_ignore as u8 as f64));
        }
        Val::list(items)
    }

    fn unpack(val: &Val) -> Result<Saved> {
        let items = match val {
            Val::List(items) => items,
            _ => return Err(error!(InternalError; "BAD FUNC PACKAGE")),
        };
        let big = match items.first() {
            Some(v) => real(v)? != 0.0,
            None => return Err(error!(InternalError; "BAD FUNC PACKAGE")),
        };
        if items.len() == 1 {
            return Ok(Saved {
                big,
                stack: None,
                lastx: Val::Real(0.0),
                inputs: 0,
                outputs: 0,
                error_ignore: false,
            });
        }
        if items.len() != 6 {
            return Err(error!(InternalError; "BAD FUNC PACKAGE"));
        }
        let stack = match &items[1] {
            Val::List(s) => s.to_vec(),
            _ => return Err(error!(InternalError; "BAD FUNC PACKAGE")),
        };
        Ok(Saved {
            big,
            stack: Some(stack),
            lastx: items[2].clone(),
            inputs: real(&items[3])? as usize,
            outputs: real(&items[4])? as usize,
            error_ignore: real(&items[5])? != 0.0,
        })
    }
}

impl Runtime {
    /// `FUNC ab`: a inputs, b outputs. The caller's stack is saved and
    /// the callee starts with just its inputs.
    pub(super) fn func(&mut self, n: u32) -> Result<()> {
        match self.rtns.last() {
            None => return Err(error!(InvalidContext)),
            Some(f) if f.func => return Err(error!(InvalidContext)),
            Some(_) => {}
        }
        let (inputs, outputs) = ((n / 10) as usize, (n % 10) as usize);
        if self.stack.depth() < inputs {
            return Err(error!(StackDepthError));
        }
        let big = self.stack.is_big();
        let snapshot = self.stack.values().to_vec();
        let saved = Saved {
            big,
            stack: Some(snapshot.clone()),
            lastx: self.lastx.clone(),
            inputs,
            outputs,
            error_ignore: self.flags.get(ERROR_IGNORE),
        };
        let level = self.level();
        self.vars
            .store_local(PACKAGE, saved.pack(), level, PRIVATE | HIDDEN)?;
        if let Some(f) = self.rtns.last_mut() {
            f.func = true;
        }
        let args = snapshot[snapshot.len() - inputs..].to_vec();
        self.stack.install(big, args)?;
        debug!("FUNC {}{} at level {}", inputs, outputs, level);
        Ok(())
    }

    /// `L4STK` / `LNSTK`: switch modes for this call only.
    pub(super) fn save_stack_mode(&mut self, big: bool) -> Result<()> {
        let frame_func = match self.rtns.last() {
            None => return Err(error!(InvalidContext)),
            Some(f) => f.func,
        };
        if !frame_func {
            let saved = Saved {
                big: self.stack.is_big(),
                stack: None,
                lastx: Val::Real(0.0),
                inputs: 0,
                outputs: 0,
                error_ignore: false,
            };
            let level = self.level();
            self.vars
                .store_local(PACKAGE, saved.pack(), level, PRIVATE | HIDDEN)?;
            if let Some(f) = self.rtns.last_mut() {
                f.func = true;
            }
        }
        self.stack.set_big(big)
    }

    fn take_package(&mut self, level: i32) -> Result<Saved> {
        let var = self
            .vars
            .purge(PACKAGE, level)
            .ok_or_else(|| error!(InternalError; "FUNC PACKAGE LOST"))?;
        Saved::unpack(&var.value)
    }

    /// Normal return from a FUNC frame: the caller gets its stack back
    /// with the inputs replaced by the outputs.
    pub(super) fn func_return(&mut self) -> Result<()> {
        let level = self.level();
        let saved = self.take_package(level)?;
        let mut stack = match saved.stack {
            None => return self.stack.set_big(saved.big),
            Some(s) => s,
        };
        let vals = self.stack.values();
        let have = vals.len().min(saved.outputs);
        let mut results = vec![Val::Real(0.0); saved.outputs - have];
        results.extend_from_slice(&vals[vals.len() - have..]);
        let input_x = stack.last().cloned();
        stack.truncate(stack.len() - saved.inputs);
        stack.extend(results);
        self.stack.install(saved.big, stack)?;
        self.lastx = match input_x {
            Some(x) if saved.inputs > 0 => x,
            _ => saved.lastx,
        };
        self.flags.set(ERROR_IGNORE, saved.error_ignore);
        debug!("FUNC return at level {}", level);
        Ok(())
    }

    /// Return by error: the caller's stack comes back untouched.
    pub(super) fn func_discard(&mut self) -> Result<()> {
        let level = self.level();
        let saved = self.take_package(level)?;
        match saved.stack {
            None => self.stack.set_big(saved.big),
            Some(stack) => {
                self.lastx = saved.lastx;
                self.flags.set(ERROR_IGNORE, saved.error_ignore);
                self.stack.install(saved.big, stack)
            }
        }
    }

    /// The frame is being dropped without returning; only the caller's
    /// stack mode is restored.
    pub(super) fn func_abandon(&mut self, level: i32) {
        let result = self.take_package(level).and_then(|saved| self.stack.set_big(saved.big));
        if let Err(e) = result {
            warn!("abandoning FUNC frame at level {}: {}", level, e);
        }
    }
}
