use super::flags::{PRINTER_ENABLE, PRINTER_EXISTS};
use super::format::format_val;
use super::runtime::Task;
use super::val::Cell;
use super::{Runtime, Val};
use crate::error;
use crate::lang::{Error, Instruction};
use log::warn;

type Result<T> = std::result::Result<T, Error>;

const STACK_NAMES: [&str; 4] = ["X", "Y", "Z", "T"];

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Number(x) => format!("{}", x),
        Cell::Text(t) => format!("\"{}\"", t),
    }
}

impl Runtime {
    /// `Ok(false)` when a running program has the printer switched off.
    fn printer_ready(&self) -> Result<bool> {
        if !self.flags.get(PRINTER_EXISTS) {
            return Err(error!(PrintingIsDisabled));
        }
        Ok(!self.running || self.flags.get(PRINTER_ENABLE))
    }

    fn emit(&mut self, line: &str) {
        self.shell.print_lines(line.as_bytes(), false);
    }

    fn value_lines(&self, label: &str, val: &Val) -> Vec<String> {
        match val {
            Val::RealMatrix(m) => {
                let mut lines = vec![format!("{}=[{}×{} Matrix]", label, m.rows(), m.cols())];
                for i in 0..m.rows() {
                    for j in 0..m.cols() {
                        if let Some(c) = m.get(i, j) {
                            lines.push(format!("{}:{}={}", i + 1, j + 1, cell_text(c)));
                        }
                    }
                }
                lines
            }
            Val::ComplexMatrix(m) => {
                let mut lines = vec![format!("{}=[{}×{} Cpx Matrix]", label, m.rows(), m.cols())];
                for i in 0..m.rows() {
                    for j in 0..m.cols() {
                        if let Some((re, im)) = m.get(i, j) {
                            let v = format_val(&Val::Complex(re, im), &self.flags);
                            lines.push(format!("{}:{}={}", i + 1, j + 1, v));
                        }
                    }
                }
                lines
            }
            Val::List(items) => {
                let mut lines = vec![format!("{}={{ {}-Elem List }}", label, items.len())];
                for (k, item) in items.iter().enumerate() {
                    lines.push(format!("{}={}", k + 1, format_val(item, &self.flags)));
                }
                lines
            }
            other => vec![format!("{}={}", label, format_val(other, &self.flags))],
        }
    }

    /// `PRX`
    pub(super) fn print_x(&mut self) -> Result<()> {
        if !self.printer_ready()? {
            return Ok(());
        }
        let x = self.stack.x()?.clone();
        for line in self.value_lines("X", &x) {
            self.emit(&line);
        }
        Ok(())
    }

    /// `PRV "NAME"`
    pub(super) fn print_var(&mut self, name: &[u8]) -> Result<()> {
        if !self.printer_ready()? {
            return Ok(());
        }
        let val = self
            .vars
            .recall(name, self.level())
            .cloned()
            .ok_or_else(|| error!(Nonexistent))?;
        for line in self.value_lines(&String::from_utf8_lossy(name), &val) {
            self.emit(&line);
        }
        Ok(())
    }

    /// `PRSTK`: deepest level first, X last.
    pub(super) fn print_stack(&mut self) -> Result<()> {
        if !self.printer_ready()? {
            return Ok(());
        }
        let mut lines = vec![];
        for depth in (0..self.stack.depth()).rev() {
            let label = match STACK_NAMES.get(depth) {
                Some(n) => n.to_string(),
                None => format!("{}", depth + 1),
            };
            if let Some(v) = self.stack.get(depth) {
                lines.push(format!("{}={}", label, format_val(v, &self.flags)));
            }
        }
        for line in lines {
            self.emit(&line);
        }
        Ok(())
    }

    /// `PRA`
    pub(super) fn print_alpha(&mut self) -> Result<()> {
        if !self.printer_ready()? {
            return Ok(());
        }
        let alpha = self.alpha.clone();
        self.shell.print_lines(&alpha, false);
        Ok(())
    }

    /// `ADV` and other one-line output.
    pub(super) fn print_text(&mut self, text: &str) -> Result<()> {
        if !self.printer_ready()? {
            return Ok(());
        }
        self.emit(text);
        Ok(())
    }

    /// `PRUSR`, one variable per tick so a long catalog can be
    /// interrupted.
    pub(super) fn print_user_var(&mut self, index: usize) -> Result<()> {
        if !self.printer_ready()? {
            return Ok(());
        }
        let level = self.level();
        let var = match self.vars.visible(level).nth(index) {
            Some(v) => (String::from_utf8_lossy(&v.name).into_owned(), v.value.clone()),
            None => return Ok(()),
        };
        for line in self.value_lines(&var.0, &var.1) {
            self.emit(&line);
        }
        self.task = Some(Task::PrUsr(index + 1));
        Ok(())
    }

    /// Trace printing of the line about to run.
    pub(super) fn print_trace(&mut self, instr: &Instruction) {
        if let Err(e) = self.print_text(&instr.to_string()) {
            warn!("trace: {}", e);
        }
    }
}
