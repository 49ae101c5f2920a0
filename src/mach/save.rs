use super::runtime::Task;
use super::val::{Cell, Shared};
use super::var::PRIVATE;
use super::{Address, Runtime, Val};
use crate::error;
use crate::lang::{codec, Error, Instruction, Opcode};
use log::{debug, info};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::io::Write;

type Result<T> = std::result::Result<T, Error>;

pub const MAGIC: &[u8; 4] = b"RPNE";
/// Layout written by `save`.
pub const CURRENT_VERSION: u32 = 47;
/// Oldest layout `load` accepts.
pub const MIN_VERSION: u32 = 26;

/// Breakpoints in the layout; see `load`.
pub(super) const V_SEED_PAIR: u32 = 30;
pub(super) const V_LONG_STRINGS: u32 = 33;
pub(super) const V_LEVELS: u32 = 42;
pub(super) const V_SHARED: u32 = 47;

/// Stack depth of every layout before `V_SHARED`.
pub(super) const FOUR_LEVELS: usize = 4;

/// Numeric family byte: binary doubles.
pub(super) const BINARY_DOUBLE: u8 = 0;

pub(super) const NO_PENDING: u16 = 0xFFFF;
/// Index written after the zero count of an empty list.
pub(super) const EMPTY_LIST: u32 = u32::MAX;

pub(super) const TASK_NONE: u8 = 0;
pub(super) const TASK_GETKEY: u8 = 1;
pub(super) const TASK_PRUSR: u8 = 2;

pub(super) const MODE_RUNNING: u8 = 1;
pub(super) const MODE_PRGM: u8 = 2;

pub(super) const PRGM_LOCKED: u8 = 1;
pub(super) const PRGM_LCLBL_INVALID: u8 = 2;

pub(super) const CELL_NUMBER: u8 = 0;
pub(super) const CELL_SHORT: u8 = 1;
pub(super) const CELL_LONG: u8 = 2;

/// Big-endian field writer for one layout version.
struct Writer<'a, W: Write> {
    w: &'a mut W,
    version: u32,
    /// Backing array identity to dedup index.
    shared: HashMap<usize, u32>,
}

impl<'a, W: Write> Writer<'a, W> {
    fn bytes(&mut self, b: &[u8]) -> Result<()> {
        self.w.write_all(b)?;
        Ok(())
    }

    fn u8(&mut self, n: u8) -> Result<()> {
        self.bytes(&[n])
    }

    fn bool(&mut self, b: bool) -> Result<()> {
        self.u8(b as u8)
    }

    fn u16(&mut self, n: u16) -> Result<()> {
        self.bytes(&n.to_be_bytes())
    }

    fn u32(&mut self, n: u32) -> Result<()> {
        self.bytes(&n.to_be_bytes())
    }

    fn i32(&mut self, n: i32) -> Result<()> {
        self.bytes(&n.to_be_bytes())
    }

    fn u64(&mut self, n: u64) -> Result<()> {
        self.bytes(&n.to_be_bytes())
    }

    fn f64(&mut self, x: f64) -> Result<()> {
        self.bytes(&x.to_bits().to_be_bytes())
    }

    fn count(&mut self, n: usize) -> Result<()> {
        let n = u32::try_from(n).map_err(|_| error!(InsufficientMemory))?;
        self.u32(n)
    }

    /// Byte-length prefixed; names, ALPHA and the other short buffers.
    fn short(&mut self, b: &[u8]) -> Result<()> {
        let n = u8::try_from(b.len()).map_err(|_| error!(InvalidData; "FIELD TOO LONG"))?;
        self.u8(n)?;
        self.bytes(b)
    }

    /// String values: u32 length from v33, a byte before.
    fn text(&mut self, b: &[u8]) -> Result<()> {
        if self.version >= V_LONG_STRINGS {
            self.count(b.len())?;
            self.bytes(b)
        } else {
            self.short(&b[..b.len().min(255)])
        }
    }

    fn pc(&mut self, pc: Option<Address>) -> Result<()> {
        match pc {
            None => self.i32(-1),
            Some(pc) => {
                let pc = i32::try_from(pc).map_err(|_| error!(InternalError; "PC"))?;
                self.i32(pc)
            }
        }
    }

    /// Writes the count of an array and returns whether its contents
    /// follow. From v47 an array already written elsewhere is just a
    /// reference: 0 and its index.
    fn array_head<T>(&mut self, s: &Shared<T>, count: usize) -> Result<bool> {
        let n = i32::try_from(count).map_err(|_| error!(InsufficientMemory))?;
        if self.version < V_SHARED {
            self.i32(n)?;
            return Ok(true);
        }
        if count == 0 {
            self.i32(0)?;
            self.u32(EMPTY_LIST)?;
            return Ok(false);
        }
        if !s.is_shared() {
            self.i32(n)?;
            return Ok(true);
        }
        if let Some(&index) = self.shared.get(&s.key()) {
            self.i32(0)?;
            self.u32(index)?;
            return Ok(false);
        }
        let index = self.shared.len() as u32;
        self.shared.insert(s.key(), index);
        self.i32(-n)?;
        Ok(true)
    }

    fn cell(&mut self, cell: &Cell) -> Result<()> {
        if self.version >= V_LONG_STRINGS {
            match cell {
                Cell::Number(x) => {
                    self.u8(CELL_NUMBER)?;
                    self.f64(*x)
                }
                Cell::Text(t) if t.is_short() => {
                    self.u8(CELL_SHORT)?;
                    self.short(t.as_bytes())
                }
                Cell::Text(t) => {
                    self.u8(CELL_LONG)?;
                    self.count(t.len())?;
                    self.bytes(t.as_bytes())
                }
            }
        } else {
            match cell {
                Cell::Number(x) => {
                    self.bool(false)?;
                    self.f64(*x)
                }
                Cell::Text(t) => {
                    self.bool(true)?;
                    let b = t.as_bytes();
                    self.short(&b[..b.len().min(super::val::SHORT_TEXT)])
                }
            }
        }
    }

    fn val(&mut self, v: &Val) -> Result<()> {
        self.u8(v.type_code())?;
        match v {
            Val::Null => Ok(()),
            Val::Real(x) => self.f64(*x),
            Val::Complex(re, im) => {
                self.f64(*re)?;
                self.f64(*im)
            }
            Val::Str(t) => self.text(t.as_bytes()),
            Val::RealMatrix(m) => {
                if self.array_head(m, m.rows())? {
                    self.i32(m.cols() as i32)?;
                    for c in m.cells() {
                        self.cell(c)?;
                    }
                }
                Ok(())
            }
            Val::ComplexMatrix(m) => {
                if self.array_head(m, m.rows())? {
                    self.i32(m.cols() as i32)?;
                    for &(re, im) in m.data() {
                        self.f64(re)?;
                        self.f64(im)?;
                    }
                }
                Ok(())
            }
            Val::List(l) => {
                if self.version < V_LEVELS {
                    return Err(error!(InvalidType; "LIST IN OLD LAYOUT"));
                }
                if self.array_head(l, l.len())? {
                    for item in l.iter() {
                        self.val(item)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl Runtime {
    /// Writes the whole machine in the current layout.
    pub fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        self.save_as(w, CURRENT_VERSION)
    }

    /// Writes the machine in an older layout. Whatever that layout
    /// cannot hold is dropped or refused.
    pub fn save_as<W: Write>(&self, w: &mut W, version: u32) -> Result<()> {
        if !(MIN_VERSION..=CURRENT_VERSION).contains(&version) {
            return Err(error!(InvalidData; "NO SUCH STATE VERSION"));
        }
        let mut out = Writer {
            w,
            version,
            shared: HashMap::new(),
        };
        out.bytes(MAGIC)?;
        out.u32(version)?;
        let platform = self.shell.platform();
        out.bytes(platform.replace('\0', " ").as_bytes())?;
        out.u8(0)?;
        out.u8(BINARY_DOUBLE)?;
        self.save_body(&mut out)?;
        out.bytes(MAGIC)?;
        out.u32(version)?;
        out.w.flush()?;
        info!(
            "saved state v{}, {} programs, {} variables, {} shared arrays",
            version,
            self.programs.len(),
            self.vars.len(),
            out.shared.len()
        );
        Ok(())
    }

    fn save_body<W: Write>(&self, out: &mut Writer<'_, W>) -> Result<()> {
        let mut mode = 0;
        if self.running {
            mode |= MODE_RUNNING;
        }
        if self.prgm_mode {
            mode |= MODE_PRGM;
        }
        out.u8(mode)?;
        match self.task {
            None => out.u8(TASK_NONE)?,
            Some(Task::GetKey) => out.u8(TASK_GETKEY)?,
            Some(Task::PrUsr(i)) => {
                out.u8(TASK_PRUSR)?;
                out.count(i)?;
            }
        }

        out.bool(self.entry.is_some())?;
        if let Some(e) = &self.entry {
            out.short(e.text().as_bytes())?;
        }
        out.u16(self.pending.map_or(NO_PENDING, Opcode::code))?;
        out.short(self.cmdline.as_bytes())?;

        out.bool(self.matedit.is_some())?;
        if let Some(me) = &self.matedit {
            out.bool(me.edit)?;
            out.short(&me.name)?;
            out.i32(me.level)?;
            out.count(me.i)?;
            out.count(me.j)?;
            if out.version >= V_LEVELS {
                out.count(me.path.len())?;
                for &k in &me.path {
                    out.count(k)?;
                }
            }
        }

        out.bool(self.input.is_some())?;
        if let Some(input) = &self.input {
            let bytes = codec::encode(&Instruction::new(Opcode::Input, input.arg.clone()))?;
            out.count(bytes.len())?;
            out.bytes(&bytes)?;
            out.short(input.label.as_bytes())?;
        }

        out.u16(self.lasterr)?;
        if out.version >= V_SEED_PAIR {
            out.u64(self.rng.0)?;
            out.u64(self.rng.1)?;
        } else {
            out.f64((self.rng.1 >> 11) as f64 / (1u64 << 53) as f64)?;
        }
        out.bool(self.deferred_print)?;

        out.u8(self.keybuf.len() as u8)?;
        for key in self.keybuf.iter() {
            out.bool(key.shift)?;
            out.u8(key.code)?;
        }
        out.bytes(self.display.bits())?;

        self.save_core(out)?;
        self.save_solve(out)?;
        self.save_integ(out)
    }

    fn save_core<W: Write>(&self, out: &mut Writer<'_, W>) -> Result<()> {
        out.count(self.prgm)?;
        out.pc(self.pc)?;
        if out.version >= V_SHARED {
            out.bool(self.stack.is_big())?;
        } else if self.stack.is_big() {
            debug!("v{} has no big stack, saving the top four levels", out.version);
        }
        let vals = self.stack.values();
        if out.version >= V_SHARED {
            out.count(vals.len())?;
            for v in vals {
                out.val(v)?;
            }
        } else {
            // exactly four levels, zeros below a shallow big stack
            let keep = vals.len().min(FOUR_LEVELS);
            out.count(FOUR_LEVELS)?;
            for _ in keep..FOUR_LEVELS {
                out.val(&Val::Real(0.0))?;
            }
            for v in &vals[vals.len() - keep..] {
                out.val(v)?;
            }
        }
        out.val(&self.lastx)?;
        out.short(&self.alpha)?;

        let flags = self.flags.as_slice();
        out.u8(flags.len() as u8)?;
        for &f in flags {
            out.bool(f)?;
        }

        // layouts without levels have no place for per-frame packages
        let leveled = out.version >= V_LEVELS;
        let vars: Vec<_> = self
            .vars
            .iter()
            .filter(|v| leveled || v.flags & PRIVATE == 0)
            .collect();
        if vars.len() < self.vars.len() {
            debug!("v{} drops {} private locals", out.version, self.vars.len() - vars.len());
        }
        out.count(vars.len())?;
        for var in vars {
            out.short(&var.name)?;
            if out.version >= V_LEVELS {
                out.i32(var.level)?;
                out.u8(var.flags)?;
            }
            out.val(&var.value)?;
        }

        out.count(self.programs.len())?;
        for p in self.programs.iter() {
            out.count(p.size())?;
            out.bytes(p.text())?;
            let mut bits = 0;
            if p.is_locked() {
                bits |= PRGM_LOCKED;
            }
            if p.lclbl_invalid() {
                bits |= PRGM_LCLBL_INVALID;
            }
            out.u8(bits)?;
        }

        out.count(self.rtns.len())?;
        for f in self.rtns.iter() {
            out.i32(f.owner.to_i32())?;
            out.pc(f.pc)?;
            if out.version >= V_LEVELS {
                out.u8(f.flag_bits())?;
            }
        }
        Ok(())
    }

    fn save_solve<W: Write>(&self, out: &mut Writer<'_, W>) -> Result<()> {
        let s = &self.solve;
        out.short(&s.prgm_name)?;
        out.short(&s.active_prgm_name)?;
        out.short(&s.var_name)?;
        out.bool(s.keep_running)?;
        out.count(s.prev_prgm)?;
        out.pc(s.prev_pc)?;
        out.u8(s.state)?;
        out.u8(s.which as u8)?;
        out.bool(s.toggle)?;
        out.i32(s.retry_counter)?;
        for &x in &[
            s.retry_value,
            s.x1,
            s.x2,
            s.x3,
            s.fx1,
            s.fx2,
            s.prev_x,
            s.curr_x,
            s.curr_f,
            s.xm,
            s.fxm,
        ] {
            out.f64(x)?;
        }
        Ok(())
    }

    fn save_integ<W: Write>(&self, out: &mut Writer<'_, W>) -> Result<()> {
        let g = &self.integ;
        out.short(&g.prgm_name)?;
        out.short(&g.active_prgm_name)?;
        out.short(&g.var_name)?;
        out.bool(g.keep_running)?;
        out.count(g.prev_prgm)?;
        out.pc(g.prev_pc)?;
        out.u8(g.state)?;
        for &x in &[g.llim, g.ulim, g.acc, g.a, g.b, g.eps] {
            out.f64(x)?;
        }
        out.count(g.n)?;
        out.count(g.i)?;
        out.count(g.k)?;
        out.f64(g.h)?;
        out.f64(g.sum)?;
        for &x in g.c.iter().chain(g.s.iter()) {
            out.f64(x)?;
        }
        out.count(g.nsteps)?;
        for &x in &[g.p, g.t, g.u, g.prev_int, g.prev_res] {
            out.f64(x)?;
        }
        Ok(())
    }
}
