use super::display::{Display, SIZE as DISPLAY_SIZE};
use super::flags::Flags;
use super::keybuf::Key;
use super::keys::Entry;
use super::matedit::MatEdit;
use super::program::{Program, Programs};
use super::rtn::{rtn_stack, Frame, Owner};
use super::runtime::{InputPrompt, Task, ALPHA_LEN};
use super::save::*;
use super::shell::NullShell;
use super::val::{Cell, ComplexMatrix, RealMatrix, Shared, Text, SHORT_TEXT};
use super::var::{check_name, Var, GLOBAL};
use super::{Address, RegStack, Runtime, Val, Vars};
use crate::error;
use crate::lang::{codec, Error, Opcode};
use log::{debug, info, warn};
use std::io::{Read, Seek, SeekFrom};

type Result<T> = std::result::Result<T, Error>;

/// Longest platform string read from a header.
const MAX_PLATFORM: usize = 256;

/// What `load` made of a state file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub success: bool,
    /// The file was damaged and the machine is back to factory state.
    pub needs_clear: bool,
    /// Written by a newer engine; nothing was touched.
    pub too_new: bool,
}

fn corrupt(what: &'static str) -> Error {
    error!(InvalidData; what)
}

/// Reads the layout version from a state file header and rewinds to
/// where the header started.
pub fn state_version<R: Read + Seek>(r: &mut R) -> Result<u32> {
    let start = r.seek(SeekFrom::Current(0))?;
    let mut head = [0u8; 8];
    r.read_exact(&mut head)?;
    r.seek(SeekFrom::Start(start))?;
    if &head[..4] != MAGIC {
        return Err(corrupt("NOT A STATE FILE"));
    }
    Ok(u32::from_be_bytes([head[4], head[5], head[6], head[7]]))
}

enum Head {
    Contents { count: usize, register: bool },
    Repeat(u32),
    EmptyList,
}

/// Big-endian field reader for one layout version.
struct Reader<'a, R: Read> {
    r: &'a mut R,
    version: u32,
    strings: MatrixStrings,
    /// Set when a pre-33 matrix string was too long and rejected.
    hit_string_bug: bool,
    shared: Vec<Option<Val>>,
}

impl<'a, R: Read> Reader<'a, R> {
    fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(n.min(1 << 16))?;
        let got = (&mut *self.r).take(n as u64).read_to_end(&mut buf)?;
        if got != n {
            return Err(corrupt("TRUNCATED STATE FILE"));
        }
        Ok(buf)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.r.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(corrupt("BAD BOOLEAN")),
        }
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    fn count(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    fn short(&mut self) -> Result<Vec<u8>> {
        let n = self.u8()? as usize;
        self.bytes(n)
    }

    fn text(&mut self) -> Result<Vec<u8>> {
        if self.version >= V_LONG_STRINGS {
            let n = self.count()?;
            self.bytes(n)
        } else {
            self.short()
        }
    }

    fn pc(&mut self) -> Result<Option<Address>> {
        match self.i32()? {
            -1 => Ok(None),
            n if n >= 0 => Ok(Some(n as Address)),
            _ => Err(corrupt("BAD PC")),
        }
    }

    fn array_head(&mut self) -> Result<Head> {
        let n = self.i32()?;
        if self.version < V_SHARED {
            if n < 0 {
                return Err(corrupt("NEGATIVE SIZE"));
            }
            return Ok(Head::Contents {
                count: n as usize,
                register: false,
            });
        }
        match n {
            0 => match self.u32()? {
                EMPTY_LIST => Ok(Head::EmptyList),
                index => Ok(Head::Repeat(index)),
            },
            n if n > 0 => Ok(Head::Contents {
                count: n as usize,
                register: false,
            }),
            n => {
                let count = n.checked_neg().ok_or_else(|| corrupt("BAD SIZE"))?;
                Ok(Head::Contents {
                    count: count as usize,
                    register: true,
                })
            }
        }
    }

    /// An array already read, which must be of the same type.
    fn repeat(&self, index: u32, type_code: u8) -> Result<Val> {
        match self.shared.get(index as usize) {
            Some(Some(v)) if v.type_code() == type_code => Ok(v.clone()),
            _ => Err(corrupt("BAD SHARED ARRAY")),
        }
    }

    fn cell(&mut self) -> Result<Cell> {
        if self.version >= V_LONG_STRINGS {
            return match self.u8()? {
                CELL_NUMBER => Ok(Cell::Number(self.f64()?)),
                CELL_SHORT => {
                    let b = self.short()?;
                    if b.len() > SHORT_TEXT {
                        return Err(corrupt("LONG SHORT STRING"));
                    }
                    Ok(Cell::Text(Text::new(&b)?))
                }
                CELL_LONG => {
                    let b = self.text()?;
                    Ok(Cell::Text(Text::new(&b)?))
                }
                _ => Err(corrupt("BAD CELL")),
            };
        }
        if !self.bool()? {
            return Ok(Cell::Number(self.f64()?));
        }
        let len = self.u8()? as usize;
        if len > SHORT_TEXT && self.strings == MatrixStrings::Strict {
            self.hit_string_bug = true;
            return Err(corrupt("MATRIX STRING LENGTH"));
        }
        let b = self.bytes(len)?;
        Ok(Cell::Text(Text::new(&b[..len.min(SHORT_TEXT)])?))
    }

    fn val(&mut self) -> Result<Val> {
        let type_code = self.u8()?;
        match type_code {
            0 => Ok(Val::Null),
            1 => Ok(Val::Real(self.f64()?)),
            2 => Ok(Val::Complex(self.f64()?, self.f64()?)),
            5 => {
                let b = self.text()?;
                Val::string(&b)
            }
            3 | 4 => {
                let (rows, register) = match self.array_head()? {
                    Head::Repeat(index) => return self.repeat(index, type_code),
                    Head::EmptyList => return Err(corrupt("EMPTY MATRIX")),
                    Head::Contents { count, register } => (count, register),
                };
                let slot = self.reserve(register);
                let cols = self.i32()?;
                if cols <= 0 {
                    return Err(corrupt("BAD MATRIX SIZE"));
                }
                let cols = cols as usize;
                let n = rows.checked_mul(cols).ok_or_else(|| corrupt("BAD MATRIX SIZE"))?;
                let val = if type_code == 3 {
                    let mut cells = Vec::new();
                    for _ in 0..n {
                        cells.try_reserve(1)?;
                        cells.push(self.cell()?);
                    }
                    Val::RealMatrix(Shared::new(RealMatrix::from_cells(rows, cols, cells)?))
                } else {
                    let mut data = Vec::new();
                    for _ in 0..n {
                        data.try_reserve(1)?;
                        data.push((self.f64()?, self.f64()?));
                    }
                    Val::ComplexMatrix(Shared::new(ComplexMatrix::from_data(rows, cols, data)?))
                };
                self.register(slot, &val);
                Ok(val)
            }
            6 if self.version >= V_LEVELS => {
                let (len, register) = match self.array_head()? {
                    Head::Repeat(index) => return self.repeat(index, type_code),
                    Head::EmptyList => return Ok(Val::list(vec![])),
                    Head::Contents { count, register } => (count, register),
                };
                let slot = self.reserve(register);
                let mut items = Vec::new();
                for _ in 0..len {
                    items.try_reserve(1)?;
                    items.push(self.val()?);
                }
                let val = Val::list(items);
                self.register(slot, &val);
                Ok(val)
            }
            _ => Err(corrupt("BAD VALUE TYPE")),
        }
    }

    /// Claims the next shared index before the contents are read, so
    /// nested arrays number the same way the writer did.
    fn reserve(&mut self, register: bool) -> Option<usize> {
        if register {
            self.shared.push(None);
            Some(self.shared.len() - 1)
        } else {
            None
        }
    }

    fn register(&mut self, slot: Option<usize>, val: &Val) {
        if let Some(i) = slot {
            self.shared[i] = Some(val.clone());
        }
    }
}

impl Runtime {
    /// Replaces the machine with one read from `r`. The host passes the
    /// version it found with `state_version`. A hard failure leaves the
    /// machine factory reset.
    pub fn load<R: Read + Seek>(&mut self, r: &mut R, declared_version: u32) -> LoadOutcome {
        if declared_version > CURRENT_VERSION {
            info!("state v{} is newer than v{}", declared_version, CURRENT_VERSION);
            return LoadOutcome {
                too_new: true,
                ..LoadOutcome::default()
            };
        }
        let result = match r.seek(SeekFrom::Current(0)) {
            Ok(start) => load_from(r, start, declared_version),
            Err(e) => Err(Error::from(e)),
        };
        match result {
            Ok(staged) => {
                self.install(staged);
                info!(
                    "loaded state v{}, {} programs, {} variables",
                    declared_version,
                    self.programs.len(),
                    self.vars.len()
                );
                LoadOutcome {
                    success: true,
                    ..LoadOutcome::default()
                }
            }
            Err(e) => {
                warn!("state file rejected: {}", e);
                self.hard_reset();
                LoadOutcome {
                    needs_clear: true,
                    ..LoadOutcome::default()
                }
            }
        }
    }

    /// Takes over a machine read from a file, keeping this one's host.
    fn install(&mut self, mut staged: Runtime) {
        std::mem::swap(&mut self.shell, &mut staged.shell);
        *self = staged;
        self.shell.repaint(self.display.bits());
    }
}

/// How pre-33 files treat inline matrix strings longer than six bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatrixStrings {
    /// Rejected as corrupt.
    Strict,
    /// Clamped to six bytes, the excess skipped. Older engines wrote
    /// such files.
    Legacy,
}

/// How one pass over a state file ended.
enum Pass {
    Done(Result<Runtime>),
    /// Read again from the start with `MatrixStrings::Legacy`.
    RetryLegacy(Error),
}

fn load_from<R: Read + Seek>(r: &mut R, start: u64, version: u32) -> Result<Runtime> {
    match read_state(r, version, MatrixStrings::Strict) {
        Pass::Done(result) => result,
        Pass::RetryLegacy(e) => {
            debug!("{}; rereading with legacy matrix strings", e);
            r.seek(SeekFrom::Start(start))?;
            match read_state(r, version, MatrixStrings::Legacy) {
                Pass::Done(result) => result,
                Pass::RetryLegacy(e) => Err(e),
            }
        }
    }
}

fn read_state<R: Read>(r: &mut R, version: u32, strings: MatrixStrings) -> Pass {
    let mut inp = Reader {
        r,
        version,
        strings,
        hit_string_bug: false,
        shared: vec![],
    };
    match read_all(&mut inp) {
        Err(e) if inp.hit_string_bug && version < V_LONG_STRINGS => Pass::RetryLegacy(e),
        result => Pass::Done(result),
    }
}

fn read_all<R: Read>(inp: &mut Reader<'_, R>) -> Result<Runtime> {
    let version = inp.version;
    if &inp.array::<4>()? != MAGIC {
        return Err(corrupt("NOT A STATE FILE"));
    }
    if inp.u32()? != version {
        return Err(corrupt("VERSION MISMATCH"));
    }
    if version < MIN_VERSION {
        return Err(corrupt("STATE FILE TOO OLD"));
    }
    let mut platform = vec![];
    loop {
        match inp.u8()? {
            0 => break,
            b if platform.len() < MAX_PLATFORM => platform.push(b),
            _ => return Err(corrupt("BAD PLATFORM STRING")),
        }
    }
    debug!("state v{} from {}", version, String::from_utf8_lossy(&platform));
    if inp.u8()? != BINARY_DOUBLE {
        return Err(corrupt("UNSUPPORTED NUMBER FORMAT"));
    }

    let mut m = Runtime::new(Box::new(NullShell));
    read_modes(inp, &mut m)?;
    read_core(inp, &mut m)?;
    read_solve(inp, &mut m)?;
    read_integ(inp, &mut m)?;

    if &inp.array::<4>()? != MAGIC || inp.u32()? != version {
        return Err(corrupt("BAD TRAILER"));
    }
    m.check_matedit();
    Ok(m)
}

fn read_modes<R: Read>(inp: &mut Reader<'_, R>, m: &mut Runtime) -> Result<()> {
    let mode = inp.u8()?;
    m.running = mode & MODE_RUNNING != 0;
    m.prgm_mode = mode & MODE_PRGM != 0;
    m.task = match inp.u8()? {
        TASK_NONE => None,
        TASK_GETKEY => Some(Task::GetKey),
        TASK_PRUSR => Some(Task::PrUsr(inp.count()?)),
        _ => return Err(corrupt("BAD TASK")),
    };

    if inp.bool()? {
        let text = inp.short()?;
        let text = String::from_utf8(text).map_err(|_| corrupt("BAD ENTRY"))?;
        m.entry = Some(Entry::from_text(&text));
    }
    m.pending = match inp.u16()? {
        NO_PENDING => None,
        code => Some(Opcode::from_code(code).ok_or_else(|| corrupt("BAD PENDING COMMAND"))?),
    };
    m.cmdline = String::from_utf8(inp.short()?).map_err(|_| corrupt("BAD COMMAND LINE"))?;

    if inp.bool()? {
        let edit = inp.bool()?;
        let name = inp.short()?;
        check_name(&name)?;
        let level = inp.i32()?;
        let i = inp.count()?;
        let j = inp.count()?;
        let mut path = vec![];
        if inp.version >= V_LEVELS {
            for _ in 0..inp.count()? {
                path.try_reserve(1)?;
                path.push(inp.count()?);
            }
        }
        m.matedit = Some(MatEdit {
            edit,
            name,
            level,
            i,
            j,
            path,
        });
    }

    if inp.bool()? {
        let n = inp.count()?;
        let bytes = inp.bytes(n)?;
        if codec::checked_length(&bytes, 0) != Some(bytes.len()) {
            return Err(corrupt("BAD INPUT PROMPT"));
        }
        let instr = codec::decode(&bytes, 0).instr;
        if instr.opcode != Opcode::Input {
            return Err(corrupt("BAD INPUT PROMPT"));
        }
        let label = String::from_utf8(inp.short()?).map_err(|_| corrupt("BAD INPUT PROMPT"))?;
        m.input = Some(InputPrompt {
            arg: instr.arg,
            label,
        });
    }

    m.lasterr = inp.u16()?;
    if inp.version >= V_SEED_PAIR {
        m.rng = (inp.u64()?, inp.u64()?);
    } else {
        let seed = inp.f64()?;
        debug!("converting single seed {}", seed);
        m.seed(seed);
    }
    m.deferred_print = inp.bool()?;

    m.keybuf.clear();
    for _ in 0..inp.u8()? {
        let shift = inp.bool()?;
        let code = inp.u8()?;
        if !m.keybuf.push(Key { shift, code }) {
            return Err(corrupt("KEY QUEUE OVERFLOW"));
        }
    }
    m.display = Display::from_bytes(&inp.bytes(DISPLAY_SIZE)?)?;
    Ok(())
}

fn read_core<R: Read>(inp: &mut Reader<'_, R>, m: &mut Runtime) -> Result<()> {
    let prgm = inp.count()?;
    let pc = inp.pc()?;
    let big = inp.version >= V_SHARED && inp.bool()?;
    let depth = inp.count()?;
    if !big && depth != FOUR_LEVELS {
        return Err(corrupt("BAD STACK DEPTH"));
    }
    let mut vals = vec![];
    for _ in 0..depth {
        vals.try_reserve(1)?;
        vals.push(inp.val()?);
    }
    m.stack = RegStack::from_parts(big, vals)?;
    m.lastx = inp.val()?;
    let alpha = inp.short()?;
    if alpha.len() > ALPHA_LEN {
        return Err(corrupt("ALPHA TOO LONG"));
    }
    m.alpha = alpha;

    let n = inp.u8()? as usize;
    let mut bits = vec![];
    for _ in 0..n {
        bits.push(inp.bool()?);
    }
    m.flags = Flags::from_slice(&bits)?;

    let mut vars = vec![];
    for _ in 0..inp.count()? {
        let name = inp.short()?;
        check_name(&name)?;
        let (level, flags) = if inp.version >= V_LEVELS {
            (inp.i32()?, inp.u8()?)
        } else {
            (GLOBAL, 0)
        };
        let value = inp.val()?;
        vars.try_reserve(1)?;
        vars.push(Var {
            name,
            value,
            level,
            flags,
        });
    }
    m.vars = Vars::from_vec(vars)?;

    let mut prgms = vec![];
    for _ in 0..inp.count()? {
        let n = inp.count()?;
        let text = inp.bytes(n)?;
        let bits = inp.u8()?;
        prgms.try_reserve(1)?;
        prgms.push(Program::from_bytes(
            text,
            bits & PRGM_LCLBL_INVALID != 0,
            bits & PRGM_LOCKED != 0,
        )?);
    }
    m.programs = Programs::from_vec(prgms)?;
    if !valid_pc(&m.programs, prgm, pc) {
        return Err(corrupt("BAD PROGRAM COUNTER"));
    }
    m.prgm = prgm;
    m.pc = pc;

    m.rtns = rtn_stack();
    for _ in 0..inp.count()? {
        let owner = Owner::from_i32(inp.i32()?).ok_or_else(|| corrupt("BAD RETURN"))?;
        let pc = inp.pc()?;
        if let Owner::Program(p) = owner {
            if !valid_pc(&m.programs, p, pc) {
                return Err(corrupt("BAD RETURN"));
            }
        }
        let mut frame = Frame::new(owner, pc, false);
        if inp.version >= V_LEVELS {
            frame.set_flag_bits(inp.u8()?);
        }
        m.rtns.push(frame)?;
    }
    Ok(())
}

fn valid_pc(programs: &Programs, prgm: usize, pc: Option<Address>) -> bool {
    match (programs.get(prgm), pc) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(p), Some(pc)) => pc <= p.end_pc(),
    }
}

fn read_solve<R: Read>(inp: &mut Reader<'_, R>, m: &mut Runtime) -> Result<()> {
    let s = &mut m.solve;
    s.prgm_name = inp.short()?;
    s.active_prgm_name = inp.short()?;
    s.var_name = inp.short()?;
    s.keep_running = inp.bool()?;
    s.prev_prgm = inp.count()?;
    s.prev_pc = inp.pc()?;
    s.state = inp.u8()?;
    s.which = inp.u8()? as i8;
    s.toggle = inp.bool()?;
    s.retry_counter = inp.i32()?;
    for x in [
        &mut s.retry_value,
        &mut s.x1,
        &mut s.x2,
        &mut s.x3,
        &mut s.fx1,
        &mut s.fx2,
        &mut s.prev_x,
        &mut s.curr_x,
        &mut s.curr_f,
        &mut s.xm,
        &mut s.fxm,
    ] {
        *x = inp.f64()?;
    }
    Ok(())
}

fn read_integ<R: Read>(inp: &mut Reader<'_, R>, m: &mut Runtime) -> Result<()> {
    let g = &mut m.integ;
    g.prgm_name = inp.short()?;
    g.active_prgm_name = inp.short()?;
    g.var_name = inp.short()?;
    g.keep_running = inp.bool()?;
    g.prev_prgm = inp.count()?;
    g.prev_pc = inp.pc()?;
    g.state = inp.u8()?;
    for x in [&mut g.llim, &mut g.ulim, &mut g.acc, &mut g.a, &mut g.b, &mut g.eps] {
        *x = inp.f64()?;
    }
    g.n = inp.count()?;
    g.i = inp.count()?;
    g.k = inp.count()?;
    g.h = inp.f64()?;
    g.sum = inp.f64()?;
    for x in g.c.iter_mut().chain(g.s.iter_mut()) {
        *x = inp.f64()?;
    }
    g.nsteps = inp.count()?;
    for x in [&mut g.p, &mut g.t, &mut g.u, &mut g.prev_int, &mut g.prev_res] {
        *x = inp.f64()?;
    }
    Ok(())
}
