use super::{Address, Link};
use crate::error;
use crate::lang::codec::{self, Decoded};
use crate::lang::{Arg, Error, Instruction, Opcode};
use log::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

/// Outcome of resolving the target of a local GTO/XEQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Not a local jump.
    None,
    Found(Address),
    NotFound,
}

/// ## Program
///
/// Encoded instructions back to back, always ending in END.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    text: Vec<u8>,
    /// Set once every jump cache has been reset; cleared as soon as a
    /// cache is filled again.
    lclbl_invalid: bool,
    locked: bool,
}

fn end_bytes() -> Vec<u8> {
    codec::encode(&Instruction::plain(Opcode::End)).unwrap_or_else(|_| vec![0, 0])
}

impl Default for Program {
    fn default() -> Program {
        Program::new()
    }
}

impl Program {
    pub fn new() -> Program {
        Program {
            text: end_bytes(),
            lclbl_invalid: true,
            locked: false,
        }
    }

    /// Validates bytes from outside the engine: every instruction must be
    /// complete and the last one must be the only END.
    pub fn from_bytes(text: Vec<u8>, lclbl_invalid: bool, locked: bool) -> Result<Program> {
        let mut pc = 0;
        let mut ended = false;
        while pc < text.len() {
            if ended {
                return Err(error!(InvalidData; "BYTES AFTER END"));
            }
            let len = codec::checked_length(&text, pc).ok_or_else(|| error!(InvalidData; "BAD PROGRAM"))?;
            ended = codec::decode(&text, pc).instr.is_end();
            pc += len;
        }
        if !ended {
            return Err(error!(InvalidData; "PROGRAM WITHOUT END"));
        }
        Ok(Program {
            text,
            lclbl_invalid,
            locked,
        })
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn size(&self) -> usize {
        self.text.len()
    }

    pub fn lclbl_invalid(&self) -> bool {
        self.lclbl_invalid
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Only the END.
    pub fn is_empty(&self) -> bool {
        self.end_pc() == 0
    }

    /// Offset of the closing END.
    pub fn end_pc(&self) -> Address {
        self.text.len().saturating_sub(2)
    }

    pub fn decode(&self, pc: Address) -> Decoded {
        codec::decode(&self.text, pc)
    }

    pub fn next(&self, pc: Address) -> Address {
        pc + codec::instruction_length(&self.text, pc)
    }

    /// Start of the line before `pc`, found by scanning from the top.
    pub fn prev(&self, pc: Address) -> Option<Address> {
        let mut prev = None;
        let mut at = 0;
        while at < pc && at < self.text.len() {
            prev = Some(at);
            at = self.next(at);
        }
        prev
    }

    pub fn lines(&self) -> Lines<'_> {
        Lines { prgm: self, pc: 0 }
    }

    /// 1-based line number of the instruction at `pc`.
    pub fn line_number(&self, pc: Address) -> usize {
        self.lines().take_while(|(at, _)| *at < pc).count() + 1
    }

    pub fn pc_of_line(&self, line: usize) -> Option<Address> {
        if line == 0 {
            return None;
        }
        self.lines().nth(line - 1).map(|(pc, _)| pc)
    }

    /// Resets every jump cache in this program. Cheap when nothing has
    /// been cached since the last call.
    pub fn invalidate_lclbls(&mut self) {
        if self.lclbl_invalid {
            return;
        }
        let mut pc = 0;
        while pc < self.text.len() {
            let d = codec::decode(&self.text, pc);
            if let Some(at) = d.cache {
                codec::write_cache(&mut self.text, at, None);
            }
            pc += d.len;
        }
        self.lclbl_invalid = true;
    }

    /// Nearest `LBL` matching `arg` searching forward from `from`,
    /// wrapping once to the top of the program.
    pub fn find_local_label(&self, from: Option<Address>, arg: &Arg) -> Option<Address> {
        let start = from.unwrap_or(0).min(self.end_pc());
        let end = self.end_pc();
        let matches = |pc: Address| {
            let d = self.decode(pc);
            d.instr.opcode == Opcode::Lbl && d.instr.arg == *arg
        };
        let mut pc = start;
        while pc < end {
            if matches(pc) {
                return Some(pc);
            }
            pc = self.next(pc);
        }
        pc = 0;
        while pc < start {
            if matches(pc) {
                return Some(pc);
            }
            pc = self.next(pc);
        }
        None
    }

    /// Decodes the instruction at `pc` and, for a local GTO/XEQ, resolves
    /// its target through the jump cache when `find_target` is set.
    pub fn get_next_command(&mut self, pc: Address, find_target: bool) -> (Instruction, Address, Target) {
        let d = self.decode(pc);
        let next = pc + d.len;
        let mut target = Target::None;
        if let (true, Some(at)) = (find_target, d.cache) {
            target = match codec::read_cache(&self.text, at) {
                Some(t) => Target::Found(t),
                None => match self.find_local_label(Some(next), &d.instr.arg) {
                    Some(t) => {
                        codec::write_cache(&mut self.text, at, Some(t));
                        self.lclbl_invalid = false;
                        trace!("cached jump at {} -> {}", pc, t);
                        Target::Found(t)
                    }
                    None => Target::NotFound,
                },
            };
        }
        (d.instr, next, target)
    }

    fn splice(&mut self, at: Address, bytes: &[u8]) -> Result<()> {
        self.text.try_reserve(bytes.len())?;
        self.text.splice(at..at, bytes.iter().copied());
        Ok(())
    }
}

pub struct Lines<'a> {
    prgm: &'a Program,
    pc: Address,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (Address, Decoded);
    fn next(&mut self) -> Option<Self::Item> {
        if self.pc >= self.prgm.text.len() {
            return None;
        }
        let d = self.prgm.decode(self.pc);
        let at = self.pc;
        self.pc += d.len.max(1);
        Some((at, d))
    }
}

/// ## Program store
///
/// There is always at least one program; the last one may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Programs {
    prgms: Vec<Program>,
    link: Link,
}

impl Default for Programs {
    fn default() -> Programs {
        Programs::new()
    }
}

impl Programs {
    pub fn new() -> Programs {
        let prgms = vec![Program::new()];
        let mut link = Link::new();
        link.rebuild(&prgms);
        Programs { prgms, link }
    }

    pub fn from_vec(prgms: Vec<Program>) -> Result<Programs> {
        if prgms.is_empty() {
            return Err(error!(InvalidData; "NO PROGRAMS"));
        }
        let mut link = Link::new();
        link.rebuild(&prgms);
        Ok(Programs { prgms, link })
    }

    pub fn len(&self) -> usize {
        self.prgms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prgms.is_empty()
    }

    pub fn get(&self, prgm: usize) -> Option<&Program> {
        self.prgms.get(prgm)
    }

    pub fn get_mut(&mut self, prgm: usize) -> Option<&mut Program> {
        self.prgms.get_mut(prgm)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Program> {
        self.prgms.iter()
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    fn program_mut(&mut self, prgm: usize) -> Result<&mut Program> {
        self.prgms.get_mut(prgm).ok_or_else(|| error!(Nonexistent))
    }

    pub fn rebuild_label_table(&mut self) {
        self.link.rebuild(&self.prgms);
    }

    pub fn update_label_table(&mut self, prgm: usize, pc: Address, delta: isize) {
        self.link.update(prgm, pc, delta);
    }

    pub fn find_global_label(&self, name: &[u8]) -> Option<(usize, Address)> {
        self.link.find_global(name)
    }

    pub fn find_local_label(&self, prgm: usize, from: Option<Address>, arg: &Arg) -> Option<Address> {
        self.prgms.get(prgm)?.find_local_label(from, arg)
    }

    /// Inserts `instr` at byte offset `at` of `prgm`. An END splits the
    /// program there; the tail becomes a new program right after it.
    pub fn insert(&mut self, prgm: usize, at: Address, instr: &Instruction) -> Result<()> {
        let bytes = codec::encode(instr)?;
        let p = self.program_mut(prgm)?;
        if p.locked {
            return Err(error!(ProgramLocked));
        }
        if at > p.end_pc() {
            return Err(error!(InternalError; "INSERT PAST END"));
        }
        p.invalidate_lclbls();
        if instr.is_end() {
            let mut tail = Vec::new();
            tail.try_reserve(p.text.len() - at)?;
            tail.extend_from_slice(&p.text[at..]);
            p.text.truncate(at);
            p.text.extend_from_slice(&bytes);
            let next = Program {
                text: tail,
                lclbl_invalid: false,
                locked: false,
            };
            self.prgms.try_reserve(1)?;
            self.prgms.insert(prgm + 1, next);
            if let Some(n) = self.prgms.get_mut(prgm + 1) {
                n.invalidate_lclbls();
            }
            debug!("program {} split at {}", prgm, at);
            self.rebuild_label_table();
        } else {
            p.splice(at, &bytes)?;
            if instr.is_global_label() {
                self.rebuild_label_table();
            } else {
                self.update_label_table(prgm, at, bytes.len() as isize);
            }
        }
        Ok(())
    }

    /// Deletes the instruction at `at`. Deleting an END joins the next
    /// program onto this one; the last program's END can't be deleted
    /// and `Ok(false)` is returned.
    pub fn delete(&mut self, prgm: usize, at: Address) -> Result<bool> {
        let last = prgm + 1 == self.prgms.len();
        let p = self.program_mut(prgm)?;
        if at >= p.text.len() {
            return Err(error!(InternalError; "DELETE PAST END"));
        }
        let d = p.decode(at);
        if d.instr.is_end() {
            if last {
                return Ok(false);
            }
            if p.locked {
                return Err(error!(ProgramLocked));
            }
            if self.prgms[prgm + 1].locked {
                return Err(error!(NextProgramLocked));
            }
            let next = self.prgms.remove(prgm + 1);
            let p = &mut self.prgms[prgm];
            p.invalidate_lclbls();
            p.text.truncate(at);
            p.text.try_reserve(next.text.len())?;
            p.text.extend_from_slice(&next.text);
            // the joined tail may carry filled caches of its own
            p.lclbl_invalid = false;
            p.invalidate_lclbls();
            debug!("program {} merged with its successor", prgm);
            self.rebuild_label_table();
            return Ok(true);
        }
        if p.locked {
            return Err(error!(ProgramLocked));
        }
        p.invalidate_lclbls();
        p.text.drain(at..at + d.len);
        if d.instr.is_global_label() {
            self.rebuild_label_table();
        } else {
            self.update_label_table(prgm, at, -(d.len as isize));
        }
        Ok(true)
    }

    /// Removes a whole program. The store keeps one empty program if
    /// this was the only one.
    pub fn clear_program(&mut self, prgm: usize) -> Result<()> {
        if self.program_mut(prgm)?.locked {
            return Err(error!(ProgramLocked));
        }
        if self.prgms.len() == 1 {
            self.prgms[0] = Program::new();
        } else {
            self.prgms.remove(prgm);
            if prgm == self.prgms.len() && !self.prgms[prgm - 1].is_empty() {
                self.prgms.push(Program::new());
            }
        }
        self.rebuild_label_table();
        Ok(())
    }

    /// `GTO ..`: makes sure the last program is empty and returns its
    /// index.
    pub fn new_program(&mut self) -> Result<usize> {
        let last = self.prgms.len() - 1;
        if !self.prgms[last].is_empty() {
            let at = self.prgms[last].end_pc();
            self.insert(last, at, &Instruction::plain(Opcode::End))?;
        }
        Ok(self.prgms.len() - 1)
    }

    /// Listing in the calculator's format, line 00 showing the size.
    pub fn listing(&self, prgm: usize) -> Vec<String> {
        let p = match self.prgms.get(prgm) {
            Some(p) => p,
            None => return vec![],
        };
        let last = prgm + 1 == self.prgms.len();
        let mut out = vec![format!("00 {{ {}-Byte Prgm }}", p.size())];
        for (n, (_, d)) in p.lines().enumerate() {
            let text = if d.instr.is_end() && last {
                ".END.".to_string()
            } else {
                d.instr.to_string()
            };
            out.push(format!("{:02} {}", n + 1, text));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(ps: &mut Programs, prgm: usize, instr: Instruction) {
        let at = ps.get(prgm).unwrap().end_pc();
        ps.insert(prgm, at, &instr).unwrap();
    }

    fn gl(name: &str) -> Instruction {
        Instruction::new(Opcode::Lbl, Arg::Str(name.as_bytes().to_vec()))
    }

    #[test]
    fn test_split_then_merge_restores_bytes() {
        let mut ps = Programs::new();
        add(&mut ps, 0, gl("A"));
        add(&mut ps, 0, Instruction::plain(Opcode::Add));
        add(&mut ps, 0, Instruction::new(Opcode::Sto, Arg::Num(3)));
        let before = ps.get(0).unwrap().text().to_vec();
        let at = ps.get(0).unwrap().next(0);
        ps.insert(0, at, &Instruction::plain(Opcode::End)).unwrap();
        assert_eq!(ps.len(), 2);
        assert_eq!(ps.get(0).unwrap().lines().count(), 2);
        assert!(ps.delete(0, at).unwrap());
        assert_eq!(ps.len(), 1);
        assert_eq!(ps.get(0).unwrap().text(), &before[..]);
    }

    #[test]
    fn test_last_end_is_not_deleted() {
        let mut ps = Programs::new();
        let end = ps.get(0).unwrap().end_pc();
        assert!(!ps.delete(0, end).unwrap());
        assert_eq!(ps.len(), 1);
    }

    #[test]
    fn test_incremental_labels_match_rebuild() {
        let mut ps = Programs::new();
        add(&mut ps, 0, gl("F"));
        add(&mut ps, 0, Instruction::plain(Opcode::Add));
        ps.new_program().unwrap();
        add(&mut ps, 1, gl("G"));
        ps.insert(0, 0, &Instruction::new(Opcode::Number, Arg::number(2.5, None))).unwrap();
        ps.delete(0, 0).unwrap();
        ps.insert(1, 0, &Instruction::plain(Opcode::Swap)).unwrap();
        let patched = ps.link().clone();
        ps.rebuild_label_table();
        assert_eq!(&patched, ps.link());
        assert_eq!(ps.find_global_label(b"G"), Some((1, 2)));
    }

    #[test]
    fn test_local_label_search_wraps() {
        let mut ps = Programs::new();
        add(&mut ps, 0, Instruction::new(Opcode::Lbl, Arg::LocalLabel(b'A')));
        add(&mut ps, 0, Instruction::plain(Opcode::Add));
        add(&mut ps, 0, Instruction::new(Opcode::Gto, Arg::LocalLabel(b'A')));
        let p = ps.get(0).unwrap();
        let gto = p.pc_of_line(3).unwrap();
        assert_eq!(p.find_local_label(Some(gto), &Arg::LocalLabel(b'A')), Some(0));
        assert_eq!(p.find_local_label(Some(gto), &Arg::LocalLabel(b'B')), None);
    }

    #[test]
    fn test_jump_cache_filled_and_invalidated() {
        let mut ps = Programs::new();
        add(&mut ps, 0, Instruction::new(Opcode::Gto, Arg::Num(1)));
        add(&mut ps, 0, Instruction::new(Opcode::Lbl, Arg::Num(1)));
        let p = ps.get_mut(0).unwrap();
        assert!(p.lclbl_invalid());
        let (_, _, target) = p.get_next_command(0, true);
        let lbl = p.pc_of_line(2).unwrap();
        assert_eq!(target, Target::Found(lbl));
        assert!(!p.lclbl_invalid());
        assert_eq!(codec::read_cache(p.text(), 3), Some(lbl));
        ps.insert(0, 0, &Instruction::plain(Opcode::Add)).unwrap();
        let p = ps.get(0).unwrap();
        assert!(p.lclbl_invalid());
        assert_eq!(codec::read_cache(p.text(), 5), None);
    }

    #[test]
    fn test_locked_program_refuses_edits() {
        let mut ps = Programs::new();
        ps.get_mut(0).unwrap().set_locked(true);
        let err = ps.insert(0, 0, &Instruction::plain(Opcode::Add)).unwrap_err();
        assert!(err.is(crate::lang::ErrorCode::ProgramLocked));
    }

    #[test]
    fn test_listing() {
        let mut ps = Programs::new();
        add(&mut ps, 0, gl("AB"));
        add(&mut ps, 0, Instruction::plain(Opcode::Mul));
        assert_eq!(
            ps.listing(0),
            vec!["00 { 9-Byte Prgm }", "01 LBL \"AB\"", "02 ×", "03 .END."]
        );
    }
}
