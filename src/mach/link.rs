use super::{Address, Program};
use log::debug;

/// One entry of the global label table: a `LBL "NAME"`, or with no name,
/// the END of a program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub name: Option<Vec<u8>>,
    pub prgm: usize,
    pub pc: Address,
}

/// ## Global label table
///
/// Derived from the programs; every structural edit rebuilds it and
/// every other edit shifts the offsets behind the edit point.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Link {
    labels: Vec<Label>,
}

impl Link {
    pub fn new() -> Link {
        Link::default()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn rebuild(&mut self, prgms: &[Program]) {
        self.labels.clear();
        for (index, prgm) in prgms.iter().enumerate() {
            for (pc, decoded) in prgm.lines() {
                if decoded.instr.is_global_label() {
                    if let Some(name) = decoded.instr.arg.text() {
                        self.labels.push(Label {
                            name: Some(name.to_vec()),
                            prgm: index,
                            pc,
                        });
                    }
                } else if decoded.instr.is_end() {
                    self.labels.push(Label {
                        name: None,
                        prgm: index,
                        pc,
                    });
                }
            }
        }
        debug!("label table rebuilt: {} entries", self.labels.len());
    }

    /// Shifts every label of `prgm` at or after `pc` by `delta` bytes.
    pub fn update(&mut self, prgm: usize, pc: Address, delta: isize) {
        for label in self.labels.iter_mut() {
            if label.prgm == prgm && label.pc >= pc {
                label.pc = (label.pc as isize + delta) as Address;
            }
        }
    }

    /// Later programs win over earlier ones with the same label.
    pub fn find_global(&self, name: &[u8]) -> Option<(usize, Address)> {
        self.labels
            .iter()
            .rev()
            .find(|l| l.name.as_deref() == Some(name))
            .map(|l| (l.prgm, l.pc))
    }

    /// First global label of `prgm`, used to name a program.
    pub fn first_label_of(&self, prgm: usize) -> Option<&[u8]> {
        self.labels
            .iter()
            .find(|l| l.prgm == prgm && l.name.is_some())
            .and_then(|l| l.name.as_deref())
    }
}
