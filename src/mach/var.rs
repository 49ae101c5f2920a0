use super::Val;
use crate::error;
use crate::lang::Error;
use log::trace;

type Result<T> = std::result::Result<T, Error>;

/// Left out of catalogs, still found by name.
pub const HIDDEN: u8 = 1;
/// Shadows an older variable of the same name, which becomes visible
/// again when this one is purged.
pub const HIDING: u8 = 2;
/// Only visible from its own level.
pub const PRIVATE: u8 = 4;

pub const MAX_NAME: usize = 7;
/// Level of global variables.
pub const GLOBAL: i32 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: Vec<u8>,
    pub value: Val,
    pub level: i32,
    pub flags: u8,
}

impl Var {
    pub fn is_hidden(&self) -> bool {
        self.flags & HIDDEN != 0
    }
}

/// ## Variable memory
///
/// Kept in level order: globals first, then locals by increasing call
/// depth, so everything belonging to a frame is a suffix of the table.
#[derive(Debug, Default, Clone)]
pub struct Vars {
    vars: Vec<Var>,
}

pub fn check_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        Err(error!(InvalidData; "EMPTY NAME"))
    } else if name.len() > MAX_NAME {
        Err(error!(NameTooLong))
    } else {
        Ok(())
    }
}

impl Vars {
    pub fn new() -> Vars {
        Vars::default()
    }

    /// Rebuilds a table read back from a state file.
    pub fn from_vec(vars: Vec<Var>) -> Result<Vars> {
        if vars.windows(2).any(|w| w[0].level > w[1].level) {
            return Err(error!(InvalidData; "VARIABLE LEVELS OUT OF ORDER"));
        }
        Ok(Vars { vars })
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Var> {
        self.vars.iter()
    }

    /// Variables a catalog would show from `level`.
    pub fn visible(&self, level: i32) -> impl Iterator<Item = &Var> {
        self.vars
            .iter()
            .filter(move |v| !v.is_hidden() && (v.flags & PRIVATE == 0 || v.level == level))
    }

    pub fn count_locals(&self) -> usize {
        self.vars.iter().filter(|v| v.level != GLOBAL).count()
    }

    /// Index of the variable `name` resolves to from `level`.
    pub fn lookup(&self, name: &[u8], level: i32) -> Option<usize> {
        self.vars
            .iter()
            .rposition(|v| v.name == name && (v.flags & PRIVATE == 0 || v.level == level))
    }

    pub fn recall(&self, name: &[u8], level: i32) -> Option<&Val> {
        self.lookup(name, level).map(|i| &self.vars[i].value)
    }

    pub fn get(&self, index: usize) -> Option<&Var> {
        self.vars.get(index)
    }

    pub fn value_mut(&mut self, index: usize) -> Option<&mut Val> {
        self.vars.get_mut(index).map(|v| &mut v.value)
    }

    /// `STO`: replaces whatever `name` resolves to, or creates a global.
    pub fn store(&mut self, name: &[u8], value: Val, level: i32) -> Result<()> {
        check_name(name)?;
        match self.lookup(name, level) {
            Some(i) => self.vars[i].value = value,
            None => {
                self.vars.try_reserve(1)?;
                let at = self
                    .vars
                    .iter()
                    .position(|v| v.level != GLOBAL)
                    .unwrap_or_else(|| self.vars.len());
                self.vars.insert(
                    at,
                    Var {
                        name: name.to_vec(),
                        value,
                        level: GLOBAL,
                        flags: 0,
                    },
                );
            }
        }
        Ok(())
    }

    /// `LSTO`: creates or replaces a local at `level`. A same-named
    /// variable from a shallower level is hidden until this one goes.
    /// Returns true when an older variable was hidden.
    pub fn store_local(&mut self, name: &[u8], value: Val, level: i32, flags: u8) -> Result<bool> {
        check_name(name)?;
        let found = self.vars.iter().rposition(|v| v.name == name);
        if let Some(i) = found {
            if self.vars[i].level == level {
                self.vars[i].value = value;
                return Ok(false);
            }
        }
        self.vars.try_reserve(1)?;
        let mut flags = flags;
        let mut hid = false;
        if let Some(i) = found {
            if self.vars[i].flags & HIDDEN == 0 {
                self.vars[i].flags |= HIDDEN;
                flags |= HIDING;
                hid = true;
            }
        }
        trace!("local {} at level {}", String::from_utf8_lossy(name), level);
        self.vars.push(Var {
            name: name.to_vec(),
            value,
            level,
            flags,
        });
        Ok(hid)
    }

    fn remove_at(&mut self, i: usize) -> Var {
        let var = self.vars.remove(i);
        if var.flags & HIDING != 0 {
            if let Some(j) = self.vars[..i]
                .iter()
                .rposition(|v| v.name == var.name && v.flags & HIDDEN != 0)
            {
                self.vars[j].flags &= !HIDDEN;
            }
        }
        var
    }

    /// Purges `name` if it is global or lives at `level`.
    pub fn purge(&mut self, name: &[u8], level: i32) -> Option<Var> {
        let i = self.lookup(name, level)?;
        let var_level = self.vars[i].level;
        if var_level == GLOBAL || var_level == level {
            Some(self.remove_at(i))
        } else {
            None
        }
    }

    /// Drops every local at `level` or deeper.
    pub fn purge_from_level(&mut self, level: i32) -> usize {
        let mut count = 0;
        while let Some(last) = self.vars.last() {
            if last.level < level || last.level == GLOBAL {
                break;
            }
            let i = self.vars.len() - 1;
            self.remove_at(i);
            count += 1;
        }
        count
    }
}
