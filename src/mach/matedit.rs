use super::val::Cell;
use super::var::{HIDDEN, PRIVATE};
use super::{Runtime, Val};
use crate::error;
use crate::lang::Error;
use log::debug;

type Result<T> = std::result::Result<T, Error>;

/// Private local a parked editor is kept in.
const PACKAGE: &[u8] = b"\x01MAT";

/// ## Matrix editor
///
/// INDEX and EDITN point it at a matrix or list variable; the cursor
/// is zero based. `path` holds the indices of the sublists entered with
/// the right arrow, outermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct MatEdit {
    pub edit: bool,
    pub name: Vec<u8>,
    pub level: i32,
    pub i: usize,
    pub j: usize,
    pub path: Vec<usize>,
}

impl MatEdit {
    pub(super) fn pack(&self) -> Result<Val> {
        let path = self.path.iter().map(|k| Val::Real(*k as f64)).collect();
        Ok(Val::list(vec![
            Val::Real(self.edit as u8 as f64),
            Val::string(&self.name)?,
            Val::Real(self.level as f64),
            Val::Real(self.i as f64),
            Val::Real(self.j as f64),
            Val::list(path),
        ]))
    }

    pub(super) fn unpack(val: &Val) -> Result<MatEdit> {
        let bad = || error!(InternalError; "BAD EDITOR PACKAGE");
        let items = match val {
            Val::List(items) if items.len() == 6 => items,
            _ => return Err(bad()),
        };
        let name = match &items[1] {
            Val::Str(t) => t.as_bytes().to_vec(),
            _ => return Err(bad()),
        };
        let path = match &items[5] {
            Val::List(p) => p
                .iter()
                .map(|v| v.as_real().map(|k| k as usize))
                .collect::<Result<Vec<usize>>>()?,
            _ => return Err(bad()),
        };
        Ok(MatEdit {
            edit: items[0].as_real()? != 0.0,
            name,
            level: items[2].as_real()? as i32,
            i: items[3].as_real()? as usize,
            j: items[4].as_real()? as usize,
            path,
        })
    }
}

/// Rows and columns; a list is one column.
fn dims(val: &Val) -> Result<(usize, usize)> {
    match val {
        Val::RealMatrix(m) => Ok((m.rows(), m.cols())),
        Val::ComplexMatrix(m) => Ok((m.rows(), m.cols())),
        Val::List(l) => Ok((l.len(), 1)),
        _ => Err(error!(InvalidType)),
    }
}

fn element(val: &Val, i: usize, j: usize) -> Result<Val> {
    let found = match val {
        Val::RealMatrix(m) => m.get(i, j).cloned().map(Val::from),
        Val::ComplexMatrix(m) => m.get(i, j).map(|(re, im)| Val::Complex(re, im)),
        Val::List(l) => l.get(i).cloned(),
        _ => return Err(error!(InvalidType)),
    };
    found.ok_or_else(|| error!(DimensionError))
}

impl Runtime {
    fn matedit_ref(&self) -> Result<&MatEdit> {
        self.matedit.as_ref().ok_or_else(|| error!(Nonexistent))
    }

    /// The matrix or list under the cursor, following `path`.
    fn edit_target(&self) -> Result<&Val> {
        let me = self.matedit_ref()?;
        let mut cur = self
            .vars
            .recall(&me.name, self.level())
            .ok_or_else(|| error!(Nonexistent))?;
        for &k in &me.path {
            cur = match cur {
                Val::List(l) => l.get(k).ok_or_else(|| error!(DimensionError))?,
                _ => return Err(error!(InvalidType)),
            };
        }
        Ok(cur)
    }

    /// Same as `edit_target`, unsharing every array on the way down.
    fn edit_target_mut(&mut self) -> Result<&mut Val> {
        let (name, path) = {
            let me = self.matedit_ref()?;
            (me.name.clone(), me.path.clone())
        };
        let index = self
            .vars
            .lookup(&name, self.level())
            .ok_or_else(|| error!(Nonexistent))?;
        let mut cur = self
            .vars
            .value_mut(index)
            .ok_or_else(|| error!(Nonexistent))?;
        for k in path {
            cur = match cur {
                Val::List(l) => l
                    .make_mut()?
                    .get_mut(k)
                    .ok_or_else(|| error!(DimensionError))?,
                _ => return Err(error!(InvalidType)),
            };
        }
        Ok(cur)
    }

    /// `INDEX` and `EDITN`.
    pub(super) fn start_matedit(&mut self, name: &[u8], edit: bool) -> Result<()> {
        let level = self.level();
        let index = self
            .vars
            .lookup(name, level)
            .ok_or_else(|| error!(Nonexistent))?;
        let var = self.vars.get(index).ok_or_else(|| error!(Nonexistent))?;
        dims(&var.value)?;
        self.matedit = Some(MatEdit {
            edit,
            name: name.to_vec(),
            level: var.level,
            i: 0,
            j: 0,
            path: vec![],
        });
        debug!("editing {}", String::from_utf8_lossy(name));
        if edit {
            if let Ok(v) = element(&var.value, 0, 0) {
                self.push_lift(v)?;
            }
        }
        Ok(())
    }

    /// `STOIJ`: Y is the row, X the column, both from 1.
    pub(super) fn stoij(&mut self) -> Result<()> {
        self.stack.require(2)?;
        let j = self.stack.x()?.as_real()?;
        let i = self
            .stack
            .get(1)
            .ok_or_else(|| error!(TooFewArguments))?
            .as_real()?;
        let (rows, cols) = dims(self.edit_target()?)?;
        let is_list = matches!(self.edit_target()?, Val::List(_));
        let max_rows = if is_list { rows + 1 } else { rows };
        if i < 1.0 || j < 1.0 || i > max_rows as f64 || j > cols as f64 {
            return Err(error!(DimensionError));
        }
        if let Some(me) = self.matedit.as_mut() {
            me.i = i as usize - 1;
            me.j = j as usize - 1;
        }
        Ok(())
    }

    /// `RCLIJ`: I into Y, J into X.
    pub(super) fn rclij(&mut self) -> Result<()> {
        let (i, j) = {
            let me = self.matedit_ref()?;
            (me.i, me.j)
        };
        self.push_lift(Val::Real((i + 1) as f64))?;
        self.stack.push(Val::Real((j + 1) as f64))
    }

    /// `STOEL`: X into the element under the cursor. Storing one past
    /// the end of a list appends.
    pub(super) fn stoel(&mut self) -> Result<()> {
        let x = self.stack.x()?.clone();
        let (i, j) = {
            let me = self.matedit_ref()?;
            (me.i, me.j)
        };
        match self.edit_target_mut()? {
            Val::RealMatrix(m) => {
                let cell = match x {
                    Val::Real(x) => Cell::Number(x),
                    Val::Str(t) => Cell::Text(t),
                    _ => return Err(error!(InvalidType)),
                };
                m.make_mut()?.set(i, j, cell)
            }
            Val::ComplexMatrix(m) => {
                let (re, im) = match x {
                    Val::Real(x) => (x, 0.0),
                    Val::Complex(re, im) => (re, im),
                    Val::Str(_) => return Err(error!(AlphaDataIsInvalid)),
                    _ => return Err(error!(InvalidType)),
                };
                m.make_mut()?.set(i, j, re, im)
            }
            Val::List(l) => {
                let items = l.make_mut()?;
                if i < items.len() {
                    items[i] = x;
                } else if i == items.len() {
                    items.try_reserve(1)?;
                    items.push(x);
                } else {
                    return Err(error!(DimensionError));
                }
                Ok(())
            }
            _ => Err(error!(InvalidType)),
        }
    }

    /// `RCLEL`
    pub(super) fn rclel(&mut self) -> Result<()> {
        let (i, j) = {
            let me = self.matedit_ref()?;
            (me.i, me.j)
        };
        let v = element(self.edit_target()?, i, j)?;
        self.push_lift(v)
    }

    /// `I+ I- J+ J-` and the arrow keys. Moving by rows runs down the
    /// columns and moving by columns runs along the rows; both wrap
    /// around the whole matrix.
    pub(super) fn matedit_move(&mut self, di: isize, dj: isize) -> Result<()> {
        let (rows, cols) = dims(self.edit_target()?)?;
        let me = self.matedit.as_mut().ok_or_else(|| error!(Nonexistent))?;
        let total = (rows * cols) as isize;
        if total == 0 {
            me.i = 0;
            me.j = 0;
            return Ok(());
        }
        if di != 0 {
            let pos = (me.j * rows + me.i) as isize;
            let pos = (pos + di).rem_euclid(total) as usize;
            me.i = pos % rows;
            me.j = pos / rows;
        } else {
            let pos = (me.i * cols + me.j) as isize;
            let pos = (pos + dj).rem_euclid(total) as usize;
            me.i = pos / cols;
            me.j = pos % cols;
        }
        Ok(())
    }

    /// `←`: leaves a sublist, otherwise `J-`.
    pub(super) fn matedit_left(&mut self) -> Result<()> {
        let me = self.matedit.as_mut().ok_or_else(|| error!(Nonexistent))?;
        match me.path.pop() {
            Some(k) => {
                me.i = k;
                me.j = 0;
                Ok(())
            }
            None => self.matedit_move(0, -1),
        }
    }

    /// `→`: enters the sublist under the cursor, otherwise `J+`.
    pub(super) fn matedit_right(&mut self) -> Result<()> {
        let i = self.matedit_ref()?.i;
        let sublist = match self.edit_target()? {
            Val::List(l) => match l.get(i) {
                Some(Val::List(_)) => true,
                _ => return Err(error!(InvalidType)),
            },
            _ => false,
        };
        if !sublist {
            return self.matedit_move(0, 1);
        }
        if let Some(me) = self.matedit.as_mut() {
            me.path.push(i);
            me.i = 0;
            me.j = 0;
        }
        Ok(())
    }

    /// `LSTO`. A local hiding the variable being edited parks the
    /// editor in the current frame until it returns.
    pub(super) fn lsto(&mut self, name: &[u8], val: Val) -> Result<()> {
        let level = self.level();
        let hid = self.vars.store_local(name, val, level, 0)?;
        let edited = self.matedit.as_ref().map_or(false, |m| m.name == name);
        if hid && edited {
            self.park_matedit()?;
        }
        Ok(())
    }

    fn park_matedit(&mut self) -> Result<()> {
        let me = match self.matedit.take() {
            Some(me) => me,
            None => return Ok(()),
        };
        if self.rtns.is_empty() {
            debug!("editor ended by local at level 0");
            return Ok(());
        }
        let level = self.level();
        self.vars
            .store_local(PACKAGE, me.pack()?, level, PRIVATE | HIDDEN)?;
        if let Some(f) = self.rtns.last_mut() {
            f.matedit = true;
        }
        debug!("editor parked at level {}", level);
        Ok(())
    }

    /// Brings back an editor parked at `level`, before that level's
    /// locals are purged.
    pub(super) fn restore_matedit(&mut self, level: i32) -> Result<()> {
        let package = match self.vars.recall(PACKAGE, level) {
            Some(v) => v,
            None => return Ok(()),
        };
        self.matedit = Some(MatEdit::unpack(package)?);
        debug!("editor restored from level {}", level);
        Ok(())
    }

    /// Ends the editor when its variable is gone.
    pub(super) fn check_matedit(&mut self) {
        let gone = match &self.matedit {
            Some(me) => self
                .vars
                .recall(&me.name, self.level())
                .map_or(true, |v| dims(v).is_err()),
            None => false,
        };
        if gone {
            debug!("editor target vanished");
            self.matedit = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_round_trip() {
        let me = MatEdit {
            edit: true,
            name: b"M".to_vec(),
            level: 2,
            i: 3,
            j: 1,
            path: vec![4, 0],
        };
        assert_eq!(MatEdit::unpack(&me.pack().unwrap()).unwrap(), me);
    }

    #[test]
    fn test_dims() {
        let l = Val::list(vec![Val::Real(1.0), Val::Real(2.0)]);
        assert_eq!(dims(&l).unwrap(), (2, 1));
        assert!(dims(&Val::Real(1.0)).is_err());
    }
}
