use crate::error;
use crate::lang::Error;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Strings up to this many bytes are "short"; the state file stores
/// them inline in matrix cells.
pub const SHORT_TEXT: usize = 6;
/// Longest string value.
pub const MAX_STRING: usize = 65535;

/// ## Byte string value
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Text(Vec<u8>);

impl Text {
    pub fn new(bytes: &[u8]) -> Result<Text> {
        if bytes.len() > MAX_STRING {
            return Err(error!(InvalidData; "STRING TOO LONG"));
        }
        let mut v = Vec::new();
        v.try_reserve_exact(bytes.len())?;
        v.extend_from_slice(bytes);
        Ok(Text(v))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_short(&self) -> bool {
        self.0.len() <= SHORT_TEXT
    }
}

impl std::fmt::Debug for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl std::fmt::Display for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// One element of a real matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(Text),
}

/// Duplicates a shared array payload, reporting allocation failure
/// instead of aborting.
pub trait TryClone: Sized {
    fn try_clone(&self) -> Result<Self>;
}

fn try_vec<T: Clone>(src: &[T]) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(src.len())?;
    v.extend_from_slice(src);
    Ok(v)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl RealMatrix {
    pub fn new(rows: usize, cols: usize) -> Result<RealMatrix> {
        if rows == 0 || cols == 0 {
            return Err(error!(DimensionError));
        }
        let n = rows.checked_mul(cols).ok_or_else(|| error!(InsufficientMemory))?;
        let mut cells = Vec::new();
        cells.try_reserve_exact(n)?;
        cells.resize(n, Cell::Number(0.0));
        Ok(RealMatrix { rows, cols, cells })
    }

    pub fn from_cells(rows: usize, cols: usize, cells: Vec<Cell>) -> Result<RealMatrix> {
        if rows == 0 || cols == 0 || rows.checked_mul(cols) != Some(cells.len()) {
            return Err(error!(DimensionError));
        }
        Ok(RealMatrix { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&Cell> {
        if i < self.rows && j < self.cols {
            self.cells.get(i * self.cols + j)
        } else {
            None
        }
    }

    pub fn set(&mut self, i: usize, j: usize, cell: Cell) -> Result<()> {
        if i >= self.rows || j >= self.cols {
            return Err(error!(DimensionError));
        }
        self.cells[i * self.cols + j] = cell;
        Ok(())
    }

    /// Row-major resize keeping the leading elements, like `DIM`.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<()> {
        if rows == 0 || cols == 0 {
            return Err(error!(DimensionError));
        }
        let n = rows.checked_mul(cols).ok_or_else(|| error!(InsufficientMemory))?;
        if n > self.cells.len() {
            self.cells.try_reserve_exact(n - self.cells.len())?;
        }
        self.cells.resize(n, Cell::Number(0.0));
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }
}

impl TryClone for RealMatrix {
    fn try_clone(&self) -> Result<Self> {
        Ok(RealMatrix {
            rows: self.rows,
            cols: self.cols,
            cells: try_vec(&self.cells)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexMatrix {
    rows: usize,
    cols: usize,
    data: Vec<(f64, f64)>,
}

impl ComplexMatrix {
    pub fn new(rows: usize, cols: usize) -> Result<ComplexMatrix> {
        if rows == 0 || cols == 0 {
            return Err(error!(DimensionError));
        }
        let n = rows.checked_mul(cols).ok_or_else(|| error!(InsufficientMemory))?;
        let mut data = Vec::new();
        data.try_reserve_exact(n)?;
        data.resize(n, (0.0, 0.0));
        Ok(ComplexMatrix { rows, cols, data })
    }

    pub fn from_data(rows: usize, cols: usize, data: Vec<(f64, f64)>) -> Result<ComplexMatrix> {
        if rows == 0 || cols == 0 || rows.checked_mul(cols) != Some(data.len()) {
            return Err(error!(DimensionError));
        }
        Ok(ComplexMatrix { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[(f64, f64)] {
        &self.data
    }

    pub fn get(&self, i: usize, j: usize) -> Option<(f64, f64)> {
        if i < self.rows && j < self.cols {
            self.data.get(i * self.cols + j).copied()
        } else {
            None
        }
    }

    pub fn set(&mut self, i: usize, j: usize, re: f64, im: f64) -> Result<()> {
        if i >= self.rows || j >= self.cols {
            return Err(error!(DimensionError));
        }
        self.data[i * self.cols + j] = (re, im);
        Ok(())
    }
}

impl TryClone for ComplexMatrix {
    fn try_clone(&self) -> Result<Self> {
        Ok(ComplexMatrix {
            rows: self.rows,
            cols: self.cols,
            data: try_vec(&self.data)?,
        })
    }
}

impl TryClone for Vec<Val> {
    fn try_clone(&self) -> Result<Self> {
        try_vec(self)
    }
}

/// ## Reference counted array storage
///
/// Cloning shares the payload. The only way to get at it mutably is
/// `make_mut`, which first gives this handle a private copy if anyone
/// else still holds the array.
pub struct Shared<T>(Rc<T>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Shared<T> {
        Shared(Rc::new(value))
    }

    pub fn ptr_eq(a: &Shared<T>, b: &Shared<T>) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.0) > 1
    }

    /// Identity of the backing array, stable while it is alive.
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl<T: TryClone> Shared<T> {
    pub fn make_mut(&mut self) -> Result<&mut T> {
        if Rc::get_mut(&mut self.0).is_none() {
            let copy = self.0.try_clone()?;
            self.0 = Rc::new(copy);
        }
        Rc::get_mut(&mut self.0).ok_or_else(|| error!(InternalError; "SHARED ARRAY"))
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<T> std::ops::Deref for Shared<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Shared<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// ## Value
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Null,
    Real(f64),
    Complex(f64, f64),
    Str(Text),
    RealMatrix(Shared<RealMatrix>),
    ComplexMatrix(Shared<ComplexMatrix>),
    List(Shared<Vec<Val>>),
}

impl Default for Val {
    fn default() -> Val {
        Val::Real(0.0)
    }
}

impl Val {
    pub fn string(bytes: &[u8]) -> Result<Val> {
        Ok(Val::Str(Text::new(bytes)?))
    }

    pub fn list(items: Vec<Val>) -> Val {
        Val::List(Shared::new(items))
    }

    pub fn type_code(&self) -> u8 {
        match self {
            Val::Null => 0,
            Val::Real(_) => 1,
            Val::Complex(..) => 2,
            Val::RealMatrix(_) => 3,
            Val::ComplexMatrix(_) => 4,
            Val::Str(_) => 5,
            Val::List(_) => 6,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Val::Real(_))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Val::RealMatrix(_) | Val::ComplexMatrix(_))
    }

    pub fn as_real(&self) -> Result<f64> {
        match self {
            Val::Real(x) => Ok(*x),
            Val::Str(_) => Err(error!(AlphaDataIsInvalid)),
            _ => Err(error!(InvalidType)),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Val::Real(x) => *x != 0.0,
            _ => true,
        }
    }
}

impl From<f64> for Val {
    fn from(x: f64) -> Val {
        Val::Real(x)
    }
}

impl From<Cell> for Val {
    fn from(cell: Cell) -> Val {
        match cell {
            Cell::Number(x) => Val::Real(x),
            Cell::Text(t) => Val::Str(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_backing_array() {
        let m = RealMatrix::new(2, 2).unwrap();
        let a = Val::RealMatrix(Shared::new(m));
        let b = a.clone();
        match (&a, &b) {
            (Val::RealMatrix(x), Val::RealMatrix(y)) => {
                assert!(Shared::ptr_eq(x, y));
                assert_eq!(x.ref_count(), 2);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_make_mut_copies_when_shared() {
        let mut a = Shared::new(RealMatrix::new(1, 2).unwrap());
        let b = a.clone();
        a.make_mut().unwrap().set(0, 1, Cell::Number(5.0)).unwrap();
        assert!(!Shared::ptr_eq(&a, &b));
        assert_eq!(a.get(0, 1), Some(&Cell::Number(5.0)));
        assert_eq!(b.get(0, 1), Some(&Cell::Number(0.0)));
        let before = a.key();
        a.make_mut().unwrap().set(0, 0, Cell::Number(1.0)).unwrap();
        assert_eq!(a.key(), before);
    }

    #[test]
    fn test_text_limits() {
        assert!(Text::new(b"ABCDEF").unwrap().is_short());
        assert!(!Text::new(b"ABCDEFG").unwrap().is_short());
        assert!(Text::new(&vec![0u8; MAX_STRING + 1]).is_err());
    }

    #[test]
    fn test_matrix_resize_keeps_leading_cells() {
        let mut m = RealMatrix::new(2, 2).unwrap();
        m.set(0, 0, Cell::Number(1.0)).unwrap();
        m.set(1, 1, Cell::Number(4.0)).unwrap();
        m.resize(1, 3).unwrap();
        assert_eq!(m.cells(), &[Cell::Number(1.0), Cell::Number(0.0), Cell::Number(0.0)]);
        assert!(m.set(1, 0, Cell::Number(0.0)).is_err());
    }
}
