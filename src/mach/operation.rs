use super::val::{Cell, ComplexMatrix, RealMatrix, Shared};
use super::Val;
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;
type Cpx = (f64, f64);

/// ## Two argument arithmetic
///
/// `lhs` is Y and `rhs` is X, so `subtract(y, x)` is `Y - X`.
pub struct Operation {}

pub fn check(x: f64) -> Result<f64> {
    if x.is_nan() {
        Err(error!(InvalidData))
    } else if x.is_infinite() {
        Err(error!(OutOfRange))
    } else {
        Ok(x)
    }
}

fn check_cpx((re, im): Cpx) -> Result<Val> {
    Ok(Val::Complex(check(re)?, check(im)?))
}

fn cell_real(cell: &Cell) -> Result<f64> {
    match cell {
        Cell::Number(x) => Ok(*x),
        Cell::Text(_) => Err(error!(AlphaDataIsInvalid)),
    }
}

fn map_real(m: &RealMatrix, f: impl Fn(f64) -> Result<f64>) -> Result<Val> {
    let mut cells = Vec::new();
    cells.try_reserve_exact(m.cells().len())?;
    for c in m.cells() {
        cells.push(Cell::Number(check(f(cell_real(c)?)?)?));
    }
    let m = RealMatrix::from_cells(m.rows(), m.cols(), cells)?;
    Ok(Val::RealMatrix(Shared::new(m)))
}

fn map_cpx(m: &ComplexMatrix, f: impl Fn(Cpx) -> Result<Cpx>) -> Result<Val> {
    let mut data = Vec::new();
    data.try_reserve_exact(m.data().len())?;
    for c in m.data() {
        let (re, im) = f(*c)?;
        data.push((check(re)?, check(im)?));
    }
    let m = ComplexMatrix::from_data(m.rows(), m.cols(), data)?;
    Ok(Val::ComplexMatrix(Shared::new(m)))
}

fn zip_real(a: &RealMatrix, b: &RealMatrix, f: impl Fn(f64, f64) -> Result<f64>) -> Result<Val> {
    if a.rows() != b.rows() || a.cols() != b.cols() {
        return Err(error!(DimensionError));
    }
    let mut cells = Vec::new();
    cells.try_reserve_exact(a.cells().len())?;
    for (x, y) in a.cells().iter().zip(b.cells()) {
        cells.push(Cell::Number(check(f(cell_real(x)?, cell_real(y)?)?)?));
    }
    let m = RealMatrix::from_cells(a.rows(), a.cols(), cells)?;
    Ok(Val::RealMatrix(Shared::new(m)))
}

pub fn cmul(a: Cpx, b: Cpx) -> Cpx {
    (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
}

pub fn cdiv(a: Cpx, b: Cpx) -> Result<Cpx> {
    let d = b.0 * b.0 + b.1 * b.1;
    if d == 0.0 {
        return Err(error!(DivideBy0));
    }
    Ok(((a.0 * b.0 + a.1 * b.1) / d, (a.1 * b.0 - a.0 * b.1) / d))
}

pub fn cln(a: Cpx) -> Result<Cpx> {
    if a == (0.0, 0.0) {
        return Err(error!(InvalidData));
    }
    Ok((a.0.hypot(a.1).ln(), a.1.atan2(a.0)))
}

pub fn cexp(a: Cpx) -> Cpx {
    let r = a.0.exp();
    (r * a.1.cos(), r * a.1.sin())
}

fn as_cpx(v: &Val) -> Option<Cpx> {
    match v {
        Val::Real(x) => Some((*x, 0.0)),
        Val::Complex(re, im) => Some((*re, *im)),
        _ => None,
    }
}

/// The shapes every elementwise operation accepts.
fn elementwise(
    lhs: &Val,
    rhs: &Val,
    re: impl Fn(f64, f64) -> Result<f64>,
    cx: impl Fn(Cpx, Cpx) -> Result<Cpx>,
) -> Result<Val> {
    use Val::*;
    match (lhs, rhs) {
        (Real(a), Real(b)) => Ok(Real(check(re(*a, *b)?)?)),
        (Complex(..), Real(_)) | (Real(_), Complex(..)) | (Complex(..), Complex(..)) => {
            match (as_cpx(lhs), as_cpx(rhs)) {
                (Some(a), Some(b)) => check_cpx(cx(a, b)?),
                _ => Err(error!(InternalError)),
            }
        }
        (RealMatrix(m), Real(b)) => map_real(m, |a| re(a, *b)),
        (Real(a), RealMatrix(m)) => map_real(m, |b| re(*a, b)),
        (RealMatrix(a), RealMatrix(b)) => zip_real(a, b, &re),
        (ComplexMatrix(m), Real(_)) | (ComplexMatrix(m), Complex(..)) => {
            let b = as_cpx(rhs).ok_or_else(|| error!(InternalError))?;
            map_cpx(m, |a| cx(a, b))
        }
        (Real(_), ComplexMatrix(m)) | (Complex(..), ComplexMatrix(m)) => {
            let a = as_cpx(lhs).ok_or_else(|| error!(InternalError))?;
            map_cpx(m, |b| cx(a, b))
        }
        (Str(_), _) | (_, Str(_)) => Err(error!(AlphaDataIsInvalid)),
        _ => Err(error!(InvalidType)),
    }
}

impl Operation {
    pub fn add(lhs: &Val, rhs: &Val) -> Result<Val> {
        elementwise(lhs, rhs, |a, b| Ok(a + b), |a, b| Ok((a.0 + b.0, a.1 + b.1)))
    }

    pub fn subtract(lhs: &Val, rhs: &Val) -> Result<Val> {
        elementwise(lhs, rhs, |a, b| Ok(a - b), |a, b| Ok((a.0 - b.0, a.1 - b.1)))
    }

    pub fn multiply(lhs: &Val, rhs: &Val) -> Result<Val> {
        if let (Val::RealMatrix(a), Val::RealMatrix(b)) = (lhs, rhs) {
            return Operation::matrix_product(a, b);
        }
        elementwise(lhs, rhs, |a, b| Ok(a * b), |a, b| Ok(cmul(a, b)))
    }

    pub fn divide(lhs: &Val, rhs: &Val) -> Result<Val> {
        if rhs.is_matrix() {
            return Err(error!(NotYetImplemented));
        }
        elementwise(
            lhs,
            rhs,
            |a, b| {
                if b == 0.0 {
                    Err(error!(DivideBy0))
                } else {
                    Ok(a / b)
                }
            },
            cdiv,
        )
    }

    /// `Y↑X`.
    pub fn power(lhs: &Val, rhs: &Val) -> Result<Val> {
        match (lhs, rhs) {
            (Val::Real(y), Val::Real(x)) => {
                if *y == 0.0 && *x < 0.0 {
                    return Err(error!(InvalidData));
                }
                if *y < 0.0 && x.fract() != 0.0 {
                    let r = cexp(cmul((*x, 0.0), cln((*y, 0.0))?));
                    return check_cpx(r);
                }
                Ok(Val::Real(check(y.powf(*x))?))
            }
            _ if lhs.is_matrix() || rhs.is_matrix() => Err(error!(InvalidType)),
            _ => elementwise(
                lhs,
                rhs,
                |y, x| Ok(y.powf(x)),
                |y, x| {
                    if y == (0.0, 0.0) {
                        Ok((0.0, 0.0))
                    } else {
                        Ok(cexp(cmul(x, cln(y)?)))
                    }
                },
            ),
        }
    }

    fn matrix_product(a: &RealMatrix, b: &RealMatrix) -> Result<Val> {
        if a.cols() != b.rows() {
            return Err(error!(DimensionError));
        }
        let mut m = RealMatrix::new(a.rows(), b.cols())?;
        for i in 0..a.rows() {
            for j in 0..b.cols() {
                let mut sum = 0.0;
                for k in 0..a.cols() {
                    let x = a.get(i, k).ok_or_else(|| error!(InternalError))?;
                    let y = b.get(k, j).ok_or_else(|| error!(InternalError))?;
                    sum += cell_real(x)? * cell_real(y)?;
                }
                m.set(i, j, Cell::Number(check(sum)?))?;
            }
        }
        Ok(Val::RealMatrix(Shared::new(m)))
    }

    /// Reals only.
    pub fn real2(lhs: &Val, rhs: &Val, f: impl Fn(f64, f64) -> Result<f64>) -> Result<Val> {
        Ok(Val::Real(check(f(lhs.as_real()?, rhs.as_real()?)?)?))
    }

    /// `X=Y?` and `X≠Y?` compare any two values.
    pub fn equal(lhs: &Val, rhs: &Val) -> bool {
        lhs == rhs
    }

    /// Ordering tests need reals.
    pub fn compare(lhs: &Val, rhs: &Val) -> Result<std::cmp::Ordering> {
        let (a, b) = (lhs.as_real()?, rhs.as_real()?);
        a.partial_cmp(&b).ok_or_else(|| error!(InvalidData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: usize, cols: usize, xs: &[f64]) -> Val {
        let cells = xs.iter().map(|x| Cell::Number(*x)).collect();
        Val::RealMatrix(Shared::new(RealMatrix::from_cells(rows, cols, cells).unwrap()))
    }

    #[test]
    fn test_real_and_complex() {
        assert_eq!(Operation::add(&Val::Real(1.0), &Val::Real(2.0)).unwrap(), Val::Real(3.0));
        assert_eq!(
            Operation::multiply(&Val::Complex(0.0, 1.0), &Val::Complex(0.0, 1.0)).unwrap(),
            Val::Complex(-1.0, 0.0)
        );
        assert!(Operation::divide(&Val::Real(1.0), &Val::Real(0.0))
            .unwrap_err()
            .is(crate::lang::ErrorCode::DivideBy0));
        assert!(Operation::multiply(&Val::Real(1e200), &Val::Real(1e200))
            .unwrap_err()
            .is(crate::lang::ErrorCode::OutOfRange));
    }

    #[test]
    fn test_matrix() {
        let a = matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            Operation::multiply(&a, &Val::Real(2.0)).unwrap(),
            matrix(2, 2, &[2.0, 4.0, 6.0, 8.0])
        );
        assert_eq!(
            Operation::multiply(&a, &a).unwrap(),
            matrix(2, 2, &[7.0, 10.0, 15.0, 22.0])
        );
        let b = matrix(1, 2, &[1.0, 1.0]);
        assert!(Operation::add(&a, &b).is_err());
    }

    #[test]
    fn test_strings_are_rejected() {
        let s = Val::string(b"A").unwrap();
        assert!(Operation::add(&s, &Val::Real(1.0))
            .unwrap_err()
            .is(crate::lang::ErrorCode::AlphaDataIsInvalid));
        assert!(Operation::equal(&s, &Val::string(b"A").unwrap()));
    }
}
