use super::flags::AngleMode;
use super::operation::{check, cexp, cln};
use super::val::{Cell, ComplexMatrix, RealMatrix, Shared};
use super::Val;
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## One argument functions
pub struct Function {}

fn to_radians(x: f64, mode: AngleMode) -> f64 {
    match mode {
        AngleMode::Deg => x.to_radians(),
        AngleMode::Rad => x,
        AngleMode::Grad => x * std::f64::consts::PI / 200.0,
    }
}

fn from_radians(x: f64, mode: AngleMode) -> f64 {
    match mode {
        AngleMode::Deg => x.to_degrees(),
        AngleMode::Rad => x,
        AngleMode::Grad => x * 200.0 / std::f64::consts::PI,
    }
}

const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

fn gamma(x: f64) -> f64 {
    if x < 0.5 {
        std::f64::consts::PI / ((std::f64::consts::PI * x).sin() * gamma(1.0 - x))
    } else {
        let x = x - 1.0;
        let t = x + 7.5;
        let mut a = LANCZOS[0];
        for (i, c) in LANCZOS.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        (2.0 * std::f64::consts::PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
    }
}

impl Function {
    /// Applies `f` to a real or to every cell of a real matrix.
    pub fn real(val: &Val, f: impl Fn(f64) -> Result<f64>) -> Result<Val> {
        match val {
            Val::Real(x) => Ok(Val::Real(check(f(*x)?)?)),
            Val::RealMatrix(m) => {
                let mut cells = Vec::new();
                cells.try_reserve_exact(m.cells().len())?;
                for c in m.cells() {
                    match c {
                        Cell::Number(x) => cells.push(Cell::Number(check(f(*x)?)?)),
                        Cell::Text(_) => return Err(error!(AlphaDataIsInvalid)),
                    }
                }
                let m = RealMatrix::from_cells(m.rows(), m.cols(), cells)?;
                Ok(Val::RealMatrix(Shared::new(m)))
            }
            Val::Str(_) => Err(error!(AlphaDataIsInvalid)),
            _ => Err(error!(InvalidType)),
        }
    }

    pub fn negate(val: &Val) -> Result<Val> {
        match val {
            Val::Complex(re, im) => Ok(Val::Complex(-re, -im)),
            Val::ComplexMatrix(m) => {
                let data = m.data().iter().map(|(re, im)| (-re, -im)).collect();
                let m = ComplexMatrix::from_data(m.rows(), m.cols(), data)?;
                Ok(Val::ComplexMatrix(Shared::new(m)))
            }
            _ => Function::real(val, |x| Ok(-x)),
        }
    }

    pub fn sqrt(val: &Val) -> Result<Val> {
        if let Val::Complex(re, im) = val {
            let (lr, li) = cln((*re, *im))?;
            let (r, i) = cexp((lr / 2.0, li / 2.0));
            return Ok(Val::Complex(check(r)?, check(i)?));
        }
        Function::real(val, |x| {
            if x < 0.0 {
                Err(error!(InvalidData))
            } else {
                Ok(x.sqrt())
            }
        })
    }

    pub fn ln(val: &Val) -> Result<Val> {
        if let Val::Complex(re, im) = val {
            let (r, i) = cln((*re, *im))?;
            return Ok(Val::Complex(check(r)?, check(i)?));
        }
        Function::real(val, |x| {
            if x <= 0.0 {
                Err(error!(InvalidData))
            } else {
                Ok(x.ln())
            }
        })
    }

    pub fn log(val: &Val) -> Result<Val> {
        Function::real(val, |x| {
            if x <= 0.0 {
                Err(error!(InvalidData))
            } else {
                Ok(x.log10())
            }
        })
    }

    pub fn exp(val: &Val) -> Result<Val> {
        if let Val::Complex(re, im) = val {
            let (r, i) = cexp((*re, *im));
            return Ok(Val::Complex(check(r)?, check(i)?));
        }
        Function::real(val, |x| Ok(x.exp()))
    }

    pub fn inv(val: &Val) -> Result<Val> {
        if let Val::Complex(re, im) = val {
            let (r, i) = super::operation::cdiv((1.0, 0.0), (*re, *im))?;
            return Ok(Val::Complex(r, i));
        }
        Function::real(val, |x| {
            if x == 0.0 {
                Err(error!(DivideBy0))
            } else {
                Ok(1.0 / x)
            }
        })
    }

    pub fn abs(val: &Val) -> Result<Val> {
        match val {
            Val::Complex(re, im) => Ok(Val::Real(check(re.hypot(*im))?)),
            _ => Function::real(val, |x| Ok(x.abs())),
        }
    }

    pub fn sign(val: &Val) -> Result<Val> {
        match val {
            Val::Str(_) => Ok(Val::Real(0.0)),
            Val::Complex(re, im) => {
                let r = re.hypot(*im);
                if r == 0.0 {
                    Ok(Val::Complex(0.0, 0.0))
                } else {
                    Ok(Val::Complex(re / r, im / r))
                }
            }
            _ => Function::real(val, |x| {
                Ok(if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                })
            }),
        }
    }

    pub fn sin(val: &Val, mode: AngleMode) -> Result<Val> {
        Function::real(val, |x| Ok(to_radians(x, mode).sin()))
    }

    pub fn cos(val: &Val, mode: AngleMode) -> Result<Val> {
        Function::real(val, |x| Ok(to_radians(x, mode).cos()))
    }

    pub fn tan(val: &Val, mode: AngleMode) -> Result<Val> {
        Function::real(val, |x| {
            let r = to_radians(x, mode);
            if r.cos() == 0.0 {
                Err(error!(OutOfRange))
            } else {
                Ok(r.tan())
            }
        })
    }

    pub fn asin(val: &Val, mode: AngleMode) -> Result<Val> {
        Function::real(val, |x| {
            if x.abs() > 1.0 {
                Err(error!(InvalidData))
            } else {
                Ok(from_radians(x.asin(), mode))
            }
        })
    }

    pub fn acos(val: &Val, mode: AngleMode) -> Result<Val> {
        Function::real(val, |x| {
            if x.abs() > 1.0 {
                Err(error!(InvalidData))
            } else {
                Ok(from_radians(x.acos(), mode))
            }
        })
    }

    pub fn atan(val: &Val, mode: AngleMode) -> Result<Val> {
        Function::real(val, |x| Ok(from_radians(x.atan(), mode)))
    }

    pub fn acosh(val: &Val) -> Result<Val> {
        Function::real(val, |x| {
            if x < 1.0 {
                Err(error!(InvalidData))
            } else {
                Ok(x.acosh())
            }
        })
    }

    pub fn atanh(val: &Val) -> Result<Val> {
        Function::real(val, |x| {
            if x.abs() >= 1.0 {
                Err(error!(InvalidData))
            } else {
                Ok(x.atanh())
            }
        })
    }

    pub fn ln1p(val: &Val) -> Result<Val> {
        Function::real(val, |x| {
            if x <= -1.0 {
                Err(error!(InvalidData))
            } else {
                Ok(x.ln_1p())
            }
        })
    }

    pub fn fact(val: &Val) -> Result<Val> {
        Function::real(val, |x| {
            if x < 0.0 || x.fract() != 0.0 {
                Err(error!(InvalidData))
            } else {
                Ok((1..=x as u64).fold(1.0, |acc, n| acc * n as f64))
            }
        })
    }

    pub fn gamma(val: &Val) -> Result<Val> {
        Function::real(val, |x| {
            if x <= 0.0 && x.fract() == 0.0 {
                Err(error!(InvalidData))
            } else {
                Ok(gamma(x))
            }
        })
    }

    /// H.MMSSss to decimal hours.
    pub fn hms_to_hours(x: f64) -> f64 {
        let sign = x.signum();
        let x = x.abs();
        let h = x.trunc();
        let m = ((x - h) * 100.0 + 1e-9).trunc();
        let s = (x - h) * 10000.0 - m * 100.0;
        sign * (h + m / 60.0 + s / 3600.0)
    }

    /// Decimal hours to H.MMSSss.
    pub fn hours_to_hms(x: f64) -> f64 {
        let sign = x.signum();
        let x = x.abs();
        let h = x.trunc();
        let minutes = (x - h) * 60.0;
        let m = (minutes + 1e-9).trunc();
        let s = (minutes - m) * 60.0;
        sign * (h + m / 100.0 + s / 10000.0)
    }

    pub fn to_angle(x: f64, mode: AngleMode) -> f64 {
        from_radians(x, mode)
    }

    pub fn from_angle(x: f64, mode: AngleMode) -> f64 {
        to_radians(x, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(v: Result<Val>) -> f64 {
        v.unwrap().as_real().unwrap()
    }

    #[test]
    fn test_trig_modes() {
        assert!((real(Function::sin(&Val::Real(30.0), AngleMode::Deg)) - 0.5).abs() < 1e-12);
        assert!((real(Function::cos(&Val::Real(100.0), AngleMode::Grad))).abs() < 1e-12);
        assert!((real(Function::atan(&Val::Real(1.0), AngleMode::Rad)) - 0.785_398_163_397_448_3).abs() < 1e-12);
    }

    #[test]
    fn test_domain_errors() {
        use crate::lang::ErrorCode;
        assert!(Function::ln(&Val::Real(0.0)).unwrap_err().is(ErrorCode::InvalidData));
        assert!(Function::inv(&Val::Real(0.0)).unwrap_err().is(ErrorCode::DivideBy0));
        assert!(Function::sqrt(&Val::Real(-1.0)).is_err());
    }

    #[test]
    fn test_gamma_and_fact() {
        assert_eq!(real(Function::fact(&Val::Real(5.0))), 120.0);
        assert!((real(Function::gamma(&Val::Real(5.0))) - 24.0).abs() < 1e-9);
        assert!((real(Function::gamma(&Val::Real(0.5))) - std::f64::consts::PI.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_hms() {
        assert!((Function::hms_to_hours(1.3) - 1.5).abs() < 1e-9);
        assert!((Function::hours_to_hms(1.75) - 1.45).abs() < 1e-9);
    }
}
