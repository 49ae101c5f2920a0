use super::flags::{AngleMode, DisplayMode, Flags, POLAR};
use super::Val;

/// Largest magnitude shown without an exponent in FIX mode.
const FIX_LIMIT: f64 = 1e12;

fn exponent_form(s: String) -> String {
    match s.find('e') {
        Some(at) => format!("{}E{}", &s[..at], &s[at + 1..]),
        None => s,
    }
}

fn sci(x: f64, digits: usize) -> String {
    exponent_form(format!("{:.*e}", digits, x))
}

fn eng(x: f64, digits: usize) -> String {
    if x == 0.0 {
        return format!("{:.*}E0", digits, 0.0);
    }
    let exp = x.abs().log10().floor() as i32;
    let e3 = exp - exp.rem_euclid(3);
    let mantissa = x / 10f64.powi(e3);
    let decimals = digits.saturating_sub((exp - e3) as usize);
    format!("{:.*}E{}", decimals, mantissa, e3)
}

/// A real the way the display shows it.
pub fn format_real(x: f64, mode: DisplayMode) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "∞" } else { "-∞" }.to_string();
    }
    match mode {
        DisplayMode::All => {
            let a = x.abs();
            if a == 0.0 || (1e-4..FIX_LIMIT).contains(&a) {
                let s = format!("{}", x);
                if s.contains('.') {
                    s
                } else {
                    s + "."
                }
            } else {
                exponent_form(format!("{:e}", x))
            }
        }
        DisplayMode::Fix(d) => {
            let d = d as usize;
            let a = x.abs();
            let smallest = 0.5 * 10f64.powi(-(d as i32));
            if a >= FIX_LIMIT || (a != 0.0 && a < smallest) {
                sci(x, d)
            } else if d == 0 {
                format!("{:.0}.", x)
            } else {
                format!("{:.*}", d, x)
            }
        }
        DisplayMode::Sci(d) => sci(x, d as usize),
        DisplayMode::Eng(d) => eng(x, d as usize),
    }
}

fn from_radians(x: f64, mode: AngleMode) -> f64 {
    match mode {
        AngleMode::Deg => x.to_degrees(),
        AngleMode::Rad => x,
        AngleMode::Grad => x * 200.0 / std::f64::consts::PI,
    }
}

/// Any value the way VIEW, the stack display and the printer show it.
pub fn format_val(val: &Val, flags: &Flags) -> String {
    let mode = flags.display_mode();
    match val {
        Val::Null => "<Null>".to_string(),
        Val::Real(x) => format_real(*x, mode),
        Val::Complex(re, im) => {
            if flags.get(POLAR) {
                let r = re.hypot(*im);
                let phi = from_radians(im.atan2(*re), flags.angle_mode());
                format!("{} ∠{}", format_real(r, mode), format_real(phi, mode))
            } else if *im < 0.0 {
                format!("{} -i{}", format_real(*re, mode), format_real(-im, mode))
            } else {
                format!("{} i{}", format_real(*re, mode), format_real(*im, mode))
            }
        }
        Val::Str(t) => format!("\"{}\"", t),
        Val::RealMatrix(m) => format!("[ {}×{} Matrix ]", m.rows(), m.cols()),
        Val::ComplexMatrix(m) => format!("[ {}×{} Cpx Matrix ]", m.rows(), m.cols()),
        Val::List(l) => format!("{{ {}-Elem List }}", l.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix() {
        assert_eq!(format_real(3.14159, DisplayMode::Fix(4)), "3.1416");
        assert_eq!(format_real(2.0, DisplayMode::Fix(0)), "2.");
        assert_eq!(format_real(0.00001, DisplayMode::Fix(2)), "1.00E-5");
        assert_eq!(format_real(-1e13, DisplayMode::Fix(1)), "-1.0E13");
    }

    #[test]
    fn test_sci_eng_all() {
        assert_eq!(format_real(12345.0, DisplayMode::Sci(2)), "1.23E4");
        assert_eq!(format_real(12345.0, DisplayMode::Eng(2)), "12.3E3");
        assert_eq!(format_real(0.5, DisplayMode::All), "0.5");
        assert_eq!(format_real(7.0, DisplayMode::All), "7.");
        assert_eq!(format_real(1e20, DisplayMode::All), "1E20");
    }

    #[test]
    fn test_values() {
        let flags = Flags::default();
        assert_eq!(format_val(&Val::Complex(1.0, -2.0), &flags), "1.0000 -i2.0000");
        assert_eq!(format_val(&Val::string(b"HI").unwrap(), &flags), "\"HI\"");
        assert_eq!(format_val(&Val::list(vec![Val::Null; 3]), &flags), "{ 3-Elem List }");
    }
}
