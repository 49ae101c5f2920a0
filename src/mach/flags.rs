use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

pub const COUNT: usize = 100;

pub const PRINT_NORM: usize = 15;
pub const PRINT_TRACE: usize = 16;
pub const PRINTER_ENABLE: usize = 21;
pub const ERROR_IGNORE: usize = 25;
pub const STACK_LIFT_DISABLE: usize = 30;
pub const DIGITS_BIT3: usize = 36;
pub const DIGITS_BIT0: usize = 39;
pub const FIX_OR_ALL: usize = 40;
pub const ENG_OR_ALL: usize = 41;
pub const GRAD: usize = 42;
pub const RAD: usize = 43;
pub const PRINTER_EXISTS: usize = 55;
pub const POLAR: usize = 73;

/// User flags 00-35 and 81-99 may be changed by SF/CF; the rest are
/// owned by the engine.
fn user_settable(n: usize) -> bool {
    n <= 35 || n >= 81
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Fix(u8),
    Sci(u8),
    Eng(u8),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleMode {
    Deg,
    Rad,
    Grad,
}

/// ## Calculator flags
#[derive(Clone, PartialEq, Eq)]
pub struct Flags([bool; COUNT]);

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set: Vec<usize> = (0..COUNT).filter(|n| self.0[*n]).collect();
        write!(f, "Flags{:?}", set)
    }
}

impl Default for Flags {
    fn default() -> Flags {
        let mut flags = Flags([false; COUNT]);
        flags.set_display_mode(DisplayMode::Fix(4));
        flags.set(PRINTER_EXISTS, true);
        flags
    }
}

impl Flags {
    pub fn from_slice(bits: &[bool]) -> Result<Flags> {
        if bits.len() != COUNT {
            return Err(error!(InvalidData; "FLAG COUNT"));
        }
        let mut flags = [false; COUNT];
        flags.copy_from_slice(bits);
        Ok(Flags(flags))
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn get(&self, n: usize) -> bool {
        self.0.get(n).copied().unwrap_or(false)
    }

    pub fn set(&mut self, n: usize, value: bool) {
        if let Some(f) = self.0.get_mut(n) {
            *f = value;
        }
    }

    /// `SF`/`CF`: refuses flags the engine owns.
    pub fn set_user(&mut self, n: usize, value: bool) -> Result<()> {
        if n >= COUNT {
            return Err(error!(OutOfRange));
        }
        if !user_settable(n) {
            return Err(error!(RestrictedOperation));
        }
        self.0[n] = value;
        Ok(())
    }

    pub fn display_mode(&self) -> DisplayMode {
        let mut digits = 0u8;
        for n in DIGITS_BIT3..=DIGITS_BIT0 {
            digits = (digits << 1) | self.get(n) as u8;
        }
        match (self.get(FIX_OR_ALL), self.get(ENG_OR_ALL)) {
            (true, true) => DisplayMode::All,
            (true, false) => DisplayMode::Fix(digits),
            (false, true) => DisplayMode::Eng(digits),
            (false, false) => DisplayMode::Sci(digits),
        }
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        let (fix, eng, digits) = match mode {
            DisplayMode::Fix(d) => (true, false, d),
            DisplayMode::Sci(d) => (false, false, d),
            DisplayMode::Eng(d) => (false, true, d),
            DisplayMode::All => (true, true, 0),
        };
        self.set(FIX_OR_ALL, fix);
        self.set(ENG_OR_ALL, eng);
        for (i, n) in (DIGITS_BIT3..=DIGITS_BIT0).enumerate() {
            self.set(n, digits & (8 >> i) != 0);
        }
    }

    pub fn angle_mode(&self) -> AngleMode {
        if self.get(RAD) {
            AngleMode::Rad
        } else if self.get(GRAD) {
            AngleMode::Grad
        } else {
            AngleMode::Deg
        }
    }

    pub fn set_angle_mode(&mut self, mode: AngleMode) {
        self.set(RAD, mode == AngleMode::Rad);
        self.set(GRAD, mode == AngleMode::Grad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mode_bits() {
        let mut flags = Flags::default();
        assert_eq!(flags.display_mode(), DisplayMode::Fix(4));
        flags.set_display_mode(DisplayMode::Eng(11));
        assert_eq!(flags.display_mode(), DisplayMode::Eng(11));
        assert!(flags.get(36) && !flags.get(37) && flags.get(38) && flags.get(39));
        flags.set_display_mode(DisplayMode::All);
        assert_eq!(flags.display_mode(), DisplayMode::All);
    }

    #[test]
    fn test_system_flags_are_protected() {
        let mut flags = Flags::default();
        assert!(flags.set_user(40, true).is_err());
        flags.set_user(25, true).unwrap();
        assert!(flags.get(ERROR_IGNORE));
        assert!(flags.set_user(100, true).is_err());
    }
}
