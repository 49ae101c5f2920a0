use super::flags::STACK_LIFT_DISABLE;
use super::keybuf::Key;
use super::runtime::Task;
use super::{Runtime, Val};
use crate::error;
use crate::lang::{parse_arg_for, Arg, ArgKind, Error, Instruction, Opcode, Parsed};
use log::debug;

type Result<T> = std::result::Result<T, Error>;

const MANTISSA_DIGITS: usize = 12;
const EXPONENT_DIGITS: usize = 3;

pub const KEY_ENTER: u8 = 13;
pub const KEY_CHS: u8 = 15;
pub const KEY_E: u8 = 16;
pub const KEY_BACKSPACE: u8 = 17;
pub const KEY_UP: u8 = 18;
pub const KEY_DOWN: u8 = 23;
pub const KEY_EXIT: u8 = 33;
pub const KEY_DOT: u8 = 35;
pub const KEY_RUN: u8 = 36;

/// ## Number entry
///
/// The digits typed so far, exactly as shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    text: String,
}

impl Entry {
    pub fn from_text(text: &str) -> Entry {
        Entry {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.text.find('E') {
            Some(i) => (&self.text[..i], Some(&self.text[i + 1..])),
            None => (&self.text, None),
        }
    }

    pub fn digit(&mut self, d: char) {
        let (mantissa, exponent) = self.split();
        let full = match exponent {
            Some(e) => e.trim_start_matches('-').len() >= EXPONENT_DIGITS,
            None => mantissa.chars().filter(char::is_ascii_digit).count() >= MANTISSA_DIGITS,
        };
        if !full {
            self.text.push(d);
        }
    }

    pub fn dot(&mut self) {
        if self.text.contains('.') || self.text.contains('E') {
            return;
        }
        if self.split().0.trim_start_matches('-').is_empty() {
            self.text.push('0');
        }
        self.text.push('.');
    }

    pub fn exponent(&mut self) {
        if self.text.contains('E') {
            return;
        }
        if !self.text.chars().any(|c| c.is_ascii_digit()) {
            self.text.push('1');
        }
        self.text.push('E');
    }

    pub fn chs(&mut self) {
        match self.text.find('E') {
            Some(i) => {
                if self.text[i + 1..].starts_with('-') {
                    self.text.remove(i + 1);
                } else {
                    self.text.insert(i + 1, '-');
                }
            }
            None => {
                if self.text.starts_with('-') {
                    self.text.remove(0);
                } else {
                    self.text.insert(0, '-');
                }
            }
        }
    }

    /// Returns false once nothing is left.
    pub fn backspace(&mut self) -> bool {
        self.text.pop();
        !self.text.is_empty() && self.text != "-"
    }

    pub fn value(&self) -> Result<f64> {
        let (mantissa, exponent) = self.split();
        let mantissa = match mantissa.trim_start_matches('-') {
            "" | "." => "0",
            _ => mantissa,
        };
        let exponent = match exponent {
            None | Some("") | Some("-") => "0",
            Some(e) => e,
        };
        let x: f64 = format!("{}E{}", mantissa, exponent)
            .parse()
            .map_err(|_| error!(InvalidData))?;
        if x.is_finite() {
            Ok(x)
        } else {
            Err(error!(OutOfRange))
        }
    }
}

fn digit_of(code: u8) -> Option<char> {
    match code {
        19 => Some('7'),
        20 => Some('8'),
        21 => Some('9'),
        24 => Some('4'),
        25 => Some('5'),
        26 => Some('6'),
        29 => Some('1'),
        30 => Some('2'),
        31 => Some('3'),
        34 => Some('0'),
        _ => None,
    }
}

/// The command on a key, `None` for menus and for keys handled
/// elsewhere.
fn key_opcode(shift: bool, code: u8) -> Option<Opcode> {
    use Opcode::*;
    let op = match (shift, code) {
        (false, 1) => SigmaAdd,
        (true, 1) => SigmaSub,
        (false, 2) => Inv,
        (true, 2) => YPowX,
        (false, 3) => Sqrt,
        (true, 3) => Square,
        (false, 4) => Log,
        (true, 4) => TenPowX,
        (false, 5) => Ln,
        (true, 5) => EPowX,
        (false, 6) => Xeq,
        (true, 6) => Gto,
        (false, 7) => Sto,
        (true, 7) => Complex,
        (false, 8) => Rcl,
        (true, 8) => Percent,
        (false, 9) => RDn,
        (true, 9) => Pi,
        (false, 10) => Sin,
        (true, 10) => Asin,
        (false, 11) => Cos,
        (true, 11) => Acos,
        (false, 12) => Tan,
        (true, 12) => Atan,
        (false, KEY_ENTER) => Enter,
        (false, 14) => Swap,
        (true, 14) => LastX,
        (false, KEY_CHS) => Chs,
        (_, KEY_UP) => Bst,
        (_, KEY_DOWN) => Sst,
        (false, 22) => Div,
        (false, 27) => Mul,
        (false, 32) => Sub,
        (false, 37) => Add,
        _ => return None,
    };
    Some(op)
}

impl Runtime {
    /// Turns a finished number entry into a NUMBER instruction, executed
    /// or inserted like any other.
    pub(super) fn finish_entry(&mut self) -> Result<()> {
        let entry = match self.entry.take() {
            Some(e) => e,
            None => return Ok(()),
        };
        let value = entry.value()?;
        let instr = Instruction::new(Opcode::Number, Arg::number(value, Some(entry.text())));
        self.enter_instruction(instr);
        Ok(())
    }

    /// One key press, HP-42S key codes 1 to 37. While a program runs
    /// keys are queued for GETKEY; R/S and EXIT stop it.
    pub fn keydown(&mut self, shift: bool, code: u8) {
        let key = Key { shift, code };
        if self.task == Some(Task::GetKey) || self.running {
            if self.task != Some(Task::GetKey) && !shift && (code == KEY_RUN || code == KEY_EXIT) {
                debug!("stopped from keyboard");
                self.stop();
            } else if !self.keybuf.push(key) {
                debug!("key buffer full, dropped {:?}", key);
            }
            return;
        }
        if let Some(op) = self.pending {
            self.pending_key(op, shift, code);
            return;
        }
        if !shift {
            if let Some(d) = digit_of(code) {
                self.entry.get_or_insert_with(Entry::default).digit(d);
                return;
            }
            match code {
                KEY_DOT => {
                    self.entry.get_or_insert_with(Entry::default).dot();
                    return;
                }
                KEY_E => {
                    self.entry.get_or_insert_with(Entry::default).exponent();
                    return;
                }
                KEY_CHS if self.entry.is_some() => {
                    if let Some(e) = self.entry.as_mut() {
                        e.chs();
                    }
                    return;
                }
                KEY_BACKSPACE => {
                    self.backspace();
                    return;
                }
                KEY_EXIT => {
                    self.entry = None;
                    self.exit();
                    return;
                }
                KEY_RUN => {
                    self.run_stop();
                    return;
                }
                _ => {}
            }
        } else if code == KEY_RUN {
            self.toggle_prgm_mode();
            return;
        }
        match key_opcode(shift, code) {
            Some(op) => self.press(op),
            None => debug!("key {:?} has no command", key),
        }
    }

    fn press(&mut self, op: Opcode) {
        if let Err(e) = self.finish_entry() {
            self.handle_error(e);
            return;
        }
        if op.arg_kind() == ArgKind::None {
            self.enter_instruction(Instruction::plain(op));
        } else {
            self.pending = Some(op);
            self.cmdline.clear();
        }
    }

    /// Digits for a pending command; two complete it, ENTER takes what
    /// is there.
    fn pending_key(&mut self, op: Opcode, shift: bool, code: u8) {
        if shift {
            return;
        }
        match code {
            KEY_EXIT => {
                self.exit();
                return;
            }
            KEY_BACKSPACE => {
                if self.cmdline.pop().is_none() {
                    self.pending = None;
                }
                return;
            }
            KEY_ENTER => {}
            _ => match digit_of(code) {
                Some(d) => {
                    self.cmdline.push(d);
                    if self.cmdline.len() < 2 {
                        return;
                    }
                }
                None => return,
            },
        }
        let text = std::mem::take(&mut self.cmdline);
        self.pending = None;
        match parse_arg_for(op, &text) {
            Ok(Parsed::Complete(instr)) => self.enter_instruction(instr),
            Ok(Parsed::Pending(op)) => self.pending = Some(op),
            Ok(Parsed::Empty) => {}
            Err(e) => self.handle_error(e),
        }
    }

    /// `←`: edits the entry, otherwise deletes the line in program mode
    /// or clears X.
    fn backspace(&mut self) {
        if let Some(e) = self.entry.as_mut() {
            if !e.backspace() {
                self.entry = None;
                let cleared = self.stack.set_x(Val::Real(0.0));
                self.flags.set(STACK_LIFT_DISABLE, true);
                if let Err(e) = cleared {
                    self.handle_error(e);
                }
            }
            return;
        }
        if self.prgm_mode {
            let result = self.delete_line();
            if let Err(e) = result {
                self.handle_error(e);
            }
        } else {
            self.enter_instruction(Instruction::plain(Opcode::ClX));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(keys: &str) -> Entry {
        let mut e = Entry::default();
        for c in keys.chars() {
            match c {
                '.' => e.dot(),
                'E' => e.exponent(),
                '~' => e.chs(),
                d => e.digit(d),
            }
        }
        e
    }

    #[test]
    fn test_entry_text_and_value() {
        let e = typed("12.5E~3");
        assert_eq!(e.text(), "12.5E-3");
        assert_eq!(e.value().unwrap(), 0.0125);
        assert_eq!(typed(".5").text(), "0.5");
        assert_eq!(typed("E").value().unwrap(), 1.0);
        assert_eq!(typed("5~").value().unwrap(), -5.0);
    }

    #[test]
    fn test_entry_limits() {
        assert_eq!(typed("1234567890123").text(), "123456789012");
        assert_eq!(typed("1E1234").text(), "1E123");
        assert!(typed("9E999").value().unwrap_err().is(crate::lang::ErrorCode::OutOfRange));
    }

    #[test]
    fn test_backspace() {
        let mut e = typed("12");
        assert!(e.backspace());
        assert!(!e.backspace());
    }
}
