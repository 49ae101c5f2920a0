use super::Opcode;

/// One of the five named stack registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackReg {
    X,
    Y,
    Z,
    T,
    L,
}

impl StackReg {
    pub fn from_byte(b: u8) -> Option<StackReg> {
        match b.to_ascii_uppercase() {
            b'X' => Some(StackReg::X),
            b'Y' => Some(StackReg::Y),
            b'Z' => Some(StackReg::Z),
            b'T' => Some(StackReg::T),
            b'L' => Some(StackReg::L),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            StackReg::X => b'X',
            StackReg::Y => b'Y',
            StackReg::Z => b'Z',
            StackReg::T => b'T',
            StackReg::L => b'L',
        }
    }

    /// Distance from the top of the stack, `None` for LASTX.
    pub fn depth(self) -> Option<usize> {
        match self {
            StackReg::X => Some(0),
            StackReg::Y => Some(1),
            StackReg::Z => Some(2),
            StackReg::T => Some(3),
            StackReg::L => None,
        }
    }
}

/// Longest name or short text argument.
pub const MAX_TEXT: usize = 15;
/// Longest `XSTR` payload.
pub const MAX_XSTR: usize = 65535;

/// ## Instruction argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    None,
    Num(u32),
    Stk(StackReg),
    Str(Vec<u8>),
    IndNum(u32),
    IndStk(StackReg),
    IndStr(Vec<u8>),
    /// `A`..`J` and `a`..`e`.
    LocalLabel(u8),
    /// Number literal. The original text is only kept when it can't be
    /// regenerated from the value.
    Number {
        value: f64,
        text: Option<String>,
    },
    XStr(Vec<u8>),
}

impl Arg {
    pub fn number(value: f64, text: Option<&str>) -> Arg {
        let text = match text {
            Some(t) if t != canonical_text(value) => Some(t.to_string()),
            _ => None,
        };
        Arg::Number { value, text }
    }

    pub fn is_local_label(b: u8) -> bool {
        (b'A'..=b'J').contains(&b) || (b'a'..=b'e').contains(&b)
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, Arg::IndNum(_) | Arg::IndStk(_) | Arg::IndStr(_))
    }

    pub fn text(&self) -> Option<&[u8]> {
        match self {
            Arg::Str(s) | Arg::IndStr(s) | Arg::XStr(s) => Some(s),
            _ => None,
        }
    }
}

/// The text a number literal would be shown with if nothing else were
/// known about it.
pub fn canonical_text(value: f64) -> String {
    format!("{}", value)
}

/// ## Decoded instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub arg: Arg,
}

impl Instruction {
    pub fn new(opcode: Opcode, arg: Arg) -> Instruction {
        Instruction { opcode, arg }
    }

    pub fn plain(opcode: Opcode) -> Instruction {
        Instruction {
            opcode,
            arg: Arg::None,
        }
    }

    pub fn is_end(&self) -> bool {
        self.opcode == Opcode::End
    }

    /// `LBL "NAME"`, the only kind of label that is visible across
    /// programs.
    pub fn is_global_label(&self) -> bool {
        self.opcode == Opcode::Lbl && matches!(self.arg, Arg::Str(_))
    }
}

fn quoted(f: &mut std::fmt::Formatter, text: &[u8]) -> std::fmt::Result {
    write!(f, "\"{}\"", String::from_utf8_lossy(text))
}

/// Register and flag numbers are shown with two digits, `SIZE` with four.
fn number_width(opcode: Opcode) -> usize {
    if opcode == Opcode::Size {
        4
    } else {
        2
    }
}

/// Longest number literal shown before it is cut from the left.
const MAX_NUMBER_TEXT: usize = 22;

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match (&self.opcode, &self.arg) {
            (Opcode::Number, Arg::Number { value, text }) => {
                let s = match text {
                    Some(t) => t.clone(),
                    None => canonical_text(*value),
                };
                let len = s.chars().count();
                if len > MAX_NUMBER_TEXT {
                    let tail: String = s.chars().skip(len - MAX_NUMBER_TEXT + 1).collect();
                    write!(f, "…{}", tail)
                } else {
                    write!(f, "{}", s)
                }
            }
            (Opcode::Str, Arg::Str(s)) => quoted(f, s),
            (op, Arg::None) => write!(f, "{}", op),
            (op, Arg::Num(n)) => write!(f, "{} {:02$}", op, n, number_width(*op)),
            (op, Arg::Stk(r)) => write!(f, "{} ST {}", op, r.to_byte() as char),
            (op, Arg::Str(s)) => {
                write!(f, "{} ", op)?;
                quoted(f, s)
            }
            (op, Arg::IndNum(n)) => write!(f, "{} IND {:02}", op, n),
            (op, Arg::IndStk(r)) => write!(f, "{} IND ST {}", op, r.to_byte() as char),
            (op, Arg::IndStr(s)) => {
                write!(f, "{} IND ", op)?;
                quoted(f, s)
            }
            (op, Arg::LocalLabel(c)) => write!(f, "{} {}", op, *c as char),
            (op, Arg::Number { value, .. }) => write!(f, "{} {}", op, canonical_text(*value)),
            (op, Arg::XStr(s)) => {
                write!(f, "{} ", op)?;
                quoted(f, s)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_forms() {
        let i = Instruction::new(Opcode::Sto, Arg::Num(5));
        assert_eq!(i.to_string(), "STO 05");
        let i = Instruction::new(Opcode::Rcl, Arg::IndStk(StackReg::X));
        assert_eq!(i.to_string(), "RCL IND ST X");
        let i = Instruction::new(Opcode::Lbl, Arg::Str(b"FOO".to_vec()));
        assert_eq!(i.to_string(), "LBL \"FOO\"");
        let i = Instruction::new(Opcode::Gto, Arg::LocalLabel(b'A'));
        assert_eq!(i.to_string(), "GTO A");
        let i = Instruction::new(Opcode::Size, Arg::Num(25));
        assert_eq!(i.to_string(), "SIZE 0025");
        let i = Instruction::new(Opcode::Str, Arg::Str(b"HI".to_vec()));
        assert_eq!(i.to_string(), "\"HI\"");
    }

    #[test]
    fn test_number_text() {
        let i = Instruction::new(Opcode::Number, Arg::number(1.5, Some("1.5")));
        assert_eq!(i.arg, Arg::Number { value: 1.5, text: None });
        assert_eq!(i.to_string(), "1.5");
        let i = Instruction::new(Opcode::Number, Arg::number(1000.0, Some("1E3")));
        assert_eq!(i.to_string(), "1E3");
        let long = "1.234567890123456789012345";
        let i = Instruction::new(Opcode::Number, Arg::number(1.2345678901234567, Some(long)));
        let shown = i.to_string();
        assert!(shown.starts_with('…'));
        assert_eq!(shown.chars().count(), 22);
    }
}
