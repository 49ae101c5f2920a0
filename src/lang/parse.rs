use super::{Arg, ArgKind, Instruction, Opcode, StackReg, MAX_TEXT};
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## Command line parser
///
/// Turns one line of text into an instruction. Commands are looked up
/// by name, arguments follow the calculator's listing syntax:
/// `STO 05`, `RCL IND ST X`, `XEQ "FOO"`, `GTO A`, `FIX 04`.

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Empty,
    Complete(Instruction),
    /// The command needs an argument the line did not supply.
    Pending(Opcode),
}

pub fn parse(line: &str) -> Result<Parsed> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Parsed::Empty);
    }
    if line.starts_with('"') {
        let text = unquote(line)?;
        let instr = if text.len() > MAX_TEXT {
            Instruction::new(Opcode::XStr, Arg::XStr(text))
        } else {
            Instruction::new(Opcode::Str, Arg::Str(text))
        };
        return Ok(Parsed::Complete(instr));
    }
    if let Some(value) = parse_number(line) {
        let instr = Instruction::new(Opcode::Number, Arg::number(value, Some(line)));
        return Ok(Parsed::Complete(instr));
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    for take in (1..=words.len().min(3)).rev() {
        if let Some(opcode) = Opcode::from_name(&words[..take].join(" ")) {
            let rest = skip_words(line, take);
            return parse_with_opcode(opcode, rest);
        }
    }
    Err(error!(Nonexistent; "UNKNOWN COMMAND"))
}

/// Completes a pending command with the argument text typed next.
pub fn parse_arg_for(opcode: Opcode, text: &str) -> Result<Parsed> {
    parse_with_opcode(opcode, text.trim())
}

fn parse_with_opcode(opcode: Opcode, rest: &str) -> Result<Parsed> {
    let kind = opcode.arg_kind();
    if rest.is_empty() {
        return match kind {
            ArgKind::None => Ok(Parsed::Complete(Instruction::plain(opcode))),
            _ => Ok(Parsed::Pending(opcode)),
        };
    }
    if kind == ArgKind::None {
        return Err(error!(InvalidData; "UNEXPECTED ARGUMENT"));
    }
    if kind == ArgKind::XStr {
        return Ok(Parsed::Complete(Instruction::new(opcode, Arg::XStr(unquote(rest)?))));
    }
    let arg = parse_arg(rest)?;
    check_arg(opcode, &arg)?;
    Ok(Parsed::Complete(Instruction::new(opcode, arg)))
}

fn skip_words(line: &str, count: usize) -> &str {
    let mut rest = line;
    for _ in 0..count {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or_else(|| rest.len());
        rest = &rest[end..];
    }
    rest.trim()
}

fn unquote(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| error!(InvalidData; "UNTERMINATED STRING"))?;
    Ok(inner.as_bytes().to_vec())
}

fn parse_number(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '.' || first == '-' || first == '+') {
        return None;
    }
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || ".-+eE".contains(c))
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_direct(text: &str) -> Result<Arg> {
    let text = text.trim();
    if text.starts_with('"') {
        let name = unquote(text)?;
        if name.len() > MAX_TEXT {
            return Err(error!(NameTooLong));
        }
        return Ok(Arg::Str(name));
    }
    let upper = text.to_ascii_uppercase();
    if let Some(reg) = upper.strip_prefix("ST ") {
        let reg = reg.trim().as_bytes();
        if reg.len() == 1 {
            if let Some(r) = StackReg::from_byte(reg[0]) {
                return Ok(Arg::Stk(r));
            }
        }
        return Err(error!(InvalidData; "BAD STACK REGISTER"));
    }
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        return text
            .parse::<u32>()
            .map(Arg::Num)
            .map_err(|_| error!(OutOfRange));
    }
    let bytes = text.as_bytes();
    if bytes.len() == 1 && Arg::is_local_label(bytes[0]) {
        return Ok(Arg::LocalLabel(bytes[0]));
    }
    Err(error!(InvalidData; "BAD ARGUMENT"))
}

fn parse_arg(text: &str) -> Result<Arg> {
    let upper = text.to_ascii_uppercase();
    if upper.starts_with("IND ") {
        return match parse_direct(&text[4..])? {
            Arg::Num(n) => Ok(Arg::IndNum(n)),
            Arg::Stk(r) => Ok(Arg::IndStk(r)),
            Arg::Str(s) => Ok(Arg::IndStr(s)),
            _ => Err(error!(InvalidData; "BAD INDIRECT")),
        };
    }
    parse_direct(text)
}

fn check_arg(opcode: Opcode, arg: &Arg) -> Result<()> {
    let limit = match opcode.arg_kind() {
        ArgKind::Num9 => Some(9),
        ArgKind::Num11 => Some(11),
        ArgKind::Num99 => Some(99),
        _ => None,
    };
    match (opcode.arg_kind(), arg) {
        (_, Arg::Num(n)) if limit.map_or(false, |l| *n > l) => Err(error!(OutOfRange)),
        (ArgKind::Program, Arg::Num(_)) | (ArgKind::Program, Arg::LocalLabel(_)) => {
            Err(error!(InvalidData; "GLOBAL LABEL EXPECTED"))
        }
        (ArgKind::Named, Arg::Num(_)) | (ArgKind::Mat, Arg::Num(_)) => {
            Err(error!(InvalidData; "NAME EXPECTED"))
        }
        (ArgKind::Label, Arg::Stk(_)) | (ArgKind::Program, Arg::Stk(_)) => {
            Err(error!(InvalidData; "LABEL EXPECTED"))
        }
        (kind, Arg::LocalLabel(_)) if kind != ArgKind::Label && opcode != Opcode::Lbl => {
            Err(error!(InvalidData; "BAD ARGUMENT"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(line: &str) -> Instruction {
        match parse(line).unwrap() {
            Parsed::Complete(i) => i,
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(complete("+"), Instruction::plain(Opcode::Add));
        assert_eq!(complete("sto 05"), Instruction::new(Opcode::Sto, Arg::Num(5)));
        assert_eq!(
            complete("RCL IND ST X"),
            Instruction::new(Opcode::Rcl, Arg::IndStk(StackReg::X))
        );
        assert_eq!(
            complete("XEQ \"FOO\""),
            Instruction::new(Opcode::Xeq, Arg::Str(b"FOO".to_vec()))
        );
        assert_eq!(complete("LBL A"), Instruction::new(Opcode::Lbl, Arg::LocalLabel(b'A')));
        assert_eq!(complete("GTO .."), Instruction::plain(Opcode::GtoDotDot));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(complete("-2.5").arg, Arg::number(-2.5, None));
        assert_eq!(
            complete("1E3").arg,
            Arg::Number { value: 1000.0, text: Some("1E3".to_string()) }
        );
        assert_eq!(complete("\"HELLO\""), Instruction::new(Opcode::Str, Arg::Str(b"HELLO".to_vec())));
        assert_eq!(complete("\"A VERY LONG STRING OF TEXT\"").opcode, Opcode::XStr);
    }

    #[test]
    fn test_pending_and_errors() {
        assert_eq!(parse("STO").unwrap(), Parsed::Pending(Opcode::Sto));
        assert_eq!(parse("").unwrap(), Parsed::Empty);
        assert!(parse("FIX 12").is_err());
        assert!(parse("+ 3").is_err());
        assert!(parse("BOGUS").is_err());
        assert_eq!(
            parse_arg_for(Opcode::Sto, "\"A\"").unwrap(),
            Parsed::Complete(Instruction::new(Opcode::Sto, Arg::Str(b"A".to_vec())))
        );
    }
}
