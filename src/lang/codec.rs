/*!
## Bytecode codec

An instruction occupies two header bytes followed by its argument:

```text
byte 0   opcode bits 0-7
byte 1   bit 7     number literal has its original text appended
         bits 4-6  opcode bits 8-10
         bits 0-3  argument type, bit 3 marking indirect
```

The argument types are self-terminating so the length of any
instruction can be found from its own bytes, which is what lets the
engine step through a program without an index.

*/

use super::{Arg, Instruction, Opcode, StackReg, MAX_TEXT, MAX_XSTR};
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

pub const ARG_NONE: u8 = 0;
pub const ARG_NUM: u8 = 1;
pub const ARG_NEG_NUM: u8 = 2;
pub const ARG_STK: u8 = 3;
pub const ARG_STR: u8 = 4;
pub const ARG_LCLBL: u8 = 5;
pub const ARG_DOUBLE: u8 = 6;
pub const ARG_XSTR: u8 = 7;
pub const ARG_IND: u8 = 8;

const TEXT_FLAG: u8 = 0x80;
const STOP_BIT: u8 = 0x80;

/// Size of the jump cache after GTO/XEQ with a local target.
pub const CACHE_LEN: usize = 4;
/// Encoded instructions other than XSTR are staged in a buffer this big.
pub const STAGING_LIMIT: usize = 100;

/// Where an instruction ended up and where its jump cache lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub instr: Instruction,
    pub len: usize,
    /// Offset of the four cache bytes, for GTO/XEQ with a local target.
    pub cache: Option<usize>,
}

fn caches_target(opcode: Opcode, argtype: u8) -> bool {
    opcode.has_target_cache() && (argtype == ARG_NUM || argtype == ARG_LCLBL)
}

fn push_varint(out: &mut Vec<u8>, mut n: u32) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    loop {
        groups[count] = (n & 0x7F) as u8;
        count += 1;
        n >>= 7;
        if n == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let b = groups[i];
        out.push(if i == 0 { b | STOP_BIT } else { b });
    }
}

fn read_varint(buf: &[u8], mut pos: usize) -> Option<(u32, usize)> {
    let mut n: u32 = 0;
    for _ in 0..5 {
        let b = *buf.get(pos)?;
        pos += 1;
        n = (n << 7) | (b & 0x7F) as u32;
        if b & STOP_BIT != 0 {
            return Some((n, pos));
        }
    }
    None
}

fn push_text(out: &mut Vec<u8>, text: &[u8]) -> Result<()> {
    if text.len() > MAX_TEXT {
        return Err(error!(NameTooLong));
    }
    out.push(text.len() as u8);
    out.extend_from_slice(text);
    Ok(())
}

/// Integral literals that print the way they were typed are stored as
/// varints; everything else keeps the full double.
fn as_small_integer(value: f64, text: &Option<String>) -> Option<(u8, u32)> {
    if text.is_some() || value.fract() != 0.0 || value.abs() > i32::MAX as f64 {
        return None;
    }
    if value == 0.0 && value.is_sign_negative() {
        return None;
    }
    if value < 0.0 {
        Some((ARG_NEG_NUM, (-value) as u32))
    } else {
        Some((ARG_NUM, value as u32))
    }
}

pub fn encode(instr: &Instruction) -> Result<Vec<u8>> {
    let code = instr.opcode.code();
    let mut out = vec![(code & 0xFF) as u8, 0];
    let high = (((code >> 8) & 0x07) as u8) << 4;
    let argtype = match &instr.arg {
        Arg::None => ARG_NONE,
        Arg::Num(n) => {
            push_varint(&mut out, *n);
            ARG_NUM
        }
        Arg::IndNum(n) => {
            push_varint(&mut out, *n);
            ARG_IND | ARG_NUM
        }
        Arg::Stk(r) => {
            out.push(r.to_byte());
            ARG_STK
        }
        Arg::IndStk(r) => {
            out.push(r.to_byte());
            ARG_IND | ARG_STK
        }
        Arg::Str(s) => {
            push_text(&mut out, s)?;
            ARG_STR
        }
        Arg::IndStr(s) => {
            push_text(&mut out, s)?;
            ARG_IND | ARG_STR
        }
        Arg::LocalLabel(c) => {
            if !Arg::is_local_label(*c) {
                return Err(error!(InvalidData; "NOT A LOCAL LABEL"));
            }
            out.push(*c);
            ARG_LCLBL
        }
        Arg::Number { value, text } => match as_small_integer(*value, text) {
            Some((argtype, n)) => {
                push_varint(&mut out, n);
                argtype
            }
            None => {
                out.extend_from_slice(&value.to_bits().to_be_bytes());
                if let Some(t) = text {
                    if t.as_bytes().contains(&0) {
                        return Err(error!(InvalidData));
                    }
                    out.extend_from_slice(t.as_bytes());
                    out.push(0);
                    out[1] |= TEXT_FLAG;
                }
                ARG_DOUBLE
            }
        },
        Arg::XStr(s) => {
            if s.len() > MAX_XSTR {
                return Err(error!(InvalidData; "STRING TOO LONG"));
            }
            out.extend_from_slice(&(s.len() as u16).to_be_bytes());
            out.extend_from_slice(s);
            ARG_XSTR
        }
    };
    out[1] |= high | argtype;
    if caches_target(instr.opcode, argtype) {
        out.extend_from_slice(&[0xFF; CACHE_LEN]);
    }
    if argtype != ARG_XSTR && out.len() > STAGING_LIMIT {
        return Err(error!(InvalidData; "INSTRUCTION TOO LONG"));
    }
    Ok(out)
}

/// Length of the instruction at `pc`, or `None` if the bytes there are
/// not a complete instruction. Used to validate programs read from
/// outside the engine.
pub fn checked_length(buf: &[u8], pc: usize) -> Option<usize> {
    let b0 = *buf.get(pc)?;
    let b1 = *buf.get(pc + 1)?;
    let code = b0 as u16 | (((b1 >> 4) & 0x07) as u16) << 8;
    let opcode = Opcode::from_code(code)?;
    let argtype = b1 & 0x0F;
    let mut pos = pc + 2;
    match argtype {
        ARG_NONE => {}
        ARG_NUM | ARG_NEG_NUM | 0x09 => pos = read_varint(buf, pos)?.1,
        ARG_STK | ARG_LCLBL | 0x0B => pos += 1,
        ARG_STR | 0x0C => pos += 1 + *buf.get(pos)? as usize,
        ARG_DOUBLE => {
            pos += 8;
            if b1 & TEXT_FLAG != 0 {
                while *buf.get(pos)? != 0 {
                    pos += 1;
                }
                pos += 1;
            }
        }
        ARG_XSTR => {
            let hi = *buf.get(pos)? as usize;
            let lo = *buf.get(pos + 1)? as usize;
            pos += 2 + (hi << 8 | lo);
        }
        _ => return None,
    }
    if caches_target(opcode, argtype) {
        pos += CACHE_LEN;
    }
    if pos > buf.len() {
        return None;
    }
    Some(pos - pc)
}

/// Length of the well-formed instruction at `pc`.
pub fn instruction_length(buf: &[u8], pc: usize) -> usize {
    checked_length(buf, pc).unwrap_or_else(|| buf.len().saturating_sub(pc))
}

/// Decodes the well-formed instruction at `pc`.
pub fn decode(buf: &[u8], pc: usize) -> Decoded {
    let b1 = buf[pc + 1];
    let code = buf[pc] as u16 | (((b1 >> 4) & 0x07) as u16) << 8;
    let opcode = Opcode::from_code(code).unwrap_or(Opcode::Null);
    let argtype = b1 & 0x0F;
    let mut pos = pc + 2;
    let stk = |b: u8| StackReg::from_byte(b).unwrap_or(StackReg::X);
    let arg = match argtype {
        ARG_NUM | ARG_NEG_NUM | 0x09 => {
            let (n, next) = read_varint(buf, pos).unwrap_or((0, buf.len()));
            pos = next;
            match (opcode, argtype) {
                (Opcode::Number, ARG_NEG_NUM) => Arg::Number {
                    value: -(n as f64),
                    text: None,
                },
                (Opcode::Number, _) => Arg::Number {
                    value: n as f64,
                    text: None,
                },
                (_, 0x09) => Arg::IndNum(n),
                _ => Arg::Num(n),
            }
        }
        ARG_STK => {
            pos += 1;
            Arg::Stk(stk(buf[pos - 1]))
        }
        0x0B => {
            pos += 1;
            Arg::IndStk(stk(buf[pos - 1]))
        }
        ARG_LCLBL => {
            pos += 1;
            Arg::LocalLabel(buf[pos - 1])
        }
        ARG_STR | 0x0C => {
            let len = buf[pos] as usize;
            let text = buf[pos + 1..pos + 1 + len].to_vec();
            pos += 1 + len;
            if argtype == ARG_STR {
                Arg::Str(text)
            } else {
                Arg::IndStr(text)
            }
        }
        ARG_DOUBLE => {
            let mut bits = [0u8; 8];
            bits.copy_from_slice(&buf[pos..pos + 8]);
            pos += 8;
            let value = f64::from_bits(u64::from_be_bytes(bits));
            let text = if b1 & TEXT_FLAG != 0 {
                let start = pos;
                while buf[pos] != 0 {
                    pos += 1;
                }
                pos += 1;
                Some(String::from_utf8_lossy(&buf[start..pos - 1]).into_owned())
            } else {
                None
            };
            Arg::Number { value, text }
        }
        ARG_XSTR => {
            let len = (buf[pos] as usize) << 8 | buf[pos + 1] as usize;
            let text = buf[pos + 2..pos + 2 + len].to_vec();
            pos += 2 + len;
            Arg::XStr(text)
        }
        _ => Arg::None,
    };
    let cache = if caches_target(opcode, argtype) {
        pos += CACHE_LEN;
        Some(pos - CACHE_LEN)
    } else {
        None
    };
    Decoded {
        instr: Instruction { opcode, arg },
        len: pos - pc,
        cache,
    }
}

/// Reads a jump cache; all ones means nothing is cached yet.
pub fn read_cache(buf: &[u8], at: usize) -> Option<usize> {
    let mut b = [0u8; CACHE_LEN];
    b.copy_from_slice(&buf[at..at + CACHE_LEN]);
    match u32::from_be_bytes(b) {
        u32::MAX => None,
        target => Some(target as usize),
    }
}

pub fn write_cache(buf: &mut [u8], at: usize, target: Option<usize>) {
    let v = match target {
        Some(t) => t as u32,
        None => u32::MAX,
    };
    buf[at..at + CACHE_LEN].copy_from_slice(&v.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(instr: Instruction) -> Vec<u8> {
        let bytes = encode(&instr).unwrap();
        let d = decode(&bytes, 0);
        assert_eq!(d.instr, instr);
        assert_eq!(d.len, bytes.len());
        assert_eq!(instruction_length(&bytes, 0), bytes.len());
        bytes
    }

    #[test]
    fn test_varint_stop_bit() {
        let bytes = round_trip(Instruction::new(Opcode::Sto, Arg::Num(0)));
        assert_eq!(&bytes[2..], &[0x80]);
        let bytes = round_trip(Instruction::new(Opcode::Sto, Arg::Num(200)));
        assert_eq!(&bytes[2..], &[0x01, 0xC8]);
    }

    #[test]
    fn test_high_opcode_bits() {
        let bytes = round_trip(Instruction::plain(Opcode::Dup));
        assert_eq!(bytes[0], (Opcode::Dup.code() & 0xFF) as u8);
        assert_eq!((bytes[1] >> 4) & 7, (Opcode::Dup.code() >> 8) as u8);
    }

    #[test]
    fn test_indirect_sets_bit_three() {
        let bytes = round_trip(Instruction::new(Opcode::Rcl, Arg::IndStr(b"ABC".to_vec())));
        assert_eq!(bytes[1] & 0x0F, ARG_IND | ARG_STR);
        round_trip(Instruction::new(Opcode::Rcl, Arg::IndNum(12)));
        round_trip(Instruction::new(Opcode::Rcl, Arg::IndStk(StackReg::T)));
    }

    #[test]
    fn test_jump_cache_placeholder() {
        let bytes = round_trip(Instruction::new(Opcode::Gto, Arg::LocalLabel(b'A')));
        assert_eq!(&bytes[3..], &[0xFF; 4]);
        let d = decode(&bytes, 0);
        assert_eq!(d.cache, Some(3));
        assert_eq!(read_cache(&bytes, 3), None);
        let bytes = round_trip(Instruction::new(Opcode::Xeq, Arg::Str(b"F".to_vec())));
        assert_eq!(decode(&bytes, 0).cache, None);
    }

    #[test]
    fn test_cache_write_back() {
        let mut bytes = encode(&Instruction::new(Opcode::Xeq, Arg::Num(7))).unwrap();
        write_cache(&mut bytes, 3, Some(0x1234));
        assert_eq!(read_cache(&bytes, 3), Some(0x1234));
        assert_eq!(decode(&bytes, 0).instr.arg, Arg::Num(7));
        write_cache(&mut bytes, 3, None);
        assert_eq!(&bytes[3..], &[0xFF; 4]);
    }

    #[test]
    fn test_number_literals() {
        let bytes = round_trip(Instruction::new(Opcode::Number, Arg::number(-42.0, None)));
        assert_eq!(bytes[1] & 0x0F, ARG_NEG_NUM);
        let bytes = round_trip(Instruction::new(Opcode::Number, Arg::number(0.5, None)));
        assert_eq!(bytes.len(), 10);
        let bytes = round_trip(Instruction::new(Opcode::Number, Arg::number(1000.0, Some("1E3"))));
        assert_eq!(bytes[1] & TEXT_FLAG, TEXT_FLAG);
        assert_eq!(&bytes[10..], b"1E3\0");
        round_trip(Instruction::new(Opcode::Number, Arg::number(-0.0, None)));
    }

    #[test]
    fn test_text_limits() {
        let long = vec![b'A'; 16];
        assert!(encode(&Instruction::new(Opcode::Sto, Arg::Str(long))).is_err());
        let xs = vec![b'x'; 300];
        let bytes = round_trip(Instruction::new(Opcode::XStr, Arg::XStr(xs)));
        assert_eq!(bytes.len(), 304);
    }

    #[test]
    fn test_checked_length_rejects_truncation() {
        let bytes = encode(&Instruction::new(Opcode::Sto, Arg::Str(b"ABC".to_vec()))).unwrap();
        assert_eq!(checked_length(&bytes, 0), Some(bytes.len()));
        assert_eq!(checked_length(&bytes[..4], 0), None);
    }
}
