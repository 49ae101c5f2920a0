use proptest::prelude::*;
use rpn::lang::codec::{checked_length, decode, encode, read_cache, CACHE_LEN};
use rpn::lang::{Arg, Instruction, Opcode, StackReg, MAX_TEXT};

fn name() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(b'A'..=b'Z', 1..=MAX_TEXT)
}

fn stack_reg() -> impl Strategy<Value = StackReg> {
    prop_oneof![
        Just(StackReg::X),
        Just(StackReg::Y),
        Just(StackReg::Z),
        Just(StackReg::T),
        Just(StackReg::L),
    ]
}

fn instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (-1e300f64..1e300).prop_map(|v| Instruction::new(Opcode::Number, Arg::number(v, None))),
        (-100_000i32..100_000).prop_map(|v| Instruction::new(Opcode::Number, Arg::number(v as f64, None))),
        any::<u32>().prop_map(|n| Instruction::new(Opcode::Sto, Arg::Num(n))),
        any::<u32>().prop_map(|n| Instruction::new(Opcode::Rcl, Arg::IndNum(n))),
        stack_reg().prop_map(|r| Instruction::new(Opcode::Sto, Arg::Stk(r))),
        stack_reg().prop_map(|r| Instruction::new(Opcode::View, Arg::IndStk(r))),
        name().prop_map(|s| Instruction::new(Opcode::Lbl, Arg::Str(s))),
        name().prop_map(|s| Instruction::new(Opcode::Xeq, Arg::IndStr(s))),
        (b'A'..=b'J').prop_map(|c| Instruction::new(Opcode::Gto, Arg::LocalLabel(c))),
        (0u32..100).prop_map(|n| Instruction::new(Opcode::Xeq, Arg::Num(n))),
        proptest::collection::vec(any::<u8>(), 0..300)
            .prop_map(|s| Instruction::new(Opcode::XStr, Arg::XStr(s))),
        Just(Instruction::plain(Opcode::End)),
        Just(Instruction::plain(Opcode::Dup)),
    ]
}

proptest! {
    #[test]
    fn test_encoded_instruction_decodes_back(instr in instruction()) {
        let bytes = encode(&instr).unwrap();
        let d = decode(&bytes, 0);
        prop_assert_eq!(&d.instr, &instr);
        prop_assert_eq!(d.len, bytes.len());
        prop_assert_eq!(checked_length(&bytes, 0), Some(bytes.len()));
    }

    #[test]
    fn test_truncated_instruction_has_no_length(instr in instruction(), cut in 1usize..64) {
        let bytes = encode(&instr).unwrap();
        let keep = bytes.len().saturating_sub(cut);
        prop_assert_eq!(checked_length(&bytes[..keep], 0), None);
    }

    #[test]
    fn test_instructions_walk_back_to_back(instrs in proptest::collection::vec(instruction(), 1..20)) {
        let mut text = vec![];
        for i in &instrs {
            text.extend(encode(i).unwrap());
        }
        let mut pc = 0;
        for i in &instrs {
            let d = decode(&text, pc);
            prop_assert_eq!(&d.instr, i);
            pc += d.len;
        }
        prop_assert_eq!(pc, text.len());
    }
}

#[test]
fn test_local_jumps_carry_empty_cache() {
    let bytes = encode(&Instruction::new(Opcode::Gto, Arg::LocalLabel(b'C'))).unwrap();
    let d = decode(&bytes, 0);
    let at = d.cache.unwrap();
    assert_eq!(at + CACHE_LEN, bytes.len());
    assert_eq!(read_cache(&bytes, at), None);

    let global = encode(&Instruction::new(Opcode::Gto, Arg::Str(b"C".to_vec()))).unwrap();
    assert_eq!(decode(&global, 0).cache, None);
}

#[test]
fn test_overlong_names_are_refused() {
    let long = vec![b'N'; MAX_TEXT + 1];
    assert!(encode(&Instruction::new(Opcode::Lbl, Arg::Str(long))).is_err());
    assert!(encode(&Instruction::new(Opcode::Gto, Arg::LocalLabel(b'Z'))).is_err());
}
