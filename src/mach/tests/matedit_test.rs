use super::*;
use crate::mach::{LoadOutcome, CURRENT_VERSION};
use std::io::Cursor;

const SUB: &[&str] = &["LBL \"A\"", "XEQ \"B\"", "RTN", "LBL \"B\"", "5", "LSTO \"M\"", "RTN"];

fn editing(lines: &[&str]) -> Runtime {
    let mut r = Runtime::default();
    program(&mut r, lines);
    for line in &["2", "2", "NEWMAT", "STO \"M\"", "INDEX \"M\"", "J+"] {
        r.enter(line);
    }
    assert_eq!(run(&mut r), "");
    let me = r.matedit().unwrap();
    assert_eq!((me.name.as_slice(), me.i, me.j), (&b"M"[..], 0, 1));
    r
}

#[test]
fn test_editor_comes_back_after_local_returns() {
    let mut r = editing(SUB);
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    let me = r.matedit().unwrap();
    assert_eq!(me.name, b"M");
    assert_eq!((me.i, me.j), (0, 1));
    assert_eq!(r.vars().count_locals(), 0);
    assert_eq!(r.rtn_depth(), 0);
}

#[test]
fn test_local_at_level_zero_ends_editor() {
    let mut r = editing(SUB);
    r.enter("XEQ \"B\"");
    assert_eq!(run(&mut r), "");
    assert!(r.matedit().is_none());
    assert!(matches!(r.recall_var("M"), Some(Val::RealMatrix(_))));
}

#[test]
fn test_parked_editor_survives_save() {
    let mut r = editing(&[
        "LBL \"A\"", "XEQ \"B\"", "RTN", "LBL \"B\"", "5", "LSTO \"M\"", "STOP", "RTN",
    ]);
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert!(r.matedit().is_none());
    assert_eq!(r.rtn_depth(), 1);
    assert!(r.frames().last().unwrap().matedit);
    assert_eq!(real(&r, "M"), Some(5.0));

    let mut bytes = vec![];
    r.save(&mut bytes).unwrap();
    let mut back = Runtime::default();
    let outcome = back.load(&mut Cursor::new(bytes), CURRENT_VERSION);
    assert_eq!(outcome, LoadOutcome { success: true, ..LoadOutcome::default() });
    assert!(back.matedit().is_none());
    assert!(back.frames().last().unwrap().matedit);

    back.enter("R/S");
    assert_eq!(run(&mut back), "");
    let me = back.matedit().unwrap();
    assert_eq!(me.name, b"M");
    assert_eq!((me.i, me.j), (0, 1));
    assert_eq!(back.vars().count_locals(), 0);
}
