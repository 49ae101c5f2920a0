mod common;
use common::*;
use rpn::mach::{state_version, Cell, LoadOutcome, Runtime, Shared, Val, CURRENT_VERSION};
use std::io::Cursor;

fn saved(runtime: &Runtime, version: u32) -> Vec<u8> {
    let mut bytes = vec![];
    runtime.save_as(&mut bytes, version).unwrap();
    bytes
}

fn loaded(bytes: Vec<u8>) -> (Runtime, LoadOutcome) {
    let mut cursor = Cursor::new(bytes);
    let version = state_version(&mut cursor).unwrap();
    assert_eq!(cursor.position(), 0);
    let mut runtime = Runtime::default();
    let outcome = runtime.load(&mut cursor, version);
    (runtime, outcome)
}

fn success() -> LoadOutcome {
    LoadOutcome {
        success: true,
        ..LoadOutcome::default()
    }
}

fn regs_cell(runtime: &Runtime, n: usize) -> Cell {
    match runtime.recall_var("REGS") {
        Some(Val::RealMatrix(m)) => m.cells()[n].clone(),
        other => panic!("REGS is {:?}", other),
    }
}

fn matrix(runtime: &Runtime, name: &str) -> Shared<rpn::mach::RealMatrix> {
    match runtime.recall_var(name) {
        Some(Val::RealMatrix(m)) => m.clone(),
        other => panic!("{} is {:?}", name, other),
    }
}

#[test]
fn test_round_trip_keeps_machine() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"SQ\"", "X^2", "RTN"]);
    enter_all(&mut r, &["FIX 02", "1.5", "STO \"A\"", "7", "STO 03", "\"HI\"", "SF 05"]);
    let mut bytes = vec![];
    r.save(&mut bytes).unwrap();
    assert_eq!(&bytes[..4], b"RPNE");

    let (mut back, outcome) = loaded(bytes);
    assert_eq!(outcome, success());
    assert_eq!(back.stack(), r.stack());
    assert_eq!(back.lastx(), r.lastx());
    assert_eq!(back.alpha(), b"HI");
    assert_eq!(back.recall_var("A"), Some(&Val::Real(1.5)));
    assert_eq!(regs_cell(&back, 3), Cell::Number(7.0));
    assert_eq!(back.programs().listing(0), r.programs().listing(0));
    assert!(back.flags().get(5));

    r.enter("RAN");
    back.enter("RAN");
    assert_eq!(x(&back), x(&r));

    back.enter("XEQ \"SQ\"");
    assert_eq!(exec(&mut back), "");
    assert_eq!(x(&back), x(&r) * x(&r));
}

#[test]
fn test_shared_arrays_stay_shared() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["2", "3", "NEWMAT", "STO \"M\"", "STO \"N\""]);
    assert!(Shared::ptr_eq(&matrix(&r, "M"), &matrix(&r, "N")));

    let (back, outcome) = loaded(saved(&r, CURRENT_VERSION));
    assert_eq!(outcome, success());
    let (m, n) = (matrix(&back, "M"), matrix(&back, "N"));
    assert!(Shared::ptr_eq(&m, &n));
    assert_eq!((m.rows(), m.cols()), (2, 3));
    match reg(&back, 0) {
        Val::RealMatrix(x) => assert!(Shared::ptr_eq(x, &m)),
        other => panic!("X is {:?}", other),
    }

    let (back, _) = loaded(saved(&r, 42));
    let (m, n) = (matrix(&back, "M"), matrix(&back, "N"));
    assert!(!Shared::ptr_eq(&m, &n));
    assert_eq!(m, n);
}

#[test]
fn test_newer_file_is_left_alone() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["5", "STO \"A\""]);
    let bytes = saved(&r, CURRENT_VERSION);
    let outcome = r.load(&mut Cursor::new(bytes), CURRENT_VERSION + 1);
    assert_eq!(
        outcome,
        LoadOutcome {
            too_new: true,
            ..LoadOutcome::default()
        }
    );
    assert_eq!(r.recall_var("A"), Some(&Val::Real(5.0)));
}

#[test]
fn test_damaged_file_resets_machine() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["5", "STO \"A\""]);
    let mut bytes = saved(&r, CURRENT_VERSION);
    bytes.truncate(bytes.len() - 20);

    let outcome = r.load(&mut Cursor::new(bytes), CURRENT_VERSION);
    assert!(outcome.needs_clear);
    assert!(!outcome.success);
    assert_eq!(r.recall_var("A"), None);
    assert_eq!(x(&r), 0.0);
    assert!(r.recall_var("REGS").is_some());
}

#[test]
fn test_declared_version_must_match() {
    let r = Runtime::default();
    let bytes = saved(&r, CURRENT_VERSION);
    let mut back = Runtime::default();
    assert!(back.load(&mut Cursor::new(bytes), 42).needs_clear);
    assert!(state_version(&mut Cursor::new(b"NOPE\0\0\0\x2f".to_vec())).is_err());
}

#[test]
fn test_older_layouts_load_back() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "1", "+"]);
    enter_all(&mut r, &["3", "ENTER", "4", "STO \"B\""]);
    for &version in &[26, 30, 33, 42] {
        let (back, outcome) = loaded(saved(&r, version));
        assert_eq!(outcome, success(), "v{}", version);
        assert_eq!(back.stack(), r.stack(), "v{}", version);
        assert_eq!(back.recall_var("B"), Some(&Val::Real(4.0)), "v{}", version);
        assert_eq!(back.programs().listing(0), r.programs().listing(0), "v{}", version);
    }
}

#[test]
fn test_old_layouts_keep_four_levels() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["NSTK", "1", "2", "3", "4", "5", "6"]);
    assert!(r.stack().depth() > 4);
    let (back, _) = loaded(saved(&r, 42));
    assert!(!back.stack().is_big());
    assert_eq!(back.stack().depth(), 4);
    assert_eq!(x(&back), 6.0);
    assert_eq!(reg(&back, 3), &Val::Real(3.0));

    let (back, _) = loaded(saved(&r, CURRENT_VERSION));
    assert!(back.stack().is_big());
    assert_eq!(back.stack(), r.stack());
}

#[test]
fn test_shallow_big_stack_fills_four_levels() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["NSTK", "CLST", "7"]);
    assert!(r.stack().is_big());
    assert!(r.stack().depth() < 4);
    for &version in &[26, 30, 33, 42] {
        let (back, outcome) = loaded(saved(&r, version));
        assert_eq!(outcome, success(), "v{}", version);
        assert!(!back.stack().is_big(), "v{}", version);
        assert_eq!(back.stack().depth(), 4, "v{}", version);
        assert_eq!(x(&back), 7.0, "v{}", version);
        for n in 1..4 {
            assert_eq!(reg(&back, n), &Val::Real(0.0), "v{} level {}", version, n);
        }
    }
}

#[test]
fn test_lists_need_a_newer_layout() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["NEWLIST", "STO \"L\""]);
    assert!(r.save_as(&mut vec![], 26).is_err());
    let (back, outcome) = loaded(saved(&r, CURRENT_VERSION));
    assert_eq!(outcome, success());
    assert_eq!(back.recall_var("L"), Some(&Val::list(vec![])));
}

#[test]
fn test_long_matrix_strings() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["\"ABCDEFGHIJKLMNOPQR\"", "STO 00"]);
    let (back, _) = loaded(saved(&r, CURRENT_VERSION));
    match regs_cell(&back, 0) {
        Cell::Text(t) => assert_eq!(t.as_bytes(), b"ABCDEFGHIJKLMNOPQR"),
        other => panic!("cell is {:?}", other),
    }

    let (back, _) = loaded(saved(&r, 26));
    match regs_cell(&back, 0) {
        Cell::Text(t) => assert_eq!(t.as_bytes(), b"ABCDEF"),
        other => panic!("cell is {:?}", other),
    }
}

#[test]
fn test_legacy_files_with_long_matrix_strings() {
    let mut r = Runtime::default();
    enter_all(&mut r, &["\"ABCDEFGHIJKLMNOPQR\"", "STO 00"]);
    let bytes = saved(&r, 26);
    let short = b"\x01\x06ABCDEF";
    let at = bytes
        .windows(short.len())
        .position(|w| w == short)
        .expect("cell in file");
    let mut damaged = bytes[..at].to_vec();
    damaged.extend_from_slice(b"\x01\x09ABCDEFGHI");
    damaged.extend_from_slice(&bytes[at + short.len()..]);

    let (back, outcome) = loaded(damaged);
    assert_eq!(outcome, success());
    match regs_cell(&back, 0) {
        Cell::Text(t) => assert_eq!(t.as_bytes(), b"ABCDEF"),
        other => panic!("cell is {:?}", other),
    }
    assert_eq!(regs_cell(&back, 1), Cell::Number(0.0));
}
