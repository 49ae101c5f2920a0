mod common;
use common::*;
use rpn::mach::{Runtime, Val};

fn parabola(runtime: &mut Runtime) {
    program(runtime, &["LBL \"F\"", "MVAR \"X\"", "RCL \"X\"", "X^2", "2", "-", "RTN"]);
}

#[test]
fn test_solve_from_keyboard() {
    let mut r = Runtime::default();
    parabola(&mut r);
    let out = enter_all(&mut r, &["PGMSLV \"F\"", "1", "STO \"X\"", "2", "SOLVE \"X\""]);
    assert!(out.starts_with("X=1.4142"), "{}", out);
    assert!((x(&r) - 2f64.sqrt()).abs() < 1e-9);
    assert_eq!(r.recall_var("X"), Some(reg(&r, 0)));
    assert!(!r.solve_active());
    assert_eq!(r.rtn_depth(), 0);
}

#[test]
fn test_solve_needs_a_program() {
    let mut r = Runtime::default();
    assert_eq!(enter_all(&mut r, &["SOLVE \"X\""]), "Nonexistent\n");
    assert_eq!(enter_all(&mut r, &["PGMSLV \"NONE\""]), "Label Not Found\n");
}

#[test]
fn test_solve_inside_program_keeps_running() {
    let mut r = Runtime::default();
    parabola(&mut r);
    r.enter("GTO ..");
    program(
        &mut r,
        &["LBL \"S\"", "PGMSLV \"F\"", "1", "STO \"X\"", "2", "SOLVE \"X\"", "10", "×", "RTN"],
    );
    r.enter("XEQ \"S\"");
    assert_eq!(exec(&mut r), "");
    assert!((x(&r) - 10.0 * 2f64.sqrt()).abs() < 1e-8);
    assert!(!r.is_running());
}

#[test]
fn test_solve_steps_around_errors() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"G\"", "RCL \"X\"", "3", "-", "RCL \"X\"", "1", "-", "÷", "RTN"],
    );
    let out = enter_all(&mut r, &["PGMSLV \"G\"", "1", "STO \"X\"", "5", "SOLVE \"X\""]);
    assert!(out.contains("X=3.0000"), "{}", out);
    assert!((x(&r) - 3.0).abs() < 1e-9);
}

#[test]
fn test_integrate_polynomial() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"H\"", "MVAR \"X\"", "RCL \"X\"", "X^2", "RTN"]);
    let out = enter_all(
        &mut r,
        &["0", "STO \"LLIM\"", "3", "STO \"ULIM\"", "0.00001", "STO \"ACC\"", "PGMINT \"H\""],
    );
    assert_eq!(out, "");
    r.enter("INTEG \"X\"");
    let out = exec_n(&mut r, 100_000);
    assert_eq!(out, "∫=9.0000\n");
    assert!((x(&r) - 9.0).abs() < 1e-9);
    match reg(&r, 1) {
        Val::Real(eps) => assert!(*eps >= 0.0),
        other => panic!("Y is {:?}", other),
    }
    assert!(!r.integ_active());
}

#[test]
fn test_integrate_needs_limits() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"H\"", "RCL \"X\"", "RTN"]);
    assert_eq!(enter_all(&mut r, &["PGMINT \"H\"", "INTEG \"X\""]), "Nonexistent\n");
}
