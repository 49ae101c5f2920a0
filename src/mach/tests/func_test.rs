use super::*;

fn hypot_program(r: &mut Runtime) {
    program(
        r,
        &["LBL \"S\"", "FUNC 21", "X^2", "X<>Y", "X^2", "+", "SQRT", "RTN", "LBL \"A\"", "XEQ \"S\"", "RTN"],
    );
}

#[test]
fn test_func_replaces_inputs_with_outputs() {
    let mut r = Runtime::default();
    hypot_program(&mut r);
    r.enter("1");
    r.enter("3");
    r.enter("4");
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 5.0);
    assert_eq!(y(&r), 1.0);
    assert_eq!(r.lastx(), &Val::Real(4.0));
    assert!(!r.stack().is_big());
    assert_eq!(r.stack().depth(), 4);
}

#[test]
fn test_func_pads_missing_outputs() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"Z\"", "FUNC 02", "RTN", "LBL \"A\"", "XEQ \"Z\"", "RTN"]);
    r.enter("NSTK");
    r.enter("CLST");
    r.enter("7");
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    let vals: Vec<Val> = r.stack().values().to_vec();
    assert_eq!(vals, vec![Val::Real(7.0), Val::Real(0.0), Val::Real(0.0)]);
    assert!(r.stack().is_big());
}

#[test]
fn test_func_error_restores_caller_stack() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"D\"", "FUNC 11", "99", "RTNERR 4", "LBL \"A\"", "XEQ \"D\"", "RTN"],
    );
    r.enter("5");
    r.enter("6");
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "Out of Range\n");
    assert_eq!(x(&r), 6.0);
    assert_eq!(y(&r), 5.0);
    assert_eq!(r.rtn_depth(), 0);
    assert_eq!(real(&r, "\u{2}FUNC"), None);
}

#[test]
fn test_func_needs_a_caller() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"F\"", "FUNC 11", "RTN"]);
    r.enter("XEQ \"F\"");
    assert_eq!(run(&mut r), "Invalid Context\n");
}

#[test]
fn test_lnstk_is_undone_on_return() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"B\"", "LNSTK", "1", "2", "3", "4", "5", "RTN", "LBL \"A\"", "XEQ \"B\"", "RTN"],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert!(!r.stack().is_big());
    assert_eq!(r.stack().depth(), 4);
    assert_eq!(x(&r), 5.0);
    assert_eq!(r.stack().get(3).unwrap(), &Val::Real(2.0));
}

#[test]
fn test_abandoned_frame_restores_stack_mode() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"B\"", "LNSTK", "STOP", "RTN", "LBL \"A\"", "XEQ \"B\"", "RTN"],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert!(r.stack().is_big());
    r.enter("GTO \"A\"");
    assert_eq!(r.rtn_depth(), 0);
    assert!(!r.stack().is_big());
}
