use super::*;
use crate::lang::ErrorCode;
use crate::mach::{Owner, MAX_RTNS};

#[test]
fn test_nested_subroutines() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"A\"", "XEQ \"B\"", "1", "+", "RTN", "LBL \"B\"", "XEQ C", "10", "RTN", "LBL C", "100", "RTN"],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 11.0);
    assert_eq!(y(&r), 100.0);
    assert_eq!(r.rtn_depth(), 0);
    assert!(!r.is_running());
}

#[test]
fn test_return_stack_is_bounded() {
    let mut r = Runtime::default();
    for _ in 0..MAX_RTNS {
        r.push_rtn_addr(Owner::Program(0), None).unwrap();
    }
    let err = r.push_rtn_addr(Owner::Program(0), None).unwrap_err();
    assert!(err.is(ErrorCode::RtnStackFull));
    assert_eq!(r.rtn_depth(), MAX_RTNS);
    r.clear_all_rtns();
    assert_eq!(r.rtn_depth(), 0);
}

#[test]
fn test_runaway_recursion_stops_with_error() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"R\"", "XEQ \"R\""]);
    r.enter("XEQ \"R\"");
    assert_eq!(run(&mut r), "RTN Stack Full\n");
    assert!(!r.is_running());
    assert_eq!(r.last_error(), ErrorCode::RtnStackFull as u16);
}

#[test]
fn test_locals_belong_to_their_call() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"A\"", "5", "LSTO \"L\"", "XEQ \"B\"", "RCL \"L\"", "RTN", "LBL \"B\"", "7", "LSTO \"L\"", "RTN"],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 5.0);
    assert_eq!(y(&r), 7.0);
    assert_eq!(real(&r, "L"), None);
}

#[test]
fn test_local_hides_global_until_return() {
    let mut r = Runtime::default();
    r.enter("42");
    r.enter("STO \"G\"");
    program(&mut r, &["LBL \"A\"", "1", "LSTO \"G\"", "RCL \"G\"", "RTN"]);
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 1.0);
    assert_eq!(real(&r, "G"), Some(42.0));
}

#[test]
fn test_rtnyes_and_rtnno() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"Y\"", "RTNYES", "LBL \"N\"", "RTNNO", "LBL \"A\"", "XEQ \"N\"", "1", "2", "XEQ \"Y\"", "3", "RTN"],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 3.0);
    assert_eq!(y(&r), 2.0);
    assert_eq!(r.stack().get(2).unwrap(), &Val::Real(0.0));
}

#[test]
fn test_rtnerr_reports_at_caller() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"E\"", "RTNERR 5", "LBL \"A\"", "XEQ \"E\"", "1", "RTN"]);
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "Divide by 0\n");
    assert_eq!(r.rtn_depth(), 0);
    assert_eq!(r.current_line(), "04 XEQ \"E\"");
}

#[test]
fn test_error_ignore_flag() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "SF 25", "1", "0", "÷", "FS? 25", "7", "RTN"]);
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(r.last_error(), ErrorCode::DivideBy0 as u16);
    assert_eq!(x(&r), 0.0);
}

#[test]
fn test_keyboard_xeq_resumes_suspended_program() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "XEQ \"B\"", "2", "RTN", "LBL \"B\"", "STOP", "RTN", "LBL \"C\"", "9", "RTN"]);
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(r.rtn_depth(), 1);
    r.enter("XEQ \"C\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 9.0);
    assert_eq!(r.rtn_depth(), 1);
    r.enter("R/S");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 2.0);
    assert_eq!(r.rtn_depth(), 0);
}

#[test]
fn test_gto_from_keyboard_forgets_returns() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "XEQ \"B\"", "RTN", "LBL \"B\"", "STOP", "RTN"]);
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(r.rtn_depth(), 1);
    r.enter("GTO \"A\"");
    assert_eq!(r.rtn_depth(), 0);
}

#[test]
fn test_returns_purge_locals_level_by_level() {
    let mut r = Runtime::default();
    r.enter("42");
    r.enter("STO \"G\"");
    program(
        &mut r,
        &[
            "LBL \"A\"", "1", "LSTO \"G\"", "XEQ \"B\"", "RCL \"G\"", "RTN",
            "LBL \"B\"", "2", "LSTO \"G\"", "XEQ \"C\"", "RCL \"G\"", "RTN",
            "LBL \"C\"", "3", "LSTO \"G\"", "STOP", "RTN",
        ],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(r.rtn_depth(), 2);
    assert_eq!(r.vars().count_locals(), 3);
    assert_eq!(real(&r, "G"), Some(3.0));

    r.enter("R/S");
    assert_eq!(run(&mut r), "");
    assert_eq!(r.rtn_depth(), 0);
    assert_eq!(r.vars().count_locals(), 0);
    assert_eq!(x(&r), 1.0);
    assert_eq!(y(&r), 2.0);
    assert_eq!(real(&r, "G"), Some(42.0));
}

#[test]
fn test_rtnerr_purges_callee_locals() {
    let mut r = Runtime::default();
    r.enter("42");
    r.enter("STO \"G\"");
    program(
        &mut r,
        &[
            "LBL \"A\"", "1", "LSTO \"G\"", "XEQ \"B\"", "RCL \"G\"", "RTN",
            "LBL \"B\"", "2", "LSTO \"G\"", "SF 25", "XEQ \"C\"", "RCL \"G\"", "RTN",
            "LBL \"C\"", "3", "LSTO \"G\"", "RTNERR 5",
        ],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(r.last_error(), ErrorCode::DivideBy0 as u16);
    assert!(!r.flags().get(25));
    assert_eq!(r.rtn_depth(), 0);
    assert_eq!(r.vars().count_locals(), 0);
    assert_eq!(x(&r), 1.0);
    assert_eq!(y(&r), 2.0);
    assert_eq!(real(&r, "G"), Some(42.0));
}

#[test]
fn test_rtnerr_leaves_caller_locals_until_it_returns() {
    let mut r = Runtime::default();
    r.enter("42");
    r.enter("STO \"G\"");
    program(
        &mut r,
        &[
            "LBL \"A\"", "1", "LSTO \"G\"", "XEQ \"B\"", "RTN",
            "LBL \"B\"", "2", "LSTO \"G\"", "XEQ \"C\"", "RTN",
            "LBL \"C\"", "3", "LSTO \"G\"", "RTNERR 5",
        ],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "Divide by 0\n");
    assert_eq!(r.rtn_depth(), 1);
    assert_eq!(r.vars().count_locals(), 2);
    assert_eq!(real(&r, "G"), Some(2.0));
    r.enter("RTN");
    assert_eq!(r.vars().count_locals(), 0);
    assert_eq!(real(&r, "G"), Some(42.0));
}
