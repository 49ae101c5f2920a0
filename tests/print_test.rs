mod common;
use common::*;
use rpn::mach::Runtime;

fn printer() -> (Runtime, Paper) {
    let paper = Paper::default();
    let runtime = Runtime::new(Box::new(paper.clone()));
    (runtime, paper)
}

#[test]
fn test_print_values() {
    let (mut r, paper) = printer();
    enter_all(&mut r, &["2", "1", "NEWMAT", "PRX"]);
    assert_eq!(paper.take(), vec!["X=[2×1 Matrix]", "1:1=0", "2:1=0"]);

    enter_all(&mut r, &["5", "STO \"V\"", "PRV \"V\"", "\"ABC\"", "PRA"]);
    assert_eq!(paper.take(), vec!["V=5.0000", "ABC"]);
}

#[test]
fn test_print_user_variables() {
    let (mut r, paper) = printer();
    enter_all(&mut r, &["5", "STO \"V\"", "7", "STO \"W\"", "PRUSR"]);
    let lines = paper.take();
    assert!(lines.iter().any(|l| l == "V=5.0000"), "{:?}", lines);
    assert!(lines.iter().any(|l| l == "W=7.0000"), "{:?}", lines);
    assert!(!r.is_running());
}

#[test]
fn test_printer_flag_is_protected() {
    let (mut r, paper) = printer();
    assert_eq!(enter_all(&mut r, &["CF 55"]), "Restricted Operation\n");
    assert!(r.flags().get(55));
    assert_eq!(enter_all(&mut r, &["PRX"]), "");
    assert_eq!(paper.take(), vec!["X=0.0000"]);
}

#[test]
fn test_running_program_needs_printer_enabled() {
    let (mut r, paper) = printer();
    program(&mut r, &["LBL \"P\"", "3", "PRX", "RTN"]);
    r.enter("XEQ \"P\"");
    assert_eq!(exec(&mut r), "");
    assert!(paper.take().is_empty());

    r.enter("PRON");
    r.enter("XEQ \"P\"");
    assert_eq!(exec(&mut r), "");
    assert_eq!(paper.take(), vec!["X=3.0000"]);
}
